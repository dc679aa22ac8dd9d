use std::sync::Arc;

use anyhow::Context;

use replyflow::channels::{
    ChannelDispatcher, EmailTransport, MessengerConfig, MessengerTransport, SmtpConfig,
    TwilioConfig, TwilioTransport,
};
use replyflow::config::EngineConfig;
use replyflow::pipeline::ExecutionEngine;
use replyflow::store::{ExecutionLogStore, InMemoryLogStore, LibSqlLogStore};
use replyflow::webhook::webhook_routes;
use replyflow::workflow::InMemoryRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env().context("Invalid configuration")?;

    let registry = match &config.workflows_file {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            InMemoryRegistry::from_json(&json)?
        }
        None => InMemoryRegistry::new(),
    };
    tracing::info!(workflows = registry.len().await, "Workflow registry loaded");

    let logs: Arc<dyn ExecutionLogStore> = match &config.db_path {
        Some(path) => Arc::new(LibSqlLogStore::new_local(path).await?),
        None => {
            tracing::warn!("REPLYFLOW_DB_PATH not set, execution logs kept in memory");
            InMemoryLogStore::new()
        }
    };

    let mut dispatcher = ChannelDispatcher::new(config.dispatch_timeout);
    if let Some(twilio) = TwilioConfig::from_env() {
        dispatcher.register(Arc::new(TwilioTransport::whatsapp(twilio.clone())));
        dispatcher.register(Arc::new(TwilioTransport::sms(twilio)));
    }
    if let Some(smtp) = SmtpConfig::from_env() {
        dispatcher.register(Arc::new(EmailTransport::new(
            smtp.bounded_by(config.dispatch_timeout),
        )));
    }
    if let Some(messenger) = MessengerConfig::from_env() {
        dispatcher.register(Arc::new(MessengerTransport::new(messenger)));
    }
    let channels = dispatcher.channels();
    if channels.is_empty() {
        tracing::warn!("No transports configured, every send will fail");
    } else {
        tracing::info!(?channels, "Transports configured");
    }

    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(registry),
        logs,
        Arc::new(dispatcher),
    ));

    let app = webhook_routes(engine, config.session_strategy);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Replyflow intake listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
