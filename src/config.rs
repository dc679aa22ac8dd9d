//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::channels::dispatcher::DEFAULT_SEND_TIMEOUT;
use crate::error::ConfigError;
use crate::execution::SessionStrategy;

/// Engine and HTTP intake configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Port for the webhook / log API server.
    pub port: u16,
    /// libSQL file for execution logs. `None` keeps logs in memory.
    pub db_path: Option<PathBuf>,
    /// JSON array of workflows loaded into the registry at startup.
    pub workflows_file: Option<PathBuf>,
    /// Per-send transport timeout.
    pub dispatch_timeout: Duration,
    pub session_strategy: SessionStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: None,
            workflows_file: None,
            dispatch_timeout: DEFAULT_SEND_TIMEOUT,
            session_strategy: SessionStrategy::Greedy,
        }
    }
}

impl EngineConfig {
    /// Read `REPLYFLOW_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match get("REPLYFLOW_PORT") {
            Some(v) => parse_value("REPLYFLOW_PORT", &v)?,
            None => defaults.port,
        };
        let dispatch_timeout = match get("REPLYFLOW_DISPATCH_TIMEOUT_SECS") {
            Some(v) => {
                let secs: u64 = parse_value("REPLYFLOW_DISPATCH_TIMEOUT_SECS", &v)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "REPLYFLOW_DISPATCH_TIMEOUT_SECS".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.dispatch_timeout,
        };
        let session_strategy = match get("REPLYFLOW_SESSION_STRATEGY") {
            Some(v) => parse_value("REPLYFLOW_SESSION_STRATEGY", &v)?,
            None => defaults.session_strategy,
        };

        Ok(Self {
            port,
            db_path: get("REPLYFLOW_DB_PATH").map(PathBuf::from),
            workflows_file: get("REPLYFLOW_WORKFLOWS_FILE").map(PathBuf::from),
            dispatch_timeout,
            session_strategy,
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
