//! Execution engine: the single entry point for inbound events.
//!
//! For each workflow the event matches, the engine walks one pair through
//! received → matched → template resolution → (immediate | scheduled)
//! dispatch → sent/failed, appending an execution-log entry at every step.
//! Pairs are independent: one pair failing never affects its siblings.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channels::ChannelDispatcher;
use crate::error::Error;
use crate::execution::ExecutionLogEntry;
use crate::pipeline::matcher::InboundMatcher;
use crate::pipeline::scheduler::SendScheduler;
use crate::pipeline::types::{InboundEvent, InboundReport, PairOutcome, WorkflowOutcome};
use crate::store::ExecutionLogStore;
use crate::workflow::{Channel, ChannelMessage, Contact, Workflow, WorkflowRegistry, parse_delay};

/// What a dispatch (immediate or delayed) needs, cloneable into timer tasks.
#[derive(Clone)]
struct EngineContext {
    logs: Arc<dyn ExecutionLogStore>,
    dispatcher: Arc<ChannelDispatcher>,
}

impl EngineContext {
    /// Append to the execution log. Failures are diagnostic only.
    async fn record(&self, workflow_id: Uuid, entry: ExecutionLogEntry) {
        let kind = entry.kind;
        if let Err(e) = self.logs.append(workflow_id, entry).await {
            error!(workflow_id = %workflow_id, kind = %kind, "Failed to append execution log: {}", e);
        }
    }

    async fn dispatch(
        &self,
        workflow_id: Uuid,
        channel: Channel,
        recipient: &str,
        message: &ChannelMessage,
        contact: Option<&Contact>,
    ) -> PairOutcome {
        let result = self
            .dispatcher
            .send(recipient, message.body(), channel, message.subject(), contact)
            .await;

        match result {
            Ok(delivery) => {
                info!(
                    workflow_id = %workflow_id,
                    channel = %channel,
                    handle = %delivery.handle,
                    "Message sent"
                );
                let provider_response = delivery.handle.to_string();
                self.record(
                    workflow_id,
                    ExecutionLogEntry::sent(channel, recipient, message.body(), &delivery),
                )
                .await;
                PairOutcome::Sent { provider_response }
            }
            Err(e) => {
                let error = e.to_string();
                warn!(workflow_id = %workflow_id, channel = %channel, "Send failed: {}", error);
                self.record(
                    workflow_id,
                    ExecutionLogEntry::failed(channel, recipient, message.body(), &error),
                )
                .await;
                PairOutcome::Failed { error }
            }
        }
    }
}

pub struct ExecutionEngine {
    registry: Arc<dyn WorkflowRegistry>,
    matcher: InboundMatcher,
    scheduler: SendScheduler,
    ctx: EngineContext,
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<dyn WorkflowRegistry>,
        logs: Arc<dyn ExecutionLogStore>,
        dispatcher: Arc<ChannelDispatcher>,
    ) -> Self {
        Self {
            matcher: InboundMatcher::new(Arc::clone(&registry)),
            registry,
            scheduler: SendScheduler::new(),
            ctx: EngineContext { logs, dispatcher },
        }
    }

    pub fn registry(&self) -> &Arc<dyn WorkflowRegistry> {
        &self.registry
    }

    pub fn logs(&self) -> &Arc<dyn ExecutionLogStore> {
        &self.ctx.logs
    }

    pub fn scheduler(&self) -> &SendScheduler {
        &self.scheduler
    }

    /// Boolean entry point: `true` iff at least one workflow matched.
    pub async fn process_inbound(
        &self,
        sender: &str,
        content: &str,
        channel: Channel,
    ) -> Result<bool, Error> {
        let report = self
            .handle_event(InboundEvent::new(sender, content, channel))
            .await?;
        Ok(report.matched())
    }

    /// Run every matching workflow for `event` and report per-pair outcomes.
    ///
    /// Only a registry read failure is an error here; everything that goes
    /// wrong inside a pair ends up in that pair's outcome and log.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<InboundReport, Error> {
        let matched = self.matcher.find_matches(&event).await?;
        if matched.is_empty() {
            debug!(channel = %event.channel, "No workflow matched inbound event");
            return Ok(InboundReport::default());
        }

        info!(
            channel = %event.channel,
            matched = matched.len(),
            "Inbound event triggered workflows"
        );

        let outcomes = join_all(matched.iter().map(|workflow| self.run_pair(&event, workflow))).await;
        Ok(InboundReport { outcomes })
    }

    async fn run_pair(&self, event: &InboundEvent, workflow: &Workflow) -> WorkflowOutcome {
        let outcome = self.execute(event, workflow).await;
        WorkflowOutcome {
            workflow_id: workflow.id,
            workflow_name: workflow.name.clone(),
            outcome,
        }
    }

    async fn execute(&self, event: &InboundEvent, workflow: &Workflow) -> PairOutcome {
        let id = workflow.id;
        let channel = event.channel;
        let sender = event.sender.as_str();

        self.ctx
            .record(id, ExecutionLogEntry::received(channel, sender, &event.content))
            .await;
        self.ctx
            .record(
                id,
                ExecutionLogEntry::trigger_matched(channel, sender, &workflow.trigger.keyword),
            )
            .await;

        let Some(message) = workflow.action.message_for(channel).cloned() else {
            warn!(workflow_id = %id, channel = %channel, "No message template for channel");
            self.ctx
                .record(id, ExecutionLogEntry::missing_template(channel, sender))
                .await;
            return PairOutcome::NotConfigured;
        };

        let contact = workflow.contact_for(sender).cloned();
        let delay = parse_delay(&workflow.action.delay);

        if delay.is_zero() {
            return self
                .ctx
                .dispatch(id, channel, sender, &message, contact.as_ref())
                .await;
        }

        self.ctx
            .record(
                id,
                ExecutionLogEntry::scheduled(channel, sender, &workflow.action.delay),
            )
            .await;
        self.schedule_dispatch(id, channel, sender, message, contact, delay)
            .await
    }

    async fn schedule_dispatch(
        &self,
        workflow_id: Uuid,
        channel: Channel,
        recipient: &str,
        message: ChannelMessage,
        contact: Option<Contact>,
        delay: Duration,
    ) -> PairOutcome {
        let ctx = self.ctx.clone();
        let target = recipient.to_string();
        let job = async move {
            ctx.dispatch(workflow_id, channel, &target, &message, contact.as_ref())
                .await;
        };

        let ticket = self
            .scheduler
            .schedule(workflow_id, channel, recipient, delay, job)
            .await;
        PairOutcome::Scheduled {
            ticket: ticket.id,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Retract all pending sends of a workflow (e.g. on deactivation) and
    /// log each one. Returns how many were cancelled.
    pub async fn cancel_scheduled(&self, workflow_id: Uuid) -> usize {
        let cancelled = self.scheduler.cancel_workflow(workflow_id).await;
        for send in &cancelled {
            self.ctx
                .record(
                    workflow_id,
                    ExecutionLogEntry::cancelled(send.channel, &send.recipient),
                )
                .await;
        }
        cancelled.len()
    }

    /// Retract one pending send by ticket. `false` if it already fired.
    pub async fn cancel_ticket(&self, ticket: Uuid) -> bool {
        match self.scheduler.cancel(ticket).await {
            Some(send) => {
                self.ctx
                    .record(
                        send.workflow_id,
                        ExecutionLogEntry::cancelled(send.channel, &send.recipient),
                    )
                    .await;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::{DeliveryHandle, Transport};
    use crate::error::ChannelError;
    use crate::execution::{Direction, EntryKind};
    use crate::store::InMemoryLogStore;
    use crate::workflow::{Action, InMemoryRegistry, Trigger};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeSms {
        sent: StdMutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for FakeSms {
        fn channel(&self) -> Channel {
            Channel::Sms
        }
        fn name(&self) -> &str {
            "fake"
        }
        async fn send(
            &self,
            recipient: &str,
            content: &str,
            _subject: Option<&str>,
        ) -> Result<DeliveryHandle, ChannelError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push((recipient.to_string(), content.to_string()));
            Ok(DeliveryHandle::new("fake", format!("msg-{}", sent.len())))
        }
    }

    fn sms_workflow(keyword: &str, delay: &str, body: &str) -> Workflow {
        Workflow::new(
            keyword,
            Trigger::new(keyword, [Channel::Sms]),
            Action {
                delay: delay.into(),
                messages: vec![ChannelMessage::text(Channel::Sms, body)],
            },
        )
        .activated()
    }

    fn engine(workflows: Vec<Workflow>) -> (ExecutionEngine, Arc<FakeSms>) {
        let transport = Arc::new(FakeSms::default());
        let dispatcher =
            ChannelDispatcher::default().with_transport(transport.clone() as Arc<dyn Transport>);
        let engine = ExecutionEngine::new(
            Arc::new(InMemoryRegistry::with_workflows(workflows)),
            InMemoryLogStore::new(),
            Arc::new(dispatcher),
        );
        (engine, transport)
    }

    #[tokio::test]
    async fn immediate_send_logs_in_causal_order() {
        let w = sms_workflow("demo", "immediate", "Thanks!");
        let id = w.id;
        let (engine, transport) = engine(vec![w]);

        let matched = engine
            .process_inbound("+15551234567", "Demo please", Channel::Sms)
            .await
            .unwrap();
        assert!(matched);

        let kinds: Vec<EntryKind> = engine.logs().read(id).await.unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::Received, EntryKind::TriggerMatched, EntryKind::Sent]);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_match_returns_false_and_logs_nothing() {
        let w = sms_workflow("demo", "immediate", "Thanks!");
        let id = w.id;
        let (engine, _) = engine(vec![w]);

        let matched = engine
            .process_inbound("+15550000000", "hello", Channel::Sms)
            .await
            .unwrap();
        assert!(!matched);
        assert!(engine.logs().read(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_sender_fails_only_that_pair() {
        let w = sms_workflow("demo", "immediate", "Thanks!");
        let id = w.id;
        let (engine, transport) = engine(vec![w]);

        let report = engine
            .handle_event(InboundEvent::new("5551234567", "demo", Channel::Sms))
            .await
            .unwrap();

        assert!(report.matched());
        assert!(matches!(report.outcome_for(id), Some(PairOutcome::Failed { .. })));
        assert!(transport.sent.lock().unwrap().is_empty());

        let entries = engine.logs().read(id).await.unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.kind, EntryKind::Failed);
        assert_eq!(last.direction, Some(Direction::Outgoing));
        assert!(last.is_error());
    }

    #[tokio::test]
    async fn personalizes_from_matching_contact() {
        let w = sms_workflow("demo", "now", "Hi {{name}}, see you at {{appointment_time}}")
            .with_contacts(vec![
                Contact::named("Jo")
                    .with_phone("+15551234567")
                    .with_field("appointment_time", "3pm"),
            ]);
        let id = w.id;
        let (engine, transport) = engine(vec![w]);

        engine
            .process_inbound("+15551234567", "demo", Channel::Sms)
            .await
            .unwrap();

        assert_eq!(transport.sent.lock().unwrap()[0].1, "Hi Jo, see you at 3pm");
        let sent = engine.logs().read(id).await.unwrap().pop().unwrap();
        assert_eq!(sent.original_content.as_deref(), Some("Hi {{name}}, see you at {{appointment_time}}"));
        assert_eq!(sent.personalized_content.as_deref(), Some("Hi Jo, see you at 3pm"));
        assert_eq!(sent.provider_response.as_deref(), Some("fake:msg-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_send_is_scheduled_then_cancellable() {
        let w = sms_workflow("demo", "5 minutes", "Later!");
        let id = w.id;
        let (engine, transport) = engine(vec![w]);

        let report = engine
            .handle_event(InboundEvent::new("+15551234567", "demo", Channel::Sms))
            .await
            .unwrap();
        assert!(matches!(
            report.outcome_for(id),
            Some(PairOutcome::Scheduled { delay_ms: 300_000, .. })
        ));

        assert_eq!(engine.cancel_scheduled(id).await, 1);
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert!(transport.sent.lock().unwrap().is_empty());
        let kinds: Vec<EntryKind> = engine.logs().read(id).await.unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Received,
                EntryKind::TriggerMatched,
                EntryKind::Scheduled,
                EntryKind::Cancelled
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_ticket_after_fire_is_noop() {
        let w = sms_workflow("demo", "1 s", "Soon");
        let id = w.id;
        let (engine, transport) = engine(vec![w]);

        let report = engine
            .handle_event(InboundEvent::new("+15551234567", "demo", Channel::Sms))
            .await
            .unwrap();
        let Some(PairOutcome::Scheduled { ticket, .. }) = report.outcome_for(id).cloned() else {
            panic!("expected a scheduled outcome");
        };

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
        assert!(!engine.cancel_ticket(ticket).await);
    }
}
