//! Inbound matcher: which active workflows an event triggers.

use std::sync::Arc;

use tracing::debug;

use crate::error::DatabaseError;
use crate::pipeline::types::InboundEvent;
use crate::workflow::{Workflow, WorkflowRegistry};

/// Pure matching step: a workflow matches when it is active, listens on the
/// event's channel, and its keyword occurs anywhere in the normalized content.
pub fn match_workflows(event: &InboundEvent, workflows: Vec<Workflow>) -> Vec<Workflow> {
    let content = event.normalized_content();
    workflows
        .into_iter()
        .filter(|w| w.is_active())
        .filter(|w| w.trigger.listens_on(event.channel))
        .filter(|w| w.trigger.matches_content(&content))
        .collect()
}

pub struct InboundMatcher {
    registry: Arc<dyn WorkflowRegistry>,
}

impl InboundMatcher {
    pub fn new(registry: Arc<dyn WorkflowRegistry>) -> Self {
        Self { registry }
    }

    pub async fn find_matches(&self, event: &InboundEvent) -> Result<Vec<Workflow>, DatabaseError> {
        let active = self.registry.active_workflows().await?;
        let candidates = active.len();
        let matched = match_workflows(event, active);
        debug!(
            channel = %event.channel,
            candidates,
            matched = matched.len(),
            "Matched inbound event"
        );
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Action, Channel, ChannelMessage, InMemoryRegistry, Trigger};

    fn workflow(keyword: &str, channels: &[Channel]) -> Workflow {
        Workflow::new(
            keyword,
            Trigger::new(keyword, channels.iter().copied()),
            Action {
                delay: "immediate".into(),
                messages: vec![ChannelMessage::text(Channel::Sms, "hi")],
            },
        )
        .activated()
    }

    #[test]
    fn substring_match_ignores_case_and_whitespace() {
        let w = workflow("DEMO", &[Channel::Sms]);
        let event = InboundEvent::new("+15551234567", "  please send demo info ", Channel::Sms);
        assert_eq!(match_workflows(&event, vec![w.clone()]).len(), 1);

        let miss = InboundEvent::new("+15551234567", "dem o", Channel::Sms);
        assert!(match_workflows(&miss, vec![w]).is_empty());
    }

    #[test]
    fn channel_gating() {
        let w = workflow("demo", &[Channel::Sms]);
        let event = InboundEvent::new("+15551234567", "demo", Channel::Whatsapp);
        assert!(match_workflows(&event, vec![w]).is_empty());
    }

    #[test]
    fn drafts_never_match() {
        let mut w = workflow("demo", &[Channel::Sms]);
        w.status = crate::workflow::WorkflowStatus::Draft;
        let event = InboundEvent::new("+15551234567", "demo", Channel::Sms);
        assert!(match_workflows(&event, vec![w]).is_empty());
    }

    #[test]
    fn several_workflows_can_match() {
        let a = workflow("demo", &[Channel::Sms]);
        let b = workflow("info", &[Channel::Sms, Channel::Email]);
        let c = workflow("pricing", &[Channel::Sms]);
        let event = InboundEvent::new("+15551234567", "Demo info please", Channel::Sms);
        let matched = match_workflows(&event, vec![a, b, c]);
        assert_eq!(matched.len(), 2);
    }

    #[tokio::test]
    async fn find_matches_reads_registry() {
        let registry = Arc::new(InMemoryRegistry::with_workflows(vec![
            workflow("demo", &[Channel::Sms]),
            workflow("other", &[Channel::Sms]),
        ]));
        let matcher = InboundMatcher::new(registry);

        let event = InboundEvent::new("+15551234567", "I'd like a demo", Channel::Sms);
        let matched = matcher.find_matches(&event).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].trigger.keyword, "demo");
    }
}
