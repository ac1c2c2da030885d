//! Inbound CRM webhook handling.
//!
//! Validates the shared secret, classifies the event, enqueues a background
//! job, and appends an audit record. The dispatcher answers synchronously and
//! never blocks on job execution.

mod log;

pub use log::{WebhookLogEntry, WebhookLogStore};

use crate::clock::SharedClock;
use crate::error::ApiError;
use crate::queue::{Job, JobQueue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lead event constants the CRM sends
const EVENT_LEAD_ADD: &str = "ONCRMLEADADD";
const EVENT_LEAD_UPDATE: &str = "ONCRMLEADUPDATE";

/// Lead status marking a conversion
const STATUS_CONVERTED: &str = "CONVERTED";

/// Inbound webhook payload (the CRM's shape, validated on read)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
    #[serde(default)]
    pub auth: Option<WebhookAuth>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookData {
    #[serde(rename = "FIELDS", default)]
    pub fields: Option<LeadSnapshot>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebhookAuth {
    #[serde(default)]
    pub member_id: Option<String>,
}

/// Snapshot of the lead the event is about. The CRM sends ids as either
/// numbers or strings depending on the event source.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LeadSnapshot {
    #[serde(rename = "ID", default)]
    pub id: Option<Value>,
    #[serde(rename = "TITLE", default)]
    pub title: Option<String>,
    #[serde(rename = "STATUS_ID", default)]
    pub status_id: Option<String>,
}

impl LeadSnapshot {
    fn id_string(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Synchronous acknowledgment returned for every authenticated event
#[derive(Serialize)]
pub struct Ack {
    pub status: &'static str,
}

pub struct WebhookDispatcher {
    shared_secret: Option<String>,
    queue: Arc<dyn JobQueue>,
    audit_log: Arc<WebhookLogStore>,
    clock: SharedClock,
}

impl WebhookDispatcher {
    pub fn new(
        shared_secret: Option<String>,
        queue: Arc<dyn JobQueue>,
        audit_log: Arc<WebhookLogStore>,
        clock: SharedClock,
    ) -> Self {
        Self {
            shared_secret,
            queue,
            audit_log,
            clock,
        }
    }

    /// True iff a secret is configured and exactly equals `candidate`.
    /// An unset secret rejects every candidate.
    pub fn validate_token(&self, candidate: &str) -> bool {
        match &self.shared_secret {
            Some(secret) => secret == candidate,
            None => false,
        }
    }

    /// Classifies an authenticated event and enqueues the matching job.
    ///
    /// Returns `{status:"accepted"}` for every authenticated event,
    /// including ones that enqueue nothing.
    pub async fn handle_event(
        &self,
        payload: WebhookPayload,
        token: &str,
    ) -> Result<Ack, ApiError> {
        if !self.validate_token(token) {
            return Err(ApiError::Unauthorized(
                "Invalid webhook token".to_string(),
            ));
        }

        let member_id = payload
            .auth
            .as_ref()
            .and_then(|auth| auth.member_id.clone());

        if let Some(job) = classify(&payload, member_id.as_deref()) {
            self.queue.enqueue(job)?;
        }

        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| ApiError::Internal(format!("Failed to serialize payload: {}", e)))?;
        self.audit_log.append(
            &payload.event,
            &payload_json,
            member_id.as_deref().unwrap_or(""),
            self.clock.now(),
        )?;

        info!(event = %payload.event, member_id = ?member_id, "Webhook accepted");
        Ok(Ack { status: "accepted" })
    }
}

/// Maps an event onto the job it should enqueue, or `None` for a no-op.
fn classify(payload: &WebhookPayload, member_id: Option<&str>) -> Option<Job> {
    let snapshot = payload.data.as_ref().and_then(|data| data.fields.as_ref());

    let Some(member_id) = member_id else {
        warn!(event = %payload.event, "Webhook without member id, nothing enqueued");
        return None;
    };

    match payload.event.to_ascii_uppercase().as_str() {
        EVENT_LEAD_ADD => Some(Job::CreateFollowUpTask {
            member_id: member_id.to_string(),
            lead_id: snapshot.and_then(LeadSnapshot::id_string),
            lead_title: snapshot.and_then(|s| s.title.clone()),
        }),
        EVENT_LEAD_UPDATE => {
            let status = snapshot.and_then(|s| s.status_id.as_deref());
            if status == Some(STATUS_CONVERTED) {
                Some(Job::CreateDeal {
                    member_id: member_id.to_string(),
                    lead_id: snapshot.and_then(LeadSnapshot::id_string),
                    lead_title: snapshot.and_then(|s| s.title.clone()),
                })
            } else {
                debug!(status = ?status, "Lead update is not a conversion, no-op");
                None
            }
        }
        _ => {
            debug!(event = %payload.event, "Unhandled webhook event, no-op");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::queue::MemoryQueue;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn dispatcher(secret: Option<&str>) -> (WebhookDispatcher, UnboundedReceiver<Job>) {
        let (queue, rx) = MemoryQueue::channel();
        let log = Arc::new(WebhookLogStore::open_in_memory().unwrap());
        let clock = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap(),
        ));
        (
            WebhookDispatcher::new(secret.map(String::from), Arc::new(queue), log, clock),
            rx,
        )
    }

    fn payload(event: &str, status_id: &str) -> WebhookPayload {
        serde_json::from_value(json!({
            "event": event,
            "data": { "FIELDS": { "ID": 7, "TITLE": "Big lead", "STATUS_ID": status_id } },
            "auth": { "member_id": "m1" },
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_token_exact_match_only() {
        let (dispatcher, _rx) = dispatcher(Some("s3cret"));
        assert!(dispatcher.validate_token("s3cret"));
        assert!(!dispatcher.validate_token("S3CRET"));
        assert!(!dispatcher.validate_token(""));
    }

    #[test]
    fn test_validate_token_false_when_secret_unset() {
        let (dispatcher, _rx) = dispatcher(None);
        assert!(!dispatcher.validate_token("anything"));
        assert!(!dispatcher.validate_token(""));
    }

    #[tokio::test]
    async fn test_invalid_token_is_authorization_error() {
        let (dispatcher, mut rx) = dispatcher(Some("s3cret"));
        let result = dispatcher
            .handle_event(payload("ONCRMLEADADD", "NEW"), "wrong")
            .await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_lead_add_enqueues_follow_up_task() {
        let (dispatcher, mut rx) = dispatcher(Some("s3cret"));
        let ack = dispatcher
            .handle_event(payload("ONCRMLEADADD", "NEW"), "s3cret")
            .await
            .unwrap();
        assert_eq!(ack.status, "accepted");

        match rx.try_recv().unwrap() {
            Job::CreateFollowUpTask {
                member_id,
                lead_id,
                lead_title,
            } => {
                assert_eq!(member_id, "m1");
                assert_eq!(lead_id.as_deref(), Some("7"));
                assert_eq!(lead_title.as_deref(), Some("Big lead"));
            }
            other => panic!("Unexpected job: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_converted_lead_update_enqueues_exactly_one_deal_job() {
        let (dispatcher, mut rx) = dispatcher(Some("s3cret"));
        let ack = dispatcher
            .handle_event(payload("ONCRMLEADUPDATE", "CONVERTED"), "s3cret")
            .await
            .unwrap();
        assert_eq!(ack.status, "accepted");

        assert!(matches!(rx.try_recv().unwrap(), Job::CreateDeal { .. }));
        assert!(rx.try_recv().is_err(), "exactly one job expected");
    }

    #[tokio::test]
    async fn test_non_converted_update_is_accepted_noop() {
        let (dispatcher, mut rx) = dispatcher(Some("s3cret"));
        let ack = dispatcher
            .handle_event(payload("ONCRMLEADUPDATE", "NEW"), "s3cret")
            .await
            .unwrap();
        assert_eq!(ack.status, "accepted");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_event_is_accepted_noop() {
        let (dispatcher, mut rx) = dispatcher(Some("s3cret"));
        let ack = dispatcher
            .handle_event(payload("ONCRMDEALDELETE", "NEW"), "s3cret")
            .await
            .unwrap();
        assert_eq!(ack.status, "accepted");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_member_id_is_accepted_without_job() {
        let (dispatcher, mut rx) = dispatcher(Some("s3cret"));
        let payload: WebhookPayload = serde_json::from_value(json!({
            "event": "ONCRMLEADADD",
            "data": { "FIELDS": { "ID": "7" } },
        }))
        .unwrap();
        let ack = dispatcher.handle_event(payload, "s3cret").await.unwrap();
        assert_eq!(ack.status, "accepted");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_accepted_event_is_audited() {
        let (dispatcher, _rx) = dispatcher(Some("s3cret"));
        dispatcher
            .handle_event(payload("ONCRMLEADADD", "NEW"), "s3cret")
            .await
            .unwrap();

        let entries = dispatcher.audit_log.list(Some("m1"), 1, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "ONCRMLEADADD");
    }
}
