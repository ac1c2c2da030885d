//! Fire-and-forget domain events emitted after CRM mutations.
//!
//! Publishing never blocks and never fails: if nobody is subscribed the
//! event is dropped, which is the intended fire-and-forget semantics.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LeadAction {
    Created,
    Updated,
    Deleted,
}

/// Describes one committed CRM mutation for asynchronous consumers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DomainEvent {
    pub action: LeadAction,
    pub entity_id: i64,
    pub member_id: String,
    pub domain: String,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: DomainEvent) {
        debug!(
            action = ?event.action,
            entity_id = event.entity_id,
            member_id = %event.member_id,
            "Domain event"
        );
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}
