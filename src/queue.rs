//! Background job queue seam.
//!
//! The broker is an external collaborator; this is its interface boundary.
//! The in-process implementation hands jobs to a tokio worker task, so the
//! dispatcher never blocks on job execution.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Jobs produced by the webhook dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Job {
    /// A lead was added: create a follow-up task assigned round-robin
    CreateFollowUpTask {
        member_id: String,
        lead_id: Option<String>,
        lead_title: Option<String>,
    },
    /// A lead converted: create the corresponding deal
    CreateDeal {
        member_id: String,
        lead_id: Option<String>,
        lead_title: Option<String>,
    },
}

pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: Job) -> Result<(), ApiError>;
}

/// In-process queue backed by an unbounded tokio channel.
pub struct MemoryQueue {
    tx: UnboundedSender<Job>,
}

impl MemoryQueue {
    /// Returns the queue handle plus the receiving end for the worker.
    pub fn channel() -> (Self, UnboundedReceiver<Job>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

impl JobQueue for MemoryQueue {
    fn enqueue(&self, job: Job) -> Result<(), ApiError> {
        self.tx
            .send(job)
            .map_err(|_| ApiError::Internal("Job queue is closed".to_string()))
    }
}
