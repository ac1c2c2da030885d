//! Background job worker.
//!
//! Drains the job queue and performs the dependent CRM writes. Each job
//! resolves a fresh token and domain, since jobs may run long after the
//! webhook that produced them. Failures are logged and dropped.

use crate::bitrix::CrmApi;
use crate::clock::SharedClock;
use crate::credentials::TokenStore;
use crate::error::ApiError;
use crate::queue::Job;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

#[derive(Clone)]
pub struct JobContext {
    pub tokens: Arc<TokenStore>,
    pub crm: Arc<dyn CrmApi>,
    pub clock: SharedClock,
}

/// Runs until the queue side is dropped.
pub async fn run_worker(mut rx: UnboundedReceiver<Job>, ctx: JobContext) {
    info!("Job worker started");
    while let Some(job) = rx.recv().await {
        if let Err(e) = handle_job(&ctx, &job).await {
            warn!(error = %e, job = ?job, "Background job failed");
        }
    }
    info!("Job worker stopped");
}

/// Time-derived pick over the user list. Not a persisted round-robin
/// cursor: two jobs in the same second land on the same user.
pub fn round_robin_index(now: DateTime<Utc>, len: usize) -> usize {
    debug_assert!(len > 0);
    (now.timestamp().unsigned_abs() as usize) % len
}

async fn handle_job(ctx: &JobContext, job: &Job) -> Result<(), ApiError> {
    match job {
        Job::CreateFollowUpTask {
            member_id,
            lead_id,
            lead_title,
        } => {
            let (token, domain) = resolve_access(ctx, member_id).await?;

            let users = ctx.crm.list_users(&domain, &token).await?;
            if users.is_empty() {
                warn!(member_id = %member_id, "No users to assign follow-up task");
                return Ok(());
            }
            let responsible = &users[round_robin_index(ctx.clock.now(), users.len())];

            let title = match lead_title {
                Some(title) => format!("Follow up lead: {}", title),
                None => format!("Follow up lead #{}", lead_id.as_deref().unwrap_or("?")),
            };
            let task_id = ctx
                .crm
                .add_task(&domain, &token, &title, &responsible.id)
                .await?;

            info!(
                member_id = %member_id,
                task_id = task_id,
                responsible_id = %responsible.id,
                "Follow-up task created"
            );
            Ok(())
        }
        Job::CreateDeal {
            member_id,
            lead_id,
            lead_title,
        } => {
            let (token, domain) = resolve_access(ctx, member_id).await?;

            let title = match lead_title {
                Some(title) => format!("Deal from lead: {}", title),
                None => format!("Deal from lead #{}", lead_id.as_deref().unwrap_or("?")),
            };
            let deal_id = ctx
                .crm
                .add_deal(&domain, &token, &title, lead_id.as_deref())
                .await?;

            info!(member_id = %member_id, deal_id = deal_id, "Deal created from converted lead");
            Ok(())
        }
    }
}

async fn resolve_access(ctx: &JobContext, member_id: &str) -> Result<(String, String), ApiError> {
    let token = ctx
        .tokens
        .get_access_token(member_id)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized(format!("No live token for member '{}'", member_id))
        })?;
    let domain = ctx.tokens.get_domain(member_id).await?;
    Ok((token, domain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_robin_index_is_time_derived() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap();
        let idx = round_robin_index(t0, 5);
        assert_eq!(idx, (t0.timestamp() as usize) % 5);

        // One second later moves to the next user
        let t1 = t0 + chrono::Duration::seconds(1);
        assert_eq!(round_robin_index(t1, 5), (idx + 1) % 5);
    }

    #[test]
    fn test_round_robin_index_in_bounds() {
        let now = Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap();
        for len in 1..10 {
            assert!(round_robin_index(now, len) < len);
        }
    }
}
