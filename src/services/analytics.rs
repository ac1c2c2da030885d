//! Analytics aggregates over CRM data, cached per tenant.
//!
//! Each aggregate is computed from a fresh upstream fetch on a cache miss
//! and served from the cache for its TTL afterwards. The 7-day revenue
//! window is anchored on the injected clock, never on wall-clock reads
//! inside the aggregation itself.

use crate::bitrix::{CrmApi, Deal, Lead, TaskItem};
use crate::cache;
use crate::clock::SharedClock;
use crate::credentials::TokenStore;
use crate::error::ApiError;
use crate::kv::KvStore;
use chrono::{Duration as ChronoDuration, NaiveDate};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Days covered by the revenue-by-date window, including today.
const REVENUE_WINDOW_DAYS: i64 = 7;

/// Bucket for leads the provider returned without a status.
const STATUS_UNKNOWN: &str = "UNKNOWN";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadStats {
    #[serde(rename = "leadByStatus")]
    pub lead_by_status: BTreeMap<String, u64>,
    #[serde(rename = "totalLeads")]
    pub total_leads: u64,
    #[serde(rename = "convertedLeads")]
    pub converted_leads: u64,
    #[serde(rename = "conversionRate")]
    pub conversion_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealStats {
    #[serde(rename = "totalRevenue")]
    pub total_revenue: f64,
    #[serde(rename = "revenueByDate")]
    pub revenue_by_date: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    #[serde(rename = "totalTasks")]
    pub total_tasks: u64,
    #[serde(rename = "tasksByStatus")]
    pub tasks_by_status: BTreeMap<String, u64>,
}

pub struct AnalyticsService {
    kv: Arc<dyn KvStore>,
    tokens: Arc<TokenStore>,
    crm: Arc<dyn CrmApi>,
    clock: SharedClock,
}

impl AnalyticsService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        tokens: Arc<TokenStore>,
        crm: Arc<dyn CrmApi>,
        clock: SharedClock,
    ) -> Self {
        Self {
            kv,
            tokens,
            crm,
            clock,
        }
    }

    async fn resolve_access(&self, member_id: &str) -> Result<(String, String), ApiError> {
        let token = self
            .tokens
            .get_access_token(member_id)
            .await?
            .ok_or_else(|| {
                ApiError::Unauthorized(format!("No live token for member '{}'", member_id))
            })?;
        let domain = self.tokens.get_domain(member_id).await?;
        Ok((token, domain))
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.kv.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key = %key, "Analytics cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Corrupt cached aggregate, recomputing");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, recomputing");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(serialized) => {
                if let Err(e) = self
                    .kv
                    .set_ex(key, &serialized, cache::ANALYTICS_TTL)
                    .await
                {
                    warn!(key = %key, error = %e, "Failed to cache aggregate");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize aggregate"),
        }
    }

    /// Lead funnel breakdown, computed from one batched leads+deals fetch.
    pub async fn lead_stats(&self, member_id: &str) -> Result<LeadStats, ApiError> {
        let key = cache::resource_key(member_id, "analytics:leads");
        if let Some(cached) = self.cached(&key).await {
            return Ok(cached);
        }

        let (token, domain) = self.resolve_access(member_id).await?;
        let (leads, deals) = self.crm.leads_and_deals(&domain, &token).await?;

        let stats = compute_lead_stats(&leads, &deals);
        self.store(&key, &stats).await;
        Ok(stats)
    }

    /// Revenue totals plus a zero-filled 7-day window ending today.
    pub async fn deal_stats(&self, member_id: &str) -> Result<DealStats, ApiError> {
        let key = cache::resource_key(member_id, "analytics:deals");
        if let Some(cached) = self.cached(&key).await {
            return Ok(cached);
        }

        let (token, domain) = self.resolve_access(member_id).await?;
        let deals = self.crm.list_deals(&domain, &token).await?;

        let stats = compute_deal_stats(&deals, self.clock.now().date_naive());
        self.store(&key, &stats).await;
        Ok(stats)
    }

    pub async fn task_stats(&self, member_id: &str) -> Result<TaskStats, ApiError> {
        let key = cache::resource_key(member_id, "analytics:tasks");
        if let Some(cached) = self.cached(&key).await {
            return Ok(cached);
        }

        let (token, domain) = self.resolve_access(member_id).await?;
        let tasks = self.crm.list_tasks(&domain, &token).await?;

        let stats = compute_task_stats(&tasks);
        self.store(&key, &stats).await;
        Ok(stats)
    }
}

/// Converted leads are counted from deals carrying a lead reference, not by
/// scanning lead statuses.
fn compute_lead_stats(leads: &[Lead], deals: &[Deal]) -> LeadStats {
    let mut lead_by_status: BTreeMap<String, u64> = BTreeMap::new();
    for lead in leads {
        let status = lead.status_id.as_deref().unwrap_or(STATUS_UNKNOWN);
        *lead_by_status.entry(status.to_string()).or_insert(0) += 1;
    }

    let total_leads = leads.len() as u64;
    let converted_leads = deals.iter().filter(|deal| deal.lead_id.is_some()).count() as u64;
    let conversion_rate = if total_leads == 0 {
        0.0
    } else {
        converted_leads as f64 / total_leads as f64
    };

    LeadStats {
        lead_by_status,
        total_leads,
        converted_leads,
        conversion_rate,
    }
}

fn compute_deal_stats(deals: &[Deal], today: NaiveDate) -> DealStats {
    let mut revenue_by_date: BTreeMap<String, f64> = BTreeMap::new();
    for offset in (0..REVENUE_WINDOW_DAYS).rev() {
        let date = today - ChronoDuration::days(offset);
        revenue_by_date.insert(date.format("%Y-%m-%d").to_string(), 0.0);
    }

    let mut total_revenue = 0.0;
    for deal in deals {
        let amount = deal
            .opportunity
            .as_deref()
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0);
        total_revenue += amount;

        // CLOSEDATE arrives as a full timestamp; the date part keys the
        // window. A value with no 10-byte date prefix on a char boundary
        // can never match a bucket and only counts toward the total.
        if let Some(day) = deal.closedate.as_deref().and_then(|d| d.get(..10)) {
            if let Some(bucket) = revenue_by_date.get_mut(day) {
                *bucket += amount;
            }
        }
    }

    DealStats {
        total_revenue,
        revenue_by_date,
    }
}

fn compute_task_stats(tasks: &[TaskItem]) -> TaskStats {
    let mut tasks_by_status: BTreeMap<String, u64> = BTreeMap::new();
    for task in tasks {
        let status = task.status.as_deref().unwrap_or(STATUS_UNKNOWN);
        *tasks_by_status.entry(status.to_string()).or_insert(0) += 1;
    }
    TaskStats {
        total_tasks: tasks.len() as u64,
        tasks_by_status,
    }
}
