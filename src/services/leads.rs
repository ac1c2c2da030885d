//! Lead reads and writes.
//!
//! Reads are cache-aside: hit serves the cached page, miss fetches from the
//! CRM and caches the page for its TTL. Writes go straight to the CRM and
//! then drop every cached entry for the tenant, so the next read re-fetches.

use crate::bitrix::{CrmApi, LeadFields, LeadFilters, LeadPage};
use crate::cache;
use crate::credentials::TokenStore;
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus, LeadAction};
use crate::kv::KvStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

/// Query parameters accepted by the lead-list endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LeadsQuery {
    pub find: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl LeadsQuery {
    /// Splits into the filter set that feeds the cache-key hash and the
    /// pagination pair appended in clear.
    pub fn into_parts(self) -> (LeadFilters, u32, u32) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIMIT)
            .min(MAX_LIMIT);
        let filters = LeadFilters {
            find: self.find,
            status: self.status,
            source: self.source,
            date: self.date,
            sort: self.sort,
        };
        (filters, page, limit)
    }
}

pub struct LeadService {
    kv: Arc<dyn KvStore>,
    tokens: Arc<TokenStore>,
    crm: Arc<dyn CrmApi>,
    events: EventBus,
}

impl LeadService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        tokens: Arc<TokenStore>,
        crm: Arc<dyn CrmApi>,
        events: EventBus,
    ) -> Self {
        Self {
            kv,
            tokens,
            crm,
            events,
        }
    }

    /// Cache-aside lead list. A cached page is served without touching the
    /// CRM; a corrupt cached value is treated as a miss. The access token is
    /// the one the guard resolved for this request.
    pub async fn get_leads(
        &self,
        member_id: &str,
        access_token: &str,
        filters: &LeadFilters,
        page: u32,
        limit: u32,
    ) -> Result<LeadPage, ApiError> {
        let key = cache::leads_key(member_id, filters, page, limit);

        match self.kv.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<LeadPage>(&cached) {
                Ok(page) => {
                    debug!(member_id = %member_id, key = %key, "Lead cache hit");
                    return Ok(page);
                }
                Err(e) => warn!(key = %key, error = %e, "Corrupt cached lead page, refetching"),
            },
            Ok(None) => debug!(member_id = %member_id, key = %key, "Lead cache miss"),
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, falling through to CRM"),
        }

        let domain = self.tokens.get_domain(member_id).await?;
        let result = self
            .crm
            .list_leads(&domain, access_token, filters, page, limit)
            .await?;

        // A failed cache write must not fail a successful read
        match serde_json::to_string(&result) {
            Ok(serialized) => {
                if let Err(e) = self.kv.set_ex(&key, &serialized, cache::LEADS_TTL).await {
                    warn!(key = %key, error = %e, "Failed to cache lead page");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize lead page for cache"),
        }

        Ok(result)
    }

    pub async fn create_lead(
        &self,
        member_id: &str,
        access_token: &str,
        fields: &LeadFields,
    ) -> Result<i64, ApiError> {
        let domain = self.tokens.get_domain(member_id).await?;
        let id = self.crm.add_lead(&domain, access_token, fields).await?;

        self.invalidate(member_id).await;
        self.events.publish(DomainEvent {
            action: LeadAction::Created,
            entity_id: id,
            member_id: member_id.to_string(),
            domain,
        });
        info!(member_id = %member_id, lead_id = id, "Lead created");
        Ok(id)
    }

    pub async fn update_lead(
        &self,
        member_id: &str,
        access_token: &str,
        id: i64,
        fields: &LeadFields,
    ) -> Result<(), ApiError> {
        let domain = self.tokens.get_domain(member_id).await?;
        self.crm.update_lead(&domain, access_token, id, fields).await?;

        self.invalidate(member_id).await;
        self.events.publish(DomainEvent {
            action: LeadAction::Updated,
            entity_id: id,
            member_id: member_id.to_string(),
            domain,
        });
        info!(member_id = %member_id, lead_id = id, "Lead updated");
        Ok(())
    }

    pub async fn delete_lead(
        &self,
        member_id: &str,
        access_token: &str,
        id: i64,
    ) -> Result<(), ApiError> {
        let domain = self.tokens.get_domain(member_id).await?;
        self.crm.delete_lead(&domain, access_token, id).await?;

        self.invalidate(member_id).await;
        self.events.publish(DomainEvent {
            action: LeadAction::Deleted,
            entity_id: id,
            member_id: member_id.to_string(),
            domain,
        });
        info!(member_id = %member_id, lead_id = id, "Lead deleted");
        Ok(())
    }

    /// Drops every cached entry for the tenant. The CRM write already
    /// committed, so a failed invalidation is logged, not propagated; the
    /// stale entries age out on their own TTLs.
    async fn invalidate(&self, member_id: &str) {
        match self.kv.delete_prefix(&cache::tenant_prefix(member_id)).await {
            Ok(dropped) => {
                debug!(member_id = %member_id, dropped = dropped, "Invalidated tenant cache")
            }
            Err(e) => warn!(member_id = %member_id, error = %e, "Cache invalidation failed"),
        }
    }
}
