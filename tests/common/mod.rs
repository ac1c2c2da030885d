#![allow(dead_code)]
// Shared test harness: in-memory stores, a stub CRM, and the full router.

use async_trait::async_trait;
use axum::Router;
use b24_bridge::api::{create_app, AppState};
use b24_bridge::bitrix::{
    BitrixUser, CrmApi, Deal, Lead, LeadFields, LeadFilters, LeadPage, TaskItem,
};
use b24_bridge::clock::FixedClock;
use b24_bridge::credentials::{TokenRecord, TokenStore};
use b24_bridge::error::ApiError;
use b24_bridge::events::EventBus;
use b24_bridge::kv::MemoryKv;
use b24_bridge::oauth::{OAuthFlow, ProviderConfig, StateStore};
use b24_bridge::queue::{Job, MemoryQueue};
use b24_bridge::services::{AnalyticsService, LeadService};
use b24_bridge::session::SessionStore;
use b24_bridge::webhook::{WebhookDispatcher, WebhookLogStore};
use chrono::{TimeZone, Utc};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const WEBHOOK_SECRET: &str = "s3cret";
pub const ENCRYPTION_KEY: &str = "abababababababababababababababababababababababababababababababab";

/// Canned CRM with call counters for cache assertions.
pub struct StubCrm {
    pub leads: Vec<Lead>,
    pub deals: Vec<Deal>,
    pub tasks: Vec<TaskItem>,
    pub list_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl StubCrm {
    pub fn new(leads: Vec<Lead>, deals: Vec<Deal>, tasks: Vec<TaskItem>) -> Self {
        Self {
            leads,
            deals,
            tasks,
            list_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![], vec![], vec![])
    }
}

pub fn lead(id: &str, status: &str) -> Lead {
    Lead {
        id: id.to_string(),
        title: Some(format!("Lead {}", id)),
        status_id: Some(status.to_string()),
        source_id: None,
        date_create: None,
    }
}

pub fn deal(lead_id: Option<&str>, opportunity: &str) -> Deal {
    Deal {
        id: "1".to_string(),
        title: None,
        lead_id: lead_id.map(String::from),
        opportunity: Some(opportunity.to_string()),
        closedate: None,
    }
}

#[async_trait]
impl CrmApi for StubCrm {
    async fn list_leads(
        &self,
        _domain: &str,
        _token: &str,
        _filters: &LeadFilters,
        _page: u32,
        _limit: u32,
    ) -> Result<LeadPage, ApiError> {
        self.list_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(LeadPage {
            leads: self.leads.clone(),
            total: self.leads.len() as u64,
        })
    }

    async fn leads_and_deals(
        &self,
        _domain: &str,
        _token: &str,
    ) -> Result<(Vec<Lead>, Vec<Deal>), ApiError> {
        self.batch_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok((self.leads.clone(), self.deals.clone()))
    }

    async fn list_deals(&self, _domain: &str, _token: &str) -> Result<Vec<Deal>, ApiError> {
        Ok(self.deals.clone())
    }

    async fn list_tasks(&self, _domain: &str, _token: &str) -> Result<Vec<TaskItem>, ApiError> {
        Ok(self.tasks.clone())
    }

    async fn list_users(&self, _domain: &str, _token: &str) -> Result<Vec<BitrixUser>, ApiError> {
        Ok(vec![
            BitrixUser {
                id: "1".into(),
                name: Some("Ada".into()),
                last_name: None,
            },
            BitrixUser {
                id: "2".into(),
                name: Some("Grace".into()),
                last_name: None,
            },
        ])
    }

    async fn add_lead(
        &self,
        _domain: &str,
        _token: &str,
        _fields: &LeadFields,
    ) -> Result<i64, ApiError> {
        Ok(101)
    }

    async fn update_lead(
        &self,
        _domain: &str,
        _token: &str,
        _id: i64,
        _fields: &LeadFields,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn delete_lead(&self, _domain: &str, _token: &str, _id: i64) -> Result<(), ApiError> {
        Ok(())
    }

    async fn add_deal(
        &self,
        _domain: &str,
        _token: &str,
        _title: &str,
        _lead_id: Option<&str>,
    ) -> Result<i64, ApiError> {
        Ok(201)
    }

    async fn add_task(
        &self,
        _domain: &str,
        _token: &str,
        _title: &str,
        _responsible_id: &str,
    ) -> Result<i64, ApiError> {
        Ok(301)
    }
}

pub struct TestApp {
    pub app: Router,
    pub crm: Arc<StubCrm>,
    pub tokens: Arc<TokenStore>,
    pub sessions: Arc<SessionStore>,
    pub job_rx: UnboundedReceiver<Job>,
}

/// Full application over in-memory stores, with a token record seeded for
/// tenant "m1".
pub async fn test_app(crm: StubCrm) -> TestApp {
    let kv = Arc::new(MemoryKv::new());
    let tokens = Arc::new(TokenStore::new(kv.clone(), ENCRYPTION_KEY).unwrap());
    tokens
        .save_token(
            "m1",
            &TokenRecord {
                access_token: "live-token".into(),
                refresh_token: "refresh".into(),
                expires_in: 3600,
                domain: "acme.bitrix24.com".into(),
            },
        )
        .await
        .unwrap();

    let sessions = Arc::new(SessionStore::new(kv.clone()));
    let oauth = Arc::new(OAuthFlow::new(
        ProviderConfig {
            oauth_base_url: "https://oauth.bitrix.info".into(),
            client_id: "local.test".into(),
            client_secret: "secret".into(),
        },
        StateStore::new(kv.clone()),
        tokens.clone(),
        sessions.clone(),
    ));

    let crm = Arc::new(crm);
    let clock = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 8, 23, 12, 0, 0).unwrap(),
    ));

    let leads = Arc::new(LeadService::new(
        kv.clone(),
        tokens.clone(),
        crm.clone(),
        EventBus::new(16),
    ));
    let analytics = Arc::new(AnalyticsService::new(
        kv.clone(),
        tokens.clone(),
        crm.clone(),
        clock.clone(),
    ));

    let audit_log = Arc::new(WebhookLogStore::open_in_memory().unwrap());
    let (queue, job_rx) = MemoryQueue::channel();
    let webhooks = Arc::new(WebhookDispatcher::new(
        Some(WEBHOOK_SECRET.to_string()),
        Arc::new(queue),
        audit_log.clone(),
        clock,
    ));

    let app = create_app(AppState {
        oauth,
        tokens: tokens.clone(),
        sessions: sessions.clone(),
        leads,
        analytics,
        webhooks,
        audit_log,
        client_base_url: "http://localhost:5173".into(),
    });

    TestApp {
        app,
        crm,
        tokens,
        sessions,
        job_rx,
    }
}
