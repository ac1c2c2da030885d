//! HTTP client for the Bitrix24 REST API.
//!
//! Every call is paced through a shared minimum-spacing limiter, carries the
//! tenant's bearer token, and checks the provider's structured error shape
//! (`{error, error_description}`). An upstream error is never coerced into
//! an empty success result.

use crate::bitrix::types::{BitrixUser, Deal, Lead, LeadFields, LeadFilters, LeadPage, TaskItem};
use crate::error::ApiError;
use crate::rate_limit::Pacer;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Operations the read/write services and background jobs need from the CRM.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn list_leads(
        &self,
        domain: &str,
        token: &str,
        filters: &LeadFilters,
        page: u32,
        limit: u32,
    ) -> Result<LeadPage, ApiError>;

    /// Batched multi-command call fetching leads and deals in one request.
    async fn leads_and_deals(
        &self,
        domain: &str,
        token: &str,
    ) -> Result<(Vec<Lead>, Vec<Deal>), ApiError>;

    async fn list_deals(&self, domain: &str, token: &str) -> Result<Vec<Deal>, ApiError>;

    async fn list_tasks(&self, domain: &str, token: &str) -> Result<Vec<TaskItem>, ApiError>;

    async fn list_users(&self, domain: &str, token: &str) -> Result<Vec<BitrixUser>, ApiError>;

    async fn add_lead(
        &self,
        domain: &str,
        token: &str,
        fields: &LeadFields,
    ) -> Result<i64, ApiError>;

    async fn update_lead(
        &self,
        domain: &str,
        token: &str,
        id: i64,
        fields: &LeadFields,
    ) -> Result<(), ApiError>;

    async fn delete_lead(&self, domain: &str, token: &str, id: i64) -> Result<(), ApiError>;

    async fn add_deal(
        &self,
        domain: &str,
        token: &str,
        title: &str,
        lead_id: Option<&str>,
    ) -> Result<i64, ApiError>;

    async fn add_task(
        &self,
        domain: &str,
        token: &str,
        title: &str,
        responsible_id: &str,
    ) -> Result<i64, ApiError>;
}

pub struct BitrixClient {
    http_client: Client,
    pacer: Arc<Pacer>,
    /// Overrides `https://{domain}` (for tests against a mock server)
    base_url_override: Option<String>,
}

impl BitrixClient {
    pub fn new(pacer: Arc<Pacer>) -> Self {
        let http_client = Client::builder()
            .user_agent("b24-bridge/0.1")
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http_client,
            pacer,
            base_url_override: None,
        }
    }

    /// Create a client routing every call to a fixed base URL instead of the
    /// tenant portal (for tests with a mock server).
    pub fn with_base_url(pacer: Arc<Pacer>, base_url: String) -> Self {
        let mut client = Self::new(pacer);
        client.base_url_override = Some(base_url);
        client
    }

    fn base_url(&self, domain: &str) -> String {
        match &self.base_url_override {
            Some(base) => base.clone(),
            None => format!("https://{}", domain),
        }
    }

    /// One REST method call. Returns the `result` member of the envelope.
    async fn call(
        &self,
        domain: &str,
        token: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, ApiError> {
        self.pacer.acquire().await;

        let url = format!("{}/rest/{}.json", self.base_url(domain), method);
        debug!(method = %method, domain = %domain, "CRM call");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&params)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("CRM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Upstream(format!(
                "CRM returned {} for {}: {}",
                status, method, body
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Malformed CRM response: {}", e)))?;

        check_envelope(method, envelope)
    }
}

/// Rejects the provider's structured error shape and envelopes with no
/// `result` member.
fn check_envelope(method: &str, envelope: Value) -> Result<Value, ApiError> {
    if let Some(error) = envelope.get("error").and_then(Value::as_str) {
        let description = envelope
            .get("error_description")
            .and_then(Value::as_str)
            .unwrap_or("no description");
        return Err(ApiError::Upstream(format!(
            "CRM error for {}: {} - {}",
            method, error, description
        )));
    }

    match envelope.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(ApiError::Upstream(format!(
            "CRM response for {} has no result member",
            method
        ))),
    }
}

/// Builds the `crm.lead.list` filter bag from our query parameters.
fn lead_list_params(filters: &LeadFilters, page: u32, limit: u32) -> Value {
    let mut filter = serde_json::Map::new();
    if let Some(find) = &filters.find {
        filter.insert("%TITLE".to_string(), json!(find));
    }
    if let Some(status) = &filters.status {
        filter.insert("STATUS_ID".to_string(), json!(status));
    }
    if let Some(source) = &filters.source {
        filter.insert("SOURCE_ID".to_string(), json!(source));
    }
    if let Some(date) = &filters.date {
        filter.insert(">=DATE_CREATE".to_string(), json!(date));
    }

    let order_field = filters.sort.as_deref().unwrap_or("DATE_CREATE");
    // page * limit can exceed u32; widen before multiplying
    let start = u64::from(page.saturating_sub(1)) * u64::from(limit);

    json!({
        "filter": filter,
        "order": { order_field: "DESC" },
        "select": ["ID", "TITLE", "STATUS_ID", "SOURCE_ID", "DATE_CREATE"],
        "start": start,
    })
}

fn parse_list<T: serde::de::DeserializeOwned>(
    method: &str,
    value: Value,
) -> Result<Vec<T>, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Upstream(format!("Unexpected {} result shape: {}", method, e)))
}

fn parse_id(method: &str, value: &Value) -> Result<i64, ApiError> {
    // Numeric ids sometimes arrive as strings
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| {
            ApiError::Upstream(format!("Expected an entity id from {}, got {}", method, value))
        })
}

#[async_trait]
impl CrmApi for BitrixClient {
    async fn list_leads(
        &self,
        domain: &str,
        token: &str,
        filters: &LeadFilters,
        page: u32,
        limit: u32,
    ) -> Result<LeadPage, ApiError> {
        // crm.lead.list reports the overall total next to the result page,
        // so fetch the envelope pieces in one call
        self.pacer.acquire().await;
        let url = format!("{}/rest/crm.lead.list.json", self.base_url(domain));
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&lead_list_params(filters, page, limit))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("CRM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ApiError::Upstream(format!(
                "CRM returned {} for crm.lead.list",
                status
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Malformed CRM response: {}", e)))?;

        let total = envelope.get("total").and_then(Value::as_u64).unwrap_or(0);
        let result = check_envelope("crm.lead.list", envelope)?;
        let leads: Vec<Lead> = parse_list("crm.lead.list", result)?;

        Ok(LeadPage { leads, total })
    }

    async fn leads_and_deals(
        &self,
        domain: &str,
        token: &str,
    ) -> Result<(Vec<Lead>, Vec<Deal>), ApiError> {
        let result = self
            .call(
                domain,
                token,
                "batch",
                json!({
                    "halt": 0,
                    "cmd": {
                        "leads": "crm.lead.list?select[]=ID&select[]=STATUS_ID",
                        "deals": "crm.deal.list?select[]=ID&select[]=LEAD_ID&select[]=OPPORTUNITY&select[]=CLOSEDATE",
                    }
                }),
            )
            .await?;

        let inner = result.get("result").cloned().unwrap_or(Value::Null);
        let leads = parse_list(
            "batch/leads",
            inner.get("leads").cloned().unwrap_or(json!([])),
        )?;
        let deals = parse_list(
            "batch/deals",
            inner.get("deals").cloned().unwrap_or(json!([])),
        )?;
        Ok((leads, deals))
    }

    async fn list_deals(&self, domain: &str, token: &str) -> Result<Vec<Deal>, ApiError> {
        let result = self
            .call(
                domain,
                token,
                "crm.deal.list",
                json!({
                    "select": ["ID", "TITLE", "LEAD_ID", "OPPORTUNITY", "CLOSEDATE"],
                }),
            )
            .await?;
        parse_list("crm.deal.list", result)
    }

    async fn list_tasks(&self, domain: &str, token: &str) -> Result<Vec<TaskItem>, ApiError> {
        let result = self
            .call(
                domain,
                token,
                "tasks.task.list",
                json!({ "select": ["ID", "TITLE", "STATUS", "RESPONSIBLE_ID"] }),
            )
            .await?;
        // tasks.task.list nests its items under result.tasks
        let tasks = result.get("tasks").cloned().unwrap_or(json!([]));
        parse_list("tasks.task.list", tasks)
    }

    async fn list_users(&self, domain: &str, token: &str) -> Result<Vec<BitrixUser>, ApiError> {
        let result = self
            .call(domain, token, "user.get", json!({ "ACTIVE": true }))
            .await?;
        parse_list("user.get", result)
    }

    async fn add_lead(
        &self,
        domain: &str,
        token: &str,
        fields: &LeadFields,
    ) -> Result<i64, ApiError> {
        let result = self
            .call(
                domain,
                token,
                "crm.lead.add",
                json!({ "fields": fields }),
            )
            .await?;
        parse_id("crm.lead.add", &result)
    }

    async fn update_lead(
        &self,
        domain: &str,
        token: &str,
        id: i64,
        fields: &LeadFields,
    ) -> Result<(), ApiError> {
        self.call(
            domain,
            token,
            "crm.lead.update",
            json!({ "id": id, "fields": fields }),
        )
        .await?;
        Ok(())
    }

    async fn delete_lead(&self, domain: &str, token: &str, id: i64) -> Result<(), ApiError> {
        self.call(domain, token, "crm.lead.delete", json!({ "id": id }))
            .await?;
        Ok(())
    }

    async fn add_deal(
        &self,
        domain: &str,
        token: &str,
        title: &str,
        lead_id: Option<&str>,
    ) -> Result<i64, ApiError> {
        let mut fields = serde_json::Map::new();
        fields.insert("TITLE".to_string(), json!(title));
        if let Some(lead_id) = lead_id {
            fields.insert("LEAD_ID".to_string(), json!(lead_id));
        }

        let result = self
            .call(domain, token, "crm.deal.add", json!({ "fields": fields }))
            .await?;
        parse_id("crm.deal.add", &result)
    }

    async fn add_task(
        &self,
        domain: &str,
        token: &str,
        title: &str,
        responsible_id: &str,
    ) -> Result<i64, ApiError> {
        let result = self
            .call(
                domain,
                token,
                "tasks.task.add",
                json!({ "fields": { "TITLE": title, "RESPONSIBLE_ID": responsible_id } }),
            )
            .await?;
        // tasks.task.add nests the created task under result.task
        let id_value = result
            .get("task")
            .and_then(|task| task.get("id"))
            .cloned()
            .unwrap_or(result);
        parse_id("tasks.task.add", &id_value)
    }
}
