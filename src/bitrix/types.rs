//! Boundary DTOs for the Bitrix24 REST API.
//!
//! Upstream fields are UPPER_SNAKE string bags with most values optional;
//! every field the service relies on is declared explicitly here.

use serde::{Deserialize, Serialize};

/// CRM lead as returned by `crm.lead.list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lead {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "TITLE", default)]
    pub title: Option<String>,
    #[serde(rename = "STATUS_ID", default)]
    pub status_id: Option<String>,
    #[serde(rename = "SOURCE_ID", default)]
    pub source_id: Option<String>,
    #[serde(rename = "DATE_CREATE", default)]
    pub date_create: Option<String>,
}

/// CRM deal as returned by `crm.deal.list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deal {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "TITLE", default)]
    pub title: Option<String>,
    /// Present (non-null) only for deals converted from a lead
    #[serde(rename = "LEAD_ID", default)]
    pub lead_id: Option<String>,
    /// Revenue amount, serialized by the provider as a decimal string
    #[serde(rename = "OPPORTUNITY", default)]
    pub opportunity: Option<String>,
    #[serde(rename = "CLOSEDATE", default)]
    pub closedate: Option<String>,
}

/// Task as returned by `tasks.task.list` (lower-camel field names, unlike CRM).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "responsibleId", default)]
    pub responsible_id: Option<String>,
}

/// Portal user as returned by `user.get`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BitrixUser {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "NAME", default)]
    pub name: Option<String>,
    #[serde(rename = "LAST_NAME", default)]
    pub last_name: Option<String>,
}

/// One page of leads plus the provider-reported total.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    pub total: u64,
}

/// Filter parameters for lead-list reads. This exact set of fields feeds the
/// cache-key hash, so identical filters always key the same entry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LeadFilters {
    pub find: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
    pub sort: Option<String>,
}

/// Mutable lead fields. Deserialized from our API's camelCase bodies,
/// serialized out as the provider's UPPER_SNAKE field bag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeadFields {
    #[serde(
        rename(serialize = "TITLE", deserialize = "title"),
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub title: Option<String>,
    #[serde(
        rename(serialize = "NAME", deserialize = "name"),
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub name: Option<String>,
    #[serde(
        rename(serialize = "LAST_NAME", deserialize = "lastName"),
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub last_name: Option<String>,
    #[serde(
        rename(serialize = "STATUS_ID", deserialize = "statusId"),
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub status_id: Option<String>,
    #[serde(
        rename(serialize = "SOURCE_ID", deserialize = "sourceId"),
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub source_id: Option<String>,
    #[serde(
        rename(serialize = "OPPORTUNITY", deserialize = "opportunity"),
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub opportunity: Option<String>,
}
