//! Bitrix24 REST client and boundary types.
//!
//! Upstream payloads are arbitrary JSON field bags; they are validated into
//! typed DTOs at this boundary and never threaded through business logic as
//! raw dictionaries.

mod client;
mod types;

pub use client::{BitrixClient, CrmApi};
pub use types::{BitrixUser, Deal, Lead, LeadFields, LeadFilters, LeadPage, TaskItem};
