//! Cache key construction and TTL policy for the read-through cache.
//!
//! One canonical scheme: `crm:{member_id}:{resource}` plus a SHA-256 hash of
//! the filter parameters for parameterized reads. Writes invalidate by the
//! tenant prefix, so every key for a tenant must start with `tenant_prefix`.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Analytics aggregates
pub const ANALYTICS_TTL: Duration = Duration::from_secs(900);

/// Lead list pages
pub const LEADS_TTL: Duration = Duration::from_secs(600);

/// Prefix shared by every cache entry for one tenant; the unit of
/// invalidation after a write.
pub fn tenant_prefix(member_id: &str) -> String {
    format!("crm:{}:", member_id)
}

/// Key for an unparameterized resource, e.g. `analytics:leads`.
pub fn resource_key(member_id: &str, resource: &str) -> String {
    format!("{}{}", tenant_prefix(member_id), resource)
}

/// Key for a parameterized lead-list read. The hash covers exactly the
/// filter fields `{find,status,source,date,sort}`; page and limit are
/// appended in clear so each page is its own entry.
pub fn leads_key(member_id: &str, filters: &impl Serialize, page: u32, limit: u32) -> String {
    format!(
        "{}leads:{}:{}:{}",
        tenant_prefix(member_id),
        filter_hash(filters),
        page,
        limit
    )
}

/// Stable SHA-256 hash of the serialized filter struct.
///
/// Field order is fixed by the struct definition, so identical filters
/// always produce identical JSON and therefore identical hashes.
pub fn filter_hash(filters: &impl Serialize) -> String {
    let json = serde_json::to_string(filters).unwrap_or_default();
    let digest = Sha256::digest(json.as_bytes());
    hex::encode(&digest[..16])
}
