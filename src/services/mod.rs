//! Cache-aside read services and write-through mutation services.

mod analytics;
mod leads;

pub use analytics::{AnalyticsService, DealStats, LeadStats, TaskStats};
pub use leads::{LeadService, LeadsQuery};
