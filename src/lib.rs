// OAuth token lifecycle and encrypted storage
pub mod credentials;
pub mod oauth;
pub mod session;

// Shared key-value store (Redis in production, in-memory in tests)
pub mod kv;

// Bitrix24 REST client and outbound pacing
pub mod bitrix;
pub mod rate_limit;

// Cache-aside read/write services
pub mod cache;
pub mod services;

// Webhooks and background jobs
pub mod jobs;
pub mod queue;
pub mod webhook;

// HTTP API
pub mod api;

// Cross-cutting
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
