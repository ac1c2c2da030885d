use anyhow::{Context, Result};
use b24_bridge::api::{create_app, AppState};
use b24_bridge::bitrix::BitrixClient;
use b24_bridge::clock::SystemClock;
use b24_bridge::config::Config;
use b24_bridge::credentials::TokenStore;
use b24_bridge::events::EventBus;
use b24_bridge::jobs::{run_worker, JobContext};
use b24_bridge::kv::{KvStore, RedisKv};
use b24_bridge::oauth::{OAuthFlow, ProviderConfig, StateStore};
use b24_bridge::queue::MemoryQueue;
use b24_bridge::rate_limit::Pacer;
use b24_bridge::services::{AnalyticsService, LeadService};
use b24_bridge::session::SessionStore;
use b24_bridge::webhook::{WebhookDispatcher, WebhookLogStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "b24_bridge=info".into()),
        )
        .init();

    info!("Bridge starting...");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        oauth_url = %config.bitrix_oauth_url,
        "Configuration loaded"
    );

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisKv::connect(&config.redis_url)
            .await
            .context("Failed to connect to the cache store")?,
    );
    info!("Cache store connected");

    let tokens = Arc::new(
        TokenStore::new(kv.clone(), &config.encryption_key)
            .context("Failed to initialize token store")?,
    );
    let sessions = Arc::new(SessionStore::new(kv.clone()));

    let provider = ProviderConfig {
        oauth_base_url: config.bitrix_oauth_url.clone(),
        client_id: config.bitrix_client_id.clone(),
        client_secret: config.bitrix_client_secret.clone(),
    };
    let oauth = Arc::new(OAuthFlow::new(
        provider,
        StateStore::new(kv.clone()),
        tokens.clone(),
        sessions.clone(),
    ));

    let pacer = Arc::new(Pacer::new(Duration::from_millis(
        config.min_call_interval_ms,
    )));
    let crm = Arc::new(BitrixClient::new(pacer));
    let clock = Arc::new(SystemClock);

    let events = EventBus::new(64);
    let leads = Arc::new(LeadService::new(
        kv.clone(),
        tokens.clone(),
        crm.clone(),
        events,
    ));
    let analytics = Arc::new(AnalyticsService::new(
        kv.clone(),
        tokens.clone(),
        crm.clone(),
        clock.clone(),
    ));

    let audit_log = Arc::new(
        WebhookLogStore::open(&config.webhook_db_path)
            .context("Failed to open webhook audit log")?,
    );
    info!(db_path = %config.webhook_db_path, "Webhook audit log ready");

    let (queue, job_rx) = MemoryQueue::channel();
    let worker = tokio::spawn(run_worker(
        job_rx,
        JobContext {
            tokens: tokens.clone(),
            crm,
            clock: clock.clone(),
        },
    ));

    let webhooks = Arc::new(WebhookDispatcher::new(
        config.webhook_secret.clone(),
        Arc::new(queue),
        audit_log.clone(),
        clock,
    ));

    let state = AppState {
        oauth,
        tokens,
        sessions,
        leads,
        analytics,
        webhooks,
        audit_log,
        client_base_url: config.client_base_url.clone(),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .context("Failed to bind API port")?;
    info!(port = config.port, "API listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    worker.abort();
    info!("Bridge stopped");

    Ok(())
}
