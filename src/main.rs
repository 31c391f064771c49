use haven::authority::AuthorityClient;
use haven::config::CONFIG;
use haven::db::VaultStorage;
use haven::router::{HavenState, haven_router};
use haven::service::retention::RetentionSweeper;
use haven::service::throttle::{MarkPolicy, WriteThrottle};
use haven::service::validator::CredentialValidator;
use haven::service::vault::{QuotaSettings, VaultService};
use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        authority = %cfg.authority_url.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        loglevel = %cfg.loglevel,
        retention_days = cfg.retention_days,
    );

    let storage = VaultStorage::connect(&cfg.database_url, cfg.db_max_connections).await?;
    storage.init_schema().await?;

    let authority = cfg
        .authority_url
        .clone()
        .map(|url| AuthorityClient::new(url, cfg.authority_api_key.clone()));
    if authority.is_none() {
        info!("no authority configured; trusting locally stored credentials");
    }

    let validator = CredentialValidator::new(storage.clone(), authority, cfg.credential_ttl());
    let mark_policy = if cfg.throttle_mark_on_success {
        MarkPolicy::OnSuccess
    } else {
        MarkPolicy::Optimistic
    };
    let throttle = WriteThrottle::new(cfg.min_save_interval(), mark_policy);
    let vault = Arc::new(VaultService::new(
        storage.clone(),
        validator,
        throttle,
        QuotaSettings::from(cfg),
    ));

    RetentionSweeper::new(storage, cfg.retention_days, cfg.sweep_interval()).spawn();

    let state = HavenState::new(vault);
    let app = haven_router(state, cfg.body_limit_bytes());

    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
