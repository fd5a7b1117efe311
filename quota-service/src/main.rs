mod config;
mod http;
mod state;

use std::collections::HashMap;
use std::sync::Arc;

use quota_core::{
    Clock, Dispatcher, FixedWindowAlgorithm, RateLimitAlgorithm, SlidingWindowAlgorithm,
    SystemClock, TokenBucketAlgorithm,
};
use quota_core::config::LimitConfig;
use quota_core::store::Store;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogFormat, StoreBackend};
use crate::state::{AppState, DEFAULT_TIER};

fn build_algorithms<S>(store: Arc<S>, config: LimitConfig, clock: Arc<dyn Clock>) -> Vec<Arc<dyn RateLimitAlgorithm>>
where
    S: Store + 'static,
{
    vec![
        Arc::new(TokenBucketAlgorithm::new(store.clone(), config, clock.clone())),
        Arc::new(FixedWindowAlgorithm::new(store.clone(), config, clock.clone())),
        Arc::new(SlidingWindowAlgorithm::new(store, config, clock)),
    ]
}

fn init_tracing(cfg: &crate::config::ObservabilityConfig) {
    let filter = EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match cfg.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

/// Builds one `Dispatcher` (three algorithms sharing one store) per
/// configured limit tier — `"default"` plus every name under
/// `limits.tiers` — so `/v1/check` etc. can select a tier the same way
/// they select an algorithm (spec §6 "limits (default + named tiers)").
/// All tiers share one store instance; `AppState::storage_key` folds the
/// tier name into the key so tiers never pool counters for the same
/// `(identifier, resource)` pair.
async fn build_dispatchers(
    app_config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<(HashMap<String, Arc<Dispatcher>>, Arc<dyn Store>)> {
    let mut tiers: HashMap<String, LimitConfig> = HashMap::new();
    tiers.insert(DEFAULT_TIER.to_string(), app_config.limits.resolve(None).to_limit_config()?);
    for name in app_config.limits.tiers.keys() {
        tiers.insert(name.clone(), app_config.limits.resolve(Some(name)).to_limit_config()?);
    }

    let ttl = std::time::Duration::from_secs(app_config.store.ttl_seconds);
    let mut dispatchers = HashMap::new();
    let store: Arc<dyn Store> = match app_config.store.backend {
        StoreBackend::Local => {
            let store = Arc::new(quota_core::store::LocalStore::with_ttl(ttl));
            for (name, limit) in &tiers {
                let algorithms = build_algorithms(store.clone(), *limit, clock.clone());
                dispatchers.insert(name.clone(), Arc::new(Dispatcher::new(algorithms, app_config.algorithm.default.clone())?));
            }
            store
        }
        StoreBackend::Shared => {
            let redis_url = app_config
                .store
                .redis_url
                .as_deref()
                .expect("validated at config load");
            let store = Arc::new(quota_redis::SharedStore::connect_with_ttl(redis_url, ttl).await?);
            for (name, limit) in &tiers {
                let algorithms = build_algorithms(store.clone(), *limit, clock.clone());
                dispatchers.insert(name.clone(), Arc::new(Dispatcher::new(algorithms, app_config.algorithm.default.clone())?));
            }
            store
        }
    };

    Ok((dispatchers, store))
}

/// Waits for SIGINT/SIGTERM so `axum::serve`'s graceful shutdown can drain
/// in-flight requests before `main` calls `Store::close` (spec §4.1
/// `close` "releases external handles" — for `LocalStore` this joins the
/// eviction task, spec §9 "Background eviction").
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("QUOTA_CONFIG").ok();
    let app_config = AppConfig::load(config_path.as_deref())?;

    init_tracing(&app_config.observability);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (dispatchers, store) = build_dispatchers(&app_config, clock).await?;
    let state = AppState::new(dispatchers);

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "quota-service listening");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down, releasing store handles");
    store.close().await?;
    Ok(())
}
