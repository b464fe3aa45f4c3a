use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livecast_api::{build_router, state::AppState};
use livecast_config::{Environment, Settings};
use livecast_db::{connect, indexes::ensure_indexes};
use livecast_services::dao::SessionsDao;
use livecast_services::eventbus::{self, RedisBus};
use livecast_services::rtc::{PortsAllocator, WebRtcConfig};
use livecast_services::transcoder::NatsTranscoder;
use livecast_services::{Metrics, SessionsManager};

/// How long shutdown may spend draining rooms after the listener stopped.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = Environment::from_env();

    // Initialize tracing; APP_ENV picks the default level.
    let default_filter = format!(
        "livecast_api={level},livecast_services={level},livecast_db={level},tower_http=info",
        level = env.default_log_filter()
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!(
        env = env.as_str(),
        "Starting Livecast API on {}:{}", settings.app.hostname, settings.app.port
    );

    // Connect to MongoDB and ensure indexes
    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    // Event bus and transcoder gateway
    let bus = Arc::new(RedisBus::connect(&settings.redis.connection_url()).await?);
    let transcoder = Arc::new(NatsTranscoder::connect(&settings.nats.addr).await?);

    // Metrics registry, initialized once and passed down explicitly
    let registry = Registry::new();
    let metrics = Metrics::new(&registry)?;

    // Session routing plane
    let allocator = Arc::new(PortsAllocator::new(
        settings.rtc.udp_port_range_start,
        settings.rtc.udp_port_range_end,
    ));
    let manager = SessionsManager::new(
        WebRtcConfig::new(&settings.rtc),
        &settings.app.streams_root_dir,
        Arc::new(SessionsDao::new(&db)),
        bus.clone(),
        transcoder,
        allocator,
        metrics.clone(),
    );

    let mut router = eventbus::Router::new(bus.clone(), manager.clone());
    router.start().await?;

    // HTTP surface
    let state = AppState::new(db, settings.clone(), bus, metrics, registry);
    let app = build_router(state);

    let addr = format!("{}:{}", settings.app.hostname, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop routing new RPCs, then close every room within the drain window.
    router.stop().await;
    if tokio::time::timeout(SHUTDOWN_DRAIN, manager.close())
        .await
        .is_err()
    {
        warn!("drain window elapsed before all rooms closed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
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
    info!("shutdown signal received");
}
