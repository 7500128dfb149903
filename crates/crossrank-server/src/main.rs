//! crossrank HTTP server entrypoint.

use std::net::SocketAddr;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crossrank::{Config, RerankService};
use crossrank_server::gateway::{HandlerState, create_router_with_state};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_HEALTH_CHECK_PORT: u16 = 10000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        model = %config.model_name,
        preload = config.preload,
        "crossrank starting"
    );

    let service = RerankService::from_config(&config)?;

    if service.start_preload().is_none() {
        tracing::info!("Lazy model loading; the first rerank request loads the model");
    }

    let app = create_router_with_state(HandlerState::new(service.clone()));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(service))
        .await?;

    tracing::info!("crossrank shutdown complete");
    Ok(())
}

/// Probes `/health` on the local port. Returns the process exit code.
async fn run_health_check() -> i32 {
    let port = std::env::var("RERANKER_PORT")
        .ok()
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_HEALTH_CHECK_PORT);

    let url = format!("http://127.0.0.1:{}/health", port);

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(1))
        .build()
    {
        Ok(client) => client,
        Err(_) => return 1,
    };

    match client.get(&url).send().await {
        Ok(res) if res.status().is_success() => 0,
        _ => 1,
    }
}

/// Resolves on Ctrl+C or SIGTERM; axum then drains open connections.
async fn shutdown_signal(service: RerankService) {
    #[cfg(unix)]
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");

    #[cfg(unix)]
    let signal_name = tokio::select! {
        result = signal::ctrl_c() => {
            result.expect("failed to install Ctrl+C handler");
            "SIGINT"
        }
        _ = sigterm.recv() => "SIGTERM",
    };

    #[cfg(not(unix))]
    let signal_name = {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        "Ctrl+C"
    };

    tracing::info!(
        signal = signal_name,
        inflight = service.cache().inflight_count(),
        busy_workers = service.gateway().busy(),
        "Shutting down, draining in-flight requests"
    );
}
