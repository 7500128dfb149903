//! In-process crossrank server bound to a loopback port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossrank::{Config, CrossEncoder, RerankService};
use crossrank_server::gateway::{HandlerState, create_router_with_state};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL: Duration = Duration::from_millis(25);

/// What to serve. The default is the lexical stand-in with a small cache.
#[derive(Debug, Clone)]
pub struct TestServerConfig {
    pub config: Config,
    pub encoder: Option<Arc<dyn CrossEncoder>>,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            config: Config {
                port: 0,
                cache_size: 64,
                request_timeout: Duration::from_secs(5),
                workers: 2,
                max_queue: 16,
                ..Config::default()
            },
            encoder: None,
        }
    }
}

impl TestServerConfig {
    pub fn with_encoder(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Starts a background model load as the binary does with `RERANKER_PRELOAD`.
    pub fn preload(mut self) -> Self {
        self.config.preload = true;
        self
    }
}

/// Running server; stops serving when shut down or dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    /// Same service the router uses, for inspecting cache and model state.
    pub service: RerankService,
    stop: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        self.stop_serving();
    }

    fn stop_serving(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop_serving();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("server did not answer /health within {0:?}")]
    NotReady(Duration),
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
    #[error("service construction failed: {0}")]
    Service(String),
}

/// Polls `GET /health` until it answers 200.
pub async fn wait_for_health(addr: SocketAddr) -> Result<(), ServerStartupError> {
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/health");
    let deadline = Instant::now() + READY_TIMEOUT;

    while Instant::now() < deadline {
        if let Ok(resp) = client.get(&url).send().await
            && resp.status().is_success()
        {
            return Ok(());
        }
        tokio::time::sleep(READY_POLL).await;
    }

    Err(ServerStartupError::NotReady(READY_TIMEOUT))
}

/// Builds the service, binds `127.0.0.1:{port}` (0 picks a free port) and
/// serves the production router until the returned handle goes away.
pub async fn spawn_test_server(setup: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let service = match setup.encoder {
        Some(encoder) => RerankService::with_encoder(&setup.config, encoder),
        None => RerankService::from_config(&setup.config),
    }
    .map_err(|e| ServerStartupError::Service(e.to_string()))?;
    let _ = service.start_preload();

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], setup.config.port))).await?;
    let addr = listener.local_addr()?;
    let app = create_router_with_state(HandlerState::new(service.clone()));

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stopped.await;
            })
            .await;
        if let Err(e) = served {
            panic!("test server failed: {e}");
        }
    });

    wait_for_health(addr).await?;

    Ok(TestServer {
        addr,
        service,
        stop: Some(stop),
        _task: task,
    })
}
