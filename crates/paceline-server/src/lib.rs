pub mod routes;
pub mod state;
pub mod storage;
pub mod webhook;

use std::net::SocketAddr;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use paceline_lifecycle::shutdown::Listener;
use state::AppState;

/// Build the axum Router with the health surface and middleware.
/// Used by [`ServiceHandle::start`] and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A running HTTP service: bound listener, serve task, and the
/// graceful-shutdown handle used to drain it.
pub struct ServiceHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServiceHandle {
    /// Bind the listener and move into serving mode. A bind failure is the
    /// caller's only fatal boot condition; everything after the bind runs on
    /// a spawned task.
    pub async fn start(addr: &str, state: AppState) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let local_addr = listener.local_addr()?;

        let app = build_router(state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(%local_addr, "paceline listening");
        Ok(Self {
            local_addr,
            shutdown_tx,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolve when the serve task stops on its own (listener error or an
    /// external drain). Used by the host to propagate the server's result as
    /// its own exit status.
    pub async fn stopped(&mut self) -> anyhow::Result<()> {
        match (&mut self.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err).context("server error"),
            Err(err) => Err(anyhow::anyhow!("serve task aborted: {err}")),
        }
    }
}

impl Listener for ServiceHandle {
    /// Stop accepting new connections and resolve once in-flight requests
    /// have completed, via axum's graceful shutdown.
    async fn drain(self) -> anyhow::Result<()> {
        let _ = self.shutdown_tx.send(());
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err).context("error while closing connections"),
            Err(err) => Err(anyhow::anyhow!("serve task aborted: {err}")),
        }
    }
}
