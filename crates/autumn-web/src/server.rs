//! ---
//! autumn_section: "04-web"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "HTTP service exposing the monitor endpoint and application routes."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use autumn_service::{Inject, Injector, Service};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::settings::HttpSettings;

/// Path answered with `200` while the server is up.
pub const PING_PATH: &str = "/monitor/ping";

/// Application routes mounted under the configured context path.
#[derive(Clone, Default)]
pub struct WebRoutes(pub Router);

struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

/// Serves [`PING_PATH`] and any bound [`WebRoutes`] on the configured port.
pub struct HttpService {
    settings: Arc<HttpSettings>,
    routes: Option<Arc<WebRoutes>>,
    server: Mutex<Option<RunningServer>>,
}

impl HttpService {
    pub fn new(settings: HttpSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            routes: None,
            server: Mutex::new(None),
        }
    }

    pub fn with_routes(mut self, routes: WebRoutes) -> Self {
        self.routes = Some(Arc::new(routes));
        self
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Address actually bound, once started. Useful when the port is `0`.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.server.lock().await.as_ref().map(|server| server.addr)
    }

    fn router(&self) -> Router {
        let monitor = Router::new().route(PING_PATH, get(ping));
        let router = match &self.routes {
            Some(routes) if self.settings.is_root_context() => monitor.merge(routes.0.clone()),
            Some(routes) => monitor.nest(&self.settings.context_path, routes.0.clone()),
            None => monitor,
        };
        router
            .fallback(invalid_request)
            .layer(TraceLayer::new_for_http())
    }
}

impl Inject for HttpService {
    fn inject(injector: &Injector) -> Result<Self> {
        let settings = injector.get::<HttpSettings>()?;
        debug!(
            port = settings.port,
            context_path = %settings.context_path,
            "instantiating http service"
        );
        Ok(Self {
            settings,
            routes: injector.try_get::<WebRoutes>(),
            server: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &str {
        "http"
    }

    async fn start(&self) -> Result<()> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            warn!("http service already started");
            return Ok(());
        }

        let requested = self.settings.socket_addr();
        let listener = StdTcpListener::bind(requested)
            .with_context(|| format!("failed to bind http listener {requested}"))?;
        listener
            .set_nonblocking(true)
            .context("failed to configure http listener as non-blocking")?;
        let addr = listener
            .local_addr()
            .context("failed to read http listener address")?;
        let tcp_listener =
            TcpListener::from_std(listener).context("failed to create tokio listener")?;

        let router = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task: JoinHandle<Result<()>> = tokio::spawn(async move {
            if let Err(err) = axum::serve(tcp_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(address = %addr, error = %err, "http server exited with error");
                return Err(err.into());
            }
            Ok(())
        });

        info!(address = %addr, context_path = %self.settings.context_path, "http service listening");
        *server = Some(RunningServer {
            addr,
            shutdown: Some(shutdown_tx),
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(mut running) = self.server.lock().await.take() else {
            debug!("http service already stopped");
            return Ok(());
        };
        if let Some(tx) = running.shutdown.take() {
            let _ = tx.send(());
        }
        running.task.await.context("http server task panicked")??;
        info!(address = %running.addr, "http service stopped");
        Ok(())
    }
}

async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::OK, "200")
}

async fn invalid_request() -> StatusCode {
    StatusCode::NOT_FOUND
}
