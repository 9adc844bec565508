//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the axum Router with the application as fallback handler
//! - Wire up middleware (request ID, tracing, timeout, body limit, throttle)
//! - Bind to a listener and serve with graceful shutdown
//! - Purge expired cache entries while serving

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::App;
use crate::cache::{self, Cache};
use crate::security::throttle::{throttle_middleware, Throttle};

/// HTTP front end for an [`App`].
#[derive(Debug)]
pub struct HttpServer {
    router: Router,
    app: App,
    cache: Arc<dyn Cache>,
}

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

impl HttpServer {
    /// `cache` backs the throttle counters.
    pub fn new(app: App, cache: Arc<dyn Cache>) -> Self {
        let throttle = Throttle::new(cache.clone(), app.config_handle());
        let router = Self::build_router(app.clone(), throttle);
        Self { router, app, cache }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(app: App, throttle: Throttle) -> Router {
        let config = app.config();
        Router::new()
            .fallback(app_handler)
            .with_state(app)
            .layer(middleware::from_fn_with_state(throttle, throttle_middleware))
            .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, app = %self.app.config().app.name, "HTTP server starting");

        let purge = cache::spawn_purge(self.cache.clone(), PURGE_INTERVAL);
        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, service)
            .with_graceful_shutdown(shutdown)
            .await;
        purge.abort();
        served?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn app_handler(State(app): State<App>, request: Request) -> Response {
    app.handle(request).await
}
