//! Request lifecycle orchestration.
//!
//! # States
//! ```text
//! Init ──dispatch + contract──▶ RouteResolved ──init()/action──▶ Dispatched
//!   │                                                              │
//!   │ not found / contract                                         ├─▶ Completed
//!   └──────────────────────────▶ ExceptionHandled ◀── runtime ─────┘
//!
//! every branch ──▶ Finalized (drop guard)
//! ```
//!
//! # Design Decisions
//! - Completion is an explicit `Result<Outcome, Failure>`; an early
//!   response from `init()` is an ordinary return value
//! - Panics in hooks, listeners or actions are caught and handled as
//!   runtime failures
//! - Finalization lives in `Drop`, so it also runs if the request future is
//!   cancelled (client gone, timeout)
//! - Runtime settings are read from an `ArcSwap` once per request

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;

use crate::app::error::Failure;
use crate::app::error_page::ErrorPages;
use crate::app::hooks::{Application, DefaultApplication};
use crate::config::AppConfig;
use crate::controller::{ControllerRegistry, Outcome};
use crate::event::{
    EventBus, APP_END, APP_ERROR, APP_START, FRAMEWORK_END, FRAMEWORK_START, ROUTE_AFTER,
    ROUTE_BEFORE, ROUTE_HANDLER, ROUTE_NOT_FOUND,
};
use crate::http::request::{Request, RequestError};
use crate::http::response::{Response, SendContext};
use crate::observability::metrics;
use crate::routing::{Dispatcher, PatternError, RouteMatch, RouteTable, RouteTableBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    RouteResolved,
    Dispatched,
    Completed,
    ExceptionHandled,
    Finalized,
}

/// What the end-of-request hooks and events receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub id: String,
    pub method: Method,
    pub uri: String,
    /// Status sent to the client; `None` if the request never got that far.
    pub status: Option<StatusCode>,
    pub state: LifecycleState,
    pub elapsed: Duration,
}

/// Builder for [`App`].
pub struct AppBuilder {
    config: Arc<ArcSwap<AppConfig>>,
    routes: RouteTableBuilder,
    registry: ControllerRegistry,
    hooks: Arc<dyn Application>,
    events: Arc<EventBus>,
}

impl AppBuilder {
    /// Register routes.
    pub fn routes(mut self, register: impl FnOnce(&mut RouteTableBuilder)) -> Self {
        register(&mut self.routes);
        self
    }

    /// Register controllers and their actions.
    pub fn controllers(mut self, register: impl FnOnce(&mut ControllerRegistry)) -> Self {
        register(&mut self.registry);
        self
    }

    pub fn hooks(mut self, hooks: impl Application) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Use an existing event bus (e.g. with listeners already attached).
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Compile the routes and freeze everything.
    pub fn build(mut self) -> Result<App, PatternError> {
        let config = self.config.load_full();
        self.routes.convention_route(config.routing.default_route);
        let table = Arc::new(self.routes.build()?);

        tracing::info!(
            routes = table.len(),
            controllers = self.registry.len(),
            convention_route = config.routing.default_route,
            "Application built"
        );

        Ok(App {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(table, config.routing.strip_prefixes.clone()),
                registry: self.registry,
                hooks: self.hooks,
                events: self.events,
                error_pages: ErrorPages::load(&config.error_pages),
                config: self.config,
            }),
        })
    }
}

struct Inner {
    dispatcher: Dispatcher,
    registry: ControllerRegistry,
    hooks: Arc<dyn Application>,
    events: Arc<EventBus>,
    error_pages: ErrorPages,
    config: Arc<ArcSwap<AppConfig>>,
}

/// The request lifecycle orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct App {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("dispatcher", &self.inner.dispatcher)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl App {
    pub fn builder(config: AppConfig) -> AppBuilder {
        Self::builder_shared(Arc::new(ArcSwap::from_pointee(config)))
    }

    /// Builder over a configuration that is swapped on reload.
    pub fn builder_shared(config: Arc<ArcSwap<AppConfig>>) -> AppBuilder {
        AppBuilder {
            config,
            routes: RouteTable::builder(),
            registry: ControllerRegistry::new(),
            hooks: Arc::new(DefaultApplication),
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.inner.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Current runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.inner.config.load_full()
    }

    /// Shared handle to the runtime configuration.
    pub fn config_handle(&self) -> Arc<ArcSwap<AppConfig>> {
        self.inner.config.clone()
    }

    /// Swap in a reloaded configuration. Routes and error templates stay
    /// as built.
    pub fn update_config(&self, config: AppConfig) {
        self.inner.config.store(Arc::new(config));
        tracing::info!("Runtime configuration updated");
    }

    /// Handle a raw HTTP request.
    pub async fn handle(&self, request: axum::extract::Request) -> axum::response::Response {
        let limit = self.inner.config.load().server.max_body_bytes;
        match Request::from_http(request, limit).await {
            Ok(request) => self.respond(request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting unreadable request");
                let status = match e {
                    RequestError::Body(_) => StatusCode::PAYLOAD_TOO_LARGE,
                    RequestError::Multipart(_) => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string()).into_response()
            }
        }
    }

    /// Run the full lifecycle for a parsed request.
    pub async fn respond(&self, mut request: Request) -> axum::response::Response {
        let started = Instant::now();
        let config = self.inner.config.load_full();
        let mut guard = Finalizer::new(self.inner.clone(), &request, &config, started);

        let result = catch_unwind(AssertUnwindSafe(|| self.process(&mut request, &mut guard)))
            .unwrap_or_else(|panic| Err(Failure::Runtime(panic_error(panic))));

        let response = match result {
            Ok(outcome) => {
                guard.transition(LifecycleState::Completed);
                if matches!(outcome, Outcome::Early(_)) {
                    tracing::debug!(request_id = %request.id(), "Controller init returned early");
                }
                outcome.into_response()
            }
            Err(failure) => {
                guard.transition(LifecycleState::ExceptionHandled);
                metrics::record_dispatch(failure.kind());
                self.failure_response(&failure, &request, &config)
            }
        };

        let completed = guard.state == LifecycleState::Completed;
        let sent = self.send(response, &request, &config, started).await;
        guard.summary.status = Some(sent.status());

        if completed {
            let summary = guard.summary();
            let hooks = AssertUnwindSafe(|| {
                self.inner.hooks.on_app_end(&summary);
                self.inner.events.trigger(APP_END, &mut summary.clone());
            });
            if catch_unwind(hooks).is_err() {
                tracing::error!(request_id = %request.id(), "Panic in app.end handlers");
            }
        }
        sent
    }

    fn process(&self, request: &mut Request, guard: &mut Finalizer) -> Result<Outcome, Failure> {
        let inner = &self.inner;

        inner.hooks.on_framework_start(request);
        inner.events.trigger(FRAMEWORK_START, &mut *request);

        let mut uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        inner.events.trigger(ROUTE_BEFORE, &mut uri);

        let mut resolved: Option<RouteMatch> = None;
        let mut not_found = None;
        match inner.dispatcher.dispatch(&uri, request.method()) {
            Ok(found) => resolved = Some(found),
            Err(e) => not_found = Some(e),
        }
        inner.events.trigger(ROUTE_AFTER, &mut resolved);

        let mut route = match (resolved, not_found) {
            (Some(route), _) => route,
            (None, Some(e)) => return Err(e.into()),
            (None, None) => {
                return Err(crate::routing::RouteNotFound {
                    method: request.method().clone(),
                    uri,
                }
                .into())
            }
        };

        inner.hooks.on_route(&mut route);
        inner.events.trigger(ROUTE_HANDLER, &mut route);

        let bound = inner.registry.validate(&route.target)?;
        guard.transition(LifecycleState::RouteResolved);
        metrics::record_dispatch("matched");
        tracing::debug!(
            request_id = %request.id(),
            target = %route.target,
            controller = bound.controller_type(),
            "Route resolved"
        );

        request.set_route(route.clone());
        inner.hooks.on_app_start(request);
        inner.events.trigger(APP_START, &mut *request);

        guard.transition(LifecycleState::Dispatched);
        let outcome = bound.invoke(request)??;
        Ok(outcome)
    }

    fn failure_response(&self, failure: &Failure, request: &Request, config: &AppConfig) -> Response {
        let inner = &self.inner;
        let uri = request.uri().to_string();

        let custom = catch_unwind(AssertUnwindSafe(|| match failure {
            Failure::RouteNotFound(_) | Failure::Contract(_) => {
                tracing::warn!(
                    request_id = %request.id(),
                    uri = %uri,
                    kind = failure.kind(),
                    error = %failure,
                    "Route not found"
                );
                let response = inner.hooks.on_route_not_found(failure.target(), &uri);
                inner.events.trigger(ROUTE_NOT_FOUND, &mut failure.target().cloned());
                response
            }
            Failure::Runtime(e) => {
                tracing::error!(
                    request_id = %request.id(),
                    uri = %uri,
                    error = ?e,
                    "Application runtime error"
                );
                let response = inner.hooks.on_application_error(e, &uri);
                inner.events.trigger(APP_ERROR, &mut e.to_string());
                response
            }
        }))
        .unwrap_or_else(|_| {
            tracing::error!(request_id = %request.id(), "Panic in error handlers");
            None
        });

        custom.unwrap_or_else(|| inner.error_pages.render(failure, config.app.debug))
    }

    async fn send(
        &self,
        response: Response,
        request: &Request,
        config: &AppConfig,
        started: Instant,
    ) -> axum::response::Response {
        let ctx = SendContext {
            request,
            events: &self.inner.events,
            powered_by: &config.app.name,
            debug: config.app.debug,
            started,
        };

        let kind = response.payload().kind();
        match response.send(&ctx).await {
            Ok(sent) => {
                tracing::debug!(request_id = %request.id(), kind, "Response sent");
                sent
            }
            Err(e) => {
                tracing::error!(request_id = %request.id(), error = %e, kind, "Response send failed");
                let failure = Failure::Runtime(anyhow::Error::new(e));
                let page = self.inner.error_pages.render(&failure, config.app.debug);
                match page.send(&ctx).await {
                    Ok(sent) => sent,
                    Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                }
            }
        }
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> anyhow::Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow::anyhow!("panic: {message}")
}

/// Runs the end-of-request hooks when the request scope ends.
struct Finalizer {
    inner: Arc<Inner>,
    summary: RequestSummary,
    state: LifecycleState,
    started: Instant,
    slow_threshold: Duration,
}

impl Finalizer {
    fn new(inner: Arc<Inner>, request: &Request, config: &AppConfig, started: Instant) -> Self {
        tracing::debug!(request_id = %request.id(), "App start");
        Self {
            inner,
            summary: RequestSummary {
                id: request.id().to_string(),
                method: request.method().clone(),
                uri: request.uri().to_string(),
                status: None,
                state: LifecycleState::Init,
                elapsed: Duration::ZERO,
            },
            state: LifecycleState::Init,
            started,
            slow_threshold: Duration::from_millis(config.app.slow_request_ms),
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        tracing::debug!(
            request_id = %self.summary.id,
            from = ?self.state,
            to = ?next,
            "Lifecycle transition"
        );
        self.state = next;
    }

    fn summary(&self) -> RequestSummary {
        RequestSummary {
            state: self.state,
            elapsed: self.started.elapsed(),
            ..self.summary.clone()
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.transition(LifecycleState::Finalized);
        let mut summary = self.summary();

        let inner = &self.inner;
        let finalize = AssertUnwindSafe(|| {
            inner.hooks.on_framework_end(&summary);
            inner.events.trigger(FRAMEWORK_END, &mut summary);
        });
        if catch_unwind(finalize).is_err() {
            tracing::error!(request_id = %self.summary.id, "Panic in framework.end handlers");
        }

        let elapsed = self.started.elapsed();
        let status = self.summary.status.map(|s| s.as_u16()).unwrap_or(499);
        metrics::record_request(self.summary.method.as_str(), status, elapsed);

        if elapsed > self.slow_threshold {
            tracing::warn!(
                request_id = %self.summary.id,
                uri = %self.summary.uri,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow request"
            );
        }
        tracing::debug!(request_id = %self.summary.id, status, "App end");
    }
}
