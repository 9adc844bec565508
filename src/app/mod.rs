//! Application request lifecycle.
//!
//! # Data Flow
//! ```text
//! axum Request
//!     → http::Request::from_http (id, query, form, files)
//!     → on_framework_start, framework.start
//!     → route.before (path rewrite) → Dispatcher → route.after
//!     → on_route, route.handler → ControllerRegistry::validate
//!     → on_app_start, app.start → Controller::init → action
//!     → Response::send → on_app_end, app.end
//!
//! failure (not found, contract, runtime, panic)
//!     → on_route_not_found / on_application_error + events
//!     → error page (debug or production)
//!
//! always: on_framework_end, framework.end, slow request warning, metrics
//! ```

pub mod error;
pub mod error_page;
pub mod hooks;
pub mod lifecycle;

pub use error::Failure;
pub use error_page::ErrorPages;
pub use hooks::{Application, DefaultApplication};
pub use lifecycle::{App, AppBuilder, LifecycleState, RequestSummary};
