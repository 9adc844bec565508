//! Route registration, dispatch and request lifecycle for controller-based
//! web applications.

// Core subsystems
pub mod app;
pub mod config;
pub mod controller;
pub mod http;
pub mod routing;

// Collaborators
pub mod cache;
pub mod event;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use app::{App, AppBuilder, Application};
pub use config::schema::AppConfig;
pub use controller::{Controller, ControllerRegistry};
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use routing::{route, RouteTable, Target};
