//! Event bus and the framework's lifecycle event names.
//!
//! # Events
//! | name                   | payload                  |
//! |------------------------|--------------------------|
//! | `framework.start`      | `Request`                |
//! | `route.before`         | `String` (path, mutable) |
//! | `route.after`          | `Option<RouteMatch>`     |
//! | `route.handler`        | `RouteMatch` (mutable)   |
//! | `app.start`            | `Request`                |
//! | `app.end`              | `RequestSummary`         |
//! | `route.not.found`      | `Option<Target>`         |
//! | `app.error`            | `String` (message)       |
//! | `framework.end`        | `RequestSummary`         |
//! | `response.html.before` | `String` (body, mutable) |
//! | `response.html.after`  | `Bytes` (sent body)      |
//! | `response.static.before` | `PathBuf` (file)       |
//! | `response.static.after`  | `PathBuf` (file)       |
//!
//! A listener on `response.static.before` returning `true` suppresses the file
//! body; returning a string sends that string instead.

pub mod bus;

pub use bus::{EventBus, Listener, DEFAULT_PRIORITY};

pub const FRAMEWORK_START: &str = "framework.start";
pub const ROUTE_BEFORE: &str = "route.before";
pub const ROUTE_AFTER: &str = "route.after";
pub const ROUTE_HANDLER: &str = "route.handler";
pub const APP_START: &str = "app.start";
pub const APP_END: &str = "app.end";
pub const ROUTE_NOT_FOUND: &str = "route.not.found";
pub const APP_ERROR: &str = "app.error";
pub const FRAMEWORK_END: &str = "framework.end";
pub const RESPONSE_HTML_BEFORE: &str = "response.html.before";
pub const RESPONSE_HTML_AFTER: &str = "response.html.after";
pub const RESPONSE_STATIC_BEFORE: &str = "response.static.before";
pub const RESPONSE_STATIC_AFTER: &str = "response.static.after";
