//! Application hooks around the request lifecycle.
//!
//! Every hook has an empty default, so an application only overrides what
//! it needs. Hooks run on the request task and should not block.

use crate::app::lifecycle::RequestSummary;
use crate::http::{Request, Response};
use crate::routing::{RouteMatch, Target};

pub trait Application: Send + Sync + 'static {
    /// Before routing.
    fn on_framework_start(&self, _request: &Request) {}

    /// After a route matched, before contract validation. The match may be
    /// rewritten.
    fn on_route(&self, _route: &mut RouteMatch) {}

    /// After the route has been attached to the request, before the
    /// controller runs.
    fn on_app_start(&self, _request: &Request) {}

    /// After a successful response was sent.
    fn on_app_end(&self, _summary: &RequestSummary) {}

    /// Custom response for unmatched routes and contract violations.
    fn on_route_not_found(&self, _target: Option<&Target>, _uri: &str) -> Option<Response> {
        None
    }

    /// Custom response for runtime errors.
    fn on_application_error(&self, _error: &anyhow::Error, _uri: &str) -> Option<Response> {
        None
    }

    /// Always runs last, whatever happened.
    fn on_framework_end(&self, _summary: &RequestSummary) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultApplication;

impl Application for DefaultApplication {}
