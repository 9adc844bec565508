//! Request URI → route match.
//!
//! # Data Flow
//! ```text
//! raw URI ("/public/users/5?x=1")
//!     → sanitize (drop non-URL characters)
//!     → strip query string
//!     → normalize ('/' + trim '/')
//!     → strip front-controller prefixes ("/public", "/index.php")
//!     → RouteTable::resolve(method, path)
//!     → RouteMatch | RouteNotFound
//! ```

use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::config::PrefixRule;
use crate::routing::table::{normalize_path, RouteTable};
use crate::routing::target::RouteMatch;

/// No rule matched the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("route not found: {method} {uri}")]
pub struct RouteNotFound {
    pub method: Method,
    /// Normalized path that was attempted.
    pub uri: String,
}

/// Resolves inbound requests against an immutable [`RouteTable`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
    prefixes: Vec<PrefixRule>,
}

impl Dispatcher {
    pub fn new(table: Arc<RouteTable>, prefixes: Vec<PrefixRule>) -> Self {
        Self { table, prefixes }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Normalize and resolve in one step.
    pub fn dispatch(&self, uri: &str, method: &Method) -> Result<RouteMatch, RouteNotFound> {
        let path = self.normalize(uri);
        self.resolve(&path, method)
    }

    /// Resolve an already normalized path.
    pub fn resolve(&self, path: &str, method: &Method) -> Result<RouteMatch, RouteNotFound> {
        tracing::debug!(method = %method, path, "Route dispatch");

        match self.table.resolve(method, path) {
            Some(found) => {
                tracing::debug!(
                    path,
                    template = %found.template,
                    target = %found.target,
                    "Route matched"
                );
                Ok(found)
            }
            None => Err(RouteNotFound {
                method: method.clone(),
                uri: path.to_string(),
            }),
        }
    }

    /// Turn a raw request URI into the canonical path used for matching.
    pub fn normalize(&self, uri: &str) -> String {
        let sanitized = sanitize_uri(uri);
        let without_query = match sanitized.split_once('?') {
            Some((path, _)) => path,
            None => sanitized.as_str(),
        };
        let mut path = normalize_path(without_query);

        for rule in &self.prefixes {
            if let Some(rest) = strip_segment_prefix(&path, &rule.prefix) {
                let rest = normalize_path(rest);
                if rule.warn {
                    tracing::warn!(
                        prefix = %rule.prefix,
                        path = %rest,
                        "Front-controller prefix in request URI; serve the document root from the web server instead"
                    );
                }
                path = rest;
            }
        }

        path
    }
}

/// Strip `prefix` only when it ends on a path segment boundary.
fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return None;
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Drop every character that cannot appear in a URL.
pub fn sanitize_uri(uri: &str) -> String {
    const ALLOWED: &str = "$-_.+!*'(),{}|\\^~[]`<>#%\";/?:@&=";
    uri.chars()
        .filter(|c| c.is_ascii_alphanumeric() || ALLOWED.contains(*c))
        .collect()
}
