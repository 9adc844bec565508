//! Per-client request throttling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::observability::metrics;

/// Fixed-window request counter per client IP, stored in the cache.
#[derive(Debug, Clone)]
pub struct Throttle {
    cache: Arc<dyn Cache>,
    config: Arc<ArcSwap<AppConfig>>,
}

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow { remaining: u64 },
    Reject { retry_after: Duration },
}

impl Throttle {
    pub fn new(cache: Arc<dyn Cache>, config: Arc<ArcSwap<AppConfig>>) -> Self {
        Self { cache, config }
    }

    fn enabled(&self) -> bool {
        self.config.load().throttle.enabled
    }

    /// Count a request from `client` against the current window.
    ///
    /// Fails open when the cache cannot record the request.
    pub fn check(&self, client: &str) -> Decision {
        let settings = self.config.load().throttle.clone();
        let window = Duration::from_secs(settings.window_secs.max(1));
        let key = format!("throttle:ip:{client}");

        let count = match self.cache.increment(&key, Some(window)) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(client, error = %e, "Failed to record request count");
                return Decision::Allow {
                    remaining: settings.max_requests,
                };
            }
        };

        if count > settings.max_requests {
            return Decision::Reject {
                retry_after: self.cache.ttl(&key).flatten().unwrap_or(window),
            };
        }
        Decision::Allow {
            remaining: settings.max_requests - count,
        }
    }

    /// [`check`](Self::check), off the runtime threads for blocking drivers.
    pub async fn check_async(&self, client: String) -> Decision {
        if !self.cache.is_blocking() {
            return self.check(&client);
        }
        let throttle = self.clone();
        match tokio::task::spawn_blocking(move || throttle.check(&client)).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(error = %e, "Throttle check failed");
                Decision::Allow { remaining: 0 }
            }
        }
    }
}

/// Middleware rejecting clients over their request budget with 429.
pub async fn throttle_middleware(
    State(throttle): State<Throttle>,
    request: Request,
    next: Next,
) -> Response {
    if !throttle.enabled() {
        return next.run(request).await;
    }

    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match throttle.check_async(client.clone()).await {
        Decision::Allow { .. } => next.run(request).await,
        Decision::Reject { retry_after } => {
            tracing::warn!(client = %client, retry_after = ?retry_after, "Request limit exceeded");
            metrics::record_throttled();
            let mut response = Response::new(Body::from("Too many requests"));
            *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, retry_after.as_secs().max(1).into());
            response
        }
    }
}
