//! Error page rendering.
//!
//! Debug mode shows the error chain and, for runtime failures, the captured
//! backtrace. Otherwise the configured template is served, falling back to
//! a built-in page.

use std::path::Path;

use axum::http::StatusCode;

use crate::app::error::Failure;
use crate::config::ErrorPagesConfig;
use crate::http::Response;

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>404 Not Found</title></head>\
<body><h1>404</h1><p>The page you requested could not be found.</p></body></html>";

const SERVER_ERROR_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>500 Server Error</title></head>\
<body><h1>500</h1><p>An error occurred, please try again later.</p></body></html>";

/// Production error templates, read once at startup.
#[derive(Debug, Clone)]
pub struct ErrorPages {
    not_found: String,
    server_error: String,
}

impl Default for ErrorPages {
    fn default() -> Self {
        Self {
            not_found: NOT_FOUND_PAGE.to_string(),
            server_error: SERVER_ERROR_PAGE.to_string(),
        }
    }
}

impl ErrorPages {
    pub fn load(config: &ErrorPagesConfig) -> Self {
        Self {
            not_found: read_template(config.not_found.as_deref(), NOT_FOUND_PAGE),
            server_error: read_template(config.server_error.as_deref(), SERVER_ERROR_PAGE),
        }
    }

    /// Response for `failure`, with the failure's default status.
    pub fn render(&self, failure: &Failure, debug: bool) -> Response {
        let status = failure.status();
        let body = if debug {
            debug_page(status, failure)
        } else if failure.is_not_found() {
            self.not_found.clone()
        } else {
            self.server_error.clone()
        };
        Response::html(body).with_status(status)
    }
}

fn read_template(path: Option<&Path>, fallback: &str) -> String {
    let Some(path) = path else {
        return fallback.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Error template unreadable, using built-in page");
            fallback.to_string()
        }
    }
}

fn debug_page(status: StatusCode, failure: &Failure) -> String {
    let mut page = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{code} {reason}</title></head><body>\
         <h2>{code} {reason}</h2><pre>",
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or("Error"),
    );

    for (depth, message) in failure.chain().iter().enumerate() {
        let label = if depth == 0 { "Error" } else { "Caused by" };
        page.push_str(&format!("<b>{label}:</b> {}\n", escape(message)));
    }
    if let Some(target) = failure.target() {
        page.push_str(&format!("<b>Target:</b> {}\n", escape(&target.to_string())));
    }
    if let Failure::Runtime(e) = failure {
        let trace = e.backtrace().to_string();
        if !trace.is_empty() && !trace.contains("disabled backtrace") {
            page.push_str("\n<b>Backtrace:</b>\n");
            page.push_str(&escape(&trace));
        }
    }

    page.push_str("</pre></body></html>");
    page
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
