//! The framework response and its rendering.
//!
//! # Responsibilities
//! - Describe what an action produced (status, headers, payload)
//! - Render the payload into an HTTP response exactly once
//! - Add the common headers (`X-Powered-By`, `Date`, `Server-Timing`)
//!
//! # Data Flow
//! ```text
//! Action → Response { status, headers, payload }
//!     → send(SendContext)
//!         → common headers
//!         → payload renderer (json / xml / html / file / static / sse / ...)
//!     → axum::response::Response
//! ```
//!
//! # Design Decisions
//! - `send` consumes the response, so a response cannot be sent twice
//! - Encoding failures of JSON/XML payloads become a 500 body in the same
//!   format; header or IO failures surface as `RenderError`
//! - HEAD requests get the full header set and an empty body

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::event::{EventBus, RESPONSE_HTML_AFTER, RESPONSE_HTML_BEFORE};
use crate::http::files;
use crate::http::preload;
use crate::http::request::Request;
use crate::http::sse::{SseEmitter, SseProducer};
use crate::http::xml;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the response carries.
#[derive(Debug)]
pub enum Payload {
    Html(String),
    Text(String),
    Json(Result<Value, String>),
    Xml(Result<Value, String>),
    Raw(Bytes),
    File { path: PathBuf, name: String },
    Static(PathBuf),
    Sse(SseProducer),
    Redirect { url: String, delay_secs: u32 },
    None,
}

impl Payload {
    /// Short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Html(_) => "html",
            Payload::Text(_) => "text",
            Payload::Json(_) => "json",
            Payload::Xml(_) => "xml",
            Payload::Raw(_) => "raw",
            Payload::File { .. } => "file",
            Payload::Static(_) => "static",
            Payload::Sse(_) => "sse",
            Payload::Redirect { .. } => "redirect",
            Payload::None => "none",
        }
    }
}

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    payload: Payload,
}

/// Per-request state needed while rendering.
#[derive(Clone, Copy)]
pub struct SendContext<'a> {
    pub request: &'a Request,
    pub events: &'a EventBus,
    /// Value of `X-Powered-By`.
    pub powered_by: &'a str,
    /// Adds `Server-Timing` when set.
    pub debug: bool,
    pub started: Instant,
}

impl Response {
    fn new(status: StatusCode, payload: Payload) -> Self {
        Self {
            status,
            headers: Vec::new(),
            payload,
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, Payload::Html(body.into()))
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(StatusCode::OK, Payload::Text(body.into()))
    }

    /// JSON body. Serialization errors are reported when the response is sent.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Self {
        let value = serde_json::to_value(data).map_err(|e| e.to_string());
        Self::new(StatusCode::OK, Payload::Json(value))
    }

    /// XML body rendered from the JSON data model under a `<root>` element.
    pub fn xml<T: Serialize + ?Sized>(data: &T) -> Self {
        let value = serde_json::to_value(data).map_err(|e| e.to_string());
        Self::new(StatusCode::OK, Payload::Xml(value))
    }

    pub fn raw(data: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, Payload::Raw(data.into()))
    }

    /// Attachment download of `path`, named `name` on the client.
    pub fn file(path: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self::new(
            StatusCode::OK,
            Payload::File {
                path: path.as_ref().to_path_buf(),
                name: name.into(),
            },
        )
    }

    pub fn static_file(path: impl AsRef<Path>) -> Self {
        Self::new(StatusCode::OK, Payload::Static(path.as_ref().to_path_buf()))
    }

    /// Event stream fed by `producer`.
    pub fn sse<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(SseEmitter) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        Self::new(StatusCode::OK, Payload::Sse(SseProducer::new(producer)))
    }

    /// `302 Found` with a `Location` header.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::redirect_after(url, 0)
    }

    /// Redirect after `delay_secs`. A zero delay is a plain 302; otherwise a
    /// 200 with a `refresh` header.
    pub fn redirect_after(url: impl Into<String>, delay_secs: u32) -> Self {
        let status = if delay_secs == 0 {
            StatusCode::FOUND
        } else {
            StatusCode::OK
        };
        Self::new(
            status,
            Payload::Redirect {
                url: url.into(),
                delay_secs,
            },
        )
    }

    /// Headers only.
    pub fn none() -> Self {
        Self::new(StatusCode::OK, Payload::None)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Names are matched case-insensitively and a repeated
    /// name replaces the earlier value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Client cache lifetime: `Expires`, `Pragma` and `Cache-Control`.
    pub fn cache(mut self, minutes: u64) -> Self {
        for (name, value) in cache_header_values(minutes) {
            self = self.with_header(name, value);
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Render into an HTTP response.
    pub async fn send(self, ctx: &SendContext<'_>) -> Result<axum::response::Response, RenderError> {
        let head = ctx.request.is_head();
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            append(&mut headers, name, value)?;
        }
        if !headers.contains_key("x-powered-by") {
            append(&mut headers, "x-powered-by", ctx.powered_by)?;
        }
        if !headers.contains_key(header::DATE) {
            append(&mut headers, "date", &http_date(Utc::now()))?;
        }
        if ctx.debug {
            let millis = ctx.started.elapsed().as_secs_f64() * 1000.0;
            append(
                &mut headers,
                "server-timing",
                &format!("total;dur={millis:.4};desc=\"Total Time\""),
            )?;
        }

        let mut status = self.status;
        let body = match self.payload {
            Payload::Html(mut body) => {
                default_type(&mut headers, "text/html");
                if !head && !ctx.request.is_pjax() && !headers.contains_key(header::LINK) {
                    if let Some(link) = preload::link_header(&body) {
                        append(&mut headers, "link", &link)?;
                    }
                }
                if head {
                    Body::empty()
                } else {
                    ctx.events.trigger(RESPONSE_HTML_BEFORE, &mut body);
                    let sent = Bytes::from(body);
                    ctx.events.trigger(RESPONSE_HTML_AFTER, &mut sent.clone());
                    Body::from(sent)
                }
            }
            Payload::Text(body) => {
                default_type(&mut headers, "text/plain");
                body_unless_head(head, body)
            }
            Payload::Raw(bytes) => {
                default_type(&mut headers, "application/octet-stream");
                body_unless_head(head, bytes)
            }
            Payload::Json(value) => {
                default_type(&mut headers, "application/json");
                let encoded = value.and_then(|v| serde_json::to_vec(&v).map_err(|e| e.to_string()));
                let bytes = match encoded {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, request_id = %ctx.request.id(), "JSON encoding failed");
                        status = StatusCode::INTERNAL_SERVER_ERROR;
                        br#"{"error":"Server error"}"#.to_vec()
                    }
                };
                body_unless_head(head, bytes)
            }
            Payload::Xml(value) => {
                default_type(&mut headers, "application/xml");
                let encoded = value.and_then(|v| xml::encode(&v).map_err(|e| e.to_string()));
                let document = match encoded {
                    Ok(document) => document,
                    Err(e) => {
                        tracing::error!(error = %e, request_id = %ctx.request.id(), "XML encoding failed");
                        status = StatusCode::INTERNAL_SERVER_ERROR;
                        xml::error_document()
                    }
                };
                body_unless_head(head, document)
            }
            Payload::File { path, name } => {
                let (file_status, body) = files::download(&path, &name, &mut headers, ctx.request).await?;
                status = file_status;
                body
            }
            Payload::Static(path) => {
                let (file_status, body) =
                    files::serve_static(&path, &mut headers, ctx.request, ctx.events).await?;
                status = file_status;
                body
            }
            Payload::Sse(producer) => {
                headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
                headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
                if head {
                    default_type(&mut headers, "text/event-stream");
                    Body::empty()
                } else {
                    let mut streaming = producer.into_response();
                    *streaming.status_mut() = status;
                    for (name, value) in headers.iter() {
                        streaming.headers_mut().insert(name.clone(), value.clone());
                    }
                    return Ok(streaming);
                }
            }
            Payload::Redirect { url, delay_secs } => {
                if delay_secs == 0 {
                    append(&mut headers, "location", &url)?;
                } else {
                    append(&mut headers, "refresh", &format!("{delay_secs};url={url}"))?;
                }
                Body::empty()
            }
            Payload::None => Body::empty(),
        };

        let mut response = axum::response::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

fn append(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), RenderError> {
    let invalid = |reason: String| RenderError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::try_from(name).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

fn default_type(headers: &mut HeaderMap, content_type: &'static str) {
    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(content_type));
}

fn body_unless_head(head: bool, body: impl Into<Body>) -> Body {
    if head {
        Body::empty()
    } else {
        body.into()
    }
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Expires`, `Pragma` and `Cache-Control` values for a lifetime in minutes.
pub(crate) fn cache_header_values(minutes: u64) -> [(&'static str, String); 3] {
    let seconds = minutes.saturating_mul(60);
    let expires = i64::try_from(seconds)
        .ok()
        .and_then(|secs| Utc::now().checked_add_signed(ChronoDuration::seconds(secs)))
        .unwrap_or_else(Utc::now);
    [
        ("expires", http_date(expires)),
        ("pragma", "cache".to_string()),
        ("cache-control", format!("max-age={seconds}")),
    ]
}
