//! Framework-side view of an inbound HTTP request.
//!
//! # Responsibilities
//! - Carry the request ID assigned by the request-id layer
//! - Buffer the body once (size limited) and decode query, form and
//!   multipart parameters
//! - Hold the route match once the dispatcher resolved it
//!
//! # Design Decisions
//! - Route captures are exposed through `route_param`, never merged into
//!   the query parameters
//! - `arg` looks at query parameters first, then the form body

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, FromRequest, Multipart};
use axum::http::{header, HeaderMap, HeaderValue, Method, Uri};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::routing::{Params, RouteMatch};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("malformed multipart body: {0}")]
    Multipart(String),
}

/// A file received in a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field name.
    pub field: String,
    /// Client-supplied file name.
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    id: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Params,
    form: Params,
    files: Vec<UploadedFile>,
    body: Bytes,
    client: Option<SocketAddr>,
    route: Option<RouteMatch>,
}

impl Request {
    /// Build a body-less request, e.g. for tests and internal dispatch.
    pub fn new(method: Method, uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        let query = parse_pairs(uri.query().unwrap_or_default().as_bytes());
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            uri,
            headers: HeaderMap::new(),
            query,
            form: Params::new(),
            files: Vec::new(),
            body: Bytes::new(),
            client: None,
            route: None,
        }
    }

    /// Set a header (builder style).
    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Replace the body; form parameters are decoded when the content type
    /// says so.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        if self.is_form_urlencoded() {
            self.form = parse_pairs(&self.body);
        }
        self
    }

    /// Read an axum request, buffering at most `limit` body bytes.
    pub async fn from_http(request: axum::extract::Request, limit: usize) -> Result<Self, RequestError> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(RequestError::Body)?;

        let id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0);

        let mut request = Self {
            id,
            query: parse_pairs(parts.uri.query().unwrap_or_default().as_bytes()),
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            form: Params::new(),
            files: Vec::new(),
            body,
            client,
            route: None,
        };

        if request.is_form_urlencoded() {
            request.form = parse_pairs(&request.body);
        } else if request.is_multipart() {
            request.read_multipart().await?;
        }

        Ok(request)
    }

    async fn read_multipart(&mut self) -> Result<(), RequestError> {
        let mut replay = axum::http::Request::new(Body::from(self.body.clone()));
        *replay.headers_mut() = self.headers.clone();

        let mut multipart = Multipart::from_request(replay, &())
            .await
            .map_err(|e| RequestError::Multipart(e.to_string()))?;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| RequestError::Multipart(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| RequestError::Multipart(e.to_string()))?;

            if file_name.is_some() {
                self.files.push(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    data,
                });
            } else {
                self.form.insert(name, String::from_utf8_lossy(&data).into_owned());
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Query-string parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key)
    }

    pub fn query_params(&self) -> &Params {
        &self.query
    }

    /// Form body parameter.
    pub fn post(&self, key: &str) -> Option<&str> {
        self.form.get(key)
    }

    pub fn post_params(&self) -> &Params {
        &self.form
    }

    /// Query parameter, falling back to the form body.
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.query(key).or_else(|| self.post(key))
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// The raw body bytes.
    pub fn raw(&self) -> &Bytes {
        &self.body
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client
    }

    /// Client IP without the port; `"unknown"` when not connected over TCP.
    pub fn client_ip(&self) -> String {
        self.client
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn host(&self) -> Option<&str> {
        self.header(header::HOST.as_str())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// Host without the port.
    pub fn domain(&self) -> Option<&str> {
        self.host().map(|host| match host.rsplit_once(':') {
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        })
    }

    pub fn is_https(&self) -> bool {
        self.uri.scheme_str() == Some("https")
            || self
                .header("x-forwarded-proto")
                .is_some_and(|p| p.eq_ignore_ascii_case("https"))
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_https() {
            "https://"
        } else {
            "http://"
        }
    }

    /// `scheme://host`.
    pub fn base_address(&self) -> String {
        format!("{}{}", self.scheme(), self.host().unwrap_or_default())
    }

    /// `scheme://host/path?query`.
    pub fn current_address(&self) -> String {
        let path = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}", self.base_address(), path)
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    pub fn is_pjax(&self) -> bool {
        self.header("x-pjax") == Some("true")
    }

    /// The resolved route, once dispatch succeeded.
    pub fn route(&self) -> Option<&RouteMatch> {
        self.route.as_ref()
    }

    /// A named capture of the resolved route.
    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.route.as_ref()?.captures.get(name)
    }

    pub(crate) fn set_route(&mut self, route: RouteMatch) {
        self.route = Some(route);
    }

    fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    fn is_form_urlencoded(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
    }

    fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    }
}

fn parse_pairs(input: &[u8]) -> Params {
    url::form_urlencoded::parse(input).into_owned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_query_and_arg_precedence() {
        let request = Request::new(Method::POST, "/search?q=rust&page=2")
            .with_header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .with_body("q=ignored&token=abc+def");

        assert_eq!(request.query("q"), Some("rust"));
        assert_eq!(request.post("q"), Some("ignored"));
        assert_eq!(request.arg("q"), Some("rust"));
        assert_eq!(request.arg("token"), Some("abc def"));
        assert_eq!(request.arg("missing"), None);
        assert!(request.is_post());
    }

    #[test]
    fn test_header_helpers() {
        let request = Request::new(Method::GET, "/")
            .with_header(header::HOST, "example.com:8080")
            .with_header(header::HeaderName::from_static("x-requested-with"), "XMLHttpRequest")
            .with_header(header::HeaderName::from_static("x-pjax"), "true")
            .with_header(header::HeaderName::from_static("x-forwarded-proto"), "https");

        assert!(request.is_ajax());
        assert!(request.is_pjax());
        assert_eq!(request.domain(), Some("example.com"));
        assert_eq!(request.base_address(), "https://example.com:8080");
        assert_eq!(request.current_address(), "https://example.com:8080/");
    }

    #[test]
    fn test_json_body() {
        let request = Request::new(Method::POST, "/api").with_body(r#"{"a":1}"#);
        let value: Value = request.json().unwrap();
        assert_eq!(value["a"], 1);
        assert!(request.post_params().is_empty());
    }

    #[tokio::test]
    async fn test_from_http_reads_id_and_form() {
        let http = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/users?x=1")
            .header(X_REQUEST_ID, "req-1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=nova"))
            .unwrap();

        let request = Request::from_http(http, 1024).await.unwrap();
        assert_eq!(request.id(), "req-1");
        assert_eq!(request.query("x"), Some("1"));
        assert_eq!(request.post("name"), Some("nova"));
        assert_eq!(request.raw().as_ref(), b"name=nova");
        assert_eq!(request.client_ip(), "unknown");
    }

    #[tokio::test]
    async fn test_from_http_body_limit() {
        let http = axum::http::Request::builder()
            .uri("/")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();
        assert!(matches!(
            Request::from_http(http, 16).await,
            Err(RequestError::Body(_))
        ));
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let body = "--XBOUNDARY\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            hello\r\n\
            --XBOUNDARY\r\n\
            Content-Disposition: form-data; name=\"avatar\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            file-bytes\r\n\
            --XBOUNDARY--\r\n";
        let http = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();

        let request = Request::from_http(http, 4096).await.unwrap();
        assert_eq!(request.post("title"), Some("hello"));
        let file = request.file("avatar").unwrap();
        assert_eq!(file.file_name.as_deref(), Some("a.txt"));
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
        assert_eq!(file.data.as_ref(), b"file-bytes");
        assert_eq!(file.size(), 10);
    }
}
