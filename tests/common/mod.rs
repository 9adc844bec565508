//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

use nova_dispatch::app::App;
use nova_dispatch::cache::MemoryCache;
use nova_dispatch::config::AppConfig;
use nova_dispatch::controller::{Controller, ControllerRegistry};
use nova_dispatch::http::{HttpServer, Request, Response};
use nova_dispatch::lifecycle::Shutdown;
use nova_dispatch::routing::{route, RouteTableBuilder};

pub struct UserController;

impl Controller for UserController {
    fn init(&mut self, request: &Request) -> Option<Response> {
        if request.query("maintenance").is_some() {
            return Some(Response::text("maintenance").with_status(StatusCode::SERVICE_UNAVAILABLE));
        }
        None
    }
}

impl UserController {
    pub fn show(&self, _request: &Request, id: String) -> Response {
        Response::text(format!("user {id}"))
    }

    pub fn item(&self, _request: &Request, id: u64) -> Response {
        Response::json(&serde_json::json!({ "id": id }))
    }

    pub fn tag(&self, _request: &Request, tag: String) -> Response {
        Response::text(format!("tag {tag}"))
    }

    pub fn ping(&self, _request: &Request) -> Response {
        Response::text("pong")
    }

    pub fn compare(&self, _request: &Request, left: String, right: String) -> Response {
        Response::text(format!("{left} vs {right}"))
    }

    pub fn fail(&self, _request: &Request) -> anyhow::Result<Response> {
        anyhow::bail!("database unavailable")
    }

    pub fn search(&self, request: &Request) -> Response {
        Response::text(request.query("q").unwrap_or("none").to_string())
    }
}

pub fn routes(routes: &mut RouteTableBuilder) {
    routes
        .get("/users/{id}", route("user", "main", "show"))
        .get("/items/{id@number}", route("user", "main", "item"))
        .get("/tags/{tag@word}", route("user", "main", "tag"))
        .get("/ping", route("user", "main", "ping"))
        .get("/pair/{left}", route("user", "main", "compare"))
        .get("/fail", route("user", "main", "fail"))
        .get("/search", route("user", "main", "search"))
        .get("/ghost", route("user", "missing", "show"));
}

pub fn controllers(registry: &mut ControllerRegistry) {
    registry
        .controller("user", "main", || UserController)
        .action("show", UserController::show)
        .action("item", UserController::item)
        .action("tag", UserController::tag)
        .action("ping", UserController::ping)
        .action("compare", UserController::compare)
        .action("fail", UserController::fail)
        .action("search", UserController::search);
}

pub fn build_app(config: AppConfig) -> App {
    App::builder(config)
        .routes(routes)
        .controllers(controllers)
        .build()
        .unwrap()
}

pub fn build_server(config: AppConfig) -> HttpServer {
    HttpServer::new(build_app(config), Arc::new(MemoryCache::new()))
}

/// Send one request through the router in-process.
pub async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, HeaderMap, String) {
    send_with(router, method, uri, &[]).await
}

/// [`send`] with extra request headers.
pub async fn send_with(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, String) {
    let mut request = axum::http::Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = request.body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Serve on an ephemeral port until the returned handle is triggered.
pub async fn start_server(server: HttpServer) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let stop = shutdown.wait();

    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });
    (addr, shutdown)
}
