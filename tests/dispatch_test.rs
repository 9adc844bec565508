//! End-to-end dispatch through the layered router.

use std::sync::{Arc, Mutex};

use axum::http::{Method, StatusCode};

use nova_dispatch::app::{App, Application, RequestSummary};
use nova_dispatch::config::AppConfig;
use nova_dispatch::event;
use nova_dispatch::http::{HttpServer, Request, Response};
use nova_dispatch::cache::MemoryCache;
use nova_dispatch::routing::{RouteMatch, Target};

mod common;

#[tokio::test]
async fn test_get_binds_capture_into_action() {
    let router = common::build_server(AppConfig::default()).router();

    let (status, headers, body) = common::send(&router, Method::GET, "/users/77").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "user 77");
    assert_eq!(headers["x-powered-by"], "Nova");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_other_method_does_not_match_get_route() {
    let router = common::build_server(AppConfig::default()).router();

    let (status, _, _) = common::send(&router, Method::DELETE, "/users/77").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_head_resolves_get_route() {
    let router = common::build_server(AppConfig::default()).router();

    let (status, headers, body) = common::send(&router, Method::HEAD, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn test_typed_placeholders() {
    let router = common::build_server(AppConfig::default()).router();

    let (status, _, body) = common::send(&router, Method::GET, "/items/42").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"id":42}"#);

    let (status, _, _) = common::send(&router, Method::GET, "/items/abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = common::send(&router, Method::GET, "/tags/foo_bar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "tag foo_bar");

    let (status, _, _) = common::send(&router, Method::GET, "/tags/foo/bar").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_prefix_and_query_are_stripped() {
    let router = common::build_server(AppConfig::default()).router();

    let (status, _, body) = common::send(&router, Method::GET, "/public/users/5?x=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "user 5");

    let (_, _, body) = common::send(&router, Method::GET, "/index.php/search?q=rust").await;
    assert_eq!(body, "rust");
}

#[tokio::test]
async fn test_contract_violations_are_not_found() {
    let router = common::build_server(AppConfig::default()).router();

    // compare() needs two parameters, the route supplies one
    let (status, _, _) = common::send(&router, Method::GET, "/pair/a").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = common::send(&router, Method::GET, "/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_runtime_error_renders_500() {
    let router = common::build_server(AppConfig::default()).router();
    let (status, headers, body) = common::send(&router, Method::GET, "/fail").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/html"));
    assert!(!body.contains("database unavailable"));

    let mut config = AppConfig::default();
    config.app.debug = true;
    let router = common::build_server(config).router();
    let (status, headers, body) = common::send(&router, Method::GET, "/fail").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("database unavailable"));
    assert!(headers.contains_key("server-timing"));
}

#[tokio::test]
async fn test_controller_init_short_circuits() {
    let router = common::build_server(AppConfig::default()).router();
    let (status, _, body) = common::send(&router, Method::GET, "/users/1?maintenance=1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "maintenance");
}

#[tokio::test]
async fn test_convention_route() {
    let mut config = AppConfig::default();
    config.routing.default_route = true;
    let router = common::build_server(config).router();

    let (status, _, body) = common::send(&router, Method::GET, "/user/main/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "pong");

    let (status, _, _) = common::send(&router, Method::GET, "/user/main/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[derive(Default, Clone)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl Application for Journal {
    fn on_framework_start(&self, _request: &Request) {
        self.push("framework_start");
    }

    fn on_route(&self, route: &mut RouteMatch) {
        self.push(format!("route:{}", route.target));
    }

    fn on_app_start(&self, request: &Request) {
        let id = request.route_param("id").unwrap_or("-").to_string();
        self.push(format!("app_start:{id}"));
    }

    fn on_app_end(&self, summary: &RequestSummary) {
        self.push(format!("app_end:{}", summary.status.map(|s| s.as_u16()).unwrap_or(0)));
    }

    fn on_route_not_found(&self, target: Option<&Target>, uri: &str) -> Option<Response> {
        self.push(format!("not_found:{uri}"));
        target.map(|t| Response::text(format!("no {t}")).with_status(StatusCode::NOT_FOUND))
    }

    fn on_application_error(&self, error: &anyhow::Error, _uri: &str) -> Option<Response> {
        self.push(format!("error:{error}"));
        None
    }

    fn on_framework_end(&self, _summary: &RequestSummary) {
        self.push("framework_end");
    }
}

fn journal_router(journal: &Journal) -> axum::Router {
    let app = App::builder(AppConfig::default())
        .routes(common::routes)
        .controllers(common::controllers)
        .hooks(journal.clone())
        .build()
        .unwrap();
    HttpServer::new(app, Arc::new(MemoryCache::new())).router()
}

#[tokio::test]
async fn test_hooks_fire_in_order_on_every_branch() {
    let journal = Journal::default();
    let router = journal_router(&journal);

    common::send(&router, Method::GET, "/users/9").await;
    assert_eq!(
        journal.take(),
        vec![
            "framework_start",
            "route:user/main/show",
            "app_start:9",
            "app_end:200",
            "framework_end",
        ]
    );

    common::send(&router, Method::GET, "/nowhere").await;
    assert_eq!(
        journal.take(),
        vec!["framework_start", "not_found:/nowhere", "framework_end"]
    );

    let (_, _, body) = common::send(&router, Method::GET, "/ghost").await;
    assert_eq!(body, "no user/missing/show");
    assert_eq!(journal.take().last().map(String::as_str), Some("framework_end"));

    common::send(&router, Method::GET, "/fail").await;
    let entries = journal.take();
    assert!(entries.contains(&"error:database unavailable".to_string()));
    assert_eq!(entries.last().map(String::as_str), Some("framework_end"));
}

#[tokio::test]
async fn test_events_rewrite_route_and_body() {
    let app = common::build_app(AppConfig::default());

    app.events().on(event::ROUTE_HANDLER, |_, data| {
        if let Some(route) = data.downcast_mut::<RouteMatch>() {
            if route.target.action == "show" {
                route.target.action = "tag".to_string();
            }
        }
        None
    });

    let counter = Arc::new(Mutex::new(0));
    let seen = counter.clone();
    app.events().on(event::FRAMEWORK_END, move |_, _| {
        *seen.lock().unwrap() += 1;
        None
    });

    let router = HttpServer::new(app, Arc::new(MemoryCache::new())).router();
    let (status, _, body) = common::send(&router, Method::GET, "/users/abc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "tag abc");

    common::send(&router, Method::GET, "/missing").await;
    assert_eq!(*counter.lock().unwrap(), 2);
}
