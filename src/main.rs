//! nova-server
//!
//! Serves a small demo application on top of the dispatch engine.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, timeout, throttle)
//!                          │
//!                          ▼
//!                     app::App ──▶ routing::Dispatcher ──▶ controller::ControllerRegistry
//!                          │                                        │
//!                          │ hooks + event bus                      ▼
//!                          │                                 Controller::init, action
//!                          ▼                                        │
//!     Client Response ◀── http::response ◀──────────────────────────┘
//!
//!     Cross-cutting: config (toml, hot reload), observability (tracing, metrics),
//!                    cache (throttle counters), lifecycle (signals, shutdown)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use clap::Parser;
use serde::Serialize;
use tokio::net::TcpListener;

use nova_dispatch::app::App;
use nova_dispatch::cache;
use nova_dispatch::config::{load_config, AppConfig, ConfigStore, ConfigWatcher};
use nova_dispatch::controller::{Controller, ControllerRegistry};
use nova_dispatch::http::{HttpServer, Request, Response};
use nova_dispatch::lifecycle::{shutdown_signal, Shutdown};
use nova_dispatch::observability::{logging, metrics};
use nova_dispatch::routing::{route, RouteTableBuilder};

#[derive(Debug, Parser)]
#[command(name = "nova-server", version, about = "Controller dispatch server")]
struct Cli {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the route table and exit.
    #[arg(long)]
    print_routes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "nova-server starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        debug = config.app.debug,
        request_timeout_secs = config.server.request_timeout_secs,
        throttle = config.throttle.enabled,
        "Configuration loaded"
    );

    let settings = Arc::new(ConfigStore::from_config(&config)?);
    let shared = Arc::new(ArcSwap::from_pointee(config.clone()));
    let app = App::builder_shared(shared)
        .routes(register_routes)
        .controllers(|registry| register_controllers(registry, settings))
        .build()?;

    if cli.print_routes {
        for (bucket, rule) in app.dispatcher().table().iter() {
            println!("{:<8} {:<36} {}", bucket.to_string(), rule.template, rule.target);
        }
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let _watcher = match &cli.config {
        Some(path) => Some(watch_config(path, app.clone(), &shutdown)?),
        None => None,
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(app, cache::from_config(&config.cache)?);

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Apply validated config reloads until shutdown.
fn watch_config(
    path: &Path,
    app: App,
    shutdown: &Shutdown,
) -> Result<notify::RecommendedWatcher, notify::Error> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;

    let stop = shutdown.wait();
    tokio::spawn(async move {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                Some(config) = updates.recv() => app.update_config(config),
                _ = &mut stop => break,
                else => break,
            }
        }
    });
    Ok(handle)
}

fn register_routes(routes: &mut RouteTableBuilder) {
    routes
        .get("/", route("index", "home", "index"))
        .any("/ping", route("index", "home", "ping"))
        .get("/clock", route("index", "home", "clock"))
        .get("/assets/{file}", route("index", "home", "asset"))
        .get("/users", route("user", "main", "list"))
        .post("/users", route("user", "main", "create"))
        .get("/users/export", route("user", "main", "export"))
        .get("/users/export/{format@word}", route("user", "main", "export"))
        .get("/users/{id@number}", route("user", "main", "show"));
}

fn register_controllers(registry: &mut ControllerRegistry, settings: Arc<ConfigStore>) {
    registry
        .controller("index", "home", move || HomeController {
            settings: settings.clone(),
        })
        .action("index", HomeController::index)
        .action("ping", HomeController::ping)
        .action("clock", HomeController::clock)
        .action("asset", HomeController::asset);

    registry
        .controller("user", "main", || UserController)
        .action("list", UserController::list)
        .action("create", UserController::create)
        .action("export", UserController::export)
        .action("show", UserController::show);
}

struct HomeController {
    settings: Arc<ConfigStore>,
}

impl Controller for HomeController {}

impl HomeController {
    fn index(&self, request: &Request) -> Response {
        let greeting = self
            .settings
            .get("site.greeting")
            .and_then(|v| v.as_str())
            .unwrap_or("Welcome");
        Response::html(format!(
            "<!DOCTYPE html><html><head><title>{greeting}</title>\
             <link rel=\"stylesheet\" href=\"/assets/site.css\"></head>\
             <body><h1>{greeting}</h1><p>{}</p></body></html>",
            request.current_address()
        ))
    }

    fn ping(&self, _request: &Request) -> Response {
        Response::text("pong")
    }

    fn clock(&self, _request: &Request) -> Response {
        Response::sse(|emitter| async move {
            let mut ticks = tokio::time::interval(Duration::from_secs(1));
            for _ in 0..10 {
                ticks.tick().await;
                let now = chrono::Utc::now().to_rfc3339();
                if emitter.send(Some("tick"), &now).await.is_err() {
                    break;
                }
            }
        })
    }

    fn asset(&self, _request: &Request, file: String) -> Response {
        Response::static_file(Path::new("public/assets").join(file))
    }
}

#[derive(Debug, Serialize)]
struct User {
    id: u64,
    name: String,
}

fn sample_users() -> Vec<User> {
    (1..=3)
        .map(|id| User {
            id,
            name: format!("user{id}"),
        })
        .collect()
}

struct UserController;

impl Controller for UserController {
    fn init(&mut self, request: &Request) -> Option<Response> {
        if request.is_post() && request.header("x-api-key").is_none() {
            return Some(Response::text("API key required").with_status(StatusCode::UNAUTHORIZED));
        }
        None
    }
}

impl UserController {
    fn list(&self, request: &Request) -> Response {
        let page: u32 = request.query("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        Response::json(&serde_json::json!({ "page": page, "users": sample_users() }))
    }

    fn create(&self, request: &Request) -> anyhow::Result<Response> {
        let name = request
            .post("name")
            .ok_or_else(|| anyhow::anyhow!("missing form field `name`"))?;
        let user = User {
            id: 4,
            name: name.to_string(),
        };
        Ok(Response::json(&user).with_status(StatusCode::CREATED))
    }

    fn export(&self, _request: &Request, format: Option<String>) -> Response {
        let users = sample_users();
        match format.as_deref() {
            Some("xml") => Response::xml(&users),
            _ => Response::json(&users),
        }
    }

    fn show(&self, _request: &Request, id: u64) -> anyhow::Result<Response> {
        if id == 0 {
            anyhow::bail!("user 0 is reserved");
        }
        Ok(Response::json(&User {
            id,
            name: format!("user{id}"),
        }))
    }
}
