//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! App lifecycle, dispatcher, throttle middleware
//!     → logging.rs (tracing subscriber, structured events)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (human or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event; the request ID is always attached
//! - Metrics are cheap no-ops until an exporter is installed
//! - `RUST_LOG` overrides the configured level

pub mod logging;
pub mod metrics;
