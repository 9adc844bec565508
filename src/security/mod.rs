//! Request admission.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → throttle.rs (fixed window per client IP, counters in the cache)
//!     → 429 with Retry-After, or pass to the application
//! ```
//!
//! # Design Decisions
//! - Limits are read from the live configuration on every request
//! - Counters live in the configured cache driver, so a file cache shares
//!   them between processes

pub mod throttle;

pub use throttle::{throttle_middleware, Decision, Throttle};
