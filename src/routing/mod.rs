//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     RouteTableBuilder::get/post/.../any(template, Target)
//!     → normalize template
//!     → pattern.rs (compile, memoized by template)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, raw URI)
//!     → dispatcher.rs (sanitize, strip query/prefix, normalize)
//!     → table.rs (method bucket, then ANY bucket)
//!     → target.rs (bind captures into a fresh Target)
//!     → Return: RouteMatch or RouteNotFound
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - First match wins, in registration order
//! - Registered targets are templates; every dispatch yields a new value

pub mod dispatcher;
pub mod pattern;
pub mod table;
pub mod target;

pub use dispatcher::{Dispatcher, RouteNotFound};
pub use pattern::{CompiledPattern, PatternCache, PatternError};
pub use table::{Bucket, RouteRule, RouteTable, RouteTableBuilder};
pub use target::{route, Params, RouteMatch, Target};
