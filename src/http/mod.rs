//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware layers)
//!     → request.rs (request ID, query, form, uploads)
//!     → [app lifecycle: routing, controller]
//!     → response.rs (payload rendering, common headers)
//!         → files.rs + range.rs (downloads, static files)
//!         → sse.rs (event streams)
//!         → xml.rs, preload.rs
//!     → Send to client
//! ```

pub mod files;
pub mod preload;
pub mod range;
pub mod request;
pub mod response;
pub mod server;
pub mod sse;
pub mod xml;

pub use request::{Request, RequestError, UploadedFile, X_REQUEST_ID};
pub use response::{Payload, RenderError, Response, SendContext};
pub use server::HttpServer;
pub use sse::{SseEmitter, SseError};
