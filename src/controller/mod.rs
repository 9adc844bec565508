//! Controller contract and invocation.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ControllerRegistry::controller(module, controller, factory)
//!         .action(name, fn(&C, &Request, A1..An) -> R)
//!     → arity read from the signature
//!
//! Per request (bound Target):
//!     → registry.validate(target)   controller? action? arity?
//!     → BoundAction::invoke(request)
//!         → factory() → init() → early Response?
//!         → FromParam conversion of positional values
//!         → action → IntoActionResult
//! ```

pub mod action;
pub mod error;
pub mod registry;

pub use action::{Action, ActionError, Arity, Controller, FromParam, IntoActionResult};
pub use error::{ContractError, ParamError};
pub use registry::{BoundAction, ControllerBuilder, ControllerRegistry, Outcome};
