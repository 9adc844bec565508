//! Startup registration of controllers and their actions.
//!
//! # Responsibilities
//! - Map `(module, controller)` to a controller factory
//! - Map action names to type-erased invokers with their arity
//! - Validate a bound `Target` against the registered contract
//!
//! # Design Decisions
//! - Names are case-insensitive, matching how paths are compiled
//! - A fresh controller instance is created for every invocation
//! - The registry is frozen behind an `Arc` once the app is built

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::controller::action::{Action, ActionError, Arity, Controller};
use crate::controller::error::ContractError;
use crate::http::{Request, Response};
use crate::routing::Target;

/// How a successful invocation ended.
#[derive(Debug)]
pub enum Outcome {
    /// The controller's `init` hook answered before the action ran.
    Early(Response),
    /// The action produced the response.
    Completed(Response),
}

impl Outcome {
    pub fn into_response(self) -> Response {
        match self {
            Outcome::Early(response) | Outcome::Completed(response) => response,
        }
    }
}

type Invoker = Arc<dyn Fn(&Request, &[&str]) -> Result<Outcome, ActionError> + Send + Sync>;

#[derive(Clone)]
struct ActionEntry {
    name: String,
    arity: Arity,
    invoke: Invoker,
}

#[derive(Clone)]
struct ControllerEntry {
    module: String,
    controller: String,
    type_name: &'static str,
    actions: HashMap<String, ActionEntry>,
}

#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: HashMap<(String, String), ControllerEntry>,
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("controllers", &self.controllers.len())
            .finish()
    }
}

fn key(value: &str) -> String {
    value.to_ascii_lowercase()
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register controller `C` for `(module, controller)`. Registering the
    /// same pair again replaces the earlier controller and its actions.
    pub fn controller<C, F>(&mut self, module: &str, controller: &str, factory: F) -> ControllerBuilder<'_, C>
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let entry = ControllerEntry {
            module: module.to_string(),
            controller: controller.to_string(),
            type_name: std::any::type_name::<C>(),
            actions: HashMap::new(),
        };
        let slot = self
            .controllers
            .entry((key(module), key(controller)))
            .and_modify(|existing| *existing = entry.clone())
            .or_insert(entry);

        ControllerBuilder {
            entry: slot,
            factory: Arc::new(factory),
        }
    }

    /// Check the bound target against the registered contract.
    pub fn validate<'a>(&'a self, target: &'a Target) -> Result<BoundAction<'a>, ContractError> {
        let entry = self
            .controllers
            .get(&(key(&target.module), key(&target.controller)))
            .ok_or_else(|| ContractError::ControllerNotFound {
                target: target.clone(),
            })?;

        let action = entry
            .actions
            .get(&key(&target.action))
            .ok_or_else(|| ContractError::ActionNotFound {
                target: target.clone(),
            })?;

        let received = target.params.len();
        if !action.arity.accepts(received) {
            return Err(ContractError::ArityMismatch {
                target: target.clone(),
                required: action.arity.required,
                total: action.arity.total,
                received,
            });
        }

        Ok(BoundAction {
            target,
            type_name: entry.type_name,
            action,
        })
    }

    pub fn contains(&self, module: &str, controller: &str) -> bool {
        self.controllers
            .contains_key(&(key(module), key(controller)))
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Every registered `module/controller/action` with its arity, sorted.
    pub fn actions(&self) -> Vec<(String, Arity)> {
        let mut list: Vec<_> = self
            .controllers
            .values()
            .flat_map(|entry| {
                entry.actions.values().map(move |action| {
                    (
                        format!("{}/{}/{}", entry.module, entry.controller, action.name),
                        action.arity,
                    )
                })
            })
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }
}

/// Adds actions to a controller being registered.
pub struct ControllerBuilder<'r, C> {
    entry: &'r mut ControllerEntry,
    factory: Arc<dyn Fn() -> C + Send + Sync>,
}

impl<C: Controller> ControllerBuilder<'_, C> {
    pub fn action<A, Args>(self, name: &str, action: A) -> Self
    where
        A: Action<C, Args>,
        Args: 'static,
    {
        let arity = action.arity();
        let factory = self.factory.clone();
        let action = Arc::new(action);

        let invoke: Invoker = Arc::new(move |request: &Request, params: &[&str]| {
            let mut controller = factory();
            if let Some(early) = controller.init(request) {
                return Ok(Outcome::Early(early));
            }
            action
                .call(&controller, request, params)
                .map(Outcome::Completed)
        });

        self.entry.actions.insert(
            key(name),
            ActionEntry {
                name: name.to_string(),
                arity,
                invoke,
            },
        );
        self
    }
}

/// A target that passed validation, ready to run.
pub struct BoundAction<'a> {
    target: &'a Target,
    type_name: &'static str,
    action: &'a ActionEntry,
}

impl BoundAction<'_> {
    pub fn arity(&self) -> Arity {
        self.action.arity
    }

    /// Rust type of the controller, for logs.
    pub fn controller_type(&self) -> &'static str {
        self.type_name
    }

    /// Instantiate the controller, run `init`, then the action.
    ///
    /// Parameter conversion failures are reported as contract errors;
    /// anything the action returns as an error is a runtime failure.
    pub fn invoke(&self, request: &Request) -> Result<Result<Outcome, anyhow::Error>, ContractError> {
        let params = self.target.params.positional();
        match (self.action.invoke)(request, &params) {
            Ok(outcome) => Ok(Ok(outcome)),
            Err(ActionError::Runtime(e)) => Ok(Err(e)),
            Err(ActionError::Param(source)) => Err(ContractError::InvalidParameter {
                target: self.target.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Payload;
    use crate::routing::route;
    use axum::http::{Method, StatusCode};

    #[derive(Default)]
    struct UserController {
        locked: bool,
    }

    impl Controller for UserController {
        fn init(&mut self, request: &Request) -> Option<Response> {
            self.locked = request.query("lock").is_some();
            if request.query("deny").is_some() {
                return Some(Response::text("denied").with_status(StatusCode::FORBIDDEN));
            }
            None
        }
    }

    impl UserController {
        fn show(&self, _req: &Request, id: u64) -> Response {
            Response::text(format!("{id}:{}", self.locked))
        }

        fn compare(&self, _req: &Request, a: String, b: String) -> Response {
            Response::text(format!("{a}-{b}"))
        }
    }

    fn registry() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry
            .controller("user", "Main", UserController::default)
            .action("show", UserController::show)
            .action("compare", UserController::compare);
        registry
    }

    fn text(outcome: Outcome) -> String {
        match outcome.into_response().payload() {
            Payload::Text(t) => t.clone(),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_validate_and_invoke() {
        let registry = registry();
        let target = route("USER", "main", "Show").with_param("id", "77");

        let bound = registry.validate(&target).unwrap();
        assert_eq!(bound.arity(), Arity { required: 1, total: 1 });
        assert!(bound.controller_type().ends_with("UserController"));

        let request = Request::new(Method::GET, "/users/77?lock=1");
        let outcome = bound.invoke(&request).unwrap().unwrap();
        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(text(outcome), "77:true");
    }

    #[test]
    fn test_init_short_circuits() {
        let registry = registry();
        let target = route("user", "main", "show").with_param("id", "1");
        let request = Request::new(Method::GET, "/users/1?deny=1");

        let outcome = registry.validate(&target).unwrap().invoke(&request).unwrap().unwrap();
        match outcome {
            Outcome::Early(response) => assert_eq!(response.status(), StatusCode::FORBIDDEN),
            Outcome::Completed(_) => panic!("action should not run"),
        }
    }

    #[test]
    fn test_missing_controller_and_action() {
        let registry = registry();

        let target = route("blog", "main", "show");
        assert!(matches!(
            registry.validate(&target),
            Err(ContractError::ControllerNotFound { .. })
        ));

        let target = route("user", "main", "delete");
        let err = registry.validate(&target).err().unwrap();
        assert!(matches!(err, ContractError::ActionNotFound { .. }));
        assert_eq!(err.target(), &target);
    }

    #[test]
    fn test_arity_mismatch_rejects_short_params() {
        let registry = registry();
        let target = route("user", "main", "compare").with_param("a", "x");

        match registry.validate(&target) {
            Err(ContractError::ArityMismatch {
                required,
                total,
                received,
                ..
            }) => assert_eq!((required, total, received), (2, 2, 1)),
            _ => panic!("expected arity mismatch"),
        }
    }

    #[test]
    fn test_invalid_parameter_is_contract_error() {
        let registry = registry();
        let target = route("user", "main", "show").with_param("id", "abc");
        let request = Request::new(Method::GET, "/users/abc");

        let err = registry.validate(&target).unwrap().invoke(&request).err().unwrap();
        assert!(matches!(err, ContractError::InvalidParameter { .. }));
    }

    #[test]
    fn test_reregistration_replaces_actions() {
        let mut registry = registry();
        registry
            .controller("user", "main", UserController::default)
            .action("compare", UserController::compare);

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("User", "MAIN"));
        let names: Vec<_> = registry.actions().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["user/main/compare"]);
    }
}
