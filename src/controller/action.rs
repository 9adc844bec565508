//! Typed controller actions.
//!
//! An action is a plain function `fn(&C, &Request, A1, .., An) -> R` with
//! `Ai: FromParam` and `R: IntoActionResult`. Its arity is read from the
//! signature, so the only contract left to check per request is the number
//! of captured values.
//!
//! ```compile_fail
//! use nova_dispatch::controller::{Controller, ControllerRegistry};
//! use nova_dispatch::http::Request;
//!
//! #[derive(Default)]
//! struct Home;
//! impl Controller for Home {}
//!
//! impl Home {
//!     // Actions must return a Response.
//!     fn index(&self, _req: &Request) -> String {
//!         String::new()
//!     }
//! }
//!
//! let mut registry = ControllerRegistry::new();
//! registry.controller("index", "main", Home::default).action("index", Home::index);
//! ```

use crate::controller::error::ParamError;
use crate::http::{Request, Response};

/// A request-scoped controller instance.
pub trait Controller: 'static {
    /// Runs before the action; returning a response skips the action.
    fn init(&mut self, _request: &Request) -> Option<Response> {
        None
    }
}

/// Conversion of one positional route value into an action argument.
pub trait FromParam: Sized {
    /// Whether the parameter counts towards the required arity.
    const REQUIRED: bool = true;

    fn from_param(value: Option<&str>) -> Result<Self, ParamError>;
}

impl FromParam for String {
    fn from_param(value: Option<&str>) -> Result<Self, ParamError> {
        value
            .map(str::to_string)
            .ok_or_else(|| ParamError::new("String", None))
    }
}

impl<T: FromParam> FromParam for Option<T> {
    const REQUIRED: bool = false;

    fn from_param(value: Option<&str>) -> Result<Self, ParamError> {
        match value {
            None => Ok(None),
            Some(v) => T::from_param(Some(v)).map(Some),
        }
    }
}

macro_rules! impl_from_param_for_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromParam for $ty {
                fn from_param(value: Option<&str>) -> Result<Self, ParamError> {
                    let raw = value.ok_or_else(|| ParamError::new(stringify!($ty), None))?;
                    raw.parse::<$ty>()
                        .map_err(|_| ParamError::new(stringify!($ty), Some(raw)))
                }
            }
        )*
    };
}

impl_from_param_for_primitive!(i32, i64, u32, u64, usize, f64, bool);

/// Return types an action may have.
pub trait IntoActionResult {
    fn into_action_result(self) -> anyhow::Result<Response>;
}

impl IntoActionResult for Response {
    fn into_action_result(self) -> anyhow::Result<Response> {
        Ok(self)
    }
}

impl<E> IntoActionResult for Result<Response, E>
where
    E: Into<anyhow::Error>,
{
    fn into_action_result(self) -> anyhow::Result<Response> {
        self.map_err(Into::into)
    }
}

/// Parameter counts derived from an action signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    /// Parameters that are not `Option`.
    pub required: usize,
    pub total: usize,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        (self.required..=self.total).contains(&count)
    }
}

/// Why a call did not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

/// A callable action on controller `C`. `Args` is the tuple of parameter
/// types and only serves to keep the blanket impls apart.
pub trait Action<C, Args>: Send + Sync + 'static {
    fn arity(&self) -> Arity;

    fn call(&self, controller: &C, request: &Request, params: &[&str]) -> Result<Response, ActionError>;
}

macro_rules! impl_action {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut, unused_assignments)]
        impl<C, F, R, $($ty,)*> Action<C, ($($ty,)*)> for F
        where
            F: Fn(&C, &Request, $($ty,)*) -> R + Send + Sync + 'static,
            R: IntoActionResult,
            $($ty: FromParam,)*
        {
            fn arity(&self) -> Arity {
                let flags: &[bool] = &[$(<$ty as FromParam>::REQUIRED,)*];
                Arity {
                    required: flags.iter().filter(|required| **required).count(),
                    total: flags.len(),
                }
            }

            fn call(&self, controller: &C, request: &Request, params: &[&str]) -> Result<Response, ActionError> {
                let mut values = params.iter().copied();
                let mut index = 0usize;
                $(
                    let $ty = <$ty as FromParam>::from_param(values.next())
                        .map_err(|e| e.at(index))?;
                    index += 1;
                )*
                Ok((self)(controller, request, $($ty,)*).into_action_result()?)
            }
        }
    };
}

impl_action!();
impl_action!(A1);
impl_action!(A1, A2);
impl_action!(A1, A2, A3);
impl_action!(A1, A2, A3, A4);
impl_action!(A1, A2, A3, A4, A5);
impl_action!(A1, A2, A3, A4, A5, A6);
