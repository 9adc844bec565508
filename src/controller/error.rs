use thiserror::Error;

use crate::routing::Target;

/// A positional route value could not be converted to the action's
/// parameter type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("parameter {index} expects {expected}, got {value:?}")]
pub struct ParamError {
    /// Zero-based position among the action's parameters.
    pub index: usize,
    /// Rust type name of the parameter.
    pub expected: &'static str,
    /// The received text; `None` when a required value was missing.
    pub value: Option<String>,
}

impl ParamError {
    pub fn new(expected: &'static str, value: Option<&str>) -> Self {
        Self {
            index: 0,
            expected,
            value: value.map(str::to_string),
        }
    }

    pub(crate) fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// The resolved target does not satisfy the controller contract.
///
/// Every variant carries the attempted target so not-found handlers can
/// render something specific to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("controller not found: {target}")]
    ControllerNotFound { target: Target },

    #[error("action not found: {target}")]
    ActionNotFound { target: Target },

    #[error("{target} expects {required}..={total} parameters, received {received}")]
    ArityMismatch {
        target: Target,
        required: usize,
        total: usize,
        received: usize,
    },

    #[error("invalid parameter for {target}: {source}")]
    InvalidParameter {
        target: Target,
        #[source]
        source: ParamError,
    },
}

impl ContractError {
    /// The target that failed validation.
    pub fn target(&self) -> &Target {
        match self {
            ContractError::ControllerNotFound { target }
            | ContractError::ActionNotFound { target }
            | ContractError::ArityMismatch { target, .. }
            | ContractError::InvalidParameter { target, .. } => target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route;

    #[test]
    fn test_messages_name_the_target() {
        let err = ContractError::ArityMismatch {
            target: route("user", "main", "show"),
            required: 2,
            total: 3,
            received: 1,
        };
        assert_eq!(
            err.to_string(),
            "user/main/show expects 2..=3 parameters, received 1"
        );
        assert_eq!(err.target().action, "show");

        let param = ParamError::new("u64", Some("abc")).at(1);
        assert_eq!(param.to_string(), "parameter 1 expects u64, got Some(\"abc\")");
    }
}
