use axum::http::StatusCode;
use thiserror::Error;

use crate::controller::ContractError;
use crate::routing::{RouteNotFound, Target};

/// Everything that can end a request without a normal response.
#[derive(Debug, Error)]
pub enum Failure {
    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl Failure {
    /// Default status of the error response.
    pub fn status(&self) -> StatusCode {
        match self {
            Failure::RouteNotFound(_) | Failure::Contract(_) => StatusCode::NOT_FOUND,
            Failure::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The attempted target, when routing got that far.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Failure::Contract(e) => Some(e.target()),
            Failure::RouteNotFound(_) | Failure::Runtime(_) => None,
        }
    }

    /// True for the 404 class (not found and contract violations).
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Failure::Runtime(_))
    }

    /// Label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::RouteNotFound(_) => "not_found",
            Failure::Contract(_) => "contract",
            Failure::Runtime(_) => "error",
        }
    }

    /// The message of this error and all of its sources.
    pub fn chain(&self) -> Vec<String> {
        match self {
            Failure::Runtime(e) => e.chain().map(ToString::to_string).collect(),
            other => {
                let mut messages = vec![other.to_string()];
                let mut source = std::error::Error::source(other);
                while let Some(err) = source {
                    messages.push(err.to_string());
                    source = err.source();
                }
                messages
            }
        }
    }
}
