use regstep_chain::{ChainError, HandlerMode};
use regstep_core::EntityKind;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// Failure reported by an insert, update, load or status operation.
///
/// Converted into a handler outcome at the persister boundary, so it never
/// travels up the chain on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationFailure {
    message: String,
}

impl OperationFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("unable to preload data for update: {reason}")]
    Preload { reason: String },

    #[error("no {mode} operation registered for entity kind '{kind}'")]
    UnsupportedEntity { kind: EntityKind, mode: HandlerMode },

    #[error("handler chain failed")]
    Chain(#[from] ChainError),
}

pub type Result<T> = std::result::Result<T, StepError>;
