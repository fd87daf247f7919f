use regstep_core::EntityKind;
use thiserror::Error;

use crate::persister::PersistError;

/// Error from a failed compensation during rollback.
#[derive(Debug, Error)]
#[error("compensation failed for '{kind}': {description}")]
pub struct CompensationError {
    /// Kind whose effect could not be undone.
    pub kind: EntityKind,
    /// What the compensation was trying to do.
    pub description: String,
    #[source]
    pub error: PersistError,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChainError {
    #[error("handler chain has no handlers")]
    EmptyChain,

    #[error("entity kind '{0}' appears more than once in the chain")]
    DuplicateEntityKind(EntityKind),

    /// A handler failed under the rollback policy and every earlier effect was undone.
    #[error("handler for '{kind}' failed, chain rolled back")]
    RolledBack {
        kind: EntityKind,
        #[source]
        source: PersistError,
    },

    /// A handler failed under the rollback policy and some effects could not be undone.
    #[error("handler for '{failed_kind}' failed, and {} compensation(s) also failed", compensation_errors.len())]
    CompensationFailed {
        failed_kind: EntityKind,
        error: PersistError,
        compensation_errors: Vec<CompensationError>,
    },
}

pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_kind_error_names_kind() {
        let err = ChainError::DuplicateEntityKind(EntityKind::CustomerAddress);

        assert!(err.to_string().contains("customer_address"));
    }

    #[test]
    fn rolled_back_error_has_source() {
        let err = ChainError::RolledBack {
            kind: EntityKind::Customer,
            source: PersistError::Operation {
                operation: "insert_customer".to_string(),
                message: "boom".to_string(),
            },
        };

        let source = std::error::Error::source(&err);

        assert!(source.is_some());
    }

    #[test]
    fn compensation_failed_error_counts_failures() {
        let err = ChainError::CompensationFailed {
            failed_kind: EntityKind::CustomerPaymentSettings,
            error: PersistError::Operation {
                operation: "insert_customer_payment_settings".to_string(),
                message: "boom".to_string(),
            },
            compensation_errors: vec![CompensationError {
                kind: EntityKind::Customer,
                description: "remove inserted customer".to_string(),
                error: PersistError::Operation {
                    operation: "undo_insert_customer".to_string(),
                    message: "locked".to_string(),
                },
            }],
        };

        assert!(err.to_string().contains("1 compensation(s)"));
    }
}
