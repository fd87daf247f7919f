use std::fmt::Debug;

use regstep_core::{EntityId, EntityKind, FieldMap, StepInput};
use thiserror::Error;

use crate::handler::HandlerMode;

/// A stored row that a handler can hand to the next one.
pub trait PersistedEntity: Clone + Debug {
    fn id(&self) -> EntityId;
}

/// Why a persistence attempt produced no entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PersistError {
    #[error("no {mode} operation registered for entity kind '{kind}'")]
    UnsupportedEntity { kind: EntityKind, mode: HandlerMode },

    #[error("operation '{operation}' failed: {message}")]
    Operation { operation: String, message: String },
}

/// Result of one insert or update attempt.
///
/// The driver inspects the tag to decide how to continue; nothing is thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome<E> {
    /// The operation returned a stored entity.
    Persisted(E),
    /// The operation was not run or produced nothing, without being an error.
    Skipped { reason: String },
    /// The operation could not be resolved or failed.
    Failed(PersistError),
}

impl<E> PersistOutcome<E> {
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn entity(&self) -> Option<&E> {
        match self {
            Self::Persisted(entity) => Some(entity),
            Self::Skipped { .. } | Self::Failed(_) => None,
        }
    }
}

/// Undo request issued while rolling a chain back.
#[derive(Debug, Clone, Copy)]
pub enum Compensation<'a, E> {
    /// Delete a row the chain inserted.
    RemoveInserted(&'a E),
    /// Put an updated row back to the image it had before the chain ran.
    RestorePrevious { current: &'a E, previous: &'a E },
}

/// Inserts or updates a single entity kind.
pub trait EntityPersister: Send + Sync {
    type Entity: PersistedEntity;

    /// Insert a new entity built from `data` (possibly empty).
    fn insert(
        &self,
        kind: EntityKind,
        table: &str,
        data: &FieldMap,
        input: &StepInput,
    ) -> PersistOutcome<Self::Entity>;

    /// Update `existing` with `data`.
    fn update(
        &self,
        kind: EntityKind,
        table: &str,
        data: &FieldMap,
        input: &StepInput,
        existing: &Self::Entity,
    ) -> PersistOutcome<Self::Entity>;

    /// Undo a persisted effect during rollback.
    ///
    /// The default implementation is a no-op, suitable for stores that cannot
    /// undo writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the effect could not be undone.
    fn compensate(
        &self,
        kind: EntityKind,
        compensation: Compensation<'_, Self::Entity>,
    ) -> Result<(), PersistError> {
        let _ = (kind, compensation);
        Ok(())
    }
}
