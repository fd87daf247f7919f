use regstep_core::{EntityId, EntityKind};

use crate::error::OperationFailure;

/// Fetches existing entities before an update step runs.
pub trait EntityLoader<E>: Send + Sync {
    /// Look up the primary entity of the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the store could not be queried. A missing entity
    /// is `Ok(None)`.
    fn find_primary(&self, id: EntityId) -> Result<Option<E>, OperationFailure>;

    /// Look up the entity of `kind` that belongs to `primary`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store could not be queried.
    fn load_related(&self, kind: EntityKind, primary: &E) -> Result<Option<E>, OperationFailure> {
        let _ = (kind, primary);
        Ok(None)
    }
}
