use regstep_core::{FieldMap, StepInput, UserId};

use crate::error::OperationFailure;

/// Creates one entity kind from mapped column data.
pub trait InsertOperation<E>: Send + Sync {
    /// Name used in logs and failure messages.
    fn name(&self) -> &str;

    /// Insert a row built from `data`.
    ///
    /// `input` carries the whole step, including foreign keys published by
    /// earlier handlers. `Ok(None)` means the operation decided not to
    /// create anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the row could not be written.
    fn run(
        &self,
        data: &FieldMap,
        user: &UserId,
        input: &StepInput,
    ) -> Result<Option<E>, OperationFailure>;

    /// Delete a row this operation inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the row could not be removed.
    fn undo(&self, entity: &E) -> Result<(), OperationFailure> {
        let _ = entity;
        Ok(())
    }
}

/// Changes an existing entity of one kind.
pub trait UpdateOperation<E>: Send + Sync {
    fn name(&self) -> &str;

    /// Apply `data` to `entity`; columns absent from `data` are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the row could not be written.
    fn run(
        &self,
        data: &FieldMap,
        user: &UserId,
        input: &StepInput,
        entity: &E,
    ) -> Result<Option<E>, OperationFailure>;

    /// Write `previous` back over the current row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row could not be restored.
    fn restore(&self, previous: &E) -> Result<(), OperationFailure> {
        let _ = previous;
        Ok(())
    }
}
