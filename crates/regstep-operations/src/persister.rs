use regstep_chain::{
    Compensation, EntityPersister, HandlerMode, PersistError, PersistOutcome, PersistedEntity,
};
use regstep_core::{EntityKind, FieldMap, StepInput, without_blank};
use tracing::{debug, error, info, warn};

use crate::error::OperationFailure;
use crate::registry::OperationRegistry;

/// [`EntityPersister`] backed by an [`OperationRegistry`].
///
/// Operation failures stop here: they become [`PersistOutcome::Failed`] and
/// are never re-raised to the chain.
#[derive(Debug)]
pub struct OperationPersister<E> {
    registry: OperationRegistry<E>,
}

impl<E> OperationPersister<E> {
    #[must_use]
    pub fn new(registry: OperationRegistry<E>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &OperationRegistry<E> {
        &self.registry
    }
}

fn operation_failed<E>(operation: &str, failure: &OperationFailure) -> PersistOutcome<E> {
    error!(operation, error = %failure, "operation failed");
    PersistOutcome::Failed(PersistError::Operation {
        operation: operation.to_string(),
        message: failure.message().to_string(),
    })
}

fn unsupported<E>(kind: EntityKind, mode: HandlerMode) -> PersistOutcome<E> {
    error!(kind = %kind, mode = %mode, "no operation registered");
    PersistOutcome::Failed(PersistError::UnsupportedEntity { kind, mode })
}

fn compensation_failed(operation: &str, failure: &OperationFailure) -> PersistError {
    PersistError::Operation {
        operation: operation.to_string(),
        message: failure.message().to_string(),
    }
}

impl<E> EntityPersister for OperationPersister<E>
where
    E: PersistedEntity + Send + Sync,
{
    type Entity = E;

    fn insert(
        &self,
        kind: EntityKind,
        table: &str,
        data: &FieldMap,
        input: &StepInput,
    ) -> PersistOutcome<E> {
        let Some(operation) = self.registry.insert(kind) else {
            return unsupported(kind, HandlerMode::Insert);
        };

        debug!(operation = operation.name(), table, columns = data.len(), "running insert");
        match operation.run(data, &input.user, input) {
            Ok(Some(entity)) => PersistOutcome::Persisted(entity),
            Ok(None) => PersistOutcome::skipped(format!(
                "operation '{}' returned no entity",
                operation.name()
            )),
            Err(failure) => operation_failed(operation.name(), &failure),
        }
    }

    fn update(
        &self,
        kind: EntityKind,
        table: &str,
        data: &FieldMap,
        input: &StepInput,
        existing: &E,
    ) -> PersistOutcome<E> {
        let Some(operation) = self.registry.update(kind) else {
            return unsupported(kind, HandlerMode::Update);
        };

        let filtered = without_blank(data);
        if filtered.is_empty() && !data.is_empty() {
            warn!(
                operation = operation.name(),
                table,
                id = %existing.id(),
                "every submitted value is empty, update skipped"
            );
            return PersistOutcome::skipped(format!(
                "every submitted value for {table} is empty"
            ));
        }
        if data.is_empty() {
            info!(
                operation = operation.name(),
                table,
                id = %existing.id(),
                "updating without form data"
            );
        }

        debug!(operation = operation.name(), table, columns = filtered.len(), "running update");
        match operation.run(&filtered, &input.user, input, existing) {
            Ok(Some(entity)) => PersistOutcome::Persisted(entity),
            Ok(None) => PersistOutcome::skipped(format!(
                "operation '{}' returned no entity",
                operation.name()
            )),
            Err(failure) => operation_failed(operation.name(), &failure),
        }
    }

    fn compensate(
        &self,
        kind: EntityKind,
        compensation: Compensation<'_, E>,
    ) -> Result<(), PersistError> {
        match compensation {
            Compensation::RemoveInserted(entity) => {
                let operation = self.registry.insert(kind).ok_or(PersistError::UnsupportedEntity {
                    kind,
                    mode: HandlerMode::Insert,
                })?;
                debug!(operation = operation.name(), id = %entity.id(), "undoing insert");
                operation
                    .undo(entity)
                    .map_err(|failure| compensation_failed(operation.name(), &failure))
            }
            Compensation::RestorePrevious { current, previous } => {
                let operation = self.registry.update(kind).ok_or(PersistError::UnsupportedEntity {
                    kind,
                    mode: HandlerMode::Update,
                })?;
                debug!(
                    operation = operation.name(),
                    id = %current.id(),
                    "restoring previous image"
                );
                operation
                    .restore(previous)
                    .map_err(|failure| compensation_failed(operation.name(), &failure))
            }
        }
    }
}
