use regstep_core::{EntityId, StepKind, UserId};
use serde::Serialize;

use crate::error::OperationFailure;

/// Status change sent once a step is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStatusUpdate {
    pub entity_id: EntityId,
    pub step: StepKind,
    pub user: UserId,
    pub completed: bool,
}

/// Records step completion against the primary entity.
pub trait StatusUpdater: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the status could not be stored.
    fn update(&self, update: &StepStatusUpdate) -> Result<(), OperationFailure>;
}
