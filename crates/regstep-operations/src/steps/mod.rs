mod customer_data;

use std::collections::BTreeSet;
use std::sync::Arc;

use regstep_core::{EntityId, StepInput, StepKind};
use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::registry::OperationRegistry;
use crate::traits::{CompletionChecker, EntityLoader, Mapper, StatusUpdater, Validator};

pub use customer_data::{
    SaveCustomerDataStep, UpdateCustomerDataStep, customer_data_chain, customer_data_handlers,
};

/// Outcome of one save or update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// Id of the primary entity, absent when nothing could be saved or loaded.
    pub entity_id: Option<EntityId>,
    /// Whether every required table and column is filled in.
    pub completed: bool,
    /// Progress marker of the primary entity, `[]` without one.
    pub steps: Value,
    pub missing_fields: BTreeSet<String>,
    pub errors: Vec<String>,
}

impl StepReport {
    /// Report for an update whose primary entity could not be loaded.
    #[must_use]
    pub fn preload_failure(message: impl Into<String>) -> Self {
        Self {
            entity_id: None,
            completed: false,
            steps: Value::Array(Vec::new()),
            missing_fields: BTreeSet::new(),
            errors: vec![message.into()],
        }
    }
}

/// A registration step that can persist submitted form data.
pub trait SaveStep: Send + Sync {
    fn step(&self) -> StepKind;

    /// # Errors
    ///
    /// Returns an error if the input fails validation or the handler chain
    /// rolled back. Partial persistence is reported, not raised.
    fn save(&self, input: StepInput) -> Result<StepReport>;
}

/// Collaborators a step is built from.
pub struct StepServices<E> {
    pub validator: Arc<dyn Validator>,
    pub mapper: Arc<dyn Mapper>,
    pub checker: Arc<dyn CompletionChecker<E>>,
    pub status_updater: Arc<dyn StatusUpdater>,
    pub loader: Arc<dyn EntityLoader<E>>,
    pub registry: OperationRegistry<E>,
}
