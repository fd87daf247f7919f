//! Registration step orchestration.
//!
//! A step validates the submitted form, maps its fields onto table columns,
//! persists every table through a [`regstep_chain::HandlerChain`] and then
//! checks whether the step is complete. Storage, validation, mapping and
//! completion rules are collaborators behind the traits in [`traits`];
//! [`providers`] holds config-driven implementations and an in-memory store.

mod config;
mod error;
mod finalizer;
mod persister;
mod registry;
mod validation;

pub mod providers;
pub mod steps;
pub mod traits;

#[cfg(test)]
pub mod mocks;

pub use config::{
    ColumnMapping, CompletionRule, ConfigError, DEFAULT_DATA_PROVIDER_FIELD,
    DEFAULT_PRIMARY_ID_FIELD, StepConfig,
};
pub use error::{OperationFailure, Result, StepError};
pub use finalizer::{FinalizedStep, StepFinalizer};
pub use persister::OperationPersister;
pub use registry::OperationRegistry;
pub use steps::{SaveStep, StepReport, StepServices};
pub use validation::{FieldViolation, ValidationErrorCollector, ValidationErrors};
