//! Handler chain for persisting the entities of one registration step.
//!
//! A chain is an ordered list of [`EntityHandler`]s. Each handler persists a
//! single entity kind through an [`EntityPersister`], records the result in a
//! shared [`StepContext`] and publishes the produced id under its foreign-key
//! role so that handlers further down the chain can reference it. A failing
//! handler does not stop the chain unless the chain runs with
//! [`FailurePolicy::Rollback`].

mod audit;
mod builder;
mod chain;
mod context;
mod error;
mod handler;
mod persister;

pub use audit::{ChainAuditLog, HandlerMessage, HandlerRecord, HandlerStatus, MessageLevel};
pub use builder::ChainBuilder;
pub use chain::{FailurePolicy, HandlerChain};
pub use context::{
    HandlerOutcomeLog, PreloadedEntities, StepContext, StepContextParts, StepEntityResult,
};
pub use error::{ChainError, CompensationError};
pub use handler::{EntityHandler, HandlerMode};
pub use persister::{Compensation, EntityPersister, PersistError, PersistOutcome, PersistedEntity};
