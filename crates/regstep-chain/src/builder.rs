use std::marker::PhantomData;

use crate::chain::{FailurePolicy, HandlerChain};
use crate::error::Result;
use crate::handler::EntityHandler;

/// Marker type for a builder with no handlers.
pub struct Empty;

/// Marker type for a builder with at least one handler.
pub struct HasHandlers;

/// Type-state builder for handler chains.
///
/// A chain cannot be built before its first handler is added:
///
/// ```compile_fail
/// use regstep_chain::ChainBuilder;
///
/// // `build()` is only available after `first()`
/// let chain = ChainBuilder::new().build();
/// ```
///
/// Duplicate entity kinds are rejected when the chain is built:
///
/// ```
/// use regstep_chain::{ChainBuilder, ChainError, EntityHandler};
/// use regstep_core::EntityKind;
///
/// let result = ChainBuilder::new()
///     .first(EntityHandler::insert(EntityKind::Customer))
///     .then(EntityHandler::insert(EntityKind::Customer))
///     .build();
///
/// assert!(matches!(result, Err(ChainError::DuplicateEntityKind(EntityKind::Customer))));
/// ```
pub struct ChainBuilder<State> {
    handlers: Vec<EntityHandler>,
    policy: FailurePolicy,
    _state: PhantomData<State>,
}

impl ChainBuilder<Empty> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            policy: FailurePolicy::default(),
            _state: PhantomData,
        }
    }

    /// Add the head of the chain.
    #[must_use]
    pub fn first(self, handler: EntityHandler) -> ChainBuilder<HasHandlers> {
        let mut handlers = self.handlers;
        handlers.push(handler);
        ChainBuilder {
            handlers,
            policy: self.policy,
            _state: PhantomData,
        }
    }
}

impl Default for ChainBuilder<Empty> {
    fn default() -> Self {
        Self::new()
    }
}

impl<State> ChainBuilder<State> {
    #[must_use]
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl ChainBuilder<HasHandlers> {
    /// Append a handler; it runs after every handler added before it.
    #[must_use]
    pub fn then(mut self, handler: EntityHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    /// # Errors
    ///
    /// Returns an error if an entity kind was added twice.
    pub fn build(self) -> Result<HandlerChain> {
        HandlerChain::from_handlers(self.handlers, self.policy)
    }
}
