use std::sync::Arc;

use indexmap::IndexMap;
use regstep_chain::HandlerMode;
use regstep_core::EntityKind;

use crate::Result;
use crate::error::StepError;
use crate::traits::{InsertOperation, UpdateOperation};

/// Insert and update operations keyed by entity kind.
pub struct OperationRegistry<E> {
    inserts: IndexMap<EntityKind, Arc<dyn InsertOperation<E>>>,
    updates: IndexMap<EntityKind, Arc<dyn UpdateOperation<E>>>,
}

impl<E> Default for OperationRegistry<E> {
    fn default() -> Self {
        Self {
            inserts: IndexMap::new(),
            updates: IndexMap::new(),
        }
    }
}

impl<E> OperationRegistry<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_insert(mut self, kind: EntityKind, operation: Arc<dyn InsertOperation<E>>) -> Self {
        self.register_insert(kind, operation);
        self
    }

    #[must_use]
    pub fn with_update(mut self, kind: EntityKind, operation: Arc<dyn UpdateOperation<E>>) -> Self {
        self.register_update(kind, operation);
        self
    }

    pub fn register_insert(&mut self, kind: EntityKind, operation: Arc<dyn InsertOperation<E>>) {
        self.inserts.insert(kind, operation);
    }

    pub fn register_update(&mut self, kind: EntityKind, operation: Arc<dyn UpdateOperation<E>>) {
        self.updates.insert(kind, operation);
    }

    #[must_use]
    pub fn insert(&self, kind: EntityKind) -> Option<&dyn InsertOperation<E>> {
        self.inserts.get(&kind).map(|op| op.as_ref())
    }

    #[must_use]
    pub fn update(&self, kind: EntityKind) -> Option<&dyn UpdateOperation<E>> {
        self.updates.get(&kind).map(|op| op.as_ref())
    }

    /// Check that every kind has the operations a chain in `mode` may call.
    ///
    /// Update chains fall back to inserting missing entities, so they need
    /// both operations.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::UnsupportedEntity`] for the first kind lacking an
    /// operation.
    pub fn ensure_registered(
        &self,
        kinds: impl IntoIterator<Item = EntityKind>,
        mode: HandlerMode,
    ) -> Result<()> {
        for kind in kinds {
            if self.insert(kind).is_none() {
                return Err(StepError::UnsupportedEntity {
                    kind,
                    mode: HandlerMode::Insert,
                });
            }
            if mode == HandlerMode::Update && self.update(kind).is_none() {
                return Err(StepError::UnsupportedEntity { kind, mode });
            }
        }
        Ok(())
    }
}

impl<E> std::fmt::Debug for OperationRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("inserts", &self.inserts.keys().collect::<Vec<_>>())
            .field("updates", &self.updates.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockEntity, MockInsertOperation, MockUpdateOperation};

    #[test]
    fn lookup_returns_registered_operation() {
        let registry: OperationRegistry<MockEntity> = OperationRegistry::new()
            .with_insert(
                EntityKind::Customer,
                Arc::new(MockInsertOperation::new("insert_customer")),
            )
            .with_update(
                EntityKind::Customer,
                Arc::new(MockUpdateOperation::new("update_customer")),
            );

        assert_eq!(
            registry.insert(EntityKind::Customer).map(|op| op.name()),
            Some("insert_customer")
        );
        assert_eq!(
            registry.update(EntityKind::Customer).map(|op| op.name()),
            Some("update_customer")
        );
        assert!(registry.insert(EntityKind::CustomerAddress).is_none());
    }

    #[test]
    fn insert_chain_needs_only_insert_operations() {
        let registry: OperationRegistry<MockEntity> = OperationRegistry::new().with_insert(
            EntityKind::Customer,
            Arc::new(MockInsertOperation::new("insert_customer")),
        );

        assert!(
            registry
                .ensure_registered([EntityKind::Customer], HandlerMode::Insert)
                .is_ok()
        );
    }

    #[test]
    fn update_chain_needs_update_operation() {
        let registry: OperationRegistry<MockEntity> = OperationRegistry::new().with_insert(
            EntityKind::CustomerAddress,
            Arc::new(MockInsertOperation::new("insert_customer_address")),
        );

        let result = registry.ensure_registered([EntityKind::CustomerAddress], HandlerMode::Update);

        assert!(matches!(
            result,
            Err(StepError::UnsupportedEntity {
                kind: EntityKind::CustomerAddress,
                mode: HandlerMode::Update,
            })
        ));
    }

    #[test]
    fn missing_insert_is_reported_first() {
        let registry: OperationRegistry<MockEntity> = OperationRegistry::new();

        let result = registry.ensure_registered(EntityKind::ALL, HandlerMode::Update);

        assert!(matches!(
            result,
            Err(StepError::UnsupportedEntity {
                kind: EntityKind::Customer,
                mode: HandlerMode::Insert,
            })
        ));
    }
}
