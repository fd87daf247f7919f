use std::sync::Arc;

use regstep_chain::{
    ChainAuditLog, EntityPersister, HandlerChain, HandlerOutcomeLog, PreloadedEntities,
    StepContext, StepEntityResult,
};
use regstep_core::{EntityKind, MappedData, StepInput};
use tracing::{debug, error, info};

use crate::Result;
use crate::config::DEFAULT_DATA_PROVIDER_FIELD;
use crate::traits::{CompletionChecker, CompletionContext, CompletionReport, Mapper, Validator};

/// Everything a finished chain run leaves for the step to report on.
#[derive(Debug)]
pub struct FinalizedStep<E> {
    pub input: StepInput,
    pub entities: StepEntityResult<E>,
    pub outcomes: HandlerOutcomeLog,
    pub preloaded: PreloadedEntities<E>,
    pub audit: ChainAuditLog,
    pub completion: CompletionReport,
}

impl<E> FinalizedStep<E> {
    /// Entity of `kind` after the run: the persisted one, else the preloaded one.
    #[must_use]
    pub fn current(&self, kind: EntityKind) -> Option<&E> {
        self.entities.get(kind).or_else(|| self.preloaded.get(kind))
    }
}

/// Runs validate, map, chain and completion check for one step request.
pub struct StepFinalizer<E> {
    validator: Arc<dyn Validator>,
    mapper: Arc<dyn Mapper>,
    checker: Arc<dyn CompletionChecker<E>>,
    primary_kind: EntityKind,
    data_provider_field: String,
}

impl<E> StepFinalizer<E> {
    #[must_use]
    pub fn new(
        validator: Arc<dyn Validator>,
        mapper: Arc<dyn Mapper>,
        checker: Arc<dyn CompletionChecker<E>>,
        primary_kind: EntityKind,
    ) -> Self {
        Self {
            validator,
            mapper,
            checker,
            primary_kind,
            data_provider_field: DEFAULT_DATA_PROVIDER_FIELD.to_string(),
        }
    }

    #[must_use]
    pub fn with_data_provider_field(mut self, field: impl Into<String>) -> Self {
        self.data_provider_field = field.into();
        self
    }

    #[must_use]
    pub fn primary_kind(&self) -> EntityKind {
        self.primary_kind
    }

    /// # Errors
    ///
    /// Returns [`StepError::Validation`](crate::StepError::Validation) with
    /// every broken rule.
    pub fn run_validator(&self, input: &StepInput) -> Result<()> {
        self.validator.validate(input).map_err(|errors| {
            info!(violations = errors.len(), "step input rejected");
            errors
        })?;
        Ok(())
    }

    #[must_use]
    pub fn map_step_data(&self, input: &StepInput) -> MappedData {
        let mapped = self.mapper.map(input);
        debug!(tables = mapped.tables().count(), "step data mapped");
        mapped
    }

    /// # Errors
    ///
    /// Returns an error if the chain rolled back.
    pub fn run_saving_chain<P>(
        &self,
        chain: &HandlerChain,
        ctx: &mut StepContext<E>,
        persister: &P,
    ) -> Result<ChainAuditLog>
    where
        P: EntityPersister<Entity = E>,
    {
        let (result, audit) = chain.execute_with_audit(ctx, persister);
        debug!(summary = %audit.summary(), "handler chain finished");
        if let Err(err) = result {
            error!(error = %err, "handler chain failed");
            return Err(err.into());
        }
        Ok(audit)
    }

    #[must_use]
    pub fn run_completion_checker(
        &self,
        input: &StepInput,
        entities: &StepEntityResult<E>,
        preloaded: &PreloadedEntities<E>,
    ) -> CompletionReport {
        let ctx = CompletionContext {
            input,
            entities,
            preloaded,
            primary: entities
                .get(self.primary_kind)
                .or_else(|| preloaded.get(self.primary_kind)),
            data_provider: input.field(&self.data_provider_field),
        };
        self.checker.check(&ctx)
    }

    /// Validate and map `input`, run `chain` and check completion.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (before anything is persisted) or
    /// the chain rolled back.
    pub fn finalize<P>(
        &self,
        chain: &HandlerChain,
        input: StepInput,
        preloaded: PreloadedEntities<E>,
        persister: &P,
    ) -> Result<FinalizedStep<E>>
    where
        P: EntityPersister<Entity = E>,
    {
        self.run_validator(&input)?;
        let mapped = self.map_step_data(&input);

        let mut ctx = StepContext::new(input, mapped).with_preloaded(preloaded);
        let audit = self.run_saving_chain(chain, &mut ctx, persister)?;

        let parts = ctx.into_parts();
        let completion =
            self.run_completion_checker(&parts.input, &parts.entities, &parts.preloaded);

        Ok(FinalizedStep {
            input: parts.input,
            entities: parts.entities,
            outcomes: parts.outcomes,
            preloaded: parts.preloaded,
            audit,
            completion,
        })
    }
}

#[cfg(test)]
mod tests {
    use regstep_chain::{ChainBuilder, EntityHandler};
    use regstep_core::{EntityId, FieldMap, ForeignKeyRole, UserId};
    use serde_json::{Value, json};

    use super::*;
    use crate::StepError;
    use crate::mocks::{
        MockCompletionChecker, MockEntity, MockMapper, MockOperationSet, MockValidator,
    };
    use crate::persister::OperationPersister;

    fn input(fields: Value) -> StepInput {
        StepInput::new(
            UserId::new("user-1"),
            serde_json::from_value::<FieldMap>(fields).expect("valid fields"),
        )
    }

    fn chain() -> HandlerChain {
        ChainBuilder::new()
            .first(EntityHandler::insert(EntityKind::Customer).with_foreign_key(ForeignKeyRole::CustomerId))
            .then(EntityHandler::insert(EntityKind::CustomerAddress))
            .build()
            .expect("valid chain")
    }

    fn finalizer(
        validator: MockValidator,
        checker: Arc<MockCompletionChecker>,
    ) -> StepFinalizer<MockEntity> {
        let mut mapped = MappedData::new();
        mapped.insert_column("customers", "email", json!("a@b.c"));
        StepFinalizer::new(
            Arc::new(validator),
            Arc::new(MockMapper::new(mapped)),
            checker,
            EntityKind::Customer,
        )
    }

    #[test]
    fn validation_failure_stops_before_persistence() {
        let ops = MockOperationSet::new();
        let persister = OperationPersister::new(ops.registry());
        let checker = Arc::new(MockCompletionChecker::complete());
        let finalizer = finalizer(
            MockValidator::rejecting("email", "is required"),
            Arc::clone(&checker),
        );

        let result = finalizer.finalize(
            &chain(),
            input(json!({})),
            PreloadedEntities::new(),
            &persister,
        );

        assert!(matches!(result, Err(StepError::Validation(_))));
        assert_eq!(ops.total_calls(), 0);
        assert!(checker.calls().is_empty());
    }

    #[test]
    fn completion_sees_persisted_primary_and_data_provider() -> anyhow::Result<()> {
        let ops = MockOperationSet::new();
        let persister = OperationPersister::new(ops.registry());
        let checker = Arc::new(MockCompletionChecker::complete());
        let finalizer = finalizer(MockValidator::accepting(), Arc::clone(&checker));

        let finalized = finalizer.finalize(
            &chain(),
            input(json!({"email": "a@b.c", "dataProvider": "crefo"})),
            PreloadedEntities::new(),
            &persister,
        )?;

        assert!(finalized.completion.completed);
        let calls = checker.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].primary, Some(EntityId::new(1)));
        assert_eq!(
            calls[0].entity_kinds,
            vec![EntityKind::Customer, EntityKind::CustomerAddress]
        );
        assert_eq!(calls[0].data_provider, Some(json!("crefo")));
        Ok(())
    }

    #[test]
    fn primary_falls_back_to_preloaded_entity() -> anyhow::Result<()> {
        let ops = MockOperationSet::new();
        let persister = OperationPersister::new(ops.registry());
        let checker = Arc::new(MockCompletionChecker::complete());
        let finalizer = StepFinalizer::new(
            Arc::new(MockValidator::accepting()),
            Arc::new(MockMapper::new(MappedData::new())),
            Arc::clone(&checker) as Arc<dyn CompletionChecker<MockEntity>>,
            EntityKind::Customer,
        );
        let update_chain = ChainBuilder::new()
            .first(EntityHandler::update(EntityKind::Customer))
            .build()?;
        let preloaded =
            PreloadedEntities::new().with(EntityKind::Customer, MockEntity::new(EntityId::new(42)));

        let finalized = finalizer.finalize(&update_chain, input(json!({})), preloaded, &persister)?;

        assert_eq!(checker.calls()[0].primary, Some(EntityId::new(42)));
        assert_eq!(
            finalized.current(EntityKind::Customer).map(|e| e.id),
            Some(EntityId::new(42))
        );
        Ok(())
    }

    #[test]
    fn custom_data_provider_field_is_read() -> anyhow::Result<()> {
        let ops = MockOperationSet::new();
        let persister = OperationPersister::new(ops.registry());
        let checker = Arc::new(MockCompletionChecker::complete());
        let finalizer = finalizer(MockValidator::accepting(), Arc::clone(&checker))
            .with_data_provider_field("provider");

        finalizer.finalize(
            &chain(),
            input(json!({"provider": true, "dataProvider": "ignored"})),
            PreloadedEntities::new(),
            &persister,
        )?;

        assert_eq!(checker.calls()[0].data_provider, Some(json!(true)));
        Ok(())
    }
}
