use std::sync::Arc;

use regstep_chain::{
    ChainError, EntityHandler, FailurePolicy, HandlerChain, HandlerMode, PersistedEntity,
    PreloadedEntities,
};
use regstep_core::{EntityKind, ForeignKeyRole, StepInput, StepKind};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{SaveStep, StepReport, StepServices};
use crate::Result;
use crate::config::StepConfig;
use crate::error::StepError;
use crate::finalizer::{FinalizedStep, StepFinalizer};
use crate::persister::OperationPersister;
use crate::traits::{EntityLoader, StatusUpdater, StepEntity, StepStatusUpdate};

/// Persistence order of the customer-data step; parents come first.
const CUSTOMER_DATA_CHAIN: [(EntityKind, ForeignKeyRole); 4] = [
    (EntityKind::Customer, ForeignKeyRole::CustomerId),
    (EntityKind::CustomerAddress, ForeignKeyRole::CustomerAddressId),
    (
        EntityKind::CustomerPaymentSettings,
        ForeignKeyRole::CustomerPaymentSettingsId,
    ),
    (
        EntityKind::CustomerInvoicingSettings,
        ForeignKeyRole::CustomerInvoicingSettingsId,
    ),
];

#[must_use]
pub fn customer_data_handlers(mode: HandlerMode) -> Vec<EntityHandler> {
    CUSTOMER_DATA_CHAIN
        .into_iter()
        .map(|(kind, role)| EntityHandler::new(kind, mode).with_foreign_key(role))
        .collect()
}

/// # Errors
///
/// Returns an error if the handler list is empty or repeats an entity kind.
pub fn customer_data_chain(
    mode: HandlerMode,
    policy: FailurePolicy,
) -> std::result::Result<HandlerChain, ChainError> {
    HandlerChain::from_handlers(customer_data_handlers(mode), policy)
}

struct CustomerDataStep<E> {
    finalizer: StepFinalizer<E>,
    persister: OperationPersister<E>,
    status_updater: Arc<dyn StatusUpdater>,
    loader: Arc<dyn EntityLoader<E>>,
    chain: HandlerChain,
}

impl<E: StepEntity> CustomerDataStep<E> {
    fn new(services: StepServices<E>, config: &StepConfig, mode: HandlerMode) -> Result<Self> {
        let chain = customer_data_chain(mode, config.failure_policy())?;
        services.registry.ensure_registered(chain.kinds(), mode)?;

        let finalizer = StepFinalizer::new(
            services.validator,
            services.mapper,
            services.checker,
            EntityKind::Customer,
        )
        .with_data_provider_field(config.data_provider_field());

        Ok(Self {
            finalizer,
            persister: OperationPersister::new(services.registry),
            status_updater: services.status_updater,
            loader: services.loader,
            chain,
        })
    }

    fn run(&self, input: StepInput, preloaded: PreloadedEntities<E>) -> Result<StepReport> {
        let finalized = self
            .finalizer
            .finalize(&self.chain, input, preloaded, &self.persister)?;
        Ok(self.report(finalized))
    }

    fn report(&self, finalized: FinalizedStep<E>) -> StepReport {
        let completion = &finalized.completion;
        let mut errors = completion.errors.clone();
        let mut primary = finalized.current(EntityKind::Customer).cloned();

        if completion.completed {
            match primary.take() {
                Some(entity) => {
                    primary = Some(self.mark_completed(entity, &finalized.input, &mut errors));
                }
                None => warn!("step reported complete but no customer was saved"),
            }
        } else {
            warn!(
                missing = ?completion.missing_fields,
                errors = ?completion.errors,
                "step is not complete"
            );
        }

        StepReport {
            entity_id: primary.as_ref().map(PersistedEntity::id),
            completed: completion.completed,
            steps: primary
                .as_ref()
                .and_then(|entity| entity.progress())
                .unwrap_or_else(|| Value::Array(Vec::new())),
            missing_fields: completion.missing_fields.clone(),
            errors,
        }
    }

    /// Record completion and return the customer as stored afterwards.
    fn mark_completed(&self, entity: E, input: &StepInput, errors: &mut Vec<String>) -> E {
        let update = StepStatusUpdate {
            entity_id: entity.id(),
            step: StepKind::CustomerData,
            user: input.user.clone(),
            completed: true,
        };
        if let Err(failure) = self.status_updater.update(&update) {
            warn!(id = %update.entity_id, error = %failure, "step status not updated");
            errors.push(format!("failed to update step status: {failure}"));
            return entity;
        }
        info!(id = %update.entity_id, step = %update.step, "step completed");

        match self.loader.find_primary(update.entity_id) {
            Ok(Some(fresh)) => fresh,
            Ok(None) => entity,
            Err(failure) => {
                debug!(id = %update.entity_id, error = %failure, "could not reload customer");
                entity
            }
        }
    }
}

/// Saves a new customer with address, payment and invoicing settings.
pub struct SaveCustomerDataStep<E> {
    inner: CustomerDataStep<E>,
}

impl<E: StepEntity> SaveCustomerDataStep<E> {
    /// # Errors
    ///
    /// Returns [`StepError::UnsupportedEntity`] if the registry lacks an
    /// insert operation for one of the customer tables.
    pub fn new(services: StepServices<E>, config: &StepConfig) -> Result<Self> {
        Ok(Self {
            inner: CustomerDataStep::new(services, config, HandlerMode::Insert)?,
        })
    }
}

impl<E: StepEntity> SaveStep for SaveCustomerDataStep<E> {
    fn step(&self) -> StepKind {
        StepKind::CustomerData
    }

    fn save(&self, input: StepInput) -> Result<StepReport> {
        self.inner.run(input, PreloadedEntities::new())
    }
}

/// Updates an existing customer, identified by a form field.
pub struct UpdateCustomerDataStep<E> {
    inner: CustomerDataStep<E>,
    primary_id_field: String,
    preload_related: bool,
}

impl<E: StepEntity> UpdateCustomerDataStep<E> {
    /// # Errors
    ///
    /// Returns [`StepError::UnsupportedEntity`] if the registry lacks an
    /// insert or update operation for one of the customer tables.
    pub fn new(services: StepServices<E>, config: &StepConfig) -> Result<Self> {
        Ok(Self {
            inner: CustomerDataStep::new(services, config, HandlerMode::Update)?,
            primary_id_field: config.primary_id_field().to_string(),
            preload_related: config.preload_related(),
        })
    }

    fn preload(&self, input: &StepInput) -> Result<PreloadedEntities<E>> {
        let id = input
            .entity_id_field(&self.primary_id_field)
            .map_err(|err| StepError::Preload {
                reason: err.to_string(),
            })?
            .ok_or_else(|| StepError::Preload {
                reason: format!("field '{}' is missing", self.primary_id_field),
            })?;

        let primary = self
            .inner
            .loader
            .find_primary(id)
            .map_err(|failure| StepError::Preload {
                reason: format!("customer {id} could not be loaded: {failure}"),
            })?
            .ok_or_else(|| StepError::Preload {
                reason: format!("customer {id} not found"),
            })?;

        let mut preloaded = PreloadedEntities::new();
        if self.preload_related {
            for kind in self.inner.chain.kinds().filter(|k| *k != EntityKind::Customer) {
                match self.inner.loader.load_related(kind, &primary) {
                    Ok(Some(entity)) => preloaded.insert(kind, entity),
                    Ok(None) => debug!(kind = %kind, customer = %id, "no related row"),
                    Err(failure) => {
                        warn!(kind = %kind, customer = %id, error = %failure, "related row not loaded");
                    }
                }
            }
        }
        preloaded.insert(EntityKind::Customer, primary);
        Ok(preloaded)
    }
}

/// Publish the ids of preloaded rows up front, so dependent inserts keep
/// their parent key when the parent's own update fails or is skipped.
fn seed_foreign_keys<E: StepEntity>(input: &mut StepInput, preloaded: &PreloadedEntities<E>) {
    for (kind, role) in CUSTOMER_DATA_CHAIN {
        if let Some(entity) = preloaded.get(kind) {
            debug!(kind = %kind, role = %role, id = %entity.id(), "seeded foreign key");
            input.set_foreign_key(role, entity.id());
        }
    }
}

impl<E: StepEntity> SaveStep for UpdateCustomerDataStep<E> {
    fn step(&self) -> StepKind {
        StepKind::CustomerData
    }

    fn save(&self, mut input: StepInput) -> Result<StepReport> {
        match self.preload(&input) {
            Ok(preloaded) => {
                seed_foreign_keys(&mut input, &preloaded);
                self.inner.run(input, preloaded)
            }
            Err(err @ StepError::Preload { .. }) => {
                warn!(error = %err, "update aborted before validation");
                Ok(StepReport::preload_failure(err.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}
