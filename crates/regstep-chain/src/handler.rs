use std::fmt;

use regstep_core::{EntityKind, FieldMap, ForeignKeyRole};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audit::{ChainAuditLog, HandlerStatus, MessageLevel};
use crate::context::StepContext;
use crate::persister::{EntityPersister, PersistError, PersistOutcome, PersistedEntity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerMode {
    Insert,
    Update,
}

impl fmt::Display for HandlerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Update => f.write_str("update"),
        }
    }
}

/// What a handler left behind, kept by the chain for rollback.
#[derive(Debug)]
pub(crate) enum HandlerEffect<E> {
    Inserted(E),
    Updated { current: E, previous: E },
    Nothing,
    Failed(PersistError),
}

impl<E> HandlerEffect<E> {
    fn entity(&self) -> Option<&E> {
        match self {
            Self::Inserted(entity) | Self::Updated { current: entity, .. } => Some(entity),
            Self::Nothing | Self::Failed(_) => None,
        }
    }
}

/// One link of a handler chain: persists a single entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityHandler {
    kind: EntityKind,
    table: String,
    foreign_key: Option<ForeignKeyRole>,
    mode: HandlerMode,
}

impl EntityHandler {
    /// Handler inserting `kind` into its default table.
    #[must_use]
    pub fn insert(kind: EntityKind) -> Self {
        Self::new(kind, HandlerMode::Insert)
    }

    /// Handler updating the preloaded `kind`, inserting when nothing was preloaded.
    #[must_use]
    pub fn update(kind: EntityKind) -> Self {
        Self::new(kind, HandlerMode::Update)
    }

    #[must_use]
    pub fn new(kind: EntityKind, mode: HandlerMode) -> Self {
        Self {
            kind,
            table: kind.table_name().to_string(),
            foreign_key: None,
            mode,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Publish the produced id under `role` for the handlers that follow.
    #[must_use]
    pub fn with_foreign_key(mut self, role: ForeignKeyRole) -> Self {
        self.foreign_key = Some(role);
        self
    }

    /// Entity kind this handler persists.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Table whose mapped data the handler reads.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Role the produced id is published under, if any.
    #[must_use]
    pub fn foreign_key(&self) -> Option<ForeignKeyRole> {
        self.foreign_key
    }

    /// Whether the handler inserts or updates.
    #[must_use]
    pub fn mode(&self) -> HandlerMode {
        self.mode
    }

    pub(crate) fn handle<P>(
        &self,
        ctx: &mut StepContext<P::Entity>,
        persister: &P,
        audit: &mut ChainAuditLog,
    ) -> HandlerEffect<P::Entity>
    where
        P: EntityPersister,
    {
        audit.record_start(self.kind, &self.table);
        let data = ctx.mapped().table(&self.table).cloned().unwrap_or_default();

        let effect = match self.mode {
            HandlerMode::Insert => {
                self.run_insert(ctx, persister, &data, audit, HandlerStatus::Inserted)
            }
            HandlerMode::Update => self.run_update(ctx, persister, &data, audit),
        };

        let produced = effect.entity().map(PersistedEntity::id);
        if let Some(entity) = effect.entity() {
            ctx.entities_mut().insert(self.kind, entity.clone());
        }
        if let (Some(role), Some(id)) = (self.foreign_key, produced) {
            debug!(kind = %self.kind, role = %role, id = %id, "published foreign key");
            ctx.input_mut().set_foreign_key(role, id);
        }
        ctx.outcomes_mut().record(self.kind, produced);

        effect
    }

    fn run_insert<P>(
        &self,
        ctx: &StepContext<P::Entity>,
        persister: &P,
        data: &FieldMap,
        audit: &mut ChainAuditLog,
        success_status: HandlerStatus,
    ) -> HandlerEffect<P::Entity>
    where
        P: EntityPersister,
    {
        if data.is_empty() {
            debug!(kind = %self.kind, table = %self.table, "inserting without form data");
            audit.message(
                MessageLevel::Info,
                format!("inserting {} without form data", self.kind),
            );
        }

        match persister.insert(self.kind, &self.table, data, ctx.input()) {
            PersistOutcome::Persisted(entity) => {
                let id = entity.id();
                info!(kind = %self.kind, table = %self.table, id = %id, "entity inserted");
                audit.message(
                    MessageLevel::Info,
                    format!("entity with id [{id}] inserted into table {}", self.table),
                );
                audit.record_finish(success_status, Some(id));
                HandlerEffect::Inserted(entity)
            }
            PersistOutcome::Skipped { reason } => self.nothing_produced(audit, reason),
            PersistOutcome::Failed(err) => self.failed(audit, err),
        }
    }

    fn run_update<P>(
        &self,
        ctx: &StepContext<P::Entity>,
        persister: &P,
        data: &FieldMap,
        audit: &mut ChainAuditLog,
    ) -> HandlerEffect<P::Entity>
    where
        P: EntityPersister,
    {
        let Some(existing) = ctx.preloaded().get(self.kind) else {
            if data.is_empty() {
                warn!(kind = %self.kind, "no preloaded entity and no form data, skipping");
                audit.message(
                    MessageLevel::Warning,
                    format!("no entity to update for {} and no form data, skipping", self.kind),
                );
                audit.record_finish(HandlerStatus::Skipped, None);
                return HandlerEffect::Nothing;
            }

            warn!(kind = %self.kind, "entity missing, inserting instead");
            audit.message(
                MessageLevel::Warning,
                format!("entity missing for {}, inserting instead", self.kind),
            );
            return self.run_insert(
                ctx,
                persister,
                data,
                audit,
                HandlerStatus::InsertedInsteadOfUpdate,
            );
        };

        match persister.update(self.kind, &self.table, data, ctx.input(), existing) {
            PersistOutcome::Persisted(entity) => {
                let id = entity.id();
                info!(kind = %self.kind, table = %self.table, id = %id, "entity updated");
                audit.message(
                    MessageLevel::Info,
                    format!("entity with id [{id}] updated in table {}", self.table),
                );
                audit.record_finish(HandlerStatus::Updated, Some(id));
                HandlerEffect::Updated {
                    current: entity,
                    previous: existing.clone(),
                }
            }
            PersistOutcome::Skipped { reason } => {
                warn!(kind = %self.kind, %reason, "update skipped");
                audit.message(MessageLevel::Warning, reason);
                audit.record_finish(HandlerStatus::Skipped, None);
                HandlerEffect::Nothing
            }
            PersistOutcome::Failed(err) => self.failed(audit, err),
        }
    }

    fn nothing_produced<E>(&self, audit: &mut ChainAuditLog, reason: String) -> HandlerEffect<E> {
        warn!(kind = %self.kind, %reason, "no entity produced");
        audit.message(MessageLevel::Warning, reason);
        audit.record_finish(HandlerStatus::NothingProduced, None);
        HandlerEffect::Nothing
    }

    fn failed<E>(&self, audit: &mut ChainAuditLog, err: PersistError) -> HandlerEffect<E> {
        error!(kind = %self.kind, table = %self.table, error = %err, "persisting entity failed");
        audit.message(MessageLevel::Error, err.to_string());
        audit.record_finish(HandlerStatus::Failed, None);
        HandlerEffect::Failed(err)
    }
}
