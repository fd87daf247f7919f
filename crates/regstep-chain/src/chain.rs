use std::collections::HashSet;

use regstep_core::EntityKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::audit::ChainAuditLog;
use crate::context::StepContext;
use crate::error::{ChainError, CompensationError, Result};
use crate::handler::{EntityHandler, HandlerEffect};
use crate::persister::{Compensation, EntityPersister, PersistError};

/// What the chain does when a handler fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and run the remaining handlers.
    #[default]
    #[serde(alias = "continue-on-failure")]
    Continue,
    /// Stop and undo the effects of every earlier handler, newest first.
    #[serde(alias = "rollback-on-failure")]
    Rollback,
}

/// An ordered, validated list of handlers.
///
/// Each entity kind appears at most once. Handlers run in the order they
/// were added; that order encodes foreign-key direction (parent first).
#[derive(Debug, Clone)]
pub struct HandlerChain {
    handlers: Vec<EntityHandler>,
    policy: FailurePolicy,
}

impl HandlerChain {
    /// Build a chain from a declarative handler list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or names an entity kind twice.
    pub fn from_handlers(
        handlers: impl IntoIterator<Item = EntityHandler>,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let handlers: Vec<_> = handlers.into_iter().collect();
        if handlers.is_empty() {
            return Err(ChainError::EmptyChain);
        }

        let mut seen = HashSet::new();
        for handler in &handlers {
            if !seen.insert(handler.kind()) {
                return Err(ChainError::DuplicateEntityKind(handler.kind()));
            }
        }

        Ok(Self { handlers, policy })
    }

    #[must_use]
    pub fn handlers(&self) -> &[EntityHandler] {
        &self.handlers
    }

    pub fn kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.handlers.iter().map(EntityHandler::kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run every handler once, in order, against `ctx`.
    ///
    /// # Errors
    ///
    /// Only fails under [`FailurePolicy::Rollback`], after a handler failed
    /// and earlier effects were compensated.
    pub fn execute<P>(&self, ctx: &mut StepContext<P::Entity>, persister: &P) -> Result<()>
    where
        P: EntityPersister,
    {
        let (result, _audit_log) = self.execute_internal(ctx, persister);
        result
    }

    /// Run the chain and return both the result and an audit log.
    pub fn execute_with_audit<P>(
        &self,
        ctx: &mut StepContext<P::Entity>,
        persister: &P,
    ) -> (Result<()>, ChainAuditLog)
    where
        P: EntityPersister,
    {
        self.execute_internal(ctx, persister)
    }

    fn execute_internal<P>(
        &self,
        ctx: &mut StepContext<P::Entity>,
        persister: &P,
    ) -> (Result<()>, ChainAuditLog)
    where
        P: EntityPersister,
    {
        let mut audit_log = ChainAuditLog::new();
        let mut compensation_stack: Vec<(EntityKind, HandlerEffect<P::Entity>)> = Vec::new();

        for handler in &self.handlers {
            let effect = handler.handle(ctx, persister, &mut audit_log);

            match effect {
                HandlerEffect::Failed(err) => {
                    if self.policy == FailurePolicy::Rollback {
                        let error = Self::compensate(
                            ctx,
                            persister,
                            &mut audit_log,
                            compensation_stack,
                            handler.kind(),
                            err,
                        );
                        return (Err(error), audit_log);
                    }
                }
                HandlerEffect::Inserted(_) | HandlerEffect::Updated { .. } => {
                    compensation_stack.push((handler.kind(), effect));
                }
                HandlerEffect::Nothing => {}
            }
        }

        debug!(handlers = self.handlers.len(), "handler chain finished");
        (Ok(()), audit_log)
    }

    fn compensate<P>(
        ctx: &mut StepContext<P::Entity>,
        persister: &P,
        audit_log: &mut ChainAuditLog,
        mut compensation_stack: Vec<(EntityKind, HandlerEffect<P::Entity>)>,
        failed_kind: EntityKind,
        failure: PersistError,
    ) -> ChainError
    where
        P: EntityPersister,
    {
        warn!(
            kind = %failed_kind,
            count = compensation_stack.len(),
            "rolling back handler chain"
        );
        let mut compensation_errors = Vec::new();

        while let Some((kind, effect)) = compensation_stack.pop() {
            let (compensation, description) = match &effect {
                HandlerEffect::Inserted(entity) => (
                    Compensation::RemoveInserted(entity),
                    format!("remove inserted {kind}"),
                ),
                HandlerEffect::Updated { current, previous } => (
                    Compensation::RestorePrevious { current, previous },
                    format!("restore previous {kind}"),
                ),
                HandlerEffect::Nothing | HandlerEffect::Failed(_) => continue,
            };

            match persister.compensate(kind, compensation) {
                Ok(()) => {
                    debug!(kind = %kind, "compensated");
                    audit_log.record_compensated(kind);
                    ctx.entities_mut().remove(kind);
                }
                Err(err) => {
                    error!(kind = %kind, error = %err, "compensation failed");
                    audit_log.record_compensation_failed(kind, err.to_string());
                    compensation_errors.push(CompensationError {
                        kind,
                        description,
                        error: err,
                    });
                }
            }
        }

        if compensation_errors.is_empty() {
            ChainError::RolledBack {
                kind: failed_kind,
                source: failure,
            }
        } else {
            ChainError::CompensationFailed {
                failed_kind,
                error: failure,
                compensation_errors,
            }
        }
    }
}
