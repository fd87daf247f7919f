use std::collections::BTreeSet;

use regstep_chain::{PreloadedEntities, StepEntityResult};
use regstep_core::{EntityKind, StepInput};
use serde_json::Value;

/// Everything a completion rule may look at once the chain has run.
#[derive(Debug)]
pub struct CompletionContext<'a, E> {
    pub input: &'a StepInput,
    pub entities: &'a StepEntityResult<E>,
    pub preloaded: &'a PreloadedEntities<E>,
    /// Primary entity after the chain ran; the preloaded one if the chain
    /// did not touch it.
    pub primary: Option<&'a E>,
    /// Value of the data-provider field, passed through from the form.
    pub data_provider: Option<&'a Value>,
}

impl<E> CompletionContext<'_, E> {
    /// Entity of `kind` as it stands now: persisted by the chain, or preloaded
    /// and left untouched.
    #[must_use]
    pub fn entity(&self, kind: EntityKind) -> Option<&E> {
        self.entities.get(kind).or_else(|| self.preloaded.get(kind))
    }

    /// `true` when the form says the data comes from an external provider.
    #[must_use]
    pub fn has_data_provider(&self) -> bool {
        match self.data_provider {
            None | Some(Value::Null | Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n.abs() > f64::EPSILON),
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReport {
    pub completed: bool,
    pub missing_fields: BTreeSet<String>,
    pub errors: Vec<String>,
}

impl CompletionReport {
    #[must_use]
    pub fn complete() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn incomplete(
        missing_fields: impl IntoIterator<Item = String>,
        errors: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            completed: false,
            missing_fields: missing_fields.into_iter().collect(),
            errors: errors.into_iter().collect(),
        }
    }
}

/// Business rule deciding whether a registration step is done.
pub trait CompletionChecker<E>: Send + Sync {
    fn check(&self, ctx: &CompletionContext<'_, E>) -> CompletionReport;
}
