use indexmap::IndexMap;
use regstep_core::{EntityId, EntityKind, MappedData, StepInput};

/// Entities persisted during one chain run, in traversal order.
#[derive(Debug, Clone)]
pub struct StepEntityResult<E> {
    entities: IndexMap<EntityKind, E>,
}

impl<E> Default for StepEntityResult<E> {
    fn default() -> Self {
        Self {
            entities: IndexMap::new(),
        }
    }
}

impl<E> StepEntityResult<E> {
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<&E> {
        self.entities.get(&kind)
    }

    #[must_use]
    pub fn contains(&self, kind: EntityKind) -> bool {
        self.entities.contains_key(&kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &E)> {
        self.entities.iter().map(|(kind, entity)| (*kind, entity))
    }

    pub(crate) fn insert(&mut self, kind: EntityKind, entity: E) {
        self.entities.insert(kind, entity);
    }

    pub(crate) fn remove(&mut self, kind: EntityKind) -> Option<E> {
        self.entities.shift_remove(&kind)
    }
}

/// Id produced by every handler that ran; `None` when it produced nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOutcomeLog {
    outcomes: IndexMap<EntityKind, Option<EntityId>>,
}

impl HandlerOutcomeLog {
    /// `None` if the handler for `kind` never ran.
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<Option<EntityId>> {
        self.outcomes.get(&kind).copied()
    }

    #[must_use]
    pub fn produced(&self, kind: EntityKind) -> Option<EntityId> {
        self.get(kind).flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Kinds in the order their handlers ran.
    pub fn executed_kinds(&self) -> impl Iterator<Item = EntityKind> + '_ {
        self.outcomes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, Option<EntityId>)> + '_ {
        self.outcomes.iter().map(|(kind, id)| (*kind, *id))
    }

    pub(crate) fn record(&mut self, kind: EntityKind, id: Option<EntityId>) {
        self.outcomes.insert(kind, id);
    }
}

/// Existing entities loaded before an update chain runs.
#[derive(Debug, Clone)]
pub struct PreloadedEntities<E> {
    entities: IndexMap<EntityKind, E>,
}

impl<E> Default for PreloadedEntities<E> {
    fn default() -> Self {
        Self {
            entities: IndexMap::new(),
        }
    }
}

impl<E> PreloadedEntities<E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: EntityKind, entity: E) {
        self.entities.insert(kind, entity);
    }

    #[must_use]
    pub fn with(mut self, kind: EntityKind, entity: E) -> Self {
        self.insert(kind, entity);
        self
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Option<&E> {
        self.entities.get(&kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// What is left of a context once the chain has run.
#[derive(Debug, Clone)]
pub struct StepContextParts<E> {
    pub input: StepInput,
    pub entities: StepEntityResult<E>,
    pub outcomes: HandlerOutcomeLog,
    pub preloaded: PreloadedEntities<E>,
}

/// State threaded through one chain run.
///
/// Handlers only ever append: they add their entity to the results, record
/// their outcome and publish their id into the input's foreign keys.
#[derive(Debug, Clone)]
pub struct StepContext<E> {
    input: StepInput,
    mapped: MappedData,
    entities: StepEntityResult<E>,
    outcomes: HandlerOutcomeLog,
    preloaded: PreloadedEntities<E>,
}

impl<E> StepContext<E> {
    #[must_use]
    pub fn new(input: StepInput, mapped: MappedData) -> Self {
        Self {
            input,
            mapped,
            entities: StepEntityResult::default(),
            outcomes: HandlerOutcomeLog::default(),
            preloaded: PreloadedEntities::default(),
        }
    }

    #[must_use]
    pub fn with_preloaded(mut self, preloaded: PreloadedEntities<E>) -> Self {
        self.preloaded = preloaded;
        self
    }

    #[must_use]
    pub fn input(&self) -> &StepInput {
        &self.input
    }

    #[must_use]
    pub fn mapped(&self) -> &MappedData {
        &self.mapped
    }

    #[must_use]
    pub fn entities(&self) -> &StepEntityResult<E> {
        &self.entities
    }

    #[must_use]
    pub fn outcomes(&self) -> &HandlerOutcomeLog {
        &self.outcomes
    }

    #[must_use]
    pub fn preloaded(&self) -> &PreloadedEntities<E> {
        &self.preloaded
    }

    #[must_use]
    pub fn into_parts(self) -> StepContextParts<E> {
        StepContextParts {
            input: self.input,
            entities: self.entities,
            outcomes: self.outcomes,
            preloaded: self.preloaded,
        }
    }

    pub(crate) fn input_mut(&mut self) -> &mut StepInput {
        &mut self.input
    }

    pub(crate) fn entities_mut(&mut self) -> &mut StepEntityResult<E> {
        &mut self.entities
    }

    pub(crate) fn outcomes_mut(&mut self) -> &mut HandlerOutcomeLog {
        &mut self.outcomes
    }
}
