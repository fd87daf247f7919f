use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use regstep_chain::PersistedEntity;
use regstep_core::{EntityId, EntityKind, FieldMap, MappedData, StepInput, UserId};
use serde_json::Value;

use crate::error::OperationFailure;
use crate::registry::OperationRegistry;
use crate::traits::{
    CompletionChecker, CompletionContext, CompletionReport, EntityLoader, InsertOperation,
    Mapper, StatusUpdater, StepEntity, StepStatusUpdate, UpdateOperation, Validator,
};
use crate::validation::{FieldViolation, ValidationErrors};

#[derive(Debug, Clone, PartialEq)]
pub struct MockEntity {
    pub id: EntityId,
    pub data: FieldMap,
    pub progress: Option<Value>,
}

impl MockEntity {
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            data: FieldMap::new(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: &str, value: Value) -> Self {
        self.data.insert(column.to_string(), value);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Value) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl PersistedEntity for MockEntity {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl StepEntity for MockEntity {
    fn attribute(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    fn progress(&self) -> Option<Value> {
        self.progress.clone()
    }
}

/// Arguments seen by a mock operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationCall {
    pub data: FieldMap,
    pub user: UserId,
    pub step_data: FieldMap,
}

enum MockBehaviour {
    Succeed,
    Fail(String),
    ReturnNothing,
}

pub struct MockInsertOperation {
    name: String,
    behaviour: MockBehaviour,
    ids: Arc<AtomicU64>,
    progress: Option<Value>,
    calls: Mutex<Vec<OperationCall>>,
    undone: Mutex<Vec<EntityId>>,
    fail_undo: bool,
}

impl MockInsertOperation {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behaviour: MockBehaviour::Succeed,
            ids: Arc::new(AtomicU64::new(1)),
            progress: None,
            calls: Mutex::new(Vec::new()),
            undone: Mutex::new(Vec::new()),
            fail_undo: false,
        }
    }

    #[must_use]
    pub fn failing(name: &str, message: &str) -> Self {
        let mut op = Self::new(name);
        op.behaviour = MockBehaviour::Fail(message.to_string());
        op
    }

    #[must_use]
    pub fn returning_nothing(name: &str) -> Self {
        let mut op = Self::new(name);
        op.behaviour = MockBehaviour::ReturnNothing;
        op
    }

    /// Draw ids from a sequence shared with other operations.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<AtomicU64>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Value) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn with_failing_undo(mut self) -> Self {
        self.fail_undo = true;
        self
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<OperationCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn undone(&self) -> Vec<EntityId> {
        self.undone.lock().expect("undone lock poisoned").clone()
    }
}

impl InsertOperation<MockEntity> for MockInsertOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        data: &FieldMap,
        user: &UserId,
        input: &StepInput,
    ) -> Result<Option<MockEntity>, OperationFailure> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(OperationCall {
                data: data.clone(),
                user: user.clone(),
                step_data: input.step_data(),
            });

        match &self.behaviour {
            MockBehaviour::Fail(message) => Err(OperationFailure::new(message.clone())),
            MockBehaviour::ReturnNothing => Ok(None),
            MockBehaviour::Succeed => {
                let id = EntityId::new(self.ids.fetch_add(1, Ordering::SeqCst));
                Ok(Some(MockEntity {
                    id,
                    data: data.clone(),
                    progress: self.progress.clone(),
                }))
            }
        }
    }

    fn undo(&self, entity: &MockEntity) -> Result<(), OperationFailure> {
        if self.fail_undo {
            return Err(OperationFailure::new("row is locked"));
        }
        self.undone
            .lock()
            .expect("undone lock poisoned")
            .push(entity.id);
        Ok(())
    }
}

pub struct MockUpdateOperation {
    name: String,
    behaviour: MockBehaviour,
    calls: Mutex<Vec<OperationCall>>,
    restored: Mutex<Vec<MockEntity>>,
}

impl MockUpdateOperation {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behaviour: MockBehaviour::Succeed,
            calls: Mutex::new(Vec::new()),
            restored: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing(name: &str, message: &str) -> Self {
        let mut op = Self::new(name);
        op.behaviour = MockBehaviour::Fail(message.to_string());
        op
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<OperationCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn restored(&self) -> Vec<MockEntity> {
        self.restored.lock().expect("restored lock poisoned").clone()
    }
}

impl UpdateOperation<MockEntity> for MockUpdateOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        data: &FieldMap,
        user: &UserId,
        input: &StepInput,
        entity: &MockEntity,
    ) -> Result<Option<MockEntity>, OperationFailure> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(OperationCall {
                data: data.clone(),
                user: user.clone(),
                step_data: input.step_data(),
            });

        match &self.behaviour {
            MockBehaviour::Fail(message) => Err(OperationFailure::new(message.clone())),
            MockBehaviour::ReturnNothing => Ok(None),
            MockBehaviour::Succeed => {
                let mut updated = entity.clone();
                for (column, value) in data {
                    updated.data.insert(column.clone(), value.clone());
                }
                Ok(Some(updated))
            }
        }
    }

    fn restore(&self, previous: &MockEntity) -> Result<(), OperationFailure> {
        self.restored
            .lock()
            .expect("restored lock poisoned")
            .push(previous.clone());
        Ok(())
    }
}

/// One insert and one update mock per entity kind, sharing an id sequence.
pub struct MockOperationSet {
    ids: Arc<AtomicU64>,
    inserts: IndexMap<EntityKind, Arc<MockInsertOperation>>,
    updates: IndexMap<EntityKind, Arc<MockUpdateOperation>>,
}

impl MockOperationSet {
    #[must_use]
    pub fn new() -> Self {
        let ids = Arc::new(AtomicU64::new(1));
        let inserts = EntityKind::ALL
            .into_iter()
            .map(|kind| {
                let op = MockInsertOperation::new(&format!("insert_{kind}")).with_ids(Arc::clone(&ids));
                (kind, Arc::new(op))
            })
            .collect();
        let updates = EntityKind::ALL
            .into_iter()
            .map(|kind| (kind, Arc::new(MockUpdateOperation::new(&format!("update_{kind}")))))
            .collect();
        Self {
            ids,
            inserts,
            updates,
        }
    }

    /// Replace the insert mock of `kind`; it keeps drawing from the shared ids.
    #[must_use]
    pub fn with_insert(mut self, kind: EntityKind, op: MockInsertOperation) -> Self {
        let op = op.with_ids(Arc::clone(&self.ids));
        self.inserts.insert(kind, Arc::new(op));
        self
    }

    #[must_use]
    pub fn with_update(mut self, kind: EntityKind, op: MockUpdateOperation) -> Self {
        self.updates.insert(kind, Arc::new(op));
        self
    }

    /// # Panics
    ///
    /// Panics if no insert mock exists for `kind`.
    #[must_use]
    pub fn insert(&self, kind: EntityKind) -> &MockInsertOperation {
        self.inserts.get(&kind).expect("insert mock registered")
    }

    /// # Panics
    ///
    /// Panics if no update mock exists for `kind`.
    #[must_use]
    pub fn update(&self, kind: EntityKind) -> &MockUpdateOperation {
        self.updates.get(&kind).expect("update mock registered")
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        let inserts: usize = self.inserts.values().map(|op| op.calls().len()).sum();
        let updates: usize = self.updates.values().map(|op| op.calls().len()).sum();
        inserts + updates
    }

    #[must_use]
    pub fn registry(&self) -> OperationRegistry<MockEntity> {
        let mut registry = OperationRegistry::new();
        for (kind, op) in &self.inserts {
            registry.register_insert(*kind, Arc::clone(op) as Arc<dyn InsertOperation<MockEntity>>);
        }
        for (kind, op) in &self.updates {
            registry.register_update(*kind, Arc::clone(op) as Arc<dyn UpdateOperation<MockEntity>>);
        }
        registry
    }
}

impl Default for MockOperationSet {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MockValidator {
    violations: Vec<FieldViolation>,
    calls: Mutex<usize>,
}

impl MockValidator {
    #[must_use]
    pub fn accepting() -> Self {
        Self {
            violations: Vec::new(),
            calls: Mutex::new(0),
        }
    }

    #[must_use]
    pub fn rejecting(field: &str, message: &str) -> Self {
        Self {
            violations: vec![FieldViolation::new(field, message)],
            calls: Mutex::new(0),
        }
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock poisoned")
    }
}

impl Validator for MockValidator {
    fn validate(&self, _input: &StepInput) -> Result<(), ValidationErrors> {
        *self.calls.lock().expect("calls lock poisoned") += 1;
        match ValidationErrors::try_from_vec(self.violations.clone()) {
            Some(errors) => Err(errors),
            None => Ok(()),
        }
    }
}

pub struct MockMapper {
    mapped: MappedData,
    calls: Mutex<usize>,
}

impl MockMapper {
    #[must_use]
    pub fn new(mapped: MappedData) -> Self {
        Self {
            mapped,
            calls: Mutex::new(0),
        }
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock poisoned")
    }
}

impl Mapper for MockMapper {
    fn map(&self, _input: &StepInput) -> MappedData {
        *self.calls.lock().expect("calls lock poisoned") += 1;
        self.mapped.clone()
    }
}

/// What the completion mock was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionCall {
    pub primary: Option<EntityId>,
    pub entity_kinds: Vec<EntityKind>,
    pub data_provider: Option<Value>,
}

pub struct MockCompletionChecker {
    report: CompletionReport,
    calls: Mutex<Vec<CompletionCall>>,
}

impl MockCompletionChecker {
    #[must_use]
    pub fn complete() -> Self {
        Self::reporting(CompletionReport::complete())
    }

    #[must_use]
    pub fn incomplete(missing: &[&str], errors: &[&str]) -> Self {
        Self::reporting(CompletionReport::incomplete(
            missing.iter().map(ToString::to_string),
            errors.iter().map(ToString::to_string),
        ))
    }

    #[must_use]
    pub fn reporting(report: CompletionReport) -> Self {
        Self {
            report,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl CompletionChecker<MockEntity> for MockCompletionChecker {
    fn check(&self, ctx: &CompletionContext<'_, MockEntity>) -> CompletionReport {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(CompletionCall {
                primary: ctx.primary.map(|entity| entity.id),
                entity_kinds: ctx.entities.iter().map(|(kind, _)| kind).collect(),
                data_provider: ctx.data_provider.cloned(),
            });
        self.report.clone()
    }
}

pub struct MockStatusUpdater {
    failure: Option<String>,
    updates: Mutex<Vec<StepStatusUpdate>>,
}

impl MockStatusUpdater {
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure: None,
            updates: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            updates: Mutex::new(Vec::new()),
        }
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn updates(&self) -> Vec<StepStatusUpdate> {
        self.updates.lock().expect("updates lock poisoned").clone()
    }
}

impl Default for MockStatusUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusUpdater for MockStatusUpdater {
    fn update(&self, update: &StepStatusUpdate) -> Result<(), OperationFailure> {
        self.updates
            .lock()
            .expect("updates lock poisoned")
            .push(update.clone());
        match &self.failure {
            Some(message) => Err(OperationFailure::new(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MockEntityLoader {
    primary: Option<MockEntity>,
    related: IndexMap<EntityKind, MockEntity>,
    failing_related: Vec<EntityKind>,
    primary_error: Option<String>,
    lookups: Mutex<Vec<EntityId>>,
}

impl MockEntityLoader {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_primary(mut self, entity: MockEntity) -> Self {
        self.primary = Some(entity);
        self
    }

    #[must_use]
    pub fn with_related(mut self, kind: EntityKind, entity: MockEntity) -> Self {
        self.related.insert(kind, entity);
        self
    }

    #[must_use]
    pub fn with_failing_related(mut self, kind: EntityKind) -> Self {
        self.failing_related.push(kind);
        self
    }

    #[must_use]
    pub fn with_primary_error(mut self, message: &str) -> Self {
        self.primary_error = Some(message.to_string());
        self
    }

    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn lookups(&self) -> Vec<EntityId> {
        self.lookups.lock().expect("lookups lock poisoned").clone()
    }
}

impl EntityLoader<MockEntity> for MockEntityLoader {
    fn find_primary(&self, id: EntityId) -> Result<Option<MockEntity>, OperationFailure> {
        self.lookups.lock().expect("lookups lock poisoned").push(id);
        if let Some(message) = &self.primary_error {
            return Err(OperationFailure::new(message.clone()));
        }
        Ok(self.primary.clone().filter(|entity| entity.id == id))
    }

    fn load_related(
        &self,
        kind: EntityKind,
        _primary: &MockEntity,
    ) -> Result<Option<MockEntity>, OperationFailure> {
        if self.failing_related.contains(&kind) {
            return Err(OperationFailure::new(format!("{kind} table unavailable")));
        }
        Ok(self.related.get(&kind).cloned())
    }
}
