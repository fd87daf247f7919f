use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regstep_chain::{HandlerMode, PersistedEntity};
use regstep_core::{EntityId, EntityKind, FieldMap, ForeignKeyRole, StepInput, StepKind, UserId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::OperationFailure;
use crate::registry::OperationRegistry;
use crate::traits::{
    EntityLoader, InsertOperation, StatusUpdater, StepEntity, StepStatusUpdate, UpdateOperation,
};

/// Column linking dependent rows to their customer.
pub const CUSTOMER_ID_COLUMN: &str = "customer_id";

const STEP_STARTED: &str = "started";
const STEP_COMPLETED: &str = "completed";

/// A row of the in-memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    #[serde(default)]
    pub attributes: FieldMap,
    /// Per-step progress, only kept on customers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_steps: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<UserId>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl StoredEntity {
    #[must_use]
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self {
            id,
            kind,
            attributes: FieldMap::new(),
            registration_steps: None,
            created_by: None,
            updated_by: None,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, column: &str, value: Value) -> Self {
        self.attributes.insert(column.to_string(), value);
        self
    }

    /// Id of the customer this row belongs to.
    #[must_use]
    pub fn customer_id(&self) -> Option<EntityId> {
        self.attributes
            .get(CUSTOMER_ID_COLUMN)
            .and_then(EntityId::from_value)
    }
}

impl PersistedEntity for StoredEntity {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl StepEntity for StoredEntity {
    fn attribute(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    fn progress(&self) -> Option<Value> {
        self.registration_steps.clone()
    }
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    rows: IndexMap<EntityId, StoredEntity>,
}

impl Table {
    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId::new(self.next_id)
    }

    fn put(&mut self, entity: StoredEntity) {
        self.next_id = self.next_id.max(entity.id.get());
        self.rows.insert(entity.id, entity);
    }
}

#[derive(Debug, Default)]
struct StoreState {
    tables: IndexMap<EntityKind, Table>,
    failures: IndexMap<(EntityKind, HandlerMode), String>,
    load_failures: IndexMap<EntityKind, String>,
    status_updates: Vec<StepStatusUpdate>,
}

impl StoreState {
    fn table(&mut self, kind: EntityKind) -> &mut Table {
        self.tables.entry(kind).or_default()
    }

    fn injected_failure(&self, kind: EntityKind, mode: HandlerMode) -> Result<(), OperationFailure> {
        match self.failures.get(&(kind, mode)) {
            Some(message) => Err(OperationFailure::new(message.clone())),
            None => Ok(()),
        }
    }
}

/// Process-local entity store with one table per entity kind.
///
/// Every kind gets its own id sequence, starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `entities`; id sequences continue after the
    /// highest seeded id of each kind.
    #[must_use]
    pub fn from_snapshot(entities: impl IntoIterator<Item = StoredEntity>) -> Self {
        let mut state = StoreState::default();
        for entity in entities {
            state.table(entity.kind).put(entity);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Make every `mode` operation on `kind` fail with `message`.
    #[must_use]
    pub fn with_failure(self, kind: EntityKind, mode: HandlerMode, message: &str) -> Self {
        self.lock().failures.insert((kind, mode), message.to_string());
        self
    }

    /// Make loading existing rows of `kind` fail with `message`.
    #[must_use]
    pub fn with_load_failure(self, kind: EntityKind, message: &str) -> Self {
        self.lock().load_failures.insert(kind, message.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All rows, table by table.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StoredEntity> {
        self.lock()
            .tables
            .values()
            .flat_map(|table| table.rows.values().cloned())
            .collect()
    }

    #[must_use]
    pub fn get(&self, kind: EntityKind, id: EntityId) -> Option<StoredEntity> {
        self.lock()
            .tables
            .get(&kind)
            .and_then(|table| table.rows.get(&id).cloned())
    }

    #[must_use]
    pub fn rows(&self, kind: EntityKind) -> Vec<StoredEntity> {
        self.lock()
            .tables
            .get(&kind)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn status_updates(&self) -> Vec<StepStatusUpdate> {
        self.lock().status_updates.clone()
    }

    /// Insert and update operations for every entity kind, writing to this store.
    #[must_use]
    pub fn registry(self: &Arc<Self>) -> OperationRegistry<StoredEntity> {
        let mut registry = OperationRegistry::new();
        for kind in EntityKind::ALL {
            registry.register_insert(
                kind,
                Arc::new(StoreInsert {
                    store: Arc::clone(self),
                    kind,
                    name: format!("insert_{kind}"),
                }),
            );
            registry.register_update(
                kind,
                Arc::new(StoreUpdate {
                    store: Arc::clone(self),
                    kind,
                    name: format!("update_{kind}"),
                }),
            );
        }
        registry
    }
}

fn parent_role(kind: EntityKind) -> Option<ForeignKeyRole> {
    match kind {
        EntityKind::Customer => None,
        EntityKind::CustomerAddress
        | EntityKind::CustomerPaymentSettings
        | EntityKind::CustomerInvoicingSettings => Some(ForeignKeyRole::CustomerId),
    }
}

fn initial_progress() -> Value {
    let mut steps = Map::new();
    steps.insert(
        StepKind::CustomerData.name().to_string(),
        Value::from(STEP_STARTED),
    );
    Value::Object(steps)
}

struct StoreInsert {
    store: Arc<InMemoryStore>,
    kind: EntityKind,
    name: String,
}

impl InsertOperation<StoredEntity> for StoreInsert {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        data: &FieldMap,
        user: &UserId,
        input: &StepInput,
    ) -> Result<Option<StoredEntity>, OperationFailure> {
        let mut state = self.store.lock();
        state.injected_failure(self.kind, HandlerMode::Insert)?;

        let mut attributes = data.clone();
        if let Some(role) = parent_role(self.kind) {
            let parent = input.foreign_key(role).ok_or_else(|| {
                OperationFailure::new(format!(
                    "{} requires '{}' but no parent row was saved",
                    self.kind,
                    role.field_name()
                ))
            })?;
            attributes.insert(CUSTOMER_ID_COLUMN.to_string(), parent.into());
        }

        let now = Utc::now();
        let table = state.table(self.kind);
        let entity = StoredEntity {
            id: table.allocate_id(),
            kind: self.kind,
            attributes,
            registration_steps: (self.kind == EntityKind::Customer).then(initial_progress),
            created_by: Some(user.clone()),
            updated_by: Some(user.clone()),
            created_at: now,
            updated_at: now,
        };
        table.put(entity.clone());
        debug!(kind = %self.kind, id = %entity.id, "row inserted");
        Ok(Some(entity))
    }

    fn undo(&self, entity: &StoredEntity) -> Result<(), OperationFailure> {
        let mut state = self.store.lock();
        state
            .table(self.kind)
            .rows
            .shift_remove(&entity.id)
            .map(|_| ())
            .ok_or_else(|| OperationFailure::new(format!("{} {} is already gone", self.kind, entity.id)))
    }
}

struct StoreUpdate {
    store: Arc<InMemoryStore>,
    kind: EntityKind,
    name: String,
}

impl UpdateOperation<StoredEntity> for StoreUpdate {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        data: &FieldMap,
        user: &UserId,
        _input: &StepInput,
        entity: &StoredEntity,
    ) -> Result<Option<StoredEntity>, OperationFailure> {
        let mut state = self.store.lock();
        state.injected_failure(self.kind, HandlerMode::Update)?;

        let table = state.table(self.kind);
        let Some(row) = table.rows.get_mut(&entity.id) else {
            return Err(OperationFailure::new(format!(
                "{} {} does not exist",
                self.kind, entity.id
            )));
        };
        for (column, value) in data {
            row.attributes.insert(column.clone(), value.clone());
        }
        row.updated_by = Some(user.clone());
        row.updated_at = Utc::now();
        debug!(kind = %self.kind, id = %row.id, columns = data.len(), "row updated");
        Ok(Some(row.clone()))
    }

    fn restore(&self, previous: &StoredEntity) -> Result<(), OperationFailure> {
        self.store.lock().table(self.kind).put(previous.clone());
        Ok(())
    }
}

impl EntityLoader<StoredEntity> for InMemoryStore {
    fn find_primary(&self, id: EntityId) -> Result<Option<StoredEntity>, OperationFailure> {
        Ok(self.get(EntityKind::Customer, id))
    }

    fn load_related(
        &self,
        kind: EntityKind,
        primary: &StoredEntity,
    ) -> Result<Option<StoredEntity>, OperationFailure> {
        let state = self.lock();
        if let Some(message) = state.load_failures.get(&kind) {
            return Err(OperationFailure::new(message.clone()));
        }
        Ok(state.tables.get(&kind).and_then(|table| {
            table
                .rows
                .values()
                .find(|row| row.customer_id() == Some(primary.id))
                .cloned()
        }))
    }
}

impl StatusUpdater for InMemoryStore {
    fn update(&self, update: &StepStatusUpdate) -> Result<(), OperationFailure> {
        let mut state = self.lock();
        let Some(customer) = state
            .tables
            .get_mut(&EntityKind::Customer)
            .and_then(|table| table.rows.get_mut(&update.entity_id))
        else {
            return Err(OperationFailure::new(format!(
                "customer {} does not exist",
                update.entity_id
            )));
        };

        let status = if update.completed {
            STEP_COMPLETED
        } else {
            STEP_STARTED
        };
        let mut steps = match customer.registration_steps.take() {
            Some(Value::Object(steps)) => steps,
            _ => Map::new(),
        };
        steps.insert(update.step.name().to_string(), Value::from(status));
        customer.registration_steps = Some(Value::Object(steps));
        customer.updated_by = Some(update.user.clone());
        customer.updated_at = Utc::now();

        state.status_updates.push(update.clone());
        Ok(())
    }
}
