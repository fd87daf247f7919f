use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Flat column (or form field) name to value mapping.
pub type FieldMap = IndexMap<String, Value>;

/// Returns `true` for values that carry no data: `null`, `""`, `[]` and `{}`.
///
/// `false` and `0` are real answers on a registration form and are kept.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Copies `data` without its blank values.
#[must_use]
pub fn without_blank(data: &FieldMap) -> FieldMap {
    data.iter()
        .filter(|(_, value)| !is_blank(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Reads an id from a form value. Accepts unsigned integers and numeric strings.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self),
            Value::String(s) => s.trim().parse().ok().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Value::from(id.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    CustomerAddress,
    CustomerPaymentSettings,
    CustomerInvoicingSettings,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        Self::Customer,
        Self::CustomerAddress,
        Self::CustomerPaymentSettings,
        Self::CustomerInvoicingSettings,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::CustomerAddress => "customer_address",
            Self::CustomerPaymentSettings => "customer_payment_settings",
            Self::CustomerInvoicingSettings => "customer_invoicing_settings",
        }
    }

    /// Storage table the entity lives in.
    #[must_use]
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::CustomerAddress => "customer_addresses",
            Self::CustomerPaymentSettings => "customer_payment_settings",
            Self::CustomerInvoicingSettings => "customer_invoicing_settings",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role under which a handler publishes the id it produced, so that
/// handlers further down the chain can reference their parent row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForeignKeyRole {
    CustomerId,
    CustomerAddressId,
    CustomerPaymentSettingsId,
    CustomerInvoicingSettingsId,
}

impl ForeignKeyRole {
    pub const ALL: [ForeignKeyRole; 4] = [
        Self::CustomerId,
        Self::CustomerAddressId,
        Self::CustomerPaymentSettingsId,
        Self::CustomerInvoicingSettingsId,
    ];

    /// Name the id carries when step data is handed to an operation.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::CustomerId => "customerId",
            Self::CustomerAddressId => "customerAddressId",
            Self::CustomerPaymentSettingsId => "customerPaymentSettingsId",
            Self::CustomerInvoicingSettingsId => "customerInvoicingSettingsId",
        }
    }
}

impl fmt::Display for ForeignKeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForeignKeys(IndexMap<ForeignKeyRole, EntityId>);

impl ForeignKeys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, role: ForeignKeyRole) -> Option<EntityId> {
        self.0.get(&role).copied()
    }

    pub fn set(&mut self, role: ForeignKeyRole, id: EntityId) {
        self.0.insert(role, id);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ForeignKeyRole, EntityId)> + '_ {
        self.0.iter().map(|(role, id)| (*role, *id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CustomerData,
}

impl StepKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CustomerData => "customer_data",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column data per table, as produced by a mapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappedData(IndexMap<String, FieldMap>);

impl MappedData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: impl Into<String>, data: FieldMap) {
        self.0.insert(table.into(), data);
    }

    /// Adds one column, creating the table entry when needed.
    pub fn insert_column(&mut self, table: &str, column: impl Into<String>, value: Value) {
        self.0
            .entry(table.to_string())
            .or_default()
            .insert(column.into(), value);
    }

    #[must_use]
    pub fn table(&self, table: &str) -> Option<&FieldMap> {
        self.0.get(table)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &FieldMap)> {
        self.0.iter().map(|(table, data)| (table.as_str(), data))
    }
}

impl FromIterator<(String, FieldMap)> for MappedData {
    fn from_iter<T: IntoIterator<Item = (String, FieldMap)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Raw data submitted for one registration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    pub user: UserId,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default, rename = "foreignKeys")]
    pub foreign_keys: ForeignKeys,
}

impl StepInput {
    #[must_use]
    pub fn new(user: UserId, fields: FieldMap) -> Self {
        Self {
            user,
            fields,
            foreign_keys: ForeignKeys::new(),
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Reads an entity id stored in a form field.
    ///
    /// A missing or blank field is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field holds something that is not an id.
    pub fn entity_id_field(&self, name: &str) -> crate::Result<Option<EntityId>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(value) if is_blank(value) => Ok(None),
            Some(value) => EntityId::from_value(value)
                .map(Some)
                .ok_or_else(|| CoreError::InvalidEntityId {
                    field: name.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    #[must_use]
    pub fn foreign_key(&self, role: ForeignKeyRole) -> Option<EntityId> {
        self.foreign_keys.get(role)
    }

    pub fn set_foreign_key(&mut self, role: ForeignKeyRole, id: EntityId) {
        self.foreign_keys.set(role, id);
    }

    /// Form fields merged with the published foreign keys, keyed by their field names.
    #[must_use]
    pub fn step_data(&self) -> FieldMap {
        let mut data = self.fields.clone();
        for (role, id) in self.foreign_keys.iter() {
            data.insert(role.field_name().to_string(), id.into());
        }
        data
    }
}
