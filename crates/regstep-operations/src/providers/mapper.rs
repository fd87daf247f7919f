use indexmap::IndexMap;
use regstep_core::{FieldMap, MappedData, StepInput};

use crate::config::{ColumnMapping, StepConfig};
use crate::traits::Mapper;

/// Copies form fields into table columns following a static mapping.
///
/// Every mapped table gets an entry, empty when none of its fields were
/// submitted. Submitted values are copied as-is, blank ones included, so an
/// update can tell "not sent" from "sent empty".
#[derive(Debug, Clone, Default)]
pub struct ColumnMapper {
    tables: IndexMap<String, ColumnMapping>,
}

impl ColumnMapper {
    #[must_use]
    pub fn new(tables: IndexMap<String, ColumnMapping>) -> Self {
        Self { tables }
    }

    #[must_use]
    pub fn from_config(config: &StepConfig) -> Self {
        Self::new(config.mapping().clone())
    }
}

impl Mapper for ColumnMapper {
    fn map(&self, input: &StepInput) -> MappedData {
        self.tables
            .iter()
            .map(|(table, columns)| {
                let data: FieldMap = columns
                    .iter()
                    .filter_map(|(field, column)| {
                        input.field(field).map(|value| (column.clone(), value.clone()))
                    })
                    .collect();
                (table.clone(), data)
            })
            .collect()
    }
}
