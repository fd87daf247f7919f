use std::collections::BTreeSet;

use indexmap::IndexMap;
use regstep_core::{EntityKind, is_blank};
use tracing::debug;

use crate::config::{ColumnMapping, CompletionRule, StepConfig};
use crate::traits::{CompletionChecker, CompletionContext, CompletionReport, StepEntity};

/// Marks a step complete once every required column of every table holds a value.
///
/// Missing columns are reported under the form field that feeds them, so
/// the caller can point at the right input.
#[derive(Debug, Clone, Default)]
pub struct RequiredColumnsChecker {
    rules: IndexMap<String, CompletionRule>,
    mapping: IndexMap<String, ColumnMapping>,
}

impl RequiredColumnsChecker {
    #[must_use]
    pub fn new(
        rules: IndexMap<String, CompletionRule>,
        mapping: IndexMap<String, ColumnMapping>,
    ) -> Self {
        Self { rules, mapping }
    }

    #[must_use]
    pub fn from_config(config: &StepConfig) -> Self {
        Self::new(config.completion().clone(), config.mapping().clone())
    }

    fn field_name(&self, table: &str, column: &str) -> String {
        self.mapping
            .get(table)
            .and_then(|columns| {
                columns
                    .iter()
                    .find(|(_, mapped)| mapped.as_str() == column)
                    .map(|(field, _)| field.clone())
            })
            .unwrap_or_else(|| format!("{table}.{column}"))
    }
}

fn kind_for_table(table: &str) -> Option<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .find(|kind| kind.table_name() == table)
}

impl<E: StepEntity> CompletionChecker<E> for RequiredColumnsChecker {
    fn check(&self, ctx: &CompletionContext<'_, E>) -> CompletionReport {
        let mut missing = BTreeSet::new();
        let mut errors = Vec::new();

        for (table, rule) in &self.rules {
            if rule.is_optional_with_data_provider() && ctx.has_data_provider() {
                debug!(table = %table, "table supplied by data provider");
                continue;
            }
            let Some(kind) = kind_for_table(table) else {
                errors.push(format!("no entity kind is stored in table {table}"));
                continue;
            };

            let Some(entity) = ctx.entity(kind) else {
                errors.push(format!("{kind} has not been saved"));
                missing.extend(
                    rule.required()
                        .iter()
                        .map(|column| self.field_name(table, column)),
                );
                continue;
            };

            let absent: Vec<_> = rule
                .required()
                .iter()
                .filter(|column| entity.attribute(column).is_none_or(is_blank))
                .collect();
            if !absent.is_empty() {
                errors.push(format!(
                    "{kind} is missing {} required field(s)",
                    absent.len()
                ));
                missing.extend(absent.iter().map(|column| self.field_name(table, column)));
            }
        }

        if errors.is_empty() {
            CompletionReport::complete()
        } else {
            CompletionReport::incomplete(missing, errors)
        }
    }
}
