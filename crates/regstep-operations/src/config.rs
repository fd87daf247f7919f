use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regstep_chain::FailurePolicy;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PRIMARY_ID_FIELD: &str = "registrationCustomerId";
pub const DEFAULT_DATA_PROVIDER_FIELD: &str = "dataProvider";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read step config '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse step config '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("mapping for table '{table}' sends fields '{first}' and '{second}' to column '{column}'")]
    DuplicateColumn {
        table: String,
        column: String,
        first: String,
        second: String,
    },
}

/// Form field to column mapping of one table.
pub type ColumnMapping = IndexMap<String, String>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawStepSection {
    primary_id_field: Option<String>,
    data_provider_field: Option<String>,
    failure_policy: Option<FailurePolicy>,
    preload_related: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawValidationSection {
    required: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompletionRule {
    #[serde(default)]
    required: Vec<String>,
    /// Table is not required when the form names an external data provider.
    #[serde(default)]
    optional_with_data_provider: bool,
}

impl CompletionRule {
    #[must_use]
    pub fn new(required: &[&str]) -> Self {
        Self {
            required: required.iter().map(ToString::to_string).collect(),
            optional_with_data_provider: false,
        }
    }

    #[must_use]
    pub fn optional_with_data_provider(mut self) -> Self {
        self.optional_with_data_provider = true;
        self
    }

    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    #[must_use]
    pub fn is_optional_with_data_provider(&self) -> bool {
        self.optional_with_data_provider
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStepConfig {
    #[serde(default)]
    step: RawStepSection,
    #[serde(default)]
    validation: RawValidationSection,
    #[serde(default)]
    mapping: IndexMap<String, ColumnMapping>,
    #[serde(default)]
    completion: IndexMap<String, CompletionRule>,
}

/// Settings for the customer-data registration step.
///
/// Tables named in a config file replace the built-in entry for that table;
/// tables the file does not mention keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    primary_id_field: String,
    data_provider_field: String,
    failure_policy: FailurePolicy,
    preload_related: bool,
    required_fields: Vec<String>,
    mapping: IndexMap<String, ColumnMapping>,
    completion: IndexMap<String, CompletionRule>,
}

fn columns(pairs: &[(&str, &str)]) -> ColumnMapping {
    pairs
        .iter()
        .map(|(field, column)| ((*field).to_string(), (*column).to_string()))
        .collect()
}

impl Default for StepConfig {
    fn default() -> Self {
        let mapping = IndexMap::from([
            (
                "customers".to_string(),
                columns(&[
                    ("companyName", "company_name"),
                    ("email", "email"),
                    ("phone", "phone"),
                    ("vatNumber", "vat_number"),
                ]),
            ),
            (
                "customer_addresses".to_string(),
                columns(&[
                    ("street", "street"),
                    ("city", "city"),
                    ("postalCode", "postal_code"),
                    ("country", "country"),
                ]),
            ),
            (
                "customer_payment_settings".to_string(),
                columns(&[
                    ("paymentMethod", "payment_method"),
                    ("iban", "iban"),
                    ("paymentTerms", "payment_terms_days"),
                ]),
            ),
            (
                "customer_invoicing_settings".to_string(),
                columns(&[
                    ("invoiceEmail", "invoice_email"),
                    ("invoiceLanguage", "language"),
                    ("eInvoicing", "e_invoicing"),
                ]),
            ),
        ]);
        let completion = IndexMap::from([
            (
                "customers".to_string(),
                CompletionRule::new(&["company_name", "email"]),
            ),
            (
                "customer_addresses".to_string(),
                CompletionRule::new(&["street", "city", "postal_code", "country"]),
            ),
            (
                "customer_payment_settings".to_string(),
                CompletionRule::new(&["payment_method"]).optional_with_data_provider(),
            ),
            (
                "customer_invoicing_settings".to_string(),
                CompletionRule::new(&["invoice_email"]),
            ),
        ]);

        Self {
            primary_id_field: DEFAULT_PRIMARY_ID_FIELD.to_string(),
            data_provider_field: DEFAULT_DATA_PROVIDER_FIELD.to_string(),
            failure_policy: FailurePolicy::default(),
            preload_related: true,
            required_fields: vec!["email".to_string()],
            mapping,
            completion,
        }
    }
}

impl StepConfig {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse config text; `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawStepConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawStepConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut mapping = defaults.mapping;
        for (table, columns) in raw.mapping {
            check_unique_columns(&table, &columns)?;
            mapping.insert(table, columns);
        }
        let mut completion = defaults.completion;
        completion.extend(raw.completion);

        Ok(Self {
            primary_id_field: raw
                .step
                .primary_id_field
                .unwrap_or(defaults.primary_id_field),
            data_provider_field: raw
                .step
                .data_provider_field
                .unwrap_or(defaults.data_provider_field),
            failure_policy: raw.step.failure_policy.unwrap_or(defaults.failure_policy),
            preload_related: raw.step.preload_related.unwrap_or(defaults.preload_related),
            required_fields: raw.validation.required.unwrap_or(defaults.required_fields),
            mapping,
            completion,
        })
    }

    /// Form field carrying the primary entity id in update requests.
    #[must_use]
    pub fn primary_id_field(&self) -> &str {
        &self.primary_id_field
    }

    #[must_use]
    pub fn data_provider_field(&self) -> &str {
        &self.data_provider_field
    }

    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    #[must_use]
    pub fn preload_related(&self) -> bool {
        self.preload_related
    }

    #[must_use]
    pub fn required_fields(&self) -> &[String] {
        &self.required_fields
    }

    #[must_use]
    pub fn mapping(&self) -> &IndexMap<String, ColumnMapping> {
        &self.mapping
    }

    #[must_use]
    pub fn completion(&self) -> &IndexMap<String, CompletionRule> {
        &self.completion
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn with_preload_related(mut self, preload_related: bool) -> Self {
        self.preload_related = preload_related;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_required_fields(mut self, fields: &[&str]) -> Self {
        self.required_fields = fields.iter().map(ToString::to_string).collect();
        self
    }
}

fn check_unique_columns(table: &str, mapping: &ColumnMapping) -> Result<(), ConfigError> {
    let mut seen: IndexMap<&str, &str> = IndexMap::new();
    for (field, column) in mapping {
        if let Some(first) = seen.insert(column.as_str(), field.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                table: table.to_string(),
                column: column.clone(),
                first: first.to_string(),
                second: field.clone(),
            });
        }
    }
    Ok(())
}
