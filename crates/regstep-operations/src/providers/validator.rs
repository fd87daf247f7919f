use regstep_core::{StepInput, is_blank};

use crate::config::StepConfig;
use crate::traits::Validator;
use crate::validation::{FieldViolation, ValidationErrorCollector, ValidationErrors};

/// Rejects input whose required fields are missing or blank.
#[derive(Debug, Clone, Default)]
pub struct RequiredFieldsValidator {
    required: Vec<String>,
}

impl RequiredFieldsValidator {
    #[must_use]
    pub fn new(required: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &StepConfig) -> Self {
        Self::new(config.required_fields().iter().cloned())
    }
}

impl Validator for RequiredFieldsValidator {
    fn validate(&self, input: &StepInput) -> Result<(), ValidationErrors> {
        let mut collector = ValidationErrorCollector::new();

        if input.user.as_str().trim().is_empty() {
            collector.push(FieldViolation::new("user", "is required"));
        }
        for field in &self.required {
            if input.field(field).is_none_or(is_blank) {
                collector.push(FieldViolation::new(field.as_str(), "is required"));
            }
        }

        collector.finish()
    }
}
