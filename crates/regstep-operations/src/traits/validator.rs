use regstep_core::StepInput;

use crate::validation::ValidationErrors;

/// Checks raw step input before anything is mapped or persisted.
pub trait Validator: Send + Sync {
    /// # Errors
    ///
    /// Returns every rule the input breaks.
    fn validate(&self, input: &StepInput) -> Result<(), ValidationErrors>;
}
