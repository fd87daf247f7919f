use regstep_core::{MappedData, StepInput};

/// Splits flat form fields into per-table column data.
///
/// Mapping is total: fields without a target column are dropped and tables
/// without data may be missing from the result.
pub trait Mapper: Send + Sync {
    fn map(&self, input: &StepInput) -> MappedData;
}
