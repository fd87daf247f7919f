use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("field '{field}' does not hold an entity id: {value}")]
    InvalidEntityId { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
