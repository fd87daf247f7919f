mod completion;
mod mapper;
mod memory;
mod validator;

pub use completion::RequiredColumnsChecker;
pub use mapper::ColumnMapper;
pub use memory::{CUSTOMER_ID_COLUMN, InMemoryStore, StoredEntity};
pub use validator::RequiredFieldsValidator;
