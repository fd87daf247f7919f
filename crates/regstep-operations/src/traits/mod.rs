mod completion;
mod entity;
mod loader;
mod mapper;
mod operation;
mod status;
mod validator;

pub use completion::{CompletionChecker, CompletionContext, CompletionReport};
pub use entity::StepEntity;
pub use loader::EntityLoader;
pub use mapper::Mapper;
pub use operation::{InsertOperation, UpdateOperation};
pub use status::{StatusUpdater, StepStatusUpdate};
pub use validator::Validator;
