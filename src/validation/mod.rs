mod extract;
pub mod mapper;
pub mod schema;

pub use extract::{RequestSchema, ValidatedJson};
pub use schema::{FieldRule, Schema};
