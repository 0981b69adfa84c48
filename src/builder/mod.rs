//! Fluent builders. Scalar setters overwrite; collection setters append in order.

mod form;
mod table;

pub use form::{FieldBuilder, FormSchemaBuilder};
pub use table::{ActionBuilder, ColumnBuilder, TableSchemaBuilder};
