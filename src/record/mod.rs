//! Row model and the flat record encoding used in data pages.

mod row;
mod schema;
pub mod serializer;

pub use row::{Row, Value};
pub use schema::{Column, DataType, Schema};
pub use serializer::{decode, encode};
