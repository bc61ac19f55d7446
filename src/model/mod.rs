//! Entity structs shared across the query, pipeline, and presentation layers.

pub mod types;

pub use types::{AggregateRow, CaseRow, QueryExecutor, Row, SqlValue};
