//! Embedded-engine access.

pub mod sqlite;

pub use sqlite::SqliteStorage;
