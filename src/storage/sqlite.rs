//! SQLite-backed implementation of the query-execution boundary.
//!
//! The dataset file is produced upstream and opened read-only; the
//! connection sits behind a mutex so the storage handle can be shared with
//! the pipeline's executor thread.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::explore::query::run_agency_list;
use crate::explore::types::{ExploreError, ExploreResult};
use crate::model::{QueryExecutor, Row, SqlValue};
use crate::schema;

#[derive(Debug)]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open a pre-built dataset file read-only and verify its relations.
    ///
    /// This is the blocking prerequisite step: the pipeline is only
    /// constructed once this succeeds.
    pub fn open(path: &Path) -> ExploreResult<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                ExploreError::Execution(format!(
                    "failed to open dataset at {}: {e}",
                    path.display()
                ))
            })?;
        debug!(path = %path.display(), "opened dataset");
        let storage = Self::from_connection(conn);
        schema::verify_dataset(&storage)?;
        Ok(storage)
    }

    /// Wrap an already-open connection. Used by tests seeding in-memory
    /// datasets; skips relation verification.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// The static agency-name lookup, fetched once at startup.
    pub fn list_agencies(&self) -> ExploreResult<Vec<String>> {
        run_agency_list(self)
    }
}

fn bind_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Real(v) => Value::Real(*v),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

fn read_value(value: ValueRef<'_>) -> ExploreResult<SqlValue> {
    match value {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Integer(v) => Ok(SqlValue::Integer(v)),
        ValueRef::Real(v) => Ok(SqlValue::Real(v)),
        ValueRef::Text(bytes) => String::from_utf8(bytes.to_vec())
            .map(SqlValue::Text)
            .map_err(|e| ExploreError::Execution(format!("non-utf8 text value: {e}"))),
        ValueRef::Blob(_) => Err(ExploreError::Execution(
            "unexpected blob value in dataset".into(),
        )),
    }
}

impl QueryExecutor for SqliteStorage {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> ExploreResult<Vec<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| ExploreError::Execution(format!("prepare failed: {e}")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(bind_value)))
            .map_err(|e| ExploreError::Execution(format!("query failed: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| ExploreError::Execution(format!("row fetch failed: {e}")))?
        {
            let mut map = Row::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| ExploreError::Execution(format!("column read failed: {e}")))?;
                map.insert(name.clone(), read_value(value)?);
            }
            out.push(map);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executes_parameterized_queries() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (n INTEGER, s TEXT, r REAL);
             INSERT INTO t VALUES (1, 'one', 0.5), (2, 'two', 1.5);",
        )
        .unwrap();
        let db = SqliteStorage::from_connection(conn);

        let rows = db
            .execute("SELECT n, s, r FROM t WHERE n = ?1", &[SqlValue::Integer(2)])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["n"], SqlValue::Integer(2));
        assert_eq!(rows[0]["s"], SqlValue::Text("two".into()));
        assert_eq!(rows[0]["r"], SqlValue::Real(1.5));
    }

    #[test]
    fn surfaces_engine_rejection_as_execution_error() {
        let db = SqliteStorage::from_connection(Connection::open_in_memory().unwrap());
        let err = db.execute("SELECT * FROM no_such_table", &[]).unwrap_err();
        assert!(matches!(err, ExploreError::Execution(_)));
    }

    #[test]
    fn open_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.db");
        assert!(SqliteStorage::open(&missing).is_err());
    }

    #[test]
    fn open_rejects_databases_without_the_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path).unwrap();
        let err = SqliteStorage::open(&path).unwrap_err();
        assert!(matches!(err, ExploreError::MissingTable(_)));
    }
}
