//! Normalized entity structs and the query-execution boundary.
//!
//! The dataset itself is produced by an upstream ETL pipeline and loaded into
//! a file-backed SQLite database before this crate ever runs; everything in
//! here is read-only from the core's perspective.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::explore::types::ExploreResult;

// -------------------------------------------------------------------------
// Executor boundary
// -------------------------------------------------------------------------

/// A single SQL value crossing the executor boundary.
///
/// Deliberately smaller than SQLite's own value model: the dataset never
/// stores blobs, so a blob coming back is a decode error, not a variant.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric coercion: integers widen to f64, like SQLite's own arithmetic.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Real(v) => Some(*v),
            SqlValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One result row: field name → value.
pub type Row = BTreeMap<String, SqlValue>;

/// The single capability the core requires from its environment: run a
/// parameterized query, get rows back. Implemented by
/// [`crate::storage::sqlite::SqliteStorage`] in production and by fakes in
/// pipeline tests.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> ExploreResult<Vec<Row>>;
}

// -------------------------------------------------------------------------
// Result rows
// -------------------------------------------------------------------------

/// One ranked aggregate over a regulatory grouping.
///
/// Which of the key fields are populated depends on the granularity the row
/// was grouped at: `title` alone for title granularity, `title`+`part` for
/// part, all three for section, and `agency` alone for agency granularity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateRow {
    pub title: Option<u32>,
    pub part: Option<u32>,
    pub section: Option<u32>,
    pub agency: Option<String>,
    pub description: String,
    /// Total words of regulation text in the grouping, when the sort key
    /// computes it.
    pub num_words: Option<i64>,
    /// Distinct court cases citing the grouping, when the sort key computes
    /// it. Distinct over package ids — one case may have several opinion
    /// documents.
    pub num_cases: Option<i64>,
    /// The ranking value itself (word count, case count, or ratio).
    pub metric: f64,
}

/// One court-opinion document matching the current filter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaseRow {
    pub package_id: String,
    pub granule_id: String,
    pub case_title: String,
    /// YYYY-MM-DD; lexical order is chronological order.
    pub date_opinion_issued: String,
}

impl CaseRow {
    /// govinfo.gov location of the scanned opinion PDF.
    pub fn pdf_url(&self) -> String {
        format!(
            "https://www.govinfo.gov/content/pkg/{}/pdf/{}.pdf",
            self.package_id, self.granule_id
        )
    }
}
