//! regscope — explore federal regulations ranked by court-opinion attention.
//!
//! A fixed star-schema dataset (CFR structure cross-referenced with federal
//! court opinions, built upstream by an ETL pipeline) is queried through a
//! small reactive engine: three mutually-constraining pieces of user state
//! (filter, granularity, sort key) plus a row limit deterministically derive
//! an aggregation query, which runs against embedded SQLite on a background
//! thread; results republish as the state changes.
//!
//! # Layers
//!
//! - [`schema`] — the five-relation data contract and dataset verification
//! - [`model`] — result-row entities and the [`model::QueryExecutor`] boundary
//! - [`explore`] — filter cascade, query-plan IR, builders, presentation
//! - [`pipeline`] — input cells, sequenced async execution, result streams
//! - [`storage`] — the rusqlite-backed executor
//! - [`cli`] — a thin command-line consumer

pub mod cli;
pub mod explore;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod storage;

pub use cli::{Cli, run};
pub use explore::{CfrFilter, ExploreError, ExploreResult, Granularity, SortKey};
pub use model::{AggregateRow, CaseRow, QueryExecutor};
pub use pipeline::{Pipeline, PipelineInputs, Update};
pub use storage::SqliteStorage;
