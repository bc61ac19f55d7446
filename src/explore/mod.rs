//! Shared exploration query library.
//!
//! Everything between the filter state and the embedded engine lives here,
//! consumed by both the reactive pipeline and the CLI.
//!
//! # Module structure
//!
//! - [`types`] — granularity, sort key, filter, error type
//! - [`filter`] — the filter-cascade reducer
//! - [`plan`] — typed query-plan IR and its SQL compiler
//! - [`query`] — aggregate/case-list builders, row decoding, execution
//! - [`present`] — display labels, bar values, drill-down inverse

pub mod filter;
pub mod plan;
pub mod present;
pub mod query;
pub mod types;

// Re-export the most commonly used items at the crate::explore level.
pub use filter::{FilterChange, FilterField, apply_change, can_set};
pub use query::{run_aggregate, run_agency_list, run_case_list};
pub use types::{CfrFilter, ExploreError, ExploreResult, Granularity, SortKey};
