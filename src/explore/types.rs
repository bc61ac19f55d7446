//! Shared types for the exploration library.
//!
//! These are library-side types with no clap dependency; the CLI keeps its
//! own arg enums and converts via `From` impls in `cli.rs`.

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Exploration-specific error.
#[derive(Error, Debug)]
pub enum ExploreError {
    /// Unrecognized user-facing granularity name. Never defaulted.
    #[error("unknown granularity '{0}' (expected title, part, section, or agency)")]
    UnknownGranularity(String),

    /// Unrecognized user-facing sort key name. Never defaulted.
    #[error("unknown sort key '{0}' (expected num-words, num-cases, or case-word-ratio)")]
    UnknownSortKey(String),

    /// Drill-down requested past section, the finest level.
    #[error("granularity '{0}' has no finer level to drill into")]
    TerminalGranularity(Granularity),

    /// The dataset file lacks a relation the schema requires — it was not
    /// produced by the ETL pipeline, or is truncated.
    #[error("dataset is missing table '{0}'")]
    MissingTable(String),

    /// The embedded engine rejected or failed a query.
    #[error("query execution failed: {0}")]
    Execution(String),

    /// A result row came back without a column the decoder requires.
    #[error("result row missing or mistyped column '{0}'")]
    BadColumn(&'static str),
}

/// Convenience alias.
pub type ExploreResult<T> = std::result::Result<T, ExploreError>;

// ---------------------------------------------------------------------------
// Granularity
// ---------------------------------------------------------------------------

/// Level of the regulatory hierarchy results are grouped by.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Title,
    Part,
    Section,
    Agency,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Part => write!(f, "part"),
            Self::Section => write!(f, "section"),
            Self::Agency => write!(f, "agency"),
        }
    }
}

impl std::str::FromStr for Granularity {
    type Err = ExploreError;

    fn from_str(s: &str) -> ExploreResult<Self> {
        match s {
            "title" => Ok(Self::Title),
            "part" => Ok(Self::Part),
            "section" => Ok(Self::Section),
            "agency" => Ok(Self::Agency),
            other => Err(ExploreError::UnknownGranularity(other.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// SortKey
// ---------------------------------------------------------------------------

/// The quantity results are ranked by, and the quantity the aggregation
/// actually computes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    NumWords,
    NumCases,
    /// Distinct case count divided by word count — an "attention density"
    /// signal for regulation text.
    CaseWordRatio,
}

impl SortKey {
    /// Column name the compiled query exposes the ranking value under.
    pub fn metric_column(self) -> &'static str {
        match self {
            Self::NumWords => "num_words",
            Self::NumCases => "num_cases",
            Self::CaseWordRatio => "ratio",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NumWords => write!(f, "num-words"),
            Self::NumCases => write!(f, "num-cases"),
            Self::CaseWordRatio => write!(f, "case-word-ratio"),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = ExploreError;

    fn from_str(s: &str) -> ExploreResult<Self> {
        match s {
            "num-words" | "num_words" => Ok(Self::NumWords),
            "num-cases" | "num_cases" => Ok(Self::NumCases),
            "case-word-ratio" | "case_word_ratio" => Ok(Self::CaseWordRatio),
            other => Err(ExploreError::UnknownSortKey(other.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// The user's filter: either an administering agency, or a position in the
/// title → part → section chain. Never both — see [`crate::explore::filter`]
/// for the cascade rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CfrFilter {
    Agency(String),
    Location {
        title: Option<u32>,
        part: Option<u32>,
        section: Option<u32>,
    },
}

impl Default for CfrFilter {
    fn default() -> Self {
        Self::Location {
            title: None,
            part: None,
            section: None,
        }
    }
}

impl CfrFilter {
    /// True when no field constrains anything.
    pub fn is_empty(&self) -> bool {
        matches!(
            self,
            Self::Location {
                title: None,
                part: None,
                section: None,
            }
        )
    }

    pub fn agency(&self) -> Option<&str> {
        match self {
            Self::Agency(name) => Some(name),
            Self::Location { .. } => None,
        }
    }

    /// The location chain as read by the query builder. An agency filter
    /// reads as an empty chain.
    pub fn location(&self) -> (Option<u32>, Option<u32>, Option<u32>) {
        match self {
            Self::Agency(_) => (None, None, None),
            Self::Location {
                title,
                part,
                section,
            } => (*title, *part, *section),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn granularity_round_trips_through_str() {
        for g in [
            Granularity::Title,
            Granularity::Part,
            Granularity::Section,
            Granularity::Agency,
        ] {
            assert_eq!(Granularity::from_str(&g.to_string()).unwrap(), g);
        }
    }

    #[test]
    fn unknown_granularity_fails_fast() {
        let err = Granularity::from_str("chapter").unwrap_err();
        assert!(matches!(err, ExploreError::UnknownGranularity(_)));
    }

    #[test]
    fn unknown_sort_key_fails_fast() {
        let err = SortKey::from_str("pagerank").unwrap_err();
        assert!(matches!(err, ExploreError::UnknownSortKey(_)));
    }

    #[test]
    fn default_filter_is_empty() {
        let f = CfrFilter::default();
        assert!(f.is_empty());
        assert_eq!(f.agency(), None);
        assert_eq!(f.location(), (None, None, None));
    }

    #[test]
    fn agency_filter_reads_as_empty_location() {
        let f = CfrFilter::Agency("Federal Aviation Administration".into());
        assert!(!f.is_empty());
        assert_eq!(f.location(), (None, None, None));
    }
}
