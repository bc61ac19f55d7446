//! Row → display mappings and the drill-down inverse.
//!
//! Pure functions over the result rows: a label for the left edge of a bar,
//! a numeric value plus formatted string for the bar itself, and the inverse
//! mapping from a clicked row back to a filter at the next-finer granularity.

use crate::model::AggregateRow;

use super::types::{CfrFilter, ExploreError, ExploreResult, Granularity, SortKey};

/// Longest label before the ellipsis rule kicks in.
const LABEL_MAX: usize = 40;

/// Cut strings longer than 40 characters to 37 plus `"..."`.
pub fn truncate_label(s: &str) -> String {
    if s.chars().count() > LABEL_MAX {
        let head: String = s.chars().take(LABEL_MAX - 3).collect();
        format!("{head}...")
    } else {
        s.to_owned()
    }
}

/// Display label for a ranked row at the granularity that produced it.
///
/// Keys missing from the row (a decoder bug, not a user input) are reported
/// as [`ExploreError::BadColumn`] rather than rendered blank.
pub fn label(row: &AggregateRow, granularity: Granularity) -> ExploreResult<String> {
    match granularity {
        Granularity::Title => {
            let title = row.title.ok_or(ExploreError::BadColumn("title"))?;
            Ok(format!("Title {title}: {}", truncate_label(&row.description)))
        }
        Granularity::Part => {
            let title = row.title.ok_or(ExploreError::BadColumn("title"))?;
            let part = row.part.ok_or(ExploreError::BadColumn("part"))?;
            Ok(format!(
                "{title} CFR Part {part}: {}",
                truncate_label(&row.description)
            ))
        }
        Granularity::Section => {
            let title = row.title.ok_or(ExploreError::BadColumn("title"))?;
            let part = row.part.ok_or(ExploreError::BadColumn("part"))?;
            let section = row.section.ok_or(ExploreError::BadColumn("section"))?;
            Ok(format!(
                "{title} CFR §{part}.{section}: {}",
                truncate_label(&row.description)
            ))
        }
        Granularity::Agency => row
            .agency
            .clone()
            .map(|a| truncate_label(&a))
            .ok_or(ExploreError::BadColumn("agency")),
    }
}

/// Numeric value for bar scaling plus its human-readable rendering.
///
/// The ratio is shown per thousand words, rounded to two decimals; counts are
/// shown as plain integers.
pub fn value(row: &AggregateRow, sort_key: SortKey) -> (f64, String) {
    match sort_key {
        SortKey::NumWords | SortKey::NumCases => (row.metric, format!("{}", row.metric as i64)),
        SortKey::CaseWordRatio => {
            let per_thousand = (row.metric * 1000.0 * 100.0).round() / 100.0;
            (row.metric, format!("{per_thousand:.2}"))
        }
    }
}

/// Reconstruct a filter from a clicked row: every key the row's granularity
/// carries, nothing finer. Used together with [`next_granularity`] to drill
/// down.
pub fn row_to_filter(row: &AggregateRow, granularity: Granularity) -> ExploreResult<CfrFilter> {
    match granularity {
        Granularity::Title => Ok(CfrFilter::Location {
            title: Some(row.title.ok_or(ExploreError::BadColumn("title"))?),
            part: None,
            section: None,
        }),
        Granularity::Part => Ok(CfrFilter::Location {
            title: Some(row.title.ok_or(ExploreError::BadColumn("title"))?),
            part: Some(row.part.ok_or(ExploreError::BadColumn("part"))?),
            section: None,
        }),
        Granularity::Section => Ok(CfrFilter::Location {
            title: Some(row.title.ok_or(ExploreError::BadColumn("title"))?),
            part: Some(row.part.ok_or(ExploreError::BadColumn("part"))?),
            section: Some(row.section.ok_or(ExploreError::BadColumn("section"))?),
        }),
        Granularity::Agency => Ok(CfrFilter::Agency(
            row.agency.clone().ok_or(ExploreError::BadColumn("agency"))?,
        )),
    }
}

/// Fixed forward progression for drill-down. Section is terminal; callers
/// guard with [`Granularity::Section`] checks or handle the error.
pub fn next_granularity(current: Granularity) -> ExploreResult<Granularity> {
    match current {
        Granularity::Title => Ok(Granularity::Part),
        Granularity::Part => Ok(Granularity::Section),
        Granularity::Agency => Ok(Granularity::Part),
        Granularity::Section => Err(ExploreError::TerminalGranularity(current)),
    }
}
