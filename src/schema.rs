//! Schema model for the regulation/court-opinion star schema.
//!
//! Six relations, all produced upstream by the ETL pipeline and read-only
//! here. `cfr_section` is the fan-out anchor: every join path to agencies,
//! document links, and opinions passes through it.
//!
//! Join keys:
//! - `cfr_title.title = cfr_section.title`
//! - `cfr_part.(title, part) = cfr_section.(title, part)`
//! - `cfr_agency.(title, chapter) = cfr_section.(title, chapter)` — a
//!   (title, chapter) may map to *multiple* agencies, so this join is only
//!   applied when agency data is actually needed (see
//!   [`crate::explore::query`]).
//! - `cfr_pdf.(title, part, section) = cfr_section.(title, part, section)`
//! - `court_opinion_pdf.granule_id = cfr_pdf.granule_id` — many opinion
//!   documents may belong to one case (`package_id`).

use crate::explore::types::{ExploreError, ExploreResult};
use crate::model::{QueryExecutor, SqlValue};

/// `(title, chapter, part, section, description, num_words)`
pub const SECTION: &str = "cfr_section";
/// `(title, description)`
pub const TITLE: &str = "cfr_title";
/// `(title, part, description)`
pub const PART: &str = "cfr_part";
/// `(agency, title, chapter)`
pub const AGENCY: &str = "cfr_agency";
/// `(title, part, section, granule_id)`
pub const SECTION_PDF: &str = "cfr_pdf";
/// `(package_id, granule_id, case_title, date_opinion_issued)`
pub const COURT_OPINION: &str = "court_opinion_pdf";

pub const EXPECTED_TABLES: [&str; 6] =
    [SECTION, TITLE, PART, AGENCY, SECTION_PDF, COURT_OPINION];

/// Check that every expected relation exists in the opened dataset.
///
/// The core assumes the dataset's *contents* are correct (produced upstream),
/// but a missing table means the handle points at the wrong file entirely, so
/// that is worth failing loudly on before the pipeline starts.
pub fn verify_dataset(executor: &dyn QueryExecutor) -> ExploreResult<()> {
    for table in EXPECTED_TABLES {
        let rows = executor.execute(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[SqlValue::Text(table.into())],
        )?;
        if rows.is_empty() {
            return Err(ExploreError::MissingTable(table.into()));
        }
    }
    Ok(())
}
