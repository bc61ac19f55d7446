//! Aggregate and case-list query builders.
//!
//! Each builder turns (filter, granularity, sort key, limit) into a
//! [`SelectPlan`] and pairs it with a decoder from raw [`Row`] maps to typed
//! result rows. Correctness invariants enforced here:
//!
//! - The `cfr_agency` join is conditional: a (title, chapter) can map to
//!   multiple agencies, so joining it when neither the filter nor the
//!   granularity needs agency data would fan out section rows and corrupt
//!   word-count sums.
//! - Case counts are `COUNT(DISTINCT package_id)`: one case can have several
//!   opinion documents.
//! - The case/word ratio is computed from two independent sub-aggregations
//!   over the same grouping columns, joined on those columns, so neither
//!   metric sees the other's join fan-out. A zero or absent denominator
//!   yields ratio 0, not an error and not a missing row.

use tracing::debug;

use crate::model::{AggregateRow, CaseRow, QueryExecutor, Row, SqlValue};
use crate::schema;

use super::plan::{JoinKind, Predicate, SelectPlan, TableRef};
use super::types::{CfrFilter, ExploreError, ExploreResult, Granularity, SortKey};

// ---------------------------------------------------------------------------
// Grouping columns and join decisions
// ---------------------------------------------------------------------------

/// Output column names of the grouping key, a strictly nested prefix of the
/// location hierarchy (or the agency name on its own).
pub fn group_columns(granularity: Granularity) -> &'static [&'static str] {
    match granularity {
        Granularity::Title => &["title"],
        Granularity::Part => &["title", "part"],
        Granularity::Section => &["title", "part", "section"],
        Granularity::Agency => &["agency"],
    }
}

/// Whether a query for this (filter, granularity) must join `cfr_agency`.
pub fn needs_agency_join(filter: &CfrFilter, granularity: Granularity) -> bool {
    matches!(filter, CfrFilter::Agency(_)) || granularity == Granularity::Agency
}

/// `SELECT` expressions binding the grouping key to its output names.
fn key_select(granularity: Granularity) -> Vec<String> {
    match granularity {
        Granularity::Agency => vec!["a.agency AS agency".into()],
        _ => group_columns(granularity)
            .iter()
            .map(|c| format!("s.{c} AS {c}"))
            .collect(),
    }
}

/// `GROUP BY` expressions for the grouping key.
fn key_group(granularity: Granularity) -> Vec<String> {
    match granularity {
        Granularity::Agency => vec!["a.agency".into()],
        _ => group_columns(granularity)
            .iter()
            .map(|c| format!("s.{c}"))
            .collect(),
    }
}

fn push_agency_join(plan: &mut SelectPlan) {
    plan.join(
        JoinKind::Inner,
        TableRef::table(schema::AGENCY, "a"),
        "a.title = s.title AND a.chapter = s.chapter",
    );
}

fn push_opinion_joins(plan: &mut SelectPlan) {
    plan.join(
        JoinKind::Inner,
        TableRef::table(schema::SECTION_PDF, "l"),
        "l.title = s.title AND l.part = s.part AND l.section = s.section",
    );
    plan.join(
        JoinKind::Inner,
        TableRef::table(schema::COURT_OPINION, "o"),
        "o.granule_id = l.granule_id",
    );
}

/// Filter → WHERE predicates. Location fields are applied coarse-to-fine,
/// finer fields only when every coarser one is present, mirroring the
/// cascade's editability rules.
fn filter_predicates(filter: &CfrFilter) -> Vec<Predicate> {
    match filter {
        CfrFilter::Agency(name) => {
            vec![Predicate::new("a.agency = ?", SqlValue::Text(name.clone()))]
        }
        CfrFilter::Location {
            title,
            part,
            section,
        } => {
            let mut preds = Vec::new();
            if let Some(title) = title {
                preds.push(Predicate::new("s.title = ?", SqlValue::Integer(*title as i64)));
                if let Some(part) = part {
                    preds.push(Predicate::new("s.part = ?", SqlValue::Integer(*part as i64)));
                    if let Some(section) = section {
                        preds.push(Predicate::new(
                            "s.section = ?",
                            SqlValue::Integer(*section as i64),
                        ));
                    }
                }
            }
            preds
        }
    }
}

/// Description `SELECT` expression for the granularity, adding the
/// description relation's join when one is needed. Left joins: a grouping
/// with no description row still ranks, with an empty label.
fn push_description(plan: &mut SelectPlan, granularity: Granularity) {
    match granularity {
        Granularity::Title => {
            plan.join(
                JoinKind::Left,
                TableRef::table(schema::TITLE, "t"),
                "t.title = s.title",
            );
            plan.select
                .push("COALESCE(MIN(t.description), '') AS description".into());
        }
        Granularity::Part => {
            plan.join(
                JoinKind::Left,
                TableRef::table(schema::PART, "p"),
                "p.title = s.title AND p.part = s.part",
            );
            plan.select
                .push("COALESCE(MIN(p.description), '') AS description".into());
        }
        Granularity::Section => {
            plan.select
                .push("COALESCE(MIN(s.description), '') AS description".into());
        }
        Granularity::Agency => {
            plan.select.push("a.agency AS description".into());
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-aggregations
// ---------------------------------------------------------------------------

/// Word-count aggregation: sections only, plus the agency join when needed.
/// No opinion-document joins — they would multiply `num_words`.
fn words_plan(filter: &CfrFilter, granularity: Granularity, with_description: bool) -> SelectPlan {
    let mut plan = SelectPlan::from(TableRef::table(schema::SECTION, "s"));
    if needs_agency_join(filter, granularity) {
        push_agency_join(&mut plan);
    }
    plan.select = key_select(granularity);
    plan.select.push("SUM(s.num_words) AS num_words".into());
    if with_description {
        push_description(&mut plan, granularity);
    }
    plan.predicates = filter_predicates(filter);
    plan.group_by = key_group(granularity);
    plan
}

/// Case-count aggregation over the full opinion join path.
fn cases_plan(filter: &CfrFilter, granularity: Granularity, with_description: bool) -> SelectPlan {
    let mut plan = SelectPlan::from(TableRef::table(schema::SECTION, "s"));
    if needs_agency_join(filter, granularity) {
        push_agency_join(&mut plan);
    }
    push_opinion_joins(&mut plan);
    plan.select = key_select(granularity);
    plan.select
        .push("COUNT(DISTINCT o.package_id) AS num_cases".into());
    if with_description {
        push_description(&mut plan, granularity);
    }
    plan.predicates = filter_predicates(filter);
    plan.group_by = key_group(granularity);
    plan
}

/// Metric descending, then the grouping key ascending — deterministic order
/// for a fixed dataset.
fn ranked_order(metric: &str, granularity: Granularity) -> Vec<String> {
    let mut order = vec![format!("{metric} DESC")];
    order.extend(
        group_columns(granularity)
            .iter()
            .map(|c| format!("{c} ASC")),
    );
    order
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Build the ranked-aggregate query.
pub fn aggregate_query(
    filter: &CfrFilter,
    granularity: Granularity,
    sort_key: SortKey,
    limit: u32,
) -> SelectPlan {
    match sort_key {
        SortKey::NumWords => {
            let mut plan = words_plan(filter, granularity, true);
            plan.order_by = ranked_order("num_words", granularity);
            plan.limit = Some(limit);
            plan
        }
        SortKey::NumCases => {
            let mut plan = cases_plan(filter, granularity, true);
            plan.order_by = ranked_order("num_cases", granularity);
            plan.limit = Some(limit);
            plan
        }
        SortKey::CaseWordRatio => {
            // Two independent sub-aggregations joined on the grouping key.
            // Every grouping with section rows appears on the words side;
            // the cases side left-joins in, absent groups count as zero.
            let words = words_plan(filter, granularity, true);
            let cases = cases_plan(filter, granularity, false);

            let keys = group_columns(granularity);
            let join_on = keys
                .iter()
                .map(|c| format!("c.{c} = w.{c}"))
                .collect::<Vec<_>>()
                .join(" AND ");

            let mut plan = SelectPlan::from(TableRef::subquery(words, "w"));
            plan.join(JoinKind::Left, TableRef::subquery(cases, "c"), join_on);
            plan.select = keys.iter().map(|c| format!("w.{c} AS {c}")).collect();
            plan.select.push("w.description AS description".into());
            plan.select.push("w.num_words AS num_words".into());
            plan.select
                .push("COALESCE(c.num_cases, 0) AS num_cases".into());
            plan.select.push(
                "COALESCE(CAST(c.num_cases AS REAL) / NULLIF(w.num_words, 0), 0.0) AS ratio"
                    .into(),
            );
            plan.order_by = ranked_order("ratio", granularity);
            plan.limit = Some(limit);
            plan
        }
    }
}

/// Build the matching-case-list query: one row per distinct opinion
/// document, most recent first. `DISTINCT` suppresses the row fan-out an
/// agency filter's join would otherwise introduce.
pub fn case_list_query(filter: &CfrFilter, limit: u32) -> SelectPlan {
    let mut plan = SelectPlan::from(TableRef::table(schema::SECTION, "s"));
    if matches!(filter, CfrFilter::Agency(_)) {
        plan.join(
            JoinKind::Left,
            TableRef::table(schema::AGENCY, "a"),
            "a.title = s.title AND a.chapter = s.chapter",
        );
    }
    push_opinion_joins(&mut plan);
    plan.distinct = true;
    plan.select = vec![
        "o.package_id AS package_id".into(),
        "o.granule_id AS granule_id".into(),
        "o.case_title AS case_title".into(),
        "o.date_opinion_issued AS date_opinion_issued".into(),
    ];
    plan.predicates = filter_predicates(filter);
    plan.order_by = vec![
        "date_opinion_issued DESC".into(),
        "granule_id ASC".into(),
    ];
    plan.limit = Some(limit);
    plan
}

/// Build the known-agency-names lookup, fetched once at startup.
pub fn agency_list_query() -> SelectPlan {
    let mut plan = SelectPlan::from(TableRef::table(schema::AGENCY, "a"));
    plan.distinct = true;
    plan.select = vec!["a.agency AS agency".into()];
    plan.order_by = vec!["agency ASC".into()];
    plan
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn req_i64(row: &Row, col: &'static str) -> ExploreResult<i64> {
    row.get(col)
        .and_then(SqlValue::as_i64)
        .ok_or(ExploreError::BadColumn(col))
}

fn req_u32(row: &Row, col: &'static str) -> ExploreResult<u32> {
    u32::try_from(req_i64(row, col)?).map_err(|_| ExploreError::BadColumn(col))
}

fn req_f64(row: &Row, col: &'static str) -> ExploreResult<f64> {
    row.get(col)
        .and_then(SqlValue::as_f64)
        .ok_or(ExploreError::BadColumn(col))
}

fn req_string(row: &Row, col: &'static str) -> ExploreResult<String> {
    row.get(col)
        .and_then(SqlValue::as_str)
        .map(str::to_owned)
        .ok_or(ExploreError::BadColumn(col))
}

fn string_or_empty(row: &Row, col: &str) -> String {
    row.get(col)
        .and_then(SqlValue::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Decode one aggregate result row for the granularity and sort key that
/// produced it.
pub fn decode_aggregate_row(
    row: &Row,
    granularity: Granularity,
    sort_key: SortKey,
) -> ExploreResult<AggregateRow> {
    let (title, part, section, agency) = match granularity {
        Granularity::Title => (Some(req_u32(row, "title")?), None, None, None),
        Granularity::Part => (
            Some(req_u32(row, "title")?),
            Some(req_u32(row, "part")?),
            None,
            None,
        ),
        Granularity::Section => (
            Some(req_u32(row, "title")?),
            Some(req_u32(row, "part")?),
            Some(req_u32(row, "section")?),
            None,
        ),
        Granularity::Agency => (None, None, None, Some(req_string(row, "agency")?)),
    };

    let num_words = match sort_key {
        SortKey::NumWords | SortKey::CaseWordRatio => Some(req_i64(row, "num_words")?),
        SortKey::NumCases => None,
    };
    let num_cases = match sort_key {
        SortKey::NumCases | SortKey::CaseWordRatio => Some(req_i64(row, "num_cases")?),
        SortKey::NumWords => None,
    };

    Ok(AggregateRow {
        title,
        part,
        section,
        agency,
        description: string_or_empty(row, "description"),
        num_words,
        num_cases,
        metric: req_f64(row, sort_key.metric_column())?,
    })
}

pub fn decode_case_row(row: &Row) -> ExploreResult<CaseRow> {
    Ok(CaseRow {
        package_id: req_string(row, "package_id")?,
        granule_id: req_string(row, "granule_id")?,
        case_title: req_string(row, "case_title")?,
        date_opinion_issued: req_string(row, "date_opinion_issued")?,
    })
}

// ---------------------------------------------------------------------------
// Execution helpers
// ---------------------------------------------------------------------------

pub fn run_aggregate(
    executor: &dyn QueryExecutor,
    filter: &CfrFilter,
    granularity: Granularity,
    sort_key: SortKey,
    limit: u32,
) -> ExploreResult<Vec<AggregateRow>> {
    let (sql, params) = aggregate_query(filter, granularity, sort_key, limit).compile();
    debug!(granularity = %granularity, sort_key = %sort_key, limit, "running aggregate query");
    executor
        .execute(&sql, &params)?
        .iter()
        .map(|row| decode_aggregate_row(row, granularity, sort_key))
        .collect()
}

pub fn run_case_list(
    executor: &dyn QueryExecutor,
    filter: &CfrFilter,
    limit: u32,
) -> ExploreResult<Vec<CaseRow>> {
    let (sql, params) = case_list_query(filter, limit).compile();
    debug!(limit, "running case-list query");
    executor
        .execute(&sql, &params)?
        .iter()
        .map(decode_case_row)
        .collect()
}

pub fn run_agency_list(executor: &dyn QueryExecutor) -> ExploreResult<Vec<String>> {
    let (sql, params) = agency_list_query().compile();
    executor
        .execute(&sql, &params)?
        .iter()
        .map(|row| req_string(row, "agency"))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteStorage;
    use rusqlite::Connection;

    // -----------------------------------------------------------------------
    // Plan-shape tests (no database)
    // -----------------------------------------------------------------------

    #[test]
    fn group_columns_are_nested_prefixes() {
        assert_eq!(group_columns(Granularity::Title), ["title"]);
        assert_eq!(group_columns(Granularity::Part), ["title", "part"]);
        assert_eq!(
            group_columns(Granularity::Section),
            ["title", "part", "section"]
        );
        assert_eq!(group_columns(Granularity::Agency), ["agency"]);
    }

    #[test]
    fn agency_join_only_when_needed() {
        let empty = CfrFilter::default();
        let by_agency = CfrFilter::Agency("FAA".into());

        for granularity in [Granularity::Title, Granularity::Part, Granularity::Section] {
            assert!(!needs_agency_join(&empty, granularity));
            assert!(needs_agency_join(&by_agency, granularity));
        }
        assert!(needs_agency_join(&empty, Granularity::Agency));

        // The compiled SQL agrees with the decision.
        for sort_key in [SortKey::NumWords, SortKey::NumCases, SortKey::CaseWordRatio] {
            let (sql, _) = aggregate_query(&empty, Granularity::Part, sort_key, 10).compile();
            assert!(!sql.contains("cfr_agency"), "unexpected agency join: {sql}");

            let (sql, _) = aggregate_query(&by_agency, Granularity::Part, sort_key, 10).compile();
            assert!(sql.contains("cfr_agency"), "missing agency join: {sql}");
        }
    }

    #[test]
    fn num_words_query_never_joins_opinion_tables() {
        let (sql, _) =
            aggregate_query(&CfrFilter::default(), Granularity::Title, SortKey::NumWords, 10)
                .compile();
        assert!(!sql.contains("cfr_pdf"));
        assert!(!sql.contains("court_opinion_pdf"));
        assert!(sql.contains("SUM(s.num_words)"));
    }

    #[test]
    fn num_cases_counts_distinct_packages() {
        let (sql, _) =
            aggregate_query(&CfrFilter::default(), Granularity::Part, SortKey::NumCases, 10)
                .compile();
        assert!(sql.contains("COUNT(DISTINCT o.package_id)"));
        assert!(sql.contains("cfr_pdf"));
        assert!(sql.contains("court_opinion_pdf"));
    }

    #[test]
    fn ratio_query_joins_two_subaggregations() {
        let (sql, _) = aggregate_query(
            &CfrFilter::default(),
            Granularity::Title,
            SortKey::CaseWordRatio,
            10,
        )
        .compile();
        assert!(sql.contains("LEFT JOIN (SELECT"));
        assert!(sql.contains("c.title = w.title"));
        assert!(sql.contains("NULLIF(w.num_words, 0)"));
        assert!(sql.contains("COALESCE(c.num_cases, 0)"));
    }

    #[test]
    fn location_filter_applies_chain_prefix_only() {
        // part/section without the coarser fields must not reach the SQL.
        let filter = CfrFilter::Location {
            title: None,
            part: Some(60),
            section: Some(1),
        };
        let (sql, params) =
            aggregate_query(&filter, Granularity::Section, SortKey::NumWords, 10).compile();
        assert!(!sql.contains("WHERE"), "stray predicate in: {sql}");
        assert!(params.is_empty());

        let filter = CfrFilter::Location {
            title: Some(14),
            part: Some(60),
            section: None,
        };
        let (sql, params) =
            aggregate_query(&filter, Granularity::Section, SortKey::NumWords, 10).compile();
        assert!(sql.contains("s.title = ?1"));
        assert!(sql.contains("s.part = ?2"));
        assert_eq!(
            params,
            vec![SqlValue::Integer(14), SqlValue::Integer(60)]
        );
    }

    #[test]
    fn case_list_is_distinct_and_date_ordered() {
        let (sql, _) = case_list_query(&CfrFilter::default(), 20).compile();
        assert!(sql.starts_with("SELECT DISTINCT"));
        assert!(sql.contains("ORDER BY date_opinion_issued DESC, granule_id ASC"));
        assert!(sql.ends_with("LIMIT 20"));
        assert!(!sql.contains("cfr_agency"));

        let (sql, params) = case_list_query(&CfrFilter::Agency("FAA".into()), 20).compile();
        assert!(sql.contains("LEFT JOIN cfr_agency"));
        assert_eq!(params, vec![SqlValue::Text("FAA".into())]);
    }

    // -----------------------------------------------------------------------
    // Integration tests with in-memory SQLite
    // -----------------------------------------------------------------------

    /// In-memory dataset with a deliberately awkward shape: one
    /// (title, chapter) administered by two agencies, one case with two
    /// opinion documents, and a zero-word title.
    fn fixture() -> SqliteStorage {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE cfr_title (title INTEGER PRIMARY KEY, description TEXT NOT NULL);
             CREATE TABLE cfr_part (
                 title INTEGER NOT NULL,
                 part INTEGER NOT NULL,
                 description TEXT NOT NULL,
                 PRIMARY KEY (title, part)
             );
             CREATE TABLE cfr_section (
                 title INTEGER NOT NULL,
                 chapter TEXT NOT NULL,
                 part INTEGER NOT NULL,
                 section INTEGER NOT NULL,
                 description TEXT NOT NULL,
                 num_words INTEGER NOT NULL,
                 PRIMARY KEY (title, part, section)
             );
             CREATE TABLE cfr_agency (
                 agency TEXT NOT NULL,
                 title INTEGER NOT NULL,
                 chapter TEXT NOT NULL,
                 PRIMARY KEY (agency, title, chapter)
             );
             CREATE TABLE cfr_pdf (
                 title INTEGER NOT NULL,
                 part INTEGER NOT NULL,
                 section INTEGER NOT NULL,
                 granule_id TEXT NOT NULL,
                 PRIMARY KEY (title, part, section, granule_id)
             );
             CREATE TABLE court_opinion_pdf (
                 package_id TEXT NOT NULL,
                 granule_id TEXT PRIMARY KEY,
                 case_title TEXT NOT NULL,
                 date_opinion_issued TEXT NOT NULL
             );

             INSERT INTO cfr_title VALUES
                 (14, 'Aeronautics and Space'),
                 (40, 'Protection of Environment'),
                 (45, 'Public Welfare');
             INSERT INTO cfr_part VALUES
                 (14, 60, 'Flight simulation training device initial and continuing qualification'),
                 (14, 61, 'Certification: pilots, flight instructors, and ground instructors'),
                 (40, 100, 'Water quality standards'),
                 (45, 5, 'Freedom of information regulations');
             INSERT INTO cfr_section VALUES
                 (14, 'I', 60, 1, 'Applicability', 1000),
                 (14, 'I', 60, 2, 'Definitions applicable to flight simulation training devices', 500),
                 (14, 'I', 61, 1, 'Applicability and definitions', 2000),
                 (40, 'I', 100, 1, 'Scope and purpose', 3000),
                 (45, 'II', 5, 1, 'Reserved', 0);
             -- Two agencies administer (14, I): the fan-out hazard.
             INSERT INTO cfr_agency VALUES
                 ('Federal Aviation Administration', 14, 'I'),
                 ('Department of Transportation', 14, 'I'),
                 ('Environmental Protection Agency', 40, 'I');
             INSERT INTO cfr_pdf VALUES
                 (14, 60, 1, 'G1'),
                 (14, 60, 1, 'G2'),
                 (14, 61, 1, 'G3'),
                 (40, 100, 1, 'G4');
             -- P1 has two opinion documents for the same case.
             INSERT INTO court_opinion_pdf VALUES
                 ('P1', 'G1', 'Pilots United v. FAA', '2024-05-01'),
                 ('P1', 'G2', 'Pilots United v. FAA', '2024-05-01'),
                 ('P2', 'G3', 'Smith v. DOT', '2023-01-15'),
                 ('P3', 'G4', 'River Keepers v. EPA', '2024-07-04');",
        )
        .unwrap();
        SqliteStorage::from_connection(conn)
    }

    #[test]
    fn word_sums_survive_multi_agency_mapping() {
        let db = fixture();
        let rows = run_aggregate(
            &db,
            &CfrFilter::default(),
            Granularity::Title,
            SortKey::NumWords,
            10,
        )
        .unwrap();

        // Title 14 is administered by two agencies; an unconditional agency
        // join would double its sum to 7000.
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].title, Some(14));
        assert_eq!(rows[0].num_words, Some(3500));
        assert_eq!(rows[0].metric, 3500.0);
        assert_eq!(rows[0].description, "Aeronautics and Space");
        assert_eq!(rows[1].title, Some(40));
        assert_eq!(rows[1].num_words, Some(3000));
        assert_eq!(rows[2].title, Some(45));
        assert_eq!(rows[2].num_words, Some(0));
    }

    #[test]
    fn case_counts_are_distinct_over_packages() {
        let db = fixture();
        let rows = run_aggregate(
            &db,
            &CfrFilter::default(),
            Granularity::Title,
            SortKey::NumCases,
            10,
        )
        .unwrap();

        // Title 14: granules G1+G2 share package P1, G3 is P2 — 2 cases.
        assert_eq!(rows[0].title, Some(14));
        assert_eq!(rows[0].num_cases, Some(2));
        assert_eq!(rows[1].title, Some(40));
        assert_eq!(rows[1].num_cases, Some(1));
    }

    #[test]
    fn ratio_matches_independent_metrics_and_zero_words_is_zero() {
        let db = fixture();
        let filter = CfrFilter::default();
        let rows = run_aggregate(&db, &filter, Granularity::Title, SortKey::CaseWordRatio, 10)
            .unwrap();
        assert_eq!(rows.len(), 3, "zero-word title must not go missing");

        let words = run_aggregate(&db, &filter, Granularity::Title, SortKey::NumWords, 10).unwrap();
        let cases = run_aggregate(&db, &filter, Granularity::Title, SortKey::NumCases, 10).unwrap();

        for row in &rows {
            let w = words
                .iter()
                .find(|r| r.title == row.title)
                .and_then(|r| r.num_words)
                .unwrap();
            let c = cases
                .iter()
                .find(|r| r.title == row.title)
                .and_then(|r| r.num_cases)
                .unwrap_or(0);
            let expected = if w == 0 { 0.0 } else { c as f64 / w as f64 };
            assert!(
                (row.metric - expected).abs() < 1e-12,
                "title {:?}: ratio {} != {expected}",
                row.title,
                row.metric
            );
            assert!(row.metric >= 0.0);
        }

        // Title 45 has zero words: present, ratio zero.
        let t45 = rows.iter().find(|r| r.title == Some(45)).unwrap();
        assert_eq!(t45.metric, 0.0);
        assert_eq!(t45.num_cases, Some(0));
    }

    #[test]
    fn ratio_at_section_granularity_keeps_descriptions() {
        let db = fixture();
        let rows = run_aggregate(
            &db,
            &CfrFilter::default(),
            Granularity::Section,
            SortKey::CaseWordRatio,
            10,
        )
        .unwrap();
        let s = rows
            .iter()
            .find(|r| (r.title, r.part, r.section) == (Some(14), Some(60), Some(1)))
            .unwrap();
        assert_eq!(s.description, "Applicability");
        // 1 case / 1000 words.
        assert!((s.metric - 0.001).abs() < 1e-12);
    }

    #[test]
    fn agency_filter_restricts_and_ranks_parts() {
        let db = fixture();
        let filter = CfrFilter::Agency("Federal Aviation Administration".into());
        let rows =
            run_aggregate(&db, &filter, Granularity::Part, SortKey::NumCases, 5).unwrap();

        assert!(rows.len() <= 5);
        // Only title 14 parts; descending case counts; deterministic ties.
        assert_eq!(rows[0].title, Some(14));
        assert_eq!(rows[0].part, Some(60));
        assert_eq!(rows[0].num_cases, Some(1));
        assert_eq!(rows[1].part, Some(61));
        assert_eq!(rows[1].num_cases, Some(1));
        assert!(rows.iter().all(|r| r.title == Some(14)));
        assert!(rows.iter().all(|r| r.num_cases.unwrap() >= 0));
    }

    #[test]
    fn agency_granularity_fans_out_by_design() {
        let db = fixture();
        let rows = run_aggregate(
            &db,
            &CfrFilter::default(),
            Granularity::Agency,
            SortKey::NumWords,
            10,
        )
        .unwrap();

        // Both agencies of (14, I) see the full 3500 words of the chapter.
        let faa = rows
            .iter()
            .find(|r| r.agency.as_deref() == Some("Federal Aviation Administration"))
            .unwrap();
        let dot = rows
            .iter()
            .find(|r| r.agency.as_deref() == Some("Department of Transportation"))
            .unwrap();
        assert_eq!(faa.num_words, Some(3500));
        assert_eq!(dot.num_words, Some(3500));
        assert_eq!(faa.description, "Federal Aviation Administration");
    }

    #[test]
    fn idempotent_for_identical_inputs() {
        let db = fixture();
        let filter = CfrFilter::Location {
            title: Some(14),
            part: None,
            section: None,
        };
        let a = run_aggregate(&db, &filter, Granularity::Part, SortKey::CaseWordRatio, 10)
            .unwrap();
        let b = run_aggregate(&db, &filter, Granularity::Part, SortKey::CaseWordRatio, 10)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn limit_zero_yields_no_rows() {
        let db = fixture();
        let rows = run_aggregate(
            &db,
            &CfrFilter::default(),
            Granularity::Title,
            SortKey::NumWords,
            0,
        )
        .unwrap();
        assert!(rows.is_empty());
        assert!(run_case_list(&db, &CfrFilter::default(), 0).unwrap().is_empty());
    }

    #[test]
    fn case_list_distinct_recent_first() {
        let db = fixture();
        let rows = run_case_list(&db, &CfrFilter::default(), 10).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].date_opinion_issued, "2024-07-04");
        assert_eq!(rows.last().unwrap().date_opinion_issued, "2023-01-15");

        // Agency filter fans out over two agencies of (14, I) in the join;
        // DISTINCT must collapse that back to one row per document.
        let rows =
            run_case_list(&db, &CfrFilter::Agency("Federal Aviation Administration".into()), 10)
                .unwrap();
        assert_eq!(rows.len(), 3);
        let granules: Vec<&str> = rows.iter().map(|r| r.granule_id.as_str()).collect();
        assert_eq!(granules, ["G1", "G2", "G3"]);
    }

    #[test]
    fn agency_list_is_sorted_and_distinct() {
        let db = fixture();
        let agencies = run_agency_list(&db).unwrap();
        assert_eq!(
            agencies,
            [
                "Department of Transportation",
                "Environmental Protection Agency",
                "Federal Aviation Administration"
            ]
        );
    }
}
