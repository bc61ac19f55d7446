//! Shared dataset fixture for integration tests.
//!
//! Mirrors the shape the ETL pipeline produces, with the awkward cases the
//! engine must survive: a (title, chapter) administered by two agencies, a
//! case with multiple opinion documents, and a zero-word title.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

pub const DDL: &str = "
CREATE TABLE cfr_title (title INTEGER PRIMARY KEY, description TEXT NOT NULL);
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
";

pub const SEED: &str = "
INSERT INTO cfr_title VALUES
    (14, 'Aeronautics and Space'),
    (40, 'Protection of Environment'),
    (45, 'Public Welfare');
INSERT INTO cfr_part VALUES
    (14, 60, 'Flight simulation training device qualification'),
    (14, 61, 'Certification: pilots and instructors'),
    (40, 100, 'Water quality standards'),
    (45, 5, 'Freedom of information regulations');
INSERT INTO cfr_section VALUES
    (14, 'I', 60, 1, 'Applicability', 1000),
    (14, 'I', 60, 2, 'Definitions applicable to flight simulation training devices', 500),
    (14, 'I', 61, 1, 'Applicability and definitions', 2000),
    (14, 'I', 61, 2, 'Certification procedures', 800),
    (40, 'I', 100, 1, 'Scope and purpose', 3000),
    (45, 'II', 5, 1, 'Reserved', 0);
INSERT INTO cfr_agency VALUES
    ('Federal Aviation Administration', 14, 'I'),
    ('Department of Transportation', 14, 'I'),
    ('Environmental Protection Agency', 40, 'I');
INSERT INTO cfr_pdf VALUES
    (14, 60, 1, 'G1'),
    (14, 60, 1, 'G2'),
    (14, 61, 1, 'G3'),
    (14, 61, 2, 'G3'),
    (40, 100, 1, 'G4');
INSERT INTO court_opinion_pdf VALUES
    ('P1', 'G1', 'Pilots United v. FAA', '2024-05-01'),
    ('P1', 'G2', 'Pilots United v. FAA', '2024-05-01'),
    ('P2', 'G3', 'Smith v. DOT', '2023-01-15'),
    ('P3', 'G4', 'River Keepers v. EPA', '2024-07-04');
";

/// Create a seeded dataset file under `dir` and return its path.
pub fn create_dataset(dir: &Path) -> PathBuf {
    let path = dir.join("regscope-test.db");
    let conn = Connection::open(&path).expect("create test dataset");
    conn.execute_batch(DDL).expect("apply schema");
    conn.execute_batch(SEED).expect("seed dataset");
    path
}
