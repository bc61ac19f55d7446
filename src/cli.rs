//! Command-line consumer of the exploration pipeline.
//!
//! Thin presentation layer: it opens the dataset, pushes the requested
//! inputs into the reactive pipeline, waits for the first published update,
//! and renders it as text or JSON. The arg enums stay CLI-side; the library
//! types never depend on clap.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::explore::filter::{FilterChange, apply_change};
use crate::explore::types::{CfrFilter, Granularity, SortKey};
use crate::explore::present;
use crate::pipeline::{Pipeline, PipelineInputs, Update};
use crate::storage::SqliteStorage;

/// How long to wait for the embedded engine before giving up. Hung queries
/// stall their output cell; the CLI cannot wait forever like a UI would.
const QUERY_WAIT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "regscope", version, about = "Explore federal regulations ranked by court-opinion attention")]
pub struct Cli {
    /// Path to the pre-built dataset (SQLite file produced by the ETL
    /// pipeline).
    #[arg(long, global = true, env = "REGSCOPE_DB", default_value = "regscope.db")]
    pub db: PathBuf,

    /// Emit JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ranked aggregates at a granularity, by a metric.
    Top {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, value_enum, default_value_t = GranularityArg::Title)]
        granularity: GranularityArg,

        #[arg(long, value_enum, default_value_t = SortArg::NumWords)]
        sort: SortArg,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Court opinions matching the filter, most recent first.
    Cases {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// List every known administering agency.
    Agencies,
}

/// The four filter fields. Mutual exclusion and chain requirements are
/// enforced by clap up front; the cascade reducer then builds the filter
/// value, so CLI and interactive edits share one rule set.
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Administering agency name (exclusive with the location chain).
    #[arg(long, conflicts_with_all = ["title", "part", "section"])]
    pub agency: Option<String>,

    /// CFR title number.
    #[arg(long)]
    pub title: Option<u32>,

    /// CFR part number (requires --title).
    #[arg(long, requires = "title")]
    pub part: Option<u32>,

    /// CFR section number (requires --part).
    #[arg(long, requires = "part")]
    pub section: Option<u32>,
}

impl FilterArgs {
    fn to_filter(&self) -> CfrFilter {
        let mut filter = CfrFilter::default();
        if let Some(agency) = &self.agency {
            return apply_change(&filter, FilterChange::Agency(Some(agency.clone())));
        }
        if let Some(title) = self.title {
            filter = apply_change(&filter, FilterChange::Title(Some(title)));
        }
        if let Some(part) = self.part {
            filter = apply_change(&filter, FilterChange::Part(Some(part)));
        }
        if let Some(section) = self.section {
            filter = apply_change(&filter, FilterChange::Section(Some(section)));
        }
        filter
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum GranularityArg {
    Title,
    Part,
    Section,
    Agency,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Title => Granularity::Title,
            GranularityArg::Part => Granularity::Part,
            GranularityArg::Section => Granularity::Section,
            GranularityArg::Agency => Granularity::Agency,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum SortArg {
    NumWords,
    NumCases,
    CaseWordRatio,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::NumWords => SortKey::NumWords,
            SortArg::NumCases => SortKey::NumCases,
            SortArg::CaseWordRatio => SortKey::CaseWordRatio,
        }
    }
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let storage = Arc::new(SqliteStorage::open(&cli.db)?);

    match cli.command {
        Command::Top {
            filter,
            granularity,
            sort,
            limit,
        } => {
            let granularity: Granularity = granularity.into();
            let sort_key: SortKey = sort.into();
            let inputs = PipelineInputs {
                filter: filter.to_filter(),
                granularity,
                sort_key,
                limit,
            };
            let pipeline = Pipeline::new(storage, inputs)?;
            let rx = pipeline.subscribe();
            pipeline.refresh();

            let rows = loop {
                match rx.recv_timeout(QUERY_WAIT) {
                    Ok(Update::Aggregates(rows)) => break rows,
                    Ok(Update::Cases(_)) => continue,
                    Err(_) => bail!("query did not complete within {QUERY_WAIT:?}"),
                }
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(rows.as_ref())?);
            } else {
                for (rank, row) in rows.iter().enumerate() {
                    let text = present::label(row, granularity)?;
                    let (_, rendered) = present::value(row, sort_key);
                    println!("{:>2}. {rendered:>12}  {text}", rank + 1);
                }
            }
        }
        Command::Cases { filter, limit } => {
            let inputs = PipelineInputs {
                filter: filter.to_filter(),
                limit,
                ..PipelineInputs::default()
            };
            let pipeline = Pipeline::new(storage, inputs)?;
            let rx = pipeline.subscribe();
            pipeline.refresh();

            let rows = loop {
                match rx.recv_timeout(QUERY_WAIT) {
                    Ok(Update::Cases(rows)) => break rows,
                    Ok(Update::Aggregates(_)) => continue,
                    Err(_) => bail!("query did not complete within {QUERY_WAIT:?}"),
                }
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(rows.as_ref())?);
            } else {
                for row in rows.iter() {
                    println!(
                        "{}  {}  {}",
                        row.date_opinion_issued,
                        row.case_title,
                        row.pdf_url()
                    );
                }
            }
        }
        Command::Agencies => {
            let agencies = storage
                .list_agencies()
                .context("failed to list agencies")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&agencies)?);
            } else {
                for agency in agencies {
                    println!("{agency}");
                }
            }
        }
    }

    Ok(())
}
