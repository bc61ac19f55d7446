//! Reactive query pipeline.
//!
//! Four input cells (filter, granularity, sort key, limit) feed two
//! computations: the ranked-aggregate table and the matching-case list.
//! Input writes happen on the caller's thread; query execution happens on a
//! dedicated executor thread fed through a channel, so a slow query never
//! blocks further input changes.
//!
//! Ordering: every dispatched query carries the sequence number current for
//! its output cell at dispatch time. A completion whose sequence is no
//! longer the latest issued for that cell is discarded, so a slow stale
//! response can never overwrite a newer one.
//!
//! Errors: a failed execution is logged and dropped; the output cell keeps
//! its last successful rows and the pipeline keeps running.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::explore::filter::{FilterChange, apply_change};
use crate::explore::query::{run_agency_list, run_aggregate, run_case_list};
use crate::explore::types::{CfrFilter, ExploreResult, Granularity, SortKey};
use crate::model::{AggregateRow, CaseRow, QueryExecutor};

// -------------------------------------------------------------------------
// Inputs and updates
// -------------------------------------------------------------------------

/// The four long-lived input cells, snapshot as a value.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineInputs {
    pub filter: CfrFilter,
    pub granularity: Granularity,
    pub sort_key: SortKey,
    pub limit: u32,
}

impl Default for PipelineInputs {
    fn default() -> Self {
        Self {
            filter: CfrFilter::default(),
            granularity: Granularity::default(),
            sort_key: SortKey::default(),
            limit: 10,
        }
    }
}

/// One published result-set replacement.
#[derive(Clone, Debug)]
pub enum Update {
    Aggregates(Arc<Vec<AggregateRow>>),
    Cases(Arc<Vec<CaseRow>>),
}

enum Job {
    Aggregate { seq: u64, inputs: PipelineInputs },
    Cases { seq: u64, filter: CfrFilter, limit: u32 },
}

// -------------------------------------------------------------------------
// Shared state
// -------------------------------------------------------------------------

struct Shared {
    executor: Arc<dyn QueryExecutor>,
    /// Latest sequence issued per output cell; completions compare against
    /// these to detect staleness.
    aggregate_seq: AtomicU64,
    cases_seq: AtomicU64,
    aggregate_rows: RwLock<Arc<Vec<AggregateRow>>>,
    case_rows: RwLock<Arc<Vec<CaseRow>>>,
    subscribers: Mutex<Vec<Sender<Update>>>,
}

impl Shared {
    fn publish(&self, update: Update) {
        // Drop subscribers whose receiver is gone.
        self.subscribers
            .lock()
            .retain(|tx| tx.send(update.clone()).is_ok());
    }

    fn run_job(&self, job: Job) {
        match job {
            Job::Aggregate { seq, inputs } => {
                let result = run_aggregate(
                    self.executor.as_ref(),
                    &inputs.filter,
                    inputs.granularity,
                    inputs.sort_key,
                    inputs.limit,
                );
                match result {
                    Ok(rows) => {
                        if self.aggregate_seq.load(Ordering::SeqCst) != seq {
                            debug!(seq, "discarding stale aggregate result");
                            return;
                        }
                        let rows = Arc::new(rows);
                        *self.aggregate_rows.write() = Arc::clone(&rows);
                        self.publish(Update::Aggregates(rows));
                    }
                    Err(e) => {
                        warn!(error = %e, "aggregate query failed; keeping previous rows");
                    }
                }
            }
            Job::Cases { seq, filter, limit } => {
                match run_case_list(self.executor.as_ref(), &filter, limit) {
                    Ok(rows) => {
                        if self.cases_seq.load(Ordering::SeqCst) != seq {
                            debug!(seq, "discarding stale case-list result");
                            return;
                        }
                        let rows = Arc::new(rows);
                        *self.case_rows.write() = Arc::clone(&rows);
                        self.publish(Update::Cases(rows));
                    }
                    Err(e) => {
                        warn!(error = %e, "case-list query failed; keeping previous rows");
                    }
                }
            }
        }
    }
}

// -------------------------------------------------------------------------
// Pipeline
// -------------------------------------------------------------------------

pub struct Pipeline {
    shared: Arc<Shared>,
    inputs: Mutex<PipelineInputs>,
    job_tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    agencies: Vec<String>,
}

impl Pipeline {
    /// Wire up the pipeline over an opened dataset. Fetches the static
    /// agency-name lookup, then starts the executor thread. No queries are
    /// dispatched until [`refresh`](Self::refresh) or an input change.
    pub fn new(executor: Arc<dyn QueryExecutor>, initial: PipelineInputs) -> ExploreResult<Self> {
        let agencies = run_agency_list(executor.as_ref())?;

        let shared = Arc::new(Shared {
            executor,
            aggregate_seq: AtomicU64::new(0),
            cases_seq: AtomicU64::new(0),
            aggregate_rows: RwLock::new(Arc::new(Vec::new())),
            case_rows: RwLock::new(Arc::new(Vec::new())),
            subscribers: Mutex::new(Vec::new()),
        });

        let (job_tx, job_rx): (Sender<Job>, Receiver<Job>) = unbounded();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("regscope-exec".into())
            .spawn(move || {
                for job in job_rx {
                    worker_shared.run_job(job);
                }
            })
            .map_err(|e| crate::explore::types::ExploreError::Execution(format!(
                "failed to spawn executor thread: {e}"
            )))?;

        Ok(Self {
            shared,
            inputs: Mutex::new(initial),
            job_tx: Some(job_tx),
            worker: Some(worker),
            agencies,
        })
    }

    /// Known agency names, fetched once at startup.
    pub fn agencies(&self) -> &[String] {
        &self.agencies
    }

    /// Register a result-stream consumer. Updates published after this call
    /// are delivered in publish order.
    pub fn subscribe(&self) -> Receiver<Update> {
        let (tx, rx) = unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn current_inputs(&self) -> PipelineInputs {
        self.inputs.lock().clone()
    }

    /// Last successfully computed aggregate rows.
    pub fn aggregate_rows(&self) -> Arc<Vec<AggregateRow>> {
        Arc::clone(&self.shared.aggregate_rows.read())
    }

    /// Last successfully computed case rows.
    pub fn case_rows(&self) -> Arc<Vec<CaseRow>> {
        Arc::clone(&self.shared.case_rows.read())
    }

    /// Re-dispatch both computations for the current inputs.
    pub fn refresh(&self) {
        let snapshot = self.inputs.lock().clone();
        self.dispatch_aggregate(snapshot.clone());
        self.dispatch_cases(&snapshot);
    }

    /// Route one filter edit through the cascade reducer. Both computations
    /// re-run if the resulting filter differs; an edit that cascades to the
    /// same value (or hits a disabled field) triggers nothing.
    pub fn apply_filter_change(&self, change: FilterChange) {
        let snapshot = {
            let mut inputs = self.inputs.lock();
            let next = apply_change(&inputs.filter, change);
            if next == inputs.filter {
                return;
            }
            inputs.filter = next;
            inputs.clone()
        };
        self.dispatch_aggregate(snapshot.clone());
        self.dispatch_cases(&snapshot);
    }

    /// Install a complete filter, e.g. one produced by drill-down.
    pub fn set_filter(&self, filter: CfrFilter) {
        let snapshot = {
            let mut inputs = self.inputs.lock();
            if inputs.filter == filter {
                return;
            }
            inputs.filter = filter;
            inputs.clone()
        };
        self.dispatch_aggregate(snapshot.clone());
        self.dispatch_cases(&snapshot);
    }

    /// Only the aggregate computation reads the granularity.
    pub fn set_granularity(&self, granularity: Granularity) {
        let snapshot = {
            let mut inputs = self.inputs.lock();
            if inputs.granularity == granularity {
                return;
            }
            inputs.granularity = granularity;
            inputs.clone()
        };
        self.dispatch_aggregate(snapshot);
    }

    /// Only the aggregate computation reads the sort key.
    pub fn set_sort_key(&self, sort_key: SortKey) {
        let snapshot = {
            let mut inputs = self.inputs.lock();
            if inputs.sort_key == sort_key {
                return;
            }
            inputs.sort_key = sort_key;
            inputs.clone()
        };
        self.dispatch_aggregate(snapshot);
    }

    /// Both computations read the limit.
    pub fn set_limit(&self, limit: u32) {
        let snapshot = {
            let mut inputs = self.inputs.lock();
            if inputs.limit == limit {
                return;
            }
            inputs.limit = limit;
            inputs.clone()
        };
        self.dispatch_aggregate(snapshot.clone());
        self.dispatch_cases(&snapshot);
    }

    fn dispatch_aggregate(&self, inputs: PipelineInputs) {
        let seq = self.shared.aggregate_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(Job::Aggregate { seq, inputs });
    }

    fn dispatch_cases(&self, inputs: &PipelineInputs) {
        let seq = self.shared.cases_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(Job::Cases {
            seq,
            filter: inputs.filter.clone(),
            limit: inputs.limit,
        });
    }

    fn send(&self, job: Job) {
        if let Some(tx) = &self.job_tx
            && tx.send(job).is_err()
        {
            warn!("executor thread is gone; dropping query dispatch");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.job_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// -------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------
