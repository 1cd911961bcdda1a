//! # Run Lifecycle
//!
//! A run moves through three phases separated by barriers:
//!
//! ```text
//!   begin_run()          accumulate(streams)              end_run(events)
//!   ───────────►  reset  ─────────────────►  workers  ──────────────────►  merge + write
//!                 all      (parallel, one task        (worker order,
//!                 workers   per worker, no locks)      coordinator only)
//! ```
//!
//! Each worker's accumulator is borrowed mutably by exactly one rayon task
//! during accumulation; `end_run` can only run once every task has
//! returned, so the merge always sees complete counts.

use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::detector::{HitAccumulator, HitFilter, StepPoint};
use crate::error::HitGridError;
use crate::geometry::GridIndexer;
use crate::report::{RunReport, RunReportWriter};
use crate::HitGridResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run in progress
    Idle,
    /// Workers may increment
    Accumulating,
    /// A worker hit an error; the run produces no report
    Failed,
}

/// Result of a run that wrote a report
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// File the report was written to
    pub path: PathBuf,
    /// What was written
    pub report: RunReport,
}

/// Owns the worker accumulators and drives them through a run
#[derive(Debug)]
pub struct RunCoordinator {
    config: RunConfig,
    grid: GridIndexer,
    filter: HitFilter,
    writer: RunReportWriter,
    workers: Vec<HitAccumulator>,
    master: Option<HitAccumulator>,
    phase: RunPhase,
    runs_completed: u64,
}

impl RunCoordinator {
    pub fn new(config: RunConfig) -> HitGridResult<Self> {
        config.validate()?;
        let grid = config.grid()?;
        let filter = HitFilter::new(&config.target_species);
        let writer = RunReportWriter::new(&config.output_dir, &config.file_prefix, config.format);
        let workers = (0..config.workers)
            .map(|_| HitAccumulator::for_grid(&grid))
            .collect();

        Ok(Self {
            config,
            grid,
            filter,
            writer,
            workers,
            master: None,
            phase: RunPhase::Idle,
            runs_completed: 0,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn grid(&self) -> &GridIndexer {
        &self.grid
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn n_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn runs_completed(&self) -> u64 {
        self.runs_completed
    }

    /// Merged counts of the last completed run
    pub fn master(&self) -> Option<&HitAccumulator> {
        self.master.as_ref()
    }

    /// Direct access to one worker's accumulator during accumulation
    pub fn worker_mut(&mut self, worker: usize) -> HitGridResult<&mut HitAccumulator> {
        self.require_accumulating()?;
        let n_workers = self.workers.len();
        self.workers.get_mut(worker).ok_or_else(|| {
            HitGridError::InvalidParameter(format!(
                "worker {} does not exist ({} workers)",
                worker, n_workers
            ))
        })
    }

    /// Phase 1: zero every worker before any step is scored
    pub fn begin_run(&mut self) {
        for acc in &mut self.workers {
            acc.reset();
        }
        self.master = None;
        self.phase = RunPhase::Accumulating;
        log::info!(
            "Run {} started: {} workers, {}x{} cells",
            self.runs_completed + 1,
            self.workers.len(),
            self.grid.n_cols,
            self.grid.n_rows
        );
    }

    /// Phase 2: score one step stream per worker, in parallel.
    ///
    /// Stream `i` goes to worker `i`; fewer streams than workers is fine.
    /// Returns the number of hits scored. The first unknown cell fails the
    /// whole run.
    pub fn accumulate<S>(&mut self, streams: Vec<S>) -> HitGridResult<u64>
    where
        S: IntoIterator<Item = StepPoint> + Send,
    {
        self.require_accumulating()?;
        if streams.len() > self.workers.len() {
            return Err(HitGridError::InvalidParameter(format!(
                "{} step streams for {} workers",
                streams.len(),
                self.workers.len()
            )));
        }

        let filter = &self.filter;
        let scored = self
            .workers
            .par_iter_mut()
            .zip(streams.into_par_iter())
            .map(|(acc, stream)| -> HitGridResult<u64> {
                let mut hits = 0u64;
                for step in stream {
                    if filter.process(&step, acc)? {
                        hits += 1;
                    }
                }
                Ok(hits)
            })
            .collect::<HitGridResult<Vec<u64>>>();

        match scored {
            Ok(per_worker) => Ok(per_worker.iter().sum()),
            Err(e) => {
                log::error!("Run failed during accumulation: {}", e);
                self.phase = RunPhase::Failed;
                Err(e)
            }
        }
    }

    /// Phase 3: merge the workers and write the report.
    ///
    /// An empty run writes nothing and returns `Ok(None)`.
    pub fn end_run(&mut self, event_count: u64) -> HitGridResult<Option<RunOutcome>> {
        match self.phase {
            RunPhase::Accumulating => {}
            RunPhase::Failed => {
                self.phase = RunPhase::Idle;
                return Err(HitGridError::InvalidState(
                    "run failed during accumulation, no report written".to_string(),
                ));
            }
            RunPhase::Idle => {
                return Err(HitGridError::InvalidState(
                    "end_run called without begin_run".to_string(),
                ));
            }
        }
        self.phase = RunPhase::Idle;

        if event_count == 0 {
            log::warn!("Run ended with no events, no report written");
            return Ok(None);
        }

        let master = match self.workers.split_first() {
            Some((first, rest)) => first.merge(rest)?,
            None => HitAccumulator::for_grid(&self.grid),
        };
        let report = RunReport::from_accumulator(&self.grid, &master, event_count)?;
        self.master = Some(master);

        log::info!(
            "Run ended: {} events, {} hits in {} cells",
            report.event_count,
            report.total_hits,
            report.entries.len()
        );

        let path = self.writer.write(&report, &self.config.base_label())?;
        self.runs_completed += 1;
        Ok(Some(RunOutcome { path, report }))
    }

    /// Full run over a flat list of steps.
    ///
    /// Steps are split by event, `event % workers`, so each event is scored
    /// by a single worker. The event count is the number of distinct events.
    pub fn execute(&mut self, steps: Vec<StepPoint>) -> HitGridResult<Option<RunOutcome>> {
        let (streams, event_count) = partition_by_event(steps, self.workers.len());
        self.begin_run();
        self.accumulate(streams)?;
        self.end_run(event_count)
    }

    fn require_accumulating(&self) -> HitGridResult<()> {
        match self.phase {
            RunPhase::Accumulating => Ok(()),
            phase => Err(HitGridError::InvalidState(format!(
                "workers can only be used during a run (phase: {:?})",
                phase
            ))),
        }
    }
}

/// Split steps into per-worker streams by event and count distinct events
pub fn partition_by_event(steps: Vec<StepPoint>, n_workers: usize) -> (Vec<Vec<StepPoint>>, u64) {
    let n_workers = n_workers.max(1);
    let mut streams = vec![Vec::new(); n_workers];
    let mut events = BTreeSet::new();

    for step in steps {
        events.insert(step.event);
        streams[(step.event % n_workers as u64) as usize].push(step);
    }

    (streams, events.len() as u64)
}

/// Read a JSON-lines step file.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_step_stream(path: impl AsRef<Path>) -> HitGridResult<Vec<StepPoint>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut steps = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step: StepPoint = serde_json::from_str(trimmed).map_err(|e| {
            HitGridError::Serialization(format!("{}:{}: {}", path.display(), line_no + 1, e))
        })?;
        steps.push(step);
    }

    log::info!("Loaded {} steps from {:?}", steps.len(), path);
    Ok(steps)
}
