//! # Run Reports
//!
//! Write the merged hit counts of a run to a file that never replaces an
//! earlier result.
//!
//! ## File naming
//!
//! Reports are named `<prefix>_<label>_<n>.<ext>`, where `n` is the first
//! counter, starting at 1, for which no file exists yet:
//!
//! ```text
//! results_2cm_1.csv   ← first run with a 2 cm target
//! results_2cm_2.csv   ← rerun, the first file is left alone
//! results_3cm_1.csv   ← different label, counter starts over
//! ```
//!
//! The counter scan assumes one writer per label. Files are opened with
//! create-new semantics, so a lost race moves on to the next counter
//! instead of truncating the other writer's file.
//!
//! ## CSV layout
//!
//! ```text
//! # hitgrid run report
//! # events,1000
//! X,Y,Hits
//! -10,-10,2
//! 0,0,8
//! # total,10
//! ```
//!
//! One line per cell with at least one hit, in increasing cell index order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::detector::HitAccumulator;
use crate::error::HitGridError;
use crate::geometry::{CellIndex, GridIndexer};
use crate::HitGridResult;

/// Output file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Comma-separated `X,Y,Hits` table
    #[default]
    Csv,
    /// The whole [`RunReport`] as JSON
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = HitGridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(HitGridError::InvalidParameter(format!(
                "unknown report format '{}', expected csv or json",
                other
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One cell with at least one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Row-major cell index
    pub cell: CellIndex,
    /// Centered column coordinate
    pub x: i32,
    /// Centered row coordinate
    pub y: i32,
    /// Hits recorded in the cell
    pub count: u64,
}

/// Snapshot of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Events processed in the run
    pub event_count: u64,
    /// Sum of all cell counts
    pub total_hits: u64,
    /// Grid the coordinates refer to
    pub grid: GridIndexer,
    /// Nonzero cells by increasing index
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Build from a merged accumulator
    pub fn from_accumulator(
        grid: &GridIndexer,
        master: &HitAccumulator,
        event_count: u64,
    ) -> HitGridResult<Self> {
        let entries = master
            .nonzero()
            .map(|(cell, count)| {
                let coord = grid.to_coordinate(cell)?;
                Ok(ReportEntry {
                    cell,
                    x: coord.x,
                    y: coord.y,
                    count,
                })
            })
            .collect::<HitGridResult<Vec<_>>>()?;

        Ok(Self {
            event_count,
            total_hits: entries.iter().fold(0u64, |acc, e| acc.saturating_add(e.count)),
            grid: *grid,
            entries,
        })
    }

    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.entries.len() + 4);
        lines.push("# hitgrid run report".to_string());
        lines.push(format!("# events,{}", self.event_count));
        lines.push("X,Y,Hits".to_string());
        for entry in &self.entries {
            lines.push(format!("{},{},{}", entry.x, entry.y, entry.count));
        }
        lines.push(format!("# total,{}", self.total_hits));

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    pub fn to_json(&self) -> HitGridResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> HitGridResult<String> {
        match format {
            ReportFormat::Csv => Ok(self.to_csv()),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Get summary string
    pub fn summary(&self) -> String {
        let busiest = self
            .entries
            .iter()
            .max_by(|a, b| a.count.cmp(&b.count).then(b.cell.cmp(&a.cell)))
            .map(|e| format!("({}, {}) with {}", e.x, e.y, e.count))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "Run Report ({}x{} grid):\n\
             ├─ Events: {}\n\
             ├─ Cells hit: {}\n\
             ├─ Busiest cell: {}\n\
             └─ Total hits: {}",
            self.grid.n_cols,
            self.grid.n_rows,
            self.event_count,
            self.entries.len(),
            busiest,
            self.total_hits
        )
    }
}

/// Strip whitespace so a label can sit inside a file name
pub fn sanitize_label(label: &str) -> String {
    label.split_whitespace().collect()
}

/// Writes reports under sequentially numbered, never reused names
#[derive(Debug, Clone)]
pub struct RunReportWriter {
    /// Directory receiving the files
    pub output_dir: PathBuf,
    /// File name prefix
    pub prefix: String,
    /// File format (also picks the extension)
    pub format: ReportFormat,
}

impl RunReportWriter {
    pub fn new(output_dir: impl AsRef<Path>, prefix: &str, format: ReportFormat) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            format,
        }
    }

    /// Path for a given label and counter
    pub fn candidate_path(&self, label: &str, counter: u32) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}.{}",
            self.prefix,
            label,
            counter,
            self.format.extension()
        ))
    }

    /// First `(path, counter)` with no existing file, probing from 1
    pub fn next_available(&self, label: &str) -> HitGridResult<(PathBuf, u32)> {
        self.scan_from(label, 1)
    }

    fn scan_from(&self, label: &str, start: u32) -> HitGridResult<(PathBuf, u32)> {
        let mut counter = start;
        loop {
            let path = self.candidate_path(label, counter);
            if !path.try_exists()? {
                return Ok((path, counter));
            }
            log::debug!("{:?} exists, trying next counter", path);
            counter = counter
                .checked_add(1)
                .ok_or_else(|| names_exhausted(label))?;
        }
    }

    /// Write `report` and return the path it landed in
    pub fn write(&self, report: &RunReport, base_label: &str) -> HitGridResult<PathBuf> {
        let label = sanitize_label(base_label);
        if label.is_empty() {
            return Err(HitGridError::InvalidParameter(
                "report label must not be empty".to_string(),
            ));
        }

        // Render before touching the filesystem so a failure leaves no file behind
        let contents = report.render(self.format)?;

        fs::create_dir_all(&self.output_dir)?;

        let (mut path, mut counter) = self.next_available(&label)?;
        let file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    log::debug!("{:?} appeared after the scan, trying next counter", path);
                    let next = counter
                        .checked_add(1)
                        .ok_or_else(|| names_exhausted(&label))?;
                    (path, counter) = self.scan_from(&label, next)?;
                }
                Err(e) => return Err(e.into()),
            }
        };

        write_or_remove(file, &path, contents.as_bytes(), |file| file.sync_all())?;

        log::info!("Results written to '{}'", path.display());
        Ok(path)
    }
}

fn names_exhausted(label: &str) -> HitGridError {
    HitGridError::InvalidState(format!("no free file name left for label '{}'", label))
}

/// Write `contents` to a freshly created `path`, then run `finish`.
///
/// On any failure the sink is closed and `path` removed, so no truncated
/// report is left behind.
fn write_or_remove<W, F>(
    mut sink: W,
    path: &Path,
    contents: &[u8],
    finish: F,
) -> HitGridResult<()>
where
    W: Write,
    F: FnOnce(&mut W) -> std::io::Result<()>,
{
    let written = sink
        .write_all(contents)
        .and_then(|_| sink.flush())
        .and_then(|_| finish(&mut sink));
    drop(sink);

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(path) {
            log::warn!("Failed to remove incomplete report {:?}: {}", path, cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}
