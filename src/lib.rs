//! # hitgrid
//!
//! Counts particle hits on a two-dimensional detector grid across many
//! concurrent simulation workers and writes one deterministic report per
//! run, never overwriting an earlier one.
//!
//! ## Features
//! - Row-major cell index ↔ centered (x, y) coordinate transform
//! - Lock-free per-worker hit counters, merged once at run end
//! - Boundary-crossing filter for the counted species (electrons by default)
//! - Sequentially numbered CSV/JSON reports (`results_2cm_1.csv`, `_2`, …)
//!
//! ## Architecture
//!
//! ```text
//!  transport engine steps
//!          │
//!          ▼
//!  ┌───────────────┐   ┌───────────────┐        ┌───────────────┐
//!  │ worker 0      │   │ worker 1      │  ...   │ worker N-1    │
//!  │ HitFilter     │   │ HitFilter     │        │ HitFilter     │
//!  │ HitAccumulator│   │ HitAccumulator│        │ HitAccumulator│
//!  └───────┬───────┘   └───────┬───────┘        └───────┬───────┘
//!          └───────────────────┼────────────────────────┘
//!                              ▼
//!                    merge (worker order)
//!                              │
//!                              ▼
//!             GridIndexer → RunReport → RunReportWriter
//!                                         results_<label>_<n>.csv
//! ```

// Core modules
pub mod geometry;
pub mod detector;
pub mod error;

// Run lifecycle and output
pub mod config;
pub mod report;
pub mod run;

// Integration tests
#[cfg(test)]
mod tests;

pub use config::{length_label, RunConfig};
pub use detector::{HitAccumulator, HitFilter, StepPoint};
pub use error::HitGridError;
pub use geometry::{CellIndex, DetectorLayout, GridCoordinate, GridIndexer};
pub use report::{ReportEntry, ReportFormat, RunReport, RunReportWriter};
pub use run::{RunCoordinator, RunOutcome, RunPhase};

/// Result type for hit aggregation operations
pub type HitGridResult<T> = Result<T, HitGridError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        // Geometry
        CellIndex,
        GridCoordinate,
        GridIndexer,
        DetectorLayout,

        // Counting
        HitAccumulator,
        HitFilter,
        StepPoint,

        // Runs and reports
        RunConfig,
        RunCoordinator,
        RunReport,
        RunReportWriter,
        ReportFormat,

        // Result type
        HitGridResult,
        HitGridError,
    };
}
