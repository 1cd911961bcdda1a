//! # Detector Hit Counting
//!
//! Converts the transport engine's step stream into per-cell hit counts.
//!
//! ```text
//!   step (species, cell, entering)
//!          │
//!          ▼
//!   ┌──────────────┐  rejected   ┌─────────┐
//!   │  HitFilter   │────────────►│ ignored │
//!   └──────┬───────┘             └─────────┘
//!          │ e- entering
//!          ▼
//!   ┌──────────────────────────┐
//!   │ HitAccumulator (worker)  │  increment(cell, 1)
//!   └──────────────────────────┘
//! ```

pub mod accumulator;
pub mod sensitive;

pub use accumulator::HitAccumulator;
pub use sensitive::{HitFilter, StepPoint, ELECTRON};
