//! Step filter feeding the hit counters
//!
//! The transport engine reports every step taken inside a detector cell.
//! Only steps where the target species enters the cell through its
//! boundary count as hits; everything else is ignored.

use serde::{Deserialize, Serialize};

use crate::detector::accumulator::HitAccumulator;
use crate::geometry::CellIndex;
use crate::HitGridResult;

/// Species name of the electron, the default counted particle
pub const ELECTRON: &str = "e-";

/// One step reported by the transport engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPoint {
    /// Event the step belongs to
    #[serde(default)]
    pub event: u64,
    /// Particle species name
    pub species: String,
    /// Cell the step starts in
    #[serde(rename = "cell")]
    pub cell_index: CellIndex,
    /// Step began on the cell's geometric boundary
    pub entering: bool,
}

impl StepPoint {
    pub fn new(event: u64, species: &str, cell_index: CellIndex, entering: bool) -> Self {
        Self {
            event,
            species: species.to_string(),
            cell_index,
            entering,
        }
    }

    /// Electron entering `cell_index`
    pub fn electron_entering(event: u64, cell_index: CellIndex) -> Self {
        Self::new(event, ELECTRON, cell_index, true)
    }
}

/// Decides which steps are hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitFilter {
    /// Species that is counted
    pub target_species: String,
}

impl HitFilter {
    pub fn new(target_species: &str) -> Self {
        Self {
            target_species: target_species.to_string(),
        }
    }

    /// True when the step is a boundary crossing of the target species
    #[inline]
    pub fn accepts(&self, step: &StepPoint) -> bool {
        step.entering && step.species == self.target_species
    }

    /// Score `step` into `acc`; returns whether it counted.
    ///
    /// An accepted step whose cell is unknown to `acc` is an error: the step
    /// source and the accumulator disagree on the geometry.
    pub fn process(&self, step: &StepPoint, acc: &mut HitAccumulator) -> HitGridResult<bool> {
        if !self.accepts(step) {
            return Ok(false);
        }
        acc.increment(step.cell_index, 1)?;
        Ok(true)
    }
}

impl Default for HitFilter {
    fn default() -> Self {
        Self::new(ELECTRON)
    }
}
