//! Per-worker hit counters
//!
//! Each simulation worker owns one [`HitAccumulator`] for the lifetime of a
//! run and is the only writer to it, so the per-step increment takes
//! `&mut self` and needs no lock. At run end the coordinator folds every
//! worker's counters into a master accumulator with [`HitAccumulator::merge`].
//!
//! ```text
//!   worker 0 ──► [acc 0] ─┐
//!   worker 1 ──► [acc 1] ─┼──► merge (worker order) ──► master ──► report
//!   worker 2 ──► [acc 2] ─┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::HitGridError;
use crate::geometry::{CellIndex, GridIndexer};
use crate::HitGridResult;

/// One hit counter per registered cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitAccumulator {
    /// Count per cell, ordered by cell index
    counts: BTreeMap<CellIndex, u64>,
}

impl HitAccumulator {
    /// Register every cell in `cells` with a count of zero
    pub fn new<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = CellIndex>,
    {
        Self {
            counts: cells.into_iter().map(|index| (index, 0)).collect(),
        }
    }

    /// Register the full domain of a grid
    pub fn for_grid(grid: &GridIndexer) -> Self {
        Self::new(grid.cell_indices())
    }

    /// Zero every registered cell
    pub fn reset(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
    }

    /// Add `delta` hits to a registered cell
    #[inline]
    pub fn increment(&mut self, index: CellIndex, delta: u64) -> HitGridResult<()> {
        match self.counts.get_mut(&index) {
            Some(count) => {
                *count = count
                    .checked_add(delta)
                    .ok_or(HitGridError::CountOverflow { index })?;
                Ok(())
            }
            None => Err(HitGridError::UnknownCell { index }),
        }
    }

    /// Fold another accumulator's counts into this one.
    ///
    /// Fails without touching `self` if `other` carries a cell this
    /// accumulator never registered, or if any cell's sum overflows.
    pub fn merge_into(&mut self, other: &HitAccumulator) -> HitGridResult<()> {
        let sums = other
            .counts
            .iter()
            .map(|(&index, &count)| {
                let current = *self
                    .counts
                    .get(&index)
                    .ok_or(HitGridError::UnknownCell { index })?;
                let sum = current
                    .checked_add(count)
                    .ok_or(HitGridError::CountOverflow { index })?;
                Ok((index, sum))
            })
            .collect::<HitGridResult<Vec<_>>>()?;

        for (index, sum) in sums {
            self.counts.insert(index, sum);
        }
        Ok(())
    }

    /// New accumulator holding `self` plus every one of `others`, summed
    /// cell by cell. `others` is consumed front to back.
    pub fn merge(&self, others: &[HitAccumulator]) -> HitGridResult<HitAccumulator> {
        let mut master = self.clone();
        for (position, other) in others.iter().enumerate() {
            master.merge_into(other)?;
            log::debug!(
                "merged accumulator {} ({} hits), running total {}",
                position,
                other.total(),
                master.total()
            );
        }
        Ok(master)
    }

    /// Copy of every registered cell's count
    pub fn snapshot(&self) -> BTreeMap<CellIndex, u64> {
        self.counts.clone()
    }

    /// Count for one cell, `None` if unregistered
    pub fn get(&self, index: CellIndex) -> Option<u64> {
        self.counts.get(&index).copied()
    }

    /// Cells with at least one hit, by increasing index
    pub fn nonzero(&self) -> impl Iterator<Item = (CellIndex, u64)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(&index, &count)| (index, count))
    }

    /// Sum over all cells, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, &c| acc.saturating_add(c))
    }

    /// Number of registered cells
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn is_registered(&self, index: CellIndex) -> bool {
        self.counts.contains_key(&index)
    }
}
