//! Detector grid geometry and cell indexing
//!
//! Cells are numbered row-major by the geometry builder:
//!
//! ```text
//! cell_index = row * n_cols + col
//! ```
//!
//! Report coordinates are centered so that the middle cell of an odd grid
//! maps to (0, 0):
//!
//! ```text
//! x = col - n_cols / 2
//! y = row - n_rows / 2
//! ```
//!
//! For a 21x21 grid this gives x, y ∈ [-10, 10]. Even grids are accepted;
//! their center falls between cells and the coordinates run from
//! -n/2 to n/2 - 1.

use serde::{Deserialize, Serialize};

use crate::error::HitGridError;
use crate::HitGridResult;

/// Row-major linear identifier of one detector cell
pub type CellIndex = u32;

/// Centered 2D coordinate of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoordinate {
    /// Column offset from the center column
    pub x: i32,
    /// Row offset from the center row
    pub y: i32,
}

impl GridCoordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0, y: 0 }
    }
}

/// Maps cell indices to centered coordinates and back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridIndexer {
    /// Number of rows (y direction)
    pub n_rows: u32,
    /// Number of columns (x direction)
    pub n_cols: u32,
}

impl GridIndexer {
    /// Create an indexer for an `n_rows` x `n_cols` grid
    pub fn new(n_rows: u32, n_cols: u32) -> HitGridResult<Self> {
        if n_rows == 0 || n_cols == 0 {
            return Err(HitGridError::InvalidParameter(format!(
                "grid must have at least one cell, got {}x{}",
                n_cols, n_rows
            )));
        }
        // Centered coordinates are i32
        if n_rows > i32::MAX as u32 || n_cols > i32::MAX as u32 {
            return Err(HitGridError::InvalidParameter(format!(
                "grid {}x{} exceeds {} cells per axis",
                n_cols,
                n_rows,
                i32::MAX
            )));
        }
        if n_rows.checked_mul(n_cols).is_none() {
            return Err(HitGridError::InvalidParameter(format!(
                "grid {}x{} has too many cells",
                n_cols, n_rows
            )));
        }
        Ok(Self { n_rows, n_cols })
    }

    /// The 21x21 lead-glass array
    pub fn standard() -> Self {
        Self {
            n_rows: 21,
            n_cols: 21,
        }
    }

    /// Total number of cells
    #[inline]
    pub fn n_cells(&self) -> u32 {
        self.n_rows * self.n_cols
    }

    #[inline]
    pub fn contains(&self, index: CellIndex) -> bool {
        index < self.n_cells()
    }

    /// Index of the cell mapped to (0, 0)
    pub fn center(&self) -> CellIndex {
        (self.n_rows / 2) * self.n_cols + self.n_cols / 2
    }

    /// Every valid cell index in row-major order
    pub fn cell_indices(&self) -> impl Iterator<Item = CellIndex> {
        0..self.n_cells()
    }

    /// Linear index -> centered coordinate
    pub fn to_coordinate(&self, index: CellIndex) -> HitGridResult<GridCoordinate> {
        if !self.contains(index) {
            return Err(HitGridError::OutOfRange {
                index,
                n_cells: self.n_cells(),
            });
        }
        let col = (index % self.n_cols) as i32;
        let row = (index / self.n_cols) as i32;
        Ok(GridCoordinate {
            x: col - (self.n_cols / 2) as i32,
            y: row - (self.n_rows / 2) as i32,
        })
    }

    /// Centered coordinate -> linear index
    pub fn to_index(&self, coord: GridCoordinate) -> HitGridResult<CellIndex> {
        let col = i64::from(coord.x) + i64::from(self.n_cols / 2);
        let row = i64::from(coord.y) + i64::from(self.n_rows / 2);

        if col < 0 || row < 0 || col >= i64::from(self.n_cols) || row >= i64::from(self.n_rows) {
            return Err(HitGridError::CoordinateOutOfRange {
                x: coord.x,
                y: coord.y,
                n_cols: self.n_cols,
                n_rows: self.n_rows,
            });
        }

        Ok(row as u32 * self.n_cols + col as u32)
    }
}

impl Default for GridIndexer {
    fn default() -> Self {
        Self::standard()
    }
}

/// Physical placement of the cell array, in millimetres
///
/// Mirrors the geometry builder: cells of side `cell_size_mm` separated by
/// `gap_mm`, the whole array centered on the beam axis at `distance_mm`
/// behind the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorLayout {
    /// Side length of a single cell
    pub cell_size_mm: f64,
    /// Gap between neighbouring cells
    pub gap_mm: f64,
    /// Distance of the array from the target along the beam axis
    pub distance_mm: f64,
}

impl Default for DetectorLayout {
    fn default() -> Self {
        Self {
            cell_size_mm: 100.0,
            gap_mm: 10.0,
            distance_mm: 1000.0,
        }
    }
}

impl DetectorLayout {
    /// Center-to-center spacing of neighbouring cells
    #[inline]
    pub fn pitch_mm(&self) -> f64 {
        self.cell_size_mm + self.gap_mm
    }

    /// Transverse (x, y) of a cell's center
    pub fn cell_center(&self, grid: &GridIndexer, index: CellIndex) -> HitGridResult<(f64, f64)> {
        if !grid.contains(index) {
            return Err(HitGridError::OutOfRange {
                index,
                n_cells: grid.n_cells(),
            });
        }
        let col = f64::from(index % grid.n_cols);
        let row = f64::from(index / grid.n_cols);
        let x = (col - f64::from(grid.n_cols) / 2.0 + 0.5) * self.pitch_mm();
        let y = (row - f64::from(grid.n_rows) / 2.0 + 0.5) * self.pitch_mm();
        Ok((x, y))
    }

    /// Cell whose face contains the transverse point, if any.
    ///
    /// Points in the gaps or outside the array return `None`.
    pub fn cell_at(&self, grid: &GridIndexer, x_mm: f64, y_mm: f64) -> Option<CellIndex> {
        let pitch = self.pitch_mm();
        let fc = x_mm / pitch + f64::from(grid.n_cols) / 2.0;
        let fr = y_mm / pitch + f64::from(grid.n_rows) / 2.0;
        if !fc.is_finite() || !fr.is_finite() || fc < 0.0 || fr < 0.0 {
            return None;
        }

        let col = fc.floor() as u32;
        let row = fr.floor() as u32;
        if col >= grid.n_cols || row >= grid.n_rows {
            return None;
        }

        let index = row * grid.n_cols + col;
        let (cx, cy) = self.cell_center(grid, index).ok()?;
        let half = self.cell_size_mm / 2.0;
        if (x_mm - cx).abs() <= half && (y_mm - cy).abs() <= half {
            Some(index)
        } else {
            None
        }
    }
}
