//! Error types for hit aggregation and reporting

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HitGridError {
    #[error("Cell index out of range: {index} not in [0, {n_cells})")]
    OutOfRange { index: u32, n_cells: u32 },

    #[error("Grid coordinate out of range: ({x}, {y}) outside a {n_cols}x{n_rows} grid")]
    CoordinateOutOfRange {
        x: i32,
        y: i32,
        n_cols: u32,
        n_rows: u32,
    },

    #[error("Unknown cell: index {index} was never registered with the accumulator")]
    UnknownCell { index: u32 },

    #[error("Hit count overflow in cell {index}")]
    CountOverflow { index: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for HitGridError {
    fn from(err: serde_json::Error) -> Self {
        HitGridError::Serialization(err.to_string())
    }
}
