//! Run configuration
//!
//! Stored as JSON; every field has a default so partial files are fine:
//!
//! ```json
//! {
//!   "n_rows": 21,
//!   "n_cols": 21,
//!   "lead_thickness_mm": 20.0,
//!   "workers": 8
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HitGridError;
use crate::geometry::{DetectorLayout, GridIndexer};
use crate::report::ReportFormat;
use crate::HitGridResult;

/// Everything a run needs besides the step stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Rows in the cell array
    pub n_rows: u32,
    /// Columns in the cell array
    pub n_cols: u32,
    /// Particle species counted as a hit
    pub target_species: String,
    /// Lead target thickness; only used to label output files
    pub lead_thickness_mm: f64,
    /// Directory receiving report files
    pub output_dir: PathBuf,
    /// Report file name prefix
    pub file_prefix: String,
    /// Report file format
    pub format: ReportFormat,
    /// Number of simulation workers
    pub workers: usize,
    /// Physical placement of the cell array
    pub layout: DetectorLayout,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_rows: 21,
            n_cols: 21,
            target_species: crate::detector::ELECTRON.to_string(),
            lead_thickness_mm: 10.0,
            output_dir: PathBuf::from("."),
            file_prefix: "results".to_string(),
            format: ReportFormat::Csv,
            workers: 4,
            layout: DetectorLayout::default(),
        }
    }
}

impl RunConfig {
    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> HitGridResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: RunConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("Loaded run configuration from {:?}", path.as_ref());
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> HitGridResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> HitGridResult<()> {
        GridIndexer::new(self.n_rows, self.n_cols)?;
        if self.workers == 0 {
            return Err(HitGridError::InvalidParameter(
                "at least one worker is required".to_string(),
            ));
        }
        if !self.lead_thickness_mm.is_finite() || self.lead_thickness_mm < 0.0 {
            return Err(HitGridError::InvalidParameter(format!(
                "lead thickness must be a finite non-negative length, got {} mm",
                self.lead_thickness_mm
            )));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(HitGridError::InvalidParameter(
                "file prefix must not be empty".to_string(),
            ));
        }
        if self.target_species.trim().is_empty() {
            return Err(HitGridError::InvalidParameter(
                "target species must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn grid(&self) -> HitGridResult<GridIndexer> {
        GridIndexer::new(self.n_rows, self.n_cols)
    }

    /// Label identifying this configuration in report file names, e.g. "2cm"
    pub fn base_label(&self) -> String {
        length_label(self.lead_thickness_mm)
    }
}

/// Length units from largest to smallest, in millimetres
const LENGTH_UNITS: [(&str, f64); 6] = [
    ("km", 1.0e6),
    ("m", 1.0e3),
    ("cm", 10.0),
    ("mm", 1.0),
    ("um", 1.0e-3),
    ("nm", 1.0e-6),
];

const LABEL_SIGNIFICANT_DIGITS: i32 = 6;

/// Format a length in its best unit with no whitespace.
///
/// The unit is the largest one in which the magnitude is at least 1;
/// lengths below 1 nm (and zero) use nanometres. The value keeps six
/// significant digits with trailing zeros dropped.
///
/// ```
/// use hitgrid::config::length_label;
/// assert_eq!(length_label(20.0), "2cm");
/// assert_eq!(length_label(15.0), "1.5cm");
/// assert_eq!(length_label(1000.0), "1m");
/// assert_eq!(length_label(1234.5678), "1.23457m");
/// ```
pub fn length_label(mm: f64) -> String {
    let magnitude = mm.abs();
    let (unit, scale) = LENGTH_UNITS
        .iter()
        .copied()
        .find(|&(_, scale)| magnitude >= scale)
        .unwrap_or(LENGTH_UNITS[LENGTH_UNITS.len() - 1]);

    let value = mm / scale;
    let decimals = if value == 0.0 || !value.is_finite() {
        0
    } else {
        let exponent = value.abs().log10().floor() as i32;
        (LABEL_SIGNIFICANT_DIGITS - 1 - exponent).clamp(0, 15) as usize
    };

    let text = format!("{:.*}", decimals, value);
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    let text = if text == "-0" { "0" } else { text };

    let label: String = format!("{}{}", text, unit);
    label.split_whitespace().collect()
}
