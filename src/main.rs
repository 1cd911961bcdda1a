//! # hitgrid
//!
//! Replay a recorded step stream through the hit counters and write the
//! run report.
//!
//! ## Usage
//!
//! ```bash
//! # Replay with the defaults (21x21 grid, 1 cm target, 4 workers)
//! cargo run --release -- --events steps.jsonl
//!
//! # 2 cm target, 8 workers, reports under runs/
//! cargo run --release -- --events steps.jsonl --thickness-mm 20 --workers 8 -o runs
//!
//! # Start from a JSON config and override one field
//! cargo run --release -- --config run.json --events steps.jsonl --format json
//! ```
//!
//! Each line of the step file is one JSON object:
//!
//! ```text
//! {"event": 0, "species": "e-", "cell": 220, "entering": true}
//! ```

use clap::Parser;
use std::path::PathBuf;

use hitgrid::{
    detector::ELECTRON,
    run::read_step_stream,
    ReportFormat, RunConfig, RunCoordinator,
};

/// Detector grid hit counter
#[derive(Parser, Debug)]
#[command(name = "hitgrid")]
#[command(about = "Aggregate detector-cell hits from a step stream into a run report")]
struct Args {
    /// JSON-lines file of transport steps
    #[arg(long, short = 'e')]
    events: PathBuf,

    /// JSON run configuration (defaults are used when omitted)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Lead target thickness in millimetres (labels the report file)
    #[arg(long)]
    thickness_mm: Option<f64>,

    /// Number of simulation workers
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Directory for report files
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Report file name prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Report format: csv or json
    #[arg(long, short = 'f')]
    format: Option<ReportFormat>,

    /// Particle species counted as a hit
    #[arg(long)]
    species: Option<String>,

    /// Save the effective configuration to this path
    #[arg(long)]
    save_config: Option<PathBuf>,
}

impl Args {
    fn run_config(&self) -> Result<RunConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(mm) = self.thickness_mm {
            config.lead_thickness_mm = mm;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.file_prefix = prefix.clone();
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(species) = &self.species {
            config.target_species = species.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

/// Console line for the run total, naming the counted species
fn detected_line(species: &str, total_hits: u64) -> String {
    if species == ELECTRON {
        format!(" Total Electrons Detected: {}", total_hits)
    } else {
        format!(" Total {} Detected: {}", species, total_hits)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.run_config()?;

    if let Some(path) = &args.save_config {
        config.to_json_file(path)?;
        log::info!("Saved configuration to {:?}", path);
    }

    println!("hitgrid v{}", hitgrid::VERSION);
    println!(
        "  Grid: {}x{} | Target: {} | Workers: {} | Label: {}",
        config.n_cols,
        config.n_rows,
        config.target_species,
        config.workers,
        config.base_label()
    );

    let steps = read_step_stream(&args.events)?;

    let species = config.target_species.clone();
    let start = std::time::Instant::now();
    let mut run = RunCoordinator::new(config)?;
    let outcome = run.execute(steps)?;
    let elapsed = start.elapsed();

    println!("------------------------------------------------------------");
    match outcome {
        Some(outcome) => {
            println!(" Run ended! Number of events: {}", outcome.report.event_count);
            println!("{}", detected_line(&species, outcome.report.total_hits));
            println!(" Results written to '{}'", outcome.path.display());
            println!("------------------------------------------------------------");
            println!("{}", outcome.report.summary());
        }
        None => {
            println!(" Run ended with no events, nothing written");
            println!("------------------------------------------------------------");
        }
    }
    println!("Wall-clock time: {:.3} s", elapsed.as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_line_names_species() {
        assert_eq!(detected_line("e-", 42), " Total Electrons Detected: 42");
        assert_eq!(detected_line("gamma", 7), " Total gamma Detected: 7");
    }

    #[test]
    fn test_species_override_reaches_config() {
        let args = Args::parse_from(["hitgrid", "-e", "steps.jsonl", "--species", "mu-"]);
        let config = args.run_config().unwrap();
        assert_eq!(config.target_species, "mu-");
        assert_eq!(detected_line(&config.target_species, 3), " Total mu- Detected: 3");
    }
}
