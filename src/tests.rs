//! Integration Tests for hit aggregation
//!
//! End-to-end checks across geometry, accumulation, merge and reporting.

use crate::config::RunConfig;
use crate::detector::{HitAccumulator, HitFilter, StepPoint};
use crate::geometry::{CellIndex, GridCoordinate, GridIndexer};
use crate::report::{ReportFormat, RunReport, RunReportWriter};
use crate::run::RunCoordinator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use tempfile::TempDir;

fn config_in(dir: &TempDir, workers: usize, thickness_mm: f64) -> RunConfig {
    RunConfig {
        output_dir: dir.path().to_path_buf(),
        workers,
        lead_thickness_mm: thickness_mm,
        ..RunConfig::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// GRID INDEXING TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod indexing_tests {
    use super::*;

    #[test]
    fn test_coordinates_are_unique() {
        let grid = GridIndexer::standard();
        let mut seen = std::collections::HashSet::new();
        for index in grid.cell_indices() {
            assert!(seen.insert(grid.to_coordinate(index).unwrap()));
        }
        assert_eq!(seen.len(), 441);
    }

    #[test]
    fn test_row_major_contract() {
        // cell_index = row * n_cols + col, y grows with row
        let grid = GridIndexer::new(5, 7).unwrap();
        for row in 0..5u32 {
            for col in 0..7u32 {
                let coord = grid.to_coordinate(row * 7 + col).unwrap();
                assert_eq!(coord, GridCoordinate::new(col as i32 - 3, row as i32 - 2));
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCUMULATION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod accumulation_tests {
    use super::*;

    #[test]
    fn test_additivity_for_random_distributions() {
        let grid = GridIndexer::standard();
        let mut rng = StdRng::seed_from_u64(7);

        for n_workers in [1usize, 2, 3, 8] {
            let increments: Vec<(CellIndex, u64)> = (0..2000)
                .map(|_| (rng.gen_range(0..grid.n_cells()), rng.gen_range(0..4)))
                .collect();

            let mut expected = vec![0u64; grid.n_cells() as usize];
            for &(cell, delta) in &increments {
                expected[cell as usize] += delta;
            }

            let mut workers: Vec<HitAccumulator> =
                (0..n_workers).map(|_| HitAccumulator::for_grid(&grid)).collect();
            for &(cell, delta) in &increments {
                let w = rng.gen_range(0..n_workers);
                workers[w].increment(cell, delta).unwrap();
            }

            let (first, rest) = workers.split_first().unwrap();
            let merged = first.merge(rest).unwrap();
            for index in grid.cell_indices() {
                assert_eq!(merged.get(index), Some(expected[index as usize]));
            }

            // Any other merge order gives the same numbers
            workers.reverse();
            let (first, rest) = workers.split_first().unwrap();
            assert_eq!(first.merge(rest).unwrap(), merged);
        }
    }

    #[test]
    fn test_workers_on_threads_need_no_locks() {
        let grid = GridIndexer::standard();
        let filter = HitFilter::default();

        let handles: Vec<_> = (0..4u32)
            .map(|w| {
                let filter = filter.clone();
                std::thread::spawn(move || {
                    let mut acc = HitAccumulator::for_grid(&grid);
                    for i in 0..1000u32 {
                        let step = StepPoint::electron_entering(u64::from(w), (i * 7 + w) % 441);
                        filter.process(&step, &mut acc).unwrap();
                    }
                    acc
                })
            })
            .collect();

        let workers: Vec<HitAccumulator> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let (first, rest) = workers.split_first().unwrap();
        assert_eq!(first.merge(rest).unwrap().total(), 4000);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// END-TO-END SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn test_two_worker_scenario() {
        let dir = TempDir::new().unwrap();
        let mut run = RunCoordinator::new(config_in(&dir, 2, 20.0)).unwrap();

        let worker_a: Vec<StepPoint> = std::iter::repeat(StepPoint::electron_entering(0, 220))
            .take(5)
            .chain(std::iter::repeat(StepPoint::electron_entering(0, 0)).take(2))
            .collect();
        let worker_b: Vec<StepPoint> = std::iter::repeat(StepPoint::electron_entering(1, 220))
            .take(3)
            .collect();

        run.begin_run();
        assert_eq!(run.accumulate(vec![worker_a, worker_b]).unwrap(), 10);
        let outcome = run.end_run(2).unwrap().unwrap();

        let master = run.master().unwrap();
        assert_eq!(master.get(220), Some(8));
        assert_eq!(master.get(0), Some(2));
        assert!(master
            .snapshot()
            .iter()
            .all(|(&i, &c)| i == 0 || i == 220 || c == 0));

        assert_eq!(outcome.path, dir.path().join("results_2cm_1.csv"));
        let text = fs::read_to_string(&outcome.path).unwrap();
        let rows: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(rows, vec!["X,Y,Hits", "-10,-10,2", "0,0,8"]);
        assert_eq!(text.lines().last(), Some("# total,10"));
    }

    #[test]
    fn test_rerun_never_overwrites() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("results_2cm_1.csv"), "earlier result\n").unwrap();

        let mut run = RunCoordinator::new(config_in(&dir, 3, 20.0)).unwrap();
        let steps = vec![StepPoint::electron_entering(0, 100)];

        let second = run.execute(steps.clone()).unwrap().unwrap();
        let third = run.execute(steps).unwrap().unwrap();

        assert_eq!(second.path, dir.path().join("results_2cm_2.csv"));
        assert_eq!(third.path, dir.path().join("results_2cm_3.csv"));
        assert_eq!(
            fs::read_to_string(dir.path().join("results_2cm_1.csv")).unwrap(),
            "earlier result\n"
        );
        assert_eq!(run.runs_completed(), 2);
    }

    #[test]
    fn test_counts_do_not_leak_between_runs() {
        let dir = TempDir::new().unwrap();
        let mut run = RunCoordinator::new(config_in(&dir, 2, 10.0)).unwrap();

        let first = run
            .execute(vec![StepPoint::electron_entering(0, 5), StepPoint::electron_entering(1, 5)])
            .unwrap()
            .unwrap();
        let second = run.execute(vec![StepPoint::electron_entering(4, 5)]).unwrap().unwrap();

        assert_eq!(first.report.total_hits, 2);
        assert_eq!(second.report.total_hits, 1);
    }

    #[test]
    fn test_empty_run_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut run = RunCoordinator::new(config_in(&dir, 2, 20.0)).unwrap();
        assert!(run.execute(Vec::new()).unwrap().is_none());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_events_without_hits_still_report() {
        let dir = TempDir::new().unwrap();
        let mut run = RunCoordinator::new(config_in(&dir, 2, 20.0)).unwrap();
        let outcome = run
            .execute(vec![StepPoint::new(0, "gamma", 220, true)])
            .unwrap()
            .unwrap();
        assert_eq!(outcome.report.event_count, 1);
        assert_eq!(outcome.report.total_hits, 0);
        assert!(outcome.report.entries.is_empty());
    }

    #[test]
    fn test_parallel_run_matches_serial_count() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let steps: Vec<StepPoint> = (0..5000u64)
            .map(|i| {
                let species = if rng.gen_bool(0.8) { "e-" } else { "gamma" };
                StepPoint::new(i / 5, species, rng.gen_range(0..441), rng.gen_bool(0.5))
            })
            .collect();

        let grid = GridIndexer::standard();
        let filter = HitFilter::default();
        let mut serial = HitAccumulator::for_grid(&grid);
        for step in &steps {
            filter.process(step, &mut serial).unwrap();
        }

        let mut run = RunCoordinator::new(config_in(&dir, 8, 20.0)).unwrap();
        let outcome = run.execute(steps).unwrap().unwrap();

        assert_eq!(outcome.report.event_count, 1000);
        assert_eq!(run.master().unwrap(), &serial);
        let expected = RunReport::from_accumulator(&grid, &serial, 1000).unwrap();
        assert_eq!(outcome.report, expected);
    }

    #[test]
    fn test_json_report_naming() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig {
            format: ReportFormat::Json,
            ..config_in(&dir, 1, 15.0)
        };
        let mut run = RunCoordinator::new(config).unwrap();
        let outcome = run.execute(vec![StepPoint::electron_entering(0, 220)]).unwrap().unwrap();
        assert_eq!(outcome.path, dir.path().join("results_1.5cm_1.json"));

        let parsed: RunReport =
            serde_json::from_str(&fs::read_to_string(&outcome.path).unwrap()).unwrap();
        assert_eq!(parsed.entries[0].x, 0);
        assert_eq!(parsed.entries[0].y, 0);
    }

    #[test]
    fn test_writer_used_directly() {
        let dir = TempDir::new().unwrap();
        let grid = GridIndexer::standard();
        let mut acc = HitAccumulator::for_grid(&grid);
        acc.increment(grid.to_index(GridCoordinate::new(3, -4)).unwrap(), 6).unwrap();

        let report = RunReport::from_accumulator(&grid, &acc, 6).unwrap();
        let writer = RunReportWriter::new(dir.path(), "results", ReportFormat::Csv);
        let path = writer.write(&report, "5mm").unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("\n3,-4,6\n"));
    }
}
