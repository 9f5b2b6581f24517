//! The driver: wires world construction, the force loop, sparsify, and
//! optional alignment together in the order `world.c`'s `main` runs them.
//! Shared between the `forcelayout` binary and integration tests so both
//! exercise the exact same orchestration.

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::align::{self, RefVertex};
use crate::error::ForceLayoutError;
use crate::force::{self, ForceParams};
use crate::io;
use crate::pool::WorkerPool;
use crate::sparsify;
use crate::world::World;

/// Default iteration count, matching `world.c`'s `ITERATIONS`. Also the
/// fallback used when `-i` is given as `0` (the original's `if
/// (options.iterations <= 0) options.iterations = ITERATIONS;`, so an
/// explicit zero is not "zero iterations" but "use the default").
pub const DEFAULT_ITERATIONS: usize = 1000;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub positions: Option<PathBuf>,
    pub reference: Option<PathBuf>,
    pub threads: usize,
    pub iterations: usize,
    pub quiet: bool,
}

/// Runs the full pipeline end to end: load input, seed the world (with
/// `-p` overrides applied before heaviest-vertex/closure/weight-inv
/// computation), run `iterations` force steps, sparsify to zero overlap,
/// align to a reference if one was given, and write the output document.
///
/// The reference document (if any) is loaded on a side thread started
/// before the force loop, joined just before alignment runs — mirroring
/// `main`'s `pthread_create`/`pthread_join` around `compare_initer` so
/// disk I/O overlaps the simulation.
pub fn run(config: &RunConfig) -> Result<(), ForceLayoutError> {
    let (items, picks) = io::load_input(&config.input)?;
    let overrides = match &config.positions {
        Some(path) => io::load_position_doc(path)?,
        None => Vec::new(),
    };
    let world = Arc::new(World::build(&items, &picks, &overrides)?);

    let reference_handle = config.reference.clone().map(|path| {
        std::thread::spawn(move || io::load_position_doc(&path))
    });

    let pool = WorkerPool::new(config.threads);
    let mut params = ForceParams::default();
    for i in 0..config.iterations {
        let energy = force::force_step(&world, &pool, &mut params);
        if !config.quiet {
            info!("{i} forces {energy}");
        }
    }

    sparsify::sparsify(&world, &pool, |step, overlap| {
        if !config.quiet {
            info!("overlap {step} {overlap}");
        }
    });

    if let Some(handle) = reference_handle {
        let loaded = handle
            .join()
            .unwrap_or_else(|_| panic!("reference loader thread panicked"))?;
        let reference: Arc<Vec<Option<RefVertex>>> =
            Arc::new(align::build_reference(&world, &loaded));
        align::align(&world, &pool, &reference);
    }

    io::dump_output(&world, &config.output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn read_json(path: &std::path::Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn two_vertices_one_edge_converge_to_relax_distance() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(
            &dir,
            "in.json",
            r#"{"items": {"1": {"weight": 0}, "2": {"weight": 0}}, "picks": {"a": [1, 2]}}"#,
        );
        let output = dir.path().join("out.json");

        let config = RunConfig {
            input,
            output: output.clone(),
            positions: None,
            reference: None,
            threads: 2,
            iterations: 1000,
            quiet: true,
        };
        run(&config).unwrap();

        let doc = read_json(&output);
        let p1 = &doc["1"];
        let p2 = &doc["2"];
        let dx = p1["x"].as_f64().unwrap() - p2["x"].as_f64().unwrap();
        let dy = p1["y"].as_f64().unwrap() - p2["y"].as_f64().unwrap();
        let d = dx.hypot(dy);
        let relax = p1["radius"].as_f64().unwrap() + p2["radius"].as_f64().unwrap() + 1.0;
        assert!((d - relax).abs() < 0.05, "distance {d} should equal relax {relax}");

        let mx = (p1["x"].as_f64().unwrap() + p2["x"].as_f64().unwrap()) / 2.0;
        let my = (p1["y"].as_f64().unwrap() + p2["y"].as_f64().unwrap()) / 2.0;
        assert!(mx.abs() < 1e-3 && my.abs() < 1e-3, "midpoint should sit at the origin");
    }

    #[test]
    fn triangle_converges_to_equilateral() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(
            &dir,
            "in.json",
            r#"{"items": {"1": {"weight": 0}, "2": {"weight": 0}, "3": {"weight": 0}},
                "picks": {"a": [1, 2, 3]}}"#,
        );
        let output = dir.path().join("out.json");
        run(&RunConfig {
            input,
            output: output.clone(),
            positions: None,
            reference: None,
            threads: 3,
            iterations: 1000,
            quiet: true,
        })
        .unwrap();

        let doc = read_json(&output);
        let pts: Vec<(f64, f64)> = ["1", "2", "3"]
            .iter()
            .map(|id| (doc[*id]["x"].as_f64().unwrap(), doc[*id]["y"].as_f64().unwrap()))
            .collect();
        let d01 = (pts[0].0 - pts[1].0).hypot(pts[0].1 - pts[1].1);
        let d12 = (pts[1].0 - pts[2].0).hypot(pts[1].1 - pts[2].1);
        let d20 = (pts[2].0 - pts[0].0).hypot(pts[2].1 - pts[0].1);
        assert!((d01 - d12).abs() < 0.05);
        assert!((d12 - d20).abs() < 0.05);
    }

    #[test]
    fn disconnected_island_is_omitted_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(
            &dir,
            "in.json",
            r#"{"items": {"1": {"weight": 5}, "2": {"weight": 0}, "3": {"weight": 0}, "4": {"weight": 0}},
                "picks": {"a": [1, 2], "b": [3, 4]}}"#,
        );
        let output = dir.path().join("out.json");
        run(&RunConfig {
            input,
            output: output.clone(),
            positions: None,
            reference: None,
            threads: 2,
            iterations: 50,
            quiet: true,
        })
        .unwrap();

        let doc = read_json(&output);
        assert!(doc.get("1").is_some());
        assert!(doc.get("2").is_some());
        assert!(doc.get("3").is_none());
        assert!(doc.get("4").is_none());
    }

    #[test]
    fn aligning_output_to_itself_is_near_identity() {
        let dir = tempfile::tempdir().unwrap();
        let input = write(
            &dir,
            "in.json",
            r#"{"items": {"1": {"weight": 0}, "2": {"weight": 0}, "3": {"weight": 0}},
                "picks": {"a": [1, 2, 3]}}"#,
        );
        let output = dir.path().join("out.json");
        run(&RunConfig {
            input: input.clone(),
            output: output.clone(),
            positions: None,
            reference: None,
            threads: 2,
            iterations: 300,
            quiet: true,
        })
        .unwrap();

        let before = read_json(&output);
        let reference = output.clone();
        let realigned = dir.path().join("aligned.json");
        run(&RunConfig {
            input,
            output: realigned.clone(),
            positions: Some(output),
            reference: Some(reference),
            threads: 2,
            iterations: 0,
            quiet: true,
        })
        .unwrap();

        let after = read_json(&realigned);
        for id in ["1", "2", "3"] {
            let dx = before[id]["x"].as_f64().unwrap() - after[id]["x"].as_f64().unwrap();
            let dy = before[id]["y"].as_f64().unwrap() - after[id]["y"].as_f64().unwrap();
            assert!(dx.hypot(dy) < 0.5, "vertex {id} moved too far under self-alignment");
        }
    }
}
