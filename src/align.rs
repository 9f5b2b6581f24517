//! Rigid-transform alignment against a reference layout: a coarse
//! rotation/mirror scan followed by a fine scan around the coarse winner,
//! both dispatched through the worker pool as embarrassingly-parallel
//! per-candidate tasks.
//!
//! Grounded on `adjust.c`'s `compare_initer`/`work_adjust`/`compare_world`.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::geometry::{Matrix2, Pos};
use crate::pool::{Task, WorkerPool};
use crate::world::World;

/// Candidates per pass, matching `adjust.c`'s `COMPARE_STEPS`.
const CANDIDATES_PER_PASS: usize = 4000;
const HALF: usize = CANDIDATES_PER_PASS / 2;

/// A reference vertex's position and weight, looked up by dense index of
/// the *current* world (not the reference document's own ordering).
#[derive(Debug, Clone, Copy)]
pub struct RefVertex {
    pub pos: Pos,
    pub weight: f64,
}

/// Builds a dense-index-aligned reference table from a loaded position
/// document. Vertices absent from the reference (external id not found)
/// are `None` and excluded from the alignment score: only vertices whose
/// external id is present in the reference document are read.
pub fn build_reference(world: &World, loaded: &[(u64, Pos, f64)]) -> Vec<Option<RefVertex>> {
    let mut reference = vec![None; world.len()];
    for &(external_id, pos, weight) in loaded {
        if let Some(idx) = world.id_map.index_of(external_id) {
            reference[idx] = Some(RefVertex { pos, weight });
        }
    }
    reference
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    theta: f64,
    mirror: bool,
}

fn coarse_candidates() -> Vec<Candidate> {
    (0..CANDIDATES_PER_PASS)
        .map(|k| {
            let local = if k < HALF { k } else { k - HALF };
            let theta = local as f64 * 2.0 * PI / HALF as f64;
            Candidate { theta, mirror: k >= HALF }
        })
        .collect()
}

fn fine_candidates(base_theta: f64, mirror: bool) -> Vec<Candidate> {
    let half = HALF as i64;
    (-half..half)
        .map(|j| Candidate {
            theta: base_theta + j as f64 * 2.0 * PI / (HALF * HALF) as f64,
            mirror,
        })
        .collect()
}

/// Scores every candidate against the reference in parallel, one task per
/// candidate. Score is `Σ hypot(M·pos_i − ref_pos_i) · weight_i` over
/// enabled vertices with a present, positive, finite reference weight.
fn score_candidates(
    world: &Arc<World>,
    pool: &WorkerPool,
    reference: &Arc<Vec<Option<RefVertex>>>,
    candidates: &[Candidate],
) -> Vec<f64> {
    let scores: Arc<Vec<AtomicU64>> =
        Arc::new((0..candidates.len()).map(|_| AtomicU64::new(0)).collect());

    let tasks: Vec<Task> = candidates
        .iter()
        .enumerate()
        .map(|(idx, &candidate)| {
            let world = Arc::clone(world);
            let reference = Arc::clone(reference);
            let scores = Arc::clone(&scores);
            Box::new(move || {
                let matrix = Matrix2::for_candidate(candidate.theta, candidate.mirror);
                let vertices = world.vertices.read();
                let mut badness = 0.0;
                for (i, vertex) in vertices.iter().enumerate() {
                    if !vertex.is_enabled() {
                        continue;
                    }
                    let Some(reference_vertex) = reference[i] else { continue };
                    if !(reference_vertex.weight > 0.0 && reference_vertex.weight.is_finite()) {
                        continue;
                    }
                    let transformed = matrix.apply(vertex.pos);
                    badness += transformed.dist(reference_vertex.pos) * vertex.weight;
                }
                scores[idx].store(badness.to_bits(), Ordering::Relaxed);
            }) as Task
        })
        .collect();
    pool.submit(tasks);

    scores.iter().map(|score| f64::from_bits(score.load(Ordering::Relaxed))).collect()
}

fn argmin(scores: &[f64]) -> usize {
    let mut best = 0;
    for (idx, &score) in scores.iter().enumerate() {
        if score < scores[best] {
            best = idx;
        }
    }
    best
}

/// Runs the coarse then fine scan and applies the best transform found
/// (across *both* passes) to every vertex position in place. Returns the
/// applied matrix, for diagnostics and tests.
pub fn align(
    world: &Arc<World>,
    pool: &WorkerPool,
    reference: &Arc<Vec<Option<RefVertex>>>,
) -> Matrix2 {
    let coarse = coarse_candidates();
    let coarse_scores = score_candidates(world, pool, reference, &coarse);
    let coarse_best_idx = argmin(&coarse_scores);
    let coarse_best = coarse[coarse_best_idx];
    let coarse_best_score = coarse_scores[coarse_best_idx];

    let fine = fine_candidates(coarse_best.theta, coarse_best.mirror);
    let fine_scores = score_candidates(world, pool, reference, &fine);
    let fine_best_idx = argmin(&fine_scores);
    let fine_best = fine[fine_best_idx];
    let fine_best_score = fine_scores[fine_best_idx];

    let best = if fine_best_score < coarse_best_score { fine_best } else { coarse_best };
    let matrix = Matrix2::for_candidate(best.theta, best.mirror);

    let mut vertices = world.vertices.write();
    for vertex in vertices.iter_mut() {
        vertex.pos = matrix.apply(vertex.pos);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use std::collections::HashMap;

    fn triangle_world() -> Arc<World> {
        let mut items = HashMap::new();
        for id in ["1", "2", "3"] {
            items.insert(id.to_string(), 0i64);
        }
        let mut picks = HashMap::new();
        picks.insert("a".to_string(), vec![1u64, 2, 3]);
        let world = World::build(&items, &picks, &[]).unwrap();
        {
            let mut vertices = world.vertices.write();
            vertices[0].pos = Pos::new(10.0, 0.0);
            vertices[1].pos = Pos::new(-5.0, 8.7);
            vertices[2].pos = Pos::new(-5.0, -8.7);
        }
        Arc::new(world)
    }

    fn reference_from(world: &World) -> Vec<(u64, Pos, f64)> {
        let vertices = world.vertices.read();
        (0..world.len())
            .map(|i| (world.id_map.external_of(i), vertices[i].pos, vertices[i].weight))
            .collect()
    }

    #[test]
    fn aligning_to_self_finds_near_identity() {
        let world = triangle_world();
        let loaded = reference_from(&world);
        let reference = Arc::new(build_reference(&world, &loaded));
        let before: Vec<Pos> = world.vertices.read().iter().map(|v| v.pos).collect();

        let pool = WorkerPool::new(2);
        let matrix = align(&world, &pool, &reference);

        assert!((matrix.determinant() - 1.0).abs() < 1e-6);
        let after: Vec<Pos> = world.vertices.read().iter().map(|v| v.pos).collect();
        for (b, a) in before.iter().zip(after.iter()) {
            assert!(b.dist(*a) < 0.5, "expected near-identity alignment, moved {b:?} -> {a:?}");
        }
    }

    #[test]
    fn mirrored_reference_is_detected() {
        let world = triangle_world();
        let mut loaded = reference_from(&world);
        for entry in &mut loaded {
            entry.1.x = -entry.1.x;
        }
        let reference = Arc::new(build_reference(&world, &loaded));

        let pool = WorkerPool::new(2);
        let matrix = align(&world, &pool, &reference);
        assert!((matrix.determinant() + 1.0).abs() < 1e-6);
    }
}
