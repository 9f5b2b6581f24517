//! Post-processing pass that removes residual overlaps the force model
//! leaves behind: one single-threaded bulk scale, then a parallel
//! iterative nudge pass repeated until no enabled pair overlaps.
//!
//! Grounded on `sparsify.c`'s `sparsify_world` (bulk scale, not dispatched
//! through the pool — matching the original, which only calls
//! `give_work` from `sparsify_step`) and `sparsify_step`/`resolve_overlap`
//! (the parallel iterative pass).

use std::sync::Arc;

use log::warn;

use crate::geometry::Pos;
use crate::pool::{Task, WorkerPool};
use crate::world::{Vertex, World, RELAX_EXTRA};

/// Safety bound on the iterative pass. The original loops `while energy >
/// 0` with no bound at all (Design Notes flag this); floating-point
/// accumulation is expected to reach exactly zero, but a degenerate input
/// (e.g. many coincident vertices) could in principle stall. Hitting the
/// cap is logged as a warning, not an error — the caller gets the best
/// layout achieved so far.
pub const MAX_SPARSIFY_ITERATIONS: usize = 10_000;

/// One-shot uniform rescale of every enabled vertex's position, computed
/// from the asymmetric overlap score `sparsify.c::count_overlap` defines.
/// Runs single-threaded, matching the original (only the iterative pass is
/// parallelized).
pub fn bulk_scale(world: &World) {
    let mut vertices = world.vertices.write();
    let n = vertices.len();

    let mut counter = 0.0;
    let mut total = 0.0;
    for i in 0..n {
        let vi = vertices[i];
        if !vi.is_enabled() {
            continue;
        }
        for j in (i + 1)..n {
            let vj = vertices[j];
            if !vj.is_enabled() {
                continue;
            }
            let d = vi.pos.dist(vj.pos);
            let relax = vi.radius + vj.radius + RELAX_EXTRA;
            if d < relax {
                counter += vi.weight + vj.weight;
                total += vj.weight * overlap_score(d, vi.radius, vj.radius)
                    + vi.weight * overlap_score(d, vj.radius, vi.radius);
            }
        }
    }

    if counter == 0.0 {
        return;
    }
    let total_overlap = total / counter;
    for vertex in vertices.iter_mut() {
        vertex.pos = vertex.pos.scale(total_overlap);
    }
}

/// `count_overlap(dist, a, b)` from the original: `a` is the vertex whose
/// radius anchors the subtraction, `b`'s radius (plus slack) is the
/// numerator. Called twice per pair with the roles of `i`/`j` swapped.
fn overlap_score(d: f64, a_radius: f64, b_radius: f64) -> f64 {
    let overlap = d - a_radius;
    if overlap < 0.0 {
        3.0
    } else {
        (3.0f64).min((b_radius + RELAX_EXTRA) / overlap)
    }
}

/// Runs the iterative nudge pass through the pool until total overlap is
/// exactly zero (or the safety cap is hit), reporting per-step overlap via
/// `on_step`. Returns the number of steps run.
pub fn sparsify(
    world: &Arc<World>,
    pool: &WorkerPool,
    mut on_step: impl FnMut(usize, f64),
) -> usize {
    bulk_scale(world);

    let mut iterations = 0;
    loop {
        let overlap = sparsify_step(world, pool);
        iterations += 1;
        on_step(iterations, overlap);
        if overlap <= 0.0 {
            break;
        }
        if iterations >= MAX_SPARSIFY_ITERATIONS {
            warn!(
                "sparsify did not converge after {MAX_SPARSIFY_ITERATIONS} iterations; \
                 using best layout found (overlap {overlap})"
            );
            break;
        }
    }
    iterations
}

/// One iterative sparsify step: each enabled vertex is nudged away from
/// every other enabled vertex it taxicab-overlaps, dispatched per
/// partition through the pool, then written back after the barrier.
/// Returns total overlap (sum of `relax - dist` over overlapping pairs).
fn sparsify_step(world: &Arc<World>, pool: &WorkerPool) -> f64 {
    let tasks: Vec<Task> = world
        .partitions
        .iter()
        .enumerate()
        .map(|(partition_index, _)| {
            let world = Arc::clone(world);
            Box::new(move || {
                let vertices = world.vertices.read();
                let partition = &world.partitions[partition_index];
                let mut scratch = partition.scratch.lock();
                scratch.energy = 0.0;
                for (local, i) in (partition.start..partition.end).enumerate() {
                    let vi = vertices[i];
                    if !vi.is_enabled() {
                        scratch.positions[local] = vi.pos;
                        continue;
                    }
                    let (nudged, overlap) = resolve_overlap(&vertices, i, vi);
                    scratch.positions[local] = nudged;
                    scratch.energy += overlap;
                }
            }) as Task
        })
        .collect();
    pool.submit(tasks);

    let mut total_overlap = 0.0;
    {
        let mut vertices = world.vertices.write();
        for partition in &world.partitions {
            let scratch = partition.scratch.lock();
            for (local, i) in (partition.start..partition.end).enumerate() {
                vertices[i].pos = scratch.positions[local];
            }
            total_overlap += scratch.energy;
        }
    }
    total_overlap
}

/// Nudges `i` away from every other enabled vertex within a taxicab
/// pre-filter, matching `resolve_overlap` in `sparsify.c` exactly,
/// including its `RELAX_EXTRA / 2` slack (half of the force step's) and
/// the heavier-moves-less asymmetry.
fn resolve_overlap(vertices: &[Vertex], i: usize, vi: Vertex) -> (Pos, f64) {
    let mut overlap_total = 0.0;
    let mut force = Pos::ZERO;
    for (j, &vj) in vertices.iter().enumerate() {
        if j == i || !vj.is_enabled() {
            continue;
        }

        let relax = vi.radius + vj.radius + RELAX_EXTRA / 2.0;
        let taxicab = (vi.pos.x - vj.pos.x).abs() + (vi.pos.y - vj.pos.y).abs();
        if relax * 2.0 < taxicab {
            continue;
        }

        let d = vi.pos.dist(vj.pos);
        if d < relax {
            overlap_total += relax - d;
            let mut nudge = -(relax + RELAX_EXTRA - d) / 2.0;
            if vi.weight > vj.weight {
                nudge *= vj.weight / vi.weight;
            }
            let unit_x = (vj.pos.x - vi.pos.x) / d;
            let unit_y = (vj.pos.y - vi.pos.y) / d;
            force.x += nudge * unit_x;
            force.y += nudge * unit_y;
        }
    }
    (vi.pos.add(force), overlap_total)
}
