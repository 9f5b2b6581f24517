//! One step of the force-directed simulation: compute a net displacement
//! per enabled vertex against every other enabled vertex, write the new
//! positions into per-partition scratch, then recenter the whole layout on
//! its weighted barycenter.
//!
//! Grounded on `force.c`'s `work_map`/`count_energy`/`world_step`. The
//! write-back takes the `#if 1` branch the original kept active (direct
//! in-line write-back); the `#else` branch, which allocated and freed a
//! `copy_data` every step only to do the same thing, is not carried over.

use std::sync::Arc;

use crate::geometry::Pos;
use crate::pool::{Task, WorkerPool};
use crate::world::{EdgeMatrix, Vertex, World, RELAX_EXTRA};

/// Geometric decay applied to `max_move` after every force step.
pub const COOLING: f64 = 0.995;
/// Geometric growth applied to `repulsion_cap` after every force step.
pub const REPULSION_CAP_GROWTH: f64 = 1.15;

/// The two values the cooling schedule evolves across force steps.
#[derive(Debug, Clone, Copy)]
pub struct ForceParams {
    pub max_move: f64,
    pub repulsion_cap: f64,
}

impl Default for ForceParams {
    fn default() -> Self {
        ForceParams { max_move: 30.0, repulsion_cap: 10.0 }
    }
}

/// Runs one force step and applies the cooling schedule. Returns the
/// summed pre-cap force magnitude across all enabled vertices (reporting
/// only; not used by the algorithm itself).
pub fn force_step(world: &Arc<World>, pool: &WorkerPool, params: &mut ForceParams) -> f64 {
    let max_move = params.max_move;
    let repulsion_cap = params.repulsion_cap;

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
                scratch.extra = Pos::ZERO;
                for (local, i) in (partition.start..partition.end).enumerate() {
                    let vi = vertices[i];
                    if !vi.is_enabled() {
                        scratch.positions[local] = vi.pos;
                        continue;
                    }
                    let (force, energy) =
                        vertex_force(&world.edges, &vertices, i, vi, max_move, repulsion_cap);
                    let new_pos = vi.pos.add(force);
                    scratch.positions[local] = new_pos;
                    scratch.energy += energy;
                    scratch.extra = scratch.extra.add(new_pos.scale(vi.weight));
                }
            }) as Task
        })
        .collect();
    pool.submit(tasks);

    let mut total_energy = 0.0;
    let mut barycenter = Pos::ZERO;
    for partition in &world.partitions {
        let scratch = partition.scratch.lock();
        total_energy += scratch.energy;
        barycenter = barycenter.add(scratch.extra);
    }
    if world.world_weight_inv.is_finite() {
        barycenter = barycenter.scale(world.world_weight_inv);
    } else {
        barycenter = Pos::ZERO;
    }

    {
        let mut vertices = world.vertices.write();
        for partition in &world.partitions {
            let scratch = partition.scratch.lock();
            for (local, i) in (partition.start..partition.end).enumerate() {
                vertices[i].pos = scratch.positions[local].sub(barycenter);
            }
        }
    }

    params.max_move *= COOLING;
    params.repulsion_cap *= REPULSION_CAP_GROWTH;

    total_energy
}

/// Net force on vertex `i` from every other enabled vertex, capped to
/// `max_move` in magnitude. Returns `(force, pre_cap_magnitude)`.
fn vertex_force(
    edges: &EdgeMatrix,
    vertices: &[Vertex],
    i: usize,
    vi: Vertex,
    max_move: f64,
    repulsion_cap: f64,
) -> (Pos, f64) {
    let mut force = Pos::ZERO;
    for (j, &vj) in vertices.iter().enumerate() {
        if j == i || !vj.is_enabled() {
            continue;
        }

        let d = vi.pos.dist(vj.pos);
        let relax = vi.radius + vj.radius + RELAX_EXTRA;
        let w_ij = edges.get(i, j);

        let mut e = 0.0;
        if w_ij > 0.0 {
            let spring = w_ij / vj.weight * (d - relax).powi(2) / (vj.weight + relax);
            e = if d < relax { -spring } else { spring };
        }

        let mut rep = (vj.weight + relax).powi(2) / d;
        let cap = repulsion_cap * vj.weight;
        if rep > cap {
            rep = cap;
        }
        rep -= 0.01;
        e -= rep;

        e /= vi.weight;
        let unit_x = (vj.pos.x - vi.pos.x) / d;
        let unit_y = (vj.pos.y - vi.pos.y) / d;
        force.x += e * unit_x;
        force.y += e * unit_y;
    }

    let magnitude = force.x.hypot(force.y);
    if magnitude > max_move {
        force = force.scale(max_move / magnitude);
    }
    (force, magnitude)
}
