//! The graph model: vertices, the dense edge matrix, the external/dense id
//! bijection, and the partitioning the force/sparsify/alignment phases
//! dispatch work over.

use std::f64::consts::PI;

use parking_lot::{Mutex, RwLock};

use crate::error::ForceLayoutError;
use crate::geometry::Pos;

/// Slack added to the sum of two radii when deciding whether they "touch".
pub const RELAX_EXTRA: f64 = 1.0;

/// Target size, in bytes, for one partition's scratch buffer. A knob, not a
/// platform page size (the original overwrote `sysconf(_SC_PAGESIZE)` with
/// this same constant) — small partitions keep cache footprint low and give
/// the worker pool enough tasks to balance across threads.
const PARTITION_TARGET_BYTES: usize = 512;

/// One node in the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub pos: Pos,
    pub radius: f64,
    /// `f64::NEG_INFINITY` or `0.0` both mean "disabled"; see [`Vertex::is_enabled`].
    pub weight: f64,
}

impl Vertex {
    pub fn new(weight: f64, pos: Pos) -> Self {
        Vertex { pos, radius: radius_for_weight(weight), weight }
    }

    /// Disabled vertices (weight `0` or `-inf`) take part in no force, no
    /// overlap resolution, and no alignment.
    pub fn is_enabled(&self) -> bool {
        self.weight.is_finite() && self.weight > 0.0
    }
}

pub fn radius_for_weight(weight: f64) -> f64 {
    weight.max(0.0).sqrt() / PI
}

/// Dense, symmetric, read-only-after-init edge weight matrix. Most entries
/// are zero; storage is dense (not a sparse map) so the O(N^2) force pass
/// walks it with good cache behavior.
#[derive(Debug, Clone)]
pub struct EdgeMatrix {
    n: usize,
    weights: Vec<f64>,
}

impl EdgeMatrix {
    pub fn new(n: usize) -> Self {
        EdgeMatrix { n, weights: vec![0.0; n * n] }
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        i * self.n + j
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.weights[self.index(i, j)]
    }

    /// Adds `amount` to both `(i, j)` and `(j, i)`, keeping the matrix symmetric.
    pub fn add_symmetric(&mut self, i: usize, j: usize, amount: f64) {
        let a = self.index(i, j);
        let b = self.index(j, i);
        self.weights[a] += amount;
        self.weights[b] += amount;
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| (0..self.n).all(|j| self.get(i, j) == self.get(j, i)))
    }
}

/// Bijection between arbitrary external integer ids and dense indices
/// `[0, N)`. Dense indices are assigned by sorting the *string form* of the
/// external ids lexicographically — not numerically — matching the
/// original's `qsort`/`strcmp` over JSON object keys. This ordering is
/// part of the system's determinism guarantee and must not be "improved".
#[derive(Debug, Clone)]
pub struct IdMap {
    index_to_external: Vec<u64>,
    external_to_index: std::collections::HashMap<u64, usize>,
}

impl IdMap {
    pub fn from_external_ids(mut ids: Vec<u64>) -> Self {
        ids.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        let index_to_external = ids;
        let external_to_index = index_to_external
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();
        IdMap { index_to_external, external_to_index }
    }

    pub fn len(&self) -> usize {
        self.index_to_external.len()
    }

    pub fn index_of(&self, external_id: u64) -> Option<usize> {
        self.external_to_index.get(&external_id).copied()
    }

    pub fn external_of(&self, index: usize) -> u64 {
        self.index_to_external[index]
    }
}

/// Per-partition scratch: a contiguous range `[start, end)` of dense
/// indices, owned exclusively by whichever task processes it for the
/// duration of one phase.
pub struct Partition {
    pub start: usize,
    pub end: usize,
    pub scratch: Mutex<PartitionScratch>,
}

/// The scratch buffer a force/sparsify task writes into. `extra` carries
/// the partial barycenter sum during a force phase; sparsify leaves it
/// unused.
pub struct PartitionScratch {
    pub positions: Vec<Pos>,
    pub energy: f64,
    pub extra: Pos,
}

impl PartitionScratch {
    pub(crate) fn new(len: usize) -> Self {
        PartitionScratch { positions: vec![Pos::ZERO; len], energy: 0.0, extra: Pos::ZERO }
    }
}

/// Owns the graph: vertices, edges, the id bijection, and the fixed
/// partitioning every phase dispatches over. Built once per run by
/// [`World::build`]; nothing about its shape changes afterward (only
/// vertex positions mutate, and only between phase barriers).
pub struct World {
    pub vertices: RwLock<Vec<Vertex>>,
    pub edges: EdgeMatrix,
    pub partitions: Vec<Partition>,
    pub world_weight_inv: f64,
    pub id_map: IdMap,
}

impl World {
    pub fn len(&self) -> usize {
        self.id_map.len()
    }

    /// Builds the world from a parsed input document: assigns dense
    /// indices, seeds concentric-ring positions, overlays `-p` position
    /// overrides (if any), materializes the edge matrix from pick
    /// co-occurrences, filters out everything not reachable from the
    /// heaviest vertex, and partitions the vertex range.
    ///
    /// `overrides` is applied right after the ring seeding and before
    /// heaviest-vertex selection, edge-closure, and `world_weight_inv` are
    /// computed — matching `init_world`'s order in the original, where
    /// `-p` can change which vertex is heaviest and which are reachable.
    pub fn build(
        items: &std::collections::HashMap<String, i64>,
        picks: &std::collections::HashMap<String, Vec<u64>>,
        overrides: &[(u64, Pos, f64)],
    ) -> Result<World, ForceLayoutError> {
        if items.is_empty() {
            return Err(ForceLayoutError::EmptyGraph);
        }

        let external_ids: Vec<u64> = items
            .keys()
            .map(|k| k.parse::<u64>().map_err(|_| ForceLayoutError::InvalidId(k.clone())))
            .collect::<Result<_, _>>()?;
        let id_map = IdMap::from_external_ids(external_ids);
        let n = id_map.len();

        let mut vertices = Vec::with_capacity(n);
        for i in 0..n {
            let external_id = id_map.external_of(i);
            let raw_weight = items[&external_id.to_string()];
            let weight = 1.0 + raw_weight as f64;
            let theta = 2.0 * PI * (i as f64) / (n as f64);
            let radial = ((i % 16) as f64 + 8.0) * 10.0;
            let pos = Pos::new(radial * theta.sin(), radial * theta.cos());
            vertices.push(Vertex::new(weight, pos));
        }

        for &(external_id, pos, weight) in overrides {
            if let Some(idx) = id_map.index_of(external_id) {
                vertices[idx] = Vertex::new(weight, pos);
            }
        }

        // Matches `init_world`'s `maxweight` starting at 0 (not the most
        // negative representable weight): a vertex only becomes "heaviest"
        // by having strictly positive weight. If none do, `heaviestitem`
        // would be read uninitialized in the original (Design Notes); the
        // rewrite rejects the input explicitly instead.
        let mut heaviest_index = None;
        let mut max_weight = 0.0;
        for (i, vertex) in vertices.iter().enumerate() {
            if vertex.weight > max_weight {
                max_weight = vertex.weight;
                heaviest_index = Some(i);
            }
        }
        let heaviest_index = heaviest_index.ok_or(ForceLayoutError::NoHeaviestVertex)?;

        let mut edges = EdgeMatrix::new(n);
        for members in picks.values() {
            for a in 0..members.len() {
                let Some(ia) = id_map.index_of(members[a]) else { continue };
                for b in (a + 1)..members.len() {
                    let Some(ib) = id_map.index_of(members[b]) else { continue };
                    edges.add_symmetric(ia, ib, 1.0);
                }
            }
        }

        let reachable = edge_closure(&edges, n, heaviest_index);
        for (i, vertex) in vertices.iter_mut().enumerate() {
            if !reachable[i] {
                vertex.weight = f64::NEG_INFINITY;
            }
        }

        let world_weight_inv = {
            let sum: f64 = vertices.iter().map(|v| v.weight).filter(|w| w.is_finite()).sum();
            1.0 / sum
        };

        let partitions = build_partitions(n);

        Ok(World {
            vertices: RwLock::new(vertices),
            edges,
            partitions,
            world_weight_inv,
            id_map,
        })
    }
}

/// Explicit work-list connected-component search from `start`, following
/// only positive-weight edges. The original's `count_edge_closure` recursed
/// on the call stack, which the Design Notes flag as a stack-overflow risk
/// on large graphs; this uses an explicit stack instead.
fn edge_closure(edges: &EdgeMatrix, n: usize, start: usize) -> Vec<bool> {
    let mut reachable = vec![false; n];
    let mut stack = vec![start];
    reachable[start] = true;
    while let Some(i) = stack.pop() {
        for j in 0..n {
            if j != i && edges.get(i, j) > 0.0 && !reachable[j] {
                reachable[j] = true;
                stack.push(j);
            }
        }
    }
    reachable
}

pub(crate) fn build_partitions(n: usize) -> Vec<Partition> {
    let header_estimate = std::mem::size_of::<usize>() * 2 + std::mem::size_of::<f64>() * 3;
    let pos_size = std::mem::size_of::<Pos>();
    let items_per_partition =
        ((PARTITION_TARGET_BYTES.saturating_sub(header_estimate)) / pos_size).max(1);

    let mut partitions = Vec::new();
    let mut start = 0;
    if n == 0 {
        return partitions;
    }
    while start < n {
        let end = (start + items_per_partition).min(n);
        partitions.push(Partition {
            start,
            end,
            scratch: Mutex::new(PartitionScratch::new(end - start)),
        });
        start = end;
    }
    partitions
}
