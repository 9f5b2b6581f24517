//! JSON document formats for input graphs, output/position/reference
//! layouts. The original treated this as an external collaborator
//! ("the input/output document format loader/dumper"); this module
//! implements it with `serde`/`serde_json`.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ForceLayoutError;
use crate::geometry::Pos;
use crate::world::World;

#[derive(Debug, Deserialize)]
struct ItemEntry {
    weight: i64,
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    items: HashMap<String, ItemEntry>,
    #[serde(default)]
    picks: HashMap<String, Vec<u64>>,
}

/// Reads and parses the input document, returning the raw `items` weights
/// (before the `1 +` the simulation applies) and the `picks` groups.
pub fn load_input(
    path: &Path,
) -> Result<(HashMap<String, i64>, HashMap<String, Vec<u64>>), ForceLayoutError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ForceLayoutError::Io { path: path.display().to_string(), source })?;
    let doc: InputDoc = serde_json::from_str(&text)?;
    let items = doc.items.into_iter().map(|(id, entry)| (id, entry.weight)).collect();
    Ok((items, doc.picks))
}

#[derive(Debug, Deserialize, Serialize)]
struct PositionEntry {
    x: f64,
    y: f64,
    #[serde(default)]
    radius: f64,
    weight: i64,
}

/// Loads a position document (same shape used for `-p` initial positions
/// and `-r` alignment references): external id, position, and **raw**
/// weight (not `1 + weight` — this loader is shared between the two
/// overlay use-cases and neither re-applies the input loader's `+1`).
pub fn load_position_doc(path: &Path) -> Result<Vec<(u64, Pos, f64)>, ForceLayoutError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ForceLayoutError::Io { path: path.display().to_string(), source })?;
    let doc: HashMap<String, PositionEntry> = serde_json::from_str(&text)?;
    let mut out = Vec::with_capacity(doc.len());
    for (key, entry) in doc {
        if let Ok(id) = key.parse::<u64>() {
            out.push((id, Pos::new(entry.x, entry.y), entry.weight as f64));
        }
    }
    Ok(out)
}

/// Writes the output document: one entry per vertex whose simulated
/// weight is `> 0`, keyed by external id. Entries are written in a
/// `BTreeMap`'s sorted-key order rather than a `HashMap`'s randomized
/// iteration order, so the emitted byte layout is deterministic run to
/// run (spec.md §8's "bit-identical outputs" property covers the whole
/// output document, not just the numeric values within it).
pub fn dump_output(world: &World, path: &Path) -> Result<(), ForceLayoutError> {
    let vertices = world.vertices.read();
    let mut out: BTreeMap<String, PositionEntry> = BTreeMap::new();
    for (index, vertex) in vertices.iter().enumerate() {
        if vertex.weight <= 0.0 {
            continue;
        }
        let external_id = world.id_map.external_of(index);
        out.insert(
            external_id.to_string(),
            PositionEntry {
                x: vertex.pos.x,
                y: vertex.pos.y,
                radius: vertex.radius,
                weight: vertex.weight as i64,
            },
        );
    }

    let file = File::create(path)
        .map_err(|source| ForceLayoutError::Io { path: path.display().to_string(), source })?;
    serde_json::to_writer_pretty(BufWriter::new(file), &out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    #[test]
    fn load_input_parses_items_and_picks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.json");
        std::fs::write(
            &path,
            r#"{"items": {"1": {"weight": 0}, "2": {"weight": 3}}, "picks": {"a": [1, 2]}}"#,
        )
        .unwrap();

        let (items, picks) = load_input(&path).unwrap();
        assert_eq!(items.get("1"), Some(&0));
        assert_eq!(items.get("2"), Some(&3));
        assert_eq!(picks.get("a"), Some(&vec![1, 2]));
    }

    #[test]
    fn position_doc_round_trips_through_dump_and_load() {
        let mut items: Map<String, i64> = Map::new();
        items.insert("1".to_string(), 0);
        items.insert("2".to_string(), 0);
        let mut picks: Map<String, Vec<u64>> = Map::new();
        picks.insert("a".to_string(), vec![1, 2]);

        let world = World::build(&items, &picks, &[]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.json");
        dump_output(&world, &out_path).unwrap();

        let loaded = load_position_doc(&out_path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load_input(Path::new("/nonexistent/path/in.json"));
        assert!(matches!(result, Err(ForceLayoutError::Io { .. })));
    }
}
