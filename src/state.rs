//! Flat export and replay of the block hierarchy.
//!
//! The dump is four equal-length columns (`id`, `type`, `parent`, `level`)
//! sorted by ascending level; a `"none"` parent marks the topmost layer.
//! The top level itself is not recorded; its blocks already appear in the
//! parent column of the level below and are recreated on first reference
//! during replay. Edges are not part of the dump; they come from the
//! original graph.

use fnv::FnvHashMap;

use crate::error::{Result, SbmError};
use crate::network::Network;
use crate::node::NodeId;

/// Marker for a node without a parent.
pub const NO_PARENT: &str = "none";

/// One row per node: enough to rebuild the full parent structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDump {
    /// Node ids.
    pub ids: Vec<String>,
    /// Type names, parallel to `ids`.
    pub types: Vec<String>,
    /// Parent ids, parallel to `ids`; [`NO_PARENT`] when unassigned.
    pub parents: Vec<String>,
    /// Levels, parallel to `ids`, ascending.
    pub levels: Vec<usize>,
}

impl StateDump {
    /// Number of recorded nodes.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the dump holds no rows.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn push(&mut self, id: &str, type_name: &str, parent: &str, level: usize) {
        self.ids.push(id.to_string());
        self.types.push(type_name.to_string());
        self.parents.push(parent.to_string());
        self.levels.push(level);
    }
}

impl Network {
    /// Export the current hierarchy. Fails when no block level exists.
    pub fn state(&self) -> Result<StateDump> {
        if !self.has_blocks() {
            return Err(SbmError::logic(
                "no state to export - try adding blocks".to_string(),
            ));
        }

        let mut dump = StateDump::default();
        // The top level is implied by the parent column of the level below
        for level in 0..self.n_levels() - 1 {
            for handle in self.nodes_at_level(level)? {
                let node = self.node(handle);
                let parent = match node.parent() {
                    Some(p) => self.node(p).id().to_string(),
                    None => NO_PARENT.to_string(),
                };
                dump.push(
                    node.id(),
                    &self.node_types()[node.node_type()],
                    &parent,
                    level,
                );
            }
        }
        Ok(dump)
    }

    /// Replace the block hierarchy with the one a dump describes.
    ///
    /// All existing block levels are deleted, then rows are replayed in
    /// ascending level order; a parent id not yet seen at its level is
    /// created on first reference (with its child's type).
    pub fn update_state(&mut self, dump: &StateDump) -> Result<()> {
        let rows = dump.len();
        if dump.types.len() != rows || dump.parents.len() != rows || dump.levels.len() != rows {
            return Err(SbmError::logic(
                "state dump columns have unequal lengths".to_string(),
            ));
        }

        self.reset_blocks();
        self.build_level();

        // Level-0 rows resolve against the data nodes; each level's blocks
        // then become the lookup table for the rows one level up.
        let mut node_by_id: FnvHashMap<String, NodeId> = self
            .nodes_at_level(0)?
            .into_iter()
            .map(|handle| (self.node(handle).id().to_string(), handle))
            .collect();
        let mut block_by_id: FnvHashMap<String, NodeId> = FnvHashMap::default();

        let mut last_level = 0;
        for row in 0..rows {
            let level = dump.levels[row];
            if level != last_level {
                if level != last_level + 1 {
                    return Err(SbmError::logic(format!(
                        "state dump level jumps from {last_level} to {level}; rows must be sorted by ascending level"
                    )));
                }
                node_by_id = std::mem::take(&mut block_by_id);
                self.build_level();
                last_level = level;
            }

            let id = &dump.ids[row];
            let current = *node_by_id.get(id).ok_or_else(|| {
                SbmError::logic(format!("node in state ({id}) is not present in network"))
            })?;

            let parent_id = &dump.parents[row];
            if parent_id == NO_PARENT {
                continue;
            }
            let parent = match block_by_id.get(parent_id) {
                Some(&p) => p,
                None => {
                    let p = self.add_node(parent_id, &dump.types[row], level + 1)?;
                    block_by_id.insert(parent_id.clone(), p);
                    p
                }
            };
            self.set_parent(current, parent)?;
        }
        Ok(())
    }
}
