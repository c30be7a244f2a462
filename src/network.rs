//! Hierarchical node/block store.
//!
//! The network owns every node in a slot arena and maintains, across all
//! levels, the invariant that a block's typed edge vectors are the multiset
//! union of its children's. Edge vectors are propagated eagerly on every
//! parent change, which keeps the move evaluator's inner loop proportional
//! to the moved node's neighborhood instead of block size.
//!
//! Levels: 0 holds data nodes, 1..=M hold nested block layers. Each level
//! is partitioned by node type; the type set is fixed at construction.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;

use crate::error::{Result, SbmError};
use crate::node::{Node, NodeId};
use crate::sampler::Sampler;

/// A degree-corrected SBM network: typed nodes, undirected edges and a
/// stack of inferred block levels.
#[derive(Clone)]
pub struct Network {
    nodes: Vec<Option<Node>>,
    /// level -> type -> node handles, in insertion order
    levels: Vec<Vec<Vec<NodeId>>>,
    types: Vec<String>,
    type_lookup: FnvHashMap<String, usize>,
    /// type -> set of types it may connect to (symmetric)
    allowed: Vec<BTreeSet<usize>>,
    /// true once an explicit allowed-pair relation was supplied
    edge_types_constrained: bool,
    id_lookup: FnvHashMap<String, NodeId>,
    pub(crate) sampler: Sampler,
    block_counter: usize,
    n_edges: usize,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Network {
    /// Create an empty network over a fixed set of node types.
    pub fn new<S: AsRef<str>>(type_names: &[S], seed: u64) -> Self {
        let types: Vec<String> = type_names.iter().map(|t| t.as_ref().to_string()).collect();
        let type_lookup = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let n_types = types.len();

        let mut network = Network {
            nodes: Vec::new(),
            levels: Vec::new(),
            types,
            type_lookup,
            allowed: vec![BTreeSet::new(); n_types],
            edge_types_constrained: false,
            id_lookup: FnvHashMap::default(),
            sampler: Sampler::new(seed),
            block_counter: 0,
            n_edges: 0,
            interrupt: None,
        };
        network.build_level();
        network
    }

    /// Create a network and load nodes and edges in one call.
    ///
    /// * `ids`, `node_types` - per-node id and type name, equal lengths
    /// * `edges_a`, `edges_b` - edge endpoint ids, equal lengths
    /// * `type_names` - the closed set of node types
    /// * `allowed_a`, `allowed_b` - optional allowed edge type pairs; when
    ///   non-empty, every loaded edge is validated against the relation
    #[allow(clippy::too_many_arguments)]
    pub fn from_edge_list<S1, S2, S3, S4>(
        ids: &[S1],
        node_types: &[S1],
        edges_a: &[S2],
        edges_b: &[S2],
        type_names: &[S3],
        seed: u64,
        allowed_a: &[S4],
        allowed_b: &[S4],
    ) -> Result<Self>
    where
        S1: AsRef<str>,
        S2: AsRef<str>,
        S3: AsRef<str>,
        S4: AsRef<str>,
    {
        if ids.len() != node_types.len() {
            return Err(SbmError::logic(format!(
                "{} node ids but {} node types",
                ids.len(),
                node_types.len()
            )));
        }
        if edges_a.len() != edges_b.len() {
            return Err(SbmError::logic(format!(
                "{} edge sources but {} edge targets",
                edges_a.len(),
                edges_b.len()
            )));
        }
        if allowed_a.len() != allowed_b.len() {
            return Err(SbmError::logic(
                "allowed edge type columns have unequal lengths".to_string(),
            ));
        }

        let mut network = Network::new(type_names, seed);
        for (id, node_type) in ids.iter().zip(node_types) {
            network.add_node(id.as_ref(), node_type.as_ref(), 0)?;
        }
        for (type_a, type_b) in allowed_a.iter().zip(allowed_b) {
            network.allow_edge_between(type_a.as_ref(), type_b.as_ref())?;
        }
        network.add_edges(edges_a, edges_b)?;
        Ok(network)
    }

    // =========================================================================
    // Lookup helpers
    // =========================================================================

    /// Borrow a node through its handle.
    ///
    /// Panics on a stale handle (one whose block was deleted); handing one
    /// in is a program error, not a recoverable condition.
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("stale node handle")
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("stale node handle")
    }

    /// Handle for a data node id.
    pub fn node_by_id(&self, id: &str) -> Result<NodeId> {
        self.id_lookup
            .get(id)
            .copied()
            .ok_or_else(|| SbmError::logic(format!("node {id} not found in network")))
    }

    /// A node's parent handle, if assigned.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    pub(crate) fn type_index(&self, name: &str) -> Result<usize> {
        self.type_lookup
            .get(name)
            .copied()
            .ok_or_else(|| SbmError::logic(format!("type {name} doesn't exist in network")))
    }

    pub(crate) fn check_level(&self, level: usize) -> Result<()> {
        if level >= self.levels.len() {
            return Err(SbmError::range(format!(
                "level {level} does not exist in network"
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Information
    // =========================================================================

    /// Total node count across all levels.
    pub fn n_nodes(&self) -> usize {
        self.levels
            .iter()
            .map(|types| types.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Node count at one level, all types.
    pub fn n_nodes_at_level(&self, level: usize) -> Result<usize> {
        self.check_level(level)?;
        Ok(self.levels[level].iter().map(Vec::len).sum())
    }

    /// Number of levels, data level included.
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of node types.
    pub fn n_types(&self) -> usize {
        self.types.len()
    }

    /// The type name table, in index order.
    pub fn node_types(&self) -> &[String] {
        &self.types
    }

    /// Number of loaded edges.
    pub fn n_edges(&self) -> usize {
        self.n_edges
    }

    /// Node count for one type at one level.
    pub fn n_nodes_of_type(&self, node_type: &str, level: usize) -> Result<usize> {
        self.check_level(level)?;
        let type_i = self.type_index(node_type)?;
        Ok(self.levels[level][type_i].len())
    }

    /// Whether any block level exists above the data level.
    pub fn has_blocks(&self) -> bool {
        self.levels.len() > 1
    }

    /// Per-type block counts at the first block level.
    pub fn block_counts(&self) -> Result<Vec<(String, usize)>> {
        if !self.has_blocks() {
            return Err(SbmError::logic(
                "no blocks to count - try initialize_blocks".to_string(),
            ));
        }
        Ok(self
            .types
            .iter()
            .enumerate()
            .map(|(type_i, name)| (name.clone(), self.levels[1][type_i].len()))
            .collect())
    }

    /// All node handles at a level, type by type in insertion order.
    pub fn nodes_at_level(&self, level: usize) -> Result<Vec<NodeId>> {
        self.check_level(level)?;
        Ok(self.levels[level].iter().flatten().copied().collect())
    }

    pub(crate) fn nodes_of_type_at_level(&self, type_i: usize, level: usize) -> &[NodeId] {
        &self.levels[level][type_i]
    }

    /// Count of blocks at `block_level` whose type the given type may
    /// connect to; the `B` in the proposal's `ε·B` smoothing term.
    pub(crate) fn n_possible_neighbor_blocks(&self, type_i: usize, block_level: usize) -> usize {
        self.allowed[type_i]
            .iter()
            .map(|&t| self.levels[block_level][t].len())
            .sum()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Add a node at a level. Level-0 ids must be unique; the level must
    /// already exist.
    pub fn add_node(&mut self, id: &str, node_type: &str, level: usize) -> Result<NodeId> {
        let type_i = self.type_index(node_type)?;
        self.check_level(level)?;
        if level == 0 && self.id_lookup.contains_key(id) {
            return Err(SbmError::logic(format!(
                "node {id} already exists in network"
            )));
        }

        let handle = self.alloc(Node::new(id.to_string(), type_i, level, self.types.len()));
        if level == 0 {
            self.id_lookup.insert(id.to_string(), handle);
        }
        self.levels[level][type_i].push(handle);
        Ok(handle)
    }

    /// Connect two data nodes. Parallel edges are preserved with
    /// multiplicity. When an allowed-pair relation is active the pair
    /// `(type(a), type(b))` must be in it; otherwise the observed pair is
    /// registered as allowed.
    pub fn add_edge(&mut self, id_a: &str, id_b: &str) -> Result<()> {
        if self.has_blocks() {
            return Err(SbmError::logic(
                "edges must be loaded before blocks are built".to_string(),
            ));
        }
        let a = self.node_by_id(id_a)?;
        let b = self.node_by_id(id_b)?;
        let type_a = self.node(a).node_type();
        let type_b = self.node(b).node_type();

        if self.edge_types_constrained {
            if !self.allowed[type_a].contains(&type_b) {
                return Err(SbmError::logic(format!(
                    "edge between nodes {} & {} of types {} & {} not allowed",
                    id_a, id_b, self.types[type_a], self.types[type_b]
                )));
            }
        } else {
            self.allowed[type_a].insert(type_b);
            self.allowed[type_b].insert(type_a);
        }

        self.node_mut(a).push_edge(b, type_b);
        self.node_mut(b).push_edge(a, type_a);
        self.n_edges += 1;
        Ok(())
    }

    /// Connect node id pairs in bulk.
    pub fn add_edges<S: AsRef<str>>(&mut self, edges_a: &[S], edges_b: &[S]) -> Result<()> {
        if edges_a.len() != edges_b.len() {
            return Err(SbmError::logic(format!(
                "{} edge sources but {} edge targets",
                edges_a.len(),
                edges_b.len()
            )));
        }
        for (a, b) in edges_a.iter().zip(edges_b) {
            self.add_edge(a.as_ref(), b.as_ref())?;
        }
        Ok(())
    }

    /// Permit edges between two types (symmetric). Activates validation of
    /// every subsequently loaded edge.
    pub fn allow_edge_between(&mut self, type_a: &str, type_b: &str) -> Result<()> {
        let a = self.type_index(type_a)?;
        let b = self.type_index(type_b)?;
        self.allowed[a].insert(b);
        self.allowed[b].insert(a);
        self.edge_types_constrained = true;
        Ok(())
    }

    pub(crate) fn build_level(&mut self) {
        self.levels.push(vec![Vec::new(); self.types.len()]);
    }

    /// Append a fresh block above the current top level and assign parents.
    ///
    /// For each type, `n_blocks == -1` creates one block per child;
    /// otherwise children are shuffled and dealt round-robin over exactly
    /// `n_blocks` blocks. Fails without touching the hierarchy if any type
    /// has fewer children than `n_blocks`.
    pub fn initialize_blocks(&mut self, n_blocks: i64) -> Result<()> {
        let one_block_per_child = n_blocks == -1;
        if !one_block_per_child && n_blocks < 1 {
            return Err(SbmError::logic(format!(
                "requested {n_blocks} blocks per type"
            )));
        }

        let child_level = self.levels.len() - 1;
        if !one_block_per_child {
            for type_i in 0..self.types.len() {
                let n_children = self.levels[child_level][type_i].len();
                if n_blocks as usize > n_children {
                    return Err(SbmError::logic(format!(
                        "can't initialize {} blocks for type {}: only {} nodes",
                        n_blocks, self.types[type_i], n_children
                    )));
                }
            }
        }

        let block_level = self.levels.len();
        self.build_level();

        for type_i in 0..self.types.len() {
            let mut children = self.levels[child_level][type_i].clone();
            let n = if one_block_per_child {
                children.len()
            } else {
                n_blocks as usize
            };
            if n == 0 {
                continue;
            }

            let blocks: Vec<NodeId> = (0..n)
                .map(|_| self.create_block(type_i, block_level))
                .collect();

            if !one_block_per_child {
                self.sampler.shuffle(&mut children);
            }
            for (i, &child) in children.iter().enumerate() {
                self.set_parent(child, blocks[i % n])?;
            }
        }
        Ok(())
    }

    /// Create an empty block node at a block level, with a network-unique
    /// generated id.
    pub(crate) fn create_block(&mut self, type_i: usize, level: usize) -> NodeId {
        let id = format!("b_{}", self.block_counter);
        self.block_counter += 1;
        let handle = self.alloc(Node::new(id, type_i, level, self.types.len()));
        self.levels[level][type_i].push(handle);
        handle
    }

    /// Remove the top block level wholesale.
    pub fn delete_block_level(&mut self) -> Result<()> {
        if !self.has_blocks() {
            return Err(SbmError::logic("no block level to delete".to_string()));
        }
        let top = self.levels.pop().unwrap_or_default();
        for handle in top.into_iter().flatten() {
            let children = self.node(handle).children().to_vec();
            for child in children {
                self.node_mut(child).set_parent_link(None);
            }
            self.nodes[handle.0] = None;
        }
        Ok(())
    }

    /// Delete every block level, leaving only the data nodes.
    pub fn reset_blocks(&mut self) {
        while self.has_blocks() {
            let _ = self.delete_block_level();
        }
    }

    /// Re-home a child under a new parent one level up.
    ///
    /// The child's typed edges are subtracted from its old parent and every
    /// ancestor above it, then added to the new parent chain, so the
    /// children-sum invariant holds at all levels without rescanning the
    /// graph.
    pub fn set_parent(&mut self, child: NodeId, new_parent: NodeId) -> Result<()> {
        let child_level = self.node(child).level();
        let parent_level = self.node(new_parent).level();
        if parent_level != child_level + 1 {
            return Err(SbmError::logic(format!(
                "parent {} at level {} must be one level above child {} at level {}",
                self.node(new_parent).id(),
                parent_level,
                self.node(child).id(),
                child_level
            )));
        }

        let old_parent = self.node(child).parent();
        let edges = self.node_mut(child).take_edges();

        if let Some(old) = old_parent {
            self.node_mut(old).remove_child(child);
            let mut ancestor = Some(old);
            while let Some(block) = ancestor {
                self.node_mut(block).release_edges(&edges);
                ancestor = self.node(block).parent();
            }
        }

        self.node_mut(new_parent).add_child(child);
        let mut ancestor = Some(new_parent);
        while let Some(block) = ancestor {
            self.node_mut(block).absorb_edges(&edges);
            ancestor = self.node(block).parent();
        }

        let child_node = self.node_mut(child);
        child_node.restore_edges(edges);
        child_node.set_parent_link(Some(new_parent));
        Ok(())
    }

    /// Remove every childless block at every block level, bottom-up, and
    /// return the removed block ids. A second call right after is a no-op.
    pub fn clean_empty_blocks(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        for level in 1..self.levels.len() {
            for type_i in 0..self.types.len() {
                let empties: Vec<NodeId> = self.levels[level][type_i]
                    .iter()
                    .copied()
                    .filter(|&block| self.node(block).n_children() == 0)
                    .collect();
                for block in empties {
                    removed.push(self.node(block).id().to_string());
                    self.delete_block(block);
                }
            }
        }
        removed
    }

    /// Delete a single childless block.
    pub(crate) fn delete_block(&mut self, block: NodeId) {
        debug_assert_eq!(self.node(block).n_children(), 0);
        if let Some(parent) = self.node(block).parent() {
            // A childless block carries no edges, so no ancestor edge update
            self.node_mut(parent).remove_child(block);
        }
        let level = self.node(block).level();
        let type_i = self.node(block).node_type();
        let level_vec = &mut self.levels[level][type_i];
        if let Some(pos) = level_vec.iter().position(|&b| b == block) {
            level_vec.remove(pos);
        }
        self.nodes[block.0] = None;
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let handle = NodeId(self.nodes.len());
        self.nodes.push(Some(node));
        handle
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// The ancestor of a node at the requested level (the node itself when
    /// `level` equals its own).
    pub fn parent_at_level(&self, id: NodeId, level: usize) -> Result<NodeId> {
        let start_level = self.node(id).level();
        if level < start_level {
            return Err(SbmError::logic(format!(
                "requested parent level ({level}) lower than node level ({start_level})"
            )));
        }
        let mut current = id;
        for _ in start_level..level {
            current = self.node(current).parent().ok_or_else(|| {
                SbmError::range(format!(
                    "no parent at level {} for {}",
                    level,
                    self.node(current).id()
                ))
            })?;
        }
        Ok(current)
    }

    /// Collapse a node's edges into counts keyed by each endpoint's
    /// ancestor at `level`.
    ///
    /// A contribution whose target block equals the source's own ancestor
    /// is counted once per endpoint, so fully internal edges show up with
    /// count 2, the convention all downstream entropy and proposal
    /// formulas assume.
    pub fn gather_neighbors_at_level(
        &self,
        id: NodeId,
        level: usize,
    ) -> Result<FnvHashMap<NodeId, i64>> {
        self.check_level(level)?;
        let node = self.node(id);
        let mut counts = FnvHashMap::default();
        for type_i in 0..self.types.len() {
            for &endpoint in node.edges_to_type(type_i) {
                *counts.entry(self.parent_at_level(endpoint, level)?).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    // =========================================================================
    // Cooperative interruption
    // =========================================================================

    /// Register a flag the embedding host may set to request early return
    /// from `mcmc_sweep`/`collapse_blocks`. Probed between sweeps and
    /// between merge steps; work done so far is kept.
    pub fn set_interrupt_flag(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bipartite() -> Network {
        let mut network = Network::new(&["n", "m"], 42);
        for id in ["n1", "n2", "n3"] {
            network.add_node(id, "n", 0).unwrap();
        }
        for id in ["m1", "m2", "m3", "m4"] {
            network.add_node(id, "m", 0).unwrap();
        }
        let edges_a = ["n1", "n1", "n2", "n3", "n3"];
        let edges_b = ["m1", "m3", "m1", "m2", "m3"];
        network.add_edges(&edges_a, &edges_b).unwrap();
        network
    }

    #[test]
    fn from_edge_list_loads_and_validates() {
        let network = Network::from_edge_list(
            &["n1", "n2", "m1", "m2"],
            &["n", "n", "m", "m"],
            &["n1", "n2"],
            &["m1", "m2"],
            &["n", "m"],
            42,
            &["n"],
            &["m"],
        )
        .unwrap();
        assert_eq!(network.n_nodes_at_level(0).unwrap(), 4);
        assert_eq!(network.n_edges(), 2);

        // A loaded edge violating the allowed relation fails the whole load
        let result = Network::from_edge_list(
            &["n1", "n2", "m1"],
            &["n", "n", "m"],
            &["n1"],
            &["n2"],
            &["n", "m"],
            42,
            &["n"],
            &["m"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn degree_sum_matches_edge_count() {
        let network = bipartite();
        let total_degree: usize = network
            .nodes_at_level(0)
            .unwrap()
            .iter()
            .map(|&id| network.node(id).degree())
            .sum();
        assert_eq!(total_degree, 2 * network.n_edges());
    }

    #[test]
    fn duplicate_node_id_rejected() {
        let mut network = Network::new(&["n"], 1);
        network.add_node("a", "n", 0).unwrap();
        assert!(network.add_node("a", "n", 0).is_err());
    }

    #[test]
    fn unknown_type_rejected() {
        let mut network = Network::new(&["n"], 1);
        assert!(network.add_node("a", "zzz", 0).is_err());
    }

    #[test]
    fn unknown_edge_endpoint_rejected() {
        let mut network = Network::new(&["n"], 1);
        network.add_node("a", "n", 0).unwrap();
        assert!(network.add_edge("a", "ghost").is_err());
    }

    #[test]
    fn edge_type_validation_checks_partner_type() {
        // Allowed relation is {n, m}; a legal bipartite edge must pass and
        // a same-type edge must fail. (A check of the source type against
        // itself would get both of these wrong.)
        let mut network = Network::new(&["n", "m"], 1);
        network.add_node("n1", "n", 0).unwrap();
        network.add_node("n2", "n", 0).unwrap();
        network.add_node("m1", "m", 0).unwrap();
        network.allow_edge_between("n", "m").unwrap();

        assert!(network.add_edge("n1", "m1").is_ok());
        assert!(network.add_edge("n1", "n2").is_err());
    }

    #[test]
    fn parallel_edges_keep_multiplicity() {
        let mut network = Network::new(&["n", "m"], 1);
        network.add_node("a", "n", 0).unwrap();
        network.add_node("b", "m", 0).unwrap();
        network.add_edge("a", "b").unwrap();
        network.add_edge("a", "b").unwrap();

        let a = network.node_by_id("a").unwrap();
        assert_eq!(network.node(a).degree(), 2);
        assert_eq!(network.n_edges(), 2);
    }

    #[test]
    fn one_block_per_node_initialization() {
        let mut network = bipartite();
        network.initialize_blocks(-1).unwrap();
        assert_eq!(network.n_levels(), 2);
        assert_eq!(network.n_nodes_at_level(1).unwrap(), 7);
        assert_eq!(network.n_nodes_of_type("m", 0).unwrap(), 4);
        assert_eq!(network.n_nodes_of_type("n", 1).unwrap(), 3);

        // Every node has a parent with exactly one child
        for id in network.nodes_at_level(0).unwrap() {
            let parent = network.parent_of(id).unwrap();
            assert_eq!(network.node(parent).n_children(), 1);
        }
    }

    #[test]
    fn round_robin_initialization_balances_blocks() {
        let mut network = bipartite();
        network.initialize_blocks(2).unwrap();
        assert_eq!(network.n_nodes_at_level(1).unwrap(), 4);

        for (type_name, count) in network.block_counts().unwrap() {
            assert_eq!(count, 2, "type {type_name}");
        }
        // 3 n-nodes over 2 blocks: sizes 2 and 1; 4 m-nodes: 2 and 2
        let mut n_sizes: Vec<usize> = network.levels[1][0]
            .iter()
            .map(|&b| network.node(b).n_children())
            .collect();
        n_sizes.sort_unstable();
        assert_eq!(n_sizes, vec![1, 2]);
    }

    #[test]
    fn too_many_blocks_fails_without_side_effects() {
        let mut network = bipartite();
        assert!(network.initialize_blocks(5).is_err());
        assert_eq!(network.n_levels(), 1);
    }

    #[test]
    fn block_edges_are_children_sums() {
        let mut network = bipartite();
        network.initialize_blocks(2).unwrap();
        network.initialize_blocks(1).unwrap();

        for level in 1..network.n_levels() {
            for block in network.nodes_at_level(level).unwrap() {
                let expected: usize = network
                    .node(block)
                    .children()
                    .iter()
                    .map(|&c| network.node(c).degree())
                    .sum();
                assert_eq!(network.node(block).degree(), expected);
            }
        }
    }

    #[test]
    fn set_parent_propagates_through_grandparents() {
        let mut network = bipartite();
        network.initialize_blocks(2).unwrap();
        network.initialize_blocks(2).unwrap();

        let n1 = network.node_by_id("n1").unwrap();
        let old_block = network.parent_of(n1).unwrap();
        let blocks: Vec<NodeId> = network.nodes_of_type_at_level(0, 1).to_vec();
        let target = *blocks.iter().find(|&&b| b != old_block).unwrap();
        network.set_parent(n1, target).unwrap();

        // Children-sum invariant must hold at every level afterwards
        for level in 1..network.n_levels() {
            for block in network.nodes_at_level(level).unwrap() {
                let expected: usize = network
                    .node(block)
                    .children()
                    .iter()
                    .map(|&c| network.node(c).degree())
                    .sum();
                assert_eq!(network.node(block).degree(), expected);
            }
        }
    }

    #[test]
    fn set_parent_rejects_non_adjacent_levels() {
        let mut network = bipartite();
        network.initialize_blocks(-1).unwrap();
        network.initialize_blocks(1).unwrap();

        let n1 = network.node_by_id("n1").unwrap();
        let top = network.nodes_at_level(2).unwrap()[0];
        assert!(network.set_parent(n1, top).is_err());
    }

    #[test]
    fn gather_counts_sum_to_degree() {
        let mut network = bipartite();
        network.initialize_blocks(2).unwrap();

        for id in network.nodes_at_level(0).unwrap() {
            let counts = network.gather_neighbors_at_level(id, 1).unwrap();
            let total: i64 = counts.values().sum();
            assert_eq!(total, network.node(id).degree() as i64);
        }
    }

    #[test]
    fn gather_beyond_top_level_is_range_error() {
        let network = bipartite();
        let n1 = network.node_by_id("n1").unwrap();
        assert!(matches!(
            network.gather_neighbors_at_level(n1, 3),
            Err(SbmError::Range(_))
        ));
        assert!(matches!(
            network.parent_at_level(n1, 1),
            Err(SbmError::Range(_))
        ));
    }

    #[test]
    fn delete_block_level_pops_top() {
        let mut network = bipartite();
        assert!(network.delete_block_level().is_err());

        network.initialize_blocks(-1).unwrap();
        network.delete_block_level().unwrap();
        assert_eq!(network.n_levels(), 1);

        let n1 = network.node_by_id("n1").unwrap();
        assert!(network.parent_of(n1).is_none());
    }

    #[test]
    fn clean_empty_blocks_is_idempotent() {
        let mut network = bipartite();
        network.initialize_blocks(2).unwrap();

        // Drain one n-block into the other
        let blocks: Vec<NodeId> = network.nodes_of_type_at_level(0, 1).to_vec();
        let (keep, drain) = (blocks[0], blocks[1]);
        for child in network.node(drain).children().to_vec() {
            network.set_parent(child, keep).unwrap();
        }

        let removed = network.clean_empty_blocks();
        assert_eq!(removed.len(), 1);
        assert!(network.clean_empty_blocks().is_empty());
        assert_eq!(network.n_nodes_at_level(1).unwrap(), 3);
    }
}
