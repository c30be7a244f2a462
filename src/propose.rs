//! Move and merge proposals conditioned on a node's block-level
//! neighborhood.
//!
//! Proposals are sampled with the two-stage scheme: first a neighbor block
//! `t` is drawn with probability proportional to the mover's edge counts,
//! then a candidate of the mover's own type is drawn from `t`'s edges with
//! the ε-smoothed distribution
//!
//! ```text
//! P(r | t) = (e_{t→r} + ε) / (d_t + ε·B)
//! ```
//!
//! where `B` counts the blocks the mover's type may connect to. The
//! `ε·B / (d_t + ε·B)` remainder falls through to a uniformly random block
//! of the mover's type, which is what lets the chain escape local optima.
//! No weight vector is ever materialized for the node-move path.

use crate::error::{Result, SbmError};
use crate::network::Network;
use crate::node::NodeId;

impl Network {
    /// Sample a candidate block at `block_level` for a node move. The
    /// candidate always has the node's own type; with `variable_num_blocks`
    /// the uniform branch may materialize a fresh empty block instead.
    pub(crate) fn propose_move(
        &mut self,
        node: NodeId,
        block_level: usize,
        eps: f64,
        variable_num_blocks: bool,
    ) -> Result<NodeId> {
        self.check_level(block_level)?;
        let node_type = self.node(node).node_type();

        if self.node(node).degree() == 0 {
            // No neighborhood to condition on
            return self.random_block_of_type(node_type, block_level, variable_num_blocks);
        }

        let endpoint = self.random_edge_endpoint(node);
        let neighbor_block = self.parent_at_level(endpoint, block_level)?;
        self.candidate_from_block(
            neighbor_block,
            node_type,
            block_level,
            eps,
            variable_num_blocks,
        )
    }

    /// Sample a merge partner for a block among blocks at its own level.
    ///
    /// The block's propagated edge list stands in for the "synthetic node"
    /// carrying its whole neighborhood: a neighbor block is drawn by
    /// weighted choice over the gathered counts, then the second proposal
    /// stage runs unchanged. Degenerate blocks (or cross-type mode) fall
    /// back to a uniform draw. Returns `None` when no partner exists; may
    /// return the block itself, which callers skip.
    pub(crate) fn propose_merge(
        &mut self,
        block: NodeId,
        eps: f64,
        cross_type: bool,
    ) -> Result<Option<NodeId>> {
        let level = self.node(block).level();
        let type_i = self.node(block).node_type();

        if cross_type {
            let pool: Vec<NodeId> = self
                .nodes_at_level(level)?
                .into_iter()
                .filter(|&b| b != block)
                .collect();
            if pool.is_empty() {
                return Ok(None);
            }
            return Ok(Some(*self.sampler.pick(&pool)));
        }

        if self.node(block).degree() == 0 {
            let pool: Vec<NodeId> = self
                .nodes_of_type_at_level(type_i, level)
                .iter()
                .copied()
                .filter(|&b| b != block)
                .collect();
            if pool.is_empty() {
                return Ok(None);
            }
            return Ok(Some(*self.sampler.pick(&pool)));
        }

        let counts = self.gather_neighbors_at_level(block, level)?;
        let mut entries: Vec<(NodeId, i64)> = counts.into_iter().collect();
        entries.sort_unstable_by_key(|&(id, _)| id);
        let weights: Vec<f64> = entries.iter().map(|&(_, count)| count as f64).collect();
        let neighbor_block = entries[self.sampler.weighted_choice(&weights)].0;

        let candidate = self.candidate_from_block(neighbor_block, type_i, level, eps, false)?;
        Ok(Some(candidate))
    }

    /// Uniform edge entry of a node: picking an entry is equivalent to
    /// picking a neighbor with probability proportional to multiplicity.
    fn random_edge_endpoint(&mut self, node: NodeId) -> NodeId {
        let degree = self.node(node).degree();
        debug_assert!(degree > 0);
        let mut index = self.sampler.uniform_int(degree - 1);
        for type_i in 0..self.n_types() {
            let endpoints = self.node(node).edges_to_type(type_i);
            if index < endpoints.len() {
                return endpoints[index];
            }
            index -= endpoints.len();
        }
        unreachable!("node degree out of sync with its typed edge vectors")
    }

    /// Second proposal stage: from neighbor block `t`, either hop along one
    /// of `t`'s edges to a block of the mover's type, or take the ε-smoothed
    /// uniform branch.
    fn candidate_from_block(
        &mut self,
        neighbor_block: NodeId,
        node_type: usize,
        block_level: usize,
        eps: f64,
        variable_num_blocks: bool,
    ) -> Result<NodeId> {
        let block_degree = self.node(neighbor_block).degree() as f64;
        let eps_b = eps * self.n_possible_neighbor_blocks(node_type, block_level) as f64;

        let prob_random = if block_degree + eps_b > 0.0 {
            eps_b / (block_degree + eps_b)
        } else {
            1.0
        };
        if self.sampler.uniform_unit() < prob_random {
            return self.random_block_of_type(node_type, block_level, variable_num_blocks);
        }

        let n_endpoints = self.node(neighbor_block).edges_to_type(node_type).len();
        if n_endpoints == 0 {
            return self.random_block_of_type(node_type, block_level, variable_num_blocks);
        }
        let pick = self.sampler.uniform_int(n_endpoints - 1);
        let endpoint = self.node(neighbor_block).edges_to_type(node_type)[pick];
        self.parent_at_level(endpoint, block_level)
    }

    /// Uniform draw over blocks of one type at a level. With
    /// `variable_num_blocks` one extra slot is in play: drawing it creates
    /// a fresh empty block for the mover to land in.
    fn random_block_of_type(
        &mut self,
        type_i: usize,
        block_level: usize,
        variable_num_blocks: bool,
    ) -> Result<NodeId> {
        let n_blocks = self.nodes_of_type_at_level(type_i, block_level).len();

        if variable_num_blocks {
            let draw = self.sampler.uniform_int(n_blocks);
            if draw == n_blocks {
                return Ok(self.create_block(type_i, block_level));
            }
            return Ok(self.nodes_of_type_at_level(type_i, block_level)[draw]);
        }

        if n_blocks == 0 {
            return Err(SbmError::logic(format!(
                "no blocks of type {} at level {}",
                self.node_types()[type_i],
                block_level
            )));
        }
        let draw = self.sampler.uniform_int(n_blocks - 1);
        Ok(self.nodes_of_type_at_level(type_i, block_level)[draw])
    }
}
