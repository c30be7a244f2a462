//! Analytic evaluation of a proposed move: entropy delta and Hastings
//! reverse-proposal ratio from local counts only.
//!
//! Only block pairs touching the source or target block change under a
//! move, so the delta is computed from three gathered count maps (the
//! node's, the target's, the source's) updated in place, never from a full
//! re-evaluation. The same partial-entropy pattern scores block merges for
//! the agglomerative pass.
//!
//! Sign convention: `entropy_delta = pre - post`, so a positive delta means
//! the move lowers the model entropy and is always accepted when the
//! proposal ratio is at least one.

use fnv::FnvHashMap;

use crate::entropy::ent;
use crate::error::{Result, SbmError};
use crate::network::Network;
use crate::node::NodeId;

/// Outcome of evaluating one proposed move.
#[derive(Debug, Clone, Copy)]
pub struct MoveResults {
    /// `pre - post` partial entropy; positive = improvement.
    pub entropy_delta: f64,
    /// `q(old | node) / q(new | node)`, the Hastings correction.
    pub prob_ratio: f64,
    /// `exp(entropy_delta) * prob_ratio`; may exceed one.
    pub prob_of_accept: f64,
}

impl MoveResults {
    fn new(entropy_delta: f64, prob_ratio: f64) -> Self {
        MoveResults {
            entropy_delta,
            prob_ratio,
            prob_of_accept: entropy_delta.exp() * prob_ratio,
        }
    }

    fn no_move() -> Self {
        MoveResults::new(0.0, 1.0)
    }
}

impl Network {
    /// Evaluate moving `node` from its current block to `new_block`.
    ///
    /// Short-circuits to a zero delta when the candidate is the current
    /// block. The counts are gathered once and shifted in place to the
    /// post-move configuration, so the cost is proportional to the moved
    /// node's neighborhood, independent of block sizes.
    pub fn move_results(&self, node: NodeId, new_block: NodeId, eps: f64) -> Result<MoveResults> {
        let old_block = self.node(node).parent().ok_or_else(|| {
            SbmError::logic(format!(
                "node {} has no parent block to move from",
                self.node(node).id()
            ))
        })?;
        if new_block == old_block || self.node(node).degree() == 0 {
            return Ok(MoveResults::no_move());
        }

        let block_level = self.node(node).level() + 1;
        let node_degree = self.node(node).degree() as f64;
        let possible =
            self.n_possible_neighbor_blocks(self.node(node).node_type(), block_level) as f64;
        let eps_b = eps * possible;

        let mut new_degree = self.node(new_block).degree() as f64;
        let mut old_degree = self.node(old_block).degree() as f64;

        let node_counts = self.gather_neighbors_at_level(node, block_level)?;
        let mut new_counts = self.gather_neighbors_at_level(new_block, block_level)?;
        let mut old_counts = self.gather_neighbors_at_level(old_block, block_level)?;

        let pre = self.partial_entropy(
            &new_counts,
            &old_counts,
            new_block,
            old_block,
            new_degree,
            old_degree,
        );

        // Probability of proposing this move, summed over the neighbor
        // blocks that could have produced it
        let mut prob_fwd = 0.0;
        for (&via, &count) in &node_counts {
            let via_degree = self.pair_degree(via, new_block, old_block, new_degree, old_degree);
            let edges_to_via = new_counts.get(&via).copied().unwrap_or(0) as f64;
            prob_fwd += (count as f64 / node_degree) * (edges_to_via + eps) / (via_degree + eps_b);
        }

        // Shift the node's counts from the old block onto the new one
        for (&touched, &count) in &node_counts {
            if touched == new_block {
                *new_counts.entry(new_block).or_insert(0) += 2 * count;
                *new_counts.entry(old_block).or_insert(0) -= count;
                *old_counts.entry(new_block).or_insert(0) -= count;
            } else if touched == old_block {
                *new_counts.entry(old_block).or_insert(0) += count;
                *old_counts.entry(new_block).or_insert(0) += count;
                *old_counts.entry(old_block).or_insert(0) -= 2 * count;
            } else {
                *new_counts.entry(touched).or_insert(0) += count;
                *old_counts.entry(touched).or_insert(0) -= count;
            }
        }
        new_degree += node_degree;
        old_degree -= node_degree;

        let post = self.partial_entropy(
            &new_counts,
            &old_counts,
            new_block,
            old_block,
            new_degree,
            old_degree,
        );

        // Probability of proposing the reverse move from the post-move state
        let mut prob_rev = 0.0;
        for (&via, &count) in &node_counts {
            let via_degree = self.pair_degree(via, new_block, old_block, new_degree, old_degree);
            let edges_to_via = old_counts.get(&via).copied().unwrap_or(0) as f64;
            prob_rev += (count as f64 / node_degree) * (edges_to_via + eps) / (via_degree + eps_b);
        }

        Ok(MoveResults::new(pre - post, prob_rev / prob_fwd))
    }

    /// Entropy delta of absorbing `absorbed` into `absorber` (both blocks
    /// at the same level): reparent all children, delete the absorbed
    /// block. Positive = the merge lowers entropy.
    ///
    /// The absorbed block's whole neighborhood moves with it, internal
    /// edges included, so the merged block's count map is formed directly
    /// instead of replaying the per-node shift above.
    pub(crate) fn merge_results(&self, absorbed: NodeId, absorber: NodeId) -> Result<f64> {
        if absorbed == absorber {
            return Ok(0.0);
        }
        let level = self.node(absorbed).level();
        if self.node(absorber).level() != level {
            return Err(SbmError::logic(format!(
                "can't merge blocks {} and {} at different levels",
                self.node(absorbed).id(),
                self.node(absorber).id()
            )));
        }

        let absorbed_degree = self.node(absorbed).degree() as f64;
        let absorber_degree = self.node(absorber).degree() as f64;

        let absorbed_counts = self.gather_neighbors_at_level(absorbed, level)?;
        let absorber_counts = self.gather_neighbors_at_level(absorber, level)?;

        let pre = self.partial_entropy(
            &absorber_counts,
            &absorbed_counts,
            absorber,
            absorbed,
            absorber_degree,
            absorbed_degree,
        );

        // The merged block's neighborhood: cross edges and both blocks'
        // internal edges all become internal
        let mut merged = absorber_counts;
        let cross = merged.remove(&absorbed).unwrap_or(0);
        *merged.entry(absorber).or_insert(0) += cross;
        for (&touched, &count) in &absorbed_counts {
            if touched == absorbed || touched == absorber {
                *merged.entry(absorber).or_insert(0) += count;
            } else {
                *merged.entry(touched).or_insert(0) += count;
            }
        }
        let merged_degree = absorber_degree + absorbed_degree;

        let mut post = 0.0;
        for (&other, &count) in &merged {
            if other == absorber {
                post += ent(count as f64, merged_degree, merged_degree) / 2.0;
            } else {
                let other_degree = self.node(other).degree() as f64;
                post += ent(count as f64, merged_degree, other_degree);
            }
        }

        Ok(pre - post)
    }

    /// Sum of entropy contributions of every pair touching the target or
    /// source block, each unordered pair counted once and self-pairs
    /// halved. The `(old, new)` entry is read from the target's map only.
    fn partial_entropy(
        &self,
        new_counts: &FnvHashMap<NodeId, i64>,
        old_counts: &FnvHashMap<NodeId, i64>,
        new_block: NodeId,
        old_block: NodeId,
        new_degree: f64,
        old_degree: f64,
    ) -> f64 {
        let mut total = 0.0;
        for (&other, &count) in new_counts {
            let other_degree = self.pair_degree(other, new_block, old_block, new_degree, old_degree);
            let scalar = if other == new_block { 2.0 } else { 1.0 };
            total += ent(count as f64, new_degree, other_degree) / scalar;
        }
        for (&other, &count) in old_counts {
            // The old-new pair is already counted above
            if other == new_block {
                continue;
            }
            let other_degree = self.pair_degree(other, new_block, old_block, new_degree, old_degree);
            let scalar = if other == old_block { 2.0 } else { 1.0 };
            total += ent(count as f64, old_degree, other_degree) / scalar;
        }
        total
    }

    /// Degree lookup that sees the locally tracked (possibly post-move)
    /// degrees for the two blocks under evaluation.
    fn pair_degree(
        &self,
        block: NodeId,
        new_block: NodeId,
        old_block: NodeId,
        new_degree: f64,
        old_degree: f64,
    ) -> f64 {
        if block == new_block {
            new_degree
        } else if block == old_block {
            old_degree
        } else {
            self.node(block).degree() as f64
        }
    }
}
