//! Degree-corrected SBM entropy and block-pair count queries.
//!
//! # Per-pair contribution
//!
//! ```text
//! ent(e, d_s, d_t) = -e * ln(e / (d_s * d_t))    for e > 0, else 0
//! ```
//!
//! The model entropy at a level sums `ent` over all unordered block pairs
//! with a positive count, halving self-pairs to undo the double counting of
//! fully internal edges. This is the approximation the move evaluator
//! differentiates analytically; it can dip below zero on tiny graphs, which
//! is expected and never treated as an error.

use crate::error::Result;
use crate::network::Network;

/// Entropy contribution of one block pair with edge count `e` and block
/// degrees `d_s`, `d_t`.
#[inline]
pub(crate) fn ent(e: f64, d_s: f64, d_t: f64) -> f64 {
    if e > 0.0 {
        -e * (e / (d_s * d_t)).ln()
    } else {
        0.0
    }
}

impl Network {
    /// Model entropy for the partition of level-`level` nodes into their
    /// parent blocks at `level + 1`. Fails when that block level does not
    /// exist.
    pub fn entropy(&self, level: usize) -> Result<f64> {
        let block_level = level + 1;
        self.check_level(block_level)?;

        let mut total = 0.0;
        for block in self.nodes_at_level(block_level)? {
            let block_degree = self.node(block).degree() as f64;
            let counts = self.gather_neighbors_at_level(block, block_level)?;
            for (&other, &count) in &counts {
                // Each unordered pair once; the self pair is halved because
                // internal edges were gathered from both endpoints
                if other < block {
                    continue;
                }
                let other_degree = self.node(other).degree() as f64;
                let contribution = ent(count as f64, block_degree, other_degree);
                total += if other == block {
                    contribution / 2.0
                } else {
                    contribution
                };
            }
        }
        Ok(total)
    }

    /// Edge counts between every connected pair of blocks at a level,
    /// sorted by block ids. A block paired with itself reports one count
    /// per internal edge endpoint (twice the internal edge count), the
    /// convention the entropy formula expects.
    pub fn interblock_edge_counts(&self, level: usize) -> Result<Vec<(String, String, i64)>> {
        self.check_level(level)?;

        let mut rows = Vec::new();
        for block in self.nodes_at_level(level)? {
            let counts = self.gather_neighbors_at_level(block, level)?;
            for (&other, &count) in &counts {
                if other < block {
                    continue;
                }
                let a = self.node(block).id();
                let b = self.node(other).id();
                if a <= b {
                    rows.push((a.to_string(), b.to_string(), count));
                } else {
                    rows.push((b.to_string(), a.to_string(), count));
                }
            }
        }
        rows.sort();
        Ok(rows)
    }

    /// A single data node's edge counts grouped by its neighbors' ancestors
    /// at a level, sorted by block id.
    pub fn node_to_block_edge_counts(
        &self,
        node_id: &str,
        level: usize,
    ) -> Result<Vec<(String, i64)>> {
        let handle = self.node_by_id(node_id)?;
        let counts = self.gather_neighbors_at_level(handle, level)?;
        let mut rows: Vec<(String, i64)> = counts
            .iter()
            .map(|(&block, &count)| (self.node(block).id().to_string(), count))
            .collect();
        rows.sort();
        Ok(rows)
    }
}
