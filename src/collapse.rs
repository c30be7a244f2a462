//! Agglomerative block merging.
//!
//! A merge pass scores sampled candidate pairs with the analytic merge
//! delta, applies the best ones greedily (skipping blocks already consumed
//! in the pass), and reports the entropy change of the pass. The collapse
//! loop repeats merge passes, optionally interleaved with MCMC
//! equilibration sweeps, until a target block count is reached, with the
//! per-step merge count controlled by the greediness knob `σ`.

use fnv::FnvHashSet;
use log::{debug, info};

use crate::error::{Result, SbmError};
use crate::network::Network;
use crate::node::NodeId;
use crate::state::StateDump;

/// Outcome of one merge pass.
#[derive(Debug, Clone)]
pub struct MergeStep {
    /// Entropy change over the step, `after - before` (coarsening usually
    /// raises the entropy, so this is typically positive).
    pub entropy_delta: f64,
    /// Block count at the merge level after the step.
    pub n_blocks: usize,
    /// Applied merges as `(absorbed_id, absorber_id)`.
    pub merges: Vec<(String, String)>,
}

/// Outcome of a full collapse run.
#[derive(Debug, Clone)]
pub struct CollapseResults {
    /// Total entropy change from before the first merge to the end.
    pub entropy_delta: f64,
    /// Entropy of the final partition.
    pub final_entropy: f64,
    /// Final block count at the merge level.
    pub n_blocks: usize,
    /// Per-step log; populated when `report_all_steps` is set.
    pub steps: Vec<MergeStep>,
    /// State dump after each step, parallel to `steps`; lets the caller
    /// restore the best intermediate partition afterwards.
    pub states: Vec<StateDump>,
}

impl Network {
    /// Run a single merge pass over the blocks at `block_level` (>= 1).
    ///
    /// For every block, up to `n_checks_per_block` same-type partners are
    /// sampled through the proposal machinery and scored; the highest
    /// scoring pairs are applied greedily until `n_merges_to_make` merges
    /// have been committed or candidates run out. Failing to commit even
    /// one merge is a logic error.
    pub fn agglomerative_merge(
        &mut self,
        block_level: usize,
        n_merges_to_make: usize,
        n_checks_per_block: usize,
        eps: f64,
    ) -> Result<MergeStep> {
        self.merge_pass(block_level, n_merges_to_make, n_checks_per_block, eps, false)
    }

    fn merge_pass(
        &mut self,
        block_level: usize,
        n_merges_to_make: usize,
        n_checks_per_block: usize,
        eps: f64,
        cross_type: bool,
    ) -> Result<MergeStep> {
        if block_level < 1 {
            return Err(SbmError::logic(
                "merges happen at block levels (level >= 1)".to_string(),
            ));
        }
        self.check_level(block_level)?;
        let node_level = block_level - 1;
        let entropy_before = self.entropy(node_level)?;

        // Score sampled candidate pairs
        let blocks = self.nodes_at_level(block_level)?;
        let mut candidates: Vec<(f64, NodeId, NodeId)> = Vec::new();
        for &block in &blocks {
            let mut checked: FnvHashSet<NodeId> = FnvHashSet::default();
            for _ in 0..n_checks_per_block {
                let Some(partner) = self.propose_merge(block, eps, cross_type)? else {
                    continue;
                };
                if partner == block || !checked.insert(partner) {
                    continue;
                }
                let delta = self.merge_results(block, partner)?;
                candidates.push((delta, block, partner));
            }
        }

        // Best first: the largest delta is the least entropy increase
        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (a.1, a.2).cmp(&(b.1, b.2)))
        });

        let mut consumed: FnvHashSet<NodeId> = FnvHashSet::default();
        let mut merges = Vec::new();
        for (_, absorbed, absorber) in candidates {
            if merges.len() == n_merges_to_make {
                break;
            }
            if consumed.contains(&absorbed) || consumed.contains(&absorber) {
                continue;
            }
            consumed.insert(absorbed);
            consumed.insert(absorber);
            merges.push((
                self.node(absorbed).id().to_string(),
                self.node(absorber).id().to_string(),
            ));
            self.merge_blocks(absorbed, absorber)?;
        }

        if merges.is_empty() {
            return Err(SbmError::logic(
                "no applicable block merges were found".to_string(),
            ));
        }

        let entropy_after = self.entropy(node_level)?;
        Ok(MergeStep {
            entropy_delta: entropy_after - entropy_before,
            n_blocks: self.n_nodes_at_level(block_level)?,
            merges,
        })
    }

    /// Commit one merge: re-home every child of `absorbed` under
    /// `absorber`, then delete the emptied block.
    fn merge_blocks(&mut self, absorbed: NodeId, absorber: NodeId) -> Result<()> {
        for child in self.node(absorbed).children().to_vec() {
            self.set_parent(child, absorber)?;
        }
        self.delete_block(absorbed);
        Ok(())
    }

    /// Collapse the partition of level-`node_level` nodes down to `b_end`
    /// blocks.
    ///
    /// * `b_end` - target total block count across types
    /// * `n_checks_per_block` - merge candidates sampled per block and pass
    /// * `n_mcmc_sweeps` - equilibration sweeps after each merge pass
    /// * `sigma` - greediness: each step merges
    ///   `max(1, ceil(current · (1 - 1/σ)))` pairs, clamped to not
    ///   overshoot; `σ <= 1` merges exactly one pair per step
    /// * `eps` - proposal smoothing parameter
    /// * `report_all_steps` - record a `MergeStep` and state dump per step
    /// * `allow_exhaustive` - permit cross-type merges once only one block
    ///   per type remains; without it, a `b_end` below the number of types
    ///   is a logic error
    ///
    /// Starts from one block per node when no block level exists yet. A
    /// registered interrupt flag is probed between steps.
    #[allow(clippy::too_many_arguments)]
    pub fn collapse_blocks(
        &mut self,
        node_level: usize,
        b_end: usize,
        n_checks_per_block: usize,
        n_mcmc_sweeps: usize,
        sigma: f64,
        eps: f64,
        report_all_steps: bool,
        allow_exhaustive: bool,
    ) -> Result<CollapseResults> {
        self.check_level(node_level)?;
        if b_end < 1 {
            return Err(SbmError::logic(
                "target block count must be at least 1".to_string(),
            ));
        }
        if sigma <= 0.0 {
            return Err(SbmError::logic("sigma must be positive".to_string()));
        }
        if !allow_exhaustive && self.n_types() > b_end {
            return Err(SbmError::logic(format!(
                "can't collapse {} node types down to {} blocks without exhaustive merging",
                self.n_types(),
                b_end
            )));
        }

        let block_level = node_level + 1;
        if self.n_levels() == block_level {
            self.initialize_blocks(-1)?;
        }

        let entropy_start = self.entropy(node_level)?;
        info!(
            "collapse: {} blocks -> {}, sigma={}, eps={}",
            self.n_nodes_at_level(block_level)?,
            b_end,
            sigma,
            eps
        );

        let mut steps = Vec::new();
        let mut states = Vec::new();

        loop {
            let current = self.n_nodes_at_level(block_level)?;
            if current <= b_end {
                break;
            }
            if self.interrupted() {
                info!("collapse interrupted at {current} blocks");
                break;
            }

            let desired = ((current as f64) * (1.0 - 1.0 / sigma)).ceil().max(1.0) as usize;
            let n_merges = desired.min(current - b_end);
            let cross_type = allow_exhaustive && current <= self.n_types();

            let step_entropy_before = self.entropy(node_level)?;
            let mut step =
                self.merge_pass(block_level, n_merges, n_checks_per_block, eps, cross_type)?;

            if n_mcmc_sweeps > 0 {
                // Equilibrate with a fixed block roster; blocks emptied by
                // the sweeps are free (zero-delta) absorptions for the next
                // merge pass, so the count only ever changes by merging
                self.mcmc_sweep(node_level, n_mcmc_sweeps, eps, false, false, false)?;
            }

            step.n_blocks = self.n_nodes_at_level(block_level)?;
            step.entropy_delta = self.entropy(node_level)? - step_entropy_before;
            debug!(
                "collapse step: {} blocks, entropy delta {:.6}",
                step.n_blocks, step.entropy_delta
            );
            if report_all_steps {
                states.push(self.state()?);
                steps.push(step);
            }
        }

        let final_entropy = self.entropy(node_level)?;
        Ok(CollapseResults {
            entropy_delta: final_entropy - entropy_start,
            final_entropy,
            n_blocks: self.n_nodes_at_level(block_level)?,
            steps,
            states,
        })
    }
}
