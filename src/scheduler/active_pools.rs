use std::collections::HashSet;

use crate::data::{domain::{Pair, Pool}, episode::Proposal};

/// The capped set of pools/pairs the Scheduler should spend its
/// pool-scoped and pair-scoped budget on this tick (`spec.md` §4.5).
///
/// Empty is a valid, expected state early in a run (boundary B1): a tick
/// with no active pools simply skips pool-/pair-scoped queries rather
/// than erroring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivePoolSet {
    pub pools: Vec<Pool>,
    pub pairs: Vec<Pair>,
}

impl ActivePoolSet {
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty() && self.pairs.is_empty()
    }

    /// Derives the set from the most recent proposals (newest first),
    /// deduplicating and capping at `cap` pools. Pairs are carried along
    /// with whichever pool introduced them, so the pair list never
    /// exceeds the pool list in size.
    pub fn from_recent_proposals(proposals: &[Proposal], cap: usize) -> Self {
        let mut seen_pools = HashSet::new();
        let mut pools = Vec::new();
        let mut pairs = Vec::new();

        for proposal in proposals.iter().rev() {
            if pools.len() >= cap {
                break;
            }
            if seen_pools.insert(proposal.pool.clone()) {
                pools.push(proposal.pool.clone());
                pairs.push(proposal.pair.clone());
            }
        }

        Self { pools, pairs }
    }

    /// Operator override: an explicit list from configuration bypasses
    /// recent-episode derivation entirely, still capped at `cap`.
    pub fn from_explicit(pools: Vec<Pool>, pairs: Vec<Pair>, cap: usize) -> Self {
        Self {
            pools: pools.into_iter().take(cap).collect(),
            pairs: pairs.into_iter().take(cap).collect(),
        }
    }

    /// Adds a pool not already present. Used by the scheduler to fold a
    /// trigger's referenced pool into this tick's plan without touching
    /// the persisted active set (`spec.md` §4.5 trigger semantics).
    pub fn add_pool(&mut self, pool: Pool) {
        if !self.pools.contains(&pool) {
            self.pools.push(pool);
        }
    }

    /// Adds a pair not already present, mirroring `add_pool`.
    pub fn add_pair(&mut self, pair: Pair) {
        if !self.pairs.contains(&pair) {
            self.pairs.push(pair);
        }
    }
}
