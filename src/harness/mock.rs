use async_trait::async_trait;
use rand::Rng;
use rand_pcg::Pcg64;

use crate::{
    data::{
        domain::{EpisodeStatus, ExecMode, RunId},
        episode::{EpisodeMetrics, EpisodeResult, PositionState, Proposal, SimulationEnvelope},
    },
    error::PipelineResult,
};

use super::ClmmExecutor;

/// Derives a reproducible `rand_pcg::Pcg64` seed from `(seed, episode_id,
/// regime)` via `blake3`, so two runs sharing all three inputs replay
/// byte-identical tick paths (`spec.md` P1/§8 scenario 1).
fn derive_rng(seed: u64, episode_id: &str, regime: crate::data::domain::Regime) -> Pcg64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(episode_id.as_bytes());
    hasher.update(regime.to_string().as_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 32] = *digest.as_bytes();
    Pcg64::new(
        u128::from_le_bytes(bytes[0..16].try_into().unwrap()),
        u128::from_le_bytes(bytes[16..32].try_into().unwrap()),
    )
}

/// Regime-parameterized synthetic tick-path generator; no network or
/// filesystem access, entirely reproducible from its three seed inputs.
pub struct MockExecutor {
    tick_count: usize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self { tick_count: 64 }
    }

    pub fn with_tick_count(mut self, tick_count: usize) -> Self {
        self.tick_count = tick_count;
        self
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClmmExecutor for MockExecutor {
    async fn execute(&self, proposal: &Proposal, run_id: &RunId, seed: u64) -> PipelineResult<EpisodeResult> {
        let mut rng = derive_rng(seed, &proposal.episode_id.0, proposal.metadata.regime);

        let drift = match proposal.metadata.regime {
            crate::data::domain::Regime::MeanRevert => 0.0,
            crate::data::domain::Regime::Trend => 0.15,
            crate::data::domain::Regime::Jumpy => 0.0,
        };
        let jump_probability = match proposal.metadata.regime {
            crate::data::domain::Regime::Jumpy => 0.08,
            _ => 0.0,
        };

        let mut price = 1.0_f64;
        let mut step_timings_ms = Vec::with_capacity(self.tick_count);
        let mut time_in_range = 0usize;
        let mut fees_earned = 0.0;
        let half_width = proposal.params.range_width_bps / 10_000.0 / 2.0;

        for _ in 0..self.tick_count {
            let shock: f64 = rng.random_range(-1.0..1.0) * 0.01;
            let jump = if rng.random_bool(jump_probability) {
                rng.random_range(-0.05..0.05)
            } else {
                0.0
            };
            price *= 1.0 + drift / self.tick_count as f64 + shock + jump;

            let in_range = (price - 1.0).abs() <= half_width;
            if in_range {
                time_in_range += 1;
                fees_earned += proposal.params.order_size * (proposal.params.spread_bps / 10_000.0) / self.tick_count as f64;
            }
            step_timings_ms.push(0.1);
        }

        let realized_pnl = fees_earned - proposal.params.order_size * (price - 1.0).abs() * 0.01;
        let max_drawdown = (1.0 - price.min(1.0)).max(0.0);
        let time_out_of_range_fraction = 1.0 - (time_in_range as f64 / self.tick_count as f64);

        Ok(EpisodeResult {
            episode_id: proposal.episode_id.clone(),
            run_id: run_id.clone(),
            exec_mode: ExecMode::Mock,
            status: EpisodeStatus::Success,
            metrics: EpisodeMetrics {
                realized_pnl,
                fees_earned,
                gas_cost: 0.0,
                max_drawdown,
                time_out_of_range_fraction,
                trade_count: self.tick_count as u64,
            },
            simulation: SimulationEnvelope {
                source: "mock".into(),
                step_timings_ms,
            },
            position_after: PositionState {
                lower_tick: -((half_width * 10_000.0) as i64),
                upper_tick: (half_width * 10_000.0) as i64,
                liquidity: proposal.params.order_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        domain::{Pair, Pool, PoolParams, Regime},
        episode::{DecisionBasis, ProposalBuilder},
    };

    fn proposal(regime: Regime) -> Proposal {
        ProposalBuilder::new()
            .episode_id(crate::data::domain::EpisodeId("ep_1".into()))
            .pool(Pool("0x1111111111111111111111111111111111111111".into()))
            .pair(Pair("ETH/USDC".into()))
            .params(PoolParams {
                range_width_bps: 100.0,
                refresh_interval_seconds: 300,
                spread_bps: 5.0,
                order_size: 1_000.0,
                rebalance_threshold_bps: 50.0,
                max_position: 10_000.0,
            })
            .regime(regime)
            .config_hash("abc".into())
            .agent_version("0.1.0".into())
            .decision_basis(DecisionBasis {
                inputs: serde_json::json!({}),
                rule_fired: "default".into(),
                thresholds: serde_json::json!({}),
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn same_seed_same_episode_replays_identically() {
        let executor = MockExecutor::new();
        let run_id = RunId("run_1".into());
        let a = executor.execute(&proposal(Regime::Trend), &run_id, 12_345).await.unwrap();
        let b = executor.execute(&proposal(Regime::Trend), &run_id, 12_345).await.unwrap();
        assert_eq!(a.metrics.realized_pnl, b.metrics.realized_pnl);
        assert_eq!(a.simulation.step_timings_ms, b.simulation.step_timings_ms);
    }

    #[tokio::test]
    async fn different_seed_diverges() {
        let executor = MockExecutor::new();
        let run_id = RunId("run_1".into());
        let a = executor.execute(&proposal(Regime::Jumpy), &run_id, 1).await.unwrap();
        let b = executor.execute(&proposal(Regime::Jumpy), &run_id, 2).await.unwrap();
        assert_ne!(a.metrics.realized_pnl, b.metrics.realized_pnl);
    }
}
