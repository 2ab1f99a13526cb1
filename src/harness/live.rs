use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    agent::GatewayHealth,
    data::{
        domain::{EpisodeStatus, ExecMode, RunId},
        episode::{EpisodeMetrics, EpisodeResult, PositionState, Proposal, SimulationEnvelope},
    },
    error::{ExecutorError, PipelineResult},
};

use super::ClmmExecutor;

/// A price/liquidity quote for one proposal, before anything is sent
/// on-chain.
#[derive(Debug, Clone)]
pub struct Quote {
    pub expected_fill_price: f64,
    pub expected_gas_cost: f64,
}

/// What actually happened once a quote was acted on.
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub metrics: EpisodeMetrics,
    pub position_after: PositionState,
}

/// The on-chain/gateway boundary for live execution (`spec.md` §4.6,
/// §6). Kept separate from [`ClmmExecutor`] so a quote can be rejected
/// before anything irreversible happens.
#[async_trait]
pub trait ClmmGateway: Send + Sync {
    async fn quote(&self, proposal: &Proposal) -> PipelineResult<Quote>;
    async fn execute_quote(&self, proposal: &Proposal, quote: &Quote) -> PipelineResult<ExecutionReceipt>;
}

/// Quote-then-execute live executor. Failure taxonomy per `spec.md` §7:
/// a reverted quote maps to `EpisodeStatus::Skipped` (no funds moved, not
/// an error worth failing the episode over); an unhealthy gateway or any
/// other execution fault is a hard [`ExecutorError`] that becomes the
/// episode's `failure.json`.
pub struct LiveExecutor<G, H> {
    gateway: Arc<G>,
    health: Arc<H>,
}

impl<G: ClmmGateway, H: GatewayHealth> LiveExecutor<G, H> {
    pub fn new(gateway: Arc<G>, health: Arc<H>) -> Self {
        Self { gateway, health }
    }

    pub async fn is_healthy(&self) -> bool {
        self.health.is_healthy().await
    }
}

#[async_trait]
impl<G: ClmmGateway, H: GatewayHealth> ClmmExecutor for LiveExecutor<G, H> {
    async fn execute(&self, proposal: &Proposal, run_id: &RunId, _seed: u64) -> PipelineResult<EpisodeResult> {
        if !self.health.is_healthy().await {
            return Err(ExecutorError::UnhealthyGateway.into());
        }

        let quote = match self.gateway.quote(proposal).await {
            Ok(q) => q,
            Err(e) => {
                return Ok(EpisodeResult {
                    episode_id: proposal.episode_id.clone(),
                    run_id: run_id.clone(),
                    exec_mode: ExecMode::Real,
                    status: EpisodeStatus::Skipped,
                    metrics: EpisodeMetrics {
                        realized_pnl: 0.0,
                        fees_earned: 0.0,
                        gas_cost: 0.0,
                        max_drawdown: 0.0,
                        time_out_of_range_fraction: 0.0,
                        trade_count: 0,
                    },
                    simulation: SimulationEnvelope {
                        source: format!("live:quote_rejected:{e}"),
                        step_timings_ms: vec![],
                    },
                    position_after: PositionState {
                        lower_tick: 0,
                        upper_tick: 0,
                        liquidity: 0.0,
                    },
                });
            }
        };

        let receipt = self.gateway.execute_quote(proposal, &quote).await?;

        Ok(EpisodeResult {
            episode_id: proposal.episode_id.clone(),
            run_id: run_id.clone(),
            exec_mode: ExecMode::Real,
            status: EpisodeStatus::Success,
            metrics: receipt.metrics,
            simulation: SimulationEnvelope {
                source: "live".into(),
                step_timings_ms: vec![],
            },
            position_after: receipt.position_after,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::AlwaysUnhealthy,
        data::domain::{Pair, Pool, PoolParams, Regime},
        data::episode::{DecisionBasis, ProposalBuilder},
    };

    struct RevertingGateway;

    #[async_trait]
    impl ClmmGateway for RevertingGateway {
        async fn quote(&self, _proposal: &Proposal) -> PipelineResult<Quote> {
            Err(ExecutorError::Revert("insufficient liquidity".into()).into())
        }
        async fn execute_quote(&self, _proposal: &Proposal, _quote: &Quote) -> PipelineResult<ExecutionReceipt> {
            unreachable!("quote already rejected")
        }
    }

    struct AlwaysHealthyForTest;
    #[async_trait]
    impl GatewayHealth for AlwaysHealthyForTest {
        async fn is_healthy(&self) -> bool {
            true
        }
    }

    fn proposal() -> Proposal {
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
            .regime(Regime::MeanRevert)
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
    async fn reverted_quote_is_skipped_not_failed() {
        let executor = LiveExecutor::new(Arc::new(RevertingGateway), Arc::new(AlwaysHealthyForTest));
        let result = executor
            .execute(&proposal(), &RunId("run_1".into()), 1)
            .await
            .unwrap();
        assert_eq!(result.status, EpisodeStatus::Skipped);
    }

    #[tokio::test]
    async fn unhealthy_gateway_is_a_hard_error() {
        let executor = LiveExecutor::new(Arc::new(RevertingGateway), Arc::new(AlwaysUnhealthy));
        let result = executor.execute(&proposal(), &RunId("run_1".into()), 1).await;
        assert!(result.is_err());
    }
}
