use async_trait::async_trait;
use clmm_episode_pipeline::prelude::*;

/// Queries every registered intelligence accessor once, then returns a
/// fixed, valid proposal. Used to exercise `intel_hygiene`/`intel_snapshot`
/// propagation end to end without depending on a real agent's policy.
pub struct IntelQueryingAgent {
    pub params: PoolParams,
    pub regime: Regime,
}

impl IntelQueryingAgent {
    pub fn new(params: PoolParams, regime: Regime) -> Self {
        Self { params, regime }
    }
}

#[async_trait]
impl LearningAgent for IntelQueryingAgent {
    async fn propose(
        &self,
        ctx: &clmm_episode_pipeline::agent::ProposeContext<'_>,
    ) -> PipelineResult<Proposal> {
        ctx.intel.get_volatility(&ctx.pair, 60);
        ctx.intel.get_pool_health(&ctx.pool, &ctx.pair, 60);
        ctx.intel.get_liquidity_heatmap(&ctx.pool);
        ctx.intel.get_gas_regime();
        ctx.intel.get_mev_risk(&ctx.pool);
        ctx.intel.get_whale_sentiment(&ctx.pair);
        ctx.intel.get_pool_health_score(&ctx.pool);
        ctx.intel.get_range_hint(&ctx.pool);
        ctx.intel.get_dynamic_config();

        ProposalBuilder::new()
            .episode_id(ctx.episode_id.clone())
            .pool(ctx.pool.clone())
            .pair(ctx.pair.clone())
            .params(self.params)
            .regime(self.regime)
            .config_hash("intel-querying".into())
            .agent_version("test-0.1".into())
            .decision_basis(DecisionBasis {
                inputs: serde_json::json!({}),
                rule_fired: "fixed".into(),
                thresholds: serde_json::json!({}),
            })
            .build()
    }

    async fn learn(
        &self,
        _result: &EpisodeResult,
    ) -> PipelineResult<clmm_episode_pipeline::agent::LearnOutcome> {
        Ok(clmm_episode_pipeline::agent::LearnOutcome::Skipped(
            "test agent does not learn".into(),
        ))
    }
}

/// An agent that always exits as if the external process crashed before
/// writing anything, without ever constructing a `Proposal`.
pub struct CrashingAgent {
    pub exit_code: i32,
}

#[async_trait]
impl LearningAgent for CrashingAgent {
    async fn propose(
        &self,
        _ctx: &clmm_episode_pipeline::agent::ProposeContext<'_>,
    ) -> PipelineResult<Proposal> {
        Err(AgentError::Execution(self.exit_code).into())
    }

    async fn learn(
        &self,
        _result: &EpisodeResult,
    ) -> PipelineResult<clmm_episode_pipeline::agent::LearnOutcome> {
        unreachable!("a crashed agent never reaches the learn step")
    }
}

/// An analytics backend that always fails, for exercising
/// stale-while-revalidate against a pre-seeded cache.
pub struct AlwaysFailingCaller;

#[async_trait]
impl AnalyticsCaller for AlwaysFailingCaller {
    async fn call(
        &self,
        _method: &str,
        _params: &[(String, String)],
    ) -> PipelineResult<serde_json::Value> {
        Err(SchedulerError::BackendFailure("analytics backend unreachable".into()).into())
    }
}

/// An analytics backend that always succeeds with a fixed payload, for
/// exercising the scheduler's refresh path without a real caller.
pub struct AlwaysOkCaller;

#[async_trait]
impl AnalyticsCaller for AlwaysOkCaller {
    async fn call(
        &self,
        _method: &str,
        _params: &[(String, String)],
    ) -> PipelineResult<serde_json::Value> {
        Ok(serde_json::json!({"ok": true}))
    }
}

/// Always proposes a fixed, deliberately out-of-bounds `spread_bps`, for
/// exercising real-mode validator rejection.
pub struct InvalidSpreadAgent;

#[async_trait]
impl LearningAgent for InvalidSpreadAgent {
    async fn propose(
        &self,
        ctx: &clmm_episode_pipeline::agent::ProposeContext<'_>,
    ) -> PipelineResult<Proposal> {
        let mut params = default_params();
        params.spread_bps = 10_000.0;
        ProposalBuilder::new()
            .episode_id(ctx.episode_id.clone())
            .pool(ctx.pool.clone())
            .pair(ctx.pair.clone())
            .params(params)
            .regime(Regime::MeanRevert)
            .config_hash("invalid-spread".into())
            .agent_version("test-0.1".into())
            .decision_basis(DecisionBasis {
                inputs: serde_json::json!({}),
                rule_fired: "fixed".into(),
                thresholds: serde_json::json!({}),
            })
            .build()
    }

    async fn learn(
        &self,
        _result: &EpisodeResult,
    ) -> PipelineResult<clmm_episode_pipeline::agent::LearnOutcome> {
        unreachable!("a validation failure never reaches the learn step")
    }
}

pub fn default_params() -> PoolParams {
    PoolParams {
        range_width_bps: 100.0,
        refresh_interval_seconds: 300,
        spread_bps: 5.0,
        order_size: 1_000.0,
        rebalance_threshold_bps: 50.0,
        max_position: 10_000.0,
    }
}
