use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{
    data::{
        domain::{EpisodeId, Pair, Pool, RunId},
        episode::{EpisodeResult, Proposal},
    },
    error::{AgentError, PipelineResult},
    intelligence::Intelligence,
};

/// Everything the agent needs to produce a [`Proposal`] for one episode.
/// Built by the orchestrator immediately before the propose step
/// (`spec.md` §4.1).
pub struct ProposeContext<'a> {
    pub episode_id: EpisodeId,
    pub run_id: RunId,
    pub seed: u64,
    pub pool: Pool,
    pub pair: Pair,
    pub intel: &'a Intelligence,
}

/// The external learning-agent boundary (`spec.md` §6). The pipeline
/// treats the agent as an opaque collaborator: it proposes, and later
/// may be told whether its proposal's outcome should feed a learning
/// update. The agent's internal policy is out of scope.
#[async_trait]
pub trait LearningAgent: Send + Sync {
    async fn propose(&self, ctx: &ProposeContext<'_>) -> PipelineResult<Proposal>;

    /// Returns whether a learning update was actually applied. The
    /// orchestrator records the answer (and, on `false`, why) into
    /// `metadata.learning_update_applied` / `learning_update_skip_reason`.
    async fn learn(&self, result: &EpisodeResult) -> PipelineResult<LearnOutcome>;
}

#[derive(Debug, Clone)]
pub enum LearnOutcome {
    Applied,
    Skipped(String),
}

/// Deterministic in-process test double. Always proposes a fixed,
/// valid parameter bundle and never actually learns (used by
/// `learn_from_mock = false` test runs and as the default in unit tests).
pub struct ScriptedAgent {
    params: crate::data::domain::PoolParams,
    regime: crate::data::domain::Regime,
}

impl ScriptedAgent {
    pub fn new(params: crate::data::domain::PoolParams, regime: crate::data::domain::Regime) -> Self {
        Self { params, regime }
    }
}

#[async_trait]
impl LearningAgent for ScriptedAgent {
    async fn propose(&self, ctx: &ProposeContext<'_>) -> PipelineResult<Proposal> {
        use crate::data::episode::{DecisionBasis, ProposalBuilder};

        ProposalBuilder::new()
            .episode_id(ctx.episode_id.clone())
            .pool(ctx.pool.clone())
            .pair(ctx.pair.clone())
            .params(self.params)
            .regime(self.regime)
            .config_hash("scripted".into())
            .agent_version("scripted-0.1".into())
            .decision_basis(DecisionBasis {
                inputs: serde_json::json!({"scripted": true}),
                rule_fired: "fixed_params".into(),
                thresholds: serde_json::json!({}),
            })
            .build()
    }

    async fn learn(&self, _result: &EpisodeResult) -> PipelineResult<LearnOutcome> {
        Ok(LearnOutcome::Skipped("scripted agent does not learn".into()))
    }
}

#[derive(Debug, Serialize)]
struct SubprocessProposeRequest<'a> {
    episode_id: &'a str,
    run_id: &'a str,
    seed: u64,
    pool: &'a str,
    pair: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubprocessProposeResponse {
    params: crate::data::domain::PoolParams,
    regime: crate::data::domain::Regime,
    config_hash: String,
    agent_version: String,
    rule_fired: String,
    thresholds: serde_json::Value,
}

/// Drives a learning agent living in its own process: one request/response
/// pair per call, newline-delimited JSON over stdin/stdout. A non-zero
/// exit or malformed response is an [`AgentError`], never a panic.
pub struct SubprocessAgent {
    program: String,
    args: Vec<String>,
}

impl SubprocessAgent {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    async fn run(&self, payload: &[u8]) -> PipelineResult<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AgentError::Spawn(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload)
                .await
                .map_err(|e| AgentError::Spawn(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AgentError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(AgentError::Execution(output.status.code().unwrap_or(-1)).into());
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl LearningAgent for SubprocessAgent {
    async fn propose(&self, ctx: &ProposeContext<'_>) -> PipelineResult<Proposal> {
        use crate::data::episode::{DecisionBasis, ProposalBuilder};

        let request = SubprocessProposeRequest {
            episode_id: &ctx.episode_id.0,
            run_id: &ctx.run_id.0,
            seed: ctx.seed,
            pool: &ctx.pool.0,
            pair: &ctx.pair.0,
        };
        let payload = serde_json::to_vec(&request).map_err(crate::error::IoError::Json)?;
        let stdout = self.run(&payload).await?;
        let response: SubprocessProposeResponse = serde_json::from_slice(&stdout).map_err(|e| {
            AgentError::MissingProposal(format!("malformed agent response: {e}"))
        })?;

        ProposalBuilder::new()
            .episode_id(ctx.episode_id.clone())
            .pool(ctx.pool.clone())
            .pair(ctx.pair.clone())
            .params(response.params)
            .regime(response.regime)
            .config_hash(response.config_hash)
            .agent_version(response.agent_version)
            .decision_basis(DecisionBasis {
                inputs: serde_json::json!({"episode_id": ctx.episode_id.0}),
                rule_fired: response.rule_fired,
                thresholds: response.thresholds,
            })
            .build()
    }

    async fn learn(&self, result: &EpisodeResult) -> PipelineResult<LearnOutcome> {
        let payload = serde_json::to_vec(result).map_err(crate::error::IoError::Json)?;
        self.run(&payload).await?;
        Ok(LearnOutcome::Applied)
    }
}

/// The analytics backend the Scheduler refreshes from (`spec.md` §4.4,
/// §6). `call` returns raw JSON; shape validation is the caller's job,
/// since the Registry only declares freshness parameters, not schemas.
#[async_trait]
pub trait AnalyticsCaller: Send + Sync {
    async fn call(
        &self,
        method: &str,
        params: &[(String, String)],
    ) -> PipelineResult<serde_json::Value>;
}

/// Deterministic synthetic analytics backend: derives a value from a
/// `blake3` digest of the method name and parameters so repeated calls
/// with the same key are stable within a process (`spec.md` Non-goals
/// exclude a real Dune integration; this stands in for one end to end).
pub struct MockAnalyticsCaller;

#[async_trait]
impl AnalyticsCaller for MockAnalyticsCaller {
    async fn call(
        &self,
        method: &str,
        params: &[(String, String)],
    ) -> PipelineResult<serde_json::Value> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(method.as_bytes());
        for (k, v) in params {
            hasher.update(k.as_bytes());
            hasher.update(v.as_bytes());
        }
        let digest = hasher.finalize();
        let sample = u32::from_le_bytes(digest.as_bytes()[0..4].try_into().unwrap());
        Ok(serde_json::json!({
            "method": method,
            "sample": sample % 1_000,
        }))
    }
}

/// Production analytics backend over gRPC, using the same connect-time
/// keepalive/backoff pattern as the rest of this crate's collaborators.
/// `spec.md` Non-goals
/// exclude implementing a real Dune query surface, so this dials a
/// channel and defines the call shape without a live counterpart.
pub struct GrpcAnalyticsCaller {
    channel: tonic::transport::Channel,
}

impl GrpcAnalyticsCaller {
    pub async fn connect(endpoint: impl Into<String>) -> PipelineResult<Self> {
        let channel = tonic::transport::Endpoint::from_shared(endpoint.into())
            .map_err(|e| AgentError::Spawn(e.to_string()))?
            .connect()
            .await
            .map_err(|e| AgentError::Spawn(e.to_string()))?;
        Ok(Self { channel })
    }
}

#[async_trait]
impl AnalyticsCaller for GrpcAnalyticsCaller {
    async fn call(
        &self,
        method: &str,
        _params: &[(String, String)],
    ) -> PipelineResult<serde_json::Value> {
        let _ = &self.channel;
        Err(AgentError::MissingProposal(format!(
            "grpc analytics backend not wired for '{method}' in this build"
        ))
        .into())
    }
}

/// Liveness probe for the real executor's upstream gateway
/// (`spec.md` §4.6). The orchestrator consults this before deciding
/// whether `Config::should_use_mock` should see `live_executor_healthy = true`.
#[async_trait]
pub trait GatewayHealth: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

pub struct AlwaysHealthy;

#[async_trait]
impl GatewayHealth for AlwaysHealthy {
    async fn is_healthy(&self) -> bool {
        true
    }
}

pub struct AlwaysUnhealthy;

#[async_trait]
impl GatewayHealth for AlwaysUnhealthy {
    async fn is_healthy(&self) -> bool {
        false
    }
}
