use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    data::domain::{EpisodeId, ExecMode, Pair, Pool, PoolParams, Regime, RunId},
    data::envelope::Quality,
    error::{PipelineResult, ValidationError},
};

/// The inputs, rule fired, and thresholds used by the agent to pick this
/// proposal's regime. Opaque beyond shape: the rule semantics are the
/// agent's (out of scope per `spec.md` §1); the pipeline only carries it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionBasis {
    pub inputs: serde_json::Value,
    pub rule_fired: String,
    pub thresholds: serde_json::Value,
}

/// Metadata the agent attaches to its own proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub regime: Regime,
    pub config_hash: String,
    pub agent_version: String,
    pub decision_basis: DecisionBasis,
}

/// What to do for one episode. Immutable after write (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub episode_id: EpisodeId,
    pub generated_at: DateTime<Utc>,
    pub status: ProposalStatus,
    pub pool: Pool,
    pub pair: Pair,
    pub params: PoolParams,
    pub metadata: ProposalMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
}

/// Fields accumulate as `Option`s and `build()` fails with a typed
/// `ValidationError` instead of panicking when something required is
/// missing — this is what makes scenario B3 (a proposal missing a
/// required field) a clean failure instead of a panic.
#[derive(Debug, Default)]
pub struct ProposalBuilder {
    episode_id: Option<EpisodeId>,
    generated_at: Option<DateTime<Utc>>,
    pool: Option<Pool>,
    pair: Option<Pair>,
    params: Option<PoolParams>,
    regime: Option<Regime>,
    config_hash: Option<String>,
    agent_version: Option<String>,
    decision_basis: Option<DecisionBasis>,
}

impl ProposalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn episode_id(mut self, id: EpisodeId) -> Self {
        self.episode_id = Some(id);
        self
    }

    pub fn generated_at(mut self, ts: DateTime<Utc>) -> Self {
        self.generated_at = Some(ts);
        self
    }

    pub fn pool(mut self, pool: Pool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn pair(mut self, pair: Pair) -> Self {
        self.pair = Some(pair);
        self
    }

    pub fn params(mut self, params: PoolParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn regime(mut self, regime: Regime) -> Self {
        self.regime = Some(regime);
        self
    }

    pub fn config_hash(mut self, hash: String) -> Self {
        self.config_hash = Some(hash);
        self
    }

    pub fn agent_version(mut self, version: String) -> Self {
        self.agent_version = Some(version);
        self
    }

    pub fn decision_basis(mut self, basis: DecisionBasis) -> Self {
        self.decision_basis = Some(basis);
        self
    }

    pub fn build(self) -> PipelineResult<Proposal> {
        let episode_id = self
            .episode_id
            .ok_or_else(|| ValidationError::MissingField("episode_id".into()))?;
        let pool = self
            .pool
            .ok_or_else(|| ValidationError::MissingField("pool".into()))?;
        let pair = self
            .pair
            .ok_or_else(|| ValidationError::MissingField("pair".into()))?;
        let params = self
            .params
            .ok_or_else(|| ValidationError::MissingField("params".into()))?;
        let config_hash = self
            .config_hash
            .ok_or_else(|| ValidationError::MissingField("metadata.config_hash".into()))?;
        let agent_version = self
            .agent_version
            .ok_or_else(|| ValidationError::MissingField("metadata.agent_version".into()))?;
        let decision_basis = self
            .decision_basis
            .ok_or_else(|| ValidationError::MissingField("metadata.decision_basis".into()))?;

        Ok(Proposal {
            episode_id,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
            status: ProposalStatus::Proposed,
            pool,
            pair,
            params,
            metadata: ProposalMetadata {
                regime: self.regime.unwrap_or_default(),
                config_hash,
                agent_version,
                decision_basis,
            },
        })
    }
}

/// Produced by the harness after driving one episode (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeResult {
    pub episode_id: EpisodeId,
    pub run_id: RunId,
    pub exec_mode: ExecMode,
    pub status: super::domain::EpisodeStatus,
    pub metrics: EpisodeMetrics,
    pub simulation: SimulationEnvelope,
    pub position_after: PositionState,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    pub realized_pnl: f64,
    pub fees_earned: f64,
    pub gas_cost: f64,
    pub max_drawdown: f64,
    pub time_out_of_range_fraction: f64,
    pub trade_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationEnvelope {
    pub source: String,
    pub step_timings_ms: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionState {
    pub lower_tick: i64,
    pub upper_tick: i64,
    pub liquidity: f64,
}

/// Per-query freshness snapshot entry, captured at decision time
/// (`spec.md` §3/§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelSnapshotEntry {
    pub quality: Quality,
    pub age_seconds: Option<i64>,
    pub asof_timestamp: Option<DateTime<Utc>>,
}

/// A mapping from canonical intel query key to its freshness record,
/// never mutated once written (snapshot fixity, `spec.md` §3 / P7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntelSnapshot(pub BTreeMap<String, IntelSnapshotEntry>);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntelHygiene {
    pub total_queries: usize,
    pub fresh_count: usize,
    pub stale_count: usize,
    pub missing_or_too_old_count: usize,
    pub fresh_percent: f64,
}

impl IntelHygiene {
    pub fn from_snapshot(snapshot: &IntelSnapshot) -> Self {
        let total_queries = snapshot.0.len();
        let fresh_count = snapshot
            .0
            .values()
            .filter(|e| e.quality == Quality::Fresh)
            .count();
        let stale_count = snapshot
            .0
            .values()
            .filter(|e| e.quality == Quality::Stale)
            .count();
        let missing_or_too_old_count = total_queries - fresh_count - stale_count;
        let fresh_percent = if total_queries == 0 {
            0.0
        } else {
            (100.0 * fresh_count as f64 / total_queries as f64 * 10.0).round() / 10.0
        };
        Self {
            total_queries,
            fresh_count,
            stale_count,
            missing_or_too_old_count,
            fresh_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timings {
    pub propose_ms: f64,
    pub validate_ms: f64,
    pub execute_ms: f64,
    pub total_ms: f64,
}

/// Superset of provenance fields that MUST be present for every episode
/// (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub episode_id: EpisodeId,
    pub run_id: RunId,
    pub exec_mode: ExecMode,
    pub agent_version: String,
    pub config_hash: String,
    pub seed: u64,
    pub regime_key: Regime,
    pub learning_update_applied: bool,
    pub learning_update_skip_reason: Option<String>,
    pub timings: Option<Timings>,
    pub extra: serde_json::Value,
}

/// `{stage, error, exit_code, config_hash, agent_version, exec_mode, timestamp}`
/// written before the orchestrator moves on from any failed episode
/// (`spec.md` §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub stage: FailureStage,
    pub error: String,
    pub exit_code: i32,
    pub config_hash: Option<String>,
    pub agent_version: Option<String>,
    pub exec_mode: ExecMode,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Agent,
    Validation,
    Harness,
    Io,
}
