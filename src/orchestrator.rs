use std::{sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::{
    agent::{LearnOutcome, LearningAgent, ProposeContext},
    artifact::ArtifactWriter,
    cache::QualityKv,
    config::Config,
    data::{
        domain::{EpisodeId, Network, Pair, Pool, RunId},
        episode::{EpisodeMetadata, Failure, FailureStage, Timings},
        registry::Registry,
    },
    error::{PipelineError, PipelineResult},
    harness::ClmmExecutor,
    intelligence::Intelligence,
    validator,
};

/// Drives the propose → validate → execute → record state machine for
/// one campaign of episodes (`spec.md` §4.1, §4.2). A single episode's
/// failure is recorded and the campaign moves on; it never aborts the
/// run, which is the orchestrator's central guarantee.
pub struct Orchestrator<A, E> {
    config: Config,
    agent: Arc<A>,
    executor: Arc<E>,
    kv: Arc<QualityKv>,
    registry: Arc<Registry>,
    network: Network,
}

impl<A, E> Orchestrator<A, E>
where
    A: LearningAgent,
    E: ClmmExecutor,
{
    pub fn new(
        config: Config,
        agent: Arc<A>,
        executor: Arc<E>,
        kv: Arc<QualityKv>,
        registry: Arc<Registry>,
        network: Network,
    ) -> Self {
        Self {
            config,
            agent,
            executor,
            kv,
            registry,
            network,
        }
    }

    /// Runs `n_episodes` sequentially under one `RunId`, returning the
    /// number that completed with `EpisodeStatus::Success`.
    pub async fn run_campaign(&self, n_episodes: usize, pool: Pool, pair: Pair) -> PipelineResult<usize> {
        let run_started_at = Utc::now();
        let run_id = RunId::new(run_started_at);
        let mut succeeded = 0usize;

        for index in 0..n_episodes {
            let episode_id = EpisodeId::new(run_started_at, index);
            let seed = self.config.seed.unwrap_or(index as u64);

            match self.run_episode(&run_id, &episode_id, seed, &pool, &pair).await {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(episode_id = %episode_id.0, error = %e, "episode failed outside the normal failure path");
                }
            }
        }

        Ok(succeeded)
    }

    /// Runs one episode. Returns `Ok(true)` on success, `Ok(false)` on a
    /// recorded (non-panicking) failure, and `Err` only if even the
    /// failure-recording step itself could not complete.
    async fn run_episode(
        &self,
        run_id: &RunId,
        episode_id: &EpisodeId,
        seed: u64,
        pool: &Pool,
        pair: &Pair,
    ) -> PipelineResult<bool> {
        let writer = ArtifactWriter::create(&self.config.base_path, run_id, episode_id)?;
        let intel = Intelligence::new(self.kv.clone(), self.registry.clone());

        let total_start = Instant::now();

        let propose_start = Instant::now();
        let ctx = ProposeContext {
            episode_id: episode_id.clone(),
            run_id: run_id.clone(),
            seed,
            pool: pool.clone(),
            pair: pair.clone(),
            intel: &intel,
        };
        let proposal = match self.agent.propose(&ctx).await {
            Ok(p) => p,
            Err(e) => {
                return self
                    .record_failure(
                        &writer,
                        FailureStage::Agent,
                        &e,
                        run_id,
                        episode_id,
                        seed,
                        None,
                        None,
                    )
                    .map(|_| false);
            }
        };
        let propose_ms = propose_start.elapsed().as_secs_f64() * 1_000.0;

        writer.write_proposal(&proposal)?;

        let validate_start = Instant::now();
        if matches!(self.config.environment, crate::config::Environment::Real) {
            if let Err(e) = validator::validate_for_real_mode(&proposal, self.network, &self.config) {
                return self
                    .record_failure(
                        &writer,
                        FailureStage::Validation,
                        &e,
                        run_id,
                        episode_id,
                        seed,
                        Some(&proposal.metadata.config_hash),
                        Some((proposal.metadata.agent_version.as_str(), proposal.metadata.regime)),
                    )
                    .map(|_| false);
            }
        }
        let validate_ms = validate_start.elapsed().as_secs_f64() * 1_000.0;

        let execute_start = Instant::now();
        let result = match self.executor.execute(&proposal, run_id, seed).await {
            Ok(r) => r,
            Err(e) => {
                return self
                    .record_failure(
                        &writer,
                        FailureStage::Harness,
                        &e,
                        run_id,
                        episode_id,
                        seed,
                        Some(&proposal.metadata.config_hash),
                        Some((proposal.metadata.agent_version.as_str(), proposal.metadata.regime)),
                    )
                    .map(|_| false);
            }
        };
        let execute_ms = execute_start.elapsed().as_secs_f64() * 1_000.0;

        writer.write_result(&result)?;

        let (snapshot, hygiene) = intel.extract_snapshot();

        let should_learn = matches!(result.exec_mode, crate::data::domain::ExecMode::Real) || self.config.learn_from_mock;
        let (learning_update_applied, learning_update_skip_reason) = if should_learn {
            match self.agent.learn(&result).await {
                Ok(LearnOutcome::Applied) => (true, None),
                Ok(LearnOutcome::Skipped(reason)) => (false, Some(reason)),
                Err(e) => {
                    warn!(episode_id = %episode_id.0, error = %e, "learning update failed, episode result is kept");
                    (false, Some(format!("learning update errored: {e}")))
                }
            }
        } else {
            (false, Some("mock episode, learn_from_mock disabled".into()))
        };

        let total_ms = total_start.elapsed().as_secs_f64() * 1_000.0;

        let metadata = EpisodeMetadata {
            episode_id: episode_id.clone(),
            run_id: run_id.clone(),
            exec_mode: result.exec_mode,
            agent_version: proposal.metadata.agent_version.clone(),
            config_hash: proposal.metadata.config_hash.clone(),
            seed,
            regime_key: proposal.metadata.regime,
            learning_update_applied,
            learning_update_skip_reason,
            timings: Some(Timings {
                propose_ms,
                validate_ms,
                execute_ms,
                total_ms,
            }),
            extra: serde_json::json!({
                "intel_snapshot": snapshot,
                "intel_hygiene": hygiene,
            }),
        };
        writer.merge_metadata(&metadata)?;

        info!(episode_id = %episode_id.0, status = %result.status, "episode completed");
        Ok(matches!(result.status, crate::data::domain::EpisodeStatus::Success))
    }

    /// Writes a best-effort `metadata.json` (fields unknown at this stage
    /// are left to their defaults) followed by `failure.json`. A proposal
    /// that was never produced (agent-stage failure) means `proposal.json`
    /// stays absent — `SPEC_FULL.md` §8 scenario 2 documents this as the
    /// expected shape rather than a violation of artifact completeness.
    fn record_failure(
        &self,
        writer: &ArtifactWriter,
        stage: FailureStage,
        error: &PipelineError,
        run_id: &RunId,
        episode_id: &EpisodeId,
        seed: u64,
        config_hash: Option<&str>,
        agent_info: Option<(&str, crate::data::domain::Regime)>,
    ) -> PipelineResult<()> {
        let exec_mode = match self.config.environment {
            crate::config::Environment::Mock => crate::data::domain::ExecMode::Mock,
            crate::config::Environment::Real => crate::data::domain::ExecMode::Real,
        };

        let metadata = EpisodeMetadata {
            episode_id: episode_id.clone(),
            run_id: run_id.clone(),
            exec_mode,
            agent_version: agent_info.map(|(v, _)| v.to_string()).unwrap_or_else(|| "unknown".into()),
            config_hash: config_hash.map(str::to_string).unwrap_or_else(|| "unknown".into()),
            seed,
            regime_key: agent_info.map(|(_, r)| r).unwrap_or_default(),
            learning_update_applied: false,
            learning_update_skip_reason: Some("episode failed before the learn step".into()),
            timings: None,
            extra: serde_json::Value::Null,
        };
        if let Err(e) = writer.merge_metadata(&metadata) {
            warn!(episode_id = %episode_id.0, error = %e, "failed to write metadata.json for a failed episode");
        }

        let exit_code = match error {
            PipelineError::Agent(crate::error::AgentError::Execution(code)) => *code,
            _ => -1,
        };
        let failure = Failure {
            stage,
            error: error.to_string(),
            exit_code,
            config_hash: config_hash.map(str::to_string),
            agent_version: agent_info.map(|(v, _)| v.to_string()),
            exec_mode,
            timestamp: Utc::now(),
        };
        warn!(stage = %failure.stage, error = %failure.error, "episode failed");
        writer.write_failure(&failure)
    }
}
