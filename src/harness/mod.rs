pub mod live;
pub mod mock;

use async_trait::async_trait;

use crate::{
    data::{domain::RunId, episode::{EpisodeResult, Proposal}},
    error::PipelineResult,
};

pub use live::LiveExecutor;
pub use mock::MockExecutor;

/// Drives one episode to completion given a validated [`Proposal`]
/// (`spec.md` §4.6). Implementations own the quote/execute/simulate
/// details; the orchestrator only sees the resulting [`EpisodeResult`]
/// or a typed error it turns into a `failure.json`.
#[async_trait]
pub trait ClmmExecutor: Send + Sync {
    async fn execute(&self, proposal: &Proposal, run_id: &RunId, seed: u64) -> PipelineResult<EpisodeResult>;
}
