use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    data::{
        domain::{EpisodeId, RunId},
        episode::{EpisodeMetadata, EpisodeResult, Failure, Proposal},
    },
    error::{IoError, PipelineResult},
    io::{atomic_write_json, deep_merge_json, read_json_if_exists, AppendLog},
};

/// Owns one episode's directory under `<base_path>/<run_id>/<episode_id>/`
/// and every typed artifact write into it (`spec.md` §4.2). Every write
/// is atomic at the file level; `merge_metadata` additionally deep-merges
/// so a later write (e.g. attaching the intel snapshot after the decision
/// step) never clobbers fields an earlier write already set.
pub struct ArtifactWriter {
    episode_dir: PathBuf,
    log: AppendLog,
}

impl ArtifactWriter {
    pub fn create(base_path: &Path, run_id: &RunId, episode_id: &EpisodeId) -> PipelineResult<Self> {
        let episode_dir = base_path.join(&run_id.0).join(&episode_id.0);
        fs::create_dir_all(&episode_dir).map_err(IoError::Io)?;
        let log = AppendLog::new(episode_dir.join("logs.jsonl"));
        Ok(Self { episode_dir, log })
    }

    pub fn episode_dir(&self) -> &Path {
        &self.episode_dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.episode_dir.join(name)
    }

    pub fn write_proposal(&self, proposal: &Proposal) -> PipelineResult<()> {
        atomic_write_json(&self.path("proposal.json"), proposal)
    }

    pub fn write_result(&self, result: &EpisodeResult) -> PipelineResult<()> {
        atomic_write_json(&self.path("result.json"), result)
    }

    pub fn write_failure(&self, failure: &Failure) -> PipelineResult<()> {
        atomic_write_json(&self.path("failure.json"), failure)
    }

    /// Deep-merges `metadata` onto whatever `metadata.json` already holds
    /// (nothing, on the first call for an episode) and writes the result
    /// back atomically.
    pub fn merge_metadata(&self, metadata: &EpisodeMetadata) -> PipelineResult<()> {
        let path = self.path("metadata.json");
        let mut base: serde_json::Value =
            read_json_if_exists(&path)?.unwrap_or(serde_json::json!({}));
        let incoming = serde_json::to_value(metadata).map_err(IoError::Json)?;
        deep_merge_json(&mut base, incoming);
        atomic_write_json(&path, &base)
    }

    pub fn append_log(&self, record: &serde_json::Value) -> PipelineResult<()> {
        self.log.append(record)
    }
}
