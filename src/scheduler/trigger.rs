use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    data::domain::{Pair, Pool},
    error::{PipelineResult, SchedulerError},
    io::AppendLog,
};

/// One request for the Scheduler to refresh something sooner than its
/// normal tick cadence would. Advisory only: a tick that never observes
/// this trigger still runs its regular plan (`spec.md` §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub reason: String,
    pub pool: Option<Pool>,
    pub pair: Option<Pair>,
    pub recorded_at: DateTime<Utc>,
}

impl Trigger {
    pub fn new(reason: impl Into<String>, pool: Option<Pool>, pair: Option<Pair>) -> Self {
        Self {
            reason: reason.into(),
            pool,
            pair,
            recorded_at: Utc::now(),
        }
    }
}

/// Append-only JSONL log of triggers, consumed and truncated at tick
/// boundaries (`spec.md` §4.5). Malformed lines are skipped, never fatal,
/// since any process (including a test double) may append to this file
/// concurrently with the Scheduler's own tick.
pub struct TriggerLog {
    log: AppendLog,
}

impl TriggerLog {
    pub fn new(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            log: AppendLog::new(path),
        })
    }

    pub fn append(&self, trigger: &Trigger) -> PipelineResult<()> {
        self.log.append(trigger)
    }

    /// Drains every trigger recorded within `horizon_seconds` of `now`,
    /// then truncates the log. Older entries are dropped silently: a
    /// trigger that has aged past the horizon without being picked up is
    /// no longer actionable.
    pub fn drain_within_horizon(
        &self,
        now: DateTime<Utc>,
        horizon_seconds: i64,
    ) -> PipelineResult<Vec<Trigger>> {
        let all: Vec<Trigger> = self.log.read_lines().map_err(|e| {
            SchedulerError::MalformedTrigger(e.to_string())
        })?;
        self.log.truncate()?;

        Ok(all
            .into_iter()
            .filter(|t| (now - t.recorded_at).num_seconds() <= horizon_seconds)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_recent_triggers_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let log = TriggerLog::new(dir.path().join("triggers.jsonl"));

        log.append(&Trigger::new("cache_gas_regime_cold", None, None))
            .unwrap();
        log.append(&Trigger::new(
            "cache_pool_health_cold",
            Some(Pool("0x1111111111111111111111111111111111111111".into())),
            Some(Pair("ETH/USDC".into())),
        ))
        .unwrap();

        let drained = log.drain_within_horizon(Utc::now(), 600).unwrap();
        assert_eq!(drained.len(), 2);

        let drained_again = log.drain_within_horizon(Utc::now(), 600).unwrap();
        assert!(drained_again.is_empty());
    }

    #[test]
    fn drain_drops_entries_older_than_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let log = TriggerLog::new(dir.path().join("triggers.jsonl"));
        log.append(&Trigger::new("cache_gas_regime_cold", None, None))
            .unwrap();

        let far_future = Utc::now() + chrono::Duration::seconds(10_000);
        let drained = log.drain_within_horizon(far_future, 600).unwrap();
        assert!(drained.is_empty());
    }
}
