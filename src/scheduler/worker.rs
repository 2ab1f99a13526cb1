use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::{
    agent::AnalyticsCaller,
    cache::QualityKv,
    data::envelope::CacheEnvelope,
    error::PipelineResult,
};

/// One unit of refresh work: a canonical cache key plus the backend call
/// that would repopulate it.
#[derive(Debug, Clone)]
pub struct RefreshJob {
    pub key: String,
    pub method: String,
    pub params: Vec<(String, String)>,
    pub ttl_seconds: i64,
    pub max_age_seconds: i64,
}

/// Runs `jobs` across a bounded pool of `worker_count` tasks, each job
/// bounded by `timeout` (`spec.md` §4.5). Cooperative cancellation: a
/// cancelled token stops workers from picking up new jobs but does not
/// abort one already in flight — `execute_quote`-style irreversible
/// calls never happen here, so this is purely a budget cutoff.
pub async fn run_worker_pool(
    jobs: Vec<RefreshJob>,
    caller: Arc<dyn AnalyticsCaller>,
    kv: Arc<QualityKv>,
    worker_count: usize,
    timeout: Duration,
    cancel: CancellationToken,
) -> PipelineResult<()> {
    let (tx, rx) = async_channel::unbounded::<RefreshJob>();
    for job in jobs {
        let _ = tx.send(job).await;
    }
    tx.close();

    let mut handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count.max(1) {
        let rx = rx.clone();
        let caller = caller.clone();
        let kv = kv.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    job = rx.recv() => match job {
                        Ok(job) => process_job(job, caller.as_ref(), &kv, timeout).await,
                        Err(_) => break,
                    },
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

/// Runs one job and publishes its outcome. A failed or timed-out call
/// that finds an existing good envelope leaves it untouched — that is
/// the entire stale-while-revalidate contract; only a cold key gets a
/// `failure` envelope written so it at least carries an error message.
async fn process_job(job: RefreshJob, caller: &dyn AnalyticsCaller, kv: &QualityKv, timeout: Duration) {
    let now = Utc::now();
    let outcome = tokio::time::timeout(timeout, caller.call(&job.method, &job.params)).await;

    match outcome {
        Ok(Ok(data)) => {
            let envelope = CacheEnvelope::success(data, now, job.ttl_seconds, job.max_age_seconds, "scheduler");
            let _ = kv.set(job.key, envelope);
        }
        Ok(Err(e)) => publish_failure(job, kv, e.to_string()),
        Err(_) => publish_failure(job, kv, "worker job timed out".into()),
    }
}

fn publish_failure(job: RefreshJob, kv: &QualityKv, error: String) {
    if let Some(existing) = kv.get(&job.key) {
        if existing.ok {
            return;
        }
    }
    let envelope = CacheEnvelope::failure(error, job.ttl_seconds, job.max_age_seconds, "scheduler");
    let _ = kv.set(job.key, envelope);
}
