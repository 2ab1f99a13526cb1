pub mod active_pools;
pub mod trigger;
pub mod worker;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    agent::AnalyticsCaller,
    cache::QualityKv,
    config::{Config, ExpensiveBudgetPolicy},
    data::registry::{CostClass, Priority, Registry, Scope, MINUTE_WINDOWS},
    error::PipelineResult,
};

pub use active_pools::ActivePoolSet;
pub use trigger::{Trigger, TriggerLog};
pub use worker::RefreshJob;

use std::sync::Mutex;

struct PlannedJob {
    priority: Priority,
    cost_class: CostClass,
    job: RefreshJob,
}

/// Expands the registry's enabled entries against the current active
/// pool/pair set into concrete refresh jobs (`spec.md` §4.5 step 3). An
/// empty active set yields only the `Global`-scoped jobs — boundary B1.
fn enumerate_plan(registry: &Registry, active: &ActivePoolSet) -> Vec<PlannedJob> {
    let mut jobs = Vec::new();

    for entry in registry.enabled_entries() {
        match entry.scope {
            Scope::Global => {
                let key = format!("{}()", entry.method_name);
                jobs.push(PlannedJob {
                    priority: entry.priority,
                    cost_class: entry.cost_class,
                    job: RefreshJob {
                        key,
                        method: entry.method_name.into(),
                        params: vec![],
                        ttl_seconds: entry.ttl_seconds,
                        max_age_seconds: entry.max_age_seconds,
                    },
                });
            }
            Scope::Pool => {
                for pool in &active.pools {
                    let key = format!("{}(pool={})", entry.method_name, pool.0);
                    jobs.push(PlannedJob {
                        priority: entry.priority,
                        cost_class: entry.cost_class,
                        job: RefreshJob {
                            key,
                            method: entry.method_name.into(),
                            params: vec![("pool".into(), pool.0.clone())],
                            ttl_seconds: entry.ttl_seconds,
                            max_age_seconds: entry.max_age_seconds,
                        },
                    });
                }
            }
            Scope::Pair => {
                for pair in &active.pairs {
                    let key = format!("{}(pair={})", entry.method_name, pair.0);
                    jobs.push(PlannedJob {
                        priority: entry.priority,
                        cost_class: entry.cost_class,
                        job: RefreshJob {
                            key,
                            method: entry.method_name.into(),
                            params: vec![("pair".into(), pair.0.clone())],
                            ttl_seconds: entry.ttl_seconds,
                            max_age_seconds: entry.max_age_seconds,
                        },
                    });
                }
            }
            Scope::Windowed => {
                for pair in &active.pairs {
                    for (label, _) in MINUTE_WINDOWS {
                        let key = format!("{}(pair={}, window={label})", entry.method_name, pair.0);
                        jobs.push(PlannedJob {
                            priority: entry.priority,
                            cost_class: entry.cost_class,
                            job: RefreshJob {
                                key,
                                method: entry.method_name.into(),
                                params: vec![("pair".into(), pair.0.clone()), ("window".into(), (*label).into())],
                                ttl_seconds: entry.ttl_seconds,
                                max_age_seconds: entry.max_age_seconds,
                            },
                        });
                    }
                }
            }
            Scope::PoolWindowed => {
                for pool in &active.pools {
                    for (label, _) in MINUTE_WINDOWS {
                        let key = format!("{}(pool={}, window={label})", entry.method_name, pool.0);
                        jobs.push(PlannedJob {
                            priority: entry.priority,
                            cost_class: entry.cost_class,
                            job: RefreshJob {
                                key,
                                method: entry.method_name.into(),
                                params: vec![("pool".into(), pool.0.clone()), ("window".into(), (*label).into())],
                                ttl_seconds: entry.ttl_seconds,
                                max_age_seconds: entry.max_age_seconds,
                            },
                        });
                    }
                }
            }
        }
    }

    jobs.sort_by_key(|j| j.priority);
    jobs
}

/// Applies the per-tick expensive-query budget (`spec.md` §4.5, §9): P0
/// items are exempt under the default `Hard` policy and always run;
/// `Expensive`-class items beyond the budget are dropped under `Hard`,
/// merely logged as over-budget under `Soft`.
fn apply_expensive_budget(
    jobs: Vec<PlannedJob>,
    budget: usize,
    policy: ExpensiveBudgetPolicy,
) -> Vec<PlannedJob> {
    let mut spent = 0usize;
    let mut kept = Vec::with_capacity(jobs.len());
    let mut dropped = 0usize;

    for planned in jobs {
        let exempt = planned.priority == Priority::P0;
        if planned.cost_class == CostClass::Expensive && !exempt {
            if spent >= budget {
                match policy {
                    ExpensiveBudgetPolicy::Hard => {
                        dropped += 1;
                        continue;
                    }
                    ExpensiveBudgetPolicy::Soft => {
                        warn!(key = %planned.job.key, "expensive-query budget exceeded, running anyway under soft policy");
                    }
                }
            } else {
                spent += 1;
            }
        }
        kept.push(planned);
    }

    if dropped > 0 {
        info!(dropped, "expensive-query budget dropped jobs this tick");
    }
    kept
}

/// Drives the Cache-First Intelligence layer's background refresh
/// (`spec.md` §4.5). One instance lives for the lifetime of a long-running
/// process; `tick` is also callable directly from tests and from a
/// one-shot CLI invocation.
pub struct Scheduler {
    config: Config,
    registry: Arc<Registry>,
    kv: Arc<QualityKv>,
    caller: Arc<dyn AnalyticsCaller>,
    trigger_log: Arc<TriggerLog>,
    active_pools: Mutex<ActivePoolSet>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        registry: Arc<Registry>,
        kv: Arc<QualityKv>,
        caller: Arc<dyn AnalyticsCaller>,
        trigger_log: Arc<TriggerLog>,
    ) -> Self {
        Self {
            config,
            registry,
            kv,
            caller,
            trigger_log,
            active_pools: Mutex::new(ActivePoolSet::default()),
        }
    }

    pub fn set_active_pools(&self, active: ActivePoolSet) {
        *self.active_pools.lock().expect("active pool set lock poisoned") = active;
    }

    /// Runs one refresh cycle: drains due triggers and folds their
    /// referenced pool/pair into this tick's active set (a trigger's
    /// absence never blocks the regular plan; its presence only ever
    /// adds scope, it never removes any), enumerates the plan, applies
    /// the expensive budget, and dispatches to the worker pool.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn tick(&self, cancel: CancellationToken) -> PipelineResult<usize> {
        let now = Utc::now();
        let triggers = self
            .trigger_log
            .drain_within_horizon(now, self.config.trigger_horizon_seconds as i64)
            .unwrap_or_default();
        if !triggers.is_empty() {
            info!(count = triggers.len(), "drained refresh triggers");
        }

        let mut active = self
            .active_pools
            .lock()
            .expect("active pool set lock poisoned")
            .clone();
        for trigger in &triggers {
            if let Some(pool) = &trigger.pool {
                active.add_pool(pool.clone());
            }
            if let Some(pair) = &trigger.pair {
                active.add_pair(pair.clone());
            }
        }

        let plan = enumerate_plan(&self.registry, &active);
        let budgeted = apply_expensive_budget(plan, self.config.expensive_budget_per_tick, self.config.expensive_budget_policy);
        let dispatched = budgeted.len();
        let jobs: Vec<RefreshJob> = budgeted.into_iter().map(|p| p.job).collect();

        worker::run_worker_pool(
            jobs,
            self.caller.clone(),
            self.kv.clone(),
            self.config.worker_count,
            Duration::from_secs(self.config.worker_timeout_seconds),
            cancel,
        )
        .await?;

        Ok(dispatched)
    }

    /// Ticks on a fixed interval until `cancel` fires, then returns once
    /// the in-flight tick (if any) completes — no irreversible work is
    /// ever aborted mid-flight.
    pub async fn run_forever(&self, cancel: CancellationToken) -> PipelineResult<()> {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.tick_interval_seconds));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick(cancel.clone()).await {
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
        Ok(())
    }
}
