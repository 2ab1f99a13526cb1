use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Execution environment toggle (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Mock,
    Real,
}

/// Selects which `AnalyticsCaller` backend the Scheduler dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntelSource {
    #[default]
    Mock,
    Dune,
}

/// Whether the expensive-query-per-tick budget exempts P0 items as a
/// hard rule or a soft heuristic. `spec.md` §9 leaves this as an
/// explicit tunable with a documented default of `Hard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExpensiveBudgetPolicy {
    #[default]
    Hard,
    Soft,
}

/// Enumerated, named configuration for one pipeline run. No ambient
/// state beyond these fields may influence a decision (`spec.md` §9).
///
/// Constructed via [`Config::new`] and refined with consuming `with_*`
/// builder methods, never a panicking constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_path: PathBuf,
    pub environment: Environment,
    pub force_mock: bool,
    pub learn_from_mock: bool,
    pub intel_source: IntelSource,
    pub seed: Option<u64>,
    pub pool_cap: usize,
    pub worker_count: usize,
    pub tick_interval_seconds: u64,
    pub worker_timeout_seconds: u64,
    pub trigger_horizon_seconds: u64,
    pub shutdown_grace_seconds: u64,
    pub expensive_budget_per_tick: usize,
    pub expensive_budget_policy: ExpensiveBudgetPolicy,
    /// Real-mode only: disables pool-address/network validation for testing.
    pub disable_pool_validation: bool,
    /// Real-mode only: explicit operator acknowledgement of capital risk.
    /// `execute_episode` in `environment = Real` refuses to run without it.
    pub risk_acknowledged: bool,
    /// Permits degrading to the mock executor when `environment = Real`
    /// but the live executor is unhealthy, instead of failing the episode.
    pub allow_degrade_to_mock: bool,
}

impl Config {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            environment: Environment::default(),
            force_mock: false,
            learn_from_mock: false,
            intel_source: IntelSource::default(),
            seed: None,
            pool_cap: 3,
            worker_count: 3,
            tick_interval_seconds: 60,
            worker_timeout_seconds: 30,
            trigger_horizon_seconds: 600,
            shutdown_grace_seconds: 30,
            expensive_budget_per_tick: 1,
            expensive_budget_policy: ExpensiveBudgetPolicy::default(),
            disable_pool_validation: false,
            risk_acknowledged: false,
            allow_degrade_to_mock: false,
        }
    }

    pub fn with_environment(self, environment: Environment) -> Self {
        Self { environment, ..self }
    }

    pub fn with_force_mock(self, force_mock: bool) -> Self {
        Self { force_mock, ..self }
    }

    pub fn with_learn_from_mock(self, learn_from_mock: bool) -> Self {
        Self {
            learn_from_mock,
            ..self
        }
    }

    pub fn with_intel_source(self, intel_source: IntelSource) -> Self {
        Self {
            intel_source,
            ..self
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    pub fn with_pool_cap(self, pool_cap: usize) -> Self {
        Self { pool_cap, ..self }
    }

    pub fn with_worker_count(self, worker_count: usize) -> Self {
        Self {
            worker_count,
            ..self
        }
    }

    pub fn with_tick_interval_seconds(self, tick_interval_seconds: u64) -> Self {
        Self {
            tick_interval_seconds,
            ..self
        }
    }

    pub fn with_risk_acknowledged(self, risk_acknowledged: bool) -> Self {
        Self {
            risk_acknowledged,
            ..self
        }
    }

    pub fn with_allow_degrade_to_mock(self, allow_degrade_to_mock: bool) -> Self {
        Self {
            allow_degrade_to_mock,
            ..self
        }
    }

    /// Implements the selection rule from `spec.md` §4.6: mock flag always
    /// wins; otherwise real environment + healthy live executor wins;
    /// otherwise degrade to mock only if permitted, else this returns
    /// `false` and the caller must fail rather than execute.
    pub fn should_use_mock(&self, live_executor_healthy: bool) -> ExecutorChoice {
        if self.force_mock {
            return ExecutorChoice::Mock;
        }
        match self.environment {
            Environment::Mock => ExecutorChoice::Mock,
            Environment::Real if live_executor_healthy => ExecutorChoice::Live,
            Environment::Real if self.allow_degrade_to_mock => ExecutorChoice::Mock,
            Environment::Real => ExecutorChoice::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorChoice {
    Mock,
    Live,
    Unavailable,
}
