use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{PipelineResult, SystemError};

/// Refresh priority class; `P0` is processed before `P1`, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

/// What a query is scoped over, and therefore how many items it expands
/// into during plan enumeration (`spec.md` §4.5 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Pool,
    Pair,
    Windowed,
    /// Pool-scoped, further split per minute window (the only accessor
    /// with this shape is `pool_health(pool, pair, window)` — the pair
    /// is accepted for API symmetry with its accessor signature but is
    /// not part of the cache key, since a pool has exactly one pair).
    PoolWindowed,
}

/// Relative expense of invoking the analytics backend for this query;
/// used for tie-breaking and for the per-tick expensive-query budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CostClass {
    Cheap,
    Medium,
    Expensive,
}

/// A static catalog entry describing one external analytics query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub method_name: &'static str,
    pub priority: Priority,
    pub scope: Scope,
    pub cost_class: CostClass,
    /// Other method names this query depends on (informational; the
    /// Scheduler does not currently sequence on this, but a worker MAY
    /// consult it to avoid querying a dependency that's already `missing`).
    pub depends_on: &'static [&'static str],
    pub ttl_seconds: i64,
    pub max_age_seconds: i64,
    pub default_enabled: bool,
}

/// The enumerated window vocabulary. Minute-based windows map onto these
/// three labels with ties broken by nearest-smaller, per `spec.md` §4.3
/// and the explicit resolution of the matching Open Question in §9.
pub const MINUTE_WINDOWS: &[(&str, i64)] = &[("1h", 60), ("6h", 360), ("24h", 1_440)];
pub const HOUR_WINDOWS: &[(&str, i64)] = &[("1h", 1), ("6h", 6), ("24h", 24)];

/// Nearest-smaller lookup: the largest window label whose bound is `<=
/// value`, or the smallest label if `value` undercuts everything.
pub fn nearest_smaller_label(table: &[(&str, i64)], value: i64) -> &'static str {
    table
        .iter()
        .rev()
        .find(|(_, bound)| *bound <= value)
        .or_else(|| table.first())
        .map(|(label, _)| *label)
        .unwrap_or("1h")
}

/// Read-only catalog of every query the Intelligence/Scheduler subsystems
/// know about. Built once at startup; never mutated at runtime
/// (`spec.md` §3 invariant: "Registry is read-only at runtime").
#[derive(Debug, Clone)]
pub struct Registry {
    entries: Vec<QueryDescriptor>,
}

impl Registry {
    /// The nine accessors from `spec.md` §4.3, each with documented
    /// defaults. `get_dynamic_config` and `get_gas_regime` are process-wide
    /// (`Global`); pool-/pair-/window-scoped queries multiply out per the
    /// active scope during plan enumeration.
    pub fn default_set() -> Self {
        Self {
            entries: vec![
                QueryDescriptor {
                    method_name: "volatility",
                    priority: Priority::P1,
                    scope: Scope::Windowed,
                    cost_class: CostClass::Medium,
                    depends_on: &[],
                    ttl_seconds: 300,
                    max_age_seconds: 3_600,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "pool_health",
                    priority: Priority::P0,
                    scope: Scope::PoolWindowed,
                    cost_class: CostClass::Medium,
                    depends_on: &[],
                    ttl_seconds: 120,
                    max_age_seconds: 1_800,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "liquidity_heatmap",
                    priority: Priority::P1,
                    scope: Scope::Pool,
                    cost_class: CostClass::Expensive,
                    depends_on: &[],
                    ttl_seconds: 600,
                    max_age_seconds: 7_200,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "gas_regime",
                    priority: Priority::P0,
                    scope: Scope::Global,
                    cost_class: CostClass::Cheap,
                    depends_on: &[],
                    ttl_seconds: 60,
                    max_age_seconds: 900,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "mev_risk",
                    priority: Priority::P2,
                    scope: Scope::Pool,
                    cost_class: CostClass::Medium,
                    depends_on: &["pool_health"],
                    ttl_seconds: 300,
                    max_age_seconds: 3_600,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "whale_sentiment",
                    priority: Priority::P2,
                    scope: Scope::Pair,
                    cost_class: CostClass::Expensive,
                    depends_on: &[],
                    ttl_seconds: 900,
                    max_age_seconds: 10_800,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "pool_health_score",
                    priority: Priority::P1,
                    scope: Scope::Pool,
                    cost_class: CostClass::Cheap,
                    depends_on: &["pool_health"],
                    ttl_seconds: 120,
                    max_age_seconds: 1_800,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "range_hint",
                    priority: Priority::P1,
                    scope: Scope::Pool,
                    cost_class: CostClass::Medium,
                    depends_on: &["liquidity_heatmap", "volatility"],
                    ttl_seconds: 300,
                    max_age_seconds: 3_600,
                    default_enabled: true,
                },
                QueryDescriptor {
                    method_name: "dynamic_config",
                    priority: Priority::P3,
                    scope: Scope::Global,
                    cost_class: CostClass::Cheap,
                    depends_on: &[],
                    ttl_seconds: 1_800,
                    max_age_seconds: 86_400,
                    default_enabled: true,
                },
            ],
        }
    }

    pub fn entries(&self) -> &[QueryDescriptor] {
        &self.entries
    }

    pub fn enabled_entries(&self) -> impl Iterator<Item = &QueryDescriptor> {
        self.entries.iter().filter(|e| e.default_enabled)
    }

    pub fn get(&self, method_name: &str) -> PipelineResult<&QueryDescriptor> {
        self.entries
            .iter()
            .find(|e| e.method_name == method_name)
            .ok_or_else(|| SystemError::UnknownQuery(method_name.to_string()).into())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::default_set()
    }
}
