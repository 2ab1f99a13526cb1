use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{impl_from_primitive, error::{PipelineResult, ValidationError}};

/// Identifies one campaign of episodes sharing a base directory, rendered
/// as `run_<YYYYMMDD_HHMMSS>` (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);
impl_from_primitive!(RunId, String);

impl RunId {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self(format!("run_{}", started_at.format("%Y%m%d_%H%M%S")))
    }
}

/// Identifies one episode within a run, rendered as `ep_<YYYYMMDD_HHMMSS>_<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub String);
impl_from_primitive!(EpisodeId, String);

impl EpisodeId {
    pub fn new(run_started_at: DateTime<Utc>, index: usize) -> Self {
        Self(format!("ep_{}_{}", run_started_at.format("%Y%m%d_%H%M%S"), index))
    }
}

/// A CLMM pool address. Newtype, not a raw `String`, so call sites cannot
/// confuse it with a pair symbol or an arbitrary identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Pool(pub String);
impl_from_primitive!(Pool, String);

impl Pool {
    /// A pool address is well-formed if it is a `0x`-prefixed 40 hex-digit
    /// string. The validator (`spec.md` §4.7) rejects anything else.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 42
            && self.0.starts_with("0x")
            && self.0[2..].chars().all(|c| c.is_ascii_hexdigit())
    }
}

/// A trading pair, e.g. `"ETH/USDC"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub struct Pair(pub String);
impl_from_primitive!(Pair, String);

/// The chain/network a pool lives on. The validator only recognizes the
/// enumerated members; anything else is `ValidationError::UnknownNetwork`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Ethereum,
    Arbitrum,
    Base,
    Optimism,
}

/// Execution mode a harness runs under. Closed set, never stringly-typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    Mock,
    Real,
}

/// Labeled market state driving mock tick-path generation and agent policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    #[default]
    MeanRevert,
    Trend,
    Jumpy,
}

/// Terminal status of an episode result. Mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Success,
    Failed,
    Skipped,
}

/// A pool configuration proposal's numeric parameter bundle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolParams {
    pub range_width_bps: f64,
    pub refresh_interval_seconds: u64,
    pub spread_bps: f64,
    pub order_size: f64,
    pub rebalance_threshold_bps: f64,
    pub max_position: f64,
}

impl PoolParams {
    /// Enforces the hard bounds from `spec.md` §4.7: no NaN/null, and
    /// every field within its documented range. Bounds are deliberately
    /// generous placeholders for a research harness, not production risk
    /// limits — real limits are an operator/config concern.
    pub fn validate(&self) -> PipelineResult<()> {
        let checks: [(&str, f64, f64, f64); 6] = [
            ("range_width_bps", self.range_width_bps, 1.0, 5_000.0),
            ("refresh_interval_seconds", self.refresh_interval_seconds as f64, 1.0, 86_400.0),
            ("spread_bps", self.spread_bps, 0.0, 1_000.0),
            ("order_size", self.order_size, 0.0, 1e12),
            ("rebalance_threshold_bps", self.rebalance_threshold_bps, 0.0, 5_000.0),
            ("max_position", self.max_position, 0.0, 1e12),
        ];

        for (field, value, min, max) in checks {
            if value.is_nan() {
                return Err(ValidationError::NotANumber(field.to_string()).into());
            }
            if value < min || value > max {
                return Err(ValidationError::OutOfBounds {
                    field: field.to_string(),
                    value,
                    min,
                    max,
                }
                .into());
            }
        }
        Ok(())
    }
}
