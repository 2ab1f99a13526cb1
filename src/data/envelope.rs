use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Freshness classification of a cached value relative to its TTL and
/// max-age (`spec.md` §4.3). `Missing` is not an error; it is a plain
/// quality tag that accessors return alongside an empty/default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Fresh,
    Stale,
    TooOld,
    Missing,
}

/// The wrapper QualityKV stores alongside cached data, per `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEnvelope {
    pub ok: bool,
    pub data: serde_json::Value,
    pub fetched_at: Option<DateTime<Utc>>,
    pub ttl_seconds: i64,
    pub max_age_seconds: i64,
    pub error: String,
    pub source: String,
}

impl CacheEnvelope {
    pub fn success(data: serde_json::Value, fetched_at: DateTime<Utc>, ttl_seconds: i64, max_age_seconds: i64, source: impl Into<String>) -> Self {
        Self {
            ok: true,
            data,
            fetched_at: Some(fetched_at),
            ttl_seconds,
            max_age_seconds,
            error: String::new(),
            source: source.into(),
        }
    }

    pub fn failure(error: impl Into<String>, ttl_seconds: i64, max_age_seconds: i64, source: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: serde_json::Value::Null,
            fetched_at: None,
            ttl_seconds,
            max_age_seconds,
            error: error.into(),
            source: source.into(),
        }
    }

    /// Implements the freshness computation from `spec.md` §4.3:
    /// absent/`ok=false` is `Missing`; within TTL is `Fresh`; between TTL
    /// and max-age is `Stale`; beyond max-age is `TooOld`.
    pub fn quality_at(&self, now: DateTime<Utc>) -> (Quality, Option<i64>) {
        let Some(fetched_at) = self.fetched_at.filter(|_| self.ok) else {
            return (Quality::Missing, None);
        };
        let age = (now - fetched_at).num_seconds();
        let quality = if age <= self.ttl_seconds {
            Quality::Fresh
        } else if age <= self.max_age_seconds {
            Quality::Stale
        } else {
            Quality::TooOld
        };
        (quality, Some(age))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(seconds_ago: i64) -> CacheEnvelope {
        CacheEnvelope::success(
            serde_json::json!({"v": 1}),
            Utc::now() - Duration::seconds(seconds_ago),
            300,
            3_600,
            "test",
        )
    }

    #[test]
    fn fresh_within_ttl() {
        let (q, age) = at(10).quality_at(Utc::now());
        assert_eq!(q, Quality::Fresh);
        assert!(age.unwrap() >= 9);
    }

    #[test]
    fn stale_between_ttl_and_max_age() {
        let (q, _) = at(1_000).quality_at(Utc::now());
        assert_eq!(q, Quality::Stale);
    }

    #[test]
    fn too_old_beyond_max_age() {
        let (q, _) = at(10_000).quality_at(Utc::now());
        assert_eq!(q, Quality::TooOld);
    }

    #[test]
    fn missing_when_not_ok() {
        let env = CacheEnvelope::failure("backend down", 300, 3_600, "test");
        let (q, age) = env.quality_at(Utc::now());
        assert_eq!(q, Quality::Missing);
        assert!(age.is_none());
    }
}
