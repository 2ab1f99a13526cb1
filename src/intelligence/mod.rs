use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::{
    cache::QualityKv,
    data::{
        domain::{Pair, Pool},
        envelope::Quality,
        episode::{IntelHygiene, IntelSnapshot, IntelSnapshotEntry},
        registry::{nearest_smaller_label, Registry, HOUR_WINDOWS, MINUTE_WINDOWS},
    },
    error::PipelineResult,
    scheduler::trigger::{Trigger, TriggerLog},
};

/// Builds the canonical query key `method(param=value, …)` an accessor
/// both reads from and records into the snapshot under. Timestamps never
/// appear in keys (`spec.md` §4.3).
fn canonical_key(method: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return format!("{method}()");
    }
    let joined = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{method}({joined})")
}

/// Cache-first facade used synchronously by the agent and harness
/// (`spec.md` §4.3). Every access appends to an in-instance snapshot; it
/// MUST NOT initiate a network call — a miss is reported as
/// `Quality::Missing` and optionally logged as a refresh trigger for the
/// Scheduler to pick up on its next tick.
pub struct Intelligence {
    kv: Arc<QualityKv>,
    registry: Arc<Registry>,
    trigger_log: Option<Arc<TriggerLog>>,
    snapshot: Mutex<IntelSnapshot>,
}

impl Intelligence {
    pub fn new(kv: Arc<QualityKv>, registry: Arc<Registry>) -> Self {
        Self {
            kv,
            registry,
            trigger_log: None,
            snapshot: Mutex::new(IntelSnapshot::default()),
        }
    }

    pub fn with_trigger_log(mut self, trigger_log: Arc<TriggerLog>) -> Self {
        self.trigger_log = Some(trigger_log);
        self
    }

    fn record(&self, method: &str, key: String, quality: Quality, age_seconds: Option<i64>, fetched_at: Option<chrono::DateTime<Utc>>) {
        if matches!(quality, Quality::Missing | Quality::TooOld) {
            if let Some(log) = &self.trigger_log {
                let _ = log.append(&Trigger::new(format!("cache_{method}_cold"), None, None));
            }
        }
        self.snapshot.lock().expect("Intelligence snapshot lock poisoned").0.insert(
            key,
            IntelSnapshotEntry {
                quality,
                age_seconds,
                asof_timestamp: fetched_at,
            },
        );
    }

    fn read(&self, method: &str, key: String) -> (serde_json::Value, Quality) {
        let descriptor = self.registry.get(method);
        let now = Utc::now();
        let (data, quality, age) = match &descriptor {
            Ok(_) => self.kv.get_with_quality(&key, serde_json::Value::Null, now),
            Err(_) => (serde_json::Value::Null, Quality::Missing, None),
        };
        let fetched_at = self.kv.get(&key).and_then(|e| e.fetched_at);
        self.record(method, key, quality, age, fetched_at);
        (data, quality)
    }

    pub fn get_volatility(&self, pair: &Pair, window_minutes: i64) -> (serde_json::Value, Quality) {
        let window = nearest_smaller_label(MINUTE_WINDOWS, window_minutes);
        let key = canonical_key("volatility", &[("pair", &pair.0), ("window", window)]);
        self.read("volatility", key)
    }

    /// `pair` is accepted for symmetry with `spec.md` §4.3's accessor
    /// signature but is not part of the cache key: a pool has exactly
    /// one canonical pair, so the key only needs `(pool, window)`.
    pub fn get_pool_health(&self, pool: &Pool, _pair: &Pair, window_minutes: i64) -> (serde_json::Value, Quality) {
        let window = nearest_smaller_label(MINUTE_WINDOWS, window_minutes);
        let key = canonical_key("pool_health", &[("pool", &pool.0), ("window", window)]);
        self.read("pool_health", key)
    }

    pub fn get_liquidity_heatmap(&self, pool: &Pool) -> (serde_json::Value, Quality) {
        let key = canonical_key("liquidity_heatmap", &[("pool", &pool.0)]);
        self.read("liquidity_heatmap", key)
    }

    pub fn get_gas_regime(&self) -> (serde_json::Value, Quality) {
        let key = canonical_key("gas_regime", &[]);
        self.read("gas_regime", key)
    }

    pub fn get_mev_risk(&self, pool: &Pool) -> (serde_json::Value, Quality) {
        let key = canonical_key("mev_risk", &[("pool", &pool.0)]);
        self.read("mev_risk", key)
    }

    pub fn get_whale_sentiment(&self, pair: &Pair) -> (serde_json::Value, Quality) {
        let key = canonical_key("whale_sentiment", &[("pair", &pair.0)]);
        self.read("whale_sentiment", key)
    }

    pub fn get_pool_health_score(&self, pool: &Pool) -> (serde_json::Value, Quality) {
        let key = canonical_key("pool_health_score", &[("pool", &pool.0)]);
        self.read("pool_health_score", key)
    }

    pub fn get_range_hint(&self, pool: &Pool) -> (serde_json::Value, Quality) {
        let key = canonical_key("range_hint", &[("pool", &pool.0)]);
        self.read("range_hint", key)
    }

    pub fn get_dynamic_config(&self) -> (serde_json::Value, Quality) {
        let key = canonical_key("dynamic_config", &[]);
        self.read("dynamic_config", key)
    }

    /// Converts an hour-denominated lookback into the enumerated window
    /// vocabulary, for accessors whose callers think in hours rather
    /// than minutes.
    pub fn hour_window_label(hours: i64) -> &'static str {
        nearest_smaller_label(HOUR_WINDOWS, hours)
    }

    /// Consumes the in-instance snapshot, returning it alongside the
    /// derived hygiene summary. Callers do this exactly once, after the
    /// harness's decision step, then write both into `metadata.extra`.
    pub fn extract_snapshot(self) -> (IntelSnapshot, IntelHygiene) {
        let snapshot = self.snapshot.into_inner().expect("Intelligence snapshot lock poisoned");
        let hygiene = IntelHygiene::from_snapshot(&snapshot);
        (snapshot, hygiene)
    }
}

pub fn ensure_registry_covers_accessors(registry: &Registry) -> PipelineResult<()> {
    for method in [
        "volatility",
        "pool_health",
        "liquidity_heatmap",
        "gas_regime",
        "mev_risk",
        "whale_sentiment",
        "pool_health_score",
        "range_hint",
        "dynamic_config",
    ] {
        registry.get(method)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::envelope::CacheEnvelope;

    fn intel_over(kv: QualityKv) -> Intelligence {
        Intelligence::new(Arc::new(kv), Arc::new(Registry::default_set()))
    }

    #[test]
    fn canonical_key_has_no_timestamp_and_sorted_by_call_order() {
        let key = canonical_key("pool_health", &[("pool", "0xabc"), ("window", "1h")]);
        assert_eq!(key, "pool_health(pool=0xabc, window=1h)");
    }

    #[test]
    fn cold_cache_reports_missing_for_every_accessor() {
        let dir = tempfile::tempdir().unwrap();
        let kv = QualityKv::open(dir.path().join("quality_kv.json")).unwrap();
        let intel = intel_over(kv);

        let pool = Pool("0x1111111111111111111111111111111111111111".into());
        let pair = Pair("ETH/USDC".into());

        let (_, q1) = intel.get_volatility(&pair, 60);
        let (_, q2) = intel.get_pool_health(&pool, &pair, 60);
        let (_, q3) = intel.get_liquidity_heatmap(&pool);
        let (_, q4) = intel.get_gas_regime();
        let (_, q5) = intel.get_mev_risk(&pool);
        let (_, q6) = intel.get_whale_sentiment(&pair);
        let (_, q7) = intel.get_pool_health_score(&pool);
        let (_, q8) = intel.get_range_hint(&pool);
        let (_, q9) = intel.get_dynamic_config();

        for q in [q1, q2, q3, q4, q5, q6, q7, q8, q9] {
            assert_eq!(q, Quality::Missing);
        }

        let (_, hygiene) = intel.extract_snapshot();
        assert_eq!(hygiene.total_queries, 9);
        assert_eq!(hygiene.missing_or_too_old_count, 9);
    }

    #[test]
    fn warm_entry_is_reported_fresh_and_snapshot_fixed_after_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let kv = QualityKv::open(dir.path().join("quality_kv.json")).unwrap();
        let pool = Pool("0x1111111111111111111111111111111111111111".into());
        let pair = Pair("ETH/USDC".into());
        let key = canonical_key("pool_health", &[("pool", &pool.0), ("window", "1h")]);
        kv.set(key, CacheEnvelope::success(serde_json::json!({"score": 0.9}), Utc::now(), 120, 1_800, "mock"))
            .unwrap();

        let intel = intel_over(kv);
        let (_, quality) = intel.get_pool_health(&pool, &pair, 60);
        assert_eq!(quality, Quality::Fresh);

        let (snapshot, hygiene) = intel.extract_snapshot();
        assert_eq!(hygiene.fresh_count, 1);
        assert_eq!(snapshot.0.len(), 1);
    }
}
