mod common;

use std::sync::Arc;

use clmm_episode_pipeline::prelude::*;
use common::{default_params, AlwaysFailingCaller, IntelQueryingAgent};
use tokio_util::sync::CancellationToken;

/// P2 (`SPEC_FULL.md` §8): `metadata.exec_mode` and `result.exec_mode`
/// agree for every successfully completed episode.
#[tokio::test]
async fn p2_mode_consistency_between_metadata_and_result() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path()).with_seed(7).with_force_mock(true);
    let kv = Arc::new(QualityKv::open(dir.path().join("kv.json")).unwrap());
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(IntelQueryingAgent::new(default_params(), Regime::Trend)),
        Arc::new(clmm_episode_pipeline::harness::MockExecutor::new()),
        kv,
        Arc::new(Registry::default_set()),
        Network::Ethereum,
    );

    orchestrator
        .run_campaign(1, Pool("0x1111111111111111111111111111111111111111".into()), Pair("ETH/USDC".into()))
        .await
        .unwrap();

    let run_dir = std::fs::read_dir(dir.path()).unwrap().find_map(|e| e.ok()).unwrap();
    let episode_dir = std::fs::read_dir(run_dir.path()).unwrap().find_map(|e| e.ok()).unwrap();

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(episode_dir.path().join("metadata.json")).unwrap()).unwrap();
    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(episode_dir.path().join("result.json")).unwrap()).unwrap();
    assert_eq!(metadata["exec_mode"], result["exec_mode"]);
}

/// P4 (`SPEC_FULL.md` §8): two sequential reads of the same key without
/// an intervening writer never see `age_seconds` decrease.
#[test]
fn p4_freshness_age_is_monotonic_without_an_intervening_writer() {
    let dir = tempfile::tempdir().unwrap();
    let kv = QualityKv::open(dir.path().join("kv.json")).unwrap();
    kv.set(
        "gas_regime()".into(),
        CacheEnvelope::success(serde_json::json!({"gwei": 20}), chrono::Utc::now(), 60, 900, "seed"),
    )
    .unwrap();

    let (_, _, age1) = kv.get_with_quality("gas_regime()", serde_json::Value::Null, chrono::Utc::now());
    std::thread::sleep(std::time::Duration::from_millis(20));
    let (_, _, age2) = kv.get_with_quality(
        "gas_regime()",
        serde_json::Value::Null,
        chrono::Utc::now() + chrono::Duration::milliseconds(20),
    );
    assert!(age2.unwrap() >= age1.unwrap());
}

/// L1 (`SPEC_FULL.md` §8): reading back the last-written envelope for a
/// key yields the same data modulo JSON canonicalization.
#[test]
fn l1_round_trips_the_last_written_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let kv = QualityKv::open(dir.path().join("kv.json")).unwrap();
    let data = serde_json::json!({"gwei": 42, "regime": "calm"});
    kv.set(
        "gas_regime()".into(),
        CacheEnvelope::success(data.clone(), chrono::Utc::now(), 60, 900, "seed"),
    )
    .unwrap();

    let reopened = QualityKv::open(dir.path().join("kv.json")).unwrap();
    let envelope = reopened.get("gas_regime()").unwrap();
    assert_eq!(envelope.data, data);
}

/// B2 (`SPEC_FULL.md` §8): a trigger referencing a pool the registry
/// never queries by itself contributes no jobs and the tick still
/// completes cleanly.
#[tokio::test]
async fn b2_trigger_for_an_unrelated_pool_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(QualityKv::open(dir.path().join("kv.json")).unwrap());
    let registry = Arc::new(Registry::default_set());
    let trigger_log = TriggerLog::new(dir.path().join("triggers.jsonl"));
    trigger_log
        .append(&Trigger::new("unknown_reason", Some(Pool("0xDEADBEEF".into())), None))
        .unwrap();

    let config = Config::new(dir.path());
    let scheduler = Scheduler::new(config, registry, kv, Arc::new(AlwaysFailingCaller), trigger_log);

    let dispatched = scheduler.tick(CancellationToken::new()).await.unwrap();
    assert!(dispatched > 0, "the two Global-scoped queries still run regardless of the trigger");
}
