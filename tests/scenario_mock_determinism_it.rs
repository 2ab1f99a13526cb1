mod common;

use std::sync::Arc;

use clmm_episode_pipeline::prelude::*;
use common::{default_params, IntelQueryingAgent};

/// Scenario 1 (`SPEC_FULL.md` §8): `seed=12345`, one episode, mock mode,
/// force_mock. A cold cache means every accessor reports
/// `missing_or_too_old`; the episode still completes successfully.
#[tokio::test]
async fn mock_determinism_produces_complete_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path()).with_seed(12_345).with_force_mock(true);
    let kv = Arc::new(QualityKv::open(dir.path().join("kv.json")).unwrap());

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(IntelQueryingAgent::new(default_params(), Regime::MeanRevert)),
        Arc::new(clmm_episode_pipeline::harness::MockExecutor::new()),
        kv,
        Arc::new(Registry::default_set()),
        Network::Ethereum,
    );

    let pool = Pool("0x1111111111111111111111111111111111111111".into());
    let pair = Pair("ETH/USDC".into());
    let succeeded = orchestrator.run_campaign(1, pool, pair).await.unwrap();
    assert_eq!(succeeded, 1);

    let run_dir = std::fs::read_dir(dir.path())
        .unwrap()
        .find_map(|e| e.ok())
        .expect("run directory created");
    let episode_dir = std::fs::read_dir(run_dir.path())
        .unwrap()
        .find_map(|e| e.ok())
        .expect("episode directory created");

    assert!(episode_dir.path().join("proposal.json").is_file());
    assert!(episode_dir.path().join("metadata.json").is_file());
    assert!(episode_dir.path().join("result.json").is_file());
    assert!(!episode_dir.path().join("failure.json").is_file());

    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(episode_dir.path().join("result.json")).unwrap())
            .unwrap();
    assert_eq!(result["status"], "success");

    let metadata: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(episode_dir.path().join("metadata.json")).unwrap())
            .unwrap();
    let hygiene = &metadata["extra"]["intel_hygiene"];
    assert_eq!(hygiene["total_queries"], 9);
    assert_eq!(hygiene["missing_or_too_old_count"], 9);
    assert_eq!(hygiene["fresh_count"], 0);
}
