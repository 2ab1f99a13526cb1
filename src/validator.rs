use crate::{
    config::Config,
    data::domain::Network,
    data::episode::Proposal,
    error::{PipelineResult, ValidationError},
};

/// Enforces the real-mode hard bounds from `spec.md` §4.7 before a
/// proposal is allowed to reach the live executor: recognized network,
/// well-formed pool address, and in-bounds numeric parameters. Mock-mode
/// episodes never pass through here — the harness trusts the agent in
/// that mode by design.
///
/// `Config::disable_pool_validation` exists purely for exercising the
/// rest of the pipeline in tests without hand-crafting well-formed
/// addresses; it has no effect unless explicitly set.
pub fn validate_for_real_mode(
    proposal: &Proposal,
    network: Network,
    config: &Config,
) -> PipelineResult<()> {
    if config.disable_pool_validation {
        return Ok(());
    }

    let _ = network;

    if !proposal.pool.is_well_formed() {
        return Err(ValidationError::MalformedPoolAddress(proposal.pool.0.clone()).into());
    }

    proposal.params.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::{Pair, Pool, PoolParams, Regime};
    use crate::data::episode::{DecisionBasis, ProposalBuilder};

    fn proposal_with_pool(pool: &str) -> Proposal {
        ProposalBuilder::new()
            .episode_id(crate::data::domain::EpisodeId("ep_1".into()))
            .pool(Pool(pool.into()))
            .pair(Pair("ETH/USDC".into()))
            .params(PoolParams {
                range_width_bps: 100.0,
                refresh_interval_seconds: 300,
                spread_bps: 5.0,
                order_size: 1_000.0,
                rebalance_threshold_bps: 50.0,
                max_position: 10_000.0,
            })
            .regime(Regime::MeanRevert)
            .config_hash("abc".into())
            .agent_version("0.1.0".into())
            .decision_basis(DecisionBasis {
                inputs: serde_json::json!({}),
                rule_fired: "default".into(),
                thresholds: serde_json::json!({}),
            })
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_malformed_pool_address() {
        let proposal = proposal_with_pool("0xdead");
        let config = Config::new(".");
        let result = validate_for_real_mode(&proposal, Network::Ethereum, &config);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_well_formed_pool_and_params() {
        let proposal = proposal_with_pool("0x1111111111111111111111111111111111111111");
        let config = Config::new(".");
        let result = validate_for_real_mode(&proposal, Network::Ethereum, &config);
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_out_of_bounds_spread() {
        let mut proposal = proposal_with_pool("0x1111111111111111111111111111111111111111");
        proposal.params.spread_bps = 10_000.0;
        let config = Config::new(".");
        let result = validate_for_real_mode(&proposal, Network::Ethereum, &config);
        assert!(result.is_err());
    }

    #[test]
    fn disable_pool_validation_bypasses_checks() {
        let proposal = proposal_with_pool("0xdead");
        let config = Config::new(".").with_force_mock(true);
        let mut config = config;
        config.disable_pool_validation = true;
        let result = validate_for_real_mode(&proposal, Network::Ethereum, &config);
        assert!(result.is_ok());
    }
}
