//! The Velodrome protocol release: fourteen components and the calls that wire them.

use super::{ArgRef, ComponentSpec, DeploymentPlan, WiringPlan, WiringStep};
use crate::{error::DeployError, network::ConfigKey};

/// Components in creation order.
pub fn deployment_plan() -> Result<DeploymentPlan, DeployError> {
    DeploymentPlan::new(vec![
        ComponentSpec::new("Velo"),
        ComponentSpec::new("GaugeFactory"),
        ComponentSpec::new("BribeFactory"),
        ComponentSpec::new("PairFactory"),
        ComponentSpec::new("Router")
            .component("PairFactory")
            .config(ConfigKey::Weth),
        ComponentSpec::new("VelodromeLibrary").component("Router"),
        ComponentSpec::new("VeArtProxy"),
        ComponentSpec::new("VotingEscrow")
            .component("Velo")
            .component("VeArtProxy"),
        ComponentSpec::new("RewardsDistributor").component("VotingEscrow"),
        ComponentSpec::new("Voter")
            .component("VotingEscrow")
            .component("PairFactory")
            .component("GaugeFactory")
            .component("BribeFactory"),
        ComponentSpec::new("Minter")
            .component("Voter")
            .component("VotingEscrow")
            .component("RewardsDistributor"),
        ComponentSpec::new("RedemptionReceiver")
            .config(ConfigKey::Usdc)
            .component("Velo")
            .config(ConfigKey::CounterpartLzChainId)
            .config(ConfigKey::LzEndpoint),
        ComponentSpec::new("VeloGovernor").component("VotingEscrow"),
        ComponentSpec::new("MerkleClaim")
            .component("Velo")
            .config(ConfigKey::MerkleRoot),
    ])
}

/// Post-creation calls, applied in order after every component is deployed.
pub fn wiring_plan() -> Result<WiringPlan, DeployError> {
    WiringPlan::new(vec![
        WiringStep::new("Velo", "initialMint").config(ConfigKey::TeamEoa),
        WiringStep::new("Velo", "setRedemptionReceiver").component("RedemptionReceiver"),
        WiringStep::new("Velo", "setMerkleClaim").component("MerkleClaim"),
        WiringStep::new("Velo", "setMinter").component("Minter"),
        WiringStep::new("PairFactory", "setPauser").config(ConfigKey::TeamMultisig),
        WiringStep::new("VotingEscrow", "setVoter").component("Voter"),
        WiringStep::new("VotingEscrow", "setTeam").config(ConfigKey::TeamMultisig),
        WiringStep::new("Voter", "setGovernor").config(ConfigKey::TeamMultisig),
        WiringStep::new("Voter", "setEmergencyCouncil").config(ConfigKey::TeamMultisig),
        WiringStep::new("RewardsDistributor", "setDepositor").component("Minter"),
        WiringStep::new("RedemptionReceiver", "setTeam").config(ConfigKey::TeamMultisig),
        WiringStep::new("VeloGovernor", "setTeam").config(ConfigKey::TeamMultisig),
        // Voter whitelists Velo alongside the network's token list.
        WiringStep::new("Voter", "initialize")
            .arg(ArgRef::Concat(vec![
                ArgRef::component("Velo"),
                ArgRef::Config(ConfigKey::TokenWhitelist),
            ]))
            .component("Minter"),
        WiringStep::new("Minter", "initialize")
            .config(ConfigKey::PartnerAddrs)
            .config(ConfigKey::PartnerAmts)
            .config(ConfigKey::PartnerMax),
        WiringStep::new("Minter", "setTeam").config(ConfigKey::TeamMultisig),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plans_are_consistent() {
        let plan = deployment_plan().expect("valid plan");
        let wiring = wiring_plan().expect("valid wiring");

        assert_eq!(plan.len(), 14);
        assert_eq!(wiring.len(), 15);
        wiring.check_against(&plan).expect("wiring targets the plan");

        let first = &plan.components()[0];
        assert_eq!(first.name, "Velo");
        assert!(first.args.is_empty());
        assert_eq!(plan.components()[13].name, "MerkleClaim");
    }

    #[test]
    fn test_minter_setup_is_last() {
        let wiring = wiring_plan().expect("valid wiring");
        let ids: Vec<&str> = wiring.steps().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            &ids[ids.len() - 3..],
            &["Voter.initialize", "Minter.initialize", "Minter.setTeam"]
        );
    }

    #[test]
    fn test_sorting_keeps_release_order() {
        let plan = deployment_plan().expect("valid plan");
        let sorted =
            DeploymentPlan::sorted(plan.components().to_vec()).expect("standard plan is acyclic");
        assert_eq!(sorted, plan);
    }
}
