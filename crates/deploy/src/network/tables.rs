//! Static constant tables, one function per network.

use alloy_core::primitives::{Address, U256, address};

use super::{NetworkConfig, NetworkId};

/// Whole tokens with 18 decimals.
fn tokens(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

const TEAM_EOA: Address = address!("27f4f5ccb8e2fec8d01b34fe5ca8e3a86c7a2be9");
const TEAM_MULTISIG: Address = address!("b32a0e8a4a6e7c1e3e6b8c2bc9aa2d64f6d0e42c");
const TEST_TEAM_EOA: Address = address!("8f3f2c7dda7d4ea31f1b0ab1c91ff43bce9d1a05");
const TEST_TEAM_MULTISIG: Address = address!("5c9e3d8e1a01c2bf0d6b8f1ae3e2c4c7d9a0b7f3");

/// Partner schedule shared by the production tables.
fn production_partners() -> (Vec<Address>, Vec<U256>, U256) {
    let addrs = vec![
        address!("4a9dc4d1ba3b5ea8f5c4e2b3d6c1f0e9a8b7c6d5"),
        address!("61ac2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c"),
        address!("7e3d2c1b0a9f8e7d6c5b4a3f2e1d0c9b8a7f6e5d"),
        address!("9b8a7c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b"),
    ];
    let amts = vec![tokens(4_000_000); addrs.len()];
    (addrs, amts, tokens(16_000_000))
}

/// Partner schedule shared by the test tables.
fn test_partners() -> (Vec<Address>, Vec<U256>, U256) {
    let addrs = vec![TEST_TEAM_EOA, TEST_TEAM_MULTISIG];
    let amts = vec![tokens(1_000), tokens(500)];
    (addrs, amts, tokens(2_000))
}

pub(super) fn optimism(production: bool) -> NetworkConfig {
    if production {
        let (partner_addrs, partner_amts, partner_max) = production_partners();
        NetworkConfig {
            network: NetworkId::Optimism,
            production,
            chain_id: 10,
            lz_chain_id: 111,
            lz_endpoint: address!("3c2269811836af69497e5f486a85d7316753cf62"),
            weth: address!("4200000000000000000000000000000000000006"),
            usdc: address!("7f5c764cbc14f9669b88837ca1490cca17c31607"),
            team_eoa: TEAM_EOA,
            team_multisig: TEAM_MULTISIG,
            merkle_root: "velo-airdrop-v1".to_string(),
            token_whitelist: vec![
                address!("4200000000000000000000000000000000000042"),
                address!("4200000000000000000000000000000000000006"),
                address!("7f5c764cbc14f9669b88837ca1490cca17c31607"),
                address!("da10009cbd5d07dd0cecc66161fc93d7c9000da1"),
                address!("8c6f28f2f1a3c87f0f938b96d27520d9751ec8d9"),
                address!("94b008aa00579c1307b0ef2c499ad98a8ce58e58"),
            ],
            partner_addrs,
            partner_amts,
            partner_max,
            counterpart: Some(NetworkId::Fantom),
        }
    } else {
        let (partner_addrs, partner_amts, partner_max) = test_partners();
        NetworkConfig {
            network: NetworkId::Optimism,
            production,
            chain_id: 420,
            lz_chain_id: 10132,
            lz_endpoint: address!("ae92d5ad7583ad66e49a0c67bad18f6ba52dddc1"),
            weth: address!("4200000000000000000000000000000000000006"),
            usdc: address!("3e22e37cb472c872b5de121134cfd1b57ef06560"),
            team_eoa: TEST_TEAM_EOA,
            team_multisig: TEST_TEAM_MULTISIG,
            merkle_root: "velo-airdrop-test".to_string(),
            token_whitelist: vec![address!("4200000000000000000000000000000000000006")],
            partner_addrs,
            partner_amts,
            partner_max,
            counterpart: Some(NetworkId::Fantom),
        }
    }
}

pub(super) fn avalanche(production: bool) -> NetworkConfig {
    if production {
        let (partner_addrs, partner_amts, partner_max) = production_partners();
        NetworkConfig {
            network: NetworkId::Avalanche,
            production,
            chain_id: 43114,
            lz_chain_id: 106,
            lz_endpoint: address!("3c2269811836af69497e5f486a85d7316753cf62"),
            weth: address!("b31f66aa3c1e785363f0875a1b74e27b85fd66c7"),
            usdc: address!("b97ef9ef8734c71904d8002f8b6bc66dd9c48a6e"),
            team_eoa: TEAM_EOA,
            team_multisig: TEAM_MULTISIG,
            merkle_root: "velo-airdrop-v1".to_string(),
            token_whitelist: vec![
                address!("b31f66aa3c1e785363f0875a1b74e27b85fd66c7"),
                address!("b97ef9ef8734c71904d8002f8b6bc66dd9c48a6e"),
                address!("9702230a8ea53601f5cd2dc00fdbc13d4df4a8c7"),
                address!("d586e7f844cea2f87f50152665bcbc2c279d8d70"),
            ],
            partner_addrs,
            partner_amts,
            partner_max,
            counterpart: Some(NetworkId::Fantom),
        }
    } else {
        let (partner_addrs, partner_amts, partner_max) = test_partners();
        NetworkConfig {
            network: NetworkId::Avalanche,
            production,
            chain_id: 43113,
            lz_chain_id: 10106,
            lz_endpoint: address!("93f54d755a063ce7bb9e6ac47eccc8e33411d706"),
            weth: address!("d00ae08403b9bbb9124bb305c09058e32c39a48c"),
            usdc: address!("5425890298aed601595a70ab815c96711a31bc65"),
            team_eoa: TEST_TEAM_EOA,
            team_multisig: TEST_TEAM_MULTISIG,
            merkle_root: "velo-airdrop-test".to_string(),
            token_whitelist: vec![address!("d00ae08403b9bbb9124bb305c09058e32c39a48c")],
            partner_addrs,
            partner_amts,
            partner_max,
            counterpart: Some(NetworkId::Fantom),
        }
    }
}

/// Fantom only acts as a counterpart, so its distribution fields stay empty.
pub(super) fn fantom(production: bool) -> NetworkConfig {
    let (chain_id, lz_chain_id, lz_endpoint, weth, usdc) = if production {
        (
            250,
            112,
            address!("b6319cc6c8c27a8f5daf0dd3df91ea35c4720dd7"),
            address!("21be370d5312f44cb42ce377bc9b8a0cef1a4c83"),
            address!("04068da6c83afcfa0e13ba15a6696662335d5b75"),
        )
    } else {
        (
            4002,
            10112,
            address!("7dcad72640f835b0fa36efd3d6d3ec902c7e5acf"),
            address!("f1277d1ed8ad466beddf92ef448a132661956621"),
            address!("8aad6b8d5ebc1d8c5fb5b2aa5febc1a61c3e6d27"),
        )
    };

    NetworkConfig {
        network: NetworkId::Fantom,
        production,
        chain_id,
        lz_chain_id,
        lz_endpoint,
        weth,
        usdc,
        team_eoa: if production { TEAM_EOA } else { TEST_TEAM_EOA },
        team_multisig: if production {
            TEAM_MULTISIG
        } else {
            TEST_TEAM_MULTISIG
        },
        merkle_root: String::new(),
        token_whitelist: Vec::new(),
        partner_addrs: Vec::new(),
        partner_amts: Vec::new(),
        partner_max: U256::ZERO,
        counterpart: None,
    }
}
