use super::ArgRef;
use crate::{error::DeployError, ledger::Ledger, network::ActiveNetworks, value::ArgValue};

/// Resolve argument references against the ledger and the active network tables.
///
/// `on_missing` builds the error for a component reference with no deployed address.
pub fn resolve_args(
    args: &[ArgRef],
    ledger: &Ledger,
    networks: &ActiveNetworks,
    on_missing: impl Fn(&str) -> DeployError,
) -> Result<Vec<ArgValue>, DeployError> {
    args.iter()
        .map(|arg| resolve_one(arg, ledger, networks, &on_missing))
        .collect()
}

fn resolve_one(
    arg: &ArgRef,
    ledger: &Ledger,
    networks: &ActiveNetworks,
    on_missing: &impl Fn(&str) -> DeployError,
) -> Result<ArgValue, DeployError> {
    match arg {
        ArgRef::Component(name) => ledger
            .deployed_address(name)
            .map(ArgValue::Address)
            .ok_or_else(|| on_missing(name)),
        ArgRef::Config(key) => networks.value(*key),
        ArgRef::Literal(value) => Ok(value.clone()),
        ArgRef::Concat(parts) => {
            let mut addresses = Vec::new();
            for part in parts {
                match resolve_one(part, ledger, networks, on_missing)? {
                    ArgValue::Address(address) => addresses.push(address),
                    ArgValue::AddressArray(list) => addresses.extend(list),
                    other => {
                        return Err(DeployError::PlanIntegrity(format!(
                            "cannot concatenate a {} into an address list",
                            other.sol_type()
                        )));
                    }
                }
            }
            Ok(ArgValue::AddressArray(addresses))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::ConfigKey,
        plan::{ComponentSpec, DeploymentPlan},
        submitter::TxRef,
    };
    use alloy_core::primitives::{Address, U256};

    fn unresolved(name: &str) -> DeployError {
        DeployError::UnresolvedDependency {
            component: "Test".to_string(),
            dependency: name.to_string(),
        }
    }

    fn ledger_with_velo(address: Address) -> Ledger {
        let plan = DeploymentPlan::new(vec![
            ComponentSpec::new("Velo"),
            ComponentSpec::new("Voter"),
        ])
        .expect("valid plan");
        let mut ledger = Ledger::in_memory();
        ledger.prepare(&plan).expect("prepare");
        ledger
            .record_deployed("Velo", address, TxRef::default())
            .expect("deploy");
        ledger
    }

    #[test]
    fn test_resolve_component_and_literal() {
        let velo = Address::repeat_byte(0x11);
        let ledger = ledger_with_velo(velo);
        let networks = ActiveNetworks::select("optimism", false).expect("registered");

        let args = resolve_args(
            &[
                ArgRef::component("Velo"),
                ArgRef::Literal(ArgValue::Uint(U256::from(7))),
            ],
            &ledger,
            &networks,
            unresolved,
        )
        .expect("resolvable");

        assert_eq!(
            args,
            vec![ArgValue::Address(velo), ArgValue::Uint(U256::from(7))]
        );
    }

    #[test]
    fn test_resolve_missing_component() {
        let ledger = ledger_with_velo(Address::repeat_byte(0x11));
        let networks = ActiveNetworks::select("optimism", false).expect("registered");

        let err = resolve_args(&[ArgRef::component("Voter")], &ledger, &networks, unresolved)
            .unwrap_err();
        assert!(
            matches!(err, DeployError::UnresolvedDependency { ref dependency, .. } if dependency == "Voter")
        );
    }

    #[test]
    fn test_resolve_concat() {
        let velo = Address::repeat_byte(0x11);
        let ledger = ledger_with_velo(velo);
        let networks = ActiveNetworks::select("optimism", true).expect("registered");

        let args = resolve_args(
            &[ArgRef::Concat(vec![
                ArgRef::component("Velo"),
                ArgRef::Config(ConfigKey::TokenWhitelist),
            ])],
            &ledger,
            &networks,
            unresolved,
        )
        .expect("resolvable");

        let ArgValue::AddressArray(list) = &args[0] else {
            panic!("expected an address list, got {:?}", args[0]);
        };
        assert_eq!(list[0], velo);
        assert_eq!(list.len(), 1 + networks.primary.token_whitelist.len());
    }

    #[test]
    fn test_resolve_concat_rejects_numbers() {
        let ledger = ledger_with_velo(Address::repeat_byte(0x11));
        let networks = ActiveNetworks::select("optimism", true).expect("registered");

        let err = resolve_args(
            &[ArgRef::Concat(vec![ArgRef::Config(ConfigKey::PartnerMax)])],
            &ledger,
            &networks,
            unresolved,
        )
        .unwrap_err();
        assert!(matches!(err, DeployError::PlanIntegrity(_)));
    }
}
