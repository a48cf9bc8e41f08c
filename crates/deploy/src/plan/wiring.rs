//! Post-creation wiring steps.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{ArgRef, DeploymentPlan};
use crate::{error::DeployError, network::ConfigKey};

/// A call on a deployed component that connects it to the rest of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringStep {
    /// Unique identifier, `"{target}.{operation}"` unless set explicitly.
    pub id: String,
    /// Component the call is sent to.
    pub target: String,
    /// Function name on the target.
    pub operation: String,
    /// Call arguments, in ABI order.
    pub args: Vec<ArgRef>,
}

impl WiringStep {
    pub fn new(target: impl Into<String>, operation: impl Into<String>) -> Self {
        let target = target.into();
        let operation = operation.into();
        Self {
            id: format!("{target}.{operation}"),
            target,
            operation,
            args: Vec::new(),
        }
    }

    /// Override the step identifier, needed when the same call is made twice.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn arg(mut self, arg: ArgRef) -> Self {
        self.args.push(arg);
        self
    }

    pub fn component(self, name: impl Into<String>) -> Self {
        self.arg(ArgRef::component(name))
    }

    pub fn config(self, key: ConfigKey) -> Self {
        self.arg(ArgRef::Config(key))
    }

    /// Every component this step touches: the target first, then argument references.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.target.as_str()).chain(self.args.iter().flat_map(ArgRef::components))
    }
}

/// An ordered list of wiring steps, applied strictly in sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WiringPlan {
    steps: Vec<WiringStep>,
}

impl WiringPlan {
    pub fn new(steps: Vec<WiringStep>) -> Result<Self, DeployError> {
        let mut ids = HashSet::new();
        for step in &steps {
            if !ids.insert(step.id.as_str()) {
                return Err(DeployError::PlanIntegrity(format!(
                    "duplicate wiring step `{}`",
                    step.id
                )));
            }
        }
        Ok(Self { steps })
    }

    /// Check that every component a step touches is part of the deployment plan.
    pub fn check_against(&self, plan: &DeploymentPlan) -> Result<(), DeployError> {
        for step in &self.steps {
            if let Some(missing) = step.components().find(|name| !plan.contains(name)) {
                return Err(DeployError::PlanIntegrity(format!(
                    "wiring step `{}` references `{}` which is not part of the plan",
                    step.id, missing
                )));
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> &[WiringStep] {
        &self.steps
    }

    pub fn get(&self, id: &str) -> Option<&WiringStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ComponentSpec;

    #[test]
    fn test_step_default_id() {
        let step = WiringStep::new("Velo", "setMinter").component("Minter");
        assert_eq!(step.id, "Velo.setMinter");
        assert_eq!(step.components().collect::<Vec<_>>(), vec!["Velo", "Minter"]);
    }

    #[test]
    fn test_duplicate_step_ids() {
        let err = WiringPlan::new(vec![
            WiringStep::new("Velo", "setTeam"),
            WiringStep::new("Velo", "setTeam"),
        ])
        .unwrap_err();
        assert!(matches!(err, DeployError::PlanIntegrity(_)));

        let ok = WiringPlan::new(vec![
            WiringStep::new("Velo", "setTeam"),
            WiringStep::new("Velo", "setTeam").with_id("Velo.setTeam#2"),
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_check_against_plan() {
        let plan = DeploymentPlan::new(vec![ComponentSpec::new("Velo")]).expect("valid");

        let wiring = WiringPlan::new(vec![WiringStep::new("Velo", "setMinter").component("Minter")])
            .expect("unique ids");
        let err = wiring.check_against(&plan).unwrap_err();
        assert!(matches!(err, DeployError::PlanIntegrity(ref m) if m.contains("Minter")));

        let wiring = WiringPlan::new(vec![
            WiringStep::new("Velo", "initialMint").config(ConfigKey::TeamEoa),
        ])
        .expect("unique ids");
        assert!(wiring.check_against(&plan).is_ok());
    }
}
