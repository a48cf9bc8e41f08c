//! Declarative deployment plans.
//!
//! A plan is an ordered list of [`ComponentSpec`]s. Every component reference a spec makes
//! must point at a component earlier in the list, so processing the list front to back
//! always finds dependencies already deployed.

mod resolve;
pub mod standard;
mod wiring;

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

pub use resolve::resolve_args;
pub use wiring::{WiringPlan, WiringStep};

use crate::{error::DeployError, network::ConfigKey, value::ArgValue};

/// A reference to an argument value, resolved right before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgRef {
    /// The ledgered address of another component.
    Component(String),
    /// A value from the active network configuration.
    Config(ConfigKey),
    /// A fixed value.
    Literal(ArgValue),
    /// An address list concatenated from addresses and address lists.
    Concat(Vec<ArgRef>),
}

impl ArgRef {
    pub fn component(name: impl Into<String>) -> Self {
        ArgRef::Component(name.into())
    }

    /// All component names this reference depends on, in order of appearance.
    pub fn components(&self) -> Vec<&str> {
        match self {
            ArgRef::Component(name) => vec![name.as_str()],
            ArgRef::Config(_) | ArgRef::Literal(_) => Vec::new(),
            ArgRef::Concat(parts) => parts.iter().flat_map(ArgRef::components).collect(),
        }
    }
}

/// A deployable component and its constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Unique name within the plan.
    pub name: String,
    /// Name of the deployable template (artifact).
    pub template: String,
    /// Constructor arguments, in ABI order.
    pub args: Vec<ArgRef>,
}

impl ComponentSpec {
    /// Create a spec whose template has the same name as the component.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            template: name.clone(),
            name,
            args: Vec::new(),
        }
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn arg(mut self, arg: ArgRef) -> Self {
        self.args.push(arg);
        self
    }

    /// Append the address of another component.
    pub fn component(self, name: impl Into<String>) -> Self {
        self.arg(ArgRef::component(name))
    }

    /// Append a network configuration value.
    pub fn config(self, key: ConfigKey) -> Self {
        self.arg(ArgRef::Config(key))
    }

    /// Component names this spec depends on.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.args.iter().flat_map(ArgRef::components)
    }
}

/// An ordered, dependency-respecting sequence of components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeploymentPlan {
    components: Vec<ComponentSpec>,
}

impl DeploymentPlan {
    /// Build a plan from an already ordered list, validating the order.
    pub fn new(components: Vec<ComponentSpec>) -> Result<Self, DeployError> {
        let mut seen = HashSet::new();

        for spec in &components {
            if seen.contains(spec.name.as_str()) {
                return Err(DeployError::PlanIntegrity(format!(
                    "duplicate component `{}`",
                    spec.name
                )));
            }

            for dependency in spec.dependencies() {
                if dependency == spec.name {
                    return Err(DeployError::PlanIntegrity(format!(
                        "component `{}` references itself",
                        spec.name
                    )));
                }
                if !seen.contains(dependency) {
                    let reason = if components.iter().any(|c| c.name == dependency) {
                        "which appears later in the plan"
                    } else {
                        "which is not part of the plan"
                    };
                    return Err(DeployError::PlanIntegrity(format!(
                        "component `{}` references `{}` {}",
                        spec.name, dependency, reason
                    )));
                }
            }

            seen.insert(spec.name.as_str());
        }

        Ok(Self { components })
    }

    /// Build a plan from an unordered list with a stable topological sort.
    ///
    /// Components without ordering constraints between them keep their input order, so an
    /// already valid list comes back unchanged.
    pub fn sorted(components: Vec<ComponentSpec>) -> Result<Self, DeployError> {
        let mut index = HashMap::new();
        for (i, spec) in components.iter().enumerate() {
            if index.insert(spec.name.as_str(), i).is_some() {
                return Err(DeployError::PlanIntegrity(format!(
                    "duplicate component `{}`",
                    spec.name
                )));
            }
        }

        let mut in_degree = vec![0usize; components.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
        for (i, spec) in components.iter().enumerate() {
            let deps: BTreeSet<&str> = spec.dependencies().collect();
            for dependency in deps {
                let Some(&j) = index.get(dependency) else {
                    return Err(DeployError::PlanIntegrity(format!(
                        "component `{}` references `{}` which is not part of the plan",
                        spec.name, dependency
                    )));
                };
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..components.len())
            .filter(|i| in_degree[*i] == 0)
            .collect();
        let mut order = Vec::with_capacity(components.len());

        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() != components.len() {
            let stuck: Vec<&str> = (0..components.len())
                .filter(|i| in_degree[*i] > 0)
                .map(|i| components[i].name.as_str())
                .collect();
            return Err(DeployError::PlanIntegrity(format!(
                "dependency cycle between {}",
                stuck.join(", ")
            )));
        }

        let mut slots: Vec<Option<ComponentSpec>> = components.into_iter().map(Some).collect();
        let ordered = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        Self::new(ordered)
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The distinct templates needed to deploy this plan.
    pub fn templates(&self) -> BTreeSet<&str> {
        self.components.iter().map(|c| c.template.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
