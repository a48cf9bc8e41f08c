//! veloup-deploy - Resumable deployment orchestration for the Velodrome protocol.
//!
//! This crate deploys a declarative plan of components in dependency order, wires them
//! together and records every confirmed step in a ledger, so that an interrupted run can
//! be resumed without creating anything twice.

mod config;
pub use config::{
    ConfigOverrides, ConfirmationConfig, OrchestratorConfig, VELOUP_CONFIG_FILENAME,
    VELOUP_ENV_PREFIX, VerificationConfig,
};

mod confirm;
pub use confirm::{ConfirmationPolicy, wait_for_confirmation};

mod deployment_hash;
pub use deployment_hash::DeploymentConfigHash;

mod error;
pub use error::DeployError;

mod events;
pub use events::{EventSink, ProgressEvent, TracingSink};

mod factory;
pub use factory::{
    ArtifactFactoryProvider, FactoryError, FactoryHandle, FactoryProvider, FactoryRegistry,
};

mod fs;

pub mod ledger;
pub use ledger::{DeploymentRecord, Ledger, LedgerError, RecordStatus, StepStatus, WiringRecord};

pub mod network;
pub use network::{ActiveNetworks, ConfigKey, Environment, NetworkConfig, NetworkId};

mod orchestrator;
pub use orchestrator::{Orchestrator, active_networks, deploy, status};

pub mod plan;
pub use plan::{ArgRef, ComponentSpec, DeploymentPlan, WiringPlan, WiringStep};

mod report;
pub use report::{DeploymentReport, render_plan};

mod rpc;

pub mod sequencer;
pub use sequencer::{DependencySequencer, WiringSequencer};

pub mod submitter;
pub use submitter::{
    Confirmation, Creation, JsonRpcSubmitter, Receipt, SignedTx, SubmitError, Submitter, TxRef,
};

pub mod value;
pub use value::ArgValue;

mod verify;
pub use verify::{
    EtherscanVerifier, VerificationError, VerificationSummary, Verifier, verify_all,
};
