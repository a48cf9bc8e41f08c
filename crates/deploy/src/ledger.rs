//! Deployment ledger: the single source of truth for idempotent resume.
//!
//! Every component of a plan and every wiring step has one record. Records are created
//! `Pending` when the ledger is prepared for a plan and move to `Deployed`/`Applied` or
//! `Failed`. A file-backed ledger writes itself to disk after each mutation, so an
//! interrupted run leaves exactly the confirmed operations behind.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::DeployError,
    fs::FsHandler,
    plan::{DeploymentPlan, WiringPlan, WiringStep},
    submitter::TxRef,
    value::ArgValue,
};

/// Current on-disk format version.
const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Component `{name}` is already deployed at {address}")]
    AlreadyDeployed { name: String, address: Address },

    #[error("Wiring step `{id}` is already applied")]
    AlreadyApplied { id: String },

    #[error("Component `{0}` has no ledger record")]
    UnknownComponent(String),

    #[error("Wiring step `{0}` has no ledger record")]
    UnknownStep(String),

    #[error("Cannot submit `{name}` while it is {status}")]
    NotPending { name: String, status: String },

    #[error("Component `{name}` is {status}, not deployed")]
    NotDeployed { name: String, status: String },

    #[error("Ledger {} is locked by another process", .0.display())]
    Locked(PathBuf),

    #[error("Ledger I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported ledger version {0}")]
    UnsupportedVersion(u32),

    #[error("Ledger encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Creation status of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Deployed,
    Failed,
}

/// Application status of a wiring step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Applied,
    Failed,
}

/// A transaction that was sent but whose outcome is not known yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlight {
    pub tx: TxRef,
    /// Address the creation is expected to land at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub template: String,
    pub status: RecordStatus,
    /// Present iff `status` is `Deployed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default)]
    pub constructor_args: Vec<ArgValue>,
    /// The confirmed creation transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<InFlight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Number of creation transactions submitted so far.
    #[serde(default)]
    pub attempts: u32,
    /// Source verification was accepted by the explorer.
    #[serde(default)]
    pub verified: bool,
    /// Unix timestamp of the last transition.
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringRecord {
    pub id: String,
    pub target: String,
    pub operation: String,
    pub status: StepStatus,
    #[serde(default)]
    pub args: Vec<ArgValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<TxRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<TxRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    #[serde(default)]
    components: BTreeMap<String, DeploymentRecord>,
    #[serde(default)]
    wiring: BTreeMap<String, WiringRecord>,
}

/// Keeps the ledger file and its lock together.
#[derive(Debug)]
struct LedgerFile {
    path: PathBuf,
    _lock: File,
}

#[derive(Debug)]
pub struct Ledger {
    state: LedgerState,
    file: Option<LedgerFile>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Ledger {
    /// A ledger that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: LedgerState {
                version: LEDGER_VERSION,
                ..Default::default()
            },
            file: None,
        }
    }

    /// Open (or create) a file-backed ledger and take its single-writer lock.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let io_err = |source| LedgerError::Io {
            path: path.clone(),
            source,
        };

        FsHandler::create_parent_directory(&path).map_err(io_err)?;
        let lock = FsHandler::try_lock(&path)
            .map_err(io_err)?
            .ok_or_else(|| LedgerError::Locked(path.clone()))?;

        let state = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(io_err)?;
            let state: LedgerState = serde_json::from_str(&content)?;
            if state.version != LEDGER_VERSION {
                return Err(LedgerError::UnsupportedVersion(state.version));
            }
            tracing::info!(
                path = %path.display(),
                components = state.components.len(),
                steps = state.wiring.len(),
                "Ledger loaded"
            );
            state
        } else {
            tracing::info!(path = %path.display(), "Starting a new ledger");
            LedgerState {
                version: LEDGER_VERSION,
                ..Default::default()
            }
        };

        Ok(Self {
            state,
            file: Some(LedgerFile { path, _lock: lock }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&self.state)?;
        FsHandler::write_atomic(&file.path, &json).map_err(|source| LedgerError::Io {
            path: file.path.clone(),
            source,
        })
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.state.fingerprint.as_deref()
    }

    /// Tie the ledger to a plan fingerprint.
    ///
    /// A fresh ledger adopts the fingerprint. A ledger written for another fingerprint is
    /// refused unless `force` is set, in which case the new fingerprint replaces the old one.
    pub fn bind_fingerprint(&mut self, fingerprint: &str, force: bool) -> Result<(), DeployError> {
        match self.state.fingerprint.as_deref() {
            Some(found) if found == fingerprint => return Ok(()),
            Some(found) if !force => {
                return Err(DeployError::FingerprintMismatch {
                    expected: fingerprint.to_string(),
                    found: found.to_string(),
                });
            }
            Some(found) => {
                tracing::warn!(
                    previous = found,
                    current = fingerprint,
                    "Resuming a ledger written for a different plan"
                );
            }
            None => {}
        }

        self.state.fingerprint = Some(fingerprint.to_string());
        self.persist()?;
        Ok(())
    }

    /// Create `Pending` records for every component of `plan` that has none yet.
    pub fn prepare(&mut self, plan: &DeploymentPlan) -> Result<(), LedgerError> {
        for spec in plan.components() {
            self.record_pending(&spec.name, &spec.template)?;
        }
        Ok(())
    }

    /// Ensure a `Pending` record exists for `name`.
    ///
    /// Existing `Pending` and `Deployed` records are left alone. A `Failed` record from an
    /// earlier run is re-armed so the component is attempted again.
    pub fn record_pending(&mut self, name: &str, template: &str) -> Result<(), LedgerError> {
        match self.state.components.get_mut(name) {
            None => {
                self.state.components.insert(
                    name.to_string(),
                    DeploymentRecord {
                        name: name.to_string(),
                        template: template.to_string(),
                        status: RecordStatus::Pending,
                        address: None,
                        constructor_args: Vec::new(),
                        tx: None,
                        in_flight: None,
                        failure: None,
                        attempts: 0,
                        verified: false,
                        updated_at: now(),
                    },
                );
            }
            Some(record) if record.status == RecordStatus::Failed => {
                tracing::debug!(component = name, "Re-arming failed component");
                record.status = RecordStatus::Pending;
                record.failure = None;
                record.updated_at = now();
            }
            Some(_) => return Ok(()),
        }
        self.persist()
    }

    /// Remember a creation transaction before waiting for it.
    pub fn record_submitted(
        &mut self,
        name: &str,
        constructor_args: Vec<ArgValue>,
        in_flight: InFlight,
    ) -> Result<(), LedgerError> {
        let record = self.component_mut(name)?;
        if record.status != RecordStatus::Pending {
            return Err(LedgerError::NotPending {
                name: name.to_string(),
                status: record.status.to_string(),
            });
        }

        record.constructor_args = constructor_args;
        record.in_flight = Some(in_flight);
        record.attempts += 1;
        record.updated_at = now();
        self.persist()
    }

    pub fn record_deployed(
        &mut self,
        name: &str,
        address: Address,
        tx: TxRef,
    ) -> Result<(), LedgerError> {
        let record = self.component_mut(name)?;
        Self::ensure_not_deployed(record)?;

        record.status = RecordStatus::Deployed;
        record.address = Some(address);
        record.tx = Some(tx);
        record.in_flight = None;
        record.failure = None;
        record.updated_at = now();
        self.persist()
    }

    pub fn record_failed(
        &mut self,
        name: &str,
        cause: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let record = self.component_mut(name)?;
        Self::ensure_not_deployed(record)?;

        record.status = RecordStatus::Failed;
        record.in_flight = None;
        record.failure = Some(cause.into());
        record.updated_at = now();
        self.persist()
    }

    /// Remember that the explorer accepted the sources of a deployed component.
    pub fn record_verified(&mut self, name: &str) -> Result<(), LedgerError> {
        let record = self.component_mut(name)?;
        if record.status != RecordStatus::Deployed {
            return Err(LedgerError::NotDeployed {
                name: name.to_string(),
                status: record.status.to_string(),
            });
        }

        record.verified = true;
        record.updated_at = now();
        self.persist()
    }

    pub fn lookup(&self, name: &str) -> Option<&DeploymentRecord> {
        self.state.components.get(name)
    }

    /// The address of `name` if it is deployed.
    pub fn deployed_address(&self, name: &str) -> Option<Address> {
        self.lookup(name)
            .filter(|r| r.status == RecordStatus::Deployed)
            .and_then(|r| r.address)
    }

    /// Records of `plan`'s components, in plan order.
    pub fn records_for<'a>(&'a self, plan: &'a DeploymentPlan) -> Vec<&'a DeploymentRecord> {
        plan.components()
            .iter()
            .filter_map(|spec| self.lookup(&spec.name))
            .collect()
    }

    fn component_mut(&mut self, name: &str) -> Result<&mut DeploymentRecord, LedgerError> {
        self.state
            .components
            .get_mut(name)
            .ok_or_else(|| LedgerError::UnknownComponent(name.to_string()))
    }

    fn ensure_not_deployed(record: &DeploymentRecord) -> Result<(), LedgerError> {
        if record.status == RecordStatus::Deployed {
            return Err(LedgerError::AlreadyDeployed {
                name: record.name.clone(),
                address: record.address.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

// Wiring side.
impl Ledger {
    /// Create `Pending` records for every step of `wiring` that has none yet.
    pub fn prepare_wiring(&mut self, wiring: &WiringPlan) -> Result<(), LedgerError> {
        for step in wiring.steps() {
            self.step_pending(step)?;
        }
        Ok(())
    }

    /// Ensure a `Pending` record exists for `step`; `Failed` records are re-armed.
    pub fn step_pending(&mut self, step: &WiringStep) -> Result<(), LedgerError> {
        match self.state.wiring.get_mut(&step.id) {
            None => {
                self.state.wiring.insert(
                    step.id.clone(),
                    WiringRecord {
                        id: step.id.clone(),
                        target: step.target.clone(),
                        operation: step.operation.clone(),
                        status: StepStatus::Pending,
                        args: Vec::new(),
                        tx: None,
                        in_flight: None,
                        failure: None,
                        attempts: 0,
                        updated_at: now(),
                    },
                );
            }
            Some(record) if record.status == StepStatus::Failed => {
                record.status = StepStatus::Pending;
                record.failure = None;
                record.updated_at = now();
            }
            Some(_) => return Ok(()),
        }
        self.persist()
    }

    pub fn step_submitted(
        &mut self,
        id: &str,
        args: Vec<ArgValue>,
        tx: TxRef,
    ) -> Result<(), LedgerError> {
        let record = self.step_mut(id)?;
        if record.status != StepStatus::Pending {
            return Err(LedgerError::NotPending {
                name: id.to_string(),
                status: record.status.to_string(),
            });
        }

        record.args = args;
        record.in_flight = Some(tx);
        record.attempts += 1;
        record.updated_at = now();
        self.persist()
    }

    pub fn step_applied(&mut self, id: &str, tx: TxRef) -> Result<(), LedgerError> {
        let record = self.step_mut(id)?;
        if record.status == StepStatus::Applied {
            return Err(LedgerError::AlreadyApplied { id: id.to_string() });
        }

        record.status = StepStatus::Applied;
        record.tx = Some(tx);
        record.in_flight = None;
        record.failure = None;
        record.updated_at = now();
        self.persist()
    }

    pub fn step_failed(&mut self, id: &str, cause: impl Into<String>) -> Result<(), LedgerError> {
        let record = self.step_mut(id)?;
        if record.status == StepStatus::Applied {
            return Err(LedgerError::AlreadyApplied { id: id.to_string() });
        }

        record.status = StepStatus::Failed;
        record.in_flight = None;
        record.failure = Some(cause.into());
        record.updated_at = now();
        self.persist()
    }

    pub fn step(&self, id: &str) -> Option<&WiringRecord> {
        self.state.wiring.get(id)
    }

    /// Records of `wiring`'s steps, in plan order.
    pub fn steps_for<'a>(&'a self, wiring: &'a WiringPlan) -> Vec<&'a WiringRecord> {
        wiring
            .steps()
            .iter()
            .filter_map(|step| self.step(&step.id))
            .collect()
    }

    fn step_mut(&mut self, id: &str) -> Result<&mut WiringRecord, LedgerError> {
        self.state
            .wiring
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownStep(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ComponentSpec;
    use alloy_core::primitives::B256;
    use tempdir::TempDir;

    fn tx(n: u8) -> TxRef {
        TxRef::from(B256::with_last_byte(n))
    }

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    #[test]
    fn test_deployed_is_immutable() {
        let mut ledger = Ledger::in_memory();
        ledger.record_pending("Velo", "Velo").expect("pending");
        ledger.record_deployed("Velo", addr(1), tx(1)).expect("deployed");

        assert_eq!(ledger.deployed_address("Velo"), Some(addr(1)));

        let err = ledger.record_deployed("Velo", addr(2), tx(2)).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyDeployed { address, .. } if address == addr(1)));
        assert!(ledger.record_failed("Velo", "boom").is_err());

        // record_pending leaves deployed records alone
        ledger.record_pending("Velo", "Velo").expect("no-op");
        assert_eq!(ledger.deployed_address("Velo"), Some(addr(1)));
    }

    #[test]
    fn test_failed_is_rearmed() {
        let mut ledger = Ledger::in_memory();
        ledger.record_pending("Velo", "Velo").expect("pending");
        ledger
            .record_submitted(
                "Velo",
                Vec::new(),
                InFlight {
                    tx: tx(1),
                    address: Some(addr(1)),
                },
            )
            .expect("submitted");
        ledger.record_failed("Velo", "reverted").expect("failed");

        let record = ledger.lookup("Velo").expect("record");
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.failure.as_deref(), Some("reverted"));
        assert!(record.in_flight.is_none());
        assert_eq!(ledger.deployed_address("Velo"), None);

        ledger.record_pending("Velo", "Velo").expect("re-armed");
        let record = ledger.lookup("Velo").expect("record");
        assert_eq!(record.status, RecordStatus::Pending);
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn test_verified_only_when_deployed() {
        let mut ledger = Ledger::in_memory();
        ledger.record_pending("Velo", "Velo").expect("pending");
        assert!(matches!(
            ledger.record_verified("Velo"),
            Err(LedgerError::NotDeployed { .. })
        ));

        ledger.record_deployed("Velo", addr(1), tx(1)).expect("deployed");
        ledger.record_verified("Velo").expect("verified");
        assert!(ledger.lookup("Velo").is_some_and(|r| r.verified));
    }

    #[test]
    fn test_unknown_component() {
        let mut ledger = Ledger::in_memory();
        let err = ledger.record_deployed("Ghost", addr(1), tx(1)).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownComponent(_)));
    }

    #[test]
    fn test_fingerprint_binding() {
        let mut ledger = Ledger::in_memory();
        ledger.bind_fingerprint("aaa", false).expect("fresh ledger adopts");
        ledger.bind_fingerprint("aaa", false).expect("same fingerprint");

        let err = ledger.bind_fingerprint("bbb", false).unwrap_err();
        assert!(matches!(err, DeployError::FingerprintMismatch { .. }));

        ledger.bind_fingerprint("bbb", true).expect("forced");
        assert_eq!(ledger.fingerprint(), Some("bbb"));
    }

    #[test]
    fn test_file_ledger_survives_reopen() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("deployments/optimism-testnet.json");

        let plan = DeploymentPlan::new(vec![
            ComponentSpec::new("Velo"),
            ComponentSpec::new("Router").component("Velo"),
        ])
        .expect("valid plan");

        {
            let mut ledger = Ledger::open(&path).expect("open");
            ledger.prepare(&plan).expect("prepare");
            ledger.record_deployed("Velo", addr(7), tx(7)).expect("deployed");
            ledger
                .record_submitted(
                    "Router",
                    vec![ArgValue::Address(addr(7))],
                    InFlight {
                        tx: tx(8),
                        address: Some(addr(8)),
                    },
                )
                .expect("submitted");
        }

        let ledger = Ledger::open(&path).expect("reopen");
        assert_eq!(ledger.deployed_address("Velo"), Some(addr(7)));

        let router = ledger.lookup("Router").expect("router record");
        assert_eq!(router.status, RecordStatus::Pending);
        assert_eq!(router.in_flight.as_ref().map(|f| f.tx), Some(tx(8)));
        assert_eq!(router.constructor_args, vec![ArgValue::Address(addr(7))]);

        let names: Vec<_> = ledger
            .records_for(&plan)
            .into_iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["Velo", "Router"]);
    }

    #[test]
    fn test_wiring_records() {
        let mut ledger = Ledger::in_memory();
        let step = WiringStep::new("Velo", "setMinter").component("Minter");
        ledger.step_pending(&step).expect("pending");

        ledger
            .step_submitted(&step.id, vec![ArgValue::Address(addr(3))], tx(3))
            .expect("submitted");
        ledger.step_applied(&step.id, tx(3)).expect("applied");

        let record = ledger.step(&step.id).expect("record");
        assert_eq!(record.status, StepStatus::Applied);
        assert_eq!(record.tx, Some(tx(3)));
        assert!(record.in_flight.is_none());

        assert!(matches!(
            ledger.step_applied(&step.id, tx(4)),
            Err(LedgerError::AlreadyApplied { .. })
        ));
        assert!(ledger.step_submitted(&step.id, Vec::new(), tx(5)).is_err());
    }

    #[test]
    fn test_corrupted_ledger_file() {
        let temp_dir = TempDir::new("veloup-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("ledger.json");
        std::fs::write(&path, "{ invalid json }").expect("Failed to write corrupted file");

        assert!(matches!(Ledger::open(&path), Err(LedgerError::Encoding(_))));
    }
}
