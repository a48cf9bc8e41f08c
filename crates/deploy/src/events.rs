//! Progress events emitted by the sequencers.

use alloy_core::primitives::Address;
use derive_more::Display;
use tokio::sync::mpsc::UnboundedSender;

use crate::submitter::TxRef;

/// One observable transition of a run.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ProgressEvent {
    #[display("{name} already deployed at {address}")]
    ComponentSkipped { name: String, address: Address },

    #[display("{name} creation submitted ({tx}, attempt {attempt})")]
    ComponentSubmitted { name: String, tx: TxRef, attempt: u32 },

    #[display("{name} deployed at {address}")]
    ComponentDeployed {
        name: String,
        address: Address,
        tx: TxRef,
    },

    #[display("{name} failed: {reason}")]
    ComponentFailed { name: String, reason: String },

    #[display("{id} already applied")]
    StepSkipped { id: String },

    #[display("{id} submitted ({tx})")]
    StepSubmitted { id: String, tx: TxRef },

    #[display("{id} applied ({tx})")]
    StepApplied { id: String, tx: TxRef },

    #[display("{id} failed: {reason}")]
    StepFailed { id: String, reason: String },

    /// A transaction left in flight by an earlier run is being queried again.
    #[display("re-querying {tx} for {subject}")]
    Resuming { subject: String, tx: TxRef },
}

/// Receives progress events. Emitting never fails and never blocks a run.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::ComponentFailed { .. } | ProgressEvent::StepFailed { .. } => {
                tracing::error!(%event, "Progress");
            }
            ProgressEvent::ComponentSkipped { .. } | ProgressEvent::StepSkipped { .. } => {
                tracing::debug!(%event, "Progress");
            }
            _ => tracing::info!(%event, "Progress"),
        }
    }
}

/// Forwards events to a channel; a closed receiver drops them.
impl EventSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}
