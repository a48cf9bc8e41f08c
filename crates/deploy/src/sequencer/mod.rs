//! Sequencers drive a plan through a [`Submitter`](crate::submitter::Submitter), one
//! transaction at a time, recording every transition in the [`Ledger`](crate::ledger::Ledger).

mod deploy;
mod wiring;

pub use deploy::DependencySequencer;
pub use wiring::WiringSequencer;
