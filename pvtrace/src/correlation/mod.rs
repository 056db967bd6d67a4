//! # Call Correlation
//!
//! Pairs entry and exit events into completed calls.
//!
//! - [`CallCorrelator`] - per-task state machine for recursive `dbProcess`
//!   calls; flushes every completed nested call once the outermost call returns
//! - [`OneShotCorrelator`] - no recursion tracking: one pending entry per key,
//!   and pre-paired events pass straight through
//!
//! Both are bounded by an [`EvictionPolicy`] applied from [`Correlator::sweep`].

pub mod call;
pub mod eviction;
pub mod oneshot;

pub use call::{CallCorrelator, CallRecord};
pub use eviction::{EvictionPolicy, IdleTimeout, NeverEvict};
pub use oneshot::OneShotCorrelator;

use crate::domain::{KernelTime, Pid};
use crate::events::Event;

/// A call ready to become a span
#[derive(Debug, Clone, PartialEq)]
pub enum CompletedCall {
    /// Entry and exit observed as separate events
    Paired { entry: Event, exit: Event },
    /// One event already carrying both timestamps
    PrePaired(Event),
}

impl CompletedCall {
    /// Event holding the call's identifiers, name and start time
    pub fn start(&self) -> &Event {
        match self {
            CompletedCall::Paired { entry, .. } => entry,
            CompletedCall::PrePaired(event) => event,
        }
    }

    /// Event holding the value and end time
    pub fn end(&self) -> &Event {
        match self {
            CompletedCall::Paired { exit, .. } => exit,
            CompletedCall::PrePaired(event) => event,
        }
    }

    pub fn pid(&self) -> Option<Pid> {
        self.start().pid
    }
}

/// What a correlator did with one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State updated, nothing ready yet
    Pending,
    /// This many calls were pushed to the output
    Completed(usize),
    /// Exit with no entry to close
    Unmatched,
    /// Event not applicable (no pid, duplicate exit)
    Ignored,
}

/// Common interface so the pipeline can pick a correlator per record family
pub trait Correlator {
    /// Feed one event; completed calls are appended to `out`
    fn observe(&mut self, event: Event, out: &mut Vec<CompletedCall>) -> Outcome;

    /// Drop stale state; completed calls it still held are appended to `out`.
    /// Returns the number of keys evicted.
    fn sweep(&mut self, now: KernelTime, out: &mut Vec<CompletedCall>) -> usize;

    /// Number of keys with open state
    fn open_keys(&self) -> usize;
}
