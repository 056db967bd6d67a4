//! # Typed Events
//!
//! Raw ring buffer records are decoded into [`Event`]s before correlation.
//! Three record families exist, one per probed function:
//!
//! - [`RecordKind::Process`] - `dbProcess`, one event on entry and one on exit
//! - [`RecordKind::Put`] - `dbPutField`, one pre-paired event per call
//! - [`RecordKind::Caput`] - `dbCaPutLinkCallback`, one pre-paired event per call

pub mod decoder;
pub mod value;

use std::fmt;

pub use decoder::{decode, fixed_str};
pub use value::Value;

use crate::clock::EpicsTime;
use crate::domain::{IdPair, KernelTime, Pid};

/// Which ring buffer (and therefore which layout) a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Process,
    Put,
    Caput,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Process, RecordKind::Put, RecordKind::Caput];

    /// Wire size of this kind's record
    pub fn record_size(self) -> usize {
        match self {
            RecordKind::Process => std::mem::size_of::<pvtrace_common::ProcessRecord>(),
            RecordKind::Put => std::mem::size_of::<pvtrace_common::PutRecord>(),
            RecordKind::Caput => std::mem::size_of::<pvtrace_common::CaputRecord>(),
        }
    }

    /// Name of the ring buffer map carrying this kind
    pub fn map_name(self) -> &'static str {
        match self {
            RecordKind::Process => pvtrace_common::MAP_RING_BUF,
            RecordKind::Put => pvtrace_common::MAP_RING_BUF_PUT,
            RecordKind::Caput => pvtrace_common::MAP_RING_BUF_CAPUT,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Process => "process",
            RecordKind::Put => "put",
            RecordKind::Caput => "caput",
        })
    }
}

/// Where in a call's life an event was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Function entered; `depth` is the 1-based position among open calls
    Entry { depth: u32 },
    /// Function returned; `depth` names the entry it closes
    Exit { depth: u32 },
    /// Entry and return paired by the probe; `end` is the return time
    Complete { end: KernelTime },
}

/// One probe firing, decoded
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: RecordKind,
    pub phase: Phase,
    /// Only the process family reports the task id
    pub pid: Option<Pid>,
    pub time: KernelTime,
    /// This call's own identifiers
    pub ids: IdPair,
    /// The causally preceding call, empty when there is none
    pub parent: IdPair,
    /// Record (or link target) name
    pub name: String,
    /// Field written by a put, e.g. `VAL`
    pub field: Option<String>,
    /// Record timestamp at the moment of the event (process family)
    pub record_time: Option<EpicsTime>,
    pub value: Value,
}

impl Event {
    /// End time for pre-paired events, the event time otherwise
    pub fn end_time(&self) -> KernelTime {
        match self.phase {
            Phase::Complete { end } => end,
            Phase::Entry { .. } | Phase::Exit { .. } => self.time,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
