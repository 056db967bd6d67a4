//! Event builders for unit tests

use super::{Event, Phase, RecordKind, Value};
use crate::clock::EpicsTime;
use crate::domain::{IdPair, KernelTime, Pid};

pub fn entry(pid: u32, depth: u32, time: u64, name: &str) -> Event {
    Event {
        kind: RecordKind::Process,
        phase: Phase::Entry { depth },
        pid: Some(Pid(pid)),
        time: KernelTime(time),
        ids: IdPair::new(u64::from(pid), u64::from(depth)),
        parent: IdPair::new(0, 0),
        name: name.to_string(),
        field: None,
        record_time: Some(EpicsTime { sec: 0, nsec: 0 }),
        value: Value::Null,
    }
}

pub fn exit(pid: u32, depth: u32, time: u64, value: Value) -> Event {
    Event {
        kind: RecordKind::Process,
        phase: Phase::Exit { depth },
        pid: Some(Pid(pid)),
        time: KernelTime(time),
        ids: IdPair::new(0, 0),
        parent: IdPair::new(0, 0),
        name: String::new(),
        field: None,
        record_time: Some(EpicsTime { sec: 1, nsec: 0 }),
        value,
    }
}

pub fn caput(start: u64, end: u64, name: &str, value: Value) -> Event {
    Event {
        kind: RecordKind::Caput,
        phase: Phase::Complete {
            end: KernelTime(end),
        },
        pid: None,
        time: KernelTime(start),
        ids: IdPair::new(3, 4),
        parent: IdPair::new(0, 0),
        name: name.to_string(),
        field: None,
        record_time: None,
        value,
    }
}
