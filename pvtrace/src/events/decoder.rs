//! # Record Decoding
//!
//! Turns the raw bytes handed out by a ring buffer into a typed [`Event`].
//!
//! A buffer shorter than its kind's layout is rejected with
//! [`DecodeError::MalformedRecord`]; longer buffers are accepted and the
//! trailing bytes ignored (ring buffer entries are rounded up to 8 bytes).
//!
//! Fixed-capacity strings are truncated at the first NUL. A string that fills
//! its whole capacity without a NUL is tolerated and used in full, since the
//! probes copy names with `bpf_probe_read_user` and do not terminate them.

use pvtrace_common::{
    CaputRecord, ProcessRecord, PutRecord, RawRecord, STATE_ENTER_PROC, STATE_EXIT_PROC,
};

use super::{Event, Phase, RecordKind, Value};
use crate::clock::EpicsTime;
use crate::domain::{DecodeError, IdPair, KernelTime, Pid};

/// Decode one record of the declared `kind`
///
/// # Errors
/// Returns [`DecodeError::MalformedRecord`] if `bytes` is shorter than the
/// layout, or [`DecodeError::UnknownState`] for a process record that is
/// neither an entry nor an exit.
pub fn decode(kind: RecordKind, bytes: &[u8]) -> Result<Event, DecodeError> {
    match kind {
        RecordKind::Process => decode_process(&read::<ProcessRecord>(kind, bytes)?),
        RecordKind::Put => Ok(decode_put(&read::<PutRecord>(kind, bytes)?)),
        RecordKind::Caput => Ok(decode_caput(&read::<CaputRecord>(kind, bytes)?)),
    }
}

/// NUL-terminated fixed-capacity string to an owned `String`
pub fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn read<T: RawRecord>(kind: RecordKind, bytes: &[u8]) -> Result<T, DecodeError> {
    T::read_from(bytes).ok_or(DecodeError::MalformedRecord {
        kind,
        expected: T::SIZE,
        actual: bytes.len(),
    })
}

fn decode_process(raw: &ProcessRecord) -> Result<Event, DecodeError> {
    let (phase, value) = match raw.state {
        // The entry probe never reads the value; its tag slot is stale
        STATE_ENTER_PROC => (Phase::Entry { depth: raw.count }, Value::Null),
        STATE_EXIT_PROC => (
            Phase::Exit { depth: raw.count },
            Value::from_tagged(raw.val_type, raw.val_i, raw.val_u, raw.val_d, &raw.val_s),
        ),
        other => return Err(DecodeError::UnknownState(other)),
    };

    Ok(Event {
        kind: RecordKind::Process,
        phase,
        pid: Some(Pid(raw.pid)),
        time: KernelTime(raw.ktime_ns),
        ids: IdPair::new(raw.tid, raw.sid),
        parent: IdPair::new(raw.ptid, raw.psid),
        name: fixed_str(&raw.pvname),
        field: None,
        record_time: Some(EpicsTime {
            sec: raw.ts_sec,
            nsec: raw.ts_nano,
        }),
        value,
    })
}

fn decode_put(raw: &PutRecord) -> Event {
    Event {
        kind: RecordKind::Put,
        phase: Phase::Complete {
            end: KernelTime(raw.ktime_ns_end),
        },
        pid: None,
        time: KernelTime(raw.ktime_ns),
        ids: IdPair::new(raw.tid, raw.sid),
        parent: IdPair::new(raw.ptid, raw.psid),
        name: fixed_str(&raw.pvname),
        field: Some(fixed_str(&raw.field_name)).filter(|f| !f.is_empty()),
        record_time: None,
        value: Value::from_tagged(raw.val_type, raw.val_i, raw.val_u, raw.val_d, &raw.val_s),
    }
}

fn decode_caput(raw: &CaputRecord) -> Event {
    Event {
        kind: RecordKind::Caput,
        phase: Phase::Complete {
            end: KernelTime(raw.ktime_ns_end),
        },
        pid: None,
        time: KernelTime(raw.ktime_ns),
        ids: IdPair::new(raw.tid, raw.sid),
        parent: IdPair::new(raw.ptid, raw.psid),
        name: fixed_str(&raw.pvname),
        field: None,
        record_time: None,
        value: Value::from_tagged(raw.val_type, raw.val_i, raw.val_u, raw.val_d, &raw.val_s),
    }
}
