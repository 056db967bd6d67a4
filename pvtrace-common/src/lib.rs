//! # Shared Record Layouts (probe ↔ userspace)
//!
//! Defines the fixed-layout records written by the `libdbCore` probes into
//! their ring buffers, together with the tag constants both sides agree on.
//! All records are `#[repr(C)]` with every padding byte spelled out as a
//! field, so a record is plain bytes end to end and can be viewed as a byte
//! slice without touching uninitialised memory.
//!
//! ## Record Families
//!
//! - [`ProcessRecord`] - `dbProcess` entry/exit, one record per probe firing
//! - [`PutRecord`] - `dbPutField`, paired in the kernel, one record per call
//! - [`CaputRecord`] - `dbCaPutLinkCallback`, paired in the kernel
//!
//! Each family has its own ring buffer (see [`MAP_RING_BUF`] and friends).

#![no_std]

// ============================================================================
// Sizes
// ============================================================================

/// Capacity of an EPICS string value (`MAX_STRING_SIZE` in `dbDefs.h`)
pub const MAX_STRING_SIZE: usize = 40;

/// Capacity of a record name as copied by the process and put probes
pub const PV_NAME_LEN: usize = 61;

/// Capacity of a channel-access link target name
pub const CAPUT_PV_NAME_LEN: usize = 100;

/// Capacity of the task command name (`TASK_COMM_LEN` in `linux/sched.h`)
pub const TASK_COMM_LEN: usize = 16;

// ============================================================================
// Tags
// ============================================================================

/// `dbProcess` entry
pub const STATE_ENTER_PROC: u32 = 1;

/// `dbProcess` return
pub const STATE_EXIT_PROC: u32 = 2;

pub const VAL_TYPE_INT: u32 = 1;
pub const VAL_TYPE_UINT: u32 = 2;
pub const VAL_TYPE_DOUBLE: u32 = 3;
pub const VAL_TYPE_STRING: u32 = 4;
pub const VAL_TYPE_NULL: u32 = 5;

/// Seconds between the Unix epoch and the EPICS epoch (1990-01-01 UTC)
pub const EPICS_EPOCH_OFFSET_SECS: u64 = 631_152_000;

// ============================================================================
// Map and program names
// ============================================================================

pub const MAP_RING_BUF: &str = "ring_buf";
pub const MAP_RING_BUF_PUT: &str = "ring_buf_put";
pub const MAP_RING_BUF_CAPUT: &str = "ring_buf_caput";

/// `(library symbol, entry program, return program)` for each probed function
///
/// The first three produce events. `dbCreateRecord` and `dbGetRecordName`
/// only populate kernel-side lookup tables used by the `dbProcess` return
/// probe to locate the record's VAL field.
pub const PROBES: [(&str, &str, &str); 5] = [
    ("dbProcess", "enter_process", "exit_process"),
    ("dbPutField", "enter_dbput", "exit_dbput"),
    ("dbCaPutLinkCallback", "enter_caput", "exit_caput"),
    ("dbCreateRecord", "enter_createrec", "exit_createrec"),
    ("dbGetRecordName", "enter_dbfirstrecord", "exit_dbfirstrecord"),
];

/// Number of leading entries in [`PROBES`] that produce ring buffer events
pub const EVENT_PROBES: usize = 3;

// ============================================================================
// Records
// ============================================================================

/// `dbProcess` entry or exit record
///
/// **Size**: 216 bytes
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ProcessRecord {
    /// 0 on entry, 1 on exit (informational, `state` is authoritative)
    pub kind: u32,

    /// Lower half of `bpf_get_current_pid_tgid()`, i.e. the kernel task id
    pub pid: u32,

    pub comm: [u8; TASK_COMM_LEN],

    /// `bpf_ktime_get_ns()` (`CLOCK_MONOTONIC`)
    pub ktime_ns: u64,

    /// [`STATE_ENTER_PROC`] or [`STATE_EXIT_PROC`]
    pub state: u32,

    #[allow(clippy::pub_underscore_fields)]
    pub _padding0: [u8; 4],

    /// Parent trace token, 0 when the call has no cross-boundary parent
    pub ptid: u64,
    pub psid: u64,

    /// This call's own trace token and span id
    pub tid: u64,
    pub sid: u64,

    /// 1-based recursion position, matching entry insertion order
    pub count: u32,

    /// Record timestamp, seconds past the EPICS epoch
    pub ts_sec: u32,
    pub ts_nano: u32,

    pub pvname: [u8; PV_NAME_LEN],

    #[allow(clippy::pub_underscore_fields)]
    pub _padding1: [u8; 3],

    pub val_type: u32,
    pub val_i: i64,
    pub val_u: u64,
    pub val_d: f64,
    pub val_s: [u8; MAX_STRING_SIZE],
}

/// `dbPutField` record, emitted once on return with both timestamps
///
/// **Size**: 248 bytes
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PutRecord {
    pub ktime_ns: u64,
    pub ktime_ns_end: u64,
    pub pvname: [u8; PV_NAME_LEN],
    pub field_name: [u8; PV_NAME_LEN],

    #[allow(clippy::pub_underscore_fields)]
    pub _padding0: [u8; 6],

    pub ptid: u64,
    pub psid: u64,
    pub tid: u64,
    pub sid: u64,
    pub val_type: u32,

    #[allow(clippy::pub_underscore_fields)]
    pub _padding1: [u8; 4],

    pub val_i: i64,
    pub val_u: u64,
    pub val_d: f64,
    pub val_s: [u8; MAX_STRING_SIZE],
}

/// `dbCaPutLinkCallback` record, emitted once on return with both timestamps
///
/// **Size**: 224 bytes
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CaputRecord {
    pub ktime_ns: u64,
    pub ktime_ns_end: u64,
    pub pvname: [u8; CAPUT_PV_NAME_LEN],

    #[allow(clippy::pub_underscore_fields)]
    pub _padding0: [u8; 4],

    pub ptid: u64,
    pub psid: u64,
    pub tid: u64,
    pub sid: u64,
    pub val_type: u32,

    #[allow(clippy::pub_underscore_fields)]
    pub _padding1: [u8; 4],

    pub val_i: i64,
    pub val_u: u64,
    pub val_d: f64,
    pub val_s: [u8; MAX_STRING_SIZE],
}

const _: () = assert!(core::mem::size_of::<ProcessRecord>() == 216);
const _: () = assert!(core::mem::size_of::<PutRecord>() == 248);
const _: () = assert!(core::mem::size_of::<CaputRecord>() == 224);

impl ProcessRecord {
    /// All-zero record
    pub const ZERO: Self = Self {
        kind: 0,
        pid: 0,
        comm: [0; TASK_COMM_LEN],
        ktime_ns: 0,
        state: 0,
        _padding0: [0; 4],
        ptid: 0,
        psid: 0,
        tid: 0,
        sid: 0,
        count: 0,
        ts_sec: 0,
        ts_nano: 0,
        pvname: [0; PV_NAME_LEN],
        _padding1: [0; 3],
        val_type: 0,
        val_i: 0,
        val_u: 0,
        val_d: 0.0,
        val_s: [0; MAX_STRING_SIZE],
    };
}

impl PutRecord {
    /// All-zero record
    pub const ZERO: Self = Self {
        ktime_ns: 0,
        ktime_ns_end: 0,
        pvname: [0; PV_NAME_LEN],
        field_name: [0; PV_NAME_LEN],
        _padding0: [0; 6],
        ptid: 0,
        psid: 0,
        tid: 0,
        sid: 0,
        val_type: 0,
        _padding1: [0; 4],
        val_i: 0,
        val_u: 0,
        val_d: 0.0,
        val_s: [0; MAX_STRING_SIZE],
    };
}

impl CaputRecord {
    /// All-zero record
    pub const ZERO: Self = Self {
        ktime_ns: 0,
        ktime_ns_end: 0,
        pvname: [0; CAPUT_PV_NAME_LEN],
        _padding0: [0; 4],
        ptid: 0,
        psid: 0,
        tid: 0,
        sid: 0,
        val_type: 0,
        _padding1: [0; 4],
        val_i: 0,
        val_u: 0,
        val_d: 0.0,
        val_s: [0; MAX_STRING_SIZE],
    };
}

/// A record that is plain bytes: `#[repr(C)]`, `Copy`, no implicit padding
///
/// # Safety
///
/// Implementors must have no implicit padding and must be valid for every
/// bit pattern.
#[allow(unsafe_code)]
pub unsafe trait RawRecord: Copy + 'static {
    /// Size of the record on the wire
    const SIZE: usize = core::mem::size_of::<Self>();

    /// View the record as its wire bytes
    fn as_bytes(&self) -> &[u8] {
        // SAFETY: the trait contract guarantees every byte is initialised
        unsafe { core::slice::from_raw_parts((self as *const Self).cast::<u8>(), Self::SIZE) }
    }

    /// Read a record from the front of `bytes`, or `None` if too short
    fn read_from(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        // SAFETY: length checked above and any bit pattern is a valid record
        let record = unsafe { core::ptr::read_unaligned(bytes.as_ptr().cast::<Self>()) };
        Some(record)
    }
}

#[allow(unsafe_code)]
unsafe impl RawRecord for ProcessRecord {}

#[allow(unsafe_code)]
unsafe impl RawRecord for PutRecord {}

#[allow(unsafe_code)]
unsafe impl RawRecord for CaputRecord {}

#[cfg(feature = "user")]
use aya::Pod;

// Pod lets the records be read straight out of aya maps
#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for ProcessRecord {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for PutRecord {}

#[cfg(feature = "user")]
#[allow(unsafe_code)]
unsafe impl Pod for CaputRecord {}
