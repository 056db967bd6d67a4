//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep the three different 64-bit quantities that flow
//! through a record (kernel timestamps, trace tokens, span ids) from being
//! mixed up, and make function signatures say which one they expect.

use std::fmt;

/// Process ID as reported by the probe
///
/// The probes store the lower half of `bpf_get_current_pid_tgid()`, so this
/// is the kernel task id: one value per OS thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID:{}", self.0)
    }
}

/// Monotonic kernel timestamp (`bpf_ktime_get_ns()`), nanoseconds since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelTime(pub u64);

impl KernelTime {
    /// Nanoseconds elapsed since `earlier`, zero if `earlier` is later
    pub fn saturating_since(self, earlier: KernelTime) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// 64-bit correlation token assigned by the probe to one logical trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceToken(pub u64);

impl TraceToken {
    /// Zero means "no token" in the parent slot of a record
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TraceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Probe-assigned identifier pair: trace token plus span id
///
/// Appears twice on every record: once for the call itself and once for the
/// call that causally precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdPair {
    pub trace: TraceToken,
    pub span: u64,
}

impl IdPair {
    pub fn new(trace: u64, span: u64) -> Self {
        Self {
            trace: TraceToken(trace),
            span,
        }
    }

    /// Both halves zero
    pub fn is_empty(self) -> bool {
        self.trace.is_zero() && self.span == 0
    }
}

impl fmt::Display for IdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:016x}", self.trace, self.span)
    }
}
