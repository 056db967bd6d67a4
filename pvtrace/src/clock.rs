//! # Clock Translation
//!
//! Probe timestamps come from `bpf_ktime_get_ns()`, i.e. `CLOCK_MONOTONIC`.
//! Spans need wall-clock nanoseconds since the Unix epoch. [`BootClock`]
//! captures the offset between the two once, before the first record is
//! processed, and applies it to every kernel timestamp afterwards.
//!
//! Record timestamps (`epicsTimeStamp`) count from the EPICS epoch,
//! 1990-01-01 UTC, which is [`EPICS_EPOCH_OFFSET_SECS`] after the Unix epoch.

#![allow(unsafe_code)] // clock_gettime() requires unsafe

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pvtrace_common::EPICS_EPOCH_OFFSET_SECS;

use crate::domain::KernelTime;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Read `CLOCK_MONOTONIC`, the clock behind `bpf_ktime_get_ns()`
#[allow(clippy::cast_sign_loss)]
pub fn monotonic_now() -> KernelTime {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec
    if unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) } != 0 {
        return KernelTime(0);
    }
    KernelTime(ts.tv_sec as u64 * NANOS_PER_SEC + ts.tv_nsec as u64)
}

/// Fixed offset from kernel monotonic time to Unix epoch time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootClock {
    offset_ns: u64,
}

impl BootClock {
    /// Sample wall clock and monotonic clock back to back
    #[allow(clippy::cast_possible_truncation)]
    pub fn capture() -> Self {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mono = monotonic_now();
        Self::from_offset((wall as u64).saturating_sub(mono.0))
    }

    pub fn from_offset(offset_ns: u64) -> Self {
        Self { offset_ns }
    }

    pub fn offset_ns(self) -> u64 {
        self.offset_ns
    }

    /// Kernel timestamp to nanoseconds since the Unix epoch
    pub fn to_unix_nanos(self, t: KernelTime) -> u64 {
        t.0.saturating_add(self.offset_ns)
    }
}

/// `epicsTimeStamp`: seconds and nanoseconds past the EPICS epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpicsTime {
    pub sec: u32,
    pub nsec: u32,
}

impl EpicsTime {
    pub fn to_unix_nanos(self) -> u64 {
        (u64::from(self.sec) + EPICS_EPOCH_OFFSET_SECS) * NANOS_PER_SEC + u64::from(self.nsec)
    }
}

/// Nanoseconds since the Unix epoch to a `SystemTime`
pub fn system_time(unix_nanos: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(unix_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_time_translation() {
        let offset = 1_700_000_000 * NANOS_PER_SEC;
        let clock = BootClock::from_offset(offset);
        assert_eq!(clock.to_unix_nanos(KernelTime(42)), offset + 42);
    }

    #[test]
    fn test_capture_is_close_to_now() {
        let clock = BootClock::capture();
        let translated = clock.to_unix_nanos(monotonic_now());
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let wall = u64::try_from(since_epoch.as_nanos()).unwrap();
        assert!(wall.abs_diff(translated) < NANOS_PER_SEC);
    }

    #[test]
    fn test_monotonic_never_goes_back() {
        let a = monotonic_now();
        let b = monotonic_now();
        assert!(b >= a);
    }

    #[test]
    fn test_epics_epoch() {
        let t = EpicsTime { sec: 0, nsec: 0 };
        // 1990-01-01T00:00:00Z
        assert_eq!(t.to_unix_nanos(), 631_152_000 * NANOS_PER_SEC);

        let t = EpicsTime { sec: 10, nsec: 500 };
        assert_eq!(t.to_unix_nanos(), (631_152_010 * NANOS_PER_SEC) + 500);
    }

    #[test]
    fn test_system_time() {
        assert_eq!(system_time(1_500), UNIX_EPOCH + Duration::from_nanos(1_500));
    }
}
