//! # One-Shot Correlation
//!
//! For probes whose calls never nest. Two shapes are handled:
//!
//! - entry/exit pairs: one pending entry per task, closed by the next exit
//!   from the same task (the depth counter is not consulted)
//! - pre-paired events: the kernel already matched entry and return and sent
//!   a single record with both timestamps, which completes immediately
//!
//! `dbPutField` and `dbCaPutLinkCallback` records are always pre-paired.

use std::collections::HashMap;

use log::debug;

use super::{CompletedCall, Correlator, EvictionPolicy, IdleTimeout, Outcome};
use crate::domain::{KernelTime, Pid};
use crate::events::{Event, Phase};

/// Correlator without recursion tracking
#[derive(Debug)]
pub struct OneShotCorrelator<P = IdleTimeout> {
    /// Keyed by task; records without a pid share the `None` slot
    pending: HashMap<Option<Pid>, Event>,
    policy: P,
}

impl<P: EvictionPolicy> OneShotCorrelator<P> {
    pub fn new(policy: P) -> Self {
        Self {
            pending: HashMap::new(),
            policy,
        }
    }

    /// Entry waiting for its exit, if any
    pub fn pending(&self, pid: Option<Pid>) -> Option<&Event> {
        self.pending.get(&pid)
    }
}

impl Default for OneShotCorrelator<IdleTimeout> {
    fn default() -> Self {
        Self::new(IdleTimeout::default())
    }
}

impl<P: EvictionPolicy> Correlator for OneShotCorrelator<P> {
    fn observe(&mut self, event: Event, out: &mut Vec<CompletedCall>) -> Outcome {
        match event.phase {
            Phase::Complete { .. } => {
                out.push(CompletedCall::PrePaired(event));
                Outcome::Completed(1)
            }
            Phase::Entry { .. } => {
                let key = event.pid;
                if let Some(previous) = self.pending.insert(key, event) {
                    debug!("{key:?}: {} never returned, replaced", previous.name);
                }
                Outcome::Pending
            }
            Phase::Exit { .. } => match self.pending.remove(&event.pid) {
                Some(entry) => {
                    out.push(CompletedCall::Paired { entry, exit: event });
                    Outcome::Completed(1)
                }
                None => {
                    debug!("{:?}: exit with no pending entry", event.pid);
                    Outcome::Unmatched
                }
            },
        }
    }

    fn sweep(&mut self, now: KernelTime, _out: &mut Vec<CompletedCall>) -> usize {
        let before = self.pending.len();
        let policy = &self.policy;
        self.pending.retain(|_, e| !policy.is_expired(e.time, now));
        before - self.pending.len()
    }

    fn open_keys(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::NeverEvict;
    use crate::events::testing::{caput, entry, exit};
    use crate::events::Value;
    use std::time::Duration;

    #[test]
    fn test_pre_paired_completes_immediately() {
        let mut c = OneShotCorrelator::new(NeverEvict);
        let mut out = Vec::new();
        let event = caput(10, 20, "target:pv", Value::Double(3.5));

        assert_eq!(c.observe(event.clone(), &mut out), Outcome::Completed(1));
        assert_eq!(out, vec![CompletedCall::PrePaired(event)]);
        assert_eq!(c.open_keys(), 0);
    }

    #[test]
    fn test_pair_ignores_depth() {
        let mut c = OneShotCorrelator::new(NeverEvict);
        let mut out = Vec::new();
        c.observe(entry(4, 1, 0, "rec"), &mut out);
        assert!(c.pending(Some(Pid(4))).is_some());

        assert_eq!(
            c.observe(exit(4, 3, 9, Value::Int(1)), &mut out),
            Outcome::Completed(1)
        );
        assert_eq!(out[0].start().name, "rec");
        assert!(c.pending(Some(Pid(4))).is_none());
    }

    #[test]
    fn test_second_entry_replaces_first() {
        let mut c = OneShotCorrelator::new(NeverEvict);
        let mut out = Vec::new();
        c.observe(entry(4, 1, 0, "first"), &mut out);
        c.observe(entry(4, 1, 1, "second"), &mut out);
        c.observe(exit(4, 1, 2, Value::Null), &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start().name, "second");
    }

    #[test]
    fn test_exit_without_entry() {
        let mut c = OneShotCorrelator::new(NeverEvict);
        let mut out = Vec::new();
        assert_eq!(
            c.observe(exit(4, 1, 2, Value::Null), &mut out),
            Outcome::Unmatched
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_sweep_drops_stale_entries() {
        let mut c = OneShotCorrelator::new(IdleTimeout::new(Duration::from_nanos(50)));
        let mut out = Vec::new();
        c.observe(entry(1, 1, 0, "stale"), &mut out);
        c.observe(entry(2, 1, 90, "fresh"), &mut out);

        assert_eq!(c.sweep(KernelTime(100), &mut out), 1);
        assert!(out.is_empty());
        assert_eq!(c.open_keys(), 1);
    }
}
