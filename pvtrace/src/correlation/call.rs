//! # Recursive Call Correlation
//!
//! `dbProcess` re-enters itself while following forward links, so one task
//! can have several calls open at once. The probe numbers them: the Nth entry
//! since the outermost call began carries depth N, and the exit closing it
//! carries the same depth. [`CallCorrelator`] keeps, per task, the calls in
//! entry order and attaches each exit to position `depth - 1`.
//!
//! Nothing is emitted until the depth-1 exit arrives. At that point every
//! nested call has returned, so all complete calls are flushed in entry order
//! and the task's state is dropped. A call still missing its exit is dropped
//! with it.

use std::collections::HashMap;

use log::{debug, warn};

use super::{CompletedCall, Correlator, EvictionPolicy, IdleTimeout, Outcome};
use crate::domain::{KernelTime, Pid};
use crate::events::{Event, Phase};

/// Upper bound on recycled call vectors kept for reuse
const MAX_SPARE: usize = 64;

/// One invocation: its entry and, once seen, its exit
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub entry: Event,
    pub exit: Option<Event>,
}

impl CallRecord {
    pub fn is_complete(&self) -> bool {
        self.exit.is_some()
    }

    fn into_completed(self) -> Option<CompletedCall> {
        let exit = self.exit?;
        Some(CompletedCall::Paired {
            entry: self.entry,
            exit,
        })
    }
}

/// Open calls of one task since its outermost call began
#[derive(Debug)]
struct ProcessState {
    calls: Vec<CallRecord>,
    last_seen: KernelTime,
}

/// Per-task entry/exit state machine with recursion support
#[derive(Debug)]
pub struct CallCorrelator<P = IdleTimeout> {
    procs: HashMap<Pid, ProcessState>,
    /// Emptied call vectors, reused so steady-state processing does not allocate
    spare: Vec<Vec<CallRecord>>,
    policy: P,
}

impl<P: EvictionPolicy> CallCorrelator<P> {
    pub fn new(policy: P) -> Self {
        Self {
            procs: HashMap::new(),
            spare: Vec::new(),
            policy,
        }
    }

    /// Calls currently held for `pid`, in entry order
    pub fn calls(&self, pid: Pid) -> Option<&[CallRecord]> {
        self.procs.get(&pid).map(|state| state.calls.as_slice())
    }

    fn on_entry(&mut self, pid: Pid, depth: u32, event: Event) -> Outcome {
        let spare = &mut self.spare;
        let state = self.procs.entry(pid).or_insert_with(|| ProcessState {
            calls: spare.pop().unwrap_or_default(),
            last_seen: event.time,
        });

        if depth as usize != state.calls.len() + 1 {
            debug!(
                "{pid}: entry reports depth {depth} with {} calls open",
                state.calls.len()
            );
        }

        state.last_seen = event.time;
        state.calls.push(CallRecord {
            entry: event,
            exit: None,
        });
        Outcome::Pending
    }

    fn on_exit(
        &mut self,
        pid: Pid,
        depth: u32,
        event: Event,
        out: &mut Vec<CompletedCall>,
    ) -> Outcome {
        let Some(state) = self.procs.get_mut(&pid) else {
            debug!("{pid}: exit at depth {depth} with no open calls");
            return Outcome::Unmatched;
        };
        state.last_seen = event.time;
        let open = state.calls.len();

        let slot = (depth as usize)
            .checked_sub(1)
            .and_then(|i| state.calls.get_mut(i));
        let outcome = match slot {
            Some(record) if !record.is_complete() => {
                record.exit = Some(event);
                Outcome::Pending
            }
            Some(_) => {
                debug!("{pid}: duplicate exit at depth {depth}");
                Outcome::Ignored
            }
            None => {
                debug!("{pid}: exit at depth {depth} but only {open} calls open");
                Outcome::Unmatched
            }
        };

        if depth != 1 {
            return outcome;
        }

        match self.procs.remove(&pid) {
            Some(state) => Outcome::Completed(self.flush(state, out)),
            None => outcome,
        }
    }

    /// Emit the complete calls of `state` in entry order, drop the rest
    fn flush(&mut self, mut state: ProcessState, out: &mut Vec<CompletedCall>) -> usize {
        let before = out.len();
        let calls = state.calls.drain(..);
        out.extend(calls.filter_map(CallRecord::into_completed));
        if self.spare.len() < MAX_SPARE {
            self.spare.push(state.calls);
        }
        out.len() - before
    }
}

impl Default for CallCorrelator<IdleTimeout> {
    fn default() -> Self {
        Self::new(IdleTimeout::default())
    }
}

impl<P: EvictionPolicy> Correlator for CallCorrelator<P> {
    fn observe(&mut self, event: Event, out: &mut Vec<CompletedCall>) -> Outcome {
        match (event.phase, event.pid) {
            (Phase::Complete { .. }, _) => {
                out.push(CompletedCall::PrePaired(event));
                Outcome::Completed(1)
            }
            (_, None) => {
                debug!("{} event without pid ignored", event.kind);
                Outcome::Ignored
            }
            (Phase::Entry { depth }, Some(pid)) => self.on_entry(pid, depth, event),
            (Phase::Exit { depth }, Some(pid)) => self.on_exit(pid, depth, event, out),
        }
    }

    fn sweep(&mut self, now: KernelTime, out: &mut Vec<CompletedCall>) -> usize {
        let expired: Vec<Pid> = self
            .procs
            .iter()
            .filter(|(_, state)| self.policy.is_expired(state.last_seen, now))
            .map(|(pid, _)| *pid)
            .collect();

        for pid in &expired {
            if let Some(state) = self.procs.remove(pid) {
                let open = state.calls.iter().filter(|c| !c.is_complete()).count();
                warn!("{pid}: evicting stale state ({open} calls never returned)");
                self.flush(state, out);
            }
        }

        expired.len()
    }

    fn open_keys(&self) -> usize {
        self.procs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::NeverEvict;
    use crate::events::testing::{caput, entry, exit};
    use crate::events::Value;
    use std::time::Duration;

    fn correlator() -> CallCorrelator<NeverEvict> {
        CallCorrelator::new(NeverEvict)
    }

    #[test]
    fn test_entry_emits_nothing() {
        let mut c = correlator();
        let mut out = Vec::new();
        assert_eq!(
            c.observe(entry(10, 1, 100, "rec1"), &mut out),
            Outcome::Pending
        );
        assert!(out.is_empty());
        assert_eq!(c.calls(Pid(10)).map(<[CallRecord]>::len), Some(1));
    }

    #[test]
    fn test_single_call() {
        let mut c = correlator();
        let mut out = Vec::new();
        c.observe(entry(10, 1, 100, "rec1"), &mut out);
        let outcome = c.observe(exit(10, 1, 150, Value::Uint(42)), &mut out);

        assert_eq!(outcome, Outcome::Completed(1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start().name, "rec1");
        assert_eq!(out[0].end().value, Value::Uint(42));
        assert!(out[0].start().time <= out[0].end().time);
        assert_eq!(c.open_keys(), 0);
    }

    #[test]
    fn test_recursion_pairs_by_position() {
        const N: u32 = 5;
        let mut c = correlator();
        let mut out = Vec::new();

        for depth in 1..=N {
            let name = format!("rec{depth}");
            c.observe(entry(7, depth, u64::from(depth), &name), &mut out);
        }
        for depth in (1..=N).rev() {
            let value = Value::Int(depth.into());
            c.observe(exit(7, depth, 100 - u64::from(depth), value), &mut out);
        }

        assert_eq!(out.len(), N as usize);
        for (i, call) in out.iter().enumerate() {
            let depth = u32::try_from(i).unwrap() + 1;
            assert_eq!(call.start().name, format!("rec{depth}"));
            assert_eq!(call.end().value, Value::Int(depth.into()));
        }
        assert!(c.calls(Pid(7)).is_none());
    }

    #[test]
    fn test_nested_flush_waits_for_outermost() {
        let mut c = correlator();
        let mut out = Vec::new();
        c.observe(entry(1, 1, 0, "outer"), &mut out);
        c.observe(entry(1, 2, 1, "inner"), &mut out);
        assert_eq!(
            c.observe(exit(1, 2, 2, Value::Null), &mut out),
            Outcome::Pending
        );
        assert!(out.is_empty());

        c.observe(exit(1, 1, 3, Value::Null), &mut out);
        let names: Vec<_> = out.iter().map(|call| call.start().name.as_str()).collect();
        assert_eq!(names, ["outer", "inner"]);
    }

    #[test]
    fn test_incomplete_call_dropped_at_flush() {
        let mut c = correlator();
        let mut out = Vec::new();
        c.observe(entry(1, 1, 0, "outer"), &mut out);
        c.observe(entry(1, 2, 1, "lost"), &mut out);

        assert_eq!(
            c.observe(exit(1, 1, 3, Value::Null), &mut out),
            Outcome::Completed(1)
        );
        assert_eq!(out[0].start().name, "outer");
        assert_eq!(c.open_keys(), 0);
    }

    #[test]
    fn test_unmatched_exit_is_noop() {
        let mut c = correlator();
        let mut out = Vec::new();
        assert_eq!(
            c.observe(exit(3, 1, 5, Value::Null), &mut out),
            Outcome::Unmatched
        );

        c.observe(entry(3, 1, 6, "rec"), &mut out);
        assert_eq!(
            c.observe(exit(3, 4, 7, Value::Null), &mut out),
            Outcome::Unmatched
        );
        assert_eq!(
            c.observe(exit(3, 0, 7, Value::Null), &mut out),
            Outcome::Unmatched
        );
        assert!(out.is_empty());
        assert_eq!(c.open_keys(), 1);
    }

    #[test]
    fn test_duplicate_exit_keeps_first() {
        let mut c = correlator();
        let mut out = Vec::new();
        c.observe(entry(3, 1, 0, "outer"), &mut out);
        c.observe(entry(3, 2, 1, "inner"), &mut out);
        c.observe(exit(3, 2, 2, Value::Uint(1)), &mut out);
        assert_eq!(
            c.observe(exit(3, 2, 3, Value::Uint(2)), &mut out),
            Outcome::Ignored
        );
        c.observe(exit(3, 1, 4, Value::Null), &mut out);

        assert_eq!(out[1].end().value, Value::Uint(1));
    }

    #[test]
    fn test_tasks_are_independent() {
        let mut c = correlator();
        let mut out = Vec::new();
        c.observe(entry(1, 1, 0, "a"), &mut out);
        c.observe(entry(2, 1, 1, "b"), &mut out);
        c.observe(exit(2, 1, 2, Value::Null), &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start().name, "b");
        assert!(c.calls(Pid(1)).is_some());
    }

    #[test]
    fn test_pre_paired_passes_through() {
        let mut c = correlator();
        let mut out = Vec::new();
        assert_eq!(
            c.observe(caput(1, 2, "link", Value::Null), &mut out),
            Outcome::Completed(1)
        );
        assert!(matches!(out[0], CompletedCall::PrePaired(_)));
    }

    #[test]
    fn test_sweep_evicts_idle_state() {
        let mut c = CallCorrelator::new(IdleTimeout::new(Duration::from_nanos(1_000)));
        let mut out = Vec::new();
        c.observe(entry(1, 1, 0, "dead"), &mut out);
        c.observe(entry(1, 2, 10, "done"), &mut out);
        c.observe(exit(1, 2, 20, Value::Null), &mut out);
        c.observe(entry(2, 1, 5_000, "alive"), &mut out);

        assert_eq!(c.sweep(KernelTime(5_500), &mut out), 1);
        // the completed inner call survives, the outer one never returned
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start().name, "done");
        assert!(c.calls(Pid(1)).is_none());
        assert!(c.calls(Pid(2)).is_some());
    }

    #[test]
    fn test_state_reused_after_flush() {
        let mut c = correlator();
        let mut out = Vec::new();
        for round in 0..3 {
            c.observe(entry(9, 1, round, "rec"), &mut out);
            c.observe(exit(9, 1, round + 1, Value::Null), &mut out);
        }
        assert_eq!(out.len(), 3);
        assert_eq!(c.spare.len(), 1);
    }
}
