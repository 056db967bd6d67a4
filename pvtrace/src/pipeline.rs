//! # Event Pipeline
//!
//! Runs every ring buffer record through decode, correlate and emit.
//!
//! ## Routing
//!
//! - [`RecordKind::Process`] → process correlator (recursive by default)
//! - [`RecordKind::Put`], [`RecordKind::Caput`] → one-shot correlator
//!
//! Records that fail to decode are logged, counted and dropped; the pipeline
//! never stops on bad input. All state is owned by the single consumer loop.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};

use crate::clock::BootClock;
use crate::correlation::{
    CallCorrelator, CompletedCall, Correlator, IdleTimeout, NeverEvict, OneShotCorrelator,
    Outcome,
};
use crate::domain::{DecodeError, KernelTime};
use crate::events::{decode, Event, RecordKind};
use crate::export::{SpanEmitter, SpanSink};

/// Correlation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationSettings {
    /// Pair nested `dbProcess` calls by depth; off means one pending entry per task
    pub track_recursion: bool,
    /// Idle time after which a task's open calls are evicted, `None` to keep forever
    pub idle_timeout: Option<Duration>,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            track_recursion: true,
            idle_timeout: Some(IdleTimeout::default().max_idle),
        }
    }
}

impl CorrelationSettings {
    fn process_correlator(self) -> Box<dyn Correlator> {
        match (self.track_recursion, self.idle_timeout) {
            (true, Some(max_idle)) => Box::new(CallCorrelator::new(IdleTimeout::new(max_idle))),
            (true, None) => Box::new(CallCorrelator::new(NeverEvict)),
            (false, Some(max_idle)) => Box::new(OneShotCorrelator::new(IdleTimeout::new(max_idle))),
            (false, None) => Box::new(OneShotCorrelator::new(NeverEvict)),
        }
    }

    fn oneshot_correlator(self) -> Box<dyn Correlator> {
        match self.idle_timeout {
            Some(max_idle) => Box::new(OneShotCorrelator::new(IdleTimeout::new(max_idle))),
            None => Box::new(OneShotCorrelator::new(NeverEvict)),
        }
    }
}

/// Pipeline counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub process_records: u64,
    pub put_records: u64,
    pub caput_records: u64,
    /// Records shorter than their layout
    pub malformed: u64,
    /// Process records with a state tag other than entry or exit
    pub unknown_state: u64,
    /// Exits with no entry to close
    pub unmatched: u64,
    /// Duplicate exits and events without a task id
    pub ignored: u64,
    pub spans: u64,
    /// Keys dropped by the idle sweep
    pub evicted: u64,
}

impl PipelineStats {
    pub fn records(&self) -> u64 {
        self.process_records + self.put_records + self.caput_records
    }

    fn count_record(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Process => self.process_records += 1,
            RecordKind::Put => self.put_records += 1,
            RecordKind::Caput => self.caput_records += 1,
        }
    }
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records (process: {}, put: {}, caput: {}), {} spans, malformed: {}, unknown state: {}, unmatched: {}, ignored: {}, evicted: {}",
            self.records(),
            self.process_records,
            self.put_records,
            self.caput_records,
            self.spans,
            self.malformed,
            self.unknown_state,
            self.unmatched,
            self.ignored,
            self.evicted,
        )
    }
}

/// Decode → correlate → emit, synchronously, one record at a time
pub struct Pipeline<S> {
    process: Box<dyn Correlator>,
    oneshot: Box<dyn Correlator>,
    emitter: SpanEmitter,
    sink: S,
    /// Reused output buffer for completed calls
    completed: Vec<CompletedCall>,
    pub stats: PipelineStats,
}

impl<S: SpanSink> Pipeline<S> {
    pub fn new(clock: BootClock, sink: S, settings: CorrelationSettings) -> Self {
        Self::with_correlators(
            clock,
            sink,
            settings.process_correlator(),
            settings.oneshot_correlator(),
        )
    }

    /// Pipeline with caller-supplied correlators for the process family and
    /// the pre-paired families
    pub fn with_correlators(
        clock: BootClock,
        sink: S,
        process: Box<dyn Correlator>,
        oneshot: Box<dyn Correlator>,
    ) -> Self {
        Self {
            process,
            oneshot,
            emitter: SpanEmitter::new(clock),
            sink,
            completed: Vec::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Handle one raw record from the ring buffer of `kind`
    pub fn handle_record(&mut self, kind: RecordKind, bytes: &[u8]) {
        self.stats.count_record(kind);
        match decode(kind, bytes) {
            Ok(event) => self.handle_event(event),
            Err(e @ DecodeError::MalformedRecord { .. }) => {
                self.stats.malformed += 1;
                warn!("Dropping record: {e}");
            }
            Err(e @ DecodeError::UnknownState(_)) => {
                self.stats.unknown_state += 1;
                warn!("Dropping record: {e}");
            }
        }
    }

    /// Correlate one decoded event and emit whatever it completes
    pub fn handle_event(&mut self, event: Event) {
        let correlator = match event.kind {
            RecordKind::Process => &mut self.process,
            RecordKind::Put | RecordKind::Caput => &mut self.oneshot,
        };

        match correlator.observe(event, &mut self.completed) {
            Outcome::Pending | Outcome::Completed(_) => {}
            Outcome::Unmatched => self.stats.unmatched += 1,
            Outcome::Ignored => self.stats.ignored += 1,
        }
        self.drain_completed();
    }

    /// Apply the eviction policy at kernel time `now`; returns keys evicted
    pub fn sweep(&mut self, now: KernelTime) -> usize {
        let evicted = self.process.sweep(now, &mut self.completed)
            + self.oneshot.sweep(now, &mut self.completed);
        if evicted > 0 {
            debug!("Sweep evicted {evicted} stale keys");
            self.stats.evicted += evicted as u64;
        }
        self.drain_completed();
        evicted
    }

    /// Tasks and keys with open correlation state
    pub fn open_keys(&self) -> usize {
        self.process.open_keys() + self.oneshot.open_keys()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Stop the pipeline; open correlation state is discarded
    pub fn into_sink(self) -> S {
        if self.open_keys() > 0 {
            debug!("Discarding {} keys with open calls", self.open_keys());
        }
        self.sink
    }

    fn drain_completed(&mut self) {
        for call in self.completed.drain(..) {
            self.emitter.emit(call, &mut self.sink);
            self.stats.spans += 1;
        }
    }
}
