//! # Span Emission
//!
//! Turns one [`CompletedCall`] into one [`SpanRecord`] and hands it to a sink.
//!
//! - **Name**: `"<record> (<value>)"`, value taken from the exit event
//! - **Identifiers**: widened trace token and span id of the entry event,
//!   carried explicitly in the record so the sink never draws random ones
//! - **Parent**: remote parent built from the entry's parent pair when its
//!   trace token is non-zero
//! - **Timing**: explicit start and end, kernel time translated through the
//!   [`BootClock`]; never "now"

use std::mem;

use log::trace;

use super::span::{
    AttributeValue, SpanEventRecord, SpanRecord, ATTR_OS_PID, ATTR_RESOURCE_FIELD,
    ATTR_RESOURCE_NAME, ATTR_RESOURCE_VALUE, EVENT_PROCESS,
};
use super::SpanSink;
use crate::clock::BootClock;
use crate::correlation::CompletedCall;
use crate::events::Value;
use crate::ids::SpanIds;

/// Builds spans from completed calls
#[derive(Debug, Clone, Copy)]
pub struct SpanEmitter {
    clock: BootClock,
}

impl SpanEmitter {
    pub fn new(clock: BootClock) -> Self {
        Self { clock }
    }

    /// Build the span for `call`, consuming it
    pub fn build(&self, call: CompletedCall) -> SpanRecord {
        let (start, value, end_time, record_time) = match call {
            CompletedCall::Paired { entry, exit } => {
                (entry, exit.value, exit.time, exit.record_time)
            }
            CompletedCall::PrePaired(mut event) => {
                let value = mem::replace(&mut event.value, Value::Null);
                let end = event.end_time();
                let record_time = event.record_time;
                (event, value, end, record_time)
            }
        };

        let start_unix_nanos = self.clock.to_unix_nanos(start.time);
        // cross-cpu timestamps can be a few ns out of order
        let end_unix_nanos = self.clock.to_unix_nanos(end_time).max(start_unix_nanos);

        let parent = (!start.parent.trace.is_zero())
            .then(|| SpanIds::from_pair(start.parent));

        let mut attributes = Vec::with_capacity(4);
        if let Some(field) = start.field {
            attributes.push((ATTR_RESOURCE_FIELD, AttributeValue::Str(field)));
        }
        if let Some(pid) = start.pid {
            attributes.push((ATTR_OS_PID, AttributeValue::I64(i64::from(pid.0))));
        }

        let name = format!("{} ({value})", start.name);
        attributes.push((ATTR_RESOURCE_NAME, AttributeValue::Str(start.name)));
        attributes.push((ATTR_RESOURCE_VALUE, AttributeValue::from(value)));

        let events = record_time
            .map(|t| SpanEventRecord {
                name: EVENT_PROCESS,
                unix_nanos: t.to_unix_nanos(),
            })
            .into_iter()
            .collect();

        SpanRecord {
            kind: start.kind,
            name,
            ids: SpanIds::from_pair(start.ids),
            parent,
            start_unix_nanos,
            end_unix_nanos,
            attributes,
            events,
        }
    }

    /// Build the span for `call` and hand it to `sink`
    pub fn emit<S: SpanSink + ?Sized>(&self, call: CompletedCall, sink: &mut S) {
        let span = self.build(call);
        trace!(
            "span {} trace={:032x} span={:016x} parent={:?}",
            span.name,
            span.ids.trace_id,
            span.ids.span_id,
            span.parent.map(|p| p.span_id)
        );
        sink.export(span);
    }
}
