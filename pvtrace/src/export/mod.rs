//! # Span Export
//!
//! [`SpanEmitter`] converts completed calls into [`SpanRecord`]s; a
//! [`SpanSink`] delivers them.
//!
//! - [`OtelSink`] - OpenTelemetry SDK, one tracer provider (and so one
//!   service name) per probe family, Zipkin exporter in production
//! - [`LogSink`] - writes spans to the log, for dry runs
//!
//! Delivery failures are the sink's business; the emitter never retries.

pub mod emitter;
pub mod log_sink;
pub mod otel;
pub mod span;

pub use emitter::SpanEmitter;
pub use log_sink::LogSink;
pub use otel::{zipkin_provider, OtelSink};
pub use span::{AttributeValue, SpanEventRecord, SpanRecord};

/// Destination for finished spans
pub trait SpanSink {
    fn export(&mut self, span: SpanRecord);

    /// Flush buffered spans and release resources
    ///
    /// # Errors
    /// Returns an error if buffered spans could not be delivered
    fn shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<S: SpanSink + ?Sized> SpanSink for Box<S> {
    fn export(&mut self, span: SpanRecord) {
        (**self).export(span);
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        (**self).shutdown()
    }
}

/// Collects spans in memory
impl SpanSink for Vec<SpanRecord> {
    fn export(&mut self, span: SpanRecord) {
        self.push(span);
    }
}
