//! # OpenTelemetry Sink
//!
//! Spans are built through the SDK with every identifier and timestamp
//! supplied up front:
//!
//! - trace id and span id go into the [`SpanBuilder`] directly
//! - the parent, when present, is a remote sampled [`SpanContext`]
//! - start time is set on the builder, end time via `end_with_timestamp`
//!
//! With a parent present the SDK takes the trace id from the parent, so a
//! child span always joins its parent's trace.
//!
//! [`SpanBuilder`]: opentelemetry::trace::SpanBuilder

use std::collections::HashMap;

use anyhow::{Context as _, Result};
use log::{debug, warn};
use opentelemetry::trace::{
    Span as _, SpanContext, TraceContextExt, TraceFlags, TraceState, Tracer as _,
    TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use super::{SpanRecord, SpanSink};
use crate::clock::system_time;
use crate::events::RecordKind;
use crate::ids::{ForcedIdGenerator, SpanIds};

const TRACER_NAME: &str = "pvtrace";

/// Tracer provider exporting to a Zipkin collector in batches
///
/// # Errors
/// Returns an error if the exporter cannot be constructed (bad endpoint URL,
/// HTTP client setup failure)
pub fn zipkin_provider(
    service_name: &str,
    endpoint: &str,
    ids: ForcedIdGenerator,
) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_zipkin::ZipkinExporter::builder()
        .with_collector_endpoint(endpoint.to_string())
        .build()
        .with_context(|| format!("Failed to build Zipkin exporter for {endpoint}"))?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_id_generator(ids)
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.to_string())
                .build(),
        )
        .build())
}

/// Remote, sampled parent context for `parent`
pub fn remote_parent(parent: SpanIds) -> Context {
    let span_context = SpanContext::new(
        parent.otel_trace_id(),
        parent.otel_span_id(),
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    Context::new().with_remote_span_context(span_context)
}

/// Routes each span to the tracer of its probe family
#[derive(Debug, Default)]
pub struct OtelSink {
    tracers: HashMap<RecordKind, SdkTracer>,
    providers: Vec<SdkTracerProvider>,
}

impl OtelSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report spans of `kind` through `provider`
    #[must_use]
    pub fn with_family(mut self, kind: RecordKind, provider: SdkTracerProvider) -> Self {
        self.tracers.insert(kind, provider.tracer(TRACER_NAME));
        self.providers.push(provider);
        self
    }
}

impl SpanSink for OtelSink {
    fn export(&mut self, span: SpanRecord) {
        let Some(tracer) = self.tracers.get(&span.kind) else {
            debug!("no tracer for {} spans, dropping {}", span.kind, span.name);
            return;
        };

        let parent_cx = span.parent.map_or_else(Context::new, remote_parent);
        let attributes: Vec<KeyValue> = span
            .attributes
            .into_iter()
            .map(|(key, value)| KeyValue::new(key, value))
            .collect();

        let builder = tracer
            .span_builder(span.name)
            .with_trace_id(span.ids.otel_trace_id())
            .with_span_id(span.ids.otel_span_id())
            .with_start_time(system_time(span.start_unix_nanos))
            .with_attributes(attributes);

        let mut otel_span = tracer.build_with_context(builder, &parent_cx);
        for event in span.events {
            otel_span.add_event_with_timestamp(event.name, system_time(event.unix_nanos), vec![]);
        }
        otel_span.end_with_timestamp(system_time(span.end_unix_nanos));
    }

    fn shutdown(&mut self) -> Result<()> {
        let mut failed = 0;
        for provider in self.providers.drain(..) {
            if let Err(e) = provider.shutdown() {
                warn!("Tracer provider shutdown failed: {e}");
                failed += 1;
            }
        }
        self.tracers.clear();
        if failed > 0 {
            anyhow::bail!("{failed} tracer provider(s) failed to flush");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraceToken;
    use crate::export::span::{AttributeValue, SpanEventRecord, ATTR_RESOURCE_VALUE};
    use crate::ids::widen;
    use opentelemetry::trace::{SpanId, TraceId};
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    fn provider(exporter: &InMemorySpanExporter, ids: ForcedIdGenerator) -> SdkTracerProvider {
        SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .with_id_generator(ids)
            .build()
    }

    fn sink(kind: RecordKind, exporter: &InMemorySpanExporter) -> OtelSink {
        OtelSink::new().with_family(kind, provider(exporter, ForcedIdGenerator::new()))
    }

    fn record(parent: Option<SpanIds>) -> SpanRecord {
        SpanRecord {
            kind: RecordKind::Process,
            name: "rec1 (42)".to_string(),
            ids: SpanIds {
                trace_id: widen(TraceToken(5)),
                span_id: 7,
            },
            parent,
            start_unix_nanos: 1_000,
            end_unix_nanos: 2_000,
            attributes: vec![(ATTR_RESOURCE_VALUE, AttributeValue::I64(42))],
            events: vec![SpanEventRecord {
                name: "Process",
                unix_nanos: 1_500,
            }],
        }
    }

    #[test]
    fn test_explicit_ids_and_times() {
        let exporter = InMemorySpanExporter::default();
        let mut sink = sink(RecordKind::Process, &exporter);

        sink.export(record(None));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name, "rec1 (42)");
        assert_eq!(
            span.span_context.span_id(),
            SpanId::from_bytes(7u64.to_be_bytes())
        );
        assert_eq!(
            span.span_context.trace_id(),
            TraceId::from_bytes(widen(TraceToken(5)).to_be_bytes())
        );
        assert_eq!(span.parent_span_id, SpanId::INVALID);
        assert_eq!(span.start_time, system_time(1_000));
        assert_eq!(span.end_time, system_time(2_000));
        let value = span
            .attributes
            .iter()
            .find(|kv| kv.key.as_str() == ATTR_RESOURCE_VALUE)
            .map(|kv| &kv.value);
        assert_eq!(value, Some(&opentelemetry::Value::I64(42)));
        assert_eq!(span.events.len(), 1);
    }

    #[test]
    fn test_remote_parent_links_spans() {
        let exporter = InMemorySpanExporter::default();
        let mut sink = sink(RecordKind::Process, &exporter);
        let parent = SpanIds {
            trace_id: widen(TraceToken(1)),
            span_id: 2,
        };

        sink.export(record(Some(parent)));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(
            spans[0].parent_span_id,
            SpanId::from_bytes(2u64.to_be_bytes())
        );
        assert_eq!(spans[0].span_context.trace_id(), parent.otel_trace_id());
    }

    #[test]
    fn test_unrouted_family_is_dropped() {
        let exporter = InMemorySpanExporter::default();
        let mut sink = sink(RecordKind::Put, &exporter);
        sink.export(record(None));
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }

    #[test]
    fn test_forced_generator_drives_implicit_spans() {
        let exporter = InMemorySpanExporter::default();
        let ids = ForcedIdGenerator::new();
        let provider = provider(&exporter, ids.clone());
        let tracer = provider.tracer("test");

        let forced = SpanIds {
            trace_id: 0xabc,
            span_id: 0xdef,
        };
        ids.force(forced);
        tracer.start("first").end();
        // not re-registered: the override is still in effect
        tracer.start("second").end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 2);
        for span in &spans {
            assert_eq!(span.span_context.trace_id(), forced.otel_trace_id());
            assert_eq!(span.span_context.span_id(), forced.otel_span_id());
        }

        ids.clear();
        tracer.start("third").end();
        let spans = exporter.get_finished_spans().unwrap();
        assert_ne!(spans[2].span_context.span_id(), forced.otel_span_id());
    }

    #[test]
    fn test_shutdown_flushes_providers() {
        let exporter = InMemorySpanExporter::default();
        let mut sink = sink(RecordKind::Caput, &exporter);
        assert!(sink.shutdown().is_ok());
        assert!(sink.tracers.is_empty());
    }
}
