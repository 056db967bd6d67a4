//! Span sink that writes to the log

use log::info;

use super::{SpanRecord, SpanSink};
use crate::ids::{narrow, SpanIds};

/// Logs every span at `info` level
#[derive(Debug, Default)]
pub struct LogSink {
    pub exported: u64,
}

/// Trace id as the 64-bit token it was widened from, or in full if it was not
fn trace_label(trace_id: u128) -> String {
    match narrow(trace_id) {
        Some(token) => format!("{:016x}", token.0),
        None => format!("{trace_id:032x}"),
    }
}

fn ids_label(ids: SpanIds) -> String {
    format!("{}/{:016x}", trace_label(ids.trace_id), ids.span_id)
}

/// One-line rendering of a span
fn describe(span: &SpanRecord) -> String {
    let parent = span
        .parent
        .map(|p| format!(" parent={}", ids_label(p)))
        .unwrap_or_default();
    let attributes: Vec<String> = span
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    format!(
        "[{}] {} ids={}{} start={} duration={}ns {}",
        span.kind,
        span.name,
        ids_label(span.ids),
        parent,
        span.start_unix_nanos,
        span.duration_nanos(),
        attributes.join(" "),
    )
}

impl SpanSink for LogSink {
    fn export(&mut self, span: SpanRecord) {
        self.exported += 1;
        info!("{}", describe(&span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraceToken;
    use crate::events::RecordKind;
    use crate::export::AttributeValue;
    use crate::ids::widen;

    fn span(trace_id: u128, parent: Option<SpanIds>) -> SpanRecord {
        SpanRecord {
            kind: RecordKind::Put,
            name: "ioc:pv (1)".to_string(),
            ids: SpanIds {
                trace_id,
                span_id: 2,
            },
            parent,
            start_unix_nanos: 10,
            end_unix_nanos: 25,
            attributes: vec![("resource.value", AttributeValue::I64(1))],
            events: Vec::new(),
        }
    }

    #[test]
    fn test_widened_ids_print_as_tokens() {
        let parent = SpanIds {
            trace_id: widen(TraceToken(0xab)),
            span_id: 1,
        };
        let text = describe(&span(widen(TraceToken(0xab)), Some(parent)));
        assert!(text.contains("ids=00000000000000ab/0000000000000002"));
        assert!(text.contains("parent=00000000000000ab/0000000000000001"));
        assert!(text.contains("duration=15ns resource.value=1"));
    }

    #[test]
    fn test_random_trace_id_prints_in_full() {
        let text = describe(&span(1, None));
        assert!(text.contains("ids=00000000000000000000000000000001/"));
        assert!(!text.contains("parent="));
    }

    #[test]
    fn test_export_counts_spans() {
        let mut sink = LogSink::default();
        sink.export(span(1, None));
        sink.export(span(2, None));
        assert_eq!(sink.exported, 2);
    }
}
