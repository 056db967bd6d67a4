//! Span record handed to a [`SpanSink`](super::SpanSink)

use std::fmt;

use crate::events::{RecordKind, Value};
use crate::ids::SpanIds;

pub const ATTR_RESOURCE_NAME: &str = "resource.name";
pub const ATTR_RESOURCE_VALUE: &str = "resource.value";
pub const ATTR_RESOURCE_FIELD: &str = "resource.field";
pub const ATTR_OS_PID: &str = "os.pid";

/// Name of the sub-event marking the record's own processing timestamp
pub const EVENT_PROCESS: &str = "Process";

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    I64(i64),
    F64(f64),
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Int(v) => AttributeValue::I64(v),
            Value::Uint(v) => match i64::try_from(v) {
                Ok(v) => AttributeValue::I64(v),
                Err(_) => AttributeValue::Str(v.to_string()),
            },
            Value::Double(v) => AttributeValue::F64(v),
            Value::String(s) => AttributeValue::Str(s),
            Value::Null => AttributeValue::Str(Value::Null.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Str(s) => write!(f, "{s:?}"),
            AttributeValue::I64(v) => write!(f, "{v}"),
            AttributeValue::F64(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<AttributeValue> for opentelemetry::Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Str(s) => s.into(),
            AttributeValue::I64(v) => v.into(),
            AttributeValue::F64(v) => v.into(),
        }
    }
}

/// Timestamped annotation inside a span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanEventRecord {
    pub name: &'static str,
    pub unix_nanos: u64,
}

/// A finished span with every identifier and timestamp fixed
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    /// Probe family, selects the service the span is reported under
    pub kind: RecordKind,
    pub name: String,
    pub ids: SpanIds,
    /// Remote parent, known only by its identifiers
    pub parent: Option<SpanIds>,
    pub start_unix_nanos: u64,
    pub end_unix_nanos: u64,
    pub attributes: Vec<(&'static str, AttributeValue)>,
    pub events: Vec<SpanEventRecord>,
}

impl SpanRecord {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn duration_nanos(&self) -> u64 {
        self.end_unix_nanos - self.start_unix_nanos
    }
}
