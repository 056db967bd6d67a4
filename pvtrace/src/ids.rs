//! # Identifier Propagation
//!
//! The probes hand out 64-bit trace tokens, one per logical trace, and 64-bit
//! span ids. Output spans need 128-bit trace ids, so a token is widened by
//! copying it into both halves. The result is stable and recognisable: a
//! trace id whose halves match came from a probe.
//!
//! Span identifiers are never left to chance. [`SpanIds`] carries the exact
//! trace id and span id a span must have and is passed straight into span
//! construction (see [`crate::export`]).
//!
//! [`ForcedIdGenerator`] is the tracer provider's id source. It hands out
//! random ids unless a caller has registered an override, in which case every
//! id it produces is the registered one until the override is cleared or
//! replaced. Nothing clears it automatically.

use std::sync::{Arc, Mutex, PoisonError};

use opentelemetry::trace::{SpanId, TraceId};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};

use crate::domain::{IdPair, TraceToken};

/// Copy a 64-bit token into both halves of a 128-bit trace id
pub fn widen(token: TraceToken) -> u128 {
    let t = u128::from(token.0);
    (t << 64) | t
}

/// Recover the token from a widened trace id, `None` if the halves differ
#[allow(clippy::cast_possible_truncation)]
pub fn narrow(trace_id: u128) -> Option<TraceToken> {
    let high = (trace_id >> 64) as u64;
    let low = trace_id as u64;
    (high == low).then_some(TraceToken(low))
}

/// Exact identifiers for one span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanIds {
    pub trace_id: u128,
    pub span_id: u64,
}

impl SpanIds {
    /// Identifiers for a probe-reported pair: widened token, span id as is
    pub fn from_pair(pair: IdPair) -> Self {
        Self {
            trace_id: widen(pair.trace),
            span_id: pair.span,
        }
    }

    pub fn otel_trace_id(self) -> TraceId {
        TraceId::from_bytes(self.trace_id.to_be_bytes())
    }

    pub fn otel_span_id(self) -> SpanId {
        SpanId::from_bytes(self.span_id.to_be_bytes())
    }
}

/// Id generator with a sticky override
///
/// Clones share the same override, so a handle kept by the caller controls
/// the generator installed in the tracer provider.
#[derive(Debug, Clone, Default)]
pub struct ForcedIdGenerator {
    forced: Arc<Mutex<Option<SpanIds>>>,
}

impl ForcedIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following span use `ids` until cleared or replaced
    pub fn force(&self, ids: SpanIds) {
        *self.forced.lock().unwrap_or_else(PoisonError::into_inner) = Some(ids);
    }

    /// Return to random ids
    pub fn clear(&self) {
        *self.forced.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn forced(&self) -> Option<SpanIds> {
        *self.forced.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdGenerator for ForcedIdGenerator {
    fn new_trace_id(&self) -> TraceId {
        match self.forced() {
            Some(ids) => ids.otel_trace_id(),
            None => RandomIdGenerator::default().new_trace_id(),
        }
    }

    fn new_span_id(&self) -> SpanId {
        match self.forced() {
            Some(ids) => ids.otel_span_id(),
            None => RandomIdGenerator::default().new_span_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_duplicates_halves() {
        assert_eq!(widen(TraceToken(1)), (1u128 << 64) | 1);
        assert_eq!(widen(TraceToken(0)), 0);
        let id = widen(TraceToken(0xdead_beef_0000_0001));
        assert_eq!(id >> 64, id & u128::from(u64::MAX));
    }

    #[test]
    fn test_widen_is_deterministic() {
        let token = TraceToken(0x1234_5678_9abc_def0);
        assert_eq!(widen(token), widen(token));
        assert_ne!(widen(token), widen(TraceToken(0x1234_5678_9abc_def1)));
    }

    #[test]
    fn test_narrow_inverts_widen() {
        let token = TraceToken(u64::MAX - 3);
        assert_eq!(narrow(widen(token)), Some(token));
        assert_eq!(narrow(1), None);
    }

    #[test]
    fn test_span_ids_bytes() {
        let ids = SpanIds::from_pair(IdPair::new(0xabc, 0xdef));
        assert_eq!(
            ids.otel_span_id(),
            SpanId::from_bytes(0xdef_u64.to_be_bytes())
        );
        assert_eq!(
            ids.otel_trace_id(),
            TraceId::from_bytes(((0xabc_u128 << 64) | 0xabc).to_be_bytes())
        );
    }

    #[test]
    fn test_forced_ids_are_sticky() {
        let generator = ForcedIdGenerator::new();
        let ids = SpanIds {
            trace_id: 0xabc,
            span_id: 0xdef,
        };
        generator.force(ids);

        for _ in 0..2 {
            assert_eq!(generator.new_trace_id(), ids.otel_trace_id());
            assert_eq!(generator.new_span_id(), ids.otel_span_id());
        }
    }

    #[test]
    fn test_clear_returns_to_random() {
        let generator = ForcedIdGenerator::new();
        let ids = SpanIds {
            trace_id: 0xabc,
            span_id: 0xdef,
        };
        generator.force(ids);
        generator.clear();

        assert_eq!(generator.forced(), None);
        assert_ne!(generator.new_span_id(), ids.otel_span_id());
    }

    #[test]
    fn test_clones_share_override() {
        let generator = ForcedIdGenerator::new();
        let handle = generator.clone();
        handle.force(SpanIds {
            trace_id: 1,
            span_id: 2,
        });
        let expected = SpanId::from_bytes(2u64.to_be_bytes());
        assert_eq!(generator.new_span_id(), expected);
    }
}
