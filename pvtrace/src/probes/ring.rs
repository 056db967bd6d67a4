//! Ring buffer consumption
//!
//! One ring buffer per record family. Each poll drains all three into the
//! pipeline; records are handled in ring order within a family.

use aya::maps::{MapData, RingBuf};
use aya::Ebpf;

use crate::domain::ProbeError;
use crate::events::RecordKind;
use crate::export::SpanSink;
use crate::pipeline::Pipeline;

/// The three event ring buffers, taken out of the loaded object
pub struct RingBuffers {
    buffers: Vec<(RecordKind, RingBuf<MapData>)>,
}

impl RingBuffers {
    /// Take ownership of the ring buffer maps
    ///
    /// # Errors
    /// Returns an error if a map is missing or is not a ring buffer
    pub fn take(bpf: &mut Ebpf) -> Result<Self, ProbeError> {
        let mut buffers = Vec::with_capacity(RecordKind::ALL.len());
        for kind in RecordKind::ALL {
            let missing = || ProbeError::RingBufferNotFound(kind.map_name().to_string());
            let map = bpf.take_map(kind.map_name()).ok_or_else(missing)?;
            let ring = RingBuf::try_from(map).map_err(|_| missing())?;
            buffers.push((kind, ring));
        }
        Ok(Self { buffers })
    }

    /// Feed every available record to `pipeline`; returns the number read
    pub fn drain_into<S: SpanSink>(&mut self, pipeline: &mut Pipeline<S>) -> usize {
        let mut count = 0;
        for (kind, ring) in &mut self.buffers {
            while let Some(item) = ring.next() {
                pipeline.handle_record(*kind, &item);
                count += 1;
            }
        }
        count
    }
}
