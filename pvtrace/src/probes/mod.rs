//! Probe management: load the probe object, attach to `libdbCore`, read the
//! ring buffers

pub mod ebpf_setup;
pub mod ring;

pub use ebpf_setup::{attach_probes, attach_uprobe, init_ebpf_logger, load_ebpf_object};
pub use ring::RingBuffers;
