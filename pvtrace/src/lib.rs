//! # pvtrace - Distributed Tracing for EPICS Record Processing
//!
//! pvtrace turns uprobe events from an IOC's `libdbCore` into distributed
//! trace spans. A record processed in one IOC that writes to a record in
//! another (through a channel access link) shows up as one trace spanning
//! both processes.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        EPICS IOC(s)                             │
//! │        dbProcess / dbPutField / dbCaPutLinkCallback             │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ uprobes / uretprobes
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Probe object (kernel, external)                │
//! │  ring_buf (process) · ring_buf_put · ring_buf_caput             │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ fixed-layout records
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      pvtrace (this crate)                       │
//! │                                                                 │
//! │  ┌──────────┐   ┌─────────────┐   ┌─────────────┐   ┌────────┐ │
//! │  │  events  │──▶│ correlation │──▶│   export    │──▶│  sink  │ │
//! │  │ (decode) │   │ (pair calls)│   │ (emitter)   │   │ Zipkin │ │
//! │  └──────────┘   └─────────────┘   └─────────────┘   └────────┘ │
//! │                                         ▲                       │
//! │                             ids (trace id widening),            │
//! │                             clock (kernel → wall time)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`events`]: decode raw records into typed events and tagged values
//! - [`correlation`]: pair entry and exit events, including recursion
//! - [`ids`]: 64-bit tokens to 128-bit trace ids, sticky id generator
//! - [`clock`]: monotonic kernel time and EPICS time to Unix time
//! - [`export`]: span construction and sinks (OpenTelemetry, log)
//! - [`pipeline`]: decode → correlate → emit for one record at a time
//! - [`probes`]: load the probe object, attach uprobes, drain ring buffers
//! - [`preflight`]: privilege, kernel and library checks
//! - [`config`], [`cli`]: command line and JSON configuration
//! - [`domain`]: newtypes and error types
//!
//! ## Typical Usage
//!
//! ```bash
//! # Trace every IOC using this libdbCore, export to a local Zipkin
//! sudo ./pvtrace -p /opt/epics/base/lib/linux-x86_64/libdbCore.so \
//!     --bpf-object pvtrace.bpf.o
//!
//! # Dry run: print spans instead of exporting them
//! RUST_LOG=info sudo ./pvtrace --config pvtrace.json --exporter log
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod domain;
pub mod events;
pub mod export;
pub mod ids;
pub mod pipeline;
pub mod preflight;
pub mod probes;
