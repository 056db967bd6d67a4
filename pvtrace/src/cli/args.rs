//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::ExporterKind;

#[derive(Parser, Debug, Default)]
#[command(
    name = "pvtrace",
    about = "Trace EPICS record processing across IOCs and export spans",
    after_help = "\
EXAMPLES:
    sudo pvtrace -p /opt/epics/base/lib/linux-x86_64/libdbCore.so --bpf-object pvtrace.bpf.o
    sudo pvtrace --config pvtrace.json --exporter log
    sudo pvtrace --config pvtrace.json --pid 4242 --duration 60"
)]
pub struct Args {
    /// JSON config file; command line flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to libdbCore
    #[arg(short = 'p', long = "path", value_name = "LIB")]
    pub library: Option<PathBuf>,

    /// Compiled probe object providing the uprobes and ring buffers
    #[arg(long, value_name = "FILE")]
    pub bpf_object: Option<PathBuf>,

    /// Only trace this process
    #[arg(long)]
    pub pid: Option<u32>,

    /// Where spans go
    #[arg(long, value_enum)]
    pub exporter: Option<ExporterKind>,

    /// Zipkin collector URL
    #[arg(long, value_name = "URL")]
    pub zipkin_endpoint: Option<String>,

    /// Service name for record processing spans
    #[arg(long, value_name = "NAME")]
    pub process_service: Option<String>,

    /// Service name for dbPutField spans
    #[arg(long, value_name = "NAME")]
    pub put_service: Option<String>,

    /// Service name for channel access put spans
    #[arg(long, value_name = "NAME")]
    pub caput_service: Option<String>,

    /// Ring buffer poll interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Evict a task's open calls after this many idle seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Pair each record exit with the last entry, ignoring nesting
    #[arg(long)]
    pub no_recursion: bool,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
