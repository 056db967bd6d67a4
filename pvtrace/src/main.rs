//! # pvtrace - Main Entry Point
//!
//! Loads the probes, then polls the ring buffers until interrupted, the
//! duration limit is reached or the traced process exits. Span exporters are
//! built and shut down outside the async runtime.

use anyhow::{Context, Result};
use aya::Ebpf;
use clap::Parser;
use log::info;
use std::path::Path;
use std::time::{Duration, Instant};

use pvtrace::cli::Args;
use pvtrace::clock::{monotonic_now, BootClock};
use pvtrace::config::{Config, ExporterKind};
use pvtrace::domain::ConfigError;
use pvtrace::events::RecordKind;
use pvtrace::export::{zipkin_provider, LogSink, OtelSink, SpanSink};
use pvtrace::ids::ForcedIdGenerator;
use pvtrace::pipeline::Pipeline;
use pvtrace::preflight::run_preflight_checks;
use pvtrace::probes::{attach_probes, init_ebpf_logger, load_ebpf_object, RingBuffers};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

const STATS_INTERVAL: Duration = Duration::from_secs(10);

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string().to_lowercase();
    if msg.contains("permission denied") || msg.contains("requires root") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// One tracer provider per probe family, all sharing one id generator
fn build_sink(config: &Config) -> Result<Box<dyn SpanSink>> {
    match config.exporter {
        ExporterKind::Log => Ok(Box::new(LogSink::default())),
        ExporterKind::Zipkin => {
            let ids = ForcedIdGenerator::new();
            let services = [
                (RecordKind::Process, &config.services.process),
                (RecordKind::Put, &config.services.put),
                (RecordKind::Caput, &config.services.caput),
            ];
            let mut sink = OtelSink::new();
            for (kind, service) in services {
                let provider = zipkin_provider(service, &config.zipkin_endpoint, ids.clone())?;
                sink = sink.with_family(kind, provider);
            }
            Ok(Box::new(sink))
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;
    let quiet = config.quiet;

    let library = config
        .library
        .as_deref()
        .ok_or(ConfigError::Missing("-p/--path <LIB>"))?;
    let bpf_object = config
        .bpf_object
        .as_deref()
        .ok_or(ConfigError::Missing("--bpf-object <FILE>"))?;

    run_preflight_checks(library, bpf_object, config.pid)?;

    if !quiet {
        println!("pvtrace v{}", env!("CARGO_PKG_VERSION"));
        println!("library: {}", library.display());
        if let Some(pid) = config.pid {
            println!("pid: {pid}");
        }
        match config.exporter {
            ExporterKind::Zipkin => println!("export: zipkin {}", config.zipkin_endpoint),
            ExporterKind::Log => println!("export: log"),
        }
    }

    let mut bpf = load_ebpf_object(bpf_object)?;
    let attached = attach_probes(&mut bpf, library, config.pid)?;
    let mut rings = RingBuffers::take(&mut bpf)?;

    let sink = build_sink(&config)?;
    // before the first record: every kernel timestamp is translated with it
    let clock = BootClock::capture();
    info!("Boot clock offset: {} ns", clock.offset_ns());

    let mut pipeline = Pipeline::new(clock, sink, config.correlation());

    if !quiet {
        println!("probes: {attached} attached");
        println!("start");
    }

    let started = Instant::now();
    let exit_reason = poll_loop(&mut bpf, &mut rings, &mut pipeline, &config)?;

    if !quiet {
        eprintln!(
            "\n{}: {:.1}s, {}",
            exit_reason,
            started.elapsed().as_secs_f64(),
            pipeline.stats
        );
    }

    // open calls are discarded; spans already emitted are flushed
    let mut sink = pipeline.into_sink();
    sink.shutdown().context("Failed to flush spans")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn poll_loop(
    bpf: &mut Ebpf,
    rings: &mut RingBuffers,
    pipeline: &mut Pipeline<Box<dyn SpanSink>>,
    config: &Config,
) -> Result<&'static str> {
    init_ebpf_logger(bpf);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let duration_limit = config.duration_limit();
    let proc_path = config.pid.map(|pid| format!("/proc/{pid}"));
    let poll_interval = config.poll_interval();

    let started = Instant::now();
    let mut stats_timer = Instant::now();

    loop {
        if duration_limit.is_some_and(|d| started.elapsed() >= d) {
            return Ok("duration limit reached");
        }

        if proc_path.as_deref().is_some_and(|p| !Path::new(p).exists()) {
            return Ok("process exited");
        }

        rings.drain_into(pipeline);
        pipeline.sweep(monotonic_now());

        if stats_timer.elapsed() > STATS_INTERVAL {
            if pipeline.stats.records() == 0 {
                info!("Still waiting for events... (no records received yet)");
            } else {
                info!(
                    "{} ({} tasks with open calls)",
                    pipeline.stats,
                    pipeline.open_keys()
                );
            }
            stats_timer = Instant::now();
        }

        tokio::select! {
            () = tokio::time::sleep(poll_interval) => {}
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                return Ok("interrupted");
            }
        }
    }
}
