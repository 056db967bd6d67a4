//! # Probe Loading and Attachment
//!
//! Loads the compiled probe object and attaches its uprobe/uretprobe pairs to
//! `libdbCore`.
//!
//! ## Attachment Points
//!
//! - `dbProcess`, `dbPutField`, `dbCaPutLinkCallback`: event producers,
//!   failure to attach is fatal
//! - `dbCreateRecord`, `dbGetRecordName`: fill the kernel-side record table
//!   the `dbProcess` return probe reads VAL through; failure only degrades
//!   process values to `NULL`

use std::path::Path;

use anyhow::Result;
use aya::programs::{ProgramError, UProbe};
use aya::Ebpf;
use aya_log::EbpfLogger;
use log::{info, warn};
use pvtrace_common::{EVENT_PROBES, PROBES};

use crate::domain::ProbeError;

/// Load the probe object from disk
///
/// # Errors
/// Returns an error if the file is missing or the kernel rejects the object
pub fn load_ebpf_object(path: &Path) -> Result<Ebpf> {
    let bpf = Ebpf::load_file(path).map_err(|e| ProbeError::LoadFailed {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    Ok(bpf)
}

/// Forward `bpf_printk`-style logs from the probes, when the object has them
pub fn init_ebpf_logger(bpf: &mut Ebpf) {
    if let Err(e) = EbpfLogger::init(bpf) {
        // objects built without aya-log have nothing to forward
        info!("eBPF logger not initialised: {e}");
    }
}

/// Load `program` and attach it to `symbol` in `library`
///
/// # Errors
/// Returns [`ProbeError`] if the program is missing, is not a uprobe, or
/// cannot be attached
pub fn attach_uprobe(
    bpf: &mut Ebpf,
    program: &str,
    symbol: &str,
    library: &Path,
    pid: Option<i32>,
) -> Result<(), ProbeError> {
    let attach_failed = |error: String| ProbeError::AttachFailed {
        probe: program.to_string(),
        symbol: symbol.to_string(),
        library: library.display().to_string(),
        error,
    };

    let uprobe: &mut UProbe = bpf
        .program_mut(program)
        .ok_or_else(|| ProbeError::ProgramNotFound(program.to_string()))?
        .try_into()
        .map_err(|e: ProgramError| attach_failed(e.to_string()))?;
    uprobe.load().map_err(|e| attach_failed(e.to_string()))?;
    uprobe
        .attach(Some(symbol), 0, library, pid)
        .map_err(|e| attach_failed(e.to_string()))?;
    Ok(())
}

/// Attach every probe pair; returns the number of pairs attached
///
/// # Errors
/// Returns an error if any event-producing probe fails to attach or `pid`
/// does not fit a kernel pid
pub fn attach_probes(bpf: &mut Ebpf, library: &Path, pid: Option<u32>) -> Result<usize> {
    let pid = pid.map(i32::try_from).transpose()?;
    let mut attached = 0;

    for (index, (symbol, entry, exit)) in PROBES.iter().enumerate() {
        let result = attach_uprobe(bpf, entry, symbol, library, pid)
            .and_then(|()| attach_uprobe(bpf, exit, symbol, library, pid));

        match result {
            Ok(()) => {
                info!("✓ Attached uprobe pair: {symbol} ({entry}, {exit})");
                attached += 1;
            }
            Err(e) if index < EVENT_PROBES => return Err(e.into()),
            Err(e) => {
                warn!("⚠️  {e}");
                warn!("   Record values from {symbol} lookups will be NULL");
            }
        }
    }

    Ok(attached)
}
