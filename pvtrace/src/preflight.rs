//! Pre-flight checks for pvtrace
//!
//! Validates system requirements before attempting to load the probe object.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use log::warn;
use object::{Object, ObjectSymbol};
use pvtrace_common::{EVENT_PROBES, PROBES};
use std::collections::HashSet;
use std::path::Path;

/// Minimum kernel version with `BPF_MAP_TYPE_RINGBUF`
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// Run all pre-flight checks before loading probes
///
/// # Errors
/// Returns the first failed requirement
pub fn run_preflight_checks(library: &Path, bpf_object: &Path, pid: Option<u32>) -> Result<()> {
    check_privileges()?;
    check_kernel_version()?;
    check_file_exists(library, "Library")?;
    check_file_exists(bpf_object, "Probe object")?;
    check_library_symbols(library)?;
    if let Some(pid) = pid {
        check_process_exists(pid)?;
    }
    Ok(())
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: pvtrace requires root privileges to attach uprobes.\n\n\
         Run with: sudo pvtrace ..."
    );
}

/// Parse `major.minor` from a kernel release string such as `6.1.0-arch1-1`
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}

/// Check if the kernel version is sufficient for ring buffers
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    // "Linux version 5.15.0-generic ..."
    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");

    let Some((major, minor)) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {}.{} is too old.\n\n\
             pvtrace requires Linux {}.{} or newer for eBPF ring buffer support.\n\
             Current kernel: {}",
            major,
            minor,
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
            release
        );
    }

    Ok(())
}

/// Check that `path` exists and is a regular file
fn check_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!(
            "{what} not found: {}\n\n\
             Make sure the path is correct and the file exists.",
            path.display()
        );
    }
    if !path.is_file() {
        bail!("Not a file: {}", path.display());
    }
    Ok(())
}

/// Probed symbols missing from the dynamic (or static) symbol table of `data`
fn missing_symbols(data: &[u8]) -> Result<Vec<&'static str>> {
    let obj = object::File::parse(data).context("Not a valid ELF shared object")?;

    let mut exported: HashSet<&str> = obj
        .dynamic_symbols()
        .filter(|s| s.is_definition())
        .filter_map(|s| s.name().ok())
        .collect();
    if exported.is_empty() {
        exported = obj
            .symbols()
            .filter(|s| s.is_definition())
            .filter_map(|s| s.name().ok())
            .collect();
    }

    Ok(PROBES
        .iter()
        .map(|(symbol, _, _)| *symbol)
        .filter(|symbol| !exported.contains(symbol))
        .collect())
}

/// Split missing symbols into event-producing ones and lookup helpers
fn split_missing(missing: &[&'static str]) -> (Vec<&'static str>, Vec<&'static str>) {
    missing.iter().copied().partition(|symbol| {
        PROBES[..EVENT_PROBES]
            .iter()
            .any(|(required, _, _)| required == symbol)
    })
}

/// Check that the library defines every event-producing function
///
/// Missing helpers only cost the record value, so they are a warning.
fn check_library_symbols(library: &Path) -> Result<()> {
    let data = std::fs::read(library)
        .with_context(|| format!("Failed to read library: {}", library.display()))?;

    let missing = missing_symbols(&data)
        .with_context(|| format!("Cannot inspect {}", library.display()))?;
    let (required, helpers) = split_missing(&missing);
    if !required.is_empty() {
        bail!(
            "{} does not export {}\n\n\
             Point --path at the libdbCore shared library of the IOCs to trace.",
            library.display(),
            required.join(", ")
        );
    }
    if !helpers.is_empty() {
        warn!(
            "{} does not export {}; process span values will be NULL",
            library.display(),
            helpers.join(", ")
        );
    }
    Ok(())
}

/// Check if the target process exists
///
/// # Errors
/// Returns an error if `/proc/<pid>` does not exist
pub fn check_process_exists(pid: u32) -> Result<()> {
    let proc_path = format!("/proc/{pid}");
    if !Path::new(&proc_path).exists() {
        bail!(
            "Process {pid} not found.\n\n\
             Is the process still running? Check with: ps -p {pid}"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_version_check() {
        // May fail on an old kernel, must not panic
        let _ = check_kernel_version();
    }

    #[test]
    fn test_parse_kernel_release() {
        assert_eq!(parse_kernel_release("6.1.0-arch1-1"), Some((6, 1)));
        assert_eq!(parse_kernel_release("5.15.0-generic"), Some((5, 15)));
        assert_eq!(parse_kernel_release("4.19"), Some((4, 19)));
        assert_eq!(parse_kernel_release("unknown"), None);
    }

    #[test]
    fn test_library_not_found() {
        let result = check_file_exists(Path::new("/nonexistent/libdbCore.so"), "Library");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Library not found"));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_file_exists(dir.path(), "Probe object").unwrap_err();
        assert!(err.to_string().contains("Not a file"));
    }

    #[test]
    fn test_non_elf_library() {
        assert!(missing_symbols(b"definitely not an object file").is_err());
    }

    #[test]
    fn test_own_binary_lacks_epics_symbols() {
        let exe = std::env::current_exe().unwrap();
        let data = std::fs::read(exe).unwrap();
        let missing = missing_symbols(&data).unwrap();
        assert!(missing.contains(&"dbProcess"));
    }

    #[test]
    fn test_only_event_symbols_are_required() {
        let (required, helpers) = split_missing(&["dbProcess", "dbCreateRecord"]);
        assert_eq!(required, ["dbProcess"]);
        assert_eq!(helpers, ["dbCreateRecord"]);
    }

    #[test]
    fn test_missing_helpers_are_not_required() {
        let (required, helpers) = split_missing(&["dbCreateRecord", "dbGetRecordName"]);
        assert!(required.is_empty());
        assert_eq!(helpers.len(), 2);
    }

    #[test]
    fn test_process_not_found() {
        let err = check_process_exists(999_999_999).unwrap_err().to_string();
        assert!(err.contains("not found"));
    }
}
