//! Runtime configuration
//!
//! Settings come from an optional JSON file and the command line; a flag
//! given on the command line wins over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;
use crate::domain::ConfigError;
use crate::pipeline::CorrelationSettings;

/// Span destination
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    /// Batch export to a Zipkin collector
    #[default]
    Zipkin,
    /// Write spans to the log
    Log,
}

/// Service name reported by each probe family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNames {
    #[serde(default = "default_process_service")]
    pub process: String,
    #[serde(default = "default_put_service")]
    pub put: String,
    #[serde(default = "default_caput_service")]
    pub caput: String,
}

impl Default for ServiceNames {
    fn default() -> Self {
        Self {
            process: default_process_service(),
            put: default_put_service(),
            caput: default_caput_service(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to libdbCore
    pub library: Option<PathBuf>,

    /// Compiled probe object
    pub bpf_object: Option<PathBuf>,

    /// Restrict the uprobes to one process
    pub pid: Option<u32>,

    #[serde(default)]
    pub exporter: ExporterKind,

    #[serde(default = "default_zipkin_endpoint")]
    pub zipkin_endpoint: String,

    #[serde(default)]
    pub services: ServiceNames,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// 0 disables eviction
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub track_recursion: bool,

    /// 0 runs until interrupted
    #[serde(default)]
    pub duration_secs: u64,

    #[serde(default)]
    pub quiet: bool,
}

fn default_process_service() -> String {
    "process-service".to_string()
}

fn default_put_service() -> String {
    "put-service".to_string()
}

fn default_caput_service() -> String {
    "caput-service".to_string()
}

fn default_zipkin_endpoint() -> String {
    "http://localhost:9411/api/v2/spans".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: None,
            bpf_object: None,
            pid: None,
            exporter: ExporterKind::default(),
            zipkin_endpoint: default_zipkin_endpoint(),
            services: ServiceNames::default(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_timeout_secs: default_idle_timeout_secs(),
            track_recursion: true,
            duration_secs: 0,
            quiet: false,
        }
    }
}

impl Config {
    /// Read a JSON config file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build the effective configuration from the command line, reading
    /// `--config` first when given
    ///
    /// # Errors
    /// Returns an error if the config file cannot be loaded or the result
    /// fails [`Config::validate`]
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Overlay command line flags on top of the current values
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref library) = args.library {
            self.library = Some(library.clone());
        }
        if let Some(ref object) = args.bpf_object {
            self.bpf_object = Some(object.clone());
        }
        if args.pid.is_some() {
            self.pid = args.pid;
        }
        if let Some(exporter) = args.exporter {
            self.exporter = exporter;
        }
        if let Some(ref endpoint) = args.zipkin_endpoint {
            self.zipkin_endpoint.clone_from(endpoint);
        }
        if let Some(ref name) = args.process_service {
            self.services.process.clone_from(name);
        }
        if let Some(ref name) = args.put_service {
            self.services.put.clone_from(name);
        }
        if let Some(ref name) = args.caput_service {
            self.services.caput.clone_from(name);
        }
        if let Some(ms) = args.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(secs) = args.idle_timeout_secs {
            self.idle_timeout_secs = secs;
        }
        if args.no_recursion {
            self.track_recursion = false;
        }
        if let Some(secs) = args.duration {
            self.duration_secs = secs;
        }
        if args.quiet {
            self.quiet = true;
        }
    }

    /// # Errors
    /// Returns [`ConfigError::Missing`] when the library or probe object is
    /// not set, [`ConfigError::Invalid`] for unusable values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.library.is_none() {
            return Err(ConfigError::Missing("-p/--path <LIB>"));
        }
        if self.bpf_object.is_none() {
            return Err(ConfigError::Missing("--bpf-object <FILE>"));
        }
        if self.poll_interval_ms == 0 {
            let msg = "poll interval must be at least 1 ms".to_string();
            return Err(ConfigError::Invalid(msg));
        }
        for (family, name) in [
            ("process", &self.services.process),
            ("put", &self.services.put),
            ("caput", &self.services.caput),
        ] {
            if name.trim().is_empty() {
                let msg = format!("{family} service name is empty");
                return Err(ConfigError::Invalid(msg));
            }
        }
        if self.exporter == ExporterKind::Zipkin && self.zipkin_endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("Zipkin endpoint is empty".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn duration_limit(&self) -> Option<Duration> {
        (self.duration_secs > 0)
            .then(|| Duration::from_secs(self.duration_secs))
    }

    pub fn correlation(&self) -> CorrelationSettings {
        CorrelationSettings {
            track_recursion: self.track_recursion,
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }
}
