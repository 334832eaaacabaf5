//! Shared configuration for the simbridge daemon.
//!
//! The daemon exposes a small process-level surface: the interface and port it
//! listens on, the tracing filter and output format, and where the optional
//! request trace log is written. Values are resolved with CLI flags taking
//! precedence over environment variables, which in turn override built-in
//! defaults.

mod defaults;
mod logging;

use std::path::PathBuf;

use clap::Parser;

pub use crate::defaults::{DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT};
pub use crate::logging::{LogFormat, LogFormatParseError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "simbridged",
    about = "Text-protocol control server for a live simulation"
)]
pub struct Config {
    /// Interface the daemon listens on.
    #[arg(long, env = "SIMBRIDGE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// TCP port for the text protocol.
    #[arg(long, env = "SIMBRIDGE_PORT", default_value_t = DEFAULT_TCP_PORT)]
    pub port: u16,

    /// Tracing filter expression (e.g. `info`, `simbridged=debug`).
    #[arg(long, env = "SIMBRIDGE_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format.
    #[arg(long, env = "SIMBRIDGE_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Directory for the request trace log. Defaults to `~/.simbridge`.
    #[arg(long, env = "SIMBRIDGE_TRACE_DIR")]
    pub trace_dir: Option<PathBuf>,

    /// Disable the request trace log entirely.
    #[arg(long, env = "SIMBRIDGE_NO_TRACE", default_value_t = false)]
    pub no_trace: bool,
}

impl Config {
    /// Loads the configuration from the process arguments and environment.
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    /// Resolves the request trace log path, honouring `--no-trace`.
    ///
    /// Returns `None` when tracing is disabled or no directory can be derived
    /// (no `--trace-dir` and no home directory).
    #[must_use]
    pub fn request_log_path(&self) -> Option<PathBuf> {
        if self.no_trace {
            return None;
        }
        let dir = match &self.trace_dir {
            Some(dir) => dir.clone(),
            None => defaults::default_trace_directory()?,
        };
        Some(dir.join("requests.log"))
    }
}

impl Default for Config {
    fn default() -> Self {
        // Parsing an empty argument list yields the built-in defaults without
        // consulting the real process arguments.
        Self::parse_from(["simbridged"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_port() {
        let config = Config::default();
        assert_eq!(config.port, DEFAULT_TCP_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format, LogFormat::Compact);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let config = Config::parse_from([
            "simbridged",
            "--host",
            "127.0.0.1",
            "--port",
            "9900",
            "--log-format",
            "json",
        ]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9900);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn no_trace_disables_request_log() {
        let config = Config::parse_from(["simbridged", "--no-trace"]);
        assert_eq!(config.request_log_path(), None);
    }

    #[test]
    fn explicit_trace_dir_is_honoured() {
        let config = Config::parse_from(["simbridged", "--trace-dir", "/tmp/simbridge-test"]);
        let path = config.request_log_path().expect("trace path");
        assert_eq!(
            path,
            std::path::Path::new("/tmp/simbridge-test/requests.log")
        );
    }
}
