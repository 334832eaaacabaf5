//! Built-in defaults shared by the daemon binary and tests.

use std::path::PathBuf;

/// Default interface the daemon binds to.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default TCP port for the text protocol.
pub const DEFAULT_TCP_PORT: u16 = 4765;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Computes the default request trace directory under the user's home.
///
/// Returns `None` when the platform reports no home directory, in which case
/// request tracing is simply disabled.
pub fn default_trace_directory() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".simbridge"))
}
