//! Error types for command parsing and table construction.

use thiserror::Error;

use simbridge_scene::SceneError;

/// Errors surfaced by command handlers.
///
/// A failed immediate phase answers the client with the `error\n` payload; a
/// failed deferred phase is logged on the worker thread.
#[derive(Debug, Error)]
pub(crate) enum CommandError {
    /// A required argument was absent.
    #[error("missing argument: {what}")]
    Missing { what: &'static str },
    /// An argument was present but did not parse.
    #[error("bad value for {what}: {value}")]
    Invalid { what: &'static str, value: String },
    /// The scene rejected the operation.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// The referenced module slot does not exist.
    #[error("no module in slot {id}")]
    UnknownModule { id: u32 },
    /// The referenced figure does not exist.
    #[error("no figure with id {id}")]
    UnknownFigure { id: u32 },
}

/// Errors raised while assembling the command table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// The same command name was registered twice.
    #[error("command {name} registered twice")]
    Duplicate {
        /// Offending command name.
        name: String,
    },
    /// A command was registered with neither phase handler.
    #[error("command {name} has no handler")]
    NoHandler {
        /// Offending command name.
        name: String,
    },
}
