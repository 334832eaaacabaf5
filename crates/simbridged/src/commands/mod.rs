//! The command catalogue exposed over the text protocol.
//!
//! Registration is grouped by subject: environment, bodies, robots, modules,
//! visualisation, and daemon options. Every handler captures the shared
//! [`CommandDeps`] it needs, so the table itself is immutable once built.

mod body;
mod env;
mod module;
mod options;
mod robot;
mod viz;

use std::sync::{Arc, atomic::AtomicBool};

use simbridge_scene::Scene;

use crate::dispatch::{CommandTable, CommandTableBuilder, Context, TableError};
use crate::registry::Registry;
use crate::worker::Worker;

pub(crate) use module::ModuleSlot;
pub(crate) use viz::Figure;

/// Tracing target for command execution.
pub(crate) const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

/// Shared state the command handlers operate on.
pub(crate) struct CommandDeps {
    pub(crate) scene: Arc<Scene>,
    pub(crate) figures: Arc<Registry<Figure>>,
    pub(crate) modules: Arc<Registry<ModuleSlot>>,
    pub(crate) worker: Arc<Worker>,
    pub(crate) shutdown: Arc<AtomicBool>,
}

/// Builds the full command table.
///
/// # Errors
///
/// Returns [`TableError`] when two registrations collide, which is a
/// programming error caught at daemon start rather than at dispatch time.
pub(crate) fn build_table(deps: &Arc<CommandDeps>) -> Result<CommandTable, TableError> {
    let mut builder = CommandTableBuilder::new();
    env::register(&mut builder, deps)?;
    body::register(&mut builder, deps)?;
    robot::register(&mut builder, deps)?;
    module::register(&mut builder, deps)?;
    viz::register(&mut builder, deps)?;
    options::register(&mut builder, deps)?;
    Ok(builder.build())
}

/// Appends one newline-terminated line to a reply payload.
pub(crate) fn push_line(reply: &mut Vec<u8>, line: &str) {
    reply.extend_from_slice(line.as_bytes());
    reply.push(b'\n');
}

/// Joins numeric values with single spaces.
pub(crate) fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Recovers the payload the immediate phase stashed for the deferred phase.
pub(crate) fn take_carried<T: 'static>(context: Context) -> Option<Box<T>> {
    context.and_then(|carried| carried.downcast().ok())
}
