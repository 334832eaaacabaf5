//! Request parsing, command lookup, and the two-phase execution pipeline.

mod args;
mod errors;
mod handler;
mod table;
mod trace;

pub(crate) use args::Args;
pub(crate) use errors::CommandError;
pub use errors::TableError;
pub(crate) use handler::{DispatchContext, run_connection};
pub(crate) use table::{CommandSpec, CommandTable, CommandTableBuilder, Context, DeferredFn};
pub(crate) use trace::RequestLog;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
