//! Command descriptors and the name-to-descriptor table.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use super::args::Args;
use super::errors::{CommandError, TableError};

/// Opaque value the immediate phase hands to the deferred phase.
///
/// The immediate handler typically parses and validates the request, then
/// stashes the parsed payload here so the worker thread need not re-validate.
pub(crate) type Context = Option<Box<dyn Any + Send>>;

/// Handler run on the connection thread; writes the reply payload.
pub(crate) type ImmediateFn = Arc<
    dyn Fn(&mut Args<'_>, &mut Vec<u8>, &mut Context) -> Result<(), CommandError> + Send + Sync,
>;

/// Handler queued to the worker thread.
pub(crate) type DeferredFn =
    Arc<dyn Fn(&mut Args<'_>, Context) -> Result<(), CommandError> + Send + Sync>;

/// One command's phase handlers and reply behaviour.
///
/// `sends_reply` is honoured even without an immediate handler: the client
/// still receives a frame, just with an empty payload.
pub(crate) struct CommandSpec {
    pub(crate) immediate: Option<ImmediateFn>,
    pub(crate) deferred: Option<DeferredFn>,
    pub(crate) sends_reply: bool,
}

impl CommandSpec {
    /// Immediate-only command that replies with a payload.
    pub(crate) fn query(
        immediate: impl Fn(&mut Args<'_>, &mut Vec<u8>, &mut Context) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            immediate: Some(Arc::new(immediate)),
            deferred: None,
            sends_reply: true,
        }
    }

    /// Immediate-only command with no reply frame.
    pub(crate) fn immediate(
        immediate: impl Fn(&mut Args<'_>, &mut Vec<u8>, &mut Context) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            immediate: Some(Arc::new(immediate)),
            deferred: None,
            sends_reply: false,
        }
    }

    /// Deferred-only command.
    pub(crate) fn deferred(
        deferred: impl Fn(&mut Args<'_>, Context) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            immediate: None,
            deferred: Some(Arc::new(deferred)),
            sends_reply: false,
        }
    }

    /// Two-phase command with no reply frame.
    pub(crate) fn staged(
        immediate: impl Fn(&mut Args<'_>, &mut Vec<u8>, &mut Context) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
        deferred: impl Fn(&mut Args<'_>, Context) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            immediate: Some(Arc::new(immediate)),
            deferred: Some(Arc::new(deferred)),
            sends_reply: false,
        }
    }

    /// Two-phase command whose immediate phase replies with a payload.
    pub(crate) fn staged_query(
        immediate: impl Fn(&mut Args<'_>, &mut Vec<u8>, &mut Context) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
        deferred: impl Fn(&mut Args<'_>, Context) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            immediate: Some(Arc::new(immediate)),
            deferred: Some(Arc::new(deferred)),
            sends_reply: true,
        }
    }
}

/// Builder that rejects duplicate names and handler-less descriptors.
#[derive(Default)]
pub(crate) struct CommandTableBuilder {
    commands: HashMap<String, CommandSpec>,
}

impl CommandTableBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a command under a case-insensitive name.
    pub(crate) fn register(&mut self, name: &str, spec: CommandSpec) -> Result<(), TableError> {
        if spec.immediate.is_none() && spec.deferred.is_none() {
            return Err(TableError::NoHandler {
                name: name.to_owned(),
            });
        }
        let key = name.to_ascii_lowercase();
        if self.commands.contains_key(&key) {
            return Err(TableError::Duplicate {
                name: name.to_owned(),
            });
        }
        self.commands.insert(key, spec);
        Ok(())
    }

    pub(crate) fn build(self) -> CommandTable {
        CommandTable {
            commands: self.commands,
        }
    }
}

/// Immutable command lookup table shared by every connection thread.
pub(crate) struct CommandTable {
    commands: HashMap<String, CommandSpec>,
}

impl CommandTable {
    /// Looks up a command by its lowercased name.
    pub(crate) fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }
}
