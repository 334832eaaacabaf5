//! Loadable module slots and their text interface.

use std::sync::Arc;

use tracing::info;

use crate::dispatch::{CommandError, CommandSpec, CommandTableBuilder, TableError};

use super::{COMMAND_TARGET, CommandDeps, push_line, take_carried};

/// One registered module: a named slot that answers text requests.
pub(crate) struct ModuleSlot {
    name: String,
    args: String,
    active: bool,
}

impl ModuleSlot {
    fn new(name: &str, args: &str) -> Self {
        Self {
            name: name.to_owned(),
            args: args.to_owned(),
            active: false,
        }
    }

    /// Answers one request line. `status` reports readiness; anything else is
    /// echoed back, which is enough for clients probing slot liveness.
    pub(crate) fn respond(&self, input: &str) -> String {
        if input == "status" {
            if self.active {
                format!("ok {}", self.name)
            } else {
                format!("loading {}", self.name)
            }
        } else {
            input.to_owned()
        }
    }
}

pub(crate) fn register(
    builder: &mut CommandTableBuilder,
    deps: &Arc<CommandDeps>,
) -> Result<(), TableError> {
    // The slot id is handed out immediately so the client can address the
    // module straight away; activation happens on the worker thread.
    let modules = Arc::clone(&deps.modules);
    let activate = Arc::clone(&deps.modules);
    builder.register(
        "module_create",
        CommandSpec::staged_query(
            move |args, reply, carried| {
                let name = args.require("module name")?;
                let extra = args.rest();
                let id = modules.register(ModuleSlot::new(name, extra));
                push_line(reply, &id.to_string());
                *carried = Some(Box::new(id));
                Ok(())
            },
            move |_, context| {
                let Some(id) = take_carried::<u32>(context) else {
                    return Ok(());
                };
                activate
                    .with_mut(*id, |slot| {
                        slot.active = true;
                        info!(
                            target: COMMAND_TARGET,
                            id = *id,
                            name = %slot.name,
                            args = %slot.args,
                            "module active"
                        );
                    })
                    .ok_or(CommandError::UnknownModule { id: *id })
            },
        ),
    )?;

    let modules = Arc::clone(&deps.modules);
    builder.register(
        "module_destroy",
        CommandSpec::deferred(move |args, _| {
            let id: u32 = args.parse("module id")?;
            modules
                .release(id)
                .map(|_| ())
                .ok_or(CommandError::UnknownModule { id })
        }),
    )?;

    // Slot 0 broadcasts to every registered module.
    let modules = Arc::clone(&deps.modules);
    builder.register(
        "module_send",
        CommandSpec::query(move |args, reply, _| {
            let id: u32 = args.parse("module id")?;
            let input = args.rest();
            if id == 0 {
                for id in modules.ids() {
                    if let Some(response) = modules.with(id, |slot| slot.respond(input)) {
                        push_line(reply, &response);
                    }
                }
                return Ok(());
            }
            let response = modules
                .with(id, |slot| slot.respond(input))
                .ok_or(CommandError::UnknownModule { id })?;
            push_line(reply, &response);
            Ok(())
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reflects_activation() {
        let mut slot = ModuleSlot::new("planner", "--fast");
        assert_eq!(slot.respond("status"), "loading planner");
        slot.active = true;
        assert_eq!(slot.respond("status"), "ok planner");
    }

    #[test]
    fn other_input_is_echoed() {
        let slot = ModuleSlot::new("planner", "");
        assert_eq!(slot.respond("plan to goal"), "plan to goal");
    }
}
