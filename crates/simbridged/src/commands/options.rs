//! Daemon and simulation option commands.

use std::sync::{Arc, atomic::Ordering};

use tracing::{debug, info};

use crate::dispatch::{CommandError, CommandSpec, CommandTableBuilder, TableError};

use super::{COMMAND_TARGET, CommandDeps, take_carried};

#[derive(Default)]
struct OptionsUpdate {
    gravity: Option<[f64; 3]>,
    timestep: Option<f64>,
    running: Option<bool>,
    viewer_sync: Option<bool>,
}

pub(crate) fn register(
    builder: &mut CommandTableBuilder,
    deps: &Arc<CommandDeps>,
) -> Result<(), TableError> {
    // `quit` takes effect in the immediate phase so shutdown is not gated on
    // the worker draining; the remaining options are applied in order on the
    // worker like any other mutation.
    let shutdown = Arc::clone(&deps.shutdown);
    let apply = Arc::clone(&deps.scene);
    builder.register(
        "setoptions",
        CommandSpec::staged(
            move |args, _, carried| {
                let mut update = OptionsUpdate::default();
                while let Some(option) = args.token() {
                    match option.to_ascii_lowercase().as_str() {
                        "quit" => {
                            info!(target: COMMAND_TARGET, "shutdown requested by client");
                            shutdown.store(true, Ordering::SeqCst);
                        }
                        "gravity" => {
                            let components = args.take::<f64>(3, "gravity component")?;
                            update.gravity =
                                Some([components[0], components[1], components[2]]);
                        }
                        "timestep" => {
                            update.timestep = Some(args.parse("timestep")?);
                        }
                        "simulation" => {
                            let mode = args.require("simulation mode")?;
                            update.running = match mode.to_ascii_lowercase().as_str() {
                                "start" => Some(true),
                                "stop" => Some(false),
                                _ => {
                                    return Err(CommandError::Invalid {
                                        what: "simulation mode",
                                        value: mode.to_owned(),
                                    });
                                }
                            };
                        }
                        "viewer" => {
                            let mode = args.require("viewer mode")?;
                            update.viewer_sync = match mode.to_ascii_lowercase().as_str() {
                                "on" | "1" => Some(true),
                                "off" | "0" => Some(false),
                                _ => {
                                    return Err(CommandError::Invalid {
                                        what: "viewer mode",
                                        value: mode.to_owned(),
                                    });
                                }
                            };
                        }
                        other => {
                            debug!(target: COMMAND_TARGET, option = other, "option ignored");
                        }
                    }
                }
                *carried = Some(Box::new(update));
                Ok(())
            },
            move |_, context| {
                let Some(update) = take_carried::<OptionsUpdate>(context) else {
                    return Ok(());
                };
                let mut state = apply.lock();
                if let Some(gravity) = update.gravity {
                    state.options.gravity = gravity;
                }
                if let Some(timestep) = update.timestep {
                    state.options.timestep = timestep;
                }
                if let Some(running) = update.running {
                    state.options.running = running;
                }
                if let Some(viewer_sync) = update.viewer_sync {
                    state.options.viewer_sync = viewer_sync;
                }
                Ok(())
            },
        ),
    )?;

    // Liveness probe: accepted, does nothing, sends nothing.
    builder.register("test", CommandSpec::immediate(|_, _, _| Ok(())))?;

    Ok(())
}
