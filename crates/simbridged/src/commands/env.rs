//! Environment-level commands: body creation, scene loading, enumeration,
//! and simulation stepping.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::dispatch::{CommandSpec, CommandTableBuilder, DeferredFn, TableError};
use crate::worker::Job;

use super::{COMMAND_TARGET, CommandDeps, push_line};

pub(crate) fn register(
    builder: &mut CommandTableBuilder,
    deps: &Arc<CommandDeps>,
) -> Result<(), TableError> {
    let scene = Arc::clone(&deps.scene);
    builder.register(
        "createbody",
        CommandSpec::query(move |args, reply, _| {
            let name = args.require("body name")?;
            let dof = args.opt::<usize>("dof")?.unwrap_or(0);
            let id = scene.lock().add_body(name, dof);
            push_line(reply, &id.to_string());
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "createrobot",
        CommandSpec::query(move |args, reply, _| {
            let name = args.require("robot name")?;
            let dof = args.parse::<usize>("dof")?;
            let id = scene.lock().add_robot(name, dof);
            push_line(reply, &id.to_string());
            Ok(())
        }),
    )?;

    // `loadscene <clear> [path]` with no path degenerates to a scene reset.
    let scene = Arc::clone(&deps.scene);
    builder.register(
        "loadscene",
        CommandSpec::query(move |args, reply, _| {
            let clear = args.parse::<u8>("clear flag")? != 0;
            let path = args.token();
            let mut state = scene.lock();
            if clear {
                state.clear();
            }
            let added = match path {
                Some(path) => {
                    let added = state.load(Path::new(path))?;
                    info!(target: COMMAND_TARGET, path, added, "scene loaded");
                    added
                }
                None => 0,
            };
            push_line(reply, &added.to_string());
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "env_getbodies",
        CommandSpec::query(move |_, reply, _| {
            let state = scene.lock();
            push_line(reply, &state.len().to_string());
            for body in state.bodies() {
                push_line(
                    reply,
                    &format!("{} {} {}", body.id(), body.name(), body.kind().as_str()),
                );
            }
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "env_getrobots",
        CommandSpec::query(move |_, reply, _| {
            let state = scene.lock();
            let robots: Vec<_> = state.robots().collect();
            push_line(reply, &robots.len().to_string());
            for body in robots {
                push_line(reply, &format!("{} {}", body.id(), body.name()));
            }
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "env_getbody",
        CommandSpec::query(move |args, reply, _| {
            let name = args.require("body name")?;
            let state = scene.lock();
            let id = state.body_by_name(name).map_or(0, |body| body.id().0);
            push_line(reply, &id.to_string());
            Ok(())
        }),
    )?;

    // Stepping is queued like any other mutation so it lands in the global
    // order; the sync flag turns the call into a rendezvous with the worker.
    let scene = Arc::clone(&deps.scene);
    let worker = Arc::clone(&deps.worker);
    builder.register(
        "env_stepsimulation",
        CommandSpec::immediate(move |args, _, _| {
            let dt = args.opt::<f64>("timestep")?;
            let sync = args.opt::<u8>("sync flag")?.unwrap_or(0) != 0;
            let scene = Arc::clone(&scene);
            let step: DeferredFn = Arc::new(move |_, _| {
                let mut state = scene.lock();
                let dt = dt.unwrap_or(state.options.timestep);
                state.step(dt);
                Ok(())
            });
            worker.schedule(Job::new(step, String::new(), None));
            if sync {
                worker.drain_and_wait_idle();
            }
            Ok(())
        }),
    )?;

    Ok(())
}
