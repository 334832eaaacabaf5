//! Robot-specific commands: active degrees of freedom, limits, targets,
//! trajectories, and completion waiting.

use std::sync::{Arc, atomic::Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use simbridge_scene::{BodyId, SceneError, Trajectory, Waypoint};

use crate::dispatch::{CommandSpec, CommandTableBuilder, TableError};

use super::{COMMAND_TARGET, CommandDeps, join_values, push_line, take_carried};

/// Poll interval while waiting for a controller to finish.
const WAIT_POLL: Duration = Duration::from_millis(1);

struct DofUpdate {
    id: BodyId,
    values: Vec<f64>,
}

pub(crate) fn register(
    builder: &mut CommandTableBuilder,
    deps: &Arc<CommandDeps>,
) -> Result<(), TableError> {
    let scene = Arc::clone(&deps.scene);
    builder.register(
        "robot_getactivedof",
        CommandSpec::query(move |args, reply, _| {
            let id: BodyId = args.parse("robot id")?;
            let state = scene.lock();
            let active = state.robot(id)?.robot().map_or(0, |robot| robot.active);
            push_line(reply, &active.to_string());
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "robot_getlimits",
        CommandSpec::query(move |args, reply, _| {
            let id: BodyId = args.parse("robot id")?;
            let state = scene.lock();
            let (lower, upper) = state.robot(id)?.limits();
            push_line(
                reply,
                &format!("{} {} {}", lower.len(), join_values(lower), join_values(upper)),
            );
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    let apply = Arc::clone(&deps.scene);
    builder.register(
        "robot_setdof",
        CommandSpec::staged(
            move |args, _, carried| {
                let id: BodyId = args.parse("robot id")?;
                let values: Vec<f64> = args.remaining("joint value")?;
                let state = scene.lock();
                let active = state.robot(id)?.robot().map_or(0, |robot| robot.active);
                if values.len() != active {
                    return Err(SceneError::JointCountMismatch {
                        expected: active,
                        got: values.len(),
                    }
                    .into());
                }
                *carried = Some(Box::new(DofUpdate { id, values }));
                Ok(())
            },
            move |_, context| {
                let Some(update) = take_carried::<DofUpdate>(context) else {
                    return Ok(());
                };
                let indices: Vec<usize> = (0..update.values.len()).collect();
                apply
                    .lock()
                    .robot_mut(update.id)?
                    .set_joints_indexed(&update.values, &indices)?;
                Ok(())
            },
        ),
    )?;

    // Trajectories are parsed on the worker thread: the waypoint list can be
    // long and nothing about it is needed for the (absent) reply.
    let scene = Arc::clone(&deps.scene);
    builder.register(
        "robot_traj",
        CommandSpec::deferred(move |args, _| {
            let id: BodyId = args.parse("robot id")?;
            let count: usize = args.parse("waypoint count")?;
            let timed = args.parse::<u8>("timing flag")? != 0;
            let mut state = scene.lock();
            let active = state.robot(id)?.robot().map_or(0, |robot| robot.active);
            let mut points = Vec::with_capacity(count);
            for _ in 0..count {
                let q = args.take::<f64>(active, "joint value")?;
                let time = if timed { args.parse::<f64>("timestamp")? } else { 0.0 };
                points.push(Waypoint { q, time });
            }
            debug!(
                target: COMMAND_TARGET,
                robot = id.0,
                waypoints = points.len(),
                "trajectory accepted"
            );
            if let Some(robot) = state.robot_mut(id)?.robot_mut() {
                robot.controller.start_trajectory(Trajectory::new(points, timed));
            }
            Ok(())
        }),
    )?;

    // Polls until the robot's controller reports done. The worker is drained
    // first so a trajectory sent just before the wait is already in flight;
    // a robot that does not exist is treated as trivially done, so stale ids
    // cannot hang clients.
    let scene = Arc::clone(&deps.scene);
    let shutdown = Arc::clone(&deps.shutdown);
    let worker = Arc::clone(&deps.worker);
    builder.register(
        "wait",
        CommandSpec::query(move |args, reply, _| {
            let id: BodyId = args.parse("robot id")?;
            let timeout = args.opt::<f64>("timeout")?;
            worker.drain_and_wait_idle();
            let deadline =
                timeout.map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
            loop {
                {
                    let state = scene.lock();
                    let done = match state.body(id) {
                        Err(_) => true,
                        Ok(body) => body
                            .robot()
                            .is_none_or(|robot| robot.controller.is_done()),
                    };
                    if done {
                        reply.extend_from_slice(b"1");
                        return Ok(());
                    }
                }
                if shutdown.load(Ordering::SeqCst)
                    || deadline.is_some_and(|deadline| Instant::now() >= deadline)
                {
                    reply.extend_from_slice(b"0");
                    return Ok(());
                }
                thread::sleep(WAIT_POLL);
            }
        }),
    )?;

    Ok(())
}
