//! Commands addressing a single body: lifecycle, joints, and pose.

use std::sync::Arc;

use simbridge_scene::{BodyId, Pose, SceneError};

use crate::dispatch::{CommandError, CommandSpec, CommandTableBuilder, TableError};

use super::{CommandDeps, join_values, push_line, take_carried};

struct DestroyRequest {
    id: BodyId,
}

struct EnableUpdate {
    id: BodyId,
    enabled: bool,
}

struct JointUpdate {
    id: BodyId,
    values: Vec<f64>,
    indices: Option<Vec<usize>>,
}

struct PoseUpdate {
    id: BodyId,
    pose: Pose,
}

pub(crate) fn register(
    builder: &mut CommandTableBuilder,
    deps: &Arc<CommandDeps>,
) -> Result<(), TableError> {
    let scene = Arc::clone(&deps.scene);
    let apply = Arc::clone(&deps.scene);
    builder.register(
        "body_destroy",
        CommandSpec::staged(
            move |args, _, carried| {
                let id: BodyId = args.parse("body id")?;
                scene.lock().body(id)?;
                *carried = Some(Box::new(DestroyRequest { id }));
                Ok(())
            },
            move |_, context| {
                let Some(request) = take_carried::<DestroyRequest>(context) else {
                    return Ok(());
                };
                apply.lock().remove_body(request.id)?;
                Ok(())
            },
        ),
    )?;

    let scene = Arc::clone(&deps.scene);
    let apply = Arc::clone(&deps.scene);
    builder.register(
        "body_enable",
        CommandSpec::staged(
            move |args, _, carried| {
                let id: BodyId = args.parse("body id")?;
                let enabled = args.parse::<u8>("enable flag")? != 0;
                scene.lock().body(id)?;
                *carried = Some(Box::new(EnableUpdate { id, enabled }));
                Ok(())
            },
            move |_, context| {
                let Some(update) = take_carried::<EnableUpdate>(context) else {
                    return Ok(());
                };
                apply.lock().body_mut(update.id)?.set_enabled(update.enabled);
                Ok(())
            },
        ),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "body_getdof",
        CommandSpec::query(move |args, reply, _| {
            let id: BodyId = args.parse("body id")?;
            let state = scene.lock();
            push_line(reply, &state.body(id)?.dof().to_string());
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "body_getjoints",
        CommandSpec::query(move |args, reply, _| {
            let id: BodyId = args.parse("body id")?;
            let indices: Vec<usize> = args.remaining("joint index")?;
            let state = scene.lock();
            let body = state.body(id)?;
            let values = if indices.is_empty() {
                body.joints().to_vec()
            } else {
                body.joints_at(&indices)?
            };
            push_line(reply, &join_values(&values));
            Ok(())
        }),
    )?;

    let scene = Arc::clone(&deps.scene);
    let apply = Arc::clone(&deps.scene);
    builder.register(
        "body_setjoints",
        CommandSpec::staged(
            move |args, _, carried| {
                let id: BodyId = args.parse("body id")?;
                let count: usize = args.parse("value count")?;
                let values = args.take::<f64>(count, "joint value")?;
                let indices: Vec<usize> = args.remaining("joint index")?;
                let state = scene.lock();
                let body = state.body(id)?;
                if indices.is_empty() {
                    if count != body.dof() {
                        return Err(SceneError::JointCountMismatch {
                            expected: body.dof(),
                            got: count,
                        }
                        .into());
                    }
                } else {
                    if indices.len() != count {
                        return Err(CommandError::Invalid {
                            what: "joint index count",
                            value: indices.len().to_string(),
                        });
                    }
                    body.joints_at(&indices)?;
                }
                *carried = Some(Box::new(JointUpdate {
                    id,
                    values,
                    indices: (!indices.is_empty()).then_some(indices),
                }));
                Ok(())
            },
            move |_, context| {
                let Some(update) = take_carried::<JointUpdate>(context) else {
                    return Ok(());
                };
                let mut state = apply.lock();
                let body = state.body_mut(update.id)?;
                match &update.indices {
                    Some(indices) => body.set_joints_indexed(&update.values, indices)?,
                    None => body.set_joints(&update.values)?,
                }
                Ok(())
            },
        ),
    )?;

    let scene = Arc::clone(&deps.scene);
    let apply = Arc::clone(&deps.scene);
    builder.register(
        "body_settransform",
        CommandSpec::staged(
            move |args, _, carried| {
                let id: BodyId = args.parse("body id")?;
                let values: Vec<f64> = args.remaining("transform value")?;
                let pose = Pose::from_values(&values)?;
                scene.lock().body(id)?;
                *carried = Some(Box::new(PoseUpdate { id, pose }));
                Ok(())
            },
            move |_, context| {
                let Some(update) = take_carried::<PoseUpdate>(context) else {
                    return Ok(());
                };
                apply.lock().body_mut(update.id)?.set_pose(update.pose);
                Ok(())
            },
        ),
    )?;

    let scene = Arc::clone(&deps.scene);
    builder.register(
        "body_getaabb",
        CommandSpec::query(move |args, reply, _| {
            let id: BodyId = args.parse("body id")?;
            let state = scene.lock();
            let aabb = state.body(id)?.aabb();
            let mut values = Vec::with_capacity(6);
            values.extend_from_slice(&aabb.center);
            values.extend_from_slice(&aabb.extents);
            push_line(reply, &join_values(&values));
            Ok(())
        }),
    )?;

    Ok(())
}
