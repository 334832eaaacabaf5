//! Visualisation commands: plotted figures and viewer passes.

use std::sync::Arc;

use tracing::debug;

use crate::dispatch::{CommandError, CommandSpec, CommandTableBuilder, TableError};

use super::{COMMAND_TARGET, CommandDeps, join_values, push_line};

/// A plotted point set retained until the client closes it.
pub(crate) struct Figure {
    points: Vec<[f64; 3]>,
    size: f64,
    color: [f64; 3],
    style: String,
}

impl Figure {
    fn describe(&self) -> String {
        format!(
            "{} points, size {}, colour {}, style {}",
            self.points.len(),
            self.size,
            join_values(&self.color),
            self.style
        )
    }
}

pub(crate) fn register(
    builder: &mut CommandTableBuilder,
    deps: &Arc<CommandDeps>,
) -> Result<(), TableError> {
    let figures = Arc::clone(&deps.figures);
    builder.register(
        "plot",
        CommandSpec::query(move |args, reply, _| {
            let count: usize = args.parse("point count")?;
            let coords = args.take::<f64>(count * 3, "coordinate")?;
            let size = args.opt::<f64>("point size")?.unwrap_or(1.0);
            let color = match args.opt::<f64>("colour component")? {
                Some(red) => [
                    red,
                    args.parse::<f64>("colour component")?,
                    args.parse::<f64>("colour component")?,
                ],
                None => [1.0, 1.0, 1.0],
            };
            let style = args.token().unwrap_or("points").to_owned();
            let points = coords
                .chunks_exact(3)
                .map(|chunk| [chunk[0], chunk[1], chunk[2]])
                .collect();
            let figure = Figure {
                points,
                size,
                color,
                style,
            };
            debug!(target: COMMAND_TARGET, figure = %figure.describe(), "figure plotted");
            let id = figures.register(figure);
            push_line(reply, &id.to_string());
            Ok(())
        }),
    )?;

    let figures = Arc::clone(&deps.figures);
    builder.register(
        "close",
        CommandSpec::deferred(move |args, _| {
            let ids: Vec<u32> = args.remaining("figure id")?;
            if ids.is_empty() {
                figures.release_all();
                return Ok(());
            }
            for id in ids {
                figures
                    .release(id)
                    .ok_or(CommandError::UnknownFigure { id })?;
            }
            Ok(())
        }),
    )?;

    // `render start` / `render stop` toggle viewer mirroring; a bare render
    // is one pass. Both run on the worker so they sequence after earlier
    // mutations.
    let scene = Arc::clone(&deps.scene);
    let figures = Arc::clone(&deps.figures);
    builder.register(
        "render",
        CommandSpec::deferred(move |args, _| {
            let mut state = scene.lock();
            match args.token() {
                Some("start") => state.options.viewer_sync = true,
                Some("stop") => state.options.viewer_sync = false,
                Some(other) => {
                    return Err(CommandError::Invalid {
                        what: "render mode",
                        value: other.to_owned(),
                    });
                }
                None => {}
            }
            debug!(
                target: COMMAND_TARGET,
                viewer_sync = state.options.viewer_sync,
                figures = figures.len(),
                "render pass"
            );
            Ok(())
        }),
    )?;

    Ok(())
}
