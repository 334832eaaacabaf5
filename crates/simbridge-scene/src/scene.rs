//! The scene container and its single mutual-exclusion handle.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::body::{Body, BodyId, BodyKind};
use crate::error::SceneError;

/// Tracing target for scene operations.
const SCENE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scene");

/// Global simulation options.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    /// Step size used by the simulation loop, in seconds.
    pub timestep: f64,
    /// World gravity vector.
    pub gravity: [f64; 3],
    /// Whether the simulation loop is advancing.
    pub running: bool,
    /// Whether the viewer mirrors scene updates.
    pub viewer_sync: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            timestep: 0.01,
            gravity: [0.0, 0.0, -9.81],
            running: false,
            viewer_sync: true,
        }
    }
}

/// The mutable simulation state guarded by [`Scene`].
#[derive(Debug, Default)]
pub struct SceneState {
    bodies: BTreeMap<BodyId, Body>,
    next_id: u32,
    sim_time: f64,
    /// Global simulation options.
    pub options: SimOptions,
}

impl SceneState {
    /// Adds a rigid body and returns its new id.
    pub fn add_body(&mut self, name: &str, dof: usize) -> BodyId {
        self.insert(name, dof, BodyKind::Rigid)
    }

    /// Adds a robot and returns its new id.
    pub fn add_robot(&mut self, name: &str, dof: usize) -> BodyId {
        self.insert(name, dof, BodyKind::Robot)
    }

    fn insert(&mut self, name: &str, dof: usize, kind: BodyKind) -> BodyId {
        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.bodies.insert(id, Body::new(id, name, dof, kind));
        debug!(
            target: SCENE_TARGET,
            id = id.0,
            name,
            kind = kind.as_str(),
            "body added"
        );
        id
    }

    /// Removes a body.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownBody`] when the id does not resolve.
    pub fn remove_body(&mut self, id: BodyId) -> Result<(), SceneError> {
        self.bodies
            .remove(&id)
            .map(|_| ())
            .ok_or(SceneError::UnknownBody { id })
    }

    /// Looks up a body.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownBody`] when the id does not resolve.
    pub fn body(&self, id: BodyId) -> Result<&Body, SceneError> {
        self.bodies.get(&id).ok_or(SceneError::UnknownBody { id })
    }

    /// Looks up a body mutably.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownBody`] when the id does not resolve.
    pub fn body_mut(&mut self, id: BodyId) -> Result<&mut Body, SceneError> {
        self.bodies
            .get_mut(&id)
            .ok_or(SceneError::UnknownBody { id })
    }

    /// Looks up a robot.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownBody`] when the id does not resolve and
    /// [`SceneError::NotARobot`] when it resolves to a rigid body.
    pub fn robot(&self, id: BodyId) -> Result<&Body, SceneError> {
        let body = self.body(id)?;
        if body.is_robot() {
            Ok(body)
        } else {
            Err(SceneError::NotARobot { id })
        }
    }

    /// Looks up a robot mutably.
    ///
    /// # Errors
    ///
    /// Same as [`SceneState::robot`].
    pub fn robot_mut(&mut self, id: BodyId) -> Result<&mut Body, SceneError> {
        if !self.body(id)?.is_robot() {
            return Err(SceneError::NotARobot { id });
        }
        self.body_mut(id)
    }

    /// Finds a body by exact name.
    #[must_use]
    pub fn body_by_name(&self, name: &str) -> Option<&Body> {
        self.bodies.values().find(|body| body.name() == name)
    }

    /// Iterates over every body in id order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Iterates over every robot in id order.
    pub fn robots(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values().filter(|body| body.is_robot())
    }

    /// Number of bodies in the scene.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the scene holds no bodies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Accumulated simulation time, in seconds.
    #[must_use]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.sim_time += dt;
        for body in self.bodies.values_mut() {
            body.step(dt);
        }
    }

    /// Removes every body. Ids keep counting upward so removed ids never
    /// come back.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.sim_time = 0.0;
        self.options = SimOptions::default();
    }

    /// Loads bodies from a scene file, one entry per line.
    ///
    /// Each entry is `body <name> <dof>` or `robot <name> <dof>`. Blank lines
    /// and lines starting with `#` are ignored. Returns the number of bodies
    /// added.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::LoadIo`] when the file cannot be read and
    /// [`SceneError::LoadParse`] for an entry that does not match the format;
    /// entries preceding the bad one stay loaded.
    pub fn load(&mut self, path: &Path) -> Result<usize, SceneError> {
        let text = fs::read_to_string(path).map_err(|source| SceneError::LoadIo {
            path: path.display().to_string(),
            source,
        })?;
        let mut added = 0;
        for (index, line) in text.lines().enumerate() {
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let parse_error = || SceneError::LoadParse {
                path: path.display().to_string(),
                line: index + 1,
                entry: entry.to_owned(),
            };
            let mut fields = entry.split_whitespace();
            let kind = fields.next().ok_or_else(parse_error)?;
            let name = fields.next().ok_or_else(parse_error)?;
            let dof: usize = fields
                .next()
                .and_then(|field| field.parse().ok())
                .ok_or_else(parse_error)?;
            match kind {
                "body" => self.add_body(name, dof),
                "robot" => self.add_robot(name, dof),
                _ => return Err(parse_error()),
            };
            added += 1;
        }
        Ok(added)
    }
}

/// Thread-safe handle to the simulation model.
///
/// The scene's only concurrency contract is this mutex: callers acquire it
/// via [`Scene::lock`] for the duration of any read or mutation.
#[derive(Debug, Default)]
pub struct Scene {
    state: Mutex<SceneState>,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the scene lock.
    ///
    /// A poisoned lock is recovered rather than propagated: the daemon
    /// isolates handler panics at the dispatch boundary, so state behind a
    /// poisoned mutex is still the last consistent state.
    pub fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
