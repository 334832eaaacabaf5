//! In-process simulation model controlled by the simbridge daemon.
//!
//! The model has no internal locking of its own: every mutation must happen on
//! exactly one thread at a time. [`Scene`] therefore exposes its state behind
//! a single mutex ([`Scene::lock`]) which the daemon acquires for the duration
//! of each read or deferred operation. The daemon guarantees that all
//! mutations are funnelled through its worker thread; this crate only supplies
//! the mutual-exclusion handle and the domain objects.

mod body;
mod controller;
mod error;
mod pose;
mod scene;

pub use crate::body::{Body, BodyId, BodyKind, RobotState};
pub use crate::controller::{Controller, Trajectory, Waypoint};
pub use crate::error::SceneError;
pub use crate::pose::{Aabb, Pose};
pub use crate::scene::{Scene, SceneState, SimOptions};
