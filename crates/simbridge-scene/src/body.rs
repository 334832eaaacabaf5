//! Bodies and robots tracked by the scene.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::controller::Controller;
use crate::error::SceneError;
use crate::pose::{Aabb, Pose};

/// Identifier the scene assigns to each body, starting at 1.
///
/// Ids are never reused within a process lifetime so a stale id can never
/// alias a newer body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

impl fmt::Display for BodyId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for BodyId {
    type Err = ParseIntError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        input.parse().map(Self)
    }
}

/// Discriminates rigid bodies from robots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Passive rigid body.
    Rigid,
    /// Articulated robot with a controller.
    Robot,
}

impl BodyKind {
    /// Canonical lowercase name used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rigid => "rigid",
            Self::Robot => "robot",
        }
    }
}

/// Robot-specific state: active degrees of freedom and the controller.
#[derive(Debug, Clone)]
pub struct RobotState {
    /// Number of active degrees of freedom (first `active` joints).
    pub active: usize,
    /// The robot's controller.
    pub controller: Controller,
}

/// Joint limit applied when none is specified.
const DEFAULT_JOINT_LIMIT: f64 = std::f64::consts::PI;

/// Half-extent applied to bodies with no geometry of their own.
const DEFAULT_HALF_EXTENT: f64 = 0.5;

/// One body in the scene.
#[derive(Debug, Clone)]
pub struct Body {
    id: BodyId,
    name: String,
    enabled: bool,
    pose: Pose,
    half_extents: [f64; 3],
    joints: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    robot: Option<RobotState>,
}

impl Body {
    pub(crate) fn new(id: BodyId, name: &str, dof: usize, kind: BodyKind) -> Self {
        let robot = match kind {
            BodyKind::Rigid => None,
            BodyKind::Robot => Some(RobotState {
                active: dof,
                controller: Controller::new(vec![0.0; dof]),
            }),
        };
        Self {
            id,
            name: name.to_owned(),
            enabled: true,
            pose: Pose::default(),
            half_extents: [DEFAULT_HALF_EXTENT; 3],
            joints: vec![0.0; dof],
            lower: vec![-DEFAULT_JOINT_LIMIT; dof],
            upper: vec![DEFAULT_JOINT_LIMIT; dof],
            robot,
        }
    }

    /// Scene-assigned identifier.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Body name as registered.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the body participates in the simulation.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the body.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// The body's kind.
    #[must_use]
    pub fn kind(&self) -> BodyKind {
        if self.robot.is_some() {
            BodyKind::Robot
        } else {
            BodyKind::Rigid
        }
    }

    /// Whether the body is a robot.
    #[must_use]
    pub fn is_robot(&self) -> bool {
        self.robot.is_some()
    }

    /// Robot state, when the body is a robot.
    #[must_use]
    pub fn robot(&self) -> Option<&RobotState> {
        self.robot.as_ref()
    }

    /// Mutable robot state, when the body is a robot.
    pub fn robot_mut(&mut self) -> Option<&mut RobotState> {
        self.robot.as_mut()
    }

    /// Number of joints.
    #[must_use]
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    /// Current joint values.
    #[must_use]
    pub fn joints(&self) -> &[f64] {
        &self.joints
    }

    /// Lower and upper joint limits.
    #[must_use]
    pub fn limits(&self) -> (&[f64], &[f64]) {
        (&self.lower, &self.upper)
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Sets the pose. A robot's in-flight motion is cancelled, matching the
    /// convention that teleporting a robot resets its controller.
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        if let Some(robot) = &mut self.robot {
            robot.controller.reset();
        }
    }

    /// Axis-aligned bounding box centred on the body.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb {
            center: self.pose.trans,
            extents: self.half_extents,
        }
    }

    /// Sets every joint, clamping each value to its limits.
    ///
    /// A robot's controller target is updated to the clamped values.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::JointCountMismatch`] when the value count does
    /// not equal the body's degrees of freedom.
    pub fn set_joints(&mut self, values: &[f64]) -> Result<(), SceneError> {
        if values.len() != self.joints.len() {
            return Err(SceneError::JointCountMismatch {
                expected: self.joints.len(),
                got: values.len(),
            });
        }
        for (index, value) in values.iter().enumerate() {
            self.joints[index] = value.clamp(self.lower[index], self.upper[index]);
        }
        self.refresh_controller_target();
        Ok(())
    }

    /// Sets a subset of joints by index, clamping each value to its limits.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::BadJointIndex`] for any out-of-range index; no
    /// joints are modified in that case.
    pub fn set_joints_indexed(
        &mut self,
        values: &[f64],
        indices: &[usize],
    ) -> Result<(), SceneError> {
        if let Some(&index) = indices.iter().find(|&&index| index >= self.joints.len()) {
            return Err(SceneError::BadJointIndex {
                index,
                dof: self.joints.len(),
            });
        }
        for (&index, value) in indices.iter().zip(values) {
            self.joints[index] = value.clamp(self.lower[index], self.upper[index]);
        }
        self.refresh_controller_target();
        Ok(())
    }

    /// Joint values at the given indices.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::BadJointIndex`] for any out-of-range index.
    pub fn joints_at(&self, indices: &[usize]) -> Result<Vec<f64>, SceneError> {
        indices
            .iter()
            .map(|&index| {
                self.joints
                    .get(index)
                    .copied()
                    .ok_or(SceneError::BadJointIndex {
                        index,
                        dof: self.joints.len(),
                    })
            })
            .collect()
    }

    pub(crate) fn step(&mut self, dt: f64) {
        if !self.enabled {
            return;
        }
        let Some(robot) = &mut self.robot else {
            return;
        };
        robot.controller.step(dt, &mut self.joints);
    }

    fn refresh_controller_target(&mut self) {
        let joints = self.joints.clone();
        if let Some(robot) = &mut self.robot {
            robot.controller.set_target(joints);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robot() -> Body {
        Body::new(BodyId(1), "arm", 3, BodyKind::Robot)
    }

    #[test]
    fn joints_clamp_to_limits() {
        let mut body = robot();
        body.set_joints(&[10.0, -10.0, 0.5]).expect("set joints");
        let expected = [DEFAULT_JOINT_LIMIT, -DEFAULT_JOINT_LIMIT, 0.5];
        assert_eq!(body.joints(), expected);
    }

    #[test]
    fn indexed_update_rejects_bad_index_without_mutation() {
        let mut body = robot();
        let error = body
            .set_joints_indexed(&[1.0, 2.0], &[0, 7])
            .expect_err("bad index");
        assert!(matches!(error, SceneError::BadJointIndex { index: 7, .. }));
        assert_eq!(body.joints(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn setting_joints_updates_controller_target() {
        let mut body = robot();
        body.set_joints(&[0.1, 0.2, 0.3]).expect("set joints");
        let controller = &body.robot().expect("robot").controller;
        assert_eq!(controller.target(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn set_pose_resets_robot_motion() {
        use crate::controller::{Trajectory, Waypoint};
        let mut body = robot();
        body.robot_mut()
            .expect("robot")
            .controller
            .start_trajectory(Trajectory::new(
                vec![Waypoint {
                    q: vec![1.0, 1.0, 1.0],
                    time: 5.0,
                }],
                true,
            ));
        assert!(!body.robot().expect("robot").controller.is_done());
        body.set_pose(Pose::default());
        assert!(body.robot().expect("robot").controller.is_done());
    }

    #[test]
    fn rigid_body_has_no_robot_state() {
        let body = Body::new(BodyId(2), "crate", 0, BodyKind::Rigid);
        assert!(!body.is_robot());
        assert_eq!(body.kind().as_str(), "rigid");
    }
}
