//! Joint-space controllers and trajectories for robots.

/// One timed waypoint of a joint-space trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Joint values for the robot's active degrees of freedom.
    pub q: Vec<f64>,
    /// Time offset from trajectory start, in seconds.
    pub time: f64,
}

/// Timed waypoint list executed by a robot's controller.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    points: Vec<Waypoint>,
    elapsed: f64,
}

/// Interval used when retiming a trajectory whose points carry no timestamps.
const DEFAULT_SAMPLE_INTERVAL: f64 = 0.05;

impl Trajectory {
    /// Builds a trajectory from waypoints.
    ///
    /// When `timed` is false the supplied timestamps are ignored and the
    /// points are respaced at the default sample interval.
    #[must_use]
    pub fn new(mut points: Vec<Waypoint>, timed: bool) -> Self {
        if !timed {
            for (index, point) in points.iter_mut().enumerate() {
                point.time = DEFAULT_SAMPLE_INTERVAL * index as f64;
            }
        }
        Self {
            points,
            elapsed: 0.0,
        }
    }

    /// Number of waypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the trajectory holds no waypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Advances by `dt` seconds and returns the waypoint now in effect.
    ///
    /// Returns `None` once the final waypoint has been passed (the trajectory
    /// is complete).
    fn advance(&mut self, dt: f64) -> Option<&Waypoint> {
        self.elapsed += dt;
        let current = self
            .points
            .iter()
            .rev()
            .find(|point| point.time <= self.elapsed)
            .or_else(|| self.points.first());
        match self.points.last() {
            Some(last) if self.elapsed < last.time => current,
            _ => None,
        }
    }

    /// The final waypoint, if any.
    fn last(&self) -> Option<&Waypoint> {
        self.points.last()
    }
}

/// Controller state attached to every robot.
///
/// A controller is `done` when it has no trajectory in flight; the daemon's
/// `wait` command polls this flag.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    target: Vec<f64>,
    trajectory: Option<Trajectory>,
    done: bool,
}

impl Controller {
    /// Creates an idle controller holding the given target.
    #[must_use]
    pub fn new(target: Vec<f64>) -> Self {
        Self {
            target,
            trajectory: None,
            done: true,
        }
    }

    /// Whether the controller has finished its current motion.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The joint target the controller is holding or moving towards.
    #[must_use]
    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Sets a new holding target, cancelling any trajectory in flight.
    pub fn set_target(&mut self, target: Vec<f64>) {
        self.target = target;
        self.trajectory = None;
        self.done = true;
    }

    /// Cancels any motion in flight, keeping the current target.
    pub fn reset(&mut self) {
        self.trajectory = None;
        self.done = true;
    }

    /// Starts executing a trajectory; the controller reports not-done until
    /// the final waypoint is reached.
    pub fn start_trajectory(&mut self, trajectory: Trajectory) {
        if trajectory.is_empty() {
            self.done = true;
            self.trajectory = None;
            return;
        }
        self.done = false;
        self.trajectory = Some(trajectory);
    }

    /// Advances the controller by `dt` seconds, writing the waypoint in
    /// effect into `joints`.
    pub fn step(&mut self, dt: f64, joints: &mut [f64]) {
        let Some(trajectory) = &mut self.trajectory else {
            return;
        };
        if let Some(point) = trajectory.advance(dt) {
            copy_joints(joints, &point.q);
        } else {
            if let Some(last) = trajectory.last() {
                copy_joints(joints, &last.q);
                self.target = last.q.clone();
            }
            self.trajectory = None;
            self.done = true;
        }
    }
}

fn copy_joints(joints: &mut [f64], values: &[f64]) {
    for (joint, value) in joints.iter_mut().zip(values) {
        *joint = *value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoints() -> Vec<Waypoint> {
        vec![
            Waypoint {
                q: vec![0.1],
                time: 0.0,
            },
            Waypoint {
                q: vec![0.2],
                time: 0.1,
            },
            Waypoint {
                q: vec![0.3],
                time: 0.2,
            },
        ]
    }

    #[test]
    fn controller_reports_done_after_final_waypoint() {
        let mut controller = Controller::new(vec![0.0]);
        controller.start_trajectory(Trajectory::new(waypoints(), true));
        assert!(!controller.is_done());

        let mut joints = vec![0.0];
        controller.step(0.05, &mut joints);
        assert!(!controller.is_done());

        controller.step(0.25, &mut joints);
        assert!(controller.is_done());
        assert_eq!(joints, vec![0.3]);
        assert_eq!(controller.target(), &[0.3]);
    }

    #[test]
    fn untimed_points_are_respaced() {
        let trajectory = Trajectory::new(
            vec![
                Waypoint {
                    q: vec![1.0],
                    time: 99.0,
                },
                Waypoint {
                    q: vec![2.0],
                    time: 99.0,
                },
            ],
            false,
        );
        let mut controller = Controller::new(vec![0.0]);
        controller.start_trajectory(trajectory);

        let mut joints = vec![0.0];
        // Well past the respaced end time, despite the bogus stamps.
        controller.step(1.0, &mut joints);
        assert!(controller.is_done());
        assert_eq!(joints, vec![2.0]);
    }

    #[test]
    fn empty_trajectory_is_immediately_done() {
        let mut controller = Controller::new(vec![0.0]);
        controller.start_trajectory(Trajectory::new(Vec::new(), true));
        assert!(controller.is_done());
    }

    #[test]
    fn set_target_cancels_motion() {
        let mut controller = Controller::new(vec![0.0]);
        controller.start_trajectory(Trajectory::new(waypoints(), true));
        controller.set_target(vec![0.7]);
        assert!(controller.is_done());
        assert_eq!(controller.target(), &[0.7]);
    }
}
