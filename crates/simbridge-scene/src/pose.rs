//! Rigid transforms and bounding volumes.

use crate::error::SceneError;

/// Rigid transform as a unit quaternion plus translation.
///
/// The quaternion is stored `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Rotation quaternion `[x, y, z, w]`.
    pub rot: [f64; 4],
    /// Translation vector.
    pub trans: [f64; 3],
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            rot: [0.0, 0.0, 0.0, 1.0],
            trans: [0.0, 0.0, 0.0],
        }
    }
}

impl Pose {
    /// Builds a pose from one of the three wire encodings.
    ///
    /// * 7 values: quaternion `[x y z w]` followed by translation.
    /// * 12 values: nine rotation-matrix entries in column-major order
    ///   followed by translation.
    /// * 3 values: translation only, identity rotation.
    ///
    /// The rotation is normalised before the pose is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::BadTransform`] for any other component count.
    pub fn from_values(values: &[f64]) -> Result<Self, SceneError> {
        let mut pose = match *values {
            [qx, qy, qz, qw, tx, ty, tz] => Self {
                rot: [qx, qy, qz, qw],
                trans: [tx, ty, tz],
            },
            // Nine rotation entries, column-major, then translation.
            [r0, r1, r2, r3, r4, r5, r6, r7, r8, tx, ty, tz] => Self {
                rot: quat_from_matrix([[r0, r3, r6], [r1, r4, r7], [r2, r5, r8]]),
                trans: [tx, ty, tz],
            },
            [tx, ty, tz] => Self {
                trans: [tx, ty, tz],
                ..Self::default()
            },
            _ => {
                return Err(SceneError::BadTransform { got: values.len() });
            }
        };
        pose.normalize();
        Ok(pose)
    }

    /// Normalises the rotation quaternion in place.
    pub fn normalize(&mut self) {
        let norm = self.rot.iter().map(|c| c * c).sum::<f64>().sqrt();
        if norm > f64::EPSILON {
            for c in &mut self.rot {
                *c /= norm;
            }
        } else {
            self.rot = [0.0, 0.0, 0.0, 1.0];
        }
    }
}

/// Converts a 3x3 rotation matrix (row-major) to a quaternion `[x, y, z, w]`.
fn quat_from_matrix(m: [[f64; 3]; 3]) -> [f64; 4] {
    let trace = m[0][0] + m[1][1] + m[2][2];
    if trace > 0.0 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [
            (m[2][1] - m[1][2]) / s,
            (m[0][2] - m[2][0]) / s,
            (m[1][0] - m[0][1]) / s,
            0.25 * s,
        ]
    } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
        let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
        [
            0.25 * s,
            (m[0][1] + m[1][0]) / s,
            (m[0][2] + m[2][0]) / s,
            (m[2][1] - m[1][2]) / s,
        ]
    } else if m[1][1] > m[2][2] {
        let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
        [
            (m[0][1] + m[1][0]) / s,
            0.25 * s,
            (m[1][2] + m[2][1]) / s,
            (m[0][2] - m[2][0]) / s,
        ]
    } else {
        let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
        [
            (m[0][2] + m[2][0]) / s,
            (m[1][2] + m[2][1]) / s,
            0.25 * s,
            (m[1][0] - m[0][1]) / s,
        ]
    }
}

/// Axis-aligned bounding box as centre plus half-extents.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    /// Box centre in world coordinates.
    pub center: [f64; 3],
    /// Half-extent along each axis.
    pub extents: [f64; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn translation_only_keeps_identity_rotation() {
        let pose = Pose::from_values(&[1.0, 2.0, 3.0]).expect("pose");
        assert_eq!(pose.trans, [1.0, 2.0, 3.0]);
        assert_eq!(pose.rot, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn quaternion_encoding_is_normalised() {
        // A deliberately non-unit quaternion along z.
        let pose = Pose::from_values(&[0.0, 0.0, 2.0, 0.0, 0.5, 0.5, 0.5]).expect("pose");
        assert!((pose.rot[2] - 1.0).abs() < 1e-12);
        assert_eq!(pose.trans, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn identity_matrix_maps_to_identity_quaternion() {
        let values = [
            1.0, 0.0, 0.0, // first column
            0.0, 1.0, 0.0, // second column
            0.0, 0.0, 1.0, // third column
            4.0, 5.0, 6.0,
        ];
        let pose = Pose::from_values(&values).expect("pose");
        assert!((pose.rot[3] - 1.0).abs() < 1e-12);
        assert_eq!(pose.trans, [4.0, 5.0, 6.0]);
    }

    #[rstest]
    #[case(0)]
    #[case(2)]
    #[case(5)]
    #[case(13)]
    fn rejects_unsupported_component_counts(#[case] count: usize) {
        let values = vec![0.0; count];
        assert!(matches!(
            Pose::from_values(&values),
            Err(SceneError::BadTransform { .. })
        ));
    }
}
