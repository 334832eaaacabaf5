//! Error types for scene operations.

use std::io;

use thiserror::Error;

use crate::body::BodyId;

/// Errors surfaced by scene queries and mutations.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The referenced body does not exist.
    #[error("no body with id {id}")]
    UnknownBody {
        /// Identifier that failed to resolve.
        id: BodyId,
    },
    /// The referenced body exists but is not a robot.
    #[error("body {id} is not a robot")]
    NotARobot {
        /// Identifier of the non-robot body.
        id: BodyId,
    },
    /// A joint index was outside the body's degree-of-freedom range.
    #[error("joint index {index} out of range for {dof} dof")]
    BadJointIndex {
        /// Offending index.
        index: usize,
        /// Number of joints on the body.
        dof: usize,
    },
    /// A joint value vector did not match the expected length.
    #[error("expected {expected} joint values, got {got}")]
    JointCountMismatch {
        /// Number of values required.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },
    /// A transform was supplied with an unsupported number of components.
    #[error("transform needs 3, 7, or 12 values, got {got}")]
    BadTransform {
        /// Number of values supplied.
        got: usize,
    },
    /// A scene file could not be read.
    #[error("failed to read scene file {path}: {source}")]
    LoadIo {
        /// Path that failed to load.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A scene file contained an entry that could not be parsed.
    #[error("malformed scene entry at {path}:{line}: {entry}")]
    LoadParse {
        /// Path of the offending file.
        path: String,
        /// One-based line number.
        line: usize,
        /// The entry text that failed to parse.
        entry: String,
    },
}
