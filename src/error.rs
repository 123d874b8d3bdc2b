//! Error types shared by the solver and its operators

use thiserror::Error;

/// Result type alias using the crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a solve.
///
/// Running out of iterations is not an error: the solver still returns its
/// last estimate and reports `converged == false`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A buffer does not have the shape fixed by the problem configuration
    #[error("shape mismatch for `{name}`: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Name of the offending buffer
        name: &'static str,
        /// Shape required by the configuration
        expected: Vec<usize>,
        /// Shape that was supplied
        got: Vec<usize>,
    },

    /// A configuration constant is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The execution backend reported a nonzero error code
    #[error("backend failed with error code {code}")]
    Backend {
        /// Code returned by the backend, never zero
        code: i32,
    },
}

impl Error {
    /// `true` for errors detected before iterating (bad shapes or constants)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::ShapeMismatch { .. } | Error::InvalidConfig(_))
    }

    pub(crate) fn check_shape(name: &'static str, expected: &[usize], got: &[usize]) -> Result<()> {
        if expected == got {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                name,
                expected: expected.to_vec(),
                got: got.to_vec(),
            })
        }
    }
}
