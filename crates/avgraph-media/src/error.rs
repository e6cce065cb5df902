//! Error type for buffer and flow-definition access.

use thiserror::Error;

/// Errors raised by [`crate::MediaBuffer`] and [`crate::FlowDef`] accessors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// The buffer does not hold the requested kind of media.
    #[error("buffer does not hold {0} data")]
    WrongKind(&'static str),

    /// The buffer has no plane with this name.
    #[error("no plane named '{0}'")]
    NoSuchPlane(String),

    /// The buffer's storage was detached.
    #[error("buffer has no storage")]
    NoStorage,

    /// A flow-definition attribute is missing or has the wrong type.
    #[error("missing or mistyped attribute '{0}'")]
    Attribute(String),

    /// A string could not be read as `num/den`.
    #[error("invalid rational '{0}'")]
    InvalidRational(String),
}
