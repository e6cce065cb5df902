//! Stage errors.

use core::fmt;

use avgraph_engine::EngineError;
use avgraph_media::MediaError;
use thiserror::Error;

/// Flat classification of a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or unsupported format, size mismatch, missing pad.
    Invalid,
    /// An allocation failed.
    Alloc,
    /// The engine refused an operation.
    External,
    /// Something is already initialised.
    Busy,
    /// Media that is neither picture nor sound.
    Unhandled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Invalid => "invalid",
            ErrorKind::Alloc => "alloc",
            ErrorKind::External => "external",
            ErrorKind::Busy => "busy",
            ErrorKind::Unhandled => "unhandled",
        })
    }
}

/// Errors returned by the filter stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A format, buffer or request was rejected.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Memory for a frame or buffer could not be obtained.
    #[error("allocation failed: {0}")]
    Alloc(String),

    /// An engine call failed.
    #[error("{context}: {source}")]
    External {
        /// What the stage was doing.
        context: String,
        /// The engine's own diagnostic.
        #[source]
        source: EngineError,
    },

    /// The target is already initialised.
    #[error("busy: {0}")]
    Busy(String),

    /// The media kind is not supported at all.
    #[error("unhandled: {0}")]
    Unhandled(String),
}

impl StageError {
    /// Create an invalid-input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        StageError::Invalid(message.into())
    }

    /// Create an engine failure error.
    pub fn external(context: impl Into<String>, source: EngineError) -> Self {
        StageError::External {
            context: context.into(),
            source,
        }
    }

    /// Create a busy error.
    pub fn busy(message: impl Into<String>) -> Self {
        StageError::Busy(message.into())
    }

    /// Create an unhandled-media error.
    pub fn unhandled(message: impl Into<String>) -> Self {
        StageError::Unhandled(message.into())
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::Invalid(_) => ErrorKind::Invalid,
            StageError::Alloc(_) => ErrorKind::Alloc,
            StageError::External { .. } => ErrorKind::External,
            StageError::Busy(_) => ErrorKind::Busy,
            StageError::Unhandled(_) => ErrorKind::Unhandled,
        }
    }
}

impl From<MediaError> for StageError {
    fn from(err: MediaError) -> Self {
        StageError::Invalid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_display_carries_engine_diagnostic() {
        let err = StageError::external("cannot configure", EngineError::Config("cycle".into()));
        assert_eq!(err.kind(), ErrorKind::External);
        assert_eq!(
            err.to_string(),
            "cannot configure: graph configuration failed: cycle"
        );
    }

    #[test]
    fn media_errors_are_invalid() {
        let err: StageError = MediaError::NoStorage.into();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }
}
