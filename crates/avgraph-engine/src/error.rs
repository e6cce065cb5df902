//! Engine diagnostics.

use thiserror::Error;

use crate::graph::FilterId;

/// Errors reported by a filter-graph engine.
///
/// The display string is the engine's own diagnostic and is meant to be
/// surfaced verbatim by callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No filter with this name is registered.
    #[error("no such filter: '{0}'")]
    UnknownFilter(String),

    /// No graph option with this key exists.
    #[error("option '{0}' not found")]
    UnknownOption(String),

    /// An argument or option value was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The graph description could not be read.
    #[error("error parsing graph description at byte {pos}: {message}")]
    Parse {
        /// Byte offset of the problem.
        pos: usize,
        /// What went wrong.
        message: String,
    },

    /// Linking two pads failed while reading a description.
    #[error("cannot link: {0}")]
    Link(String),

    /// Graph configuration failed.
    #[error("graph configuration failed: {0}")]
    Config(String),

    /// The graph is not configured yet.
    #[error("filter graph is not configured")]
    NotConfigured,

    /// The graph is configured and can no longer be edited.
    #[error("filter graph is already configured")]
    AlreadyConfigured,

    /// The filter handle does not name a live filter.
    #[error("filter {0} not found")]
    FilterNotFound(FilterId),

    /// The filter exists but cannot perform the operation.
    #[error("function not implemented: {0}")]
    NotSupported(String),

    /// A frame does not match the parameters of the pad it was pushed to.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The source was closed and accepts no more frames.
    #[error("source {0} is closed")]
    SourceClosed(FilterId),

    /// A hardware device could not be opened.
    #[error("cannot open {kind} device: {reason}")]
    Device {
        /// Device type name.
        kind: String,
        /// Why it failed.
        reason: String,
    },
}

/// Outcome of pulling from a sink that produced no frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PullError {
    /// No frame is available right now.
    #[error("resource temporarily unavailable")]
    WouldBlock,

    /// The sink will never produce another frame.
    #[error("end of stream")]
    EndOfStream,

    /// The pull itself failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
