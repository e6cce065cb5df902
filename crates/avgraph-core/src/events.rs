//! Stage-level events for the embedding pipeline.

use crate::error::{ErrorKind, StageError};
use crate::pad::PadId;

/// Something the embedding pipeline may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// The graph is configured and data can flow.
    SyncAcquired,
    /// A configured graph was torn down.
    SyncLost,
    /// Building the graph failed; it is absent until the next change.
    GraphFailed {
        /// Error class.
        kind: ErrorKind,
        /// Diagnostic.
        message: String,
    },
    /// A buffer or frame was dropped.
    Error {
        /// Pad concerned, `None` for the implicit input and output.
        pad: Option<PadId>,
        /// Error class.
        kind: ErrorKind,
        /// Diagnostic.
        message: String,
    },
    /// An output advertises a larger latency.
    LatencyRaised {
        /// Pad concerned, `None` for the implicit output.
        pad: Option<PadId>,
        /// New latency in clock ticks.
        latency: u64,
    },
}

impl StageEvent {
    pub(crate) fn graph_failed(err: &StageError) -> Self {
        StageEvent::GraphFailed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub(crate) fn error(pad: Option<PadId>, err: &StageError) -> Self {
        StageEvent::Error {
            pad,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
