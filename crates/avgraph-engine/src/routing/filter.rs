//! Filters of the routing engine.
//!
//! Every filter here only moves frames around: sources, sinks, passthrough,
//! fan-out and a deep copy. None of them touches sample values.

use crate::error::EngineError;
use crate::format::MediaType;

/// Upper bound on `split`/`asplit` outputs.
pub const MAX_SPLIT_OUTPUTS: usize = 64;

/// Filter types and their per-instance configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// Video source fed by `push_frame`.
    Buffer,
    /// Audio source fed by `push_frame`.
    ABuffer,
    /// Video sink drained by `pull_frame`.
    BufferSink,
    /// Audio sink drained by `pull_frame`.
    ABufferSink,
    /// Video passthrough.
    Null,
    /// Audio passthrough.
    ANull,
    /// Video passthrough queue.
    Fifo,
    /// Audio passthrough queue.
    AFifo,
    /// Video deep copy into engine-owned memory.
    Copy,
    /// Video fan-out to `n` outputs.
    Split(usize),
    /// Audio fan-out to `n` outputs.
    ASplit(usize),
}

/// Name and one-line description of every filter, in registry order.
pub const FILTERS: &[(&str, &str)] = &[
    ("buffer", "video source fed by the caller"),
    ("abuffer", "audio source fed by the caller"),
    ("buffersink", "video sink drained by the caller"),
    ("abuffersink", "audio sink drained by the caller"),
    ("null", "pass video through unchanged"),
    ("anull", "pass audio through unchanged"),
    ("fifo", "queue video frames"),
    ("afifo", "queue audio frames"),
    ("copy", "copy video frames into engine-owned memory"),
    ("split", "send video to N outputs"),
    ("asplit", "send audio to N outputs"),
];

impl FilterKind {
    /// Looks a filter type up by name with default configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "buffer" => FilterKind::Buffer,
            "abuffer" => FilterKind::ABuffer,
            "buffersink" => FilterKind::BufferSink,
            "abuffersink" => FilterKind::ABufferSink,
            "null" => FilterKind::Null,
            "anull" => FilterKind::ANull,
            "fifo" => FilterKind::Fifo,
            "afifo" => FilterKind::AFifo,
            "copy" => FilterKind::Copy,
            "split" => FilterKind::Split(2),
            "asplit" => FilterKind::ASplit(2),
            _ => return None,
        })
    }

    /// Type name.
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Buffer => "buffer",
            FilterKind::ABuffer => "abuffer",
            FilterKind::BufferSink => "buffersink",
            FilterKind::ABufferSink => "abuffersink",
            FilterKind::Null => "null",
            FilterKind::ANull => "anull",
            FilterKind::Fifo => "fifo",
            FilterKind::AFifo => "afifo",
            FilterKind::Copy => "copy",
            FilterKind::Split(_) => "split",
            FilterKind::ASplit(_) => "asplit",
        }
    }

    /// Media type carried by this filter's pads.
    pub fn media(&self) -> MediaType {
        match self {
            FilterKind::Buffer
            | FilterKind::BufferSink
            | FilterKind::Null
            | FilterKind::Fifo
            | FilterKind::Copy
            | FilterKind::Split(_) => MediaType::Video,
            FilterKind::ABuffer
            | FilterKind::ABufferSink
            | FilterKind::ANull
            | FilterKind::AFifo
            | FilterKind::ASplit(_) => MediaType::Audio,
        }
    }

    /// Number of input pads.
    pub fn inputs(&self) -> usize {
        match self {
            FilterKind::Buffer | FilterKind::ABuffer => 0,
            _ => 1,
        }
    }

    /// Number of output pads.
    pub fn outputs(&self) -> usize {
        match self {
            FilterKind::BufferSink | FilterKind::ABufferSink => 0,
            FilterKind::Split(n) | FilterKind::ASplit(n) => *n,
            _ => 1,
        }
    }

    /// `true` for `buffer`/`abuffer`.
    pub fn is_source(&self) -> bool {
        matches!(self, FilterKind::Buffer | FilterKind::ABuffer)
    }

    /// `true` for `buffersink`/`abuffersink`.
    pub fn is_sink(&self) -> bool {
        matches!(self, FilterKind::BufferSink | FilterKind::ABufferSink)
    }

    /// `true` when the filter honours the `enable` command.
    pub fn has_timeline(&self) -> bool {
        matches!(
            self,
            FilterKind::Null | FilterKind::ANull | FilterKind::Fifo | FilterKind::AFifo | FilterKind::Copy
        )
    }

    /// Applies initialisation arguments.
    ///
    /// `split`/`asplit` take the output count, positionally or as
    /// `outputs=N`. Sources accept and ignore arguments (parameters arrive
    /// through `set_source_params`); everything else takes none.
    pub fn apply_args(&mut self, args: &str) -> Result<(), EngineError> {
        let args = args.trim();
        if args.is_empty() {
            return Ok(());
        }
        match self {
            FilterKind::Split(n) | FilterKind::ASplit(n) => {
                let value = args.strip_prefix("outputs=").unwrap_or(args);
                let count: usize = value.parse().map_err(|_| {
                    EngineError::InvalidArgument(format!("split: bad output count '{value}'"))
                })?;
                if count == 0 || count > MAX_SPLIT_OUTPUTS {
                    return Err(EngineError::InvalidArgument(format!(
                        "split: output count {count} outside 1..={MAX_SPLIT_OUTPUTS}"
                    )));
                }
                *n = count;
                Ok(())
            }
            FilterKind::Buffer | FilterKind::ABuffer => Ok(()),
            other => Err(EngineError::InvalidArgument(format!(
                "{} takes no arguments, got '{args}'",
                other.name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_names_resolve() {
        for (name, _) in FILTERS {
            let kind = FilterKind::from_name(name).unwrap();
            assert_eq!(kind.name(), *name);
        }
        assert!(FilterKind::from_name("scale").is_none());
    }

    #[test]
    fn split_takes_output_count() {
        let mut k = FilterKind::from_name("split").unwrap();
        k.apply_args("4").unwrap();
        assert_eq!(k.outputs(), 4);
        k.apply_args("outputs=3").unwrap();
        assert_eq!(k, FilterKind::Split(3));
        assert!(k.apply_args("0").is_err());
        assert!(k.apply_args("many").is_err());
    }

    #[test]
    fn passthrough_rejects_arguments() {
        let mut k = FilterKind::Null;
        assert!(k.apply_args("").is_ok());
        assert!(matches!(
            k.apply_args("x=1"),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn pad_counts() {
        assert_eq!(FilterKind::Buffer.inputs(), 0);
        assert_eq!(FilterKind::ABufferSink.outputs(), 0);
        assert_eq!(FilterKind::ASplit(5).outputs(), 5);
        assert_eq!(FilterKind::Copy.media(), MediaType::Video);
    }
}
