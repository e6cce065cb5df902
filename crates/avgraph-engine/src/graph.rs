//! The engine interface: graphs, filters, and the parameters crossing them.

use core::fmt;

use crate::error::{EngineError, PullError};
use crate::format::{ChannelLayout, ColorRange, ColorSpace, MediaType, PixelFormat, Ratio, SampleFormat};
use crate::frame::NativeFrame;
use crate::hw::{HwDevice, HwDeviceType, HwFrames};

/// Handle on a filter instance inside one graph.
///
/// Handles are never reused within a graph, so a stale handle fails with
/// [`EngineError::FilterNotFound`] instead of aliasing a new filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(pub(crate) u32);

impl FilterId {
    /// Raw index.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An unlinked pad, optionally labelled.
///
/// Used both for the open outputs a caller offers to a description and for
/// the open inputs/outputs the description leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InOut {
    /// Link label.
    pub name: Option<String>,
    /// Filter owning the pad.
    pub filter: FilterId,
    /// Pad index on that filter.
    pub pad: usize,
}

impl InOut {
    /// A labelled pad.
    pub fn named(name: &str, filter: FilterId, pad: usize) -> Self {
        Self {
            name: Some(name.to_string()),
            filter,
            pad,
        }
    }
}

/// What a parsed description left unlinked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLinks {
    /// Filter input pads nothing feeds.
    pub inputs: Vec<InOut>,
    /// Filter output pads nothing consumes.
    pub outputs: Vec<InOut>,
}

/// A filter instance in a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterInfo {
    /// Handle.
    pub id: FilterId,
    /// Instance name (unique by convention, not enforced).
    pub instance: String,
    /// Filter type name.
    pub filter: String,
}

/// Video stream parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParams {
    /// Time base of timestamps.
    pub time_base: Ratio,
    /// Pixel format.
    pub format: PixelFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Sample aspect ratio, if known.
    pub sar: Option<Ratio>,
    /// Frame rate, if known.
    pub frame_rate: Option<Ratio>,
    /// Sample range.
    pub color_range: ColorRange,
    /// Matrix coefficients.
    pub colorspace: ColorSpace,
    /// Hardware frame pool for hardware formats.
    pub hw_frames: Option<HwFrames>,
}

impl VideoParams {
    /// Parameters with unknown aspect ratio and rate and unspecified colour.
    pub fn new(time_base: Ratio, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            time_base,
            format,
            width,
            height,
            sar: None,
            frame_rate: None,
            color_range: ColorRange::Unspecified,
            colorspace: ColorSpace::default(),
            hw_frames: None,
        }
    }
}

/// Audio stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    /// Time base of timestamps.
    pub time_base: Ratio,
    /// Sample format.
    pub format: SampleFormat,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel layout.
    pub layout: ChannelLayout,
}

/// Stream parameters of a source, a link, or a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamParams {
    /// Video.
    Video(VideoParams),
    /// Audio.
    Audio(AudioParams),
}

impl StreamParams {
    /// Media type.
    pub fn media_type(&self) -> MediaType {
        match self {
            StreamParams::Video(_) => MediaType::Video,
            StreamParams::Audio(_) => MediaType::Audio,
        }
    }

    /// Time base of timestamps.
    pub fn time_base(&self) -> Ratio {
        match self {
            StreamParams::Video(v) => v.time_base,
            StreamParams::Audio(a) => a.time_base,
        }
    }
}

/// A filter-graph engine.
pub trait Engine: Send + Sync {
    /// Engine name for diagnostics.
    fn name(&self) -> &str;

    /// Allocates an empty graph.
    fn alloc_graph(&self) -> Result<Box<dyn FilterGraph>, EngineError>;

    /// Names of the filters this engine provides.
    fn filter_names(&self) -> Vec<&'static str>;

    /// `true` when a filter with this name exists.
    fn has_filter(&self, name: &str) -> bool {
        self.filter_names().contains(&name)
    }

    /// Opens a hardware device.
    fn create_hw_device(
        &self,
        kind: HwDeviceType,
        device: Option<&str>,
    ) -> Result<HwDevice, EngineError>;
}

/// One filter graph.
///
/// Filters are allocated, initialised and linked (by hand or by parsing a
/// description), then the graph is configured once; after that only the
/// data-path methods and [`FilterGraph::send_command`] are valid.
pub trait FilterGraph: Send {
    /// Sets (`Some`) or clears (`None`) a graph option.
    fn set_option(&mut self, key: &str, value: Option<&str>) -> Result<(), EngineError>;

    /// Enables or disables automatic format conversion at configure time.
    fn set_auto_convert(&mut self, enabled: bool);

    /// Creates a filter instance.
    fn alloc_filter(&mut self, filter: &str, instance: &str) -> Result<FilterId, EngineError>;

    /// Initialises a filter with optional arguments.
    fn init_filter(&mut self, id: FilterId, args: Option<&str>) -> Result<(), EngineError>;

    /// Removes a filter and every link touching it.
    fn free_filter(&mut self, id: FilterId);

    /// Sets the stream parameters of a source filter.
    fn set_source_params(&mut self, id: FilterId, params: &StreamParams)
    -> Result<(), EngineError>;

    /// Reads a description, linking its labels against the given open pads.
    ///
    /// `inputs` are filter input pads waiting for a producer, `outputs` are
    /// filter output pads waiting for a consumer. The returned lists hold
    /// what is still unlinked afterwards.
    fn parse(
        &mut self,
        description: &str,
        inputs: Vec<InOut>,
        outputs: Vec<InOut>,
    ) -> Result<ParsedLinks, EngineError>;

    /// Media type of an output pad.
    fn output_type(&self, id: FilterId, pad: usize) -> Option<MediaType>;

    /// Media type of an input pad.
    fn input_type(&self, id: FilterId, pad: usize) -> Option<MediaType>;

    /// Every filter, in creation order.
    fn filters(&self) -> Vec<FilterInfo>;

    /// Attaches a hardware device to a filter.
    fn set_hw_device(
        &mut self,
        id: FilterId,
        device: &HwDevice,
        extra_frames: u32,
    ) -> Result<(), EngineError>;

    /// Validates links and formats; the graph becomes runnable.
    fn configure(&mut self) -> Result<(), EngineError>;

    /// `true` once [`FilterGraph::configure`] succeeded.
    fn is_configured(&self) -> bool;

    /// Feeds a frame to a source.
    fn push_frame(&mut self, source: FilterId, frame: NativeFrame) -> Result<(), EngineError>;

    /// Signals end of stream on a source.
    fn close_source(&mut self, source: FilterId) -> Result<(), EngineError>;

    /// Takes the next frame from a sink.
    fn pull_frame(&mut self, sink: FilterId) -> Result<NativeFrame, PullError>;

    /// Negotiated parameters of a sink's input.
    fn sink_params(&self, sink: FilterId) -> Result<StreamParams, EngineError>;

    /// Sends a runtime command to `"all"` filters or to those whose
    /// instance or type name equals `target`. Returns the responses joined.
    fn send_command(&mut self, target: &str, command: &str, arg: &str)
    -> Result<String, EngineError>;
}
