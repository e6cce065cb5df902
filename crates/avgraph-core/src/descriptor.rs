//! Negotiated stream formats.
//!
//! A [`MediaDescriptor`] is what a pad remembers of the last format it saw.
//! Input pads derive it from a flow definition and turn it into source
//! parameters; output pads derive it from sink parameters to notice when a
//! new flow definition must be published.

use avgraph_engine::{
    AudioParams, ChannelLayout, ColorPrimaries, ColorRange, ColorSpace, PixelFormat, Ratio,
    SampleFormat, StreamParams, TransferCharacteristic, VideoParams,
};
use avgraph_media::{FlowDef, MediaKind, PlaneLayout, Rational};

use crate::error::StageError;
use crate::formats::{
    PIPELINE_TIME_BASE, pixel_format_from_flow, pixel_planes,
    rational_from_ratio, ratio_from_rational, sample_format_from_flow,
};

/// Picture format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDescriptor {
    /// Engine pixel format (a hardware format for surfaces).
    pub format: PixelFormat,
    /// Pipeline planes in engine order; empty for hardware surfaces.
    pub planes: Vec<PlaneLayout>,
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Sample aspect ratio, zero when unknown.
    pub sar: Rational,
    /// Frame rate, zero when unknown.
    pub fps: Rational,
    /// Full-range samples.
    pub full_range: bool,
    /// Colour primaries code point.
    pub primaries: ColorPrimaries,
    /// Transfer characteristics code point.
    pub transfer: TransferCharacteristic,
    /// Matrix coefficients code point.
    pub matrix: ColorSpace,
}

/// Sound format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioDescriptor {
    /// Engine sample format.
    pub format: SampleFormat,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel layout.
    pub layout: ChannelLayout,
}

/// The last negotiated format of a pad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaDescriptor {
    /// Pictures.
    Video(VideoDescriptor),
    /// Sound.
    Audio(AudioDescriptor),
}

fn code_point(value: Option<i64>) -> i32 {
    value.and_then(|v| i32::try_from(v).ok()).unwrap_or(2)
}

impl MediaDescriptor {
    /// Reads a flow definition.
    ///
    /// Definitions that are neither picture nor sound are [`StageError::Unhandled`];
    /// missing or out-of-range attributes are [`StageError::Invalid`].
    pub fn from_flow_def(flow: &FlowDef) -> Result<Self, StageError> {
        match flow.kind() {
            Some(MediaKind::Picture) => {
                let format = pixel_format_from_flow(flow, false)?;
                let planes = pixel_planes(format).unwrap_or_default();
                let size = |v: u64, what: &str| {
                    u32::try_from(v)
                        .ok()
                        .filter(|v| *v > 0)
                        .ok_or_else(|| StageError::invalid(format!("bad {what} {v}")))
                };
                Ok(MediaDescriptor::Video(VideoDescriptor {
                    format,
                    planes,
                    width: size(flow.hsize()?, "width")?,
                    height: size(flow.vsize()?, "height")?,
                    sar: flow.sar().unwrap_or(Rational::new(0, 1)),
                    fps: flow.fps().unwrap_or(Rational::new(0, 1)),
                    full_range: flow.full_range(),
                    primaries: ColorPrimaries(code_point(flow.colour_primaries())),
                    transfer: TransferCharacteristic(code_point(flow.transfer_characteristics())),
                    matrix: ColorSpace(code_point(flow.matrix_coefficients())),
                }))
            }
            Some(MediaKind::Sound) => {
                let (format, layout) = sample_format_from_flow(flow)?;
                let rate = flow.rate()?;
                let sample_rate = u32::try_from(rate)
                    .ok()
                    .filter(|r| *r > 0)
                    .ok_or_else(|| StageError::invalid(format!("bad sample rate {rate}")))?;
                Ok(MediaDescriptor::Audio(AudioDescriptor {
                    format,
                    sample_rate,
                    layout,
                }))
            }
            None => Err(StageError::unhandled(format!(
                "unsupported flow definition '{}'",
                flow.def().unwrap_or("")
            ))),
        }
    }

    /// Reads negotiated sink parameters.
    ///
    /// An unknown frame rate falls back to the inverse of the time base.
    pub fn from_stream(params: &StreamParams) -> Self {
        match params {
            StreamParams::Video(v) => {
                let fps = v
                    .frame_rate
                    .filter(|r| !r.is_zero())
                    .unwrap_or_else(|| v.time_base.inverse());
                let format = v.hw_frames.as_ref().map_or(v.format, |hw| hw.sw_format());
                MediaDescriptor::Video(VideoDescriptor {
                    format,
                    planes: pixel_planes(format).unwrap_or_default(),
                    width: v.width,
                    height: v.height,
                    sar: rational_from_ratio(v.sar.unwrap_or(Ratio::new(0, 1))),
                    fps: rational_from_ratio(fps),
                    full_range: v.color_range == ColorRange::Full,
                    primaries: ColorPrimaries::default(),
                    transfer: TransferCharacteristic::default(),
                    matrix: v.colorspace,
                })
            }
            StreamParams::Audio(a) => MediaDescriptor::Audio(AudioDescriptor {
                format: a.format,
                sample_rate: a.sample_rate,
                layout: a.layout,
            }),
        }
    }

    /// Pipeline media kind.
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaDescriptor::Video(_) => MediaKind::Picture,
            MediaDescriptor::Audio(_) => MediaKind::Sound,
        }
    }

    /// Compares the fields that decide whether a graph must be rebuilt.
    ///
    /// Everything that reaches the source parameters takes part. Primaries
    /// and transfer only tag frames and do not.
    pub fn same_format(&self, other: &MediaDescriptor) -> bool {
        match (self, other) {
            (MediaDescriptor::Video(a), MediaDescriptor::Video(b)) => {
                a.format == b.format
                    && a.width == b.width
                    && a.height == b.height
                    && a.sar.simplified() == b.sar.simplified()
                    && a.fps.simplified() == b.fps.simplified()
                    && a.full_range == b.full_range
                    && a.matrix == b.matrix
            }
            (MediaDescriptor::Audio(a), MediaDescriptor::Audio(b)) => a == b,
            _ => false,
        }
    }

    /// Source parameters for a buffer source, in the pipeline time base.
    pub fn stream_params(&self) -> Result<StreamParams, StageError> {
        match self {
            MediaDescriptor::Video(v) => {
                let mut params = VideoParams::new(PIPELINE_TIME_BASE, v.format, v.width, v.height);
                if !v.sar.is_zero() {
                    params.sar = Some(ratio_from_rational(v.sar)?);
                }
                if !v.fps.is_zero() {
                    params.frame_rate = Some(ratio_from_rational(v.fps)?);
                }
                params.color_range = if v.full_range {
                    ColorRange::Full
                } else {
                    ColorRange::Limited
                };
                params.colorspace = v.matrix;
                Ok(StreamParams::Video(params))
            }
            MediaDescriptor::Audio(a) => Ok(StreamParams::Audio(AudioParams {
                time_base: PIPELINE_TIME_BASE,
                format: a.format,
                sample_rate: a.sample_rate,
                layout: a.layout,
            })),
        }
    }
}
