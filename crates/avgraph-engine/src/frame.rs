//! Native frames: the unit of data exchanged with a filter graph.
//!
//! Planes are shared through [`PlaneRef`] so a frame can be cloned, routed
//! to several sinks, and backed by memory the engine does not own.

use core::fmt;
use std::any::Any;
use std::sync::Arc;

use crate::format::{
    ChannelLayout, ColorPrimaries, ColorRange, ColorSpace, MediaType, PixelFormat, Ratio,
    SampleFormat, TransferCharacteristic,
};
use crate::hw::HwFrames;

/// Read-only plane memory.
///
/// Implementors decide what happens when the last reference is dropped,
/// which is how foreign buffers get released once the engine is done.
pub trait PlaneBuffer: Send + Sync + 'static {
    /// The plane bytes.
    fn bytes(&self) -> &[u8];

    /// Downcasting hook.
    fn as_any(&self) -> &dyn Any;
}

impl PlaneBuffer for Vec<u8> {
    fn bytes(&self) -> &[u8] {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared plane memory.
pub type PlaneRef = Arc<dyn PlaneBuffer>;

/// One plane of a frame.
#[derive(Clone)]
pub struct FramePlane {
    /// Plane memory.
    pub data: PlaneRef,
    /// Bytes per row (pictures) or total bytes (audio).
    pub linesize: usize,
}

impl fmt::Debug for FramePlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePlane")
            .field("len", &self.data.bytes().len())
            .field("linesize", &self.linesize)
            .finish()
    }
}

/// Video frame properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoProps {
    /// Pixel format.
    pub format: PixelFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Sample aspect ratio (`0/1` when unknown).
    pub sar: Ratio,
    /// Interlaced content.
    pub interlaced: bool,
    /// Top field first, meaningful when interlaced.
    pub top_field_first: bool,
    /// Key frame.
    pub key_frame: bool,
    /// Sample range.
    pub color_range: ColorRange,
    /// Colour primaries.
    pub color_primaries: ColorPrimaries,
    /// Transfer characteristics.
    pub color_trc: TransferCharacteristic,
    /// Matrix coefficients.
    pub colorspace: ColorSpace,
}

impl VideoProps {
    /// Progressive key frame with unspecified colour metadata.
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            sar: Ratio::new(0, 1),
            interlaced: false,
            top_field_first: false,
            key_frame: true,
            color_range: ColorRange::Unspecified,
            color_primaries: ColorPrimaries::default(),
            color_trc: TransferCharacteristic::default(),
            colorspace: ColorSpace::default(),
        }
    }
}

/// Audio frame properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProps {
    /// Sample format.
    pub format: SampleFormat,
    /// Channel layout.
    pub layout: ChannelLayout,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per channel.
    pub nb_samples: u32,
}

/// Media-specific frame properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameProps {
    /// Video frame.
    Video(VideoProps),
    /// Audio frame.
    Audio(AudioProps),
}

/// A frame as seen by the engine.
#[derive(Clone)]
pub struct NativeFrame {
    /// Presentation timestamp in the time base of the pad carrying the frame.
    pub pts: Option<i64>,
    /// Duration in the same time base.
    pub duration: Option<i64>,
    /// Media properties.
    pub props: FrameProps,
    /// Plane memory, empty for hardware frames.
    pub planes: Vec<FramePlane>,
    /// Hardware frame pool the surface belongs to.
    pub hw_frames: Option<HwFrames>,
}

impl fmt::Debug for NativeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFrame")
            .field("pts", &self.pts)
            .field("duration", &self.duration)
            .field("props", &self.props)
            .field("planes", &self.planes.len())
            .field("hw", &self.hw_frames.is_some())
            .finish()
    }
}

impl NativeFrame {
    /// A frame with no planes yet.
    pub fn new(props: FrameProps) -> Self {
        Self {
            pts: None,
            duration: None,
            props,
            planes: Vec::new(),
            hw_frames: None,
        }
    }

    /// Allocates zeroed engine-owned planes for a software video format.
    ///
    /// Hardware formats get no planes.
    pub fn alloc_video(props: VideoProps) -> Self {
        let planes = (0..props.format.planes().len())
            .filter_map(|i| props.format.plane_size(i, props.width, props.height))
            .map(|(linesize, rows)| FramePlane {
                data: Arc::new(vec![0u8; linesize * rows]),
                linesize,
            })
            .collect();
        Self {
            planes,
            ..Self::new(FrameProps::Video(props))
        }
    }

    /// Allocates zeroed engine-owned planes for audio.
    pub fn alloc_audio(props: AudioProps) -> Self {
        let per_channel = props.format.bytes_per_sample() * props.nb_samples as usize;
        let (count, size) = if props.format.is_planar() {
            (usize::from(props.layout.channels), per_channel)
        } else {
            (1, per_channel * usize::from(props.layout.channels))
        };
        let planes = (0..count)
            .map(|_| FramePlane {
                data: Arc::new(vec![0u8; size]),
                linesize: size,
            })
            .collect();
        Self {
            planes,
            ..Self::new(FrameProps::Audio(props))
        }
    }

    /// Media type of the frame.
    pub fn media_type(&self) -> MediaType {
        match self.props {
            FrameProps::Video(_) => MediaType::Video,
            FrameProps::Audio(_) => MediaType::Audio,
        }
    }

    /// Video properties, if this is a video frame.
    pub fn video(&self) -> Option<&VideoProps> {
        match &self.props {
            FrameProps::Video(v) => Some(v),
            FrameProps::Audio(_) => None,
        }
    }

    /// Audio properties, if this is an audio frame.
    pub fn audio(&self) -> Option<&AudioProps> {
        match &self.props {
            FrameProps::Audio(a) => Some(a),
            FrameProps::Video(_) => None,
        }
    }

    /// A copy whose planes are fresh engine-owned memory.
    pub fn deep_copy(&self) -> Self {
        let planes = self
            .planes
            .iter()
            .map(|p| FramePlane {
                data: Arc::new(p.data.bytes().to_vec()),
                linesize: p.linesize,
            })
            .collect();
        Self {
            planes,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_video_sizes_every_plane() {
        let frame = NativeFrame::alloc_video(VideoProps::new(PixelFormat::Yuv420p, 8, 4));
        let sizes: Vec<_> = frame.planes.iter().map(|p| p.data.bytes().len()).collect();
        assert_eq!(sizes, [32, 8, 8]);
        assert_eq!(frame.planes[1].linesize, 4);
    }

    #[test]
    fn alloc_audio_packed_and_planar() {
        let packed = NativeFrame::alloc_audio(AudioProps {
            format: SampleFormat::S16,
            layout: ChannelLayout::STEREO,
            sample_rate: 48000,
            nb_samples: 10,
        });
        assert_eq!(packed.planes.len(), 1);
        assert_eq!(packed.planes[0].data.bytes().len(), 40);

        let planar = NativeFrame::alloc_audio(AudioProps {
            format: SampleFormat::FltP,
            layout: ChannelLayout::STEREO,
            sample_rate: 48000,
            nb_samples: 10,
        });
        assert_eq!(planar.planes.len(), 2);
        assert_eq!(planar.planes[1].data.bytes().len(), 40);
    }

    #[test]
    fn deep_copy_owns_new_memory() {
        let frame = NativeFrame::alloc_video(VideoProps::new(PixelFormat::Gray, 4, 4));
        let copy = frame.deep_copy();
        assert!(!Arc::ptr_eq(&frame.planes[0].data, &copy.planes[0].data));
        assert_eq!(frame.planes[0].data.bytes(), copy.planes[0].data.bytes());
    }
}
