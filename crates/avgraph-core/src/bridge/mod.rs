//! Frame Bridge: pipeline buffers to engine frames and back.
//!
//! Neither direction copies sample data:
//!
//! - **To the engine**: every plane of the buffer is mapped read-only and
//!   wrapped in a [`BridgedPlane`]. The buffer is released once, after the
//!   engine dropped the last plane.
//! - **From the engine**: the frame is wrapped in a [`NativeBacked`] plane
//!   source. When every plane of the frame is still a [`BridgedPlane`] of a
//!   single buffer (a pass-through graph), that buffer is reused directly.
//!
//! Timestamps are not touched here; the caller stamps buffers and frames.

mod native;
mod picture;
mod release;
mod sound;

pub use native::NativeBacked;
pub use release::BridgedPlane;

use avgraph_engine::{FrameProps, NativeFrame};
use avgraph_media::{BufferAllocator, MediaBuffer};
use std::sync::Arc;

use crate::descriptor::MediaDescriptor;
use crate::error::StageError;

/// Converts a pipeline buffer into a native frame for a source of format `desc`.
///
/// A buffer that already wraps a native frame hands back a shallow copy of
/// that frame. On error the buffer is released.
pub fn to_native(buffer: MediaBuffer, desc: &MediaDescriptor) -> Result<NativeFrame, StageError> {
    if let Some(backed) = buffer
        .external_source()
        .and_then(|s| s.as_any().downcast_ref::<NativeBacked>())
    {
        let mut frame = backed.frame().clone();
        if let (FrameProps::Video(props), MediaDescriptor::Video(_)) = (&mut frame.props, desc) {
            props.interlaced = !buffer.attrs.progressive;
            props.top_field_first = buffer.attrs.tff;
            props.key_frame = buffer.attrs.key;
        }
        return Ok(frame);
    }
    match desc {
        MediaDescriptor::Video(v) => picture::to_native(buffer, v),
        MediaDescriptor::Audio(a) => sound::to_native(buffer, a),
    }
}

/// Converts a native frame into a pipeline buffer.
pub fn from_native(frame: NativeFrame, alloc: &BufferAllocator) -> Result<MediaBuffer, StageError> {
    let bridged = frame
        .planes
        .iter()
        .map(|p| p.data.as_any().downcast_ref::<BridgedPlane>())
        .collect::<Option<Vec<_>>>();
    if let Some(bridged) = bridged
        && let Some(buffer) = release::common_buffer(bridged.into_iter(), frame.planes.len())
    {
        tracing::trace!("bridge_from_native: reusing pipeline buffer");
        return Ok(buffer);
    }

    let layout = match &frame.props {
        FrameProps::Video(v) => picture::layout(&frame, v)?,
        FrameProps::Audio(a) => sound::layout(&frame, a)?,
    };
    Ok(alloc.wrap(Arc::new(NativeBacked::new(frame, layout))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use avgraph_engine::{AudioProps, ChannelLayout, PixelFormat, SampleFormat, VideoProps};
    use avgraph_media::{FlowDef, MediaKind, Rational};

    use crate::formats::{pixel_format_to_flow, pixel_planes, sample_format_to_flow};

    fn gray_desc(w: u64, h: u64) -> MediaDescriptor {
        let mut flow = FlowDef::picture();
        pixel_format_to_flow(PixelFormat::Gray, &mut flow).unwrap();
        flow.set_hsize(w);
        flow.set_vsize(h);
        flow.set_fps(Rational::new(25, 1));
        MediaDescriptor::from_flow_def(&flow).unwrap()
    }

    fn gray_buffer(alloc: &BufferAllocator, w: usize, h: usize) -> MediaBuffer {
        let planes = pixel_planes(PixelFormat::Gray).unwrap();
        let mut b = alloc.picture(w, h, &planes);
        if let Some(y) = b.plane_mut("y8") {
            for (i, v) in y.iter_mut().enumerate() {
                *v = i as u8;
            }
        }
        b.build()
    }

    #[test]
    fn picture_round_trip_reuses_the_buffer() {
        let alloc = BufferAllocator::new();
        let mut buffer = gray_buffer(&alloc, 8, 4);
        buffer.attrs.progressive = true;
        let probe = buffer.clone();

        let frame = to_native(buffer, &gray_desc(8, 4)).unwrap();
        let props = frame.video().unwrap();
        assert!(!props.interlaced);
        assert_eq!(frame.planes.len(), 1);
        assert_eq!(frame.planes[0].linesize, 8);
        assert_eq!(probe.mapped_count("y8"), 1);

        let back = from_native(frame, &alloc).unwrap();
        assert!(back.same_storage(&probe));
        assert_eq!(probe.mapped_count("y8"), 0);
        assert_eq!(back.plane("y8").unwrap()[9], 9);
    }

    #[test]
    fn copied_picture_round_trip_keeps_samples() {
        let alloc = BufferAllocator::new();
        let buffer = gray_buffer(&alloc, 8, 4);
        let original = buffer.plane("y8").unwrap().to_vec();

        let frame = to_native(buffer, &gray_desc(8, 4)).unwrap();
        let copy = frame.deep_copy();
        drop(frame);
        assert_eq!(alloc.live_buffers(), 0);

        let back = from_native(copy, &alloc).unwrap();
        assert_eq!(back.pic_size().unwrap(), (8, 4));
        assert_eq!(back.pic_planes().unwrap().len(), 1);
        assert_eq!(back.plane("y8").unwrap(), original.as_slice());
    }

    #[test]
    fn size_mismatch_is_invalid_and_releases() {
        let alloc = BufferAllocator::new();
        let buffer = gray_buffer(&alloc, 8, 4);
        let err = to_native(buffer, &gray_desc(16, 4)).unwrap_err();
        assert!(matches!(err, StageError::Invalid(_)));
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn sound_buffer_into_planar_frame() {
        let alloc = BufferAllocator::new();
        let mut flow = FlowDef::default();
        sample_format_to_flow(SampleFormat::S16P, ChannelLayout::STEREO, &mut flow);
        flow.set_rate(48_000);
        let desc = MediaDescriptor::from_flow_def(&flow).unwrap();

        let buffer = alloc.sound(16, 2, &["l", "r"]).build();
        let frame = to_native(buffer, &desc).unwrap();
        let props = frame.audio().unwrap();
        assert_eq!(props.nb_samples, 16);
        assert_eq!(props.format, SampleFormat::S16P);
        assert_eq!(frame.planes.len(), 2);
        assert_eq!(frame.planes[1].linesize, 32);

        drop(frame);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn sound_layout_mismatch_is_invalid() {
        let alloc = BufferAllocator::new();
        let mut flow = FlowDef::default();
        sample_format_to_flow(SampleFormat::S16, ChannelLayout::STEREO, &mut flow);
        flow.set_rate(48_000);
        let desc = MediaDescriptor::from_flow_def(&flow).unwrap();

        let buffer = alloc.sound(16, 2, &["lr"]).build();
        assert!(matches!(to_native(buffer, &desc), Err(StageError::Invalid(_))));
        let picture = gray_buffer(&alloc, 2, 2);
        assert!(matches!(to_native(picture, &desc), Err(StageError::Invalid(_))));
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn engine_frames_are_wrapped_without_copy() {
        let alloc = BufferAllocator::new();
        let frame = NativeFrame::alloc_video(VideoProps::new(PixelFormat::Yuv420p, 4, 2));
        let luma = Arc::clone(&frame.planes[0].data);

        let buffer = from_native(frame, &alloc).unwrap();
        assert_eq!(buffer.kind(), Some(MediaKind::Picture));
        assert_eq!(buffer.pic_size().unwrap(), (4, 2));
        assert_eq!(buffer.plane("y8").unwrap().as_ptr(), luma.bytes().as_ptr());
        assert_eq!(buffer.plane("u8").unwrap().len(), 2);

        let desc = MediaDescriptor::from_stream(&avgraph_engine::StreamParams::Video(
            avgraph_engine::VideoParams::new(
                crate::formats::PIPELINE_TIME_BASE,
                PixelFormat::Yuv420p,
                4,
                2,
            ),
        ));
        let again = to_native(buffer, &desc).unwrap();
        assert!(Arc::ptr_eq(&again.planes[0].data, &luma));
    }

    #[test]
    fn engine_audio_frames_get_named_planes() {
        let alloc = BufferAllocator::new();
        let frame = NativeFrame::alloc_audio(AudioProps {
            format: SampleFormat::FltP,
            layout: ChannelLayout::SURROUND_5_1_BACK,
            sample_rate: 48_000,
            nb_samples: 10,
        });
        let buffer = from_native(frame, &alloc).unwrap();
        assert_eq!(buffer.sound_planes().unwrap(), vec!["l", "r", "c", "L", "s", "S"]);
        assert_eq!(buffer.sound_samples().unwrap(), 10);
        assert_eq!(buffer.sound_sample_size().unwrap(), 4);
    }
}
