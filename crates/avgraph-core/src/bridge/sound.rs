//! Sound conversions.

use std::sync::Arc;

use avgraph_engine::{AudioProps, FramePlane, FrameProps, NativeFrame};
use avgraph_media::{MediaBuffer, MediaKind, SourceLayout};

use super::release::PlaneMapper;
use crate::descriptor::AudioDescriptor;
use crate::error::StageError;
use crate::formats::{plane_sample_size, sound_plane_names};

/// Wraps the channel planes of a sound buffer into a native audio frame.
pub(super) fn to_native(buffer: MediaBuffer, desc: &AudioDescriptor) -> Result<NativeFrame, StageError> {
    if buffer.kind() != Some(MediaKind::Sound) {
        return Err(StageError::invalid("sound input carries no sound"));
    }
    let samples = buffer.sound_samples()?;
    let sample_size = buffer.sound_sample_size()?;
    let expected = plane_sample_size(desc.format, desc.layout.channels);
    if sample_size != expected {
        return Err(StageError::invalid(format!(
            "sample size {sample_size}, expected {expected}"
        )));
    }
    let names = sound_plane_names(desc.format, desc.layout.channels);
    let available = buffer.sound_planes()?;
    if available.len() != names.len() {
        return Err(StageError::invalid(format!(
            "{} sound planes, expected {}",
            available.len(),
            names.len()
        )));
    }
    let nb_samples = u32::try_from(samples)
        .map_err(|_| StageError::invalid(format!("{samples} samples in one buffer")))?;

    let mapper = PlaneMapper::new(buffer);
    let mut planes = Vec::with_capacity(names.len());
    for name in &names {
        let plane = mapper.map(name)?;
        planes.push(FramePlane {
            data: Arc::new(plane),
            linesize: samples * sample_size,
        });
    }

    let mut frame = NativeFrame::new(FrameProps::Audio(AudioProps {
        format: desc.format,
        layout: desc.layout,
        sample_rate: desc.sample_rate,
        nb_samples,
    }));
    frame.planes = planes;
    Ok(frame)
}

/// Plane layout of a native audio frame as seen by the pipeline.
pub(super) fn layout(frame: &NativeFrame, props: &AudioProps) -> Result<SourceLayout, StageError> {
    let names = sound_plane_names(props.format, props.layout.channels);
    if names.len() != frame.planes.len() {
        return Err(StageError::invalid(format!(
            "{} frame with {} planes for {} channels",
            props.format,
            frame.planes.len(),
            props.layout.channels
        )));
    }
    Ok(SourceLayout::Sound {
        samples: props.nb_samples as usize,
        sample_size: plane_sample_size(props.format, props.layout.channels),
        planes: names,
    })
}
