//! Picture conversions.

use std::sync::Arc;

use avgraph_engine::{ColorRange, FramePlane, FrameProps, NativeFrame, VideoProps};
use avgraph_media::{MediaBuffer, MediaKind, SourceLayout};

use super::release::PlaneMapper;
use crate::descriptor::VideoDescriptor;
use crate::error::StageError;
use crate::formats::{pixel_planes, ratio_from_rational};

/// Wraps the planes of a picture buffer into a native video frame.
pub(super) fn to_native(buffer: MediaBuffer, desc: &VideoDescriptor) -> Result<NativeFrame, StageError> {
    if buffer.kind() != Some(MediaKind::Picture) {
        return Err(StageError::invalid("picture input carries no picture"));
    }
    if desc.planes.is_empty() {
        return Err(StageError::invalid(format!(
            "{} surfaces cannot be mapped",
            desc.format
        )));
    }
    let (hsize, vsize) = buffer.pic_size()?;
    if hsize != desc.width as usize || vsize != desc.height as usize {
        return Err(StageError::invalid(format!(
            "picture is {hsize}x{vsize}, expected {}x{}",
            desc.width, desc.height
        )));
    }
    let strides = buffer.pic_planes()?;
    let attrs = buffer.attrs;

    let mut props = VideoProps::new(desc.format, desc.width, desc.height);
    props.sar = ratio_from_rational(desc.sar)?;
    props.interlaced = !attrs.progressive;
    props.top_field_first = attrs.tff;
    props.key_frame = attrs.key;
    props.color_range = if desc.full_range {
        ColorRange::Full
    } else {
        ColorRange::Limited
    };
    props.color_primaries = desc.primaries;
    props.color_trc = desc.transfer;
    props.colorspace = desc.matrix;

    let mapper = PlaneMapper::new(buffer);
    let mut planes = Vec::with_capacity(desc.planes.len());
    for layout in &desc.planes {
        let linesize = strides
            .iter()
            .find(|(p, _)| p == layout)
            .map(|(_, stride)| *stride)
            .ok_or_else(|| StageError::invalid(format!("picture lacks plane {}", layout.chroma)))?;
        let plane = mapper.map(&layout.chroma)?;
        planes.push(FramePlane {
            data: Arc::new(plane),
            linesize,
        });
    }

    let mut frame = NativeFrame::new(FrameProps::Video(props));
    frame.planes = planes;
    Ok(frame)
}

/// Plane layout of a native video frame as seen by the pipeline.
pub(super) fn layout(frame: &NativeFrame, props: &VideoProps) -> Result<SourceLayout, StageError> {
    if props.format.is_hw() {
        return Ok(SourceLayout::Picture {
            hsize: props.width as usize,
            vsize: props.height as usize,
            planes: Vec::new(),
        });
    }
    let layouts = pixel_planes(props.format)
        .ok_or_else(|| StageError::invalid(format!("no plane layout for {}", props.format)))?;
    if layouts.len() != frame.planes.len() {
        return Err(StageError::invalid(format!(
            "{} frame with {} planes",
            props.format,
            frame.planes.len()
        )));
    }
    Ok(SourceLayout::Picture {
        hsize: props.width as usize,
        vsize: props.height as usize,
        planes: layouts
            .into_iter()
            .zip(&frame.planes)
            .map(|(layout, plane)| (layout, plane.linesize))
            .collect(),
    })
}
