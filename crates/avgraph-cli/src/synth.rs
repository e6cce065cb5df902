//! Synthetic media: moving gradients and a 440 Hz tone.

use std::f64::consts::TAU;

use anyhow::Context;
use avgraph_core::formats::{plane_sample_size, sample_format_from_flow};
use avgraph_engine::SampleFormat;
use avgraph_media::{BufferAllocator, CLOCK_FREQ, FlowDef, MediaBuffer, MediaKind};

/// Samples per synthetic sound buffer.
pub const SOUND_SAMPLES: usize = 1024;

const TONE_HZ: f64 = 440.0;
const DEFAULT_FRAME_DURATION: u64 = CLOCK_FREQ / 25;

/// The `index`-th buffer of a stream described by `flow`, stamped with
/// program time.
pub fn buffer(alloc: &BufferAllocator, flow: &FlowDef, index: u64) -> anyhow::Result<MediaBuffer> {
    match flow.kind() {
        Some(MediaKind::Picture) => picture(alloc, flow, index),
        Some(MediaKind::Sound) => sound(alloc, flow, index),
        None => anyhow::bail!("cannot synthesise '{}'", flow.def().unwrap_or("")),
    }
}

fn frame_duration(flow: &FlowDef) -> u64 {
    flow.fps()
        .and_then(|fps| {
            let num = u64::try_from(fps.num).ok().filter(|n| *n > 0)?;
            Some(CLOCK_FREQ * fps.den / num)
        })
        .unwrap_or(DEFAULT_FRAME_DURATION)
}

fn picture(alloc: &BufferAllocator, flow: &FlowDef, index: u64) -> anyhow::Result<MediaBuffer> {
    let width = flow.hsize().context("picture without width")? as usize;
    let height = flow.vsize().context("picture without height")? as usize;
    let planes = flow.pic_planes()?;

    let mut builder = alloc.picture(width, height, &planes);
    for plane in &planes {
        let stride = builder.stride(&plane.chroma).unwrap_or(1).max(1);
        if let Some(data) = builder.plane_mut(&plane.chroma) {
            for (row, line) in data.chunks_mut(stride).enumerate() {
                for (col, byte) in line.iter_mut().enumerate() {
                    *byte = (row + col).wrapping_add(index as usize) as u8;
                }
            }
        }
    }

    let mut buffer = builder.build();
    let duration = frame_duration(flow);
    buffer.attrs.pts_prog = Some(index * duration);
    buffer.attrs.duration = Some(duration);
    buffer.attrs.progressive = flow.progressive();
    buffer.attrs.key = true;
    Ok(buffer)
}

fn sound(alloc: &BufferAllocator, flow: &FlowDef, index: u64) -> anyhow::Result<MediaBuffer> {
    let (format, layout) = sample_format_from_flow(flow)?;
    let rate = flow.rate().context("sound without rate")?;
    let names = flow.sound_planes()?;
    let sample_size = plane_sample_size(format, layout.channels);
    let width = format.bytes_per_sample();

    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut builder = alloc.sound(SOUND_SAMPLES, sample_size, &refs);
    let first = index * SOUND_SAMPLES as u64;
    for name in &refs {
        let Some(data) = builder.plane_mut(name) else {
            continue;
        };
        for (n, sample) in data.chunks_mut(sample_size).enumerate() {
            let t = (first + n as u64) as f64 / rate as f64;
            let value = 0.5 * (TAU * TONE_HZ * t).sin();
            for slot in sample.chunks_mut(width) {
                write_sample(format, value, slot);
            }
        }
    }

    let mut buffer = builder.build();
    let duration = SOUND_SAMPLES as u64 * CLOCK_FREQ / rate;
    buffer.attrs.pts_prog = Some(index * duration);
    buffer.attrs.duration = Some(duration);
    buffer.attrs.key = true;
    Ok(buffer)
}

/// Writes `value` in `[-1, 1]` as one little-endian sample.
fn write_sample(format: SampleFormat, value: f64, slot: &mut [u8]) {
    let put = |slot: &mut [u8], bytes: &[u8]| {
        if slot.len() == bytes.len() {
            slot.copy_from_slice(bytes);
        }
    };
    match format.packed() {
        SampleFormat::U8 => put(slot, &[(value * 127.0 + 128.0) as u8]),
        SampleFormat::S16 => put(slot, &((value * f64::from(i16::MAX)) as i16).to_le_bytes()),
        SampleFormat::S32 => put(slot, &((value * f64::from(i32::MAX)) as i32).to_le_bytes()),
        SampleFormat::Flt => put(slot, &(value as f32).to_le_bytes()),
        _ => put(slot, &value.to_le_bytes()),
    }
}
