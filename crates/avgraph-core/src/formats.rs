//! Mappings between pipeline flow definitions and engine formats.
//!
//! Picture planes are named by chroma (`y8`, `u8`, `r8g8b8`, ...). Sound
//! planes are named by channel position: `l`, `r`, `c`, `L` (low frequency),
//! `s` and `S` (back left and right). A packed format has one plane whose
//! name concatenates every channel; a planar format has one plane per
//! channel.

use avgraph_engine::{ChannelLayout, PixelFormat, Ratio, SampleFormat};
use avgraph_media::{CLOCK_FREQ, FlowDef, PlaneLayout, Rational};

use crate::error::StageError;

/// Time base of every source the stage creates: one pipeline clock tick.
pub const PIPELINE_TIME_BASE: Ratio = Ratio::new(1, CLOCK_FREQ as i32);

/// Channel names by position.
pub const CHANNEL_NAMES: [&str; 6] = ["l", "r", "c", "L", "s", "S"];

// ---------------------------------------------------------------------------
// Rationals and timestamps
// ---------------------------------------------------------------------------

/// Converts an engine ratio to a pipeline rational (`0/0` for a bad denominator).
pub fn rational_from_ratio(ratio: Ratio) -> Rational {
    match u64::try_from(ratio.den) {
        Ok(den) => Rational::new(i64::from(ratio.num), den),
        Err(_) => Rational::new(-i64::from(ratio.num), u64::from(ratio.den.unsigned_abs())),
    }
}

/// Converts a pipeline rational to an engine ratio, reducing it first.
pub fn ratio_from_rational(value: Rational) -> Result<Ratio, StageError> {
    let r = value.simplified();
    let num = i32::try_from(r.num);
    let den = i32::try_from(r.den);
    match (num, den) {
        (Ok(num), Ok(den)) => Ok(Ratio::new(num, den)),
        _ => Err(StageError::invalid(format!("rational {value} out of range"))),
    }
}

/// Rescales a timestamp from `time_base` units to pipeline clock ticks.
///
/// Negative results clamp to zero.
pub fn rescale_to_clock(ts: i64, time_base: Ratio) -> u64 {
    if time_base.den <= 0 {
        return 0;
    }
    let ticks = i128::from(ts) * i128::from(CLOCK_FREQ) * i128::from(time_base.num)
        / i128::from(time_base.den);
    u64::try_from(ticks.max(0)).unwrap_or(u64::MAX)
}

/// Rescales pipeline clock ticks to `time_base` units.
pub fn rescale_from_clock(ticks: u64, time_base: Ratio) -> i64 {
    if time_base.num <= 0 {
        return 0;
    }
    let ts = i128::from(ticks) * i128::from(time_base.den)
        / (i128::from(CLOCK_FREQ) * i128::from(time_base.num));
    i64::try_from(ts).unwrap_or(i64::MAX)
}

/// Duration in ticks of `samples` samples at `rate` Hz.
pub fn samples_to_clock(samples: u64, rate: u32) -> u64 {
    if rate == 0 {
        return 0;
    }
    samples * CLOCK_FREQ / u64::from(rate)
}

// ---------------------------------------------------------------------------
// Pixel formats
// ---------------------------------------------------------------------------

/// Pipeline planes of a software pixel format, in engine plane order.
pub fn pixel_planes(format: PixelFormat) -> Option<Vec<PlaneLayout>> {
    let table: &[(&str, u8, u8, u8)] = match format {
        PixelFormat::Yuv420p => &[("y8", 1, 1, 1), ("u8", 2, 2, 1), ("v8", 2, 2, 1)],
        PixelFormat::Yuv422p => &[("y8", 1, 1, 1), ("u8", 2, 1, 1), ("v8", 2, 1, 1)],
        PixelFormat::Yuv444p => &[("y8", 1, 1, 1), ("u8", 1, 1, 1), ("v8", 1, 1, 1)],
        PixelFormat::Yuv420p10le => &[("y10l", 1, 1, 2), ("u10l", 2, 2, 2), ("v10l", 2, 2, 2)],
        PixelFormat::Nv12 => &[("y8", 1, 1, 1), ("u8v8", 2, 2, 2)],
        PixelFormat::Gray => &[("y8", 1, 1, 1)],
        PixelFormat::Rgb24 => &[("r8g8b8", 1, 1, 3)],
        PixelFormat::Rgba => &[("r8g8b8a8", 1, 1, 4)],
        PixelFormat::Vaapi | PixelFormat::Cuda | PixelFormat::Qsv => return None,
    };
    Some(
        table
            .iter()
            .map(|&(chroma, hsub, vsub, size)| PlaneLayout::new(chroma, hsub, vsub, size))
            .collect(),
    )
}

/// The software pixel format whose planes are exactly `planes`.
pub fn pixel_format_from_planes(planes: &[PlaneLayout]) -> Option<PixelFormat> {
    PixelFormat::ALL
        .into_iter()
        .filter(|f| !f.is_hw())
        .find(|f| pixel_planes(*f).is_some_and(|p| p == planes))
}

/// Writes the planes of a software pixel format into `flow`.
pub fn pixel_format_to_flow(format: PixelFormat, flow: &mut FlowDef) -> Result<(), StageError> {
    let planes = pixel_planes(format).ok_or_else(|| {
        StageError::invalid(format!("{format} has no pipeline plane layout"))
    })?;
    flow.clear_pic_planes();
    for plane in &planes {
        flow.add_pic_plane(plane);
    }
    Ok(())
}

/// Surface type advertised for hardware pictures.
pub fn surface_type(format: PixelFormat) -> String {
    format!("av.{}", format.name())
}

/// Pixel format described by `flow`.
///
/// With `software` unset, a hardware surface type (`av.<name>`) wins over
/// the plane list.
pub fn pixel_format_from_flow(flow: &FlowDef, software: bool) -> Result<PixelFormat, StageError> {
    if !software
        && let Some(surface) = flow.surface_type()
    {
        return surface
            .strip_prefix("av.")
            .and_then(PixelFormat::from_name)
            .filter(|f| f.is_hw())
            .ok_or_else(|| StageError::invalid(format!("unknown surface type '{surface}'")));
    }
    let planes = flow.pic_planes()?;
    pixel_format_from_planes(&planes)
        .ok_or_else(|| StageError::invalid(format!("unknown pixel format: {planes:?}")))
}

// ---------------------------------------------------------------------------
// Sample formats
// ---------------------------------------------------------------------------

/// Flow-definition tag of a sample format (`"s16"`, `"f32"`, ...).
pub fn sample_format_tag(format: SampleFormat) -> &'static str {
    match format.packed() {
        SampleFormat::U8 => "u8",
        SampleFormat::S16 => "s16",
        SampleFormat::S32 => "s32",
        SampleFormat::Flt => "f32",
        _ => "f64",
    }
}

/// Packed sample format of a flow-definition tag.
pub fn sample_format_from_tag(tag: &str) -> Option<SampleFormat> {
    match tag {
        "u8" => Some(SampleFormat::U8),
        "s16" => Some(SampleFormat::S16),
        "s32" => Some(SampleFormat::S32),
        "f32" => Some(SampleFormat::Flt),
        "f64" => Some(SampleFormat::Dbl),
        _ => None,
    }
}

/// Channel layout for a channel count (1, 2 or 6).
pub fn channel_layout(channels: u64) -> Result<ChannelLayout, StageError> {
    match channels {
        1 => Ok(ChannelLayout::MONO),
        2 => Ok(ChannelLayout::STEREO),
        6 => Ok(ChannelLayout::SURROUND_5_1_BACK),
        n => Err(StageError::invalid(format!("unsupported channel count {n}"))),
    }
}

/// Plane names for a sample format and channel count.
pub fn sound_plane_names(format: SampleFormat, channels: u8) -> Vec<String> {
    let names = &CHANNEL_NAMES[..usize::from(channels).min(CHANNEL_NAMES.len())];
    if format.is_planar() && channels > 1 {
        names.iter().map(|n| (*n).to_string()).collect()
    } else {
        vec![names.concat()]
    }
}

/// Bytes per sample in one plane.
pub fn plane_sample_size(format: SampleFormat, channels: u8) -> usize {
    if format.is_planar() {
        format.bytes_per_sample()
    } else {
        format.bytes_per_sample() * usize::from(channels)
    }
}

/// Writes a sound format into `flow`, replacing its definition and planes.
pub fn sample_format_to_flow(format: SampleFormat, layout: ChannelLayout, flow: &mut FlowDef) {
    let tag = sample_format_tag(format);
    flow.set_def(&format!("sound.{tag}."));
    flow.set_channels(u64::from(layout.channels));
    flow.set_sample_size(plane_sample_size(format, layout.channels) as u64);
    flow.clear_sound_planes();
    for name in sound_plane_names(format, layout.channels) {
        flow.add_sound_plane(&name);
    }
}

/// Sample format and channel layout described by `flow`.
///
/// One plane per channel means planar; a single plane means packed.
pub fn sample_format_from_flow(flow: &FlowDef) -> Result<(SampleFormat, ChannelLayout), StageError> {
    let tag = flow
        .sound_format()
        .ok_or_else(|| StageError::invalid("sound flow definition without sample format"))?;
    let packed = sample_format_from_tag(tag)
        .ok_or_else(|| StageError::invalid(format!("unknown sample format '{tag}'")))?;
    let channels = flow.channels()?;
    let layout = channel_layout(channels)?;
    let planes = flow.sound_planes()?.len() as u64;
    let format = match planes {
        1 => packed,
        n if n == channels => packed.planar(),
        n => {
            return Err(StageError::invalid(format!(
                "{n} sound planes for {channels} channels"
            )));
        }
    };
    Ok((format, layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_formats_round_trip_through_planes() {
        for format in PixelFormat::ALL.into_iter().filter(|f| !f.is_hw()) {
            let mut flow = FlowDef::picture();
            pixel_format_to_flow(format, &mut flow).unwrap();
            assert_eq!(pixel_format_from_flow(&flow, true).unwrap(), format);
            assert_eq!(
                flow.pic_planes().unwrap().len(),
                format.planes().len(),
                "{format}"
            );
        }
    }

    #[test]
    fn hardware_surface_wins_unless_software_requested() {
        let mut flow = FlowDef::picture();
        pixel_format_to_flow(PixelFormat::Nv12, &mut flow).unwrap();
        flow.set_surface_type(&surface_type(PixelFormat::Vaapi));
        assert_eq!(pixel_format_from_flow(&flow, false).unwrap(), PixelFormat::Vaapi);
        assert_eq!(pixel_format_from_flow(&flow, true).unwrap(), PixelFormat::Nv12);
    }

    #[test]
    fn unknown_planes_are_invalid() {
        let mut flow = FlowDef::picture();
        flow.add_pic_plane(&PlaneLayout::new("x9", 1, 1, 1));
        assert!(matches!(
            pixel_format_from_flow(&flow, true),
            Err(StageError::Invalid(_))
        ));
    }

    #[test]
    fn sound_planar_and_packed() {
        let mut flow = FlowDef::default();
        sample_format_to_flow(SampleFormat::FltP, ChannelLayout::STEREO, &mut flow);
        assert_eq!(flow.def(), Some("sound.f32."));
        assert_eq!(flow.sound_planes().unwrap(), vec!["l", "r"]);
        assert_eq!(flow.sample_size().unwrap(), 4);
        assert_eq!(
            sample_format_from_flow(&flow).unwrap(),
            (SampleFormat::FltP, ChannelLayout::STEREO)
        );

        sample_format_to_flow(SampleFormat::S16, ChannelLayout::SURROUND_5_1_BACK, &mut flow);
        assert_eq!(flow.sound_planes().unwrap(), vec!["lrcLsS"]);
        assert_eq!(flow.sample_size().unwrap(), 12);
        assert_eq!(
            sample_format_from_flow(&flow).unwrap(),
            (SampleFormat::S16, ChannelLayout::SURROUND_5_1_BACK)
        );
    }

    #[test]
    fn odd_channel_counts_are_rejected() {
        let mut flow = FlowDef::sound("s16");
        flow.set_channels(3);
        flow.add_sound_plane("lrc");
        assert!(matches!(
            sample_format_from_flow(&flow),
            Err(StageError::Invalid(_))
        ));
    }

    #[test]
    fn rescale_between_time_bases() {
        let ms = Ratio::new(1, 1000);
        assert_eq!(rescale_to_clock(40, ms), 40 * CLOCK_FREQ / 1000);
        assert_eq!(rescale_to_clock(-5, ms), 0);
        assert_eq!(rescale_from_clock(CLOCK_FREQ, ms), 1000);
        assert_eq!(rescale_to_clock(123, PIPELINE_TIME_BASE), 123);
        assert_eq!(samples_to_clock(48_000, 48_000), CLOCK_FREQ);
    }

    #[test]
    fn ratios_convert_both_ways() {
        assert_eq!(
            ratio_from_rational(Rational::new(50, 2)).unwrap(),
            Ratio::new(25, 1)
        );
        assert_eq!(rational_from_ratio(Ratio::new(16, 9)), Rational::new(16, 9));
        assert!(ratio_from_rational(Rational::new(i64::MAX, 1)).is_err());
    }
}
