//! Conversion planning between an input format and a wanted one.
//!
//! A [`FormatPlan`] decides which conversions bring a stream to a wanted
//! format and renders them as a filter description that can be handed to
//! [`FilterStage::set_description`](crate::FilterStage::set_description).
//! Attributes the wanted definition leaves out keep their input value.

use core::fmt;

use avgraph_engine::{ChannelLayout, PixelFormat, SampleFormat};
use avgraph_media::{FlowDef, MediaKind, Rational, SOUND_DEF};

use crate::error::StageError;
use crate::formats::{pixel_format_from_flow, sample_format_from_flow};

/// Display aspect ratio a wanted picture definition may carry instead of a SAR.
pub const DISPLAY_ASPECT: &str = "ffmt.dar";

/// One conversion step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Interlaced to progressive.
    Deinterlace,
    /// Resize, converting the pixel format when `format` is set.
    Scale {
        /// Target width.
        width: u64,
        /// Target height.
        height: u64,
        /// Target pixel format.
        format: Option<PixelFormat>,
    },
    /// Resample, converting the sample format when `format` is set.
    Resample {
        /// Target sample rate.
        rate: u64,
        /// Target sample format and layout.
        format: Option<(SampleFormat, ChannelLayout)>,
    },
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conversion::Deinterlace => f.write_str("yadif"),
            Conversion::Scale {
                width,
                height,
                format,
            } => {
                write!(f, "scale=w={width}:h={height}")?;
                if let Some(format) = format {
                    write!(f, ",format=pix_fmts={}", format.name())?;
                }
                Ok(())
            }
            Conversion::Resample { rate, format } => {
                write!(f, "aresample={rate}")?;
                if let Some((format, layout)) = format {
                    write!(f, ",aformat=sample_fmts={}", format.name())?;
                    if let Some(name) = layout.name() {
                        write!(f, ":channel_layouts={name}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Conversions from one format to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPlan {
    kind: MediaKind,
    steps: Vec<Conversion>,
    output: FlowDef,
}

impl FormatPlan {
    /// Plans the conversions from `input` to `wanted`.
    ///
    /// Both definitions must be of the same kind.
    pub fn between(input: &FlowDef, wanted: &FlowDef) -> Result<Self, StageError> {
        let kind = match (input.kind(), wanted.kind()) {
            (Some(a), Some(b)) if a == b => a,
            _ => {
                return Err(StageError::invalid(format!(
                    "cannot convert '{}' to '{}'",
                    input.def().unwrap_or(""),
                    wanted.def().unwrap_or("")
                )));
            }
        };

        let mut input = input.clone();
        let mut output = merged(&input, wanted);
        let steps = match kind {
            MediaKind::Picture => {
                if let Some(sar) = wanted_sar(&input, wanted)? {
                    input.set_sar(sar);
                    output.set_sar(sar);
                }
                picture_steps(&input, &output)?
            }
            MediaKind::Sound => sound_steps(&input, &output)?,
        };
        tracing::debug!(
            steps = steps.len(),
            "format_plan: {}",
            render(kind, &steps)
        );
        Ok(Self {
            kind,
            steps,
            output,
        })
    }

    /// Planned conversions, in order.
    pub fn steps(&self) -> &[Conversion] {
        &self.steps
    }

    /// `true` when the input is forwarded untouched.
    pub fn is_passthrough(&self) -> bool {
        self.steps.is_empty()
    }

    /// Flow definition after conversion.
    pub fn output(&self) -> &FlowDef {
        &self.output
    }

    /// Filter description performing the plan.
    pub fn description(&self) -> String {
        render(self.kind, &self.steps)
    }
}

fn render(kind: MediaKind, steps: &[Conversion]) -> String {
    if steps.is_empty() {
        return match kind {
            MediaKind::Picture => "null".to_string(),
            MediaKind::Sound => "anull".to_string(),
        };
    }
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// `input` overlaid with every attribute of `wanted`.
///
/// Plane lists are replaced as a whole. A bare `sound.` definition keeps
/// the input's sample format.
fn merged(input: &FlowDef, wanted: &FlowDef) -> FlowDef {
    let mut out = input.clone();
    if wanted.get("p.num").is_some() {
        out.clear_pic_planes();
    }
    if wanted.get("s.planes").is_some() {
        out.clear_sound_planes();
    }
    for (key, value) in wanted.iter() {
        out.set(key, value.clone());
    }
    if wanted.def() == Some(SOUND_DEF)
        && let Some(def) = input.def()
    {
        out.set_def(def);
    }
    out.remove(DISPLAY_ASPECT);
    out
}

fn wanted_sar(input: &FlowDef, wanted: &FlowDef) -> Result<Option<Rational>, StageError> {
    if let Some(sar) = wanted.sar() {
        return Ok(Some(sar));
    }
    let Some(dar) = wanted.get_rational(DISPLAY_ASPECT) else {
        return Ok(None);
    };
    let (Ok(hsize), Ok(vsize)) = (input.hsize(), input.vsize()) else {
        return Ok(None);
    };
    let overflow = || StageError::invalid(format!("display aspect {dar} out of range"));
    let num = i64::try_from(vsize)
        .ok()
        .and_then(|v| v.checked_mul(dar.num))
        .ok_or_else(overflow)?;
    let den = hsize.checked_mul(dar.den).ok_or_else(overflow)?;
    Ok(Some(Rational::new(num, den).simplified()))
}

fn picture_steps(input: &FlowDef, output: &FlowDef) -> Result<Vec<Conversion>, StageError> {
    let mut steps = Vec::new();
    if input.progressive() != output.progressive() {
        steps.push(Conversion::Deinterlace);
    }
    let same_planes = input.pic_planes()? == output.pic_planes()?;
    let (width, height) = (output.hsize()?, output.vsize()?);
    if !same_planes || input.hsize()? != width || input.vsize()? != height {
        let format = if same_planes {
            None
        } else {
            Some(pixel_format_from_flow(output, true)?)
        };
        steps.push(Conversion::Scale {
            width,
            height,
            format,
        });
    }
    Ok(steps)
}

fn sound_steps(input: &FlowDef, output: &FlowDef) -> Result<Vec<Conversion>, StageError> {
    let from = sample_format_from_flow(input)?;
    let to = sample_format_from_flow(output)?;
    let rate = output.rate()?;
    if from != to || input.rate()? != rate {
        let format = (from != to).then_some(to);
        return Ok(vec![Conversion::Resample { rate, format }]);
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use avgraph_media::Attr;

    use crate::formats::{pixel_format_to_flow, sample_format_to_flow};

    fn picture(format: PixelFormat, w: u64, h: u64, progressive: bool) -> FlowDef {
        let mut flow = FlowDef::picture();
        pixel_format_to_flow(format, &mut flow).unwrap();
        flow.set_hsize(w);
        flow.set_vsize(h);
        flow.set_progressive(progressive);
        flow
    }

    fn sound(format: SampleFormat, rate: u64) -> FlowDef {
        let mut flow = FlowDef::sound("s16");
        sample_format_to_flow(format, ChannelLayout::STEREO, &mut flow);
        flow.set_rate(rate);
        flow
    }

    #[test]
    fn same_picture_is_forwarded() {
        let input = picture(PixelFormat::Yuv420p, 720, 576, true);
        let plan = FormatPlan::between(&input, &input).unwrap();
        assert!(plan.is_passthrough());
        assert_eq!(plan.description(), "null");
    }

    #[test]
    fn interlaced_hd_to_progressive_sd_nv12() {
        let input = picture(PixelFormat::Yuv420p, 1920, 1080, false);
        let wanted = picture(PixelFormat::Nv12, 720, 576, true);
        let plan = FormatPlan::between(&input, &wanted).unwrap();
        assert_eq!(
            plan.steps(),
            &[
                Conversion::Deinterlace,
                Conversion::Scale {
                    width: 720,
                    height: 576,
                    format: Some(PixelFormat::Nv12),
                },
            ]
        );
        assert_eq!(
            plan.description(),
            "yadif,scale=w=720:h=576,format=pix_fmts=nv12"
        );
        assert_eq!(plan.output().pic_planes().unwrap().len(), 2);
    }

    #[test]
    fn partial_wanted_keeps_input_attributes() {
        let input = picture(PixelFormat::Yuv420p, 1920, 1080, true);
        let mut wanted = FlowDef::picture();
        wanted.set_hsize(1280);
        wanted.set_vsize(720);
        wanted.set_progressive(true);
        let plan = FormatPlan::between(&input, &wanted).unwrap();
        assert_eq!(plan.description(), "scale=w=1280:h=720");
        assert_eq!(plan.output().pic_planes().unwrap().len(), 3);
    }

    #[test]
    fn sar_from_display_aspect() {
        let input = picture(PixelFormat::Yuv420p, 720, 576, true);
        let mut wanted = input.clone();
        wanted.set(DISPLAY_ASPECT, Attr::Rational(Rational::new(16, 9)));
        let plan = FormatPlan::between(&input, &wanted).unwrap();
        assert!(plan.is_passthrough());
        assert_eq!(plan.output().sar(), Some(Rational::new(64, 45)));
        assert!(plan.output().get(DISPLAY_ASPECT).is_none());

        wanted.set_sar(Rational::new(1, 1));
        let plan = FormatPlan::between(&input, &wanted).unwrap();
        assert_eq!(plan.output().sar(), Some(Rational::new(1, 1)));
    }

    #[test]
    fn sound_rate_and_format() {
        let input = sound(SampleFormat::S16, 48_000);
        let plan = FormatPlan::between(&input, &sound(SampleFormat::S16, 44_100)).unwrap();
        assert_eq!(plan.description(), "aresample=44100");

        let plan = FormatPlan::between(&input, &sound(SampleFormat::FltP, 48_000)).unwrap();
        assert_eq!(
            plan.description(),
            "aresample=48000,aformat=sample_fmts=fltp:channel_layouts=stereo"
        );

        let plan = FormatPlan::between(&input, &input).unwrap();
        assert_eq!(plan.description(), "anull");
    }

    #[test]
    fn bare_sound_keeps_the_sample_format() {
        let input = sound(SampleFormat::S16, 48_000);
        let mut wanted = FlowDef::new(SOUND_DEF);
        wanted.set_rate(32_000);
        let plan = FormatPlan::between(&input, &wanted).unwrap();
        assert_eq!(plan.output().def(), Some("sound.s16."));
        assert_eq!(plan.description(), "aresample=32000");
    }

    #[test]
    fn kinds_must_match() {
        let input = picture(PixelFormat::Gray, 8, 8, true);
        assert!(matches!(
            FormatPlan::between(&input, &sound(SampleFormat::S16, 48_000)),
            Err(StageError::Invalid(_))
        ));
    }
}
