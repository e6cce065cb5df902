//! Stream formats as written in stage configs.

use std::str::FromStr;

use avgraph_core::formats::{channel_layout, pixel_format_to_flow, sample_format_to_flow};
use avgraph_core::names::{
    colour_primaries_name, matrix_coefficients_name, transfer_characteristics_name,
};
use avgraph_engine::{PixelFormat, SampleFormat};
use avgraph_media::{FlowDef, Rational};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// A picture or sound format.
///
/// ```toml
/// kind = "video"
/// pixel_format = "yuv420p"
/// width = 1920
/// height = 1080
/// frame_rate = "25/1"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormatConfig {
    /// Pictures.
    Video(VideoFormat),
    /// Sound.
    Audio(AudioFormat),
}

/// Picture format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoFormat {
    /// Software pixel format name (`"yuv420p"`, `"nv12"`, ...).
    pub pixel_format: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate as `"num/den"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<String>,
    /// Sample aspect ratio as `"num/den"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sar: Option<String>,
    /// Interlaced pictures.
    #[serde(default)]
    pub interlaced: bool,
    /// Full ("PC") sample range.
    #[serde(default)]
    pub full_range: bool,
    /// Colour primaries name (`"bt709"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour_primaries: Option<String>,
    /// Transfer characteristics name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_characteristics: Option<String>,
    /// Matrix coefficients name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_coefficients: Option<String>,
}

/// Sound format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioFormat {
    /// Engine sample format name (`"s16"`, `"fltp"`, ...).
    pub sample_format: String,
    /// Channel count (1, 2 or 6).
    pub channels: u8,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl VideoFormat {
    /// A progressive picture format with no frame rate.
    pub fn new(pixel_format: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            pixel_format: pixel_format.into(),
            width,
            height,
            frame_rate: None,
            sar: None,
            interlaced: false,
            full_range: false,
            colour_primaries: None,
            transfer_characteristics: None,
            matrix_coefficients: None,
        }
    }

    /// Set the frame rate (`"30000/1001"`).
    pub fn with_frame_rate(mut self, rate: impl Into<String>) -> Self {
        self.frame_rate = Some(rate.into());
        self
    }
}

impl FormatConfig {
    /// Checks the format; every problem found is appended to `errors`.
    pub(crate) fn check(&self, errors: &mut Vec<ValidationError>) {
        if let Err(err) = self.to_flow_def() {
            match err {
                ValidationError::Multiple(all) => errors.extend(all),
                other => errors.push(other),
            }
        }
    }

    /// The pipeline flow definition of this format.
    pub fn to_flow_def(&self) -> Result<FlowDef, ValidationError> {
        match self {
            FormatConfig::Video(v) => v.to_flow_def(),
            FormatConfig::Audio(a) => a.to_flow_def(),
        }
    }
}

fn rational(field: &str, value: &str) -> Result<Rational, ValidationError> {
    Rational::from_str(value)
        .ok()
        .filter(|r| r.den != 0 && r.num > 0)
        .ok_or_else(|| ValidationError::MalformedRational {
            field: field.to_string(),
            value: value.to_string(),
        })
}

/// Code point whose canonical name is `name`.
fn code_point(
    field: &str,
    name: &str,
    lookup: fn(i64) -> Option<&'static str>,
) -> Result<i64, ValidationError> {
    (0..=255)
        .find(|&v| lookup(v) == Some(name))
        .ok_or_else(|| ValidationError::UnknownColour {
            field: field.to_string(),
            value: name.to_string(),
        })
}

impl VideoFormat {
    fn to_flow_def(&self) -> Result<FlowDef, ValidationError> {
        let mut errors = Vec::new();
        let mut flow = FlowDef::picture();

        match PixelFormat::from_name(&self.pixel_format) {
            Some(format) if format.is_hw() => {
                errors.push(ValidationError::HardwarePixelFormat(self.pixel_format.clone()));
            }
            Some(format) => {
                if pixel_format_to_flow(format, &mut flow).is_err() {
                    errors.push(ValidationError::UnknownPixelFormat(self.pixel_format.clone()));
                }
            }
            None => errors.push(ValidationError::UnknownPixelFormat(self.pixel_format.clone())),
        }
        if self.width == 0 || self.height == 0 {
            errors.push(ValidationError::ZeroSize {
                width: self.width,
                height: self.height,
            });
        }
        flow.set_hsize(u64::from(self.width));
        flow.set_vsize(u64::from(self.height));

        let mut rational_field = |field: &str, value: &Option<String>| match value {
            Some(value) => match rational(field, value) {
                Ok(r) => Some(r),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };
        if let Some(fps) = rational_field("frame_rate", &self.frame_rate) {
            flow.set_fps(fps);
        }
        if let Some(sar) = rational_field("sar", &self.sar) {
            flow.set_sar(sar);
        }
        flow.set_progressive(!self.interlaced);
        flow.set_full_range(self.full_range);

        let colours: [(&str, &Option<String>, fn(i64) -> Option<&'static str>); 3] = [
            ("colour_primaries", &self.colour_primaries, colour_primaries_name),
            (
                "transfer_characteristics",
                &self.transfer_characteristics,
                transfer_characteristics_name,
            ),
            ("matrix_coefficients", &self.matrix_coefficients, matrix_coefficients_name),
        ];
        for (field, value, lookup) in colours {
            let Some(name) = value else { continue };
            match code_point(field, name, lookup) {
                Ok(v) => match field {
                    "colour_primaries" => flow.set_colour_primaries(v),
                    "transfer_characteristics" => flow.set_transfer_characteristics(v),
                    _ => flow.set_matrix_coefficients(v),
                },
                Err(e) => errors.push(e),
            }
        }

        ValidationError::collect(errors).map(|()| flow)
    }
}

impl AudioFormat {
    fn to_flow_def(&self) -> Result<FlowDef, ValidationError> {
        let mut errors = Vec::new();
        let format = SampleFormat::from_name(&self.sample_format);
        if format.is_none() {
            errors.push(ValidationError::UnknownSampleFormat(self.sample_format.clone()));
        }
        let layout = channel_layout(u64::from(self.channels)).ok();
        if layout.is_none() {
            errors.push(ValidationError::UnsupportedChannels(self.channels));
        }
        if self.sample_rate == 0 {
            errors.push(ValidationError::ZeroRate);
        }
        ValidationError::collect(errors)?;

        let mut flow = FlowDef::sound("s16");
        if let (Some(format), Some(layout)) = (format, layout) {
            sample_format_to_flow(format, layout, &mut flow);
        }
        flow.set_rate(u64::from(self.sample_rate));
        Ok(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_format_becomes_flow_def() {
        let mut format = VideoFormat::new("yuv420p", 1280, 720).with_frame_rate("30000/1001");
        format.colour_primaries = Some("bt709".to_string());
        format.interlaced = true;
        let flow = FormatConfig::Video(format).to_flow_def().unwrap();
        assert_eq!(flow.hsize().unwrap(), 1280);
        assert_eq!(flow.fps(), Some(Rational::new(30000, 1001)));
        assert_eq!(flow.pic_planes().unwrap().len(), 3);
        assert_eq!(flow.colour_primaries(), Some(1));
        assert!(!flow.progressive());
    }

    #[test]
    fn every_video_problem_is_reported() {
        let mut format = VideoFormat::new("yuyv422", 0, 720).with_frame_rate("fast");
        format.matrix_coefficients = Some("bt9000".to_string());
        let err = FormatConfig::Video(format).to_flow_def().unwrap_err();
        let ValidationError::Multiple(all) = err else {
            panic!("expected several errors, got {err}");
        };
        assert_eq!(all.len(), 4);
        assert!(all.contains(&ValidationError::UnknownPixelFormat("yuyv422".into())));
    }

    #[test]
    fn hardware_pixel_formats_are_rejected() {
        let format = FormatConfig::Video(VideoFormat::new("vaapi", 64, 64));
        assert_eq!(
            format.to_flow_def(),
            Err(ValidationError::HardwarePixelFormat("vaapi".into()))
        );
    }

    #[test]
    fn audio_format_becomes_flow_def() {
        let format = FormatConfig::Audio(AudioFormat {
            sample_format: "fltp".to_string(),
            channels: 6,
            sample_rate: 48_000,
        });
        let flow = format.to_flow_def().unwrap();
        assert_eq!(flow.def(), Some("sound.f32."));
        assert_eq!(flow.channels().unwrap(), 6);
        assert_eq!(flow.sound_planes().unwrap().len(), 6);
        assert_eq!(flow.rate().unwrap(), 48_000);
    }

    #[test]
    fn odd_channel_counts_are_rejected() {
        let format = FormatConfig::Audio(AudioFormat {
            sample_format: "s16".to_string(),
            channels: 3,
            sample_rate: 48_000,
        });
        assert_eq!(
            format.to_flow_def(),
            Err(ValidationError::UnsupportedChannels(3))
        );
    }

    #[test]
    fn tagged_toml() {
        let format: FormatConfig = toml::from_str(
            "kind = \"audio\"\nsample_format = \"s16\"\nchannels = 2\nsample_rate = 44100\n",
        )
        .unwrap();
        assert!(matches!(format, FormatConfig::Audio(ref a) if a.sample_rate == 44_100));
    }
}
