//! Flow definitions: attribute dictionaries describing a stream.
//!
//! A [`FlowDef`] is a plain key → [`Attr`] map. The `f.def` attribute names
//! the stream type (`"pic."` for pictures, `"sound.<fmt>."` for sound) and
//! the remaining keys carry format details. Typed accessors wrap the keys
//! this workspace understands; anything else round-trips untouched.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MediaError;
use crate::rational::Rational;

// ---------------------------------------------------------------------------
// Attribute keys
// ---------------------------------------------------------------------------

const DEF: &str = "f.def";
const NAME: &str = "f.name";
const LATENCY: &str = "k.latency";

const HSIZE: &str = "p.hsize";
const VSIZE: &str = "p.vsize";
const FPS: &str = "p.fps";
const SAR: &str = "p.sar";
const PROGRESSIVE: &str = "p.progressive";
const FULL_RANGE: &str = "p.full_range";
const PRIMARIES: &str = "p.colour_primaries";
const TRANSFER: &str = "p.transfer_characteristics";
const MATRIX: &str = "p.matrix_coefficients";
const SURFACE: &str = "p.surface_type";
const PLANES: &str = "p.num";

const CHANNELS: &str = "s.channels";
const RATE: &str = "s.rate";
const SAMPLE_SIZE: &str = "s.sample_size";
const SOUND_PLANES: &str = "s.planes";

/// Prefix of every picture flow definition.
pub const PICTURE_DEF: &str = "pic.";
/// Prefix of every sound flow definition.
pub const SOUND_DEF: &str = "sound.";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Kind of media a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Planar or packed pictures.
    Picture,
    /// Planar or packed sound samples.
    Sound,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Picture => f.write_str("picture"),
            MediaKind::Sound => f.write_str("sound"),
        }
    }
}

/// A single flow-definition attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attr {
    /// Presence-only flag.
    Void,
    /// Boolean.
    Bool(bool),
    /// Unsigned integer.
    Unsigned(u64),
    /// Signed integer.
    Signed(i64),
    /// UTF-8 string.
    Str(String),
    /// Rational number.
    Rational(Rational),
}

/// Geometry of one picture plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaneLayout {
    /// Plane name, e.g. `"y8"`, `"u8"`, `"r8g8b8"`.
    pub chroma: String,
    /// Horizontal subsampling factor.
    pub hsub: u8,
    /// Vertical subsampling factor.
    pub vsub: u8,
    /// Bytes per macropixel.
    pub macropixel_size: u8,
}

impl PlaneLayout {
    /// Creates a plane layout.
    pub fn new(chroma: &str, hsub: u8, vsub: u8, macropixel_size: u8) -> Self {
        Self {
            chroma: chroma.to_string(),
            hsub,
            vsub,
            macropixel_size,
        }
    }

    /// Bytes per row for a picture `hsize` pixels wide.
    pub fn stride(&self, hsize: usize) -> usize {
        hsize.div_ceil(usize::from(self.hsub.max(1))) * usize::from(self.macropixel_size)
    }

    /// Number of rows for a picture `vsize` lines high.
    pub fn rows(&self, vsize: usize) -> usize {
        vsize.div_ceil(usize::from(self.vsub.max(1)))
    }
}

/// Stream description as an attribute dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDef {
    attrs: BTreeMap<String, Attr>,
}

impl FlowDef {
    /// Creates a flow definition with the given `f.def` string.
    pub fn new(def: &str) -> Self {
        let mut flow = Self::default();
        flow.set_def(def);
        flow
    }

    /// Creates an empty picture flow definition.
    pub fn picture() -> Self {
        Self::new(PICTURE_DEF)
    }

    /// Creates a sound flow definition for a sample format tag such as `"s16"`.
    pub fn sound(format: &str) -> Self {
        Self::new(&format!("{SOUND_DEF}{format}."))
    }

    // -- generic access ----------------------------------------------------

    /// Sets an attribute, replacing any previous value.
    pub fn set(&mut self, key: &str, value: Attr) {
        self.attrs.insert(key.to_string(), value);
    }

    /// Returns an attribute.
    pub fn get(&self, key: &str) -> Option<&Attr> {
        self.attrs.get(key)
    }

    /// Removes an attribute, returning it.
    pub fn remove(&mut self, key: &str) -> Option<Attr> {
        self.attrs.remove(key)
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attr)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads an unsigned attribute.
    pub fn get_unsigned(&self, key: &str) -> Option<u64> {
        match self.attrs.get(key) {
            Some(Attr::Unsigned(v)) => Some(*v),
            _ => None,
        }
    }

    /// Reads a signed attribute.
    pub fn get_signed(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key) {
            Some(Attr::Signed(v)) => Some(*v),
            _ => None,
        }
    }

    /// Reads a string attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key) {
            Some(Attr::Str(v)) => Some(v),
            _ => None,
        }
    }

    /// Reads a rational attribute.
    pub fn get_rational(&self, key: &str) -> Option<Rational> {
        match self.attrs.get(key) {
            Some(Attr::Rational(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` when a presence flag (or a `true` boolean) is set.
    pub fn get_flag(&self, key: &str) -> bool {
        matches!(self.attrs.get(key), Some(Attr::Void | Attr::Bool(true)))
    }

    /// Sets or clears a presence flag.
    pub fn set_flag(&mut self, key: &str, on: bool) {
        if on {
            self.set(key, Attr::Void);
        } else {
            self.remove(key);
        }
    }

    fn require_unsigned(&self, key: &str) -> Result<u64, MediaError> {
        self.get_unsigned(key)
            .ok_or_else(|| MediaError::Attribute(key.to_string()))
    }

    // -- stream identity ---------------------------------------------------

    /// The `f.def` string.
    pub fn def(&self) -> Option<&str> {
        self.get_str(DEF)
    }

    /// Replaces the `f.def` string.
    pub fn set_def(&mut self, def: &str) {
        self.set(DEF, Attr::Str(def.to_string()));
    }

    /// Media kind implied by the `f.def` prefix.
    pub fn kind(&self) -> Option<MediaKind> {
        let def = self.def()?;
        if def.starts_with(PICTURE_DEF) {
            Some(MediaKind::Picture)
        } else if def.starts_with(SOUND_DEF) {
            Some(MediaKind::Sound)
        } else {
            None
        }
    }

    /// Sample format tag of a sound definition (`"sound.s16."` → `"s16"`).
    pub fn sound_format(&self) -> Option<&str> {
        let rest = self.def()?.strip_prefix(SOUND_DEF)?;
        let tag = rest.split('.').next()?;
        (!tag.is_empty()).then_some(tag)
    }

    /// Stream name, if any.
    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME)
    }

    /// Sets the stream name.
    pub fn set_name(&mut self, name: &str) {
        self.set(NAME, Attr::Str(name.to_string()));
    }

    /// Advertised latency in clock ticks (zero when absent).
    pub fn latency(&self) -> u64 {
        self.get_unsigned(LATENCY).unwrap_or(0)
    }

    /// Sets the advertised latency in clock ticks.
    pub fn set_latency(&mut self, latency: u64) {
        self.set(LATENCY, Attr::Unsigned(latency));
    }

    // -- pictures ------------------------------------------------------------

    /// Picture width in pixels.
    pub fn hsize(&self) -> Result<u64, MediaError> {
        self.require_unsigned(HSIZE)
    }

    /// Sets the picture width.
    pub fn set_hsize(&mut self, hsize: u64) {
        self.set(HSIZE, Attr::Unsigned(hsize));
    }

    /// Picture height in lines.
    pub fn vsize(&self) -> Result<u64, MediaError> {
        self.require_unsigned(VSIZE)
    }

    /// Sets the picture height.
    pub fn set_vsize(&mut self, vsize: u64) {
        self.set(VSIZE, Attr::Unsigned(vsize));
    }

    /// Frame rate.
    pub fn fps(&self) -> Option<Rational> {
        self.get_rational(FPS)
    }

    /// Sets the frame rate.
    pub fn set_fps(&mut self, fps: Rational) {
        self.set(FPS, Attr::Rational(fps));
    }

    /// Sample aspect ratio.
    pub fn sar(&self) -> Option<Rational> {
        self.get_rational(SAR)
    }

    /// Sets the sample aspect ratio.
    pub fn set_sar(&mut self, sar: Rational) {
        self.set(SAR, Attr::Rational(sar));
    }

    /// Whether the pictures are progressive.
    pub fn progressive(&self) -> bool {
        self.get_flag(PROGRESSIVE)
    }

    /// Marks the pictures progressive or interlaced.
    pub fn set_progressive(&mut self, on: bool) {
        self.set_flag(PROGRESSIVE, on);
    }

    /// Whether samples use the full range.
    pub fn full_range(&self) -> bool {
        self.get_flag(FULL_RANGE)
    }

    /// Marks full-range samples.
    pub fn set_full_range(&mut self, on: bool) {
        self.set_flag(FULL_RANGE, on);
    }

    /// Colour primaries code point (ITU-T H.273).
    pub fn colour_primaries(&self) -> Option<i64> {
        self.get_signed(PRIMARIES)
    }

    /// Sets the colour primaries code point.
    pub fn set_colour_primaries(&mut self, value: i64) {
        self.set(PRIMARIES, Attr::Signed(value));
    }

    /// Transfer characteristics code point (ITU-T H.273).
    pub fn transfer_characteristics(&self) -> Option<i64> {
        self.get_signed(TRANSFER)
    }

    /// Sets the transfer characteristics code point.
    pub fn set_transfer_characteristics(&mut self, value: i64) {
        self.set(TRANSFER, Attr::Signed(value));
    }

    /// Matrix coefficients code point (ITU-T H.273).
    pub fn matrix_coefficients(&self) -> Option<i64> {
        self.get_signed(MATRIX)
    }

    /// Sets the matrix coefficients code point.
    pub fn set_matrix_coefficients(&mut self, value: i64) {
        self.set(MATRIX, Attr::Signed(value));
    }

    /// Surface type of hardware pictures (e.g. `"av.vaapi"`).
    pub fn surface_type(&self) -> Option<&str> {
        self.get_str(SURFACE)
    }

    /// Sets the surface type of hardware pictures.
    pub fn set_surface_type(&mut self, surface: &str) {
        self.set(SURFACE, Attr::Str(surface.to_string()));
    }

    /// Removes the surface type; the planes describe software pictures.
    pub fn clear_surface_type(&mut self) {
        self.remove(SURFACE);
    }

    /// Appends a picture plane.
    pub fn add_pic_plane(&mut self, plane: &PlaneLayout) {
        let i = self.get_unsigned(PLANES).unwrap_or(0);
        self.set(&format!("p.chroma[{i}]"), Attr::Str(plane.chroma.clone()));
        self.set(&format!("p.hsub[{i}]"), Attr::Unsigned(u64::from(plane.hsub)));
        self.set(&format!("p.vsub[{i}]"), Attr::Unsigned(u64::from(plane.vsub)));
        self.set(
            &format!("p.macropix[{i}]"),
            Attr::Unsigned(u64::from(plane.macropixel_size)),
        );
        self.set(PLANES, Attr::Unsigned(i + 1));
    }

    /// Removes every picture plane.
    pub fn clear_pic_planes(&mut self) {
        let n = self.get_unsigned(PLANES).unwrap_or(0);
        for i in 0..n {
            for key in ["p.chroma", "p.hsub", "p.vsub", "p.macropix"] {
                self.remove(&format!("{key}[{i}]"));
            }
        }
        self.remove(PLANES);
    }

    /// Picture planes in declaration order.
    pub fn pic_planes(&self) -> Result<Vec<PlaneLayout>, MediaError> {
        let n = self.get_unsigned(PLANES).unwrap_or(0);
        (0..n)
            .map(|i| {
                let chroma_key = format!("p.chroma[{i}]");
                let chroma = self
                    .get_str(&chroma_key)
                    .ok_or(MediaError::Attribute(chroma_key))?;
                let small = |key: String| -> Result<u8, MediaError> {
                    let v = self.require_unsigned(&key)?;
                    u8::try_from(v).map_err(|_| MediaError::Attribute(key))
                };
                Ok(PlaneLayout {
                    chroma: chroma.to_string(),
                    hsub: small(format!("p.hsub[{i}]"))?,
                    vsub: small(format!("p.vsub[{i}]"))?,
                    macropixel_size: small(format!("p.macropix[{i}]"))?,
                })
            })
            .collect()
    }

    // -- sound ---------------------------------------------------------------

    /// Number of channels.
    pub fn channels(&self) -> Result<u64, MediaError> {
        self.require_unsigned(CHANNELS)
    }

    /// Sets the number of channels.
    pub fn set_channels(&mut self, channels: u64) {
        self.set(CHANNELS, Attr::Unsigned(channels));
    }

    /// Sample rate in Hz.
    pub fn rate(&self) -> Result<u64, MediaError> {
        self.require_unsigned(RATE)
    }

    /// Sets the sample rate.
    pub fn set_rate(&mut self, rate: u64) {
        self.set(RATE, Attr::Unsigned(rate));
    }

    /// Bytes per sample in one plane.
    pub fn sample_size(&self) -> Result<u64, MediaError> {
        self.require_unsigned(SAMPLE_SIZE)
    }

    /// Sets the bytes per sample in one plane.
    pub fn set_sample_size(&mut self, size: u64) {
        self.set(SAMPLE_SIZE, Attr::Unsigned(size));
    }

    /// Appends a sound plane (one channel name, or all names when packed).
    pub fn add_sound_plane(&mut self, name: &str) {
        let i = self.get_unsigned(SOUND_PLANES).unwrap_or(0);
        self.set(&format!("s.channel[{i}]"), Attr::Str(name.to_string()));
        self.set(SOUND_PLANES, Attr::Unsigned(i + 1));
    }

    /// Sound plane names in declaration order.
    pub fn sound_planes(&self) -> Result<Vec<String>, MediaError> {
        let n = self.get_unsigned(SOUND_PLANES).unwrap_or(0);
        (0..n)
            .map(|i| {
                let key = format!("s.channel[{i}]");
                self.get_str(&key)
                    .map(str::to_string)
                    .ok_or(MediaError::Attribute(key))
            })
            .collect()
    }

    /// Removes every sound plane.
    pub fn clear_sound_planes(&mut self) {
        let n = self.get_unsigned(SOUND_PLANES).unwrap_or(0);
        for i in 0..n {
            self.remove(&format!("s.channel[{i}]"));
        }
        self.remove(SOUND_PLANES);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yuv420(w: u64, h: u64) -> FlowDef {
        let mut flow = FlowDef::picture();
        flow.add_pic_plane(&PlaneLayout::new("y8", 1, 1, 1));
        flow.add_pic_plane(&PlaneLayout::new("u8", 2, 2, 1));
        flow.add_pic_plane(&PlaneLayout::new("v8", 2, 2, 1));
        flow.set_hsize(w);
        flow.set_vsize(h);
        flow
    }

    #[test]
    fn kind_follows_def_prefix() {
        assert_eq!(FlowDef::picture().kind(), Some(MediaKind::Picture));
        assert_eq!(FlowDef::sound("s16").kind(), Some(MediaKind::Sound));
        assert_eq!(FlowDef::new("block.h264.").kind(), None);
        assert_eq!(FlowDef::default().kind(), None);
    }

    #[test]
    fn sound_format_tag() {
        assert_eq!(FlowDef::sound("f32").sound_format(), Some("f32"));
        assert_eq!(FlowDef::new("sound.").sound_format(), None);
        assert_eq!(FlowDef::picture().sound_format(), None);
    }

    #[test]
    fn picture_planes_keep_declaration_order() {
        let flow = yuv420(1920, 1080);
        let planes = flow.pic_planes().unwrap();
        let names: Vec<_> = planes.iter().map(|p| p.chroma.as_str()).collect();
        assert_eq!(names, ["y8", "u8", "v8"]);
        assert_eq!(planes[1].stride(1920), 960);
        assert_eq!(planes[1].rows(1080), 540);
        assert_eq!(flow.hsize().unwrap(), 1920);
    }

    #[test]
    fn clearing_planes_removes_every_key() {
        let mut flow = yuv420(16, 16);
        flow.clear_pic_planes();
        assert!(flow.pic_planes().unwrap().is_empty());
        assert!(flow.iter().all(|(k, _)| !k.starts_with("p.chroma")));
    }

    #[test]
    fn identical_definitions_compare_equal() {
        let a = yuv420(64, 32);
        let mut b = yuv420(64, 32);
        assert_eq!(a, b);
        b.set_progressive(true);
        assert_ne!(a, b);
        b.set_progressive(false);
        assert_eq!(a, b);
    }

    #[test]
    fn missing_size_is_an_attribute_error() {
        let flow = FlowDef::picture();
        assert_eq!(
            flow.hsize(),
            Err(MediaError::Attribute("p.hsize".to_string()))
        );
    }

    #[test]
    fn sound_planes_round_trip() {
        let mut flow = FlowDef::sound("s16");
        flow.set_channels(2);
        flow.add_sound_plane("l");
        flow.add_sound_plane("r");
        assert_eq!(flow.sound_planes().unwrap(), ["l", "r"]);
        assert_eq!(flow.latency(), 0);
        flow.set_latency(27_000);
        assert_eq!(flow.latency(), 27_000);
    }
}
