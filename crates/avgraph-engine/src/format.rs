//! Sample layouts and colour enumerants understood by the engine.

use core::fmt;

/// Media type of a pad or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Video frames.
    Video,
    /// Audio frames.
    Audio,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => f.write_str("video"),
            MediaType::Audio => f.write_str("audio"),
        }
    }
}

/// Engine rational (time bases, frame rates, aspect ratios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ratio {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

impl Ratio {
    /// Creates a ratio.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// `true` when the numerator is zero.
    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    /// `1 / self`.
    pub fn inverse(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

// ---------------------------------------------------------------------------
// Pixel formats
// ---------------------------------------------------------------------------

/// Geometry of one plane of a software pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneGeometry {
    /// log2 of the horizontal subsampling.
    pub hshift: u8,
    /// log2 of the vertical subsampling.
    pub vshift: u8,
    /// Bytes per (subsampled) pixel in this plane.
    pub step: u8,
}

const fn plane(hshift: u8, vshift: u8, step: u8) -> PlaneGeometry {
    PlaneGeometry {
        hshift,
        vshift,
        step,
    }
}

/// Pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 8 bits.
    Yuv420p,
    /// Planar YUV 4:2:2, 8 bits.
    Yuv422p,
    /// Planar YUV 4:4:4, 8 bits.
    Yuv444p,
    /// Planar YUV 4:2:0, 10 bits little-endian in 16-bit words.
    Yuv420p10le,
    /// Y plane plus interleaved UV plane, 4:2:0.
    Nv12,
    /// 8-bit luma only.
    Gray,
    /// Packed RGB 8:8:8.
    Rgb24,
    /// Packed RGBA 8:8:8:8.
    Rgba,
    /// VA-API hardware surfaces.
    Vaapi,
    /// CUDA hardware surfaces.
    Cuda,
    /// Intel Quick Sync hardware surfaces.
    Qsv,
}

impl PixelFormat {
    /// Every pixel format, software ones first.
    pub const ALL: [PixelFormat; 11] = [
        PixelFormat::Yuv420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuv420p10le,
        PixelFormat::Nv12,
        PixelFormat::Gray,
        PixelFormat::Rgb24,
        PixelFormat::Rgba,
        PixelFormat::Vaapi,
        PixelFormat::Cuda,
        PixelFormat::Qsv,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuv420p10le => "yuv420p10le",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Gray => "gray",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Vaapi => "vaapi",
            PixelFormat::Cuda => "cuda",
            PixelFormat::Qsv => "qsv",
        }
    }

    /// Looks a format up by canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// `true` for opaque hardware surfaces.
    pub fn is_hw(self) -> bool {
        matches!(self, PixelFormat::Vaapi | PixelFormat::Cuda | PixelFormat::Qsv)
    }

    /// Plane geometry; empty for hardware formats.
    pub fn planes(self) -> &'static [PlaneGeometry] {
        const YUV420: [PlaneGeometry; 3] = [plane(0, 0, 1), plane(1, 1, 1), plane(1, 1, 1)];
        const YUV422: [PlaneGeometry; 3] = [plane(0, 0, 1), plane(1, 0, 1), plane(1, 0, 1)];
        const YUV444: [PlaneGeometry; 3] = [plane(0, 0, 1), plane(0, 0, 1), plane(0, 0, 1)];
        const YUV420_10: [PlaneGeometry; 3] = [plane(0, 0, 2), plane(1, 1, 2), plane(1, 1, 2)];
        const NV12: [PlaneGeometry; 2] = [plane(0, 0, 1), plane(1, 1, 2)];
        const GRAY: [PlaneGeometry; 1] = [plane(0, 0, 1)];
        const RGB24: [PlaneGeometry; 1] = [plane(0, 0, 3)];
        const RGBA: [PlaneGeometry; 1] = [plane(0, 0, 4)];
        match self {
            PixelFormat::Yuv420p => &YUV420,
            PixelFormat::Yuv422p => &YUV422,
            PixelFormat::Yuv444p => &YUV444,
            PixelFormat::Yuv420p10le => &YUV420_10,
            PixelFormat::Nv12 => &NV12,
            PixelFormat::Gray => &GRAY,
            PixelFormat::Rgb24 => &RGB24,
            PixelFormat::Rgba => &RGBA,
            PixelFormat::Vaapi | PixelFormat::Cuda | PixelFormat::Qsv => &[],
        }
    }

    /// Bytes per row and number of rows of plane `index` for a picture size.
    pub fn plane_size(self, index: usize, width: u32, height: u32) -> Option<(usize, usize)> {
        let g = self.planes().get(index)?;
        let w = (width as usize).div_ceil(1 << g.hshift);
        let h = (height as usize).div_ceil(1 << g.vshift);
        Some((w * usize::from(g.step), h))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Sample formats and channel layouts
// ---------------------------------------------------------------------------

/// Audio sample formats; the `P` variants are planar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    U8,
    /// Signed 16-bit.
    S16,
    /// Signed 32-bit.
    S32,
    /// 32-bit float.
    Flt,
    /// 64-bit float.
    Dbl,
    /// Unsigned 8-bit, planar.
    U8P,
    /// Signed 16-bit, planar.
    S16P,
    /// Signed 32-bit, planar.
    S32P,
    /// 32-bit float, planar.
    FltP,
    /// 64-bit float, planar.
    DblP,
}

impl SampleFormat {
    /// Every sample format.
    pub const ALL: [SampleFormat; 10] = [
        SampleFormat::U8,
        SampleFormat::S16,
        SampleFormat::S32,
        SampleFormat::Flt,
        SampleFormat::Dbl,
        SampleFormat::U8P,
        SampleFormat::S16P,
        SampleFormat::S32P,
        SampleFormat::FltP,
        SampleFormat::DblP,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::Flt => "flt",
            SampleFormat::Dbl => "dbl",
            SampleFormat::U8P => "u8p",
            SampleFormat::S16P => "s16p",
            SampleFormat::S32P => "s32p",
            SampleFormat::FltP => "fltp",
            SampleFormat::DblP => "dblp",
        }
    }

    /// Looks a format up by canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Bytes per sample of one channel.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::U8P => 1,
            SampleFormat::S16 | SampleFormat::S16P => 2,
            SampleFormat::S32 | SampleFormat::S32P | SampleFormat::Flt | SampleFormat::FltP => 4,
            SampleFormat::Dbl | SampleFormat::DblP => 8,
        }
    }

    /// `true` when each channel has its own plane.
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            SampleFormat::U8P
                | SampleFormat::S16P
                | SampleFormat::S32P
                | SampleFormat::FltP
                | SampleFormat::DblP
        )
    }

    /// The planar counterpart of a packed format, or `self`.
    pub fn planar(self) -> Self {
        match self {
            SampleFormat::U8 => SampleFormat::U8P,
            SampleFormat::S16 => SampleFormat::S16P,
            SampleFormat::S32 => SampleFormat::S32P,
            SampleFormat::Flt => SampleFormat::FltP,
            SampleFormat::Dbl => SampleFormat::DblP,
            other => other,
        }
    }

    /// The packed counterpart of a planar format, or `self`.
    pub fn packed(self) -> Self {
        match self {
            SampleFormat::U8P => SampleFormat::U8,
            SampleFormat::S16P => SampleFormat::S16,
            SampleFormat::S32P => SampleFormat::S32,
            SampleFormat::FltP => SampleFormat::Flt,
            SampleFormat::DblP => SampleFormat::Dbl,
            other => other,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Channel layout as a channel count plus speaker mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelLayout {
    /// Number of channels.
    pub channels: u8,
    /// Speaker mask (front left = bit 0).
    pub mask: u64,
}

impl ChannelLayout {
    /// Front centre only.
    pub const MONO: Self = Self {
        channels: 1,
        mask: 0x4,
    };
    /// Front left and right.
    pub const STEREO: Self = Self {
        channels: 2,
        mask: 0x3,
    };
    /// FL, FR, FC, LFE, BL, BR.
    pub const SURROUND_5_1_BACK: Self = Self {
        channels: 6,
        mask: 0x3f,
    };

    /// Canonical name, `None` for custom layouts.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::MONO => Some("mono"),
            Self::STEREO => Some("stereo"),
            Self::SURROUND_5_1_BACK => Some("5.1"),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{} channels (0x{:x})", self.channels, self.mask),
        }
    }
}

// ---------------------------------------------------------------------------
// Colour enumerants (ITU-T H.273 code points)
// ---------------------------------------------------------------------------

/// Sample value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorRange {
    /// Not specified.
    #[default]
    Unspecified,
    /// Limited ("TV") range.
    Limited,
    /// Full ("PC") range.
    Full,
}

macro_rules! code_point {
    ($(#[$meta:meta])* $name:ident { $($(#[$cmeta:meta])* $konst:ident = $value:literal => $text:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub i32);

        impl $name {
            $(
                $(#[$cmeta])*
                pub const $konst: Self = Self($value);
            )*

            /// Canonical name, `None` for reserved code points.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($text),)*
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(2)
            }
        }
    };
}

code_point! {
    /// Colour primaries.
    ColorPrimaries {
        /// ITU-R BT.709.
        BT709 = 1 => "bt709",
        /// Unspecified.
        UNSPECIFIED = 2 => "unknown",
        /// ITU-R BT.470 System M.
        BT470M = 4 => "bt470m",
        /// ITU-R BT.470 System B, G.
        BT470BG = 5 => "bt470bg",
        /// SMPTE 170M.
        SMPTE170M = 6 => "smpte170m",
        /// SMPTE 240M.
        SMPTE240M = 7 => "smpte240m",
        /// Generic film.
        FILM = 8 => "film",
        /// ITU-R BT.2020.
        BT2020 = 9 => "bt2020",
        /// SMPTE ST 428-1.
        SMPTE428 = 10 => "smpte428",
        /// SMPTE RP 431-2 (DCI-P3).
        SMPTE431 = 11 => "smpte431",
        /// SMPTE EG 432-1 (Display P3).
        SMPTE432 = 12 => "smpte432",
        /// EBU Tech. 3213-E.
        EBU3213 = 22 => "ebu3213",
    }
}

code_point! {
    /// Transfer characteristics.
    TransferCharacteristic {
        /// ITU-R BT.709.
        BT709 = 1 => "bt709",
        /// Unspecified.
        UNSPECIFIED = 2 => "unknown",
        /// Gamma 2.2.
        GAMMA22 = 4 => "bt470m",
        /// Gamma 2.8.
        GAMMA28 = 5 => "bt470bg",
        /// SMPTE 170M.
        SMPTE170M = 6 => "smpte170m",
        /// SMPTE 240M.
        SMPTE240M = 7 => "smpte240m",
        /// Linear.
        LINEAR = 8 => "linear",
        /// Logarithmic, 100:1 range.
        LOG = 9 => "log100",
        /// Logarithmic, 316:1 range.
        LOG_SQRT = 10 => "log316",
        /// IEC 61966-2-4.
        IEC61966_2_4 = 11 => "iec61966-2-4",
        /// ITU-R BT.1361 extended gamut.
        BT1361_ECG = 12 => "bt1361e",
        /// IEC 61966-2-1 (sRGB).
        IEC61966_2_1 = 13 => "iec61966-2-1",
        /// ITU-R BT.2020, 10 bit.
        BT2020_10 = 14 => "bt2020-10",
        /// ITU-R BT.2020, 12 bit.
        BT2020_12 = 15 => "bt2020-12",
        /// SMPTE ST 2084 (PQ).
        SMPTE2084 = 16 => "smpte2084",
        /// SMPTE ST 428-1.
        SMPTE428 = 17 => "smpte428",
        /// ARIB STD-B67 (HLG).
        ARIB_STD_B67 = 18 => "arib-std-b67",
    }
}

code_point! {
    /// Matrix coefficients.
    ColorSpace {
        /// Identity (GBR).
        RGB = 0 => "gbr",
        /// ITU-R BT.709.
        BT709 = 1 => "bt709",
        /// Unspecified.
        UNSPECIFIED = 2 => "unknown",
        /// US FCC.
        FCC = 4 => "fcc",
        /// ITU-R BT.470 System B, G.
        BT470BG = 5 => "bt470bg",
        /// SMPTE 170M.
        SMPTE170M = 6 => "smpte170m",
        /// SMPTE 240M.
        SMPTE240M = 7 => "smpte240m",
        /// YCgCo.
        YCGCO = 8 => "ycgco",
        /// ITU-R BT.2020 non-constant luminance.
        BT2020_NCL = 9 => "bt2020nc",
        /// ITU-R BT.2020 constant luminance.
        BT2020_CL = 10 => "bt2020c",
        /// SMPTE ST 2085.
        SMPTE2085 = 11 => "smpte2085",
        /// Chromaticity-derived non-constant luminance.
        CHROMA_DERIVED_NCL = 12 => "chroma-derived-nc",
        /// Chromaticity-derived constant luminance.
        CHROMA_DERIVED_CL = 13 => "chroma-derived-c",
        /// ITU-R BT.2100 ICtCp.
        ICTCP = 14 => "ictcp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_names_round_trip() {
        for fmt in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_name(fmt.name()), Some(fmt));
        }
        assert_eq!(PixelFormat::from_name("yuyv422"), None);
    }

    #[test]
    fn plane_sizes_follow_subsampling() {
        assert_eq!(PixelFormat::Yuv420p.plane_size(0, 1920, 1080), Some((1920, 1080)));
        assert_eq!(PixelFormat::Yuv420p.plane_size(2, 1920, 1080), Some((960, 540)));
        assert_eq!(PixelFormat::Nv12.plane_size(1, 5, 5), Some((6, 3)));
        assert_eq!(PixelFormat::Vaapi.plane_size(0, 16, 16), None);
    }

    #[test]
    fn sample_format_planarity() {
        assert!(SampleFormat::FltP.is_planar());
        assert_eq!(SampleFormat::S16.planar(), SampleFormat::S16P);
        assert_eq!(SampleFormat::S16P.packed(), SampleFormat::S16);
        assert_eq!(SampleFormat::Dbl.bytes_per_sample(), 8);
    }

    #[test]
    fn colour_names_match_code_points() {
        assert_eq!(ColorPrimaries::BT709.name(), Some("bt709"));
        assert_eq!(TransferCharacteristic(16).name(), Some("smpte2084"));
        assert_eq!(ColorSpace(9).name(), Some("bt2020nc"));
        assert_eq!(ColorPrimaries(3).name(), None);
        assert_eq!(ColorSpace::default(), ColorSpace::UNSPECIFIED);
    }

    #[test]
    fn channel_layout_names() {
        assert_eq!(ChannelLayout::STEREO.to_string(), "stereo");
        assert_eq!(ChannelLayout::SURROUND_5_1_BACK.name(), Some("5.1"));
        let custom = ChannelLayout {
            channels: 3,
            mask: 0x7,
        };
        assert_eq!(custom.name(), None);
    }
}
