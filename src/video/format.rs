//! Stream format descriptors
//!
//! A [`FormatDescriptor`] is everything the configurator knows about the
//! decoder's output: the pixel format with its per-component layout, the
//! frame size, and colour metadata. Descriptors are produced by the decoder
//! and never modified here.

use std::fmt;

/// Per-component layout, mirroring FFmpeg's `AVComponentDescriptor`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Plane the component lives in
    pub plane: u8,
    /// Bytes between two horizontally consecutive samples
    pub step: u8,
    /// Bytes before the first sample of this component
    pub offset: u8,
    /// Bits the value is shifted left inside its storage
    pub shift: u8,
    /// Significant bits
    pub depth: u8,
}

const fn comp(plane: u8, step: u8, offset: u8, shift: u8, depth: u8) -> ComponentDescriptor {
    ComponentDescriptor {
        plane,
        step,
        offset,
        shift,
        depth,
    }
}

/// Pixel format flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelFlags {
    pub big_endian: bool,
    pub palette: bool,
    pub hwaccel: bool,
    pub planar: bool,
    pub rgb: bool,
    pub alpha: bool,
}

/// Memory layout of a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// All components interleaved in one plane
    Packed,
    /// Luma plane plus one interleaved chroma plane
    SemiPlanar,
    /// One plane per component
    Planar,
}

/// Component layout of a pixel format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDescriptor {
    /// Components in R,G,B(,A) or Y,U,V(,A) order
    pub components: Vec<ComponentDescriptor>,
    /// log2 of the luma width / chroma width ratio
    pub log2_chroma_w: u8,
    /// log2 of the luma height / chroma height ratio
    pub log2_chroma_h: u8,
    pub flags: PixelFlags,
}

impl PixelDescriptor {
    /// Number of planes the components are spread over
    pub fn planes(&self) -> u32 {
        self.components
            .iter()
            .map(|c| c.plane as u32 + 1)
            .max()
            .unwrap_or(0)
    }

    /// Bit depth of the first component
    pub fn comp0_depth(&self) -> u32 {
        self.components.first().map_or(0, |c| c.depth as u32)
    }

    pub fn layout(&self) -> PixelLayout {
        match self.planes() {
            0 | 1 => PixelLayout::Packed,
            2 => PixelLayout::SemiPlanar,
            _ => PixelLayout::Planar,
        }
    }
}

/// Pixel formats the configurator recognises by identity.
///
/// Anything else the decoder emits is carried as [`PixelFormat::Other`]
/// with a descriptor supplied by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    // Packed RGB 32/64-bit
    Rgb0,
    Bgr0,
    ZeroRgb,
    ZeroBgr,
    Rgba,
    Bgra,
    Argb,
    Abgr,
    Rgba64Le,
    Bgra64Le,
    Rgba64Be,
    // Packed RGB 16-bit
    Rgb444Le,
    Bgr444Le,
    Rgb24,
    // Planar RGB
    Gbrp,
    Gbrp10Le,
    Gbrp12Le,
    Gbrp16Le,
    Gbrap,
    Gbrap10Le,
    // Packed YUV 4:2:2
    Yuyv422,
    Yvyu422,
    Uyvy422,
    Y210Le,
    // Semi-planar YUV
    Nv12,
    Nv21,
    Nv16,
    Nv24,
    Nv42,
    P010Le,
    P010Be,
    P016Le,
    P210Le,
    P410Le,
    // Planar YUV
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Yuva420p,
    Yuv420p10Le,
    Yuv420p10Be,
    Yuv422p10Le,
    Yuv444p10Le,
    Yuv420p12Le,
    Yuv444p16Le,
    Yuva444p10Le,
    Gray8,
    Other(String),
}

impl PixelFormat {
    /// FFmpeg-style name
    pub fn name(&self) -> &str {
        match self {
            PixelFormat::Rgb0 => "rgb0",
            PixelFormat::Bgr0 => "bgr0",
            PixelFormat::ZeroRgb => "0rgb",
            PixelFormat::ZeroBgr => "0bgr",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Bgra => "bgra",
            PixelFormat::Argb => "argb",
            PixelFormat::Abgr => "abgr",
            PixelFormat::Rgba64Le => "rgba64le",
            PixelFormat::Bgra64Le => "bgra64le",
            PixelFormat::Rgba64Be => "rgba64be",
            PixelFormat::Rgb444Le => "rgb444le",
            PixelFormat::Bgr444Le => "bgr444le",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Gbrp => "gbrp",
            PixelFormat::Gbrp10Le => "gbrp10le",
            PixelFormat::Gbrp12Le => "gbrp12le",
            PixelFormat::Gbrp16Le => "gbrp16le",
            PixelFormat::Gbrap => "gbrap",
            PixelFormat::Gbrap10Le => "gbrap10le",
            PixelFormat::Yuyv422 => "yuyv422",
            PixelFormat::Yvyu422 => "yvyu422",
            PixelFormat::Uyvy422 => "uyvy422",
            PixelFormat::Y210Le => "y210le",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Nv21 => "nv21",
            PixelFormat::Nv16 => "nv16",
            PixelFormat::Nv24 => "nv24",
            PixelFormat::Nv42 => "nv42",
            PixelFormat::P010Le => "p010le",
            PixelFormat::P010Be => "p010be",
            PixelFormat::P016Le => "p016le",
            PixelFormat::P210Le => "p210le",
            PixelFormat::P410Le => "p410le",
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuva420p => "yuva420p",
            PixelFormat::Yuv420p10Le => "yuv420p10le",
            PixelFormat::Yuv420p10Be => "yuv420p10be",
            PixelFormat::Yuv422p10Le => "yuv422p10le",
            PixelFormat::Yuv444p10Le => "yuv444p10le",
            PixelFormat::Yuv420p12Le => "yuv420p12le",
            PixelFormat::Yuv444p16Le => "yuv444p16le",
            PixelFormat::Yuva444p10Le => "yuva444p10le",
            PixelFormat::Gray8 => "gray",
            PixelFormat::Other(name) => name,
        }
    }

    /// Look a format up by its FFmpeg name
    pub fn from_name(name: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|f| f.name() == name)
            .cloned()
            .unwrap_or_else(|| PixelFormat::Other(name.to_string()))
    }

    const KNOWN: &'static [PixelFormat] = &[
        PixelFormat::Rgb0,
        PixelFormat::Bgr0,
        PixelFormat::ZeroRgb,
        PixelFormat::ZeroBgr,
        PixelFormat::Rgba,
        PixelFormat::Bgra,
        PixelFormat::Argb,
        PixelFormat::Abgr,
        PixelFormat::Rgba64Le,
        PixelFormat::Bgra64Le,
        PixelFormat::Rgba64Be,
        PixelFormat::Rgb444Le,
        PixelFormat::Bgr444Le,
        PixelFormat::Rgb24,
        PixelFormat::Gbrp,
        PixelFormat::Gbrp10Le,
        PixelFormat::Gbrp12Le,
        PixelFormat::Gbrp16Le,
        PixelFormat::Gbrap,
        PixelFormat::Gbrap10Le,
        PixelFormat::Yuyv422,
        PixelFormat::Yvyu422,
        PixelFormat::Uyvy422,
        PixelFormat::Y210Le,
        PixelFormat::Nv12,
        PixelFormat::Nv21,
        PixelFormat::Nv16,
        PixelFormat::Nv24,
        PixelFormat::Nv42,
        PixelFormat::P010Le,
        PixelFormat::P010Be,
        PixelFormat::P016Le,
        PixelFormat::P210Le,
        PixelFormat::P410Le,
        PixelFormat::Yuv420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuva420p,
        PixelFormat::Yuv420p10Le,
        PixelFormat::Yuv420p10Be,
        PixelFormat::Yuv422p10Le,
        PixelFormat::Yuv444p10Le,
        PixelFormat::Yuv420p12Le,
        PixelFormat::Yuv444p16Le,
        PixelFormat::Yuva444p10Le,
        PixelFormat::Gray8,
    ];

    /// Component layout for the formats known by identity.
    ///
    /// Returns `None` for [`PixelFormat::Other`]; the decoder must then
    /// provide the descriptor itself.
    pub fn descriptor(&self) -> Option<PixelDescriptor> {
        let rgb = PixelFlags {
            rgb: true,
            ..Default::default()
        };
        let rgba = PixelFlags {
            alpha: true,
            ..rgb
        };
        let yuv = PixelFlags::default();
        let planar = PixelFlags {
            planar: true,
            ..Default::default()
        };
        let be = |flags: PixelFlags| PixelFlags {
            big_endian: true,
            ..flags
        };

        let (components, log2_w, log2_h, flags) = match self {
            PixelFormat::Rgb0 => (vec![comp(0, 4, 0, 0, 8), comp(0, 4, 1, 0, 8), comp(0, 4, 2, 0, 8)], 0, 0, rgb),
            PixelFormat::Bgr0 => (vec![comp(0, 4, 2, 0, 8), comp(0, 4, 1, 0, 8), comp(0, 4, 0, 0, 8)], 0, 0, rgb),
            PixelFormat::ZeroRgb => (vec![comp(0, 4, 1, 0, 8), comp(0, 4, 2, 0, 8), comp(0, 4, 3, 0, 8)], 0, 0, rgb),
            PixelFormat::ZeroBgr => (vec![comp(0, 4, 3, 0, 8), comp(0, 4, 2, 0, 8), comp(0, 4, 1, 0, 8)], 0, 0, rgb),
            PixelFormat::Rgba => (
                vec![comp(0, 4, 0, 0, 8), comp(0, 4, 1, 0, 8), comp(0, 4, 2, 0, 8), comp(0, 4, 3, 0, 8)],
                0,
                0,
                rgba,
            ),
            PixelFormat::Bgra => (
                vec![comp(0, 4, 2, 0, 8), comp(0, 4, 1, 0, 8), comp(0, 4, 0, 0, 8), comp(0, 4, 3, 0, 8)],
                0,
                0,
                rgba,
            ),
            PixelFormat::Argb => (
                vec![comp(0, 4, 1, 0, 8), comp(0, 4, 2, 0, 8), comp(0, 4, 3, 0, 8), comp(0, 4, 0, 0, 8)],
                0,
                0,
                rgba,
            ),
            PixelFormat::Abgr => (
                vec![comp(0, 4, 3, 0, 8), comp(0, 4, 2, 0, 8), comp(0, 4, 1, 0, 8), comp(0, 4, 0, 0, 8)],
                0,
                0,
                rgba,
            ),
            PixelFormat::Rgba64Le => (
                vec![comp(0, 8, 0, 0, 16), comp(0, 8, 2, 0, 16), comp(0, 8, 4, 0, 16), comp(0, 8, 6, 0, 16)],
                0,
                0,
                rgba,
            ),
            PixelFormat::Bgra64Le => (
                vec![comp(0, 8, 4, 0, 16), comp(0, 8, 2, 0, 16), comp(0, 8, 0, 0, 16), comp(0, 8, 6, 0, 16)],
                0,
                0,
                rgba,
            ),
            PixelFormat::Rgba64Be => (
                vec![comp(0, 8, 0, 0, 16), comp(0, 8, 2, 0, 16), comp(0, 8, 4, 0, 16), comp(0, 8, 6, 0, 16)],
                0,
                0,
                be(rgba),
            ),
            PixelFormat::Rgb444Le => (vec![comp(0, 2, 1, 0, 4), comp(0, 2, 0, 4, 4), comp(0, 2, 0, 0, 4)], 0, 0, rgb),
            PixelFormat::Bgr444Le => (vec![comp(0, 2, 0, 0, 4), comp(0, 2, 0, 4, 4), comp(0, 2, 1, 0, 4)], 0, 0, rgb),
            PixelFormat::Rgb24 => (vec![comp(0, 3, 0, 0, 8), comp(0, 3, 1, 0, 8), comp(0, 3, 2, 0, 8)], 0, 0, rgb),
            PixelFormat::Gbrp => (gbr_planes(1, 8, false), 0, 0, PixelFlags { planar: true, ..rgb }),
            PixelFormat::Gbrp10Le => (gbr_planes(2, 10, false), 0, 0, PixelFlags { planar: true, ..rgb }),
            PixelFormat::Gbrp12Le => (gbr_planes(2, 12, false), 0, 0, PixelFlags { planar: true, ..rgb }),
            PixelFormat::Gbrp16Le => (gbr_planes(2, 16, false), 0, 0, PixelFlags { planar: true, ..rgb }),
            PixelFormat::Gbrap => (gbr_planes(1, 8, true), 0, 0, PixelFlags { planar: true, ..rgba }),
            PixelFormat::Gbrap10Le => (gbr_planes(2, 10, true), 0, 0, PixelFlags { planar: true, ..rgba }),
            PixelFormat::Yuyv422 => (vec![comp(0, 2, 0, 0, 8), comp(0, 4, 1, 0, 8), comp(0, 4, 3, 0, 8)], 1, 0, yuv),
            PixelFormat::Yvyu422 => (vec![comp(0, 2, 0, 0, 8), comp(0, 4, 3, 0, 8), comp(0, 4, 1, 0, 8)], 1, 0, yuv),
            PixelFormat::Uyvy422 => (vec![comp(0, 2, 1, 0, 8), comp(0, 4, 0, 0, 8), comp(0, 4, 2, 0, 8)], 1, 0, yuv),
            PixelFormat::Y210Le => (vec![comp(0, 4, 0, 6, 10), comp(0, 8, 2, 6, 10), comp(0, 8, 6, 6, 10)], 1, 0, yuv),
            PixelFormat::Nv12 => (semi_planar(1, 0, 8, 0), 1, 1, planar),
            PixelFormat::Nv21 => (semi_planar(1, 1, 8, 0), 1, 1, planar),
            PixelFormat::Nv16 => (semi_planar(1, 0, 8, 0), 1, 0, planar),
            PixelFormat::Nv24 => (semi_planar(1, 0, 8, 0), 0, 0, planar),
            PixelFormat::Nv42 => (semi_planar(1, 1, 8, 0), 0, 0, planar),
            PixelFormat::P010Le => (semi_planar(2, 0, 10, 6), 1, 1, planar),
            PixelFormat::P010Be => (semi_planar(2, 0, 10, 6), 1, 1, be(planar)),
            PixelFormat::P016Le => (semi_planar(2, 0, 16, 0), 1, 1, planar),
            PixelFormat::P210Le => (semi_planar(2, 0, 10, 6), 1, 0, planar),
            PixelFormat::P410Le => (semi_planar(2, 0, 10, 6), 0, 0, planar),
            PixelFormat::Yuv420p => (yuv_planes(1, 8, false), 1, 1, planar),
            PixelFormat::Yuv422p => (yuv_planes(1, 8, false), 1, 0, planar),
            PixelFormat::Yuv444p => (yuv_planes(1, 8, false), 0, 0, planar),
            PixelFormat::Yuva420p => (yuv_planes(1, 8, true), 1, 1, PixelFlags { alpha: true, ..planar }),
            PixelFormat::Yuv420p10Le => (yuv_planes(2, 10, false), 1, 1, planar),
            PixelFormat::Yuv420p10Be => (yuv_planes(2, 10, false), 1, 1, be(planar)),
            PixelFormat::Yuv422p10Le => (yuv_planes(2, 10, false), 1, 0, planar),
            PixelFormat::Yuv444p10Le => (yuv_planes(2, 10, false), 0, 0, planar),
            PixelFormat::Yuv420p12Le => (yuv_planes(2, 12, false), 1, 1, planar),
            PixelFormat::Yuv444p16Le => (yuv_planes(2, 16, false), 0, 0, planar),
            PixelFormat::Yuva444p10Le => (yuv_planes(2, 10, true), 0, 0, PixelFlags { alpha: true, ..planar }),
            PixelFormat::Gray8 => (vec![comp(0, 1, 0, 0, 8)], 0, 0, yuv),
            PixelFormat::Other(_) => return None,
        };

        Some(PixelDescriptor {
            components,
            log2_chroma_w: log2_w,
            log2_chroma_h: log2_h,
            flags,
        })
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// G, B, R (, A) planes in R,G,B(,A) component order
fn gbr_planes(step: u8, depth: u8, alpha: bool) -> Vec<ComponentDescriptor> {
    let mut comps = vec![comp(2, step, 0, 0, depth), comp(0, step, 0, 0, depth), comp(1, step, 0, 0, depth)];
    if alpha {
        comps.push(comp(3, step, 0, 0, depth));
    }
    comps
}

fn yuv_planes(step: u8, depth: u8, alpha: bool) -> Vec<ComponentDescriptor> {
    let mut comps = vec![comp(0, step, 0, 0, depth), comp(1, step, 0, 0, depth), comp(2, step, 0, 0, depth)];
    if alpha {
        comps.push(comp(3, step, 0, 0, depth));
    }
    comps
}

/// Luma plane plus interleaved chroma; `swapped` puts V before U
fn semi_planar(bytes: u8, swapped: u8, depth: u8, shift: u8) -> Vec<ComponentDescriptor> {
    let (u, v) = if swapped == 0 { (0, bytes) } else { (bytes, 0) };
    vec![
        comp(0, bytes, 0, shift, depth),
        comp(1, bytes * 2, u, shift, depth),
        comp(1, bytes * 2, v, shift, depth),
    ]
}

/// YCbCr matrix / RGB primaries of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Bt601,
    Bt709,
    Bt2020,
}

/// Sample value range of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    /// 16-235 (TV / MPEG range)
    #[default]
    Limited,
    /// 0-255 (PC / JPEG range)
    Full,
}

/// Conversion from decoder timestamps to 100-ns ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamTiming {
    /// Seconds per pts unit
    pub time_base: f64,
    /// Stream start in 100-ns ticks
    pub start_time: i64,
}

impl Default for StreamTiming {
    fn default() -> Self {
        Self {
            time_base: 1.0 / 90_000.0,
            start_time: 0,
        }
    }
}

impl StreamTiming {
    pub fn ticks(&self, pts: i64) -> i64 {
        (pts as f64 * self.time_base * 10_000_000.0).round() as i64 - self.start_time
    }
}

/// Immutable per-stream description supplied by the decoder
#[derive(Debug, Clone, PartialEq)]
pub struct FormatDescriptor {
    pub pixel_format: PixelFormat,
    pub pixel: PixelDescriptor,
    /// Logical (non-padded) frame width
    pub width: u32,
    /// Logical (non-padded) frame height
    pub height: u32,
    /// Display aspect ratio
    pub aspect_ratio: f32,
    pub color_space: ColorSpace,
    pub color_range: ColorRange,
    pub timing: StreamTiming,
}

impl FormatDescriptor {
    /// Descriptor for a known pixel format. Returns `None` for
    /// [`PixelFormat::Other`].
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32) -> Option<Self> {
        let pixel = pixel_format.descriptor()?;
        Some(Self::with_pixel(pixel_format, pixel, width, height))
    }

    /// Descriptor with an explicit component layout
    pub fn with_pixel(pixel_format: PixelFormat, pixel: PixelDescriptor, width: u32, height: u32) -> Self {
        Self {
            pixel_format,
            pixel,
            width,
            height,
            aspect_ratio: width as f32 / height.max(1) as f32,
            color_space: ColorSpace::default(),
            color_range: ColorRange::default(),
            timing: StreamTiming::default(),
        }
    }

    pub fn color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn color_range(mut self, color_range: ColorRange) -> Self {
        self.color_range = color_range;
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: f32) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn timing(mut self, timing: StreamTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn planes(&self) -> u32 {
        self.pixel.planes()
    }

    pub fn depth(&self) -> u32 {
        self.pixel.comp0_depth()
    }

    pub fn is_rgb(&self) -> bool {
        self.pixel.flags.rgb
    }

    pub fn is_big_endian(&self) -> bool {
        self.pixel.flags.big_endian
    }

    pub fn is_hdr(&self) -> bool {
        self.color_space == ColorSpace::Bt2020
    }

    /// Chroma plane size, rounding up for odd luma sizes
    pub fn chroma_size(&self) -> (u32, u32) {
        (
            ceil_rshift(self.width, self.pixel.log2_chroma_w),
            ceil_rshift(self.height, self.pixel.log2_chroma_h),
        )
    }
}

fn ceil_rshift(value: u32, shift: u8) -> u32 {
    value.div_ceil(1u32 << shift)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_counts() {
        assert_eq!(PixelFormat::Bgra.descriptor().unwrap().planes(), 1);
        assert_eq!(PixelFormat::Nv12.descriptor().unwrap().planes(), 2);
        assert_eq!(PixelFormat::Yuv420p.descriptor().unwrap().planes(), 3);
        assert_eq!(PixelFormat::Yuva444p10Le.descriptor().unwrap().planes(), 4);
        assert_eq!(PixelFormat::Gbrap.descriptor().unwrap().planes(), 4);
    }

    #[test]
    fn test_layout() {
        assert_eq!(PixelFormat::Uyvy422.descriptor().unwrap().layout(), PixelLayout::Packed);
        assert_eq!(PixelFormat::P010Le.descriptor().unwrap().layout(), PixelLayout::SemiPlanar);
        assert_eq!(PixelFormat::Gbrp10Le.descriptor().unwrap().layout(), PixelLayout::Planar);
    }

    #[test]
    fn test_name_round_trip() {
        assert_eq!(PixelFormat::from_name("yuv420p10le"), PixelFormat::Yuv420p10Le);
        assert_eq!(PixelFormat::from_name("0rgb"), PixelFormat::ZeroRgb);
        assert_eq!(PixelFormat::from_name("xyz12le"), PixelFormat::Other("xyz12le".into()));
        assert!(PixelFormat::from_name("xyz12le").descriptor().is_none());
    }

    #[test]
    fn test_chroma_size_rounds_up() {
        let format = FormatDescriptor::new(PixelFormat::Yuv420p, 1919, 1081).unwrap();
        assert_eq!(format.chroma_size(), (960, 541));

        let format = FormatDescriptor::new(PixelFormat::Yuv422p, 1920, 1080).unwrap();
        assert_eq!(format.chroma_size(), (960, 1080));

        let format = FormatDescriptor::new(PixelFormat::Yuv420p, u32::MAX, u32::MAX - 1).unwrap();
        assert_eq!(format.chroma_size(), (1 << 31, (1 << 31) - 1));
    }

    #[test]
    fn test_big_endian_flag() {
        assert!(FormatDescriptor::new(PixelFormat::P010Be, 64, 64).unwrap().is_big_endian());
        assert!(!FormatDescriptor::new(PixelFormat::P010Le, 64, 64).unwrap().is_big_endian());
    }

    #[test]
    fn test_timing_ticks() {
        let timing = StreamTiming {
            time_base: 1.0 / 1000.0,
            start_time: 5_000_000,
        };
        // 1500 ms -> 15_000_000 ticks, minus 0.5 s start
        assert_eq!(timing.ticks(1500), 10_000_000);
    }
}
