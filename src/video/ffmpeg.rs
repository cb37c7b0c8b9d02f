//! ffmpeg-next adapters
//!
//! Builds [`FormatDescriptor`]s from FFmpeg pixel format descriptors and
//! runs the software colour conversion through swscale.

use std::ffi::CString;

use bytes::Bytes;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;

use crate::video::decoder::{ConversionError, ConvertedFrame};
use crate::video::format::{
    ColorRange, ColorSpace, ComponentDescriptor, FormatDescriptor, PixelDescriptor, PixelFlags, PixelFormat,
};
use crate::video::frame::{DecoderFrame, FrameData};

// AV_PIX_FMT_FLAG_* bits
const FLAG_BE: u64 = 1 << 0;
const FLAG_PAL: u64 = 1 << 1;
const FLAG_HWACCEL: u64 = 1 << 3;
const FLAG_PLANAR: u64 = 1 << 4;
const FLAG_RGB: u64 = 1 << 5;
const FLAG_ALPHA: u64 = 1 << 7;

fn flags_from_bits(bits: u64) -> PixelFlags {
    PixelFlags {
        big_endian: bits & FLAG_BE != 0,
        palette: bits & FLAG_PAL != 0,
        hwaccel: bits & FLAG_HWACCEL != 0,
        planar: bits & FLAG_PLANAR != 0,
        rgb: bits & FLAG_RGB != 0,
        alpha: bits & FLAG_ALPHA != 0,
    }
}

/// Component layout of an FFmpeg pixel format
pub fn pixel_descriptor(pixel: Pixel) -> Option<PixelDescriptor> {
    let desc = pixel.descriptor()?;
    let count = desc.nb_components() as usize;

    // SAFETY: the descriptor points into FFmpeg's static format table and
    // `comp` holds at least `nb_components` entries.
    let raw = unsafe { &*desc.as_ptr() };
    let components = raw.comp[..count.min(raw.comp.len())]
        .iter()
        .map(|c| ComponentDescriptor {
            plane: c.plane as u8,
            step: c.step as u8,
            offset: c.offset as u8,
            shift: c.shift as u8,
            depth: c.depth as u8,
        })
        .collect();

    Some(PixelDescriptor {
        components,
        log2_chroma_w: desc.log2_chroma_w(),
        log2_chroma_h: desc.log2_chroma_h(),
        flags: flags_from_bits(raw.flags as u64),
    })
}

pub fn color_space(space: ffmpeg_next::color::Space) -> ColorSpace {
    use ffmpeg_next::color::Space;
    match space {
        Space::BT2020NCL | Space::BT2020CL => ColorSpace::Bt2020,
        Space::BT709 => ColorSpace::Bt709,
        _ => ColorSpace::Bt601,
    }
}

pub fn color_range(range: ffmpeg_next::color::Range) -> ColorRange {
    match range {
        ffmpeg_next::color::Range::JPEG => ColorRange::Full,
        _ => ColorRange::Limited,
    }
}

/// Describe the output of an opened video decoder
pub fn describe_decoder(decoder: &ffmpeg_next::decoder::Video) -> Option<FormatDescriptor> {
    let pixel = decoder.format();
    let name = pixel.descriptor()?.name();
    let layout = pixel_descriptor(pixel)?;

    let aspect = decoder.aspect_ratio();
    let sample_aspect = if aspect.denominator() > 0 && aspect.numerator() > 0 {
        aspect.numerator() as f32 / aspect.denominator() as f32
    } else {
        1.0
    };
    let display_aspect = decoder.width() as f32 * sample_aspect / decoder.height().max(1) as f32;

    Some(
        FormatDescriptor::with_pixel(PixelFormat::from_name(name), layout, decoder.width(), decoder.height())
            .aspect_ratio(display_aspect)
            .color_space(color_space(decoder.color_space()))
            .color_range(color_range(decoder.color_range())),
    )
}

fn pixel_by_name(name: &str) -> Option<Pixel> {
    let name = CString::new(name).ok()?;
    // SAFETY: av_get_pix_fmt only reads the NUL-terminated name
    let raw = unsafe { ffmpeg_next::ffi::av_get_pix_fmt(name.as_ptr()) };
    match Pixel::from(raw) {
        Pixel::None => None,
        pixel => Some(pixel),
    }
}

/// swscale conversion of decoder planes to packed RGBA8
#[derive(Default)]
pub struct SwsConverter {
    scaler: Option<scaling::Context>,
    source: Option<Pixel>,
    width: u32,
    height: u32,
}

impl SwsConverter {
    pub fn setup(&mut self, format: &FormatDescriptor) -> Result<(), ConversionError> {
        let source = pixel_by_name(format.pixel_format.name())
            .ok_or_else(|| ConversionError::Setup(format.pixel_format.to_string()))?;

        let scaler = scaling::Context::get(
            source,
            format.width,
            format.height,
            Pixel::RGBA,
            format.width,
            format.height,
            scaling::Flags::BILINEAR,
        )
        .map_err(|e| ConversionError::Setup(format!("{}: {}", format.pixel_format, e)))?;

        tracing::debug!(
            "swscale {} {}x{} -> rgba",
            format.pixel_format,
            format.width,
            format.height
        );
        self.scaler = Some(scaler);
        self.source = Some(source);
        self.width = format.width;
        self.height = format.height;
        Ok(())
    }

    /// Convert a frame of CPU planes to tightly packed RGBA8
    pub fn convert(&mut self, frame: &DecoderFrame) -> Result<ConvertedFrame, ConversionError> {
        let (scaler, source) = match (self.scaler.as_mut(), self.source) {
            (Some(scaler), Some(source)) => (scaler, source),
            _ => return Err(ConversionError::NotInitialized),
        };
        let FrameData::Planes(planes) = &frame.data else {
            return Err(ConversionError::Convert("frame has no CPU planes".into()));
        };

        let mut input = ffmpeg_next::frame::Video::new(source, self.width, self.height);
        for (index, plane) in planes.iter().enumerate().take(input.planes()) {
            let dst_stride = input.stride(index);
            let rows = input.plane_height(index) as usize;
            let src_stride = plane.stride as usize;
            let row_bytes = src_stride.min(dst_stride);
            let dst = input.data_mut(index);
            for row in 0..rows {
                let src_start = row * src_stride;
                let Some(src_row) = plane.data.get(src_start..src_start + row_bytes) else {
                    return Err(ConversionError::Convert(format!("plane {} is truncated", index)));
                };
                let dst_start = row * dst_stride;
                dst[dst_start..dst_start + row_bytes].copy_from_slice(src_row);
            }
        }

        let mut output = ffmpeg_next::frame::Video::empty();
        scaler
            .run(&input, &mut output)
            .map_err(|e| ConversionError::Convert(e.to_string()))?;

        let stride = output.stride(0);
        let row_bytes = self.width as usize * 4;
        let data = output.data(0);
        let packed = if stride == row_bytes {
            data[..row_bytes * self.height as usize].to_vec()
        } else {
            let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
            for row in 0..self.height as usize {
                packed.extend_from_slice(&data[row * stride..row * stride + row_bytes]);
            }
            packed
        };

        Ok(ConvertedFrame {
            data: Bytes::from(packed),
            stride: row_bytes as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        let flags = flags_from_bits(FLAG_PLANAR | FLAG_RGB | FLAG_ALPHA);
        assert!(flags.planar && flags.rgb && flags.alpha);
        assert!(!flags.big_endian && !flags.hwaccel);
    }

    #[test]
    fn test_nv12_descriptor_matches_builtin_table() {
        let from_ffmpeg = pixel_descriptor(Pixel::NV12).unwrap();
        let builtin = PixelFormat::Nv12.descriptor().unwrap();
        assert_eq!(from_ffmpeg.planes(), builtin.planes());
        assert_eq!(from_ffmpeg.log2_chroma_h, 1);
        assert_eq!(from_ffmpeg.comp0_depth(), 8);
    }
}
