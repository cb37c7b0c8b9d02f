//! Decoder stub for renderer tests

use bytes::Bytes;

use crate::gpu::{RecordedTexture, RecordingBackend, TextureDesc, TextureFormat, TextureUsage};
use crate::video::decoder::{ConversionError, ConvertedFrame, DecoderContext};
use crate::video::format::FormatDescriptor;
use crate::video::frame::{DecoderFrame, PlaneData};
use crate::video::renderer::VideoRenderer;

#[derive(Debug, Default)]
pub(crate) struct StubDecoder {
    pub pool: Option<RecordedTexture>,
    pub pool_format: Option<TextureFormat>,
    pub conversion_fails: bool,
    pub converted_format: Option<FormatDescriptor>,
    pub conversions: usize,
    pub disposed: usize,
}

impl StubDecoder {
    /// Decoder with an NV12 hardware surface pool
    pub fn with_pool(backend: &mut RecordingBackend, width: u32, height: u32) -> Self {
        let pool = backend.external_texture(TextureDesc {
            width,
            height,
            format: TextureFormat::Nv12,
            usage: TextureUsage::SHADER_RESOURCE,
        });
        Self {
            pool: Some(pool),
            pool_format: Some(TextureFormat::Nv12),
            ..Self::default()
        }
    }
}

impl DecoderContext<RecordingBackend> for StubDecoder {
    fn surface_pool(&self) -> Option<&RecordedTexture> {
        self.pool.as_ref()
    }

    fn surface_format(&self) -> Option<TextureFormat> {
        self.pool_format
    }

    fn setup_conversion(&mut self, format: &FormatDescriptor) -> Result<(), ConversionError> {
        if self.conversion_fails {
            return Err(ConversionError::Setup(format.pixel_format.to_string()));
        }
        self.converted_format = Some(format.clone());
        Ok(())
    }

    fn convert(&mut self, _frame: &DecoderFrame) -> Result<ConvertedFrame, ConversionError> {
        let format = self.converted_format.as_ref().ok_or(ConversionError::NotInitialized)?;
        self.conversions += 1;
        let stride = format.width * 4;
        Ok(ConvertedFrame {
            data: Bytes::from(vec![0u8; (stride * format.height) as usize]),
            stride,
        })
    }

    fn dispose_frames(&mut self) {
        self.disposed += 1;
    }
}

pub(crate) type TestRenderer = VideoRenderer<StubDecoder, RecordingBackend>;

/// Zero-filled planes matching the current configuration
pub(crate) fn planes_for(renderer: &TestRenderer, pts: i64) -> DecoderFrame {
    let config = renderer.configuration();
    let planes = config
        .planes
        .iter()
        .map(|plane| {
            let stride = plane.texture_format.row_bytes(plane.width) as u32;
            PlaneData::new(vec![0u8; (stride * plane.height) as usize], stride)
        })
        .collect();
    DecoderFrame::planes(pts, planes)
}
