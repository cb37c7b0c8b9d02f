//! The decoder as seen from the renderer
//!
//! Decoding itself lives elsewhere. The renderer only needs the decoder's
//! hardware surface pool, its software colour conversion, and a way to drop
//! pooled frames when the processing mode changes.

use bytes::Bytes;
use thiserror::Error;

use crate::gpu::{GpuBackend, TextureFormat};
use crate::video::format::FormatDescriptor;
use crate::video::frame::DecoderFrame;

/// Errors from the decoder's colour conversion
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Failed to set up colour conversion for {0}")]
    Setup(String),

    #[error("Colour conversion used before setup")]
    NotInitialized,

    #[error("Colour conversion failed: {0}")]
    Convert(String),
}

/// A frame converted to packed RGBA on the CPU
#[derive(Debug, Clone)]
pub struct ConvertedFrame {
    pub data: Bytes,
    /// Bytes per row
    pub stride: u32,
}

/// Decoder-side state guarded by the decoder lock
pub trait DecoderContext<B: GpuBackend>: Send {
    /// Array texture the hardware decoder renders into
    fn surface_pool(&self) -> Option<&B::Texture>;

    /// Format of the hardware surface pool
    fn surface_format(&self) -> Option<TextureFormat>;

    /// Prepare conversion of `format` frames to packed RGBA
    fn setup_conversion(&mut self, format: &FormatDescriptor) -> Result<(), ConversionError>;

    /// Convert one frame with the context from [`setup_conversion`](Self::setup_conversion)
    fn convert(&mut self, frame: &DecoderFrame) -> Result<ConvertedFrame, ConversionError>;

    /// Drop every pooled frame so surfaces can be reallocated
    fn dispose_frames(&mut self);
}
