//! Video plane configuration and frame materialization
//!
//! [`VideoRenderer`] takes a decoder's [`FormatDescriptor`], chooses how its
//! frames reach the GPU (one of the [`DispatchCase`]s), compiles the matching
//! pixel shader and then turns every decoded frame into a
//! [`RenderableFrame`] of textures and views.

mod configurator;
mod context;
mod decoder;
mod dispatch;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
mod format;
mod frame;
mod hardware;
mod hdr;
mod materializer;
mod planes;
mod renderer;
mod shader;

#[cfg(test)]
mod testing;

pub use configurator::{video_processor_color_space, ConfigError};
pub use context::{ContextGuard, DecoderGuard, SharedContext};
pub use decoder::{ConversionError, ConvertedFrame, DecoderContext};
pub use dispatch::{classify, planar_scale, rgb_swizzle, software_fallback, DispatchCase, DispatchPlan};
pub use format::{
    ColorRange, ColorSpace, ComponentDescriptor, FormatDescriptor, PixelDescriptor, PixelFlags, PixelFormat,
    PixelLayout, StreamTiming,
};
pub use frame::{BufferRef, DecoderFrame, FrameData, PlaneData, RenderableFrame, SideData};
pub use hardware::{select_processor, HardwareState, VideoProcessorKind};
pub use hdr::{HdrMetadata, ShaderConstants, DEFAULT_HDR_LUMINANCE};
pub use materializer::MaterializeError;
pub use planes::{PlaneLayout, PlaneSet, PlaneView, ViewDimension, MAX_PLANES};
pub use renderer::{DeviceState, PlaneConfiguration, StreamState, VideoRenderer};
pub use shader::{ShaderCache, ShaderDefines, ShaderKey, ShaderSource, DEFAULT_SHADER_CACHE_CAPACITY};
