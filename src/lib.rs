//! Immersive Planes
//!
//! Maps decoded video frames onto GPU textures: picks a plane layout and
//! pixel shader per stream format, then uploads or shares each frame for
//! presentation.

pub mod gpu;
pub mod settings;
pub mod telemetry;
pub mod video;

pub use gpu::{GpuBackend, GpuError, RecordingBackend, WgpuBackend};
pub use settings::VideoSettings;
pub use video::{
    ConfigError, DecoderContext, DecoderFrame, FormatDescriptor, MaterializeError, PixelFormat, RenderableFrame,
    VideoRenderer,
};
