//! GPU backend abstraction
//!
//! The plane configurator and frame materializer never talk to a graphics API
//! directly. They describe textures, views and pixel shaders with the plain
//! types in this module and hand them to a [`GpuBackend`].
//!
//! Two backends ship with the crate:
//! - [`WgpuBackend`] renders through wgpu
//! - [`RecordingBackend`] is headless and records every call (used by tests
//!   and by tools that only need dispatch decisions)

mod recording;
mod wgpu_backend;

pub use recording::{GpuCall, RecordedShader, RecordedTexture, RecordedView, RecordingBackend};
pub use wgpu_backend::WgpuBackend;

use crate::video::{ShaderConstants, ShaderKey, ShaderSource};

/// Errors reported by a GPU backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum GpuError {
    #[error("GPU does not support {0:?} texture format")]
    UnsupportedFormat(TextureFormat),
    #[error("Failed to create GPU resource: {0}")]
    ResourceCreation(String),
    #[error("Failed to compile pixel shader {key}: {message}")]
    ShaderCompilation { key: ShaderKey, message: String },
    #[error("Video processor unavailable: {0}")]
    VideoProcessor(String),
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to create GPU device: {0}")]
    RequestDevice(String),
}

/// Backend-independent texture formats used by plane layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    R16Unorm,
    Rg16Unorm,
    Rgba8Unorm,
    Rgba16Unorm,
    /// 4-4-4-4 packed RGB
    Bgra4Unorm,
    /// Packed 8-bit 4:2:2, two pixels per texel
    Yuy2,
    /// Packed 10-bit 4:2:2, two pixels per texel
    Y210,
    /// 8-bit semi-planar 4:2:0 (hardware decoder surfaces)
    Nv12,
    /// 10-bit semi-planar 4:2:0 (hardware decoder surfaces)
    P010,
}

impl TextureFormat {
    /// Number of horizontal pixels stored in one texel
    pub fn pixels_per_texel(self) -> u32 {
        match self {
            TextureFormat::Yuy2 | TextureFormat::Y210 => 2,
            _ => 1,
        }
    }

    /// Bytes in one texel; the luma plane for multi-planar formats
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8Unorm | TextureFormat::Nv12 => 1,
            TextureFormat::Rg8Unorm | TextureFormat::R16Unorm | TextureFormat::Bgra4Unorm | TextureFormat::P010 => 2,
            TextureFormat::Rg16Unorm | TextureFormat::Rgba8Unorm | TextureFormat::Yuy2 => 4,
            TextureFormat::Rgba16Unorm | TextureFormat::Y210 => 8,
        }
    }

    /// Smallest row pitch holding `width` pixels
    pub fn row_bytes(self, width: u32) -> u64 {
        u64::from(width.div_ceil(self.pixels_per_texel())) * u64::from(self.bytes_per_texel())
    }

    /// Whether the format carries separate luma and chroma planes
    pub fn is_multi_planar(self) -> bool {
        matches!(self, TextureFormat::Nv12 | TextureFormat::P010)
    }
}

/// How a texture may be bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureUsage {
    pub shader_resource: bool,
    pub render_target: bool,
}

impl TextureUsage {
    pub const SHADER_RESOURCE: Self = Self {
        shader_resource: true,
        render_target: false,
    };

    /// Needed for copies that feed the fixed-function video processor
    pub const RENDER_TARGET: Self = Self {
        shader_resource: true,
        render_target: true,
    };
}

/// Parameters for creating a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

/// Initial contents for a new texture
#[derive(Debug, Clone, Copy)]
pub struct TextureData<'a> {
    pub bytes: &'a [u8],
    /// Bytes per row in `bytes` (may include decoder padding)
    pub stride: u32,
}

/// Which plane of a multi-planar texture a view reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneAspect {
    #[default]
    All,
    Luma,
    Chroma,
}

/// Shape of a shader-resource view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewShape {
    /// Plain 2D view over the whole texture
    #[default]
    D2,
    /// One slice of an array texture
    D2Array { first_slice: u32 },
}

/// Parameters for creating a shader-resource view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDesc {
    pub format: TextureFormat,
    pub shape: ViewShape,
    pub aspect: PlaneAspect,
}

/// Source region for a sub-resource copy out of an array texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_slice: u32,
    pub width: u32,
    pub height: u32,
}

/// Input colour space for the fixed-function video processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoProcessorColorSpace {
    /// 0 = full range RGB, 1 = limited range RGB
    pub rgb_range: u32,
    /// 0 = BT.601, 1 = BT.709
    pub ycbcr_matrix: u32,
    /// 1 = limited (16-235), 2 = full (0-255)
    pub nominal_range: u32,
}

/// Presentation rectangle in render-target pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Letterbox/pillarbox a video of `aspect_ratio` inside the target
    pub fn fit(aspect_ratio: f32, target_width: u32, target_height: u32) -> Self {
        let target_w = target_width.max(1) as f32;
        let target_h = target_height.max(1) as f32;
        let target_aspect = target_w / target_h;

        if aspect_ratio <= 0.0 || !aspect_ratio.is_finite() {
            return Self {
                x: 0.0,
                y: 0.0,
                width: target_w,
                height: target_h,
            };
        }

        if aspect_ratio > target_aspect {
            // Wider than the target - bars top and bottom
            let height = target_w / aspect_ratio;
            Self {
                x: 0.0,
                y: (target_h - height) / 2.0,
                width: target_w,
                height,
            }
        } else {
            // Taller than the target - bars on the sides
            let width = target_h * aspect_ratio;
            Self {
                x: (target_w - width) / 2.0,
                y: 0.0,
                width,
                height: target_h,
            }
        }
    }
}

/// Operations the video core needs from the shared GPU device/context.
///
/// All methods run while the device lock is held, so implementations may
/// assume exclusive access.
pub trait GpuBackend: Send {
    /// Handle to a texture (owned or shared with the decoder)
    type Texture: Clone + Send + Sync;
    /// Handle to a shader-resource view
    type View: Send + Sync;
    /// Handle to a compiled pixel shader program
    type Shader: Clone + Send + Sync;

    /// Whether the device can sample textures of this format
    fn supports_format(&self, format: TextureFormat) -> bool;

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        data: Option<TextureData<'_>>,
    ) -> Result<Self::Texture, GpuError>;

    fn create_view(&mut self, texture: &Self::Texture, desc: &ViewDesc) -> Result<Self::View, GpuError>;

    /// Copy the top-left `region` of one slice of `src` into `dst`
    fn copy_region(
        &mut self,
        dst: &Self::Texture,
        src: &Self::Texture,
        region: CopyRegion,
    ) -> Result<(), GpuError>;

    fn compile_shader(&mut self, key: &ShaderKey, source: &ShaderSource) -> Result<Self::Shader, GpuError>;

    fn bind_shader(&mut self, shader: &Self::Shader);

    fn update_constants(&mut self, constants: &ShaderConstants);

    fn configure_video_processor(&mut self, input: &VideoProcessorColorSpace) -> Result<(), GpuError>;

    /// Size of the presentation target, `None` when rendering offscreen
    fn render_target_size(&self) -> Option<(u32, u32)>;

    fn set_viewport(&mut self, viewport: Viewport);

    /// Create the offscreen target used when there is nothing to present to
    fn prepare_for_extract(&mut self, width: u32, height: u32) -> Result<(), GpuError>;
}
