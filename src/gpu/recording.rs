//! Headless backend that records every GPU call

use std::collections::HashSet;

use super::{
    CopyRegion, GpuBackend, GpuError, TextureData, TextureDesc, TextureFormat, VideoProcessorColorSpace,
    ViewDesc, Viewport,
};
use crate::video::{ShaderConstants, ShaderKey, ShaderSource};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateTexture { id: u64, desc: TextureDesc, data_len: Option<usize> },
    CreateView { texture: u64, desc: ViewDesc },
    Copy { dst: u64, src: u64, region: CopyRegion },
    CompileShader(ShaderKey),
    BindShader(ShaderKey),
    UpdateConstants(ShaderConstants),
    ConfigureVideoProcessor(VideoProcessorColorSpace),
    SetViewport(Viewport),
    PrepareForExtract { width: u32, height: u32 },
}

/// Texture handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTexture {
    pub id: u64,
    pub desc: TextureDesc,
}

/// View handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedView {
    pub texture: u64,
    pub desc: ViewDesc,
}

/// Shader handle holding the generated WGSL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedShader {
    pub key: ShaderKey,
    pub wgsl: String,
}

/// A [`GpuBackend`] without a GPU.
///
/// Supports every texture format unless told otherwise, has no video
/// processor and no presentation target by default.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<GpuCall>,
    unsupported: HashSet<TextureFormat>,
    fail_textures: bool,
    video_processor: bool,
    target: Option<(u32, u32)>,
    next_id: u64,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_format(mut self, format: TextureFormat) -> Self {
        self.unsupported.insert(format);
        self
    }

    pub fn with_video_processor(mut self) -> Self {
        self.video_processor = true;
        self
    }

    pub fn with_render_target(mut self, width: u32, height: u32) -> Self {
        self.target = Some((width, height));
        self
    }

    /// Make texture creation fail until switched off again
    pub fn set_fail_textures(&mut self, fail: bool) {
        self.fail_textures = fail;
    }

    /// A texture that exists outside this backend, such as a decoder's
    /// surface pool. Not recorded as a call.
    pub fn external_texture(&mut self, desc: TextureDesc) -> RecordedTexture {
        RecordedTexture {
            id: self.next_id(),
            desc,
        }
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn textures_created(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::CreateTexture { .. }))
            .count()
    }

    pub fn shaders_compiled(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GpuCall::CompileShader(_)))
            .count()
    }

    pub fn last_constants(&self) -> Option<&ShaderConstants> {
        self.calls.iter().rev().find_map(|c| match c {
            GpuCall::UpdateConstants(constants) => Some(constants),
            _ => None,
        })
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    type Texture = RecordedTexture;
    type View = RecordedView;
    type Shader = RecordedShader;

    fn supports_format(&self, format: TextureFormat) -> bool {
        !self.unsupported.contains(&format)
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<TextureData<'_>>) -> Result<RecordedTexture, GpuError> {
        if self.fail_textures {
            return Err(GpuError::ResourceCreation("texture allocation failed".into()));
        }
        if !self.supports_format(desc.format) {
            return Err(GpuError::UnsupportedFormat(desc.format));
        }

        let id = self.next_id();
        self.calls.push(GpuCall::CreateTexture {
            id,
            desc: *desc,
            data_len: data.map(|d| d.bytes.len()),
        });
        Ok(RecordedTexture { id, desc: *desc })
    }

    fn create_view(&mut self, texture: &RecordedTexture, desc: &ViewDesc) -> Result<RecordedView, GpuError> {
        self.calls.push(GpuCall::CreateView {
            texture: texture.id,
            desc: *desc,
        });
        Ok(RecordedView {
            texture: texture.id,
            desc: *desc,
        })
    }

    fn copy_region(&mut self, dst: &RecordedTexture, src: &RecordedTexture, region: CopyRegion) -> Result<(), GpuError> {
        self.calls.push(GpuCall::Copy {
            dst: dst.id,
            src: src.id,
            region,
        });
        Ok(())
    }

    fn compile_shader(&mut self, key: &ShaderKey, source: &ShaderSource) -> Result<RecordedShader, GpuError> {
        self.calls.push(GpuCall::CompileShader(key.clone()));
        Ok(RecordedShader {
            key: key.clone(),
            wgsl: source.to_wgsl(),
        })
    }

    fn bind_shader(&mut self, shader: &RecordedShader) {
        self.calls.push(GpuCall::BindShader(shader.key.clone()));
    }

    fn update_constants(&mut self, constants: &ShaderConstants) {
        self.calls.push(GpuCall::UpdateConstants(*constants));
    }

    fn configure_video_processor(&mut self, input: &VideoProcessorColorSpace) -> Result<(), GpuError> {
        if !self.video_processor {
            return Err(GpuError::VideoProcessor("not available on this device".into()));
        }
        self.calls.push(GpuCall::ConfigureVideoProcessor(*input));
        Ok(())
    }

    fn render_target_size(&self) -> Option<(u32, u32)> {
        self.target
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(GpuCall::SetViewport(viewport));
    }

    fn prepare_for_extract(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        self.calls.push(GpuCall::PrepareForExtract { width, height });
        Ok(())
    }
}
