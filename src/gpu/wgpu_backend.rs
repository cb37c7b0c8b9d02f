//! wgpu implementation of [`GpuBackend`]
//!
//! Every generated pixel shader shares one pipeline layout: the constant
//! block, a linear sampler and four 2D plane textures. Unused plane slots
//! are bound to a 1x1 placeholder. Allocation and validation failures are
//! caught with error scopes and returned as [`GpuError`].

use std::sync::Arc;

use super::{
    CopyRegion, GpuBackend, GpuError, PlaneAspect, TextureData, TextureDesc, TextureFormat, VideoProcessorColorSpace,
    ViewDesc, ViewShape, Viewport,
};
use crate::video::{RenderableFrame, ShaderConstants, ShaderKey, ShaderSource};

/// Number of plane textures a pixel shader can sample
const PLANE_SLOTS: usize = 4;

/// Texture handle
#[derive(Debug, Clone)]
pub struct WgpuTexture {
    pub texture: Arc<wgpu::Texture>,
    pub desc: TextureDesc,
}

/// Shader-resource view handle
#[derive(Debug)]
pub struct WgpuView {
    pub view: wgpu::TextureView,
    pub format: TextureFormat,
}

/// Compiled pixel shader
#[derive(Debug, Clone)]
pub struct WgpuShader {
    pub key: ShaderKey,
    pipeline: Arc<wgpu::RenderPipeline>,
}

/// Storage format on wgpu, `None` when wgpu has no matching format.
///
/// Packed 4:2:2 is stored as RGBA texels holding two pixels each.
pub fn wgpu_format(format: TextureFormat) -> Option<wgpu::TextureFormat> {
    match format {
        TextureFormat::R8Unorm => Some(wgpu::TextureFormat::R8Unorm),
        TextureFormat::Rg8Unorm => Some(wgpu::TextureFormat::Rg8Unorm),
        TextureFormat::R16Unorm => Some(wgpu::TextureFormat::R16Unorm),
        TextureFormat::Rg16Unorm => Some(wgpu::TextureFormat::Rg16Unorm),
        TextureFormat::Rgba8Unorm | TextureFormat::Yuy2 => Some(wgpu::TextureFormat::Rgba8Unorm),
        TextureFormat::Rgba16Unorm | TextureFormat::Y210 => Some(wgpu::TextureFormat::Rgba16Unorm),
        TextureFormat::Nv12 => Some(wgpu::TextureFormat::NV12),
        TextureFormat::P010 | TextureFormat::Bgra4Unorm => None,
    }
}

/// Texture extent in texels for a plane `width` pixels wide
fn texel_extent(desc: &TextureDesc) -> wgpu::Extent3d {
    let per_texel = desc.format.pixels_per_texel();
    wgpu::Extent3d {
        width: desc.width.div_ceil(per_texel).max(1),
        height: desc.height.max(1),
        depth_or_array_layers: 1,
    }
}

fn wgpu_aspect(aspect: PlaneAspect) -> wgpu::TextureAspect {
    match aspect {
        PlaneAspect::All => wgpu::TextureAspect::All,
        PlaneAspect::Luma => wgpu::TextureAspect::Plane0,
        PlaneAspect::Chroma => wgpu::TextureAspect::Plane1,
    }
}

/// GPU backend rendering through wgpu
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    output_format: wgpu::TextureFormat,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    constants_buffer: wgpu::Buffer,
    placeholder: wgpu::TextureView,
    bound: Option<WgpuShader>,
    target_size: Option<(u32, u32)>,
    viewport: Option<Viewport>,
    extract: Option<wgpu::Texture>,
}

impl WgpuBackend {
    /// Wrap an existing device.
    ///
    /// `target_size` is the presentation surface size, or `None` to render
    /// into an offscreen extract texture.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output_format: wgpu::TextureFormat,
        target_size: Option<(u32, u32)>,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Video Plane Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for slot in 0..PLANE_SLOTS {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + slot as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Video Planes Bind Group Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Video Planes Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let constants_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Video Constants Buffer"),
            size: std::mem::size_of::<ShaderConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&constants_buffer, 0, bytemuck::bytes_of(&ShaderConstants::default()));

        let placeholder = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Video Plane Placeholder"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            device,
            queue,
            output_format,
            bind_group_layout,
            pipeline_layout,
            sampler,
            constants_buffer,
            placeholder,
            bound: None,
            target_size,
            viewport: None,
            extract: None,
        }
    }

    /// Create a device without a surface, for offscreen use
    pub fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(GpuError::NoAdapter)?;

        tracing::info!("Using GPU: {}", adapter.get_info().name);
        tracing::info!("Backend: {:?}", adapter.get_info().backend);

        // 16-bit planes and NV12 surfaces when the adapter has them
        let wanted = wgpu::Features::TEXTURE_FORMAT_16BIT_NORM | wgpu::Features::TEXTURE_FORMAT_NV12;
        let required_features = adapter.features() & wanted;
        if !required_features.contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM) {
            tracing::warn!("16-bit normalized textures not available - high bit depth video will use software conversion");
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Immersive Planes Device"),
                required_features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| GpuError::RequestDevice(e.to_string()))?;

        Ok(Self::new(
            Arc::new(device),
            Arc::new(queue),
            wgpu::TextureFormat::Rgba8Unorm,
            None,
        ))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Presentation surface resized or removed
    pub fn set_target_size(&mut self, target_size: Option<(u32, u32)>) {
        self.target_size = target_size;
    }

    /// Offscreen target created by `prepare_for_extract`
    pub fn extract_texture(&self) -> Option<&wgpu::Texture> {
        self.extract.as_ref()
    }

    /// Draw `frame` with the bound pixel shader into `target`
    pub fn render(&mut self, frame: &RenderableFrame<Self>, target: &wgpu::TextureView) -> Result<(), GpuError> {
        let shader = self
            .bound
            .as_ref()
            .ok_or_else(|| GpuError::ResourceCreation("no pixel shader bound".into()))?;

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: self.constants_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for slot in 0..PLANE_SLOTS {
            let view = frame.views.get(slot).map_or(&self.placeholder, |v| &v.view);
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + slot as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }

        let bind_group = self.scoped(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Video Planes Bind Group"),
                layout: &self.bind_group_layout,
                entries: &entries,
            })
        })
        .map_err(GpuError::ResourceCreation)?;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Video Planes Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Video Planes Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&shader.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            if let Some(vp) = self.viewport {
                pass.set_viewport(vp.x, vp.y, vp.width, vp.height, 0.0, 1.0);
            }
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Draw `frame` into the extract target
    pub fn render_offscreen(&mut self, frame: &RenderableFrame<Self>) -> Result<(), GpuError> {
        let view = self
            .extract
            .as_ref()
            .ok_or_else(|| GpuError::ResourceCreation("no extract target".into()))?
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render(frame, &view)
    }

    /// Run `f` inside validation and out-of-memory error scopes
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }
}

impl GpuBackend for WgpuBackend {
    type Texture = WgpuTexture;
    type View = WgpuView;
    type Shader = WgpuShader;

    fn supports_format(&self, format: TextureFormat) -> bool {
        wgpu_format(format).is_some_and(|f| self.device.features().contains(f.required_features()))
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<TextureData<'_>>) -> Result<WgpuTexture, GpuError> {
        let format = wgpu_format(desc.format).ok_or(GpuError::UnsupportedFormat(desc.format))?;
        let size = texel_extent(desc);

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if desc.usage.render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = self
            .scoped(|device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Video Plane Texture"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage,
                    view_formats: &[],
                })
            })
            .map_err(GpuError::ResourceCreation)?;

        if let Some(data) = data {
            self.scoped(|_| {
                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    data.bytes,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(data.stride),
                        rows_per_image: Some(size.height),
                    },
                    size,
                )
            })
            .map_err(GpuError::ResourceCreation)?;
        }

        Ok(WgpuTexture {
            texture: Arc::new(texture),
            desc: *desc,
        })
    }

    fn create_view(&mut self, texture: &WgpuTexture, desc: &ViewDesc) -> Result<WgpuView, GpuError> {
        let format = wgpu_format(desc.format).ok_or(GpuError::UnsupportedFormat(desc.format))?;
        let (base_array_layer, array_layer_count) = match desc.shape {
            ViewShape::D2 => (0, None),
            ViewShape::D2Array { first_slice } => (first_slice, Some(1)),
        };

        let view = self
            .scoped(|_| {
                texture.texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Video Plane View"),
                    format: Some(format),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu_aspect(desc.aspect),
                    base_mip_level: 0,
                    mip_level_count: Some(1),
                    base_array_layer,
                    array_layer_count,
                    ..Default::default()
                })
            })
            .map_err(GpuError::ResourceCreation)?;

        Ok(WgpuView {
            view,
            format: desc.format,
        })
    }

    fn copy_region(&mut self, dst: &WgpuTexture, src: &WgpuTexture, region: CopyRegion) -> Result<(), GpuError> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Video Surface Copy"),
        });

        // Multi-planar surfaces copy one plane at a time
        let planes: &[(wgpu::TextureAspect, u32)] = if dst.desc.format.is_multi_planar() {
            &[(wgpu::TextureAspect::Plane0, 1), (wgpu::TextureAspect::Plane1, 2)]
        } else {
            &[(wgpu::TextureAspect::All, 1)]
        };

        for &(aspect, divisor) in planes {
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &src.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: region.src_slice,
                    },
                    aspect,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &dst.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect,
                },
                wgpu::Extent3d {
                    width: (region.width / divisor).max(1),
                    height: (region.height / divisor).max(1),
                    depth_or_array_layers: 1,
                },
            );
        }

        let commands = self
            .scoped(|_| encoder.finish())
            .map_err(GpuError::ResourceCreation)?;
        self.queue.submit(std::iter::once(commands));
        Ok(())
    }

    fn compile_shader(&mut self, key: &ShaderKey, source: &ShaderSource) -> Result<WgpuShader, GpuError> {
        let wgsl = source.to_wgsl();
        let compile_error = |message: String| GpuError::ShaderCompilation {
            key: key.clone(),
            message,
        };

        let module = self
            .scoped(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(key.as_str()),
                    source: wgpu::ShaderSource::Wgsl(wgsl.into()),
                })
            })
            .map_err(compile_error)?;

        let pipeline = self
            .scoped(|device| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(key.as_str()),
                    layout: Some(&self.pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &module,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: Default::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &module,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: self.output_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: Default::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        unclipped_depth: false,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .map_err(compile_error)?;

        tracing::debug!("Compiled pixel shader {}", key);
        Ok(WgpuShader {
            key: key.clone(),
            pipeline: Arc::new(pipeline),
        })
    }

    fn bind_shader(&mut self, shader: &WgpuShader) {
        self.bound = Some(shader.clone());
    }

    fn update_constants(&mut self, constants: &ShaderConstants) {
        self.queue
            .write_buffer(&self.constants_buffer, 0, bytemuck::bytes_of(constants));
    }

    fn configure_video_processor(&mut self, _input: &VideoProcessorColorSpace) -> Result<(), GpuError> {
        Err(GpuError::VideoProcessor(
            "wgpu has no fixed-function video processor".into(),
        ))
    }

    fn render_target_size(&self) -> Option<(u32, u32)> {
        self.target_size
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn prepare_for_extract(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
        let texture = self
            .scoped(|device| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Video Extract Target"),
                    size: wgpu::Extent3d {
                        width: width.max(1),
                        height: height.max(1),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: self.output_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                })
            })
            .map_err(GpuError::ResourceCreation)?;

        self.extract = Some(texture);
        self.viewport = Some(Viewport {
            x: 0.0,
            y: 0.0,
            width: width.max(1) as f32,
            height: height.max(1) as f32,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Rendering needs a wgpu device; only the format mapping is tested here
    use super::*;
    use crate::gpu::TextureUsage;

    #[test]
    fn test_packed_422_is_half_width() {
        let desc = TextureDesc {
            width: 1921,
            height: 1080,
            format: TextureFormat::Yuy2,
            usage: TextureUsage::SHADER_RESOURCE,
        };
        assert_eq!(texel_extent(&desc).width, 961);
        assert_eq!(wgpu_format(TextureFormat::Y210), Some(wgpu::TextureFormat::Rgba16Unorm));
    }

    #[test]
    fn test_formats_without_wgpu_equivalent() {
        assert!(wgpu_format(TextureFormat::Bgra4Unorm).is_none());
        assert!(wgpu_format(TextureFormat::P010).is_none());
        assert_eq!(wgpu_format(TextureFormat::Nv12), Some(wgpu::TextureFormat::NV12));
    }
}
