//! Format classification
//!
//! [`classify`] maps a stream to exactly one [`DispatchCase`] and returns a
//! [`DispatchPlan`] carrying everything the case needs: the plane layouts,
//! the shader key, the shader body and the per-case constants. It reads
//! nothing but its arguments, so every branch can be tested without a GPU.

use crate::gpu::{PlaneAspect, TextureFormat, TextureUsage};
use crate::video::format::{FormatDescriptor, PixelFormat};
use crate::video::hardware::HardwareState;
use crate::video::planes::{PlaneLayout, PlaneSet, PlaneView, ViewDimension};
use crate::video::shader::{ShaderDefines, ShaderKey, ShaderSource};

/// How decoded frames of the current stream reach the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchCase {
    /// Not resolved yet, or the last configuration failed
    #[default]
    None,
    /// Fixed-function processor fed from a copy of the decoder surface
    VideoProcessor,
    /// Fixed-function processor reading decoder surfaces in place
    VideoProcessorZeroCopy,
    /// Hardware surface copied out, sampled as luma + chroma
    Hardware,
    /// Hardware surface sampled in place through array-slice views
    HardwareZeroCopy,
    /// Packed 32/64-bit RGB
    RgbPacked,
    /// Packed 4-4-4-4 RGB
    RgbPacked16,
    /// GBR(A) planes
    RgbPlanar,
    /// Packed 4:2:2 YUV
    YuvPacked,
    /// Luma plane plus interleaved chroma
    YuvSemiPlanar,
    /// One plane per YUV(A) component
    YuvPlanar,
    /// CPU conversion to packed RGBA
    SoftwareFallback,
}

impl DispatchCase {
    /// Stable numeric id, the leading part of every shader key
    pub fn id(self) -> u8 {
        match self {
            DispatchCase::None => 0,
            DispatchCase::VideoProcessor => 1,
            DispatchCase::VideoProcessorZeroCopy => 2,
            DispatchCase::Hardware => 3,
            DispatchCase::HardwareZeroCopy => 4,
            DispatchCase::RgbPacked => 5,
            DispatchCase::RgbPacked16 => 6,
            DispatchCase::RgbPlanar => 7,
            DispatchCase::YuvPacked => 8,
            DispatchCase::YuvSemiPlanar => 9,
            DispatchCase::YuvPlanar => 10,
            DispatchCase::SoftwareFallback => 11,
        }
    }

    pub fn is_zero_copy(self) -> bool {
        matches!(
            self,
            DispatchCase::VideoProcessorZeroCopy | DispatchCase::HardwareZeroCopy
        )
    }

    pub fn is_video_processor(self) -> bool {
        matches!(
            self,
            DispatchCase::VideoProcessor | DispatchCase::VideoProcessorZeroCopy
        )
    }

    /// Cases that copy one decoder surface slice into a single texture
    pub fn copies_surface(self) -> bool {
        matches!(self, DispatchCase::VideoProcessor | DispatchCase::Hardware)
    }
}

/// Result of classifying a stream
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub case: DispatchCase,
    pub planes: PlaneSet,
    /// Empty for the video processor cases
    pub key: ShaderKey,
    /// `None` for the video processor cases
    pub shader: Option<ShaderSource>,
    /// Half-width texel size for packed 4:2:2, 0 otherwise
    pub tex_width: f32,
}

impl DispatchPlan {
    /// Number of textures a frame of this plan owns
    pub fn expected_textures(&self) -> usize {
        if self.case.is_zero_copy() {
            0
        } else if self.case.copies_surface() {
            1
        } else {
            self.planes.len()
        }
    }

    /// Number of shader-resource views a frame of this plan carries
    pub fn expected_views(&self) -> usize {
        self.planes.iter().filter(|p| p.view.is_some()).count()
    }

    /// Formats of every texture a frame must create
    pub fn created_texture_formats(&self) -> Vec<TextureFormat> {
        self.planes
            .iter()
            .take(self.expected_textures())
            .map(|p| p.texture_format)
            .collect()
    }
}

const SAMPLE_UV: &str = "textureSample(texture1, video_sampler, input.uv)";

fn sample(texture: u32) -> String {
    format!("textureSample(texture{texture}, video_sampler, input.uv)")
}

fn case_key(case: DispatchCase, hdr: bool) -> ShaderKey {
    let mut key = ShaderKey::default();
    if hdr {
        key.push("h");
    }
    key.push(&case.id().to_string());
    key
}

/// Shader scale that restores `depth`-bit samples stored in 16-bit unorm
/// textures to the full 0..1 range
pub fn planar_scale(depth: u32) -> u32 {
    1 << 16u32.saturating_sub(depth)
}

/// Classify a stream for the shader path.
///
/// `surface_format` is the format of the decoder's hardware surface pool and
/// is only consulted for accelerated input. Returns `None` when no case
/// handles the format, which sends the caller to the software fallback.
pub fn classify(
    format: &FormatDescriptor,
    hw: &HardwareState,
    surface_format: Option<TextureFormat>,
) -> Option<DispatchPlan> {
    if hw.accelerated {
        return Some(hardware(format, hw, surface_format));
    }

    if format.is_rgb() {
        rgb_packed(format)
            .or_else(|| rgb_packed16(format))
            .or_else(|| rgb_planar(format))
    } else {
        yuv_packed(format)
            .or_else(|| yuv_semi_planar(format))
            .or_else(|| yuv_planar(format))
    }
}

fn hardware(format: &FormatDescriptor, hw: &HardwareState, surface_format: Option<TextureFormat>) -> DispatchPlan {
    let high = format.depth() > 8;
    let (luma, chroma) = if high {
        (TextureFormat::R16Unorm, TextureFormat::Rg16Unorm)
    } else {
        (TextureFormat::R8Unorm, TextureFormat::Rg8Unorm)
    };
    let surface = surface_format.unwrap_or(if high { TextureFormat::P010 } else { TextureFormat::Nv12 });

    let plane = |view_format, aspect| PlaneLayout {
        width: format.width,
        height: format.height,
        texture_format: surface,
        usage: TextureUsage::SHADER_RESOURCE,
        view: Some(PlaneView {
            format: view_format,
            dimension: ViewDimension::Texture2D,
            aspect,
        }),
    };
    let mut planes = PlaneSet::from_planes(&[plane(luma, PlaneAspect::Luma), plane(chroma, PlaneAspect::Chroma)]);

    let case = if hw.zero_copy {
        planes = planes.with_array_views();
        DispatchCase::HardwareZeroCopy
    } else {
        DispatchCase::Hardware
    };

    let body = format!("    color = vec4<f32>({}.r, {}.rg, 1.0);\n", sample(1), sample(2));
    shader_plan(case, case_key(case, format.is_hdr()), planes, body, true, format.is_hdr())
}

fn rgb_packed(format: &FormatDescriptor) -> Option<DispatchPlan> {
    let packed = matches!(
        format.pixel_format,
        PixelFormat::ZeroRgb
            | PixelFormat::Rgb0
            | PixelFormat::ZeroBgr
            | PixelFormat::Bgr0
            | PixelFormat::Argb
            | PixelFormat::Rgba
            | PixelFormat::Abgr
            | PixelFormat::Bgra
            | PixelFormat::Rgba64Le
            | PixelFormat::Bgra64Le
    );
    if !packed || format.planes() != 1 {
        return None;
    }

    let case = DispatchCase::RgbPacked;
    let depth = format.depth();
    // RGB input is shown as is, BT.2020 or not
    let mut key = case_key(case, false);
    let texture_format = if depth > 8 {
        key.push("x");
        TextureFormat::Rgba16Unorm
    } else {
        TextureFormat::Rgba8Unorm
    };

    let swizzle = rgb_swizzle(format)?;
    key.push(&swizzle);

    let planes = PlaneSet::from_planes(&[PlaneLayout::sampled(format.width, format.height, texture_format)]);
    let body = format!("    color = vec4<f32>({SAMPLE_UV}.{swizzle}, 1.0);\n");
    Some(shader_plan(case, key, planes, body, false, false))
}

/// Channel order of a packed RGB texel, from each component's byte offset
pub fn rgb_swizzle(format: &FormatDescriptor) -> Option<String> {
    const CHANNELS: [char; 4] = ['r', 'g', 'b', 'a'];
    let component_bytes = format.depth().div_ceil(8).max(1);

    format
        .pixel
        .components
        .iter()
        .take(3)
        .map(|c| CHANNELS.get((c.offset as u32 / component_bytes) as usize).copied())
        .collect()
}

fn rgb_packed16(format: &FormatDescriptor) -> Option<DispatchPlan> {
    let (variant, swizzle) = match format.pixel_format {
        PixelFormat::Rgb444Le => ("a", "rgb"),
        PixelFormat::Bgr444Le => ("b", "bgr"),
        _ => return None,
    };
    if format.planes() != 1 {
        return None;
    }

    let case = DispatchCase::RgbPacked16;
    let mut key = case_key(case, false);
    key.push(variant);

    let planes = PlaneSet::from_planes(&[PlaneLayout::sampled(
        format.width,
        format.height,
        TextureFormat::Bgra4Unorm,
    )]);
    let body = format!("    color = vec4<f32>({SAMPLE_UV}.{swizzle}, 1.0);\n");
    Some(shader_plan(case, key, planes, body, false, false))
}

fn rgb_planar(format: &FormatDescriptor) -> Option<DispatchPlan> {
    let plane_count = format.planes();
    let depth = format.depth();
    if plane_count <= 2 || depth > 16 {
        return None;
    }

    let case = DispatchCase::RgbPlanar;
    let mut key = case_key(case, format.is_hdr());
    let mut body = format!(
        "    color.g = {}.r;\n    color.b = {}.r;\n    color.r = {}.r;\n",
        sample(1),
        sample(2),
        sample(3)
    );
    if plane_count == 4 {
        key.push("x");
        body.push_str(&format!("    color.a = {}.r;\n", sample(4)));
    }

    let texture_format = planar_depth(&mut key, &mut body, depth);
    if plane_count != 4 {
        body.push_str("    color.a = 1.0;\n");
    }

    let mut planes = PlaneSet::new();
    for _ in 0..plane_count.min(4) {
        planes.push(PlaneLayout::sampled(format.width, format.height, texture_format));
    }
    Some(shader_plan(case, key, planes, body, false, format.is_hdr()))
}

/// Append the bit-depth bucket shared by both planar cases and return the
/// per-plane texture format
fn planar_depth(key: &mut ShaderKey, body: &mut String, depth: u32) -> TextureFormat {
    if depth > 8 {
        key.push("a");
        body.push_str(&format!("    color = color * {}.0;\n", planar_scale(depth)));
        TextureFormat::R16Unorm
    } else {
        key.push("b");
        TextureFormat::R8Unorm
    }
}

fn yuv_packed(format: &FormatDescriptor) -> Option<DispatchPlan> {
    let (variant, luma, chroma) = match format.pixel_format {
        PixelFormat::Yuyv422 | PixelFormat::Y210Le => ("a", ["r", "b", "r"], "ga"),
        PixelFormat::Yvyu422 => ("b", ["r", "b", "r"], "ag"),
        PixelFormat::Uyvy422 => ("c", ["g", "a", "g"], "rb"),
        _ => return None,
    };
    if format.planes() != 1 {
        return None;
    }

    let case = DispatchCase::YuvPacked;
    let mut key = case_key(case, format.is_hdr());
    let (texture_format, view_format) = if format.depth() > 8 {
        key.push("x");
        (TextureFormat::Y210, TextureFormat::Rgba16Unorm)
    } else {
        (TextureFormat::Yuy2, TextureFormat::Rgba8Unorm)
    };
    key.push(variant);

    // Two pixels per texel: rebuild luma by blending the neighbouring samples
    let body = format!(
        r#"    let posx = input.uv.x - (params.tex_width * 0.25);
    let fx = fract(posx / params.tex_width);
    let pos1 = posx + ((0.5 - fx) * params.tex_width);
    let pos2 = posx + ((1.5 - fx) * params.tex_width);
    let c1 = textureSample(texture1, video_sampler, vec2<f32>(pos1, input.uv.y));
    let c2 = textureSample(texture1, video_sampler, vec2<f32>(pos2, input.uv.y));
    let left_y = mix(c1.{l0}, c1.{l1}, fx * 2.0);
    let right_y = mix(c1.{l1}, c2.{l2}, fx * 2.0 - 1.0);
    let out_uv = mix(c1.{chroma}, c2.{chroma}, vec2<f32>(fx));
    let out_y = mix(left_y, right_y, step(0.5, fx));
    color = vec4<f32>(out_y, out_uv, 1.0);
"#,
        l0 = luma[0],
        l1 = luma[1],
        l2 = luma[2],
    );

    let planes = PlaneSet::from_planes(&[PlaneLayout::reinterpreted(
        format.width,
        format.height,
        texture_format,
        view_format,
    )]);
    let mut plan = shader_plan(case, key, planes, body, true, format.is_hdr());
    plan.tex_width = 1.0 / (format.width >> 1).max(1) as f32;
    Some(plan)
}

fn yuv_semi_planar(format: &FormatDescriptor) -> Option<DispatchPlan> {
    if format.planes() != 2 {
        return None;
    }
    let components = &format.pixel.components;
    if components.len() < 3 {
        return None;
    }

    let case = DispatchCase::YuvSemiPlanar;
    let mut key = case_key(case, format.is_hdr());
    let (luma, chroma) = if format.depth() > 8 {
        key.push("x");
        (TextureFormat::R16Unorm, TextureFormat::Rg16Unorm)
    } else {
        (TextureFormat::R8Unorm, TextureFormat::Rg8Unorm)
    };

    // V stored before U swaps the chroma channels
    let swizzle = if components[1].offset > components[2].offset { "gr" } else { "rg" };
    key.push(swizzle);

    let (chroma_w, chroma_h) = format.chroma_size();
    let planes = PlaneSet::from_planes(&[
        PlaneLayout::sampled(format.width, format.height, luma),
        PlaneLayout::sampled(chroma_w, chroma_h, chroma),
    ]);
    let body = format!("    color = vec4<f32>({}.r, {}.{swizzle}, 1.0);\n", sample(1), sample(2));
    Some(shader_plan(case, key, planes, body, true, format.is_hdr()))
}

fn yuv_planar(format: &FormatDescriptor) -> Option<DispatchPlan> {
    let plane_count = format.planes();
    if plane_count <= 2 {
        return None;
    }

    let case = DispatchCase::YuvPlanar;
    let mut key = case_key(case, format.is_hdr());
    let mut body = format!(
        "    color.r = {}.r;\n    color.g = {}.r;\n    color.b = {}.r;\n",
        sample(1),
        sample(2),
        sample(3)
    );
    if plane_count == 4 {
        key.push("x");
        body.push_str(&format!("    color.a = {}.r;\n", sample(4)));
    }

    let texture_format = planar_depth(&mut key, &mut body, format.depth());
    if plane_count != 4 {
        body.push_str("    color.a = 1.0;\n");
    }

    let (chroma_w, chroma_h) = format.chroma_size();
    let mut planes = PlaneSet::new();
    for index in 0..plane_count.min(4) {
        let (width, height) = match index {
            1 | 2 => (chroma_w, chroma_h),
            _ => (format.width, format.height),
        };
        planes.push(PlaneLayout::sampled(width, height, texture_format));
    }
    Some(shader_plan(case, key, planes, body, true, format.is_hdr()))
}

/// Plan for the fixed-function video processor
pub fn video_processor(format: &FormatDescriptor, hw: &HardwareState, surface_format: Option<TextureFormat>) -> DispatchPlan {
    if hw.zero_copy {
        return DispatchPlan {
            case: DispatchCase::VideoProcessorZeroCopy,
            planes: PlaneSet::new(),
            key: ShaderKey::default(),
            shader: None,
            tex_width: 0.0,
        };
    }

    let surface = surface_format.unwrap_or(if format.depth() > 8 {
        TextureFormat::P010
    } else {
        TextureFormat::Nv12
    });
    DispatchPlan {
        case: DispatchCase::VideoProcessor,
        planes: PlaneSet::from_planes(&[PlaneLayout {
            width: format.width,
            height: format.height,
            texture_format: surface,
            usage: TextureUsage::RENDER_TARGET,
            view: None,
        }]),
        key: ShaderKey::default(),
        shader: None,
        tex_width: 0.0,
    }
}

/// Plan for frames converted to packed RGBA on the CPU
pub fn software_fallback(format: &FormatDescriptor) -> DispatchPlan {
    let case = DispatchCase::SoftwareFallback;
    let planes = PlaneSet::from_planes(&[PlaneLayout::sampled(
        format.width,
        format.height,
        TextureFormat::Rgba8Unorm,
    )]);
    let body = format!("    color = vec4<f32>({SAMPLE_UV}.rgb, 1.0);\n");
    shader_plan(case, case_key(case, false), planes, body, false, false)
}

fn shader_plan(case: DispatchCase, key: ShaderKey, planes: PlaneSet, body: String, yuv: bool, hdr: bool) -> DispatchPlan {
    DispatchPlan {
        case,
        planes,
        key,
        shader: Some(ShaderSource::new(body, ShaderDefines { hdr, yuv })),
        tex_width: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::format::ColorSpace;

    fn software(pixel_format: PixelFormat, width: u32, height: u32) -> Option<DispatchPlan> {
        let format = FormatDescriptor::new(pixel_format, width, height).unwrap();
        classify(&format, &HardwareState::software(), None)
    }

    #[test]
    fn test_bgra_swizzle_follows_offsets() {
        let plan = software(PixelFormat::Bgra, 1920, 1080).unwrap();
        assert_eq!(plan.case, DispatchCase::RgbPacked);
        assert_eq!(plan.key.as_str(), "5bgr");
        assert!(plan.shader.unwrap().body.contains(".bgr, 1.0"));

        assert_eq!(software(PixelFormat::Rgb0, 64, 64).unwrap().key.as_str(), "5rgb");
        assert_eq!(software(PixelFormat::ZeroRgb, 64, 64).unwrap().key.as_str(), "5gba");
    }

    #[test]
    fn test_rgba64_uses_16bit_texture() {
        let plan = software(PixelFormat::Bgra64Le, 64, 64).unwrap();
        assert_eq!(plan.key.as_str(), "5xbgr");
        assert_eq!(plan.planes.get(0).unwrap().texture_format, TextureFormat::Rgba16Unorm);
    }

    #[test]
    fn test_rgb444_variants() {
        let rgb = software(PixelFormat::Rgb444Le, 64, 64).unwrap();
        let bgr = software(PixelFormat::Bgr444Le, 64, 64).unwrap();
        assert_eq!(rgb.case, DispatchCase::RgbPacked16);
        assert_eq!(rgb.key.as_str(), "6a");
        assert_eq!(bgr.key.as_str(), "6b");
        assert_eq!(bgr.planes.get(0).unwrap().texture_format, TextureFormat::Bgra4Unorm);
    }

    #[test]
    fn test_planar_scale_for_10bit() {
        assert_eq!(planar_scale(10), 64);
        assert_eq!(planar_scale(16), 1);

        let plan = software(PixelFormat::Gbrp10Le, 64, 64).unwrap();
        assert_eq!(plan.case, DispatchCase::RgbPlanar);
        assert_eq!(plan.key.as_str(), "7a");
        assert_eq!(plan.planes.len(), 3);
        assert!(plan.shader.unwrap().body.contains("color = color * 64.0;"));

        let plan = software(PixelFormat::Yuv420p10Le, 64, 64).unwrap();
        assert_eq!(plan.key.as_str(), "10a");
        assert!(plan.planes.iter().all(|p| p.texture_format == TextureFormat::R16Unorm));
    }

    #[test]
    fn test_gbrap_has_alpha_plane() {
        let plan = software(PixelFormat::Gbrap, 64, 64).unwrap();
        assert_eq!(plan.key.as_str(), "7xb");
        assert_eq!(plan.planes.len(), 4);
    }

    #[test]
    fn test_yuv_packed_variants() {
        let yuyv = software(PixelFormat::Yuyv422, 1920, 1080).unwrap();
        assert_eq!(yuyv.case, DispatchCase::YuvPacked);
        assert_eq!(yuyv.key.as_str(), "8a");
        assert_eq!(yuyv.tex_width, 1.0 / 960.0);

        let plane = yuyv.planes.get(0).unwrap();
        assert_eq!(plane.texture_format, TextureFormat::Yuy2);
        assert_eq!(plane.view.unwrap().format, TextureFormat::Rgba8Unorm);

        assert_eq!(software(PixelFormat::Yvyu422, 64, 64).unwrap().key.as_str(), "8b");
        assert_eq!(software(PixelFormat::Uyvy422, 64, 64).unwrap().key.as_str(), "8c");
        assert_eq!(software(PixelFormat::Y210Le, 64, 64).unwrap().key.as_str(), "8xa");
    }

    #[test]
    fn test_semi_planar_chroma_order() {
        let nv12 = software(PixelFormat::Nv12, 1920, 1080).unwrap();
        let nv21 = software(PixelFormat::Nv21, 1920, 1080).unwrap();
        assert_eq!(nv12.case, DispatchCase::YuvSemiPlanar);
        assert_eq!(nv12.key.as_str(), "9rg");
        assert_eq!(nv21.key.as_str(), "9gr");

        let chroma = nv12.planes.get(1).unwrap();
        assert_eq!((chroma.width, chroma.height), (960, 540));
        assert_eq!(chroma.texture_format, TextureFormat::Rg8Unorm);

        assert_eq!(software(PixelFormat::P010Le, 64, 64).unwrap().key.as_str(), "9xrg");
    }

    #[test]
    fn test_yuv_planar_plane_sizes() {
        let plan = software(PixelFormat::Yuva420p, 1921, 1081).unwrap();
        assert_eq!(plan.case, DispatchCase::YuvPlanar);
        assert_eq!(plan.key.as_str(), "10xb");

        let sizes: Vec<_> = plan.planes.iter().map(|p| (p.width, p.height)).collect();
        assert_eq!(sizes, vec![(1921, 1081), (961, 541), (961, 541), (1921, 1081)]);
    }

    #[test]
    fn test_hdr_prefix_and_define() {
        let format = FormatDescriptor::new(PixelFormat::P010Le, 3840, 2160)
            .unwrap()
            .color_space(ColorSpace::Bt2020);
        let plan = classify(&format, &HardwareState::software(), None).unwrap();
        assert_eq!(plan.key.as_str(), "h9xrg");
        assert!(plan.shader.unwrap().defines.hdr);
    }

    #[test]
    fn test_packed_rgb_ignores_bt2020() {
        for (pixel_format, expected) in [(PixelFormat::Bgra, "5bgr"), (PixelFormat::Rgb444Le, "6a")] {
            let format = FormatDescriptor::new(pixel_format, 64, 64)
                .unwrap()
                .color_space(ColorSpace::Bt2020);
            let plan = classify(&format, &HardwareState::software(), None).unwrap();
            assert_eq!(plan.key.as_str(), expected);
            assert!(!plan.shader.unwrap().defines.hdr);
        }
    }

    #[test]
    fn test_unmatched_formats() {
        assert!(software(PixelFormat::Rgb24, 64, 64).is_none());
        assert!(software(PixelFormat::Gray8, 64, 64).is_none());

        let fallback = software_fallback(&FormatDescriptor::new(PixelFormat::Rgb24, 64, 64).unwrap());
        assert_eq!(fallback.key.as_str(), "11");
        assert_eq!(fallback.expected_textures(), 1);
    }

    #[test]
    fn test_hardware_cases() {
        let format = FormatDescriptor::new(PixelFormat::Nv12, 1920, 1080).unwrap();

        let copy = classify(&format, &HardwareState::accelerated(false), Some(TextureFormat::Nv12)).unwrap();
        assert_eq!(copy.case, DispatchCase::Hardware);
        assert_eq!(copy.key.as_str(), "3");
        assert_eq!(copy.expected_textures(), 1);
        assert_eq!(copy.expected_views(), 2);
        assert_eq!(copy.created_texture_formats(), vec![TextureFormat::Nv12]);

        let zero_copy = classify(&format, &HardwareState::accelerated(true), None).unwrap();
        assert_eq!(zero_copy.case, DispatchCase::HardwareZeroCopy);
        assert_eq!(zero_copy.expected_textures(), 0);
        assert!(zero_copy.created_texture_formats().is_empty());
        assert_eq!(
            zero_copy.planes.get(1).unwrap().view.unwrap().dimension,
            ViewDimension::Texture2DArray
        );
    }

    #[test]
    fn test_video_processor_plans() {
        let format = FormatDescriptor::new(PixelFormat::P010Le, 64, 64).unwrap();

        let copy = video_processor(&format, &HardwareState::accelerated(false), None);
        assert_eq!(copy.case, DispatchCase::VideoProcessor);
        assert!(copy.key.is_empty());
        let plane = copy.planes.get(0).unwrap();
        assert_eq!(plane.texture_format, TextureFormat::P010);
        assert!(plane.usage.render_target);
        assert_eq!(copy.expected_views(), 0);

        let zero_copy = video_processor(&format, &HardwareState::accelerated(true), None);
        assert_eq!(zero_copy.case, DispatchCase::VideoProcessorZeroCopy);
        assert!(zero_copy.planes.is_empty());
    }
}
