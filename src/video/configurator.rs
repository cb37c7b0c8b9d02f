//! Plane and shader configuration
//!
//! `configure` runs on every input format change. It picks the processing
//! stage, classifies the format, checks the GPU can hold the planes, falls
//! back to software conversion when it cannot, binds the matching shader and
//! swaps in a new [`PlaneConfiguration`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use thiserror::Error;

use crate::gpu::{GpuBackend, GpuError, VideoProcessorColorSpace, Viewport};
use crate::video::context::ContextGuard;
use crate::video::decoder::DecoderContext;
use crate::video::dispatch::{self, DispatchPlan};
use crate::video::format::{ColorRange, ColorSpace, FormatDescriptor};
use crate::video::hardware::{select_processor, HardwareState, VideoProcessorKind};
use crate::video::renderer::{DeviceState, PlaneConfiguration, StreamState, VideoRenderer};

/// Errors that fail a configuration attempt
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not supported")]
    UnsupportedFormat(String),

    #[error("Software conversion setup failed: {0}")]
    SoftwareFallbackFailed(String),

    #[error("No video stream to configure")]
    NoVideoStream,

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
}

/// Input colour space handed to the fixed-function video processor
pub fn video_processor_color_space(format: &FormatDescriptor) -> VideoProcessorColorSpace {
    let full = format.color_range == ColorRange::Full;
    VideoProcessorColorSpace {
        rgb_range: if full { 0 } else { 1 },
        ycbcr_matrix: if format.color_space != ColorSpace::Bt601 { 1 } else { 0 },
        nominal_range: if full { 2 } else { 1 },
    }
}

impl<D, B> VideoRenderer<D, B>
where
    D: DecoderContext<B>,
    B: GpuBackend,
{
    /// Configure planes and shaders for a stream.
    ///
    /// On failure the previous configuration stays in place with its
    /// dispatch case cleared, so no frame is materialized until a later
    /// call succeeds.
    pub fn configure(&self, format: &FormatDescriptor, hw: HardwareState, is_new_input: bool) -> Result<(), ConfigError> {
        let mut guard = self.context.lock();

        if let Some(frame) = self.presented.lock().take() {
            frame.release();
        }

        let previous = self.configuration();
        tracing::debug!("Preparing planes for {}", format.pixel_format);

        match self.configure_locked(&mut guard, format, hw, is_new_input, &previous) {
            Ok(config) => {
                tracing::debug!(
                    "Prepared planes for {} with {:?} [{:?}] key '{}'",
                    format.pixel_format,
                    config.processor,
                    config.case,
                    config.key
                );
                *self.config.write() = Arc::new(config);
                Ok(())
            }
            Err(err) => {
                tracing::error!("{} {}x{}: {}", format.pixel_format, format.width, format.height, err);
                *self.config.write() = Arc::new(previous.unresolved());
                Err(err)
            }
        }
    }

    fn configure_locked(
        &self,
        guard: &mut ContextGuard<'_, D, DeviceState<B>>,
        format: &FormatDescriptor,
        hw: HardwareState,
        is_new_input: bool,
        previous: &PlaneConfiguration,
    ) -> Result<PlaneConfiguration, ConfigError> {
        if format.is_big_endian() {
            return Err(ConfigError::UnsupportedFormat(format!("{} (BE)", format.pixel_format)));
        }
        if format.width == 0 || format.height == 0 {
            return Err(ConfigError::NoVideoStream);
        }

        let (decoder, device) = guard.split();
        let is_hdr = format.is_hdr();

        let mut stream = previous.stream;
        if is_new_input || stream.width == 0 {
            device.hdr.reset();
            stream = StreamState {
                is_hdr,
                aspect_ratio: format.aspect_ratio,
                width: format.width,
                height: format.height,
                timing: format.timing,
            };
        }
        stream.is_hdr = is_hdr;

        let mut settings = self.settings.read().clone();
        let hw = HardwareState {
            video_processor_failed: hw.video_processor_failed || self.video_processor_failed.load(Ordering::Acquire),
            ..hw
        };

        let mut processor = select_processor(&hw, &settings, is_hdr);
        if processor == VideoProcessorKind::Hardware {
            if let Err(err) = device
                .backend
                .configure_video_processor(&video_processor_color_space(format))
            {
                tracing::warn!("Video processor failed, using pixel shaders ({})", err);
                self.video_processor_failed.store(true, Ordering::Release);
                processor = VideoProcessorKind::Shader;
            }
        }

        if previous.processor.is_some_and(|p| p != processor) {
            decoder.dispose_frames();
            match processor {
                VideoProcessorKind::Hardware => settings.reset_filters_to_default(),
                VideoProcessorKind::Shader => settings.reset_filters_to_midpoint(),
            }
            *self.settings.write() = settings.clone();
        }

        let surface_format = decoder.surface_format();
        let plan = match processor {
            VideoProcessorKind::Hardware => Some(dispatch::video_processor(format, &hw, surface_format)),
            VideoProcessorKind::Shader if settings.force_software_conversion && !hw.accelerated => None,
            VideoProcessorKind::Shader => dispatch::classify(format, &hw, surface_format),
        };

        let plan = match plan.filter(|plan| Self::formats_supported(&device.backend, plan)) {
            Some(plan) => plan,
            None => {
                tracing::warn!("{} not supported. Falling back to software conversion", format.pixel_format);
                decoder.setup_conversion(format).map_err(|err| {
                    tracing::error!("Software conversion setup failed");
                    ConfigError::SoftwareFallbackFailed(err.to_string())
                })?;

                let fallback = dispatch::software_fallback(format);
                if !Self::formats_supported(&device.backend, &fallback) {
                    return Err(ConfigError::UnsupportedFormat(format.pixel_format.to_string()));
                }
                fallback
            }
        };

        device.constants.coefs_index = if is_hdr {
            0
        } else if format.color_space == ColorSpace::Bt709 {
            1
        } else {
            2
        };
        device.constants.full_range = i32::from(format.color_range == ColorRange::Full);
        device.constants.tex_width = plan.tex_width;
        if is_hdr {
            device.hdr.check = device.hdr.metadata.is_none();
            device
                .constants
                .update_hdr_to_sdr(device.hdr.metadata.as_ref(), settings.hdr_to_sdr_tone);
        } else {
            device.hdr.check = false;
        }

        Self::bind_plan_shader(device, &plan)?;
        device.apply_filters(&settings);

        match device.backend.render_target_size() {
            Some((width, height)) => device
                .backend
                .set_viewport(Viewport::fit(stream.aspect_ratio, width, height)),
            None => device.backend.prepare_for_extract(stream.width, stream.height)?,
        }

        Ok(PlaneConfiguration {
            case: plan.case,
            processor: Some(processor),
            planes: plan.planes,
            key: plan.key,
            stream,
            epoch: self.next_epoch(),
        })
    }

    /// Every texture the plan creates per frame must be supported
    fn formats_supported(backend: &B, plan: &DispatchPlan) -> bool {
        match plan
            .created_texture_formats()
            .into_iter()
            .find(|format| !backend.supports_format(*format))
        {
            Some(format) => {
                tracing::warn!("GPU does not support {:?} texture format", format);
                false
            }
            None => true,
        }
    }

    /// Bind the plan's shader, compiling it on a cache miss. The fully built
    /// key is compared against the bound one, so nothing is recompiled or
    /// rebound when it is unchanged.
    fn bind_plan_shader(device: &mut DeviceState<B>, plan: &DispatchPlan) -> Result<(), ConfigError> {
        let Some(source) = &plan.shader else {
            return Ok(());
        };
        if device.bound.as_ref() == Some(&plan.key) {
            return Ok(());
        }

        let shader = match device.shaders.get(&plan.key) {
            Some(shader) => shader,
            None => {
                tracing::debug!("Compiling pixel shader {} ({:?})", plan.key, source.defines.names());
                let shader = device.backend.compile_shader(&plan.key, source)?;
                device.shaders.insert(plan.key.clone(), shader.clone());
                shader
            }
        };

        device.backend.bind_shader(&shader);
        device.bound = Some(plan.key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuCall, RecordingBackend, TextureFormat};
    use crate::settings::{VideoProcessorPreference, VideoSettings};
    use crate::video::dispatch::DispatchCase;
    use crate::video::format::PixelFormat;
    use crate::video::testing::{StubDecoder, TestRenderer};

    fn renderer(backend: RecordingBackend) -> TestRenderer {
        VideoRenderer::new(StubDecoder::default(), backend)
    }

    fn format(pixel_format: PixelFormat) -> FormatDescriptor {
        FormatDescriptor::new(pixel_format, 1920, 1080).unwrap()
    }

    #[test]
    fn test_configure_twice_compiles_once() {
        let renderer = renderer(RecordingBackend::new());
        let nv12 = format(PixelFormat::Nv12);

        renderer.configure(&nv12, HardwareState::software(), true).unwrap();
        let first = renderer.configuration();
        renderer.configure(&nv12, HardwareState::software(), false).unwrap();
        let second = renderer.configuration();

        assert_eq!(first.case, DispatchCase::YuvSemiPlanar);
        assert_eq!(first.case, second.case);
        assert_eq!(first.key, second.key);
        assert!(second.epoch > first.epoch);

        renderer.with_device(|device| {
            assert_eq!(device.backend.shaders_compiled(), 1);
            let binds = device
                .backend
                .calls()
                .iter()
                .filter(|c| matches!(c, GpuCall::BindShader(_)))
                .count();
            assert_eq!(binds, 1);
        });
    }

    #[test]
    fn test_returning_to_cached_key_skips_compile() {
        let renderer = renderer(RecordingBackend::new());

        renderer.configure(&format(PixelFormat::Nv12), HardwareState::software(), true).unwrap();
        renderer.configure(&format(PixelFormat::Bgra), HardwareState::software(), true).unwrap();
        renderer.configure(&format(PixelFormat::Nv12), HardwareState::software(), true).unwrap();

        renderer.with_device(|device| {
            assert_eq!(device.backend.shaders_compiled(), 2);
            assert_eq!(device.cached_shaders(), 2);
        });
    }

    #[test]
    fn test_big_endian_rejected_before_gpu_work() {
        let renderer = renderer(RecordingBackend::new());
        let err = renderer
            .configure(&format(PixelFormat::P010Be), HardwareState::software(), true)
            .unwrap_err();

        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
        assert_eq!(renderer.dispatch_case(), DispatchCase::None);
        renderer.with_device(|device| assert!(device.backend.calls().is_empty()));
    }

    #[test]
    fn test_unsupported_texture_falls_back_to_software() {
        let renderer = renderer(RecordingBackend::new().without_format(TextureFormat::Rg16Unorm));
        renderer
            .configure(&format(PixelFormat::P010Le), HardwareState::software(), true)
            .unwrap();

        assert_eq!(renderer.dispatch_case(), DispatchCase::SoftwareFallback);
        assert_eq!(renderer.shader_key().as_str(), "11");
        renderer.with_decoder(|decoder| assert!(decoder.converted_format.is_some()));
    }

    #[test]
    fn test_software_fallback_setup_failure() {
        let decoder = StubDecoder {
            conversion_fails: true,
            ..StubDecoder::default()
        };
        let renderer = VideoRenderer::new(decoder, RecordingBackend::new());

        let err = renderer
            .configure(&format(PixelFormat::Rgb24), HardwareState::software(), true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SoftwareFallbackFailed(_)));
        assert_eq!(renderer.dispatch_case(), DispatchCase::None);
    }

    #[test]
    fn test_unsupported_texture_without_conversion_fails() {
        let decoder = StubDecoder {
            conversion_fails: true,
            ..StubDecoder::default()
        };
        let renderer = VideoRenderer::new(decoder, RecordingBackend::new().without_format(TextureFormat::Rg16Unorm));

        let err = renderer
            .configure(&format(PixelFormat::P010Le), HardwareState::software(), true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::SoftwareFallbackFailed(_)));
        assert_eq!(renderer.dispatch_case(), DispatchCase::None);
        renderer.with_device(|device| assert_eq!(device.backend.shaders_compiled(), 0));
    }

    #[test]
    fn test_failure_keeps_previous_layout_but_clears_case() {
        let decoder = StubDecoder {
            conversion_fails: true,
            ..StubDecoder::default()
        };
        let renderer = VideoRenderer::new(decoder, RecordingBackend::new());

        renderer.configure(&format(PixelFormat::Nv12), HardwareState::software(), true).unwrap();
        let good = renderer.configuration();
        assert!(renderer
            .configure(&format(PixelFormat::Gray8), HardwareState::software(), true)
            .is_err());

        let failed = renderer.configuration();
        assert_eq!(failed.case, DispatchCase::None);
        assert_eq!(failed.planes, good.planes);
        assert_eq!(failed.key, good.key);
    }

    #[test]
    fn test_forced_software_conversion() {
        let settings = VideoSettings {
            force_software_conversion: true,
            ..VideoSettings::default()
        };
        let renderer = VideoRenderer::with_settings(StubDecoder::default(), RecordingBackend::new(), settings);
        renderer.configure(&format(PixelFormat::Nv12), HardwareState::software(), true).unwrap();
        assert_eq!(renderer.dispatch_case(), DispatchCase::SoftwareFallback);
    }

    #[test]
    fn test_video_processor_failure_is_sticky() {
        let mut backend = RecordingBackend::new();
        let decoder = StubDecoder::with_pool(&mut backend, 1920, 1088);
        let renderer = VideoRenderer::new(decoder, backend);

        renderer
            .configure(&format(PixelFormat::Nv12), HardwareState::accelerated(false), true)
            .unwrap();
        assert!(renderer.video_processor_failed());
        assert_eq!(renderer.dispatch_case(), DispatchCase::Hardware);

        let config = renderer.configuration();
        assert_eq!(config.processor, Some(VideoProcessorKind::Shader));
    }

    #[test]
    fn test_video_processor_cases() {
        let mut backend = RecordingBackend::new().with_video_processor();
        let decoder = StubDecoder::with_pool(&mut backend, 1920, 1088);
        let renderer = VideoRenderer::new(decoder, backend);

        renderer
            .configure(&format(PixelFormat::Nv12), HardwareState::accelerated(true), true)
            .unwrap();
        assert_eq!(renderer.dispatch_case(), DispatchCase::VideoProcessorZeroCopy);
        assert!(renderer.shader_key().is_empty());

        renderer
            .configure(&format(PixelFormat::Nv12), HardwareState::accelerated(false), true)
            .unwrap();
        assert_eq!(renderer.dispatch_case(), DispatchCase::VideoProcessor);

        renderer.with_device(|device| {
            assert_eq!(device.backend.shaders_compiled(), 0);
            assert!(device.backend.calls().contains(&GpuCall::ConfigureVideoProcessor(
                VideoProcessorColorSpace {
                    rgb_range: 1,
                    ycbcr_matrix: 0,
                    nominal_range: 1,
                }
            )));
        });
    }

    #[test]
    fn test_mode_switch_disposes_frames_and_resets_filters() {
        let mut backend = RecordingBackend::new().with_video_processor();
        let decoder = StubDecoder::with_pool(&mut backend, 1920, 1088);
        let renderer = VideoRenderer::new(decoder, backend);
        let nv12 = format(PixelFormat::Nv12);

        renderer.configure(&nv12, HardwareState::accelerated(true), true).unwrap();
        renderer.with_decoder(|decoder| assert_eq!(decoder.disposed, 0));

        let mut settings = renderer.settings();
        settings.video_processor = VideoProcessorPreference::Shader;
        settings.brightness.value = 80;
        settings.contrast.value = 20;
        renderer.update_settings(settings);

        renderer.configure(&nv12, HardwareState::accelerated(true), false).unwrap();
        assert_eq!(renderer.dispatch_case(), DispatchCase::HardwareZeroCopy);
        renderer.with_decoder(|decoder| assert_eq!(decoder.disposed, 1));

        let settings = renderer.settings();
        assert_eq!(settings.brightness.value, 0);
        assert_eq!(settings.contrast.value, 100);
    }

    #[test]
    fn test_hdr_constants_and_key() {
        let renderer = renderer(RecordingBackend::new());
        let hdr = format(PixelFormat::P010Le).color_space(ColorSpace::Bt2020);
        renderer.configure(&hdr, HardwareState::software(), true).unwrap();

        assert_eq!(renderer.shader_key().as_str(), "h9xrg");
        renderer.with_device(|device| {
            let constants = device.backend.last_constants().unwrap();
            assert_eq!(constants.coefs_index, 0);
            assert_eq!(constants.luminance, 400.0);
            assert!(device.hdr.check);
        });
    }

    #[test]
    fn test_viewport_or_extract_target() {
        let onscreen = renderer(RecordingBackend::new().with_render_target(1000, 1000));
        onscreen.configure(&format(PixelFormat::Yuv420p), HardwareState::software(), true).unwrap();
        onscreen.with_device(|device| {
            assert!(device
                .backend
                .calls()
                .iter()
                .any(|c| matches!(c, GpuCall::SetViewport(vp) if vp.width == 1000.0 && (vp.height - 562.5).abs() < 0.01)));
        });

        let offscreen = renderer(RecordingBackend::new());
        offscreen.configure(&format(PixelFormat::Yuv420p), HardwareState::software(), true).unwrap();
        offscreen.with_device(|device| {
            assert!(device.backend.calls().contains(&GpuCall::PrepareForExtract {
                width: 1920,
                height: 1080
            }));
        });
    }

    #[test]
    fn test_packed_422_texel_width_constant() {
        let renderer = renderer(RecordingBackend::new());
        renderer.configure(&format(PixelFormat::Uyvy422), HardwareState::software(), true).unwrap();
        renderer.with_device(|device| {
            assert_eq!(device.constants().tex_width, 1.0 / 960.0);
            assert_eq!(device.constants().coefs_index, 2);
        });
    }
}
