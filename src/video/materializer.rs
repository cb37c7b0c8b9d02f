//! Per-frame upload
//!
//! `materialize` turns one decoder frame into a [`RenderableFrame`] using the
//! plane configuration of the current epoch. It branches only on the
//! dispatch case; the format is never inspected again.

use thiserror::Error;

use crate::gpu::{CopyRegion, GpuBackend, GpuError, TextureData};
use crate::video::context::ContextGuard;
use crate::video::decoder::DecoderContext;
use crate::video::dispatch::DispatchCase;
use crate::video::frame::{BufferRef, DecoderFrame, FrameData, RenderableFrame};
use crate::video::planes::PlaneLayout;
use crate::video::renderer::{DeviceState, PlaneConfiguration, VideoRenderer};

/// Errors that drop a single frame
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("Failed to create frame resources: {0}")]
    ResourceCreationFailed(#[from] GpuError),

    #[error("Failed to process frame ({0})")]
    TransientFrameError(String),

    #[error("No plane configuration")]
    NotConfigured,
}

impl<D, B> VideoRenderer<D, B>
where
    D: DecoderContext<B>,
    B: GpuBackend,
{
    /// Upload one decoded frame.
    ///
    /// The decoder buffer behind `frame` is released when this returns,
    /// unless the frame is zero-copy and the result keeps a hold on it.
    pub fn materialize(&self, frame: DecoderFrame) -> Result<RenderableFrame<B>, MaterializeError> {
        let mut guard = self.context.lock();
        self.materialize_locked(&mut guard, frame)
    }

    /// [`materialize`](Self::materialize) for callers already holding the
    /// context locks
    pub fn materialize_locked(
        &self,
        guard: &mut ContextGuard<'_, D, DeviceState<B>>,
        frame: DecoderFrame,
    ) -> Result<RenderableFrame<B>, MaterializeError> {
        let config = self.configuration();
        let result = self.fill_planes(guard, &config, &frame);
        if let Err(err) = &result {
            tracing::error!("Failed to process frame ({})", err);
        }
        result
    }

    fn fill_planes(
        &self,
        guard: &mut ContextGuard<'_, D, DeviceState<B>>,
        config: &PlaneConfiguration,
        frame: &DecoderFrame,
    ) -> Result<RenderableFrame<B>, MaterializeError> {
        if config.case == DispatchCase::None {
            return Err(MaterializeError::NotConfigured);
        }

        let (decoder, device) = guard.split();
        let mut out = RenderableFrame::new(config.stream.timing.ticks(frame.pts));
        tracing::trace!("Processing frame at {} ticks", out.timestamp);

        if let Some(metadata) = device.hdr.offer(frame.mastering_display()) {
            tracing::debug!("HDR mastering display peak {} cd/m²", metadata.max_luminance);
            let tone = self.settings.read().hdr_to_sdr_tone;
            device.constants.update_hdr_to_sdr(Some(&metadata), tone);
            device.backend.update_constants(&device.constants);
        }

        let backend = &mut device.backend;
        match config.case {
            DispatchCase::None => return Err(MaterializeError::NotConfigured),

            DispatchCase::VideoProcessorZeroCopy => {
                out.subresource = Some(surface_slice(frame)?);
                out.buffer = Some(retained_buffer(frame)?);
            }

            DispatchCase::VideoProcessor | DispatchCase::Hardware => {
                let slice = surface_slice(frame)?;
                let pool = decoder
                    .surface_pool()
                    .ok_or_else(|| MaterializeError::TransientFrameError("decoder has no surface pool".into()))?;
                let plane = config.planes.get(0).ok_or(MaterializeError::NotConfigured)?;

                // Sized to the logical frame, cropping the decoder's padding
                let texture = backend.create_texture(&plane.texture_desc(), None)?;
                backend.copy_region(
                    &texture,
                    pool,
                    CopyRegion {
                        src_slice: slice,
                        width: plane.width,
                        height: plane.height,
                    },
                )?;

                for desc in config.planes.iter().filter_map(|p| p.view_desc(0)) {
                    out.views.push(backend.create_view(&texture, &desc)?);
                }
                out.textures.push(texture);
            }

            DispatchCase::HardwareZeroCopy => {
                let slice = surface_slice(frame)?;
                let pool = decoder
                    .surface_pool()
                    .ok_or_else(|| MaterializeError::TransientFrameError("decoder has no surface pool".into()))?;

                for desc in config.planes.iter().filter_map(|p| p.view_desc(slice)) {
                    out.views.push(backend.create_view(pool, &desc)?);
                }
                out.buffer = Some(retained_buffer(frame)?);
            }

            DispatchCase::SoftwareFallback => {
                let converted = decoder
                    .convert(frame)
                    .map_err(|err| MaterializeError::TransientFrameError(err.to_string()))?;
                let plane = config.planes.get(0).ok_or(MaterializeError::NotConfigured)?;
                check_plane(0, plane, converted.stride, converted.data.len())?;

                let texture = backend.create_texture(
                    &plane.texture_desc(),
                    Some(TextureData {
                        bytes: &converted.data,
                        stride: converted.stride,
                    }),
                )?;
                if let Some(desc) = plane.view_desc(0) {
                    out.views.push(backend.create_view(&texture, &desc)?);
                }
                out.textures.push(texture);
            }

            DispatchCase::RgbPacked
            | DispatchCase::RgbPacked16
            | DispatchCase::RgbPlanar
            | DispatchCase::YuvPacked
            | DispatchCase::YuvSemiPlanar
            | DispatchCase::YuvPlanar => {
                let FrameData::Planes(planes) = &frame.data else {
                    return Err(MaterializeError::TransientFrameError(
                        "expected plane data for a software decoded frame".into(),
                    ));
                };

                for (index, plane) in config.planes.iter().enumerate() {
                    let data = planes.get(index).ok_or_else(|| {
                        MaterializeError::TransientFrameError(format!("frame is missing plane {index}"))
                    })?;
                    check_plane(index, plane, data.stride, data.data.len())?;

                    let texture = backend.create_texture(
                        &plane.texture_desc(),
                        Some(TextureData {
                            bytes: &data.data,
                            stride: data.stride,
                        }),
                    )?;
                    if let Some(desc) = plane.view_desc(0) {
                        out.views.push(backend.create_view(&texture, &desc)?);
                    }
                    out.textures.push(texture);
                }
            }
        }

        Ok(out)
    }
}

/// Rows must hold a full texel row and the buffer every row
fn check_plane(index: usize, plane: &PlaneLayout, stride: u32, len: usize) -> Result<(), MaterializeError> {
    let row = plane.texture_format.row_bytes(plane.width);
    if u64::from(stride) < row {
        return Err(MaterializeError::TransientFrameError(format!(
            "plane {index} stride {stride} is shorter than its {row} byte rows"
        )));
    }

    let needed = u64::from(stride) * u64::from(plane.height);
    if (len as u64) < needed {
        return Err(MaterializeError::TransientFrameError(format!(
            "plane {index} has {len} bytes, expected {needed}"
        )));
    }
    Ok(())
}

fn surface_slice(frame: &DecoderFrame) -> Result<u32, MaterializeError> {
    match frame.data {
        FrameData::Surface { array_slice } => Ok(array_slice),
        FrameData::Planes(_) => Err(MaterializeError::TransientFrameError(
            "expected a hardware surface frame".into(),
        )),
    }
}

fn retained_buffer(frame: &DecoderFrame) -> Result<BufferRef, MaterializeError> {
    frame
        .buffer
        .clone()
        .ok_or_else(|| MaterializeError::TransientFrameError("zero-copy frame without a decoder buffer".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::gpu::{GpuCall, RecordingBackend, TextureFormat, ViewShape};
    use crate::video::format::{ColorSpace, FormatDescriptor, PixelFormat, StreamTiming};
    use crate::video::frame::SideData;
    use crate::video::hardware::HardwareState;
    use crate::video::hdr::HdrMetadata;
    use crate::video::testing::{planes_for, StubDecoder, TestRenderer};

    fn configured(pixel_format: PixelFormat) -> TestRenderer {
        let renderer = VideoRenderer::new(StubDecoder::default(), RecordingBackend::new());
        let format = FormatDescriptor::new(pixel_format, 1920, 1080).unwrap();
        renderer.configure(&format, HardwareState::software(), true).unwrap();
        renderer
    }

    fn hardware(zero_copy: bool, video_processor: bool) -> TestRenderer {
        let mut backend = RecordingBackend::new();
        if video_processor {
            backend = backend.with_video_processor();
        }
        let decoder = StubDecoder::with_pool(&mut backend, 1920, 1088);
        let renderer = VideoRenderer::new(decoder, backend);
        let format = FormatDescriptor::new(PixelFormat::Nv12, 1920, 1080).unwrap();
        renderer
            .configure(&format, HardwareState::accelerated(zero_copy), true)
            .unwrap();
        renderer.with_device(|device| device.backend.clear());
        renderer
    }

    fn counted_buffer() -> (BufferRef, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let buffer = BufferRef::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (buffer, released)
    }

    #[test]
    fn test_plane_count_matches_layout() {
        for pixel_format in [
            PixelFormat::Bgra,
            PixelFormat::Rgb444Le,
            PixelFormat::Gbrap10Le,
            PixelFormat::Yuyv422,
            PixelFormat::Nv12,
            PixelFormat::Yuv420p,
            PixelFormat::Yuva444p10Le,
        ] {
            let renderer = configured(pixel_format.clone());
            let expected = renderer.configuration().planes.len();
            let frame = renderer.materialize(planes_for(&renderer, 0)).unwrap();
            assert_eq!(frame.textures.len(), expected, "{pixel_format}");
            assert_eq!(frame.views.len(), expected, "{pixel_format}");
        }
    }

    #[test]
    fn test_software_fallback_uploads_converted_frame() {
        let renderer = configured(PixelFormat::Rgb24);
        assert_eq!(renderer.dispatch_case(), DispatchCase::SoftwareFallback);

        let frame = renderer.materialize(DecoderFrame::planes(0, Vec::new())).unwrap();
        assert_eq!(frame.textures.len(), 1);
        assert_eq!(frame.textures[0].desc.format, TextureFormat::Rgba8Unorm);
        renderer.with_decoder(|decoder| assert_eq!(decoder.conversions, 1));
    }

    #[test]
    fn test_zero_copy_allocates_nothing_and_holds_buffer() {
        let renderer = hardware(true, false);
        let (buffer, released) = counted_buffer();

        let frame = renderer.materialize(DecoderFrame::surface(0, 5, buffer)).unwrap();
        assert!(frame.textures.is_empty());
        assert_eq!(frame.views.len(), 2);
        assert_eq!(frame.views[0].desc.shape, ViewShape::D2Array { first_slice: 5 });
        assert_eq!(released.load(Ordering::SeqCst), 0);

        renderer.with_device(|device| assert_eq!(device.backend.textures_created(), 0));

        frame.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hardware_copy_crops_to_logical_size() {
        let renderer = hardware(false, false);
        let (buffer, released) = counted_buffer();

        let frame = renderer.materialize(DecoderFrame::surface(0, 3, buffer)).unwrap();
        assert_eq!(frame.textures.len(), 1);
        assert_eq!(frame.views.len(), 2);
        assert!(frame.buffer.is_none());
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let texture = &frame.textures[0];
        assert_eq!((texture.desc.width, texture.desc.height), (1920, 1080));
        renderer.with_device(|device| {
            assert_eq!(device.backend.textures_created(), 1);
            assert!(device.backend.calls().iter().any(|c| matches!(
                c,
                GpuCall::Copy { region, .. } if region.src_slice == 3 && region.height == 1080
            )));
        });
    }

    #[test]
    fn test_video_processor_frames() {
        let renderer = hardware(true, true);
        let (buffer, _) = counted_buffer();
        let frame = renderer.materialize(DecoderFrame::surface(0, 2, buffer)).unwrap();
        assert_eq!(frame.subresource, Some(2));
        assert!(frame.textures.is_empty() && frame.views.is_empty());
        assert!(frame.is_zero_copy());

        let renderer = hardware(false, true);
        let (buffer, _) = counted_buffer();
        let frame = renderer.materialize(DecoderFrame::surface(0, 2, buffer)).unwrap();
        assert_eq!(frame.textures.len(), 1);
        assert!(frame.textures[0].desc.usage.render_target);
        assert!(frame.views.is_empty());
    }

    #[test]
    fn test_hdr_metadata_captured_once_per_epoch() {
        let renderer = VideoRenderer::new(StubDecoder::default(), RecordingBackend::new());
        let format = FormatDescriptor::new(PixelFormat::P010Le, 1920, 1080)
            .unwrap()
            .color_space(ColorSpace::Bt2020);
        renderer.configure(&format, HardwareState::software(), true).unwrap();

        let first = HdrMetadata::bt2020(1000.0, 0.005);
        let second = HdrMetadata::bt2020(4000.0, 0.005);

        let frame = planes_for(&renderer, 0).with_side_data(SideData::MasteringDisplay(first));
        renderer.materialize(frame).unwrap();
        let frame = planes_for(&renderer, 1).with_side_data(SideData::MasteringDisplay(second));
        renderer.materialize(frame).unwrap();

        assert_eq!(renderer.hdr_metadata(), Some(first));
        renderer.with_device(|device| {
            assert_eq!(device.constants().luminance, 1000.0);
            let pushes = device
                .backend
                .calls()
                .iter()
                .filter(|c| matches!(c, GpuCall::UpdateConstants(c) if c.luminance == 1000.0))
                .count();
            assert_eq!(pushes, 1);
        });

        // A new input starts a fresh scan
        renderer.configure(&format, HardwareState::software(), true).unwrap();
        assert!(renderer.hdr_metadata().is_none());
        let frame = planes_for(&renderer, 2).with_side_data(SideData::MasteringDisplay(second));
        renderer.materialize(frame).unwrap();
        assert_eq!(renderer.hdr_metadata(), Some(second));
    }

    #[test]
    fn test_timestamp_in_ticks() {
        let renderer = VideoRenderer::new(StubDecoder::default(), RecordingBackend::new());
        let format = FormatDescriptor::new(PixelFormat::Yuv420p, 64, 64)
            .unwrap()
            .timing(StreamTiming {
                time_base: 1.0 / 25.0,
                start_time: 10_000_000,
            });
        renderer.configure(&format, HardwareState::software(), true).unwrap();

        let frame = renderer.materialize(planes_for(&renderer, 50)).unwrap();
        assert_eq!(frame.timestamp, 10_000_000);
    }

    #[test]
    fn test_failed_frame_keeps_presented_frame() {
        let renderer = configured(PixelFormat::Nv12);
        let frame = renderer.materialize(planes_for(&renderer, 0)).unwrap();
        let timestamp = frame.timestamp;
        assert!(renderer.present(frame).is_none());

        renderer.with_device(|device| device.backend.set_fail_textures(true));
        let err = renderer.materialize(planes_for(&renderer, 1)).unwrap_err();
        assert!(matches!(err, MaterializeError::ResourceCreationFailed(_)));
        assert_eq!(renderer.presented_timestamp(), Some(timestamp));

        renderer.with_device(|device| device.backend.set_fail_textures(false));
        let next = renderer.materialize(planes_for(&renderer, 2)).unwrap();
        assert!(renderer.present(next).is_some());
    }

    #[test]
    fn test_short_plane_is_transient_error() {
        let renderer = configured(PixelFormat::Nv12);
        let frame = DecoderFrame::planes(
            0,
            vec![
                crate::video::frame::PlaneData::new(vec![0u8; 16], 1920),
                crate::video::frame::PlaneData::new(vec![0u8; 16], 1920),
            ],
        );
        assert!(matches!(
            renderer.materialize(frame),
            Err(MaterializeError::TransientFrameError(_))
        ));
    }

    #[test]
    fn test_stride_shorter_than_row_is_rejected() {
        let renderer = VideoRenderer::new(StubDecoder::default(), RecordingBackend::new());
        let format = FormatDescriptor::new(PixelFormat::Bgra, 64, 4).unwrap();
        renderer.configure(&format, HardwareState::software(), true).unwrap();
        renderer.with_device(|device| device.backend.clear());

        // 16-byte rows for a 256-byte row of BGRA, with enough total bytes
        let frame = DecoderFrame::planes(0, vec![crate::video::frame::PlaneData::new(vec![0u8; 1024], 16)]);
        assert!(matches!(
            renderer.materialize(frame),
            Err(MaterializeError::TransientFrameError(_))
        ));
        renderer.with_device(|device| assert_eq!(device.backend.textures_created(), 0));
    }

    #[test]
    fn test_odd_width_packed_422_needs_rounded_stride() {
        let renderer = VideoRenderer::new(StubDecoder::default(), RecordingBackend::new());
        let format = FormatDescriptor::new(PixelFormat::Yuyv422, 1921, 2).unwrap();
        renderer.configure(&format, HardwareState::software(), true).unwrap();

        let tight = DecoderFrame::planes(0, vec![crate::video::frame::PlaneData::new(vec![0u8; 3842 * 2], 3842)]);
        assert!(matches!(
            renderer.materialize(tight),
            Err(MaterializeError::TransientFrameError(_))
        ));

        let padded = DecoderFrame::planes(1, vec![crate::video::frame::PlaneData::new(vec![0u8; 3844 * 2], 3844)]);
        assert_eq!(renderer.materialize(padded).unwrap().textures.len(), 1);
    }

    #[test]
    fn test_unconfigured_renderer() {
        let renderer: TestRenderer = VideoRenderer::new(StubDecoder::default(), RecordingBackend::new());
        assert!(matches!(
            renderer.materialize(DecoderFrame::planes(0, Vec::new())),
            Err(MaterializeError::NotConfigured)
        ));
    }
}
