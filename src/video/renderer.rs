//! Video renderer state
//!
//! [`VideoRenderer`] owns the shared decoder/device context, the current
//! [`PlaneConfiguration`] snapshot and the presentation slot. Configuration
//! lives in `configurator.rs` and per-frame work in `materializer.rs`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::gpu::GpuBackend;
use crate::settings::VideoSettings;
use crate::video::context::{ContextGuard, SharedContext};
use crate::video::decoder::DecoderContext;
use crate::video::dispatch::DispatchCase;
use crate::video::format::StreamTiming;
use crate::video::frame::RenderableFrame;
use crate::video::hardware::VideoProcessorKind;
use crate::video::hdr::{HdrCapture, HdrMetadata, ShaderConstants};
use crate::video::planes::PlaneSet;
use crate::video::shader::{ShaderCache, ShaderKey};

/// Per-input stream state, refreshed when a new input is configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamState {
    pub is_hdr: bool,
    pub aspect_ratio: f32,
    /// Logical video rectangle
    pub width: u32,
    pub height: u32,
    pub timing: StreamTiming,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            is_hdr: false,
            aspect_ratio: 16.0 / 9.0,
            width: 0,
            height: 0,
            timing: StreamTiming::default(),
        }
    }
}

/// Everything one configuration epoch fixes.
///
/// Built completely by `configure` and swapped in as a whole; the
/// materializer only ever reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneConfiguration {
    pub case: DispatchCase,
    pub processor: Option<VideoProcessorKind>,
    pub planes: PlaneSet,
    pub key: ShaderKey,
    pub stream: StreamState,
    pub epoch: u64,
}

impl PlaneConfiguration {
    /// Configuration before anything has been resolved
    pub fn empty() -> Self {
        Self {
            case: DispatchCase::None,
            processor: None,
            planes: PlaneSet::new(),
            key: ShaderKey::default(),
            stream: StreamState::default(),
            epoch: 0,
        }
    }

    /// Same configuration with the dispatch case cleared, left behind by a
    /// failed configure
    pub fn unresolved(&self) -> Self {
        Self {
            case: DispatchCase::None,
            ..self.clone()
        }
    }
}

/// GPU-side state guarded by the device lock
pub struct DeviceState<B: GpuBackend> {
    pub backend: B,
    pub(crate) shaders: ShaderCache<B::Shader>,
    /// Key of the shader currently bound on the device
    pub(crate) bound: Option<ShaderKey>,
    pub(crate) constants: ShaderConstants,
    pub(crate) hdr: HdrCapture,
}

impl<B: GpuBackend> DeviceState<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            shaders: ShaderCache::default(),
            bound: None,
            constants: ShaderConstants::default(),
            hdr: HdrCapture::default(),
        }
    }

    pub fn constants(&self) -> &ShaderConstants {
        &self.constants
    }

    pub fn cached_shaders(&self) -> usize {
        self.shaders.len()
    }

    /// Copy filter values into the constants and upload them
    pub(crate) fn apply_filters(&mut self, settings: &VideoSettings) {
        self.constants.brightness = settings.brightness.normalized();
        self.constants.contrast = settings.contrast.normalized();
        self.backend.update_constants(&self.constants);
    }
}

/// Turns decoder output into renderable frames on a shared GPU device
pub struct VideoRenderer<D, B: GpuBackend> {
    pub(crate) context: SharedContext<D, DeviceState<B>>,
    pub(crate) config: RwLock<Arc<PlaneConfiguration>>,
    pub(crate) settings: RwLock<VideoSettings>,
    pub(crate) presented: Mutex<Option<RenderableFrame<B>>>,
    /// Set once the fixed-function processor fails on this device
    pub(crate) video_processor_failed: AtomicBool,
    pub(crate) epochs: AtomicU64,
}

impl<D, B> VideoRenderer<D, B>
where
    D: DecoderContext<B>,
    B: GpuBackend,
{
    pub fn new(decoder: D, backend: B) -> Self {
        Self::with_settings(decoder, backend, VideoSettings::default())
    }

    pub fn with_settings(decoder: D, backend: B, settings: VideoSettings) -> Self {
        Self {
            context: SharedContext::new(decoder, DeviceState::new(backend)),
            config: RwLock::new(Arc::new(PlaneConfiguration::empty())),
            settings: RwLock::new(settings),
            presented: Mutex::new(None),
            video_processor_failed: AtomicBool::new(false),
            epochs: AtomicU64::new(0),
        }
    }

    /// Current configuration snapshot
    pub fn configuration(&self) -> Arc<PlaneConfiguration> {
        self.config.read().clone()
    }

    pub fn dispatch_case(&self) -> DispatchCase {
        self.config.read().case
    }

    pub fn shader_key(&self) -> ShaderKey {
        self.config.read().key.clone()
    }

    pub fn settings(&self) -> VideoSettings {
        self.settings.read().clone()
    }

    /// Replace the settings; filter changes reach the shaders immediately,
    /// processor changes on the next configure
    pub fn update_settings(&self, settings: VideoSettings) {
        let mut guard = self.context.lock();
        guard.device().apply_filters(&settings);
        *self.settings.write() = settings;
    }

    pub fn video_processor_failed(&self) -> bool {
        self.video_processor_failed.load(Ordering::Acquire)
    }

    /// HDR metadata captured in the current epoch
    pub fn hdr_metadata(&self) -> Option<HdrMetadata> {
        self.context.lock().device().hdr.metadata
    }

    /// Forget captured HDR metadata and scan frames again
    pub fn reset_hdr_capture(&self) {
        let is_hdr = self.config.read().stream.is_hdr;
        let mut guard = self.context.lock();
        let device = guard.device();
        device.hdr.reset();
        device.hdr.check = is_hdr;
    }

    /// Store the newest frame for presentation and hand back the one it
    /// replaces
    pub fn present(&self, frame: RenderableFrame<B>) -> Option<RenderableFrame<B>> {
        self.presented.lock().replace(frame)
    }

    /// Timestamp of the frame on screen
    pub fn presented_timestamp(&self) -> Option<i64> {
        self.presented.lock().as_ref().map(|f| f.timestamp)
    }

    pub fn take_presented(&self) -> Option<RenderableFrame<B>> {
        self.presented.lock().take()
    }

    /// Take the decoder lock, then the device lock.
    ///
    /// For delivery threads that already coordinate with the decoder and
    /// call [`materialize_locked`](Self::materialize_locked) repeatedly.
    pub fn lock(&self) -> ContextGuard<'_, D, DeviceState<B>> {
        self.context.lock()
    }

    /// Run `f` with the device lock held (taken after the decoder lock)
    pub fn with_device<R>(&self, f: impl FnOnce(&mut DeviceState<B>) -> R) -> R {
        let mut guard = self.context.lock();
        f(guard.device())
    }

    /// Run `f` with the decoder lock held
    pub fn with_decoder<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut guard = self.context.lock_decoder();
        f(guard.decoder())
    }

    pub(crate) fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::AcqRel) + 1
    }
}
