//! Decoder frames in, renderable frames out
//!
//! A [`DecoderFrame`] is what the decoder hands over for one picture: plane
//! bytes with their strides, or an index into the decoder's hardware surface
//! pool. A [`RenderableFrame`] is what the presentation stage draws: GPU
//! textures and views plus the timestamp.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::gpu::GpuBackend;
use crate::video::hdr::HdrMetadata;

/// One plane of a software decoded frame
#[derive(Debug, Clone)]
pub struct PlaneData {
    pub data: Bytes,
    /// Bytes per row, including decoder padding
    pub stride: u32,
}

impl PlaneData {
    pub fn new(data: impl Into<Bytes>, stride: u32) -> Self {
        Self {
            data: data.into(),
            stride,
        }
    }
}

/// Pixel payload of a decoder frame
#[derive(Debug, Clone)]
pub enum FrameData {
    /// CPU-side planes in plane order
    Planes(Vec<PlaneData>),
    /// Slice of the decoder's hardware surface pool
    Surface { array_slice: u32 },
}

/// Side-channel data attached to a frame
#[derive(Debug, Clone, PartialEq)]
pub enum SideData {
    MasteringDisplay(HdrMetadata),
    ContentLight { max_content: u32, max_average: u32 },
    Other(String),
}

/// A frame as produced by the decoder
#[derive(Debug)]
pub struct DecoderFrame {
    /// Presentation timestamp in stream time-base units
    pub pts: i64,
    pub data: FrameData,
    pub side_data: Vec<SideData>,
    /// Hold on the decoder buffer backing `data`
    pub buffer: Option<BufferRef>,
}

impl DecoderFrame {
    pub fn planes(pts: i64, planes: Vec<PlaneData>) -> Self {
        Self {
            pts,
            data: FrameData::Planes(planes),
            side_data: Vec::new(),
            buffer: None,
        }
    }

    pub fn surface(pts: i64, array_slice: u32, buffer: BufferRef) -> Self {
        Self {
            pts,
            data: FrameData::Surface { array_slice },
            side_data: Vec::new(),
            buffer: Some(buffer),
        }
    }

    pub fn with_side_data(mut self, side_data: SideData) -> Self {
        self.side_data.push(side_data);
        self
    }

    /// Mastering display metadata, if the frame carries any
    pub fn mastering_display(&self) -> Option<&HdrMetadata> {
        self.side_data.iter().find_map(|sd| match sd {
            SideData::MasteringDisplay(metadata) => Some(metadata),
            _ => None,
        })
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

struct BufferHold {
    release: Mutex<Option<ReleaseHook>>,
}

impl Drop for BufferHold {
    fn drop(&mut self) {
        if let Some(release) = self.release.get_mut().take() {
            release();
        }
    }
}

/// Shared hold on decoder-owned memory.
///
/// The decoder may recycle the buffer only after the last clone is dropped,
/// at which point the release hook runs once.
#[derive(Clone)]
pub struct BufferRef(Arc<BufferHold>);

impl BufferRef {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Arc::new(BufferHold {
            release: Mutex::new(Some(Box::new(release))),
        }))
    }

    /// Number of live holders, including this one
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferRef").field("holders", &self.holders()).finish()
    }
}

/// A frame ready for presentation
pub struct RenderableFrame<B: GpuBackend> {
    /// Textures owned by this frame (empty for zero-copy cases)
    pub textures: Vec<B::Texture>,
    pub views: Vec<B::View>,
    /// Presentation time in 100-ns ticks
    pub timestamp: i64,
    /// Array slice of the decoder surface for the zero-copy video processor
    pub subresource: Option<u32>,
    /// Keeps decoder memory alive while this frame may still be drawn
    pub buffer: Option<BufferRef>,
}

impl<B: GpuBackend> RenderableFrame<B> {
    pub fn new(timestamp: i64) -> Self {
        Self {
            textures: Vec::new(),
            views: Vec::new(),
            timestamp,
            subresource: None,
            buffer: None,
        }
    }

    pub fn is_zero_copy(&self) -> bool {
        self.buffer.is_some()
    }

    /// Release the frame's GPU resources and its decoder hold
    pub fn release(self) {
        tracing::trace!("Releasing frame at {}", self.timestamp);
    }
}

impl<B: GpuBackend> fmt::Debug for RenderableFrame<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderableFrame")
            .field("textures", &self.textures.len())
            .field("views", &self.views.len())
            .field("timestamp", &self.timestamp)
            .field("subresource", &self.subresource)
            .field("buffer", &self.buffer)
            .finish()
    }
}
