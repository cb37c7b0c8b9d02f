//! Per-plane texture and view layouts
//!
//! A [`PlaneSet`] holds up to four [`PlaneLayout`] slots, one per possible
//! plane of the source format. The configurator fills it once per
//! configuration epoch and the materializer reads it for every frame.

use crate::gpu::{PlaneAspect, TextureDesc, TextureFormat, TextureUsage, ViewDesc, ViewShape};

/// Maximum number of planes a frame can carry
pub const MAX_PLANES: usize = 4;

/// Dimension of a plane's shader-resource view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDimension {
    Texture2D,
    /// Slice of an array texture; the slice index comes with each frame
    Texture2DArray,
}

/// How a plane is sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneView {
    pub format: TextureFormat,
    pub dimension: ViewDimension,
    pub aspect: PlaneAspect,
}

/// Texture and view shape for one plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
    /// Storage format of the texture backing this plane
    pub texture_format: TextureFormat,
    pub usage: TextureUsage,
    /// `None` when the plane is consumed without a shader-resource view
    pub view: Option<PlaneView>,
}

impl PlaneLayout {
    /// Plane whose texture and view share one format
    pub fn sampled(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            texture_format: format,
            usage: TextureUsage::SHADER_RESOURCE,
            view: Some(PlaneView {
                format,
                dimension: ViewDimension::Texture2D,
                aspect: PlaneAspect::All,
            }),
        }
    }

    /// Plane stored in one format and sampled through another
    pub fn reinterpreted(width: u32, height: u32, texture_format: TextureFormat, view_format: TextureFormat) -> Self {
        Self {
            view: Some(PlaneView {
                format: view_format,
                dimension: ViewDimension::Texture2D,
                aspect: PlaneAspect::All,
            }),
            ..Self::sampled(width, height, texture_format)
        }
    }

    pub fn texture_desc(&self) -> TextureDesc {
        TextureDesc {
            width: self.width,
            height: self.height,
            format: self.texture_format,
            usage: self.usage,
        }
    }

    /// View descriptor for a frame; `slice` selects the array slice for
    /// array-sliced views and is ignored otherwise
    pub fn view_desc(&self, slice: u32) -> Option<ViewDesc> {
        self.view.map(|view| ViewDesc {
            format: view.format,
            shape: match view.dimension {
                ViewDimension::Texture2D => ViewShape::D2,
                ViewDimension::Texture2DArray => ViewShape::D2Array { first_slice: slice },
            },
            aspect: view.aspect,
        })
    }
}

/// Up to four plane layouts, filled from slot 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneSet {
    slots: [Option<PlaneLayout>; MAX_PLANES],
}

impl PlaneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_planes(planes: &[PlaneLayout]) -> Self {
        let mut set = Self::new();
        for (slot, plane) in set.slots.iter_mut().zip(planes) {
            *slot = Some(*plane);
        }
        set
    }

    pub fn push(&mut self, plane: PlaneLayout) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            *slot = Some(plane);
        }
    }

    pub fn get(&self, index: usize) -> Option<&PlaneLayout> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaneLayout> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots[0].is_none()
    }

    /// Mark every plane's view as array-sliced
    pub fn with_array_views(mut self) -> Self {
        for plane in self.slots.iter_mut().flatten() {
            if let Some(view) = plane.view.as_mut() {
                view.dimension = ViewDimension::Texture2DArray;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_fills_in_order() {
        let mut set = PlaneSet::new();
        assert!(set.is_empty());
        set.push(PlaneLayout::sampled(64, 32, TextureFormat::R8Unorm));
        set.push(PlaneLayout::sampled(32, 16, TextureFormat::Rg8Unorm));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().width, 32);
        assert!(set.get(2).is_none());
    }

    #[test]
    fn test_array_view_takes_frame_slice() {
        let set = PlaneSet::from_planes(&[PlaneLayout::reinterpreted(
            64,
            64,
            TextureFormat::Nv12,
            TextureFormat::R8Unorm,
        )])
        .with_array_views();

        let desc = set.get(0).unwrap().view_desc(7).unwrap();
        assert_eq!(desc.shape, ViewShape::D2Array { first_slice: 7 });
        assert_eq!(desc.format, TextureFormat::R8Unorm);
    }
}
