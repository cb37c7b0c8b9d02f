//! HDR metadata and pixel-shader constants

/// Mastering display colour volume carried in frame side data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HdrMetadata {
    /// CIE 1931 xy chromaticity of the R, G, B primaries
    pub display_primaries: [[f32; 2]; 3],
    pub white_point: [f32; 2],
    /// Peak luminance in cd/m²
    pub max_luminance: f32,
    /// Black level in cd/m²
    pub min_luminance: f32,
}

impl HdrMetadata {
    /// BT.2020 primaries with a D65 white point
    pub fn bt2020(max_luminance: f32, min_luminance: f32) -> Self {
        Self {
            display_primaries: [[0.708, 0.292], [0.170, 0.797], [0.131, 0.046]],
            white_point: [0.3127, 0.3290],
            max_luminance,
            min_luminance,
        }
    }
}

/// Peak luminance assumed until mastering metadata arrives
pub const DEFAULT_HDR_LUMINANCE: f32 = 400.0;

/// Uniform block shared by every generated pixel shader.
///
/// Matches the `VideoConstants` struct in the WGSL prelude.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShaderConstants {
    /// YUV matrix: 0 = BT.2020, 1 = BT.709, 2 = BT.601
    pub coefs_index: i32,
    /// 0.5 = neutral
    pub brightness: f32,
    /// 0.5 = neutral
    pub contrast: f32,
    /// Texel width of packed 4:2:2 textures, 1 / (width / 2)
    pub tex_width: f32,
    /// Mastering peak luminance in cd/m²
    pub luminance: f32,
    pub tone_p1: f32,
    pub tone_p2: f32,
    /// 1 when samples use the full 0-255 range
    pub full_range: i32,
}

impl Default for ShaderConstants {
    fn default() -> Self {
        let mut constants = Self {
            coefs_index: 1,
            brightness: 0.5,
            contrast: 0.5,
            tex_width: 0.0,
            luminance: DEFAULT_HDR_LUMINANCE,
            tone_p1: 0.0,
            tone_p2: 0.0,
            full_range: 0,
        };
        constants.update_hdr_to_sdr(None, 1.4);
        constants
    }
}

impl ShaderConstants {
    /// Refresh the tone-mapping constants from mastering metadata
    pub fn update_hdr_to_sdr(&mut self, metadata: Option<&HdrMetadata>, tone: f32) {
        let luminance = metadata
            .map(|m| m.max_luminance)
            .filter(|l| *l > 0.0)
            .unwrap_or(DEFAULT_HDR_LUMINANCE);
        let tone = if tone > 0.0 { tone } else { 1.0 };

        self.luminance = luminance;
        self.tone_p1 = 10000.0 / luminance * (2.0 / tone);
        self.tone_p2 = luminance / (100.0 * tone);
    }
}

/// Side-data scan state for one configuration epoch
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HdrCapture {
    /// Frames should still be scanned for mastering metadata
    pub check: bool,
    pub metadata: Option<HdrMetadata>,
}

impl HdrCapture {
    /// Forget captured metadata; called for every new input
    pub fn reset(&mut self) {
        self.check = false;
        self.metadata = None;
    }

    /// Record metadata if this epoch is still waiting for it.
    ///
    /// Returns the captured metadata the first time only.
    pub fn offer(&mut self, metadata: Option<&HdrMetadata>) -> Option<HdrMetadata> {
        if !self.check || self.metadata.is_some() {
            return None;
        }

        let metadata = *metadata?;
        self.check = false;
        self.metadata = Some(metadata);
        Some(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_layout() {
        assert_eq!(std::mem::size_of::<ShaderConstants>(), 32);
    }

    #[test]
    fn test_tone_constants_from_metadata() {
        let mut constants = ShaderConstants::default();
        constants.update_hdr_to_sdr(Some(&HdrMetadata::bt2020(1000.0, 0.005)), 2.0);
        assert_eq!(constants.luminance, 1000.0);
        assert_eq!(constants.tone_p1, 10.0);
        assert_eq!(constants.tone_p2, 5.0);
    }

    #[test]
    fn test_tone_constants_default_luminance() {
        let mut constants = ShaderConstants::default();
        constants.update_hdr_to_sdr(None, 1.0);
        assert_eq!(constants.luminance, DEFAULT_HDR_LUMINANCE);
        assert_eq!(constants.tone_p1, 50.0);
        assert_eq!(constants.tone_p2, 4.0);
    }

    #[test]
    fn test_capture_only_once() {
        let mut capture = HdrCapture {
            check: true,
            metadata: None,
        };
        let first = HdrMetadata::bt2020(1000.0, 0.01);
        let second = HdrMetadata::bt2020(4000.0, 0.01);

        assert!(capture.offer(None).is_none());
        assert_eq!(capture.offer(Some(&first)), Some(first));
        assert!(capture.offer(Some(&second)).is_none());
        assert_eq!(capture.metadata, Some(first));

        capture.reset();
        assert!(capture.metadata.is_none());
    }
}
