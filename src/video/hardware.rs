//! Hardware decode state and video-processor selection

use crate::settings::{VideoProcessorPreference, VideoSettings};

/// What the decoder reports about hardware acceleration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HardwareState {
    /// Frames are GPU-resident decoder surfaces
    pub accelerated: bool,
    /// Surfaces can be sampled in place (views over the decoder's array texture)
    pub zero_copy: bool,
    /// The fixed-function video processor failed earlier for this device
    pub video_processor_failed: bool,
}

impl HardwareState {
    pub fn software() -> Self {
        Self::default()
    }

    pub fn accelerated(zero_copy: bool) -> Self {
        Self {
            accelerated: true,
            zero_copy,
            video_processor_failed: false,
        }
    }
}

/// Which stage turns decoded frames into RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoProcessorKind {
    /// Fixed-function GPU video processor
    Hardware,
    /// Pixel shaders generated by this crate
    Shader,
}

/// Pick the processor for a stream.
///
/// The hardware processor is preferred; the shader path is used when the
/// input is not hardware decoded, the processor failed before, the user
/// asked for shaders, or the content is HDR without deinterlacing (only the
/// shader path tone-maps).
pub fn select_processor(hw: &HardwareState, settings: &VideoSettings, is_hdr: bool) -> VideoProcessorKind {
    let shader = !hw.accelerated
        || hw.video_processor_failed
        || settings.video_processor == VideoProcessorPreference::Shader
        || (settings.video_processor == VideoProcessorPreference::Auto && is_hdr && !settings.deinterlace);

    if shader {
        VideoProcessorKind::Shader
    } else {
        VideoProcessorKind::Hardware
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_decode_uses_shaders() {
        let settings = VideoSettings::default();
        assert_eq!(
            select_processor(&HardwareState::software(), &settings, false),
            VideoProcessorKind::Shader
        );
    }

    #[test]
    fn test_accelerated_prefers_hardware() {
        let settings = VideoSettings::default();
        assert_eq!(
            select_processor(&HardwareState::accelerated(true), &settings, false),
            VideoProcessorKind::Hardware
        );
    }

    #[test]
    fn test_hdr_without_deinterlace_uses_shaders() {
        let mut settings = VideoSettings::default();
        let hw = HardwareState::accelerated(false);
        assert_eq!(select_processor(&hw, &settings, true), VideoProcessorKind::Shader);

        settings.deinterlace = true;
        assert_eq!(select_processor(&hw, &settings, true), VideoProcessorKind::Hardware);
    }

    #[test]
    fn test_failed_processor_and_user_choice() {
        let settings = VideoSettings::default();
        let hw = HardwareState {
            video_processor_failed: true,
            ..HardwareState::accelerated(true)
        };
        assert_eq!(select_processor(&hw, &settings, false), VideoProcessorKind::Shader);

        let settings = VideoSettings {
            video_processor: VideoProcessorPreference::Shader,
            ..VideoSettings::default()
        };
        assert_eq!(
            select_processor(&HardwareState::accelerated(true), &settings, false),
            VideoProcessorKind::Shader
        );
    }
}
