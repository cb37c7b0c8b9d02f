//! Video settings supplied by the host application
//!
//! Settings are plain values handed to the renderer. They serialize with
//! serde so hosts can embed them in their own XML/JSON preference files.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};

/// Preferred stage for colour conversion of hardware decoded frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VideoProcessorPreference {
    /// Hardware processor unless the content needs tone mapping
    #[default]
    Auto,
    /// Always the fixed-function video processor (when available)
    Hardware,
    /// Always the generated pixel shaders
    Shader,
}

impl VideoProcessorPreference {
    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoProcessorPreference::Auto => "Auto",
            VideoProcessorPreference::Hardware => "Video Processor",
            VideoProcessorPreference::Shader => "Pixel Shader",
        }
    }
}

/// A user adjustable filter (brightness, contrast)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterRange {
    #[serde(rename = "minimum")]
    pub minimum: i32,
    #[serde(rename = "maximum")]
    pub maximum: i32,
    #[serde(rename = "defaultValue")]
    pub default_value: i32,
    #[serde(rename = "value")]
    pub value: i32,
}

impl FilterRange {
    pub fn new(minimum: i32, maximum: i32, default_value: i32) -> Self {
        Self {
            minimum,
            maximum,
            default_value,
            value: default_value,
        }
    }

    pub fn reset_to_default(&mut self) {
        self.value = self.default_value;
    }

    /// Neutral value for the shader path, which centres its filter range
    pub fn reset_to_midpoint(&mut self) {
        self.value = self.minimum + (self.maximum - self.minimum) / 2;
    }

    /// Value mapped to 0.0..=1.0
    pub fn normalized(&self) -> f32 {
        let span = (self.maximum - self.minimum).max(1) as f32;
        (self.value - self.minimum) as f32 / span
    }
}

fn default_brightness() -> FilterRange {
    FilterRange::new(-100, 100, 0)
}

fn default_contrast() -> FilterRange {
    FilterRange::new(0, 200, 100)
}

fn default_hdr_tone() -> f32 {
    1.4
}

/// Options from the host's settings layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "VideoSettings")]
pub struct VideoSettings {
    #[serde(rename = "videoProcessor", default)]
    pub video_processor: VideoProcessorPreference,

    /// Deinterlacing requested (keeps HDR content on the hardware processor)
    #[serde(rename = "deinterlace", default)]
    pub deinterlace: bool,

    /// Convert software decoded frames on the CPU instead of in shaders
    #[serde(rename = "forceSoftwareConversion", default)]
    pub force_software_conversion: bool,

    /// Strength of the HDR to SDR tone curve
    #[serde(rename = "hdrToSdrTone", default = "default_hdr_tone")]
    pub hdr_to_sdr_tone: f32,

    #[serde(rename = "brightness", default = "default_brightness")]
    pub brightness: FilterRange,

    #[serde(rename = "contrast", default = "default_contrast")]
    pub contrast: FilterRange,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            video_processor: VideoProcessorPreference::default(),
            deinterlace: false,
            force_software_conversion: false,
            hdr_to_sdr_tone: default_hdr_tone(),
            brightness: default_brightness(),
            contrast: default_contrast(),
        }
    }
}

impl VideoSettings {
    /// Parse settings from an XML fragment
    pub fn from_xml_str(xml: &str) -> Result<Self, quick_xml::DeError> {
        from_str(xml)
    }

    /// Serialize settings to an XML fragment
    pub fn to_xml_string(&self) -> Result<String, quick_xml::SeError> {
        to_string(self)
    }

    /// Filter values used by the hardware video processor
    pub fn reset_filters_to_default(&mut self) {
        self.brightness.reset_to_default();
        self.contrast.reset_to_default();
    }

    /// Filter values used by the shader path
    pub fn reset_filters_to_midpoint(&mut self) {
        self.brightness.reset_to_midpoint();
        self.contrast.reset_to_midpoint();
    }
}
