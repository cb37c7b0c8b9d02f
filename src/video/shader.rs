//! Pixel shader keys, WGSL assembly and the process-wide shader cache
//!
//! Every dispatch case contributes a small sampling body that writes
//! `color`. [`ShaderSource::to_wgsl`] wraps the body in a prelude with the
//! fullscreen vertex stage, the shared constant block, YUV to RGB
//! conversion and HDR to SDR tone mapping. The boolean defines become WGSL
//! `const` declarations so the branches fold away at pipeline creation.

use std::collections::HashMap;
use std::fmt;

/// Identifies a generated pixel shader.
///
/// Built from the dispatch case, bit-depth bucket, channel swizzle and HDR
/// flag. Two configurations with equal keys use byte-identical shaders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderKey(String);

impl ShaderKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hardware video processor runs without a pixel shader
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn push(&mut self, part: &str) {
        self.0.push_str(part);
    }
}

impl fmt::Display for ShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compile-time switches for the shader prelude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaderDefines {
    /// Apply HDR to SDR tone mapping
    pub hdr: bool,
    /// The body writes Y, U, V into `color.rgb`
    pub yuv: bool,
}

impl ShaderDefines {
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.hdr {
            names.push("HDR");
        }
        if self.yuv {
            names.push("YUV");
        }
        names
    }
}

/// Sampling body plus defines for one dispatch case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub body: String,
    pub defines: ShaderDefines,
}

impl ShaderSource {
    pub fn new(body: impl Into<String>, defines: ShaderDefines) -> Self {
        Self {
            body: body.into(),
            defines,
        }
    }

    /// Full WGSL module with `vs_main` and `fs_main` entry points
    pub fn to_wgsl(&self) -> String {
        let mut source = String::with_capacity(PRELUDE.len() + self.body.len() + 512);
        source.push_str(&format!("const HDR: bool = {};\n", self.defines.hdr));
        source.push_str(&format!("const YUV: bool = {};\n", self.defines.yuv));
        source.push_str(PRELUDE);
        source.push_str("\n@fragment\nfn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {\n");
        source.push_str("    var color = vec4<f32>(0.0, 0.0, 0.0, 1.0);\n");
        source.push_str(&self.body);
        source.push_str(FRAGMENT_EPILOGUE);
        source
    }
}

const PRELUDE: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

struct VideoConstants {
    coefs_index: i32,
    brightness: f32,
    contrast: f32,
    tex_width: f32,
    luminance: f32,
    tone_p1: f32,
    tone_p2: f32,
    full_range: i32,
};

@group(0) @binding(0) var<uniform> params: VideoConstants;
@group(0) @binding(1) var video_sampler: sampler;
@group(0) @binding(2) var texture1: texture_2d<f32>;
@group(0) @binding(3) var texture2: texture_2d<f32>;
@group(0) @binding(4) var texture3: texture_2d<f32>;
@group(0) @binding(5) var texture4: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    // Fullscreen triangle
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    var out: VertexOutput;
    out.position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}

fn yuv_to_rgb(yuv: vec3<f32>) -> vec3<f32> {
    var y = yuv.x;
    var u = yuv.y - 0.5;
    var v = yuv.z - 0.5;
    if params.full_range == 0 {
        y = (y - 16.0 / 255.0) * (255.0 / 219.0);
        u = u * (255.0 / 224.0);
        v = v * (255.0 / 224.0);
    }

    var kr = 0.2126;
    var kb = 0.0722;
    if params.coefs_index == 0 {
        kr = 0.2627;
        kb = 0.0593;
    } else if params.coefs_index == 2 {
        kr = 0.299;
        kb = 0.114;
    }
    let kg = 1.0 - kr - kb;

    let r = y + 2.0 * (1.0 - kr) * v;
    let b = y + 2.0 * (1.0 - kb) * u;
    let g = (y - kr * r - kb * b) / kg;
    return vec3<f32>(r, g, b);
}

// SMPTE ST 2084 to linear light, 1.0 = 10000 cd/m²
fn pq_to_linear(pq: vec3<f32>) -> vec3<f32> {
    let m1 = 0.1593017578125;
    let m2 = 78.84375;
    let c1 = 0.8359375;
    let c2 = 18.8515625;
    let c3 = 18.6875;
    let p = pow(max(pq, vec3<f32>(0.0)), vec3<f32>(1.0 / m2));
    return pow(max(p - c1, vec3<f32>(0.0)) / (c2 - c3 * p), vec3<f32>(1.0 / m1));
}

fn tone_map(pq: vec3<f32>) -> vec3<f32> {
    var c = pq_to_linear(pq) * params.tone_p1;
    let white = max(params.tone_p2, 0.0001);
    c = c * (1.0 + c / (white * white)) / (1.0 + c);

    let bt2020_to_bt709 = mat3x3<f32>(
        vec3<f32>(1.6605, -0.1246, -0.0182),
        vec3<f32>(-0.5876, 1.1329, -0.1006),
        vec3<f32>(-0.0728, -0.0083, 1.1187),
    );
    c = clamp(bt2020_to_bt709 * c, vec3<f32>(0.0), vec3<f32>(1.0));
    return pow(c, vec3<f32>(1.0 / 2.2));
}
"#;

const FRAGMENT_EPILOGUE: &str = r#"
    if YUV {
        color = vec4<f32>(yuv_to_rgb(color.rgb), color.a);
    }
    if HDR {
        color = vec4<f32>(tone_map(color.rgb), color.a);
    }

    let adjusted = (color.rgb - 0.5) * (params.contrast * 2.0) + 0.5 + (params.brightness - 0.5);
    return vec4<f32>(clamp(adjusted, vec3<f32>(0.0), vec3<f32>(1.0)), color.a);
}
"#;

/// Compiled shaders keyed by [`ShaderKey`], evicting the least recently
/// used entry once `capacity` is reached
pub struct ShaderCache<S> {
    entries: HashMap<ShaderKey, CacheEntry<S>>,
    capacity: usize,
    clock: u64,
}

struct CacheEntry<S> {
    shader: S,
    last_used: u64,
}

/// Default number of cached shader programs
pub const DEFAULT_SHADER_CACHE_CAPACITY: usize = 64;

impl<S: Clone> ShaderCache<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    pub fn get(&mut self, key: &ShaderKey) -> Option<S> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.shader.clone()
        })
    }

    pub fn insert(&mut self, key: ShaderKey, shader: S) {
        self.clock += 1;

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!("Evicting pixel shader {}", oldest);
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                shader,
                last_used: self.clock,
            },
        );
    }

    pub fn contains(&self, key: &ShaderKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Clone> Default for ShaderCache<S> {
    fn default() -> Self {
        Self::new(DEFAULT_SHADER_CACHE_CAPACITY)
    }
}
