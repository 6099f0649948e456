//! Sequential colormaps sampled to hex colors.

use crate::error::{PipelineError, Result};

/// Sequential palettes, each defined by evenly spaced RGB stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Mako,
    Rocket,
    Viridis,
}

const MAKO: &[[u8; 3]] = &[
    [0x0b, 0x04, 0x05],
    [0x38, 0x2a, 0x54],
    [0x39, 0x5d, 0x9c],
    [0x34, 0x97, 0xa9],
    [0x60, 0xce, 0xac],
    [0xde, 0xf5, 0xe5],
];

const ROCKET: &[[u8; 3]] = &[
    [0x03, 0x05, 0x1a],
    [0x4c, 0x1d, 0x4b],
    [0xa1, 0x1a, 0x5b],
    [0xe8, 0x3f, 0x3f],
    [0xf6, 0x9c, 0x73],
    [0xfa, 0xeb, 0xdd],
];

const VIRIDIS: &[[u8; 3]] = &[
    [0x44, 0x01, 0x54],
    [0x41, 0x44, 0x87],
    [0x2a, 0x78, 0x8e],
    [0x22, 0xa8, 0x84],
    [0x7a, 0xd1, 0x51],
    [0xfd, 0xe7, 0x25],
];

impl Colormap {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mako => "mako",
            Self::Rocket => "rocket",
            Self::Viridis => "viridis",
        }
    }

    fn stops(&self) -> &'static [[u8; 3]] {
        match self {
            Self::Mako => MAKO,
            Self::Rocket => ROCKET,
            Self::Viridis => VIRIDIS,
        }
    }

    /// Color at position `t` in `[0, 1]` (clamped), linearly interpolated.
    pub fn sample(&self, t: f32) -> [u8; 3] {
        let stops = self.stops();
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let scaled = t * (stops.len() - 1) as f32;
        let lower = (scaled.floor() as usize).min(stops.len() - 2);
        let frac = scaled - lower as f32;
        let (a, b) = (stops[lower], stops[lower + 1]);
        let mut out = [0u8; 3];
        for (k, channel) in out.iter_mut().enumerate() {
            let v = a[k] as f32 + (b[k] as f32 - a[k] as f32) * frac;
            *channel = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    pub fn sample_hex(&self, t: f32) -> String {
        let [r, g, b] = self.sample(t);
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl std::fmt::Display for Colormap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Colormap {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mako" => Ok(Self::Mako),
            "rocket" => Ok(Self::Rocket),
            "viridis" => Ok(Self::Viridis),
            _ => Err(PipelineError::Configuration(format!(
                "unknown colormap: {s}. Supported: mako, rocket, viridis"
            ))),
        }
    }
}
