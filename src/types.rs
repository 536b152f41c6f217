// src/types.rs
use std::fmt;

/// Number of colour channels carried by each record after the marker.
pub const CHANNELS: usize = 3;

/// Upper bound of the normalized range.
pub const FULL_SCALE: f64 = 255.0;

// 连接模式
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ConnectionMode {
    Simulation,
    Hardware,
}

/// One parsed `marker,v0,v1,v2` line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRecord {
    pub marker: i64,
    pub readings: [u32; CHANNELS],
}

/// Per-channel scaling denominators. Every entry is non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceMaxima([u32; CHANNELS]);

impl ReferenceMaxima {
    pub const DEFAULT: ReferenceMaxima = ReferenceMaxima([2770, 2060, 1410]);

    /// Fails with the index of the first channel whose maximum is zero.
    pub fn new(maxima: [u32; CHANNELS]) -> Result<Self, usize> {
        match maxima.iter().position(|&m| m == 0) {
            Some(channel) => Err(channel),
            None => Ok(Self(maxima)),
        }
    }

    pub fn get(&self, channel: usize) -> u32 {
        self.0[channel]
    }

    pub fn as_array(&self) -> [u32; CHANNELS] {
        self.0
    }
}

impl Default for ReferenceMaxima {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Approximate R/G/B intensities. Values may exceed 255 when a reading is
/// above its reference maximum.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct NormalizedColor(pub [f64; CHANNELS]);

impl NormalizedColor {
    /// Clamps into 0..=255 and truncates toward zero.
    pub fn to_rgb8(&self) -> [u8; CHANNELS] {
        self.0.map(|v| {
            if v.is_nan() {
                0
            } else {
                v.clamp(0.0, FULL_SCALE) as u8
            }
        })
    }
}

impl fmt::Display for NormalizedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "({r:.1}, {g:.1}, {b:.1})")
    }
}

/// A record together with its normalized colour, handed to every sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub record: RawRecord,
    pub color: NormalizedColor,
}
