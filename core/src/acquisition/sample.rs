use serde::{Deserialize, Serialize};

pub const STANDARD_GRAVITY: f64 = 9.81;

/// One triaxial accelerometer reading in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sequence: u64,
    pub magnitude: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn from_axes(sequence: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            sequence,
            magnitude: (x * x + y * y + z * z).sqrt(),
            x,
            y,
            z,
        }
    }
}

/// Raw-count to m/s² conversion for the supported accelerometer front ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccelScale {
    /// Values already in m/s².
    Physical,
    /// Signed digital counts, `counts_per_g` counts per 1 g.
    WideRange { counts_per_g: f64 },
    /// Unsigned 16-bit analog counts centred on 32768 with a ±`range_g` span.
    Analog { range_g: f64 },
}

impl Default for AccelScale {
    fn default() -> Self {
        AccelScale::WideRange {
            counts_per_g: 16000.0,
        }
    }
}

impl AccelScale {
    const ANALOG_MIDPOINT: f64 = 32768.0;

    pub fn to_physical(&self, raw: f64) -> f64 {
        match *self {
            AccelScale::Physical => raw,
            AccelScale::WideRange { counts_per_g } => raw * STANDARD_GRAVITY / counts_per_g,
            AccelScale::Analog { range_g } => {
                (raw - Self::ANALOG_MIDPOINT) * (range_g / Self::ANALOG_MIDPOINT) * STANDARD_GRAVITY
            }
        }
    }

    /// Inverse of [`AccelScale::to_physical`], unrounded.
    pub fn to_raw(&self, physical: f64) -> f64 {
        match *self {
            AccelScale::Physical => physical,
            AccelScale::WideRange { counts_per_g } => physical * counts_per_g / STANDARD_GRAVITY,
            AccelScale::Analog { range_g } => {
                physical / STANDARD_GRAVITY * (Self::ANALOG_MIDPOINT / range_g)
                    + Self::ANALOG_MIDPOINT
            }
        }
    }
}
