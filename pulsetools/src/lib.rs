pub mod acceptance;
pub mod acquisition;
pub mod assembler;
pub mod bit;
pub mod cfg;
pub mod codec;
pub mod correlate;
pub mod de;
pub mod engine;
pub mod error;
pub mod hist;
pub mod rate;
pub mod ser;
pub mod slots;

use serde::{Deserialize, Serialize};

/// Hardware channel number (0-indexed, as printed on the front panel)
pub type Channel = u8;

/// Upper bound on the channel count of any supported module
pub const MAX_CHANNELS: usize = 32;

/// Tri-state validation-window tag carried by a measurement
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coincidence {
    /// Trigger fell inside the validation window
    Matched,
    /// Trigger fell outside the validation window
    Unmatched,
    /// No validation information
    Neither,
}

impl Coincidence {
    /// Decode the two adjacent status bits: `01` matched, `10` unmatched.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Coincidence::Matched,
            0b10 => Coincidence::Unmatched,
            _ => Coincidence::Neither,
        }
    }

    pub fn to_bits(self) -> u32 {
        match self {
            Coincidence::Matched => 0b01,
            Coincidence::Unmatched => 0b10,
            Coincidence::Neither => 0b00,
        }
    }
}

/// The basic representation of a detected pulse
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Measurement {
    /// Channel the pulse was seen on
    pub channel: Channel,
    /// Ordinal of the event within its burst
    pub slot: usize,
    /// Energy or ADC code
    pub amplitude: u32,
    /// Whole clock ticks
    pub coarse_time: u64,
    /// Sub-tick fraction
    pub fine_time: u16,
    pub coincidence: Coincidence,
    /// Saturation/overflow status bit, if the module reports one
    pub overflow: bool,
}

impl Measurement {
    /// Combined time in coarse ticks, `coarse + fine * fine_unit`
    pub fn time(&self, fine_unit: f64) -> f64 {
        return self.coarse_time as f64 + self.fine_time as f64 * fine_unit;
    }
}

/// Representation for two-dimensional data like histograms, etc.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug)]
pub struct Bin<T, U>
where
    T: std::str::FromStr,
    U: std::str::FromStr,
{
    pub x: T,
    pub y: U,
}
