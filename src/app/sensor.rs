//! Sensor readings
//!
//! The board carries no real sensors yet; [`FixedMeter`] reports constant
//! values so the advertising path can be exercised end to end.

/// Source of the readings published by the firmware
pub trait Meter {
    /// CO2 concentration in ppm
    fn co2_ppm(&mut self) -> i16;

    /// Temperature in whole degrees Celsius
    fn temperature_celsius(&mut self) -> i16;

    /// Ambient noise in dB
    fn noise_db(&mut self) -> i16;
}

/// Meter returning the same readings every time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixedMeter {
    pub co2_ppm: i16,
    pub temperature_celsius: i16,
    pub noise_db: i16,
}

impl FixedMeter {
    pub const fn new() -> Self {
        Self {
            co2_ppm: 235,
            temperature_celsius: -12,
            noise_db: 0,
        }
    }
}

impl Default for FixedMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl Meter for FixedMeter {
    fn co2_ppm(&mut self) -> i16 {
        self.co2_ppm
    }

    fn temperature_celsius(&mut self) -> i16 {
        self.temperature_celsius
    }

    fn noise_db(&mut self) -> i16 {
        self.noise_db
    }
}
