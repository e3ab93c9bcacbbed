//! Firmware Configuration
//!
//! Compile-time settings for the beacon. [`BeaconConfig::new`] gives the
//! values the device ships with; individual fields can be overridden in a
//! `const` context.

use embassy_time::Duration;

use crate::core::identity::BeaconIdentity;
use crate::core::payload::APPLE_COMPANY_ID;
use crate::core::transport::TxPower;

/// Broadcast name, also placed in the scan response
pub const DEVICE_NAME: &str = "GTI-3A";

/// Manufacturer ID written into every advert
pub const COMPANY_ID: u16 = APPLE_COMPANY_ID;

pub const TX_POWER: TxPower = TxPower::Plus4dBm;

/// Calibrated RSSI at 1 m, carried in the last beacon byte
pub const RSSI_AT_1M: i8 = -53;

/// Proximity UUID of every measurement beacon
pub const BEACON_IDENTITY: BeaconIdentity = BeaconIdentity::from_bytes(*b"EPSG-GTI-PROY-3D");

/// How long each measurement stays on air
pub const PUBLISH_HOLD: Duration = Duration::from_millis(1000);

/// LED pulse at the start of each measurement round
pub const LED_FLASH: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeaconConfig {
    pub name: &'static str,
    pub company_id: u16,
    pub tx_power: TxPower,
    pub identity: BeaconIdentity,
    pub rssi: i8,
    pub hold: Duration,
}

impl BeaconConfig {
    pub const fn new() -> Self {
        Self {
            name: DEVICE_NAME,
            company_id: COMPANY_ID,
            tx_power: TX_POWER,
            identity: BEACON_IDENTITY,
            rssi: RSSI_AT_1M,
            hold: PUBLISH_HOLD,
        }
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        const CONFIG: BeaconConfig = BeaconConfig::new();
        assert_eq!(CONFIG.name, "GTI-3A");
        assert_eq!(CONFIG.company_id, 0x004C);
        assert_eq!(CONFIG.tx_power.dbm(), 4);
        assert_eq!(CONFIG.rssi, -53);
        assert_eq!(CONFIG.identity.as_bytes(), b"EPSG-GTI-PROY-3D");
        assert_eq!(CONFIG.hold.as_millis(), 1000);
    }
}
