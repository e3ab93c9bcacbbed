//! Measurement Publisher
//!
//! Turns one reading into one advertising burst: emit an iBeacon carrying the
//! reading, hold for the requested time, then stop. The hold is the only
//! pacing in the firmware, so at most one advert is on air between two
//! publish calls.
//!
//! Readings are folded into the beacon fields as:
//!
//! ```text
//! major = (kind << 8) | counter
//! minor = value as 16-bit two's complement
//! ```

use embassy_time::Duration;

use crate::ble::advertising::Emitter;
use crate::config::BeaconConfig;
use crate::core::identity::BeaconIdentity;
use crate::core::transport::{Hold, RadioTransport, TransportError};

/// Semantic tag carried in the high byte of `major`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MeasurementKind {
    Co2 = 11,
    Temperature = 12,
    Noise = 13,
}

impl MeasurementKind {
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MeasurementKind {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            11 => Ok(MeasurementKind::Co2),
            12 => Ok(MeasurementKind::Temperature),
            13 => Ok(MeasurementKind::Noise),
            other => Err(other),
        }
    }
}

/// One reading ready to be advertised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementRecord {
    pub kind: MeasurementKind,
    pub counter: u8,
    pub value: i16,
}

impl MeasurementRecord {
    pub const fn new(kind: MeasurementKind, counter: u8, value: i16) -> Self {
        Self { kind, counter, value }
    }

    pub const fn major(&self) -> u16 {
        ((self.kind.tag() as u16) << 8) | self.counter as u16
    }

    pub const fn minor(&self) -> u16 {
        self.value as u16
    }
}

/// Advertising sequencer for measurement beacons
pub struct Publisher<'a, T: RadioTransport, H: Hold> {
    emitter: Emitter<'a, T>,
    hold: H,
    identity: BeaconIdentity,
    rssi: i8,
}

impl<'a, T: RadioTransport, H: Hold> Publisher<'a, T, H> {
    pub fn new(emitter: Emitter<'a, T>, hold: H, identity: BeaconIdentity, rssi: i8) -> Self {
        Self {
            emitter,
            hold,
            identity,
            rssi,
        }
    }

    /// Build the emitter and publisher from firmware settings
    pub fn from_config(transport: T, hold: H, config: &BeaconConfig) -> Self {
        let emitter = Emitter::new(transport, config.name, config.company_id, config.tx_power);
        Self::new(emitter, hold, config.identity, config.rssi)
    }

    pub fn power_on(&mut self) -> Result<(), TransportError> {
        self.emitter.power_on()
    }

    pub fn emitter(&self) -> &Emitter<'a, T> {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter<'a, T> {
        &mut self.emitter
    }

    pub fn identity(&self) -> &BeaconIdentity {
        &self.identity
    }

    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    /// Advertise `record` for `duration`, then stop.
    ///
    /// Hold and stop run even when the emit was refused. The first error
    /// seen is returned.
    pub async fn publish(&mut self, record: MeasurementRecord, duration: Duration) -> Result<(), TransportError> {
        info!(
            "Publisher: {:?} value={} counter={}",
            record.kind, record.value, record.counter
        );

        let emitted = self
            .emitter
            .emit_ibeacon(&self.identity, record.major(), record.minor(), self.rssi);
        if let Err(e) = emitted {
            error!("Publisher: emit failed: {:?}", e);
        }

        self.hold.hold(duration).await;

        let stopped = self.emitter.transport_mut().stop_advertising();
        if let Err(e) = stopped {
            error!("Publisher: stop failed: {:?}", e);
        }

        emitted.and(stopped)
    }

    pub async fn publish_co2(&mut self, ppm: i16, counter: u8, duration: Duration) -> Result<(), TransportError> {
        self.publish(MeasurementRecord::new(MeasurementKind::Co2, counter, ppm), duration)
            .await
    }

    pub async fn publish_temperature(
        &mut self,
        celsius: i16,
        counter: u8,
        duration: Duration,
    ) -> Result<(), TransportError> {
        self.publish(MeasurementRecord::new(MeasurementKind::Temperature, counter, celsius), duration)
            .await
    }

    pub async fn publish_noise(&mut self, db: i16, counter: u8, duration: Duration) -> Result<(), TransportError> {
        self.publish(MeasurementRecord::new(MeasurementKind::Noise, counter, db), duration)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_co2_fields() {
        let record = MeasurementRecord::new(MeasurementKind::Co2, 3, 235);
        assert_eq!(record.major(), 0x0B03);
        assert_eq!(record.minor(), 0x00EB);
    }

    #[test]
    fn test_negative_temperature_is_twos_complement() {
        let record = MeasurementRecord::new(MeasurementKind::Temperature, 1, -12);
        assert_eq!(record.major(), 0x0C01);
        assert_eq!(record.minor(), 0xFFF4);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(MeasurementKind::Noise.tag(), 13);
        assert_eq!(MeasurementKind::try_from(12), Ok(MeasurementKind::Temperature));
        assert_eq!(MeasurementKind::try_from(14), Err(14));
    }
}
