//! Radio Transport Capabilities
//!
//! The vendor BLE stack is reached only through the traits in this module.
//! [`RadioTransport`] covers advertising and connection bookkeeping,
//! [`GattTransport`] covers service and characteristic registration and
//! [`Hold`] covers pacing. The firmware implements them on top of the
//! SoftDevice; tests implement them with recording fakes.

use embassy_time::Duration;

use crate::core::identity::BeaconIdentity;
use crate::core::payload::AdvPayload;

/// Connection handle reported by the stack
pub type ConnHandle = u16;

/// Called when a central connects
pub type ConnectCallback = fn(ConnHandle);

/// Called when a connection ends, with the HCI reason code
pub type DisconnectCallback = fn(ConnHandle, u8);

/// Called when a central writes a characteristic value
pub type WriteCallback = fn(ConnHandle, CharHandle, &[u8]);

/// Handle of an activated GATT service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceHandle(pub u16);

/// Value handle of an activated characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharHandle(pub u16);

/// Radio transmit power levels supported by nRF52 radios (dBm)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i8)]
pub enum TxPower {
    Minus40dBm = -40,
    Minus20dBm = -20,
    Minus16dBm = -16,
    Minus12dBm = -12,
    Minus8dBm = -8,
    Minus4dBm = -4,
    ZerodBm = 0,
    Plus3dBm = 3,
    Plus4dBm = 4,
    Plus8dBm = 8,
}

impl TxPower {
    /// Closest supported level not above `dbm` (the lowest level below -40 dBm)
    pub const fn from_dbm(dbm: i8) -> Self {
        match dbm {
            i8::MIN..=-21 => TxPower::Minus40dBm,
            -20..=-17 => TxPower::Minus20dBm,
            -16..=-13 => TxPower::Minus16dBm,
            -12..=-9 => TxPower::Minus12dBm,
            -8..=-5 => TxPower::Minus8dBm,
            -4..=-1 => TxPower::Minus4dBm,
            0..=2 => TxPower::ZerodBm,
            3 => TxPower::Plus3dBm,
            4..=7 => TxPower::Plus4dBm,
            _ => TxPower::Plus8dBm,
        }
    }

    pub const fn dbm(self) -> i8 {
        self as i8
    }
}

/// Advertising interval bounds in units of 0.625 ms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvInterval {
    pub min: u16,
    pub max: u16,
}

impl AdvInterval {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Same value for both bounds
    pub const fn fixed(units: u16) -> Self {
        Self { min: units, max: units }
    }

    /// Upper bound in microseconds
    pub const fn max_micros(&self) -> u32 {
        self.max as u32 * 625
    }
}

/// Snapshot of an established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionInfo {
    pub handle: ConnHandle,
    pub peer_addr: [u8; 6],
    pub mtu: u16,
}

/// Errors reported by the radio transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// `begin()` has not been called
    NotInitialized,
    /// A payload was already set for this advertising session
    PayloadAlreadySet,
    /// Advertising must be stopped before it can be started again
    AlreadyAdvertising,
    /// The stack rejected the call with a raw error code
    Refused(u32),
}

/// Errors reported by the GATT side of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattError {
    /// The characteristic or service never reached the active state
    NotActive,
    /// Value longer than the characteristic's maximum length
    DataTooLong,
    /// The stack rejected the call with a raw error code
    Refused(u32),
}

/// Advertising side of the vendor BLE stack.
///
/// Single owner, single execution context: the stack forbids starting an
/// advertisement while one is running, and callers must stop first.
pub trait RadioTransport {
    /// Bring the stack up. Must be called before anything else.
    fn begin(&mut self) -> Result<(), TransportError>;

    fn is_advertising(&self) -> bool;

    /// Start advertising; `timeout_secs == 0` advertises until stopped
    fn start_advertising(&mut self, timeout_secs: u16) -> Result<(), TransportError>;

    fn stop_advertising(&mut self) -> Result<(), TransportError>;

    fn set_tx_power(&mut self, power: TxPower) -> Result<(), TransportError>;

    /// Set the device name; it is also placed in the scan response
    fn set_name(&mut self, name: &str) -> Result<(), TransportError>;

    fn set_interval(&mut self, interval: AdvInterval) -> Result<(), TransportError>;

    /// Resume advertising automatically after a central disconnects
    fn set_restart_on_disconnect(&mut self, restart: bool);

    /// Seconds spent in fast advertising mode after a start
    fn set_fast_timeout(&mut self, secs: u16);

    /// Hand over the advertising data for the next session. Accepted once per
    /// session; a second call before `stop_advertising` fails.
    fn set_payload(&mut self, payload: AdvPayload) -> Result<(), TransportError>;

    /// List a service UUID in the advertising data
    fn advertise_service(&mut self, uuid: &BeaconIdentity) -> Result<(), TransportError>;

    fn set_connect_callback(&mut self, callback: ConnectCallback);

    fn set_disconnect_callback(&mut self, callback: DisconnectCallback);

    fn connection(&self, handle: ConnHandle) -> Option<ConnectionInfo>;
}

/// Characteristic configuration handed to the stack at activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicConfig {
    pub uuid: BeaconIdentity,
    pub properties: u8,
    pub read_perm: SecurityMode,
    pub write_perm: SecurityMode,
    pub max_len: u8,
}

/// Attribute access permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SecurityMode {
    NoAccess,
    #[default]
    Open,
    EncryptedNoMitm,
    EncryptedMitm,
}

/// GATT server side of the vendor BLE stack
pub trait GattTransport {
    /// Register a primary service
    fn begin_service(&mut self, uuid: &BeaconIdentity) -> Result<ServiceHandle, GattError>;

    /// Register a characteristic under an already registered service
    fn begin_characteristic(
        &mut self,
        service: ServiceHandle,
        config: &CharacteristicConfig,
    ) -> Result<CharHandle, GattError>;

    /// Set the local value; returns the number of bytes stored
    fn write(&mut self, handle: CharHandle, data: &[u8]) -> Result<usize, GattError>;

    /// Notify subscribed centrals; returns the number of bytes sent
    fn notify(&mut self, handle: CharHandle, data: &[u8]) -> Result<usize, GattError>;

    fn set_write_callback(&mut self, handle: CharHandle, callback: WriteCallback);
}

/// Pacing: suspend the caller for a fixed time.
#[allow(async_fn_in_trait)]
pub trait Hold {
    async fn hold(&mut self, duration: Duration);
}

impl<H: Hold + ?Sized> Hold for &mut H {
    async fn hold(&mut self, duration: Duration) {
        (**self).hold(duration).await
    }
}

/// [`Hold`] backed by the embassy time driver
#[cfg(feature = "firmware")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerHold;

#[cfg(feature = "firmware")]
impl Hold for TimerHold {
    async fn hold(&mut self, duration: Duration) {
        embassy_time::Timer::after(duration).await
    }
}
