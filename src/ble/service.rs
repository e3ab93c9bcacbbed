//! GATT Service Registrar
//!
//! Services and characteristics are described first and activated later.
//! Descriptors carry the mutable configuration; activation consumes them and
//! yields [`ActiveService`] / [`ActiveCharacteristic`], which only expose
//! value operations. Activation registers the service before any of its
//! characteristics, in attach order, because the stack requires a service
//! handle to hang characteristics off.

use heapless::Vec;

use crate::core::identity::BeaconIdentity;
use crate::core::transport::{
    CharHandle, CharacteristicConfig, GattError, GattTransport, SecurityMode, ServiceHandle, WriteCallback,
};

/// Maximum number of characteristics per service
pub const MAX_CHARACTERISTICS: usize = 8;

/// Default maximum value length (ATT MTU 23 minus the 3-byte header)
pub const DEFAULT_MAX_LEN: u8 = 20;

/// Characteristic properties (matches BLE specification)
pub mod char_properties {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
}

/// Read and write permissions of the client characteristic configuration
/// descriptor. Only notifying or indicating characteristics carry one, and
/// subscribing stays open whatever the value permissions are.
pub fn cccd_permissions(config: &CharacteristicConfig) -> Option<(SecurityMode, SecurityMode)> {
    if config.properties & (char_properties::NOTIFY | char_properties::INDICATE) != 0 {
        Some((SecurityMode::Open, SecurityMode::Open))
    } else {
        None
    }
}

/// Registrar errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    TooManyCharacteristics,
}

/// A characteristic that has not been activated yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    config: CharacteristicConfig,
}

impl CharacteristicDescriptor {
    /// Characteristic whose UUID is derived from `name`, with no properties,
    /// open permissions and the default maximum length
    pub const fn new(name: &str) -> Self {
        Self {
            config: CharacteristicConfig {
                uuid: BeaconIdentity::from_name(name),
                properties: 0,
                read_perm: SecurityMode::Open,
                write_perm: SecurityMode::Open,
                max_len: DEFAULT_MAX_LEN,
            },
        }
    }

    pub const fn with_config(
        name: &str,
        properties: u8,
        read_perm: SecurityMode,
        write_perm: SecurityMode,
        max_len: u8,
    ) -> Self {
        let mut descriptor = Self::new(name);
        descriptor.config.properties = properties;
        descriptor.config.read_perm = read_perm;
        descriptor.config.write_perm = write_perm;
        descriptor.config.max_len = max_len;
        descriptor
    }

    /// Set properties, permissions and maximum length in one go
    pub fn configure(&mut self, properties: u8, read_perm: SecurityMode, write_perm: SecurityMode, max_len: u8) {
        self.set_properties(properties);
        self.set_permissions(read_perm, write_perm);
        self.set_max_len(max_len);
    }

    pub fn set_properties(&mut self, properties: u8) {
        self.config.properties = properties;
    }

    pub fn set_permissions(&mut self, read_perm: SecurityMode, write_perm: SecurityMode) {
        self.config.read_perm = read_perm;
        self.config.write_perm = write_perm;
    }

    pub fn set_max_len(&mut self, max_len: u8) {
        self.config.max_len = max_len;
    }

    pub fn identity(&self) -> &BeaconIdentity {
        &self.config.uuid
    }

    pub fn config(&self) -> &CharacteristicConfig {
        &self.config
    }

    fn activate<G: GattTransport>(self, gatt: &mut G, service: Option<ServiceHandle>) -> ActiveCharacteristic {
        let handle = match service {
            Some(service) => match gatt.begin_characteristic(service, &self.config) {
                Ok(handle) => {
                    debug!("Registrar: characteristic active, handle {}", handle.0);
                    Some(handle)
                }
                Err(e) => {
                    warn!("Registrar: characteristic activation failed: {:?}", e);
                    None
                }
            },
            None => {
                warn!("Registrar: characteristic skipped, service is not active");
                None
            }
        };

        ActiveCharacteristic {
            config: self.config,
            handle,
        }
    }
}

/// A characteristic after activation. Its configuration is frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCharacteristic {
    config: CharacteristicConfig,
    handle: Option<CharHandle>,
}

impl ActiveCharacteristic {
    pub fn identity(&self) -> &BeaconIdentity {
        &self.config.uuid
    }

    pub fn config(&self) -> &CharacteristicConfig {
        &self.config
    }

    /// Value handle, `None` if the stack refused the characteristic
    pub fn handle(&self) -> Option<CharHandle> {
        self.handle
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Store a new value; returns the number of bytes written
    pub fn write<G: GattTransport>(&self, gatt: &mut G, data: &[u8]) -> Result<usize, GattError> {
        let handle = self.checked_handle(data)?;
        gatt.write(handle, data)
    }

    pub fn write_str<G: GattTransport>(&self, gatt: &mut G, value: &str) -> Result<usize, GattError> {
        self.write(gatt, value.as_bytes())
    }

    /// Push a value to subscribed centrals; returns the number of bytes sent
    pub fn notify<G: GattTransport>(&self, gatt: &mut G, data: &[u8]) -> Result<usize, GattError> {
        let handle = self.checked_handle(data)?;
        gatt.notify(handle, data)
    }

    pub fn set_write_callback<G: GattTransport>(&self, gatt: &mut G, callback: WriteCallback) -> Result<(), GattError> {
        let handle = self.handle.ok_or(GattError::NotActive)?;
        gatt.set_write_callback(handle, callback);
        Ok(())
    }

    fn checked_handle(&self, data: &[u8]) -> Result<CharHandle, GattError> {
        let handle = self.handle.ok_or(GattError::NotActive)?;
        if data.len() > self.config.max_len as usize {
            return Err(GattError::DataTooLong);
        }
        Ok(handle)
    }
}

/// A service and its characteristics, not yet activated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    identity: BeaconIdentity,
    characteristics: Vec<CharacteristicDescriptor, MAX_CHARACTERISTICS>,
}

impl ServiceDescriptor {
    pub const fn new(name: &str) -> Self {
        Self {
            identity: BeaconIdentity::from_name(name),
            characteristics: Vec::new(),
        }
    }

    pub fn identity(&self) -> &BeaconIdentity {
        &self.identity
    }

    pub fn characteristics(&self) -> &[CharacteristicDescriptor] {
        &self.characteristics
    }

    /// Attach a characteristic; attach order is activation order
    pub fn add_characteristic(&mut self, characteristic: CharacteristicDescriptor) -> Result<(), RegistryError> {
        self.characteristics
            .push(characteristic)
            .map_err(|_| RegistryError::TooManyCharacteristics)
    }

    /// Attach every characteristic in `characteristics`, in order
    pub fn with_characteristics<I>(mut self, characteristics: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = CharacteristicDescriptor>,
    {
        for characteristic in characteristics {
            self.add_characteristic(characteristic)?;
        }
        Ok(self)
    }

    /// Register the service, then each attached characteristic.
    ///
    /// Failures reported by the stack are logged and not retried; the
    /// affected entries come back inactive.
    pub fn activate<G: GattTransport>(self, gatt: &mut G) -> ActiveService {
        info!(
            "Registrar: activating service {:02x} with {} characteristics",
            self.identity.as_bytes(),
            self.characteristics.len()
        );

        let handle = match gatt.begin_service(&self.identity) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Registrar: service activation failed: {:?}", e);
                None
            }
        };

        let mut characteristics = Vec::new();
        for characteristic in self.characteristics {
            // Same capacity as the descriptor list
            let _ = characteristics.push(characteristic.activate(gatt, handle));
        }

        ActiveService {
            identity: self.identity,
            handle,
            characteristics,
        }
    }
}

/// A service after activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveService {
    identity: BeaconIdentity,
    handle: Option<ServiceHandle>,
    characteristics: Vec<ActiveCharacteristic, MAX_CHARACTERISTICS>,
}

impl ActiveService {
    pub fn identity(&self) -> &BeaconIdentity {
        &self.identity
    }

    pub fn handle(&self) -> Option<ServiceHandle> {
        self.handle
    }

    pub fn characteristics(&self) -> &[ActiveCharacteristic] {
        &self.characteristics
    }

    pub fn characteristic(&self, index: usize) -> Option<&ActiveCharacteristic> {
        self.characteristics.get(index)
    }

    pub fn find(&self, identity: &BeaconIdentity) -> Option<&ActiveCharacteristic> {
        self.characteristics.iter().find(|c| c.identity() == identity)
    }

    /// Service and every characteristic were accepted by the stack
    pub fn is_fully_active(&self) -> bool {
        self.handle.is_some() && self.characteristics.iter().all(ActiveCharacteristic::is_active)
    }
}
