//! Beacon Emitter
//!
//! Advertising controller on top of an injected [`RadioTransport`]. Every
//! emit call follows the same sequence: stop whatever is running, build the
//! complete payload, reapply the radio parameters, hand the payload over in a
//! single call, then start advertising with no timeout. Radio parameters are
//! not cached because the stack does not keep them across stop/start.

use crate::ble::service::{ActiveService, CharacteristicDescriptor, RegistryError, ServiceDescriptor};
use crate::core::identity::BeaconIdentity;
use crate::core::payload::{AdvPayload, IBeacon};
use crate::core::transport::{
    AdvInterval, ConnHandle, ConnectCallback, ConnectionInfo, DisconnectCallback, GattTransport, RadioTransport,
    TransportError, TxPower,
};

/// Advertising interval used by every emit (100 * 0.625 ms = 62.5 ms)
pub const ADV_INTERVAL: AdvInterval = AdvInterval::fixed(100);

/// Start timeout meaning "until stopped"
pub const ADV_TIMEOUT_NONE: u16 = 0;

/// Fast advertising window for free-payload adverts (seconds)
pub const FREE_PAYLOAD_FAST_TIMEOUT: u16 = 1;

/// Broadcasts beacons and announces services through a radio transport
pub struct Emitter<'a, T: RadioTransport> {
    name: &'a str,
    company_id: u16,
    tx_power: TxPower,
    transport: T,
}

impl<'a, T: RadioTransport> Emitter<'a, T> {
    /// The radio is not touched until [`Emitter::power_on`].
    pub fn new(transport: T, name: &'a str, company_id: u16, tx_power: TxPower) -> Self {
        Self {
            name,
            company_id,
            tx_power,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn company_id(&self) -> u16 {
        self.company_id
    }

    pub fn tx_power(&self) -> TxPower {
        self.tx_power
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Bring the stack up and make sure nothing is being advertised
    pub fn power_on(&mut self) -> Result<(), TransportError> {
        info!("Emitter: powering on radio");
        self.transport.begin()?;
        self.stop_advertising()
    }

    /// Power on, then install the connection callbacks.
    ///
    /// The stack drops callbacks installed before `begin()`.
    pub fn power_on_with_callbacks(
        &mut self,
        on_connect: ConnectCallback,
        on_disconnect: DisconnectCallback,
    ) -> Result<(), TransportError> {
        self.power_on()?;
        self.set_connect_callback(on_connect);
        self.set_disconnect_callback(on_disconnect);
        Ok(())
    }

    pub fn is_advertising(&self) -> bool {
        self.transport.is_advertising()
    }

    /// Stop advertising if it is running; a no-op otherwise
    pub fn stop_advertising(&mut self) -> Result<(), TransportError> {
        if self.transport.is_advertising() {
            debug!("Emitter: stopping advertising");
            self.transport.stop_advertising()?;
        }
        Ok(())
    }

    /// Advertise a standard iBeacon until stopped
    pub fn emit_ibeacon(
        &mut self,
        identity: &BeaconIdentity,
        major: u16,
        minor: u16,
        rssi: i8,
    ) -> Result<(), TransportError> {
        self.stop_advertising()?;

        let beacon = IBeacon::new(*identity, major, minor, rssi);
        let payload = AdvPayload::ibeacon(self.company_id, &beacon);

        self.transport.set_tx_power(self.tx_power)?;
        self.transport.set_name(self.name)?;
        self.transport.set_payload(payload)?;
        self.transport.set_restart_on_disconnect(true);
        self.transport.set_interval(ADV_INTERVAL)?;
        self.transport.start_advertising(ADV_TIMEOUT_NONE)?;

        debug!("Emitter: iBeacon major={=u16:#x} minor={=u16:#x} rssi={=i8}", major, minor, rssi);
        Ok(())
    }

    /// Advertise up to 21 caller-defined bytes in place of the iBeacon body.
    ///
    /// Transmit power is left alone: the byte it would normally describe is
    /// part of the caller's data.
    pub fn emit_free_payload(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stop_advertising()?;

        let payload = AdvPayload::free(self.company_id, data);

        self.transport.set_name(self.name)?;
        self.transport.set_payload(payload)?;
        self.transport.set_restart_on_disconnect(true);
        self.transport.set_interval(ADV_INTERVAL)?;
        self.transport.set_fast_timeout(FREE_PAYLOAD_FAST_TIMEOUT);
        self.transport.start_advertising(ADV_TIMEOUT_NONE)?;

        info!("Emitter: free payload advertising started ({} bytes)", data.len());
        Ok(())
    }

    /// List a service in the advertising data.
    ///
    /// A refusal is logged and reported as `false`.
    pub fn add_service(&mut self, service: &ServiceDescriptor) -> bool {
        self.announce(service.identity())
    }

    /// Attach `characteristics` to `service` in order, then announce it.
    pub fn add_service_with_characteristics<I>(
        &mut self,
        mut service: ServiceDescriptor,
        characteristics: I,
    ) -> Result<(ServiceDescriptor, bool), RegistryError>
    where
        I: IntoIterator<Item = CharacteristicDescriptor>,
    {
        for characteristic in characteristics {
            service.add_characteristic(characteristic)?;
        }

        let announced = self.add_service(&service);
        Ok((service, announced))
    }

    /// Attach, announce, then activate: the service first, then each
    /// characteristic in attach order.
    ///
    /// The announce result is advisory and returned alongside the
    /// activated service.
    pub fn add_service_with_characteristics_and_activate<G, I>(
        &mut self,
        service: ServiceDescriptor,
        characteristics: I,
        gatt: &mut G,
    ) -> Result<(ActiveService, bool), RegistryError>
    where
        G: GattTransport,
        I: IntoIterator<Item = CharacteristicDescriptor>,
    {
        let (service, announced) = self.add_service_with_characteristics(service, characteristics)?;
        Ok((service.activate(gatt), announced))
    }

    fn announce(&mut self, uuid: &BeaconIdentity) -> bool {
        debug!("Emitter: announcing service {:02x}", uuid.as_bytes());
        match self.transport.advertise_service(uuid) {
            Ok(()) => true,
            Err(e) => {
                error!("Emitter: service not added: {:?}", e);
                false
            }
        }
    }

    pub fn set_connect_callback(&mut self, callback: ConnectCallback) {
        self.transport.set_connect_callback(callback);
    }

    pub fn set_disconnect_callback(&mut self, callback: DisconnectCallback) {
        self.transport.set_disconnect_callback(callback);
    }

    pub fn connection(&self, handle: ConnHandle) -> Option<ConnectionInfo> {
        self.transport.connection(handle)
    }
}
