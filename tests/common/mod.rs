//! Shared fakes for the integration tests
//!
//! The radio, GATT backend and hold all append to one ordered event log so a
//! test can assert how calls interleave across them.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embassy_time::Duration;
use nrf52_co2_beacon::core::identity::BeaconIdentity;
use nrf52_co2_beacon::core::payload::AdvPayload;
use nrf52_co2_beacon::core::transport::{
    AdvInterval, CharHandle, CharacteristicConfig, ConnHandle, ConnectCallback, ConnectionInfo, DisconnectCallback,
    GattError, GattTransport, Hold, RadioTransport, ServiceHandle, TransportError, TxPower, WriteCallback,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Begin,
    Start(u16),
    Stop,
    TxPower(TxPower),
    Name(String),
    Interval(AdvInterval),
    Restart(bool),
    FastTimeout(u16),
    Payload(Vec<u8>),
    AdvertiseService([u8; 16]),
    ServiceBegin([u8; 16]),
    CharacteristicBegin(u16, CharacteristicConfig),
    Write(u16, Vec<u8>),
    Notify(u16, Vec<u8>),
    WriteCallback(u16),
    Hold(Duration),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn events(log: &Log) -> Vec<Event> {
    log.borrow().clone()
}

/// Last payload handed to the radio
pub fn last_payload(log: &Log) -> Option<Vec<u8>> {
    log.borrow().iter().rev().find_map(|e| match e {
        Event::Payload(bytes) => Some(bytes.clone()),
        _ => None,
    })
}

/// Panics if a start is ever issued while a previous session is still on air
pub fn assert_single_session(log: &Log) {
    let mut on_air = false;
    for (i, event) in log.borrow().iter().enumerate() {
        match event {
            Event::Start(_) => {
                assert!(!on_air, "start at event {} while advertising", i);
                on_air = true;
            }
            Event::Stop => on_air = false,
            _ => {}
        }
    }
}

/// Radio that records every call and enforces the stack's sequencing rules
pub struct FakeRadio {
    log: Log,
    initialized: bool,
    advertising: bool,
    payload_set: bool,
    pub refuse_start: bool,
    pub refuse_service: bool,
    pub connect_callback: Option<ConnectCallback>,
    pub disconnect_callback: Option<DisconnectCallback>,
    pub connections: Vec<ConnectionInfo>,
}

impl FakeRadio {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            initialized: false,
            advertising: false,
            payload_set: false,
            refuse_start: false,
            refuse_service: false,
            connect_callback: None,
            disconnect_callback: None,
            connections: Vec::new(),
        }
    }

    /// Radio that has already been through `begin()` and is advertising
    pub fn advertising(log: &Log) -> Self {
        let mut radio = Self::new(log);
        radio.initialized = true;
        radio.advertising = true;
        radio.payload_set = true;
        radio
    }

    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    fn ready(&self) -> Result<(), TransportError> {
        if self.initialized {
            Ok(())
        } else {
            Err(TransportError::NotInitialized)
        }
    }

    /// Simulate the stack reporting a new connection
    pub fn connect(&mut self, handle: ConnHandle) {
        self.advertising = false;
        self.connections.push(ConnectionInfo {
            handle,
            peer_addr: [0xC0, 0xFF, 0xEE, 0x00, 0x00, handle as u8],
            mtu: 23,
        });
        if let Some(cb) = self.connect_callback {
            cb(handle);
        }
    }

    pub fn disconnect(&mut self, handle: ConnHandle, reason: u8) {
        self.connections.retain(|c| c.handle != handle);
        if let Some(cb) = self.disconnect_callback {
            cb(handle, reason);
        }
    }
}

impl RadioTransport for FakeRadio {
    fn begin(&mut self) -> Result<(), TransportError> {
        self.initialized = true;
        self.record(Event::Begin);
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.advertising
    }

    fn start_advertising(&mut self, timeout_secs: u16) -> Result<(), TransportError> {
        self.ready()?;
        if self.advertising {
            return Err(TransportError::AlreadyAdvertising);
        }
        if self.refuse_start {
            return Err(TransportError::Refused(0x08));
        }
        self.advertising = true;
        self.record(Event::Start(timeout_secs));
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.ready()?;
        self.advertising = false;
        self.payload_set = false;
        self.record(Event::Stop);
        Ok(())
    }

    fn set_tx_power(&mut self, power: TxPower) -> Result<(), TransportError> {
        self.ready()?;
        self.record(Event::TxPower(power));
        Ok(())
    }

    fn set_name(&mut self, name: &str) -> Result<(), TransportError> {
        self.ready()?;
        self.record(Event::Name(name.to_string()));
        Ok(())
    }

    fn set_interval(&mut self, interval: AdvInterval) -> Result<(), TransportError> {
        self.ready()?;
        self.record(Event::Interval(interval));
        Ok(())
    }

    fn set_restart_on_disconnect(&mut self, restart: bool) {
        self.record(Event::Restart(restart));
    }

    fn set_fast_timeout(&mut self, secs: u16) {
        self.record(Event::FastTimeout(secs));
    }

    fn set_payload(&mut self, payload: AdvPayload) -> Result<(), TransportError> {
        self.ready()?;
        if self.payload_set {
            return Err(TransportError::PayloadAlreadySet);
        }
        self.payload_set = true;
        self.record(Event::Payload(payload.as_bytes().to_vec()));
        Ok(())
    }

    fn advertise_service(&mut self, uuid: &BeaconIdentity) -> Result<(), TransportError> {
        self.ready()?;
        if self.refuse_service {
            return Err(TransportError::Refused(0x04));
        }
        self.record(Event::AdvertiseService(uuid.to_bytes()));
        Ok(())
    }

    fn set_connect_callback(&mut self, callback: ConnectCallback) {
        self.connect_callback = Some(callback);
    }

    fn set_disconnect_callback(&mut self, callback: DisconnectCallback) {
        self.disconnect_callback = Some(callback);
    }

    fn connection(&self, handle: ConnHandle) -> Option<ConnectionInfo> {
        self.connections.iter().find(|c| c.handle == handle).copied()
    }
}

/// GATT backend handing out sequential handles
pub struct FakeGatt {
    log: Log,
    next_handle: u16,
    characteristics_added: usize,
    pub refuse_service: bool,
    /// Index (in activation order) of a characteristic the stack refuses
    pub refuse_characteristic: Option<usize>,
    pub write_callbacks: Vec<(CharHandle, WriteCallback)>,
}

impl FakeGatt {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            next_handle: 0x000C,
            characteristics_added: 0,
            refuse_service: false,
            refuse_characteristic: None,
            write_callbacks: Vec::new(),
        }
    }

    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }

    fn allocate(&mut self, count: u16) -> u16 {
        let handle = self.next_handle;
        self.next_handle += count;
        handle
    }

    /// Simulate a central writing `data` to `handle`
    pub fn central_write(&self, conn: ConnHandle, handle: CharHandle, data: &[u8]) -> bool {
        match self.write_callbacks.iter().find(|(h, _)| *h == handle) {
            Some((_, cb)) => {
                cb(conn, handle, data);
                true
            }
            None => false,
        }
    }
}

impl GattTransport for FakeGatt {
    fn begin_service(&mut self, uuid: &BeaconIdentity) -> Result<ServiceHandle, GattError> {
        self.record(Event::ServiceBegin(uuid.to_bytes()));
        if self.refuse_service {
            return Err(GattError::Refused(0x07));
        }
        Ok(ServiceHandle(self.allocate(1)))
    }

    fn begin_characteristic(
        &mut self,
        service: ServiceHandle,
        config: &CharacteristicConfig,
    ) -> Result<CharHandle, GattError> {
        let index = self.characteristics_added;
        self.characteristics_added += 1;
        self.record(Event::CharacteristicBegin(service.0, *config));
        if self.refuse_characteristic == Some(index) {
            return Err(GattError::Refused(0x13));
        }
        // Declaration, value and CCCD
        Ok(CharHandle(self.allocate(3) + 1))
    }

    fn write(&mut self, handle: CharHandle, data: &[u8]) -> Result<usize, GattError> {
        self.record(Event::Write(handle.0, data.to_vec()));
        Ok(data.len())
    }

    fn notify(&mut self, handle: CharHandle, data: &[u8]) -> Result<usize, GattError> {
        self.record(Event::Notify(handle.0, data.to_vec()));
        Ok(data.len())
    }

    fn set_write_callback(&mut self, handle: CharHandle, callback: WriteCallback) {
        self.record(Event::WriteCallback(handle.0));
        self.write_callbacks.push((handle, callback));
    }
}

/// Hold that returns immediately and records the requested duration
pub struct RecordingHold {
    log: Log,
}

impl RecordingHold {
    pub fn new(log: &Log) -> Self {
        Self { log: log.clone() }
    }
}

impl Hold for RecordingHold {
    async fn hold(&mut self, duration: Duration) {
        self.log.borrow_mut().push(Event::Hold(duration));
    }
}
