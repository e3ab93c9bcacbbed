//! SoftDevice Transport
//!
//! [`RadioTransport`] and [`GattTransport`] on top of the S140 SoftDevice.
//!
//! Advertising is driven by [`advertising_task`]: the radio handle stages a
//! session (advertising data, scan response, interval, tx power) and posts it
//! through a latest-wins signal; the task runs `advertise_connectable` until
//! the session is replaced, stopped or a central connects. Commands posted
//! during a connection collapse to the newest one, which decides what goes
//! back on air after the disconnect. Connect and disconnect
//! callbacks are dispatched from the raw SoftDevice event stream in
//! [`softdevice_task`], which is the only place the disconnect reason is
//! visible.

use core::cell::{Cell, RefCell};
use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};
use nrf_softdevice::ble::gatt_server::{self, WriteOp};
use nrf_softdevice::ble::peripheral::{self, Config as PeripheralConfig, ConnectableAdvertisement};
use nrf_softdevice::ble::{Connection, TxPower as SdTxPower, Uuid};
use nrf_softdevice::{raw, RawError, Softdevice};

use crate::ble::service::{cccd_permissions, char_properties};
use crate::ble::session::{resume_after_disconnect, AdvCommand, SessionState};
use crate::core::identity::BeaconIdentity;
use crate::core::payload::{truncate_utf8, AdvDataBuilder, AdvPayload, MAX_ADV_DATA_LEN};
use crate::core::transport::{
    AdvInterval, CharHandle, CharacteristicConfig, ConnHandle, ConnectCallback, ConnectionInfo, DisconnectCallback,
    GattError, GattTransport, RadioTransport, SecurityMode, ServiceHandle, TransportError, TxPower, WriteCallback,
};

/// Simultaneous peripheral links configured in the SoftDevice
pub const MAX_CONNECTIONS: usize = 1;

/// Characteristics that can have a write callback installed
pub const MAX_WRITE_CALLBACKS: usize = 8;

/// 128-bit service UUIDs that fit in the scan response next to the name
pub const MAX_ADVERTISED_SERVICES: usize = 1;

/// Default ATT MTU
const DEFAULT_ATT_MTU: u16 = 23;

/// One advertising session as handed to the advertising task
pub struct AdvSession {
    adv_data: Vec<u8, MAX_ADV_DATA_LEN>,
    scan_data: Vec<u8, MAX_ADV_DATA_LEN>,
    config: PeripheralConfig,
    restart_on_disconnect: bool,
}

static ADV_COMMAND: Signal<CriticalSectionRawMutex, AdvCommand<AdvSession>> = Signal::new();

/// Advertising is on air (cleared when a central connects or the SoftDevice gives up)
static ADVERTISING: AtomicBool = AtomicBool::new(false);

static CONNECT_CALLBACK: BlockingMutex<CriticalSectionRawMutex, Cell<Option<ConnectCallback>>> =
    BlockingMutex::new(Cell::new(None));

static DISCONNECT_CALLBACK: BlockingMutex<CriticalSectionRawMutex, Cell<Option<DisconnectCallback>>> =
    BlockingMutex::new(Cell::new(None));

static WRITE_CALLBACKS: BlockingMutex<
    CriticalSectionRawMutex,
    RefCell<Vec<(CharHandle, WriteCallback), MAX_WRITE_CALLBACKS>>,
> = BlockingMutex::new(RefCell::new(Vec::new()));

static CONNECTIONS: BlockingMutex<CriticalSectionRawMutex, RefCell<Vec<ConnectionInfo, MAX_CONNECTIONS>>> =
    BlockingMutex::new(RefCell::new(Vec::new()));

fn refused(e: RawError) -> TransportError {
    TransportError::Refused(e as u32)
}

fn gatt_refused(e: RawError) -> GattError {
    GattError::Refused(e as u32)
}

fn to_sd_tx_power(power: TxPower) -> SdTxPower {
    match power {
        TxPower::Minus40dBm => SdTxPower::Minus40dBm,
        TxPower::Minus20dBm => SdTxPower::Minus20dBm,
        TxPower::Minus16dBm => SdTxPower::Minus16dBm,
        TxPower::Minus12dBm => SdTxPower::Minus12dBm,
        TxPower::Minus8dBm => SdTxPower::Minus8dBm,
        TxPower::Minus4dBm => SdTxPower::Minus4dBm,
        TxPower::ZerodBm => SdTxPower::ZerodBm,
        TxPower::Plus3dBm => SdTxPower::Plus3dBm,
        TxPower::Plus4dBm => SdTxPower::Plus4dBm,
        TxPower::Plus8dBm => SdTxPower::Plus8dBm,
    }
}

fn sec_mode(mode: SecurityMode) -> raw::ble_gap_conn_sec_mode_t {
    let (sm, lv) = match mode {
        SecurityMode::NoAccess => (0, 0),
        SecurityMode::Open => (1, 1),
        SecurityMode::EncryptedNoMitm => (1, 2),
        SecurityMode::EncryptedMitm => (1, 3),
    };
    raw::ble_gap_conn_sec_mode_t {
        _bitfield_1: raw::ble_gap_conn_sec_mode_t::new_bitfield_1(sm, lv),
    }
}

/// Radio handle backed by the SoftDevice peripheral role
pub struct SoftdeviceRadio {
    sd: &'static Softdevice,
    initialized: bool,
    session: SessionState,
    adv_data: Vec<u8, MAX_ADV_DATA_LEN>,
    name: String<MAX_ADV_DATA_LEN>,
    services: Vec<BeaconIdentity, MAX_ADVERTISED_SERVICES>,
    config: PeripheralConfig,
    restart_on_disconnect: bool,
    fast_timeout: u16,
}

impl SoftdeviceRadio {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self {
            sd,
            initialized: false,
            session: SessionState::new(),
            adv_data: Vec::new(),
            name: String::new(),
            services: Vec::new(),
            config: PeripheralConfig::default(),
            restart_on_disconnect: false,
            fast_timeout: 0,
        }
    }

    pub fn softdevice(&self) -> &'static Softdevice {
        self.sd
    }

    fn ensure_initialized(&self) -> Result<(), TransportError> {
        if self.initialized {
            Ok(())
        } else {
            Err(TransportError::NotInitialized)
        }
    }

    /// Scan response: advertised services first, then the name (shortened if needed)
    fn scan_data(&self) -> Vec<u8, MAX_ADV_DATA_LEN> {
        let mut builder = AdvDataBuilder::new();
        for uuid in &self.services {
            if builder.push_service_uuid(uuid).is_err() {
                warn!("Radio: service UUID does not fit in the scan response");
            }
        }
        if !self.name.is_empty() && builder.push_name(&self.name).is_err() {
            warn!("Radio: no room for the name in the scan response");
        }
        builder.into_bytes()
    }
}

impl RadioTransport for SoftdeviceRadio {
    fn begin(&mut self) -> Result<(), TransportError> {
        self.initialized = true;
        info!("Radio: SoftDevice peripheral ready");
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        ADVERTISING.load(Ordering::Relaxed)
    }

    fn start_advertising(&mut self, timeout_secs: u16) -> Result<(), TransportError> {
        self.ensure_initialized()?;
        if self.is_advertising() {
            return Err(TransportError::AlreadyAdvertising);
        }

        // Timeout is given to the SoftDevice in 10 ms units
        self.config.timeout = match timeout_secs {
            0 => None,
            secs => Some(secs.saturating_mul(100)),
        };

        let session = AdvSession {
            adv_data: self.adv_data.clone(),
            scan_data: self.scan_data(),
            config: self.config,
            restart_on_disconnect: self.restart_on_disconnect,
        };

        ADV_COMMAND.signal(AdvCommand::Start(session));
        self.session.start();
        ADVERTISING.store(true, Ordering::Relaxed);
        debug!(
            "Radio: advertising requested, interval={} fast_timeout={}s",
            self.config.interval, self.fast_timeout
        );
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<(), TransportError> {
        self.ensure_initialized()?;
        ADV_COMMAND.signal(AdvCommand::Stop);
        ADVERTISING.store(false, Ordering::Relaxed);
        self.session.stop();
        Ok(())
    }

    fn set_tx_power(&mut self, power: TxPower) -> Result<(), TransportError> {
        self.ensure_initialized()?;
        self.config.tx_power = to_sd_tx_power(power);
        Ok(())
    }

    fn set_name(&mut self, name: &str) -> Result<(), TransportError> {
        self.ensure_initialized()?;

        let name: String<MAX_ADV_DATA_LEN> = String::try_from(truncate_utf8(name, MAX_ADV_DATA_LEN))
            .map_err(|_| TransportError::Refused(raw::NRF_ERROR_DATA_SIZE))?;

        let mode = sec_mode(SecurityMode::Open);
        let ret = unsafe { raw::sd_ble_gap_device_name_set(&mode as _, name.as_ptr(), name.len() as u16) };
        RawError::convert(ret).map_err(refused)?;

        self.name = name;
        Ok(())
    }

    fn set_interval(&mut self, interval: AdvInterval) -> Result<(), TransportError> {
        self.ensure_initialized()?;
        // The peripheral API takes a single interval
        self.config.interval = interval.max as u32;
        Ok(())
    }

    fn set_restart_on_disconnect(&mut self, restart: bool) {
        self.restart_on_disconnect = restart;
    }

    fn set_fast_timeout(&mut self, secs: u16) {
        self.fast_timeout = secs;
    }

    fn set_payload(&mut self, payload: AdvPayload) -> Result<(), TransportError> {
        self.ensure_initialized()?;
        self.session.accept_payload(self.is_advertising())?;
        self.adv_data = payload.into_bytes();
        Ok(())
    }

    fn advertise_service(&mut self, uuid: &BeaconIdentity) -> Result<(), TransportError> {
        self.ensure_initialized()?;
        self.services
            .push(*uuid)
            .map_err(|_| TransportError::Refused(raw::NRF_ERROR_NO_MEM))
    }

    fn set_connect_callback(&mut self, callback: ConnectCallback) {
        CONNECT_CALLBACK.lock(|cb| cb.set(Some(callback)));
    }

    fn set_disconnect_callback(&mut self, callback: DisconnectCallback) {
        DISCONNECT_CALLBACK.lock(|cb| cb.set(Some(callback)));
    }

    fn connection(&self, handle: ConnHandle) -> Option<ConnectionInfo> {
        CONNECTIONS.lock(|conns| conns.borrow().iter().find(|c| c.handle == handle).copied())
    }
}

/// GATT server side: raw service/characteristic registration and value access
pub struct SoftdeviceGatt {
    sd: &'static Softdevice,
}

impl SoftdeviceGatt {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self { sd }
    }
}

impl GattTransport for SoftdeviceGatt {
    fn begin_service(&mut self, uuid: &BeaconIdentity) -> Result<ServiceHandle, GattError> {
        let uuid = Uuid::new_128(uuid.as_bytes());

        let mut service_handle: u16 = 0;
        let ret = unsafe {
            raw::sd_ble_gatts_service_add(
                raw::BLE_GATTS_SRVC_TYPE_PRIMARY as u8,
                uuid.as_raw_ptr(),
                &mut service_handle as _,
            )
        };
        RawError::convert(ret).map_err(gatt_refused)?;

        info!("Gatt: service added, handle {}", service_handle);
        Ok(ServiceHandle(service_handle))
    }

    fn begin_characteristic(
        &mut self,
        service: ServiceHandle,
        config: &CharacteristicConfig,
    ) -> Result<CharHandle, GattError> {
        let uuid = Uuid::new_128(config.uuid.as_bytes());
        let props = config.properties;

        let mut cccd_attr_md: raw::ble_gatts_attr_md_t = unsafe { mem::zeroed() };
        let cccd = cccd_permissions(config);
        if let Some((read_perm, write_perm)) = cccd {
            cccd_attr_md.read_perm = sec_mode(read_perm);
            cccd_attr_md.write_perm = sec_mode(write_perm);
            cccd_attr_md.set_vloc(raw::BLE_GATTS_VLOC_STACK as u8);
        }

        let mut attr_md: raw::ble_gatts_attr_md_t = unsafe { mem::zeroed() };
        attr_md.read_perm = sec_mode(config.read_perm);
        attr_md.write_perm = sec_mode(config.write_perm);
        attr_md.set_vloc(raw::BLE_GATTS_VLOC_STACK as u8);
        attr_md.set_vlen(1);

        let mut attr: raw::ble_gatts_attr_t = unsafe { mem::zeroed() };
        attr.p_uuid = unsafe { uuid.as_raw_ptr() };
        attr.p_attr_md = &attr_md as _;
        attr.init_len = 0;
        attr.max_len = config.max_len as u16;

        let mut char_md: raw::ble_gatts_char_md_t = unsafe { mem::zeroed() };
        char_md.char_props.set_broadcast((props & char_properties::BROADCAST != 0) as u8);
        char_md.char_props.set_read((props & char_properties::READ != 0) as u8);
        char_md
            .char_props
            .set_write_wo_resp((props & char_properties::WRITE_WITHOUT_RESPONSE != 0) as u8);
        char_md.char_props.set_write((props & char_properties::WRITE != 0) as u8);
        char_md.char_props.set_notify((props & char_properties::NOTIFY != 0) as u8);
        char_md.char_props.set_indicate((props & char_properties::INDICATE != 0) as u8);
        if cccd.is_some() {
            char_md.p_cccd_md = &mut cccd_attr_md;
        }

        let mut char_handles: raw::ble_gatts_char_handles_t = unsafe { mem::zeroed() };
        let ret = unsafe {
            raw::sd_ble_gatts_characteristic_add(
                service.0,
                &mut char_md as _,
                &mut attr as _,
                &mut char_handles as _,
            )
        };
        RawError::convert(ret).map_err(gatt_refused)?;

        debug!(
            "Gatt: characteristic added, value_handle: {}, cccd_handle: {}",
            char_handles.value_handle, char_handles.cccd_handle
        );
        Ok(CharHandle(char_handles.value_handle))
    }

    fn write(&mut self, handle: CharHandle, data: &[u8]) -> Result<usize, GattError> {
        match gatt_server::set_value(self.sd, handle.0, data) {
            Ok(()) => Ok(data.len()),
            Err(gatt_server::SetValueError::Raw(e)) => Err(gatt_refused(e)),
        }
    }

    fn notify(&mut self, handle: CharHandle, data: &[u8]) -> Result<usize, GattError> {
        let conn_handle = CONNECTIONS
            .lock(|conns| conns.borrow().first().map(|c| c.handle))
            .ok_or(GattError::Refused(raw::BLE_ERROR_INVALID_CONN_HANDLE))?;

        let mut len = data.len() as u16;
        let params = raw::ble_gatts_hvx_params_t {
            handle: handle.0,
            type_: raw::BLE_GATT_HVX_NOTIFICATION as u8,
            offset: 0,
            p_len: &mut len,
            p_data: data.as_ptr(),
        };
        let ret = unsafe { raw::sd_ble_gatts_hvx(conn_handle, &params) };
        RawError::convert(ret).map_err(gatt_refused)?;

        Ok(len as usize)
    }

    fn set_write_callback(&mut self, handle: CharHandle, callback: WriteCallback) {
        WRITE_CALLBACKS.lock(|cbs| {
            let mut cbs = cbs.borrow_mut();
            if let Some(entry) = cbs.iter_mut().find(|(h, _)| *h == handle) {
                entry.1 = callback;
            } else if cbs.push((handle, callback)).is_err() {
                warn!("Gatt: write callback table full, handle {} ignored", handle.0);
            }
        });
    }
}

/// Routes central writes to the installed write callbacks
pub struct BeaconGattServer;

impl gatt_server::Server for BeaconGattServer {
    type Event = ();

    fn on_write(&self, conn: &Connection, handle: u16, _op: WriteOp, _offset: usize, data: &[u8]) -> Option<()> {
        let conn_handle = conn.handle().unwrap_or(0);
        let callback = WRITE_CALLBACKS.lock(|cbs| {
            cbs.borrow()
                .iter()
                .find(|(h, _)| h.0 == handle)
                .map(|(_, cb)| *cb)
        });

        match callback {
            Some(cb) => cb(conn_handle, CharHandle(handle), data),
            None => debug!("Gatt: write to handle {} without callback", handle),
        }
        None
    }
}

fn on_ble_event(evt: *const raw::ble_evt_t) {
    let evt_id = unsafe { (*evt).header.evt_id } as u32;
    match evt_id {
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_CONNECTED => {
            let conn_handle = unsafe { (*evt).evt.gap_evt.conn_handle };
            if let Some(cb) = CONNECT_CALLBACK.lock(|cb| cb.get()) {
                cb(conn_handle);
            }
        }
        raw::BLE_GAP_EVTS_BLE_GAP_EVT_DISCONNECTED => {
            let (conn_handle, reason) = unsafe {
                let gap_evt = &(*evt).evt.gap_evt;
                (gap_evt.conn_handle, gap_evt.params.disconnected.reason)
            };
            if let Some(cb) = DISCONNECT_CALLBACK.lock(|cb| cb.get()) {
                cb(conn_handle, reason);
            }
        }
        _ => {}
    }
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run_with_callback(on_ble_event).await
}

#[embassy_executor::task]
pub async fn advertising_task(sd: &'static Softdevice) {
    info!("Starting advertising task...");
    let server = BeaconGattServer;
    let mut pending: Option<AdvSession> = None;

    loop {
        let session = match pending.take() {
            Some(session) => session,
            None => match ADV_COMMAND.wait().await {
                AdvCommand::Start(session) => session,
                AdvCommand::Stop => {
                    ADVERTISING.store(false, Ordering::Relaxed);
                    continue;
                }
            },
        };

        let advertisement = ConnectableAdvertisement::ScannableUndirected {
            adv_data: &session.adv_data,
            scan_data: &session.scan_data,
        };
        let outcome = select(
            peripheral::advertise_connectable(sd, advertisement, &session.config),
            ADV_COMMAND.wait(),
        )
        .await;

        match outcome {
            Either::First(Ok(conn)) => {
                ADVERTISING.store(false, Ordering::Relaxed);
                let conn_handle = conn.handle().unwrap_or(0);
                info!("Advertising task: central connected, handle {}", conn_handle);

                let info = ConnectionInfo {
                    handle: conn_handle,
                    peer_addr: conn.peer_address().bytes(),
                    mtu: DEFAULT_ATT_MTU,
                };
                CONNECTIONS.lock(|conns| {
                    if conns.borrow_mut().push(info).is_err() {
                        warn!("Advertising task: connection table full, handle {}", conn_handle);
                    }
                });

                let e = gatt_server::run(&conn, &server, |_| {}).await;
                debug!("Advertising task: gatt server exited: {:?}", e);

                CONNECTIONS.lock(|conns| conns.borrow_mut().retain(|c| c.handle != conn_handle));

                let restart = session.restart_on_disconnect;
                pending = resume_after_disconnect(session, restart, ADV_COMMAND.try_take());
                ADVERTISING.store(pending.is_some(), Ordering::Relaxed);
            }
            Either::First(Err(e)) => {
                warn!("Advertising task: advertising ended: {:?}", e);
                ADVERTISING.store(false, Ordering::Relaxed);
            }
            Either::Second(AdvCommand::Start(next)) => pending = Some(next),
            Either::Second(AdvCommand::Stop) => {
                ADVERTISING.store(false, Ordering::Relaxed);
                debug!("Advertising task: stopped");
            }
        }
    }
}
