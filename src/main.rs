#![no_std]
#![no_main]

use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::{config::Config, interrupt};
use nrf_softdevice::{raw, Config as SdConfig, Softdevice};
use panic_probe as _;

use nrf52_co2_beacon::app::led::Led;
use nrf52_co2_beacon::app::publisher::Publisher;
use nrf52_co2_beacon::app::sensor::{FixedMeter, Meter};
use nrf52_co2_beacon::ble::service::{char_properties, CharacteristicDescriptor, ServiceDescriptor};
use nrf52_co2_beacon::ble::softdevice::{advertising_task, softdevice_task, SoftdeviceGatt, SoftdeviceRadio};
use nrf52_co2_beacon::config::{BeaconConfig, LED_FLASH};
use nrf52_co2_beacon::core::transport::{ConnHandle, SecurityMode, TimerHold};

/// Readings exposed over GATT while a central is connected
const MEASUREMENT_SERVICE: &str = "GTI-3A-MEDIDAS";

fn on_connect(handle: ConnHandle) {
    info!("Central connected, handle {}", handle);
}

fn on_disconnect(handle: ConnHandle, reason: u8) {
    info!("Central disconnected, handle {} reason {=u8:#x}", handle, reason);
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Starting nRF52840 CO2 beacon");

    // Configure interrupt priorities to avoid SoftDevice reserved levels (0, 1, 4)
    let mut nrf_config = Config::default();
    nrf_config.gpiote_interrupt_priority = interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = interrupt::Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    let sd_config = SdConfig {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        // Every name-derived UUID needs its own vendor-specific base
        common_vs_uuid: Some(raw::ble_common_cfg_vs_uuid_t { vs_uuid_count: 4 }),
        ..Default::default()
    };

    let sd = Softdevice::enable(&sd_config);
    info!("SoftDevice enabled");

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(advertising_task(sd)));

    let config = BeaconConfig::new();
    let mut publisher = Publisher::from_config(SoftdeviceRadio::new(sd), TimerHold, &config);
    if let Err(e) = publisher
        .emitter_mut()
        .power_on_with_callbacks(on_connect, on_disconnect)
    {
        error!("Radio power on failed: {:?}", e);
    }

    let mut gatt = SoftdeviceGatt::new(sd);
    let co2 = CharacteristicDescriptor::with_config(
        "CO2",
        char_properties::READ | char_properties::NOTIFY,
        SecurityMode::Open,
        SecurityMode::NoAccess,
        2,
    );
    let temperature = CharacteristicDescriptor::with_config(
        "TEMPERATURA",
        char_properties::READ | char_properties::NOTIFY,
        SecurityMode::Open,
        SecurityMode::NoAccess,
        2,
    );
    let service = match publisher.emitter_mut().add_service_with_characteristics_and_activate(
        ServiceDescriptor::new(MEASUREMENT_SERVICE),
        [co2, temperature],
        &mut gatt,
    ) {
        Ok((service, _announced)) => Some(service),
        Err(e) => {
            error!("Measurement service not registered: {:?}", e);
            None
        }
    };

    let mut led = unwrap!(Led::new(Output::new(p.P1_15, Level::Low, OutputDrive::Standard)));
    let mut meter = FixedMeter::new();
    let mut hold = TimerHold;
    let mut counter: u8 = 0;

    info!("System initialized, entering main loop");

    loop {
        let co2_ppm = meter.co2_ppm();
        let celsius = meter.temperature_celsius();

        let _ = led.flash(LED_FLASH, &mut hold).await;

        if let Some(service) = &service {
            for (characteristic, value) in service.characteristics().iter().zip([co2_ppm, celsius]) {
                if let Err(e) = characteristic.write(&mut gatt, &value.to_le_bytes()) {
                    debug!("Characteristic value not updated: {:?}", e);
                }
            }
        }

        if let Err(e) = publisher.publish_co2(co2_ppm, counter, config.hold).await {
            warn!("CO2 publish failed: {:?}", e);
        }
        if let Err(e) = publisher.publish_temperature(celsius, counter, config.hold).await {
            warn!("Temperature publish failed: {:?}", e);
        }

        counter = counter.wrapping_add(1);
    }
}
