//! Publisher sequencing: emit, hold, stop

mod common;

use common::*;
use embassy_futures::block_on;
use embassy_time::Duration;
use nrf52_co2_beacon::app::publisher::{MeasurementKind, MeasurementRecord, Publisher};
use nrf52_co2_beacon::config::BeaconConfig;
use nrf52_co2_beacon::core::transport::TransportError;

const HOLD: Duration = Duration::from_millis(1000);

fn publisher(radio: FakeRadio, log: &Log) -> Publisher<'static, FakeRadio, RecordingHold> {
    Publisher::from_config(radio, RecordingHold::new(log), &BeaconConfig::new())
}

/// Major/minor bytes of the last iBeacon handed to the radio
fn major_minor(log: &Log) -> [u8; 4] {
    let payload = last_payload(log).unwrap();
    [payload[25], payload[26], payload[27], payload[28]]
}

#[test]
fn test_co2_end_to_end() {
    let log = new_log();
    let mut publisher = publisher(FakeRadio::new(&log), &log);
    publisher.power_on().unwrap();

    block_on(publisher.publish_co2(235, 3, HOLD)).unwrap();

    assert_eq!(major_minor(&log), [0x0B, 0x03, 0x00, 0xEB]);
    let payload = last_payload(&log).unwrap();
    assert_eq!(&payload[9..25], b"EPSG-GTI-PROY-3D");
    assert_eq!(payload[29], (-53i8) as u8);
}

#[test]
fn test_temperature_end_to_end() {
    let log = new_log();
    let mut publisher = publisher(FakeRadio::new(&log), &log);
    publisher.power_on().unwrap();

    block_on(publisher.publish_temperature(-12, 1, HOLD)).unwrap();

    assert_eq!(major_minor(&log), [0x0C, 0x01, 0xFF, 0xF4]);
}

#[test]
fn test_noise_tag() {
    let log = new_log();
    let mut publisher = publisher(FakeRadio::new(&log), &log);
    publisher.power_on().unwrap();

    block_on(publisher.publish_noise(40, 0xFF, HOLD)).unwrap();

    assert_eq!(major_minor(&log), [0x0D, 0xFF, 0x00, 0x28]);
}

#[test]
fn test_start_hold_stop_order() {
    let log = new_log();
    let mut publisher = publisher(FakeRadio::new(&log), &log);
    publisher.power_on().unwrap();

    block_on(publisher.publish_co2(235, 0, HOLD)).unwrap();

    let events = events(&log);
    let start = events.iter().position(|e| *e == Event::Start(0)).unwrap();
    assert_eq!(events[start + 1], Event::Hold(HOLD));
    assert_eq!(events[start + 2], Event::Stop);
    assert_eq!(events.len(), start + 3);
    assert!(!publisher.emitter().is_advertising());
}

#[test]
fn test_publish_while_advertising_stops_first() {
    let log = new_log();
    let mut publisher = publisher(FakeRadio::advertising(&log), &log);

    block_on(publisher.publish_co2(235, 3, HOLD)).unwrap();

    let events = events(&log);
    assert_eq!(events[0], Event::Stop);
    assert_single_session(&log);
}

#[test]
fn test_back_to_back_publishes() {
    let log = new_log();
    let mut publisher = publisher(FakeRadio::new(&log), &log);
    publisher.power_on().unwrap();

    for counter in 0..=u8::MAX {
        block_on(publisher.publish_co2(235, counter, HOLD)).unwrap();
        block_on(publisher.publish_temperature(-12, counter, HOLD)).unwrap();
    }

    assert_single_session(&log);
    let holds = events(&log).iter().filter(|e| matches!(e, Event::Hold(_))).count();
    assert_eq!(holds, 512);
    assert_eq!(major_minor(&log), [0x0C, 0xFF, 0xFF, 0xF4]);
}

#[test]
fn test_refused_start_still_holds_and_stops() {
    let log = new_log();
    let mut radio = FakeRadio::new(&log);
    radio.refuse_start = true;
    let mut publisher = publisher(radio, &log);
    publisher.power_on().unwrap();

    let result = block_on(publisher.publish_co2(235, 3, HOLD));

    assert_eq!(result, Err(TransportError::Refused(0x08)));
    let events = events(&log);
    assert_eq!(&events[events.len() - 2..], &[Event::Hold(HOLD), Event::Stop]);
}

#[test]
fn test_record_fields() {
    let record = MeasurementRecord::new(MeasurementKind::Temperature, 1, -12);
    assert_eq!(record.major(), 3073);
    assert_eq!(record.minor(), 0xFFF4);

    let record = MeasurementRecord::new(MeasurementKind::Co2, 3, 235);
    assert_eq!(record.major(), 2819);
}
