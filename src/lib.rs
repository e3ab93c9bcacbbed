#![cfg_attr(not(test), no_std)]

//! nRF52 CO2 Beacon Firmware Library
//!
//! Broadcasts sensor readings as iBeacon advertisements and optionally exposes
//! a GATT service. The library is organized into layers:
//!
//! - `core`: identities, advertising payload encoding, transport capabilities
//! - `ble`: advertising controller, service registrar, SoftDevice transport
//! - `app`: measurement publisher, sensor readings, status LED
//! - `config`: compile-time firmware settings

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod app;
pub mod ble;
pub mod config;
pub mod core;
