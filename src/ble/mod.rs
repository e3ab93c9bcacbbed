//! BLE Layer
//!
//! Advertising control and GATT service registration on top of the
//! transport capabilities in [`crate::core::transport`]. The SoftDevice
//! implementation of those capabilities is only built for the firmware.

pub mod advertising;
pub mod service;
pub mod session;
#[cfg(feature = "firmware")]
pub mod softdevice;
