//! Core Infrastructure
//!
//! Hardware-independent building blocks: 128-bit identities, advertising
//! payload encoding and the capability traits the vendor BLE stack is
//! reached through.

pub mod identity;
pub mod payload;
pub mod transport;
