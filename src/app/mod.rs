//! Application Layer
//!
//! Measurement publishing and the board peripherals it drives.

pub mod led;
pub mod publisher;
pub mod sensor;
