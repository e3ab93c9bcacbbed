//! Advertising Payload Encoding
//!
//! Builds the legacy advertising data handed to the radio. Two layouts are
//! supported, both carried as manufacturer specific data:
//!
//! ```text
//! iBeacon (31 bytes):
//!   02 01 06            flags: LE only, general discoverable
//!   1A FF               26 bytes of manufacturer specific data follow
//!   4C 00               company ID (little-endian)
//!   02                  beacon sub-type
//!   15                  remainder length (21)
//!   <16 bytes>          proximity UUID
//!   <2 bytes>           major (big-endian)
//!   <2 bytes>           minor (big-endian)
//!   <1 byte>            RSSI reference at 1 m
//!
//! Free payload (30 bytes):
//!   02 01 06 1A FF 4C 00 02 15 <21 bytes of caller data, filler padded>
//! ```
//!
//! The radio accepts advertising data once per session, so an [`AdvPayload`]
//! is always complete when built and is consumed by the transport.

use heapless::Vec;

use crate::core::identity::{BeaconIdentity, IDENTITY_LEN};

/// Maximum legacy advertising data length (BLE specification)
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Apple's Bluetooth SIG company identifier
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// AD types (Bluetooth Assigned Numbers)
pub mod ad_type {
    pub const FLAGS: u8 = 0x01;
    pub const COMPLETE_LIST_128BIT_SERVICE_UUID: u8 = 0x07;
    pub const SHORT_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const MANUFACTURER_SPECIFIC_DATA: u8 = 0xFF;
}

/// Flags value: LE general discoverable, BR/EDR not supported
pub const FLAGS_LE_ONLY_GENERAL_DISC: u8 = 0x06;

/// Beacon sub-type used by every iBeacon
pub const IBEACON_SUBTYPE: u8 = 0x02;

/// Declared length of the beacon body (UUID + major + minor + RSSI)
pub const IBEACON_BODY_LEN: usize = 21;

/// Total encoded iBeacon advertisement
pub const IBEACON_FRAME_LEN: usize = 31;

/// Company ID + sub-type + length + body
pub const MANUFACTURER_BLOCK_LEN: usize = 4 + IBEACON_BODY_LEN;

/// Bytes of caller data a free payload carries
pub const FREE_PAYLOAD_LEN: usize = IBEACON_BODY_LEN;

/// Flags, manufacturer header and block of a free-payload advertisement
pub const FREE_FRAME_LEN: usize = 5 + MANUFACTURER_BLOCK_LEN;

/// Placeholder for the unused tail of a short free payload
pub const FREE_PAYLOAD_FILLER: u8 = b'-';

/// Flags AD structure plus the manufacturer data header
const FLAGS_AND_HEADER: [u8; 5] = [
    0x02,
    ad_type::FLAGS,
    FLAGS_LE_ONLY_GENERAL_DISC,
    (MANUFACTURER_BLOCK_LEN + 1) as u8,
    ad_type::MANUFACTURER_SPECIFIC_DATA,
];

/// Payload encoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// The AD structure does not fit in the remaining space
    TooLong,
}

/// Contents of a standard iBeacon advertisement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IBeacon {
    pub identity: BeaconIdentity,
    pub major: u16,
    pub minor: u16,
    pub rssi: i8,
}

impl IBeacon {
    pub const fn new(identity: BeaconIdentity, major: u16, minor: u16, rssi: i8) -> Self {
        Self {
            identity,
            major,
            minor,
            rssi,
        }
    }

    /// Encode the full 31-byte advertisement
    pub fn encode(&self, company_id: u16) -> [u8; IBEACON_FRAME_LEN] {
        let mut frame = [0u8; IBEACON_FRAME_LEN];
        frame[..5].copy_from_slice(&FLAGS_AND_HEADER);
        frame[5..7].copy_from_slice(&company_id.to_le_bytes());
        frame[7] = IBEACON_SUBTYPE;
        frame[8] = IBEACON_BODY_LEN as u8;
        frame[9..9 + IDENTITY_LEN].copy_from_slice(self.identity.as_bytes());
        frame[25..27].copy_from_slice(&self.major.to_be_bytes());
        frame[27..29].copy_from_slice(&self.minor.to_be_bytes());
        frame[29] = self.rssi as u8;
        // frame[30] stays zero: a zero-length AD structure ends the significant data
        frame
    }
}

/// Manufacturer data block carrying caller-defined bytes in place of the
/// beacon body.
///
/// Only the first [`FREE_PAYLOAD_LEN`] bytes of `data` are used. A shorter
/// `data` is padded with [`FREE_PAYLOAD_FILLER`]. The declared remainder
/// length is always 21.
pub fn free_payload_block(company_id: u16, data: &[u8]) -> [u8; MANUFACTURER_BLOCK_LEN] {
    let mut block = [FREE_PAYLOAD_FILLER; MANUFACTURER_BLOCK_LEN];
    block[..2].copy_from_slice(&company_id.to_le_bytes());
    block[2] = IBEACON_SUBTYPE;
    block[3] = IBEACON_BODY_LEN as u8;

    let len = data.len().min(FREE_PAYLOAD_LEN);
    block[4..4 + len].copy_from_slice(&data[..len]);
    block
}

/// Complete advertising data for one advertising session.
///
/// Not `Clone`: handing it to the radio consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct AdvPayload {
    data: Vec<u8, MAX_ADV_DATA_LEN>,
}

impl AdvPayload {
    /// iBeacon advertisement
    pub fn ibeacon(company_id: u16, beacon: &IBeacon) -> Self {
        Self {
            data: Vec::from_array(beacon.encode(company_id)),
        }
    }

    /// Flags followed by a free-payload manufacturer block
    pub fn free(company_id: u16, payload: &[u8]) -> Self {
        let mut frame = [0u8; FREE_FRAME_LEN];
        frame[..5].copy_from_slice(&FLAGS_AND_HEADER);
        frame[5..].copy_from_slice(&free_payload_block(company_id, payload));
        Self {
            data: Vec::from_array(frame),
        }
    }

    /// Arbitrary pre-built advertising data
    pub fn from_builder(builder: AdvDataBuilder) -> Self {
        Self { data: builder.data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8, MAX_ADV_DATA_LEN> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Builder for AD structure sequences (scan response data, custom adverts)
#[derive(Debug, Clone, Default)]
pub struct AdvDataBuilder {
    data: Vec<u8, MAX_ADV_DATA_LEN>,
}

impl AdvDataBuilder {
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Remaining free bytes
    pub fn remaining(&self) -> usize {
        MAX_ADV_DATA_LEN - self.data.len()
    }

    /// Append one `[len][type][value]` structure
    pub fn push(&mut self, ad_type: u8, value: &[u8]) -> Result<&mut Self, PayloadError> {
        if value.len() + 2 > self.remaining() {
            return Err(PayloadError::TooLong);
        }

        self.data
            .push((value.len() + 1) as u8)
            .map_err(|_| PayloadError::TooLong)?;
        self.data.push(ad_type).map_err(|_| PayloadError::TooLong)?;
        self.data
            .extend_from_slice(value)
            .map_err(|_| PayloadError::TooLong)?;

        Ok(self)
    }

    /// Append the device name, shortening it when it does not fit
    pub fn push_name(&mut self, name: &str) -> Result<&mut Self, PayloadError> {
        let room = self.remaining().saturating_sub(2);
        if room == 0 && !name.is_empty() {
            return Err(PayloadError::TooLong);
        }

        let shortened = truncate_utf8(name, room);
        if shortened.len() == name.len() {
            self.push(ad_type::COMPLETE_LOCAL_NAME, name.as_bytes())
        } else {
            self.push(ad_type::SHORT_LOCAL_NAME, shortened.as_bytes())
        }
    }

    /// Append a single 128-bit service UUID
    pub fn push_service_uuid(&mut self, uuid: &BeaconIdentity) -> Result<&mut Self, PayloadError> {
        self.push(ad_type::COMPLETE_LIST_128BIT_SERVICE_UUID, uuid.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8, MAX_ADV_DATA_LEN> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
