//! 128-bit Identities
//!
//! Beacon UUIDs, GATT service UUIDs and characteristic UUIDs are all 16-byte
//! values. Services and characteristics derive theirs from a short ASCII name
//! stored back to front, so the first character of the name lands in the most
//! significant (last) byte of the little-endian UUID.

/// Length of every identity in bytes
pub const IDENTITY_LEN: usize = 16;

/// A 16-byte identity used as an iBeacon proximity UUID or a 128-bit GATT UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BeaconIdentity([u8; IDENTITY_LEN]);

impl BeaconIdentity {
    /// Identity taken verbatim from 16 bytes
    pub const fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Derive an identity from a name.
    ///
    /// Byte `i` of the name is written to position `15 - i`. Names longer
    /// than 16 bytes are cut after the 16th byte. Positions a short name does
    /// not reach are zero.
    pub const fn from_name(name: &str) -> Self {
        let name = name.as_bytes();
        let mut out = [0u8; IDENTITY_LEN];
        let len = if name.len() > IDENTITY_LEN { IDENTITY_LEN } else { name.len() };

        let mut i = 0;
        while i < len {
            out[IDENTITY_LEN - i - 1] = name[i];
            i += 1;
        }

        Self(out)
    }

    /// Raw bytes in transmission order
    pub const fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Copy of the raw bytes
    pub const fn to_bytes(self) -> [u8; IDENTITY_LEN] {
        self.0
    }

    /// The identity read back to front.
    ///
    /// For a name-derived identity this gives the name followed by zero fill.
    pub fn reversed(&self) -> [u8; IDENTITY_LEN] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl From<[u8; IDENTITY_LEN]> for BeaconIdentity {
    fn from(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for BeaconIdentity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_stored_back_to_front() {
        let id = BeaconIdentity::from_name("0123456789ABCDEF");
        assert_eq!(id.as_bytes(), b"FEDCBA9876543210");
    }

    #[test]
    fn test_short_name_is_zero_filled() {
        let id = BeaconIdentity::from_name("GTI");
        let mut expected = [0u8; IDENTITY_LEN];
        expected[15] = b'G';
        expected[14] = b'T';
        expected[13] = b'I';
        assert_eq!(id.to_bytes(), expected);
    }

    #[test]
    fn test_long_name_is_truncated() {
        let id = BeaconIdentity::from_name("EPSG-GTI-PROY-3D-EXTRA");
        assert_eq!(&id.reversed(), b"EPSG-GTI-PROY-3D");
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(BeaconIdentity::from_name("").to_bytes(), [0u8; IDENTITY_LEN]);
    }

    #[test]
    fn test_from_name_is_const() {
        const ID: BeaconIdentity = BeaconIdentity::from_name("AB");
        assert_eq!(ID.as_bytes()[15], b'A');
        assert_eq!(ID.as_bytes()[14], b'B');
    }
}
