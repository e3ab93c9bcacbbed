//! Property tests for identity derivation and advert encoding

use nrf52_co2_beacon::core::identity::{BeaconIdentity, IDENTITY_LEN};
use nrf52_co2_beacon::core::payload::{
    free_payload_block, AdvPayload, IBeacon, APPLE_COMPANY_ID, FREE_PAYLOAD_FILLER, FREE_PAYLOAD_LEN,
    IBEACON_FRAME_LEN,
};
use proptest::prelude::*;

const PREFIX: [u8; 9] = [0x02, 0x01, 0x06, 0x1A, 0xFF, 0x4C, 0x00, 0x02, 0x15];

proptest! {
    #[test]
    fn test_identity_round_trip(name in "[ -~]{0,16}") {
        let identity = BeaconIdentity::from_name(&name);

        let mut expected = [0u8; IDENTITY_LEN];
        expected[..name.len()].copy_from_slice(name.as_bytes());
        prop_assert_eq!(identity.reversed(), expected);
    }
}

proptest! {
    #[test]
    fn test_identity_keeps_first_sixteen(name in "[ -~]{17,40}") {
        let identity = BeaconIdentity::from_name(&name);
        prop_assert_eq!(&identity.reversed()[..], &name.as_bytes()[..IDENTITY_LEN]);
    }
}

proptest! {
    #[test]
    fn test_ibeacon_frame(
        uuid in any::<[u8; 16]>(),
        major in any::<u16>(),
        minor in any::<u16>(),
        rssi in any::<i8>(),
    ) {
        let beacon = IBeacon::new(BeaconIdentity::from_bytes(uuid), major, minor, rssi);
        let payload = AdvPayload::ibeacon(APPLE_COMPANY_ID, &beacon);
        let bytes = payload.as_bytes();

        prop_assert_eq!(bytes.len(), IBEACON_FRAME_LEN);
        prop_assert_eq!(&bytes[..9], &PREFIX[..]);
        prop_assert_eq!(&bytes[9..25], &uuid[..]);
        prop_assert_eq!(&bytes[25..27], &major.to_be_bytes()[..]);
        prop_assert_eq!(&bytes[27..29], &minor.to_be_bytes()[..]);
        prop_assert_eq!(bytes[29], rssi as u8);
    }
}

proptest! {
    #[test]
    fn test_free_payload_block(data in prop::collection::vec(any::<u8>(), 0..40)) {
        let block = free_payload_block(APPLE_COMPANY_ID, &data);
        let used = data.len().min(FREE_PAYLOAD_LEN);

        prop_assert_eq!(&block[..4], &PREFIX[5..]);
        prop_assert_eq!(&block[4..4 + used], &data[..used]);
        prop_assert!(block[4 + used..].iter().all(|b| *b == FREE_PAYLOAD_FILLER));
    }
}

#[test]
fn test_free_payload_exact_fit() {
    let data: Vec<u8> = (1..=21).collect();
    let payload = AdvPayload::free(APPLE_COMPANY_ID, &data);

    assert_eq!(payload.len(), 30);
    assert_eq!(&payload.as_bytes()[..9], &PREFIX);
    assert_eq!(&payload.as_bytes()[9..], &data[..]);
}
