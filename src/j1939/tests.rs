//! Unit tests for the J1939 identifier layout and frame conversion.
use super::*;
use embedded_can::StandardId;

//==================================================================================J1939_ID
#[test]
/// Priority, PGN and source land in their bit fields.
fn encodes_pdu2_identifier() {
    let id = J1939Id::new(3, 0xFEF1, 0x17, 0x00).unwrap();
    assert_eq!(id.as_raw(), 0x0CFE_F117);
    assert_eq!(id.destination(), BROADCAST);
    assert_eq!(id.pdu(), PduFormat::Pdu2 { group_extension: 0xF1 });
}

#[test]
/// PDU1 identifiers carry the destination in the PDU specific byte.
fn encodes_pdu1_identifier() {
    let id = J1939Id::new(6, 0xEA00, 0x23, 0x50).unwrap();
    assert_eq!(id.as_raw(), 0x18EA_5023);
    assert_eq!(id.pgn(), 0xEA00);
    assert_eq!(id.destination(), 0x50);
    assert_eq!(id.pdu(), PduFormat::Pdu1 { destination: 0x50 });
}

#[test]
/// Data page and reserved bits come from PGN bits 16 and 17.
fn folds_page_bits() {
    let id = J1939Id::new(0, 0x3_F004, 0x01, 0).unwrap();
    assert!(id.data_page());
    assert!(id.reserved());
    assert_eq!(id.as_raw(), 0x03F0_0401);
    assert_eq!(id.pgn(), 0x3_F004);
}

#[test]
/// Accessors split an arbitrary raw identifier.
fn splits_raw_identifier() {
    let id = J1939Id::from_raw(0xFAE2_25D1);
    assert_eq!(id.as_raw(), 0x1AE2_25D1);
    assert_eq!(id.priority(), 0b110);
    assert_eq!(id.source(), 0xD1);
    assert_eq!(id.pdu_format(), 0xE2);
    assert_eq!(id.pgn(), 0x2_E200);
    assert_eq!(id.destination(), 0x25);
}

#[test]
/// Out of range fields are rejected instead of truncated.
fn rejects_malformed_fields() {
    assert_eq!(J1939Id::new(8, 0xFEF1, 0, 0), Err(Error::InvalidParameter));
    assert_eq!(J1939Id::new(3, 0x4_0000, 0, 0), Err(Error::InvalidParameter));
    assert_eq!(J1939Id::new(3, 0xEA01, 0, 0), Err(Error::InvalidParameter));
}

//==================================================================================J1939_FRAME
#[test]
/// Encoding produces an extended data frame with the payload.
fn encodes_frame() {
    let j = J1939Frame::new(3, 0xFEF1, 0x17, BROADCAST, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let frame = j.encode().unwrap();
    assert_eq!(frame.id, Id::Extended(ExtendedId::new(0x0CFE_F117).unwrap()));
    assert_eq!(frame.payload(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(!frame.remote);
}

#[test]
/// Priority above 7 and data length code above 8 fail to encode.
fn rejects_invalid_frames() {
    let mut j = J1939Frame::new(3, 0xFEF1, 0x17, BROADCAST, &[]).unwrap();
    j.priority = 8;
    assert_eq!(j.encode(), Err(Error::InvalidParameter));
    j.priority = 7;
    j.dlc = 9;
    assert_eq!(j.encode(), Err(Error::InvalidParameter));
    assert_eq!(
        J1939Frame::new(3, 0xFEF1, 0x17, BROADCAST, &[0; 9]),
        Err(Error::InvalidParameter)
    );
}

#[test]
/// PDU1 frames keep their destination through encode and decode.
fn pdu1_round_trip() {
    for priority in 0..=MAX_PRIORITY {
        let j = J1939Frame::new(priority, 0xEF00, 0x80, 0x42, &[0xAA, 0xBB]).unwrap();
        let decoded = J1939Frame::decode(&j.encode().unwrap()).unwrap();
        assert_eq!(decoded, j);
    }
}

#[test]
/// PDU2 frames decode as broadcast whatever destination was given.
fn pdu2_decodes_as_broadcast() {
    let j = J1939Frame::new(3, 0xFEF1, 0x17, 0x42, &[9]).unwrap();
    let decoded = J1939Frame::decode(&j.encode().unwrap()).unwrap();
    assert_eq!(decoded.destination, BROADCAST);
    assert_eq!(decoded.pgn, 0xFEF1);
    assert_eq!(decoded.priority, 3);
    assert_eq!(decoded.source, 0x17);
    assert_eq!(decoded.payload(), &[9]);
    assert!(decoded.is_broadcast());
}

#[test]
/// Standard identifiers have no J1939 form.
fn standard_frame_is_a_protocol_mismatch() {
    let frame = Frame::with_data(StandardId::new(0x123).unwrap(), &[1]).unwrap();
    assert_eq!(J1939Frame::decode(&frame), Err(Error::Protocol));
    assert_eq!(J1939Frame::try_from(&frame), Err(Error::Protocol));
}

#[test]
/// The receive timestamp is carried over.
fn decode_keeps_timestamp() {
    let mut frame = J1939Frame::new(3, 0xFEF1, 0x17, BROADCAST, &[]).unwrap().encode().unwrap();
    frame.timestamp = Some(0x1234);
    assert_eq!(J1939Frame::decode(&frame).unwrap().timestamp, Some(0x1234));
}
