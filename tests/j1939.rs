mod helpers;

use cantrx::flexcan::Flexcan;
use cantrx::j1939::{J1939Frame, J1939Id, BROADCAST};
use cantrx::mcp2515::{Mcp2515, Preset};
use cantrx::{Can, CanConfig, Error, Mode};
use fugit::RateExtU32;
use helpers::{standard, FakeFlexcan, FakeMcp2515};

//==================================================================================DRIVER
#[test]
/// A broadcast parameter group survives the serial controller's loopback.
fn broadcast_over_mcp2515_loopback() {
    let fake = FakeMcp2515::new();
    let mut can = Can::new(Mcp2515::new(fake, Preset::OSCILLATOR));
    can.initialize(
        CanConfig::new(Preset::Kbps250.timing())
            .with_mailboxes(3, 2)
            .with_mode(Mode::Loopback),
    )
    .unwrap();

    let sent = J1939Frame::new(3, 0xFEF1, 0x17, BROADCAST, &[0xFF, 0x00, 0x20]).unwrap();
    can.transmit_j1939(&sent).unwrap();
    let received = can.receive_j1939().unwrap();

    assert_eq!(received.pgn, 0xFEF1);
    assert_eq!(received.source, 0x17);
    assert!(received.is_broadcast());
    assert_eq!(received.payload(), &[0xFF, 0x00, 0x20]);
}

#[test]
/// A destination specific request keeps its destination on the FlexCAN path.
fn request_over_flexcan() {
    let fake = FakeFlexcan::new();
    let mut can = Can::new(Flexcan::new(fake.clone(), 80.MHz()));
    let timing = can.timing_for(250.kHz()).unwrap();
    can.initialize(CanConfig::new(timing).with_mailboxes(2, 2)).unwrap();

    let request = J1939Frame::new(6, 0xEA00, 0xF9, 0x00, &[0xEC, 0xFE, 0x00]).unwrap();
    let frame = request.encode().unwrap();
    fake.model().deliver(2, &frame);

    let received = can.receive_j1939().unwrap();
    assert_eq!(received.priority, 6);
    assert_eq!(received.pgn, 0xEA00);
    assert_eq!(received.destination, 0x00);
    assert_eq!(J1939Id::from_raw(frame.raw_id()).destination(), 0x00);
}

#[test]
/// Standard identifiers are consumed and reported as a protocol mismatch.
fn standard_frame_is_protocol_error() {
    let fake = FakeFlexcan::new();
    let mut can = Can::new(Flexcan::new(fake.clone(), 80.MHz()));
    let timing = can.timing_for(500.kHz()).unwrap();
    can.initialize(CanConfig::new(timing).with_mailboxes(1, 1)).unwrap();

    fake.model().deliver(1, &standard(0x100, &[1]));
    assert_eq!(can.receive_j1939(), Err(Error::Protocol));
    assert_eq!(can.receive_j1939(), Err(Error::NoMessage));
}
