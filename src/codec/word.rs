//! Message buffer words of a memory-mapped controller

use crate::error::Result;
use crate::message::{id_from_raw, mask_payload, Frame, MAX_DATA_LEN};
use bitfield::bitfield;
use core::cmp::min;
use embedded_can::Id;

/// Position of a standard identifier within the identifier word
pub const STANDARD_ID_SHIFT: u32 = 18;
/// Extended identifiers occupy the low 29 bits of the identifier word
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Buffer state codes of a transmit mailbox
pub mod tx_code {
    /// Not participating in the bus
    pub const INACTIVE: u8 = 0x8;
    /// Transmission aborted
    pub const ABORT: u8 = 0x9;
    /// Data or remote frame waiting to be sent
    pub const DATA: u8 = 0xC;
    /// Answer to a remote request waiting to be sent
    pub const TANSWER: u8 = 0xE;
}

/// Buffer state codes of a receive mailbox
pub mod rx_code {
    /// Not participating in the bus
    pub const INACTIVE: u8 = 0x0;
    /// Active and waiting for a frame
    pub const EMPTY: u8 = 0x4;
    /// Holds a frame
    pub const FULL: u8 = 0x2;
    /// Holds a frame and overwrote an unread one
    pub const OVERRUN: u8 = 0x6;
    /// Being updated by the controller
    pub const BUSY: u8 = 0x1;
}

bitfield! {
    /// Control/status word of a message buffer
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct ControlStatus(u32);
    impl Debug;

    /// Buffer state code, see [`tx_code`] and [`rx_code`]
    pub u8, code, set_code: 27, 24;
    /// Substitute remote request, set alongside `ide`
    pub srr, set_srr: 22;
    /// Extended identifier
    pub ide, set_ide: 21;
    /// Remote transmission request
    pub rtr, set_rtr: 20;
    /// Data length code
    pub u8, dlc, set_dlc: 19, 16;
    /// Free-running timer value captured at reception
    pub u16, timestamp, _: 15, 0;
}

impl ControlStatus {
    /// Word holding only a buffer state code
    pub fn with_code(code: u8) -> Self {
        let mut cs = Self(0);
        cs.set_code(code);
        cs
    }
}

/// Contents of one message buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageBuffer {
    /// Control/status word
    pub cs: ControlStatus,
    /// Identifier word
    pub id: u32,
    /// Payload, bytes 0..4 and 4..8, most significant byte first
    pub data: [u32; 2],
}

impl MessageBuffer {
    /// Lay out `frame` for transmission
    ///
    /// The control/status word carries the `DATA` code; it has to be written
    /// last since that write starts the transmission.
    pub fn encode(frame: &Frame) -> Result<Self> {
        frame.check()?;
        let mut cs = ControlStatus::with_code(tx_code::DATA);
        cs.set_dlc(frame.dlc);
        cs.set_rtr(frame.remote);
        let id = match frame.id {
            Id::Standard(id) => u32::from(id.as_raw()) << STANDARD_ID_SHIFT,
            Id::Extended(id) => {
                cs.set_ide(true);
                cs.set_srr(true);
                id.as_raw() & EXTENDED_ID_MASK
            }
        };
        let bytes = frame.masked_data();
        Ok(Self {
            cs,
            id,
            data: [
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ],
        })
    }

    /// Recover the frame held by a receive mailbox
    pub fn decode(&self) -> Frame {
        let extended = self.cs.ide();
        let raw = if extended {
            self.id & EXTENDED_ID_MASK
        } else {
            self.id >> STANDARD_ID_SHIFT
        };
        let dlc = min(self.cs.dlc(), MAX_DATA_LEN as u8);
        let mut data = [0; MAX_DATA_LEN];
        data[..4].copy_from_slice(&self.data[0].to_be_bytes());
        data[4..].copy_from_slice(&self.data[1].to_be_bytes());
        Frame {
            id: id_from_raw(raw, extended),
            remote: self.cs.rtr(),
            dlc,
            data: mask_payload(data, dlc),
            timestamp: Some(self.cs.timestamp()),
        }
    }
}
