//! Buffer image of a serial CAN controller
//!
//! Transmit and receive buffers share one layout, starting at the `SIDH`
//! register of the buffer:
//!
//! | byte | content |
//! |------|---------|
//! | 0 | `SIDH`: identifier bits 10:3 (standard) or 28:21 (extended) |
//! | 1 | `SIDL`: identifier bits 2:0 / 20:18 in 7:5, `SRR` 4, `IDE` 3, bits 17:16 in 1:0 |
//! | 2 | `EID8`: extended identifier bits 15:8 |
//! | 3 | `EID0`: extended identifier bits 7:0 |
//! | 4 | `DLC`: `RTR` 6, data length code 3:0 |
//! | 5..13 | payload |

use crate::error::Result;
use crate::message::{id_from_raw, mask_payload, Frame, MAX_DATA_LEN};
use core::cmp::min;
use embedded_can::Id;

/// Size of a buffer image
pub const BUFFER_LEN: usize = 13;

/// Extended identifier flag in `SIDL`
pub const SIDL_IDE: u8 = 0x08;
/// Standard remote frame received, in `SIDL`
pub const SIDL_SRR: u8 = 0x10;
/// Remote transmission request in `DLC`
pub const DLC_RTR: u8 = 0x40;
/// Data length code bits in `DLC`
pub const DLC_MASK: u8 = 0x0F;

/// Raw contents of a transmit or receive buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferImage(pub [u8; BUFFER_LEN]);

impl BufferImage {
    /// Lay out `frame` for a transmit buffer
    pub fn encode(frame: &Frame) -> Result<Self> {
        frame.check()?;
        let mut image = [0; BUFFER_LEN];
        match frame.id {
            Id::Standard(id) => {
                let id = id.as_raw();
                image[0] = (id >> 3) as u8;
                image[1] = ((id << 5) & 0xE0) as u8;
            }
            Id::Extended(id) => {
                let id = id.as_raw();
                image[0] = (id >> 21) as u8;
                image[1] = ((id >> 13) & 0xE0) as u8 | SIDL_IDE | ((id >> 16) & 0x03) as u8;
                image[2] = (id >> 8) as u8;
                image[3] = id as u8;
            }
        }
        image[4] = frame.dlc & DLC_MASK;
        if frame.remote {
            image[4] |= DLC_RTR;
        }
        image[5..].copy_from_slice(&frame.masked_data());
        Ok(Self(image))
    }

    /// Recover the frame held by a receive buffer
    pub fn decode(&self) -> Frame {
        let [sidh, sidl, eid8, eid0, dlc, ..] = self.0;
        let extended = sidl & SIDL_IDE != 0;
        let (raw, remote) = if extended {
            let raw = u32::from(sidh) << 21
                | u32::from(sidl & 0xE0) << 13
                | u32::from(sidl & 0x03) << 16
                | u32::from(eid8) << 8
                | u32::from(eid0);
            (raw, dlc & DLC_RTR != 0)
        } else {
            let raw = u32::from(sidh) << 3 | u32::from(sidl) >> 5;
            (raw, sidl & SIDL_SRR != 0)
        };
        let dlc = min(dlc & DLC_MASK, MAX_DATA_LEN as u8);
        let mut data = [0; MAX_DATA_LEN];
        data.copy_from_slice(&self.0[5..]);
        Frame {
            id: id_from_raw(raw, extended),
            remote,
            dlc,
            data: mask_payload(data, dlc),
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;
    use embedded_can::{ExtendedId, StandardId};

    #[test]
    fn standard_identifier_layout() {
        let frame = Frame::with_data(StandardId::new(0x123).unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        let image = BufferImage::encode(&frame).unwrap();
        assert_eq!(
            image.0,
            [0x24, 0x60, 0x00, 0x00, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn extended_identifier_layout() {
        let frame = Frame::with_data(ExtendedId::new(0x18FE_F100).unwrap(), &[0xAA, 0xBB])
            .unwrap();
        let image = BufferImage::encode(&frame).unwrap();
        assert_eq!(image.0[..5], [0xC7, 0xEA, 0xF1, 0x00, 0x02]);
        assert_eq!(image.0[5..7], [0xAA, 0xBB]);
        assert_eq!(image.decode(), frame);
    }

    #[test]
    fn extended_decode_covers_every_identifier_bit() {
        let id = ExtendedId::MAX;
        let image = BufferImage::encode(&Frame::with_data(id, &[]).unwrap()).unwrap();
        assert_eq!(image.0[..4], [0xFF, 0xEB, 0xFF, 0xFF]);
        assert_eq!(image.decode().id, Id::Extended(id));
    }

    #[test]
    fn remote_request_goes_to_dlc_on_transmit() {
        let frame = Frame::remote(StandardId::new(0x7FF).unwrap(), 3).unwrap();
        let image = BufferImage::encode(&frame).unwrap();
        assert_eq!(image.0[1] & SIDL_SRR, 0);
        assert_eq!(image.0[4], DLC_RTR | 3);
    }

    #[test]
    fn standard_remote_is_read_from_srr() {
        let mut image = [0; BUFFER_LEN];
        image[0] = 0x24;
        image[1] = 0x60 | SIDL_SRR;
        image[4] = 0x01;
        let frame = BufferImage(image).decode();
        assert!(frame.remote);
        assert_eq!(frame.raw_id(), 0x123);
        assert!(frame.payload().is_empty());
    }

    #[test]
    fn extended_remote_is_read_from_dlc() {
        let frame = Frame::remote(ExtendedId::new(0x1ABC_DEF0).unwrap(), 8).unwrap();
        let decoded = BufferImage::encode(&frame).unwrap().decode();
        assert!(decoded.remote);
        assert_eq!(decoded.dlc, 8);
    }

    #[test]
    fn oversized_dlc_is_rejected() {
        let mut frame = Frame::with_data(StandardId::ZERO, &[]).unwrap();
        frame.dlc = 12;
        assert_eq!(BufferImage::encode(&frame), Err(Error::InvalidParameter));
    }
}
