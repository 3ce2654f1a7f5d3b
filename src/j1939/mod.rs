//! J1939 addressing on top of 29-bit identifiers
//!
//! ```text
//!  28..26     25   24   23..16        15..8          7..0
//! priority    R    DP   PDU format    PDU specific   source
//! ```
//!
//! A PDU format below 240 (PDU1) makes the PDU specific byte a destination
//! address; from 240 on (PDU2) it is a group extension belonging to the
//! parameter group number and the frame is broadcast.

use crate::bus::Can;
use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::message::{mask_payload, Frame, MAX_DATA_LEN};
use cantrx_core::WaitPolicy;
use core::cmp::min;
use embedded_can::{ExtendedId, Id};

/// Destination address reserved for broadcast
pub const BROADCAST: u8 = 0xFF;
/// Lowest PDU format of a broadcast (PDU2) parameter group
pub const PDU2_THRESHOLD: u8 = 240;
/// Highest priority value (lowest urgency)
pub const MAX_PRIORITY: u8 = 7;
/// Largest 18-bit parameter group number
pub const MAX_PGN: u32 = 0x3_FFFF;

/// Meaning of the PDU specific byte
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PduFormat {
    /// Point to point, carries the destination address
    Pdu1 {
        /// Addressed node
        destination: u8,
    },
    /// Broadcast, carries the group extension
    Pdu2 {
        /// Low byte of the parameter group number
        group_extension: u8,
    },
}

/// 29-bit identifier seen through J1939 addressing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct J1939Id(u32);

impl J1939Id {
    /// Build an identifier
    ///
    /// `destination` is only used for PDU1 groups; PDU2 groups are always
    /// broadcast.
    ///
    /// # Errors
    /// [`Error::InvalidParameter`] if `priority` exceeds 7, `pgn` exceeds 18
    /// bits, or a PDU1 `pgn` has a non-zero low byte (that byte is the
    /// destination).
    pub fn new(priority: u8, pgn: u32, source: u8, destination: u8) -> Result<Self> {
        if priority > MAX_PRIORITY || pgn > MAX_PGN {
            return Err(Error::InvalidParameter);
        }
        let pdu_format = (pgn >> 8) as u8;
        let pdu_specific = if pdu_format < PDU2_THRESHOLD {
            if pgn & 0xFF != 0 {
                return Err(Error::InvalidParameter);
            }
            destination
        } else {
            pgn as u8
        };
        Ok(Self(
            u32::from(priority) << 26
                | (pgn >> 16) << 24
                | u32::from(pdu_format) << 16
                | u32::from(pdu_specific) << 8
                | u32::from(source),
        ))
    }

    /// View any 29-bit identifier as J1939
    pub fn from_raw(raw: u32) -> Self {
        Self(raw & ExtendedId::MAX.as_raw())
    }

    /// Numeric identifier
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Message priority, 0 is most urgent
    pub fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// Reserved (extended data page) bit
    pub fn reserved(&self) -> bool {
        self.0 & (1 << 25) != 0
    }

    /// Data page bit
    pub fn data_page(&self) -> bool {
        self.0 & (1 << 24) != 0
    }

    /// PDU format byte
    pub fn pdu_format(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// PDU specific byte
    pub fn pdu_specific(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Sender address
    pub fn source(&self) -> u8 {
        self.0 as u8
    }

    /// Interpretation of the PDU specific byte
    pub fn pdu(&self) -> PduFormat {
        if self.pdu_format() < PDU2_THRESHOLD {
            PduFormat::Pdu1 {
                destination: self.pdu_specific(),
            }
        } else {
            PduFormat::Pdu2 {
                group_extension: self.pdu_specific(),
            }
        }
    }

    /// Parameter group number
    pub fn pgn(&self) -> u32 {
        let base = (self.0 >> 8) & 0x3_FF00;
        match self.pdu() {
            PduFormat::Pdu1 { .. } => base,
            PduFormat::Pdu2 { group_extension } => base | u32::from(group_extension),
        }
    }

    /// Addressed node, [`BROADCAST`] for PDU2
    pub fn destination(&self) -> u8 {
        match self.pdu() {
            PduFormat::Pdu1 { destination } => destination,
            PduFormat::Pdu2 { .. } => BROADCAST,
        }
    }
}

impl From<J1939Id> for ExtendedId {
    fn from(id: J1939Id) -> Self {
        // Safety: Construction keeps the value within 29 bits
        unsafe { ExtendedId::new_unchecked(id.0) }
    }
}

impl From<J1939Id> for Id {
    fn from(id: J1939Id) -> Self {
        Id::Extended(id.into())
    }
}

/// Frame addressed with J1939 fields
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct J1939Frame {
    /// Message priority, `0..=7`
    pub priority: u8,
    /// Parameter group number, 18 bits
    pub pgn: u32,
    /// Sender address
    pub source: u8,
    /// Addressed node, [`BROADCAST`] for PDU2 groups
    pub destination: u8,
    /// Data length code, `0..=8`
    pub dlc: u8,
    /// Payload buffer, only the first `dlc` bytes are meaningful
    pub data: [u8; MAX_DATA_LEN],
    /// Receive timestamp of the underlying frame
    pub timestamp: Option<u16>,
}

impl J1939Frame {
    /// Frame carrying `data`
    pub fn new(priority: u8, pgn: u32, source: u8, destination: u8, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_DATA_LEN {
            return Err(Error::InvalidParameter);
        }
        let mut buffer = [0; MAX_DATA_LEN];
        buffer[..data.len()].copy_from_slice(data);
        Ok(Self {
            priority,
            pgn,
            source,
            destination,
            dlc: data.len() as u8,
            data: buffer,
            timestamp: None,
        })
    }

    /// Meaningful part of the payload
    pub fn payload(&self) -> &[u8] {
        &self.data[..min(usize::from(self.dlc), MAX_DATA_LEN)]
    }

    /// Sent to every node
    pub fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST
    }

    /// Identifier carrying the addressing fields
    pub fn id(&self) -> Result<J1939Id> {
        J1939Id::new(self.priority, self.pgn, self.source, self.destination)
    }

    /// Extended data frame carrying this message
    ///
    /// # Errors
    /// [`Error::InvalidParameter`] if the priority exceeds 7, the data length
    /// code exceeds 8, or the PGN is malformed (see [`J1939Id::new`]).
    pub fn encode(&self) -> Result<Frame> {
        if usize::from(self.dlc) > MAX_DATA_LEN {
            return Err(Error::InvalidParameter);
        }
        Ok(Frame {
            id: self.id()?.into(),
            remote: false,
            dlc: self.dlc,
            data: mask_payload(self.data, self.dlc),
            timestamp: None,
        })
    }

    /// Read the addressing fields of `frame`
    ///
    /// # Errors
    /// [`Error::Protocol`] if `frame` has a standard identifier.
    pub fn decode(frame: &Frame) -> Result<Self> {
        let Id::Extended(raw) = frame.id else {
            return Err(Error::Protocol);
        };
        let id = J1939Id::from_raw(raw.as_raw());
        let dlc = min(frame.dlc, MAX_DATA_LEN as u8);
        Ok(Self {
            priority: id.priority(),
            pgn: id.pgn(),
            source: id.source(),
            destination: id.destination(),
            dlc,
            data: mask_payload(frame.data, dlc),
            timestamp: frame.timestamp,
        })
    }
}

impl TryFrom<&Frame> for J1939Frame {
    type Error = Error;

    fn try_from(frame: &Frame) -> Result<Self> {
        Self::decode(frame)
    }
}

impl TryFrom<&J1939Frame> for Frame {
    type Error = Error;

    fn try_from(frame: &J1939Frame) -> Result<Self> {
        frame.encode()
    }
}

impl<C: Controller, W: WaitPolicy> Can<C, W> {
    /// Encode `frame` and queue it like [`Can::transmit`]
    pub fn transmit_j1939(&mut self, frame: &J1939Frame) -> Result<usize> {
        let frame = frame.encode()?;
        self.transmit(&frame)
    }

    /// Receive like [`Can::receive`] and decode the J1939 fields
    ///
    /// A frame with a standard identifier is consumed and reported as
    /// [`Error::Protocol`].
    pub fn receive_j1939(&mut self) -> Result<J1939Frame> {
        let frame = self.receive()?;
        J1939Frame::decode(&frame)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
