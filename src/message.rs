//! Handling of messages/frames

use crate::error::{Error, Result};
use core::cmp::min;
use embedded_can::{ExtendedId, Id, StandardId};

/// Largest classic CAN payload
pub const MAX_DATA_LEN: usize = 8;

/// Logical CAN frame, independent of any controller layout
///
/// Only the first `dlc` bytes of `data` are meaningful. The fields are public
/// so that a frame can be filled in place; the codecs reject a `dlc` above 8.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Standard or extended identifier
    pub id: Id,
    /// Remote transmission request
    pub remote: bool,
    /// Data length code, `0..=8`
    pub dlc: u8,
    /// Payload buffer
    pub data: [u8; MAX_DATA_LEN],
    /// Receive timestamp as reported by the controller, if it keeps one
    pub timestamp: Option<u16>,
}

impl Frame {
    /// Data frame carrying `data`
    ///
    /// # Errors
    /// [`Error::InvalidParameter`] if `data` is longer than 8 bytes.
    pub fn with_data(id: impl Into<Id>, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_DATA_LEN {
            return Err(Error::InvalidParameter);
        }
        let mut buffer = [0; MAX_DATA_LEN];
        buffer[..data.len()].copy_from_slice(data);
        Ok(Self {
            id: id.into(),
            remote: false,
            dlc: data.len() as u8,
            data: buffer,
            timestamp: None,
        })
    }

    /// Remote frame requesting `dlc` bytes
    pub fn remote(id: impl Into<Id>, dlc: u8) -> Result<Self> {
        if usize::from(dlc) > MAX_DATA_LEN {
            return Err(Error::InvalidParameter);
        }
        Ok(Self {
            id: id.into(),
            remote: true,
            dlc,
            data: [0; MAX_DATA_LEN],
            timestamp: None,
        })
    }

    /// Meaningful part of the payload
    pub fn payload(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..min(usize::from(self.dlc), MAX_DATA_LEN)]
        }
    }

    /// Numeric identifier, right-aligned
    pub fn raw_id(&self) -> u32 {
        raw_id(self.id)
    }

    /// Fails with [`Error::InvalidParameter`] if the frame cannot be encoded
    pub(crate) fn check(&self) -> Result<()> {
        if usize::from(self.dlc) > MAX_DATA_LEN {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    /// Copy of the payload with every byte past `dlc` cleared
    pub(crate) fn masked_data(&self) -> [u8; MAX_DATA_LEN] {
        mask_payload(self.data, self.dlc)
    }
}

pub(crate) fn mask_payload(mut data: [u8; MAX_DATA_LEN], dlc: u8) -> [u8; MAX_DATA_LEN] {
    let len = min(usize::from(dlc), MAX_DATA_LEN);
    data[len..].fill(0);
    data
}

/// Numeric value of an identifier
pub fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(id) => id.as_raw().into(),
        Id::Extended(id) => id.as_raw(),
    }
}

/// Identifier of the given width built from the low bits of `raw`
pub(crate) fn id_from_raw(raw: u32, extended: bool) -> Id {
    if extended {
        // Safety: The mask ensures the ID is in range
        Id::Extended(unsafe { ExtendedId::new_unchecked(raw & ExtendedId::MAX.as_raw()) })
    } else {
        // Safety: The mask ensures the ID is in range
        Id::Standard(unsafe {
            StandardId::new_unchecked((raw & u32::from(StandardId::MAX.as_raw())) as u16)
        })
    }
}

impl embedded_can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::with_data(id, data).ok()
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        u8::try_from(dlc)
            .ok()
            .and_then(|dlc| Self::remote(id, dlc).ok())
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc.into()
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
