//! Frame codec
//!
//! Converts a logical [`Frame`](crate::message::Frame) to and from the two
//! layouts the supported controllers use:
//!
//! - [`word`]: four 32-bit words of a memory-mapped message buffer (control/
//!   status, identifier, two big-endian payload words)
//! - [`byte`]: the 13-byte buffer image of a serial controller (four identifier
//!   bytes, the data length code, eight payload bytes)
//!
//! Both layouts carry the identifier width as an explicit flag; decoding never
//! infers it from the magnitude of the identifier. Encoding fails with
//! [`Error::InvalidParameter`](crate::Error::InvalidParameter) when the data
//! length code exceeds 8. Decoding only happens for mailboxes the
//! [`MailboxStore`](crate::mailbox::MailboxStore) found holding data.

pub mod byte;
pub mod word;
