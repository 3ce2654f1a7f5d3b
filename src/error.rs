//! Driver errors

use crate::mode::Transition;
use thiserror_no_std::Error;

/// Result type of every fallible driver operation
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the driver
///
/// None of them trigger a retry inside the driver; retrying after
/// [`Error::Busy`] or re-initializing after [`Error::Timeout`] is up to the
/// caller.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Malformed input: data length code above 8, priority above 7, mailbox
    /// index that does not name a mailbox of the expected role, or a
    /// configuration the controller cannot hold
    #[error("invalid parameter")]
    InvalidParameter,
    /// The operation requires a successful `initialize` first
    #[error("controller is not initialized")]
    NotInitialized,
    /// No transmit mailbox is free
    #[error("no free transmit mailbox")]
    Busy,
    /// A guarded mode transition was not acknowledged within the wait policy
    #[error("no acknowledgement for {0:?}")]
    Timeout(Transition),
    /// No receive mailbox holds a frame
    #[error("no message pending")]
    NoMessage,
    /// The frame does not follow the expected protocol, e.g. a J1939 frame
    /// with a standard identifier
    #[error("protocol mismatch")]
    Protocol,
    /// The link to the controller failed
    #[error("transport failure")]
    Transport,
}

impl embedded_can::Error for Error {
    fn kind(&self) -> embedded_can::ErrorKind {
        embedded_can::ErrorKind::Other
    }
}

/// Log a failed register transfer and report it as [`Error::Transport`]
pub(crate) fn transport<E: core::fmt::Debug>(error: E) -> Error {
    log::error!("register access failed: {:?}", error);
    Error::Transport
}
