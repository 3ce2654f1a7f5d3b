//! Error counters and fault flags

use bitfield::bitfield;
use core::fmt::{self, Debug};

/// Counter value at which a node becomes error passive
pub const ERROR_PASSIVE_LIMIT: u8 = 128;
/// Counter value at which the error warning is raised
pub const ERROR_WARNING_LIMIT: u8 = 96;

/// Snapshot of the transmit and receive error counters
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Transmit error counter
    pub transmit: u8,
    /// Receive error counter
    pub receive: u8,
}

impl ErrorCounters {
    /// Fault confinement state implied by the counters alone
    ///
    /// Bus-off is only known from [`FaultFlags::bus_off`], since the transmit
    /// counter saturates in an 8-bit register.
    pub fn state(&self) -> ErrorState {
        if self.transmit >= ERROR_PASSIVE_LIMIT || self.receive >= ERROR_PASSIVE_LIMIT {
            ErrorState::Passive
        } else {
            ErrorState::Active
        }
    }
}

/// Fault confinement state of the node
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorState {
    /// Normal participation
    Active,
    /// Error frames are sent passively
    Passive,
    /// Disconnected from the bus
    BusOff,
}

bitfield! {
    /// A set of fault conditions.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct FaultFlags(u64);

    /// Bus off
    pub bus_off, set_bus_off: 0;
    /// Transmit error counter reached the passive limit
    pub tx_passive, set_tx_passive: 1;
    /// Receive error counter reached the passive limit
    pub rx_passive, set_rx_passive: 2;
    /// Transmit error counter reached the warning limit
    pub tx_warning, set_tx_warning: 3;
    /// Receive error counter reached the warning limit
    pub rx_warning, set_rx_warning: 4;
    /// Either counter reached the warning limit
    pub error_warning, set_error_warning: 5;
    /// Overflowed receive mailboxes, bit `n` for the `n`-th receive mailbox
    pub u32, rx_overflow, set_rx_overflow: 63, 32;
}

impl FaultFlags {
    /// Receive mailbox `n` (counting from the first receive mailbox) lost a
    /// frame
    pub fn rx_overflowed(&self, n: usize) -> bool {
        n < 32 && self.rx_overflow() & (1 << n) != 0
    }

    /// Fault confinement state the flags describe
    pub fn state(&self) -> ErrorState {
        if self.bus_off() {
            ErrorState::BusOff
        } else if self.tx_passive() || self.rx_passive() {
            ErrorState::Passive
        } else {
            ErrorState::Active
        }
    }

    /// No fault condition present
    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }
}

impl Debug for FaultFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaultFlags {{ ")?;
        if self.bus_off() {
            write!(f, "BOFF ")?;
        }
        if self.tx_passive() {
            write!(f, "TXEP ")?;
        }
        if self.rx_passive() {
            write!(f, "RXEP ")?;
        }
        if self.tx_warning() {
            write!(f, "TXWAR ")?;
        }
        if self.rx_warning() {
            write!(f, "RXWAR ")?;
        }
        if self.error_warning() {
            write!(f, "EWARN ")?;
        }
        if self.rx_overflow() != 0 {
            write!(f, "RXOVR({:#010x}) ", self.rx_overflow())?;
        }
        write!(f, "}}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FaultFlags {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "FaultFlags({=u64:#x})", self.0)
    }
}
