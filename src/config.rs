//! CAN bus configuration

use crate::mailbox::MailboxLayout;
use crate::timing::TimingConfig;

/// Operating sub-mode the controller runs in once it leaves freeze
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Takes part in bus traffic, acknowledges frames
    #[default]
    Normal,
    /// Receives without acknowledging or transmitting
    ListenOnly,
    /// Transmitted frames are looped back internally
    Loopback,
}

/// How a transmit mailbox is picked
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Allocation {
    /// Lowest free index. Under sustained load higher mailboxes may starve.
    #[default]
    FirstFit,
    /// Scanning starts after the mailbox allocated last
    RoundRobin,
}

/// Configuration for the CAN bus
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanConfig {
    /// Bit timing
    pub timing: TimingConfig,
    /// Operating mode entered at the end of initialization
    pub mode: Mode,
    /// Number of transmit mailboxes, occupying the lowest indices
    pub tx_mailboxes: u8,
    /// Number of receive mailboxes, following the transmit ones
    pub rx_mailboxes: u8,
    /// Buffered reception: RXB0 rolling over into RXB1 on the MCP2515; FlexCAN
    /// refuses it
    pub rx_fifo: bool,
    /// Transmit mailbox selection
    pub allocation: Allocation,
}

impl CanConfig {
    /// Create an instance
    ///
    /// Timing must be provided, all other settings come pre-populated with
    /// default values: normal mode, 8 transmit and 8 receive mailboxes, no
    /// FIFO, first-fit allocation.
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            mode: Mode::Normal,
            tx_mailboxes: 8,
            rx_mailboxes: 8,
            rx_fifo: false,
            allocation: Allocation::FirstFit,
        }
    }

    /// Set the mailbox split
    pub fn with_mailboxes(mut self, tx: u8, rx: u8) -> Self {
        self.tx_mailboxes = tx;
        self.rx_mailboxes = rx;
        self
    }

    /// Set the operating mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Mailbox split described by this configuration
    pub fn layout(&self) -> MailboxLayout {
        MailboxLayout {
            tx: self.tx_mailboxes,
            rx: self.rx_mailboxes,
        }
    }
}
