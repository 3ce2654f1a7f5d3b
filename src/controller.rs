//! Hardware seam of the driver

use crate::config::{CanConfig, Mode};
use crate::error::Result;
use crate::mailbox::{Capacity, MailboxStatus};
use crate::message::Frame;
use crate::status::{ErrorCounters, FaultFlags};
use crate::timing::TimingConfig;
use fugit::HertzU32;

/// Primitive operations of a CAN controller
///
/// [`Can`](crate::bus::Can) builds every driver operation out of these. A
/// backend implements them on top of its own register access: the
/// memory-mapped [`Flexcan`](crate::flexcan::Flexcan) and the SPI attached
/// [`Mcp2515`](crate::mcp2515::Mcp2515).
///
/// Requests (`request_*`, `enter_freeze`, `leave_freeze`) only start a state
/// change; the matching query reports whether the hardware acknowledged it.
/// Mailbox indices follow the layout passed to [`Controller::configure`].
pub trait Controller {
    /// Mailbox limits
    const CAPACITY: Capacity;

    /// Clock the bit timing prescaler divides
    fn reference_clock(&self) -> HertzU32;

    /// Reject a configuration the controller cannot run
    fn validate_config(&self, config: &CanConfig) -> Result<()> {
        config.layout().check(&Self::CAPACITY)
    }

    /// Reject timing the controller registers cannot hold
    fn validate_timing(&self, timing: &TimingConfig) -> Result<()> {
        timing.validate()
    }

    /// Start leaving the disabled/low-power state
    fn request_enable(&mut self) -> Result<()>;

    /// The module is enabled
    fn is_enabled(&mut self) -> Result<bool>;

    /// Start a soft reset
    fn request_soft_reset(&mut self) -> Result<()>;

    /// The soft reset finished
    fn is_reset_complete(&mut self) -> Result<bool>;

    /// Start entering freeze/configuration
    fn enter_freeze(&mut self) -> Result<()>;

    /// Freeze is acknowledged
    fn is_frozen(&mut self) -> Result<bool>;

    /// Start leaving freeze into `mode`
    fn leave_freeze(&mut self, mode: Mode) -> Result<()>;

    /// The controller runs in `mode`
    fn is_operational(&mut self, mode: Mode) -> Result<bool>;

    /// Disable the module unconditionally
    fn disable(&mut self) -> Result<()>;

    /// Apply mailbox layout, acceptance and buffering; frozen only
    fn configure(&mut self, config: &CanConfig) -> Result<()>;

    /// Apply bit timing; frozen only
    fn apply_timing(&mut self, timing: &TimingConfig) -> Result<()>;

    /// Apply the operating mode; frozen only
    fn apply_mode(&mut self, mode: Mode) -> Result<()>;

    /// Current state of mailbox `index`
    fn mailbox_status(&mut self, index: usize) -> Result<MailboxStatus>;

    /// Write `frame` to transmit mailbox `index` and request transmission
    fn write_transmit(&mut self, index: usize, frame: &Frame) -> Result<()>;

    /// Request cancellation of transmit mailbox `index`
    fn abort_transmit(&mut self, index: usize) -> Result<()>;

    /// Read the frame held by receive mailbox `index`
    fn read_receive(&mut self, index: usize) -> Result<Frame>;

    /// Hand receive mailbox `index` back to the controller
    fn release_receive(&mut self, index: usize) -> Result<()>;

    /// Transmit and receive error counters
    fn error_counters(&mut self) -> Result<ErrorCounters>;

    /// Bus-off, passive and warning flags; overflow bits are added by the
    /// driver from the receive mailbox states
    fn fault_flags(&mut self) -> Result<FaultFlags>;
}
