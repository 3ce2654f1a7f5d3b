//! Driver front end shared by every backend

use crate::config::{CanConfig, Mode};
use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::mailbox::{MailboxStatus, MailboxStore, Role, TxStatus};
use crate::message::Frame;
use crate::mode::{DeviceState, ModeController};
use crate::status::{ErrorCounters, FaultFlags};
use crate::timing::{compute_timing, TimingConfig};
use cantrx_core::{RetryBudget, WaitPolicy};
use fugit::HertzU32;

/// Everything the driver remembers about one controller
///
/// Only [`Can`] mutates it; the accessors expose it for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct ControllerState {
    initialized: bool,
    config: Option<CanConfig>,
    device: ModeController,
    mailboxes: MailboxStore,
}

impl ControllerState {
    /// `initialize` succeeded and no `deinitialize` followed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Configuration last applied successfully
    pub fn config(&self) -> Option<&CanConfig> {
        self.config.as_ref()
    }

    /// Bit timing last applied successfully
    pub fn timing(&self) -> Option<TimingConfig> {
        self.config.map(|config| config.timing)
    }

    /// Operating mode last applied successfully
    pub fn mode(&self) -> Option<Mode> {
        self.config.map(|config| config.mode)
    }

    /// Last state the controller acknowledged
    pub fn device_state(&self) -> DeviceState {
        self.device.state()
    }

    /// Mailbox roster
    pub fn mailboxes(&self) -> &MailboxStore {
        &self.mailboxes
    }

    /// Transmit mailbox the next round-robin allocation starts at
    pub fn next_hint(&self) -> usize {
        self.mailboxes.next_hint()
    }
}

/// CAN controller driver
///
/// Owns the backend `C`, the wait policy `W` bounding every acknowledgement
/// poll, and the [`ControllerState`]. Each physical controller gets its own
/// `Can`; instances share nothing.
///
/// Every operation takes `&mut self`, so the driver is used from a single
/// context at a time. An application that also touches it from an interrupt
/// handler has to put it behind its own mutex.
pub struct Can<C, W = RetryBudget> {
    controller: C,
    wait: W,
    state: ControllerState,
}

impl<C: Controller> Can<C> {
    /// Create a driver polling acknowledgements with
    /// [`RetryBudget::default`]
    pub fn new(controller: C) -> Self {
        Self::with_wait_policy(controller, RetryBudget::default())
    }
}

impl<C: Controller, W: WaitPolicy> Can<C, W> {
    /// Create a driver with a custom wait policy
    pub fn with_wait_policy(controller: C, wait: W) -> Self {
        Self {
            controller,
            wait,
            state: ControllerState::default(),
        }
    }

    /// Driver state
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Backend
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Backend, for controller specific functionality
    ///
    /// Changing mode, timing or mailboxes behind the driver's back makes
    /// [`Self::state`] stale.
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Give back the backend and the wait policy
    pub fn release(self) -> (C, W) {
        (self.controller, self.wait)
    }

    /// Bit timing for `bitrate` at this controller's reference clock
    pub fn timing_for(&self, bitrate: HertzU32) -> Result<TimingConfig> {
        let timing = compute_timing(self.controller.reference_clock(), bitrate)?;
        self.controller.validate_timing(&timing)?;
        Ok(timing)
    }

    /// Bring the controller from any state into operation with `config`
    ///
    /// Enables and resets the module, freezes it, applies mailbox layout,
    /// timing and mode, and leaves freeze.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] if the configuration or the timing does
    ///   not fit the controller; the hardware is not touched in that case
    /// - [`Error::Timeout`] if a step is not acknowledged
    ///
    /// On any error the driver is left uninitialized and `initialize` has to
    /// be repeated.
    pub fn initialize(&mut self, config: CanConfig) -> Result<()> {
        self.state.initialized = false;
        self.controller.validate_config(&config)?;
        self.controller.validate_timing(&config.timing)?;

        let Self {
            controller,
            wait,
            state,
        } = self;
        state.device.enable(controller, wait)?;
        state.device.reconfigure(controller, wait, config.mode, |c| {
            c.configure(&config)?;
            c.apply_timing(&config.timing)?;
            c.apply_mode(config.mode)
        })?;

        state.mailboxes = MailboxStore::new(config.layout(), config.allocation);
        state.config = Some(config);
        state.initialized = true;
        log::debug!(
            "initialized: {} tx + {} rx mailboxes, {} bit/s, {:?}",
            config.tx_mailboxes,
            config.rx_mailboxes,
            config.timing.bitrate.raw(),
            config.mode
        );
        Ok(())
    }

    /// Disable the controller
    ///
    /// Does not go through freeze and does not wait for anything.
    pub fn deinitialize(&mut self) -> Result<()> {
        self.state.initialized = false;
        self.state.device.disable(&mut self.controller)
    }

    /// Switch the operating mode
    ///
    /// # Errors
    /// [`Error::NotInitialized`] before `initialize`. On [`Error::Timeout`]
    /// the recorded mode keeps its previous value even though the hardware
    /// may already have changed; check [`ControllerState::device_state`] or
    /// re-initialize.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.ensure_initialized()?;
        let Self {
            controller,
            wait,
            state,
        } = self;
        state
            .device
            .reconfigure(controller, wait, mode, |c| c.apply_mode(mode))?;
        if let Some(config) = state.config.as_mut() {
            config.mode = mode;
        }
        Ok(())
    }

    /// Replace the bit timing at runtime
    ///
    /// # Errors
    /// [`Error::NotInitialized`] before `initialize`,
    /// [`Error::InvalidParameter`] for timing the controller cannot hold. On
    /// [`Error::Timeout`] the recorded timing keeps its previous value even
    /// though the hardware may already use the new one.
    pub fn update_bitrate(&mut self, timing: TimingConfig) -> Result<()> {
        self.ensure_initialized()?;
        self.controller.validate_timing(&timing)?;
        let Self {
            controller,
            wait,
            state,
        } = self;
        let mode = state.mode().unwrap_or_default();
        state
            .device
            .reconfigure(controller, wait, mode, |c| c.apply_timing(&timing))?;
        if let Some(config) = state.config.as_mut() {
            config.timing = timing;
        }
        Ok(())
    }

    /// Queue `frame` in a free transmit mailbox
    ///
    /// Returns the mailbox used.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] if the data length code exceeds 8
    /// - [`Error::NotInitialized`] before `initialize`
    /// - [`Error::Busy`] if every transmit mailbox is in use
    pub fn transmit(&mut self, frame: &Frame) -> Result<usize> {
        frame.check()?;
        self.ensure_initialized()?;
        let Self {
            controller, state, ..
        } = self;
        let index = state
            .mailboxes
            .allocate_for_transmit(|index| controller.mailbox_status(index))?;
        controller.write_transmit(index, frame)?;
        state.mailboxes.mark_sending(index);
        log::trace!("queued {:#x} in mailbox {}", frame.raw_id(), index);
        Ok(index)
    }

    /// Take the frame from the lowest receive mailbox holding one
    ///
    /// Whether the mailbox had overrun is available from
    /// [`Self::last_received`] afterwards.
    ///
    /// # Errors
    /// [`Error::NoMessage`] if no receive mailbox holds a frame,
    /// [`Error::NotInitialized`] before `initialize`.
    pub fn receive(&mut self) -> Result<Frame> {
        self.ensure_initialized()?;
        let Self {
            controller, state, ..
        } = self;
        let (index, status) = state
            .mailboxes
            .scan_for_received(|index| controller.mailbox_status(index))?
            .ok_or(Error::NoMessage)?;
        let frame = controller.read_receive(index)?;
        controller.release_receive(index)?;
        state.mailboxes.mark_consumed(index, status);
        if status == MailboxStatus::Overrun {
            log::debug!("mailbox {} overran", index);
        }
        log::trace!("received {:#x} from mailbox {}", frame.raw_id(), index);
        Ok(frame)
    }

    /// A receive mailbox holds a frame; nothing is consumed
    pub fn message_available(&mut self) -> Result<bool> {
        self.ensure_initialized()?;
        let Self {
            controller, state, ..
        } = self;
        let found = state
            .mailboxes
            .scan_for_received(|index| controller.mailbox_status(index))?;
        Ok(found.is_some())
    }

    /// Transmission progress of transmit mailbox `index`
    ///
    /// [`TxStatus::Error`] if the driver is not initialized, `index` is not a
    /// transmit mailbox, or the controller could not be queried.
    pub fn tx_status(&mut self, index: usize) -> TxStatus {
        if !self.state.initialized || self.state.mailboxes.check_transmit(index).is_err() {
            return TxStatus::Error;
        }
        match self.controller.mailbox_status(index) {
            Ok(status) => {
                self.state.mailboxes.observe(index, status);
                status.into()
            }
            Err(_) => TxStatus::Error,
        }
    }

    /// Request cancellation of transmit mailbox `index`
    ///
    /// Whether the frame still made it onto the bus shows in
    /// [`Self::tx_status`] later.
    ///
    /// # Errors
    /// [`Error::NotInitialized`] before `initialize`,
    /// [`Error::InvalidParameter`] if `index` is not a transmit mailbox.
    pub fn abort_transmit(&mut self, index: usize) -> Result<()> {
        self.ensure_initialized()?;
        self.state.mailboxes.check_transmit(index)?;
        log::trace!("aborting mailbox {}", index);
        self.controller.abort_transmit(index)
    }

    /// Current state of any mailbox
    pub fn mailbox_status(&mut self, index: usize) -> Result<MailboxStatus> {
        self.ensure_initialized()?;
        if self.state.mailboxes.layout().role(index).is_none() {
            return Err(Error::InvalidParameter);
        }
        let status = self.controller.mailbox_status(index)?;
        self.state.mailboxes.observe(index, status);
        Ok(status)
    }

    /// Mailbox and its state (full or overrun) of the most recent receive
    pub fn last_received(&self) -> Option<(usize, MailboxStatus)> {
        self.state.mailboxes.last_received()
    }

    /// Transmit and receive error counters
    pub fn error_counters(&mut self) -> Result<ErrorCounters> {
        self.controller.error_counters()
    }

    /// Fault conditions, including overrun receive mailboxes
    pub fn fault_flags(&mut self) -> Result<FaultFlags> {
        let mut flags = self.controller.fault_flags()?;
        if self.state.initialized {
            let mut overflow = 0_u32;
            for (n, index) in self.state.mailboxes.layout().rx_range().enumerate() {
                if self.controller.mailbox_status(index)? == MailboxStatus::Overrun {
                    overflow |= 1 << n;
                }
            }
            flags.set_rx_overflow(overflow);
        }
        Ok(flags)
    }

    /// Role of mailbox `index` in the current layout
    pub fn role(&self, index: usize) -> Option<Role> {
        self.state.mailboxes.layout().role(index)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.state.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}

impl<C: Controller, W: WaitPolicy> embedded_can::nb::Can for Can<C, W> {
    type Frame = Frame;
    type Error = Error;

    fn transmit(&mut self, frame: &Frame) -> nb::Result<Option<Frame>, Error> {
        match Self::transmit(self, frame) {
            Ok(_) => Ok(None),
            Err(Error::Busy) => Err(nb::Error::WouldBlock),
            Err(error) => Err(nb::Error::Other(error)),
        }
    }

    fn receive(&mut self) -> nb::Result<Frame, Error> {
        match Self::receive(self) {
            Ok(frame) => Ok(frame),
            Err(Error::NoMessage) => Err(nb::Error::WouldBlock),
            Err(error) => Err(nb::Error::Other(error)),
        }
    }
}
