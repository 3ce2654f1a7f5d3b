//! Backend for the FlexCAN peripheral
//!
//! The peripheral is driven through a [`RegisterAccess`] implementation
//! addressed by [`Register`]: [`Mmio`] on hardware, any register file in
//! tests. Mailbox `n` of the driver is message buffer `n`.
//!
//! The receive FIFO is not used. Its storage and filter table cover message
//! buffers 0 to 7, which always hold transmit mailboxes here, so a
//! configuration with `CanConfig::rx_fifo` set is refused.

pub mod mmio;
pub mod reg;

pub use mmio::Mmio;
pub use reg::{MailboxWord, Register};

use crate::codec::word::{rx_code, tx_code, ControlStatus, MessageBuffer};
use crate::config::{CanConfig, Mode};
use crate::controller::Controller;
use crate::error::{transport, Error, Result};
use crate::mailbox::{Capacity, MailboxLayout, MailboxStatus, Role};
use crate::message::Frame;
use crate::status::{ErrorCounters, FaultFlags};
use crate::timing::TimingConfig;
use cantrx_core::{CanId, Dependencies, RegisterAccess};
use fugit::HertzU32;
use reg::{fltconf, Ctrl1, Ecr, Esr1, Mcr};

/// FlexCAN instance 0
pub enum Can0 {}
/// FlexCAN instance 1
pub enum Can1 {}
/// FlexCAN instance 2
pub enum Can2 {}

// Safety: Register block base addresses of the S32K1xx FlexCAN instances
unsafe impl CanId for Can0 {
    const ADDRESS: *const () = 0x4002_4000 as *const _;
}

// Safety: see above
unsafe impl CanId for Can1 {
    const ADDRESS: *const () = 0x4002_5000 as *const _;
}

// Safety: see above
unsafe impl CanId for Can2 {
    const ADDRESS: *const () = 0x4002_B000 as *const _;
}

/// FlexCAN controller
pub struct Flexcan<R> {
    registers: R,
    can_clock: HertzU32,
    layout: MailboxLayout,
}

impl<Id: CanId, D: Dependencies<Id>> Flexcan<Mmio<Id, D>> {
    /// Controller for the memory-mapped instance `Id`
    pub fn from_dependencies(dependencies: D) -> Self {
        let can_clock = dependencies.can_clock();
        Self::new(Mmio::new(dependencies), can_clock)
    }
}

impl<R> Flexcan<R>
where
    R: RegisterAccess<Address = Register, Word = u32>,
{
    /// Controller accessed through `registers`, protocol engine running at
    /// `can_clock`
    pub fn new(registers: R, can_clock: HertzU32) -> Self {
        Self {
            registers,
            can_clock,
            layout: MailboxLayout::default(),
        }
    }

    /// Give back the register access
    pub fn release(self) -> R {
        self.registers
    }

    /// Raw access to the registers.
    ///
    /// Writing them directly can break the assumptions of the driver.
    pub fn registers(&mut self) -> &mut R {
        &mut self.registers
    }

    /// Current value of the free running timer
    pub fn timer(&mut self) -> Result<u16> {
        Ok(self.read(Register::Timer)? as u16)
    }

    fn read(&mut self, register: Register) -> Result<u32> {
        self.registers.read(register).map_err(transport)
    }

    fn write(&mut self, register: Register, value: u32) -> Result<()> {
        self.registers.write(register, value).map_err(transport)
    }

    fn modify_mcr(&mut self, f: impl FnOnce(&mut Mcr)) -> Result<()> {
        self.registers
            .modify(Register::Mcr, |bits| {
                let mut mcr = Mcr(bits);
                f(&mut mcr);
                mcr.0
            })
            .map_err(transport)
    }

    fn modify_ctrl1(&mut self, f: impl FnOnce(&mut Ctrl1)) -> Result<()> {
        self.registers
            .modify(Register::Ctrl1, |bits| {
                let mut ctrl1 = Ctrl1(bits);
                f(&mut ctrl1);
                ctrl1.0
            })
            .map_err(transport)
    }

    fn mcr(&mut self) -> Result<Mcr> {
        self.read(Register::Mcr).map(Mcr)
    }

    fn buffer(&self, index: usize, role: Role) -> Result<u8> {
        match self.layout.role(index) {
            Some(r) if r == role => Ok(index as u8),
            _ => Err(Error::InvalidParameter),
        }
    }

    fn clear_mailbox(&mut self, index: u8, code: u8) -> Result<()> {
        self.write(Register::cs(index), ControlStatus::with_code(code).0)?;
        self.write(Register::id(index), 0)?;
        self.write(Register::data0(index), 0)?;
        self.write(Register::data1(index), 0)
    }
}

impl<R> Controller for Flexcan<R>
where
    R: RegisterAccess<Address = Register, Word = u32>,
{
    const CAPACITY: Capacity = Capacity {
        tx: reg::NUM_MAILBOXES as u8,
        rx: reg::NUM_MAILBOXES as u8,
        total: reg::NUM_MAILBOXES as u8,
    };

    fn reference_clock(&self) -> HertzU32 {
        self.can_clock
    }

    fn validate_config(&self, config: &CanConfig) -> Result<()> {
        config.layout().check(&Self::CAPACITY)?;
        if config.rx_fifo {
            log::warn!(
                "receive FIFO would overlap message buffers 0..{}",
                reg::FIFO_BUFFERS
            );
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    fn request_enable(&mut self) -> Result<()> {
        self.modify_mcr(|mcr| mcr.set_mdis(false))
    }

    fn is_enabled(&mut self) -> Result<bool> {
        Ok(!self.mcr()?.lpmack())
    }

    fn request_soft_reset(&mut self) -> Result<()> {
        self.modify_mcr(|mcr| mcr.set_softrst(true))
    }

    fn is_reset_complete(&mut self) -> Result<bool> {
        Ok(!self.mcr()?.softrst())
    }

    fn enter_freeze(&mut self) -> Result<()> {
        self.modify_mcr(|mcr| {
            mcr.set_frz(true);
            mcr.set_halt(true);
        })
    }

    fn is_frozen(&mut self) -> Result<bool> {
        Ok(self.mcr()?.frzack())
    }

    fn leave_freeze(&mut self, _mode: Mode) -> Result<()> {
        self.modify_mcr(|mcr| {
            mcr.set_frz(false);
            mcr.set_halt(false);
        })
    }

    fn is_operational(&mut self, _mode: Mode) -> Result<bool> {
        Ok(!self.mcr()?.frzack())
    }

    fn disable(&mut self) -> Result<()> {
        self.modify_mcr(|mcr| mcr.set_mdis(true))
    }

    fn configure(&mut self, config: &CanConfig) -> Result<()> {
        let layout = config.layout();
        let last = layout.len().saturating_sub(1) as u8;
        self.modify_mcr(|mcr| {
            mcr.set_maxmb(last);
            mcr.set_srxdis(true);
            mcr.set_irmq(true);
            mcr.set_rfen(false);
        })?;

        for mask in [
            Register::RxMgMask,
            Register::Rx14Mask,
            Register::Rx15Mask,
            Register::RxFgMask,
        ] {
            self.write(mask, 0)?;
        }

        for index in layout.tx_range() {
            self.clear_mailbox(index as u8, tx_code::INACTIVE)?;
        }
        for index in layout.rx_range() {
            self.clear_mailbox(index as u8, rx_code::EMPTY)?;
        }
        self.layout = layout;
        log::debug!("message buffers 0..={} configured", last);
        Ok(())
    }

    fn apply_timing(&mut self, timing: &TimingConfig) -> Result<()> {
        self.modify_ctrl1(|ctrl1| {
            ctrl1.set_presdiv(timing.prescaler.saturating_sub(1) as u8);
            ctrl1.set_rjw(timing.resync_jump_width);
            ctrl1.set_pseg1(timing.phase_segment_1);
            ctrl1.set_pseg2(timing.phase_segment_2);
            ctrl1.set_propseg(timing.propagation_segment);
        })
    }

    fn apply_mode(&mut self, mode: Mode) -> Result<()> {
        self.modify_ctrl1(|ctrl1| {
            ctrl1.set_lom(mode == Mode::ListenOnly);
            ctrl1.set_lpb(mode == Mode::Loopback);
        })
    }

    fn mailbox_status(&mut self, index: usize) -> Result<MailboxStatus> {
        let role = self.layout.role(index).ok_or(Error::InvalidParameter)?;
        let code = ControlStatus(self.read(Register::cs(index as u8))?).code();
        Ok(match role {
            Role::Transmit => match code {
                tx_code::INACTIVE => MailboxStatus::Inactive,
                tx_code::ABORT => MailboxStatus::Aborted,
                tx_code::DATA => MailboxStatus::Sending,
                tx_code::TANSWER => MailboxStatus::PendingSend,
                other => MailboxStatus::Reserved(other),
            },
            Role::Receive => {
                // Reading the control word locks the buffer, the timer unlocks it
                self.read(Register::Timer)?;
                match code {
                    rx_code::INACTIVE => MailboxStatus::Inactive,
                    rx_code::EMPTY => MailboxStatus::Empty,
                    rx_code::FULL => MailboxStatus::Full,
                    rx_code::OVERRUN => MailboxStatus::Overrun,
                    other if other & rx_code::BUSY != 0 => MailboxStatus::Locked,
                    other => MailboxStatus::Reserved(other),
                }
            }
        })
    }

    fn write_transmit(&mut self, index: usize, frame: &Frame) -> Result<()> {
        let mb = self.buffer(index, Role::Transmit)?;
        let buffer = MessageBuffer::encode(frame)?;
        self.write(Register::data0(mb), buffer.data[0])?;
        self.write(Register::data1(mb), buffer.data[1])?;
        self.write(Register::id(mb), buffer.id)?;
        // Writing the code starts the transmission
        self.write(Register::cs(mb), buffer.cs.0)
    }

    fn abort_transmit(&mut self, index: usize) -> Result<()> {
        let mb = self.buffer(index, Role::Transmit)?;
        self.write(Register::cs(mb), ControlStatus::with_code(tx_code::ABORT).0)?;
        // ABORT reads back once the frame was dropped; INACTIVE if it was sent
        if ControlStatus(self.read(Register::cs(mb))?).code() == tx_code::ABORT {
            self.write(Register::cs(mb), ControlStatus::with_code(tx_code::INACTIVE).0)?;
        }
        Ok(())
    }

    fn read_receive(&mut self, index: usize) -> Result<Frame> {
        let mb = self.buffer(index, Role::Receive)?;
        let cs = ControlStatus(self.read(Register::cs(mb))?);
        let id = self.read(Register::id(mb))?;
        let data = [self.read(Register::data0(mb))?, self.read(Register::data1(mb))?];
        self.read(Register::Timer)?;
        Ok(MessageBuffer { cs, id, data }.decode())
    }

    fn release_receive(&mut self, index: usize) -> Result<()> {
        let mb = self.buffer(index, Role::Receive)?;
        self.write(Register::cs(mb), ControlStatus::with_code(rx_code::EMPTY).0)
    }

    fn error_counters(&mut self) -> Result<ErrorCounters> {
        let ecr = Ecr(self.read(Register::Ecr)?);
        Ok(ErrorCounters {
            transmit: ecr.tx_err_counter(),
            receive: ecr.rx_err_counter(),
        })
    }

    fn fault_flags(&mut self) -> Result<FaultFlags> {
        let esr1 = Esr1(self.read(Register::Esr1)?);
        let counters = self.error_counters()?;
        let passive = esr1.fltconf() == fltconf::PASSIVE;
        let mut flags = FaultFlags::default();
        flags.set_bus_off(esr1.fltconf() & 0b10 != 0);
        flags.set_tx_passive(passive && counters.transmit >= crate::status::ERROR_PASSIVE_LIMIT);
        flags.set_rx_passive(passive && counters.receive >= crate::status::ERROR_PASSIVE_LIMIT);
        flags.set_tx_warning(esr1.txwrn());
        flags.set_rx_warning(esr1.rxwrn());
        flags.set_error_warning(esr1.txwrn() || esr1.rxwrn());
        Ok(flags)
    }
}
