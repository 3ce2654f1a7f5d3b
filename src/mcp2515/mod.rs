//! Backend for the MCP2515 stand-alone controller
//!
//! The chip is reached over an [`embedded_hal::spi::SpiDevice`]; every
//! register access is one SPI transaction with chip select held throughout.
//!
//! Mailbox `n` of the driver is transmit buffer `TXBn` for the first
//! `tx_mailboxes` indices and receive buffer `RXB(n - tx_mailboxes)` after
//! them. Freeze is the configuration mode of the chip.

pub mod reg;

use crate::codec::byte::{BufferImage, BUFFER_LEN};
use crate::config::{CanConfig, Mode};
use crate::controller::Controller;
use crate::error::{transport, Error, Result};
use crate::mailbox::{Capacity, MailboxLayout, MailboxStatus, Role};
use crate::message::Frame;
use crate::status::{ErrorCounters, FaultFlags};
use crate::timing::TimingConfig;
use cantrx_core::RegisterAccess;
use embedded_hal::spi::SpiDevice;
use fugit::{HertzU32, RateExtU32};
use reg::{instruction, opmod, rxb, txb, Cnf1, Cnf2, Cnf3, Eflg};

/// Largest prescaler `CNF1.BRP` can hold
pub const MAX_PRESCALER: u16 = 64;

/// Bit rates with register values for an 8 MHz crystal
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Preset {
    /// 125 kbit/s
    Kbps125,
    /// 250 kbit/s
    Kbps250,
    /// 500 kbit/s
    Kbps500,
}

impl Preset {
    /// Oscillator frequency the presets are made for
    pub const OSCILLATOR: HertzU32 = HertzU32::from_raw(8_000_000);

    /// Timing with 8 quanta per bit: 1 sync, 1 propagation, 3 phase 1, 3
    /// phase 2, jump width 1
    pub fn timing(self) -> TimingConfig {
        let (bitrate, prescaler) = match self {
            Self::Kbps125 => (125.kHz(), 4),
            Self::Kbps250 => (250.kHz(), 2),
            Self::Kbps500 => (500.kHz(), 1),
        };
        TimingConfig {
            bitrate,
            prescaler,
            propagation_segment: 0,
            phase_segment_1: 2,
            phase_segment_2: 2,
            resync_jump_width: 0,
        }
    }
}

/// Register values encoding `timing`
pub fn timing_registers(timing: &TimingConfig) -> (Cnf1, Cnf2, Cnf3) {
    let mut cnf1 = Cnf1(0);
    cnf1.set_sjw(timing.resync_jump_width);
    cnf1.set_brp(timing.prescaler.saturating_sub(1) as u8);
    let mut cnf2 = Cnf2(0);
    cnf2.set_btlmode(true);
    cnf2.set_phseg1(timing.phase_segment_1);
    cnf2.set_prseg(timing.propagation_segment);
    let mut cnf3 = Cnf3(0);
    cnf3.set_phseg2(timing.phase_segment_2);
    (cnf1, cnf2, cnf3)
}

fn opmod_bits(mode: Mode) -> u8 {
    match mode {
        Mode::Normal => opmod::NORMAL,
        Mode::ListenOnly => opmod::LISTEN_ONLY,
        Mode::Loopback => opmod::LOOPBACK,
    }
}

/// MCP2515 controller
pub struct Mcp2515<SPI> {
    spi: SPI,
    oscillator: HertzU32,
    layout: MailboxLayout,
}

impl<SPI: SpiDevice> Mcp2515<SPI> {
    /// Controller on `spi`, clocked by an `oscillator` crystal
    pub fn new(spi: SPI, oscillator: HertzU32) -> Self {
        Self {
            spi,
            oscillator,
            layout: MailboxLayout::default(),
        }
    }

    /// Give back the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Issue the `RESET` instruction
    pub fn reset(&mut self) -> Result<()> {
        self.spi.write(&[instruction::RESET]).map_err(transport)
    }

    /// Set the bits of `mask` in register `address` to those of `data`
    pub fn bit_modify(&mut self, address: u8, mask: u8, data: u8) -> Result<()> {
        self.spi
            .write(&[instruction::BIT_MODIFY, address, mask, data])
            .map_err(transport)
    }

    /// Read consecutive registers starting at `address`
    pub fn read_burst<const N: usize>(&mut self, address: u8) -> Result<[u8; N]> {
        let mut values = [0; N];
        self.spi
            .transaction(&mut [
                embedded_hal::spi::Operation::Write(&[instruction::READ, address]),
                embedded_hal::spi::Operation::TransferInPlace(&mut values),
            ])
            .map_err(transport)?;
        Ok(values)
    }

    /// Write consecutive registers starting at `address`
    pub fn write_burst(&mut self, address: u8, values: &[u8]) -> Result<()> {
        self.spi
            .transaction(&mut [
                embedded_hal::spi::Operation::Write(&[instruction::WRITE, address]),
                embedded_hal::spi::Operation::Write(values),
            ])
            .map_err(transport)
    }

    /// Result of the `READ STATUS` instruction
    pub fn read_status(&mut self) -> Result<u8> {
        self.status_instruction(instruction::READ_STATUS)
    }

    /// Result of the `RX STATUS` instruction
    pub fn rx_status(&mut self) -> Result<u8> {
        self.status_instruction(instruction::RX_STATUS)
    }

    /// Contents of `CANINTF`
    pub fn interrupt_flags(&mut self) -> Result<u8> {
        self.read_register(reg::CANINTF)
    }

    /// Clear the `CANINTF` bits set in `mask`
    pub fn clear_interrupt_flags(&mut self, mask: u8) -> Result<()> {
        self.bit_modify(reg::CANINTF, mask, 0)
    }

    /// Contents of `EFLG`
    pub fn error_flags(&mut self) -> Result<u8> {
        self.read_register(reg::EFLG)
    }

    /// The last frame of transmit mailbox `index` was aborted (`ABTF`)
    ///
    /// The flag stays set until the buffer is requested again; the mailbox
    /// itself is inactive as soon as `TXREQ` is clear.
    pub fn transmit_aborted(&mut self, index: usize) -> Result<bool> {
        let n = self.tx_buffer(index)?;
        Ok(self.read_register(reg::txb_ctrl(n))? & txb::ABTF != 0)
    }

    fn status_instruction(&mut self, instruction: u8) -> Result<u8> {
        let mut buffer = [instruction, 0];
        self.spi.transfer_in_place(&mut buffer).map_err(transport)?;
        Ok(buffer[1])
    }

    fn read_register(&mut self, address: u8) -> Result<u8> {
        RegisterAccess::read(self, address).map_err(transport)
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        RegisterAccess::write(self, address, value).map_err(transport)
    }

    fn opmod(&mut self) -> Result<u8> {
        Ok(self.read_register(reg::CANSTAT)? & opmod::MASK)
    }

    fn tx_buffer(&self, index: usize) -> Result<usize> {
        match self.layout.role(index) {
            Some(Role::Transmit) => Ok(index),
            _ => Err(Error::InvalidParameter),
        }
    }

    fn rx_buffer(&self, index: usize) -> Result<usize> {
        match self.layout.role(index) {
            Some(Role::Receive) => Ok(index - usize::from(self.layout.tx)),
            _ => Err(Error::InvalidParameter),
        }
    }
}

impl<SPI: SpiDevice> RegisterAccess for Mcp2515<SPI> {
    type Address = u8;
    type Word = u8;
    type Error = SPI::Error;

    fn read(&mut self, address: u8) -> core::result::Result<u8, SPI::Error> {
        let mut buffer = [instruction::READ, address, 0];
        self.spi.transfer_in_place(&mut buffer)?;
        Ok(buffer[2])
    }

    fn write(&mut self, address: u8, value: u8) -> core::result::Result<(), SPI::Error> {
        self.spi.write(&[instruction::WRITE, address, value])
    }
}

impl<SPI: SpiDevice> Controller for Mcp2515<SPI> {
    const CAPACITY: Capacity = Capacity {
        tx: reg::TX_BUFFERS as u8,
        rx: reg::RX_BUFFERS as u8,
        total: (reg::TX_BUFFERS + reg::RX_BUFFERS) as u8,
    };

    fn reference_clock(&self) -> HertzU32 {
        HertzU32::from_raw(self.oscillator.raw() / 2)
    }

    fn validate_timing(&self, timing: &TimingConfig) -> Result<()> {
        timing.validate()?;
        if timing.prescaler > MAX_PRESCALER {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    fn request_enable(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn request_soft_reset(&mut self) -> Result<()> {
        self.reset()
    }

    fn is_reset_complete(&mut self) -> Result<bool> {
        Ok(self.opmod()? == opmod::CONFIG)
    }

    fn enter_freeze(&mut self) -> Result<()> {
        self.bit_modify(reg::CANCTRL, opmod::MASK, opmod::CONFIG)
    }

    fn is_frozen(&mut self) -> Result<bool> {
        Ok(self.opmod()? == opmod::CONFIG)
    }

    fn leave_freeze(&mut self, mode: Mode) -> Result<()> {
        self.bit_modify(reg::CANCTRL, opmod::MASK, opmod_bits(mode))
    }

    fn is_operational(&mut self, mode: Mode) -> Result<bool> {
        Ok(self.opmod()? == opmod_bits(mode))
    }

    fn disable(&mut self) -> Result<()> {
        self.reset()
    }

    fn configure(&mut self, config: &CanConfig) -> Result<()> {
        let rollover = if config.rx_fifo { rxb::BUKT } else { 0 };
        self.write_register(reg::rxb_ctrl(0), rxb::RXM_STD_EXT | rollover)?;
        self.write_register(reg::rxb_ctrl(1), rxb::RXM_STD_EXT)?;
        self.write_register(reg::CANINTE, 0)?;
        self.write_register(reg::CANINTF, 0)?;
        self.layout = config.layout();
        log::debug!(
            "{} transmit and {} receive buffers in use",
            self.layout.tx,
            self.layout.rx
        );
        Ok(())
    }

    fn apply_timing(&mut self, timing: &TimingConfig) -> Result<()> {
        let (cnf1, cnf2, cnf3) = timing_registers(timing);
        // CNF3, CNF2, CNF1 are adjacent
        self.write_burst(reg::CNF3, &[cnf3.0, cnf2.0, cnf1.0])
    }

    fn apply_mode(&mut self, _mode: Mode) -> Result<()> {
        // Selected when leaving configuration mode
        Ok(())
    }

    fn mailbox_status(&mut self, index: usize) -> Result<MailboxStatus> {
        match self.layout.role(index) {
            Some(Role::Transmit) => {
                let ctrl = self.read_register(reg::txb_ctrl(index))?;
                Ok(if ctrl & txb::TXREQ != 0 {
                    MailboxStatus::Sending
                } else {
                    MailboxStatus::Inactive
                })
            }
            Some(Role::Receive) => {
                let n = self.rx_buffer(index)?;
                if self.interrupt_flags()? & reg::rx_full(n) == 0 {
                    Ok(MailboxStatus::Empty)
                } else if self.error_flags()? & reg::rx_overflow(n) != 0 {
                    Ok(MailboxStatus::Overrun)
                } else {
                    Ok(MailboxStatus::Full)
                }
            }
            None => Err(Error::InvalidParameter),
        }
    }

    fn write_transmit(&mut self, index: usize, frame: &Frame) -> Result<()> {
        let n = self.tx_buffer(index)?;
        let image = BufferImage::encode(frame)?;
        self.write_burst(reg::txb_ctrl(n) + 1, &image.0)?;
        self.bit_modify(reg::txb_ctrl(n), txb::TXREQ, txb::TXREQ)
    }

    fn abort_transmit(&mut self, index: usize) -> Result<()> {
        let n = self.tx_buffer(index)?;
        self.bit_modify(reg::txb_ctrl(n), txb::TXREQ, 0)?;
        if self.transmit_aborted(index)? {
            log::debug!("TXB{} aborted", n);
        }
        Ok(())
    }

    fn read_receive(&mut self, index: usize) -> Result<Frame> {
        let n = self.rx_buffer(index)?;
        let image = self.read_burst::<BUFFER_LEN>(reg::rxb_ctrl(n) + 1)?;
        Ok(BufferImage(image).decode())
    }

    fn release_receive(&mut self, index: usize) -> Result<()> {
        let n = self.rx_buffer(index)?;
        self.clear_interrupt_flags(reg::rx_full(n))?;
        self.bit_modify(reg::EFLG, reg::rx_overflow(n), 0)
    }

    fn error_counters(&mut self) -> Result<ErrorCounters> {
        let [transmit, receive] = self.read_burst::<2>(reg::TEC)?;
        Ok(ErrorCounters { transmit, receive })
    }

    fn fault_flags(&mut self) -> Result<FaultFlags> {
        let eflg = Eflg(self.error_flags()?);
        let mut flags = FaultFlags::default();
        flags.set_bus_off(eflg.txbo());
        flags.set_tx_passive(eflg.txep());
        flags.set_rx_passive(eflg.rxep());
        flags.set_tx_warning(eflg.txwar());
        flags.set_rx_warning(eflg.rxwar());
        flags.set_error_warning(eflg.ewarn());
        Ok(flags)
    }
}
