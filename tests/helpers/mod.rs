//! Software models of the supported controllers.
#![allow(dead_code)]

use cantrx::codec::byte::{BufferImage, SIDL_IDE, SIDL_SRR, DLC_RTR};
use cantrx::codec::word::{rx_code, tx_code, ControlStatus, MessageBuffer};
use cantrx::flexcan::reg::{Ctrl1, Mcr, NUM_MAILBOXES};
use cantrx::flexcan::Register;
use cantrx::mcp2515::reg::{self as mcp, instruction, opmod, txb};
use cantrx::{Frame, Transition};
use cantrx_core::RegisterAccess;
use core::convert::Infallible;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

//==================================================================================FLEXCAN

/// Register access as seen by the model
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(Register),
    Write(Register, u32),
}

/// FlexCAN register file with the acknowledgement bits emulated
pub struct FlexcanModel {
    registers: HashMap<usize, u32>,
    stuck: Option<Transition>,
    timer: u16,
    pub accesses: Vec<Access>,
}

const MCR_RESET: u32 = 0xD890_000F;

impl FlexcanModel {
    fn new() -> Self {
        let mut registers = HashMap::new();
        registers.insert(Register::Mcr.offset(), MCR_RESET);
        Self {
            registers,
            stuck: None,
            timer: 0,
            accesses: Vec::new(),
        }
    }

    pub fn get(&self, register: Register) -> u32 {
        self.registers.get(&register.offset()).copied().unwrap_or(0)
    }

    pub fn set(&mut self, register: Register, value: u32) {
        self.registers.insert(register.offset(), value);
    }

    pub fn mcr(&self) -> Mcr {
        Mcr(self.get(Register::Mcr))
    }

    pub fn ctrl1(&self) -> Ctrl1 {
        Ctrl1(self.get(Register::Ctrl1))
    }

    pub fn code(&self, index: u8) -> u8 {
        ControlStatus(self.get(Register::cs(index))).code()
    }

    fn write_mcr(&mut self, value: u32) {
        const LPMACK: u32 = 1 << 20;
        const FRZACK: u32 = 1 << 24;
        let old = self.mcr();
        let mut mcr = Mcr(value & !(LPMACK | FRZACK));
        let low_power = match self.stuck {
            Some(Transition::Enable) => old.lpmack() || mcr.mdis(),
            _ => mcr.mdis(),
        };
        if low_power {
            mcr.0 |= LPMACK;
        }
        if self.stuck != Some(Transition::SoftReset) {
            mcr.set_softrst(false);
        }
        let frozen = mcr.frz() && mcr.halt() && !mcr.mdis();
        let frzack = match self.stuck {
            Some(Transition::EnterFreeze) => old.frzack() && frozen,
            Some(Transition::ExitFreeze) => old.frzack() || frozen,
            _ => frozen,
        };
        if frzack {
            mcr.0 |= FRZACK;
        }
        self.set(Register::Mcr, mcr.0);
    }

    fn write_cs(&mut self, index: u8, value: u32) {
        self.set(Register::cs(index), value);
        if ControlStatus(value).code() == tx_code::DATA && self.ctrl1().lpb() {
            let buffer = MessageBuffer {
                cs: ControlStatus(value),
                id: self.get(Register::id(index)),
                data: [self.get(Register::data0(index)), self.get(Register::data1(index))],
            };
            let frame = buffer.decode();
            if let Some(rx) = self.first_empty() {
                self.deliver(rx, &frame);
            }
            self.complete(index);
        }
    }

    fn first_empty(&self) -> Option<u8> {
        (0..=self.mcr().maxmb()).find(|&index| self.code(index) == rx_code::EMPTY)
    }

    /// Frame arriving in receive mailbox `index`
    pub fn deliver(&mut self, index: u8, frame: &Frame) {
        let mut buffer = MessageBuffer::encode(frame).unwrap();
        let code = match self.code(index) {
            rx_code::FULL | rx_code::OVERRUN => rx_code::OVERRUN,
            _ => rx_code::FULL,
        };
        buffer.cs.set_code(code);
        self.timer = self.timer.wrapping_add(0x10);
        let cs = (buffer.cs.0 & 0xFFFF_0000) | u32::from(self.timer);
        self.set(Register::cs(index), cs);
        self.set(Register::id(index), buffer.id);
        self.set(Register::data0(index), buffer.data[0]);
        self.set(Register::data1(index), buffer.data[1]);
    }

    /// Transmission from mailbox `index` finished
    pub fn complete(&mut self, index: u8) {
        let cs = ControlStatus(self.get(Register::cs(index)));
        self.set(Register::cs(index), (cs.0 & 0xF0FF_FFFF) | (u32::from(tx_code::INACTIVE) << 24));
    }

    /// Never acknowledge `transition`
    pub fn stick(&mut self, transition: Transition) {
        self.stuck = Some(transition);
    }

    pub fn release(&mut self) {
        self.stuck = None;
    }
}

/// Handle to a shared [`FlexcanModel`], one copy goes into the driver
#[derive(Clone)]
pub struct FakeFlexcan(pub Rc<RefCell<FlexcanModel>>);

impl FakeFlexcan {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(FlexcanModel::new())))
    }

    pub fn model(&self) -> std::cell::RefMut<'_, FlexcanModel> {
        self.0.borrow_mut()
    }
}

impl RegisterAccess for FakeFlexcan {
    type Address = Register;
    type Word = u32;
    type Error = Infallible;

    fn read(&mut self, address: Register) -> Result<u32, Infallible> {
        let mut model = self.0.borrow_mut();
        model.accesses.push(Access::Read(address));
        if address == Register::Timer {
            model.timer = model.timer.wrapping_add(1);
            return Ok(u32::from(model.timer));
        }
        Ok(model.get(address))
    }

    fn write(&mut self, address: Register, value: u32) -> Result<(), Infallible> {
        let mut model = self.0.borrow_mut();
        model.accesses.push(Access::Write(address, value));
        match address {
            Register::Mcr => model.write_mcr(value),
            Register::Mailbox { index, word: cantrx::flexcan::MailboxWord::ControlStatus }
                if usize::from(index) < NUM_MAILBOXES =>
            {
                model.write_cs(index, value)
            }
            _ => model.set(address, value),
        }
        Ok(())
    }
}

//==================================================================================MCP2515

/// MCP2515 decoding SPI instructions into a register array
pub struct Mcp2515Model {
    pub registers: [u8; 128],
    stuck: bool,
    pub transactions: usize,
}

impl Mcp2515Model {
    fn new() -> Self {
        let mut model = Self {
            registers: [0; 128],
            stuck: false,
            transactions: 0,
        };
        model.reset();
        model
    }

    fn reset(&mut self) {
        let canstat = self.registers[usize::from(mcp::CANSTAT)];
        self.registers = [0; 128];
        self.registers[usize::from(mcp::CANCTRL)] = 0x87;
        self.registers[usize::from(mcp::CANSTAT)] = if self.stuck { canstat } else { opmod::CONFIG };
    }

    pub fn get(&self, address: u8) -> u8 {
        self.registers[usize::from(address & 0x7F)]
    }

    pub fn set(&mut self, address: u8, value: u8) {
        self.registers[usize::from(address & 0x7F)] = value;
    }

    pub fn opmod(&self) -> u8 {
        self.get(mcp::CANSTAT) & opmod::MASK
    }

    /// Keep `CANSTAT` where it is, whatever is requested
    pub fn stick(&mut self) {
        self.stuck = true;
    }

    fn store(&mut self, address: u8, value: u8) {
        let old = self.get(address);
        self.set(address, value);
        if address == mcp::CANCTRL && !self.stuck {
            let canstat = (self.get(mcp::CANSTAT) & !opmod::MASK) | (value & opmod::MASK);
            self.set(mcp::CANSTAT, canstat);
        }
        for n in 0..mcp::TX_BUFFERS {
            if address != mcp::txb_ctrl(n) {
                continue;
            }
            let requested = value & txb::TXREQ != 0;
            if requested && old & txb::TXREQ == 0 {
                self.set(address, value & !(txb::ABTF | txb::MLOA | txb::TXERR));
                if self.opmod() == opmod::LOOPBACK {
                    self.loop_back(n);
                }
            } else if !requested && old & txb::TXREQ != 0 {
                self.set(address, value | txb::ABTF);
            }
        }
    }

    fn loop_back(&mut self, n: usize) {
        let start = usize::from(mcp::txb_ctrl(n)) + 1;
        let mut image = [0; 13];
        image.copy_from_slice(&self.registers[start..start + 13]);
        let rollover = self.get(mcp::rxb_ctrl(0)) & mcp::rxb::BUKT != 0;
        let target = if self.get(mcp::CANINTF) & mcp::rx_full(0) != 0 && rollover {
            1
        } else {
            0
        };
        self.deliver_image(target, image);
        self.complete(n);
    }

    /// Frame arriving in receive buffer `n`
    pub fn deliver(&mut self, n: usize, frame: &Frame) {
        self.deliver_image(n, BufferImage::encode(frame).unwrap().0);
    }

    fn deliver_image(&mut self, n: usize, mut image: [u8; 13]) {
        if self.get(mcp::CANINTF) & mcp::rx_full(n) != 0 {
            let eflg = self.get(mcp::EFLG);
            self.set(mcp::EFLG, eflg | mcp::rx_overflow(n));
            return;
        }
        // Standard remote frames are flagged in SIDL on reception
        if image[1] & SIDL_IDE == 0 && image[4] & DLC_RTR != 0 {
            image[1] |= SIDL_SRR;
            image[4] &= !DLC_RTR;
        }
        let start = usize::from(mcp::rxb_ctrl(n)) + 1;
        self.registers[start..start + 13].copy_from_slice(&image);
        let intf = self.get(mcp::CANINTF);
        self.set(mcp::CANINTF, intf | mcp::rx_full(n));
    }

    /// Transmission from buffer `n` finished
    pub fn complete(&mut self, n: usize) {
        let ctrl = self.get(mcp::txb_ctrl(n));
        self.set(mcp::txb_ctrl(n), ctrl & !txb::TXREQ);
        let intf = self.get(mcp::CANINTF);
        self.set(mcp::CANINTF, intf | (mcp::intf::TX0IF << n));
    }

    fn read_status(&self) -> u8 {
        let intf = self.get(mcp::CANINTF);
        let mut status = intf & 0x03;
        for n in 0..mcp::TX_BUFFERS {
            if self.get(mcp::txb_ctrl(n)) & txb::TXREQ != 0 {
                status |= 0x04 << (2 * n);
            }
            if intf & (mcp::intf::TX0IF << n) != 0 {
                status |= 0x08 << (2 * n);
            }
        }
        status
    }

    fn rx_status(&self) -> u8 {
        (self.get(mcp::CANINTF) & 0x03) << 6
    }
}

/// Decoder of one chip-select framed transaction
#[derive(Default)]
struct Command {
    position: usize,
    instruction: u8,
    address: u8,
    mask: u8,
}

impl Command {
    fn shift(&mut self, model: &mut Mcp2515Model, mosi: u8) -> u8 {
        let position = self.position;
        self.position += 1;
        if position == 0 {
            self.instruction = mosi;
            if mosi == instruction::RESET {
                model.reset();
            }
            return 0;
        }
        match self.instruction {
            instruction::READ if position == 1 => {
                self.address = mosi;
                0
            }
            instruction::READ => {
                let value = model.get(self.address);
                self.address = self.address.wrapping_add(1);
                value
            }
            instruction::WRITE if position == 1 => {
                self.address = mosi;
                0
            }
            instruction::WRITE => {
                model.store(self.address, mosi);
                self.address = self.address.wrapping_add(1);
                0
            }
            instruction::BIT_MODIFY => {
                match position {
                    1 => self.address = mosi,
                    2 => self.mask = mosi,
                    3 => {
                        let old = model.get(self.address);
                        model.store(self.address, (old & !self.mask) | (mosi & self.mask));
                    }
                    _ => {}
                }
                0
            }
            instruction::READ_STATUS => model.read_status(),
            instruction::RX_STATUS => model.rx_status(),
            _ => 0,
        }
    }
}

/// Handle to a shared [`Mcp2515Model`], one copy goes into the driver
#[derive(Clone)]
pub struct FakeMcp2515(pub Rc<RefCell<Mcp2515Model>>);

impl FakeMcp2515 {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Mcp2515Model::new())))
    }

    pub fn model(&self) -> std::cell::RefMut<'_, Mcp2515Model> {
        self.0.borrow_mut()
    }
}

impl ErrorType for FakeMcp2515 {
    type Error = Infallible;
}

impl SpiDevice for FakeMcp2515 {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut model = self.0.borrow_mut();
        model.transactions += 1;
        let mut command = Command::default();
        for operation in operations {
            match operation {
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = command.shift(&mut model, 0);
                    }
                }
                Operation::Write(buffer) => {
                    for &byte in buffer.iter() {
                        command.shift(&mut model, byte);
                    }
                }
                Operation::Transfer(read, write) => {
                    for i in 0..read.len().max(write.len()) {
                        let miso = command.shift(&mut model, write.get(i).copied().unwrap_or(0));
                        if let Some(slot) = read.get_mut(i) {
                            *slot = miso;
                        }
                    }
                }
                Operation::TransferInPlace(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = command.shift(&mut model, *byte);
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

//==================================================================================FRAMES

pub fn standard(id: u16, data: &[u8]) -> Frame {
    Frame::with_data(embedded_can::StandardId::new(id).unwrap(), data).unwrap()
}

pub fn extended(id: u32, data: &[u8]) -> Frame {
    Frame::with_data(embedded_can::ExtendedId::new(id).unwrap(), data).unwrap()
}
