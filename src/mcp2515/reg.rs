//! MCP2515 instructions and register map

use bitfield::bitfield;

/// SPI instructions
pub mod instruction {
    /// Reset all registers, enter configuration mode
    pub const RESET: u8 = 0xC0;
    /// Read from an address, auto-incrementing
    pub const READ: u8 = 0x03;
    /// Write to an address, auto-incrementing
    pub const WRITE: u8 = 0x02;
    /// Masked write of a single register
    pub const BIT_MODIFY: u8 = 0x05;
    /// Condensed transmit/receive flags
    pub const READ_STATUS: u8 = 0xA0;
    /// Condensed receive buffer state and filter match
    pub const RX_STATUS: u8 = 0xB0;
}

/// Controller status, `OPMOD` in bits 7:5
pub const CANSTAT: u8 = 0x0E;
/// Controller control, `REQOP` in bits 7:5
pub const CANCTRL: u8 = 0x0F;
/// Transmit error counter
pub const TEC: u8 = 0x1C;
/// Receive error counter
pub const REC: u8 = 0x1D;
/// Bit timing 3: phase segment 2
pub const CNF3: u8 = 0x28;
/// Bit timing 2: phase segment 1, propagation segment
pub const CNF2: u8 = 0x29;
/// Bit timing 1: jump width, prescaler
pub const CNF1: u8 = 0x2A;
/// Interrupt enable
pub const CANINTE: u8 = 0x2B;
/// Interrupt flags
pub const CANINTF: u8 = 0x2C;
/// Error flags
pub const EFLG: u8 = 0x2D;

/// Number of transmit buffers
pub const TX_BUFFERS: usize = 3;
/// Number of receive buffers
pub const RX_BUFFERS: usize = 2;

/// Control register of transmit buffer `n`; the buffer image follows it
pub const fn txb_ctrl(n: usize) -> u8 {
    0x30 + 0x10 * n as u8
}

/// Control register of receive buffer `n`; the buffer image follows it
pub const fn rxb_ctrl(n: usize) -> u8 {
    0x60 + 0x10 * n as u8
}

/// Values of `REQOP` and `OPMOD`
pub mod opmod {
    /// Bits holding the mode in `CANCTRL` and `CANSTAT`
    pub const MASK: u8 = 0xE0;
    /// Normal operation
    pub const NORMAL: u8 = 0x00;
    /// Internal loopback
    pub const LOOPBACK: u8 = 0x40;
    /// Listen only
    pub const LISTEN_ONLY: u8 = 0x60;
    /// Configuration
    pub const CONFIG: u8 = 0x80;
}

/// `CANINTF`/`CANINTE` bits
pub mod intf {
    /// Receive buffer 0 full
    pub const RX0IF: u8 = 0x01;
    /// Receive buffer 1 full
    pub const RX1IF: u8 = 0x02;
    /// Transmit buffer 0 empty
    pub const TX0IF: u8 = 0x04;
    /// Transmit buffer 1 empty
    pub const TX1IF: u8 = 0x08;
    /// Transmit buffer 2 empty
    pub const TX2IF: u8 = 0x10;
    /// Error interrupt
    pub const ERRIF: u8 = 0x20;
    /// Wake-up
    pub const WAKIF: u8 = 0x40;
    /// Message error
    pub const MERRF: u8 = 0x80;
}

/// `TXBnCTRL` bits
pub mod txb {
    /// Transmission requested
    pub const TXREQ: u8 = 0x08;
    /// Transmission error detected
    pub const TXERR: u8 = 0x10;
    /// Arbitration lost
    pub const MLOA: u8 = 0x20;
    /// Transmission aborted
    pub const ABTF: u8 = 0x40;
}

/// `RXBnCTRL` bits
pub mod rxb {
    /// Receive buffer 0 rolls over into buffer 1
    pub const BUKT: u8 = 0x04;
    /// Standard and extended frames matching the filters; with the masks
    /// cleared by reset every frame matches
    pub const RXM_STD_EXT: u8 = 0x00;
}

bitfield! {
    /// Bit timing register 1
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Cnf1(u8);
    impl Debug;
    /// Resynchronization jump width, quanta minus one
    pub u8, sjw, set_sjw: 7, 6;
    /// Baud rate prescaler, division factor minus one
    pub u8, brp, set_brp: 5, 0;
}

bitfield! {
    /// Bit timing register 2
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Cnf2(u8);
    impl Debug;
    /// Phase segment 2 length taken from `CNF3`
    pub btlmode, set_btlmode: 7;
    /// Sample three times
    pub sam, set_sam: 6;
    /// Phase segment 1, quanta minus one
    pub u8, phseg1, set_phseg1: 5, 3;
    /// Propagation segment, quanta minus one
    pub u8, prseg, set_prseg: 2, 0;
}

bitfield! {
    /// Bit timing register 3
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Cnf3(u8);
    impl Debug;
    /// Start-of-frame signal on CLKOUT
    pub sof, set_sof: 7;
    /// Wake-up filter
    pub wakfil, set_wakfil: 6;
    /// Phase segment 2, quanta minus one
    pub u8, phseg2, set_phseg2: 2, 0;
}

bitfield! {
    /// Error flags
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Eflg(u8);
    impl Debug;
    /// Either counter at or above 96
    pub ewarn, _: 0;
    /// Receive error counter at or above 96
    pub rxwar, _: 1;
    /// Transmit error counter at or above 96
    pub txwar, _: 2;
    /// Receive error passive
    pub rxep, _: 3;
    /// Transmit error passive
    pub txep, _: 4;
    /// Bus off
    pub txbo, _: 5;
    /// Receive buffer 0 overflowed
    pub rx0ovr, _: 6;
    /// Receive buffer 1 overflowed
    pub rx1ovr, _: 7;
}

/// `EFLG` overflow bit of receive buffer `n`
pub const fn rx_overflow(n: usize) -> u8 {
    0x40 << n
}

/// `CANINTF` full flag of receive buffer `n`
pub const fn rx_full(n: usize) -> u8 {
    intf::RX0IF << n
}
