//! FlexCAN register map

use bitfield::bitfield;

/// Offset of the first message buffer
pub const MAILBOX_BASE: usize = 0x80;
/// Size of one message buffer
pub const MAILBOX_STRIDE: usize = 16;
/// Number of message buffers
pub const NUM_MAILBOXES: usize = 32;
/// Message buffers taken by the receive FIFO and its default filter table
pub const FIFO_BUFFERS: usize = 8;

/// Word of a message buffer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MailboxWord {
    /// Control/status
    ControlStatus,
    /// Identifier
    Id,
    /// Payload bytes 0..4
    Data0,
    /// Payload bytes 4..8
    Data1,
}

/// Named FlexCAN register
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Module configuration
    Mcr,
    /// Control 1, bit timing and mode
    Ctrl1,
    /// Free running timer
    Timer,
    /// Receive mailboxes global mask
    RxMgMask,
    /// Receive buffer 14 mask
    Rx14Mask,
    /// Receive buffer 15 mask
    Rx15Mask,
    /// Error counters
    Ecr,
    /// Error and status 1
    Esr1,
    /// Receive FIFO global mask
    RxFgMask,
    /// Word of message buffer `index`
    Mailbox {
        /// Message buffer number
        index: u8,
        /// Word within the buffer
        word: MailboxWord,
    },
}

impl Register {
    /// Byte offset from the register block base
    pub const fn offset(self) -> usize {
        match self {
            Self::Mcr => 0x00,
            Self::Ctrl1 => 0x04,
            Self::Timer => 0x08,
            Self::RxMgMask => 0x10,
            Self::Rx14Mask => 0x14,
            Self::Rx15Mask => 0x18,
            Self::Ecr => 0x1C,
            Self::Esr1 => 0x20,
            Self::RxFgMask => 0x48,
            Self::Mailbox { index, word } => {
                debug_assert!((index as usize) < NUM_MAILBOXES);
                MAILBOX_BASE
                    + index as usize * MAILBOX_STRIDE
                    + match word {
                        MailboxWord::ControlStatus => 0x0,
                        MailboxWord::Id => 0x4,
                        MailboxWord::Data0 => 0x8,
                        MailboxWord::Data1 => 0xC,
                    }
            }
        }
    }

    /// Control/status word of message buffer `index`
    pub const fn cs(index: u8) -> Self {
        Self::Mailbox {
            index,
            word: MailboxWord::ControlStatus,
        }
    }

    /// Identifier word of message buffer `index`
    pub const fn id(index: u8) -> Self {
        Self::Mailbox {
            index,
            word: MailboxWord::Id,
        }
    }

    /// First payload word of message buffer `index`
    pub const fn data0(index: u8) -> Self {
        Self::Mailbox {
            index,
            word: MailboxWord::Data0,
        }
    }

    /// Second payload word of message buffer `index`
    pub const fn data1(index: u8) -> Self {
        Self::Mailbox {
            index,
            word: MailboxWord::Data1,
        }
    }
}

bitfield! {
    /// Module configuration register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Mcr(u32);
    impl Debug;

    /// Module disable
    pub mdis, set_mdis: 31;
    /// Freeze enable
    pub frz, set_frz: 30;
    /// Receive FIFO enable
    pub rfen, set_rfen: 29;
    /// Halt
    pub halt, set_halt: 28;
    /// Not ready
    pub notrdy, _: 27;
    /// Soft reset, cleared by hardware when done
    pub softrst, set_softrst: 25;
    /// Freeze acknowledge
    pub frzack, _: 24;
    /// Supervisor mode
    pub supv, set_supv: 23;
    /// Warning interrupt enable
    pub wrnen, set_wrnen: 21;
    /// Low power mode acknowledge
    pub lpmack, _: 20;
    /// Self reception disable
    pub srxdis, set_srxdis: 17;
    /// Individual receive masking
    pub irmq, set_irmq: 16;
    /// Number of the last message buffer
    pub u8, maxmb, set_maxmb: 6, 0;
}

bitfield! {
    /// Control 1 register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Ctrl1(u32);
    impl Debug;

    /// Prescaler minus one
    pub u8, presdiv, set_presdiv: 31, 24;
    /// Resync jump width minus one
    pub u8, rjw, set_rjw: 23, 22;
    /// Phase segment 1 minus one
    pub u8, pseg1, set_pseg1: 21, 19;
    /// Phase segment 2 minus one
    pub u8, pseg2, set_pseg2: 18, 16;
    /// Bus off interrupt mask
    pub boffmsk, set_boffmsk: 15;
    /// Error interrupt mask
    pub errmsk, set_errmsk: 14;
    /// Loopback
    pub lpb, set_lpb: 12;
    /// Listen only
    pub lom, set_lom: 3;
    /// Propagation segment minus one
    pub u8, propseg, set_propseg: 2, 0;
}

bitfield! {
    /// Error counter register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Ecr(u32);
    impl Debug;

    /// Transmit error counter
    pub u8, tx_err_counter, _: 7, 0;
    /// Receive error counter
    pub u8, rx_err_counter, _: 15, 8;
}

/// Fault confinement values of [`Esr1::fltconf`]
pub mod fltconf {
    /// Error passive
    pub const PASSIVE: u8 = 0b01;
}

bitfield! {
    /// Error and status 1 register
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct Esr1(u32);
    impl Debug;

    /// Error interrupt
    pub errint, _: 1;
    /// Bus off interrupt
    pub boffint, _: 2;
    /// Receiving
    pub rx, _: 3;
    /// Fault confinement state, `1x` is bus off
    pub u8, fltconf, _: 5, 4;
    /// Transmitting
    pub tx, _: 6;
    /// Bus idle
    pub idle, _: 7;
    /// Receive error warning
    pub rxwrn, _: 8;
    /// Transmit error warning
    pub txwrn, _: 9;
    /// Stuffing error
    pub stferr, _: 10;
    /// Form error
    pub frmerr, _: 11;
    /// CRC error
    pub crcerr, _: 12;
    /// Acknowledge error
    pub ackerr, _: 13;
    /// Bit 0 error
    pub bit0err, _: 14;
    /// Bit 1 error
    pub bit1err, _: 15;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offsets_match_the_register_map() {
        assert_eq!(Register::Ecr.offset(), 0x1C);
        assert_eq!(Register::RxFgMask.offset(), 0x48);
        assert_eq!(Register::cs(0).offset(), 0x80);
        assert_eq!(Register::data1(1).offset(), 0x9C);
        assert_eq!(Register::id(31).offset(), 0x80 + 31 * 16 + 4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn mailbox_past_the_last_is_caught() {
        let _ = Register::cs(NUM_MAILBOXES as u8).offset();
    }

    #[test]
    fn mcr_fields() {
        let mut mcr = Mcr(0);
        mcr.set_frz(true);
        mcr.set_halt(true);
        mcr.set_maxmb(15);
        assert_eq!(mcr.0, 0x5000_000F);
        assert!(Mcr(1 << 24).frzack());
        assert!(Mcr(1 << 20).lpmack());
    }

    #[test]
    fn esr1_fault_confinement() {
        assert_eq!(Esr1(0x10).fltconf(), fltconf::PASSIVE);
        assert_eq!(Esr1(0x20).fltconf(), 0b10);
        assert!(Esr1(0x300).txwrn());
        assert!(Esr1(0x300).rxwrn());
    }
}
