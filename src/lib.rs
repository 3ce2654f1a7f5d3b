#![no_std]
#![warn(missing_docs)]
//! # cantrx
//!
//! ## Overview
//! Platform-agnostic driver for classic CAN controllers.
//!
//! It provides the following features:
//!
//! - bit timing calculation from a reference clock and a target bit rate
//! - guarded mode changes (freeze, normal, listen-only, loopback) with
//!   bounded acknowledgement polling
//! - mailbox based transmission with first-fit or round-robin allocation,
//!   cancellation and progress queries
//! - polled reception with overrun detection
//! - error counters and fault confinement flags
//! - J1939 identifier packing and frame conversion
//!
//! Two controllers are supported through the [`Controller`] trait:
//!
//! - [`flexcan::Flexcan`], a memory-mapped FlexCAN peripheral reached through
//!   [`cantrx_core::RegisterAccess`]; [`flexcan::Mmio`] provides volatile
//!   access once a target HAL implements [`cantrx_core::Dependencies`]
//! - [`mcp2515::Mcp2515`], the stand-alone controller on an
//!   [`embedded_hal::spi::SpiDevice`]
//!
//! Both are driven by [`Can`], which tracks configuration, operating state and
//! mailboxes, and implements [`embedded_can::nb::Can`].
//!
//! ## Usage
//!
//! ```no_run
//! use cantrx::embedded_can::StandardId;
//! use cantrx::mcp2515::{Mcp2515, Preset};
//! use cantrx::{Can, CanConfig, Frame};
//!
//! fn run<SPI: embedded_hal::spi::SpiDevice>(spi: SPI) -> cantrx::Result<()> {
//!     let mut can = Can::new(Mcp2515::new(spi, Preset::OSCILLATOR));
//!     can.initialize(CanConfig::new(Preset::Kbps500.timing()).with_mailboxes(3, 2))?;
//!
//!     let id = StandardId::new(0x123).ok_or(cantrx::Error::InvalidParameter)?;
//!     can.transmit(&Frame::with_data(id, &[0xDE, 0xAD])?)?;
//!
//!     match can.receive() {
//!         Ok(frame) => log::info!("{:x?}", frame.payload()),
//!         Err(cantrx::Error::NoMessage) => {}
//!         Err(error) => return Err(error),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Mode changes poll for an acknowledgement at most
//! [`RetryBudget::DEFAULT_POLLS`] times after the first check. A different
//! bound, e.g. one backed by a timer, is passed with [`Can::with_wait_policy`].
//!
//! [`RetryBudget::DEFAULT_POLLS`]: cantrx_core::RetryBudget::DEFAULT_POLLS

pub mod bus;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod flexcan;
pub mod j1939;
pub mod mailbox;
pub mod mcp2515;
pub mod message;
pub mod mode;
pub mod prelude;
pub mod status;
pub mod timing;

pub use cantrx_core;
pub use embedded_can;

pub use bus::{Can, ControllerState};
pub use config::{Allocation, CanConfig, Mode};
pub use controller::Controller;
pub use error::{Error, Result};
pub use mailbox::{MailboxStatus, TxStatus};
pub use message::Frame;
pub use mode::{DeviceState, Transition};
pub use status::{ErrorCounters, ErrorState, FaultFlags};
pub use timing::{compute_timing, TimingConfig};
