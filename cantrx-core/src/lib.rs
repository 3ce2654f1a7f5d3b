#![no_std]
#![warn(missing_docs)]

//! `cantrx-core` provides the small set of abstractions that sit between the
//! platform independent [`cantrx`] driver and the platform specific code that
//! owns the hardware (in documentation also referred to as _target HALs_).
//!
//! - [`CanId`] and [`Dependencies`] identify a memory-mapped CAN peripheral
//!   and prove exclusive ownership of it.
//! - [`RegisterAccess`] is the capability through which the driver reads and
//!   writes named registers. The memory-mapped backend implements it with
//!   volatile accesses, the serial backend with SPI commands, and tests with a
//!   plain software register file.
//! - [`WaitPolicy`] bounds every acknowledgement poll performed by the driver.
//!
//! Integrators of this crate into any given target HAL are responsible for
//! soundness of the `unsafe` trait implementations and conforming to their
//! respective safety prerequisites.
//!
//! [`cantrx`]: <https://docs.rs/crate/cantrx/>

pub use fugit;

/// Trait representing CAN peripheral identity
///
/// Types implementing this trait are expected to be zero-sized marker types
/// identifying a specific instance of a memory-mapped CAN peripheral. It only
/// conveys *where* the peripheral registers are located, not that they can be
/// accessed. The latter is expressed by the [`Dependencies`] trait.
///
/// # Safety
/// `CanId::ADDRESS` points to the start of a valid register block of a CAN
/// peripheral
///
/// # Examples
/// ```no_run
/// use cantrx_core::CanId;
///
/// pub enum Can0 {}
///
/// unsafe impl CanId for Can0 {
///     const ADDRESS: *const () = 0x4002_4000 as *const _;
/// }
/// ```
pub unsafe trait CanId {
    /// Static address of the register block of the corresponding peripheral
    const ADDRESS: *const ();
}

/// Trait representing CAN peripheral dependencies
///
/// Structs implementing [`Dependencies`] should
/// - enclose everything the peripheral needs to run (clock gates, pins) and
///   release it upon destruction
/// - be constructible only when it is sound to interact with the peripheral
/// - be a singleton per [`CanId`]
///
/// in order to prevent aliasing and guarantee that the driver is the sole owner
/// of the peripheral.
///
/// # Safety
/// While a [`Dependencies`] instance exists
/// - the CAN protocol engine clock must not change
/// - the register block must not be accessed anywhere else
pub unsafe trait Dependencies<Id: CanId> {
    /// Frequency of the clock feeding the CAN protocol engine; the reference
    /// clock for bit timing
    fn can_clock(&self) -> fugit::HertzU32;
}

/// Read/write access to the named registers of a CAN controller
///
/// `Address` names a register, `Word` is its width. Implementations are free
/// to fail (a serial link can), in which case the error is reported through
/// `Error`; memory-mapped implementations use [`core::convert::Infallible`].
pub trait RegisterAccess {
    /// Register name
    type Address: Copy;
    /// Register width
    type Word: Copy;
    /// Transfer failure
    type Error: core::fmt::Debug;

    /// Read the current value of a register
    fn read(&mut self, address: Self::Address) -> Result<Self::Word, Self::Error>;

    /// Overwrite a register
    fn write(&mut self, address: Self::Address, value: Self::Word) -> Result<(), Self::Error>;

    /// Read-modify-write a register
    fn modify<F>(&mut self, address: Self::Address, f: F) -> Result<(), Self::Error>
    where
        F: FnOnce(Self::Word) -> Self::Word,
    {
        let value = self.read(address)?;
        self.write(address, f(value))
    }
}

/// Bounds a hardware acknowledgement poll
///
/// The driver checks the acknowledgement once, and then asks the policy before
/// every further check. `attempt` counts the checks that already failed,
/// starting at `0`. Returning `false` ends the poll with a timeout.
pub trait WaitPolicy {
    /// Decide whether another poll is allowed
    fn retry(&mut self, attempt: u32) -> bool;
}

/// Fixed number of additional polls
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryBudget(pub u32);

impl RetryBudget {
    /// Iteration budget used when nothing else is specified
    pub const DEFAULT_POLLS: u32 = 10_000;
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self(Self::DEFAULT_POLLS)
    }
}

impl WaitPolicy for RetryBudget {
    fn retry(&mut self, attempt: u32) -> bool {
        attempt < self.0
    }
}

/// Wait policy backed by a closure, e.g. a check against a monotonic clock
///
/// ```
/// use cantrx_core::{Deadline, WaitPolicy};
///
/// let mut polls = Deadline(|attempt: u32| attempt < 3);
/// assert!(polls.retry(2));
/// assert!(!polls.retry(3));
/// ```
pub struct Deadline<F>(pub F);

impl<F: FnMut(u32) -> bool> WaitPolicy for Deadline<F> {
    fn retry(&mut self, attempt: u32) -> bool {
        (self.0)(attempt)
    }
}

impl<W: WaitPolicy + ?Sized> WaitPolicy for &mut W {
    fn retry(&mut self, attempt: u32) -> bool {
        (**self).retry(attempt)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retry_budget_allows_exactly_its_count() {
        let mut budget = RetryBudget(2);
        assert!(budget.retry(0));
        assert!(budget.retry(1));
        assert!(!budget.retry(2));
    }

    #[test]
    fn zero_budget_never_retries() {
        assert!(!RetryBudget(0).retry(0));
    }

    #[test]
    fn default_budget_matches_iteration_limit() {
        assert_eq!(RetryBudget::default(), RetryBudget(10_000));
    }
}
