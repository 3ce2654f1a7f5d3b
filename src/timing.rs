//! Bit timing calculation
//!
//! All segment lengths in [`TimingConfig`] are stored in the encoding both
//! supported controllers use in their registers: the number of time quanta
//! minus one. The prescaler is stored as the real division factor.

use crate::error::{Error, Result};
use core::ops::RangeInclusive;
use fugit::HertzU32;

/// Time quanta per bit chosen by [`compute_timing`]
pub const TIME_QUANTA_PER_BIT: u32 = 16;

/// Valid prescaler values
pub const PRESCALER_RANGE: RangeInclusive<u32> = 1..=256;

/// Bit timing parameters
///
/// The bit time is `1 + (propagation_segment + 1) + (phase_segment_1 + 1) +
/// (phase_segment_2 + 1)` time quanta, one time quantum being `prescaler`
/// periods of the reference clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Bit rate this configuration was computed for
    pub bitrate: HertzU32,
    /// Reference clock division factor, `1..=256`
    pub prescaler: u16,
    /// Propagation segment, time quanta minus one
    pub propagation_segment: u8,
    /// Phase segment 1, time quanta minus one
    pub phase_segment_1: u8,
    /// Phase segment 2, time quanta minus one
    pub phase_segment_2: u8,
    /// Resynchronization jump width, time quanta minus one
    pub resync_jump_width: u8,
}

impl TimingConfig {
    /// Number of time quanta that make up one bit time
    pub fn time_quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.propagation_segment)
            + 1
            + u32::from(self.phase_segment_1)
            + 1
            + u32::from(self.phase_segment_2)
            + 1
    }

    /// Number of time quanta before the sample point
    pub fn sample_point_quanta(&self) -> u32 {
        self.time_quanta_per_bit() - (u32::from(self.phase_segment_2) + 1)
    }

    /// Sample point position in per mille of the bit time
    pub fn sample_point_permille(&self) -> u32 {
        self.sample_point_quanta() * 1000 / self.time_quanta_per_bit()
    }

    /// Bit rate actually produced at `reference_clock`
    pub fn actual_bitrate(&self, reference_clock: HertzU32) -> HertzU32 {
        let divider = u32::from(self.prescaler) * self.time_quanta_per_bit();
        HertzU32::from_raw(reference_clock.raw() / divider)
    }

    /// Checks that every field fits the register fields it is written to
    ///
    /// Segments have three bits, the jump width two, phase segment 2 needs at
    /// least two time quanta and the jump width cannot exceed it.
    pub fn validate(&self) -> Result<()> {
        let segments_fit = self.propagation_segment <= 7
            && self.phase_segment_1 <= 7
            && (1..=7).contains(&self.phase_segment_2)
            && self.resync_jump_width <= 3
            && self.resync_jump_width <= self.phase_segment_2;
        if !PRESCALER_RANGE.contains(&u32::from(self.prescaler)) || !segments_fit {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// Derive a [`TimingConfig`] for `bitrate` from `reference_clock`
///
/// A bit is split into 16 time quanta: 1 sync, 3 propagation, 8 phase 1 and 4
/// phase 2, with a jump width of 4. The prescaler is `reference_clock /
/// (bitrate * 16)`, truncated.
///
/// # Errors
/// [`Error::InvalidParameter`] if either input is zero or the prescaler falls
/// outside `1..=256`.
///
/// ```
/// use cantrx::timing::compute_timing;
/// use fugit::RateExtU32;
///
/// let timing = compute_timing(80.MHz(), 500.kHz()).unwrap();
/// assert_eq!(timing.prescaler, 10);
/// assert_eq!(timing.time_quanta_per_bit(), 16);
/// ```
pub fn compute_timing(reference_clock: HertzU32, bitrate: HertzU32) -> Result<TimingConfig> {
    if reference_clock.raw() == 0 || bitrate.raw() == 0 {
        return Err(Error::InvalidParameter);
    }
    let quanta_rate = u64::from(bitrate.raw()) * u64::from(TIME_QUANTA_PER_BIT);
    let prescaler = u64::from(reference_clock.raw()) / quanta_rate;
    if prescaler == 0 || prescaler > u64::from(*PRESCALER_RANGE.end()) {
        log::debug!(
            "{} Hz unreachable from {} Hz (prescaler {})",
            bitrate.raw(),
            reference_clock.raw(),
            prescaler
        );
        return Err(Error::InvalidParameter);
    }
    if u64::from(reference_clock.raw()) % quanta_rate != 0 {
        log::debug!(
            "{} Hz is not an integer multiple of {} Hz * 16, rate will be off",
            reference_clock.raw(),
            bitrate.raw()
        );
    }

    Ok(TimingConfig {
        bitrate,
        prescaler: prescaler as u16,
        propagation_segment: 2,
        phase_segment_1: 7,
        phase_segment_2: 3,
        resync_jump_width: 3,
    })
}
