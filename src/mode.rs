//! Operating mode state machine
//!
//! ```text
//! Disabled -> Ready -> Frozen <-> Operational(Normal | ListenOnly | Loopback)
//! ```
//!
//! Every change of timing, mode or mailbox shape happens while the controller
//! is frozen. Each request is followed by a poll of the matching
//! acknowledgement, bounded by a [`WaitPolicy`]; an acknowledgement that never
//! shows up ends the transition with [`Error::Timeout`].

use crate::config::Mode;
use crate::controller::Controller;
use crate::error::{Error, Result};
use cantrx_core::WaitPolicy;

/// Last state the controller acknowledged
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    /// Module disabled or never enabled
    #[default]
    Disabled,
    /// Module enabled and reset
    Ready,
    /// Bus activity suspended, configuration writable
    Frozen,
    /// Taking part in bus traffic
    Operational(Mode),
}

/// Guarded step of a mode change
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Leaving the disabled/low-power state
    Enable,
    /// Soft reset of the module
    SoftReset,
    /// Entering freeze/configuration
    EnterFreeze,
    /// Leaving freeze into an operational mode
    ExitFreeze,
}

/// Tracks and drives the operating state of one controller
#[derive(Copy, Clone, Debug, Default)]
pub struct ModeController {
    state: DeviceState,
}

impl ModeController {
    /// Last acknowledged state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Disabled -> Ready: enable the module and soft reset it
    pub fn enable<C: Controller, W: WaitPolicy>(
        &mut self,
        controller: &mut C,
        wait: &mut W,
    ) -> Result<()> {
        controller.request_enable()?;
        await_ack(Transition::Enable, wait, || controller.is_enabled())?;
        controller.request_soft_reset()?;
        await_ack(Transition::SoftReset, wait, || controller.is_reset_complete())?;
        self.state = DeviceState::Ready;
        log::debug!("controller ready");
        Ok(())
    }

    /// Enter freeze from any enabled state
    pub fn freeze<C: Controller, W: WaitPolicy>(
        &mut self,
        controller: &mut C,
        wait: &mut W,
    ) -> Result<()> {
        controller.enter_freeze()?;
        await_ack(Transition::EnterFreeze, wait, || controller.is_frozen())?;
        self.state = DeviceState::Frozen;
        log::debug!("controller frozen");
        Ok(())
    }

    /// Leave freeze into `mode`
    pub fn unfreeze<C: Controller, W: WaitPolicy>(
        &mut self,
        controller: &mut C,
        wait: &mut W,
        mode: Mode,
    ) -> Result<()> {
        controller.leave_freeze(mode)?;
        await_ack(Transition::ExitFreeze, wait, || controller.is_operational(mode))?;
        self.state = DeviceState::Operational(mode);
        log::debug!("controller operational in {:?} mode", mode);
        Ok(())
    }

    /// Freeze, apply `change`, and resume in `mode`
    ///
    /// Each half is guarded on its own. If entering freeze times out nothing
    /// was changed; if leaving it times out the change is applied but the
    /// controller may still be frozen, which [`Self::state`] reflects.
    pub fn reconfigure<C, W, F>(
        &mut self,
        controller: &mut C,
        wait: &mut W,
        mode: Mode,
        change: F,
    ) -> Result<()>
    where
        C: Controller,
        W: WaitPolicy,
        F: FnOnce(&mut C) -> Result<()>,
    {
        self.freeze(controller, wait)?;
        change(controller)?;
        self.unfreeze(controller, wait, mode)
    }

    /// Disable the module; never waits
    pub fn disable<C: Controller>(&mut self, controller: &mut C) -> Result<()> {
        self.state = DeviceState::Disabled;
        controller.disable()
    }
}

/// Poll `acknowledged` until it reports `true` or `wait` gives up
pub fn await_ack<W, F>(transition: Transition, wait: &mut W, mut acknowledged: F) -> Result<()>
where
    W: WaitPolicy,
    F: FnMut() -> Result<bool>,
{
    let mut attempt = 0_u32;
    loop {
        if acknowledged()? {
            return Ok(());
        }
        if !wait.retry(attempt) {
            log::warn!(
                "{:?} not acknowledged after {} polls",
                transition,
                u64::from(attempt) + 1
            );
            return Err(Error::Timeout(transition));
        }
        attempt = attempt.saturating_add(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cantrx_core::{Deadline, RetryBudget};

    #[test]
    fn immediate_acknowledgement_needs_no_retry() {
        let mut wait = RetryBudget(0);
        assert_eq!(await_ack(Transition::Enable, &mut wait, || Ok(true)), Ok(()));
    }

    #[test]
    fn late_acknowledgement_within_budget() {
        let mut polls = 0;
        let mut wait = RetryBudget(5);
        let result = await_ack(Transition::EnterFreeze, &mut wait, || {
            polls += 1;
            Ok(polls == 6)
        });
        assert_eq!(result, Ok(()));
        assert_eq!(polls, 6);
    }

    #[test]
    fn exhausted_budget_times_out() {
        let mut polls = 0;
        let mut wait = RetryBudget(3);
        let result = await_ack(Transition::ExitFreeze, &mut wait, || {
            polls += 1;
            Ok(false)
        });
        assert_eq!(result, Err(Error::Timeout(Transition::ExitFreeze)));
        assert_eq!(polls, 4);
    }

    #[test]
    fn deadline_closure_ends_the_wait() {
        let mut wait = Deadline(|attempt: u32| attempt < 1);
        assert_eq!(
            await_ack(Transition::SoftReset, &mut wait, || Ok(false)),
            Err(Error::Timeout(Transition::SoftReset))
        );
    }

    #[test]
    fn query_errors_end_the_wait() {
        let mut wait = RetryBudget::default();
        assert_eq!(
            await_ack(Transition::Enable, &mut wait, || Err(Error::Transport)),
            Err(Error::Transport)
        );
    }
}
