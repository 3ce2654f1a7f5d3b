//! Mailbox roster, transmit allocation and receive scanning
//!
//! Transmit mailboxes occupy indices `0..tx`, receive mailboxes
//! `tx..tx + rx`. The controller owns the real buffer states; the
//! [`MailboxStore`] records the last state it observed and decides which
//! mailbox an operation uses.

use crate::config::Allocation;
use crate::error::{Error, Result};
use core::ops::Range;

/// Largest number of mailboxes any supported controller has
pub const MAX_MAILBOXES: usize = 32;

/// Direction a mailbox is used for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Frames are sent from it
    Transmit,
    /// Frames are received into it
    Receive,
}

/// State of a single mailbox
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MailboxStatus {
    /// Not taking part in bus traffic
    Inactive,
    /// Answer to a remote request waiting to be sent
    PendingSend,
    /// Frame waiting for or in transmission
    Sending,
    /// Transmission was cancelled
    Aborted,
    /// Waiting for a frame
    Empty,
    /// Holds an unread frame
    Full,
    /// Holds an unread frame, an earlier one was lost
    Overrun,
    /// Being updated by the controller
    Locked,
    /// Code without a meaning in this driver
    Reserved(u8),
}

impl MailboxStatus {
    /// A frame can be read from the mailbox
    pub fn has_data(self) -> bool {
        matches!(self, Self::Full | Self::Overrun)
    }

    /// A new frame can be placed in the mailbox
    ///
    /// Only inactive mailboxes qualify; `abort_transmit` hands an aborted
    /// mailbox back as inactive once the controller took the abort.
    pub fn is_free_for_transmit(self) -> bool {
        self == Self::Inactive
    }
}

/// Transmission progress of a mailbox
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    /// Nothing queued
    Idle,
    /// Frame queued or on the bus
    Busy,
    /// Not sending anymore
    Complete,
    /// The mailbox could not be queried
    Error,
}

impl From<MailboxStatus> for TxStatus {
    fn from(status: MailboxStatus) -> Self {
        match status {
            MailboxStatus::Inactive => Self::Idle,
            MailboxStatus::Sending | MailboxStatus::PendingSend => Self::Busy,
            _ => Self::Complete,
        }
    }
}

/// Split of the mailboxes between transmit and receive
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MailboxLayout {
    /// Number of transmit mailboxes
    pub tx: u8,
    /// Number of receive mailboxes
    pub rx: u8,
}

impl MailboxLayout {
    /// Total number of mailboxes
    pub fn len(&self) -> usize {
        usize::from(self.tx) + usize::from(self.rx)
    }

    /// No mailbox at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of the transmit mailboxes
    pub fn tx_range(&self) -> Range<usize> {
        0..usize::from(self.tx)
    }

    /// Indices of the receive mailboxes
    pub fn rx_range(&self) -> Range<usize> {
        usize::from(self.tx)..self.len()
    }

    /// Role of mailbox `index`, `None` past the last mailbox
    pub fn role(&self, index: usize) -> Option<Role> {
        if self.tx_range().contains(&index) {
            Some(Role::Transmit)
        } else if self.rx_range().contains(&index) {
            Some(Role::Receive)
        } else {
            None
        }
    }

    /// Check the split against what a controller can hold
    pub fn check(&self, capacity: &Capacity) -> Result<()> {
        if self.tx == 0
            || self.rx == 0
            || self.tx > capacity.tx
            || self.rx > capacity.rx
            || self.len() > usize::from(capacity.total)
        {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}

/// Mailbox limits of a controller
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capacity {
    /// Most transmit mailboxes
    pub tx: u8,
    /// Most receive mailboxes
    pub rx: u8,
    /// Most mailboxes in total
    pub total: u8,
}

/// One entry of the roster
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mailbox {
    /// Position in the roster
    pub index: usize,
    /// Direction
    pub role: Role,
    /// Last observed state
    pub status: MailboxStatus,
}

/// Roster of mailboxes with the allocation and scan policies
#[derive(Clone, Debug)]
pub struct MailboxStore {
    layout: MailboxLayout,
    allocation: Allocation,
    statuses: [MailboxStatus; MAX_MAILBOXES],
    next_hint: usize,
    last_received: Option<(usize, MailboxStatus)>,
}

impl Default for MailboxStore {
    fn default() -> Self {
        Self::new(MailboxLayout::default(), Allocation::FirstFit)
    }
}

impl MailboxStore {
    /// Roster in the state a freshly configured controller is in
    ///
    /// Callers check `layout` against the controller capacity first; mailboxes
    /// past [`MAX_MAILBOXES`] are not tracked.
    pub fn new(layout: MailboxLayout, allocation: Allocation) -> Self {
        let mut statuses = [MailboxStatus::Inactive; MAX_MAILBOXES];
        for index in layout.rx_range().take_while(|&index| index < MAX_MAILBOXES) {
            statuses[index] = MailboxStatus::Empty;
        }
        Self {
            layout,
            allocation,
            statuses,
            next_hint: 0,
            last_received: None,
        }
    }

    /// Mailbox split
    pub fn layout(&self) -> MailboxLayout {
        self.layout
    }

    /// Transmit mailbox selection policy
    pub fn allocation(&self) -> Allocation {
        self.allocation
    }

    /// Transmit mailbox the next round-robin scan starts at
    pub fn next_hint(&self) -> usize {
        self.next_hint
    }

    /// Roster entry of mailbox `index`
    pub fn mailbox(&self, index: usize) -> Option<Mailbox> {
        let role = self.layout.role(index)?;
        let status = *self.statuses.get(index)?;
        Some(Mailbox {
            index,
            role,
            status,
        })
    }

    /// Iterate over the roster
    pub fn iter(&self) -> impl Iterator<Item = Mailbox> + '_ {
        (0..self.layout.len()).filter_map(|index| self.mailbox(index))
    }

    /// Mailbox and state of the most recently consumed receive mailbox
    ///
    /// Tells [`MailboxStatus::Full`] and [`MailboxStatus::Overrun`] apart
    /// after the fact.
    pub fn last_received(&self) -> Option<(usize, MailboxStatus)> {
        self.last_received
    }

    /// Fails with [`Error::InvalidParameter`] unless `index` names a
    /// transmit mailbox
    pub fn check_transmit(&self, index: usize) -> Result<()> {
        match self.layout.role(index) {
            Some(Role::Transmit) => Ok(()),
            _ => Err(Error::InvalidParameter),
        }
    }

    /// Record a state read back from the controller
    pub fn observe(&mut self, index: usize, status: MailboxStatus) {
        if let Some(slot) = self.statuses.get_mut(index) {
            *slot = status;
        }
    }

    /// Pick a free transmit mailbox
    ///
    /// `status_of` reads the current state of a mailbox from the controller.
    /// With [`Allocation::FirstFit`] mailbox 0 is always taken when free.
    ///
    /// # Errors
    /// [`Error::Busy`] when no transmit mailbox is free, or whatever
    /// `status_of` fails with.
    pub fn allocate_for_transmit<F>(&mut self, mut status_of: F) -> Result<usize>
    where
        F: FnMut(usize) -> Result<MailboxStatus>,
    {
        let count = usize::from(self.layout.tx);
        let start = match self.allocation {
            Allocation::FirstFit => 0,
            Allocation::RoundRobin => self.next_hint,
        };
        for offset in 0..count {
            let index = (start + offset) % count;
            let status = status_of(index)?;
            self.observe(index, status);
            if status.is_free_for_transmit() {
                self.next_hint = (index + 1) % count;
                return Ok(index);
            }
        }
        Err(Error::Busy)
    }

    /// Record that a frame was handed to mailbox `index`
    pub fn mark_sending(&mut self, index: usize) {
        self.observe(index, MailboxStatus::Sending);
    }

    /// Find the lowest receive mailbox holding a frame
    ///
    /// Returns the mailbox together with its state so that overruns stay
    /// visible; both states are consumed the same way.
    pub fn scan_for_received<F>(&mut self, mut status_of: F) -> Result<Option<(usize, MailboxStatus)>>
    where
        F: FnMut(usize) -> Result<MailboxStatus>,
    {
        for index in self.layout.rx_range() {
            let status = status_of(index)?;
            self.observe(index, status);
            if status.has_data() {
                return Ok(Some((index, status)));
            }
        }
        Ok(None)
    }

    /// Record that the frame in mailbox `index` was read and the mailbox
    /// handed back to the controller
    pub fn mark_consumed(&mut self, index: usize, status: MailboxStatus) {
        self.observe(index, MailboxStatus::Empty);
        self.last_received = Some((index, status));
    }
}
