//! Volatile access to a FlexCAN register block

use super::reg::Register;
use cantrx_core::{CanId, Dependencies, RegisterAccess};
use core::convert::Infallible;
use core::marker::PhantomData;
use fugit::HertzU32;
use vcell::VolatileCell;

/// Memory-mapped register block of the peripheral identified by `Id`
///
/// Holding the [`Dependencies`] proves that the registers are owned
/// exclusively and that the peripheral is clocked.
pub struct Mmio<Id, D> {
    dependencies: D,
    _id: PhantomData<Id>,
}

impl<Id: CanId, D: Dependencies<Id>> Mmio<Id, D> {
    /// Take ownership of the register block
    pub fn new(dependencies: D) -> Self {
        Self {
            dependencies,
            _id: PhantomData,
        }
    }

    /// Give back the dependencies
    pub fn release(self) -> D {
        self.dependencies
    }

    /// Clock of the protocol engine
    pub fn can_clock(&self) -> HertzU32 {
        self.dependencies.can_clock()
    }

    fn cell(&self, register: Register) -> &VolatileCell<u32> {
        // Safety: `Dependencies` grants exclusive access to the register block
        // at `Id::ADDRESS`, and every `Register` offset lies within it.
        unsafe {
            &*(Id::ADDRESS as *const u8)
                .add(register.offset())
                .cast::<VolatileCell<u32>>()
        }
    }
}

impl<Id: CanId, D: Dependencies<Id>> RegisterAccess for Mmio<Id, D> {
    type Address = Register;
    type Word = u32;
    type Error = Infallible;

    fn read(&mut self, address: Register) -> Result<u32, Infallible> {
        Ok(self.cell(address).get())
    }

    fn write(&mut self, address: Register, value: u32) -> Result<(), Infallible> {
        self.cell(address).set(value);
        Ok(())
    }
}
