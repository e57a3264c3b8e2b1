//! Scoped default time unit.
//!
//! `scoped` installs a thread-local default unit for as long as the returned
//! guard lives. Guards nest, dropping one restores the unit that was active
//! before it.

use std::cell::Cell;
use std::marker::PhantomData;

use crate::time::TimeUnit;

thread_local! {
    static CURRENT: Cell<TimeUnit> = const { Cell::new(TimeUnit::Us) };
}

/// UnitsGuard restores the previous default unit on drop.
#[must_use = "the default unit is reset as soon as the guard is dropped"]
pub struct UnitsGuard {
    previous: TimeUnit,
    // bound to the thread that installed it
    _local: PhantomData<*const ()>,
}

pub fn scoped(unit: TimeUnit) -> UnitsGuard {
    let previous = CURRENT.with(|c| c.replace(unit));
    UnitsGuard {
        previous,
        _local: PhantomData,
    }
}

pub fn current() -> TimeUnit {
    CURRENT.with(|c| c.get())
}

impl Drop for UnitsGuard {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(self.previous));
    }
}
