//! Scoped "active range" restriction.
//!
//! [`Range::enter`] makes an interval set the active range of the current
//! thread until the returned guard is dropped. While a range is active,
//! `r()` on an [`IntervalSet`] or a [`TimeSeries`](crate::series::TimeSeries)
//! returns its restriction to that range, computed once and memoized in the
//! object's [`RangeSlot`].
//!
//! Every slot that memoized a value registers itself on this thread. Entering
//! or leaving a scope, including leaving it by unwinding, clears the value of
//! every registered slot. Slots stay registered until their owner is dropped.
//!
//! ```
//! use neuroseries_core::{Range, TimeUnit, Tsd};
//!
//! let tsd = Tsd::new(&[100, 500, 1500], vec![1.0, 2.0, 3.0], TimeUnit::Us).unwrap();
//! {
//!     let _range = Range::enter((0, 1000));
//!     assert_eq!(tsd.r().unwrap().timestamps(), &[100, 500]);
//! }
//! assert!(tsd.r().is_err());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use neuroseries_utils::time::{RawTimestamp, TimeUnit};

use crate::error::{Error, Result};
use crate::interval::IntervalSet;

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<IntervalSet>>> = const { RefCell::new(Vec::new()) };
    static REGISTRY: RefCell<Vec<Weak<dyn Invalidate>>> = const { RefCell::new(Vec::new()) };
}

trait Invalidate {
    fn invalidate(&self);
}

struct SlotInner<T> {
    value: RefCell<Option<Rc<T>>>,
    registered: Cell<bool>,
}

impl<T> Invalidate for SlotInner<T> {
    fn invalidate(&self) {
        self.value.borrow_mut().take();
    }
}

/// RangeSlot holds one object's memoized restriction to the active range.
///
/// Cloning yields an empty slot and slots always compare equal, so an owner
/// can keep deriving `Clone`/`PartialEq` semantics from its data alone.
pub struct RangeSlot<T: 'static> {
    inner: Rc<SlotInner<T>>,
}

impl<T: 'static> RangeSlot<T> {
    /// get_or_restrict returns the memoized value, computing it with `f` from
    /// the active range on first access.
    pub fn get_or_restrict<F>(&self, f: F) -> Result<Rc<T>>
    where
        F: FnOnce(&IntervalSet) -> T,
    {
        let active = active().ok_or(Error::NoActiveRange)?;

        if let Some(v) = self.inner.value.borrow().as_ref() {
            return Ok(v.clone());
        }

        let v = Rc::new(f(&*active));
        *self.inner.value.borrow_mut() = Some(v.clone());
        self.register();

        Ok(v)
    }

    pub fn is_cached(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    fn register(&self) {
        if self.inner.registered.replace(true) {
            return;
        }

        let inner: Rc<dyn Invalidate> = self.inner.clone();
        let weak = Rc::downgrade(&inner);
        REGISTRY.with(|r| r.borrow_mut().push(weak));
    }
}

impl<T: 'static> Default for RangeSlot<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(SlotInner {
                value: RefCell::new(None),
                registered: Cell::new(false),
            }),
        }
    }
}

impl<T: 'static> Clone for RangeSlot<T> {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl<T: 'static> PartialEq for RangeSlot<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T: 'static> fmt::Debug for RangeSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeSlot")
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// active returns the innermost active range of this thread.
pub fn active() -> Option<Rc<IntervalSet>> {
    ACTIVE.with(|a| a.borrow().last().cloned())
}

/// invalidate_all clears every registered slot and forgets slots whose owner
/// is gone.
fn invalidate_all() {
    REGISTRY.with(|r| {
        r.borrow_mut().retain(|slot| match slot.upgrade() {
            Some(slot) => {
                slot.invalidate();
                true
            }
            None => false,
        })
    });
}

/// IntoRange converts the accepted range bounds into an interval set.
pub trait IntoRange {
    fn into_range(self) -> IntervalSet;
}

impl IntoRange for IntervalSet {
    fn into_range(self) -> IntervalSet {
        self
    }
}

impl IntoRange for &IntervalSet {
    fn into_range(self) -> IntervalSet {
        self.clone()
    }
}

impl<T: RawTimestamp> IntoRange for (T, T) {
    fn into_range(self) -> IntervalSet {
        IntervalSet::single(self.0, self.1, TimeUnit::Us)
    }
}

impl<T: RawTimestamp> IntoRange for (T, T, TimeUnit) {
    fn into_range(self) -> IntervalSet {
        IntervalSet::single(self.0, self.1, self.2)
    }
}

/// Range is the guard of an active range scope.
#[must_use = "the range is left as soon as the guard is dropped"]
pub struct Range {
    interval: Rc<IntervalSet>,
    // the scope lives in thread-local state
    _local: PhantomData<*const ()>,
}

impl Range {
    /// enter makes `bounds` the active range until the guard is dropped. An
    /// enclosing scope becomes active again on exit.
    pub fn enter(bounds: impl IntoRange) -> Range {
        let interval = Rc::new(bounds.into_range());
        ACTIVE.with(|a| a.borrow_mut().push(interval.clone()));
        invalidate_all();

        tracing::debug!(intervals = interval.len(), "entered range");
        Range {
            interval,
            _local: PhantomData,
        }
    }

    /// interval returns the range bound by this scope.
    pub fn interval(&self) -> &IntervalSet {
        &self.interval
    }
}

impl Drop for Range {
    fn drop(&mut self) {
        ACTIVE.with(|a| {
            let mut a = a.borrow_mut();
            if let Some(pos) = a.iter().rposition(|i| Rc::ptr_eq(i, &self.interval)) {
                a.remove(pos);
            }
        });
        invalidate_all();

        tracing::debug!("left range");
    }
}

/// with_range runs `f` with `bounds` as the active range.
pub fn with_range<R>(bounds: impl IntoRange, f: impl FnOnce(&IntervalSet) -> R) -> R {
    let range = Range::enter(bounds);
    f(range.interval())
}
