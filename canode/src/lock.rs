//! Interrupt-masking critical sections, with one saved state per shared-state domain
//!
//! The protocol engine shares three kinds of state between the timer interrupt, the CAN
//! interrupts and the polling loop: the outbound send path, error/emergency reporting, and the
//! object dictionary. Each kind is a [`LockDomain`]. Locking a domain masks interrupts and stores
//! the previous mask in a slot belonging to that domain, so that releasing it restores exactly
//! what was saved, even if a different domain was locked and released in between.
//!
//! This gives mutual exclusion between interrupt and polling context on a single core. It does not
//! provide exclusion between cores.
//!
//! Locks must be strictly nested: guards are released in the reverse order they were taken, and a
//! domain is never locked again while it is held. Both are checked on every build, and a violation
//! panics with interrupts still masked.

use core::{cell::UnsafeCell, marker::PhantomData};

/// A kind of shared state protected by its own saved interrupt state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockDomain {
    /// The outbound CAN send path
    Send = 0,
    /// Error and emergency reporting
    Emergency = 1,
    /// Object dictionary access
    ObjectDictionary = 2,
}

impl LockDomain {
    const COUNT: usize = 3;

    const fn slot(self) -> usize {
        self as usize
    }
}

/// A mechanism for masking interrupts
///
/// # Safety
///
/// Between `acquire` and the matching `release`, no other execution context which touches state
/// protected by a [`LockDomains`] using this implementation may run.
pub unsafe trait IrqControl {
    /// The interrupt state saved by `acquire`
    type State: Copy;

    /// Mask interrupts, returning the state from before masking
    fn acquire(&self) -> Self::State;

    /// Restore the interrupt state
    ///
    /// # Safety
    ///
    /// `state` must come from a previous call to `acquire` on the same execution context, and
    /// each state may be released only once.
    unsafe fn release(&self, state: Self::State);
}

/// [`IrqControl`] using the global `critical-section` implementation
///
/// On a single-core MCU this is normally provided by e.g. `cortex-m` with the
/// `critical-section-single-core` feature, which saves PRIMASK and disables interrupts. On hosts
/// `critical-section/std` provides a global reentrant lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalIrq;

unsafe impl IrqControl for GlobalIrq {
    type State = critical_section::RestoreState;

    fn acquire(&self) -> Self::State {
        // SAFETY: The state is stored by LockDomains and released exactly once by the guard
        unsafe { critical_section::acquire() }
    }

    unsafe fn release(&self, state: Self::State) {
        critical_section::release(state)
    }
}

struct Saved<S> {
    state: S,
    /// The domain which was innermost when this one was locked
    outer: Option<LockDomain>,
}

/// A set of per-domain saved interrupt states
#[allow(missing_debug_implementations)]
pub struct LockDomains<I: IrqControl = GlobalIrq> {
    irq: I,
    saved: [UnsafeCell<Option<Saved<I::State>>>; LockDomain::COUNT],
    /// The most recently locked domain still held
    innermost: UnsafeCell<Option<LockDomain>>,
}

// SAFETY: The saved slots are only accessed while interrupts are masked by `irq`
unsafe impl<I: IrqControl + Sync> Sync for LockDomains<I> where I::State: Send {}

impl<I: IrqControl> LockDomains<I> {
    /// Create a new set of domains, all released
    pub const fn new(irq: I) -> Self {
        Self {
            irq,
            saved: [
                UnsafeCell::new(None),
                UnsafeCell::new(None),
                UnsafeCell::new(None),
            ],
            innermost: UnsafeCell::new(None),
        }
    }

    /// Access the underlying interrupt control
    pub fn irq(&self) -> &I {
        &self.irq
    }

    /// Lock a domain
    ///
    /// The domain is released when the returned guard is dropped. Keep the guarded region as
    /// short as possible: all interrupts are blocked while it is held.
    ///
    /// # Panics
    ///
    /// If `domain` is already held. Overwriting its saved state would leave the outer lock
    /// unreleasable.
    pub fn lock(&self, domain: LockDomain) -> LockGuard<'_, I> {
        let state = self.irq.acquire();
        // SAFETY: Interrupts are masked, so this context is the only one touching the slots
        unsafe {
            let slot = &mut *self.saved[domain.slot()].get();
            assert!(slot.is_none(), "Nested lock of {:?}", domain);
            let innermost = &mut *self.innermost.get();
            *slot = Some(Saved {
                state,
                outer: *innermost,
            });
            *innermost = Some(domain);
        }
        LockGuard {
            domains: self,
            domain,
            _not_send: PhantomData,
        }
    }

    /// Run a closure with a domain locked
    pub fn with<R>(&self, domain: LockDomain, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock(domain);
        f()
    }

    /// Check whether a domain is currently locked
    pub fn is_held(&self, domain: LockDomain) -> bool {
        let state = self.irq.acquire();
        // SAFETY: Interrupts are masked while reading the slot
        let held = unsafe { (*self.saved[domain.slot()].get()).is_some() };
        // SAFETY: `state` was returned by the acquire above
        unsafe { self.irq.release(state) };
        held
    }

    fn unlock(&self, domain: LockDomain) {
        // SAFETY: Called from the guard's drop, while interrupts are still masked
        let saved = unsafe {
            let innermost = &mut *self.innermost.get();
            assert!(
                *innermost == Some(domain),
                "{:?} released out of order, {:?} is still held",
                domain,
                *innermost
            );
            let saved = (*self.saved[domain.slot()].get()).take();
            if let Some(saved) = &saved {
                *innermost = saved.outer;
            }
            saved
        };
        if let Some(saved) = saved {
            // SAFETY: The state was saved by the acquire in `lock`, and taken from the slot so it
            // cannot be released twice
            unsafe { self.irq.release(saved.state) };
        }
    }
}

/// A locked domain, released on drop
///
/// The guard must be dropped on the execution context which created it, after every guard taken
/// while it was held. Dropping it early panics.
#[allow(missing_debug_implementations)]
#[must_use = "the domain is released as soon as the guard is dropped"]
pub struct LockGuard<'a, I: IrqControl = GlobalIrq> {
    domains: &'a LockDomains<I>,
    domain: LockDomain,
    _not_send: PhantomData<*const ()>,
}

impl<I: IrqControl> LockGuard<'_, I> {
    /// The domain held by this guard
    pub fn domain(&self) -> LockDomain {
        self.domain
    }
}

impl LockGuard<'_, GlobalIrq> {
    /// Get a critical section token, valid while the guard is held
    pub fn critical_section(&self) -> critical_section::CriticalSection<'_> {
        // SAFETY: The guard holds the global critical section until it is dropped, and the token
        // cannot outlive the borrow of the guard
        unsafe { critical_section::CriticalSection::new() }
    }
}

impl<I: IrqControl> Drop for LockGuard<'_, I> {
    fn drop(&mut self) {
        self.domains.unlock(self.domain);
    }
}
