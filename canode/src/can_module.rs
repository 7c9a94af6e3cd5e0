//! The CAN peripheral module record
use core::sync::atomic::Ordering;

use portable_atomic::AtomicBool;

use crate::lock::{LockDomain, LockDomains, LockGuard};

/// Identifies a physical CAN interface
///
/// Any value which is unique per peripheral works, e.g. the peripheral index or the base address
/// of its register block. Hardware notifications carry this identity so they can be routed to the
/// node instance which owns the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceId(pub u32);

/// State of one CAN peripheral shared between the protocol engine, the interrupt handlers and the
/// lifecycle controller
///
/// It holds the saved interrupt state for each [`LockDomain`], and the "normal mode" flag. While
/// the flag is clear, the interrupt fast path does not touch the engine.
#[allow(missing_debug_implementations)]
pub struct CanModule {
    interface: InterfaceId,
    normal: AtomicBool,
    locks: LockDomains,
}

impl CanModule {
    /// Create a new module record, in configuration mode
    pub const fn new(interface: InterfaceId) -> Self {
        Self {
            interface,
            normal: AtomicBool::new(false),
            locks: LockDomains::new(crate::lock::GlobalIrq),
        }
    }

    /// The interface this module drives
    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    /// True when the module is in normal operating mode
    pub fn is_normal(&self) -> bool {
        self.normal.load(Ordering::Acquire)
    }

    pub(crate) fn set_normal(&self, normal: bool) {
        self.normal.store(normal, Ordering::Release);
    }

    /// Lock one of the module's critical section domains
    ///
    /// This is the lock used by the protocol engine for its send path, its emergency reporting and
    /// its object dictionary access.
    pub fn lock(&self, domain: LockDomain) -> LockGuard<'_> {
        self.locks.lock(domain)
    }

    /// Check whether a domain is currently locked
    pub fn is_held(&self, domain: LockDomain) -> bool {
        self.locks.is_held(domain)
    }
}
