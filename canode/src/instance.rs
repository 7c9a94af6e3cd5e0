//! The node instance record and the interrupt fast path
//!
//! A [`NodeInstance`] is the long-lived record for one CAN interface. It is created by the
//! application, normally as a `static`, before anything else happens, and it is never freed. The
//! [`Node`](crate::Node) controller which claims it during init is the only code which installs or
//! removes the protocol engine; interrupt handlers only read it.
//!
//! ```ignore
//! static CAN1_NODE: NodeInstance<MyEngine> = NodeInstance::new(InterfaceId(1));
//!
//! #[interrupt]
//! fn TIM2() {
//!     CAN1_NODE.periodic_tick();
//! }
//! ```
use core::cell::UnsafeCell;
use core::sync::atomic::Ordering;

use canode_common::constants::defaults;
use critical_section::CriticalSection;
use portable_atomic::{AtomicBool, AtomicU32};

use crate::can_module::{CanModule, InterfaceId};
use crate::engine::CanopenEngine;
use crate::lock::LockDomain;

/// Storage for the engine handle
///
/// The slot is written only by the owning controller inside a critical section. Other contexts
/// must hold a critical section to read it.
struct EngineSlot<E>(UnsafeCell<Option<E>>);

// SAFETY: All cross-context access is serialized by critical sections; the engine itself is Sync
unsafe impl<E: Send + Sync> Sync for EngineSlot<E> {}

impl<E> EngineSlot<E> {
    const fn new() -> Self {
        Self(UnsafeCell::new(None))
    }

    fn get<'cs>(&'cs self, _cs: CriticalSection<'cs>) -> Option<&'cs E> {
        // SAFETY: Writers hold a critical section too, so the slot cannot change while `cs` lives
        unsafe { (*self.0.get()).as_ref() }
    }

    fn replace(&self, value: Option<E>) -> Option<E> {
        critical_section::with(|_cs| {
            // SAFETY: Exclusive access inside the critical section
            unsafe { core::mem::replace(&mut *self.0.get(), value) }
        })
    }
}

/// The record for one node, bound to one CAN interface
#[allow(missing_debug_implementations)]
pub struct NodeInstance<E> {
    can: CanModule,
    engine: EngineSlot<E>,
    claimed: AtomicBool,
    tick_period_us: AtomicU32,
    last_process_ms: AtomicU32,
    last_rx_ms: AtomicU32,
    heap_used: AtomicU32,
}

impl<E> NodeInstance<E> {
    /// Create a new, unclaimed instance for an interface
    pub const fn new(interface: InterfaceId) -> Self {
        Self {
            can: CanModule::new(interface),
            engine: EngineSlot::new(),
            claimed: AtomicBool::new(false),
            tick_period_us: AtomicU32::new(defaults::TICK_PERIOD_US),
            last_process_ms: AtomicU32::new(0),
            last_rx_ms: AtomicU32::new(0),
            heap_used: AtomicU32::new(0),
        }
    }

    /// The interface this instance is bound to
    pub fn interface(&self) -> InterfaceId {
        self.can.interface()
    }

    /// The CAN module record
    pub fn can_module(&self) -> &CanModule {
        &self.can
    }

    /// True while the CAN module is in normal mode
    pub fn is_normal(&self) -> bool {
        self.can.is_normal()
    }

    /// True if a protocol engine is currently installed
    pub fn has_engine(&self) -> bool {
        critical_section::with(|cs| self.engine.get(cs).is_some())
    }

    /// Timestamp (ms) of the most recent RX notification
    ///
    /// External supervision can use this to check the bus is alive.
    pub fn last_rx_ms(&self) -> u32 {
        self.last_rx_ms.load(Ordering::Relaxed)
    }

    /// Timestamp (ms) of the last engine process step
    pub fn last_process_ms(&self) -> u32 {
        self.last_process_ms.load(Ordering::Relaxed)
    }

    /// Bytes used by the engine, as reported when it was constructed
    pub fn heap_used(&self) -> u32 {
        self.heap_used.load(Ordering::Relaxed)
    }

    /// The time quantum passed to the engine on each periodic tick
    pub fn tick_period_us(&self) -> u32 {
        self.tick_period_us.load(Ordering::Relaxed)
    }

    /// Claim the instance for a controller
    ///
    /// Returns false if it was already claimed.
    pub(crate) fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn install_engine(&self, engine: E) {
        self.engine.replace(Some(engine));
    }

    pub(crate) fn take_engine(&self) -> Option<E> {
        self.engine.replace(None)
    }

    /// Access the engine from the owning controller without a critical section
    ///
    /// # Safety
    ///
    /// Must only be called by the controller which claimed the instance, since it is the only
    /// writer of the slot. The reference must be dropped before the slot is written again.
    pub(crate) unsafe fn engine_unguarded(&self) -> Option<&E> {
        (*self.engine.0.get()).as_ref()
    }

    pub(crate) fn set_normal(&self, normal: bool) {
        self.can.set_normal(normal);
    }

    pub(crate) fn set_tick_period_us(&self, period: u32) {
        self.tick_period_us.store(period, Ordering::Relaxed);
    }

    pub(crate) fn set_last_process_ms(&self, now: u32) {
        self.last_process_ms.store(now, Ordering::Relaxed);
    }

    pub(crate) fn set_heap_used(&self, bytes: u32) {
        self.heap_used.store(bytes, Ordering::Relaxed);
    }

    pub(crate) fn reset_timing(&self) {
        self.last_process_ms.store(0, Ordering::Relaxed);
        self.last_rx_ms.store(0, Ordering::Relaxed);
        self.heap_used.store(0, Ordering::Relaxed);
    }
}

impl<E: CanopenEngine> NodeInstance<E> {
    /// Run the time critical part of the protocol
    ///
    /// Call this from the periodic timer interrupt. It runs SYNC, RPDO and TPDO processing with
    /// the object dictionary locked, passing the configured tick period as the elapsed time. When
    /// the module is not in normal mode or the node has no node ID, nothing is done.
    ///
    /// Returns true if the engine was ticked.
    pub fn periodic_tick(&self) -> bool {
        let guard = self.can.lock(LockDomain::ObjectDictionary);
        if !self.can.is_normal() {
            return false;
        }
        let Some(engine) = self.engine.get(guard.critical_section()) else {
            return false;
        };
        if engine.node_id_unconfigured() {
            return false;
        }

        let dt = self.tick_period_us.load(Ordering::Relaxed);

        #[cfg(feature = "sync")]
        let sync_was = engine.process_sync(&self.can, dt, None);
        #[cfg(not(feature = "sync"))]
        let sync_was = false;

        #[cfg(feature = "rpdo")]
        engine.process_rpdo(&self.can, sync_was, dt, None);
        #[cfg(feature = "tpdo")]
        engine.process_tpdo(&self.can, sync_was, dt, None);
        #[cfg(not(any(feature = "rpdo", feature = "tpdo")))]
        let _ = (sync_was, dt);

        true
    }

    /// Handle a TX complete notification for this instance's interface
    ///
    /// Returns false if there is no engine to forward it to.
    pub fn on_tx_complete(&self, mailbox: u32) -> bool {
        critical_section::with(|cs| match self.engine.get(cs) {
            Some(engine) => {
                engine.on_tx_complete(&self.can, mailbox);
                true
            }
            None => false,
        })
    }

    /// Handle an RX pending notification for this instance's interface
    ///
    /// The RX watchdog timestamp is updated to `now_ms` even if there is no engine to forward it
    /// to.
    pub fn on_rx_pending(&self, fifo: u32, now_ms: u32) -> bool {
        self.last_rx_ms.store(now_ms, Ordering::Relaxed);
        critical_section::with(|cs| match self.engine.get(cs) {
            Some(engine) => {
                engine.on_rx_pending(&self.can, fifo);
                true
            }
            None => false,
        })
    }
}
