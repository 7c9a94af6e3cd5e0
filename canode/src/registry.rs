//! Routing of hardware notifications to node instances
//!
//! CAN interrupt vectors are shared by every instance in the image. A notification only carries the
//! identity of the interface which raised it, and the [`Registry`] maps that identity back to the
//! [`NodeInstance`] which owns the interface.
//!
//! The capacity `N` is the number of CAN interfaces the image supports. Filling it is a build
//! configuration error, and registration past capacity is rejected.
//!
//! ```ignore
//! static REGISTRY: Registry<'static, MyEngine, 2> = Registry::new(hal::millis);
//!
//! #[interrupt]
//! fn CAN1_RX0() {
//!     REGISTRY.on_rx_pending(InterfaceId(1), 0);
//! }
//! ```
use core::cell::RefCell;

use critical_section::Mutex;
use defmt_or_log::error;

use crate::can_module::InterfaceId;
use crate::engine::CanopenEngine;
use crate::error::{FullSnafu, InterfaceInUseSnafu, RegistryError};
use crate::instance::NodeInstance;

/// A fixed capacity table of registered node instances
#[allow(missing_debug_implementations)]
pub struct Registry<'a, E, const N: usize = 1> {
    entries: Mutex<RefCell<heapless::Vec<&'a NodeInstance<E>, N>>>,
    clock: fn() -> u32,
}

impl<'a, E, const N: usize> Registry<'a, E, N> {
    /// Create an empty registry
    ///
    /// `clock` reads the monotonic millisecond tick, used to stamp RX notifications.
    pub const fn new(clock: fn() -> u32) -> Self {
        Self {
            entries: Mutex::new(RefCell::new(heapless::Vec::new())),
            clock,
        }
    }

    /// Add an instance to the table
    ///
    /// Entries are never removed.
    pub fn register(&self, instance: &'a NodeInstance<E>) -> Result<(), RegistryError> {
        let interface = instance.interface();
        let result = critical_section::with(|cs| {
            let mut entries = self.entries.borrow_ref_mut(cs);
            if entries.iter().any(|e| e.interface() == interface) {
                return InterfaceInUseSnafu { interface }.fail();
            }
            entries
                .push(instance)
                .map_err(|_| FullSnafu { capacity: N }.build())
        });
        if let Err(e) = &result {
            error!("Node registration failed: {}", e);
        }
        result
    }

    /// Find the instance owning an interface
    ///
    /// With a capacity of one, the sole entry is returned without comparing the identity.
    pub fn resolve(&self, interface: InterfaceId) -> Option<&'a NodeInstance<E>> {
        critical_section::with(|cs| {
            let entries = self.entries.borrow_ref(cs);
            if N == 1 {
                return entries.first().copied();
            }
            entries.iter().copied().find(|e| e.interface() == interface)
        })
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.entries.borrow_ref(cs).len())
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: CanopenEngine, const N: usize> Registry<'_, E, N> {
    /// Dispatch a TX complete notification
    ///
    /// Returns false if no instance with an engine owns the interface.
    pub fn on_tx_complete(&self, interface: InterfaceId, mailbox: u32) -> bool {
        match self.resolve(interface) {
            Some(instance) => instance.on_tx_complete(mailbox),
            None => false,
        }
    }

    /// Dispatch an RX pending notification
    ///
    /// The owning instance's RX watchdog is stamped with the current time.
    pub fn on_rx_pending(&self, interface: InterfaceId, fifo: u32) -> bool {
        match self.resolve(interface) {
            Some(instance) => instance.on_rx_pending(fifo, (self.clock)()),
            None => false,
        }
    }
}
