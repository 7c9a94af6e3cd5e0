//! Lifecycle controller for a CANopen node on a microcontroller
//!
//! Canode binds a CAN peripheral and a periodic timer interrupt to a CANopen protocol engine. The
//! engine itself (object dictionary, SDO, PDO, NMT, LSS and EMCY processing) is provided by the
//! application through the [`CanopenStack`] and [`CanopenEngine`] traits. Canode owns the part
//! around it:
//!
//! * One-shot *init*: registration, parameter storage, engine construction.
//! * *Communication reset*: tear down the engine and CAN module, rebuild and re-initialize them, and
//!   return to normal mode. It runs at startup and whenever the engine requests it.
//! * The *process* loop: steps the engine with the elapsed time from a polling context.
//! * The *fast path*: SYNC and PDO processing from the timer interrupt, with the object dictionary
//!   locked.
//! * *Dispatch* of TX and RX notifications from shared interrupt vectors to the right node, when
//!   several CAN interfaces run independent nodes in one image.
//!
//! It is `no_std`, and does no allocation of its own.
//!
//! # Getting Started
//!
//! ## Static objects
//!
//! Each CAN interface gets a [`NodeInstance`], and the image gets one [`Registry`] sized for the
//! number of interfaces. Both are normally statics, since the interrupt handlers need them.
//!
//! ```ignore
//! use canode::{InterfaceId, NodeInstance, Registry};
//!
//! static CAN1_NODE: NodeInstance<MyEngine> = NodeInstance::new(InterfaceId(1));
//! static REGISTRY: Registry<'static, MyEngine> = Registry::new(hal::millis);
//! ```
//!
//! ## Creating the node
//!
//! The [`Node`] is the polling-context owner of the instance. It takes the engine factory, the
//! platform services and a [`NodeConfig`](common::NodeConfig). On hosts, the config can be loaded
//! from a TOML file; see [`common::node_config`].
//!
//! ```ignore
//! let config = NodeConfig::new(NodeId::new(10).unwrap(), 500);
//! let mut node = Node::new(&CAN1_NODE, MyStack::new(), MyPlatform::new(), config, OD_CONFIG);
//! node.init(&REGISTRY)?;
//! ```
//!
//! Persistent parameters can be attached with [`Node::with_storage`]. A storage failure is not
//! fatal; it is reported as an emergency once the node has a node ID.
//!
//! ## Interrupts
//!
//! ```ignore
//! #[interrupt]
//! fn TIM17() {
//!     CAN1_NODE.periodic_tick();
//! }
//!
//! #[interrupt]
//! fn CAN1_TX() {
//!     REGISTRY.on_tx_complete(InterfaceId(1), mailbox);
//! }
//!
//! #[interrupt]
//! fn CAN1_RX0() {
//!     REGISTRY.on_rx_pending(InterfaceId(1), 0);
//! }
//! ```
//!
//! ## Main loop
//!
//! ```ignore
//! loop {
//!     if let Err(e) = node.process() {
//!         log::error!("Communication reset failed: {e}");
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - `sync`, `rpdo`, `tpdo` (default on): run the corresponding processing on the periodic tick
//! - `log` (default) or `defmt`: logging backend
//! - `std` (default): std support, and TOML config loading in `canode-common`
//!
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod can_module;
pub mod engine;
mod error;
mod instance;
pub mod lock;
mod node;
pub mod platform;
mod registry;
pub mod storage;

pub use canode_common as common;
pub use critical_section;

pub use can_module::{CanModule, InterfaceId};
pub use engine::{CanopenEngine, CanopenStack, Constructed};
pub use error::{InitError, RegistryError, ResetError};
pub use instance::NodeInstance;
pub use lock::{LockDomain, LockGuard};
pub use node::{LifecycleState, Node, ProcessOutcome};
pub use platform::Platform;
pub use registry::Registry;
pub use storage::{ParameterStorage, StorageAttr, StorageEntry};
