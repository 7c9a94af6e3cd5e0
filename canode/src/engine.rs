//! Contract with the CANopen protocol engine
//!
//! The engine (object dictionary, SDO, PDO, NMT, LSS and EMCY processing) is not part of this
//! crate. The lifecycle controller only reaches it through these traits: a [`CanopenStack`]
//! constructs and destroys engine instances, and a [`CanopenEngine`] is one constructed instance.
//!
//! Engine methods take `&self` because an instance is shared between the polling loop and the
//! interrupt handlers. An implementation protects its internal state with the
//! [`LockDomain`](crate::LockDomain)s of the [`CanModule`] passed to each call.

use canode_common::{CommParams, EngineError, EngineFault, LssIdentity, NodeId, ResetCommand};

use crate::can_module::CanModule;

/// A newly constructed engine
#[derive(Debug)]
pub struct Constructed<E> {
    /// The engine instance
    pub engine: E,
    /// Bytes of memory used for the engine's objects, for diagnostics
    pub heap_used: u32,
}

/// Factory for protocol engine instances
pub trait CanopenStack {
    /// Configuration describing the engine's object counts and object dictionary
    ///
    /// It is kept by the controller and reused every time the engine is rebuilt.
    type Config;
    /// The engine type
    type Engine: CanopenEngine;

    /// Construct a new engine
    ///
    /// Returns `None` if there is not enough memory for the engine's objects.
    fn construct(&mut self, config: &Self::Config) -> Option<Constructed<Self::Engine>>;

    /// Destroy an engine, releasing its memory
    fn destroy(&mut self, engine: Self::Engine) {
        drop(engine);
    }
}

/// A constructed protocol engine instance
pub trait CanopenEngine: Send + Sync {
    /// Put the CAN module into configuration mode
    fn set_configuration_mode(&self, can: &CanModule);

    /// Disable the CAN module
    fn disable_module(&self, can: &CanModule);

    /// Put the CAN module into normal operating mode
    fn set_normal_mode(&self, can: &CanModule);

    /// Initialize the CAN transport binding
    ///
    /// `bitrate_selector` of 0 means the bit timing was already set up by the platform.
    fn init_transport(&self, can: &CanModule, bitrate_selector: u16) -> Result<(), EngineError>;

    /// Read the device identity from the identity object (0x1018)
    fn identity(&self) -> LssIdentity;

    /// Initialize the LSS slave
    ///
    /// `node_id` and `bitrate_kbps` are the requested values. The engine may replace them, e.g.
    /// with values stored by a previous LSS configuration.
    fn init_lss(
        &self,
        can: &CanModule,
        identity: &LssIdentity,
        node_id: &mut NodeId,
        bitrate_kbps: &mut u16,
    ) -> Result<(), EngineError>;

    /// Initialize all communication objects against the object dictionary
    ///
    /// Returns a fault with [`EngineError::NodeIdUnconfiguredLss`] if `node_id` is unconfigured;
    /// the node then runs with only LSS active.
    fn init_communication(
        &self,
        can: &CanModule,
        params: &CommParams,
        node_id: NodeId,
    ) -> Result<(), EngineFault>;

    /// Initialize the PDOs against the object dictionary
    fn init_pdo(&self, can: &CanModule, node_id: NodeId) -> Result<(), EngineFault>;

    /// True if the engine is running without a node ID
    fn node_id_unconfigured(&self) -> bool;

    /// A node ID assigned over LSS since init, to be used when the engine is rebuilt
    fn lss_assignment(&self) -> Option<NodeId> {
        None
    }

    /// Run the main, non time-critical, process step
    ///
    /// - `reset_override`: request a communication reset regardless of NMT state
    /// - `elapsed_us`: time since the previous call
    /// - `timer_next_us`: if given, may be lowered to the time until processing is next needed
    fn process(
        &self,
        can: &CanModule,
        reset_override: bool,
        elapsed_us: u32,
        timer_next_us: Option<&mut u32>,
    ) -> ResetCommand;

    /// Process SYNC, returning true if a SYNC message was just received or transmitted
    ///
    /// Called from the timer interrupt with the object dictionary domain locked.
    fn process_sync(
        &self,
        can: &CanModule,
        elapsed_us: u32,
        timer_next_us: Option<&mut u32>,
    ) -> bool;

    /// Process receive PDOs
    ///
    /// Called from the timer interrupt with the object dictionary domain locked.
    fn process_rpdo(
        &self,
        can: &CanModule,
        sync_was: bool,
        elapsed_us: u32,
        timer_next_us: Option<&mut u32>,
    );

    /// Process transmit PDOs
    ///
    /// Called from the timer interrupt with the object dictionary domain locked.
    fn process_tpdo(
        &self,
        can: &CanModule,
        sync_was: bool,
        elapsed_us: u32,
        timer_next_us: Option<&mut u32>,
    );

    /// Report an error through the emergency producer
    fn report_error(&self, can: &CanModule, error_bit: u8, code: u16, info: u32);

    /// A transmit mailbox has completed
    fn on_tx_complete(&self, can: &CanModule, mailbox: u32);

    /// A receive FIFO has a pending message
    fn on_rx_pending(&self, can: &CanModule, fifo: u32);
}
