//! The node lifecycle controller
//!
use canode_common::{constants::emergency, EngineFault, NodeConfig, NodeId, ResetCommand};
use defmt_or_log::{debug, error, info, warn};
use snafu::{OptionExt, ResultExt};

use crate::engine::{CanopenEngine, CanopenStack};
use crate::error::{
    AddressNegotiationSnafu, AllocationSnafu, AlreadyInitializedSnafu, CanInitSnafu,
    CommunicationInitSnafu, InitError, NotInitializedSnafu, PdoInitSnafu, RegistrySnafu,
    ResetError, ResetSnafu,
};
use crate::instance::NodeInstance;
use crate::platform::Platform;
use crate::registry::Registry;
use crate::storage::{ParameterStorage, StorageEntry};

/// Lifecycle state of a [`Node`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleState {
    /// `init` has not completed engine construction
    Uninitialized,
    /// Communication is being reset, or the last reset failed
    Configuring,
    /// The engine is running
    Normal,
    /// An application reset was requested; nothing runs any more
    Halted,
}

/// What a call to [`Node::process`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProcessOutcome {
    /// The node is not in normal operation
    Inactive,
    /// No time has elapsed since the last process step
    Idle,
    /// The engine process step ran
    Ticked,
    /// The engine requested a communication reset, which completed successfully
    CommunicationReset,
    /// The engine requested an application reset and the platform reset was triggered
    ApplicationReset,
}

type StorageBinding<'a> = (&'a mut dyn ParameterStorage, &'a [StorageEntry]);

/// The polling-context owner of a [`NodeInstance`]
///
/// A `Node` drives one instance through init, communication resets and the main process loop. The
/// time critical work is done separately, by calling
/// [`NodeInstance::periodic_tick`] from the timer interrupt.
#[allow(missing_debug_implementations)]
pub struct Node<'a, S: CanopenStack, P: Platform> {
    instance: &'a NodeInstance<S::Engine>,
    stack: S,
    platform: P,
    config: NodeConfig,
    engine_config: S::Config,
    storage: Option<StorageBinding<'a>>,
    state: LifecycleState,
    /// An engine constructed by init, used by the first communication reset
    fresh_engine: Option<S::Engine>,
    desired_node_id: NodeId,
    active_node_id: NodeId,
    bitrate_kbps: u16,
    storage_error: u32,
}

impl<'a, S: CanopenStack, P: Platform> Node<'a, S, P> {
    /// Create a new node controller
    ///
    /// # Arguments
    ///
    /// - `instance`: The record for the CAN interface this node runs on
    /// - `stack`: Factory for protocol engine instances
    /// - `platform`: Timer, clock and reset services
    /// - `config`: Node ID, bit rate and communication parameters
    /// - `engine_config`: Passed to the stack each time an engine is constructed
    pub fn new(
        instance: &'a NodeInstance<S::Engine>,
        stack: S,
        platform: P,
        config: NodeConfig,
        engine_config: S::Config,
    ) -> Self {
        Self {
            instance,
            stack,
            platform,
            desired_node_id: config.node_id,
            active_node_id: NodeId::Unconfigured,
            bitrate_kbps: config.bitrate_kbps,
            config,
            engine_config,
            storage: None,
            state: LifecycleState::Uninitialized,
            fresh_engine: None,
            storage_error: 0,
        }
    }

    /// Attach non-volatile parameter storage, initialized during [`init`](Self::init)
    pub fn with_storage(
        mut self,
        storage: &'a mut dyn ParameterStorage,
        entries: &'a [StorageEntry],
    ) -> Self {
        self.storage = Some((storage, entries));
        self
    }

    /// Initialize the node
    ///
    /// This claims and registers the instance, initializes storage, constructs the protocol engine
    /// and runs the first communication reset. It may only be called once per instance; a failed
    /// init is not retried.
    pub fn init<const N: usize>(
        &mut self,
        registry: &Registry<'a, S::Engine, N>,
    ) -> Result<(), InitError> {
        if self.state != LifecycleState::Uninitialized || !self.instance.claim() {
            return AlreadyInitializedSnafu.fail();
        }
        registry.register(self.instance).context(RegistrySnafu)?;

        self.instance.set_normal(false);
        self.instance.reset_timing();
        self.instance.set_tick_period_us(self.config.tick_period_us);
        self.desired_node_id = self.config.node_id;
        self.active_node_id = NodeId::Unconfigured;
        self.bitrate_kbps = self.config.bitrate_kbps;

        self.storage_error = 0;
        if let Some((storage, entries)) = self.storage.as_mut() {
            if let Err(fault) = storage.init(self.instance.can_module(), *entries) {
                warn!("Storage init failed: {} (0x{:X})", fault.error, fault.info);
                self.storage_error = fault.info;
            }
        }

        let Some(constructed) = self.stack.construct(&self.engine_config) else {
            error!("Can't allocate memory for CANopen objects");
            return Err(InitError::Allocation);
        };
        info!("Allocated {} bytes for CANopen objects", constructed.heap_used);
        self.instance.set_heap_used(constructed.heap_used);
        self.fresh_engine = Some(constructed.engine);
        self.state = LifecycleState::Configuring;

        self.reset_communication().context(ResetSnafu)
    }

    /// Tear down and rebuild the protocol engine, then return to normal operation
    ///
    /// The fast path is disabled for the whole reset. On error, the node is left in
    /// [`LifecycleState::Configuring`] with no engine installed; the reset may be retried.
    pub fn reset_communication(&mut self) -> Result<(), ResetError> {
        if matches!(
            self.state,
            LifecycleState::Uninitialized | LifecycleState::Halted
        ) {
            return NotInitializedSnafu.fail();
        }
        info!("Reset communication...");
        self.state = LifecycleState::Configuring;
        self.instance.set_normal(false);
        self.teardown();

        let engine = match self.fresh_engine.take() {
            Some(engine) => engine,
            None => {
                let constructed = self
                    .stack
                    .construct(&self.engine_config)
                    .context(AllocationSnafu)?;
                self.instance.set_heap_used(constructed.heap_used);
                constructed.engine
            }
        };

        if let Err(e) = self.bring_up(&engine) {
            self.stack.destroy(engine);
            return Err(e);
        }

        let instance = self.instance;
        engine.set_normal_mode(instance.can_module());
        instance.install_engine(engine);
        instance.set_normal(true);
        instance.set_last_process_ms(self.platform.now_ms());
        self.state = LifecycleState::Normal;
        info!("Running");
        Ok(())
    }

    /// Run the non time critical part of the protocol
    ///
    /// Call this from the main loop, at any rate. The engine is stepped with the number of
    /// milliseconds elapsed since the previous step; calls within the same millisecond do nothing.
    ///
    /// A communication reset requested by the engine is carried out before this returns, and an
    /// error is only returned if that reset fails. An application reset stops the fast path, calls
    /// [`Platform::system_reset`] and halts the node.
    pub fn process(&mut self) -> Result<ProcessOutcome, ResetError> {
        if self.state != LifecycleState::Normal {
            return Ok(ProcessOutcome::Inactive);
        }
        let now = self.platform.now_ms();
        let elapsed_ms = now.wrapping_sub(self.instance.last_process_ms());
        if elapsed_ms == 0 {
            return Ok(ProcessOutcome::Idle);
        }
        self.instance.set_last_process_ms(now);

        let command = {
            // SAFETY: This node claimed the instance, so no one else writes the engine slot. The
            // reference is dropped at the end of this block.
            let Some(engine) = (unsafe { self.instance.engine_unguarded() }) else {
                return Ok(ProcessOutcome::Inactive);
            };
            engine.process(
                self.instance.can_module(),
                false,
                elapsed_ms.saturating_mul(1000),
                None,
            )
        };

        match command {
            ResetCommand::NoAction => Ok(ProcessOutcome::Ticked),
            ResetCommand::CommunicationReset => {
                info!("Communication reset requested");
                self.instance.set_normal(false);
                self.state = LifecycleState::Configuring;
                self.teardown();
                self.reset_communication()?;
                Ok(ProcessOutcome::CommunicationReset)
            }
            ResetCommand::ApplicationReset => {
                info!("Device reset");
                self.state = LifecycleState::Halted;
                self.instance.set_normal(false);
                self.platform.system_reset();
                Ok(ProcessOutcome::ApplicationReset)
            }
        }
    }

    /// Remove the installed engine, if any, and destroy it
    fn teardown(&mut self) {
        let Some(engine) = self.instance.take_engine() else {
            return;
        };
        engine.set_configuration_mode(self.instance.can_module());
        if let Some(node_id) = engine.lss_assignment() {
            debug!("Adopting node ID {} assigned over LSS", node_id);
            self.desired_node_id = node_id;
        }
        self.stack.destroy(engine);
    }

    /// Run the initialization sequence on a freshly constructed engine
    fn bring_up(&mut self, engine: &S::Engine) -> Result<(), ResetError> {
        let instance = self.instance;
        let can = instance.can_module();

        engine.set_configuration_mode(can);
        engine.disable_module(can);

        // Bit timing is set up by the platform before the node starts
        engine.init_transport(can, 0).map_err(|error| {
            error!("CAN initialization failed: {}", error);
            CanInitSnafu { error }.build()
        })?;

        let identity = engine.identity();
        let mut node_id = self.desired_node_id;
        let mut bitrate_kbps = self.bitrate_kbps;
        engine
            .init_lss(can, &identity, &mut node_id, &mut bitrate_kbps)
            .map_err(|error| {
                error!("LSS slave initialization failed: {}", error);
                AddressNegotiationSnafu { error }.build()
            })?;
        self.desired_node_id = node_id;
        self.bitrate_kbps = bitrate_kbps;
        self.active_node_id = node_id;

        engine
            .init_communication(can, &self.config.communication, node_id)
            .or_else(tolerate_unconfigured)
            .map_err(|fault| {
                log_init_fault("CANopen", &fault);
                CommunicationInitSnafu {
                    error: fault.error,
                    entry: fault.entry(),
                }
                .build()
            })?;

        engine
            .init_pdo(can, node_id)
            .or_else(tolerate_unconfigured)
            .map_err(|fault| {
                log_init_fault("PDO", &fault);
                PdoInitSnafu {
                    error: fault.error,
                    entry: fault.entry(),
                }
                .build()
            })?;

        self.platform.start_tick_timer();

        if node_id.is_configured() {
            if self.storage_error != 0 {
                engine.report_error(
                    can,
                    emergency::NON_VOLATILE_MEMORY,
                    emergency::HARDWARE,
                    self.storage_error,
                );
            }
        } else {
            info!("Node-id not initialized");
        }
        Ok(())
    }

    /// The current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The node ID requested for the next communication reset
    pub fn desired_node_id(&self) -> NodeId {
        self.desired_node_id
    }

    /// The node ID the running engine was initialized with
    pub fn active_node_id(&self) -> NodeId {
        self.active_node_id
    }

    /// The bit rate in kbit/s, as returned by LSS init
    pub fn bitrate_kbps(&self) -> u16 {
        self.bitrate_kbps
    }

    /// The storage error word recorded during init, 0 if none
    pub fn storage_error(&self) -> u32 {
        self.storage_error
    }

    /// The node instance record
    pub fn instance(&self) -> &'a NodeInstance<S::Engine> {
        self.instance
    }

    /// The platform
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutable access to the platform
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

fn tolerate_unconfigured(fault: EngineFault) -> Result<(), EngineFault> {
    if fault.is_unconfigured_node_id() {
        Ok(())
    } else {
        Err(fault)
    }
}

fn log_init_fault(stage: &str, fault: &EngineFault) {
    match fault.entry() {
        Some(entry) => error!("Object Dictionary entry 0x{:X}", entry),
        None => error!("{} initialization failed: {}", stage, fault.error),
    }
}
