//! A scripted stand-in for the CANopen protocol engine
//!
//! Every call made by the controller is appended to a shared call log, so tests can assert on the
//! exact sequence. Failures are injected through [`Faults`], and the results of the engine's
//! process step are queued with [`MockStack::queue_command`].
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use canode::common::{CommParams, EngineError, EngineFault, LssIdentity, NodeId, ResetCommand};
use canode::{CanModule, CanopenEngine, CanopenStack, Constructed, LockDomain};

/// One recorded engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Construct { engine: u32 },
    Destroy { engine: u32 },
    SetConfigurationMode { engine: u32 },
    DisableModule,
    SetNormalMode,
    InitTransport { bitrate_selector: u16 },
    InitLss { node_id: NodeId, bitrate_kbps: u16 },
    InitCommunication { node_id: NodeId, params: CommParams },
    InitPdo { node_id: NodeId },
    Process { elapsed_us: u32 },
    Sync { od_locked: bool },
    Rpdo { od_locked: bool, sync_was: bool },
    Tpdo { od_locked: bool, sync_was: bool },
    ReportError { error_bit: u8, code: u16, info: u32 },
    TxComplete { mailbox: u32 },
    RxPending { fifo: u32 },
}

impl Call {
    /// True for the calls which make up the init sequence of a communication reset
    pub fn is_init_step(&self) -> bool {
        matches!(
            self,
            Call::InitTransport { .. }
                | Call::InitLss { .. }
                | Call::InitCommunication { .. }
                | Call::InitPdo { .. }
        )
    }
}

/// Injected failures and scripted results
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Construction reports out of memory
    pub allocation: bool,
    pub transport: Option<EngineError>,
    pub lss: Option<EngineError>,
    pub communication: Option<EngineFault>,
    pub pdo: Option<EngineFault>,
    /// LSS init replaces the requested node ID with this one
    pub lss_node_id: Option<NodeId>,
    /// SYNC processing reports a SYNC event
    pub sync_occurs: bool,
}

#[derive(Debug, Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    faults: Mutex<Faults>,
    commands: Mutex<VecDeque<ResetCommand>>,
    lss_assignment: Mutex<Option<NodeId>>,
    identity: LssIdentity,
    next_engine: AtomicU32,
    live: AtomicUsize,
    violations: AtomicUsize,
}

impl Shared {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn faults(&self) -> Faults {
        self.faults.lock().unwrap().clone()
    }
}

/// Engine factory which shares its call log with every engine it creates
#[derive(Debug, Clone, Default)]
pub struct MockStack {
    shared: Arc<Shared>,
}

impl MockStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: LssIdentity) -> Self {
        Self {
            shared: Arc::new(Shared {
                identity,
                ..Default::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.shared.calls.lock().unwrap().clear();
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.shared.calls.lock().unwrap().iter().filter(|c| f(c)).count()
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.shared.faults.lock().unwrap() = faults;
    }

    pub fn update_faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.shared.faults.lock().unwrap());
    }

    /// Queue the result of a future process step
    pub fn queue_command(&self, command: ResetCommand) {
        self.shared.commands.lock().unwrap().push_back(command);
    }

    /// Simulate a node ID being granted over LSS by a master
    pub fn assign_node_id(&self, node_id: NodeId) {
        *self.shared.lss_assignment.lock().unwrap() = Some(node_id);
    }

    /// Number of engines constructed
    pub fn constructed(&self) -> u32 {
        self.shared.next_engine.load(Ordering::Relaxed)
    }

    /// Number of engines constructed and not yet destroyed
    pub fn live(&self) -> usize {
        self.shared.live.load(Ordering::Relaxed)
    }

    /// Number of fast path calls made on an engine which was not in normal mode
    pub fn violations(&self) -> usize {
        self.shared.violations.load(Ordering::Relaxed)
    }
}

impl CanopenStack for MockStack {
    /// Bytes reported as used by each engine
    type Config = u32;
    type Engine = MockEngine;

    fn construct(&mut self, config: &u32) -> Option<Constructed<MockEngine>> {
        if self.shared.faults().allocation {
            return None;
        }
        let id = self.shared.next_engine.fetch_add(1, Ordering::Relaxed);
        self.shared.live.fetch_add(1, Ordering::Relaxed);
        self.shared.record(Call::Construct { engine: id });
        Some(Constructed {
            engine: MockEngine {
                id,
                shared: self.shared.clone(),
                unconfigured: AtomicBool::new(true),
                normal: AtomicBool::new(false),
            },
            heap_used: *config,
        })
    }

    fn destroy(&mut self, engine: MockEngine) {
        self.shared.live.fetch_sub(1, Ordering::Relaxed);
        self.shared.record(Call::Destroy { engine: engine.id });
    }
}

/// One engine instance created by [`MockStack`]
#[derive(Debug)]
pub struct MockEngine {
    id: u32,
    shared: Arc<Shared>,
    unconfigured: AtomicBool,
    normal: AtomicBool,
}

impl MockEngine {
    pub fn id(&self) -> u32 {
        self.id
    }

    fn check_normal(&self) {
        if !self.normal.load(Ordering::Acquire) {
            self.shared.violations.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl CanopenEngine for MockEngine {
    fn set_configuration_mode(&self, _can: &CanModule) {
        self.normal.store(false, Ordering::Release);
        self.shared.record(Call::SetConfigurationMode { engine: self.id });
    }

    fn disable_module(&self, _can: &CanModule) {
        self.shared.record(Call::DisableModule);
    }

    fn set_normal_mode(&self, _can: &CanModule) {
        self.normal.store(true, Ordering::Release);
        self.shared.record(Call::SetNormalMode);
    }

    fn init_transport(&self, _can: &CanModule, bitrate_selector: u16) -> Result<(), EngineError> {
        self.shared.record(Call::InitTransport { bitrate_selector });
        match self.shared.faults().transport {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn identity(&self) -> LssIdentity {
        self.shared.identity
    }

    fn init_lss(
        &self,
        _can: &CanModule,
        _identity: &LssIdentity,
        node_id: &mut NodeId,
        bitrate_kbps: &mut u16,
    ) -> Result<(), EngineError> {
        self.shared.record(Call::InitLss {
            node_id: *node_id,
            bitrate_kbps: *bitrate_kbps,
        });
        let faults = self.shared.faults();
        if let Some(e) = faults.lss {
            return Err(e);
        }
        if let Some(id) = faults.lss_node_id {
            *node_id = id;
        }
        Ok(())
    }

    fn init_communication(
        &self,
        _can: &CanModule,
        params: &CommParams,
        node_id: NodeId,
    ) -> Result<(), EngineFault> {
        self.shared.record(Call::InitCommunication {
            node_id,
            params: *params,
        });
        if let Some(fault) = self.shared.faults().communication {
            return Err(fault);
        }
        self.unconfigured
            .store(node_id.is_unconfigured(), Ordering::Release);
        if node_id.is_unconfigured() {
            return Err(EngineError::NodeIdUnconfiguredLss.into());
        }
        Ok(())
    }

    fn init_pdo(&self, _can: &CanModule, node_id: NodeId) -> Result<(), EngineFault> {
        self.shared.record(Call::InitPdo { node_id });
        if let Some(fault) = self.shared.faults().pdo {
            return Err(fault);
        }
        if node_id.is_unconfigured() {
            return Err(EngineError::NodeIdUnconfiguredLss.into());
        }
        Ok(())
    }

    fn node_id_unconfigured(&self) -> bool {
        self.unconfigured.load(Ordering::Acquire)
    }

    fn lss_assignment(&self) -> Option<NodeId> {
        *self.shared.lss_assignment.lock().unwrap()
    }

    fn process(
        &self,
        can: &CanModule,
        _reset_override: bool,
        elapsed_us: u32,
        _timer_next_us: Option<&mut u32>,
    ) -> ResetCommand {
        {
            let _od = can.lock(LockDomain::ObjectDictionary);
            self.shared.record(Call::Process { elapsed_us });
        }
        self.shared
            .commands
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
    }

    fn process_sync(
        &self,
        can: &CanModule,
        _elapsed_us: u32,
        _timer_next_us: Option<&mut u32>,
    ) -> bool {
        self.check_normal();
        self.shared.record(Call::Sync {
            od_locked: can.is_held(LockDomain::ObjectDictionary),
        });
        self.shared.faults().sync_occurs
    }

    fn process_rpdo(
        &self,
        can: &CanModule,
        sync_was: bool,
        _elapsed_us: u32,
        _timer_next_us: Option<&mut u32>,
    ) {
        self.check_normal();
        self.shared.record(Call::Rpdo {
            od_locked: can.is_held(LockDomain::ObjectDictionary),
            sync_was,
        });
    }

    fn process_tpdo(
        &self,
        can: &CanModule,
        sync_was: bool,
        _elapsed_us: u32,
        _timer_next_us: Option<&mut u32>,
    ) {
        self.check_normal();
        let od_locked = can.is_held(LockDomain::ObjectDictionary);
        // Queue outgoing PDOs
        let _send = can.lock(LockDomain::Send);
        self.shared.record(Call::Tpdo {
            od_locked,
            sync_was,
        });
    }

    fn report_error(&self, can: &CanModule, error_bit: u8, code: u16, info: u32) {
        let _emcy = can.lock(LockDomain::Emergency);
        self.shared.record(Call::ReportError {
            error_bit,
            code,
            info,
        });
    }

    fn on_tx_complete(&self, can: &CanModule, mailbox: u32) {
        let _send = can.lock(LockDomain::Send);
        self.shared.record(Call::TxComplete { mailbox });
    }

    fn on_rx_pending(&self, _can: &CanModule, fifo: u32) {
        self.shared.record(Call::RxPending { fifo });
    }
}
