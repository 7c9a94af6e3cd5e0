use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assertables::assert_contains;
use canode::common::constants::emergency;
use canode::{ParameterStorage, StorageEntry};
use integration_tests::prelude::*;
use serial_test::serial;

fn init_sequence(node_id: NodeId, engine: u32) -> Vec<Call> {
    vec![
        Call::SetConfigurationMode { engine },
        Call::DisableModule,
        Call::InitTransport {
            bitrate_selector: 0,
        },
        Call::InitLss {
            node_id,
            bitrate_kbps: 500,
        },
        Call::InitCommunication {
            node_id,
            params: CommParams::default(),
        },
        Call::InitPdo { node_id },
    ]
}

#[serial]
#[test]
fn test_init_sequence() {
    set_ms(1000);
    let mut h = Harness::configured(1, 10);
    let registry = new_registry::<1>();
    h.node.init(registry).unwrap();

    let node_id = NodeId::new(10).unwrap();
    let mut expected = vec![Call::Construct { engine: 0 }];
    expected.extend(init_sequence(node_id, 0));
    expected.push(Call::SetNormalMode);
    assert_eq!(expected, h.stack.calls());

    assert_eq!(LifecycleState::Normal, h.node.state());
    assert!(h.instance.is_normal());
    assert!(h.instance.has_engine());
    assert_eq!(node_id, h.node.active_node_id());
    assert_eq!(HEAP_USED, h.instance.heap_used());
    assert_eq!(1000, h.instance.last_process_ms());
    assert_eq!(1, h.platform.timer_starts());
    assert_eq!(1, registry.len());
}

#[serial]
#[test]
fn test_init_allocation_failure() {
    let mut h = Harness::configured(1, 10);
    h.stack.set_faults(Faults {
        allocation: true,
        ..Default::default()
    });

    assert_eq!(Err(InitError::Allocation), h.node.init(new_registry::<1>()));
    assert_eq!(LifecycleState::Uninitialized, h.node.state());
    // No peripheral mode change, and nothing runs afterwards
    assert!(h.stack.calls().is_empty());
    assert!(!h.instance.is_normal());
    assert!(!h.instance.has_engine());
    assert_eq!(0, h.platform.timer_starts());
    assert_eq!(Ok(ProcessOutcome::Inactive), h.node.process());
    assert_eq!(Err(ResetError::NotInitialized), h.node.reset_communication());
    assert!(!h.instance.periodic_tick());
}

#[serial]
#[test]
fn test_double_init() {
    let mut h = Harness::configured(1, 10);
    let registry = new_registry::<2>();
    h.node.init(registry).unwrap();
    assert_eq!(Err(InitError::AlreadyInitialized), h.node.init(registry));

    // A second controller cannot take over the instance either
    let mut other = Node::new(
        h.instance,
        MockStack::new(),
        SimPlatform::new(),
        NodeConfig::default(),
        HEAP_USED,
    );
    assert_eq!(Err(InitError::AlreadyInitialized), other.init(registry));
    assert_eq!(1, registry.len());
    assert_eq!(1, h.stack.constructed());
}

#[serial]
#[test]
fn test_repeated_resets_do_not_leak() {
    const RESETS: u32 = 5;
    let mut h = Harness::configured(1, 4);
    h.node.init(new_registry::<1>()).unwrap();

    for i in 0..RESETS {
        h.node.reset_communication().unwrap();
        assert_eq!(LifecycleState::Normal, h.node.state());
        assert!(h.instance.is_normal());
        assert_eq!(1, h.stack.live());
        assert_eq!(i + 2, h.stack.constructed());
    }

    let destroyed: Vec<Call> = h
        .stack
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Destroy { .. }))
        .collect();
    let expected: Vec<Call> = (0..RESETS).map(|engine| Call::Destroy { engine }).collect();
    assert_eq!(expected, destroyed);
    assert_eq!(RESETS as usize + 1, h.platform.timer_starts());
}

#[serial]
#[test]
fn test_reset_before_init() {
    let mut h = Harness::configured(1, 4);
    assert_eq!(Err(ResetError::NotInitialized), h.node.reset_communication());
    assert!(h.stack.calls().is_empty());
}

#[serial]
#[test]
fn test_transport_failure() {
    let mut h = Harness::configured(1, 4);
    h.stack.set_faults(Faults {
        transport: Some(EngineError::IllegalBaudrate),
        ..Default::default()
    });
    let err = h.node.init(new_registry::<1>()).unwrap_err();
    assert_eq!(
        InitError::Reset {
            source: ResetError::CanInit {
                error: EngineError::IllegalBaudrate
            }
        },
        err
    );
    assert_contains!(err.to_string(), "CAN transport init failed");

    // The reset short circuits, and the half built engine is destroyed
    assert_eq!(0, h.stack.count(|c| matches!(c, Call::InitLss { .. })));
    assert_eq!(0, h.stack.live());
    assert_eq!(LifecycleState::Configuring, h.node.state());
    assert!(!h.instance.is_normal());
    assert!(!h.instance.has_engine());
    assert_eq!(0, h.platform.timer_starts());

    // The caller may retry once the fault is gone
    h.stack.set_faults(Faults::default());
    h.node.reset_communication().unwrap();
    assert_eq!(LifecycleState::Normal, h.node.state());
    assert_eq!(1, h.stack.live());
}

#[serial]
#[test]
fn test_reset_allocation_failure() {
    let mut h = Harness::configured(1, 4);
    h.node.init(new_registry::<1>()).unwrap();
    h.stack.clear_calls();
    h.stack.update_faults(|f| f.allocation = true);

    assert_eq!(Err(ResetError::Allocation), h.node.reset_communication());
    // The old engine was torn down, and nothing replaced it
    assert_eq!(
        vec![
            Call::SetConfigurationMode { engine: 0 },
            Call::Destroy { engine: 0 }
        ],
        h.stack.calls()
    );
    assert_eq!(LifecycleState::Configuring, h.node.state());
    assert!(!h.instance.is_normal());
    assert!(!h.instance.has_engine());
    assert_eq!(0, h.stack.live());
    assert!(!h.instance.periodic_tick());
    assert_eq!(1, h.platform.timer_starts());

    h.stack.update_faults(|f| f.allocation = false);
    h.node.reset_communication().unwrap();
    assert_eq!(LifecycleState::Normal, h.node.state());
    assert_eq!(1, h.stack.live());
}

#[serial]
#[test]
fn test_lss_failure() {
    let mut h = Harness::configured(1, 4);
    h.node.init(new_registry::<1>()).unwrap();
    h.stack.clear_calls();
    h.stack.update_faults(|f| f.lss = Some(EngineError::IllegalArgument));

    assert_eq!(
        Err(ResetError::AddressNegotiation {
            error: EngineError::IllegalArgument
        }),
        h.node.reset_communication()
    );
    assert_eq!(
        0,
        h.stack
            .count(|c| matches!(c, Call::InitCommunication { .. }))
    );
    assert_eq!(0, h.stack.live());
}

#[serial]
#[test]
fn test_communication_failure_reports_entry() {
    let mut h = Harness::configured(1, 4);
    h.node.init(new_registry::<1>()).unwrap();
    h.stack.clear_calls();

    h.stack.update_faults(|f| {
        f.communication = Some(EngineFault::new(EngineError::OdParameters, 0x1017_0000))
    });
    let err = h.node.reset_communication().unwrap_err();
    assert_eq!(
        ResetError::CommunicationInit {
            error: EngineError::OdParameters,
            entry: Some(0x1017_0000)
        },
        err
    );
    assert_contains!(err.to_string(), "entry 0x10170000");
    assert_eq!(0, h.stack.count(|c| matches!(c, Call::InitPdo { .. })));
    assert_eq!(1, h.platform.timer_starts());

    // Other errors carry no entry
    h.stack.update_faults(|f| {
        f.communication = Some(EngineFault::new(EngineError::IllegalArgument, 7))
    });
    assert_eq!(
        Err(ResetError::CommunicationInit {
            error: EngineError::IllegalArgument,
            entry: None
        }),
        h.node.reset_communication()
    );
}

#[serial]
#[test]
fn test_pdo_failure() {
    let mut h = Harness::configured(1, 4);
    h.node.init(new_registry::<1>()).unwrap();

    h.stack.update_faults(|f| {
        f.pdo = Some(EngineFault::new(EngineError::OdParameters, 0x1A00_0001))
    });
    assert_eq!(
        Err(ResetError::PdoInit {
            error: EngineError::OdParameters,
            entry: Some(0x1A00_0001)
        }),
        h.node.reset_communication()
    );
    assert!(!h.instance.is_normal());
    assert_eq!(0, h.stack.live());
}

#[serial]
#[test]
fn test_unconfigured_node_id() {
    let mut h = Harness::new(1, NodeConfig::default());
    h.node.init(new_registry::<1>()).unwrap();

    // Communication and PDO init still run, and the reset succeeds
    assert_eq!(LifecycleState::Normal, h.node.state());
    assert_eq!(NodeId::Unconfigured, h.node.active_node_id());
    let mut expected = vec![Call::Construct { engine: 0 }];
    expected.extend(init_sequence(NodeId::Unconfigured, 0));
    expected.push(Call::SetNormalMode);
    assert_eq!(expected, h.stack.calls());

    // The fast path does nothing until a node ID is assigned
    h.stack.clear_calls();
    assert!(!h.instance.periodic_tick());
    assert!(h.stack.calls().is_empty());

    // A master assigns an ID over LSS, and the next reset picks it up
    let node_id = NodeId::new(22).unwrap();
    h.stack.assign_node_id(node_id);
    h.node.reset_communication().unwrap();
    assert_eq!(node_id, h.node.active_node_id());
    assert_contains!(
        h.stack.calls(),
        &Call::InitLss {
            node_id,
            bitrate_kbps: 500
        }
    );
    assert!(h.instance.periodic_tick());
}

#[serial]
#[test]
fn test_lss_overrides_node_id() {
    let mut h = Harness::configured(1, 4);
    h.stack.set_faults(Faults {
        lss_node_id: Some(NodeId::Unconfigured),
        ..Default::default()
    });
    h.node.init(new_registry::<1>()).unwrap();
    assert_eq!(NodeId::Unconfigured, h.node.desired_node_id());
    assert_eq!(NodeId::Unconfigured, h.node.active_node_id());
    assert_contains!(
        h.stack.calls(),
        &Call::InitPdo {
            node_id: NodeId::Unconfigured
        }
    );
}

struct FailingStorage {
    inits: Arc<AtomicUsize>,
    info: u32,
}

impl ParameterStorage for FailingStorage {
    fn init(
        &mut self,
        _can: &canode::CanModule,
        entries: &[StorageEntry],
    ) -> Result<(), EngineFault> {
        assert_eq!(1, entries.len());
        self.inits.fetch_add(1, Ordering::Relaxed);
        Err(EngineFault::new(EngineError::DataCorrupt, self.info))
    }
}

fn with_failing_storage(mut h: Harness, inits: &Arc<AtomicUsize>) -> Harness {
    let storage = Box::leak(Box::new(FailingStorage {
        inits: inits.clone(),
        info: 0x4,
    }));
    let entries: &'static [StorageEntry] = leak([StorageEntry::communication(32)]);
    h.node = h.node.with_storage(storage, entries);
    h
}

#[serial]
#[test]
fn test_storage_error_emergency() {
    let inits = Arc::new(AtomicUsize::new(0));
    let mut h = with_failing_storage(Harness::configured(1, 4), &inits);
    h.node.init(new_registry::<1>()).unwrap();

    assert_eq!(1, inits.load(Ordering::Relaxed));
    assert_eq!(4, h.node.storage_error());
    let report = Call::ReportError {
        error_bit: emergency::NON_VOLATILE_MEMORY,
        code: emergency::HARDWARE,
        info: 0x4,
    };
    let calls = h.stack.calls();
    let pdo = calls
        .iter()
        .position(|c| matches!(c, Call::InitPdo { .. }))
        .unwrap();
    assert_eq!(report, calls[pdo + 1]);
    assert_eq!(Call::SetNormalMode, calls[pdo + 2]);

    // Storage is only initialized once, but the report is repeated on every reset
    h.node.reset_communication().unwrap();
    assert_eq!(1, inits.load(Ordering::Relaxed));
    assert_eq!(2, h.stack.count(|c| *c == report));
}

#[serial]
#[test]
fn test_storage_error_deferred_without_node_id() {
    let inits = Arc::new(AtomicUsize::new(0));
    let mut h = with_failing_storage(Harness::new(1, NodeConfig::default()), &inits);
    h.node.init(new_registry::<1>()).unwrap();
    assert_eq!(
        0,
        h.stack.count(|c| matches!(c, Call::ReportError { .. }))
    );

    h.stack.assign_node_id(NodeId::new(9).unwrap());
    h.node.reset_communication().unwrap();
    assert_eq!(
        1,
        h.stack.count(|c| matches!(c, Call::ReportError { .. }))
    );
}
