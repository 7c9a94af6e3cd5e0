use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use integration_tests::prelude::*;
use serial_test::serial;

fn running_node() -> Harness {
    let mut h = Harness::configured(1, 3);
    h.node.init(new_registry::<1>()).unwrap();
    h.stack.clear_calls();
    h
}

fn od_held(h: &Harness) -> bool {
    h.instance
        .can_module()
        .is_held(LockDomain::ObjectDictionary)
}

#[serial]
#[test]
fn test_tick_runs_fast_path_locked() {
    let h = running_node();
    assert!(h.instance.periodic_tick());
    assert_eq!(
        vec![
            Call::Sync { od_locked: true },
            Call::Rpdo {
                od_locked: true,
                sync_was: false
            },
            Call::Tpdo {
                od_locked: true,
                sync_was: false
            },
        ],
        h.stack.calls()
    );
    assert!(!od_held(&h));
}

#[serial]
#[test]
fn test_tick_passes_sync_event() {
    let h = running_node();
    h.stack.update_faults(|f| f.sync_occurs = true);
    assert!(h.instance.periodic_tick());
    assert_eq!(
        Call::Rpdo {
            od_locked: true,
            sync_was: true
        },
        h.stack.calls()[1]
    );
    assert_eq!(
        Call::Tpdo {
            od_locked: true,
            sync_was: true
        },
        h.stack.calls()[2]
    );
}

#[serial]
#[test]
fn test_tick_noop_when_not_normal() {
    // Before init
    let mut h = Harness::configured(1, 3);
    assert!(!h.instance.periodic_tick());
    assert!(!od_held(&h));

    // After a failed reset
    h.node.init(new_registry::<1>()).unwrap();
    h.stack.update_faults(|f| f.transport = Some(EngineError::InvalidState));
    h.node.reset_communication().unwrap_err();
    h.stack.clear_calls();
    assert!(!h.instance.periodic_tick());
    assert!(h.stack.calls().is_empty());
    assert!(!od_held(&h));
}

#[serial]
#[test]
fn test_tick_noop_when_unconfigured() {
    let mut h = Harness::new(1, NodeConfig::default());
    h.node.init(new_registry::<1>()).unwrap();
    h.stack.clear_calls();
    assert!(h.instance.is_normal());
    assert!(!h.instance.periodic_tick());
    assert!(h.stack.calls().is_empty());
    assert!(!od_held(&h));
}

#[serial]
#[test]
fn test_tick_period_from_config() {
    let config = NodeConfig::new(NodeId::new(3).unwrap(), 250).with_tick_period_us(500);
    let mut h = Harness::new(1, config);
    assert_eq!(1000, h.instance.tick_period_us());
    h.node.init(new_registry::<1>()).unwrap();
    assert_eq!(500, h.instance.tick_period_us());
    assert_eq!(250, h.node.bitrate_kbps());
}

/// Ticks run concurrently with repeated communication resets from the polling thread. The engine
/// must never be ticked outside normal mode, and no engine may leak.
#[serial]
#[test]
fn test_tick_concurrent_with_resets() {
    let mut h = running_node();
    let instance = h.instance;
    let stop = Arc::new(AtomicBool::new(false));

    let ticker = {
        let stop = stop.clone();
        thread::spawn(move || {
            let mut ticks = 0usize;
            while !stop.load(Ordering::Relaxed) {
                if instance.periodic_tick() {
                    ticks += 1;
                }
                thread::sleep(Duration::from_micros(20));
            }
            ticks
        })
    };

    for _ in 0..50 {
        h.stack.queue_command(ResetCommand::CommunicationReset);
        advance_ms(1);
        assert_eq!(Ok(ProcessOutcome::CommunicationReset), h.node.process());
        advance_ms(1);
        assert_eq!(Ok(ProcessOutcome::Ticked), h.node.process());
    }
    stop.store(true, Ordering::Relaxed);
    ticker.join().unwrap();

    assert_eq!(0, h.stack.violations());
    assert_eq!(1, h.stack.live());
    assert_eq!(51, h.stack.constructed());
    assert!(!od_held(&h));
}
