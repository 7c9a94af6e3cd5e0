#![allow(dead_code)]
use canode::common::{NodeConfig, NodeId};
use canode::{InterfaceId, Node, NodeInstance, Registry};

use crate::mock_stack::{MockEngine, MockStack};
use crate::sim_platform::{sim_millis, SimPlatform};

/// Bytes reported by the mock stack for each constructed engine
pub const HEAP_USED: u32 = 4096;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Give a value a static lifetime, the way a firmware image would declare it
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

pub fn new_registry<const N: usize>() -> &'static Registry<'static, MockEngine, N> {
    leak(Registry::new(sim_millis))
}

/// A node wired to a mock engine and simulated platform, with handles kept for inspection
pub struct Harness {
    pub node: Node<'static, MockStack, SimPlatform>,
    pub stack: MockStack,
    pub platform: SimPlatform,
    pub instance: &'static NodeInstance<MockEngine>,
}

impl Harness {
    pub fn new(interface: u32, config: NodeConfig) -> Self {
        Self::with_stack(interface, config, MockStack::new())
    }

    /// A node with a configured ID on a 500 kbit/s bus
    pub fn configured(interface: u32, node_id: u8) -> Self {
        let node_id = NodeId::new(node_id).expect("Invalid test node ID");
        Self::new(interface, NodeConfig::new(node_id, 500))
    }

    pub fn with_stack(interface: u32, config: NodeConfig, stack: MockStack) -> Self {
        init_logging();
        let instance = leak(NodeInstance::new(InterfaceId(interface)));
        let platform = SimPlatform::new();
        let node = Node::new(instance, stack.clone(), platform.clone(), config, HEAP_USED);
        Self {
            node,
            stack,
            platform,
            instance,
        }
    }
}
