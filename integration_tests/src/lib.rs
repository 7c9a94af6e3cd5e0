pub mod mock_stack;
pub mod sim_platform;
pub mod utils;

pub mod prelude {
    pub use super::mock_stack::{Call, Faults, MockEngine, MockStack};
    pub use super::sim_platform::{advance_ms, set_ms, sim_millis, SimPlatform};
    pub use super::utils::{init_logging, leak, new_registry, Harness, HEAP_USED};
    pub use canode::common::{
        CommParams, EngineError, EngineFault, LssIdentity, NodeConfig, NodeId, ResetCommand,
    };
    pub use canode::{
        InitError, InterfaceId, LifecycleState, LockDomain, Node, NodeInstance, ProcessOutcome,
        Registry, RegistryError, ResetError,
    };
}
