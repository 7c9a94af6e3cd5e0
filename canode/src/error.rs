//! Error types returned by the lifecycle controller
use canode_common::EngineError;
use snafu::Snafu;

use crate::can_module::InterfaceId;

/// Error returned when registering a node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[snafu(visibility(pub(crate)))]
pub enum RegistryError {
    /// All registry slots are occupied
    #[snafu(display("Registry is full ({capacity} instances)"))]
    Full {
        /// Number of slots in the registry
        capacity: usize,
    },
    /// Another instance is already registered for the interface
    #[snafu(display("Interface {} is already registered", interface.0))]
    InterfaceInUse {
        /// The contested interface
        interface: InterfaceId,
    },
}

/// Error returned by a communication reset
///
/// Every variant is fatal for the node; it stays out of normal mode until a later reset succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[snafu(visibility(pub(crate)))]
pub enum ResetError {
    /// The node has not been initialized, or has been halted
    NotInitialized,
    /// Not enough memory to construct the protocol engine
    Allocation,
    /// The CAN transport could not be initialized
    #[snafu(display("CAN transport init failed: {error}"))]
    CanInit {
        /// Engine error code
        error: EngineError,
    },
    /// The LSS slave could not be initialized
    #[snafu(display("LSS init failed: {error}"))]
    AddressNegotiation {
        /// Engine error code
        error: EngineError,
    },
    /// Communication objects could not be initialized
    #[snafu(display("Communication init failed: {error}{}", fmt_entry(entry)))]
    CommunicationInit {
        /// Engine error code
        error: EngineError,
        /// Offending object dictionary entry, for object dictionary parameter errors
        entry: Option<u32>,
    },
    /// PDOs could not be initialized
    #[snafu(display("PDO init failed: {error}{}", fmt_entry(entry)))]
    PdoInit {
        /// Engine error code
        error: EngineError,
        /// Offending object dictionary entry, for object dictionary parameter errors
        entry: Option<u32>,
    },
}

fn fmt_entry(entry: &Option<u32>) -> EntrySuffix {
    EntrySuffix(*entry)
}

struct EntrySuffix(Option<u32>);

impl core::fmt::Display for EntrySuffix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(entry) => write!(f, " (entry 0x{entry:X})"),
            None => Ok(()),
        }
    }
}

/// Error returned by [`Node::init`](crate::Node::init)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[snafu(visibility(pub(crate)))]
pub enum InitError {
    /// The node instance is already owned by a controller
    AlreadyInitialized,
    /// The node instance could not be registered
    #[snafu(display("Failed to register node instance: {source}"))]
    Registry {
        /// Registry failure
        source: RegistryError,
    },
    /// Not enough memory to construct the protocol engine
    #[snafu(context(suffix(false)))]
    Allocation,
    /// The first communication reset failed
    #[snafu(display("Initial communication reset failed: {source}"))]
    Reset {
        /// Reset failure
        source: ResetError,
    },
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResetError::CommunicationInit {
            error: EngineError::OdParameters,
            entry: Some(0x1800_0001),
        };
        assert!(err.to_string().ends_with("(entry 0x18000001)"));

        let err = ResetError::PdoInit {
            error: EngineError::IllegalArgument,
            entry: None,
        };
        assert!(!err.to_string().contains("entry"));

        let err = InitError::Reset {
            source: ResetError::Allocation,
        };
        assert!(err.to_string().starts_with("Initial communication reset failed"));
    }
}
