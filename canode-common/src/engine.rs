//! Values exchanged with the CANopen protocol engine
//!
//! The engine itself is an external collaborator. These are the plain data types which cross the
//! boundary: numeric error codes, the reset command returned from its main process step, and the
//! communication parameters handed to it during initialization.

use int_enum::IntEnum;

use crate::constants::defaults;

/// Error codes returned by the protocol engine
///
/// The discriminants match the engine's numeric return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i8)]
pub enum EngineError {
    /// Error in function arguments
    IllegalArgument = -1,
    /// Memory allocation failed
    OutOfMemory = -2,
    /// Function timeout
    Timeout = -3,
    /// Illegal baudrate passed to the CAN module
    IllegalBaudrate = -4,
    /// Previous message was not processed yet
    RxOverflow = -5,
    /// Previous PDO was not processed yet
    RxPdoOverflow = -6,
    /// Wrong receive message length
    RxMsgLength = -7,
    /// Wrong receive PDO length
    RxPdoLength = -8,
    /// Previous message is still waiting, buffer full
    TxOverflow = -9,
    /// Synchronous TPDO is outside window
    TxPdoWindow = -10,
    /// Transmit buffer was not configured properly
    TxUnconfigured = -11,
    /// Error in object dictionary parameters
    OdParameters = -12,
    /// Stored data are corrupt
    DataCorrupt = -13,
    /// CRC does not match
    Crc = -14,
    /// Sending rejected because the driver is busy
    TxBusy = -15,
    /// Command can't be processed in the current NMT state
    WrongNmtState = -16,
    /// Syscall failed
    Syscall = -17,
    /// Driver not ready
    InvalidState = -18,
    /// Node ID is not configured, and the node is waiting for LSS assignment
    NodeIdUnconfiguredLss = -19,
}

impl EngineError {
    /// Get the raw numeric code of the error
    pub fn code(self) -> i8 {
        self.into()
    }
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl core::error::Error for EngineError {}

/// An engine error, with the auxiliary info word reported alongside it
///
/// For [`EngineError::OdParameters`], `info` holds the index of the offending object dictionary
/// entry. For storage errors it holds the storage error bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineFault {
    /// The error code
    pub error: EngineError,
    /// Extra information about the error
    pub info: u32,
}

impl EngineFault {
    /// Create a new fault
    pub const fn new(error: EngineError, info: u32) -> Self {
        Self { error, info }
    }

    /// Get the offending object dictionary entry, if the fault names one
    pub fn entry(&self) -> Option<u32> {
        (self.error == EngineError::OdParameters).then_some(self.info)
    }

    /// True if the fault only says the node ID is waiting to be assigned over LSS
    pub fn is_unconfigured_node_id(&self) -> bool {
        self.error == EngineError::NodeIdUnconfiguredLss
    }
}

impl From<EngineError> for EngineFault {
    fn from(error: EngineError) -> Self {
        Self::new(error, 0)
    }
}

/// The result of the engine's main process step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetCommand {
    /// Nothing to do, keep running
    #[default]
    NoAction,
    /// Communication must be reset, rebuilding the engine
    CommunicationReset,
    /// The application must be reset, i.e. the device restarted
    ApplicationReset,
}

/// NMT control flags passed to the engine at communication init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(transparent))]
pub struct NmtControl(pub u16);

impl NmtControl {
    /// Include the generic error bit of the error register in the error check
    pub const ERR_REG_GENERIC: Self = Self(0x0001);
    /// Include the communication error bit of the error register in the error check
    pub const ERR_REG_COMMUNICATION: Self = Self(0x0010);
    /// Enter operational state automatically after boot-up
    pub const STARTUP_TO_OPERATIONAL: Self = Self(0x0100);
    /// Treat CAN bus-off and heartbeat consumer timeout as an NMT error
    pub const ERR_ON_BUSOFF_HB: Self = Self(0x1000);
    /// Treat bits set in the error register as an NMT error
    pub const ERR_ON_ERR_REG: Self = Self(0x2000);
    /// Enter stopped state instead of pre-operational on NMT error
    pub const ERR_TO_STOPPED: Self = Self(0x4000);
    /// Return to operational state once NMT errors clear
    pub const ERR_FREE_TO_OPERATIONAL: Self = Self(0x8000);

    /// The flags used unless configured otherwise
    pub const DEFAULT: Self = Self(
        Self::STARTUP_TO_OPERATIONAL.0
            | Self::ERR_ON_ERR_REG.0
            | Self::ERR_REG_GENERIC.0
            | Self::ERR_REG_COMMUNICATION.0,
    );

    /// Return true if all flags in `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for NmtControl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl core::ops::BitOr for NmtControl {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Communication parameters passed to the engine during communication init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(
    feature = "std",
    derive(serde::Deserialize),
    serde(deny_unknown_fields, default)
)]
pub struct CommParams {
    /// NMT behavior flags
    pub nmt_control: NmtControl,
    /// Delay before the first heartbeat, in ms
    pub first_heartbeat_ms: u16,
    /// SDO server timeout, in ms
    pub sdo_server_timeout_ms: u16,
    /// SDO client timeout, in ms
    pub sdo_client_timeout_ms: u16,
    /// Use block transfers in the SDO client
    pub sdo_client_block_transfer: bool,
}

impl CommParams {
    /// Create a CommParams with default values
    pub const fn new() -> Self {
        Self {
            nmt_control: NmtControl::DEFAULT,
            first_heartbeat_ms: defaults::FIRST_HEARTBEAT_MS,
            sdo_server_timeout_ms: defaults::SDO_SERVER_TIMEOUT_MS,
            sdo_client_timeout_ms: defaults::SDO_CLIENT_TIMEOUT_MS,
            sdo_client_block_transfer: false,
        }
    }
}

impl Default for CommParams {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(-12, EngineError::OdParameters.code());
        assert_eq!(
            Some(EngineError::NodeIdUnconfiguredLss),
            EngineError::try_from(-19).ok()
        );
        assert!(EngineError::try_from(0).is_err());
    }

    #[test]
    fn test_fault_entry() {
        let fault = EngineFault::new(EngineError::OdParameters, 0x1800);
        assert_eq!(Some(0x1800), fault.entry());
        let fault = EngineFault::new(EngineError::IllegalArgument, 0x1800);
        assert_eq!(None, fault.entry());
        assert!(EngineFault::from(EngineError::NodeIdUnconfiguredLss).is_unconfigured_node_id());
    }

    #[test]
    fn test_default_nmt_control() {
        let ctrl = NmtControl::default();
        assert!(ctrl.contains(NmtControl::STARTUP_TO_OPERATIONAL | NmtControl::ERR_ON_ERR_REG));
        assert!(!ctrl.contains(NmtControl::ERR_TO_STOPPED));
        assert_eq!(0x2111, ctrl.0);
    }
}
