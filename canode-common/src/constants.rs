//! Constants defining standard objects, emergency codes and default timing
//!
//!

/// Object indices for standard objects
pub mod object_ids {
    /// Store parameters command object index
    pub const STORE_PARAMETERS: u16 = 0x1010;
    /// Restore default parameters command object index
    pub const RESTORE_DEFAULT_PARAMETERS: u16 = 0x1011;
    /// The heartbeat producer time object index
    pub const HEARTBEAT_PRODUCER_TIME: u16 = 0x1017;
    /// The identity object index
    pub const IDENTITY: u16 = 0x1018;
}

/// Sub-indices of the store/restore parameter objects (0x1010, 0x1011)
pub mod storage_sub {
    /// Store or restore all parameters
    pub const ALL: u8 = 1;
    /// Store or restore communication parameters (0x1000-0x1FFF)
    pub const COMMUNICATION: u8 = 2;
    /// Store or restore application parameters (0x6000-0x9FFF)
    pub const APPLICATION: u8 = 3;
}

/// Emergency error status bits and error codes used by the lifecycle controller
pub mod emergency {
    /// Error status bit: error accessing non-volatile device memory
    pub const NON_VOLATILE_MEMORY: u8 = 0x2F;
    /// Emergency error code: generic hardware error
    pub const HARDWARE: u16 = 0x5000;
}

/// Default values used when initializing communication
pub mod defaults {
    /// Delay before the first heartbeat is produced, in ms
    pub const FIRST_HEARTBEAT_MS: u16 = 500;
    /// SDO server timeout, in ms
    pub const SDO_SERVER_TIMEOUT_MS: u16 = 1000;
    /// SDO client timeout, in ms
    pub const SDO_CLIENT_TIMEOUT_MS: u16 = 500;
    /// Period of the timer interrupt driving the fast path, in us
    pub const TICK_PERIOD_US: u32 = 1000;
    /// Bit rate assumed when none is configured, in kbit/s
    pub const BITRATE_KBPS: u16 = 500;
}
