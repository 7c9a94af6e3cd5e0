//! Node configuration
//!
//! A [`NodeConfig`] describes how the lifecycle controller brings up one node: the node ID it asks
//! for, the bit rate of its bus, the cadence of the timer interrupt, and the communication
//! parameters handed to the protocol engine.
//!
//! With the `std` feature the configuration can be loaded from a TOML file:
//!
//! ```toml
//! # 255, or leaving the field out, starts the node unconfigured, waiting for LSS
//! node_id = 12
//! bitrate_kbps = 250
//! tick_period_us = 1000
//!
//! [communication]
//! first_heartbeat_ms = 500
//! sdo_server_timeout_ms = 1000
//! sdo_client_timeout_ms = 500
//! sdo_client_block_transfer = false
//! ```

use crate::{constants::defaults, CommParams, NodeId};

/// Configuration of one managed node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(
    feature = "std",
    derive(serde::Deserialize),
    serde(deny_unknown_fields, default)
)]
pub struct NodeConfig {
    /// The node ID requested at start-up
    ///
    /// The ID actually used may differ once LSS has run.
    pub node_id: NodeId,
    /// Bit rate of the bus, in kbit/s
    ///
    /// The peripheral bit timing is set up by the platform, this value is only reported to LSS.
    pub bitrate_kbps: u16,
    /// Period of the timer interrupt which calls the fast path, in microseconds
    pub tick_period_us: u32,
    /// Parameters passed to communication init
    pub communication: CommParams,
}

impl NodeConfig {
    /// Create a config with default timing and communication parameters
    pub const fn new(node_id: NodeId, bitrate_kbps: u16) -> Self {
        Self {
            node_id,
            bitrate_kbps,
            tick_period_us: defaults::TICK_PERIOD_US,
            communication: CommParams::new(),
        }
    }

    /// Set the timer tick period
    pub const fn with_tick_period_us(mut self, tick_period_us: u32) -> Self {
        self.tick_period_us = tick_period_us;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(NodeId::Unconfigured, defaults::BITRATE_KBPS)
    }
}

#[cfg(feature = "std")]
mod load {
    use super::NodeConfig;
    use snafu::{ResultExt, Snafu};
    use std::path::{Path, PathBuf};

    /// Error returned when loading a [`NodeConfig`]
    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum ConfigLoadError {
        /// The config file could not be read
        #[snafu(display("Error reading {}: {source}", path.display()))]
        Io {
            /// The file which failed
            path: PathBuf,
            /// Underlying IO error
            source: std::io::Error,
        },
        /// The TOML could not be parsed into a NodeConfig
        #[snafu(display("Error parsing node config: {source}"))]
        Parse {
            /// Underlying TOML error
            source: toml::de::Error,
        },
        /// The tick period must be non-zero
        #[snafu(display("tick_period_us must be greater than zero"))]
        InvalidTickPeriod,
    }

    impl NodeConfig {
        /// Parse a NodeConfig from a TOML string
        pub fn load_from_str(s: &str) -> Result<Self, ConfigLoadError> {
            let config: NodeConfig = toml::from_str(s).context(ParseSnafu)?;
            if config.tick_period_us == 0 {
                return InvalidTickPeriodSnafu.fail();
            }
            Ok(config)
        }

        /// Read and parse a NodeConfig from a TOML file
        pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
            let path = path.as_ref();
            let s = std::fs::read_to_string(path).context(IoSnafu { path })?;
            Self::load_from_str(&s)
        }
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub use load::ConfigLoadError;
