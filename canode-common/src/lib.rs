//! Common types shared by the canode crates.
//!
//! Most users will have no reason to depend on this crate directly, as it is re-exported by
//! `canode` as `canode::common`.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod constants;
pub mod engine;
pub mod lss;
pub mod node_config;
pub mod node_id;

pub use engine::{CommParams, EngineError, EngineFault, NmtControl, ResetCommand};
pub use lss::LssIdentity;
pub use node_config::NodeConfig;
pub use node_id::NodeId;
