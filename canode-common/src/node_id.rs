//! Types for representing node IDs
//!

/// The node ID of a CANopen node.
///
/// Configured nodes have an ID between 1 and 127. The raw value 255 stands for a node which has
/// not been assigned an ID yet, and is waiting for one to be granted over LSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "std", derive(serde::Deserialize), serde(try_from = "u8"))]
pub enum NodeId {
    /// The node has no ID yet (255)
    #[default]
    Unconfigured,
    /// A valid node ID for a configured node
    Configured(ConfiguredNodeId),
}

/// A newtype on u8 to enforce valid node ID (1-127)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfiguredNodeId(u8);

impl ConfiguredNodeId {
    /// Try to create a new ConfiguredNodeId
    ///
    /// It will fail if value is outside of 1..=127
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value > 0 && value < 128 {
            Ok(ConfiguredNodeId(value))
        } else {
            Err(InvalidNodeIdError(value))
        }
    }

    /// Get the raw node ID as a u8
    pub const fn raw(&self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for ConfiguredNodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ConfiguredNodeId> for u8 {
    fn from(value: ConfiguredNodeId) -> Self {
        value.raw()
    }
}

impl NodeId {
    /// Raw value used on the bus for an unconfigured node
    pub const UNCONFIGURED_RAW: u8 = 255;

    /// Try to create a new NodeId from a u8
    ///
    /// Will fail if the value is neither 1..=127 nor 255
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value == Self::UNCONFIGURED_RAW {
            Ok(NodeId::Unconfigured)
        } else {
            match ConfiguredNodeId::new(value) {
                Ok(id) => Ok(NodeId::Configured(id)),
                Err(e) => Err(e),
            }
        }
    }

    /// Get the raw node ID as a u8
    pub const fn raw(&self) -> u8 {
        match self {
            NodeId::Unconfigured => Self::UNCONFIGURED_RAW,
            NodeId::Configured(id) => id.0,
        }
    }

    /// Get the node ID as a ConfiguredNodeId, or None if it is unconfigured
    pub const fn as_configured(&self) -> Option<ConfiguredNodeId> {
        match self {
            NodeId::Unconfigured => None,
            NodeId::Configured(id) => Some(*id),
        }
    }

    /// Return true if the NodeId contains a valid configured ID
    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    /// Return true if the node ID is NodeId::Unconfigured
    pub const fn is_unconfigured(&self) -> bool {
        matches!(self, Self::Unconfigured)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NodeId::Unconfigured => write!(f, "unconfigured"),
            NodeId::Configured(id) => write!(f, "{id}"),
        }
    }
}

/// Error for converting u8 to a NodeId
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidNodeIdError(pub u8);

impl core::fmt::Display for InvalidNodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid node ID {}", self.0)
    }
}
impl core::error::Error for InvalidNodeIdError {}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}

impl From<ConfiguredNodeId> for NodeId {
    fn from(value: ConfiguredNodeId) -> Self {
        NodeId::Configured(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_node_id_range() {
        assert_eq!(Err(InvalidNodeIdError(0)), NodeId::new(0));
        assert_eq!(Err(InvalidNodeIdError(128)), NodeId::new(128));
        assert_eq!(Err(InvalidNodeIdError(254)), NodeId::try_from(254));
        assert_eq!(Ok(NodeId::Unconfigured), NodeId::new(255));
        assert_eq!(127, NodeId::new(127).unwrap().raw());
        assert!(NodeId::new(1).unwrap().is_configured());
    }

    #[test]
    fn test_unconfigured_raw_value() {
        assert_eq!(255u8, NodeId::Unconfigured.into());
        assert!(NodeId::default().is_unconfigured());
        assert_eq!(None, NodeId::Unconfigured.as_configured());
    }
}
