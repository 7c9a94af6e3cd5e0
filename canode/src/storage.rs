//! Non-volatile parameter storage hook
//!
//! Storage is optional. When provided, it is initialized once during [`Node::init`](crate::Node::init),
//! before the engine is constructed, so stored parameters can be loaded into the object dictionary
//! ahead of the first communication reset.
use canode_common::{constants::storage_sub, EngineFault};

use crate::can_module::CanModule;

/// Attributes of a storage entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageAttr(pub u8);

impl StorageAttr {
    /// Entry is stored on command, via object 0x1010
    pub const CMD: Self = Self(0x01);
    /// Entry is stored automatically on change
    pub const AUTO: Self = Self(0x02);
    /// Entry can be restored to defaults, via object 0x1011
    pub const RESTORE: Self = Self(0x04);

    /// Check if all bits of `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for StorageAttr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// One block of parameters to keep in non-volatile memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StorageEntry {
    /// Sub index of object 0x1010/0x1011 which stores/restores this entry
    pub sub_index: u8,
    /// Size of the block in bytes
    pub len: usize,
    /// Entry attributes
    pub attr: StorageAttr,
}

impl StorageEntry {
    /// The conventional communication parameter entry
    pub const fn communication(len: usize) -> Self {
        Self {
            sub_index: storage_sub::COMMUNICATION,
            len,
            attr: StorageAttr(StorageAttr::CMD.0 | StorageAttr::RESTORE.0),
        }
    }

    /// The conventional application parameter entry
    pub const fn application(len: usize) -> Self {
        Self {
            sub_index: storage_sub::APPLICATION,
            len,
            attr: StorageAttr(StorageAttr::CMD.0 | StorageAttr::RESTORE.0),
        }
    }
}

/// A non-volatile parameter store
pub trait ParameterStorage {
    /// Initialize storage and load stored entries
    ///
    /// On failure, the fault's `info` is a bit mask of the entries which could not be loaded. It is
    /// reported over the emergency producer once the node has a node ID.
    fn init(&mut self, can: &CanModule, entries: &[StorageEntry]) -> Result<(), EngineFault>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_storage_attr() {
        let entry = StorageEntry::communication(16);
        assert_eq!(2, entry.sub_index);
        assert!(entry.attr.contains(StorageAttr::CMD));
        assert!(entry.attr.contains(StorageAttr::RESTORE));
        assert!(!entry.attr.contains(StorageAttr::AUTO));
        assert_eq!(StorageAttr(0x03), StorageAttr::CMD | StorageAttr::AUTO);
        assert_eq!(3, StorageEntry::application(4).sub_index);
    }
}
