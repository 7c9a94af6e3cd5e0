//! Types used for LSS address negotiation

use crate::constants::object_ids;

/// The identity of a device, as stored in the identity object (0x1018)
///
/// LSS uses these four values as the address of a node which does not yet have a node ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LssIdentity {
    /// Vendor ID (0x1018 sub 1)
    pub vendor_id: u32,
    /// Product code (0x1018 sub 2)
    pub product_code: u32,
    /// Revision number (0x1018 sub 3)
    pub revision: u32,
    /// Serial number (0x1018 sub 4)
    pub serial: u32,
}

impl LssIdentity {
    /// The object index the identity is read from
    pub const OBJECT_INDEX: u16 = object_ids::IDENTITY;

    /// Create a new identity
    pub const fn new(vendor_id: u32, product_code: u32, revision: u32, serial: u32) -> Self {
        Self {
            vendor_id,
            product_code,
            revision,
            serial,
        }
    }

    /// Build an identity from the values of 0x1018 sub-indices 1 through 4
    pub const fn from_subs(subs: [u32; 4]) -> Self {
        Self::new(subs[0], subs[1], subs[2], subs[3])
    }

    /// Read back the identity as the values of 0x1018 sub-indices 1 through 4
    pub const fn to_subs(&self) -> [u32; 4] {
        [self.vendor_id, self.product_code, self.revision, self.serial]
    }
}
