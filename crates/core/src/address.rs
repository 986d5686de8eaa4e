//! Account addresses.

use std::fmt::Display;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The length of an [`Address`] in bytes.
pub const ADDRESS_LEN: usize = 20;

/// First byte of every internal (protocol-owned) address.
const INTERNAL_PREFIX: u8 = 0xfe;

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Address must be {} hex characters, got {0:?}", ADDRESS_LEN * 2)]
    InvalidLength(String),
    #[error("Address contains a non-hex character: {0:?}")]
    InvalidHex(String),
}

/// An account identifier, rendered as lowercase hex.
///
/// Addresses are opaque to the protocol core. The execution environment
/// authenticates the sender before dispatch; the core only compares and
/// stores them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSchema,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Build an address from raw bytes.
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// An internal, protocol-owned address derived from a tag. Internal
    /// addresses are distinguishable from account addresses by prefix.
    pub const fn internal(tag: u8) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = INTERNAL_PREFIX;
        bytes[ADDRESS_LEN - 1] = tag;
        Self(bytes)
    }

    /// Check whether this is a protocol-owned address.
    pub fn is_internal(&self) -> bool {
        self.0[0] == INTERNAL_PREFIX
    }

    /// The raw bytes of the address.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ADDRESS_LEN * 2 {
            return Err(DecodeError::InvalidLength(s.to_string()));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        for (i, chunk) in s.as_bytes().chunks_exact(2).enumerate() {
            let chunk = std::str::from_utf8(chunk)
                .map_err(|_| DecodeError::InvalidHex(s.to_string()))?;
            bytes[i] = u8::from_str_radix(chunk, 16)
                .map_err(|_| DecodeError::InvalidHex(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

#[cfg(any(test, feature = "testing"))]
/// Testing helpers and strategies for addresses
pub mod testing {
    use proptest::prelude::*;

    use super::*;

    /// A deterministic established account address.
    pub fn established_address_1() -> Address {
        Address::from_bytes([0x11; ADDRESS_LEN])
    }

    /// A deterministic established account address.
    pub fn established_address_2() -> Address {
        Address::from_bytes([0x22; ADDRESS_LEN])
    }

    /// A deterministic established account address.
    pub fn established_address_3() -> Address {
        Address::from_bytes([0x33; ADDRESS_LEN])
    }

    /// A deterministic established account address.
    pub fn established_address_4() -> Address {
        Address::from_bytes([0x44; ADDRESS_LEN])
    }

    /// The n-th deterministic established account address.
    pub fn established_address_n(n: u8) -> Address {
        let mut bytes = [n; ADDRESS_LEN];
        bytes[0] = 0x10;
        Address::from_bytes(bytes)
    }

    /// Generate an arbitrary account address.
    pub fn arb_address() -> impl Strategy<Value = Address> {
        proptest::array::uniform20(1u8..0xfe).prop_map(Address::from_bytes)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_address_hex_round_trip() {
        let addr = testing::established_address_1();
        let hex = addr.to_string();
        assert_eq!(hex.len(), ADDRESS_LEN * 2);
        assert_eq!(Address::from_str(&hex).unwrap(), addr);
    }

    #[test]
    fn test_address_decode_rejects_garbage() {
        assert_matches!(
            Address::from_str("too-short"),
            Err(DecodeError::InvalidLength(_))
        );
        assert_matches!(
            Address::from_str(&"zz".repeat(ADDRESS_LEN)),
            Err(DecodeError::InvalidHex(_))
        );
    }

    #[test]
    fn test_internal_addresses_are_marked() {
        assert!(Address::internal(4).is_internal());
        assert!(!testing::established_address_2().is_internal());
        assert_ne!(Address::internal(4), Address::internal(5));
    }
}
