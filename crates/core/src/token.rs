//! Native token amounts.

use std::fmt::Display;

use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Base units per whole native token.
pub const NATIVE_SCALE: u64 = 100_000_000;

/// An amount of native tokens in base units.
///
/// Amounts are fixed-width unsigned integers; all arithmetic on them is
/// checked. Fractional rendering exists only for display.
#[derive(
    Debug,
    Default,
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
#[serde(transparent)]
pub struct Amount {
    raw: u64,
}

impl Amount {
    /// The zero amount.
    pub const fn zero() -> Self {
        Self { raw: 0 }
    }

    /// An amount from raw base units.
    pub const fn from_u64(raw: u64) -> Self {
        Self { raw }
    }

    /// An amount of whole native tokens.
    ///
    /// Panics on overflow; only usable for constants well below the supply
    /// cap, which `const` evaluation enforces at compile time.
    pub const fn native_whole(whole: u64) -> Self {
        Self {
            raw: whole * NATIVE_SCALE,
        }
    }

    /// The raw base units.
    pub const fn raw(&self) -> u64 {
        self.raw
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Checked addition.
    pub fn checked_add(&self, rhs: Amount) -> Option<Amount> {
        self.raw.checked_add(rhs.raw).map(|raw| Self { raw })
    }

    /// Checked subtraction.
    pub fn checked_sub(&self, rhs: Amount) -> Option<Amount> {
        self.raw.checked_sub(rhs.raw).map(|raw| Self { raw })
    }

    /// Render the amount in whole native tokens.
    pub fn to_string_native(&self) -> String {
        let whole = self.raw / NATIVE_SCALE;
        let frac = self.raw % NATIVE_SCALE;
        if frac == 0 {
            format!("{whole}")
        } else {
            let frac = format!("{frac:08}");
            format!("{whole}.{}", frac.trim_end_matches('0'))
        }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_native())
    }
}

impl From<u64> for Amount {
    fn from(raw: u64) -> Self {
        Self::from_u64(raw)
    }
}

#[cfg(any(test, feature = "testing"))]
/// Testing helpers and strategies for amounts
pub mod testing {
    use proptest::prelude::*;

    use super::*;

    /// Generate an arbitrary token amount.
    pub fn arb_amount() -> impl Strategy<Value = Amount> {
        (0..=u64::MAX / 2).prop_map(Amount::from_u64)
    }
}
