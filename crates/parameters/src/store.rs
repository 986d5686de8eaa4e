//! Parameter value holders.

use std::fmt::Display;

use agora_core::address::Address;
use agora_core::token::Amount;
use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{ParamError, ParamKind};

/// Number of entries in the gas cost table.
pub const GAS_SCHEDULE_LEN: usize = 39;

/// The genesis gas cost table.
pub const DEFAULT_GAS_SCHEDULE: [u64; GAS_SCHEDULE_LEN] = [
    10, 10, 10, 10, 10, 10, 10, 10, 10, 50, 30, 6, 200, 20000, 5000, 15000, 1,
    375, 8, 375, 32000, 700, 2300, 9000, 25000, 24000, 3, 512, 200, 21000,
    53000, 4, 68, 3, 700, 700, 400, 5000, 24576,
];

/// Genesis block size limit in bytes.
pub const DEFAULT_BLOCK_SIZE: u64 = 2_000_000;

/// Genesis minimum gas price in base units.
pub const DEFAULT_MIN_GAS_PRICE: u64 = 1;

/// Genesis block gas limit.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 40_000_000;

/// Genesis governor collateral.
pub const DEFAULT_COLLATERAL: Amount = Amount::native_whole(10);

/// Genesis budget proposal listing fee.
pub const DEFAULT_BUDGET_FEE: Amount = Amount::native_whole(1);

/// A parameter value, typed per kind.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    BorshSchema,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum ParamValue {
    /// The per-opcode gas cost table.
    Schedule(Vec<u64>),
    /// A scalar in the parameter's native unit.
    Scalar(u64),
    /// An amount of native tokens.
    Amount(Amount),
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Schedule(costs) => {
                write!(f, "schedule[{} entries]", costs.len())
            }
            ParamValue::Scalar(value) => write!(f, "{value}"),
            ParamValue::Amount(amount) => write!(f, "{amount}"),
        }
    }
}

/// A single addressable parameter holder.
///
/// Holders carry no logic beyond storing a validated value; governance can
/// swap which holder is active for a given parameter without touching the
/// others.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    BorshSchema,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct ParamStore {
    /// The kind of parameter this holder governs.
    pub kind: ParamKind,
    /// The holder's own address.
    pub address: Address,
    /// The held value.
    pub value: ParamValue,
}

impl ParamStore {
    /// Create a holder with a validated initial value.
    pub fn new(
        kind: ParamKind,
        address: Address,
        value: ParamValue,
    ) -> Result<Self, ParamError> {
        validate(kind, &value)?;
        Ok(Self {
            kind,
            address,
            value,
        })
    }

    /// Replace the held value, validating it first.
    pub fn set(&mut self, value: ParamValue) -> Result<(), ParamError> {
        validate(self.kind, &value)?;
        self.value = value;
        Ok(())
    }
}

/// Check a candidate value against the fixed range for its parameter kind.
pub fn validate(kind: ParamKind, value: &ParamValue) -> Result<(), ParamError> {
    let ok = match (kind, value) {
        (ParamKind::GasSchedule, ParamValue::Schedule(costs)) => {
            costs.len() == GAS_SCHEDULE_LEN && costs.iter().all(|c| *c > 0)
        }
        (ParamKind::BlockSize, ParamValue::Scalar(size)) => {
            (1_000_000..=32_000_000).contains(size)
        }
        (ParamKind::MinGasPrice, ParamValue::Scalar(price)) => {
            (1..=10_000).contains(price)
        }
        (ParamKind::BlockGasLimit, ParamValue::Scalar(limit)) => {
            (1_000_000..=1_000_000_000).contains(limit)
        }
        (ParamKind::Collateral, ParamValue::Amount(amount)) => {
            !amount.is_zero()
        }
        (ParamKind::BudgetFee, ParamValue::Amount(amount)) => {
            !amount.is_zero()
        }
        // shape mismatch
        _ => false,
    };
    if ok { Ok(()) } else { Err(ParamError::InvalidValue) }
}
