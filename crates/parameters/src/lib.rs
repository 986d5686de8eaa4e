//! Protocol parameter stores.
//!
//! Every tunable protocol constant lives in its own trivial, addressable
//! value holder. Governance changes a parameter either by writing a new
//! value into the active holder, or by swapping which holder is active for
//! that parameter. Holders validate at write time and do nothing else.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    clippy::arithmetic_side_effects,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]

pub mod store;

use std::collections::BTreeMap;

use agora_core::address::Address;
use agora_core::token::Amount;
use borsh::{BorshDeserialize, BorshSchema, BorshSerialize};
use serde::{Deserialize, Serialize};
pub use store::{ParamStore, ParamValue};
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("Proposal value is out of range")]
    InvalidValue,
}

/// The tunable protocol constants.
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
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum ParamKind {
    /// Required governor collateral.
    Collateral = 1,
    /// Budget proposal listing fee.
    BudgetFee = 2,
    /// The per-opcode gas cost table.
    GasSchedule = 3,
    /// Block size limit in bytes.
    BlockSize = 4,
    /// Minimum gas price in base units.
    MinGasPrice = 5,
    /// Block gas limit.
    BlockGasLimit = 6,
}

impl ParamKind {
    /// All parameter kinds, in wire order. The zero discriminant is
    /// reserved for "no proposal" on the wire.
    pub const ALL: [ParamKind; 6] = [
        ParamKind::Collateral,
        ParamKind::BudgetFee,
        ParamKind::GasSchedule,
        ParamKind::BlockSize,
        ParamKind::MinGasPrice,
        ParamKind::BlockGasLimit,
    ];

    /// Decode a kind from its wire discriminant.
    pub fn from_u64(raw: u64) -> Option<Self> {
        match raw {
            1 => Some(ParamKind::Collateral),
            2 => Some(ParamKind::BudgetFee),
            3 => Some(ParamKind::GasSchedule),
            4 => Some(ParamKind::BlockSize),
            5 => Some(ParamKind::MinGasPrice),
            6 => Some(ParamKind::BlockGasLimit),
            _ => None,
        }
    }

    /// The genesis holder address for this kind.
    pub fn genesis_holder(&self) -> Address {
        Address::internal(*self as u8)
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamKind::GasSchedule => "gas-schedule",
            ParamKind::BlockSize => "block-size",
            ParamKind::MinGasPrice => "min-gas-price",
            ParamKind::BlockGasLimit => "block-gas-limit",
            ParamKind::Collateral => "collateral",
            ParamKind::BudgetFee => "budget-fee",
        };
        write!(f, "{name}")
    }
}

/// The full set of parameter holders, with one active holder per kind.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct ProtocolParams {
    /// Every registered holder, keyed by its address.
    holders: BTreeMap<Address, ParamStore>,
    /// The active holder address per parameter kind.
    active: BTreeMap<ParamKind, Address>,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self::genesis()
    }
}

impl ProtocolParams {
    /// The genesis parameter set: one internal holder per kind, each at its
    /// default value.
    pub fn genesis() -> Self {
        let mut params = Self {
            holders: BTreeMap::new(),
            active: BTreeMap::new(),
        };
        for kind in ParamKind::ALL {
            let value = match kind {
                ParamKind::GasSchedule => {
                    ParamValue::Schedule(store::DEFAULT_GAS_SCHEDULE.to_vec())
                }
                ParamKind::BlockSize => {
                    ParamValue::Scalar(store::DEFAULT_BLOCK_SIZE)
                }
                ParamKind::MinGasPrice => {
                    ParamValue::Scalar(store::DEFAULT_MIN_GAS_PRICE)
                }
                ParamKind::BlockGasLimit => {
                    ParamValue::Scalar(store::DEFAULT_BLOCK_GAS_LIMIT)
                }
                ParamKind::Collateral => {
                    ParamValue::Amount(store::DEFAULT_COLLATERAL)
                }
                ParamKind::BudgetFee => {
                    ParamValue::Amount(store::DEFAULT_BUDGET_FEE)
                }
            };
            let holder = ParamStore::new(kind, kind.genesis_holder(), value)
                .expect("Genesis parameter defaults must be in range");
            params.active.insert(kind, holder.address);
            params.holders.insert(holder.address, holder);
        }
        params
    }

    /// Register a replacement holder so governance can later activate it.
    /// Registration does not change the active holder.
    pub fn register_holder(
        &mut self,
        holder: ParamStore,
    ) -> Result<(), ParamError> {
        store::validate(holder.kind, &holder.value)?;
        tracing::debug!(
            kind = %holder.kind,
            address = %holder.address,
            "Registered parameter holder"
        );
        self.holders.insert(holder.address, holder);
        Ok(())
    }

    /// Whether `address` is a registered holder for `kind`.
    pub fn is_registered(&self, kind: ParamKind, address: &Address) -> bool {
        self.holders
            .get(address)
            .map(|holder| holder.kind == kind)
            .unwrap_or_default()
    }

    /// The value currently governing `kind`.
    pub fn get(&self, kind: ParamKind) -> &ParamValue {
        let address = self
            .active
            .get(&kind)
            .expect("Every parameter kind has an active holder");
        &self
            .holders
            .get(address)
            .expect("Active holder addresses are always registered")
            .value
    }

    /// Write a new value into the active holder for `kind`.
    pub fn set_value(
        &mut self,
        kind: ParamKind,
        value: ParamValue,
    ) -> Result<(), ParamError> {
        let address = *self
            .active
            .get(&kind)
            .expect("Every parameter kind has an active holder");
        let holder = self
            .holders
            .get_mut(&address)
            .expect("Active holder addresses are always registered");
        holder.set(value)?;
        tracing::info!(kind = %kind, value = %holder.value, "Parameter updated");
        Ok(())
    }

    /// Make a previously registered holder the active one for `kind`.
    pub fn swap_holder(
        &mut self,
        kind: ParamKind,
        address: Address,
    ) -> Result<(), ParamError> {
        if !self.is_registered(kind, &address) {
            return Err(ParamError::InvalidValue);
        }
        self.active.insert(kind, address);
        tracing::info!(kind = %kind, address = %address, "Parameter holder swapped");
        Ok(())
    }

    /// The address of the active holder for `kind`.
    pub fn active_holder(&self, kind: ParamKind) -> Address {
        *self
            .active
            .get(&kind)
            .expect("Every parameter kind has an active holder")
    }

    /// The gas cost table.
    pub fn gas_schedule(&self) -> &[u64] {
        match self.get(ParamKind::GasSchedule) {
            ParamValue::Schedule(costs) => costs,
            _ => unreachable!("Holder values are validated against their kind"),
        }
    }

    /// The block size limit in bytes.
    pub fn block_size(&self) -> u64 {
        self.scalar(ParamKind::BlockSize)
    }

    /// The minimum gas price.
    pub fn min_gas_price(&self) -> u64 {
        self.scalar(ParamKind::MinGasPrice)
    }

    /// The block gas limit.
    pub fn block_gas_limit(&self) -> u64 {
        self.scalar(ParamKind::BlockGasLimit)
    }

    /// The required governor collateral.
    pub fn collateral(&self) -> Amount {
        self.amount(ParamKind::Collateral)
    }

    /// The budget proposal listing fee.
    pub fn budget_fee(&self) -> Amount {
        self.amount(ParamKind::BudgetFee)
    }

    fn scalar(&self, kind: ParamKind) -> u64 {
        match self.get(kind) {
            ParamValue::Scalar(value) => *value,
            _ => unreachable!("Holder values are validated against their kind"),
        }
    }

    fn amount(&self, kind: ParamKind) -> Amount {
        match self.get(kind) {
            ParamValue::Amount(amount) => *amount,
            _ => unreachable!("Holder values are validated against their kind"),
        }
    }
}
