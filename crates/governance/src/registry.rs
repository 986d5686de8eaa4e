//! Governor registry: membership, collateral accounting, liveness and
//! reward distribution.
//!
//! Governors live in a dense append-only address list plus an address-keyed
//! map, so removal is a swap with the last entry and an index fixup. A
//! record exists in the map iff its collateral is nonzero; full removal
//! drops the record, which is indistinguishable from never having enrolled.

use std::collections::BTreeMap;

use agora_core::address::Address;
use agora_core::chain::BlockHeight;
use agora_core::token::Amount;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A staked governor record.
#[derive(
    Debug,
    Default,
    Clone,
    PartialEq,
    Eq,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct Governor {
    /// Height of first successful enrollment; zero means "not a governor".
    pub enrolled_height: BlockHeight,
    /// Height of the last successful liveness ping.
    pub last_ping_height: BlockHeight,
    /// Staked collateral in base units.
    pub collateral: Amount,
    /// Height of the last reward paid to this governor; zero if never.
    pub last_reward_height: BlockHeight,
    /// Position in the dense governor list.
    pub list_index: u64,
}

/// Fixed registry scheduling parameters.
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
pub struct RegistryConfig {
    /// Governor count below which proposal voting is disabled.
    pub minimum_governors: u64,
    /// Blocks within which a governor must have pinged to stay eligible.
    pub ping_interval: u64,
    /// Minimum blocks between two rewards to the same governor.
    pub reward_interval: u64,
    /// Blocks since enrollment before a governor becomes eligible.
    pub maturity_blocks: u64,
    /// Blocks since the last ping after which a governor is removable.
    pub inactivity_blocks: u64,
    /// Cap on a single attached reward payment.
    pub max_reward: Amount,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            minimum_governors: 100,
            ping_interval: 28_800,
            reward_interval: 2_000,
            maturity_blocks: 15,
            inactivity_blocks: 28_800,
            max_reward: Amount::native_whole(1),
        }
    }
}

/// The governor registry.
#[derive(
    Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct GovernorRegistry {
    config: RegistryConfig,
    required_collateral: Amount,
    balance: Amount,
    governors: BTreeMap<Address, Governor>,
    list: Vec<Address>,
    last_global_reward_height: BlockHeight,
}

impl GovernorRegistry {
    /// A registry with no governors.
    pub fn new(config: RegistryConfig, required_collateral: Amount) -> Self {
        Self {
            config,
            required_collateral,
            balance: Amount::zero(),
            governors: BTreeMap::new(),
            list: Vec::new(),
            last_global_reward_height: BlockHeight::zero(),
        }
    }

    /// The registry scheduling parameters.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Collateral currently required of every governor.
    pub fn required_collateral(&self) -> Amount {
        self.required_collateral
    }

    /// Replace the required collateral. Called when a collateral proposal
    /// passes; existing governors must top up or shed the difference via
    /// `enroll`/`unenroll(false)` before they count as valid again.
    pub fn set_required_collateral(&mut self, amount: Amount) {
        tracing::info!(
            old = %self.required_collateral,
            new = %amount,
            "Required collateral changed"
        );
        self.required_collateral = amount;
    }

    /// Total collateral held by the registry.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Number of enrolled governors.
    pub fn governor_count(&self) -> u64 {
        self.list.len() as u64
    }

    /// Look up a governor record.
    pub fn governor(&self, address: &Address) -> Option<&Governor> {
        self.governors.get(address)
    }

    /// The dense governor address list, in list order.
    pub fn governor_list(&self) -> &[Address] {
        &self.list
    }

    /// Whether `address` is enrolled at all.
    pub fn is_enrolled(&self, address: &Address) -> bool {
        self.governors.contains_key(address)
    }

    /// Whether `address` is eligible to vote and win rewards at `height`:
    /// enrolled with exactly the required collateral, mature, and pinged
    /// within the ping interval.
    pub fn is_valid_governor(
        &self,
        address: &Address,
        height: BlockHeight,
    ) -> bool {
        let Some(governor) = self.governors.get(address) else {
            return false;
        };
        if governor.collateral != self.required_collateral {
            return false;
        }
        let Some(age) = height.blocks_since(governor.enrolled_height) else {
            return false;
        };
        if age < self.config.maturity_blocks {
            return false;
        }
        let Some(ping_age) = height.blocks_since(governor.last_ping_height)
        else {
            return false;
        };
        ping_age <= self.config.ping_interval
    }

    /// Enroll the caller as a governor, or top an existing governor's
    /// collateral up to a changed requirement. The attached amount must land
    /// exactly on the required collateral. Returns `true` for a fresh
    /// enrollment.
    pub fn enroll(
        &mut self,
        caller: Address,
        attached: Amount,
        height: BlockHeight,
    ) -> Result<bool> {
        if attached.is_zero() && !self.is_enrolled(&caller) {
            return Err(Error::CollateralRequired);
        }
        match self.governors.get_mut(&caller) {
            Some(governor) => {
                let total = governor
                    .collateral
                    .checked_add(attached)
                    .ok_or(Error::Overflow)?;
                if total != self.required_collateral {
                    return Err(Error::CollateralMismatch);
                }
                governor.collateral = total;
                self.balance = self
                    .balance
                    .checked_add(attached)
                    .ok_or(Error::Overflow)?;
                tracing::debug!(
                    governor = %caller,
                    collateral = %total,
                    "Governor topped up collateral"
                );
                Ok(false)
            }
            None => {
                if attached != self.required_collateral {
                    return Err(Error::CollateralMismatch);
                }
                let governor = Governor {
                    enrolled_height: height,
                    last_ping_height: height,
                    collateral: attached,
                    last_reward_height: BlockHeight::zero(),
                    list_index: self.list.len() as u64,
                };
                self.governors.insert(caller, governor);
                self.list.push(caller);
                self.balance = self
                    .balance
                    .checked_add(attached)
                    .ok_or(Error::Overflow)?;
                tracing::info!(governor = %caller, %height, "Governor enrolled");
                Ok(true)
            }
        }
    }

    /// Refund collateral to the caller. With `full`, the entire stake is
    /// refunded and the governor is removed; otherwise only the excess above
    /// the current requirement is refunded and the governor stays enrolled.
    /// Returns the refunded amount.
    pub fn unenroll(&mut self, caller: Address, full: bool) -> Result<Amount> {
        if !self.is_enrolled(&caller) {
            return Err(Error::NotGovernor);
        }
        let refund = if full {
            let governor = self.swap_remove(&caller);
            tracing::info!(governor = %caller, "Governor unenrolled");
            governor.collateral
        } else {
            let required = self.required_collateral;
            let governor = self
                .governors
                .get_mut(&caller)
                .expect("Enrollment was just checked");
            let excess = governor
                .collateral
                .checked_sub(required)
                .unwrap_or_default();
            governor.collateral = governor
                .collateral
                .checked_sub(excess)
                .expect("Excess never exceeds the stake");
            excess
        };
        self.balance =
            self.balance.checked_sub(refund).ok_or(Error::Overflow)?;
        Ok(refund)
    }

    /// Record a liveness ping. Any enrolled governor may ping; neither
    /// maturity nor an exact stake is required, those only gate validity.
    pub fn ping(&mut self, caller: Address, height: BlockHeight) -> Result<()> {
        let governor = self
            .governors
            .get_mut(&caller)
            .ok_or(Error::NotValidGovernor)?;
        governor.last_ping_height = height;
        tracing::debug!(governor = %caller, %height, "Governor pinged");
        Ok(())
    }

    /// The governor that would win the next reward: among valid governors,
    /// the least recently rewarded, ties broken by list position.
    pub fn current_winner(&self, height: BlockHeight) -> Option<Address> {
        self.list
            .iter()
            .enumerate()
            .filter(|(_, address)| self.is_valid_governor(address, height))
            .min_by_key(|(index, address)| {
                let governor = &self.governors[*address];
                (governor.last_reward_height, *index)
            })
            .map(|(_, address)| *address)
    }

    /// Pay the attached amount to the current winner. At most one reward
    /// may be paid per block, and a governor may not win twice within the
    /// reward interval.
    pub fn reward_governor(
        &mut self,
        expected_winner: Option<Address>,
        attached: Amount,
        height: BlockHeight,
    ) -> Result<Address> {
        if attached > self.config.max_reward {
            return Err(Error::RewardTooHigh);
        }
        if !self.last_global_reward_height.is_zero()
            && self.last_global_reward_height == height
        {
            return Err(Error::AlreadyRewardedThisBlock);
        }
        let winner = self.current_winner(height).ok_or(Error::NoWinner)?;
        if let Some(expected) = expected_winner {
            if expected != winner {
                return Err(Error::NoWinner);
            }
        }
        let reward_interval = self.config.reward_interval;
        let governor = self
            .governors
            .get_mut(&winner)
            .expect("The winner is always an enrolled governor");
        if !governor.last_reward_height.is_zero() {
            let since = height
                .blocks_since(governor.last_reward_height)
                .ok_or(Error::Overflow)?;
            if since < reward_interval {
                return Err(Error::LastRewardTooRecent);
            }
        }
        governor.last_reward_height = height;
        self.last_global_reward_height = height;
        tracing::info!(
            governor = %winner,
            amount = %attached,
            %height,
            "Governor rewarded"
        );
        Ok(winner)
    }

    /// Remove the first listed governor that has not pinged within the
    /// inactivity window, refunding its stake. Callable by anyone; finding
    /// nothing to remove is not an error.
    pub fn remove_inactive_governor(
        &mut self,
        height: BlockHeight,
    ) -> Result<Option<(Address, Amount)>> {
        let inactive = self.list.iter().copied().find(|address| {
            let governor = &self.governors[address];
            height
                .blocks_since(governor.last_ping_height)
                .is_some_and(|age| age >= self.config.inactivity_blocks)
        });
        let Some(address) = inactive else {
            return Ok(None);
        };
        let governor = self.swap_remove(&address);
        self.balance = self
            .balance
            .checked_sub(governor.collateral)
            .ok_or(Error::Overflow)?;
        tracing::info!(
            governor = %address,
            %height,
            "Inactive governor removed"
        );
        Ok(Some((address, governor.collateral)))
    }

    /// Remove a governor in O(1): swap with the last list entry, fix the
    /// moved entry's index, truncate.
    fn swap_remove(&mut self, address: &Address) -> Governor {
        let governor = self
            .governors
            .remove(address)
            .expect("Caller checks enrollment before removal");
        let index = governor.list_index as usize;
        let last = self.list.len().saturating_sub(1);
        self.list.swap(index, last);
        self.list.pop();
        if let Some(moved) = self.list.get(index) {
            self.governors
                .get_mut(moved)
                .expect("Listed addresses are always enrolled")
                .list_index = index as u64;
        }
        governor
    }
}

#[cfg(any(test, feature = "testing"))]
/// Testing helpers for the registry
pub mod testing {
    use super::*;

    /// The scheduling profile used by the development chain.
    pub fn dev_config() -> RegistryConfig {
        RegistryConfig {
            minimum_governors: 3,
            ping_interval: 40,
            reward_interval: 100,
            maturity_blocks: 10,
            inactivity_blocks: 40,
            max_reward: Amount::native_whole(1),
        }
    }

    /// A registry on the dev profile with the default 10 coin collateral.
    pub fn dev_registry() -> GovernorRegistry {
        GovernorRegistry::new(dev_config(), Amount::native_whole(10))
    }
}
