//! The budget treasury.
//!
//! Anyone may list a spending proposal for a fee, and anyone may donate to
//! the treasury. Valid governors vote on listed proposals, and a
//! permissionless settlement at the end of each budget period pays every
//! net-approved proposal it can afford, evicts rejected and expired ones,
//! and burns whatever is left.

use std::collections::BTreeMap;

use agora_core::address::Address;
use agora_core::arith::checked;
use agora_core::chain::BlockHeight;
use agora_core::token::Amount;
use borsh::{BorshDeserialize, BorshSerialize};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::registry::GovernorRegistry;

/// A governor's ballot on a budget proposal.
///
/// The zero discriminant is reserved for "has not voted" in the wire
/// encoding of vote queries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum BudgetVote {
    /// Counted for quorum purposes only.
    Abstain = 1,
    /// Against funding.
    No = 2,
    /// For funding.
    Yes = 3,
}

impl TryFrom<u64> for BudgetVote {
    type Error = Error;

    fn try_from(raw: u64) -> Result<Self> {
        match raw {
            1 => Ok(BudgetVote::Abstain),
            2 => Ok(BudgetVote::No),
            3 => Ok(BudgetVote::Yes),
            _ => Err(Error::InvalidArguments),
        }
    }
}

/// A listed budget proposal.
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
pub struct BudgetProposal {
    /// Stable identifier; ids start at 1 and are never reused.
    pub id: u64,
    /// The account paid when the proposal is funded.
    pub owner: Address,
    /// Short human-readable title.
    pub title: String,
    /// Longer free-form description.
    pub description: String,
    /// Off-chain reference.
    pub url: String,
    /// Payout requested per budget period.
    pub requested: Amount,
    /// Budget periods left to pay.
    pub remaining_periods: u64,
    /// Height past which an unfunded proposal is evicted.
    pub deadline_height: BlockHeight,
    /// Whether the proposal has ever been paid.
    pub funded: bool,
    /// Yes ballots.
    pub yes_count: u64,
    /// No ballots.
    pub no_count: u64,
    /// Abstain ballots.
    pub abstain_count: u64,
    ballots: BTreeMap<Address, BudgetVote>,
}

impl BudgetProposal {
    /// The ballot `governor` has cast, if any.
    pub fn ballot(&self, governor: &Address) -> Option<BudgetVote> {
        self.ballots.get(governor).copied()
    }

    /// Total ballots cast.
    pub fn ballot_count(&self) -> u64 {
        self.ballots.len() as u64
    }

    fn count_mut(&mut self, vote: BudgetVote) -> &mut u64 {
        match vote {
            BudgetVote::Abstain => &mut self.abstain_count,
            BudgetVote::No => &mut self.no_count,
            BudgetVote::Yes => &mut self.yes_count,
        }
    }
}

/// A single payout produced by settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// The proposal that was funded.
    pub proposal_id: u64,
    /// The account to pay.
    pub owner: Address,
    /// The amount paid for this period.
    pub amount: Amount,
}

/// What a settlement did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Payouts in ascending proposal id order.
    pub payouts: Vec<Payout>,
    /// Ids evicted this settlement.
    pub removed: Vec<u64>,
    /// The leftover treasury balance, burned.
    pub burned: Amount,
}

/// The budget treasury and proposal book.
#[derive(
    Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct BudgetAllocator {
    balance: Amount,
    period_blocks: u64,
    next_id: u64,
    proposals: Vec<BudgetProposal>,
    index: BTreeMap<u64, u64>,
}

impl BudgetAllocator {
    /// An empty treasury.
    pub fn new(period_blocks: u64) -> Self {
        Self {
            balance: Amount::zero(),
            period_blocks,
            next_id: 1,
            proposals: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// The treasury balance, listing fees included.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// The number of blocks in a budget period.
    pub fn period_blocks(&self) -> u64 {
        self.period_blocks
    }

    /// All live proposals, in book order.
    pub fn proposals(&self) -> &[BudgetProposal] {
        &self.proposals
    }

    /// Look up a live proposal by id.
    pub fn proposal(&self, id: u64) -> Option<&BudgetProposal> {
        self.index
            .get(&id)
            .map(|pos| &self.proposals[*pos as usize])
    }

    /// Position of a proposal in the book, or `-1` once it is gone.
    pub fn proposal_index(&self, id: u64) -> i64 {
        self.index
            .get(&id)
            .map(|pos| *pos as i64)
            .unwrap_or(-1)
    }

    /// Donate to the treasury.
    pub fn fund(&mut self, attached: Amount) -> Result<()> {
        self.balance =
            self.balance.checked_add(attached).ok_or(Error::Overflow)?;
        tracing::debug!(amount = %attached, "Treasury funded");
        Ok(())
    }

    /// List a proposal requesting `requested` per period over
    /// `duration_periods` periods. The attached amount must cover the
    /// listing fee; everything attached is kept by the treasury. Returns
    /// the new proposal's id.
    #[allow(clippy::too_many_arguments)]
    pub fn start_proposal(
        &mut self,
        owner: Address,
        attached: Amount,
        fee: Amount,
        title: String,
        description: String,
        url: String,
        requested: Amount,
        duration_periods: u64,
        height: BlockHeight,
    ) -> Result<u64> {
        if attached < fee {
            return Err(Error::FeeRequired);
        }
        if requested.is_zero() || duration_periods == 0 {
            return Err(Error::InvalidArguments);
        }
        self.balance =
            self.balance.checked_add(attached).ok_or(Error::Overflow)?;
        let id = self.next_id;
        self.next_id = checked!(id + 1)?;
        let deadline_height =
            height.plus(checked!(duration_periods * self.period_blocks)?)?;
        let proposal = BudgetProposal {
            id,
            owner,
            title,
            description,
            url,
            requested,
            remaining_periods: duration_periods,
            deadline_height,
            funded: false,
            yes_count: 0,
            no_count: 0,
            abstain_count: 0,
            ballots: BTreeMap::new(),
        };
        self.index.insert(id, self.proposals.len() as u64);
        self.proposals.push(proposal);
        tracing::info!(
            id,
            owner = %owner,
            requested = %requested,
            periods = duration_periods,
            "Budget proposal listed"
        );
        Ok(id)
    }

    /// Cast or change a ballot. A governor's previous ballot on the same
    /// proposal is replaced, not stacked.
    pub fn vote_for_proposal(
        &mut self,
        caller: Address,
        id: u64,
        vote: BudgetVote,
        height: BlockHeight,
        registry: &GovernorRegistry,
    ) -> Result<()> {
        if !registry.is_enrolled(&caller) {
            return Err(Error::NotGovernor);
        }
        if !registry.is_valid_governor(&caller, height) {
            return Err(Error::NotValidGovernor);
        }
        let pos = *self.index.get(&id).ok_or(Error::ProposalNotFound)?;
        let proposal = &mut self.proposals[pos as usize];
        if let Some(previous) = proposal.ballots.insert(caller, vote) {
            let count = proposal.count_mut(previous);
            *count = count.saturating_sub(1);
        }
        let count = proposal.count_mut(vote);
        *count = count.checked_add(1).ok_or(Error::Overflow)?;
        tracing::debug!(id, governor = %caller, ?vote, "Budget ballot cast");
        Ok(())
    }

    /// The caller's ballot on `id` as its wire discriminant, `0` when no
    /// ballot has been cast.
    pub fn vote_status(&self, id: u64, caller: &Address) -> Result<u64> {
        let proposal = self.proposal(id).ok_or(Error::ProposalNotFound)?;
        Ok(proposal.ballot(caller).map(|vote| vote as u64).unwrap_or(0))
    }

    /// Settle the current budget period.
    ///
    /// In ascending id order: proposals without strictly more yes than no
    /// ballots are evicted; unfunded proposals past their deadline are
    /// evicted; the rest are paid their request while the balance covers
    /// it, and drop off the book once their last period is paid. Whatever
    /// balance remains afterwards is burned. Settlement is permissionless.
    pub fn settle(&mut self, height: BlockHeight) -> Result<Settlement> {
        let mut settlement = Settlement::default();
        let ids = self.index.keys().copied().collect_vec();
        for id in ids {
            let pos = *self
                .index
                .get(&id)
                .expect("Settlement only visits live ids");
            let proposal = &mut self.proposals[pos as usize];
            if proposal.no_count >= proposal.yes_count {
                self.remove(id);
                settlement.removed.push(id);
                continue;
            }
            if !proposal.funded && height >= proposal.deadline_height {
                self.remove(id);
                settlement.removed.push(id);
                continue;
            }
            let Some(rest) = self.balance.checked_sub(proposal.requested)
            else {
                // approved but unaffordable this period; stays on the book
                continue;
            };
            self.balance = rest;
            proposal.funded = true;
            proposal.remaining_periods =
                proposal.remaining_periods.saturating_sub(1);
            settlement.payouts.push(Payout {
                proposal_id: id,
                owner: proposal.owner,
                amount: proposal.requested,
            });
            if proposal.remaining_periods == 0 {
                self.remove(id);
                settlement.removed.push(id);
            }
        }
        settlement.burned = self.balance;
        self.balance = Amount::zero();
        tracing::info!(
            %height,
            payouts = settlement.payouts.len(),
            removed = settlement.removed.len(),
            burned = %settlement.burned,
            "Budget settled"
        );
        Ok(settlement)
    }

    /// Drop a proposal from the book in O(1), keeping the index map in
    /// step with the swapped-in entry.
    fn remove(&mut self, id: u64) {
        let pos = self
            .index
            .remove(&id)
            .expect("Removal is only requested for live ids") as usize;
        self.proposals.swap_remove(pos);
        if let Some(moved) = self.proposals.get(pos) {
            self.index.insert(moved.id, pos as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use agora_core::address::testing::{
        arb_address, established_address_n,
    };
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    use super::*;
    use crate::registry::testing::dev_registry;

    const PERIOD: u64 = 100;
    const FEE: Amount = Amount::native_whole(1);

    fn governors(count: u8) -> GovernorRegistry {
        let mut registry = dev_registry();
        for n in 1..=count {
            registry
                .enroll(
                    established_address_n(n),
                    Amount::native_whole(10),
                    BlockHeight(1),
                )
                .unwrap();
        }
        registry
    }

    fn list(
        allocator: &mut BudgetAllocator,
        owner: Address,
        requested: Amount,
        periods: u64,
    ) -> u64 {
        allocator
            .start_proposal(
                owner,
                FEE,
                FEE,
                "title".into(),
                "description".into(),
                "https://example.org".into(),
                requested,
                periods,
                BlockHeight(15),
            )
            .unwrap()
    }

    fn approve(
        allocator: &mut BudgetAllocator,
        registry: &GovernorRegistry,
        id: u64,
        voters: std::ops::RangeInclusive<u8>,
    ) {
        for n in voters {
            allocator
                .vote_for_proposal(
                    established_address_n(n),
                    id,
                    BudgetVote::Yes,
                    BlockHeight(15),
                    registry,
                )
                .unwrap();
        }
    }

    #[test]
    fn test_listing_requires_fee() {
        let mut allocator = BudgetAllocator::new(PERIOD);
        let owner = established_address_n(9);
        assert_matches!(
            allocator.start_proposal(
                owner,
                Amount::from_u64(FEE.raw() - 1),
                FEE,
                "t".into(),
                "d".into(),
                "u".into(),
                Amount::native_whole(5),
                1,
                BlockHeight(15),
            ),
            Err(Error::FeeRequired)
        );
        assert_eq!(allocator.balance(), Amount::zero());

        let id = list(&mut allocator, owner, Amount::native_whole(5), 1);
        assert_eq!(id, 1);
        // the listing fee stays in the treasury
        assert_eq!(allocator.balance(), FEE);
        assert_eq!(allocator.proposal_index(1), 0);
        assert_eq!(allocator.proposal_index(2), -1);
    }

    #[test]
    fn test_only_valid_governors_vote() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let id = list(
            &mut allocator,
            established_address_n(9),
            Amount::native_whole(5),
            1,
        );
        assert_matches!(
            allocator.vote_for_proposal(
                established_address_n(9),
                id,
                BudgetVote::Yes,
                BlockHeight(15),
                &registry,
            ),
            Err(Error::NotGovernor)
        );
        // enrolled but immature
        assert_matches!(
            allocator.vote_for_proposal(
                established_address_n(1),
                id,
                BudgetVote::Yes,
                BlockHeight(5),
                &registry,
            ),
            Err(Error::NotValidGovernor)
        );
        assert_matches!(
            allocator.vote_for_proposal(
                established_address_n(1),
                77,
                BudgetVote::Yes,
                BlockHeight(15),
                &registry,
            ),
            Err(Error::ProposalNotFound)
        );
    }

    #[test]
    fn test_ballot_replacement() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let id = list(
            &mut allocator,
            established_address_n(9),
            Amount::native_whole(5),
            1,
        );
        let voter = established_address_n(1);
        for vote in [BudgetVote::Abstain, BudgetVote::No, BudgetVote::Yes] {
            allocator
                .vote_for_proposal(voter, id, vote, BlockHeight(15), &registry)
                .unwrap();
        }
        let proposal = allocator.proposal(id).unwrap();
        assert_eq!(proposal.ballot_count(), 1);
        assert_eq!(proposal.abstain_count, 0);
        assert_eq!(proposal.no_count, 0);
        assert_eq!(proposal.yes_count, 1);
        assert_eq!(allocator.vote_status(id, &voter), Ok(3));
        assert_eq!(
            allocator.vote_status(id, &established_address_n(2)),
            Ok(0)
        );
    }

    #[test]
    fn test_settle_funds_approved_proposal() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let owner = established_address_n(9);
        let id = list(&mut allocator, owner, Amount::native_whole(5), 1);
        allocator.fund(Amount::native_whole(20)).unwrap();
        approve(&mut allocator, &registry, id, 1..=2);

        let settlement = allocator.settle(BlockHeight(100)).unwrap();
        assert_eq!(
            settlement.payouts,
            vec![Payout {
                proposal_id: id,
                owner,
                amount: Amount::native_whole(5),
            }]
        );
        // single-period proposal drops off after its payout
        assert_eq!(settlement.removed, vec![id]);
        // fee (1) + donation (20) - payout (5) burned
        assert_eq!(settlement.burned, Amount::native_whole(16));
        assert_eq!(allocator.balance(), Amount::zero());
        assert_eq!(allocator.proposal_index(id), -1);
    }

    #[test]
    fn test_settle_evicts_rejected_proposal() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let id = list(
            &mut allocator,
            established_address_n(9),
            Amount::native_whole(5),
            1,
        );
        allocator.fund(Amount::native_whole(20)).unwrap();
        allocator
            .vote_for_proposal(
                established_address_n(1),
                id,
                BudgetVote::Yes,
                BlockHeight(15),
                &registry,
            )
            .unwrap();
        allocator
            .vote_for_proposal(
                established_address_n(2),
                id,
                BudgetVote::No,
                BlockHeight(15),
                &registry,
            )
            .unwrap();

        // a yes/no tie does not carry
        let settlement = allocator.settle(BlockHeight(100)).unwrap();
        assert_eq!(settlement.payouts, vec![]);
        assert_eq!(settlement.removed, vec![id]);
        assert_eq!(settlement.burned, Amount::native_whole(21));
    }

    #[test]
    fn test_multi_period_proposal_survives_funding() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let owner = established_address_n(9);
        let id = list(&mut allocator, owner, Amount::native_whole(5), 2);
        approve(&mut allocator, &registry, id, 1..=2);

        allocator.fund(Amount::native_whole(5)).unwrap();
        let settlement = allocator.settle(BlockHeight(100)).unwrap();
        assert_eq!(settlement.payouts.len(), 1);
        assert_eq!(settlement.removed, Vec::<u64>::new());
        let proposal = allocator.proposal(id).unwrap();
        assert_eq!(proposal.remaining_periods, 1);
        assert!(proposal.funded);

        allocator.fund(Amount::native_whole(5)).unwrap();
        let settlement = allocator.settle(BlockHeight(200)).unwrap();
        assert_eq!(settlement.removed, vec![id]);
        assert_eq!(allocator.proposal(id), None);
    }

    #[test]
    fn test_unfunded_proposal_expires_at_deadline() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let id = list(
            &mut allocator,
            established_address_n(9),
            Amount::native_whole(50),
            1,
        );
        approve(&mut allocator, &registry, id, 1..=2);

        // approved but the treasury cannot cover it: stays pending
        let settlement = allocator.settle(BlockHeight(50)).unwrap();
        assert_eq!(settlement.payouts, vec![]);
        assert_eq!(settlement.removed, Vec::<u64>::new());
        assert!(allocator.proposal(id).is_some());

        // deadline passes without a payout ever happening
        let settlement = allocator.settle(BlockHeight(115)).unwrap();
        assert_eq!(settlement.removed, vec![id]);
    }

    #[test]
    fn test_settle_fund_one_pend_one_evict_one() {
        let registry = governors(3);
        let mut allocator = BudgetAllocator::new(PERIOD);
        let funded_owner = established_address_n(7);
        let funded = list(&mut allocator, funded_owner, Amount::native_whole(5), 1);
        let pending =
            list(&mut allocator, established_address_n(8), Amount::native_whole(50), 2);
        let rejected =
            list(&mut allocator, established_address_n(9), Amount::native_whole(5), 1);
        approve(&mut allocator, &registry, funded, 1..=2);
        approve(&mut allocator, &registry, pending, 1..=2);
        allocator
            .vote_for_proposal(
                established_address_n(1),
                rejected,
                BudgetVote::No,
                BlockHeight(15),
                &registry,
            )
            .unwrap();
        allocator.fund(Amount::native_whole(10)).unwrap();

        let settlement = allocator.settle(BlockHeight(100)).unwrap();
        assert_eq!(settlement.payouts.len(), 1);
        assert_eq!(settlement.payouts[0].proposal_id, funded);
        assert_eq!(settlement.removed, vec![funded, rejected]);
        // the pending proposal is the only survivor and was compacted
        assert_eq!(allocator.proposals().len(), 1);
        assert_eq!(allocator.proposal_index(pending), 0);
        assert_eq!(allocator.proposal_index(funded), -1);
        assert_eq!(allocator.proposal_index(rejected), -1);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut allocator = BudgetAllocator::new(PERIOD);
        let owner = established_address_n(9);
        let first = list(&mut allocator, owner, Amount::native_whole(5), 1);
        allocator.settle(BlockHeight(200)).unwrap();
        let second = list(&mut allocator, owner, Amount::native_whole(5), 1);
        assert_eq!((first, second), (1, 2));
    }

    proptest! {
        /// Per-choice tallies always sum to the number of distinct ballots,
        /// no matter how governors change their votes.
        #[test]
        fn test_tallies_match_ballots(
            votes in proptest::collection::vec(
                (arb_address(), 1u64..=3),
                1..50,
            )
        ) {
            let mut registry = dev_registry();
            let mut allocator = BudgetAllocator::new(PERIOD);
            let id = list(
                &mut allocator,
                established_address_n(9),
                Amount::native_whole(5),
                1,
            );
            for (addr, raw) in votes {
                let _ = registry.enroll(
                    addr,
                    Amount::native_whole(10),
                    BlockHeight(1),
                );
                let vote = BudgetVote::try_from(raw).unwrap();
                let _ = allocator.vote_for_proposal(
                    addr,
                    id,
                    vote,
                    BlockHeight(15),
                    &registry,
                );
                let proposal = allocator.proposal(id).unwrap();
                let total = proposal.yes_count
                    + proposal.no_count
                    + proposal.abstain_count;
                prop_assert_eq!(total, proposal.ballot_count());
                prop_assert!(
                    proposal.ballot_count() <= registry.governor_count()
                );
            }
        }
    }
}
