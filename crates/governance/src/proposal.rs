//! Parameter change proposals.
//!
//! At most one proposal round is open at a time. A round is opened by the
//! first vote for a change, collects identical votes from other valid
//! governors, and applies the change as soon as a strict majority of the
//! current governor set has voted for it. A round that outlives the expiry
//! window is discarded, and the next differing vote opens a fresh round in
//! its place.

use std::collections::BTreeSet;

use agora_core::address::Address;
use agora_core::arith::checked;
use agora_core::chain::BlockHeight;
use agora_parameters::{store, ParamKind, ParamValue, ProtocolParams};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::registry::GovernorRegistry;

/// What a proposal round wants to change.
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
pub enum ProposalPayload {
    /// Write a new value into the active holder.
    Value(ParamValue),
    /// Activate a different registered holder.
    Holder(Address),
}

/// An open proposal round.
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
pub struct OpenRound {
    /// The parameter under vote.
    pub kind: ParamKind,
    /// The proposed change.
    pub payload: ProposalPayload,
    /// Height at which the round was opened.
    pub opened_height: BlockHeight,
    /// Governors that have voted for the change.
    pub voters: BTreeSet<Address>,
}

/// How a vote landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote opened a new round. If `expired` holds the previous round,
    /// that round outlived its window and was discarded first.
    Opened { expired: Option<OpenRound> },
    /// The vote joined the open round without deciding it.
    Voted {
        /// Votes collected so far, the caller's included.
        votes: u64,
    },
    /// The vote completed a majority and the change was applied.
    Passed,
}

/// The single-slot proposal engine.
#[derive(
    Debug, Clone, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct ProposalEngine {
    round: Option<OpenRound>,
    expiry_blocks: u64,
}

impl ProposalEngine {
    /// An engine with no open round.
    pub fn new(expiry_blocks: u64) -> Self {
        Self {
            round: None,
            expiry_blocks,
        }
    }

    /// The currently open round, if any.
    pub fn round(&self) -> Option<&OpenRound> {
        self.round.as_ref()
    }

    /// Cast a vote for changing `kind` to `payload`.
    ///
    /// Opens a round, joins the matching open round, or rejects. On a
    /// majority the change is written through to `params` (and the
    /// registry's collateral requirement, when that is the parameter
    /// changed) and the round closes.
    pub fn add_proposal(
        &mut self,
        caller: Address,
        kind: ParamKind,
        payload: ProposalPayload,
        height: BlockHeight,
        registry: &mut GovernorRegistry,
        params: &mut ProtocolParams,
    ) -> Result<VoteOutcome> {
        let governor_count = registry.governor_count();
        if governor_count < registry.config().minimum_governors {
            // voting is disabled below the minimum; a round left open by a
            // shrinking governor set is dead and gets dropped here
            if self.round.take().is_some() {
                tracing::info!(
                    "Open proposal discarded, not enough governors"
                );
            }
            return Err(Error::NotEnoughGovernors);
        }
        if !registry.is_valid_governor(&caller, height) {
            return Err(Error::NotValidGovernor);
        }
        match &payload {
            ProposalPayload::Value(value) => store::validate(kind, value)?,
            ProposalPayload::Holder(address) => {
                if !params.is_registered(kind, address) {
                    return Err(Error::InvalidParameterValue);
                }
            }
        }

        let expired = match self.round.take() {
            None => None,
            Some(round)
                if height
                    .blocks_since(round.opened_height)
                    .is_some_and(|age| age >= self.expiry_blocks) =>
            {
                tracing::info!(
                    kind = %round.kind,
                    opened = %round.opened_height,
                    "Expired proposal discarded"
                );
                Some(round)
            }
            Some(mut round) => {
                if round.kind != kind || round.payload != payload {
                    self.round = Some(round);
                    return Err(Error::ProposalInProgress);
                }
                if !round.voters.insert(caller) {
                    self.round = Some(round);
                    return Err(Error::AlreadyVoted);
                }
                let votes = round.voters.len() as u64;
                if votes > checked!(governor_count / 2)? {
                    apply(kind, round.payload, registry, params)?;
                    return Ok(VoteOutcome::Passed);
                }
                self.round = Some(round);
                return Ok(VoteOutcome::Voted { votes });
            }
        };

        // a single vote can carry a majority in a tiny governor set
        if 1 > checked!(governor_count / 2)? {
            apply(kind, payload, registry, params)?;
            return Ok(VoteOutcome::Passed);
        }
        self.round = Some(OpenRound {
            kind,
            payload,
            opened_height: height,
            voters: BTreeSet::from([caller]),
        });
        tracing::info!(kind = %kind, %height, "Proposal round opened");
        Ok(VoteOutcome::Opened { expired })
    }
}

/// Write a passed change through to the parameter set, keeping the
/// registry's collateral requirement in sync.
fn apply(
    kind: ParamKind,
    payload: ProposalPayload,
    registry: &mut GovernorRegistry,
    params: &mut ProtocolParams,
) -> Result<()> {
    match payload {
        ProposalPayload::Value(value) => params.set_value(kind, value)?,
        ProposalPayload::Holder(address) => params.swap_holder(kind, address)?,
    }
    if kind == ParamKind::Collateral {
        registry.set_required_collateral(params.collateral());
    }
    tracing::info!(kind = %kind, "Proposal passed");
    Ok(())
}
