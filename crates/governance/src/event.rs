//! Protocol events.
//!
//! Every state-changing call appends typed events that the execution
//! environment can index or forward to subscribers. Event types are
//! hierarchical path strings and are part of the external interface.

use agora_core::address::Address;
use agora_core::chain::BlockHeight;
use agora_core::token::Amount;
use agora_parameters::ParamKind;
use serde::{Deserialize, Serialize};

use crate::budget::{BudgetVote, Settlement};

/// An event emitted by a protocol call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    /// A governor enrolled with full collateral.
    GovernorEnrolled {
        /// The new governor.
        governor: Address,
        /// The staked collateral.
        collateral: Amount,
    },
    /// A governor was refunded collateral.
    GovernorUnenrolled {
        /// The governor refunded.
        governor: Address,
        /// The refunded amount.
        refund: Amount,
        /// Whether the governor left the registry entirely.
        full: bool,
    },
    /// A governor proved liveness.
    GovernorPinged {
        /// The governor that pinged.
        governor: Address,
    },
    /// An inactive governor was evicted and refunded.
    GovernorRemoved {
        /// The evicted governor.
        governor: Address,
        /// The refunded collateral.
        refund: Amount,
    },
    /// A block reward was paid out.
    RewardPaid {
        /// The winning governor.
        governor: Address,
        /// The reward amount.
        amount: Amount,
        /// The rewarded block.
        height: BlockHeight,
    },
    /// A parameter proposal round opened.
    ProposalOpened {
        /// The parameter under vote.
        kind: ParamKind,
    },
    /// A parameter proposal round expired and was discarded.
    ProposalExpired {
        /// The parameter that was under vote.
        kind: ParamKind,
    },
    /// A parameter change reached majority and was applied.
    ProposalPassed {
        /// The changed parameter.
        kind: ParamKind,
    },
    /// A budget proposal was listed.
    BudgetProposalStarted {
        /// The new proposal id.
        id: u64,
        /// The listing account.
        owner: Address,
        /// Requested payout per period.
        requested: Amount,
    },
    /// A governor voted on a budget proposal.
    BudgetVoteCast {
        /// The proposal voted on.
        id: u64,
        /// The voting governor.
        governor: Address,
        /// The ballot.
        vote: BudgetVote,
    },
    /// The treasury received a donation.
    BudgetFunded {
        /// The donated amount.
        amount: Amount,
    },
    /// A budget period was settled.
    BudgetSettled {
        /// Payouts, evictions and the burned remainder.
        settlement: Settlement,
    },
}

impl ProtocolEvent {
    /// The hierarchical event type path.
    pub fn event_type(&self) -> &'static str {
        match self {
            ProtocolEvent::GovernorEnrolled { .. } => {
                "governance/governor/enrolled"
            }
            ProtocolEvent::GovernorUnenrolled { .. } => {
                "governance/governor/unenrolled"
            }
            ProtocolEvent::GovernorPinged { .. } => {
                "governance/governor/pinged"
            }
            ProtocolEvent::GovernorRemoved { .. } => {
                "governance/governor/removed"
            }
            ProtocolEvent::RewardPaid { .. } => "governance/reward/paid",
            ProtocolEvent::ProposalOpened { .. } => {
                "governance/proposal/opened"
            }
            ProtocolEvent::ProposalExpired { .. } => {
                "governance/proposal/expired"
            }
            ProtocolEvent::ProposalPassed { .. } => {
                "governance/proposal/passed"
            }
            ProtocolEvent::BudgetProposalStarted { .. } => {
                "budget/proposal/started"
            }
            ProtocolEvent::BudgetVoteCast { .. } => "budget/proposal/vote",
            ProtocolEvent::BudgetFunded { .. } => "budget/funded",
            ProtocolEvent::BudgetSettled { .. } => "budget/settled",
        }
    }
}

impl std::fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_type())
    }
}
