//! The revert taxonomy.
//!
//! Every failed call reverts with one of these variants. The `Display`
//! strings are user-visible and consumed by existing integrations, so they
//! are part of the external contract and must never change. That includes
//! the historical misspelling in the budget fee message.

use agora_core::arith;
use agora_parameters::ParamError;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // eligibility
    #[error("Address is not a valid governor")]
    NotGovernor,
    #[error("Governor is not currently valid")]
    NotValidGovernor,
    #[error("Not enough governors to enable voting")]
    NotEnoughGovernors,

    // collateral
    #[error("Collateral is required for enrollment")]
    CollateralRequired,
    #[error("New collateral must be exact")]
    CollateralMismatch,

    // parameter proposals
    #[error("Governor has already voted")]
    AlreadyVoted,
    #[error("Another proposal is currently in progress")]
    ProposalInProgress,
    #[error("Proposal not found")]
    ProposalNotFound,
    #[error("Proposal value is out of range")]
    InvalidParameterValue,

    // rewards
    #[error("Reward is too high")]
    RewardTooHigh,
    #[error("No winner could be determined")]
    NoWinner,
    #[error("A reward was already paid at this block")]
    AlreadyRewardedThisBlock,
    #[error("Last reward is too recent")]
    LastRewardTooRecent,

    // budget
    #[error("Buget listing fee is required")]
    FeeRequired,

    // call boundary
    #[error("Unknown method: {0}")]
    UnknownMethod(String),
    #[error("Invalid call arguments")]
    InvalidArguments,
    #[error("Arithmetic overflow")]
    Overflow,
}

impl From<ParamError> for Error {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::InvalidValue => Error::InvalidParameterValue,
        }
    }
}

impl From<arith::Error> for Error {
    fn from(_: arith::Error) -> Self {
        Error::Overflow
    }
}

/// Governance result type.
pub type Result<T> = std::result::Result<T, Error>;
