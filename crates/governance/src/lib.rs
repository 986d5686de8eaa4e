//! Governance and budget allocation.
//!
//! A deterministic, single-threaded state machine with four components: a
//! staked governor registry, a majority-vote parameter proposal engine, the
//! swappable parameter holders it targets, and a fee-gated budget treasury
//! settled once per period. The execution environment sequences calls into
//! block order and hands them to [`dispatch::Protocol`]; everything in this
//! crate is pure state transition plus a structured outcome.

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

pub mod budget;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod proposal;
pub mod registry;

pub use budget::{BudgetAllocator, BudgetProposal, BudgetVote, Settlement};
pub use dispatch::{
    CallRequest, CallResponse, CallStatus, GenesisConfig, Protocol, Value,
};
pub use errors::{Error, Result};
pub use event::ProtocolEvent;
pub use proposal::{ProposalEngine, ProposalPayload, VoteOutcome};
pub use registry::{Governor, GovernorRegistry, RegistryConfig};
