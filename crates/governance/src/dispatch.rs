//! The call boundary.
//!
//! The execution environment authenticates a sender, sequences calls into
//! block order, and hands each one to [`Protocol::execute`] as a
//! [`CallRequest`]. Calls are applied one at a time and each either fully
//! commits or reverts with one of the fixed reason strings. Method names
//! are part of the external interface and keep their historical spelling.

use agora_core::address::Address;
use agora_core::chain::BlockHeight;
use agora_core::token::Amount;
use agora_parameters::{ParamKind, ParamValue, ProtocolParams};
use serde::{Deserialize, Serialize};

use crate::budget::{BudgetAllocator, BudgetVote};
use crate::errors::{Error, Result};
use crate::event::ProtocolEvent;
use crate::proposal::{ProposalEngine, ProposalPayload, VoteOutcome};
use crate::registry::{GovernorRegistry, RegistryConfig};

/// A dynamically typed call argument or return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// An unsigned integer, also used for amounts in base units.
    U64(u64),
    /// A signed integer.
    I64(i64),
    /// A boolean.
    Bool(bool),
    /// An account address.
    Address(Address),
    /// A UTF-8 string.
    String(String),
    /// An unsigned integer list.
    U64List(Vec<u64>),
}

/// One call from the execution environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// The authenticated sender.
    pub caller: Address,
    /// Payment attached to the call, in base units.
    pub attached_amount: Amount,
    /// The current block height.
    pub block_height: BlockHeight,
    /// The method to invoke.
    pub method: String,
    /// Method arguments.
    pub args: Vec<Value>,
}

/// Call outcome discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    /// The call committed.
    Ok,
    /// The call reverted; no state was changed.
    Reverted,
}

/// The structured outcome of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Whether the call committed.
    pub status: CallStatus,
    /// The fixed revert reason, present iff the call reverted.
    pub reason: Option<String>,
    /// Returned values, empty on revert.
    pub return_values: Vec<Value>,
}

impl CallResponse {
    fn ok(return_values: Vec<Value>) -> Self {
        Self {
            status: CallStatus::Ok,
            reason: None,
            return_values,
        }
    }

    fn reverted(error: Error) -> Self {
        Self {
            status: CallStatus::Reverted,
            reason: Some(error.to_string()),
            return_values: Vec::new(),
        }
    }

    /// Whether the call committed.
    pub fn is_ok(&self) -> bool {
        self.status == CallStatus::Ok
    }
}

/// Genesis configuration for a protocol instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Registry scheduling parameters.
    pub registry: RegistryConfig,
    /// Blocks before an open parameter proposal round expires.
    pub proposal_expiry_blocks: u64,
    /// Blocks in a budget period.
    pub budget_period_blocks: u64,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            proposal_expiry_blocks: 14_400,
            budget_period_blocks: 29_220,
        }
    }
}

/// The protocol state machine: the four components behind one dispatcher.
#[derive(Debug, Clone)]
pub struct Protocol {
    params: ProtocolParams,
    registry: GovernorRegistry,
    engine: ProposalEngine,
    budget: BudgetAllocator,
    events: Vec<ProtocolEvent>,
}

impl Protocol {
    /// A protocol instance at genesis.
    pub fn new(config: GenesisConfig) -> Self {
        let params = ProtocolParams::genesis();
        let registry =
            GovernorRegistry::new(config.registry, params.collateral());
        Self {
            params,
            registry,
            engine: ProposalEngine::new(config.proposal_expiry_blocks),
            budget: BudgetAllocator::new(config.budget_period_blocks),
            events: Vec::new(),
        }
    }

    /// The governor registry.
    pub fn registry(&self) -> &GovernorRegistry {
        &self.registry
    }

    /// The parameter set.
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Mutable access to the parameter set, for out-of-band holder
    /// registration by deployment tooling.
    pub fn params_mut(&mut self) -> &mut ProtocolParams {
        &mut self.params
    }

    /// The budget treasury.
    pub fn budget(&self) -> &BudgetAllocator {
        &self.budget
    }

    /// Events emitted so far, in emission order.
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Drain the emitted events.
    pub fn take_events(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply one call and report its outcome. Reverted calls leave no
    /// observable state change and emit no events.
    pub fn execute(&mut self, request: &CallRequest) -> CallResponse {
        match self.apply(request) {
            Ok(return_values) => CallResponse::ok(return_values),
            Err(error) => {
                tracing::debug!(
                    method = %request.method,
                    caller = %request.caller,
                    %error,
                    "Call reverted"
                );
                CallResponse::reverted(error)
            }
        }
    }

    fn apply(&mut self, request: &CallRequest) -> Result<Vec<Value>> {
        let caller = request.caller;
        let attached = request.attached_amount;
        let height = request.block_height;
        let args = &request.args;
        match request.method.as_str() {
            "enroll" => {
                expect_args(args, 0)?;
                self.registry.enroll(caller, attached, height)?;
                let collateral = self
                    .registry
                    .governor(&caller)
                    .expect("Enrollment just succeeded")
                    .collateral;
                self.events.push(ProtocolEvent::GovernorEnrolled {
                    governor: caller,
                    collateral,
                });
                Ok(vec![])
            }
            "unenroll" => {
                let full = arg_bool(args, 0)?;
                expect_args(args, 1)?;
                let refund = self.registry.unenroll(caller, full)?;
                self.events.push(ProtocolEvent::GovernorUnenrolled {
                    governor: caller,
                    refund,
                    full,
                });
                Ok(vec![Value::U64(refund.raw())])
            }
            "ping" => {
                expect_args(args, 0)?;
                self.registry.ping(caller, height)?;
                self.events
                    .push(ProtocolEvent::GovernorPinged { governor: caller });
                Ok(vec![])
            }
            "rewardGovernor" => {
                let expected = match args.len() {
                    0 => None,
                    1 => Some(arg_address(args, 0)?),
                    _ => return Err(Error::InvalidArguments),
                };
                let winner =
                    self.registry.reward_governor(expected, attached, height)?;
                self.events.push(ProtocolEvent::RewardPaid {
                    governor: winner,
                    amount: attached,
                    height,
                });
                Ok(vec![Value::Address(winner)])
            }
            "removeInactiveGovernor" => {
                expect_args(args, 0)?;
                match self.registry.remove_inactive_governor(height)? {
                    Some((governor, refund)) => {
                        self.events.push(ProtocolEvent::GovernorRemoved {
                            governor,
                            refund,
                        });
                        Ok(vec![Value::Bool(true)])
                    }
                    None => Ok(vec![Value::Bool(false)]),
                }
            }
            "addProposal" => {
                let kind = ParamKind::from_u64(arg_u64(args, 0)?)
                    .ok_or(Error::InvalidArguments)?;
                let payload = arg_payload(args, 1, kind)?;
                expect_args(args, 2)?;
                let outcome = self.engine.add_proposal(
                    caller,
                    kind,
                    payload,
                    height,
                    &mut self.registry,
                    &mut self.params,
                )?;
                match outcome {
                    VoteOutcome::Opened { expired } => {
                        if let Some(round) = expired {
                            self.events.push(ProtocolEvent::ProposalExpired {
                                kind: round.kind,
                            });
                        }
                        self.events
                            .push(ProtocolEvent::ProposalOpened { kind });
                    }
                    VoteOutcome::Voted { .. } => {}
                    VoteOutcome::Passed => {
                        self.events
                            .push(ProtocolEvent::ProposalPassed { kind });
                    }
                }
                Ok(vec![])
            }
            "proposal" => {
                expect_args(args, 0)?;
                // fixed shape: on-vote flag, proposed value or holder,
                // vote count, proposal type
                Ok(match self.engine.round() {
                    Some(round) => {
                        let proposed = match &round.payload {
                            ProposalPayload::Value(ParamValue::Scalar(
                                value,
                            )) => Value::U64(*value),
                            ProposalPayload::Value(ParamValue::Amount(
                                amount,
                            )) => Value::U64(amount.raw()),
                            ProposalPayload::Value(ParamValue::Schedule(
                                schedule,
                            )) => Value::U64List(schedule.clone()),
                            ProposalPayload::Holder(address) => {
                                Value::Address(*address)
                            }
                        };
                        vec![
                            Value::Bool(true),
                            proposed,
                            Value::U64(round.voters.len() as u64),
                            Value::U64(round.kind as u64),
                        ]
                    }
                    None => vec![
                        Value::Bool(false),
                        Value::U64(0),
                        Value::U64(0),
                        Value::U64(0),
                    ],
                })
            }
            "startProposal" => {
                let title = arg_string(args, 0)?;
                let description = arg_string(args, 1)?;
                let url = arg_string(args, 2)?;
                let requested = Amount::from_u64(arg_u64(args, 3)?);
                let duration_periods = arg_u64(args, 4)?;
                expect_args(args, 5)?;
                let id = self.budget.start_proposal(
                    caller,
                    attached,
                    self.params.budget_fee(),
                    title,
                    description,
                    url,
                    requested,
                    duration_periods,
                    height,
                )?;
                self.events.push(ProtocolEvent::BudgetProposalStarted {
                    id,
                    owner: caller,
                    requested,
                });
                Ok(vec![Value::U64(id)])
            }
            "voteForProposal" => {
                let id = arg_u64(args, 0)?;
                let vote = BudgetVote::try_from(arg_u64(args, 1)?)?;
                expect_args(args, 2)?;
                self.budget.vote_for_proposal(
                    caller,
                    id,
                    vote,
                    height,
                    &self.registry,
                )?;
                self.events.push(ProtocolEvent::BudgetVoteCast {
                    id,
                    governor: caller,
                    vote,
                });
                Ok(vec![])
            }
            "fund" => {
                expect_args(args, 0)?;
                self.budget.fund(attached)?;
                self.events
                    .push(ProtocolEvent::BudgetFunded { amount: attached });
                Ok(vec![])
            }
            "settleBudget" => {
                expect_args(args, 0)?;
                let settlement = self.budget.settle(height)?;
                let payouts = settlement.payouts.len() as u64;
                self.events
                    .push(ProtocolEvent::BudgetSettled { settlement });
                Ok(vec![Value::U64(payouts)])
            }
            "getProposalIndex" => {
                let id = arg_u64(args, 0)?;
                expect_args(args, 1)?;
                Ok(vec![Value::I64(self.budget.proposal_index(id))])
            }
            "proposalVoteStatus" => {
                let id = arg_u64(args, 0)?;
                expect_args(args, 1)?;
                let status = self.budget.vote_status(id, &caller)?;
                Ok(vec![Value::U64(status)])
            }
            "balance" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.budget.balance().raw())])
            }
            "governors" => {
                let address = arg_address(args, 0)?;
                expect_args(args, 1)?;
                // absent records read as all zeroes
                let governor =
                    self.registry.governor(&address).cloned().unwrap_or_default();
                Ok(vec![
                    Value::U64(governor.enrolled_height.0),
                    Value::U64(governor.last_ping_height.0),
                    Value::U64(governor.collateral.raw()),
                    Value::U64(governor.last_reward_height.0),
                    Value::U64(governor.list_index),
                ])
            }
            "governorCount" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.registry.governor_count())])
            }
            "requiredCollateral" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.registry.required_collateral().raw())])
            }
            "currentWinner" => {
                expect_args(args, 0)?;
                // the zero address stands for "no winner"
                let winner = self
                    .registry
                    .current_winner(height)
                    .unwrap_or(Address::from_bytes([0; 20]));
                Ok(vec![Value::Address(winner)])
            }
            "proposals" => {
                let position = arg_u64(args, 0)?;
                expect_args(args, 1)?;
                let proposal = self
                    .budget
                    .proposals()
                    .get(position as usize)
                    .ok_or(Error::ProposalNotFound)?;
                Ok(vec![
                    Value::U64(proposal.id),
                    Value::Address(proposal.owner),
                    Value::String(proposal.title.clone()),
                    Value::String(proposal.description.clone()),
                    Value::String(proposal.url.clone()),
                    Value::U64(proposal.requested.raw()),
                    Value::U64(proposal.remaining_periods),
                    Value::U64(proposal.yes_count),
                    Value::U64(proposal.no_count),
                    Value::U64(proposal.abstain_count),
                    Value::Bool(proposal.funded),
                ])
            }
            "getSchedule" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64List(self.params.gas_schedule().to_vec())])
            }
            "getBlockSize" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.params.block_size())])
            }
            "getMinGasPrice" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.params.min_gas_price())])
            }
            "getBlockGasLimit" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.params.block_gas_limit())])
            }
            "getGovernanceCollateral" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.params.collateral().raw())])
            }
            "getBudgetFee" => {
                expect_args(args, 0)?;
                Ok(vec![Value::U64(self.params.budget_fee().raw())])
            }
            unknown => Err(Error::UnknownMethod(unknown.to_string())),
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::new(GenesisConfig::default())
    }
}

fn expect_args(args: &[Value], len: usize) -> Result<()> {
    if args.len() == len {
        Ok(())
    } else {
        Err(Error::InvalidArguments)
    }
}

fn arg<'args>(args: &'args [Value], index: usize) -> Result<&'args Value> {
    args.get(index).ok_or(Error::InvalidArguments)
}

fn arg_u64(args: &[Value], index: usize) -> Result<u64> {
    match arg(args, index)? {
        Value::U64(value) => Ok(*value),
        _ => Err(Error::InvalidArguments),
    }
}

fn arg_bool(args: &[Value], index: usize) -> Result<bool> {
    match arg(args, index)? {
        Value::Bool(value) => Ok(*value),
        _ => Err(Error::InvalidArguments),
    }
}

fn arg_address(args: &[Value], index: usize) -> Result<Address> {
    match arg(args, index)? {
        Value::Address(address) => Ok(*address),
        _ => Err(Error::InvalidArguments),
    }
}

fn arg_string(args: &[Value], index: usize) -> Result<String> {
    match arg(args, index)? {
        Value::String(value) => Ok(value.clone()),
        _ => Err(Error::InvalidArguments),
    }
}

/// Decode a proposal payload. The argument's shape selects between a value
/// write and a holder swap; `kind` selects how a scalar is interpreted.
fn arg_payload(
    args: &[Value],
    index: usize,
    kind: ParamKind,
) -> Result<ProposalPayload> {
    let payload = match arg(args, index)? {
        Value::Address(address) => ProposalPayload::Holder(*address),
        Value::U64List(schedule) => {
            ProposalPayload::Value(ParamValue::Schedule(schedule.clone()))
        }
        Value::U64(raw) => {
            let value = match kind {
                ParamKind::Collateral | ParamKind::BudgetFee => {
                    ParamValue::Amount(Amount::from_u64(*raw))
                }
                _ => ParamValue::Scalar(*raw),
            };
            ProposalPayload::Value(value)
        }
        _ => return Err(Error::InvalidArguments),
    };
    Ok(payload)
}
