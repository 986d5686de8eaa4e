//! End-to-end governor lifecycle through the call boundary: enrollment,
//! liveness, rewards, collateral changes by vote, and eviction.

use agora_core::address::testing::established_address_n;
use agora_core::address::Address;
use agora_core::chain::BlockHeight;
use agora_core::token::Amount;
use agora_governance::{
    CallRequest, CallResponse, CallStatus, GenesisConfig, Protocol,
    RegistryConfig, Value,
};

const COLLATERAL: Amount = Amount::native_whole(10);

fn dev_protocol() -> Protocol {
    Protocol::new(GenesisConfig {
        registry: RegistryConfig {
            minimum_governors: 3,
            ping_interval: 40,
            reward_interval: 100,
            maturity_blocks: 10,
            inactivity_blocks: 40,
            max_reward: Amount::native_whole(1),
        },
        proposal_expiry_blocks: 20,
        budget_period_blocks: 100,
    })
}

fn call(
    protocol: &mut Protocol,
    caller: Address,
    attached: Amount,
    height: u64,
    method: &str,
    args: Vec<Value>,
) -> CallResponse {
    protocol.execute(&CallRequest {
        caller,
        attached_amount: attached,
        block_height: BlockHeight(height),
        method: method.to_string(),
        args,
    })
}

fn assert_reverts(response: &CallResponse, reason: &str) {
    assert_eq!(response.status, CallStatus::Reverted);
    assert_eq!(response.reason.as_deref(), Some(reason));
}

fn enroll_governors(protocol: &mut Protocol, count: u8, height: u64) {
    for n in 1..=count {
        let response = call(
            protocol,
            established_address_n(n),
            COLLATERAL,
            height,
            "enroll",
            vec![],
        );
        assert!(response.is_ok(), "{:?}", response.reason);
    }
}

fn u64_return(response: &CallResponse) -> u64 {
    match response.return_values[..] {
        [Value::U64(value)] => value,
        ref other => panic!("unexpected return values: {other:?}"),
    }
}

#[test]
fn enrollment_requires_exact_collateral() {
    let mut protocol = dev_protocol();
    let addr = established_address_n(1);

    let response =
        call(&mut protocol, addr, Amount::zero(), 1, "enroll", vec![]);
    assert_reverts(&response, "Collateral is required for enrollment");

    let response = call(
        &mut protocol,
        addr,
        Amount::native_whole(9),
        1,
        "enroll",
        vec![],
    );
    assert_reverts(&response, "New collateral must be exact");

    let response = call(&mut protocol, addr, COLLATERAL, 1, "enroll", vec![]);
    assert!(response.is_ok());
    let response =
        call(&mut protocol, addr, Amount::zero(), 1, "governorCount", vec![]);
    assert_eq!(u64_return(&response), 1);
}

#[test]
fn reward_scenario_once_per_block() {
    let mut protocol = dev_protocol();
    let addr = established_address_n(1);
    enroll_governors(&mut protocol, 1, 1);
    let reward = Amount::native_whole(1);

    // not mature yet
    let response = call(
        &mut protocol,
        addr,
        reward,
        5,
        "rewardGovernor",
        vec![],
    );
    assert_reverts(&response, "No winner could be determined");

    call(&mut protocol, addr, Amount::zero(), 12, "ping", vec![]);

    let response = call(
        &mut protocol,
        addr,
        Amount::native_whole(2),
        20,
        "rewardGovernor",
        vec![],
    );
    assert_reverts(&response, "Reward is too high");

    let response =
        call(&mut protocol, addr, reward, 20, "rewardGovernor", vec![]);
    assert!(response.is_ok());
    assert_eq!(response.return_values, vec![Value::Address(addr)]);

    // same block, second payout is rejected
    let response =
        call(&mut protocol, addr, reward, 20, "rewardGovernor", vec![]);
    assert_reverts(&response, "A reward was already paid at this block");

    // later block, same winner still inside the reward interval
    let response =
        call(&mut protocol, addr, reward, 40, "rewardGovernor", vec![]);
    assert_reverts(&response, "Last reward is too recent");
}

#[test]
fn reward_rotates_through_governors() {
    let mut protocol = dev_protocol();
    enroll_governors(&mut protocol, 3, 1);
    let reward = Amount::native_whole(1);
    let anyone = established_address_n(9);

    for (height, n) in [(20u64, 1u8), (21, 2), (22, 3)] {
        let response = call(
            &mut protocol,
            anyone,
            reward,
            height,
            "rewardGovernor",
            vec![],
        );
        assert!(response.is_ok(), "{:?}", response.reason);
        assert_eq!(
            response.return_values,
            vec![Value::Address(established_address_n(n))]
        );
    }

    // the view agrees with the next payout
    let response = call(
        &mut protocol,
        anyone,
        Amount::zero(),
        23,
        "currentWinner",
        vec![],
    );
    assert_eq!(
        response.return_values,
        vec![Value::Address(established_address_n(1))]
    );
}

#[test]
fn collateral_raise_top_up_lower_cycle() {
    let mut protocol = dev_protocol();
    enroll_governors(&mut protocol, 3, 1);
    let raise = vec![
        Value::U64(1),
        Value::U64(Amount::native_whole(15).raw()),
    ];

    for n in 1..=2u8 {
        let response = call(
            &mut protocol,
            established_address_n(n),
            Amount::zero(),
            15,
            "addProposal",
            raise.clone(),
        );
        assert!(response.is_ok(), "{:?}", response.reason);
    }
    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        15,
        "requiredCollateral",
        vec![],
    );
    assert_eq!(u64_return(&response), Amount::native_whole(15).raw());

    // under-collateralized governors cannot vote until they top up
    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        16,
        "addProposal",
        raise,
    );
    assert_reverts(&response, "Governor is not currently valid");

    for n in 1..=3u8 {
        let response = call(
            &mut protocol,
            established_address_n(n),
            Amount::native_whole(5),
            16,
            "enroll",
            vec![],
        );
        assert!(response.is_ok(), "{:?}", response.reason);
    }

    // now lower it back down by vote
    let lower = vec![
        Value::U64(1),
        Value::U64(COLLATERAL.raw()),
    ];
    for n in 1..=2u8 {
        let response = call(
            &mut protocol,
            established_address_n(n),
            Amount::zero(),
            17,
            "addProposal",
            lower.clone(),
        );
        assert!(response.is_ok(), "{:?}", response.reason);
    }

    // each governor sheds the excess and is whole again
    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        18,
        "unenroll",
        vec![Value::Bool(false)],
    );
    assert_eq!(u64_return(&response), Amount::native_whole(5).raw());
    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        18,
        "governors",
        vec![Value::Address(established_address_n(1))],
    );
    assert_eq!(response.return_values[2], Value::U64(COLLATERAL.raw()));
}

#[test]
fn proposal_needs_minimum_governors() {
    let mut protocol = dev_protocol();
    enroll_governors(&mut protocol, 1, 1);
    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        15,
        "addProposal",
        vec![Value::U64(4), Value::U64(4_000_000)],
    );
    assert_reverts(&response, "Not enough governors to enable voting");
}

#[test]
fn double_vote_and_competing_proposal() {
    let mut protocol = dev_protocol();
    enroll_governors(&mut protocol, 4, 1);
    let proposal = vec![Value::U64(4), Value::U64(4_000_000)];

    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        15,
        "addProposal",
        proposal.clone(),
    );
    assert!(response.is_ok());
    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        15,
        "addProposal",
        proposal,
    );
    assert_reverts(&response, "Governor has already voted");

    let response = call(
        &mut protocol,
        established_address_n(2),
        Amount::zero(),
        15,
        "addProposal",
        vec![Value::U64(4), Value::U64(8_000_000)],
    );
    assert_reverts(&response, "Another proposal is currently in progress");
}

#[test]
fn expired_proposal_gives_way() {
    let mut protocol = dev_protocol();
    enroll_governors(&mut protocol, 4, 1);

    let response = call(
        &mut protocol,
        established_address_n(1),
        Amount::zero(),
        15,
        "addProposal",
        vec![Value::U64(4), Value::U64(4_000_000)],
    );
    assert!(response.is_ok());

    // keep everyone live across the expiry window
    for n in 1..=4u8 {
        call(
            &mut protocol,
            established_address_n(n),
            Amount::zero(),
            36,
            "ping",
            vec![],
        );
    }

    // a different proposal after expiry replaces the stale round
    let response = call(
        &mut protocol,
        established_address_n(2),
        Amount::zero(),
        36,
        "addProposal",
        vec![Value::U64(4), Value::U64(8_000_000)],
    );
    assert!(response.is_ok(), "{:?}", response.reason);
    let response = call(
        &mut protocol,
        established_address_n(2),
        Amount::zero(),
        36,
        "proposal",
        vec![],
    );
    // the view carries the replacement's proposed value and type
    assert_eq!(
        response.return_values,
        vec![
            Value::Bool(true),
            Value::U64(8_000_000),
            Value::U64(1),
            Value::U64(4),
        ]
    );
}

#[test]
fn inactive_governor_is_removed() {
    let mut protocol = dev_protocol();
    enroll_governors(&mut protocol, 3, 1);
    let anyone = established_address_n(9);

    for n in [1u8, 3] {
        call(
            &mut protocol,
            established_address_n(n),
            Amount::zero(),
            30,
            "ping",
            vec![],
        );
    }

    // nothing stale yet
    let response = call(
        &mut protocol,
        anyone,
        Amount::zero(),
        35,
        "removeInactiveGovernor",
        vec![],
    );
    assert_eq!(response.return_values, vec![Value::Bool(false)]);

    // governor 2 has not pinged since enrollment at height 1
    let response = call(
        &mut protocol,
        anyone,
        Amount::zero(),
        45,
        "removeInactiveGovernor",
        vec![],
    );
    assert_eq!(response.return_values, vec![Value::Bool(true)]);
    let response =
        call(&mut protocol, anyone, Amount::zero(), 45, "governorCount", vec![]);
    assert_eq!(u64_return(&response), 2);
    let response = call(
        &mut protocol,
        anyone,
        Amount::zero(),
        45,
        "governors",
        vec![Value::Address(established_address_n(2))],
    );
    assert_eq!(response.return_values, vec![Value::U64(0); 5]);
}

#[test]
fn full_unenroll_leaves_no_trace() {
    let mut protocol = dev_protocol();
    let addr = established_address_n(1);
    enroll_governors(&mut protocol, 1, 1);

    let response = call(
        &mut protocol,
        addr,
        Amount::zero(),
        5,
        "unenroll",
        vec![Value::Bool(true)],
    );
    assert_eq!(u64_return(&response), COLLATERAL.raw());

    let response = call(
        &mut protocol,
        addr,
        Amount::zero(),
        5,
        "governors",
        vec![Value::Address(addr)],
    );
    assert_eq!(response.return_values, vec![Value::U64(0); 5]);
    let response =
        call(&mut protocol, addr, Amount::zero(), 5, "governorCount", vec![]);
    assert_eq!(u64_return(&response), 0);

    // and a second unenroll has nothing to refund
    let response = call(
        &mut protocol,
        addr,
        Amount::zero(),
        5,
        "unenroll",
        vec![Value::Bool(true)],
    );
    assert_reverts(&response, "Address is not a valid governor");
}
