//! End-to-end ledger scenarios driven through `Ledger::execute`.
//! Run with: cargo test --test scenario_tests

mod common;

use common::*;
use sama_chain::state::{is_confirmed, ActionType, Claimer};
use sama_chain::types::{SECONDS_DAY, SECONDS_MONTH};
use sama_chain::*;

// ============================================================
// STAKING
// ============================================================

#[test]
fn route_stake_needs_confirmed_action() {
    let g = genesis();
    assert_eq!(g.route_stake, 200_000_000);
    assert_eq!(g.ser_stake, 100_000_000);
    let mut ledger = open_memory_ledger(g);
    let staker = addr(0x11);
    ledger.set_balance(staker, ROUTE_STAKE);
    let (key, _) = work_key(9);

    submit(&mut ledger, staker, 1, START, TxPayload::Register {
        action_id: action(1),
        staker_type: StakerRole::Route.as_u64(),
        params: node_params(&key),
        staker_addr: staker,
    })
    .expect("register");

    let stake = TxPayload::Stake {
        staker_type: StakerRole::Route.as_u64(),
        stake_amount: ROUTE_STAKE,
        staker_addr: staker,
    };
    let err = submit(&mut ledger, staker, 2, START, stake.clone()).unwrap_err();
    assert_eq!(err.to_string(), "no be confirmed");

    let root = ledger.params().root_address;
    submit(&mut ledger, root, 3, START, TxPayload::Vote { action_id: action(1) }).expect("vote");
    submit(&mut ledger, staker, 4, START, stake).expect("stake");

    assert!(ledger.actions().get(&action(1)).is_none());
    assert!(ledger.stakers().is_route(&staker));
    assert_eq!(ledger.balance(&staker).expect("balance"), 0);
    ledger.commit().expect("commit");
    assert!(ledger.stakers().is_route(&staker));
}

#[test]
fn unstake_before_and_after_minimum_duration() {
    let mut ledger = open_memory_ledger(genesis());
    let staker = addr(0x12);
    ledger.set_balance(staker, ROUTE_STAKE);
    stake_node(&mut ledger, staker, StakerRole::Route, 9, 1, START);
    ledger.commit().expect("commit");

    let early = START + 10 * SECONDS_DAY;
    let err = submit(&mut ledger, staker, 10, early, TxPayload::UnStake {
        staker_type: StakerRole::Route.as_u64(),
        reward_amount: 0,
        end_time: early,
    })
    .unwrap_err();
    assert!(matches!(err, LedgerError::StakeTimeTooShort(90)));

    let end = START + 90 * SECONDS_DAY;
    let (base, merit, yields) = ledger
        .calc_reward(Claimer::Staker(StakerRole::Route), &staker, end)
        .expect("calc");
    assert_eq!(merit, 0);
    assert_eq!(yields, 0);
    submit(&mut ledger, staker, 11, end, TxPayload::UnStake {
        staker_type: StakerRole::Route.as_u64(),
        reward_amount: base + merit + yields,
        end_time: end,
    })
    .expect("unstake");
    ledger.commit().expect("commit");

    assert_eq!(ledger.stake_balance(&staker).expect("stake"), 0);
    assert_eq!(ledger.balance(&staker).expect("balance"), ROUTE_STAKE + base);
    assert!(!ledger.stakers().is_route(&staker));
    let record = ledger.rewards().get(&staker).cloned().expect("reward record");
    assert_eq!(record.total(), 0);
    assert_eq!(record.last_opr_time, end);
}

// ============================================================
// SUBSCRIBERS
// ============================================================

#[test]
fn add_user_price_and_yield_pool() {
    let mut ledger = open_memory_ledger(genesis());
    let payer = addr(0x21);
    ledger.set_balance(payer, 1_000);
    let price = ledger.user_types().get(1).map(|t| t.fee).expect("month tier");
    let burn = u64::from(ledger.params().burn_perc);
    let add = |pay_amount| TxPayload::AddUser {
        start_time: START,
        end_time: START + SECONDS_MONTH,
        pay_amount,
        connections: 3,
        user_type: 1,
        address: addr(0x22),
    };

    let err = submit(&mut ledger, payer, 1, START, add(price + 1)).unwrap_err();
    assert_eq!(err.to_string(), "pay amount check fail");
    assert_eq!(ledger.yields().chain_yields(), 0);

    submit(&mut ledger, payer, 2, START, add(price)).expect("add user");
    assert_eq!(ledger.yields().chain_yields(), price * (100 - burn) / 100);
    ledger.commit().expect("commit");
    assert_eq!(ledger.yields().total_yields(), price * (100 - burn) / 100);
    let user = ledger.user(&addr(0x22)).expect("lookup").expect("stored");
    assert_eq!(user.pay_amount, price);
    assert_eq!(user.connections, 3);
}

#[test]
fn subscription_renewal_keeps_start_and_history() {
    let mut ledger = open_memory_ledger(genesis());
    let payer = addr(0x21);
    ledger.set_balance(payer, 1_000);
    let sub = |start: u64| TxPayload::AddUser {
        start_time: start,
        end_time: start + SECONDS_MONTH,
        pay_amount: 100,
        connections: 1,
        user_type: 1,
        address: addr(0x23),
    };
    submit(&mut ledger, payer, 1, START, sub(START)).expect("first");
    ledger.commit().expect("commit");

    let renew_at = START + SECONDS_MONTH;
    submit(&mut ledger, payer, 2, renew_at, sub(renew_at)).expect("renew");
    ledger.commit().expect("commit");

    let user = ledger.user(&addr(0x23)).expect("lookup").expect("stored");
    assert_eq!(user.start_time, START);
    assert_eq!(user.end_time, renew_at + SECONDS_MONTH);
    assert_eq!(user.tx_ids, vec![tx_id(1), tx_id(2)]);
}

// ============================================================
// PROOFS
// ============================================================

#[test]
fn proof_bounds_and_work_time() {
    let mut ledger = open_memory_ledger(genesis());
    let staker = addr(0x31);
    ledger.set_balance(staker, ROUTE_STAKE);
    let work = stake_node(&mut ledger, staker, StakerRole::Route, 5, 1, START);
    let now = START + 600;

    let proof = |netflow, start: u64, end: u64| TxPayload::Proof { netflow, start_time: start, end_time: end, ser: Address::ZERO };

    let err = submit(&mut ledger, work, 10, now, proof(2000, now - 100, now - 70)).unwrap_err();
    assert_eq!(err.to_string(), "netflow too big");
    let err = submit(&mut ledger, work, 11, now, proof(0, now - 100, now - 70)).unwrap_err();
    assert_eq!(err.to_string(), "netflow too small");
    let err = submit(&mut ledger, work, 12, now, proof(10, now - 200, now - 60)).unwrap_err();
    assert_eq!(err.to_string(), "interval too big");
    let err = submit(&mut ledger, work, 13, now, proof(10, now - 60, now + 5)).unwrap_err();
    assert_eq!(err.to_string(), "endtime err");

    submit(&mut ledger, work, 14, now, proof(500, now - 100, now - 70)).expect("proof");
    assert_eq!(ledger.pows().pow_time(StakerRole::Route, &work), 30);
    submit(&mut ledger, work, 15, now + 60, proof(100, now - 40, now - 30)).expect("proof");
    ledger.commit().expect("commit");

    let meter = ledger.pows().get(StakerRole::Route, &work).cloned().expect("meter");
    assert_eq!(meter.total_time, 40);
    assert_eq!(meter.total_flow, 600);

    // the stake address itself is not a work address
    let err = submit(&mut ledger, staker, 16, now + 60, proof(10, now - 40, now - 30)).unwrap_err();
    assert!(matches!(err, LedgerError::NotWorkNode));
}

#[test]
fn merit_follows_metered_work() {
    let mut ledger = open_memory_ledger(genesis());
    let (a, b) = (addr(0x41), addr(0x42));
    ledger.set_balance(a, ROUTE_STAKE);
    ledger.set_balance(b, ROUTE_STAKE);
    let work_a = stake_node(&mut ledger, a, StakerRole::Route, 6, 1, START);
    stake_node(&mut ledger, b, StakerRole::Route, 7, 2, START);
    let now = START + 600;
    submit(&mut ledger, work_a, 10, now, TxPayload::Proof {
        netflow: 10,
        start_time: now - 100,
        end_time: now - 70,
        ser: Address::ZERO,
    })
    .expect("proof");

    let end = START + 20 * SECONDS_DAY;
    let (base_a, merit_a, _) = ledger.calc_reward(Claimer::Staker(StakerRole::Route), &a, end).expect("a");
    let (base_b, merit_b, _) = ledger.calc_reward(Claimer::Staker(StakerRole::Route), &b, end).expect("b");
    assert_eq!(base_a, base_b);
    assert!(merit_a > 0);
    assert_eq!(merit_b, 0);

    // rotating the work key keeps the metered time
    let (key_c, work_c) = work_key(40);
    submit(&mut ledger, work_a, 11, now + 60, TxPayload::Refresh { params: node_params(&key_c) }).expect("refresh");
    assert!(ledger.details().get(&work_c).is_some());
    let (_, merit_rotated, _) = ledger.calc_reward(Claimer::Staker(StakerRole::Route), &a, end).expect("a");
    assert_eq!(merit_rotated, merit_a);
}

#[test]
fn stake_must_come_from_the_staker_address() {
    let mut ledger = open_memory_ledger(genesis());
    let (payer, node) = (addr(0x71), addr(0x72));
    let root = ledger.params().root_address;
    ledger.set_balance(payer, ROUTE_STAKE);
    ledger.set_balance(node, ROUTE_STAKE);
    let (key, _) = work_key(41);

    submit(&mut ledger, payer, 1, START, TxPayload::Register {
        action_id: action(1),
        staker_type: StakerRole::Route.as_u64(),
        params: node_params(&key),
        staker_addr: node,
    })
    .expect("register");
    submit(&mut ledger, root, 2, START, TxPayload::Vote { action_id: action(1) }).expect("vote");

    let stake = TxPayload::Stake { staker_type: StakerRole::Route.as_u64(), stake_amount: ROUTE_STAKE, staker_addr: node };
    let err = submit(&mut ledger, payer, 3, START, stake.clone()).unwrap_err();
    assert!(matches!(err, LedgerError::StakerSender));
    assert_eq!(ledger.balance(&payer).expect("payer"), ROUTE_STAKE);

    submit(&mut ledger, node, 4, START, stake).expect("stake");
    ledger.commit().expect("commit");

    // the same address can get its stake back
    let end = START + 90 * SECONDS_DAY;
    let (base, merit, yields) = ledger.calc_reward(Claimer::Staker(StakerRole::Route), &node, end).expect("calc");
    submit(&mut ledger, node, 5, end, TxPayload::UnStake {
        staker_type: StakerRole::Route.as_u64(),
        reward_amount: base + merit + yields,
        end_time: end,
    })
    .expect("unstake");
    assert_eq!(ledger.stake_balance(&node).expect("stake"), 0);
    assert_eq!(ledger.balance(&node).expect("balance"), ROUTE_STAKE + base + merit + yields);
}

// ============================================================
// GOVERNANCE
// ============================================================

#[test]
fn steady_state_quorum_drives_fee_change() {
    let mut ledger = open_memory_ledger(genesis());
    let routes = [addr(0x51), addr(0x52), addr(0x53)];
    for (i, r) in routes.iter().enumerate() {
        ledger.set_balance(*r, ROUTE_STAKE);
        stake_node(&mut ledger, *r, StakerRole::Route, 10 + i as u8, 1 + i as u8, START);
    }
    ledger.commit().expect("commit");
    assert_eq!(ledger.stakers().stakers_num().0, 3);

    submit(&mut ledger, routes[0], 100, START, TxPayload::Proposal {
        action_id: action(9),
        start_time: START,
        end_time: START + 7 * SECONDS_DAY,
        action_type: ActionType::ModifyUserType.as_u64(),
        key: "1".into(),
        new_value: "150".into(),
    })
    .expect("proposal");
    // the proposing route node votes implicitly; 2 of 3 are needed
    let err = submit(&mut ledger, routes[0], 101, START + 10, TxPayload::Govern { action_id: action(9) }).unwrap_err();
    assert!(matches!(err, LedgerError::ActionNotConfirmed));

    submit(&mut ledger, routes[1], 102, START + 20, TxPayload::Vote { action_id: action(9) }).expect("vote");
    submit(&mut ledger, routes[1], 103, START + 30, TxPayload::Withdrawn { action_id: action(9) }).expect("withdraw");
    let voters = ledger.actions().get(&action(9)).map(|a| a.voters.clone()).expect("action");
    assert!(!is_confirmed(&voters, 3, &ledger.params().root_address));

    submit(&mut ledger, routes[2], 104, START + 40, TxPayload::Vote { action_id: action(9) }).expect("vote");
    submit(&mut ledger, routes[0], 105, START + 50, TxPayload::Govern { action_id: action(9) }).expect("govern");
    ledger.commit().expect("commit");
    assert!(ledger.user_types().check_fee(1, 150));
}

#[test]
fn withdraw_requires_route_node() {
    let mut ledger = open_memory_ledger(genesis());
    let root = ledger.params().root_address;
    submit(&mut ledger, root, 1, START, TxPayload::Proposal {
        action_id: action(3),
        start_time: START,
        end_time: START + 7 * SECONDS_DAY,
        action_type: ActionType::ModifySysParam.as_u64(),
        key: "serPerc".into(),
        new_value: "60".into(),
    })
    .expect("proposal");
    let err = submit(&mut ledger, addr(0x61), 2, START, TxPayload::Withdrawn { action_id: action(3) }).unwrap_err();
    assert_eq!(err.to_string(), "sender is not route node");

    submit(&mut ledger, root, 3, START + 1, TxPayload::Govern { action_id: action(3) }).expect("govern");
    assert_eq!(ledger.params().ser_perc, 60);
    assert_eq!(ledger.params().route_perc, 40);
}

#[test]
fn proposal_rejects_out_of_range_percentage_at_govern() {
    let mut ledger = open_memory_ledger(genesis());
    let root = ledger.params().root_address;
    submit(&mut ledger, root, 1, START, TxPayload::Proposal {
        action_id: action(4),
        start_time: START,
        end_time: START + 7 * SECONDS_DAY,
        action_type: ActionType::ModifySysParam.as_u64(),
        key: "burn".into(),
        new_value: "99".into(),
    })
    .expect("proposal");
    let err = submit(&mut ledger, root, 2, START + 1, TxPayload::Govern { action_id: action(4) }).unwrap_err();
    assert!(matches!(err, LedgerError::Percentage));
    assert_eq!(ledger.params().burn_perc, 20);

    let err = submit(&mut ledger, root, 3, START, TxPayload::Proposal {
        action_id: action(5),
        start_time: START,
        end_time: START + 7 * SECONDS_DAY,
        action_type: 42,
        key: "burn".into(),
        new_value: "30".into(),
    })
    .unwrap_err();
    assert_eq!(err.to_string(), "action type not exist");
}

// ============================================================
// COMMIT / ABORT
// ============================================================

#[test]
fn abort_restores_pre_block_state() {
    let mut ledger = open_memory_ledger(genesis());
    let staker = addr(0x71);
    ledger.set_balance(staker, ROUTE_STAKE);
    ledger.commit().expect("commit");

    stake_node(&mut ledger, staker, StakerRole::Route, 8, 1, START);
    assert!(ledger.stakers().is_route(&staker));
    ledger.abort();

    assert!(!ledger.stakers().is_route(&staker));
    assert!(ledger.actions().get(&action(1)).is_none());
    assert!(ledger.details().details().is_empty());
    assert_eq!(ledger.balance(&staker).expect("balance"), ROUTE_STAKE);
}

#[test]
fn activity_projection_of_executed_tx() {
    let payload = TxPayload::Stake {
        staker_type: 1,
        stake_amount: ROUTE_STAKE,
        staker_addr: addr(0x81),
    };
    let activity = payload.activity(START as i64, tx_id(7), &addr(0x81));
    assert_eq!(activity.typ, "stake");
    assert_eq!(activity.stake_amount, Some(ROUTE_STAKE));
    assert_eq!(activity.sender.as_deref(), Some(addr(0x81).to_prefixed_hex().as_str()));
}
