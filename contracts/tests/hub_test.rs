//! Integration tests for the knowledge hub.
//!
//! These run the hub against a real token ledger and check the invariants
//! that only show up across several operations: tallies, the reward flow,
//! pool exhaustion and the anti-abuse rules.

use knowhub_contracts::events::HubEvent;
use knowhub_contracts::knowledge_hub::{HubError, KnowledgeHub, VoteDirection};
use knowhub_contracts::token_ledger::TokenLedger;
use knowhub_protocol::config::{ONE_TOKEN, UPVOTE_REWARD};
use knowhub_protocol::Address;

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

/// Ledger owned by "owner", hub "hub" funded with `pool_tokens` whole tokens.
fn funded_hub(pool_tokens: u128) -> (TokenLedger, KnowledgeHub) {
    let owner = addr("owner");
    let mut ledger = TokenLedger::new(addr("token"), owner.clone());
    let hub = KnowledgeHub::new(addr("hub"), &ledger);
    if pool_tokens > 0 {
        ledger
            .mint(&owner, hub.address(), pool_tokens * ONE_TOKEN)
            .unwrap();
    }
    (ledger, hub)
}

// ---------------------------------------------------------------------------
// Reference Scenario
// ---------------------------------------------------------------------------

#[test]
fn intro_entry_scenario() {
    let (mut ledger, mut hub) = funded_hub(1_000);
    let (a, b, c) = (addr("A"), addr("B"), addr("C"));

    // 1. A publishes.
    let id = hub.submit_entry(&a, "Intro", "Qm123").unwrap();
    assert_eq!(id, 1);

    // 2. B upvotes: counts move, A is paid.
    hub.vote_on_entry(&mut ledger, &b, id, true).unwrap();
    let entry = hub.get_entry(id).unwrap();
    assert_eq!((entry.upvotes, entry.downvotes, entry.vote_score), (1, 0, 1));
    let status = hub.get_vote_status(id, &b);
    assert_eq!((status.has_voted, status.is_upvote), (true, true));
    assert_eq!(ledger.balance_of(&a), 10 * ONE_TOKEN);

    // 3. C downvotes: score back to zero, nobody is paid.
    let pool_before = hub.get_contract_token_balance(&ledger);
    hub.vote_on_entry(&mut ledger, &c, id, false).unwrap();
    let entry = hub.get_entry(id).unwrap();
    assert_eq!((entry.upvotes, entry.downvotes, entry.vote_score), (1, 1, 0));
    assert_eq!(ledger.balance_of(&a), 10 * ONE_TOKEN);
    assert_eq!(hub.get_contract_token_balance(&ledger), pool_before);

    // 4. B again.
    assert_eq!(
        hub.vote_on_entry(&mut ledger, &b, id, true),
        Err(HubError::DuplicateVote {
            entry_id: id,
            voter: b.clone()
        })
    );

    // 5. A on its own entry.
    assert_eq!(
        hub.vote_on_entry(&mut ledger, &a, id, true),
        Err(HubError::SelfVoteForbidden {
            entry_id: id,
            voter: a.clone()
        })
    );

    let entry = hub.get_entry(id).unwrap();
    assert_eq!((entry.upvotes, entry.downvotes, entry.vote_score), (1, 1, 0));
}

// ---------------------------------------------------------------------------
// Tallies
// ---------------------------------------------------------------------------

#[test]
fn score_tracks_counts_over_many_votes() {
    let (mut ledger, mut hub) = funded_hub(0);
    let id = hub.submit_entry(&addr("creator"), "t", "r").unwrap();

    for i in 0..50u32 {
        let voter = addr(&format!("voter-{i}"));
        hub.vote_on_entry(&mut ledger, &voter, id, i % 3 != 0).unwrap();
        let entry = hub.get_entry(id).unwrap();
        assert_eq!(
            entry.vote_score,
            entry.upvotes as i64 - entry.downvotes as i64
        );
    }

    let entry = hub.get_entry(id).unwrap();
    assert_eq!(entry.upvotes + entry.downvotes, 50);
    assert_eq!(entry.downvotes, 17);
}

#[test]
fn votes_on_one_entry_do_not_touch_another() {
    let (mut ledger, mut hub) = funded_hub(100);
    let first = hub.submit_entry(&addr("a"), "one", "r1").unwrap();
    let second = hub.submit_entry(&addr("a"), "two", "r2").unwrap();

    hub.vote_on_entry(&mut ledger, &addr("b"), first, true).unwrap();
    // The same voter may vote on a different entry.
    hub.vote_on_entry(&mut ledger, &addr("b"), second, false).unwrap();

    assert_eq!(hub.get_entry(first).unwrap().vote_score, 1);
    assert_eq!(hub.get_entry(second).unwrap().vote_score, -1);
    assert_eq!(
        hub.get_vote_status(first, &addr("b")).direction(),
        Some(VoteDirection::Up)
    );
    assert_eq!(
        hub.get_vote_status(second, &addr("b")).direction(),
        Some(VoteDirection::Down)
    );
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

#[test]
fn n_upvotes_pay_exactly_n_rewards() {
    let (mut ledger, mut hub) = funded_hub(1_000);
    let creator = addr("creator");
    let id = hub.submit_entry(&creator, "t", "r").unwrap();

    for i in 0..7 {
        hub.vote_on_entry(&mut ledger, &addr(&format!("v{i}")), id, true)
            .unwrap();
    }

    assert_eq!(ledger.balance_of(&creator), 7 * UPVOTE_REWARD);
    assert_eq!(
        hub.get_contract_token_balance(&ledger),
        1_000 * ONE_TOKEN - 7 * UPVOTE_REWARD
    );
    assert!(ledger.is_consistent());
}

#[test]
fn pool_exhaustion_degrades_to_unpaid_upvotes() {
    // 25 tokens: two rewards, then 5 tokens left over.
    let (mut ledger, mut hub) = funded_hub(25);
    let creator = addr("creator");
    let id = hub.submit_entry(&creator, "t", "r").unwrap();
    hub.drain_events();

    for i in 0..4 {
        hub.vote_on_entry(&mut ledger, &addr(&format!("v{i}")), id, true)
            .unwrap();
    }

    assert_eq!(hub.get_entry(id).unwrap().upvotes, 4);
    assert_eq!(ledger.balance_of(&creator), 2 * UPVOTE_REWARD);
    assert_eq!(hub.get_contract_token_balance(&ledger), 5 * ONE_TOKEN);

    let rewards = hub
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, HubEvent::RewardDistributed { .. }))
        .count();
    assert_eq!(rewards, 2);
}

#[test]
fn topping_up_the_pool_resumes_rewards() {
    let (mut ledger, mut hub) = funded_hub(0);
    let creator = addr("creator");
    let id = hub.submit_entry(&creator, "t", "r").unwrap();

    hub.vote_on_entry(&mut ledger, &addr("v1"), id, true).unwrap();
    assert_eq!(ledger.balance_of(&creator), 0);

    // Anyone can fund the pool with a plain transfer.
    ledger
        .mint(&addr("owner"), &addr("sponsor"), 50 * ONE_TOKEN)
        .unwrap();
    ledger
        .transfer(&addr("sponsor"), hub.address(), 50 * ONE_TOKEN)
        .unwrap();

    hub.vote_on_entry(&mut ledger, &addr("v2"), id, true).unwrap();
    assert_eq!(ledger.balance_of(&creator), UPVOTE_REWARD);
}

#[test]
fn upvote_on_hub_authored_entry_pays_nothing() {
    let (mut ledger, mut hub) = funded_hub(100);
    let hub_address = hub.address().clone();
    let id = hub.submit_entry(&hub_address, "House rules", "Qm-rules").unwrap();
    hub.drain_events();
    ledger.drain_events();

    let pool_before = hub.get_contract_token_balance(&ledger);
    hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();

    // The vote stands; the reward is skipped without a notification.
    assert_eq!(hub.get_entry(id).unwrap().upvotes, 1);
    assert_eq!(hub.get_contract_token_balance(&ledger), pool_before);
    assert!(hub
        .events()
        .iter()
        .all(|e| !matches!(e, HubEvent::RewardDistributed { .. })));
    assert!(ledger.drain_events().is_empty());
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn index_is_creation_ordered_across_creators() {
    let (_, mut hub) = funded_hub(0);
    let creators = ["x", "y", "x", "z", "x"];
    for (i, c) in creators.iter().enumerate() {
        hub.submit_entry(&addr(c), &format!("title {i}"), "ref")
            .unwrap();
    }

    assert_eq!(hub.get_entry_count(), 5);
    assert_eq!(hub.get_all_entry_ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(hub.get_entries_by_creator(&addr("x")), vec![1, 3, 5]);
    assert_eq!(hub.get_entries_by_creator(&addr("z")), vec![4]);
    assert!(hub.get_entries_by_creator(&addr("w")).is_empty());
}

#[test]
fn hub_state_survives_serialization() {
    let (mut ledger, mut hub) = funded_hub(100);
    let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
    hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();

    let bytes = bincode::serialize(&hub).unwrap();
    let restored: KnowledgeHub = bincode::deserialize(&bytes).unwrap();

    assert_eq!(restored.get_entry(id).unwrap(), hub.get_entry(id).unwrap());
    assert_eq!(
        restored.get_vote_status(id, &addr("b")),
        hub.get_vote_status(id, &addr("b"))
    );
    // Pending events are not part of the persisted state.
    assert!(restored.events().is_empty());
}
