//! Bootstrap and end-to-end flows through a [`Deployment`].

use knowhub_contracts::deployment::{BootstrapConfig, Deployment};
use knowhub_contracts::events::{Event, HubEvent, LedgerEvent};
use knowhub_protocol::config::{ONE_TOKEN, UPVOTE_REWARD};
use knowhub_protocol::Address;

#[test]
fn bootstrap_then_vote_pays_from_pool() {
    let mut deployment = Deployment::bootstrap(&BootstrapConfig::default()).unwrap();
    let (alice, bob) = (Address::derive("alice"), Address::derive("bob"));

    let id = deployment.submit_entry(&alice, "Rust ownership", "bafy-ownership").unwrap();
    deployment.vote_on_entry(&bob, id, true).unwrap();

    assert_eq!(deployment.ledger.balance_of(&alice), UPVOTE_REWARD);
    assert_eq!(deployment.pool_balance(), 10_000 * ONE_TOKEN - UPVOTE_REWARD);
    assert!(deployment.ledger.is_consistent());
}

#[test]
fn bootstrap_events_record_the_pool_mint() {
    let alice = Address::derive("alice");
    let config = BootstrapConfig {
        initial_pool: 500 * ONE_TOKEN,
        test_balances: vec![(alice.clone(), 3 * ONE_TOKEN)],
        ..BootstrapConfig::default()
    };
    let mut deployment = Deployment::bootstrap(&config).unwrap();

    assert_eq!(
        deployment.drain_events(),
        vec![
            Event::Ledger(LedgerEvent::Transfer {
                from: None,
                to: Some(config.hub.clone()),
                amount: 500 * ONE_TOKEN
            }),
            Event::Ledger(LedgerEvent::Transfer {
                from: None,
                to: Some(alice),
                amount: 3 * ONE_TOKEN
            }),
        ]
    );
}

#[test]
fn empty_pool_deployment_still_accepts_votes() {
    let config = BootstrapConfig {
        initial_pool: 0,
        ..BootstrapConfig::default()
    };
    let mut deployment = Deployment::bootstrap(&config).unwrap();
    let (alice, bob) = (Address::derive("alice"), Address::derive("bob"));

    let id = deployment.submit_entry(&alice, "t", "r").unwrap();
    deployment.drain_events();
    deployment.vote_on_entry(&bob, id, true).unwrap();

    assert_eq!(deployment.hub.get_entry(id).unwrap().upvotes, 1);
    assert_eq!(deployment.ledger.balance_of(&alice), 0);
    assert_eq!(
        deployment.drain_events(),
        vec![Event::Hub(HubEvent::EntryVoted {
            entry_id: id,
            voter: bob,
            is_upvote: true
        })]
    );
}

#[test]
fn deployment_snapshot_round_trip() {
    let mut deployment = Deployment::bootstrap(&BootstrapConfig::default()).unwrap();
    let (alice, bob) = (Address::derive("alice"), Address::derive("bob"));
    let id = deployment.submit_entry(&alice, "t", "r").unwrap();
    deployment.vote_on_entry(&bob, id, false).unwrap();

    let bytes = bincode::serialize(&deployment).unwrap();
    let mut restored: Deployment = bincode::deserialize(&bytes).unwrap();

    assert_eq!(restored.hub.get_entry(id).unwrap().vote_score, -1);
    assert_eq!(restored.pool_balance(), deployment.pool_balance());
    assert!(restored.drain_events().is_empty());

    // Ids keep counting after a reload.
    assert_eq!(restored.submit_entry(&alice, "t2", "r2").unwrap(), 2);
}
