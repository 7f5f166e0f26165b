//! # Knowledge Hub Contract
//!
//! Actors publish short knowledge entries, other actors vote on them, and
//! every upvote pays the entry's creator a fixed reward out of a pre-funded
//! pool. The hub is three cooperating parts over one state container:
//!
//! 1. **Entry registry** — allocates sequential ids (1, 2, 3, …; 0 means
//!    "no such entry") and keeps the creation-order index.
//! 2. **Voting state machine** — one vote per `(entry, voter)`, never by
//!    the creator, never changed afterwards.
//! 3. **Reward distributor** — on upvote, moves [`UPVOTE_REWARD`] from the
//!    hub's own ledger balance (the pool) to the creator.
//!
//! ## Per-voter state machine
//!
//! ```text
//!            vote(up)   ┌──────────┐
//!         ┌───────────▶ │ VotedUp  │  (terminal)
//! ┌────────┐            └──────────┘
//! │ NoVote │
//! └────────┘ vote(down) ┌──────────┐
//!         └───────────▶ │ VotedDown│  (terminal)
//!                       └──────────┘
//! ```
//!
//! ## Reward asymmetry
//!
//! A vote is committed *before* the reward is attempted. If the pool cannot
//! cover the reward, or the transfer fails for any other reason, the vote
//! stands and the reward is skipped: no error, no notification, no debt.
//! Voting must never depend on pool solvency.
//!
//! The content behind `content_ref` lives elsewhere (IPFS, S3, …). The hub
//! stores the reference verbatim and never looks inside it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use knowhub_protocol::config::UPVOTE_REWARD;
use knowhub_protocol::units::format_units;
use knowhub_protocol::Address;

use crate::events::HubEvent;
use crate::token_ledger::TokenLedger;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during hub operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Caller-supplied data was malformed (e.g. an empty title).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced entry does not exist.
    #[error("entry not found: {0}")]
    NotFound(EntryId),

    /// The voter already voted on this entry.
    #[error("duplicate vote: {voter} already voted on entry {entry_id}")]
    DuplicateVote {
        /// The entry voted on.
        entry_id: EntryId,
        /// The repeat voter.
        voter: Address,
    },

    /// The entry's creator tried to vote on it.
    #[error("self vote forbidden: {voter} created entry {entry_id}")]
    SelfVoteForbidden {
        /// The entry voted on.
        entry_id: EntryId,
        /// The creator.
        voter: Address,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Sequential entry identifier. Real ids start at 1.
pub type EntryId = u64;

/// Reserved id that never refers to an entry.
pub const NO_ENTRY: EntryId = 0;

/// A published knowledge entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Sequential id, assigned at submission.
    pub id: EntryId,
    /// The identity that submitted the entry.
    pub creator: Address,
    /// Non-empty title.
    pub title: String,
    /// Opaque, non-empty pointer to the entry body (e.g. an IPFS CID).
    pub content_ref: String,
    /// Number of upvotes received.
    pub upvotes: u64,
    /// Number of downvotes received.
    pub downvotes: u64,
    /// `upvotes - downvotes`.
    pub vote_score: i64,
    /// When the entry was submitted.
    pub created_at: DateTime<Utc>,
}

/// The direction of a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDirection {
    /// An upvote.
    Up,
    /// A downvote.
    Down,
}

impl std::fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteDirection::Up => write!(f, "up"),
            VoteDirection::Down => write!(f, "down"),
        }
    }
}

/// One identity's vote on one entry.
///
/// The default value `(false, false)` means "never voted". `is_upvote` is
/// only meaningful when `has_voted` is set; use [`direction`](Self::direction)
/// to avoid reading a missing vote as a downvote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub has_voted: bool,
    pub is_upvote: bool,
}

impl VoteRecord {
    /// The recorded direction, or `None` if no vote was cast.
    pub fn direction(&self) -> Option<VoteDirection> {
        match (self.has_voted, self.is_upvote) {
            (false, _) => None,
            (true, true) => Some(VoteDirection::Up),
            (true, false) => Some(VoteDirection::Down),
        }
    }
}

// ---------------------------------------------------------------------------
// KnowledgeHub
// ---------------------------------------------------------------------------

/// The hub state container: entries, votes and the creation-order index.
///
/// The hub holds no balances itself. Its [`address`](Self::address) is an
/// account on the bound [`TokenLedger`], and that account's balance is the
/// reward pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeHub {
    /// The hub's identity on the ledger. Its balance is the reward pool.
    address: Address,
    /// Identity of the ledger this hub was bound to at construction.
    ledger: Address,
    /// Entries keyed by id.
    entries: BTreeMap<EntryId, KnowledgeEntry>,
    /// Ids in creation order. Append-only.
    entry_index: Vec<EntryId>,
    /// `entry_id -> (voter -> vote)`.
    votes: BTreeMap<EntryId, BTreeMap<Address, VoteRecord>>,
    /// The id the next submission receives.
    next_entry_id: EntryId,
    /// Notifications waiting to be drained by the host.
    #[serde(skip)]
    events: Vec<HubEvent>,
}

impl KnowledgeHub {
    /// Creates an empty hub with identity `address`, bound to `ledger`.
    pub fn new(address: Address, ledger: &TokenLedger) -> Self {
        Self {
            address,
            ledger: ledger.address().clone(),
            entries: BTreeMap::new(),
            entry_index: Vec::new(),
            votes: BTreeMap::new(),
            next_entry_id: 1,
            events: Vec::new(),
        }
    }

    // -- Entry registry -----------------------------------------------------

    /// Registers a new entry and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidInput`] if `title` or `content_ref` is
    /// empty. No id is consumed in that case.
    pub fn submit_entry(
        &mut self,
        caller: &Address,
        title: &str,
        content_ref: &str,
    ) -> Result<EntryId, HubError> {
        self.submit_entry_at(caller, title, content_ref, Utc::now())
    }

    /// Same as [`submit_entry`](Self::submit_entry) with an explicit
    /// creation timestamp, for hosts that supply their own clock.
    pub fn submit_entry_at(
        &mut self,
        caller: &Address,
        title: &str,
        content_ref: &str,
        created_at: DateTime<Utc>,
    ) -> Result<EntryId, HubError> {
        if title.is_empty() {
            return Err(HubError::InvalidInput("title must not be empty".into()));
        }
        if content_ref.is_empty() {
            return Err(HubError::InvalidInput(
                "content reference must not be empty".into(),
            ));
        }

        let id = self.next_entry_id;
        self.next_entry_id += 1;

        self.entries.insert(
            id,
            KnowledgeEntry {
                id,
                creator: caller.clone(),
                title: title.to_string(),
                content_ref: content_ref.to_string(),
                upvotes: 0,
                downvotes: 0,
                vote_score: 0,
                created_at,
            },
        );
        self.entry_index.push(id);
        self.events.push(HubEvent::EntrySubmitted {
            entry_id: id,
            creator: caller.clone(),
            title: title.to_string(),
            content_ref: content_ref.to_string(),
        });

        info!(entry_id = id, creator = %caller, "entry submitted");
        Ok(id)
    }

    /// Returns the entry with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] for id 0 or any unassigned id.
    pub fn get_entry(&self, entry_id: EntryId) -> Result<&KnowledgeEntry, HubError> {
        debug!(entry_id, "entry lookup");
        self.entries
            .get(&entry_id)
            .ok_or(HubError::NotFound(entry_id))
    }

    /// Number of entries ever submitted.
    pub fn get_entry_count(&self) -> usize {
        self.entry_index.len()
    }

    /// All entry ids in creation order.
    pub fn get_all_entry_ids(&self) -> Vec<EntryId> {
        self.entry_index.clone()
    }

    /// Ids of the entries submitted by `creator`, in creation order.
    /// Empty if the identity never submitted anything.
    pub fn get_entries_by_creator(&self, creator: &Address) -> Vec<EntryId> {
        debug!(creator = %creator, "entries by creator lookup");
        self.entry_index
            .iter()
            .copied()
            .filter(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|entry| &entry.creator == creator)
            })
            .collect()
    }

    // -- Voting -------------------------------------------------------------

    /// Records `caller`'s vote on `entry_id` and, for an upvote, tries to pay
    /// the creator from the pool held on `ledger`.
    ///
    /// Preconditions are checked in order; the first failure wins and
    /// nothing is changed:
    ///
    /// 1. the entry exists,
    /// 2. `caller` has not voted on it yet,
    /// 3. `caller` is not its creator.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`], [`HubError::DuplicateVote`] or
    /// [`HubError::SelfVoteForbidden`]. A missing or failed reward is never
    /// an error.
    pub fn vote_on_entry(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &Address,
        entry_id: EntryId,
        is_upvote: bool,
    ) -> Result<(), HubError> {
        let entry = self
            .entries
            .get_mut(&entry_id)
            .ok_or(HubError::NotFound(entry_id))?;

        let already_voted = self
            .votes
            .get(&entry_id)
            .is_some_and(|voters| voters.contains_key(caller));
        if already_voted {
            return Err(HubError::DuplicateVote {
                entry_id,
                voter: caller.clone(),
            });
        }

        if &entry.creator == caller {
            return Err(HubError::SelfVoteForbidden {
                entry_id,
                voter: caller.clone(),
            });
        }

        // Commit the vote. Nothing below may undo it.
        self.votes.entry(entry_id).or_default().insert(
            caller.clone(),
            VoteRecord {
                has_voted: true,
                is_upvote,
            },
        );
        if is_upvote {
            entry.upvotes += 1;
            entry.vote_score += 1;
        } else {
            entry.downvotes += 1;
            entry.vote_score -= 1;
        }
        debug_assert_eq!(
            entry.vote_score,
            entry.upvotes as i64 - entry.downvotes as i64
        );

        let creator = entry.creator.clone();
        info!(
            entry_id,
            voter = %caller,
            is_upvote,
            score = entry.vote_score,
            "vote recorded"
        );
        self.events.push(HubEvent::EntryVoted {
            entry_id,
            voter: caller.clone(),
            is_upvote,
        });

        if is_upvote {
            self.distribute_reward(ledger, entry_id, &creator);
        }
        Ok(())
    }

    /// The vote `voter` cast on `entry_id`, or `(false, false)` if none.
    pub fn get_vote_status(&self, entry_id: EntryId, voter: &Address) -> VoteRecord {
        debug!(entry_id, voter = %voter, "vote status lookup");
        self.votes
            .get(&entry_id)
            .and_then(|voters| voters.get(voter))
            .copied()
            .unwrap_or_default()
    }

    // -- Rewards ------------------------------------------------------------

    /// Pays [`UPVOTE_REWARD`] from the pool to `recipient` if the pool can
    /// cover it. Never fails: every problem degrades to a skipped reward.
    fn distribute_reward(
        &mut self,
        ledger: &mut TokenLedger,
        entry_id: EntryId,
        recipient: &Address,
    ) {
        if ledger.address() != &self.ledger {
            warn!(
                entry_id,
                expected = %self.ledger,
                got = %ledger.address(),
                "reward skipped: hub is bound to a different ledger"
            );
            return;
        }

        // Paying the hub from its own pool moves nothing.
        if recipient == &self.address {
            warn!(
                entry_id,
                recipient = %recipient,
                "reward skipped: recipient is the hub itself"
            );
            return;
        }

        let pool = ledger.balance_of(&self.address);
        if pool < UPVOTE_REWARD {
            warn!(
                entry_id,
                recipient = %recipient,
                pool = %format_units(pool),
                "reward skipped: pool cannot cover the upvote reward"
            );
            return;
        }

        match ledger.transfer(&self.address, recipient, UPVOTE_REWARD) {
            Ok(()) => {
                self.events.push(HubEvent::RewardDistributed {
                    entry_id,
                    recipient: recipient.clone(),
                    amount: UPVOTE_REWARD,
                });
                info!(
                    entry_id,
                    recipient = %recipient,
                    amount = %format_units(UPVOTE_REWARD),
                    "reward distributed"
                );
            }
            Err(e) => {
                warn!(
                    entry_id,
                    recipient = %recipient,
                    error = %e,
                    "reward skipped: transfer failed"
                );
            }
        }
    }

    /// The reward pool: the hub's own balance on `ledger`.
    pub fn get_contract_token_balance(&self, ledger: &TokenLedger) -> u128 {
        ledger.balance_of(&self.address)
    }

    /// Amount paid per upvote, in the smallest unit.
    pub fn reward_amount(&self) -> u128 {
        UPVOTE_REWARD
    }

    // -- Accessors ----------------------------------------------------------

    /// The hub's identity on the ledger.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Identity of the ledger this hub is bound to.
    pub fn ledger_address(&self) -> &Address {
        &self.ledger
    }

    /// Notifications emitted since the last drain.
    pub fn events(&self) -> &[HubEvent] {
        &self.events
    }

    /// Takes all pending notifications.
    pub fn drain_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowhub_protocol::config::ONE_TOKEN;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    /// Ledger owned by "owner", hub "hub" funded with `pool` units.
    fn setup(pool: u128) -> (TokenLedger, KnowledgeHub) {
        let mut ledger = TokenLedger::new(addr("token"), addr("owner"));
        let hub = KnowledgeHub::new(addr("hub"), &ledger);
        if pool > 0 {
            ledger.mint(&addr("owner"), hub.address(), pool).unwrap();
        }
        ledger.drain_events();
        (ledger, hub)
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let (_, mut hub) = setup(0);
        assert_eq!(hub.submit_entry(&addr("a"), "t1", "r1").unwrap(), 1);
        assert_eq!(hub.submit_entry(&addr("b"), "t2", "r2").unwrap(), 2);
        assert_eq!(hub.submit_entry(&addr("a"), "t3", "r3").unwrap(), 3);
        assert_eq!(hub.get_all_entry_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn failed_submit_consumes_no_id() {
        let (_, mut hub) = setup(0);
        assert!(matches!(
            hub.submit_entry(&addr("a"), "", "ref"),
            Err(HubError::InvalidInput(_))
        ));
        assert!(matches!(
            hub.submit_entry(&addr("a"), "title", ""),
            Err(HubError::InvalidInput(_))
        ));
        assert_eq!(hub.get_entry_count(), 0);
        assert!(hub.events().is_empty());
        assert_eq!(hub.submit_entry(&addr("a"), "title", "ref").unwrap(), 1);
    }

    #[test]
    fn new_entry_has_zeroed_counters() {
        let (_, mut hub) = setup(0);
        let id = hub.submit_entry(&addr("a"), "Intro", "Qm123").unwrap();
        let entry = hub.get_entry(id).unwrap();
        assert_eq!(entry.creator, addr("a"));
        assert_eq!(entry.title, "Intro");
        assert_eq!(entry.content_ref, "Qm123");
        assert_eq!((entry.upvotes, entry.downvotes, entry.vote_score), (0, 0, 0));
    }

    #[test]
    fn get_entry_zero_and_unknown_not_found() {
        let (_, mut hub) = setup(0);
        hub.submit_entry(&addr("a"), "t", "r").unwrap();
        assert_eq!(hub.get_entry(NO_ENTRY), Err(HubError::NotFound(0)));
        assert_eq!(hub.get_entry(2), Err(HubError::NotFound(2)));
    }

    #[test]
    fn entries_by_creator_preserve_order() {
        let (_, mut hub) = setup(0);
        hub.submit_entry(&addr("a"), "1", "r").unwrap();
        hub.submit_entry(&addr("b"), "2", "r").unwrap();
        hub.submit_entry(&addr("a"), "3", "r").unwrap();
        assert_eq!(hub.get_entries_by_creator(&addr("a")), vec![1, 3]);
        assert_eq!(hub.get_entries_by_creator(&addr("b")), vec![2]);
        assert!(hub.get_entries_by_creator(&addr("nobody")).is_empty());
    }

    #[test]
    fn upvote_pays_creator() {
        let (mut ledger, mut hub) = setup(100 * ONE_TOKEN);
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();

        let entry = hub.get_entry(id).unwrap();
        assert_eq!((entry.upvotes, entry.downvotes, entry.vote_score), (1, 0, 1));
        assert_eq!(ledger.balance_of(&addr("a")), UPVOTE_REWARD);
        assert_eq!(hub.get_contract_token_balance(&ledger), 90 * ONE_TOKEN);
    }

    #[test]
    fn downvote_pays_nothing() {
        let (mut ledger, mut hub) = setup(100 * ONE_TOKEN);
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        hub.vote_on_entry(&mut ledger, &addr("b"), id, false).unwrap();

        let entry = hub.get_entry(id).unwrap();
        assert_eq!((entry.upvotes, entry.downvotes, entry.vote_score), (0, 1, -1));
        assert_eq!(ledger.balance_of(&addr("a")), 0);
        assert_eq!(hub.get_contract_token_balance(&ledger), 100 * ONE_TOKEN);
    }

    #[test]
    fn vote_precondition_order() {
        let (mut ledger, mut hub) = setup(0);
        assert_eq!(
            hub.vote_on_entry(&mut ledger, &addr("a"), 1, true),
            Err(HubError::NotFound(1))
        );
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        assert_eq!(
            hub.vote_on_entry(&mut ledger, &addr("a"), id, true),
            Err(HubError::SelfVoteForbidden {
                entry_id: id,
                voter: addr("a")
            })
        );
        hub.vote_on_entry(&mut ledger, &addr("b"), id, false).unwrap();
        assert_eq!(
            hub.vote_on_entry(&mut ledger, &addr("b"), id, true),
            Err(HubError::DuplicateVote {
                entry_id: id,
                voter: addr("b")
            })
        );
    }

    #[test]
    fn rejected_votes_leave_state_untouched() {
        let (mut ledger, mut hub) = setup(100 * ONE_TOKEN);
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();
        let before = hub.get_entry(id).unwrap().clone();
        let balance_before = ledger.balance_of(&addr("a"));
        hub.drain_events();

        assert!(hub.vote_on_entry(&mut ledger, &addr("b"), id, false).is_err());
        assert!(hub.vote_on_entry(&mut ledger, &addr("a"), id, true).is_err());

        assert_eq!(hub.get_entry(id).unwrap(), &before);
        assert_eq!(ledger.balance_of(&addr("a")), balance_before);
        assert!(hub.events().is_empty());
        assert_eq!(hub.get_vote_status(id, &addr("a")), VoteRecord::default());
    }

    #[test]
    fn vote_status_reports_direction() {
        let (mut ledger, mut hub) = setup(0);
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();
        hub.vote_on_entry(&mut ledger, &addr("c"), id, false).unwrap();

        assert_eq!(
            hub.get_vote_status(id, &addr("b")).direction(),
            Some(VoteDirection::Up)
        );
        assert_eq!(
            hub.get_vote_status(id, &addr("c")).direction(),
            Some(VoteDirection::Down)
        );
        let none = hub.get_vote_status(id, &addr("d"));
        assert_eq!((none.has_voted, none.is_upvote), (false, false));
        assert_eq!(none.direction(), None);
        assert_eq!(hub.get_vote_status(99, &addr("b")), VoteRecord::default());
    }

    #[test]
    fn empty_pool_skips_reward_but_keeps_vote() {
        let (mut ledger, mut hub) = setup(UPVOTE_REWARD - 1);
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        hub.drain_events();

        hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();

        assert_eq!(hub.get_entry(id).unwrap().upvotes, 1);
        assert_eq!(ledger.balance_of(&addr("a")), 0);
        assert_eq!(hub.get_contract_token_balance(&ledger), UPVOTE_REWARD - 1);
        assert_eq!(
            hub.drain_events(),
            vec![HubEvent::EntryVoted {
                entry_id: id,
                voter: addr("b"),
                is_upvote: true
            }]
        );
    }

    #[test]
    fn pool_exhausts_after_exact_number_of_rewards() {
        let (mut ledger, mut hub) = setup(2 * UPVOTE_REWARD);
        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        for voter in ["b", "c", "d"] {
            hub.vote_on_entry(&mut ledger, &addr(voter), id, true).unwrap();
        }
        assert_eq!(hub.get_entry(id).unwrap().upvotes, 3);
        assert_eq!(ledger.balance_of(&addr("a")), 2 * UPVOTE_REWARD);
        assert_eq!(hub.get_contract_token_balance(&ledger), 0);
    }

    #[test]
    fn foreign_ledger_skips_reward() {
        let (_, mut hub) = setup(0);
        let mut other = TokenLedger::new(addr("other-token"), addr("owner"));
        other
            .mint(&addr("owner"), &addr("hub"), 100 * ONE_TOKEN)
            .unwrap();

        let id = hub.submit_entry(&addr("a"), "t", "r").unwrap();
        hub.vote_on_entry(&mut other, &addr("b"), id, true).unwrap();

        assert_eq!(hub.get_entry(id).unwrap().upvotes, 1);
        assert_eq!(other.balance_of(&addr("a")), 0);
    }

    #[test]
    fn events_follow_operation_order() {
        let (mut ledger, mut hub) = setup(100 * ONE_TOKEN);
        let id = hub.submit_entry(&addr("a"), "Intro", "Qm123").unwrap();
        hub.vote_on_entry(&mut ledger, &addr("b"), id, true).unwrap();

        assert_eq!(
            hub.drain_events(),
            vec![
                HubEvent::EntrySubmitted {
                    entry_id: id,
                    creator: addr("a"),
                    title: "Intro".into(),
                    content_ref: "Qm123".into(),
                },
                HubEvent::EntryVoted {
                    entry_id: id,
                    voter: addr("b"),
                    is_upvote: true,
                },
                HubEvent::RewardDistributed {
                    entry_id: id,
                    recipient: addr("a"),
                    amount: UPVOTE_REWARD,
                },
            ]
        );
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let (_, mut hub) = setup(0);
        let at = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = hub.submit_entry_at(&addr("a"), "t", "r", at).unwrap();
        assert_eq!(hub.get_entry(id).unwrap().created_at, at);
    }
}
