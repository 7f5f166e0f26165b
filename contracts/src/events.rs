//! # Notifications
//!
//! Side-effect notifications emitted by the ledger and the hub. They are not
//! return values: a component appends them to its own buffer as part of a
//! successful operation, and the host drains the buffer after it has
//! committed the resulting state.
//!
//! A failed operation never leaves an event behind, because every operation
//! validates all of its preconditions before it mutates anything (events
//! included).

use serde::{Deserialize, Serialize};

use knowhub_protocol::Address;

use crate::knowledge_hub::EntryId;

/// Notifications emitted by the [`KnowledgeHub`](crate::knowledge_hub::KnowledgeHub).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubEvent {
    /// A new entry was registered.
    EntrySubmitted {
        entry_id: EntryId,
        creator: Address,
        title: String,
        content_ref: String,
    },
    /// A vote was recorded.
    EntryVoted {
        entry_id: EntryId,
        voter: Address,
        is_upvote: bool,
    },
    /// An upvote reward was paid out of the pool.
    RewardDistributed {
        entry_id: EntryId,
        recipient: Address,
        amount: u128,
    },
}

/// Notifications emitted by the [`TokenLedger`](crate::token_ledger::TokenLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Tokens moved. `from` is `None` for a mint, `to` is `None` for a burn.
    Transfer {
        from: Option<Address>,
        to: Option<Address>,
        amount: u128,
    },
    /// An allowance was set.
    Approval {
        owner: Address,
        spender: Address,
        amount: u128,
    },
    /// Minting rights moved to a new owner.
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },
}

/// Either kind of notification, as surfaced by a
/// [`Deployment`](crate::deployment::Deployment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Hub(HubEvent),
    Ledger(LedgerEvent),
}

impl From<HubEvent> for Event {
    fn from(event: HubEvent) -> Self {
        Event::Hub(event)
    }
}

impl From<LedgerEvent> for Event {
    fn from(event: LedgerEvent) -> Self {
        Event::Ledger(event)
    }
}
