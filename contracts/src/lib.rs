//! # Knowledge Hub Contracts
//!
//! The state machines behind the Knowledge Hub. Nothing in this crate does
//! I/O: every operation takes the caller identity explicitly, mutates an
//! in-memory container, and buffers notifications for the host to drain.
//!
//! - **Token Ledger** — fungible reward token with owner-gated minting,
//!   allowances and burns.
//! - **Knowledge Hub** — entry registry, one-vote-per-identity voting and
//!   the upvote reward distributor.
//! - **Deployment** — bootstraps a ledger and hub pair and funds the pool.
//!
//! ## Design Principles
//!
//! 1. All balance arithmetic is checked. Balances are `u128` in the
//!    smallest unit; floats never touch them.
//! 2. Every operation validates before it mutates. A returned error means
//!    nothing changed, events included.
//! 3. A vote, once recorded, stands. Reward payment is best effort.
//! 4. Every public type is serializable (serde) so the node can persist a
//!    whole deployment as one snapshot.

pub mod deployment;
pub mod events;
pub mod knowledge_hub;
pub mod token_ledger;

pub use deployment::{BootstrapConfig, Deployment, DeploymentError};
pub use events::{Event, HubEvent, LedgerEvent};
pub use knowledge_hub::{
    EntryId, HubError, KnowledgeEntry, KnowledgeHub, VoteDirection, VoteRecord, NO_ENTRY,
};
pub use token_ledger::{LedgerError, TokenLedger};
