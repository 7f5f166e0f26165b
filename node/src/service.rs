//! # Hub Service
//!
//! The node's single commit point. Every mutating operation:
//!
//! 1. takes the deployment lock,
//! 2. runs against a working copy of the committed deployment,
//! 3. persists the copy to the snapshot store,
//! 4. swaps the copy in and publishes its notifications.
//!
//! A failure at step 2 or 3 drops the copy, so neither memory nor disk ever
//! sees a partially applied operation. Operations never await while holding
//! the lock; the lock is a plain `parking_lot::Mutex`.

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use knowhub_contracts::deployment::{BootstrapConfig, Deployment, DeploymentError};
use knowhub_contracts::events::{Event, HubEvent};
use knowhub_contracts::knowledge_hub::{EntryId, HubError, KnowledgeEntry};
use knowhub_contracts::token_ledger::LedgerError;
use knowhub_protocol::storage::{SnapshotStore, StoreError};
use knowhub_protocol::Address;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Stable, machine-readable name of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Hub(HubError::InvalidInput(_)) => "invalid_input",
            ServiceError::Hub(HubError::NotFound(_)) => "not_found",
            ServiceError::Hub(HubError::DuplicateVote { .. }) => "duplicate_vote",
            ServiceError::Hub(HubError::SelfVoteForbidden { .. }) => "self_vote_forbidden",
            ServiceError::Ledger(LedgerError::Unauthorized { .. }) => "unauthorized",
            ServiceError::Ledger(LedgerError::InsufficientBalance { .. }) => {
                "insufficient_balance"
            }
            ServiceError::Ledger(LedgerError::InsufficientAllowance { .. }) => {
                "insufficient_allowance"
            }
            ServiceError::Ledger(LedgerError::Overflow { .. }) => "overflow",
            ServiceError::Deployment(_) => "invalid_config",
            ServiceError::Store(_) => "storage",
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A notification as published to subscribers, tagged with the commit that
/// produced it.
#[derive(Debug, Clone, Serialize)]
pub struct FeedEvent {
    pub sequence: u64,
    pub event: Event,
}

/// Result of a vote: the entry after the vote and whether the creator was paid.
#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub entry: KnowledgeEntry,
    pub reward_paid: bool,
}

struct Committed {
    deployment: Deployment,
    sequence: u64,
}

// ---------------------------------------------------------------------------
// HubService
// ---------------------------------------------------------------------------

pub struct HubService {
    committed: Mutex<Committed>,
    store: SnapshotStore,
    feed: broadcast::Sender<FeedEvent>,
    metrics: SharedMetrics,
}

impl HubService {
    /// Loads the deployment from `store`, or bootstraps one from `config`
    /// and commits it when the store is empty.
    pub fn open(
        store: SnapshotStore,
        config: &BootstrapConfig,
        metrics: SharedMetrics,
        feed: broadcast::Sender<FeedEvent>,
    ) -> Result<Self, ServiceError> {
        let (mut deployment, sequence) = match store.load::<Deployment>()? {
            Some(committed) => {
                info!(sequence = committed.sequence, "deployment loaded from snapshot");
                (committed.state, committed.sequence)
            }
            None => {
                let deployment = Deployment::bootstrap(config)?;
                let sequence = store.commit(&deployment)?;
                info!(sequence, "no snapshot found, bootstrapped a new deployment");
                (deployment, sequence)
            }
        };
        // Bootstrap notifications predate any subscriber.
        deployment.drain_events();

        metrics.set_state(deployment.pool_balance(), deployment.hub.get_entry_count());

        Ok(Self {
            committed: Mutex::new(Committed {
                deployment,
                sequence,
            }),
            store,
            feed,
            metrics,
        })
    }

    /// Subscribes to the notification feed.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.feed.subscribe()
    }

    /// Runs a read-only query against the committed deployment.
    pub fn read<R>(&self, f: impl FnOnce(&Deployment) -> R) -> R {
        f(&self.committed.lock().deployment)
    }

    /// Number of commits behind the current state.
    pub fn sequence(&self) -> u64 {
        self.committed.lock().sequence
    }

    /// Runs `op` as one atomic, persisted operation.
    ///
    /// The lock is held across the clone, the snapshot encode and the disk
    /// flush, so readers wait behind a commit. This blocks the calling
    /// thread; async callers go through `spawn_blocking`.
    fn execute<R>(
        &self,
        name: &'static str,
        op: impl FnOnce(&mut Deployment) -> Result<R, ServiceError>,
    ) -> Result<R, ServiceError> {
        let timer = self.metrics.operation_latency_seconds.start_timer();
        let mut committed = self.committed.lock();

        let mut working = committed.deployment.clone();
        let outcome = op(&mut working).and_then(|value| {
            let sequence = self.store.commit(&working)?;
            Ok((value, sequence))
        });

        let (value, sequence) = match outcome {
            Ok(done) => done,
            Err(e) => {
                self.metrics.rejected_operations_total.inc();
                warn!(operation = name, kind = e.kind(), error = %e, "operation rejected");
                return Err(e);
            }
        };

        let events = working.drain_events();
        self.metrics.record_events(&events);
        self.metrics
            .set_state(working.pool_balance(), working.hub.get_entry_count());

        committed.deployment = working;
        committed.sequence = sequence;

        // Published under the lock so subscribers see commit order.
        for event in events {
            // No subscribers is fine.
            let _ = self.feed.send(FeedEvent { sequence, event });
        }
        drop(committed);

        timer.observe_duration();
        info!(operation = name, sequence, "operation committed");
        Ok(value)
    }

    // -- Hub ----------------------------------------------------------------

    pub fn submit_entry(
        &self,
        caller: &Address,
        title: &str,
        content_ref: &str,
    ) -> Result<EntryId, ServiceError> {
        self.execute("submit_entry", |d| {
            Ok(d.submit_entry(caller, title, content_ref)?)
        })
    }

    pub fn vote_on_entry(
        &self,
        caller: &Address,
        entry_id: EntryId,
        is_upvote: bool,
    ) -> Result<VoteOutcome, ServiceError> {
        self.execute("vote_on_entry", |d| {
            d.vote_on_entry(caller, entry_id, is_upvote)?;
            // The working copy starts with empty buffers, so any reward
            // notification here belongs to this vote.
            let reward_paid = d.hub.events().iter().any(|e| {
                matches!(
                    e,
                    HubEvent::RewardDistributed { entry_id: paid, .. } if *paid == entry_id
                )
            });
            Ok(VoteOutcome {
                entry: d.hub.get_entry(entry_id)?.clone(),
                reward_paid,
            })
        })
    }

    // -- Ledger -------------------------------------------------------------

    pub fn mint(&self, caller: &Address, to: &Address, amount: u128) -> Result<(), ServiceError> {
        self.execute("mint", |d| Ok(d.ledger.mint(caller, to, amount)?))
    }

    pub fn burn(&self, caller: &Address, amount: u128) -> Result<(), ServiceError> {
        self.execute("burn", |d| Ok(d.ledger.burn(caller, amount)?))
    }

    pub fn burn_from(
        &self,
        caller: &Address,
        owner: &Address,
        amount: u128,
    ) -> Result<(), ServiceError> {
        self.execute("burn_from", |d| Ok(d.ledger.burn_from(caller, owner, amount)?))
    }

    pub fn transfer(
        &self,
        caller: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), ServiceError> {
        self.execute("transfer", |d| Ok(d.ledger.transfer(caller, to, amount)?))
    }

    pub fn approve(
        &self,
        caller: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), ServiceError> {
        self.execute("approve", |d| {
            d.ledger.approve(caller, spender, amount);
            Ok(())
        })
    }

    pub fn transfer_from(
        &self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), ServiceError> {
        self.execute("transfer_from", |d| {
            Ok(d.ledger.transfer_from(caller, from, to, amount)?)
        })
    }
}
