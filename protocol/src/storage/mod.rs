//! # Storage Module
//!
//! Durable storage for a Knowledge Hub deployment.
//!
//! The engine itself is purely in-memory: a `Deployment` value holds the
//! ledger and the hub. What needs to survive a restart is the *committed*
//! value, and only that. This module persists it as a single snapshot in an
//! embedded sled database.
//!
//! ## Design Decisions
//!
//! 1. **Whole-state snapshots.** Deployments are small and every operation
//!    is serialised anyway, so rewriting the snapshot per commit is simpler
//!    than maintaining per-record trees and cannot tear.
//!
//! 2. **Bincode on disk.** Compact, fast, deterministic. JSON is for the API.
//!
//! 3. **Generic over the state type.** The store knows nothing about
//!    entries or balances; it stores whatever `Serialize` value the host
//!    commits.

pub mod snapshot;

pub use snapshot::{Committed, SnapshotStore, StoreError, StoreResult};
