// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Knowledge Hub Protocol — Shared Primitives
//!
//! The pieces every other crate in the workspace agrees on before a single
//! entry is submitted:
//!
//! - **config** — Protocol constants: token precision, the upvote reward,
//!   bootstrap defaults, node ports.
//! - **identity** — The caller identity type. Validated once, compared by
//!   equality, never parsed again.
//! - **units** — Conversion between whole tokens and the ledger's smallest
//!   unit. Integers only.
//! - **storage** — sled-backed persistence for committed deployment state.
//!
//! The ledger and hub state machines live in `knowhub-contracts`; the
//! network-facing node lives in `knowhub-node`.

pub mod config;
pub mod identity;
pub mod storage;
pub mod units;

pub use identity::{Address, AddressError};
