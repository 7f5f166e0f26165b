//! # Identity Module
//!
//! Every operation on the ledger and the hub is attributed to a caller
//! identity. The surrounding execution environment is responsible for
//! making that identity unforgeable; this module only fixes its shape.
//!
//! An [`Address`] is an opaque, validated string. Two addresses are the same
//! identity exactly when their strings are byte-for-byte equal. There is no
//! case folding and no checksum: the environment hands us canonical values.
//!
//! For development deployments, [`Address::derive`] turns a human label
//! ("deployer", "alice") into a stable `kh1…` address via BLAKE3, so demo
//! accounts look the same on every machine.

pub mod address;

pub use address::{Address, AddressError};
