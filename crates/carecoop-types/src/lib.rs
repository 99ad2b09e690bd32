//! CareCoop Types - Core type definitions shared by the governance crates.
//!
//! This crate provides:
//! - Member identities (20-byte, Bech32m encoded)
//! - Block heights supplied by the external clock
//! - Type-level errors

pub mod address;
pub mod error;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serialization;

pub use address::Address;
pub use error::TypesError;

/// Height reported by the ledger clock. Monotonically increasing.
pub type BlockHeight = u64;
