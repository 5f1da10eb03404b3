//! Sandlot Types - chain primitives shared by the host and the contract runtime.
//!
//! - Addresses (kind tag + 20-byte payload, Bech32m encoded)
//! - Hashes (32-byte blake3 digests)
//! - Chain records returned by host queries

pub mod address;
pub mod error;
pub mod hash;
pub mod records;

#[cfg(feature = "serde")]
mod serialization;

pub use address::{Address, AddressKind};
pub use error::TypesError;
pub use hash::Hash;
pub use records::{AccountState, BlockRecord, RankRecord, RankSummary, TransactionRecord};
