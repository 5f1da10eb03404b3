//! Chain records handed to contract code by the blockchain bridge.
//!
//! Amounts travel as base-10 strings so that hosts with wider native
//! integers than `u128` can still report them losslessly.

use crate::{Address, AddressKind, Hash};

/// Account state as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountState {
    pub address: Address,
    /// Balance in base units, decimal
    pub balance: String,
    pub nonce: u64,
}

impl AccountState {
    pub fn kind(&self) -> AddressKind {
        self.address.kind()
    }
}

/// A transaction that has been included in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionRecord {
    pub hash: Hash,
    pub from: Address,
    pub to: Address,
    /// Attached value in base units, decimal
    pub value: String,
    pub nonce: u64,
    pub block_height: u64,
    /// 1 = success, 0 = failed
    pub status: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockRecord {
    pub hash: Hash,
    pub parent_hash: Hash,
    pub height: u64,
    pub timestamp: u64,
    pub tx_count: u32,
}

/// Latest reputation rank of an account.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankRecord {
    pub address: Address,
    pub rank: u64,
    /// Decimal score
    pub score: String,
}

/// Aggregate of the most recent rank computation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankSummary {
    pub height: u64,
    pub ranked_accounts: u64,
    pub total_score: String,
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_account_state_json() {
        let state = AccountState {
            address: Address::derive(AddressKind::Contract, b"vault"),
            balance: "1000".to_string(),
            nonce: 3,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("sbx1"));
        let back: AccountState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.kind(), AddressKind::Contract);
    }

    #[test]
    fn test_block_record_rejects_bad_hash() {
        let json = r#"{"hash":"0x12","parent_hash":"0x12","height":1,"timestamp":2,"tx_count":0}"#;
        assert!(serde_json::from_str::<BlockRecord>(json).is_err());
    }
}
