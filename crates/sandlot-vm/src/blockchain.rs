//! Blockchain bridge: chain reads, value transfer and address checks.
//!
//! Reads return `Ok(None)` when the chain has no such record. A record the
//! host sends back that does not decode is a host fault and ends the
//! transaction.

use num_bigint::BigUint;
use sandlot_types::{
    AccountState, Address, AddressKind, BlockRecord, Hash, RankRecord, RankSummary,
    TransactionRecord,
};
use serde::de::DeserializeOwned;

use crate::bignum::BigNumber;
use crate::context::{BlockEnv, ExecutionContext, TxEnv};
use crate::error::VmError;
use crate::host::ChainQuery;

/// Classification returned by [`verify_address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    Account,
    Contract,
    Invalid,
}

impl AddressClass {
    pub fn is_valid(self) -> bool {
        self != AddressClass::Invalid
    }
}

/// Classify address text. Pure; no charge, no host call.
pub fn verify_address(text: &str) -> AddressClass {
    match text.parse::<Address>() {
        Ok(address) => match address.kind() {
            AddressKind::Account => AddressClass::Account,
            AddressKind::Contract => AddressClass::Contract,
        },
        Err(_) => AddressClass::Invalid,
    }
}

/// Check a transfer or call amount and convert it to base units.
///
/// Amounts must be finite, non-negative and integral.
pub fn validate_amount(amount: &BigNumber) -> Result<BigUint, VmError> {
    if amount.is_nan() {
        return Err(VmError::InvalidValue("amount is NaN".to_string()));
    }
    if !amount.is_finite() {
        return Err(VmError::InvalidValue(format!("amount {} is not finite", amount)));
    }
    if amount.is_negative() {
        return Err(VmError::InvalidValue(format!("amount {} is negative", amount)));
    }
    amount
        .to_biguint()
        .ok_or_else(|| VmError::InvalidValue(format!("amount {} is not an integer", amount)))
}

fn parse_address(text: &str) -> Result<Address, VmError> {
    text.parse::<Address>()
        .map_err(|e| VmError::InvalidAddress(format!("{:?}: {}", text, e)))
}

fn parse_hash(text: &str) -> Result<Hash, VmError> {
    text.parse::<Hash>()
        .map_err(|e| VmError::InvalidValue(format!("hash {:?}: {}", text, e)))
}

pub struct Blockchain<'e> {
    ctx: &'e mut ExecutionContext,
    contract: Address,
}

impl<'e> Blockchain<'e> {
    pub(crate) fn new(ctx: &'e mut ExecutionContext, contract: Address) -> Self {
        Self { ctx, contract }
    }

    pub fn transaction(&self) -> &TxEnv {
        self.ctx.tx()
    }

    pub fn block(&self) -> &BlockEnv {
        self.ctx.block()
    }

    pub fn verify_address(&self, text: &str) -> AddressClass {
        verify_address(text)
    }

    pub fn get_account_state(&mut self, address: &str) -> Result<Option<AccountState>, VmError> {
        let address = parse_address(address)?;
        self.fetch(ChainQuery::AccountState(address))
    }

    pub fn get_transaction_by_hash(&mut self, hash: &str) -> Result<Option<TransactionRecord>, VmError> {
        let hash = parse_hash(hash)?;
        self.fetch(ChainQuery::TransactionByHash(hash))
    }

    pub fn get_block_by_hash(&mut self, hash: &str) -> Result<Option<BlockRecord>, VmError> {
        let hash = parse_hash(hash)?;
        self.fetch(ChainQuery::BlockByHash(hash))
    }

    pub fn get_latest_rank(&mut self, address: &str) -> Result<Option<RankRecord>, VmError> {
        let address = parse_address(address)?;
        self.fetch(ChainQuery::LatestRank(address))
    }

    pub fn get_latest_rank_summary(&mut self) -> Result<Option<RankSummary>, VmError> {
        self.fetch(ChainQuery::LatestRankSummary)
    }

    /// Move `amount` from the running contract to `address`.
    ///
    /// Arguments are checked before anything is charged or sent to the host;
    /// `Ok(false)` means the host refused the transfer.
    pub fn transfer(&mut self, address: &str, amount: &BigNumber) -> Result<bool, VmError> {
        let amount = validate_amount(amount)?;
        let to = parse_address(address)?;

        let cost = self.ctx.config().gas.transfer;
        self.ctx.charge(cost)?;

        let ok = self.ctx.host().transfer(&self.contract, &to, &amount);
        if ok {
            tracing::debug!("Transfer {} -> {} of {}", self.contract, to, amount);
        } else {
            tracing::warn!("Transfer {} -> {} of {} refused", self.contract, to, amount);
        }
        Ok(ok)
    }

    fn fetch<T: DeserializeOwned>(&mut self, query: ChainQuery) -> Result<Option<T>, VmError> {
        let cost = self.ctx.config().gas.blockchain_query;
        self.ctx.charge(cost)?;

        tracing::debug!("Chain query {}", query.name());
        let Some(text) = self.ctx.host().query(&query) else {
            return Ok(None);
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            self.ctx.latch(VmError::MalformedHostResponse(format!(
                "{} returned undecodable record: {}",
                query.name(),
                e
            )))
        })
    }
}
