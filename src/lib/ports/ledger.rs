use alloy::primitives::{Address, B256};
use std::future::Future;

use super::{BlockHeader, LedgerCall, Receipt, TxHandle};
use crate::domain::authorization::AuthorizationWitness;

/// Port for the ledger / execution client.
///
/// Implementations:
/// - `InMemoryLedger` (in-process ledger for demos and tests)
/// - An RPC client against a real node (out of scope)
pub trait LedgerPort: Send + Sync {
    /// Submit a call for inclusion.
    fn submit(&self, call: LedgerCall) -> impl Future<Output = Result<TxHandle, LedgerError>> + Send;

    /// Wait until the transaction is included and return its receipt.
    /// Reverted transactions are a successful wait with a reverted status.
    fn await_confirmation(
        &self,
        handle: TxHandle,
    ) -> impl Future<Output = Result<Receipt, LedgerError>> + Send;

    fn get_block(&self, number: u64) -> impl Future<Output = Result<BlockHeader, LedgerError>> + Send;

    fn latest_block(&self) -> impl Future<Output = Result<BlockHeader, LedgerError>> + Send;

    /// Make a witness available to exactly one later call by `consumer`.
    fn register_witness(
        &self,
        consumer: Address,
        witness: &AuthorizationWitness,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("authorization witness {0} already consumed")]
    WitnessConsumed(B256),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(B256),

    #[error("block not found: {0}")]
    BlockNotFound(u64),

    #[error("call rejected at submission: {0}")]
    Rejected(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}
