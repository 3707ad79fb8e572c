use alloy::primitives::Address;
use std::future::Future;

use crate::domain::authorization::{AuthorizationWitness, MessageHash};

/// Port for the wallet that signs authorization witnesses.
///
/// Implementations:
/// - `LocalWallet` (in-process secp256k1 key)
/// - Hardware / remote wallets (out of scope)
pub trait SignerPort: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `message_hash`. May suspend until the user approves.
    fn create_authorization_witness(
        &self,
        message_hash: MessageHash,
    ) -> impl Future<Output = Result<AuthorizationWitness, WalletError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("signer refused to authorize: {0}")]
    Refused(String),

    #[error("signing failed: {0}")]
    Signing(String),
}
