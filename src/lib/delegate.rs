use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};

use crate::config::{AuthorizationConfig, NonceMode};
use crate::crypto::poseidon::EncodingError;
use crate::domain::authorization::{ActionDescriptor, AuthorizationWitness, MessageHash};
use crate::ports::ledger::{LedgerError, LedgerPort};
use crate::ports::wallet::{SignerPort, WalletError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DelegateError {
    #[error("wallet refused to authorize: {0}")]
    AuthorizationDenied(String),

    #[error("wallet failed to sign: {0}")]
    Signing(String),

    #[error("authorization witness does not match the expected action or signer")]
    AuthorizationInvalid,

    #[error("authorization witness {0} already consumed")]
    WitnessAlreadyConsumed(B256),

    #[error("nonce mode is explicit but no nonce was supplied")]
    MissingNonce,

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for DelegateError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::WitnessConsumed(hash) => DelegateError::WitnessAlreadyConsumed(hash),
            other => DelegateError::Ledger(other),
        }
    }
}

/// Builds authorization messages, collects signed witnesses from a wallet and
/// hands them to the ledger for a single later use.
pub struct AuthorizationDelegate<L: LedgerPort> {
    ledger: Arc<L>,
    nonce_mode: NonceMode,
}

impl<L: LedgerPort> AuthorizationDelegate<L> {
    pub fn new(ledger: Arc<L>, config: &AuthorizationConfig) -> Self {
        Self {
            ledger,
            nonce_mode: config.nonce_mode,
        }
    }

    pub fn nonce_mode(&self) -> NonceMode {
        self.nonce_mode
    }

    /// Hash binding `actor` to exactly `action`.
    pub fn build_message(
        &self,
        actor: Address,
        action: &ActionDescriptor,
    ) -> Result<MessageHash, DelegateError> {
        Ok(action.message_hash(actor)?)
    }

    /// The token transfer action, shaped by the configured nonce mode.
    pub fn transfer_action(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
        nonce: Option<U256>,
    ) -> Result<ActionDescriptor, DelegateError> {
        let nonce = match self.nonce_mode {
            NonceMode::Explicit => Some(nonce.ok_or(DelegateError::MissingNonce)?),
            NonceMode::Omitted => None,
        };
        Ok(ActionDescriptor::transfer(token, from, to, amount, nonce))
    }

    /// Ask the wallet to sign `message_hash`. Suspends until the wallet answers.
    pub async fn request_witness<W: SignerPort>(
        &self,
        signer: &W,
        message_hash: MessageHash,
    ) -> Result<AuthorizationWitness, DelegateError> {
        tracing::debug!(signer = %signer.address(), message = %message_hash.0, "requesting witness");
        signer
            .create_authorization_witness(message_hash)
            .await
            .map_err(|e| match e {
                WalletError::Refused(reason) => DelegateError::AuthorizationDenied(reason),
                WalletError::Signing(reason) => DelegateError::Signing(reason),
            })
    }

    /// Build, sign and return the witness for `signer` paying `amount` to `to`,
    /// consumable by `actor`.
    pub async fn authorize_transfer<W: SignerPort>(
        &self,
        signer: &W,
        actor: Address,
        token: Address,
        to: Address,
        amount: u128,
        nonce: Option<U256>,
    ) -> Result<AuthorizationWitness, DelegateError> {
        let action = self.transfer_action(token, signer.address(), to, amount, nonce)?;
        let message_hash = self.build_message(actor, &action)?;
        self.request_witness(signer, message_hash).await
    }

    /// Make `witness` available to one later call by `consumer`.
    pub async fn register(
        &self,
        consumer: Address,
        witness: &AuthorizationWitness,
    ) -> Result<(), DelegateError> {
        self.ledger.register_witness(consumer, witness).await?;
        tracing::debug!(%consumer, message = %witness.message_hash.0, "witness registered");
        Ok(())
    }

    /// Check the witness is over `expected` and was signed by `expected_signer`.
    pub fn verify_witness(
        &self,
        witness: &AuthorizationWitness,
        expected: MessageHash,
        expected_signer: Address,
    ) -> Result<(), DelegateError> {
        if witness.authorizes(expected, expected_signer) {
            Ok(())
        } else {
            Err(DelegateError::AuthorizationInvalid)
        }
    }
}
