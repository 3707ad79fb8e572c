use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use tracing::{debug, info, warn};

use crate::config::{ContractConfig, IssuerConfig, NonceMode};
use crate::crypto::poseidon::EncodingError;
use crate::delegate::{AuthorizationDelegate, DelegateError};
use crate::domain::authorization::AuthorizationWitness;
use crate::domain::commitment::{NoteSalt, commit, insertion_nonce};
use crate::domain::keys::OwnerPubkey;
use crate::domain::note::{ExtendedNote, SubscriptionNote};
use crate::ports::ledger::{LedgerError, LedgerPort};
use crate::ports::store::{NoteStore, StoreError};
use crate::ports::{LedgerCall, NoteInsertion, Receipt, RevertReason, TransferCall, TxStatus};

/// Parameters of one paid mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub project: u64,
    pub tier: u64,
    pub expiry: u64,
    pub cooldown_code: u64,
    pub token_contract: Address,
    /// Account the price is taken from; must have signed the witness.
    pub payer: Address,
    pub beneficiary: Address,
    pub amount: u128,
    /// Transfer replay nonce. Required in explicit nonce mode, ignored otherwise.
    pub nonce: Option<U256>,
}

/// Ledger call that can time out during a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStep {
    LedgerTime,
    WitnessRegistration,
    Transfer,
    NoteInsertion,
}

impl std::fmt::Display for MintStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MintStep::LedgerTime => write!(f, "latest block"),
            MintStep::WitnessRegistration => write!(f, "witness registration"),
            MintStep::Transfer => write!(f, "transfer"),
            MintStep::NoteInsertion => write!(f, "note insertion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssuerError {
    #[error("tier {0} is not offered")]
    UnsupportedTier(u64),

    #[error("expiry {expiry} is not after current ledger time {now}")]
    ExpiryNotInFuture { expiry: u64, now: u64 },

    #[error("authorization witness is not valid for this transfer")]
    AuthorizationInvalid,

    #[error("authorization witness {0} already consumed")]
    WitnessAlreadyConsumed(B256),

    #[error("transfer reverted: {reason}")]
    TransferRejected { reason: RevertReason },

    #[error("note insertion reverted: {reason}")]
    NoteRejected { reason: RevertReason },

    #[error("timed out waiting for {step}")]
    InclusionTimeout { step: MintStep },

    #[error("transfer {transfer_tx} confirmed but note creation failed: {cause}")]
    PartialMintFailure {
        transfer_tx: B256,
        #[source]
        cause: Box<IssuerError>,
    },

    #[error("delegate error: {0}")]
    Delegate(DelegateError),

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl IssuerError {
    /// Whether the caller may resubmit the same request.
    ///
    /// Only liveness failures before payment qualify. Rejections are final
    /// whatever the revert reason, and a partial mint is never retryable
    /// since the payment already happened.
    pub fn is_retryable(&self) -> bool {
        match self {
            IssuerError::InclusionTimeout { step } => *step != MintStep::NoteInsertion,
            IssuerError::Ledger(LedgerError::Rpc(_)) => true,
            _ => false,
        }
    }
}

impl From<LedgerError> for IssuerError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::WitnessConsumed(hash) => IssuerError::WitnessAlreadyConsumed(hash),
            other => IssuerError::Ledger(other),
        }
    }
}

impl From<DelegateError> for IssuerError {
    fn from(err: DelegateError) -> Self {
        match err {
            DelegateError::AuthorizationInvalid => IssuerError::AuthorizationInvalid,
            DelegateError::WitnessAlreadyConsumed(hash) => IssuerError::WitnessAlreadyConsumed(hash),
            DelegateError::Encoding(e) => IssuerError::Encoding(e),
            DelegateError::Ledger(e) => IssuerError::Ledger(e),
            other => IssuerError::Delegate(other),
        }
    }
}

/// Mints subscription notes for one owner in exchange for an authorized
/// token transfer.
///
/// Order of effects: witness registration, transfer, note commitment, local
/// store. Nothing is written to the store until the commitment is confirmed.
pub struct SubscriptionIssuer<L: LedgerPort, S: NoteStore> {
    ledger: Arc<L>,
    store: Arc<S>,
    delegate: AuthorizationDelegate<L>,
    owner: OwnerPubkey,
    contract: ContractConfig,
    config: IssuerConfig,
}

impl<L: LedgerPort, S: NoteStore> SubscriptionIssuer<L, S> {
    pub fn new(
        ledger: Arc<L>,
        store: Arc<S>,
        delegate: AuthorizationDelegate<L>,
        owner: OwnerPubkey,
        contract: ContractConfig,
        config: IssuerConfig,
    ) -> Self {
        Self {
            ledger,
            store,
            delegate,
            owner,
            contract,
            config,
        }
    }

    pub fn owner(&self) -> OwnerPubkey {
        self.owner
    }

    /// Charge the payer through `witness` and mint a note for the owner.
    pub async fn mint_and_authorize(
        &self,
        request: MintRequest,
        witness: &AuthorizationWitness,
    ) -> Result<ExtendedNote, IssuerError> {
        let actor = self.contract.subscription_address;

        if !self.config.supported_tiers.contains(&request.tier) {
            return Err(IssuerError::UnsupportedTier(request.tier));
        }
        let now = self
            .bounded(MintStep::LedgerTime, self.ledger.latest_block())
            .await?
            .timestamp;
        if request.expiry <= now {
            return Err(IssuerError::ExpiryNotInFuture {
                expiry: request.expiry,
                now,
            });
        }

        // Step 0: the witness must cover exactly this transfer.
        let action = self.delegate.transfer_action(
            request.token_contract,
            request.payer,
            request.beneficiary,
            request.amount,
            request.nonce,
        )?;
        let expected = self.delegate.build_message(actor, &action)?;
        self.delegate.verify_witness(witness, expected, request.payer)?;
        self.bounded(
            MintStep::WitnessRegistration,
            self.delegate.register(actor, witness),
        )
        .await?;
        debug!(project = request.project, tier = request.tier, "witness accepted");

        // Step 1: pay.
        let transfer = TransferCall {
            token: request.token_contract,
            caller: actor,
            from: request.payer,
            to: request.beneficiary,
            amount: request.amount,
            nonce: match self.delegate.nonce_mode() {
                NonceMode::Explicit => request.nonce,
                NonceMode::Omitted => None,
            },
        };
        let receipt = self
            .submit_and_confirm(MintStep::Transfer, LedgerCall::Transfer(transfer))
            .await?;
        match receipt.status {
            TxStatus::Success => {}
            TxStatus::Reverted(RevertReason::WitnessConsumed(hash)) => {
                return Err(IssuerError::WitnessAlreadyConsumed(hash));
            }
            TxStatus::Reverted(reason) => return Err(IssuerError::TransferRejected { reason }),
        }
        debug!(tx = %receipt.tx_hash, block = receipt.block_number, "transfer confirmed");

        // Steps 2-6 run after payment; any failure is a partial mint.
        let transfer_tx = receipt.tx_hash;
        self.create_note(&request, transfer_tx)
            .await
            .map_err(|cause| {
                warn!(tx = %transfer_tx, error = %cause, "payment confirmed but note was not created");
                IssuerError::PartialMintFailure {
                    transfer_tx,
                    cause: Box::new(cause),
                }
            })
    }

    async fn create_note(
        &self,
        request: &MintRequest,
        transfer_tx: B256,
    ) -> Result<ExtendedNote, IssuerError> {
        let salt = NoteSalt {
            contract_address: self.contract.subscription_address,
            storage_slot: self.contract.storage_slot(),
        };
        let nonce = insertion_nonce(transfer_tx, 0)?;
        let note = SubscriptionNote::new(
            self.owner,
            request.project,
            request.tier,
            request.expiry,
            request.cooldown_code,
        )?;
        let commitment = commit(&note, &salt, nonce)?;
        debug!(commitment = %commitment.0, "note commitment computed");

        let receipt = self
            .submit_and_confirm(
                MintStep::NoteInsertion,
                LedgerCall::InsertNoteHash(NoteInsertion {
                    contract: salt.contract_address,
                    commitment,
                }),
            )
            .await?;
        if let TxStatus::Reverted(reason) = receipt.status {
            return Err(IssuerError::NoteRejected { reason });
        }
        let leaf_index = receipt.note_leaf_indices.first().copied().ok_or_else(|| {
            IssuerError::Ledger(LedgerError::Rpc(format!(
                "receipt {} carries no note leaf index",
                receipt.tx_hash
            )))
        })?;

        let extended = ExtendedNote {
            note,
            contract_address: salt.contract_address,
            storage_slot: salt.storage_slot,
            tx_hash: receipt.tx_hash,
            insertion_nonce: nonce,
            leaf_index,
        };
        self.store.add_note(extended.clone()).await?;

        info!(
            project = request.project,
            tier = request.tier,
            expiry = request.expiry,
            leaf_index,
            "subscription minted"
        );
        Ok(extended)
    }

    /// Submit and confirm share one `inclusion_timeout` budget.
    async fn submit_and_confirm(
        &self,
        step: MintStep,
        call: LedgerCall,
    ) -> Result<Receipt, IssuerError> {
        self.bounded(step, async move {
            let handle = self.ledger.submit(call).await?;
            debug!(%step, tx = %handle.0, "submitted");
            self.ledger.await_confirmation(handle).await
        })
        .await
    }

    async fn bounded<R, E>(
        &self,
        step: MintStep,
        fut: impl Future<Output = Result<R, E>>,
    ) -> Result<R, IssuerError>
    where
        IssuerError: From<E>,
    {
        match tokio::time::timeout(self.config.inclusion_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(%step, "ledger call timed out");
                Err(IssuerError::InclusionTimeout { step })
            }
        }
    }
}
