pub mod ledger;
pub mod store;
pub mod tree;
pub mod wallet;

use alloy::primitives::{Address, B256, U256};

use crate::domain::commitment::Commitment;

/// A state-changing call submitted to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// Token transfer executed by `caller` on behalf of `from`.
    Transfer(TransferCall),
    /// Append a note commitment to the note hash tree.
    InsertNoteHash(NoteInsertion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    pub token: Address,
    /// Contract consuming the authorization witness
    pub caller: Address,
    pub from: Address,
    pub to: Address,
    pub amount: u128,
    /// Replay nonce, when the token is configured to take one
    pub nonce: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteInsertion {
    pub contract: Address,
    pub commitment: Commitment,
}

/// Handle returned on submission; redeemed for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(pub B256);

/// Why the ledger refused to apply a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevertReason {
    #[error("insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("nonce {0} already used")]
    NonceAlreadyUsed(U256),

    #[error("no authorization witness registered for {0}")]
    WitnessMissing(B256),

    #[error("authorization witness {0} already consumed")]
    WitnessConsumed(B256),

    #[error("authorization witness signature does not match the payer")]
    WitnessSignatureInvalid,

    #[error("note hash {0} already in the tree")]
    DuplicateNoteHash(B256),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Reverted(RevertReason),
}

/// Confirmation of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub status: TxStatus,
    /// Leaf indices of note hashes this transaction appended, in order
    pub note_leaf_indices: Vec<u64>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    /// Ledger time the block was produced at; the unit of note expiry
    pub timestamp: u64,
    /// Note hash tree root after this block
    pub note_tree_root: B256,
}
