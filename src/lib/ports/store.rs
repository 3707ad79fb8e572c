use alloy::primitives::{Address, B256};
use std::future::Future;

use crate::domain::keys::OwnerPubkey;
use crate::domain::note::ExtendedNote;

/// Port for the set of notes one party owns.
///
/// The store is append-only: notes are never removed, and validity is
/// derived at query time rather than stored.
///
/// Implementations:
/// - `InMemoryNoteStore` (for PoC/testing)
pub trait NoteStore: Send + Sync {
    /// Record a confirmed note. Fails if the same commitment is already held.
    fn add_note(&self, note: ExtendedNote) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All notes held for `(owner, contract, storage_slot)`, in no particular order.
    fn get_notes(
        &self,
        owner: OwnerPubkey,
        contract: Address,
        storage_slot: B256,
    ) -> impl Future<Output = Result<Vec<ExtendedNote>, StoreError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("note with commitment {0} already stored")]
    DuplicateNote(B256),

    #[error("note cannot be encoded: {0}")]
    Encoding(#[from] crate::crypto::poseidon::EncodingError),

    #[error("internal store error: {0}")]
    Internal(String),
}
