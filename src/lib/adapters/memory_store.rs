use alloy::primitives::{Address, B256};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::domain::commitment::Commitment;
use crate::domain::keys::OwnerPubkey;
use crate::domain::note::ExtendedNote;
use crate::ports::store::{NoteStore, StoreError};

type NoteKey = (OwnerPubkey, Address, B256);

#[derive(Default)]
struct Notes {
    by_key: HashMap<NoteKey, Vec<ExtendedNote>>,
    commitments: HashSet<Commitment>,
}

/// In-memory implementation of `NoteStore` for PoC and testing.
///
/// Notes are grouped by `(owner, contract, storage_slot)` and deduplicated by
/// commitment. Nothing is ever removed.
pub struct InMemoryNoteStore {
    notes: Mutex<Notes>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self {
            notes: Mutex::new(Notes::default()),
        }
    }

    /// Total number of notes held across all owners.
    pub async fn len(&self) -> usize {
        self.notes.lock().await.commitments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore for InMemoryNoteStore {
    async fn add_note(&self, note: ExtendedNote) -> Result<(), StoreError> {
        let commitment = note.commitment()?;
        let mut notes = self.notes.lock().await;

        if !notes.commitments.insert(commitment) {
            return Err(StoreError::DuplicateNote(commitment.0));
        }
        let key = (note.note.owner(), note.contract_address, note.storage_slot);
        notes.by_key.entry(key).or_default().push(note);
        Ok(())
    }

    async fn get_notes(
        &self,
        owner: OwnerPubkey,
        contract: Address,
        storage_slot: B256,
    ) -> Result<Vec<ExtendedNote>, StoreError> {
        let notes = self.notes.lock().await;
        Ok(notes
            .by_key
            .get(&(owner, contract, storage_slot))
            .cloned()
            .unwrap_or_default())
    }
}
