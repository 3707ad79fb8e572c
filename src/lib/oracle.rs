use std::sync::Arc;

use alloy::primitives::{Address, B256};

use crate::config::ContractConfig;
use crate::domain::keys::OwnerPubkey;
use crate::domain::note::ExtendedNote;
use crate::ports::store::{NoteStore, StoreError};

/// Answers "does this owner hold a valid subscription?" from the local store.
///
/// Validity is derived at query time from the caller's `now`; nothing is
/// ever marked expired in the store.
pub struct ValidityOracle<S: NoteStore> {
    store: Arc<S>,
    owner: OwnerPubkey,
    contract: Address,
    storage_slot: B256,
}

impl<S: NoteStore> ValidityOracle<S> {
    pub fn new(store: Arc<S>, owner: OwnerPubkey, contract: &ContractConfig) -> Self {
        Self {
            store,
            owner,
            contract: contract.subscription_address,
            storage_slot: contract.storage_slot(),
        }
    }

    /// Notes for `project` with `tier >= min_tier` and `expiry > now`,
    /// in insertion order.
    pub async fn valid_notes(
        &self,
        project: u64,
        min_tier: u64,
        now: u64,
    ) -> Result<Vec<ExtendedNote>, StoreError> {
        let mut notes: Vec<ExtendedNote> = self
            .store
            .get_notes(self.owner, self.contract, self.storage_slot)
            .await?
            .into_iter()
            .filter(|n| n.note.grants(project, min_tier, now))
            .collect();
        notes.sort_by_key(|n| n.leaf_index);
        Ok(notes)
    }

    /// The earliest-inserted valid note, if any.
    pub async fn fetch_first_valid_note(
        &self,
        project: u64,
        min_tier: u64,
        now: u64,
    ) -> Result<Option<ExtendedNote>, StoreError> {
        let first = self
            .store
            .get_notes(self.owner, self.contract, self.storage_slot)
            .await?
            .into_iter()
            .filter(|n| n.note.grants(project, min_tier, now))
            .min_by_key(|n| n.leaf_index);
        tracing::debug!(project, min_tier, now, found = first.is_some(), "validity lookup");
        Ok(first)
    }

    pub async fn is_subscriber(
        &self,
        project: u64,
        min_tier: u64,
        now: u64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .fetch_first_valid_note(project, min_tier, now)
            .await?
            .is_some())
    }
}
