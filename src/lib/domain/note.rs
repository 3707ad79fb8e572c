use alloy::primitives::{Address, B256};
use rand::Rng;
use serde::Serialize;

use super::commitment::{
    Commitment, NoteHashes, NoteHashesAndNullifier, NoteSalt, compute_note_hashes,
    compute_note_hashes_and_nullifier,
};
use super::keys::{OwnerPubkey, OwnerSecret};
use super::nullifier::Nullifier;
use crate::crypto::poseidon::{EncodingError, checked_fr};

/// A subscription entitlement held privately by its owner.
///
/// Field order is fixed: owner, project, tier, expiry, cooldown_code, randomness.
/// The external verifier hashes the note in exactly this layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionNote {
    owner: OwnerPubkey,
    project: u64,
    tier: u64,
    expiry: u64,
    cooldown_code: u64,
    randomness: B256,
}

impl SubscriptionNote {
    /// Create a new note with fresh randomness.
    pub fn new(
        owner: OwnerPubkey,
        project: u64,
        tier: u64,
        expiry: u64,
        cooldown_code: u64,
    ) -> Result<Self, EncodingError> {
        Self::with_randomness(owner, project, tier, expiry, cooldown_code, random_field_bytes())
    }

    /// Rebuild a note with known randomness (delivery of an existing note, tests).
    pub fn with_randomness(
        owner: OwnerPubkey,
        project: u64,
        tier: u64,
        expiry: u64,
        cooldown_code: u64,
        randomness: B256,
    ) -> Result<Self, EncodingError> {
        checked_fr("owner", owner.0)?;
        checked_fr("randomness", randomness)?;
        Ok(Self {
            owner,
            project,
            tier,
            expiry,
            cooldown_code,
            randomness,
        })
    }

    pub fn owner(&self) -> OwnerPubkey {
        self.owner
    }

    pub fn project(&self) -> u64 {
        self.project
    }

    pub fn tier(&self) -> u64 {
        self.tier
    }

    pub fn expiry(&self) -> u64 {
        self.expiry
    }

    pub fn cooldown_code(&self) -> u64 {
        self.cooldown_code
    }

    pub fn randomness(&self) -> B256 {
        self.randomness
    }

    /// A note is valid strictly before its expiry.
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expiry
    }

    /// Whether this note grants at least `min_tier` access to `project` at `now`.
    pub fn grants(&self, project: u64, min_tier: u64, now: u64) -> bool {
        self.project == project && self.tier >= min_tier && self.is_valid_at(now)
    }
}

/// 32 random bytes with the top 5 zeroed, always below the BN254 modulus.
fn random_field_bytes() -> B256 {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes[5..]);
    B256::from(bytes)
}

/// A note together with the context it was inserted under.
///
/// The salt and insertion nonce are needed to recompute the commitment,
/// and the leaf index orders notes by creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedNote {
    pub note: SubscriptionNote,
    pub contract_address: Address,
    pub storage_slot: B256,
    /// Transaction that inserted the note commitment
    pub tx_hash: B256,
    pub insertion_nonce: B256,
    /// Position of the commitment in the append-only tree
    pub leaf_index: u64,
}

impl ExtendedNote {
    pub fn salt(&self) -> NoteSalt {
        NoteSalt {
            contract_address: self.contract_address,
            storage_slot: self.storage_slot,
        }
    }

    pub fn commitment(&self) -> Result<Commitment, EncodingError> {
        Ok(self.note_hashes()?.unique)
    }

    pub fn note_hashes(&self) -> Result<NoteHashes, EncodingError> {
        compute_note_hashes(&self.note, &self.salt(), self.insertion_nonce)
    }

    /// nullifier = H(DOMAIN_NULLIFIER, commitment, owner_secret)
    pub fn nullifier(&self, owner_secret: &OwnerSecret) -> Result<Nullifier, EncodingError> {
        self.commitment()?.nullifier(owner_secret)
    }

    pub fn hashes_and_nullifier(
        &self,
        owner_secret: &OwnerSecret,
    ) -> Result<NoteHashesAndNullifier, EncodingError> {
        compute_note_hashes_and_nullifier(&self.note, &self.salt(), self.insertion_nonce, owner_secret)
    }
}
