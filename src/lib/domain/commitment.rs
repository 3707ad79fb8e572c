use alloy::primitives::{Address, B256};
use serde::Serialize;

use super::keys::OwnerSecret;
use super::note::SubscriptionNote;
use super::nullifier::Nullifier;
use crate::crypto::poseidon::{
    DOMAIN_INNER, DOMAIN_NONCE, DOMAIN_NOTE, DOMAIN_NULLIFIER, DOMAIN_SILO, DOMAIN_UNIQUE,
    EncodingError, address_to_b256, poseidon_named, reduce_to_field, u64_to_b256,
};

/// The public, tree-insertable representation of a note.
/// This is the unique siloed note hash; see [`compute_note_hashes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Commitment(pub B256);

impl Commitment {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }

    /// nullifier = H(DOMAIN_NULLIFIER, commitment, owner_secret)
    pub fn nullifier(&self, owner_secret: &OwnerSecret) -> Result<Nullifier, EncodingError> {
        nullify(self, owner_secret)
    }
}

impl From<B256> for Commitment {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<Commitment> for B256 {
    fn from(value: Commitment) -> Self {
        value.0
    }
}

/// The contract/address salt a note is committed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteSalt {
    pub contract_address: Address,
    pub storage_slot: B256,
}

/// Every layer of a note's hash, innermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteHashes {
    /// H(DOMAIN_NOTE, owner, project, tier, expiry, cooldown_code, randomness)
    pub note_hash: B256,
    /// H(DOMAIN_INNER, storage_slot, note_hash)
    pub inner: B256,
    /// H(DOMAIN_SILO, contract_address, inner)
    pub siloed: B256,
    /// H(DOMAIN_UNIQUE, insertion_nonce, siloed)
    pub unique: Commitment,
}

/// Hash of the note fields alone, in the fixed verifier order.
pub fn note_content_hash(note: &SubscriptionNote) -> Result<B256, EncodingError> {
    poseidon_named(&[
        ("domain", DOMAIN_NOTE),
        ("owner", note.owner().0),
        ("project", u64_to_b256(note.project())),
        ("tier", u64_to_b256(note.tier())),
        ("expiry", u64_to_b256(note.expiry())),
        ("cooldown_code", u64_to_b256(note.cooldown_code())),
        ("randomness", note.randomness()),
    ])
}

pub fn compute_note_hashes(
    note: &SubscriptionNote,
    salt: &NoteSalt,
    insertion_nonce: B256,
) -> Result<NoteHashes, EncodingError> {
    let note_hash = note_content_hash(note)?;
    let inner = poseidon_named(&[
        ("domain", DOMAIN_INNER),
        ("storage_slot", salt.storage_slot),
        ("note_hash", note_hash),
    ])?;
    let siloed = poseidon_named(&[
        ("domain", DOMAIN_SILO),
        ("contract_address", address_to_b256(salt.contract_address)),
        ("inner_note_hash", inner),
    ])?;
    let unique = poseidon_named(&[
        ("domain", DOMAIN_UNIQUE),
        ("insertion_nonce", insertion_nonce),
        ("siloed_note_hash", siloed),
    ])?;

    Ok(NoteHashes {
        note_hash,
        inner,
        siloed,
        unique: Commitment(unique),
    })
}

/// Compute the commitment inserted into the note hash tree.
pub fn commit(
    note: &SubscriptionNote,
    salt: &NoteSalt,
    insertion_nonce: B256,
) -> Result<Commitment, EncodingError> {
    Ok(compute_note_hashes(note, salt, insertion_nonce)?.unique)
}

/// Derive the nullifier revealed when the note is consumed.
pub fn nullify(commitment: &Commitment, owner_secret: &OwnerSecret) -> Result<Nullifier, EncodingError> {
    let hash = poseidon_named(&[
        ("domain", DOMAIN_NULLIFIER),
        ("commitment", commitment.0),
        ("owner_secret", owner_secret.0),
    ])?;
    Ok(Nullifier(hash))
}

/// Insertion nonce for the `note_index`-th note created by a mint whose
/// paying transfer landed in `transfer_tx`.
/// nonce = H(DOMAIN_NONCE, transfer_tx mod p, note_index)
///
/// Tx hashes are full 256-bit keccak outputs, so they are reduced into the
/// field rather than range-checked.
pub fn insertion_nonce(transfer_tx: B256, note_index: u64) -> Result<B256, EncodingError> {
    poseidon_named(&[
        ("domain", DOMAIN_NONCE),
        ("transfer_tx", reduce_to_field(transfer_tx)),
        ("note_index", u64_to_b256(note_index)),
    ])
}

/// All note hashes plus the nullifier, in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteHashesAndNullifier {
    pub hashes: NoteHashes,
    pub nullifier: Nullifier,
}

pub fn compute_note_hashes_and_nullifier(
    note: &SubscriptionNote,
    salt: &NoteSalt,
    insertion_nonce: B256,
    owner_secret: &OwnerSecret,
) -> Result<NoteHashesAndNullifier, EncodingError> {
    let hashes = compute_note_hashes(note, salt, insertion_nonce)?;
    let nullifier = nullify(&hashes.unique, owner_secret)?;
    Ok(NoteHashesAndNullifier { hashes, nullifier })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys::{OwnerKeys, OwnerPubkey};

    fn salt() -> NoteSalt {
        NoteSalt {
            contract_address: Address::repeat_byte(0x5C),
            storage_slot: u64_to_b256(1),
        }
    }

    fn note_with(project: u64, tier: u64, expiry: u64, cooldown_code: u64) -> SubscriptionNote {
        SubscriptionNote::with_randomness(
            OwnerPubkey(B256::repeat_byte(0x0B)),
            project,
            tier,
            expiry,
            cooldown_code,
            B256::repeat_byte(0x01),
        )
        .unwrap()
    }

    #[test]
    fn test_commit_deterministic() {
        let note = note_with(1, 20, 123, 0);
        let nonce = u64_to_b256(7);
        assert_eq!(
            commit(&note, &salt(), nonce).unwrap(),
            commit(&note, &salt(), nonce).unwrap()
        );
    }

    #[test]
    fn test_every_field_changes_commitment() {
        let nonce = u64_to_b256(7);
        let base = commit(&note_with(1, 20, 123, 0), &salt(), nonce).unwrap();

        let variants = [
            SubscriptionNote::with_randomness(
                OwnerPubkey(B256::repeat_byte(0x0C)),
                1,
                20,
                123,
                0,
                B256::repeat_byte(0x01),
            )
            .unwrap(),
            note_with(2, 20, 123, 0),
            note_with(1, 21, 123, 0),
            note_with(1, 20, 124, 0),
            note_with(1, 20, 123, 1),
            SubscriptionNote::with_randomness(
                OwnerPubkey(B256::repeat_byte(0x0B)),
                1,
                20,
                123,
                0,
                B256::repeat_byte(0x02),
            )
            .unwrap(),
        ];

        for variant in &variants {
            assert_ne!(commit(variant, &salt(), nonce).unwrap(), base, "{variant:?}");
        }
    }

    #[test]
    fn test_salt_and_nonce_change_commitment() {
        let note = note_with(1, 20, 123, 0);
        let nonce = u64_to_b256(7);
        let base = commit(&note, &salt(), nonce).unwrap();

        let other_contract = NoteSalt {
            contract_address: Address::repeat_byte(0x5D),
            ..salt()
        };
        let other_slot = NoteSalt {
            storage_slot: u64_to_b256(2),
            ..salt()
        };

        assert_ne!(commit(&note, &other_contract, nonce).unwrap(), base);
        assert_ne!(commit(&note, &other_slot, nonce).unwrap(), base);
        assert_ne!(commit(&note, &salt(), u64_to_b256(8)).unwrap(), base);
    }

    #[test]
    fn test_no_collisions_across_corpus() {
        let mut seen = std::collections::HashSet::new();
        for project in 0..4 {
            for tier in [10, 20, 30] {
                for expiry in [1, 100, u64::MAX] {
                    for nonce in 0..3 {
                        let c = commit(&note_with(project, tier, expiry, 0), &salt(), u64_to_b256(nonce))
                            .unwrap();
                        assert!(seen.insert(c), "collision at {project}/{tier}/{expiry}/{nonce}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_hash_layers_chain() {
        let note = note_with(1, 20, 123, 0);
        let nonce = u64_to_b256(7);
        let hashes = compute_note_hashes(&note, &salt(), nonce).unwrap();

        assert_eq!(hashes.note_hash, note_content_hash(&note).unwrap());
        assert_eq!(hashes.unique, commit(&note, &salt(), nonce).unwrap());
        assert_ne!(hashes.inner, hashes.siloed);
        assert_ne!(hashes.siloed, hashes.unique.0);
    }

    #[test]
    fn test_nullifier_deterministic() {
        let keys = OwnerKeys::random();
        let commitment = Commitment(u64_to_b256(42));
        assert_eq!(
            nullify(&commitment, &keys.secret).unwrap(),
            nullify(&commitment, &keys.secret).unwrap()
        );
    }

    #[test]
    fn test_nullifier_distinct_per_commitment_and_secret() {
        let a = OwnerKeys::random();
        let b = OwnerKeys::random();
        let c1 = Commitment(u64_to_b256(42));
        let c2 = Commitment(u64_to_b256(43));

        let n = [
            nullify(&c1, &a.secret).unwrap(),
            nullify(&c2, &a.secret).unwrap(),
            nullify(&c1, &b.secret).unwrap(),
            nullify(&c2, &b.secret).unwrap(),
        ];
        for i in 0..n.len() {
            for j in i + 1..n.len() {
                assert_ne!(n[i], n[j]);
            }
        }
    }

    #[test]
    fn test_combined_matches_individual() {
        let keys = OwnerKeys::random();
        let note = note_with(1, 20, 123, 0);
        let nonce = u64_to_b256(7);

        let combined = compute_note_hashes_and_nullifier(&note, &salt(), nonce, &keys.secret).unwrap();
        let commitment = commit(&note, &salt(), nonce).unwrap();

        assert_eq!(combined.hashes.unique, commitment);
        assert_eq!(combined.nullifier, commitment.nullifier(&keys.secret).unwrap());
    }

    #[test]
    fn test_insertion_nonce_unique_per_tx_and_index() {
        let tx1 = B256::repeat_byte(0x01);
        let tx2 = B256::repeat_byte(0x02);
        assert_ne!(insertion_nonce(tx1, 0).unwrap(), insertion_nonce(tx2, 0).unwrap());
        assert_ne!(insertion_nonce(tx1, 0).unwrap(), insertion_nonce(tx1, 1).unwrap());
    }

    #[test]
    fn test_insertion_nonce_from_keccak_tx_hashes() {
        use alloy::primitives::keccak256;
        use std::collections::HashSet;

        // Most keccak outputs exceed the BN254 modulus.
        let nonces: HashSet<B256> = (1u64..=20)
            .map(|i| insertion_nonce(keccak256(i.to_be_bytes()), 0).unwrap())
            .collect();
        assert_eq!(nonces.len(), 20);

        let high = B256::repeat_byte(0xFF);
        assert!(insertion_nonce(high, 0).is_ok());
    }
}
