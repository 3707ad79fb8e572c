use alloy::primitives::B256;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::poseidon::{DOMAIN_OWNER, EncodingError, poseidon_named};

/// Owner secret - the subscriber's master secret.
/// Derives the identity commitment placed in notes and keys every nullifier.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSecret(pub B256);

impl OwnerSecret {
    /// Generate a random owner secret (top 5 bytes zeroed to stay in the field).
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes[5..]);
        Self(B256::from(bytes))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    /// Derive the identity commitment.
    /// owner_pubkey = H(DOMAIN_OWNER, owner_secret)
    pub fn derive_owner_pubkey(&self) -> Result<OwnerPubkey, EncodingError> {
        let hash = poseidon_named(&[("domain", DOMAIN_OWNER), ("owner_secret", self.0)])?;
        Ok(OwnerPubkey(hash))
    }
}

impl std::fmt::Debug for OwnerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OwnerSecret(..)")
    }
}

/// Identity commitment of a note owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerPubkey(pub B256);

impl OwnerPubkey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

/// Secret plus its derived identity commitment, held together by the owner.
#[derive(Debug, Clone)]
pub struct OwnerKeys {
    pub secret: OwnerSecret,
    pub pubkey: OwnerPubkey,
}

impl OwnerKeys {
    pub fn from_secret(secret: OwnerSecret) -> Result<Self, EncodingError> {
        let pubkey = secret.derive_owner_pubkey()?;
        Ok(Self { secret, pubkey })
    }

    pub fn random() -> Self {
        // Random secrets are generated in range, so derivation cannot fail.
        Self::from_secret(OwnerSecret::random()).expect("random owner secret is in the field")
    }
}
