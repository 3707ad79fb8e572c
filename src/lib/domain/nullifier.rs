use alloy::primitives::B256;
use serde::Serialize;

/// Marks one specific note as consumed without revealing which leaf it is.
/// nullifier = H(DOMAIN_NULLIFIER, commitment, owner_secret)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Nullifier(pub B256);

impl Nullifier {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl From<B256> for Nullifier {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<Nullifier> for B256 {
    fn from(value: Nullifier) -> Self {
        value.0
    }
}
