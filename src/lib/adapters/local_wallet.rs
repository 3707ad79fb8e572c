use alloy::primitives::Address;
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;

use crate::domain::authorization::{AuthorizationWitness, MessageHash};
use crate::ports::wallet::{SignerPort, WalletError};

/// Wallet holding a local secp256k1 key. Signs every request it is given.
pub struct LocalWallet {
    signer: PrivateKeySigner,
}

impl LocalWallet {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }
}

impl SignerPort for LocalWallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn create_authorization_witness(
        &self,
        message_hash: MessageHash,
    ) -> Result<AuthorizationWitness, WalletError> {
        let signature = self
            .signer
            .sign_hash_sync(&message_hash.0)
            .map_err(|e| WalletError::Signing(e.to_string()))?;

        Ok(AuthorizationWitness {
            message_hash,
            signer: self.signer.address(),
            signature,
        })
    }
}
