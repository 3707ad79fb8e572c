use alloy::primitives::{Address, B256, FixedBytes, Signature, U256, keccak256};

use crate::crypto::poseidon::{
    DOMAIN_ARGS, DOMAIN_AUTHWIT, EncodingError, address_to_b256, poseidon_named, u128_to_b256,
};

/// Solidity-style signature of the token's authorized transfer.
pub const TRANSFER_SIGNATURE: &str = "transfer(address,address,uint256,uint256)";

/// Variant used when the token does not take a replay nonce.
pub const TRANSFER_NO_NONCE_SIGNATURE: &str = "transfer(address,address,uint256)";

/// Four-byte function selector (first bytes of keccak256 of the signature).
pub fn selector(signature: &str) -> FixedBytes<4> {
    FixedBytes::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// Hash an actor is authorized under; what the wallet signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHash(pub B256);

/// A single authorized call: target contract, function and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDescriptor {
    pub target_contract: Address,
    pub selector: FixedBytes<4>,
    /// Arguments encoded as field elements, in call order.
    pub args: Vec<B256>,
}

impl ActionDescriptor {
    /// `token.transfer(from, to, amount[, nonce])`
    pub fn transfer(
        token: Address,
        from: Address,
        to: Address,
        amount: u128,
        nonce: Option<U256>,
    ) -> Self {
        let mut args = vec![address_to_b256(from), address_to_b256(to), u128_to_b256(amount)];
        let signature = match nonce {
            Some(nonce) => {
                args.push(nonce.into());
                TRANSFER_SIGNATURE
            }
            None => TRANSFER_NO_NONCE_SIGNATURE,
        };
        Self {
            target_contract: token,
            selector: selector(signature),
            args,
        }
    }

    /// args_hash = H(DOMAIN_ARGS, args...)
    pub fn args_hash(&self) -> Result<B256, EncodingError> {
        let mut inputs = Vec::with_capacity(self.args.len() + 1);
        inputs.push(("domain", DOMAIN_ARGS));
        inputs.extend(self.args.iter().map(|arg| ("arg", *arg)));
        poseidon_named(&inputs)
    }

    /// message = H(DOMAIN_AUTHWIT, actor, target_contract, selector, args_hash)
    pub fn message_hash(&self, actor: Address) -> Result<MessageHash, EncodingError> {
        let hash = poseidon_named(&[
            ("domain", DOMAIN_AUTHWIT),
            ("actor", address_to_b256(actor)),
            ("target_contract", address_to_b256(self.target_contract)),
            ("selector", B256::left_padding_from(self.selector.as_slice())),
            ("args_hash", self.args_hash()?),
        ])?;
        Ok(MessageHash(hash))
    }
}

/// Signature by the delegating party over a [`MessageHash`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationWitness {
    pub message_hash: MessageHash,
    /// Address the wallet claims signed the message
    pub signer: Address,
    pub signature: Signature,
}

impl AuthorizationWitness {
    /// Recover the address that actually produced the signature.
    pub fn recover_signer(&self) -> Option<Address> {
        self.signature
            .recover_address_from_prehash(&self.message_hash.0)
            .ok()
    }

    /// True if the witness is a valid signature by `signer` over `expected`.
    pub fn authorizes(&self, expected: MessageHash, signer: Address) -> bool {
        self.message_hash == expected
            && self.signer == signer
            && self.recover_signer() == Some(signer)
    }
}
