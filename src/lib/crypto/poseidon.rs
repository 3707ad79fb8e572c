use alloy::primitives::{Address, B256, U256};
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use light_poseidon::{Poseidon, PoseidonHasher};

/// Largest number of inputs accepted by the circom Poseidon parameters.
pub const MAX_POSEIDON_INPUTS: usize = 12;

/// Domain separation tags, one per hash in the protocol.
pub const DOMAIN_NOTE: B256 = domain_tag("subscription.note");
pub const DOMAIN_INNER: B256 = domain_tag("subscription.inner");
pub const DOMAIN_SILO: B256 = domain_tag("subscription.silo");
pub const DOMAIN_UNIQUE: B256 = domain_tag("subscription.unique");
pub const DOMAIN_NONCE: B256 = domain_tag("subscription.nonce");
pub const DOMAIN_NULLIFIER: B256 = domain_tag("subscription.nullifier");
pub const DOMAIN_OWNER: B256 = domain_tag("subscription.owner");
pub const DOMAIN_AUTHWIT: B256 = domain_tag("subscription.authwit");
pub const DOMAIN_ARGS: B256 = domain_tag("subscription.args");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("{field} is not a canonical BN254 scalar: {value}")]
    FieldOutOfRange { field: &'static str, value: B256 },

    #[error("expected 1..={max} hash inputs, got {got}", max = MAX_POSEIDON_INPUTS)]
    Arity { got: usize },

    #[error("poseidon hash failed: {0}")]
    Hash(String),
}

/// Encode a domain tag string as a B256 field element.
///
/// The UTF-8 bytes are right-aligned (big-endian) in a 32-byte array.
/// Tags longer than 31 bytes fail to compile when used in a const.
pub const fn domain_tag(tag: &str) -> B256 {
    let bytes = tag.as_bytes();
    assert!(bytes.len() <= 31, "Domain tag must be at most 31 bytes");
    let mut padded = [0u8; 32];
    let offset = 32 - bytes.len();
    let mut i = 0;
    while i < bytes.len() {
        padded[offset + i] = bytes[i];
        i += 1;
    }
    B256::new(padded)
}

/// Convert BN254 field element to B256.
pub fn fr_to_b256(value: Fr) -> B256 {
    let bytes = value.into_bigint().to_bytes_be();
    B256::left_padding_from(&bytes)
}

/// Convert B256 to a field element, rejecting non-canonical encodings.
///
/// `field` names the value in the resulting error.
pub fn checked_fr(field: &'static str, value: B256) -> Result<Fr, EncodingError> {
    let fr = Fr::from_be_bytes_mod_order(value.as_slice());
    if fr_to_b256(fr) != value {
        return Err(EncodingError::FieldOutOfRange { field, value });
    }
    Ok(fr)
}

/// Reduce an arbitrary 256-bit value (a keccak hash, say) into the scalar
/// field. Only for values the protocol does not choose, such as tx hashes.
pub fn reduce_to_field(value: B256) -> B256 {
    fr_to_b256(Fr::from_be_bytes_mod_order(value.as_slice()))
}

pub fn u64_to_b256(value: u64) -> B256 {
    U256::from(value).into()
}

pub fn u128_to_b256(value: u128) -> B256 {
    U256::from(value).into()
}

pub fn address_to_b256(address: Address) -> B256 {
    B256::left_padding_from(address.as_slice())
}

/// Poseidon hash over named inputs.
///
/// Every input is range-checked first, so a value outside the scalar field
/// surfaces as an error instead of being silently reduced.
pub fn poseidon_named(inputs: &[(&'static str, B256)]) -> Result<B256, EncodingError> {
    if inputs.is_empty() || inputs.len() > MAX_POSEIDON_INPUTS {
        return Err(EncodingError::Arity { got: inputs.len() });
    }
    let frs = inputs
        .iter()
        .map(|(field, value)| checked_fr(field, *value))
        .collect::<Result<Vec<_>, _>>()?;

    let mut hasher =
        Poseidon::<Fr>::new_circom(frs.len()).map_err(|e| EncodingError::Hash(e.to_string()))?;
    let hash = hasher
        .hash(&frs)
        .map_err(|e| EncodingError::Hash(e.to_string()))?;
    Ok(fr_to_b256(hash))
}

/// Poseidon hash with 2 inputs (for Merkle tree nodes).
///
/// Inputs are reduced mod the field order, matching the on-chain tree.
pub fn poseidon2(a: B256, b: B256) -> B256 {
    let mut hasher = Poseidon::<Fr>::new_circom(2).expect("Failed to create Poseidon hasher");
    let inputs = [
        Fr::from_be_bytes_mod_order(a.as_slice()),
        Fr::from_be_bytes_mod_order(b.as_slice()),
    ];
    let result = hasher
        .hash(&inputs)
        .expect("Failed to compute Poseidon hash");
    fr_to_b256(result)
}
