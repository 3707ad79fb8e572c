use alloy::primitives::B256;
use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use lean_imt::hashed_tree::{HashedLeanIMT, LeanIMTHasher};
use light_poseidon::{Poseidon, PoseidonHasher};
use serde::Serialize;

use super::commitment::Commitment;
use crate::crypto::poseidon::poseidon2;

/// Maximum depth of the note hash tree (supports up to 2^32 commitments).
/// LeanIMT uses dynamic depth, but sibling paths never exceed this.
pub const NOTE_HASH_TREE_DEPTH: usize = 32;

/// Sibling path for one leaf of the note hash tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiblingPath {
    /// Sibling hashes along the path from leaf to root.
    pub path: Vec<B256>,
    /// Index bits indicating left (0) or right (1) at each level.
    pub indices: Vec<u8>,
    /// The leaf index in the tree.
    pub leaf_index: u64,
}

impl SiblingPath {
    pub fn new(path: Vec<B256>, indices: Vec<u8>, leaf_index: u64) -> Self {
        Self {
            path,
            indices,
            leaf_index,
        }
    }

    /// Number of hashing levels in this path.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Fold the path over `leaf` to obtain the root it commits to.
    ///
    /// Returns `None` when the path is malformed (mismatched lengths or
    /// deeper than the tree allows).
    pub fn compute_root(&self, leaf: Commitment) -> Option<B256> {
        if self.path.len() != self.indices.len() || self.path.len() > NOTE_HASH_TREE_DEPTH {
            return None;
        }
        let root = self
            .path
            .iter()
            .zip(&self.indices)
            .fold(leaf.0, |node, (sibling, bit)| match bit {
                0 => poseidon2(node, *sibling),
                _ => poseidon2(*sibling, node),
            });
        Some(root)
    }
}

/// Poseidon hasher for LeanIMT.
/// Uses light-poseidon with the circom-compatible configuration.
#[derive(Debug, Default, Clone)]
pub struct PoseidonHash;

impl LeanIMTHasher<32> for PoseidonHash {
    fn hash(input: &[u8]) -> [u8; 32] {
        let hash = Poseidon::<Fr>::new_circom(2)
            .expect("Failed to initialize Poseidon")
            .hash(&[
                Fr::from_be_bytes_mod_order(&input[..32]),
                Fr::from_be_bytes_mod_order(&input[32..]),
            ])
            .expect("Poseidon hash failed");

        let mut hash_bytes = [0u8; 32];
        hash_bytes.copy_from_slice(&hash.into_bigint().to_bytes_be());
        hash_bytes
    }
}

/// Append-only note hash tree using LeanIMT with Poseidon hashing.
pub struct NoteHashTree(HashedLeanIMT<32, PoseidonHash>);

/// Extract direction bits from a leaf index (LSB to MSB).
fn decode_path(index: usize, path_len: usize) -> Vec<u8> {
    (0..path_len).map(|i| ((index >> i) & 1) as u8).collect()
}

impl NoteHashTree {
    pub fn new() -> Self {
        Self(HashedLeanIMT::new(&[], PoseidonHash).expect("empty LeanIMT is always valid"))
    }

    /// Append a commitment and return its leaf index.
    pub fn append(&mut self, commitment: &Commitment) -> u64 {
        let index = self.len() as u64;
        self.0.insert(&commitment.0.0);
        index
    }

    pub fn len(&self) -> usize {
        self.0.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current root, or `B256::ZERO` for the empty tree.
    pub fn root(&self) -> B256 {
        self.0.root().map(B256::from).unwrap_or(B256::ZERO)
    }

    pub fn sibling_path(&self, leaf_index: u64) -> Option<SiblingPath> {
        let proof = self.0.generate_proof(leaf_index as usize).ok()?;

        let path: Vec<B256> = proof
            .siblings
            .iter()
            .map(|s| B256::from_slice(s))
            .collect();
        let indices = decode_path(proof.index, path.len());

        Some(SiblingPath::new(path, indices, leaf_index))
    }
}

impl Default for NoteHashTree {
    fn default() -> Self {
        Self::new()
    }
}
