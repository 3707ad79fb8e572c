use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MembershipConfig;
use crate::crypto::poseidon::EncodingError;
use crate::domain::keys::OwnerPubkey;
use crate::domain::merkle::SiblingPath;
use crate::domain::note::ExtendedNote;
use crate::ports::ledger::{LedgerError, LedgerPort};
use crate::ports::tree::{TreeError, TreeIndexPort};

/// Inputs the verifier sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicInput {
    /// Note hash tree root the proof is against
    pub tree_root: B256,
    pub contract_address: Address,
    pub owner: OwnerPubkey,
    pub project: u64,
    pub tier: u64,
    pub expiry: u64,
    pub cooldown_code: u64,
}

/// Inputs only the prover knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivateInput {
    pub randomness: B256,
    /// Needed with the public fields to rebuild the commitment in-circuit
    pub storage_slot: B256,
    pub insertion_nonce: B256,
    pub sibling_path: SiblingPath,
}

/// Both halves, laid out as the prover's TOML input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProverInputs {
    pub public_input: PublicInput,
    pub private_input: PrivateInput,
}

impl ProverInputs {
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MembershipError {
    #[error("commitment {0} is not in the note hash tree")]
    LeafNotFound(B256),

    #[error("{lookup} lookup timed out")]
    LookupTimeout { lookup: &'static str },

    #[error("sibling path for leaf {0} is malformed")]
    MalformedPath(u64),

    #[error("sibling path computes root {path_root}, latest block has {block_root}")]
    RootMismatch { path_root: B256, block_root: B256 },

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("tree index error: {0}")]
    Tree(#[from] TreeError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Assembles membership proof inputs for notes held in the note hash tree.
pub struct MembershipProver<L: LedgerPort, T: TreeIndexPort> {
    ledger: Arc<L>,
    tree: Arc<T>,
    lookup_timeout: Duration,
}

impl<L: LedgerPort, T: TreeIndexPort> MembershipProver<L, T> {
    pub fn new(ledger: Arc<L>, tree: Arc<T>, config: &MembershipConfig) -> Self {
        Self {
            ledger,
            tree,
            lookup_timeout: config.lookup_timeout,
        }
    }

    /// Locate `note` in the tree and build the proof inputs against the
    /// latest root.
    ///
    /// A `RootMismatch` means the tree index and the ledger disagree on the
    /// current state; retrying after more confirmations usually resolves it.
    pub async fn prove_possession(
        &self,
        note: &ExtendedNote,
    ) -> Result<(PublicInput, PrivateInput), MembershipError> {
        let commitment = note.commitment()?;

        let leaf_index = self
            .bounded("leaf index", self.tree.find_leaf_index(commitment))
            .await?
            .ok_or(MembershipError::LeafNotFound(commitment.0))?;
        let sibling_path = self
            .bounded("sibling path", self.tree.get_sibling_path(leaf_index))
            .await?;
        let header = self.bounded("latest block", self.ledger.latest_block()).await?;
        debug!(leaf_index, block = header.number, "membership data fetched");

        let path_root = sibling_path
            .compute_root(commitment)
            .ok_or(MembershipError::MalformedPath(leaf_index))?;
        if path_root != header.note_tree_root {
            return Err(MembershipError::RootMismatch {
                path_root,
                block_root: header.note_tree_root,
            });
        }

        let public = PublicInput {
            tree_root: header.note_tree_root,
            contract_address: note.contract_address,
            owner: note.note.owner(),
            project: note.note.project(),
            tier: note.note.tier(),
            expiry: note.note.expiry(),
            cooldown_code: note.note.cooldown_code(),
        };
        let private = PrivateInput {
            randomness: note.note.randomness(),
            storage_slot: note.storage_slot,
            insertion_nonce: note.insertion_nonce,
            sibling_path,
        };
        info!(leaf_index, root = %public.tree_root, "membership inputs assembled");
        Ok((public, private))
    }

    async fn bounded<R, E>(
        &self,
        lookup: &'static str,
        fut: impl Future<Output = Result<R, E>>,
    ) -> Result<R, MembershipError>
    where
        MembershipError: From<E>,
    {
        match tokio::time::timeout(self.lookup_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(lookup, "lookup timed out");
                Err(MembershipError::LookupTimeout { lookup })
            }
        }
    }
}
