use std::future::Future;

use crate::domain::commitment::Commitment;
use crate::domain::merkle::SiblingPath;

/// Port for the note hash tree index service.
///
/// Implementations:
/// - `InMemoryLedger` (indexes its own tree)
pub trait TreeIndexPort: Send + Sync {
    /// Leaf position of a confirmed commitment, `None` if it was never included.
    fn find_leaf_index(
        &self,
        commitment: Commitment,
    ) -> impl Future<Output = Result<Option<u64>, TreeError>> + Send;

    /// Sibling path for a leaf against the current root.
    fn get_sibling_path(
        &self,
        leaf_index: u64,
    ) -> impl Future<Output = Result<SiblingPath, TreeError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("leaf index {0} out of range")]
    LeafOutOfRange(u64),

    #[error("tree service error: {0}")]
    Service(String),
}
