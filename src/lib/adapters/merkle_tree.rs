use alloy::primitives::B256;
use std::collections::HashMap;

use crate::domain::commitment::Commitment;
use crate::domain::merkle::{NoteHashTree, SiblingPath};

/// Local note hash tree with a leaf index and root history.
///
/// Backs the in-memory ledger: the ledger appends to it, and the tree index
/// port answers leaf lookups and sibling paths from it.
pub struct LocalNoteHashTree {
    tree: NoteHashTree,
    leaf_indices: HashMap<Commitment, u64>,
    /// Historical roots (oldest first), one per append.
    root_history: Vec<B256>,
}

impl LocalNoteHashTree {
    pub fn new() -> Self {
        Self {
            tree: NoteHashTree::new(),
            leaf_indices: HashMap::new(),
            root_history: Vec::new(),
        }
    }

    /// Append a commitment, returning its leaf index.
    /// Returns `None` if the commitment is already present.
    pub fn insert_commitment(&mut self, commitment: &Commitment) -> Option<u64> {
        if self.leaf_indices.contains_key(commitment) {
            return None;
        }
        let index = self.tree.append(commitment);
        self.leaf_indices.insert(*commitment, index);
        self.root_history.push(self.tree.root());
        Some(index)
    }

    pub fn contains(&self, commitment: &Commitment) -> bool {
        self.leaf_indices.contains_key(commitment)
    }

    pub fn find_leaf_index(&self, commitment: &Commitment) -> Option<u64> {
        self.leaf_indices.get(commitment).copied()
    }

    /// Check if a root exists in the history.
    pub fn is_known_root(&self, root: B256) -> bool {
        self.root_history.contains(&root)
    }

    pub fn current_root(&self) -> B256 {
        self.tree.root()
    }

    pub fn sibling_path(&self, leaf_index: u64) -> Option<SiblingPath> {
        self.tree.sibling_path(leaf_index)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl Default for LocalNoteHashTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commitment(byte: u8) -> Commitment {
        Commitment(B256::left_padding_from(&[byte]))
    }

    #[test]
    fn test_insert_indexes_leaves() {
        let mut tree = LocalNoteHashTree::new();
        assert!(tree.is_empty());

        assert_eq!(tree.insert_commitment(&commitment(1)), Some(0));
        assert_eq!(tree.insert_commitment(&commitment(2)), Some(1));

        assert_eq!(tree.find_leaf_index(&commitment(2)), Some(1));
        assert_eq!(tree.find_leaf_index(&commitment(3)), None);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut tree = LocalNoteHashTree::new();
        tree.insert_commitment(&commitment(1));

        assert_eq!(tree.insert_commitment(&commitment(1)), None);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_root_history_tracks_every_append() {
        let mut tree = LocalNoteHashTree::new();

        tree.insert_commitment(&commitment(1));
        let root1 = tree.current_root();
        tree.insert_commitment(&commitment(2));
        let root2 = tree.current_root();

        assert_ne!(root1, root2);
        assert!(tree.is_known_root(root1));
        assert!(tree.is_known_root(root2));
        assert!(!tree.is_known_root(B256::repeat_byte(0xFF)));
    }

    #[test]
    fn test_sibling_path_matches_current_root() {
        let mut tree = LocalNoteHashTree::new();
        tree.insert_commitment(&commitment(1));
        tree.insert_commitment(&commitment(2));

        let path = tree.sibling_path(1).unwrap();
        assert_eq!(path.compute_root(commitment(2)), Some(tree.current_root()));
    }
}
