pub mod local_wallet;
pub mod memory_ledger;
pub mod memory_store;
pub mod merkle_tree;
