pub mod authorization;
pub mod commitment;
pub mod keys;
pub mod merkle;
pub mod note;
pub mod nullifier;
