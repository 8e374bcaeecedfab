use crate::merkle_tree::MerkleTree;
use crate::poseidon::Poseidon;
use crate::storage::MemoryStorage;

/// The tree configuration the client mirrors the ledger with.
pub type PoseidonTree = MerkleTree<Poseidon, MemoryStorage>;
