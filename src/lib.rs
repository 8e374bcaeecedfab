#![doc = include_str!("../README.md")]
#![warn(clippy::all, clippy::pedantic, clippy::cargo)]

pub mod client;
pub mod error;
mod field;
pub mod ledger;
pub mod merkle_tree;
pub mod poseidon;
pub mod poseidon_tree;
pub mod prover;
pub mod storage;
mod util;

// Export types
pub use crate::client::{Client, Invitation, JoinBundle};
pub use crate::error::{Error, Result};
pub use crate::field::{from_bytes32, hash_to_field, to_bytes32, Field, MODULUS};
pub use crate::merkle_tree::{MerklePath, MerkleTree};
pub use crate::poseidon_tree::PoseidonTree;
pub use crate::prover::{JoinWitness, Proof, ProverService};
