//! Incremental Merkle tree over a key-value store.
//!
//! The tree has a fixed depth and lazily materialized default subtrees: a
//! node that was never written stands for the zero value of its level.
//! Updates stage every touched node and commit them in one batched write,
//! so readers never observe a stale root over updated leaves.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::{hash_to_field, Field};
use crate::storage::{MemoryStorage, Storage};

/// Hash algorithm for tree nodes and zero-value derivation.
pub trait Hasher {
    /// Compute the hash of an intermediate node.
    fn hash_node(&self, left: Field, right: Field) -> Result<Field>;
}

/// One level of a leaf-to-root walk.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Step {
    pub level: usize,
    pub current_index: usize,
    pub sibling_index: usize,
}

/// Walk from the leaf slot at `index` up to the last level below the root.
///
/// At every level the sibling differs from the current node in the lowest
/// bit and the parent index drops that bit. Both [`MerkleTree::path`] and
/// [`MerkleTree::update`] fold over this same sequence.
pub fn traverse(index: usize, levels: usize) -> impl Iterator<Item = Step> {
    (0..levels).scan(index, |current, level| {
        let step = Step {
            level,
            current_index: *current,
            sibling_index: *current ^ 1,
        };
        *current >>= 1;
        Some(step)
    })
}

/// Storage key of the node at `(level, index)`.
///
/// Any implementation interoperating with the same persisted store must
/// reproduce this exact addressing; the root lives at `(n_levels, 0)`.
#[must_use]
pub fn index_to_key(prefix: &str, level: usize, index: usize) -> String {
    format!("{prefix}_tree_{level}_{index}")
}

/// Merkle path from a leaf to the root.
///
/// `path_indices[i]` is the parity of the walked node at level `i`: 0 when
/// it is a left child (sibling on the right), 1 when it is a right child.
/// The verifier needs the parities to re-hash in the correct order.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MerklePath {
    pub root: Field,
    pub path_elements: Vec<Field>,
    pub path_indices: Vec<u8>,
    pub leaf: Field,
}

impl MerklePath {
    /// Re-derive the root from the leaf and the sibling path.
    pub fn compute_root<H: Hasher>(&self, hasher: &H) -> Result<Field> {
        self.path_elements
            .iter()
            .zip(&self.path_indices)
            .try_fold(self.leaf, |current, (&sibling, &parity)| {
                if parity == 0 {
                    hasher.hash_node(current, sibling)
                } else {
                    hasher.hash_node(sibling, current)
                }
            })
    }
}

/// Append-only Merkle tree of fixed depth.
///
/// Exclusively owns its storage and its leaf counter; the counter only
/// advances through [`MerkleTree::insert`], by exactly one per call.
pub struct MerkleTree<H, S> {
    /// Number of levels below the root; level 0 holds the leaves.
    n_levels: usize,

    /// Key prefix and zero-value seed.
    seed: String,

    /// Hash of the empty subtree per level, leaf to root.
    zero_values: Vec<Field>,

    /// Next free leaf index.
    total_elements: usize,

    hasher: H,
    storage: S,
}

impl<H: Hasher> MerkleTree<H, MemoryStorage> {
    /// Creates a tree backed by fresh in-memory storage.
    pub fn new(n_levels: usize, hasher: H, seed: impl Into<String>) -> Result<Self> {
        Self::with_storage(n_levels, hasher, seed, MemoryStorage::new())
    }
}

impl<H: Hasher, S: Storage> MerkleTree<H, S> {
    /// Creates a tree over an existing store.
    ///
    /// Zero values are derived from the seed alone: `zero[0]` is the seed
    /// hashed into the field and every level above hashes the previous
    /// value with itself. They are reproducible from `(seed, n_levels)` and
    /// never persisted.
    pub fn with_storage(
        n_levels: usize,
        hasher: H,
        seed: impl Into<String>,
        storage: S,
    ) -> Result<Self> {
        let seed = seed.into();
        let mut zero_values = Vec::with_capacity(n_levels + 1);
        let mut current = hash_to_field(seed.as_bytes());
        zero_values.push(current);
        for _ in 0..n_levels {
            current = hasher.hash_node(current, current)?;
            zero_values.push(current);
        }
        Ok(Self {
            n_levels,
            seed,
            zero_values,
            total_elements: 0,
            hasher,
            storage,
        })
    }

    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Number of leaves inserted so far; also the next free index.
    #[must_use]
    pub fn total_elements(&self) -> usize {
        self.total_elements
    }

    #[must_use]
    pub fn num_leaves(&self) -> usize {
        1 << self.n_levels
    }

    /// Empty-subtree hashes, leaf level first.
    #[must_use]
    pub fn zero_values(&self) -> &[Field] {
        &self.zero_values
    }

    /// Current root; `zero[n_levels]` while the tree is empty.
    pub fn root(&self) -> Result<Field> {
        self.storage
            .get_or(&self.root_key(), self.zero_values[self.n_levels])
    }

    /// Read-only Merkle path for the leaf slot at `index`.
    ///
    /// Unwritten slots yield a path over zero values, consistent with the
    /// current root.
    pub fn path(&self, index: usize) -> Result<MerklePath> {
        self.check_range(index)?;
        let root = self.root()?;
        let leaf = self
            .storage
            .get_or(&self.node_key(0, index), self.zero_values[0])?;
        let mut path_elements = Vec::with_capacity(self.n_levels);
        let mut path_indices = Vec::with_capacity(self.n_levels);
        for step in traverse(index, self.n_levels) {
            let sibling = self.storage.get_or(
                &self.node_key(step.level, step.sibling_index),
                self.zero_values[step.level],
            )?;
            path_elements.push(sibling);
            path_indices.push(u8::try_from(step.current_index % 2).unwrap());
        }
        Ok(MerklePath {
            root,
            path_elements,
            path_indices,
            leaf,
        })
    }

    /// Write a leaf and recompute every ancestor up to and including the
    /// root.
    ///
    /// `insert = false` requires an existing leaf, `insert = true` the next
    /// free slot; anything else is an [`Error::IndexPolicyViolation`]. Every
    /// touched node is staged and committed in one batched write at the end;
    /// any error aborts before the batch and leaves the store untouched.
    pub fn update(&mut self, index: usize, element: Field, insert: bool) -> Result<()> {
        self.check_range(index)?;
        if insert != (index >= self.total_elements) {
            return Err(Error::IndexPolicyViolation {
                index,
                total: self.total_elements,
                insert,
            });
        }
        let mut batch = Vec::with_capacity(self.n_levels + 1);
        let mut current = element;
        for step in traverse(index, self.n_levels) {
            let sibling = self.storage.get_or(
                &self.node_key(step.level, step.sibling_index),
                self.zero_values[step.level],
            )?;
            let (left, right) = if step.current_index % 2 == 0 {
                (current, sibling)
            } else {
                (sibling, current)
            };
            batch.push((self.node_key(step.level, step.current_index), current));
            current = self.hasher.hash_node(left, right)?;
        }
        batch.push((self.root_key(), current));
        self.storage.put_batch(batch)
    }

    /// Append a leaf at the next free index, returning that index.
    ///
    /// The only way `total_elements` advances. Callers mirroring an external
    /// ordered leaf source must insert in that exact order to keep roots
    /// reproducible.
    pub fn insert(&mut self, element: Field) -> Result<usize> {
        let index = self.total_elements;
        self.update(index, element, true)?;
        self.total_elements += 1;
        Ok(index)
    }

    /// Newest leaf index holding `element`, scanning from the most recent
    /// insertion down.
    ///
    /// Linear in the number of leaves; acceptable at client scale but not to
    /// be assumed fast for large trees without an auxiliary index.
    pub fn get_index_by_element(&self, element: Field) -> Result<Option<usize>> {
        for index in (0..self.total_elements).rev() {
            if self.storage.get(&self.node_key(0, index))? == Some(element) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn node_key(&self, level: usize, index: usize) -> String {
        index_to_key(&self.seed, level, index)
    }

    fn root_key(&self) -> String {
        self.node_key(self.n_levels, 0)
    }

    fn check_range(&self, index: usize) -> Result<()> {
        if index >= self.num_leaves() {
            return Err(Error::InvalidInput(format!(
                "leaf index {index} exceeds the capacity of a depth-{} tree",
                self.n_levels
            )));
        }
        Ok(())
    }
}
