//! Fixed-depth Poseidon Merkle tree over credential commitments

use crate::poseidon::hash2;
use ff::Field;
use halo2curves::pasta::Fp;
use std::collections::HashMap;
use votebatch_runtime::{FieldBytes, Result, VoteBatchError};

/// Authentication path for one leaf.
///
/// `indices[i]` is true when the node at level `i` is a right child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub siblings: Vec<Fp>,
    pub indices: Vec<bool>,
}

impl MerklePath {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    pub fn compute_root(&self, leaf: Fp) -> Fp {
        self.siblings.iter().zip(&self.indices).fold(leaf, |node, (sibling, is_right)| {
            if *is_right {
                hash2(*sibling, node)
            } else {
                hash2(node, *sibling)
            }
        })
    }

    /// A path of zero siblings, used for padding slots.
    pub fn empty(depth: usize) -> Self {
        Self { siblings: vec![Fp::ZERO; depth], indices: vec![false; depth] }
    }
}

/// Append-only Merkle tree with incremental updates.
///
/// `layers[0]` holds the leaves; `layers[depth]` holds the root once any
/// leaf exists. Missing nodes are the precomputed empty subtree roots.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    depth: usize,
    layers: Vec<Vec<Fp>>,
    empty_roots: Vec<Fp>,
    positions: HashMap<FieldBytes, usize>,
}

impl MerkleTree {
    pub fn new(depth: usize) -> Self {
        let mut empty_roots = Vec::with_capacity(depth + 1);
        empty_roots.push(Fp::ZERO);
        for level in 0..depth {
            let below = empty_roots[level];
            empty_roots.push(hash2(below, below));
        }
        Self { depth, layers: vec![Vec::new(); depth + 1], empty_roots, positions: HashMap::new() }
    }

    pub fn from_leaves(depth: usize, leaves: &[Fp]) -> Result<Self> {
        let mut tree = Self::new(depth);
        for leaf in leaves {
            tree.insert(*leaf)?;
        }
        Ok(tree)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn capacity(&self) -> usize {
        1usize << self.depth
    }

    pub fn len(&self) -> usize {
        self.layers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers[0].is_empty()
    }

    pub fn leaves(&self) -> &[Fp] {
        &self.layers[0]
    }

    fn node(&self, level: usize, index: usize) -> Fp {
        self.layers[level].get(index).copied().unwrap_or(self.empty_roots[level])
    }

    pub fn root(&self) -> Fp {
        self.node(self.depth, 0)
    }

    /// Append a leaf and return its index. Leaves are unique.
    pub fn insert(&mut self, leaf: Fp) -> Result<usize> {
        let index = self.len();
        if index >= self.capacity() {
            return Err(VoteBatchError::invalid_shape(format!(
                "credential tree of depth {} is full",
                self.depth
            )));
        }
        let key = ff::PrimeField::to_repr(&leaf);
        if self.positions.contains_key(&key) {
            return Err(VoteBatchError::malformed_record("credential commitment already registered"));
        }

        self.layers[0].push(leaf);
        self.positions.insert(key, index);

        let mut position = index;
        for level in 0..self.depth {
            let parent = position / 2;
            let left = self.node(level, parent * 2);
            let right = self.node(level, parent * 2 + 1);
            let value = hash2(left, right);
            let layer = &mut self.layers[level + 1];
            if parent < layer.len() {
                layer[parent] = value;
            } else {
                layer.push(value);
            }
            position = parent;
        }
        Ok(index)
    }

    pub fn position(&self, leaf: &Fp) -> Option<usize> {
        self.positions.get(&ff::PrimeField::to_repr(leaf)).copied()
    }

    pub fn contains(&self, leaf: &Fp) -> bool {
        self.position(leaf).is_some()
    }

    pub fn path(&self, index: usize) -> Result<MerklePath> {
        if index >= self.len() {
            return Err(VoteBatchError::inclusion_failure(format!(
                "leaf index {} out of range ({} leaves)",
                index,
                self.len()
            )));
        }
        let mut siblings = Vec::with_capacity(self.depth);
        let mut indices = Vec::with_capacity(self.depth);
        let mut position = index;
        for level in 0..self.depth {
            siblings.push(self.node(level, position ^ 1));
            indices.push(position & 1 == 1);
            position /= 2;
        }
        Ok(MerklePath { siblings, indices })
    }

    /// Root of the tree restricted to its first `leaf_count` leaves.
    pub fn root_at(&self, leaf_count: usize) -> Result<Fp> {
        if leaf_count > self.len() {
            return Err(VoteBatchError::inclusion_failure(format!(
                "tree has only {} leaves, cannot rebuild root at {}",
                self.len(),
                leaf_count
            )));
        }
        if leaf_count == self.len() {
            return Ok(self.root());
        }
        Ok(Self::from_leaves(self.depth, &self.layers[0][..leaf_count])?.root())
    }
}
