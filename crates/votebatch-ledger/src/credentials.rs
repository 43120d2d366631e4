//! Registered voter credentials

use crate::store::AppendLog;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::{debug, info};
use votebatch_circuit::{
    field::{fp_to_bytes, fp_to_hex, serde_fp},
    Fp, MerkleTree,
};
use votebatch_runtime::{FieldBytes, Result, VoteBatchError};

/// Registry shared between the aggregator and the authority.
pub type SharedRegistry = Arc<RwLock<CredentialRegistry>>;

#[derive(Debug, Serialize, Deserialize)]
struct Registration {
    index: usize,
    #[serde(with = "serde_fp")]
    commitment: Fp,
}

/// The CredentialSet, its Merkle tree and the history of every root the
/// tree has had.
///
/// Every registration moves the root, and each root is remembered with the
/// number of leaves it covers. A batch proved against an older root can
/// therefore still be audited once more credentials are registered.
pub struct CredentialRegistry {
    tree: MerkleTree,
    roots: HashMap<FieldBytes, usize>,
    log: AppendLog<Registration>,
}

impl CredentialRegistry {
    pub fn in_memory(depth: usize) -> Self {
        Self::with_log(depth, AppendLog::in_memory())
    }

    /// Open the registry persisted at `path`, replaying its log.
    pub fn open<P: AsRef<Path>>(path: P, depth: usize) -> Result<Self> {
        let (log, entries) = AppendLog::open(path)?;
        let mut registry = Self::with_log(depth, log);
        for entry in entries {
            let index = registry.apply(entry.commitment)?;
            if index != entry.index {
                return Err(VoteBatchError::serialization_error(format!(
                    "credential log out of order: expected index {}, found {}",
                    index, entry.index
                )));
            }
        }
        info!(credentials = registry.len(), root = %fp_to_hex(&registry.root()), "credential registry loaded");
        Ok(registry)
    }

    fn with_log(depth: usize, log: AppendLog<Registration>) -> Self {
        let tree = MerkleTree::new(depth);
        let mut roots = HashMap::new();
        roots.insert(fp_to_bytes(&tree.root()), 0);
        Self { tree, roots, log }
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    fn apply(&mut self, commitment: Fp) -> Result<usize> {
        let index = self.tree.insert(commitment)?;
        self.roots.insert(fp_to_bytes(&self.tree.root()), self.tree.len());
        Ok(index)
    }

    /// Append a credential commitment and return its leaf index.
    pub fn register(&mut self, commitment: Fp) -> Result<usize> {
        if self.tree.contains(&commitment) {
            return Err(VoteBatchError::malformed_record("credential commitment already registered"));
        }
        if self.tree.len() >= self.tree.capacity() {
            return Err(VoteBatchError::invalid_shape(format!(
                "credential tree of depth {} is full",
                self.tree.depth()
            )));
        }
        let index = self.tree.len();
        self.log.append(&Registration { index, commitment })?;
        self.apply(commitment)?;
        debug!(index, "credential registered");
        Ok(index)
    }

    pub fn root(&self) -> Fp {
        self.tree.root()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Copy of the current tree, for witness building outside the lock.
    pub fn snapshot(&self) -> MerkleTree {
        self.tree.clone()
    }

    pub fn contains(&self, commitment: &Fp) -> bool {
        self.tree.contains(commitment)
    }

    pub fn is_known_root(&self, root: &Fp) -> bool {
        self.roots.contains_key(&fp_to_bytes(root))
    }

    /// Number of leaves the tree had when its root was `root`.
    pub fn leaf_count_at(&self, root: &Fp) -> Option<usize> {
        self.roots.get(&fp_to_bytes(root)).copied()
    }

    /// Whether `commitment` was a leaf of the tree rooted at `root`.
    pub fn contains_at(&self, root: &Fp, commitment: &Fp) -> Result<bool> {
        let leaf_count = self.leaf_count_at(root).ok_or_else(|| {
            VoteBatchError::inclusion_failure("root is not in the credential root history")
        })?;
        Ok(self.tree.position(commitment).is_some_and(|index| index < leaf_count))
    }
}
