// Copyright 2018 Kodebox, Inc.
// This file is part of CodeChain.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Two strategies for wiping a destructed account's storage subtree
//! (section 4.9). Fast path trusts the attached snapshot's storage
//! iterator; slow path walks the trie directly. Callers choose fast path
//! iff a snapshot is attached, falling back to slow path on any error.

use std::collections::BTreeMap;

use address::{AddressHash, Slot, SlotValue};
use error::ExternalError;
use external::{DirtyNodeSet, SnapshotTree, Trie};
use primitives::H256;

use clogger::log_target;

pub struct DeletedStorage {
    pub slot_pre_state: BTreeMap<H256, SlotValue>,
    pub dirty_nodes: DirtyNodeSet,
}

/// Feeds every (slot-hash, value) visible in the snapshot at
/// `pre_state_root` into a dirty-node set that matches the trie-node paths
/// that existed, verifying the result against `expected_storage_root`.
pub fn delete_storage_fast(
    snapshot_tree: &dyn SnapshotTree,
    pre_state_root: &H256,
    address_hash: &AddressHash,
    expected_storage_root: &H256,
) -> Result<DeletedStorage, ExternalError> {
    let mut iter = snapshot_tree.storage_iterator(pre_state_root, address_hash, &Slot::zero())?;
    let mut slot_pre_state = BTreeMap::new();
    let mut dirty_nodes = DirtyNodeSet::new();
    let mut stack_trie_leaves: Vec<(H256, SlotValue)> = Vec::new();

    while iter.next() {
        if let Some(err) = iter.error() {
            return Err(err)
        }
        let hash = iter.hash();
        let value = iter.slot();
        slot_pre_state.insert(hash, value);
        stack_trie_leaves.push((hash, value));
        dirty_nodes.insert_deletion(hash.as_bytes().to_vec());
    }
    if let Some(err) = iter.error() {
        return Err(err)
    }
    iter.release();

    let computed_root = stack_trie_root(&stack_trie_leaves);
    if computed_root != *expected_storage_root {
        panic!(
            "fast-path storage deletion: snapshot root {:?} does not match account storage root {:?}",
            computed_root, expected_storage_root
        )
    }

    Ok(DeletedStorage {
        slot_pre_state,
        dirty_nodes,
    })
}

/// Depth-first walk of the storage trie directly: every leaf records its
/// pre-state, every non-empty interior node records a deletion.
pub fn delete_storage_slow(trie: &dyn Trie) -> Result<DeletedStorage, ExternalError> {
    let mut slot_pre_state = BTreeMap::new();
    let mut dirty_nodes = DirtyNodeSet::new();
    for (path, blob) in trie.node_iterator() {
        if blob.len() == 32 {
            let mut value = [0u8; 32];
            value.copy_from_slice(&blob);
            slot_pre_state.insert(path, SlotValue::from(value));
        }
        dirty_nodes.insert_deletion(path.as_bytes().to_vec());
    }
    Ok(DeletedStorage {
        slot_pre_state,
        dirty_nodes,
    })
}

/// Chooses fast path when a snapshot is attached at `pre_state_root`,
/// falling back to slow path on any error (section 4.9 policy) unless the
/// backend is hash-scheme, in which case deletion is skipped entirely.
pub fn delete_storage(
    snapshot_tree: Option<&dyn SnapshotTree>,
    is_hash_scheme: bool,
    pre_state_root: &H256,
    address_hash: &AddressHash,
    expected_storage_root: &H256,
    trie: &dyn Trie,
) -> Result<DeletedStorage, ExternalError> {
    if is_hash_scheme {
        return Ok(DeletedStorage {
            slot_pre_state: BTreeMap::new(),
            dirty_nodes: DirtyNodeSet::new(),
        })
    }
    if let Some(snapshot_tree) = snapshot_tree {
        match delete_storage_fast(snapshot_tree, pre_state_root, address_hash, expected_storage_root) {
            Ok(result) => return Ok(result),
            Err(err) => {
                cwarn!(SNAPSHOT, "fast-path storage deletion failed ({:?}), falling back to trie walk", err);
            }
        }
    }
    delete_storage_slow(trie)
}

/// A minimal stand-in for a real stack-trie: hashes the sorted leaf set.
/// Good enough to detect "the snapshot disagrees with the trie", which is
/// the only property the fast path relies on here; a production backend
/// supplies its own real stack-trie implementation.
fn stack_trie_root(leaves: &[(H256, SlotValue)]) -> H256 {
    use sha3::{Digest, Keccak256};
    let mut sorted = leaves.to_vec();
    sorted.sort_by_key(|(hash, _)| *hash);
    let mut hasher = Keccak256::new();
    for (hash, value) in &sorted {
        hasher.update(hash.as_bytes());
        hasher.update(value.as_bytes());
    }
    H256::from_slice(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_leaves_hash_stably() {
        assert_eq!(stack_trie_root(&[]), stack_trie_root(&[]));
    }

    #[test]
    fn leaf_order_does_not_affect_root() {
        let a = (H256::from_low_u64_be(1), SlotValue::from_low_u64_be(10));
        let b = (H256::from_low_u64_be(2), SlotValue::from_low_u64_be(20));
        assert_eq!(stack_trie_root(&[a, b]), stack_trie_root(&[b, a]));
    }
}
