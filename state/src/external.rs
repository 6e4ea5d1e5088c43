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

//! The external collaborators this crate consumes but never implements in
//! production: the trie, the trie-backed database, the layered snapshot
//! tree, and optional tracer/extension hooks. A real Merkle-Patricia trie
//! and a real on-disk key-value store live in a downstream crate; this one
//! only ships the contract plus an in-memory fake for its own tests.

use account::Account;
use address::{Address, AddressHash, Slot, SlotValue};
use error::ExternalError;
use primitives::{Bytes, H256};

/// A single Merkle-Patricia trie, either the account trie or one account's
/// storage trie.
pub trait Trie {
    fn get_account(&self, address: &AddressHash) -> Result<Option<Account>, ExternalError>;
    fn update_account(&mut self, address: &AddressHash, account: &Account) -> Result<(), ExternalError>;
    fn delete_account(&mut self, address: &AddressHash) -> Result<(), ExternalError>;

    fn get_storage(&self, key: &H256) -> Result<Option<SlotValue>, ExternalError>;
    fn update_storage(&mut self, key: &H256, value: &SlotValue) -> Result<(), ExternalError>;
    fn delete_storage(&mut self, key: &H256) -> Result<(), ExternalError>;

    fn update_contract_code(&mut self, code_hash: &H256, code: &[u8]) -> Result<(), ExternalError>;

    fn hash(&self) -> H256;

    /// Flushes this trie's pending mutations, returning its new root and the
    /// set of trie-node paths it touched (`None` values mean "deleted").
    fn commit(&mut self) -> Result<(H256, DirtyNodeSet), ExternalError>;

    /// Walks every (key, value) pair currently reachable from this trie's
    /// root, used by the slow-path storage deletion strategy.
    fn node_iterator(&self) -> Box<dyn Iterator<Item = (H256, Bytes)> + '_>;
}

/// A trie-node path, opaque to this crate beyond ordering and equality.
pub type NodePath = Bytes;

/// Trie-commit output: a node is either replaced with new bytes or deleted.
#[derive(Debug, Clone, Default)]
pub struct DirtyNodeSet {
    entries: std::collections::BTreeMap<NodePath, Option<Bytes>>,
}

impl DirtyNodeSet {
    pub fn new() -> Self {
        DirtyNodeSet::default()
    }

    pub fn insert_update(&mut self, path: NodePath, blob: Bytes) {
        self.entries.insert(path, Some(blob));
    }

    pub fn insert_deletion(&mut self, path: NodePath) {
        self.entries.insert(path, None);
    }

    pub fn merge(&mut self, other: DirtyNodeSet) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodePath, &Option<Bytes>)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Section 4.7 step 5's update-before-delete ordering (property 6, no
    /// path carries both an "added" and a "deleted" entry) holds by
    /// construction here: `entries` is keyed by path, so a later write for
    /// the same path always replaces the earlier one rather than coexisting
    /// with it.
    #[test]
    fn later_write_replaces_earlier_entry_for_same_path() {
        let mut set = DirtyNodeSet::new();
        let path: NodePath = b"account".to_vec();
        set.insert_update(path.clone(), vec![1, 2, 3]);
        set.insert_deletion(path.clone());

        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![(&path, &None)]);
    }
}

/// The trie-backed database that stores dirty-node sets and reverse-diffs
/// keyed by (new root, old root, block number).
pub trait TrieDatabase {
    fn open_trie(&self, root: &H256) -> Result<Box<dyn Trie>, ExternalError>;

    /// Storage tries are handed to `Commit`'s concurrent fan-out (section
    /// 4.8), so the backend must hand back a `Send` handle.
    fn open_storage_trie(
        &self,
        state_root: &H256,
        address: &AddressHash,
        storage_root: &H256,
    ) -> Result<Box<dyn Trie + Send>, ExternalError>;
    fn copy_trie(&self, trie: &dyn Trie) -> Box<dyn Trie + Send>;

    fn is_hash_scheme(&self) -> bool {
        false
    }

    fn update(
        &self,
        new_root: &H256,
        old_root: &H256,
        block_number: u64,
        dirty_nodes: DirtyNodeSet,
        reverse_diff: ReverseDiff,
    ) -> Result<(), ExternalError>;
}

/// Pre-state images sufficient to invert a state transition.
#[derive(Debug, Clone, Default)]
pub struct ReverseDiff {
    pub accounts_origin: std::collections::BTreeMap<Address, Option<Bytes>>,
    pub storages_origin: std::collections::BTreeMap<Address, std::collections::BTreeMap<H256, Bytes>>,
}

/// A batch of key-value writes, e.g. code blobs or extension artifacts.
pub trait Batch {
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn value_size(&self) -> usize;
    fn write(self: Box<Self>) -> Result<(), ExternalError>;
}

pub trait Database {
    fn new_batch(&self) -> Box<dyn Batch>;
}

/// A flat, O(1)-lookup view of state at one root, stacked as diffs over a
/// disk layer.
pub trait Snapshot {
    fn root(&self) -> H256;
    fn account(&self, address_hash: &AddressHash) -> Result<Option<Bytes>, ExternalError>;
}

/// Iterates (slot-hash, value) pairs of one account's storage at a fixed
/// root, used by the fast-path deletion strategy.
pub trait StorageIterator {
    fn next(&mut self) -> bool;
    fn hash(&self) -> H256;
    fn slot(&self) -> SlotValue;
    fn error(&self) -> Option<ExternalError>;
    fn release(self: Box<Self>);
}

pub trait SnapshotTree {
    fn snapshot(&self, root: &H256) -> Option<Box<dyn Snapshot>>;

    fn storage_iterator(
        &self,
        root: &H256,
        address_hash: &AddressHash,
        start_slot: &Slot,
    ) -> Result<Box<dyn StorageIterator>, ExternalError>;

    fn update(
        &self,
        new_root: &H256,
        parent_root: &H256,
        destructed: std::collections::BTreeSet<AddressHash>,
        accounts: std::collections::BTreeMap<AddressHash, Bytes>,
        storages: std::collections::BTreeMap<AddressHash, std::collections::BTreeMap<H256, Bytes>>,
    ) -> Result<(), ExternalError>;

    fn cap(&self, root: &H256, layer_depth: u64);
}

/// Chain-specific extra data written alongside a commit (section 4.8 step
/// 5). The default no-op means most callers never need to implement this.
pub trait ExtensionWriter {
    fn write(&self, _batch: &mut dyn Batch) -> Result<(), ExternalError> {
        Ok(())
    }
}

pub struct NoopExtensionWriter;

impl ExtensionWriter for NoopExtensionWriter {}

/// Optional observer notified of logs and balance changes as they happen.
pub trait Tracer {
    fn on_log(&mut self, _tx_hash: H256, _log: &crate::log::Log) {}
    fn on_balance_change(&mut self, _address: Address, _prev: primitives::U256, _new: primitives::U256, _reason: &str) {}
}

pub struct NoopTracer;

impl Tracer for NoopTracer {}
