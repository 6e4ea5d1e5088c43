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

//! An in-memory `Trie`/`TrieDatabase`/`Database` fake sufficient to drive
//! `StateDb` end to end in tests, grounded in the teacher's
//! `StateDB::new_with_memorydb` test-harness idiom (a throwaway in-memory
//! backing store wired up the same way a disk-backed one would be). No
//! snapshot tree: tests exercise the slow storage-deletion path only.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use account::Account;
use address::{AddressHash, SlotValue};
use error::ExternalError;
use external::{Batch, Database, DirtyNodeSet, ReverseDiff, Trie, TrieDatabase};
use primitives::{Bytes, H256};

use sha3::{Digest, Keccak256};

#[derive(Default, Clone)]
struct StoredState {
    accounts: BTreeMap<AddressHash, Account>,
    storages: BTreeMap<AddressHash, BTreeMap<H256, SlotValue>>,
}

/// A `Trie` backed by an in-memory content map plus a pending-write log.
/// `namespace` is `None` for the account trie, `Some(address_hash)` for a
/// storage trie — used only to build namespaced dirty-node paths so a
/// single merged `DirtyNodeSet` can be routed back to the right bucket in
/// `MemoryTrieDatabase::update`.
pub struct MemoryTrie {
    namespace: Option<AddressHash>,
    accounts: BTreeMap<AddressHash, Account>,
    storage: BTreeMap<H256, SlotValue>,
    pending: BTreeMap<Vec<u8>, Option<Bytes>>,
}

impl MemoryTrie {
    fn account_trie(accounts: BTreeMap<AddressHash, Account>) -> Self {
        MemoryTrie {
            namespace: None,
            accounts,
            storage: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    fn storage_trie(namespace: AddressHash, storage: BTreeMap<H256, SlotValue>) -> Self {
        MemoryTrie {
            namespace: Some(namespace),
            accounts: BTreeMap::new(),
            storage,
            pending: BTreeMap::new(),
        }
    }

    /// Account-trie paths are bare 32-byte address hashes; storage-trie
    /// paths are `address_hash ++ slot_hash` (64 bytes, left un-hashed so
    /// `MemoryTrieDatabase::update` can split them back apart).
    fn path_bytes_for(&self, key: &H256) -> Vec<u8> {
        match self.namespace {
            None => key.as_bytes().to_vec(),
            Some(namespace) => {
                let mut bytes = Vec::with_capacity(64);
                bytes.extend_from_slice(namespace.as_bytes());
                bytes.extend_from_slice(key.as_bytes());
                bytes
            }
        }
    }
}

impl Trie for MemoryTrie {
    fn get_account(&self, address: &AddressHash) -> Result<Option<Account>, ExternalError> {
        Ok(self.accounts.get(address).cloned())
    }

    fn update_account(&mut self, address: &AddressHash, account: &Account) -> Result<(), ExternalError> {
        self.accounts.insert(*address, account.clone());
        self.pending.insert(self.path_bytes_for(address), Some(::rlp::encode(account).to_vec()));
        Ok(())
    }

    fn delete_account(&mut self, address: &AddressHash) -> Result<(), ExternalError> {
        self.accounts.remove(address);
        self.pending.insert(self.path_bytes_for(address), None);
        Ok(())
    }

    fn get_storage(&self, key: &H256) -> Result<Option<SlotValue>, ExternalError> {
        Ok(self.storage.get(key).copied())
    }

    fn update_storage(&mut self, key: &H256, value: &SlotValue) -> Result<(), ExternalError> {
        self.storage.insert(*key, *value);
        self.pending.insert(self.path_bytes_for(key), Some(value.as_bytes().to_vec()));
        Ok(())
    }

    fn delete_storage(&mut self, key: &H256) -> Result<(), ExternalError> {
        self.storage.remove(key);
        self.pending.insert(self.path_bytes_for(key), None);
        Ok(())
    }

    fn update_contract_code(&mut self, _code_hash: &H256, _code: &[u8]) -> Result<(), ExternalError> {
        Ok(())
    }

    fn hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        match self.namespace {
            None => {
                for (address, account) in &self.accounts {
                    hasher.update(address.as_bytes());
                    hasher.update(&::rlp::encode(account));
                }
            }
            Some(_) => {
                for (slot, value) in &self.storage {
                    hasher.update(slot.as_bytes());
                    hasher.update(value.as_bytes());
                }
            }
        }
        H256::from_slice(&hasher.finalize())
    }

    fn commit(&mut self) -> Result<(H256, DirtyNodeSet), ExternalError> {
        let mut dirty = DirtyNodeSet::new();
        for (path, entry) in self.pending.drain_filter_compat() {
            match entry {
                Some(blob) => dirty.insert_update(path, blob),
                None => dirty.insert_deletion(path),
            }
        }
        Ok((self.hash(), dirty))
    }

    fn node_iterator(&self) -> Box<dyn Iterator<Item = (H256, Bytes)> + '_> {
        match self.namespace {
            None => Box::new(self.accounts.keys().map(|k| (*k, Vec::new()))),
            Some(_) => Box::new(self.storage.iter().map(|(k, v)| (*k, v.as_bytes().to_vec()))),
        }
    }
}

trait DrainFilterCompat {
    fn drain_filter_compat(&mut self) -> Vec<(Vec<u8>, Option<Bytes>)>;
}

impl DrainFilterCompat for BTreeMap<Vec<u8>, Option<Bytes>> {
    fn drain_filter_compat(&mut self) -> Vec<(Vec<u8>, Option<Bytes>)> {
        std::mem::take(self).into_iter().collect()
    }
}

/// The in-memory `TrieDatabase`: a root-keyed map of full account/storage
/// content, advanced by applying each commit's dirty-node patch onto the
/// parent root's content.
#[derive(Default)]
pub struct MemoryTrieDatabase {
    roots: Mutex<HashMap<H256, StoredState>>,
    last_reverse_diff: Mutex<Option<ReverseDiff>>,
}

impl MemoryTrieDatabase {
    pub fn new() -> Arc<Self> {
        let mut roots = HashMap::new();
        roots.insert(H256::zero(), StoredState::default());
        Arc::new(MemoryTrieDatabase {
            roots: Mutex::new(roots),
            last_reverse_diff: Mutex::new(None),
        })
    }
}

impl TrieDatabase for MemoryTrieDatabase {
    fn open_trie(&self, root: &H256) -> Result<Box<dyn Trie>, ExternalError> {
        let roots = self.roots.lock().expect("memory trie db mutex poisoned");
        let state = roots.get(root).cloned().ok_or_else(|| ExternalError(format!("unknown root {:?}", root)))?;
        Ok(Box::new(MemoryTrie::account_trie(state.accounts)))
    }

    fn open_storage_trie(
        &self,
        state_root: &H256,
        address: &AddressHash,
        _storage_root: &H256,
    ) -> Result<Box<dyn Trie + Send>, ExternalError> {
        let roots = self.roots.lock().expect("memory trie db mutex poisoned");
        let state = roots.get(state_root).cloned().unwrap_or_default();
        let storage = state.storages.get(address).cloned().unwrap_or_default();
        Ok(Box::new(MemoryTrie::storage_trie(*address, storage)))
    }

    fn copy_trie(&self, trie: &dyn Trie) -> Box<dyn Trie + Send> {
        // Tests never mutate a copied trie concurrently with the original,
        // so re-deriving a fresh snapshot from the current root is enough.
        let root = trie.hash();
        let roots = self.roots.lock().expect("memory trie db mutex poisoned");
        match roots.get(&root) {
            Some(state) => Box::new(MemoryTrie::account_trie(state.accounts.clone())),
            None => Box::new(MemoryTrie::account_trie(BTreeMap::new())),
        }
    }

    fn update(
        &self,
        new_root: &H256,
        old_root: &H256,
        _block_number: u64,
        dirty_nodes: DirtyNodeSet,
        reverse_diff: ReverseDiff,
    ) -> Result<(), ExternalError> {
        let mut roots = self.roots.lock().expect("memory trie db mutex poisoned");
        let mut state = roots.get(old_root).cloned().unwrap_or_default();
        for (path, blob) in dirty_nodes.iter() {
            match path.len() {
                32 => {
                    let address_hash = AddressHash::from_slice(path);
                    match blob {
                        Some(bytes) => {
                            if let Ok(account) = ::rlp::decode::<Account>(bytes) {
                                state.accounts.insert(address_hash, account);
                            }
                        }
                        None => {
                            state.accounts.remove(&address_hash);
                        }
                    }
                }
                64 => {
                    let address_hash = AddressHash::from_slice(&path[..32]);
                    let slot_hash = H256::from_slice(&path[32..]);
                    let bucket = state.storages.entry(address_hash).or_insert_with(BTreeMap::new);
                    match blob {
                        Some(bytes) => {
                            bucket.insert(slot_hash, SlotValue::from_slice(bytes));
                        }
                        None => {
                            bucket.remove(&slot_hash);
                        }
                    }
                }
                _ => {}
            }
        }
        roots.insert(*new_root, state);
        *self.last_reverse_diff.lock().expect("memory trie db mutex poisoned") = Some(reverse_diff);
        Ok(())
    }
}

impl MemoryTrieDatabase {
    /// Exposes the most recently persisted `ReverseDiff`, for scenarios
    /// that check accountsOrigin/storagesOrigin directly (section 8, S3).
    pub fn last_reverse_diff(&self) -> Option<ReverseDiff> {
        self.last_reverse_diff.lock().expect("memory trie db mutex poisoned").clone()
    }
}

/// An in-memory `Database`/`Batch` pair for code blobs and extension writes.
#[derive(Default)]
pub struct MemoryKvDatabase {
    store: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryKvDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryKvDatabase::default())
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.lock().expect("memory kv db mutex poisoned").get(key).cloned()
    }
}

pub struct MemoryBatch {
    pending: Vec<(Vec<u8>, Vec<u8>)>,
    store: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl Database for MemoryKvDatabase {
    fn new_batch(&self) -> Box<dyn Batch> {
        Box::new(MemoryBatch {
            pending: Vec::new(),
            store: Arc::clone(&self.store),
        })
    }
}

impl Batch for MemoryBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.pending.push((key.to_vec(), value.to_vec()));
    }

    fn value_size(&self) -> usize {
        self.pending.iter().map(|(_, v)| v.len()).sum()
    }

    fn write(self: Box<Self>) -> Result<(), ExternalError> {
        let mut store = self.store.lock().expect("memory kv db mutex poisoned");
        for (key, value) in self.pending {
            store.insert(key, value);
        }
        Ok(())
    }
}
