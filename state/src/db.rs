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

//! The façade (section 2 "StateDB core"): owns the live cache, journal,
//! mutation index, destruct set, snapshot handle and trie handle, and
//! orchestrates `Finalise` → `IntermediateRoot` → `Commit`. Grounded in the
//! teacher's `TopLevelState`/`StateDB` layering (one struct owning several
//! caches plus a checkpoint-id stack above a trie-backed db handle, using
//! `parking_lot::Mutex` for the concurrent parts); the per-tx finalise/
//! intermediate-root staging has no teacher precedent and is built directly
//! from the design this crate implements.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use access_list::AccessList;
use account::Account;
use address::{hash_address, hash_slot, Address, AddressHash, Slot, SlotValue};
use config::StateConfig;
use error::{Error, ExternalError, Result};
use external::{Batch, Database, DirtyNodeSet, ExtensionWriter, ReverseDiff, SnapshotTree, Tracer, Trie, TrieDatabase};
use journal::{Journal, JournalEntry, JournalUndo};
use object::StateObject;
use prefetcher::Prefetcher;
use primitives::{Bytes, H256, U256};
use revision::Revisions;
use transient_storage::TransientStorage;

use clogger::log_target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MutationKind {
    Update,
    Deletion,
}

#[derive(Debug, Clone, Copy)]
struct Mutation {
    kind: MutationKind,
    applied: bool,
}

/// The transactional state cache for one block (SPEC_FULL.md section 1).
/// A committed instance is inert: every public operation after `commit`
/// panics, matching "a committed instance is dead".
pub struct StateDb {
    config: StateConfig,
    database: Arc<dyn TrieDatabase + Send + Sync>,
    kv_database: Arc<dyn Database + Send + Sync>,
    snapshot_tree: Option<Arc<dyn SnapshotTree + Send + Sync>>,
    extension_writer: Arc<dyn ExtensionWriter + Send + Sync>,
    tracer: Box<dyn Tracer + Send>,

    trie: Box<dyn Trie>,
    pre_state_root: H256,

    live: HashMap<Address, StateObject>,
    storage_tries: HashMap<Address, Box<dyn Trie + Send>>,
    mutation_index: HashMap<Address, Mutation>,
    destruct_set: HashMap<Address, Option<Account>>,
    accounts: HashMap<AddressHash, Bytes>,
    storages: HashMap<AddressHash, BTreeMap<H256, Bytes>>,
    accounts_origin: BTreeMap<Address, Option<Bytes>>,
    storages_origin: BTreeMap<Address, BTreeMap<H256, Bytes>>,

    journal: Journal,
    revisions: Revisions<()>,
    logs: crate::log::Logs,
    preimages: crate::log::Preimages,
    access_list: AccessList,
    transient_storage: TransientStorage,
    refund: u64,

    tx_hash: H256,
    tx_index: usize,

    memoised_error: Option<ExternalError>,
    chain_policy_blocker: Option<String>,

    prefetcher: Option<Prefetcher>,
    committed: bool,
}

impl StateDb {
    pub fn new(
        config: StateConfig,
        database: Arc<dyn TrieDatabase + Send + Sync>,
        kv_database: Arc<dyn Database + Send + Sync>,
        snapshot_tree: Option<Arc<dyn SnapshotTree + Send + Sync>>,
        root: H256,
    ) -> Result<Self> {
        let trie = database.open_trie(&root).map_err(Error::from)?;
        Ok(StateDb {
            config,
            database,
            kv_database,
            snapshot_tree,
            extension_writer: Arc::new(crate::external::NoopExtensionWriter),
            tracer: Box::new(crate::external::NoopTracer),
            trie,
            pre_state_root: root,
            live: HashMap::new(),
            storage_tries: HashMap::new(),
            mutation_index: HashMap::new(),
            destruct_set: HashMap::new(),
            accounts: HashMap::new(),
            storages: HashMap::new(),
            accounts_origin: BTreeMap::new(),
            storages_origin: BTreeMap::new(),
            journal: Journal::new(),
            revisions: Revisions::new(),
            logs: crate::log::Logs::new(),
            preimages: crate::log::Preimages::new(),
            access_list: AccessList::new(),
            transient_storage: TransientStorage::new(),
            refund: 0,
            tx_hash: H256::zero(),
            tx_index: 0,
            memoised_error: None,
            chain_policy_blocker: None,
            prefetcher: None,
            committed: false,
        })
    }

    fn assert_live(&self) {
        assert!(!self.committed, "operation on a committed StateDb");
    }

    fn memoise_error(&mut self, err: ExternalError) {
        if self.memoised_error.is_none() {
            cerror!(STATE_DB, "memoising first read error: {:?}", err);
            self.memoised_error = Some(err);
        }
    }

    // ---- 4.3 three-tier read path -------------------------------------

    fn ensure_loaded(&mut self, address: &Address) -> bool {
        if self.live.contains_key(address) {
            return true
        }
        if self.destruct_set.contains_key(address) {
            return false
        }
        let address_hash = hash_address(address);
        if let Some(snapshot_tree) = &self.snapshot_tree {
            if let Some(snapshot) = snapshot_tree.snapshot(&self.pre_state_root) {
                match snapshot.account(&address_hash) {
                    Ok(Some(bytes)) => match ::rlp::decode::<Account>(&bytes) {
                        Ok(account) => {
                            cdebug!(STATE_DB, "populated {:?} from snapshot layer", address);
                            self.live.insert(*address, StateObject::from_account(*address, address_hash, account));
                            return true
                        }
                        Err(err) => {
                            cwarn!(SNAPSHOT, "slim account decode failed for {:?}: {:?}", address, err);
                        }
                    },
                    Ok(None) => {}
                    Err(err) => {
                        cwarn!(SNAPSHOT, "snapshot read failed for {:?}: {:?}, falling back to trie", address, err);
                    }
                }
            }
        }
        match self.trie.get_account(&address_hash) {
            Ok(Some(account)) => {
                cdebug!(STATE_DB, "populated {:?} from trie", address);
                self.live.insert(*address, StateObject::from_account(*address, address_hash, account));
                true
            }
            Ok(None) => false,
            Err(err) => {
                self.memoise_error(err);
                false
            }
        }
    }

    fn require_object(&mut self, address: &Address) -> &mut StateObject {
        if !self.ensure_loaded(address) {
            self.live.insert(*address, StateObject::new(*address, hash_address(address)));
            self.journal.append(JournalEntry::CreateObject {
                address: *address,
            });
        }
        self.live.get_mut(address).expect("just ensured present")
    }

    // ---- caller-facing surface (section 6) -----------------------------

    pub fn exist(&mut self, address: &Address) -> bool {
        self.assert_live();
        self.ensure_loaded(address)
    }

    pub fn empty(&mut self, address: &Address) -> bool {
        self.assert_live();
        if !self.ensure_loaded(address) {
            return true
        }
        self.live[address].is_empty()
    }

    pub fn balance(&mut self, address: &Address) -> U256 {
        self.assert_live();
        if self.ensure_loaded(address) {
            self.live[address].balance()
        } else {
            U256::zero()
        }
    }

    pub fn nonce(&mut self, address: &Address) -> u64 {
        self.assert_live();
        if self.ensure_loaded(address) {
            self.live[address].nonce()
        } else {
            0
        }
    }

    pub fn code(&mut self, address: &Address) -> Option<Bytes> {
        self.assert_live();
        if self.ensure_loaded(address) {
            self.live[address].code().cloned()
        } else {
            None
        }
    }

    pub fn code_size(&mut self, address: &Address) -> usize {
        self.code(address).map(|code| code.len()).unwrap_or(0)
    }

    pub fn code_hash(&mut self, address: &Address) -> H256 {
        self.assert_live();
        if self.ensure_loaded(address) {
            self.live[address].code_hash()
        } else {
            crate::account::empty_code_hash()
        }
    }

    pub fn storage_root(&mut self, address: &Address) -> Option<H256> {
        self.assert_live();
        if self.ensure_loaded(address) {
            Some(self.live[address].storage_root())
        } else {
            None
        }
    }

    pub fn has_self_destructed(&self, address: &Address) -> bool {
        self.live.get(address).map(|object| object.self_destructed).unwrap_or(false)
    }

    pub fn get_state(&mut self, address: &Address, slot: &Slot) -> SlotValue {
        self.assert_live();
        if !self.ensure_loaded(address) {
            return SlotValue::zero()
        }
        let result = {
            let trie = &*self.trie;
            self.live[address].storage_at(trie, slot)
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                self.memoise_error(err);
                SlotValue::zero()
            }
        }
    }

    pub fn get_committed_state(&mut self, address: &Address, slot: &Slot) -> SlotValue {
        self.assert_live();
        if !self.ensure_loaded(address) {
            return SlotValue::zero()
        }
        let result = {
            let trie = &*self.trie;
            self.live[address].committed_storage_at(trie, slot)
        };
        match result {
            Ok(value) => value,
            Err(err) => {
                self.memoise_error(err);
                SlotValue::zero()
            }
        }
    }

    pub fn add_balance(&mut self, address: &Address, amount: &U256) {
        self.assert_live();
        ctrace!(STATE_DB, "add_balance({:?}, {})", address, amount);
        let prior = self.require_object(address).balance();
        self.journal.append(JournalEntry::BalanceChange {
            address: *address,
            prior_balance: prior,
        });
        self.require_object(address).add_balance(amount);
        let new_balance = self.live[address].balance();
        self.tracer.on_balance_change(*address, prior, new_balance, "add_balance");
    }

    pub fn sub_balance(&mut self, address: &Address, amount: &U256) {
        self.assert_live();
        ctrace!(STATE_DB, "sub_balance({:?}, {})", address, amount);
        let prior = self.require_object(address).balance();
        self.journal.append(JournalEntry::BalanceChange {
            address: *address,
            prior_balance: prior,
        });
        self.require_object(address).sub_balance(amount);
        let new_balance = self.live[address].balance();
        self.tracer.on_balance_change(*address, prior, new_balance, "sub_balance");
    }

    pub fn set_balance(&mut self, address: &Address, amount: U256) {
        self.assert_live();
        let prior = self.require_object(address).balance();
        self.journal.append(JournalEntry::BalanceChange {
            address: *address,
            prior_balance: prior,
        });
        let object = self.require_object(address);
        if amount >= prior {
            object.add_balance(&(amount - prior));
        } else {
            object.sub_balance(&(prior - amount));
        }
        self.tracer.on_balance_change(*address, prior, amount, "set_balance");
    }

    pub fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.assert_live();
        let prior = self.require_object(address).nonce();
        self.journal.append(JournalEntry::NonceChange {
            address: *address,
            prior_nonce: prior,
        });
        self.require_object(address).set_nonce(nonce);
    }

    pub fn set_code(&mut self, address: &Address, code: Bytes) {
        self.assert_live();
        let code_hash = {
            use sha3::{Digest, Keccak256};
            H256::from_slice(&Keccak256::digest(&code))
        };
        let object = self.require_object(address);
        let prior_hash = object.code_hash();
        let prior_code = object.code().cloned();
        self.journal.append(JournalEntry::CodeChange {
            address: *address,
            prior_hash,
            prior_code,
        });
        cdebug!(STATE_DB, "set_code({:?}), {} bytes, hash {:?}", address, code.len(), code_hash);
        self.require_object(address).set_code(code, code_hash);
    }

    pub fn set_state(&mut self, address: &Address, slot: Slot, value: SlotValue) {
        self.assert_live();
        let prior = self.get_state(address, &slot);
        self.journal.append(JournalEntry::StorageChange {
            address: *address,
            slot,
            prior_value: prior,
        });
        self.require_object(address).set_storage(slot, value);
    }

    /// Replaces an account's entire storage by faking a destruct so old
    /// slots never hit disk again (section 4.4, section 10 decision:
    /// debug/test-only by convention, not mechanically enforced).
    pub fn set_storage(&mut self, address: &Address, new_slots: BTreeMap<Slot, SlotValue>) {
        self.assert_live();
        cwarn!(STATE_DB, "set_storage({:?}): debug-only bulk storage replacement", address);
        self.require_object(address).wipe_and_seed_storage(new_slots);
    }

    pub fn self_destruct(&mut self, address: &Address) {
        self.assert_live();
        let object = self.require_object(address);
        let prior_flag = object.self_destructed;
        let prior_balance = object.balance();
        self.journal.append(JournalEntry::SelfDestruct {
            address: *address,
            prior_flag,
            prior_balance,
        });
        self.require_object(address).self_destruct();
        // `StateObject::self_destruct` zeroes the live balance immediately
        // (EVM semantics: a second read in the same tx sees 0), so the burn
        // event has to be logged here, against the pre-zero balance, not in
        // `finalise` where it would always read back 0.
        if !prior_balance.is_zero() {
            cwarn!(STATE_DB, "burn event: {:?} self-destructed with balance {}", address, prior_balance);
        }
    }

    /// The EIP-6780 gated variant: only acts if the account was created in
    /// the current transaction (section 4.4).
    pub fn self_destruct_6780(&mut self, address: &Address) {
        self.assert_live();
        if self.live.get(address).map(|object| object.new_contract).unwrap_or(false) {
            self.self_destruct(address);
        }
    }

    pub fn create_account(&mut self, address: &Address) {
        self.assert_live();
        self.live.insert(*address, StateObject::new(*address, hash_address(address)));
        self.journal.append(JournalEntry::CreateObject {
            address: *address,
        });
    }

    pub fn create_contract(&mut self, address: &Address) {
        self.assert_live();
        self.require_object(address).mark_new_contract();
        self.journal.append(JournalEntry::CreateContract {
            address: *address,
        });
    }

    pub fn add_log(&mut self, log: crate::log::Log) {
        self.assert_live();
        self.tracer.on_log(self.tx_hash, &log);
        self.logs.add(self.tx_hash, log);
        self.journal.append(JournalEntry::AddLog {
            tx_hash: self.tx_hash,
        });
    }

    pub fn get_logs(&self, tx_hash: &H256) -> &[crate::log::Log] {
        self.logs.get(tx_hash)
    }

    pub fn logs(&self) -> &crate::log::Logs {
        &self.logs
    }

    pub fn add_preimage(&mut self, hash: H256, preimage: Bytes) {
        self.assert_live();
        self.preimages.add(hash, preimage);
        self.journal.append(JournalEntry::AddPreimage {
            hash,
        });
    }

    pub fn preimages(&self) -> &crate::log::Preimages {
        &self.preimages
    }

    pub fn add_refund(&mut self, amount: u64) {
        self.assert_live();
        self.journal.append(JournalEntry::RefundChange {
            prior_refund: self.refund,
        });
        self.refund += amount;
    }

    /// Panics on underflow (section 7, category 3): a caller subtracting
    /// more refund than was ever added is a bug.
    pub fn sub_refund(&mut self, amount: u64) {
        self.assert_live();
        assert!(self.refund >= amount, "refund underflow");
        self.journal.append(JournalEntry::RefundChange {
            prior_refund: self.refund,
        });
        self.refund -= amount;
    }

    pub fn get_refund(&self) -> u64 {
        self.refund
    }

    pub fn snapshot(&mut self) -> u64 {
        self.assert_live();
        self.revisions.snapshot(self.journal.length(), ())
    }

    pub fn revert_to_snapshot(&mut self, id: u64) {
        self.assert_live();
        let revision = self.revisions.revert_to(id);
        let target_length = revision.journal_length;
        let mut journal = std::mem::replace(&mut self.journal, Journal::new());
        journal.revert(self, target_length);
        self.journal = journal;
    }

    /// Resets per-transaction state (access list, transient storage,
    /// refund) ahead of executing a new transaction.
    pub fn prepare(&mut self) {
        self.assert_live();
        self.access_list.clear();
        self.transient_storage.clear();
        self.refund = 0;
    }

    pub fn set_tx_context(&mut self, tx_hash: H256, tx_index: usize) {
        self.tx_hash = tx_hash;
        self.tx_index = tx_index;
    }

    pub fn tx_index(&self) -> usize {
        self.tx_index
    }

    pub fn add_address_to_access_list(&mut self, address: Address) {
        self.assert_live();
        if self.access_list.add_address(address) {
            self.journal.append(JournalEntry::AccessListAddAccount {
                address,
            });
        }
    }

    pub fn add_slot_to_access_list(&mut self, address: Address, slot: Slot) {
        self.assert_live();
        let (address_cold, slot_cold) = self.access_list.add_slot(address, slot);
        if address_cold {
            self.journal.append(JournalEntry::AccessListAddAccount {
                address,
            });
        }
        if slot_cold {
            self.journal.append(JournalEntry::AccessListAddSlot {
                address,
                slot,
            });
        }
    }

    pub fn address_in_access_list(&self, address: &Address) -> bool {
        self.access_list.contains_address(address)
    }

    pub fn slot_in_access_list(&self, address: &Address, slot: &Slot) -> bool {
        self.access_list.contains_slot(address, slot)
    }

    pub fn set_transient_state(&mut self, address: Address, slot: Slot, value: SlotValue) {
        self.assert_live();
        let prior = self.transient_storage.set(address, slot, value);
        self.journal.append(JournalEntry::TransientStorageChange {
            address,
            slot,
            prior_value: prior,
        });
    }

    pub fn get_transient_state(&self, address: &Address, slot: &Slot) -> SlotValue {
        self.transient_storage.get(address, slot)
    }

    pub fn error(&self) -> Option<&ExternalError> {
        self.memoised_error.as_ref()
    }

    pub fn database(&self) -> &Arc<dyn TrieDatabase + Send + Sync> {
        &self.database
    }

    pub fn get_trie(&self) -> &dyn Trie {
        &*self.trie
    }

    pub fn set_chain_policy_blocker(&mut self, reason: impl Into<String>) {
        self.chain_policy_blocker = Some(reason.into());
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer + Send>) {
        self.tracer = tracer;
    }

    pub fn start_prefetcher(&mut self, namespace: impl Into<String>) {
        self.assert_live();
        self.prefetcher = Some(Prefetcher::start(
            namespace.into(),
            self.pre_state_root,
            Arc::clone(&self.database),
            self.config.prefetch_workers,
        ));
    }

    pub fn stop_prefetcher(&mut self) {
        if let Some(prefetcher) = self.prefetcher.take() {
            prefetcher.stop();
        }
    }

    // ---- 4.6 Finalise ----------------------------------------------------

    pub fn finalise(&mut self, delete_empty_objects: bool) {
        self.assert_live();
        let dirty_addresses: Vec<Address> = self.journal.dirty_addresses().copied().collect();
        let mut touched_batch = Vec::with_capacity(dirty_addresses.len());

        for address in dirty_addresses {
            if self.journal.dirty_count(&address) == 0 {
                continue
            }
            if !self.live.contains_key(&address) {
                // Touched-but-never-loaded quirk (section 4.6, section 9
                // open question 2): preserved verbatim as a no-op skip.
                continue
            }

            let self_destructed = self.live[&address].self_destructed;
            let should_delete = self_destructed || (delete_empty_objects && self.live[&address].is_empty());

            if should_delete {
                // Burn events are logged in `self_destruct` itself, against
                // the pre-zero balance; by the time an object lands here its
                // live balance has already been zeroed (see `self_destruct`).
                let object = self.live.remove(&address).expect("checked present above");
                let origin = object.destruct_origin().cloned().unwrap_or_else(|| object.account().clone());
                self.destruct_set.entry(address).or_insert_with(|| Some(origin));
                let address_hash = object.address_hash;
                self.storage_tries.remove(&address);
                self.accounts.remove(&address_hash);
                self.storages.remove(&address_hash);
                self.mutation_index.insert(address, Mutation {
                    kind: MutationKind::Deletion,
                    applied: false,
                });
            } else {
                self.mutation_index.insert(address, Mutation {
                    kind: MutationKind::Update,
                    applied: false,
                });
            }
            touched_batch.push(address);
        }

        if let Some(prefetcher) = &self.prefetcher {
            prefetcher.warm(touched_batch);
        }

        self.journal.clear();
        self.refund = 0;
    }

    // ---- 4.7 IntermediateRoot --------------------------------------------

    pub fn intermediate_root(&mut self, delete_empty_objects: bool) -> H256 {
        self.assert_live();
        self.finalise(delete_empty_objects);
        self.stop_prefetcher();

        let mut update_addresses: Vec<Address> = self
            .mutation_index
            .iter()
            .filter(|(_, m)| m.kind == MutationKind::Update && !m.applied)
            .map(|(a, _)| *a)
            .collect();
        if self.config.deterministic {
            update_addresses.sort();
        }

        // Storage-first: open (or reuse) each touched account's storage
        // trie and flush its dirty slots before the account trie is
        // touched at all.
        for address in &update_addresses {
            if self.storage_tries.contains_key(address) {
                continue
            }
            let (address_hash, storage_root) = match self.live.get(address) {
                Some(object) => (object.address_hash, object.storage_root()),
                None => continue,
            };
            match self.database.open_storage_trie(&self.pre_state_root, &address_hash, &storage_root) {
                Ok(trie) => {
                    self.storage_tries.insert(*address, trie);
                }
                Err(err) => self.memoise_error(err),
            }
        }
        for address in &update_addresses {
            let dirty_slots: Vec<(Slot, SlotValue)> = match self.live.get(address) {
                Some(object) => object.dirty_storage().map(|(s, v)| (*s, *v)).collect(),
                None => continue,
            };
            let flush_result = match (self.storage_tries.get_mut(address), self.live.get_mut(address)) {
                (Some(trie), Some(object)) => object.finalise(trie.as_mut(), false),
                _ => continue,
            };
            match flush_result {
                Ok(_) => {
                    let address_hash = self.live[address].address_hash;
                    let slot_map = self.storages.entry(address_hash).or_insert_with(BTreeMap::new);
                    for (slot, value) in dirty_slots {
                        let slot_hash = hash_slot(&slot);
                        if value == SlotValue::zero() {
                            slot_map.remove(&slot_hash);
                        } else {
                            slot_map.insert(slot_hash, value.as_bytes().to_vec());
                        }
                    }
                }
                Err(err) => self.memoise_error(err),
            }
        }

        // Account-trie writes: updates before deletions (section 4.7 step 5).
        for address in &update_addresses {
            if let Some(object) = self.live.get(address) {
                let account = object.account().clone();
                if let Err(err) = self.trie.update_account(&object.address_hash, &account) {
                    self.memoise_error(err);
                    continue
                }
                self.accounts.insert(object.address_hash, ::rlp::encode(&account).to_vec());
            }
        }
        let deletions: Vec<Address> = self
            .mutation_index
            .iter()
            .filter(|(_, m)| m.kind == MutationKind::Deletion && !m.applied)
            .map(|(a, _)| *a)
            .collect();
        for address in &deletions {
            let address_hash = hash_address(address);
            if let Err(err) = self.trie.delete_account(&address_hash) {
                self.memoise_error(err);
            }
        }

        for address in update_addresses.iter().chain(deletions.iter()) {
            if let Some(mutation) = self.mutation_index.get_mut(address) {
                mutation.applied = true;
            }
        }

        self.trie.hash()
    }

    // ---- 4.9 destructions -------------------------------------------------

    fn handle_destructions(&mut self) -> Result<DirtyNodeSet> {
        let mut merged = DirtyNodeSet::new();
        let destructed: Vec<Address> = self.destruct_set.keys().copied().collect();
        for address in destructed {
            let prior = self.destruct_set.get(&address).cloned().flatten();
            let address_hash = hash_address(&address);
            match prior {
                None => {
                    if self.accounts.contains_key(&address_hash) {
                        self.accounts_origin.insert(address, None);
                    }
                }
                Some(prior_account) => {
                    self.accounts_origin.insert(address, Some(::rlp::encode(&prior_account).to_vec()));
                    if prior_account.storage_root != crate::account::empty_storage_root() {
                        let storage_trie =
                            self.database.open_storage_trie(&self.pre_state_root, &address_hash, &prior_account.storage_root)?;
                        let deleted = crate::delete_storage::delete_storage(
                            self.snapshot_tree.as_ref().map(|tree| tree.as_ref() as &dyn SnapshotTree),
                            self.database.is_hash_scheme(),
                            &self.pre_state_root,
                            &address_hash,
                            &prior_account.storage_root,
                            storage_trie.as_ref(),
                        )?;
                        merged.merge(deleted.dirty_nodes);
                        let entry = self.storages_origin.entry(address).or_insert_with(BTreeMap::new);
                        for (slot_hash, value) in deleted.slot_pre_state {
                            entry.entry(slot_hash).or_insert_with(|| value.as_bytes().to_vec());
                        }
                    }
                }
            }
        }
        Ok(merged)
    }

    // ---- 4.8 Commit ---------------------------------------------------------

    pub fn commit(&mut self, block_number: u64, delete_empty_objects: bool) -> Result<H256> {
        self.assert_live();
        if let Some(reason) = self.chain_policy_blocker.clone() {
            cerror!(COMMIT, "commit refused by chain policy: {}", reason);
            return Err(Error::ChainPolicyBlocked(reason))
        }
        if let Some(err) = self.memoised_error.clone() {
            cerror!(COMMIT, "commit aborted by memoised read error: {:?}", err);
            return Err(Error::from(err))
        }

        let new_root = self.intermediate_root(delete_empty_objects);
        if let Some(err) = self.memoised_error.clone() {
            cerror!(COMMIT, "commit aborted by read error during intermediate_root: {:?}", err);
            return Err(Error::from(err))
        }

        let mut merged = self.handle_destructions()?;

        let (account_root, account_dirty) = self.trie.commit().map_err(Error::Commit)?;
        debug_assert_eq!(account_root, new_root, "account trie root drifted between intermediate_root and commit");
        merged.merge(account_dirty);

        let pending_storage_tries: Vec<(Address, Box<dyn Trie + Send>)> = self.storage_tries.drain().collect();
        let commit_workers = self.config.commit_workers.max(1);
        let chunks = chunk_pairs(pending_storage_tries, commit_workers);

        let accumulator: Mutex<DirtyNodeSet> = Mutex::new(DirtyNodeSet::new());
        let first_error: Mutex<Option<ExternalError>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for chunk in chunks {
                let accumulator = &accumulator;
                let first_error = &first_error;
                scope.spawn(move || {
                    for (_address, mut trie) in chunk {
                        match trie.commit() {
                            Ok((_, dirty)) => accumulator.lock().merge(dirty),
                            Err(err) => {
                                let mut guard = first_error.lock();
                                if guard.is_none() {
                                    *guard = Some(err);
                                }
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = first_error.into_inner() {
            cerror!(COMMIT, "storage-trie commit worker failed, aborting commit: {:?}", err);
            return Err(Error::Commit(err))
        }
        merged.merge(accumulator.into_inner());

        let mut code_batch = self.kv_database.new_batch();
        for object in self.live.values() {
            if object.has_dirty_code() {
                if let Some(code) = object.code() {
                    code_batch.put(object.code_hash().as_bytes(), code);
                }
            }
        }
        code_batch.write().map_err(Error::Commit)?;

        let mut extension_batch = self.kv_database.new_batch();
        self.extension_writer.write(&mut *extension_batch).map_err(Error::Commit)?;
        extension_batch.write().map_err(Error::Commit)?;

        if let Some(snapshot_tree) = &self.snapshot_tree {
            if new_root != self.pre_state_root {
                let destructed: std::collections::BTreeSet<AddressHash> =
                    self.destruct_set.keys().map(hash_address).collect();
                match snapshot_tree.update(
                    &new_root,
                    &self.pre_state_root,
                    destructed,
                    self.accounts.clone().into_iter().collect(),
                    self.storages.clone().into_iter().collect(),
                ) {
                    Ok(()) => snapshot_tree.cap(&new_root, self.config.diff_layer_cap),
                    Err(err) => cwarn!(SNAPSHOT, "snapshot-tree update failed: {:?} (trie db is authoritative)", err),
                }
            }
        }

        let reverse_diff = ReverseDiff {
            accounts_origin: std::mem::take(&mut self.accounts_origin),
            storages_origin: std::mem::take(&mut self.storages_origin),
        };
        self.database.update(&new_root, &self.pre_state_root, block_number, merged, reverse_diff).map_err(Error::from)?;

        cinfo!(COMMIT, "committed block {} -> root {:?}", block_number, new_root);

        self.live.clear();
        self.mutation_index.clear();
        self.destruct_set.clear();
        self.accounts.clear();
        self.storages.clear();
        self.committed = true;

        Ok(new_root)
    }

    pub fn copy(&self) -> StateDb {
        StateDb {
            config: self.config.clone(),
            database: Arc::clone(&self.database),
            kv_database: Arc::clone(&self.kv_database),
            snapshot_tree: self.snapshot_tree.clone(),
            extension_writer: Arc::clone(&self.extension_writer),
            tracer: Box::new(crate::external::NoopTracer),
            trie: self.database.copy_trie(self.trie.as_ref()),
            pre_state_root: self.pre_state_root,
            live: self.live.clone(),
            storage_tries: self.storage_tries.iter().map(|(a, t)| (*a, self.database.copy_trie(t.as_ref()))).collect(),
            mutation_index: self.mutation_index.clone(),
            destruct_set: self.destruct_set.clone(),
            accounts: self.accounts.clone(),
            storages: self.storages.clone(),
            accounts_origin: self.accounts_origin.clone(),
            storages_origin: self.storages_origin.clone(),
            journal: self.journal.copy(),
            revisions: self.revisions.copy(),
            logs: self.logs.copy(),
            preimages: self.preimages.clone(),
            access_list: self.access_list.copy(),
            transient_storage: self.transient_storage.copy(),
            refund: self.refund,
            tx_hash: self.tx_hash,
            tx_index: self.tx_index,
            memoised_error: self.memoised_error.clone(),
            chain_policy_blocker: self.chain_policy_blocker.clone(),
            prefetcher: Some(Prefetcher::inactive()),
            committed: self.committed,
        }
    }
}

fn chunk_pairs<T>(items: Vec<(Address, T)>, workers: usize) -> Vec<Vec<(Address, T)>> {
    if items.is_empty() {
        return Vec::new()
    }
    let chunk_size = (items.len() + workers - 1) / workers.max(1);
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    for item in items {
        current.push(item);
        if current.len() >= chunk_size.max(1) {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl JournalUndo for StateDb {
    fn undo_create_object(&mut self, address: &Address) {
        self.live.remove(address);
    }
    fn undo_create_contract(&mut self, address: &Address) {
        if let Some(object) = self.live.get_mut(address) {
            object.new_contract = false;
        }
    }
    fn undo_self_destruct(&mut self, address: &Address, prior_flag: bool, prior_balance: &U256) {
        if let Some(object) = self.live.get_mut(address) {
            object.self_destructed = prior_flag;
            if !prior_flag {
                object.clear_destruct_origin();
            }
            let current = object.balance();
            if *prior_balance >= current {
                object.add_balance(&(*prior_balance - current));
            } else {
                object.sub_balance(&(current - *prior_balance));
            }
        }
    }
    fn undo_balance_change(&mut self, address: &Address, prior_balance: &U256) {
        if let Some(object) = self.live.get_mut(address) {
            let current = object.balance();
            if *prior_balance >= current {
                object.add_balance(&(*prior_balance - current));
            } else {
                object.sub_balance(&(current - *prior_balance));
            }
        }
    }
    fn undo_nonce_change(&mut self, address: &Address, prior_nonce: u64) {
        if let Some(object) = self.live.get_mut(address) {
            object.set_nonce(prior_nonce);
        }
    }
    fn undo_code_change(&mut self, address: &Address, prior_hash: &H256, prior_code: Option<&[u8]>) {
        if let Some(object) = self.live.get_mut(address) {
            object.restore_code(prior_code.map(|code| code.to_vec()), *prior_hash);
        }
    }
    fn undo_storage_change(&mut self, address: &Address, slot: &Slot, prior_value: &H256) {
        if let Some(object) = self.live.get_mut(address) {
            object.set_storage(*slot, *prior_value);
        }
    }
    fn undo_transient_storage_change(&mut self, address: &Address, slot: &Slot, prior_value: &H256) {
        self.transient_storage.set(*address, *slot, *prior_value);
    }
    fn undo_refund_change(&mut self, prior_refund: u64) {
        self.refund = prior_refund;
    }
    fn undo_add_log(&mut self, tx_hash: &H256) {
        self.logs.pop(tx_hash);
    }
    fn undo_add_preimage(&mut self, hash: &H256) {
        self.preimages.remove(hash);
    }
    fn undo_access_list_add_account(&mut self, address: &Address) {
        self.access_list.remove_address(address);
    }
    fn undo_access_list_add_slot(&mut self, address: &Address, slot: &Slot) {
        self.access_list.remove_slot(address, slot);
    }
}
