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

//! Per-account working copy (section 2 "State object"). Tracks its own
//! dirty-storage map against a storage-trie handle so `StateDb` never has
//! to reach into a slot's history directly; mirrors the clean/dirty/
//! committed lifecycle the teacher's `Cache<Item>` entries go through, one
//! level down (per-slot rather than per-account).

use std::collections::BTreeMap;

use account::Account;
use address::{Address, AddressHash, Slot, SlotValue};
use error::ExternalError;
use external::Trie;
use primitives::{Bytes, H256, U256};

use clogger::log_target;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SlotState {
    Clean,
    Dirty,
}

/// A per-account working copy: the cached record plus dirty storage not
/// yet flushed to a storage trie.
pub struct StateObject {
    pub address: Address,
    pub address_hash: AddressHash,
    account: Account,
    storage_cache: BTreeMap<Slot, (SlotValue, SlotState)>,
    code: Option<Bytes>,
    dirty_code: bool,
    pub self_destructed: bool,
    pub new_contract: bool,
    /// Set by `wipe_and_seed_storage` (section 4.4's `SetStorage`): once
    /// true, an uncached slot reads as zero rather than falling through to
    /// the (stale) on-disk trie, so old slots never come back to life.
    storage_wiped: bool,
    /// The account record as it stood immediately before `self_destruct`
    /// zeroed its balance, captured once so the destruct set (and the
    /// reverse-diff built from it) records the pre-destruct value rather
    /// than the zeroed one.
    destruct_origin: Option<Account>,
}

impl Clone for StateObject {
    fn clone(&self) -> Self {
        StateObject {
            address: self.address,
            address_hash: self.address_hash,
            account: self.account.clone(),
            storage_cache: self.storage_cache.clone(),
            code: self.code.clone(),
            dirty_code: self.dirty_code,
            self_destructed: self.self_destructed,
            new_contract: self.new_contract,
            storage_wiped: self.storage_wiped,
            destruct_origin: self.destruct_origin.clone(),
        }
    }
}

impl StateObject {
    pub fn new(address: Address, address_hash: AddressHash) -> Self {
        StateObject {
            address,
            address_hash,
            account: Account::new(0, U256::zero()),
            storage_cache: BTreeMap::new(),
            code: None,
            dirty_code: false,
            self_destructed: false,
            new_contract: false,
            storage_wiped: false,
            destruct_origin: None,
        }
    }

    pub fn from_account(address: Address, address_hash: AddressHash, account: Account) -> Self {
        StateObject {
            address,
            address_hash,
            account,
            storage_cache: BTreeMap::new(),
            code: None,
            dirty_code: false,
            self_destructed: false,
            new_contract: false,
            storage_wiped: false,
            destruct_origin: None,
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn balance(&self) -> U256 {
        self.account.balance
    }

    pub fn nonce(&self) -> u64 {
        self.account.nonce
    }

    pub fn code_hash(&self) -> H256 {
        self.account.code_hash
    }

    pub fn storage_root(&self) -> H256 {
        self.account.storage_root
    }

    pub fn is_empty(&self) -> bool {
        self.account.is_empty()
    }

    pub fn add_balance(&mut self, amount: &U256) {
        self.account.add_balance(amount);
    }

    pub fn sub_balance(&mut self, amount: &U256) {
        self.account.sub_balance(amount);
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.account.set_nonce(nonce);
    }

    pub fn code(&self) -> Option<&Bytes> {
        self.code.as_ref()
    }

    pub fn set_code(&mut self, code: Bytes, code_hash: H256) {
        self.account.code_hash = code_hash;
        self.code = Some(code);
        self.dirty_code = true;
    }

    pub fn has_dirty_code(&self) -> bool {
        self.dirty_code
    }

    /// Restores a prior (code, code_hash) pair from the journal, distinct
    /// from `set_code`: the code was already persisted (or never existed),
    /// so it is not marked dirty again.
    pub fn restore_code(&mut self, code: Option<Bytes>, code_hash: H256) {
        self.account.code_hash = code_hash;
        self.code = code;
        self.dirty_code = false;
    }

    /// Reads a slot, checking the dirty cache first (section 4.3's
    /// three-tier path applies to accounts; slots are simpler since this
    /// object owns its own storage trie handle exclusively).
    pub fn storage_at(&self, trie: &dyn Trie, slot: &Slot) -> Result<SlotValue, ExternalError> {
        if let Some((value, _)) = self.storage_cache.get(slot) {
            return Ok(*value)
        }
        if self.storage_wiped {
            return Ok(SlotValue::zero())
        }
        let key = crate::address::hash_slot(slot);
        Ok(trie.get_storage(&key)?.unwrap_or_else(SlotValue::zero))
    }

    pub fn committed_storage_at(&self, trie: &dyn Trie, slot: &Slot) -> Result<SlotValue, ExternalError> {
        let key = crate::address::hash_slot(slot);
        Ok(trie.get_storage(&key)?.unwrap_or_else(SlotValue::zero))
    }

    pub fn set_storage(&mut self, slot: Slot, value: SlotValue) {
        self.storage_cache.insert(slot, (value, SlotState::Dirty));
    }

    /// `set_storage` bulk variant used by `set-storage` (section 4.4):
    /// marks every existing cached slot clean-gone and seeds the given new
    /// slots, so lookups of old slots never hit disk again.
    pub fn wipe_and_seed_storage(&mut self, new_slots: BTreeMap<Slot, SlotValue>) {
        self.storage_cache.clear();
        self.storage_wiped = true;
        for (slot, value) in new_slots {
            self.storage_cache.insert(slot, (value, SlotState::Dirty));
        }
    }

    pub fn dirty_storage(&self) -> impl Iterator<Item = (&Slot, &SlotValue)> {
        self.storage_cache.iter().filter(|(_, (_, state))| *state == SlotState::Dirty).map(|(k, (v, _))| (k, v))
    }

    /// Flushes dirty slots into the storage trie and optionally kicks
    /// background prefetch of slots likely read next (section 4.5/4.6).
    /// Returns the new storage root.
    pub fn finalise(&mut self, trie: &mut dyn Trie, prefetch: bool) -> Result<H256, ExternalError> {
        for (slot, (value, state)) in self.storage_cache.iter_mut() {
            if *state != SlotState::Dirty {
                continue
            }
            let key = crate::address::hash_slot(slot);
            if *value == SlotValue::zero() {
                trie.delete_storage(&key)?;
            } else {
                trie.update_storage(&key, value)?;
            }
            *state = SlotState::Clean;
        }
        if prefetch {
            cdebug!(STATE, "object {:?} finalised, prefetch requested for likely-next slots", self.address);
        }
        let root = trie.hash();
        self.account.storage_root = root;
        Ok(root)
    }

    pub fn self_destruct(&mut self) {
        if self.destruct_origin.is_none() {
            self.destruct_origin = Some(self.account.clone());
        }
        self.self_destructed = true;
        self.account.balance = U256::zero();
    }

    /// The account as it stood just before `self_destruct` zeroed it, if
    /// this object has ever been destructed; falls back to the current
    /// account for an object that never went through `self_destruct`.
    pub fn destruct_origin(&self) -> Option<&Account> {
        self.destruct_origin.as_ref()
    }

    /// Undoes the bookkeeping side of `self_destruct` when a journal entry
    /// is reverted back to a not-destructed state.
    pub fn clear_destruct_origin(&mut self) {
        self.destruct_origin = None;
    }

    pub fn mark_new_contract(&mut self) {
        self.new_contract = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeTrie {
        slots: HashMap<H256, SlotValue>,
    }

    impl Trie for FakeTrie {
        fn get_account(&self, _address: &AddressHash) -> Result<Option<Account>, ExternalError> {
            Ok(None)
        }
        fn update_account(&mut self, _address: &AddressHash, _account: &Account) -> Result<(), ExternalError> {
            Ok(())
        }
        fn delete_account(&mut self, _address: &AddressHash) -> Result<(), ExternalError> {
            Ok(())
        }
        fn get_storage(&self, key: &H256) -> Result<Option<SlotValue>, ExternalError> {
            Ok(self.slots.get(key).copied())
        }
        fn update_storage(&mut self, key: &H256, value: &SlotValue) -> Result<(), ExternalError> {
            self.slots.insert(*key, *value);
            Ok(())
        }
        fn delete_storage(&mut self, key: &H256) -> Result<(), ExternalError> {
            self.slots.remove(key);
            Ok(())
        }
        fn update_contract_code(&mut self, _code_hash: &H256, _code: &[u8]) -> Result<(), ExternalError> {
            Ok(())
        }
        fn hash(&self) -> H256 {
            H256::from_low_u64_be(self.slots.len() as u64)
        }
        fn commit(&mut self) -> Result<(H256, crate::external::DirtyNodeSet), ExternalError> {
            Ok((self.hash(), crate::external::DirtyNodeSet::new()))
        }
        fn node_iterator(&self) -> Box<dyn Iterator<Item = (H256, Bytes)> + '_> {
            Box::new(std::iter::empty())
        }
    }

    #[test]
    fn uncached_slot_reads_through_to_trie() {
        let object = StateObject::new(Address::zero(), AddressHash::zero());
        let trie = FakeTrie {
            slots: HashMap::new(),
        };
        let slot = Slot::from_low_u64_be(1);
        assert_eq!(object.storage_at(&trie, &slot).unwrap(), SlotValue::zero());
    }

    #[test]
    fn set_storage_shadows_trie_until_finalise() {
        let mut object = StateObject::new(Address::zero(), AddressHash::zero());
        let mut trie = FakeTrie {
            slots: HashMap::new(),
        };
        let slot = Slot::from_low_u64_be(1);
        object.set_storage(slot, SlotValue::from_low_u64_be(5));
        assert_eq!(object.storage_at(&trie, &slot).unwrap(), SlotValue::from_low_u64_be(5));
        object.finalise(&mut trie, false).unwrap();
        assert_eq!(trie.get_storage(&crate::address::hash_slot(&slot)).unwrap(), Some(SlotValue::from_low_u64_be(5)));
    }

    #[test]
    fn wipe_and_seed_hides_on_disk_old_slots() {
        let mut trie = FakeTrie {
            slots: HashMap::new(),
        };
        let old_slot = Slot::from_low_u64_be(1);
        let key = crate::address::hash_slot(&old_slot);
        trie.update_storage(&key, &SlotValue::from_low_u64_be(9)).unwrap();

        let mut object = StateObject::new(Address::zero(), AddressHash::zero());
        let mut seed = BTreeMap::new();
        seed.insert(Slot::from_low_u64_be(2), SlotValue::from_low_u64_be(2));
        object.wipe_and_seed_storage(seed);

        assert_eq!(object.storage_at(&trie, &old_slot).unwrap(), SlotValue::zero());
    }

    #[test]
    fn wipe_and_seed_drops_old_dirty_slots() {
        let mut object = StateObject::new(Address::zero(), AddressHash::zero());
        let old_slot = Slot::from_low_u64_be(1);
        object.set_storage(old_slot, SlotValue::from_low_u64_be(1));
        let mut seed = BTreeMap::new();
        seed.insert(Slot::from_low_u64_be(2), SlotValue::from_low_u64_be(2));
        object.wipe_and_seed_storage(seed);
        assert_eq!(object.dirty_storage().count(), 1);
    }
}
