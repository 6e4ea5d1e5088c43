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

//! Per-transaction ephemeral (address, slot) storage (EIP-1153, section 3
//! "transient storage"). Reset at each transaction boundary, never
//! persisted to the trie.

use std::collections::HashMap;

use address::{Address, Slot, SlotValue};

#[derive(Debug, Default, Clone)]
pub struct TransientStorage {
    values: HashMap<(Address, Slot), SlotValue>,
}

impl TransientStorage {
    pub fn new() -> Self {
        TransientStorage::default()
    }

    pub fn get(&self, address: &Address, slot: &Slot) -> SlotValue {
        self.values.get(&(*address, *slot)).copied().unwrap_or_else(SlotValue::zero)
    }

    /// Returns the prior value, for the caller to journal.
    pub fn set(&mut self, address: Address, slot: Slot, value: SlotValue) -> SlotValue {
        let prior = self.get(&address, &slot);
        if value == SlotValue::zero() {
            self.values.remove(&(address, slot));
        } else {
            self.values.insert((address, slot), value);
        }
        prior
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn copy(&self) -> TransientStorage {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_slot_reads_zero() {
        let storage = TransientStorage::new();
        let a = Address::from_low_u64_be(1);
        let s = Slot::from_low_u64_be(2);
        assert_eq!(storage.get(&a, &s), SlotValue::zero());
    }

    #[test]
    fn set_then_get_round_trips_and_reports_prior() {
        let mut storage = TransientStorage::new();
        let a = Address::from_low_u64_be(1);
        let s = Slot::from_low_u64_be(2);
        let prior = storage.set(a, s, SlotValue::from_low_u64_be(42));
        assert_eq!(prior, SlotValue::zero());
        assert_eq!(storage.get(&a, &s), SlotValue::from_low_u64_be(42));
    }

    #[test]
    fn clear_resets_between_transactions() {
        let mut storage = TransientStorage::new();
        let a = Address::from_low_u64_be(1);
        let s = Slot::from_low_u64_be(2);
        storage.set(a, s, SlotValue::from_low_u64_be(42));
        storage.clear();
        assert_eq!(storage.get(&a, &s), SlotValue::zero());
    }
}
