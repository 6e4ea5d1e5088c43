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

//! Per-transaction warm-address/warm-slot accounting (EIP-2929/2930,
//! section 3 "access list"). Reset at each transaction boundary.

use std::collections::{HashMap, HashSet};

use address::{Address, Slot};

#[derive(Debug, Default, Clone)]
pub struct AccessList {
    addresses: HashSet<Address>,
    slots: HashMap<Address, HashSet<Slot>>,
}

impl AccessList {
    pub fn new() -> Self {
        AccessList::default()
    }

    /// Returns `true` if the address was newly added (i.e. it was cold).
    pub fn add_address(&mut self, address: Address) -> bool {
        self.addresses.insert(address)
    }

    /// Returns `(address_was_cold, slot_was_cold)`.
    pub fn add_slot(&mut self, address: Address, slot: Slot) -> (bool, bool) {
        let address_was_cold = self.addresses.insert(address);
        let slot_was_cold = self.slots.entry(address).or_insert_with(HashSet::new).insert(slot);
        (address_was_cold, slot_was_cold)
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn contains_slot(&self, address: &Address, slot: &Slot) -> bool {
        self.slots.get(address).map(|set| set.contains(slot)).unwrap_or(false)
    }

    /// Undoes `add_address`: removes the address iff it is not also
    /// referenced by a still-present slot entry.
    pub fn remove_address(&mut self, address: &Address) {
        if !self.slots.contains_key(address) {
            self.addresses.remove(address);
        }
    }

    pub fn remove_slot(&mut self, address: &Address, slot: &Slot) {
        if let Some(set) = self.slots.get_mut(address) {
            set.remove(slot);
            if set.is_empty() {
                self.slots.remove(address);
            }
        }
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
        self.slots.clear();
    }

    pub fn copy(&self) -> AccessList {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_add_is_cold_second_is_warm() {
        let mut list = AccessList::new();
        let a = Address::from_low_u64_be(1);
        assert!(list.add_address(a));
        assert!(!list.add_address(a));
        assert!(list.contains_address(&a));
    }

    #[test]
    fn adding_a_slot_also_warms_its_address() {
        let mut list = AccessList::new();
        let a = Address::from_low_u64_be(1);
        let slot = Slot::from_low_u64_be(9);
        let (address_cold, slot_cold) = list.add_slot(a, slot);
        assert!(address_cold);
        assert!(slot_cold);
        assert!(list.contains_address(&a));
        assert!(list.contains_slot(&a, &slot));
    }

    #[test]
    fn clear_resets_both_sets() {
        let mut list = AccessList::new();
        let a = Address::from_low_u64_be(1);
        list.add_address(a);
        list.clear();
        assert!(!list.contains_address(&a));
    }
}
