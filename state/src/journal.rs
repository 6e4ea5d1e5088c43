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

//! The per-transaction undo log (section 4.1). Every reversible mutation
//! pushes its own entry before the mutation is applied; `revert` replays
//! entries in LIFO order until the journal is back to a target length.

use std::collections::HashMap;

use address::{Address, Slot};
use primitives::{H256, U256};

#[derive(Debug, Clone)]
pub enum JournalEntry {
    CreateObject {
        address: Address,
    },
    CreateContract {
        address: Address,
    },
    SelfDestruct {
        address: Address,
        prior_flag: bool,
        prior_balance: U256,
    },
    BalanceChange {
        address: Address,
        prior_balance: U256,
    },
    NonceChange {
        address: Address,
        prior_nonce: u64,
    },
    CodeChange {
        address: Address,
        prior_hash: H256,
        prior_code: Option<Vec<u8>>,
    },
    StorageChange {
        address: Address,
        slot: Slot,
        prior_value: H256,
    },
    TransientStorageChange {
        address: Address,
        slot: Slot,
        prior_value: H256,
    },
    RefundChange {
        prior_refund: u64,
    },
    AddLog {
        tx_hash: H256,
    },
    AddPreimage {
        hash: H256,
    },
    AccessListAddAccount {
        address: Address,
    },
    AccessListAddSlot {
        address: Address,
        slot: Slot,
    },
    /// A touch marker for an address that may not be materialised in the
    /// live cache (section 4.1, 9: "touch/zombie marker").
    Touch {
        address: Address,
    },
}

impl JournalEntry {
    fn address(&self) -> Option<&Address> {
        match self {
            JournalEntry::CreateObject {
                address,
            }
            | JournalEntry::CreateContract {
                address,
            }
            | JournalEntry::SelfDestruct {
                address, ..
            }
            | JournalEntry::BalanceChange {
                address, ..
            }
            | JournalEntry::NonceChange {
                address, ..
            }
            | JournalEntry::CodeChange {
                address, ..
            }
            | JournalEntry::StorageChange {
                address, ..
            }
            | JournalEntry::TransientStorageChange {
                address, ..
            }
            | JournalEntry::AccessListAddAccount {
                address,
            }
            | JournalEntry::AccessListAddSlot {
                address, ..
            }
            | JournalEntry::Touch {
                address,
            } => Some(address),
            JournalEntry::RefundChange {
                ..
            }
            | JournalEntry::AddLog {
                ..
            }
            | JournalEntry::AddPreimage {
                ..
            } => None,
        }
    }
}

/// Undo target for `Journal::revert`: anything an entry needs to reach back
/// into in order to restore prior state. `StateDb` implements this.
pub trait JournalUndo {
    fn undo_create_object(&mut self, address: &Address);
    fn undo_create_contract(&mut self, address: &Address);
    fn undo_self_destruct(&mut self, address: &Address, prior_flag: bool, prior_balance: &U256);
    fn undo_balance_change(&mut self, address: &Address, prior_balance: &U256);
    fn undo_nonce_change(&mut self, address: &Address, prior_nonce: u64);
    fn undo_code_change(&mut self, address: &Address, prior_hash: &H256, prior_code: Option<&[u8]>);
    fn undo_storage_change(&mut self, address: &Address, slot: &Slot, prior_value: &H256);
    fn undo_transient_storage_change(&mut self, address: &Address, slot: &Slot, prior_value: &H256);
    fn undo_refund_change(&mut self, prior_refund: u64);
    fn undo_add_log(&mut self, tx_hash: &H256);
    fn undo_add_preimage(&mut self, hash: &H256);
    fn undo_access_list_add_account(&mut self, address: &Address);
    fn undo_access_list_add_slot(&mut self, address: &Address, slot: &Slot);
    fn undo_touch(&mut self, _address: &Address) {}
}

fn apply_undo(entry: &JournalEntry, state: &mut dyn JournalUndo) {
    match entry {
        JournalEntry::CreateObject {
            address,
        } => state.undo_create_object(address),
        JournalEntry::CreateContract {
            address,
        } => state.undo_create_contract(address),
        JournalEntry::SelfDestruct {
            address,
            prior_flag,
            prior_balance,
        } => state.undo_self_destruct(address, *prior_flag, prior_balance),
        JournalEntry::BalanceChange {
            address,
            prior_balance,
        } => state.undo_balance_change(address, prior_balance),
        JournalEntry::NonceChange {
            address,
            prior_nonce,
        } => state.undo_nonce_change(address, *prior_nonce),
        JournalEntry::CodeChange {
            address,
            prior_hash,
            prior_code,
        } => state.undo_code_change(address, prior_hash, prior_code.as_deref()),
        JournalEntry::StorageChange {
            address,
            slot,
            prior_value,
        } => state.undo_storage_change(address, slot, prior_value),
        JournalEntry::TransientStorageChange {
            address,
            slot,
            prior_value,
        } => state.undo_transient_storage_change(address, slot, prior_value),
        JournalEntry::RefundChange {
            prior_refund,
        } => state.undo_refund_change(*prior_refund),
        JournalEntry::AddLog {
            tx_hash,
        } => state.undo_add_log(tx_hash),
        JournalEntry::AddPreimage {
            hash,
        } => state.undo_add_preimage(hash),
        JournalEntry::AccessListAddAccount {
            address,
        } => state.undo_access_list_add_account(address),
        JournalEntry::AccessListAddSlot {
            address,
            slot,
        } => state.undo_access_list_add_slot(address, slot),
        JournalEntry::Touch {
            address,
        } => state.undo_touch(address),
    }
}

/// An append-only log of reversible change records plus a dirty-count index
/// per address (section 4.1).
#[derive(Debug, Default, Clone)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    dirty_count: HashMap<Address, usize>,
}

impl Journal {
    pub fn new() -> Self {
        Journal::default()
    }

    pub fn append(&mut self, entry: JournalEntry) {
        if let Some(address) = entry.address() {
            *self.dirty_count.entry(*address).or_insert(0) += 1;
        }
        self.entries.push(entry);
    }

    pub fn length(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dirty_count(&self, address: &Address) -> usize {
        self.dirty_count.get(address).copied().unwrap_or(0)
    }

    pub fn dirty_addresses(&self) -> impl Iterator<Item = &Address> {
        self.dirty_count.keys()
    }

    /// Pops entries in LIFO order, invoking each entry's undo against
    /// `state`, until `length() == target_length`.
    pub fn revert(&mut self, state: &mut dyn JournalUndo, target_length: usize) {
        assert!(target_length <= self.entries.len(), "revert target past journal end");
        while self.entries.len() > target_length {
            let entry = self.entries.pop().expect("loop condition checked non-empty");
            apply_undo(&entry, state);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty_count.clear();
    }

    pub fn copy(&self) -> Journal {
        self.clone()
    }
}
