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

#[macro_use]
extern crate clogger;
extern crate log;
extern crate parking_lot;
extern crate primitives;
extern crate rlp;
extern crate sha3;

mod access_list;
mod account;
mod address;
mod config;
mod db;
mod delete_storage;
mod error;
mod external;
mod journal;
mod log;
mod object;
mod prefetcher;
mod revision;
mod transient_storage;

/// In-memory `Trie`/`TrieDatabase`/`Database` fakes. Not behind `cfg(test)`
/// so the `tests/scenarios.rs` integration target can reuse them the same
/// way a downstream crate's own test suite would.
pub mod testutil;

pub use access_list::AccessList;
pub use account::{empty_code_hash, empty_storage_root, Account};
pub use address::{hash_address, hash_slot, Address, AddressHash, Slot, SlotValue};
pub use config::StateConfig;
pub use db::StateDb;
pub use error::{Error, ExternalError, Result};
pub use external::{
    Batch, Database, DirtyNodeSet, ExtensionWriter, NodePath, NoopExtensionWriter, NoopTracer, ReverseDiff, Snapshot,
    SnapshotTree, StorageIterator, Tracer, Trie, TrieDatabase,
};
pub use log::{Log, Logs, Preimages};
pub use primitives::{Bytes, H256, U256};
pub use transient_storage::TransientStorage;
