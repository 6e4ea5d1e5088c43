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

//! EVM-emitted log records and recorded hash preimages (section 3: `logs`,
//! `preimages`).

use std::collections::HashMap;

use address::Address;
use primitives::{Bytes, H256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// Per-tx-hash ordered log sequences, living for the whole block.
#[derive(Debug, Default)]
pub struct Logs {
    by_tx: HashMap<H256, Vec<Log>>,
}

impl Logs {
    pub fn new() -> Self {
        Logs::default()
    }

    pub fn add(&mut self, tx_hash: H256, log: Log) {
        self.by_tx.entry(tx_hash).or_insert_with(Vec::new).push(log);
    }

    /// Undoes the most recent `add` for `tx_hash`. Panics if there is
    /// nothing to pop: the journal only ever emits this for a tx_hash it
    /// has itself just added to.
    pub fn pop(&mut self, tx_hash: &H256) {
        let popped = self.by_tx.get_mut(tx_hash).and_then(|v| v.pop());
        assert!(popped.is_some(), "add-log undo with no log to pop");
    }

    pub fn get(&self, tx_hash: &H256) -> &[Log] {
        self.by_tx.get(tx_hash).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all(&self) -> impl Iterator<Item = (&H256, &Vec<Log>)> {
        self.by_tx.iter()
    }

    pub fn len(&self) -> usize {
        self.by_tx.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tx.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.by_tx.clear();
    }

    pub fn copy(&self) -> Logs {
        Logs {
            by_tx: self.by_tx.clone(),
        }
    }
}

impl Clone for Logs {
    fn clone(&self) -> Self {
        self.copy()
    }
}

/// Recorded hash preimages, e.g. for `SHA3`/`KECCAK256` opcode tracing.
#[derive(Debug, Default, Clone)]
pub struct Preimages {
    by_hash: HashMap<H256, Bytes>,
}

impl Preimages {
    pub fn new() -> Self {
        Preimages::default()
    }

    pub fn add(&mut self, hash: H256, preimage: Bytes) {
        self.by_hash.insert(hash, preimage);
    }

    pub fn remove(&mut self, hash: &H256) {
        self.by_hash.remove(hash);
    }

    pub fn get(&self, hash: &H256) -> Option<&Bytes> {
        self.by_hash.get(hash)
    }

    pub fn clear(&mut self) {
        self.by_hash.clear();
    }
}
