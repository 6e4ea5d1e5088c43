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

//! Background trie-node warmer (section 4.5). Bound to a pre-state root at
//! construction; destructively consumed once `IntermediateRoot` begins
//! hashing, so it cannot be restarted. `Copy` clones it into an inactive
//! companion instead of trying to share the live one.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use address::Address;
use external::TrieDatabase;
use primitives::H256;

use clogger::log_target;

enum Command {
    Warm(Vec<Address>),
    Stop,
}

/// A namespace-bound prefetcher warming account/storage trie paths in the
/// background while execution mutates live state.
pub struct Prefetcher {
    sender: Option<Sender<Command>>,
    handles: Vec<thread::JoinHandle<()>>,
    active: bool,
}

impl Prefetcher {
    pub fn start(
        namespace: String,
        pre_state_root: H256,
        database: Arc<dyn TrieDatabase + Send + Sync>,
        workers: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(std::sync::Mutex::new(receiver));
        let mut handles = Vec::with_capacity(workers.max(1));
        for worker_id in 0..workers.max(1) {
            let receiver: Arc<std::sync::Mutex<Receiver<Command>>> = Arc::clone(&receiver);
            let database = Arc::clone(&database);
            let namespace = namespace.clone();
            handles.push(thread::spawn(move || {
                cdebug!(PREFETCHER, "{} worker {} started for root {:?}", namespace, worker_id, pre_state_root);
                loop {
                    let command = {
                        let guard = receiver.lock().expect("prefetcher channel mutex poisoned");
                        guard.recv()
                    };
                    match command {
                        Ok(Command::Warm(addresses)) => {
                            if let Ok(trie) = database.open_trie(&pre_state_root) {
                                for address in addresses {
                                    let _ = trie.get_account(&crate::address::hash_address(&address));
                                }
                            }
                        }
                        Ok(Command::Stop) | Err(_) => break,
                    }
                }
            }));
        }
        Prefetcher {
            sender: Some(sender),
            handles,
            active: true,
        }
    }

    /// An inactive companion: serves no reads, never panics if dropped,
    /// produced by `StateDb::copy` (section 4.10).
    pub fn inactive() -> Self {
        Prefetcher {
            sender: None,
            handles: Vec::new(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Hands a batch of touched addresses to the background workers
    /// (section 4.6, last step). A no-op on an inactive prefetcher.
    pub fn warm(&self, addresses: Vec<Address>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Command::Warm(addresses));
        }
    }

    /// Closes the prefetcher, joining its workers. Called once by
    /// `IntermediateRoot`; the prefetcher is non-restartable afterward.
    pub fn stop(mut self) {
        self.stop_mut();
    }

    fn stop_mut(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Command::Stop);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        self.active = false;
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.stop_mut();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_prefetcher_ignores_warm_requests() {
        let prefetcher = Prefetcher::inactive();
        assert!(!prefetcher.is_active());
        prefetcher.warm(vec![Address::zero()]);
    }
}
