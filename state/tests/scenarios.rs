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

//! End-to-end scenarios against the in-memory fake trie/database, one per
//! testable property.

use std::sync::{Arc, Mutex};

use chainstate::testutil::{MemoryKvDatabase, MemoryTrieDatabase};
use chainstate::{
    Account, Address, Database, Log, Slot, SlotValue, StateConfig, StateDb, Tracer, TrieDatabase, H256, U256,
};

fn new_state(
    db: &Arc<MemoryTrieDatabase>,
    kv: &Arc<MemoryKvDatabase>,
    root: H256,
    deterministic: bool,
) -> StateDb {
    let config = StateConfig {
        deterministic,
        ..StateConfig::default()
    };
    StateDb::new(
        config,
        Arc::clone(db) as Arc<dyn TrieDatabase + Send + Sync>,
        Arc::clone(kv) as Arc<dyn Database + Send + Sync>,
        None,
        root,
    )
    .expect("open state at a known root")
}

#[test]
fn s1_balance_revert() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);
    let a = Address::from_low_u64_be(1);

    state.add_balance(&a, &U256::from(100));
    let id = state.snapshot();
    state.add_balance(&a, &U256::from(50));
    state.revert_to_snapshot(id);

    assert_eq!(state.balance(&a), U256::from(100));
}

#[test]
fn s2_self_destruct_burn() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);
    let a = Address::from_low_u64_be(1);

    state.add_balance(&a, &U256::from(5));
    state.self_destruct(&a);
    state.finalise(true);

    assert!(!state.exist(&a));
    state.commit(1, true).expect("commit destruct");

    let reverse_diff = db.last_reverse_diff().expect("commit records a reverse diff");
    let encoded = reverse_diff.accounts_origin.get(&a).expect("destruct set carries A's origin").as_ref().unwrap();
    let origin: Account = ::rlp::decode(encoded).expect("origin account decodes");
    assert_eq!(origin.balance, U256::from(5), "destruct set must carry the pre-destruct balance, not the zeroed one");
}

#[test]
fn s3_resurrection() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let a = Address::from_low_u64_be(1);
    let k1 = Slot::from_low_u64_be(1);
    let v1 = SlotValue::from_low_u64_be(0xaa);
    let v2 = SlotValue::from_low_u64_be(0xbb);

    let root1 = {
        let mut state = new_state(&db, &kv, H256::zero(), false);
        state.add_balance(&a, &U256::from(7));
        state.set_state(&a, k1, v1);
        state.commit(1, true).expect("commit block 1")
    };

    let root2 = {
        let mut state = new_state(&db, &kv, root1, false);
        state.self_destruct(&a);
        state.finalise(true);
        state.create_account(&a);
        state.set_state(&a, k1, v2);
        state.finalise(true);
        state.commit(2, true).expect("commit block 2")
    };

    let mut final_state = new_state(&db, &kv, root2, false);
    assert!(final_state.exist(&a));
    assert_eq!(final_state.get_state(&a, &k1), v2);

    let reverse_diff = db.last_reverse_diff().expect("commit records a reverse diff");
    assert!(reverse_diff.accounts_origin.contains_key(&a));
    let storage_origin = reverse_diff.storages_origin.get(&a).expect("storage origin recorded for A");
    assert!(storage_origin.values().any(|bytes| SlotValue::from_slice(bytes) == v1));
}

#[test]
fn s4_same_tx_create_and_destroy_is_removed() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);
    let b = Address::from_low_u64_be(2);

    state.create_contract(&b);
    state.set_code(&b, vec![1, 2, 3]);
    state.self_destruct_6780(&b);
    state.finalise(true);

    assert!(!state.exist(&b));
}

#[test]
fn s4_self_destruct_6780_gate_holds_without_create_contract() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);
    let b = Address::from_low_u64_be(2);

    // B is touched by a plain balance bump, never `CreateContract`-marked in
    // this transaction, so the EIP-6780 gate must hold and refuse to destroy it.
    state.add_balance(&b, &U256::from(1));
    state.self_destruct_6780(&b);
    state.finalise(true);

    assert!(state.exist(&b));
}

#[test]
#[should_panic(expected = "refund underflow")]
fn s5_refund_underflow_panics() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);

    state.add_refund(10);
    state.sub_refund(20);
}

#[test]
fn s7_code_change_reverts_to_no_code() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);
    let a = Address::from_low_u64_be(1);

    state.create_account(&a);
    let id = state.snapshot();
    state.set_code(&a, vec![1, 2, 3]);
    assert!(state.code(&a).is_some());
    state.revert_to_snapshot(id);

    assert_eq!(state.code(&a), None);
}

#[test]
fn s8_set_storage_hides_old_slot_on_disk() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let a = Address::from_low_u64_be(1);
    let old_slot = Slot::from_low_u64_be(1);
    let old_value = SlotValue::from_low_u64_be(0xaa);

    let root1 = {
        let mut state = new_state(&db, &kv, H256::zero(), false);
        state.create_account(&a);
        state.set_state(&a, old_slot, old_value);
        state.finalise(true);
        state.commit(1, true).expect("commit block 1")
    };

    let mut state = new_state(&db, &kv, root1, false);
    assert_eq!(state.get_state(&a, &old_slot), old_value);

    let mut new_slots = std::collections::BTreeMap::new();
    new_slots.insert(Slot::from_low_u64_be(2), SlotValue::from_low_u64_be(2));
    state.set_storage(&a, new_slots);

    assert_eq!(state.get_state(&a, &old_slot), SlotValue::zero());
    assert_eq!(state.get_state(&a, &Slot::from_low_u64_be(2)), SlotValue::from_low_u64_be(2));
}

#[derive(Default)]
struct RecordingTracer {
    balance_changes: Arc<Mutex<Vec<(Address, U256, U256, String)>>>,
    logs: Arc<Mutex<Vec<(H256, Log)>>>,
}

impl Tracer for RecordingTracer {
    fn on_log(&mut self, tx_hash: H256, log: &Log) {
        self.logs.lock().unwrap().push((tx_hash, log.clone()));
    }

    fn on_balance_change(&mut self, address: Address, prev: U256, new: U256, reason: &str) {
        self.balance_changes.lock().unwrap().push((address, prev, new, reason.to_string()));
    }
}

#[test]
fn s9_tracer_observes_balance_and_log_events() {
    let db = MemoryTrieDatabase::new();
    let kv = MemoryKvDatabase::new();
    let mut state = new_state(&db, &kv, H256::zero(), false);
    let a = Address::from_low_u64_be(1);

    let balance_changes = Arc::new(Mutex::new(Vec::new()));
    let logs = Arc::new(Mutex::new(Vec::new()));
    let tracer = RecordingTracer {
        balance_changes: Arc::clone(&balance_changes),
        logs: Arc::clone(&logs),
    };
    state.set_tracer(Box::new(tracer));

    let tx_hash = H256::from_low_u64_be(42);
    state.set_tx_context(tx_hash, 0);
    state.add_balance(&a, &U256::from(10));
    state.add_log(Log {
        address: a,
        topics: vec![],
        data: vec![7],
    });

    let recorded_balances = balance_changes.lock().unwrap();
    assert_eq!(recorded_balances.len(), 1);
    assert_eq!(recorded_balances[0], (a, U256::zero(), U256::from(10), "add_balance".to_string()));

    let recorded_logs = logs.lock().unwrap();
    assert_eq!(recorded_logs.len(), 1);
    assert_eq!(recorded_logs[0].0, tx_hash);
    assert_eq!(recorded_logs[0].1.data, vec![7]);
}

#[test]
fn s6_deterministic_commit_is_order_independent() {
    let a = Address::from_low_u64_be(1);
    let b = Address::from_low_u64_be(2);

    let db1 = MemoryTrieDatabase::new();
    let kv1 = MemoryKvDatabase::new();
    let mut state1 = new_state(&db1, &kv1, H256::zero(), true);
    state1.add_balance(&a, &U256::from(10));
    state1.add_balance(&b, &U256::from(20));
    let root1 = state1.commit(1, true).expect("commit run 1");

    let db2 = MemoryTrieDatabase::new();
    let kv2 = MemoryKvDatabase::new();
    let mut state2 = new_state(&db2, &kv2, H256::zero(), true);
    state2.add_balance(&b, &U256::from(20));
    state2.add_balance(&a, &U256::from(10));
    let root2 = state2.commit(1, true).expect("commit run 2");

    assert_eq!(root1, root2);
}
