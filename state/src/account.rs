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

//! The account record and its slim (empty-field-eliding) encoding.

use primitives::{H256, U256};
use rlp::{Decodable, DecoderError, Encodable, RlpStream, UntrustedRlp};

/// Canonical hash of an empty byte string, the default `code_hash`.
pub fn empty_code_hash() -> H256 {
    H256::zero()
}

/// Canonical hash of an empty RLP trie, the default `storage_root`.
pub fn empty_storage_root() -> H256 {
    H256::zero()
}

const PREFIX: u8 = b'A';

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl Account {
    pub fn new(nonce: u64, balance: U256) -> Self {
        Account {
            nonce,
            balance,
            storage_root: empty_storage_root(),
            code_hash: empty_code_hash(),
        }
    }

    /// An account is "empty" in the EIP-158 sense: no balance, no nonce, no
    /// code. An empty account with non-default storage is not representable
    /// (storage is wiped alongside deletion), so storage is not part of the
    /// test.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code_hash == empty_code_hash()
    }

    pub fn add_balance(&mut self, amount: &U256) {
        self.balance += *amount;
    }

    /// Panics if `amount` exceeds the current balance (section 7, category 3:
    /// an underflowing balance subtraction is a caller bug).
    pub fn sub_balance(&mut self, amount: &U256) {
        assert!(self.balance >= *amount, "balance underflow");
        self.balance -= *amount;
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

impl Encodable for Account {
    fn rlp_append(&self, s: &mut RlpStream) {
        let has_storage = self.storage_root != empty_storage_root();
        let has_code = self.code_hash != empty_code_hash();
        // Slim encoding: a trailing run of default fields is elided rather
        // than written out, mirroring the teacher's fixed-prefix pattern but
        // with a variable tail.
        let len = if has_code {
            5
        } else if has_storage {
            4
        } else {
            3
        };
        s.begin_list(len);
        s.append(&PREFIX);
        s.append(&self.nonce);
        s.append(&self.balance);
        if has_storage || has_code {
            s.append(&self.storage_root);
        }
        if has_code {
            s.append(&self.code_hash);
        }
    }
}

impl Decodable for Account {
    fn decode(rlp: &UntrustedRlp) -> Result<Self, DecoderError> {
        let prefix = rlp.val_at::<u8>(0)?;
        if prefix != PREFIX {
            return Err(DecoderError::Custom("unexpected account prefix"))
        }
        let item_count = rlp.item_count()?;
        let nonce = rlp.val_at(1)?;
        let balance = rlp.val_at(2)?;
        let storage_root = if item_count >= 4 {
            rlp.val_at(3)?
        } else {
            empty_storage_root()
        };
        let code_hash = if item_count >= 5 {
            rlp.val_at(4)?
        } else {
            empty_code_hash()
        };
        Ok(Account {
            nonce,
            balance,
            storage_root,
            code_hash,
        })
    }
}
