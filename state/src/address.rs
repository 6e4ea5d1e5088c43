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

use primitives::{H160, H256};
use sha3::{Digest, Keccak256};

pub type Address = H160;

/// 32-byte hash of an [`Address`], used as the account trie key. Computing
/// it is the one place this crate touches the hashing primitive directly;
/// everything else treats hashes as opaque.
pub type AddressHash = H256;

pub fn hash_address(address: &Address) -> AddressHash {
    let digest = Keccak256::digest(address.as_bytes());
    H256::from_slice(&digest)
}

pub type Slot = H256;
pub type SlotValue = H256;

pub fn hash_slot(slot: &Slot) -> H256 {
    let digest = Keccak256::digest(slot.as_bytes());
    H256::from_slice(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        let a = Address::from_low_u64_be(1);
        assert_eq!(hash_address(&a), hash_address(&a));
    }

    #[test]
    fn distinct_addresses_hash_differently() {
        let a = Address::from_low_u64_be(1);
        let b = Address::from_low_u64_be(2);
        assert_ne!(hash_address(&a), hash_address(&b));
    }
}
