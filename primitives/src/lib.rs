//! Fixed-size hash and big-integer types shared by the state cache.
//!
//! These mirror the types `ethereum-types`-style crates build on top of
//! `fixed-hash`/`uint`: plain newtypes over byte arrays and limb arrays,
//! with hex (de)serialization when the `serialize` feature is on.

#[macro_use]
extern crate uint;
#[macro_use]
extern crate fixed_hash;

use fixed_hash::construct_fixed_hash;
use uint::construct_uint;

construct_fixed_hash! {
    /// 160-bit hash, used for account addresses.
    pub struct H160(20);
}

construct_fixed_hash! {
    /// 256-bit hash, used for trie roots, code hashes and storage keys.
    pub struct H256(32);
}

construct_uint! {
    /// 256-bit unsigned integer, used for balances and storage values.
    pub struct U256(4);
}

#[cfg(feature = "serialize")]
mod serialize {
    use super::{H160, H256, U256};
    use rustc_hex::{FromHex, ToHex};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt;

    macro_rules! impl_hex_serde {
        ($name:ident) => {
            impl Serialize for $name {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    let hex: String = self.as_bytes().to_hex();
                    serializer.serialize_str(&format!("0x{}", hex))
                }
            }

            impl<'de> Deserialize<'de> for $name {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    struct Visitor;
                    impl<'de> de::Visitor<'de> for Visitor {
                        type Value = $name;
                        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                            write!(f, "a 0x-prefixed hex string")
                        }
                        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                            let v = v.trim_start_matches("0x");
                            let bytes: Vec<u8> = v.from_hex().map_err(de::Error::custom)?;
                            Ok($name::from_slice(&bytes))
                        }
                    }
                    deserializer.deserialize_str(Visitor)
                }
            }
        };
    }

    impl_hex_serde!(H160);
    impl_hex_serde!(H256);

    impl Serialize for U256 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&format!("0x{:x}", self))
        }
    }

    impl<'de> Deserialize<'de> for U256 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            U256::from_str_radix(s.trim_start_matches("0x"), 16).map_err(de::Error::custom)
        }
    }
}

pub type Address = H160;
pub type Bytes = Vec<u8>;
