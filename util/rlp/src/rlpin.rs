// Copyright 2015-2017 Parity Technologies
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use error::DecoderError;
use traits::Decodable;

/// Header length plus payload length parsed from an RLP prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadInfo {
    pub header_len: usize,
    pub value_len: usize,
}

impl PayloadInfo {
    fn new(header_len: usize, value_len: usize) -> Self {
        PayloadInfo {
            header_len,
            value_len,
        }
    }

    pub fn total(&self) -> usize {
        self.header_len + self.value_len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prototype {
    Null,
    Data(usize),
    List(usize),
}

/// Parses the RLP length-prefix at the start of `bytes`, without inspecting
/// anything past the declared payload.
pub fn payload_info(bytes: &[u8]) -> Result<PayloadInfo, DecoderError> {
    let first = *bytes.first().ok_or(DecoderError::RlpIsTooShort {
        expected: 1,
        got: 0,
    })?;
    match first {
        0..=0x7f => Ok(PayloadInfo::new(0, 1)),
        0x80..=0xb7 => Ok(PayloadInfo::new(1, (first - 0x80) as usize)),
        0xb8..=0xbf => {
            let len_of_len = (first - 0xb7) as usize;
            let value_len = be_len(bytes, 1, len_of_len)?;
            if value_len <= 55 {
                return Err(DecoderError::RlpInvalidLength {
                    expected: 56,
                    got: value_len,
                })
            }
            Ok(PayloadInfo::new(1 + len_of_len, value_len))
        }
        0xc0..=0xf7 => Ok(PayloadInfo::new(1, (first - 0xc0) as usize)),
        0xf8..=0xff => {
            let len_of_len = (first - 0xf7) as usize;
            let value_len = be_len(bytes, 1, len_of_len)?;
            if value_len <= 55 {
                return Err(DecoderError::RlpInvalidLength {
                    expected: 56,
                    got: value_len,
                })
            }
            Ok(PayloadInfo::new(1 + len_of_len, value_len))
        }
    }
}

fn be_len(bytes: &[u8], offset: usize, len: usize) -> Result<usize, DecoderError> {
    if bytes.len() < offset + len {
        return Err(DecoderError::RlpIsTooShort {
            expected: offset + len,
            got: bytes.len(),
        })
    }
    if len > 0 && bytes[offset] == 0 {
        return Err(DecoderError::RlpDataLenWithZeroPrefix)
    }
    let mut value = 0usize;
    for &b in &bytes[offset..offset + len] {
        value = (value << 8) | b as usize;
    }
    Ok(value)
}

fn is_list_prefix(first: u8) -> bool {
    first >= 0xc0
}

/// A borrowed, structurally-checked view over one RLP item. Despite the
/// name, "untrusted" describes the origin of the bytes, not a distinct
/// decoding path; `UntrustedRlp` and `Rlp` are the same type.
#[derive(Debug, Clone, Copy)]
pub struct Rlp<'a> {
    bytes: &'a [u8],
}

pub type UntrustedRlp<'a> = Rlp<'a>;

impl<'a> Rlp<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Rlp {
            bytes,
        }
    }

    pub fn as_raw(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn payload_info(&self) -> Result<PayloadInfo, DecoderError> {
        payload_info(self.bytes)
    }

    pub fn prototype(&self) -> Result<Prototype, DecoderError> {
        if self.bytes.is_empty() {
            return Ok(Prototype::Data(0))
        }
        let info = self.payload_info()?;
        if is_list_prefix(self.bytes[0]) {
            Ok(Prototype::List(self.iter().count()))
        } else {
            let _ = info;
            Ok(Prototype::Data(info.value_len))
        }
    }

    pub fn is_null(&self) -> bool {
        self.bytes == [0x80] || self.bytes == [0xc0]
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() || self.bytes == [0x80] || self.bytes == [0xc0]
    }

    pub fn is_list(&self) -> bool {
        !self.bytes.is_empty() && is_list_prefix(self.bytes[0])
    }

    pub fn is_data(&self) -> bool {
        !self.is_list()
    }

    fn payload(&self) -> Result<&'a [u8], DecoderError> {
        let info = self.payload_info()?;
        let total = info.total();
        if total > self.bytes.len() {
            return Err(DecoderError::RlpIsTooShort {
                expected: total,
                got: self.bytes.len(),
            })
        }
        Ok(&self.bytes[info.header_len..total])
    }

    pub fn item_count(&self) -> Result<usize, DecoderError> {
        if !self.is_list() {
            return Err(DecoderError::RlpExpectedToBeList)
        }
        Ok(self.iter().count())
    }

    pub fn iter(&self) -> RlpIterator<'a> {
        let payload = self.payload().unwrap_or(&[]);
        RlpIterator {
            remaining: payload,
        }
    }

    pub fn at(&self, index: usize) -> Result<Rlp<'a>, DecoderError> {
        if !self.is_list() {
            return Err(DecoderError::RlpExpectedToBeList)
        }
        self.iter().nth(index).ok_or(DecoderError::RlpInconsistentLengthAndData {
            max: self.iter().count(),
            index,
        })
    }

    pub fn val_at<T: Decodable>(&self, index: usize) -> Result<T, DecoderError> {
        T::decode(&self.at(index)?)
    }

    pub fn as_val<T: Decodable>(&self) -> Result<T, DecoderError> {
        T::decode(self)
    }

    pub fn as_list<T: Decodable>(&self) -> Result<Vec<T>, DecoderError> {
        self.iter().map(|item| T::decode(&item)).collect()
    }

    pub fn decoder(&self) -> BasicDecoder<'a> {
        BasicDecoder {
            rlp: *self,
        }
    }
}

/// Walks the items of a list-prototype `Rlp` one at a time.
pub struct RlpIterator<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for RlpIterator<'a> {
    type Item = Rlp<'a>;

    fn next(&mut self) -> Option<Rlp<'a>> {
        if self.remaining.is_empty() {
            return None
        }
        let info = payload_info(self.remaining).ok()?;
        let total = info.total();
        if total > self.remaining.len() {
            return None
        }
        let (item, rest) = self.remaining.split_at(total);
        self.remaining = rest;
        Some(Rlp::new(item))
    }
}

pub struct BasicDecoder<'a> {
    rlp: Rlp<'a>,
}

impl<'a> BasicDecoder<'a> {
    pub fn decode_value<T, F>(&self, f: F) -> Result<T, DecoderError>
    where
        F: FnOnce(&[u8]) -> Result<T, DecoderError>, {
        if self.rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeData)
        }
        f(self.rlp.payload()?)
    }
}
