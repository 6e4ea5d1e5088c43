// Copyright 2015-2017 Parity Technologies
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::borrow::Borrow;

use elastic_array::ElasticArray1024;

use traits::Encodable;

struct ListInfo {
    position: usize,
    current: usize,
    max: usize,
}

impl ListInfo {
    fn new(position: usize, max: usize) -> Self {
        ListInfo {
            position,
            current: 0,
            max,
        }
    }
}

/// Growable buffer for building up an RLP encoding incrementally. A list
/// begun with `begin_list` is only finished (its length header written) once
/// exactly `max` items have been appended to it; nesting is tracked with a
/// stack so lists of lists close themselves automatically.
pub struct RlpStream {
    unfinished_lists: Vec<ListInfo>,
    buffer: Vec<u8>,
    finished_list: bool,
}

impl Default for RlpStream {
    fn default() -> Self {
        Self::new()
    }
}

impl RlpStream {
    pub fn new() -> Self {
        RlpStream {
            unfinished_lists: Vec::new(),
            buffer: Vec::new(),
            finished_list: false,
        }
    }

    pub fn new_list(len: usize) -> Self {
        let mut stream = Self::new();
        stream.begin_list(len);
        stream
    }

    pub fn begin_list(&mut self, len: usize) -> &mut Self {
        if len == 0 {
            self.buffer.push(0xc0);
            self.note_appended(1);
            self.finished_list = true;
        } else {
            self.unfinished_lists.push(ListInfo::new(self.buffer.len(), len));
            self.finished_list = false;
        }
        self
    }

    pub fn append<E: Encodable + ?Sized>(&mut self, value: &E) -> &mut Self {
        self.finished_list = false;
        value.rlp_append(self);
        if self.finished_list {
            self.finished_list = false;
        } else {
            self.note_appended(1);
        }
        self
    }

    pub fn append_single_value<E: Encodable + ?Sized>(&mut self, value: &E) -> &mut Self {
        self.finished_list = false;
        value.rlp_append(self);
        self
    }

    pub fn append_list<E, K>(&mut self, values: &[K]) -> &mut Self
    where
        E: Encodable,
        K: Borrow<E>, {
        self.begin_list(values.len());
        for value in values {
            self.append(value.borrow());
        }
        self
    }

    pub fn encoder(&mut self) -> BasicEncoder {
        BasicEncoder {
            stream: self,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.unfinished_lists.is_empty()
    }

    pub fn drain(self) -> ElasticArray1024<u8> {
        assert!(self.is_finished(), "attempted to drain an unfinished RlpStream");
        let mut out = ElasticArray1024::new();
        for byte in self.buffer {
            out.push(byte);
        }
        out
    }

    pub fn out(self) -> Vec<u8> {
        assert!(self.is_finished(), "attempted to read an unfinished RlpStream");
        self.buffer
    }

    fn note_appended(&mut self, items: usize) {
        if self.unfinished_lists.is_empty() {
            return
        }
        let finished = {
            let top = self.unfinished_lists.last_mut().expect("checked non-empty above");
            top.current += items;
            top.current >= top.max
        };
        if finished {
            let list = self.unfinished_lists.pop().expect("checked non-empty above");
            let payload_len = self.buffer.len() - list.position;
            let header = list_header(payload_len);
            splice_in(&mut self.buffer, list.position, &header);
            self.finished_list = true;
            self.note_appended(1);
        }
    }

    fn encode_value_raw(&mut self, value: &[u8]) {
        match value.len() {
            0 => self.buffer.push(0x80),
            1 if value[0] < 0x80 => self.buffer.push(value[0]),
            len if len <= 55 => {
                self.buffer.push(0x80 + len as u8);
                self.buffer.extend_from_slice(value);
            }
            len => {
                let len_bytes = big_endian_trimmed(len as u64);
                self.buffer.push(0xb7 + len_bytes.len() as u8);
                self.buffer.extend_from_slice(&len_bytes);
                self.buffer.extend_from_slice(value);
            }
        }
    }
}

fn list_header(payload_len: usize) -> Vec<u8> {
    if payload_len <= 55 {
        vec![0xc0 + payload_len as u8]
    } else {
        let len_bytes = big_endian_trimmed(payload_len as u64);
        let mut header = Vec::with_capacity(1 + len_bytes.len());
        header.push(0xf7 + len_bytes.len() as u8);
        header.extend_from_slice(&len_bytes);
        header
    }
}

fn big_endian_trimmed(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    bytes[first_nonzero..].to_vec()
}

fn splice_in(buffer: &mut Vec<u8>, position: usize, header: &[u8]) {
    buffer.splice(position..position, header.iter().copied());
}

/// Writes raw, already-length-prefixed-or-primitive values into the stream.
/// `Encodable` impls for leaf types call this directly; `RlpStream::append`
/// is responsible for counting the item against any enclosing list.
pub struct BasicEncoder<'a> {
    stream: &'a mut RlpStream,
}

impl<'a> BasicEncoder<'a> {
    pub fn encode_value(&mut self, value: &[u8]) {
        self.stream.encode_value_raw(value);
    }
}
