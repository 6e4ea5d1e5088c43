// Copyright 2015-2017 Parity Technologies
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use elastic_array::ElasticArray1024;

use error::DecoderError;
use rlpin::UntrustedRlp;
use stream::RlpStream;

pub trait Encodable {
    fn rlp_append(&self, s: &mut RlpStream);

    fn rlp_bytes(&self) -> ElasticArray1024<u8> {
        let mut s = RlpStream::new();
        s.append_single_value(self);
        s.drain()
    }
}

pub trait Decodable: Sized {
    fn decode(rlp: &UntrustedRlp) -> Result<Self, DecoderError>;
}
