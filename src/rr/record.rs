// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Record`] type.

use super::{Ttl, Type};
use crate::class::Class;
use crate::name::Name;

/// A single resource record, as found in the answer, authority, or
/// additional section of a DNS message.
///
/// A `Record` owns all of its data. In particular, the RDATA is copied
/// out of the message it was read from and kept as opaque octets: names
/// inside the RDATA may still contain compression pointers that refer
/// to the original message. The RDLENGTH field is not stored; it is
/// always the length of `rdata`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Record {
    pub owner: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: Ttl,
    pub rdata: Box<[u8]>,
}

impl Record {
    /// Returns the RDLENGTH of the record.
    ///
    /// # Panics
    ///
    /// Panics if the RDATA is longer than 65,535 octets, which cannot
    /// be the case for records read off the wire.
    pub fn rdlength(&self) -> u16 {
        u16::try_from(self.rdata.len()).expect("RDATA is longer than 65,535 octets")
    }

    /// Appends the uncompressed on-the-wire representation of the
    /// record to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        self.owner.encode(buf);
        buf.extend_from_slice(&u16::from(self.rr_type).to_be_bytes());
        buf.extend_from_slice(&u16::from(self.class).to_be_bytes());
        buf.extend_from_slice(&u32::from(self.ttl).to_be_bytes());
        buf.extend_from_slice(&self.rdlength().to_be_bytes());
        buf.extend_from_slice(&self.rdata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_produces_canonical_form() {
        let record = Record {
            owner: "dns.google".parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: Ttl::from(0x0102_0304),
            rdata: Box::new([8, 8, 4, 4]),
        };
        let mut buf = Vec::new();
        record.encode(&mut buf);
        assert_eq!(
            buf,
            b"\x03dns\x06google\x00\x00\x01\x00\x01\x01\x02\x03\x04\x00\x04\x08\x08\x04\x04"
        );
    }
}
