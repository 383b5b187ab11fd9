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

//! Implementation of the [`Reader`] type to read on-the-wire DNS
//! messages.

use std::convert::TryFrom;

use super::constants::*;
use super::{Error, Header, Question, Result};
use crate::name::Name;
use crate::rr::Record;

////////////////////////////////////////////////////////////////////////
// READER                                                             //
////////////////////////////////////////////////////////////////////////

/// A "frame" around a buffer containing a DNS message that enables
/// reading the message data.
///
/// A `Reader` is constructed using its [`TryFrom`] implementation. Any
/// underlying buffer for a reader must contain at least a full DNS
/// message header of 12 octets; otherwise the construction will fail.
///
/// The header is decoded on construction and is available through
/// [`Reader::header`]. For reading questions and RRs, the
/// [`Reader::read_question`] and [`Reader::read_record`] methods are
/// provided. These read using a cursor, which is initially set to the
/// first octet after the DNS header. They must be called sequentially
/// to read any questions, and then any records, in the order they
/// appear in the message.
#[derive(Debug, Eq, PartialEq)]
pub struct Reader<'a> {
    octets: &'a [u8],
    header: Header,
    cursor: usize,
}

impl<'a> Reader<'a> {
    /// Returns the decoded message header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Reads a [`Question`] starting at the current cursor. On success,
    /// returns the question and the number of octets it occupied.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_question(&mut self) -> Result<(Question, usize)> {
        let (qname, qname_len) = Name::try_from_compressed(self.octets, self.cursor)?;
        let qname_end = self.cursor + qname_len;
        let qtype = read_u16(self.octets, qname_end)?.into();
        let qclass = read_u16(self.octets, qname_end + 2)?.into();
        let consumed = qname_len + 4;
        self.cursor += consumed;
        Ok((
            Question {
                qname,
                qtype,
                qclass,
            },
            consumed,
        ))
    }

    /// Reads a resource record at the current cursor. On success,
    /// returns the record and the number of octets it occupied.
    ///
    /// The RDATA is copied out verbatim; any compression pointers
    /// inside it are left alone.
    ///
    /// This method is atomic, in that the cursor is not changed on
    /// failure.
    pub fn read_record(&mut self) -> Result<(Record, usize)> {
        let (owner, owner_len) = Name::try_from_compressed(self.octets, self.cursor)?;
        let owner_end = self.cursor + owner_len;
        let rr_type = read_u16(self.octets, owner_end)?.into();
        let class = read_u16(self.octets, owner_end + 2)?.into();
        let ttl = read_u32(self.octets, owner_end + 4)?.into();
        let rdlength = read_u16(self.octets, owner_end + 8)? as usize;
        let rdata_start = owner_end + 10;
        let rdata = self
            .octets
            .get(rdata_start..rdata_start + rdlength)
            .ok_or(Error::CountMismatch)?;
        let consumed = owner_len + 10 + rdlength;
        self.cursor += consumed;
        Ok((
            Record {
                owner,
                rr_type,
                class,
                ttl,
                rdata: rdata.into(),
            },
            consumed,
        ))
    }

    /// Returns whether the `Reader`'s cursor has reached the end of the
    /// message.
    pub fn at_eom(&self) -> bool {
        self.cursor >= self.octets.len()
    }
}

impl<'a> TryFrom<&'a [u8]> for Reader<'a> {
    type Error = Error;

    fn try_from(octets: &'a [u8]) -> Result<Self> {
        Ok(Self {
            octets,
            header: Header::decode(octets)?,
            cursor: HEADER_SIZE,
        })
    }
}

////////////////////////////////////////////////////////////////////////
// HELPERS FOR READING MULTI-BYTE INTEGERS                            //
////////////////////////////////////////////////////////////////////////

/// Reads a network-byte-order `u16` at index `start` of `octets`.
fn read_u16(octets: &[u8], start: usize) -> Result<u16> {
    match octets.get(start..start + 2) {
        Some(&[a, b]) => Ok(u16::from_be_bytes([a, b])),
        _ => Err(Error::CountMismatch),
    }
}

/// Reads a network-byte-order `u32` at index `start` of `octets`.
fn read_u32(octets: &[u8], start: usize) -> Result<u32> {
    match octets.get(start..start + 4) {
        Some(&[a, b, c, d]) => Ok(u32::from_be_bytes([a, b, c, d])),
        _ => Err(Error::CountMismatch),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::super::{Opcode, Qclass, Qtype, Rcode};
    use super::*;
    use crate::class::Class;
    use crate::rr::{Ttl, Type};

    /// This is a reply to a query for example.com. IN NS to a recursive
    /// server, made on January 7, 2022.
    const EXAMPLE_COM_NS_MESSAGE: &[u8] =
        b"\xe2\xd7\x81\x80\x00\x01\x00\x02\x00\x00\x00\x01\x07\x65\x78\x61\
          \x6d\x70\x6c\x65\x03\x63\x6f\x6d\x00\x00\x02\x00\x01\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x14\x01\x61\x0c\x69\x61\x6e\x61\
          \x2d\x73\x65\x72\x76\x65\x72\x73\x03\x6e\x65\x74\x00\xc0\x0c\x00\
          \x02\x00\x01\x00\x01\x50\xa2\x00\x04\x01\x62\xc0\x2b\x00\x00\x29\
          \x10\x00\x00\x00\x00\x00\x00\x00";

    #[test]
    fn reader_works() {
        let mut reader = Reader::try_from(EXAMPLE_COM_NS_MESSAGE).unwrap();
        let expected_qname: Name = "example.com.".parse().unwrap();

        // Check the header.
        let header = *reader.header();
        assert_eq!(header.id, 0xe2d7);
        assert!(header.qr);
        assert_eq!(header.opcode, Opcode::Query);
        assert!(!header.aa);
        assert!(!header.tc);
        assert!(header.rd);
        assert!(header.ra);
        assert_eq!(header.rcode, Rcode::NoError);
        assert_eq!(header.qdcount, 1);
        assert_eq!(header.ancount, 2);
        assert_eq!(header.nscount, 0);
        assert_eq!(header.arcount, 1);

        // Check the question.
        let (question, consumed) = reader.read_question().unwrap();
        assert_eq!(question.qname, expected_qname);
        assert_eq!(question.qtype, Qtype::from(Type::NS));
        assert_eq!(question.qclass, Qclass::from(Class::IN));
        assert_eq!(consumed, 17);

        // Check the answers. The RDATA of the first holds an
        // uncompressed name; that of the second ends in a pointer,
        // which is kept as is.
        let (answer_1, consumed) = reader.read_record().unwrap();
        assert_eq!(answer_1.owner, expected_qname);
        assert_eq!(answer_1.rr_type, Type::NS);
        assert_eq!(answer_1.class, Class::IN);
        assert_eq!(answer_1.ttl, Ttl::from(86178));
        assert_eq!(&answer_1.rdata[..], b"\x01a\x0ciana-servers\x03net\x00");
        assert_eq!(consumed, 2 + 10 + 20);
        let (answer_2, consumed) = reader.read_record().unwrap();
        assert_eq!(answer_2.owner, expected_qname);
        assert_eq!(answer_2.ttl, Ttl::from(86178));
        assert_eq!(&answer_2.rdata[..], b"\x01b\xc0\x2b");
        assert_eq!(consumed, 2 + 10 + 4);

        // Check the OPT record.
        let (opt, consumed) = reader.read_record().unwrap();
        assert!(opt.owner.is_root());
        assert_eq!(opt.rr_type, Type::OPT);
        assert_eq!(opt.class, Class::from(4096));
        assert!(opt.rdata.is_empty());
        assert_eq!(consumed, 11);

        // And that should be it!
        assert!(reader.at_eom());
    }

    #[test]
    fn reader_constructor_rejects_short_message() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Reader::try_from(buf.as_slice()), Err(Error::TooShort));
        }
    }

    #[test]
    fn truncated_record_is_count_mismatch() {
        // Cut the message off in the middle of the first answer's RDATA.
        let mut reader = Reader::try_from(&EXAMPLE_COM_NS_MESSAGE[..50]).unwrap();
        reader.read_question().unwrap();
        let cursor = reader.cursor;
        assert_eq!(reader.read_record(), Err(Error::CountMismatch));
        assert_eq!(reader.cursor, cursor);
    }
}
