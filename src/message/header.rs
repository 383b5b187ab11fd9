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

//! Implementation of the [`Header`] type.

use super::constants::*;
use super::{Error, Opcode, Rcode, Result};

/// The fixed 12-octet header of a DNS message ([RFC 1035 § 4.1.1]).
///
/// The Z field is kept as decoded. RFC 1035 requires it to be zero,
/// but later extensions (DNSSEC's AD and CD bits) assigned two of its
/// bits, and a forwarder should not reject answers that use them.
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: Opcode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: Rcode,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Decodes the header at the beginning of `octets`. Fails with
    /// [`Error::TooShort`] if there are fewer than 12 octets.
    pub fn decode(octets: &[u8]) -> Result<Self> {
        if octets.len() < HEADER_SIZE {
            return Err(Error::TooShort);
        }
        let read_u16 = |start: usize| u16::from_be_bytes([octets[start], octets[start + 1]]);
        Ok(Self {
            id: read_u16(ID_START),
            qr: octets[QR_BYTE] & QR_MASK != 0,
            opcode: Opcode::from((octets[OPCODE_BYTE] & OPCODE_MASK) >> OPCODE_SHIFT),
            aa: octets[AA_BYTE] & AA_MASK != 0,
            tc: octets[TC_BYTE] & TC_MASK != 0,
            rd: octets[RD_BYTE] & RD_MASK != 0,
            ra: octets[RA_BYTE] & RA_MASK != 0,
            z: (octets[Z_BYTE] & Z_MASK) >> Z_SHIFT,
            rcode: Rcode::from(octets[RCODE_BYTE] & RCODE_MASK),
            qdcount: read_u16(QDCOUNT_START),
            ancount: read_u16(ANCOUNT_START),
            nscount: read_u16(NSCOUNT_START),
            arcount: read_u16(ARCOUNT_START),
        })
    }

    /// Reads only the transaction ID of the message in `octets`.
    pub fn peek_id(octets: &[u8]) -> Result<u16> {
        if octets.len() < HEADER_SIZE {
            Err(Error::TooShort)
        } else {
            Ok(u16::from_be_bytes([octets[ID_START], octets[ID_END - 1]]))
        }
    }

    /// Appends the on-the-wire representation of the header to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        let mut flags = [0u8; 2];
        let flag = |set: bool, mask: u8| if set { mask } else { 0 };
        flags[QR_BYTE - 2] |= flag(self.qr, QR_MASK);
        flags[OPCODE_BYTE - 2] |= (u8::from(self.opcode) << OPCODE_SHIFT) & OPCODE_MASK;
        flags[AA_BYTE - 2] |= flag(self.aa, AA_MASK);
        flags[TC_BYTE - 2] |= flag(self.tc, TC_MASK);
        flags[RD_BYTE - 2] |= flag(self.rd, RD_MASK);
        flags[RA_BYTE - 2] |= flag(self.ra, RA_MASK);
        flags[Z_BYTE - 2] |= (self.z << Z_SHIFT) & Z_MASK;
        flags[RCODE_BYTE - 2] |= u8::from(self.rcode) & RCODE_MASK;

        buf.extend_from_slice(&self.id.to_be_bytes());
        buf.extend_from_slice(&flags);
        buf.extend_from_slice(&self.qdcount.to_be_bytes());
        buf.extend_from_slice(&self.ancount.to_be_bytes());
        buf.extend_from_slice(&self.nscount.to_be_bytes());
        buf.extend_from_slice(&self.arcount.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flag_bits() {
        // QR, opcode 2, AA, TC, RD / RA, Z = 5, RCODE 3.
        let octets = b"\xc4\x6b\x97\xd3\x00\x01\x00\x02\x00\x03\x00\x04";
        let header = Header::decode(octets).unwrap();
        assert_eq!(header.id, 0xc46b);
        assert!(header.qr);
        assert_eq!(header.opcode, Opcode::Status);
        assert!(header.aa);
        assert!(header.tc);
        assert!(header.rd);
        assert!(header.ra);
        assert_eq!(header.z, 5);
        assert_eq!(header.rcode, Rcode::NxDomain);
        assert_eq!(header.qdcount, 1);
        assert_eq!(header.ancount, 2);
        assert_eq!(header.nscount, 3);
        assert_eq!(header.arcount, 4);

        let mut buf = Vec::new();
        header.encode(&mut buf);
        assert_eq!(buf, octets);
    }

    #[test]
    fn decodes_plain_query_header() {
        let header = Header::decode(b"\xc4\x6b\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00").unwrap();
        assert!(!header.qr);
        assert_eq!(header.opcode, Opcode::Query);
        assert!(header.rd);
        assert!(!header.ra);
        assert_eq!(header.z, 0);
        assert_eq!(header.rcode, Rcode::NoError);
    }

    #[test]
    fn rejects_short_headers() {
        for size in 0..HEADER_SIZE {
            let buf = vec![0; size];
            assert_eq!(Header::decode(&buf), Err(Error::TooShort));
            assert_eq!(Header::peek_id(&buf), Err(Error::TooShort));
        }
    }

    #[test]
    fn peek_id_reads_transaction_id() {
        assert_eq!(Header::peek_id(&[0xab, 0xcd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]), Ok(0xabcd));
    }
}
