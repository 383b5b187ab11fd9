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

//! Implementation of the [`Packet`] type, a fully decoded DNS message.

use std::convert::TryFrom;
use std::fmt;

use super::{Error, Header, Question, Reader, Result};
use crate::rr::Record;

/// A fully decoded DNS message.
///
/// Decoding ([`Packet::decode`]) is all-or-nothing: every question and
/// record the header announces must be present, and nothing may follow
/// the last of them. Names are decompressed, while RDATA is kept as
/// opaque octets. [`Packet::encode`] produces the canonical,
/// uncompressed form of the message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Record>,
    pub authorities: Vec<Record>,
    pub additionals: Vec<Record>,
}

impl Packet {
    /// Decodes the message in `octets`.
    pub fn decode(octets: &[u8]) -> Result<Self> {
        let mut reader = Reader::try_from(octets)?;
        let header = *reader.header();

        let mut questions = Vec::new();
        for _ in 0..header.qdcount {
            questions.push(reader.read_question()?.0);
        }
        let answers = read_section(&mut reader, header.ancount)?;
        let authorities = read_section(&mut reader, header.nscount)?;
        let additionals = read_section(&mut reader, header.arcount)?;

        if reader.at_eom() {
            Ok(Self {
                header,
                questions,
                answers,
                authorities,
                additionals,
            })
        } else {
            Err(Error::CountMismatch)
        }
    }

    /// Encodes the message without name compression. The section
    /// counts written are the lengths of the section vectors, not the
    /// counts stored in [`Packet::header`].
    ///
    /// # Panics
    ///
    /// Panics if a section holds more than 65,535 entries, which cannot
    /// be the case for a decoded message.
    pub fn encode(&self) -> Vec<u8> {
        let count = |n: usize| u16::try_from(n).expect("section has more than 65,535 entries");
        let header = Header {
            qdcount: count(self.questions.len()),
            ancount: count(self.answers.len()),
            nscount: count(self.authorities.len()),
            arcount: count(self.additionals.len()),
            ..self.header
        };

        let mut buf = Vec::new();
        header.encode(&mut buf);
        for question in &self.questions {
            question.encode(&mut buf);
        }
        for record in self.records() {
            record.encode(&mut buf);
        }
        buf
    }

    /// Returns an iterator over the records of the answer, authority,
    /// and additional sections, in that order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.additionals.iter())
    }
}

fn read_section(reader: &mut Reader, count: u16) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for _ in 0..count {
        records.push(reader.read_record()?.0);
    }
    Ok(records)
}

/// Packets display in the style of `dig` output, for trace logging.
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let h = &self.header;
        writeln!(
            f,
            ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
            h.opcode, h.rcode, h.id
        )?;
        f.write_str(";; flags:")?;
        for (set, flag) in [(h.qr, "qr"), (h.aa, "aa"), (h.tc, "tc"), (h.rd, "rd"), (h.ra, "ra")] {
            if set {
                write!(f, " {}", flag)?;
            }
        }
        writeln!(
            f,
            "; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            self.questions.len(),
            self.answers.len(),
            self.authorities.len(),
            self.additionals.len()
        )?;

        if !self.questions.is_empty() {
            f.write_str("\n;; QUESTION SECTION:\n")?;
            for question in &self.questions {
                writeln!(f, ";{}", question)?;
            }
        }
        for (title, section) in [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authorities),
            ("ADDITIONAL", &self.additionals),
        ] {
            if !section.is_empty() {
                write!(f, "\n;; {} SECTION:\n", title)?;
                for record in section {
                    writeln!(f, "{}", record)?;
                }
            }
        }
        Ok(())
    }
}
