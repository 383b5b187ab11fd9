// Copyright 2021 Matthew Ingwersen.
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

//! Implementation of data structures related to domain names.

use std::fmt;
use std::slice;
use std::str::FromStr;

mod error;
mod label;
mod wire;
pub use error::Error;
pub use label::LabelBuf;

/// The maximum number of labels in a domain name, counting the null
/// label.
const MAX_N_LABELS: usize = 128;

/// The maximum length of the uncompressed on-the-wire representation of
/// a domain name.
const MAX_WIRE_LEN: usize = 255;

/// The maximum length of a label in a domain name (not including the
/// octet that provides the length).
const MAX_LABEL_LEN: usize = 63;

/// The maximum number of compression pointers followed while decoding
/// a single name.
const MAX_POINTER_HOPS: usize = 128;

////////////////////////////////////////////////////////////////////////
// NAME STRUCTURE                                                     //
////////////////////////////////////////////////////////////////////////

/// A structure to represent a domain name.
///
/// A `Name` is the ordered sequence of its non-null labels, leftmost
/// (most specific) first. The root name has no labels. The terminal
/// null label of the on-the-wire form is implied, and it is never
/// stored.
///
/// `Name`s can be constructed in several ways:
///
/// * through the [`FromStr`] implementation, which accepts the dotted
///   presentation format with or without a trailing dot;
/// * from raw labels through [`Name::from_labels`]; and
/// * from (possibly compressed) on-the-wire names through
///   [`Name::try_from_compressed`].
///
/// Every constructor guarantees that each label is 1–63 octets long and
/// that the uncompressed on-the-wire form is no longer than 255 octets.
///
/// Comparison is byte-for-byte; no case folding is performed.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Name {
    labels: Vec<LabelBuf>,
}

impl Name {
    /// Returns the root name.
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Builds a name from its labels, given leftmost first. No label
    /// may be empty.
    pub fn from_labels<'a, I>(labels: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut name = Self::root();
        let mut wire_len = 1;
        for octets in labels {
            if octets.is_empty() {
                return Err(Error::EmptyLabel);
            }
            let label = LabelBuf::try_from(octets)?;
            wire_len += label.len() + 1;
            if wire_len > MAX_WIRE_LEN {
                return Err(Error::NameTooLong);
            }
            name.labels.push(label);
        }
        Ok(name)
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the number of non-null labels in the name.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns an iterator over the labels of the name, leftmost first.
    /// Use [`Iterator::rev`] to walk from the top-level label down.
    pub fn labels(&self) -> slice::Iter<LabelBuf> {
        self.labels.iter()
    }

    /// Returns the length of the uncompressed on-the-wire
    /// representation of the name.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Parses a compressed name starting at index `start` of `octets`,
    /// which should be an entire DNS message. Compression pointers are
    /// followed. On success, returns the name and the number of octets
    /// it occupies at `start` (which, if the name ends in a pointer,
    /// counts the two octets of the pointer and nothing beyond it).
    pub fn try_from_compressed(octets: &[u8], start: usize) -> Result<(Self, usize), Error> {
        wire::parse_compressed_name(octets, start)
    }

    /// Appends the uncompressed on-the-wire representation of the name
    /// to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for label in &self.labels {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.octets());
        }
        buf.push(0);
    }

    /// Returns the uncompressed on-the-wire representation of the name.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_len());
        self.encode(&mut buf);
        buf
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut labels = self.labels();
        match labels.next() {
            None => f.write_str("."),
            Some(first) => {
                first.fmt(f)?;
                for label in labels {
                    write!(f, ".{}", label)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING OF NAMES FROM RUST STRINGS                                 //
////////////////////////////////////////////////////////////////////////

/// Allows for conversion of a Rust [`str`] into a [`Name`]. The passed
/// string must be strictly ASCII. A trailing dot is optional, and both
/// the empty string and `.` denote the root. Escape sequences as
/// defined by [RFC 4343 § 2.1] are supported.
///
/// [RFC 4343 § 2.1]: https://datatracker.ietf.org/doc/html/rfc4343#section-2.1
impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }

        let mut remaining_octets: &[u8] = s.as_ref();
        let mut labels: Vec<Vec<u8>> = vec![Vec::new()];
        while let Some(&octet) = remaining_octets.first() {
            // NOTE: the unwrap()s are okay, since labels is never empty.
            if octet == b'\\' {
                let (value, consumed) = parse_escape(&remaining_octets[1..])?;
                labels.last_mut().unwrap().push(value);
                remaining_octets = &remaining_octets[consumed + 1..];
            } else if octet == b'.' {
                if labels.last().unwrap().is_empty() {
                    return Err(Error::EmptyLabel);
                }
                labels.push(Vec::new());
                remaining_octets = &remaining_octets[1..];
            } else if !octet.is_ascii() {
                return Err(Error::StrNotAscii);
            } else {
                labels.last_mut().unwrap().push(octet);
                remaining_octets = &remaining_octets[1..];
            }
        }

        // A trailing dot leaves an empty final label behind.
        if labels.last().map_or(false, Vec::is_empty) {
            labels.pop();
        }
        Self::from_labels(labels.iter().map(Vec::as_slice))
    }
}

/// Parses an escape sequence. We expect `remaining_octets` to start
/// with the octet immediately *after* the backslash that introduces the
/// escape sequence.
fn parse_escape(remaining_octets: &[u8]) -> Result<(u8, usize), Error> {
    if remaining_octets.is_empty() {
        Err(Error::InvalidEscape)
    } else if remaining_octets[0].is_ascii_digit() {
        if remaining_octets.len() < 3
            || !remaining_octets[1].is_ascii_digit()
            || !remaining_octets[2].is_ascii_digit()
        {
            Err(Error::InvalidEscape)
        } else {
            let hundreds = (remaining_octets[0] - b'0') as usize;
            let tens = (remaining_octets[1] - b'0') as usize;
            let ones = (remaining_octets[2] - b'0') as usize;
            let value = 100 * hundreds + 10 * tens + ones;
            if value > 255 {
                Err(Error::InvalidEscape)
            } else {
                Ok((value as u8, 3))
            }
        }
    } else {
        Ok((remaining_octets[0], 1))
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
