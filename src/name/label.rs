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

//! Implementation of the [`LabelBuf`] type.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::{Error, MAX_LABEL_LEN};

/// An owned label: one node's segment of a domain name.
///
/// `LabelBuf` stores up to 63 octets inline, so that labels can be used
/// as hash map keys in the [cache tree](crate::cache) without a
/// separate heap allocation per label. It is constructed through its
/// [`TryFrom`] implementation, which rejects octet strings longer than
/// 63 octets:
///
/// ```
/// use std::convert::TryFrom;
/// use dnsrelay::name::LabelBuf;
///
/// let label = LabelBuf::try_from(&b"com"[..]).unwrap();
/// assert_eq!(label.octets(), b"com");
/// ```
///
/// Unlike in an authoritative server, labels here are compared
/// byte-for-byte: `Example` and `example` are different labels. The
/// proxy caches exactly what it observes on the wire.
///
/// `LabelBuf` implements [`Borrow<[u8]>`](Borrow), so maps keyed by
/// `LabelBuf` can be queried with plain octet slices.
#[derive(Clone, Copy)]
pub struct LabelBuf {
    len: u8,
    data: [u8; MAX_LABEL_LEN],
}

#[allow(clippy::len_without_is_empty)] // Following DNS terminology, we have is_null().
impl LabelBuf {
    /// Returns the null (empty) label, which labels the DNS root.
    pub const fn null() -> Self {
        Self {
            len: 0,
            data: [0; MAX_LABEL_LEN],
        }
    }

    /// Returns whether this is the null label.
    pub fn is_null(&self) -> bool {
        self.len == 0
    }

    /// Returns the length of the label in octets.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns the octets of the label.
    pub fn octets(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl TryFrom<&[u8]> for LabelBuf {
    type Error = Error;

    fn try_from(octets: &[u8]) -> Result<Self, Self::Error> {
        if octets.len() > MAX_LABEL_LEN {
            Err(Error::LabelTooLong)
        } else {
            let mut buf = Self::null();
            buf.len = octets.len() as u8;
            buf.data[..octets.len()].copy_from_slice(octets);
            Ok(buf)
        }
    }
}

impl Borrow<[u8]> for LabelBuf {
    fn borrow(&self) -> &[u8] {
        self.octets()
    }
}

/// Labels are displayed in the presentation format:
///
/// * Periods are escaped `\.`;
/// * backslashes are escaped `\\`;
/// * all other ASCII graphic characters are not escaped; and
/// * all other octets are escaped `\xyz`, where `xyz` is the
///   three-digit zero-padded decimal representation of the octet.
impl fmt::Display for LabelBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for octet in self.octets() {
            if *octet == b'.' {
                f.write_str("\\.")?;
            } else if *octet == b'\\' {
                f.write_str("\\\\")?;
            } else if octet.is_ascii_graphic() {
                write!(f, "{}", *octet as char)?;
            } else {
                write!(f, "\\{:03}", *octet)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for LabelBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl PartialEq for LabelBuf {
    fn eq(&self, other: &Self) -> bool {
        self.octets() == other.octets()
    }
}

impl Eq for LabelBuf {}

impl PartialOrd for LabelBuf {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LabelBuf {
    fn cmp(&self, other: &Self) -> Ordering {
        self.octets().cmp(other.octets())
    }
}

/// Hashes exactly like the `[u8]` it borrows as, which [`Borrow`]
/// requires.
impl Hash for LabelBuf {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.octets().hash(state)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
