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

//! Implementation of the [`Error`] type for message decoding.

use std::fmt;

use crate::name;

/// An error signaling that a DNS message could not be decoded.
///
/// Decoding is all-or-nothing: any of these aborts the whole message,
/// and no partially decoded message is ever returned.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// The message is shorter than the 12-octet header.
    TooShort,

    /// The section counts in the header do not describe the data that
    /// follows: the message ends inside a declared question or record,
    /// or data is left over after the last one.
    CountMismatch,

    /// A label is malformed (an embedded null octet or a reserved label
    /// type).
    InvalidLabel,

    /// A name is longer than 255 octets once decompressed.
    NameTooLong,

    /// Compression pointers form a loop.
    CompressionLoop,

    /// A compression pointer refers to an offset outside the message.
    InvalidPointer,
}

impl From<name::Error> for Error {
    fn from(err: name::Error) -> Self {
        match err {
            name::Error::UnexpectedEom => Self::CountMismatch,
            name::Error::NameTooLong => Self::NameTooLong,
            name::Error::CompressionLoop => Self::CompressionLoop,
            name::Error::InvalidPointer => Self::InvalidPointer,
            name::Error::InvalidLabel
            | name::Error::LabelTooLong
            | name::Error::EmptyLabel
            | name::Error::InvalidEscape
            | name::Error::StrNotAscii => Self::InvalidLabel,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::TooShort => f.write_str("message is shorter than a DNS header"),
            Self::CountMismatch => f.write_str("section counts do not match message contents"),
            Self::InvalidLabel => f.write_str("invalid label in name"),
            Self::NameTooLong => f.write_str("name is longer than 255 octets"),
            Self::CompressionLoop => f.write_str("compression pointers form a loop"),
            Self::InvalidPointer => f.write_str("compression pointer is out of range"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by fallible decoding functions.
pub type Result<T> = std::result::Result<T, Error>;
