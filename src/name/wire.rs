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

//! Implementation of parsing of on-the-wire names.

use arrayvec::ArrayVec;

use super::{Error, LabelBuf, Name, MAX_LABEL_LEN, MAX_N_LABELS, MAX_POINTER_HOPS, MAX_WIRE_LEN};

////////////////////////////////////////////////////////////////////////
// PARSING OF COMPRESSED ON-THE-WIRE NAMES                            //
////////////////////////////////////////////////////////////////////////

/// Parses a compressed name starting at index `start` of `octets`.
/// Pointers are followed. Indices given in pointers are treated as
/// indices of `octets`, so the intention is for an entire DNS message
/// to be passed in `octets`. This is the implementation of
/// [`Name::try_from_compressed`].
///
/// Since the message is untrusted, pointer chasing is an explicit loop
/// rather than recursion. Every pointer target is remembered; landing
/// on a target a second time means the pointers form a cycle, and the
/// walk also gives up after [`MAX_POINTER_HOPS`] pointers. Forward
/// pointers are tolerated as long as they do not loop.
pub fn parse_compressed_name(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
    let mut labels = ArrayVec::<LabelBuf, MAX_N_LABELS>::new();
    let mut visited = ArrayVec::<usize, MAX_POINTER_HOPS>::new();
    let mut wire_len = 1;
    let mut wire_len_of_first_chunk = None;
    let mut index = start;

    loop {
        let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
        if len & 0xc0 == 0xc0 {
            let target = parse_pointer(octets, index)?;
            wire_len_of_first_chunk.get_or_insert_with(|| index + 2 - start);
            if visited.contains(&target) || visited.try_push(target).is_err() {
                return Err(Error::CompressionLoop);
            }
            index = target;
        } else if len as usize > MAX_LABEL_LEN {
            // 0x40 and 0x80 are reserved label types.
            return Err(Error::InvalidLabel);
        } else if len == 0 {
            wire_len_of_first_chunk.get_or_insert_with(|| index + 1 - start);
            break;
        } else {
            let end_of_label = index + 1 + len as usize;
            let label = octets
                .get(index + 1..end_of_label)
                .ok_or(Error::UnexpectedEom)?;
            if label.contains(&0) {
                return Err(Error::InvalidLabel);
            }
            wire_len += len as usize + 1;
            if wire_len > MAX_WIRE_LEN {
                return Err(Error::NameTooLong);
            }
            // The wire length check above keeps us below MAX_N_LABELS.
            labels.push(LabelBuf::try_from(label)?);
            index = end_of_label;
        }
    }

    // NOTE: the unwrap() is okay, since the loop only exits after
    // setting wire_len_of_first_chunk.
    let name = Name {
        labels: labels.into_iter().collect(),
    };
    Ok((name, wire_len_of_first_chunk.unwrap()))
}

/// Parses a pointer at `index` in `octets`, returning its target. The
/// target must lie within `octets`.
fn parse_pointer(octets: &[u8], index: usize) -> Result<usize, Error> {
    match octets.get(index..index + 2) {
        Some(pointer_bytes) => {
            let pointer = u16::from_be_bytes([pointer_bytes[0], pointer_bytes[1]]) & !0xc000;
            let target = pointer as usize;
            if target < octets.len() {
                Ok(target)
            } else {
                Err(Error::InvalidPointer)
            }
        }
        None => Err(Error::UnexpectedEom),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_uncompressed_names() {
        let octets = b"junk\x03dns\x06google\x00junk";
        let (name, len) = parse_compressed_name(octets, 4).unwrap();
        assert_eq!(name.to_string(), "dns.google");
        assert_eq!(len, 12);
    }

    #[test]
    fn parses_root() {
        let (name, len) = parse_compressed_name(b"\x00", 0).unwrap();
        assert!(name.is_root());
        assert_eq!(len, 1);
    }

    #[test]
    fn pointer_counts_as_two_octets() {
        let octets = b"junk\x04test\x00junk\x07example\xc0\x04junk";
        let (name, len) = parse_compressed_name(octets, 14).unwrap();
        assert_eq!(name, "example.test".parse().unwrap());
        assert_eq!(len, 10);

        // A name that is nothing but a pointer.
        let (name, len) = parse_compressed_name(octets, 22).unwrap();
        assert_eq!(name, "test".parse().unwrap());
        assert_eq!(len, 2);
    }

    #[test]
    fn follows_pointer_chains() {
        // "c" at 0, "b" + ptr(0) at 3, "a" + ptr(3) at 7.
        let octets = b"\x01c\x00\x01b\xc0\x00\x01a\xc0\x03";
        let (name, len) = parse_compressed_name(octets, 7).unwrap();
        assert_eq!(name.to_string(), "a.b.c");
        assert_eq!(len, 4);
    }

    #[test]
    fn backward_pointers_from_later_names() {
        // The second name starts after its pointer target, as an answer
        // owner pointing back at the question name does.
        let octets = b"\x01c\x00junk\x01a\xc0\x00";
        let (name, len) = parse_compressed_name(octets, 7).unwrap();
        assert_eq!(name.to_string(), "a.c");
        assert_eq!(len, 4);

        let (name, len) = parse_compressed_name(b"junk\x01c\x00\xc0\x04", 7).unwrap();
        assert_eq!(name.to_string(), "c");
        assert_eq!(len, 2);
    }

    #[test]
    fn accepts_acyclic_forward_pointers() {
        let octets = b"\x01x\xc0\x04\x01y\x00";
        let (name, len) = parse_compressed_name(octets, 0).unwrap();
        assert_eq!(name.to_string(), "x.y");
        assert_eq!(len, 4);
    }

    #[test]
    fn rejects_self_pointer() {
        assert_eq!(
            parse_compressed_name(b"\xc0\x00", 0),
            Err(Error::CompressionLoop)
        );
    }

    #[test]
    fn rejects_pointer_cycles() {
        assert_eq!(
            parse_compressed_name(b"\x01a\x01b\xc0\x00", 2),
            Err(Error::CompressionLoop)
        );
        assert_eq!(
            parse_compressed_name(b"\xc0\x02\xc0\x00", 0),
            Err(Error::CompressionLoop)
        );
    }

    #[test]
    fn rejects_excessive_pointer_hops() {
        // 200 pointers, each pointing to the next, ending in the root.
        let mut octets = Vec::new();
        for i in 1..=200u16 {
            octets.extend_from_slice(&(0xc000 | (2 * i)).to_be_bytes());
        }
        octets.push(0);
        assert_eq!(
            parse_compressed_name(&octets, 0),
            Err(Error::CompressionLoop)
        );
    }

    #[test]
    fn rejects_out_of_range_pointers() {
        assert_eq!(
            parse_compressed_name(b"\x01x\xc0\x40", 0),
            Err(Error::InvalidPointer)
        );
    }

    #[test]
    fn rejects_embedded_null_octets() {
        assert_eq!(
            parse_compressed_name(b"\x04ab\x00c\x00", 0),
            Err(Error::InvalidLabel)
        );
    }

    #[test]
    fn rejects_reserved_label_types() {
        assert_eq!(
            parse_compressed_name(b"\x40xxxx\x00", 0),
            Err(Error::InvalidLabel)
        );
        assert_eq!(
            parse_compressed_name(b"\x80xxxx\x00", 0),
            Err(Error::InvalidLabel)
        );
    }

    #[test]
    fn rejects_long_names() {
        let mut octets = Vec::new();
        for _ in 0..MAX_N_LABELS {
            octets.extend_from_slice(b"\x01x");
        }
        octets.push(0);
        assert_eq!(
            parse_compressed_name(&octets, 0),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn rejects_long_names_assembled_through_pointers() {
        // 100 labels, then 40 more labels pointing back at the first 100.
        let mut octets = Vec::new();
        for _ in 0..100 {
            octets.extend_from_slice(b"\x01x");
        }
        octets.push(0);
        let start = octets.len();
        for _ in 0..40 {
            octets.extend_from_slice(b"\x01y");
        }
        octets.extend_from_slice(b"\xc0\x00");
        assert_eq!(
            parse_compressed_name(&octets, start),
            Err(Error::NameTooLong)
        );
    }

    #[test]
    fn rejects_unexpected_eom() {
        assert_eq!(
            parse_compressed_name(b"\x07example\x04tes", 0),
            Err(Error::UnexpectedEom)
        );
        assert_eq!(
            parse_compressed_name(b"\x07example", 0),
            Err(Error::UnexpectedEom)
        );
        assert_eq!(
            parse_compressed_name(b"\x01x\xc0", 0),
            Err(Error::UnexpectedEom)
        );
    }
}
