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

//! Crate-private utilities.

/// Converts a nibble into an ASCII hex character. Lower-case hex digits
/// are used. The passed value must be less than 16.
pub fn nibble_to_ascii_hex_digit(nibble: u8) -> u8 {
    assert!(nibble < 16);
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' + nibble - 10
    }
}

/// Writes `octets` as a string of lower-case hex digits.
pub fn write_hex(f: &mut std::fmt::Formatter, octets: &[u8]) -> std::fmt::Result {
    use std::fmt::Write;
    for octet in octets {
        f.write_char(char::from(nibble_to_ascii_hex_digit((octet & 0xf0) >> 4)))?;
        f.write_char(char::from(nibble_to_ascii_hex_digit(octet & 0xf)))?;
    }
    Ok(())
}
