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

//! [`Display`](fmt::Display) implementation for [`Record`].

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::{Record, Type};
use crate::class::Class;
use crate::util::write_hex;

/// Records are displayed in zone-file style: owner, TTL, class, type,
/// and RDATA. Only IN-class A and AAAA RDATA are decoded, since other
/// RDATA may hold names compressed against a message we no longer
/// have. Everything else uses the RFC 3597 format for RDATA of unknown
/// type.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} ",
            self.owner, self.ttl, self.class, self.rr_type
        )?;
        if self.class == Class::IN {
            if self.rr_type == Type::A {
                if let Ok(octets) = <[u8; 4]>::try_from(&self.rdata[..]) {
                    return write!(f, "{}", Ipv4Addr::from(octets));
                }
            } else if self.rr_type == Type::AAAA {
                if let Ok(octets) = <[u8; 16]>::try_from(&self.rdata[..]) {
                    return write!(f, "{}", Ipv6Addr::from(octets));
                }
            }
        }
        write!(f, "\\# {}", self.rdata.len())?;
        if !self.rdata.is_empty() {
            f.write_str(" ")?;
            write_hex(f, &self.rdata)?;
        }
        Ok(())
    }
}
