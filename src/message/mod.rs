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

//! Implementation of decoding and encoding of DNS messages.

mod codes;
mod constants;
mod error;
mod header;
mod packet;
mod question;
pub mod reader;
pub use codes::{Opcode, Rcode};
pub use constants::MAX_UDP_MESSAGE_SIZE;
pub use error::{Error, Result};
pub use header::Header;
pub use packet::Packet;
pub use question::{Qclass, Qtype, Question};
pub use reader::Reader;
