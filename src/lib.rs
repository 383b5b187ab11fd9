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

//! A forwarding DNS proxy.
//!
//! The proxy receives DNS queries over UDP, relays them unmodified to an
//! upstream resolver, and relays the resolver's answers back to the
//! clients that asked. Along the way it caches every record it sees in
//! the answers, in a tree indexed by domain name.
//!
//! The crate is organized in layers:
//!
//! * [`name`], [`class`], [`rr`], and [`message`] implement the DNS
//!   wire format, including name compression;
//! * [`cache`] implements the record cache;
//! * [`server`] decides what to do with each datagram; and
//! * [`io`] and [`thread`] run a [`Server`](server::Server) on a UDP
//!   socket.

pub mod cache;
pub mod class;
pub mod io;
pub mod message;
pub mod name;
pub mod rr;
pub mod server;
pub mod thread;
mod util;
