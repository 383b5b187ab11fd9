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

//! The dispatch logic of the forwarding proxy.
//!
//! The [`Server`] structure is the heart of this module; see its
//! documentation for details.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::cache::DomainCache;
use crate::message::{self, Header, Packet};

mod inflight;
pub use inflight::{CapacityExceeded, InflightTable, Pending};

////////////////////////////////////////////////////////////////////////
// SERVER                                                             //
////////////////////////////////////////////////////////////////////////

/// A forwarding DNS proxy, abstracted from any underlying network I/O
/// provider.
///
/// Every datagram the proxy receives is handed to
/// [`Server::handle_datagram`]. A datagram whose source IP address is
/// that of the configured upstream resolver is an answer, whatever its
/// source port; anything else is a query.
///
/// * Queries are remembered in an [`InflightTable`] and forwarded
///   upstream unmodified.
/// * Answers are cached in the [`DomainCache`], then relayed unmodified
///   to the client whose pending query has the same transaction ID.
///
/// The `Server` decides; the I/O provider sends, as directed by the
/// returned [`Action`]. Datagrams that do not decode are dropped, and
/// the proxy never makes up a response of its own.
pub struct Server {
    upstream: SocketAddr,
    cache: RwLock<DomainCache>,
    inflight: Mutex<InflightTable>,
}

/// What the I/O provider should do with a datagram after
/// [`Server::handle_datagram`] accepted it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Send the datagram, unmodified, to `upstream`. If that fails,
    /// report it through [`Server::forward_failed`] with `key`.
    Forward { upstream: SocketAddr, key: usize },

    /// Send the datagram, unmodified, to `client`.
    Relay { client: SocketAddr },

    /// The datagram was an answer that matched no pending query. Its
    /// records were cached; nothing is to be sent.
    Cached,
}

impl Server {
    /// Creates a new `Server` forwarding to `upstream`, with room for
    /// `inflight_capacity` pending queries that expire after
    /// `request_timeout` (or never, if `None`).
    pub fn new(
        upstream: SocketAddr,
        inflight_capacity: usize,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            upstream,
            cache: RwLock::new(DomainCache::new()),
            inflight: Mutex::new(InflightTable::new(inflight_capacity, request_timeout)),
        }
    }

    /// Returns the address of the upstream resolver.
    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    /// Returns read access to the record cache.
    pub fn cache(&self) -> RwLockReadGuard<DomainCache> {
        self.cache.read().unwrap()
    }

    /// Returns the number of queries awaiting an answer.
    pub fn pending_count(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }

    /// Handles a datagram of `octets` received from `source`.
    pub fn handle_datagram(&self, source: SocketAddr, octets: &[u8]) -> Result<Action, Error> {
        let packet = match Packet::decode(octets) {
            Ok(packet) => packet,
            Err(err) => {
                if let Ok(id) = Header::peek_id(octets) {
                    debug!("Message {} from {} does not decode: {}", id, source, err);
                }
                return Err(err.into());
            }
        };
        trace!("Datagram from {}:\n{}", source, packet);

        if source.ip() == self.upstream.ip() {
            self.handle_answer(&packet)
        } else {
            self.handle_query(source, &packet)
        }
    }

    fn handle_answer(&self, packet: &Packet) -> Result<Action, Error> {
        let cached = self.cache.write().unwrap().cache_packet(packet);
        debug!("Cached {} records from answer {}", cached, packet.header.id);

        match self.inflight.lock().unwrap().take_by_id(packet.header.id) {
            Some(pending) => Ok(Action::Relay {
                client: pending.client,
            }),
            None => {
                debug!("Answer {} matches no pending query", packet.header.id);
                Ok(Action::Cached)
            }
        }
    }

    fn handle_query(&self, client: SocketAddr, packet: &Packet) -> Result<Action, Error> {
        let now = Instant::now();
        let mut inflight = self.inflight.lock().unwrap();
        let expired = inflight.sweep_expired(now);
        if expired > 0 {
            debug!("Dropped {} pending queries that timed out", expired);
        }

        if inflight.is_full() {
            debug!(
                "All {} in-flight slots are taken; dropping query {} from {}",
                inflight.capacity(),
                packet.header.id,
                client,
            );
        }
        let key = inflight.insert(Pending {
            client,
            id: packet.header.id,
            forwarded_at: now,
        })?;
        Ok(Action::Forward {
            upstream: self.upstream,
            key,
        })
    }

    /// Rolls back the pending query `key` after its [`Action::Forward`]
    /// could not be sent. Returns the corresponding error for the
    /// caller to report.
    pub fn forward_failed(&self, key: usize, err: io::Error) -> Error {
        self.inflight.lock().unwrap().remove(key);
        Error::UpstreamUnreachable(err)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// The ways a datagram can fail to be handled. None of them is fatal:
/// each affects only the datagram at hand.
#[derive(Debug)]
pub enum Error {
    /// The datagram is not a well-formed DNS message.
    Malformed(message::Error),

    /// The query was dropped because too many queries are pending.
    CapacityExceeded,

    /// The query could not be sent to the upstream resolver.
    UpstreamUnreachable(io::Error),
}

impl From<message::Error> for Error {
    fn from(err: message::Error) -> Self {
        Self::Malformed(err)
    }
}

impl From<CapacityExceeded> for Error {
    fn from(_: CapacityExceeded) -> Self {
        Self::CapacityExceeded
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Malformed(err) => write!(f, "malformed message: {}", err),
            Self::CapacityExceeded => f.write_str("too many pending queries"),
            Self::UpstreamUnreachable(err) => write!(f, "upstream unreachable: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::CapacityExceeded => None,
            Self::UpstreamUnreachable(err) => Some(err),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
