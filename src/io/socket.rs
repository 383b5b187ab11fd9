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

//! The UDP socket used by the I/O providers.

use std::io;
use std::net::{self, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// The API that the provider's [`UdpSocket`] must implement.
pub(crate) trait UdpSocketApi: Clone + Sized {
    /// Creates a new UDP socket bound to the provided address.
    fn bind(addr: SocketAddr) -> io::Result<Self>;

    /// Returns the address the socket is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Sets the read timeout of the socket.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Receives a datagram, returning its length and source.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Sends a datagram.
    fn send(&mut self, buf: &[u8], dest: SocketAddr) -> io::Result<usize>;
}

/// A UDP socket implementation using the Rust standard library. Clones
/// share the same underlying socket.
#[derive(Clone, Debug)]
pub(crate) struct UdpSocket(Arc<net::UdpSocket>);

impl UdpSocketApi for UdpSocket {
    fn bind(addr: SocketAddr) -> io::Result<Self> {
        net::UdpSocket::bind(addr).map(Arc::new).map(Self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.0.local_addr()
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.0.set_read_timeout(timeout)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.0.recv_from(buf)
    }

    fn send(&mut self, buf: &[u8], dest: SocketAddr) -> io::Result<usize> {
        self.0.send_to(buf, dest)
    }
}
