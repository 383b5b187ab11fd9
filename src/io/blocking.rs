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

//! Implementation of the blocking I/O provider.

// NOTE: An I/O error on receive ends the ingress task, which the thread
// group then respawns (after a delay if the last respawn was recent),
// so a persistently failing socket cannot eat all CPU time. Send errors
// never end a task; they are logged and the datagram is lost.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};

use super::socket::{UdpSocket, UdpSocketApi};
use crate::message::MAX_UDP_MESSAGE_SIZE;
use crate::server::{Action, Error, Server};
use crate::thread::{BoundedQueue, ThreadGroup};

/// A blocking I/O provider.
///
/// The provider runs two threads in a [`ThreadGroup`]. The *ingress*
/// thread receives datagrams and puts them into a [`BoundedQueue`];
/// when the queue is full, it stops receiving until there is room. The
/// *dispatch* thread takes datagrams from the queue one at a time,
/// passes them to the [`Server`], and sends what the server asks for.
///
/// To stop the provider, shut down the [`ThreadGroup`] it was started
/// in. The queue is closed at once; the ingress thread notices within
/// [`BlockingIoConfig::receive_timeout`], and the dispatch thread exits
/// once the queue is drained.
pub struct BlockingIoProvider {
    config: BlockingIoConfig,
    socket: UdpSocket,
}

/// Configuration options for the [`BlockingIoProvider`].
#[derive(Clone, Debug)]
pub struct BlockingIoConfig {
    /// How many received datagrams may wait for dispatch.
    pub queue_capacity: usize,

    /// How long a receive may block before the ingress thread checks
    /// for shutdown.
    pub receive_timeout: Duration,
}

impl Default for BlockingIoConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            receive_timeout: Duration::from_secs(1),
        }
    }
}

/// A datagram waiting in the queue between the two stages.
#[derive(Debug)]
struct Datagram {
    source: SocketAddr,
    octets: Vec<u8>,
}

/// One octet more than the largest datagram we accept, so that longer
/// datagrams show up as such instead of being silently cut short.
const RECEIVE_BUFFER_SIZE: usize = MAX_UDP_MESSAGE_SIZE + 1;

impl BlockingIoProvider {
    /// Creates a new `BlockingIoProvider`. This call binds the UDP
    /// socket, but does not start the proxy.
    pub fn bind(config: BlockingIoConfig, addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(config.receive_timeout))?;
        Ok(Self { config, socket })
    }

    /// Returns the address the provider's socket is bound to. This is
    /// useful after binding to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Starts the proxy on the provided [`ThreadGroup`].
    pub fn start(
        self,
        server: &Arc<Server>,
        group: &Arc<ThreadGroup>,
    ) -> Result<(), crate::thread::Error> {
        let queue = Arc::new(BoundedQueue::new(self.config.queue_capacity));
        let queue_clone = queue.clone();
        group.on_shutdown(move || queue_clone.close());

        let group_clone = group.clone();
        let socket = self.socket.clone();
        let ingress_queue = queue.clone();
        group.start_respawnable("ingress", move || {
            log_io_errors(run_ingress(&group_clone, socket.clone(), &ingress_queue));
        })?;

        let server = server.clone();
        let socket = self.socket;
        group.start_respawnable("dispatch", move || {
            run_dispatch(&server, socket.clone(), &queue);
        })
    }
}

/// The ingress loop: receive a datagram, queue it, repeat.
fn run_ingress(
    group: &ThreadGroup,
    mut socket: UdpSocket,
    queue: &BoundedQueue<Datagram>,
) -> io::Result<()> {
    let mut buf = [0; RECEIVE_BUFFER_SIZE];
    loop {
        if group.is_shutting_down() {
            return Ok(());
        }

        // On a timeout or interruption we go back to checking for
        // shutdown before receiving again.
        let (len, source) = match socket.recv(&mut buf) {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let datagram = match accept_datagram(&buf[..len], source) {
            Some(datagram) => datagram,
            None => continue,
        };
        if queue.put(datagram).is_err() {
            // Closed: the group is shutting down.
            return Ok(());
        }
    }
}

/// Wraps the received `octets` for the queue, or drops them if they are
/// longer than a classic UDP DNS message. Such datagrams would arrive
/// truncated and fail to decode; this tells them apart from garbage.
fn accept_datagram(octets: &[u8], source: SocketAddr) -> Option<Datagram> {
    if octets.len() > MAX_UDP_MESSAGE_SIZE {
        warn!(
            "Dropped datagram from {}: longer than {} octets",
            source, MAX_UDP_MESSAGE_SIZE
        );
        None
    } else {
        Some(Datagram {
            source,
            octets: octets.to_vec(),
        })
    }
}

/// The dispatch loop: take a datagram, let the server handle it, send
/// what it asks for. Returns once the queue is closed and drained.
fn run_dispatch(server: &Server, mut socket: UdpSocket, queue: &BoundedQueue<Datagram>) {
    while let Some(Datagram { source, octets }) = queue.take() {
        match server.handle_datagram(source, &octets) {
            Ok(Action::Forward { upstream, key }) => {
                if let Err(e) = retry_if_interrupted(|| socket.send(&octets, upstream)) {
                    warn!("Dropped query from {}: {}", source, server.forward_failed(key, e));
                }
            }
            Ok(Action::Relay { client }) => {
                if let Err(e) = retry_if_interrupted(|| socket.send(&octets, client)) {
                    warn!("Failed to relay answer to {}: {}", client, e);
                }
            }
            Ok(Action::Cached) => (),
            Err(e @ Error::CapacityExceeded) => warn!("Dropped query from {}: {}", source, e),
            Err(e) => debug!("Dropped datagram from {}: {}", source, e),
        }
    }
}

/// Executes `f`, retrying the operation if it is interrupted.
fn retry_if_interrupted<F, R>(mut f: F) -> io::Result<R>
where
    F: FnMut() -> io::Result<R>,
{
    loop {
        match f() {
            Ok(r) => return Ok(r),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Logs errors if a task exits with an I/O error.
fn log_io_errors<T>(result: io::Result<T>) {
    if let Err(e) = result {
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("anonymous thread");
        error!("I/O error in thread {}: {}", thread_name, e);
    }
}
