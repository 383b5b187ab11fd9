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

//! End-to-end tests of the proxy over loopback UDP sockets.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use dnsrelay::io::{BlockingIoConfig, BlockingIoProvider};
use dnsrelay::message::Packet;
use dnsrelay::server::Server;
use dnsrelay::thread::ThreadGroup;

const TIMEOUT: Duration = Duration::from_secs(5);

/// A query for dns.google. IN A.
const QUERY: &[u8] = b"\xab\xcd\x01\x00\x00\x01\x00\x00\x00\x00\x00\x00\
    \x03dns\x06google\x00\x00\x01\x00\x01";

/// The answer to [`QUERY`], with a compressed owner.
const ANSWER: &[u8] = b"\xab\xcd\x81\x80\x00\x01\x00\x02\x00\x00\x00\x00\
    \x03dns\x06google\x00\x00\x01\x00\x01\
    \xc0\x0c\x00\x01\x00\x01\x00\x00\x03\x84\x00\x04\x08\x08\x08\x08\
    \xc0\x0c\x00\x01\x00\x01\x00\x00\x03\x84\x00\x04\x08\x08\x04\x04";

/// Returns `message` with its transaction ID replaced by `id`.
fn with_id(message: &[u8], id: u16) -> Vec<u8> {
    let mut octets = message.to_vec();
    octets[..2].copy_from_slice(&id.to_be_bytes());
    octets
}

struct Harness {
    proxy: SocketAddr,
    upstream: UdpSocket,
    client: UdpSocket,
    server: Arc<Server>,
    group: Arc<ThreadGroup>,
}

impl Harness {
    fn start() -> Self {
        Self::start_with(10, 10)
    }

    fn start_with(queue_capacity: usize, inflight_capacity: usize) -> Self {
        // Answers are recognized by the upstream's IP address, so the
        // fake upstream needs an address of its own.
        let upstream = bind_loopback([127, 0, 0, 2]);
        let config = BlockingIoConfig {
            queue_capacity,
            receive_timeout: Duration::from_millis(100),
        };
        let provider = BlockingIoProvider::bind(config, ([127, 0, 0, 1], 0).into()).unwrap();
        let proxy = provider.local_addr().unwrap();
        let server = Arc::new(Server::new(
            upstream.local_addr().unwrap(),
            inflight_capacity,
            Some(TIMEOUT),
        ));
        let group = ThreadGroup::new();
        provider.start(&server, &group).unwrap();
        Self {
            proxy,
            upstream,
            client: bind_loopback([127, 0, 0, 1]),
            server,
            group,
        }
    }

    fn stop(self) {
        self.group.shut_down();
        self.group.await_shutdown();
    }
}

fn bind_loopback(ip: [u8; 4]) -> UdpSocket {
    let socket = UdpSocket::bind(SocketAddr::from((ip, 0))).unwrap();
    socket.set_read_timeout(Some(TIMEOUT)).unwrap();
    socket
}

fn recv(socket: &UdpSocket) -> (Vec<u8>, SocketAddr) {
    let mut buf = [0; 512];
    let (len, source) = socket.recv_from(&mut buf).unwrap();
    (buf[..len].to_vec(), source)
}

#[test]
fn query_is_forwarded_and_answer_relayed_and_cached() {
    let harness = Harness::start();

    harness.client.send_to(QUERY, harness.proxy).unwrap();
    let (forwarded, source) = recv(&harness.upstream);
    assert_eq!(forwarded, QUERY);
    assert_eq!(source, harness.proxy);

    harness.upstream.send_to(ANSWER, harness.proxy).unwrap();
    let (relayed, source) = recv(&harness.client);
    assert_eq!(relayed, ANSWER);
    assert_eq!(source, harness.proxy);

    {
        let cache = harness.server.cache();
        let node = cache.lookup_str("dns.google.").unwrap();
        let addresses: Vec<&[u8]> = node.records().iter().map(|r| &r.rdata[..]).collect();
        assert_eq!(addresses, [&[8, 8, 8, 8][..], &[8, 8, 4, 4][..]]);
    }
    assert_eq!(harness.server.pending_count(), 0);
    harness.stop();
}

#[test]
fn malformed_datagrams_are_dropped() {
    let harness = Harness::start();

    harness.client.send_to(b"\x00\x01\x02", harness.proxy).unwrap();
    let mut truncated = QUERY.to_vec();
    truncated.truncate(QUERY.len() - 2);
    harness.client.send_to(&truncated, harness.proxy).unwrap();
    harness.client.send_to(QUERY, harness.proxy).unwrap();

    // Only the well-formed query comes through.
    let (forwarded, _) = recv(&harness.upstream);
    assert_eq!(Packet::decode(&forwarded).unwrap().header.id, 0xabcd);
    assert_eq!(forwarded, QUERY);
    assert_eq!(harness.server.pending_count(), 1);
    harness.stop();
}

#[test]
fn unsolicited_answer_is_cached_but_not_relayed() {
    let harness = Harness::start();

    harness.upstream.send_to(ANSWER, harness.proxy).unwrap();
    harness
        .client
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();

    // Follow with a query; once it reaches the upstream, the answer
    // before it has been handled.
    harness.client.send_to(QUERY, harness.proxy).unwrap();
    recv(&harness.upstream);
    assert!(harness.server.cache().lookup_str("dns.google").is_some());

    let mut buf = [0; 512];
    assert!(harness.client.recv_from(&mut buf).is_err());
    harness.stop();
}

#[test]
fn burst_larger_than_queue_is_forwarded_in_full() {
    // Ingress waits for room in the one-slot queue instead of dropping.
    let harness = Harness::start_with(1, 64);
    for id in 0..40 {
        harness.client.send_to(&with_id(QUERY, id), harness.proxy).unwrap();
    }

    let mut ids: Vec<u16> = (0..40)
        .map(|_| {
            let (forwarded, _) = recv(&harness.upstream);
            Packet::decode(&forwarded).unwrap().header.id
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..40).collect::<Vec<u16>>());
    assert_eq!(harness.server.pending_count(), 40);
    harness.stop();
}

#[test]
fn full_inflight_table_drops_query_but_keeps_relaying() {
    let harness = Harness::start_with(10, 2);

    for id in [1, 2] {
        harness.client.send_to(&with_id(QUERY, id), harness.proxy).unwrap();
        let (forwarded, _) = recv(&harness.upstream);
        assert_eq!(forwarded, with_id(QUERY, id));
    }

    // No slot is left for this one.
    harness.client.send_to(&with_id(QUERY, 3), harness.proxy).unwrap();

    // The dispatch stage is not stuck: an answer to an earlier query
    // still gets through.
    let answer = with_id(ANSWER, 1);
    harness.upstream.send_to(&answer, harness.proxy).unwrap();
    let (relayed, _) = recv(&harness.client);
    assert_eq!(relayed, answer);

    // Datagrams are dispatched in order, so the dropped query was
    // handled before the answer and never reached the upstream.
    harness
        .upstream
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();
    let mut buf = [0; 512];
    assert!(harness.upstream.recv_from(&mut buf).is_err());
    assert_eq!(harness.server.pending_count(), 1);
    harness.stop();
}
