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

//! A passive cache of the resource records seen in upstream answers.
//!
//! Records are stored in a tree of [`Node`]s, one per domain name,
//! keyed by label from the top-level label down. Above the DNS root sits
//! a sentinel super-root, so that every lookup is the same child walk.
//! Nodes are created on first insertion under a domain and are never
//! removed. There is no TTL bookkeeping and no deduplication: inserting
//! the same record twice stores it twice.

use std::fmt::Write;

use crate::class::Class;
use crate::message::Packet;
use crate::name::{LabelBuf, Name};
use crate::rr::{Record, Ttl, Type};

mod node;
pub use node::{Iter, Node};

/// The letters of the thirteen root name servers.
const ROOT_SERVER_LETTERS: &[u8; 13] = b"abcdefghijklm";

/// A domain-indexed record cache.
#[derive(Clone, Debug)]
pub struct DomainCache {
    super_root: Node,
}

impl DomainCache {
    /// Creates a cache whose root node is seeded with NS records for
    /// `a.root-servers.net` through `m.root-servers.net`.
    pub fn new() -> Self {
        let mut cache = Self {
            super_root: Node::new(Name::root()),
        };
        for &letter in ROOT_SERVER_LETTERS {
            cache.insert(root_hint(letter));
        }
        cache
    }

    /// Returns the root node of the tree.
    pub fn root(&self) -> &Node {
        // The root is created in new() and nodes are never removed.
        self.super_root
            .child(LabelBuf::null().octets())
            .unwrap_or(&self.super_root)
    }

    /// Inserts `record` at the node for its owner, creating that node
    /// and any missing ancestors.
    pub fn insert(&mut self, record: Record) {
        let mut node = self.super_root.child_or_insert(LabelBuf::null());
        for label in record.owner.labels().rev() {
            node = node.child_or_insert(*label);
        }
        node.add(record);
    }

    /// Inserts every answer, authority, and additional record of
    /// `packet`, skipping OPT pseudo-records. Returns the number of
    /// records inserted.
    pub fn cache_packet(&mut self, packet: &Packet) -> usize {
        let mut inserted = 0;
        for record in packet.records().filter(|r| r.rr_type != Type::OPT) {
            self.insert(record.clone());
            inserted += 1;
        }
        inserted
    }

    /// Finds the node for `name`. Returns `None` as soon as a label
    /// along the way has no node.
    pub fn lookup(&self, name: &Name) -> Option<&Node> {
        let mut node = self.super_root.child(LabelBuf::null().octets())?;
        for label in name.labels().rev() {
            node = node.child(label.octets())?;
        }
        Some(node)
    }

    /// Like [`DomainCache::lookup`], but takes a dotted name. A
    /// trailing dot is optional, and both `""` and `"."` find the root
    /// node. Returns `None` if `dotted` is not a valid name.
    pub fn lookup_str(&self, dotted: &str) -> Option<&Node> {
        let name: Name = dotted.parse().ok()?;
        self.lookup(&name)
    }

    /// Returns the number of nodes in the tree, counting the root but
    /// not the super-root.
    pub fn node_count(&self) -> usize {
        self.root().iter().count()
    }

    /// Returns the number of records in the tree, root hints included.
    pub fn record_count(&self) -> usize {
        self.root()
            .iter()
            .map(|node| node.ns_records().len() + node.records().len())
            .sum()
    }

    /// Returns a multi-line, human-readable description of every node
    /// in the tree.
    pub fn dump(&self) -> String {
        let mut nodes: Vec<&Node> = self.root().iter().collect();
        nodes.sort_by_key(|node| node.name().to_string());

        let mut out = String::new();
        for node in nodes {
            let mut subdomains: Vec<String> =
                node.children().map(|child| child.label().to_string()).collect();
            subdomains.sort();
            // Writing to a String cannot fail.
            let _ = writeln!(
                out,
                "{}: {} NS, {} other, subdomains: [{}]",
                node.name(),
                node.ns_records().len(),
                node.records().len(),
                subdomains.join(", ")
            );
        }
        out
    }
}

impl Default for DomainCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the root hint NS record for `<letter>.root-servers.net`,
/// with uncompressed RDATA.
fn root_hint(letter: u8) -> Record {
    let mut rdata = Vec::with_capacity(20);
    rdata.extend_from_slice(&[1, letter, 12]);
    rdata.extend_from_slice(b"root-servers\x03net\x00");
    Record {
        owner: Name::root(),
        rr_type: Type::NS,
        class: Class::IN,
        ttl: Ttl::from(0),
        rdata: rdata.into(),
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn a_record(owner: &str, address: [u8; 4]) -> Record {
        Record {
            owner: owner.parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: Ttl::from(300),
            rdata: Box::new(address),
        }
    }

    #[test]
    fn root_is_seeded_with_hints() {
        let cache = DomainCache::new();
        let root = cache.lookup_str(".").unwrap();
        assert!(root.label().is_null());
        assert!(root.records().is_empty());
        assert_eq!(root.ns_records().len(), 13);
        for (record, &letter) in root.ns_records().iter().zip(ROOT_SERVER_LETTERS) {
            assert!(record.owner.is_root());
            assert_eq!(record.class, Class::IN);
            assert_eq!(record.ttl, Ttl::from(0));
            assert_eq!(record.rdata.len(), 20);
            let expected: Name = format!("{}.root-servers.net", letter as char).parse().unwrap();
            assert_eq!(&record.rdata[..], &expected.to_wire()[..]);
        }
        assert_eq!(cache.node_count(), 1);
        assert_eq!(cache.record_count(), 13);
    }

    #[test]
    fn insert_then_lookup() {
        let mut cache = DomainCache::new();
        let record = a_record("dns.google", [8, 8, 8, 8]);
        cache.insert(record.clone());

        let node = cache.lookup_str("dns.google").unwrap();
        assert_eq!(node.records(), &[record]);
        assert!(node.ns_records().is_empty());
        assert_eq!(node.label().octets(), b"dns");
        assert_eq!(node.name().to_string(), "dns.google");

        let google = cache.lookup_str("google.").unwrap();
        assert!(google.records().is_empty());
        assert!(google.child(b"dns").is_some());
        assert_eq!(google.children().count(), 1);
        assert_eq!(cache.node_count(), 3);
    }

    #[test]
    fn ns_records_are_kept_apart() {
        let mut cache = DomainCache::new();
        let ns = Record {
            owner: "google".parse().unwrap(),
            rr_type: Type::NS,
            class: Class::IN,
            ttl: Ttl::from(3600),
            rdata: b"\x03ns1\x06google\x00"[..].into(),
        };
        cache.insert(ns.clone());
        cache.insert(a_record("google", [142, 250, 0, 1]));
        let node = cache.lookup_str("google").unwrap();
        assert_eq!(node.ns_records(), &[ns]);
        assert_eq!(node.records().len(), 1);
    }

    #[test]
    fn duplicates_accumulate() {
        let mut cache = DomainCache::new();
        let record = a_record("dns.google", [8, 8, 4, 4]);
        cache.insert(record.clone());
        cache.insert(record);
        assert_eq!(cache.lookup_str("dns.google").unwrap().records().len(), 2);
        assert_eq!(cache.record_count(), 15);
    }

    #[test]
    fn lookup_misses_do_not_create_nodes() {
        let mut cache = DomainCache::new();
        cache.insert(a_record("dns.google", [8, 8, 8, 8]));
        assert!(cache.lookup_str("www.google").is_none());
        assert!(cache.lookup_str("dns.google.com").is_none());
        assert!(cache.lookup_str("a..b").is_none());
        assert_eq!(cache.node_count(), 3);
    }

    #[test]
    fn labels_compare_byte_for_byte() {
        let mut cache = DomainCache::new();
        cache.insert(a_record("Example.com", [192, 0, 2, 1]));
        assert!(cache.lookup_str("Example.com").is_some());
        assert!(cache.lookup_str("example.com").is_none());
    }

    #[test]
    fn cache_packet_skips_opt() {
        let mut packet = Packet::decode(
            b"\x12\x34\x81\x80\x00\x00\x00\x01\x00\x00\x00\x01\
              \x03dns\x06google\x00\x00\x01\x00\x01\x00\x00\x00\x3c\x00\x04\x08\x08\x08\x08\
              \x00\x00\x29\x10\x00\x00\x00\x00\x00\x00\x00",
        )
        .unwrap();
        let mut cache = DomainCache::new();
        assert_eq!(cache.cache_packet(&packet), 1);
        assert_eq!(cache.lookup_str("dns.google").unwrap().records().len(), 1);
        assert!(cache.root().records().is_empty());

        packet.authorities.push(a_record("ns.google", [216, 239, 32, 10]));
        assert_eq!(cache.cache_packet(&packet), 2);
        assert_eq!(cache.record_count(), 13 + 3);
    }

    #[test]
    fn dump_describes_every_node() {
        let mut cache = DomainCache::new();
        cache.insert(a_record("dns.google", [8, 8, 8, 8]));
        assert_eq!(
            cache.dump(),
            ".: 13 NS, 0 other, subdomains: [google]\n\
             dns.google: 0 NS, 1 other, subdomains: []\n\
             google: 0 NS, 0 other, subdomains: [dns]\n"
        );
    }
}
