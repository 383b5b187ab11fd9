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

//! Implementation of the [`InflightTable`], which remembers forwarded
//! queries until their answers arrive.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use slab::Slab;

/// A query that has been forwarded upstream and awaits its answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Pending {
    /// Where the query came from, and so where the answer goes.
    pub client: SocketAddr,

    /// The transaction ID of the query.
    pub id: u16,

    /// When the query was admitted.
    pub forwarded_at: Instant,
}

/// A fixed-capacity table of [`Pending`] queries.
///
/// Entries live in a [`Slab`], so their keys stay valid until removal,
/// and an index from transaction ID to keys makes matching an answer
/// independent of the table size. Several clients may use the same
/// transaction ID; their entries are matched oldest first.
#[derive(Debug)]
pub struct InflightTable {
    entries: Slab<Pending>,
    by_id: HashMap<u16, VecDeque<usize>>,
    capacity: usize,
    timeout: Option<Duration>,
}

impl InflightTable {
    /// Creates an empty table holding at most `capacity` entries.
    /// Entries older than `timeout` are dropped by
    /// [`InflightTable::sweep_expired`]; with `None`, entries never
    /// expire.
    pub fn new(capacity: usize, timeout: Option<Duration>) -> Self {
        Self {
            entries: Slab::with_capacity(capacity),
            by_id: HashMap::with_capacity(capacity),
            capacity,
            timeout,
        }
    }

    /// Adds `entry` to the table, returning its key. Fails without
    /// waiting if the table is full.
    pub fn insert(&mut self, entry: Pending) -> Result<usize, CapacityExceeded> {
        if self.is_full() {
            return Err(CapacityExceeded);
        }
        let id = entry.id;
        let key = self.entries.insert(entry);
        self.by_id.entry(id).or_default().push_back(key);
        Ok(key)
    }

    /// Removes and returns the oldest entry with transaction ID `id`.
    pub fn take_by_id(&mut self, id: u16) -> Option<Pending> {
        let keys = self.by_id.get_mut(&id)?;
        let key = keys.pop_front();
        if keys.is_empty() {
            self.by_id.remove(&id);
        }
        key.map(|key| self.entries.remove(key))
    }

    /// Removes and returns the entry with the given key, if present.
    pub fn remove(&mut self, key: usize) -> Option<Pending> {
        let entry = self.entries.try_remove(key)?;
        if let Some(keys) = self.by_id.get_mut(&entry.id) {
            keys.retain(|&k| k != key);
            if keys.is_empty() {
                self.by_id.remove(&entry.id);
            }
        }
        Some(entry)
    }

    /// Removes every entry admitted `timeout` or longer before `now`.
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let timeout = match self.timeout {
            Some(timeout) => timeout,
            None => return 0,
        };
        let expired: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.forwarded_at) >= timeout)
            .map(|(key, _)| key)
            .collect();
        for &key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns whether the table is full.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

/// The error returned when inserting into a full [`InflightTable`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CapacityExceeded;

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("in-flight table is full")
    }
}

impl std::error::Error for CapacityExceeded {}
