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

//! The [`Node`] structure, representing a node in the cache's domain
//! tree.

use std::collections::{hash_map, HashMap};
use std::iter::FusedIterator;

use crate::name::{LabelBuf, Name};
use crate::rr::{Record, Type};

/// A node in the domain tree. Each node owns its children outright,
/// keyed by label, and holds the records cached for its domain name.
/// NS records are kept apart from all other records, since they are
/// what a resolver needs for delegation.
#[derive(Clone, Debug)]
pub struct Node {
    name: Name,
    ns_records: Vec<Record>,
    records: Vec<Record>,
    children: HashMap<LabelBuf, Node>,
}

impl Node {
    /// Creates a new `Node` for `name`, with no records and no
    /// children.
    pub(super) fn new(name: Name) -> Self {
        Self {
            name,
            ns_records: Vec::new(),
            records: Vec::new(),
            children: HashMap::new(),
        }
    }

    /// Returns the full domain name of the node.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the node's label: the leftmost label of its name, or the
    /// null label for the root.
    pub fn label(&self) -> LabelBuf {
        self.name.labels().next().copied().unwrap_or_else(LabelBuf::null)
    }

    /// Returns the NS records cached at this node, in insertion order.
    pub fn ns_records(&self) -> &[Record] {
        &self.ns_records
    }

    /// Returns the non-NS records cached at this node, in insertion
    /// order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns an iterator over the node's children, in no particular
    /// order.
    pub fn children(&self) -> hash_map::Values<LabelBuf, Node> {
        self.children.values()
    }

    /// Returns the child with the given label, if there is one.
    pub fn child(&self, label: &[u8]) -> Option<&Node> {
        self.children.get(label)
    }

    /// Gets or creates the child with the given label.
    pub(super) fn child_or_insert(&mut self, label: LabelBuf) -> &mut Node {
        let parent = &self.name;
        self.children.entry(label).or_insert_with(|| {
            if label.is_null() {
                return Node::new(Name::root());
            }
            let mut labels = vec![label.octets()];
            labels.extend(parent.labels().map(LabelBuf::octets));
            // Children are only created along the labels of a valid
            // name, so this cannot fail.
            Node::new(Name::from_labels(labels).unwrap_or_else(|_| Name::root()))
        })
    }

    /// Appends `record` to the list matching its type.
    pub(super) fn add(&mut self, record: Record) {
        if record.rr_type == Type::NS {
            self.ns_records.push(record);
        } else {
            self.records.push(record);
        }
    }

    /// Returns an iterator over this node and all of its descendants.
    pub fn iter(&self) -> Iter {
        Iter::new(self)
    }
}

////////////////////////////////////////////////////////////////////////
// NODE ITERATOR                                                      //
////////////////////////////////////////////////////////////////////////

/// A depth-first iterator over a [`Node`] and its descendants.
pub struct Iter<'a> {
    state: IterState<'a>,
}

/// The internal state of an [`Iter`].
enum IterState<'a> {
    /// The next action is to return the current node.
    Node { node: &'a Node, stack: IterStack<'a> },

    /// The next action is to begin processing the next unprocessed
    /// child of the current node.
    Children {
        children: hash_map::Values<'a, LabelBuf, Node>,
        stack: IterStack<'a>,
    },

    /// Iteration is complete.
    Finished,
}

type IterStack<'a> = Vec<hash_map::Values<'a, LabelBuf, Node>>;

impl<'a> Iter<'a> {
    fn new(top: &'a Node) -> Self {
        Self {
            state: IterState::Node {
                node: top,
                stack: Vec::new(),
            },
        }
    }

    /// Acts on the current state of the iterator. Returns the next
    /// value to return from [`Iterator::next`], or `None` if the state
    /// transition did not produce a new value. In the latter case, this
    /// method should be called repeatedly until it produces a value.
    fn execute_state_machine(&mut self) -> Option<Option<&'a Node>> {
        let previous_state = std::mem::replace(&mut self.state, IterState::Finished);
        match previous_state {
            IterState::Node { node, stack } => {
                self.state = IterState::Children {
                    children: node.children.values(),
                    stack,
                };
                Some(Some(node))
            }
            IterState::Children {
                mut children,
                mut stack,
            } => {
                if let Some(next_child) = children.next() {
                    stack.push(children);
                    self.state = IterState::Node {
                        node: next_child,
                        stack,
                    };
                    None
                } else if let Some(parent) = stack.pop() {
                    self.state = IterState::Children {
                        children: parent,
                        stack,
                    };
                    None
                } else {
                    Some(None)
                }
            }
            IterState::Finished => Some(None),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(result) = self.execute_state_machine() {
                return result;
            }
        }
    }
}

impl FusedIterator for Iter<'_> {}
