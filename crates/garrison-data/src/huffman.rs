// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A Huffman prefix-code tree over arbitrary symbols.
//!
//! The tree is rebuilt from its leaf frequencies alone, so only the leaf table
//! is ever persisted. Construction is fully deterministic for a given input
//! order: equal frequencies keep their queue order, which keeps binary saves
//! bit-identical between runs.

use crate::bitstream::{BitReader, BitStream};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// The frequency counter type used by the tree. Sums saturate at `u16::MAX`.
pub type Frequency = u16;

/// A value that can be stored in a [`PrefixCodeTree`] and written to a bit stream.
pub trait Symbol: Clone + Eq + Hash {
    /// Appends the symbol to `stream`.
    fn write(&self, stream: &mut BitStream);

    /// Reads a symbol written by [`Symbol::write`].
    fn read(reader: &mut BitReader<'_>) -> Self;
}

impl Symbol for String {
    fn write(&self, stream: &mut BitStream) {
        stream.push_string(self.as_bytes());
    }

    fn read(reader: &mut BitReader<'_>) -> Self {
        String::from_utf8_lossy(&reader.extract_string()).into_owned()
    }
}

/// Symbol frequencies in first-seen order.
#[derive(Debug, Clone)]
pub struct FrequencyTable<T: Symbol> {
    entries: Vec<(T, Frequency)>,
    index: HashMap<T, usize>,
}

impl<T: Symbol> Default for FrequencyTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Symbol> FrequencyTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `by` to the frequency of `symbol`, inserting it at the end if unseen.
    ///
    /// A frequency that would overflow is left unchanged and a warning is logged.
    pub fn increment(&mut self, symbol: &T, by: Frequency) {
        match self.index.get(symbol) {
            Some(&i) => {
                let freq = &mut self.entries[i].1;
                match freq.checked_add(by) {
                    Some(sum) => *freq = sum,
                    None => {
                        log::warn!("Symbol frequency has reached its limit and cannot be incremented further.");
                    }
                }
            }
            None => {
                self.index.insert(symbol.clone(), self.entries.len());
                self.entries.push((symbol.clone(), by));
            }
        }
    }

    /// Returns the frequency recorded for `symbol`.
    pub fn get(&self, symbol: &T) -> Option<Frequency> {
        self.index.get(symbol).map(|&i| self.entries[i].1)
    }

    /// Returns the number of distinct symbols.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no symbol has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(symbol, frequency)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, Frequency)> {
        self.entries.iter().map(|(s, f)| (s, *f))
    }
}

impl<T: Symbol> FromIterator<(T, Frequency)> for FrequencyTable<T> {
    fn from_iter<I: IntoIterator<Item = (T, Frequency)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (symbol, freq) in iter {
            table.increment(&symbol, freq);
        }
        table
    }
}

#[derive(Debug, Clone)]
enum NodeKind<T> {
    Leaf(T),
    Internal([usize; 2]),
}

#[derive(Debug, Clone)]
struct Node<T> {
    frequency: Frequency,
    parent: Option<usize>,
    kind: NodeKind<T>,
}

/// A Huffman tree mapping symbols to variable-length bit paths.
///
/// Leaves occupy the first node slots, in the order of the frequency table
/// they were built from. Internal nodes follow in creation order.
#[derive(Debug, Clone)]
pub struct PrefixCodeTree<T: Symbol> {
    nodes: Vec<Node<T>>,
    root: usize,
    leaves: HashMap<T, usize>,
    paths: HashMap<T, Vec<bool>>,
}

impl<T: Symbol> PrefixCodeTree<T> {
    /// Builds a tree from a frequency table.
    ///
    /// # Panics
    /// Panics if `frequencies` is empty.
    pub fn new(frequencies: &FrequencyTable<T>) -> Self {
        Self::build(frequencies.iter().map(|(s, f)| (s.clone(), f)))
    }

    fn build(frequencies: impl Iterator<Item = (T, Frequency)>) -> Self {
        let mut nodes: Vec<Node<T>> = Vec::new();
        let mut leaves = HashMap::new();

        for (symbol, frequency) in frequencies {
            leaves.entry(symbol.clone()).or_insert(nodes.len());
            nodes.push(Node {
                frequency,
                parent: None,
                kind: NodeKind::Leaf(symbol),
            });
        }
        assert!(
            !nodes.is_empty(),
            "cannot build a prefix code tree from an empty frequency table"
        );

        // Stable, so equal frequencies keep their table order.
        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.sort_by_key(|&i| nodes[i].frequency);
        let mut open: VecDeque<usize> = order.into();

        while open.len() > 1 {
            let (Some(left), Some(right)) = (open.pop_front(), open.pop_front()) else {
                unreachable!("open queue holds at least two nodes");
            };

            let parent = nodes.len();
            let frequency = nodes[left].frequency.saturating_add(nodes[right].frequency);
            nodes[left].parent = Some(parent);
            nodes[right].parent = Some(parent);
            nodes.push(Node {
                frequency,
                parent: None,
                kind: NodeKind::Internal([left, right]),
            });

            let at = open
                .iter()
                .position(|&i| nodes[i].frequency >= frequency)
                .unwrap_or(open.len());
            open.insert(at, parent);
        }

        let root = open[0];
        Self {
            nodes,
            root,
            leaves,
            paths: HashMap::new(),
        }
    }

    /// Returns the number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves_in_order().count()
    }

    fn leaves_in_order(&self) -> impl Iterator<Item = (&T, Frequency)> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            NodeKind::Leaf(symbol) => Some((symbol, node.frequency)),
            NodeKind::Internal(_) => None,
        })
    }

    /// Returns the root-to-leaf path of `symbol`; `false` selects the first child.
    ///
    /// # Panics
    /// Panics if `symbol` is not a leaf of this tree.
    pub fn path_to(&self, symbol: &T) -> Vec<bool> {
        let Some(&leaf) = self.leaves.get(symbol) else {
            panic!("symbol is not present in the prefix code tree");
        };

        let mut path = Vec::new();
        let mut current = leaf;
        while let Some(parent) = self.nodes[current].parent {
            let NodeKind::Internal(children) = &self.nodes[parent].kind else {
                unreachable!("a parent is always an internal node");
            };
            path.push(children[1] == current);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Appends the code for `symbol` to `stream`, caching the path on first use.
    ///
    /// # Panics
    /// Panics if `symbol` is not a leaf of this tree.
    pub fn encode(&mut self, stream: &mut BitStream, symbol: &T) {
        if !self.paths.contains_key(symbol) {
            let path = self.path_to(symbol);
            self.paths.insert(symbol.clone(), path);
        }
        for &bit in &self.paths[symbol] {
            stream.push_bit(bit);
        }
    }

    /// Reads one code from `reader` and returns its symbol.
    ///
    /// A tree with a single leaf uses empty codes and consumes no bits.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> &T {
        let mut current = self.root;
        loop {
            match &self.nodes[current].kind {
                NodeKind::Leaf(symbol) => return symbol,
                NodeKind::Internal(children) => {
                    current = children[reader.read_bit() as usize];
                }
            }
        }
    }

    /// Writes the leaf table: the leaf count as a `u64`, then each leaf's
    /// frequency and symbol.
    pub fn serialize(&self, stream: &mut BitStream) {
        stream.push_pod(&(self.leaf_count() as u64));
        for (symbol, frequency) in self.leaves_in_order() {
            stream.push_pod(&frequency);
            symbol.write(stream);
        }
    }

    /// Rebuilds a tree from a leaf table written by [`PrefixCodeTree::serialize`].
    ///
    /// # Panics
    /// Panics if the table is empty or the stream ends early.
    pub fn deserialize(reader: &mut BitReader<'_>) -> Self {
        let count = reader.extract_pod::<u64>();
        let mut leaves = Vec::new();
        for _ in 0..count {
            let frequency = reader.extract_pod::<Frequency>();
            let symbol = T::read(reader);
            leaves.push((symbol, frequency));
        }
        Self::build(leaves.into_iter())
    }
}
