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

//! The prefix-coded binary format.
//!
//! Scope and variable names are coded with a [`PrefixCodeTree`] built from
//! their frequencies across the whole tree. Values are written as
//! length-prefixed byte strings. Per scope the layout is:
//!
//! ```text
//! name-code
//! has-variables bit, then per variable: is-last bit, name-code, value
//! has-children bit,  then per child:    is-last bit, child scope
//! ```

use super::{ScopeId, ScopeNode, ScopeTree};
use crate::bitstream::{BitReader, BitStream};
use crate::huffman::{FrequencyTable, PrefixCodeTree};
use crate::variable::Variable;
use garrison_core::Format;

impl ScopeTree {
    /// Counts every scope name and variable name in the tree, the root included.
    /// Values are not counted.
    pub fn gather_frequencies(&self) -> FrequencyTable<String> {
        let mut frequencies = FrequencyTable::new();
        let mut pending = vec![self.root];
        while let Some(id) = pending.pop() {
            let node = self.node(id);
            frequencies.increment(&node.name, 1);
            for variable in &node.variables {
                frequencies.increment(&variable.name().to_owned(), 1);
            }
            // Reversed so siblings are visited in order.
            pending.extend(node.children.iter().rev());
        }
        frequencies
    }

    /// Appends the coded tree to `stream`.
    ///
    /// # Panics
    /// Panics if the tree is not [`Format::Binary`] or `codes` lacks a name
    /// used in the tree.
    pub fn encode_binary(&self, stream: &mut BitStream, codes: &mut PrefixCodeTree<String>) {
        assert_eq!(
            self.format,
            Format::Binary,
            "encode_binary called on a readable tree"
        );
        self.encode_scope(self.root, stream, codes);
    }

    fn encode_scope(
        &self,
        id: ScopeId,
        stream: &mut BitStream,
        codes: &mut PrefixCodeTree<String>,
    ) {
        let node = self.node(id);
        codes.encode(stream, &node.name);

        stream.push_bit(!node.variables.is_empty());
        for (i, variable) in node.variables.iter().enumerate() {
            stream.push_bit(i + 1 == node.variables.len());
            codes.encode(stream, &variable.name().to_owned());
            stream.push_string(variable.payload());
        }

        stream.push_bit(!node.children.is_empty());
        for (i, &child) in node.children.iter().enumerate() {
            stream.push_bit(i + 1 == node.children.len());
            self.encode_scope(child, stream, codes);
        }
    }

    /// Reads a tree written by [`ScopeTree::encode_binary`] with the same codes.
    pub fn decode_binary(reader: &mut BitReader<'_>, codes: &PrefixCodeTree<String>) -> ScopeTree {
        let mut tree = ScopeTree::with_root_name(Format::Binary, codes.decode(reader).clone());
        let root = tree.root;
        tree.decode_contents(root, reader, codes);
        tree
    }

    fn decode_contents(
        &mut self,
        id: ScopeId,
        reader: &mut BitReader<'_>,
        codes: &PrefixCodeTree<String>,
    ) {
        if reader.read_bit() {
            loop {
                let is_last = reader.read_bit();
                let name = codes.decode(reader).clone();
                let value = reader.extract_string();
                self.node_mut(id)
                    .variables
                    .push(Variable::with_payload(name, value, Format::Binary));
                if is_last {
                    break;
                }
            }
        }

        if reader.read_bit() {
            loop {
                let is_last = reader.read_bit();
                let name = codes.decode(reader).clone();
                let child = self.store.insert(ScopeNode::new(name, Some(id)));
                self.node_mut(id).children.push(child);
                self.decode_contents(child, reader, codes);
                if is_last {
                    break;
                }
            }
        }
    }

    /// Encodes the whole tree into a fresh stream: the code table first, then
    /// the coded tree.
    pub fn to_bit_stream(&self) -> BitStream {
        let mut codes = PrefixCodeTree::new(&self.gather_frequencies());
        let mut stream = BitStream::new();
        codes.serialize(&mut stream);
        self.encode_binary(&mut stream, &mut codes);
        stream
    }

    /// Decodes a stream produced by [`ScopeTree::to_bit_stream`].
    ///
    /// An empty stream yields an empty binary tree.
    pub fn from_bit_stream(stream: &BitStream) -> ScopeTree {
        if stream.is_empty() {
            return ScopeTree::new(Format::Binary);
        }
        let mut reader = stream.reader();
        let codes = PrefixCodeTree::<String>::deserialize(&mut reader);
        Self::decode_binary(&mut reader, &codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_core::math::{Quaternion, Vec3};

    fn skirmish() -> ScopeTree {
        let mut tree = ScopeTree::new(Format::Binary);
        let mut manager = tree.root_mut().into_child("EntityManager");
        for id in 1u16..=4 {
            let mut unit = manager.add_child("Unit");
            unit.add_child("Entity").add_variable("id").write(&id);
            let mut transform = unit.add_child("Transform");
            transform.add_variable("p").write(&Vec3::new(id as f32, 0.0, -1.5));
            transform.add_variable("o").write(&Quaternion::IDENTITY);
        }
        // Values may contain any byte, including what looks like a length prefix.
        manager
            .add_child("Blob")
            .add_variable("raw")
            .write(&vec![0u8, 255, 1, 0, 0, 0]);
        tree
    }

    #[test]
    fn test_frequencies_count_names_not_values() {
        let tree = skirmish();
        let freq = tree.gather_frequencies();

        assert_eq!(freq.get(&"GlobalScope".to_owned()), Some(1));
        assert_eq!(freq.get(&"Unit".to_owned()), Some(4));
        assert_eq!(freq.get(&"id".to_owned()), Some(4));
        assert_eq!(freq.get(&"raw".to_owned()), Some(1));
        assert_eq!(freq.iter().next().map(|(s, _)| s.as_str()), Some("GlobalScope"));
    }

    #[test]
    fn test_binary_round_trip_is_exact() {
        // --- 1. ARRANGE ---
        let tree = skirmish();

        // --- 2. ACT ---
        let stream = tree.to_bit_stream();
        let decoded = ScopeTree::from_bit_stream(&stream);

        // --- 3. ASSERT ---
        assert_eq!(decoded, tree);
        let p = decoded.get_variable("EntityManager.Unit.Transform.p");
        assert_eq!(p.read::<Vec3>().unwrap(), Vec3::new(1.0, 0.0, -1.5));
    }

    #[test]
    fn test_decoding_consumes_exactly_the_encoded_bits() {
        let tree = skirmish();
        let mut codes = PrefixCodeTree::new(&tree.gather_frequencies());

        let mut stream = BitStream::new();
        tree.encode_binary(&mut stream, &mut codes);
        stream.push_bit(true);

        let mut reader = stream.reader();
        let decoded = ScopeTree::decode_binary(&mut reader, &codes);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(decoded, tree);
    }

    #[test]
    fn test_root_only_tree_round_trips() {
        let tree = ScopeTree::new(Format::Binary);
        let decoded = ScopeTree::from_bit_stream(&tree.to_bit_stream());
        assert_eq!(decoded.root().name(), ScopeTree::ROOT_NAME);
        assert!(decoded.root().is_empty());
        assert!(ScopeTree::from_bit_stream(&BitStream::new()).root().is_empty());
    }
}
