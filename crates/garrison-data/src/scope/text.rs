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

//! The line-oriented readable format.
//!
//! ```text
//! Army {
//! 	name = North
//! 	Units {
//! 		count = 12
//! 	}
//! }
//! ```
//!
//! Children are written before variables. The root itself is not written;
//! parsing always produces a root named [`ScopeTree::ROOT_NAME`].

use super::ScopeTree;
use crate::variable::Variable;
use garrison_core::Format;
use std::io::{self, BufRead, Write};

/// Drops every tab, carriage return, and line feed, wherever it occurs.
fn cleanse(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect()
}

impl ScopeTree {
    /// Parses a readable tree.
    ///
    /// A line containing `{` opens a child, a line containing `=` is a
    /// `name = value` variable, and a line containing `}` closes the current
    /// scope. Other lines are ignored. A `}` at the root level ends parsing.
    pub fn parse_readable<R: BufRead>(reader: R) -> io::Result<ScopeTree> {
        let mut tree = ScopeTree::new(Format::Readable);
        let mut stack = vec![tree.root];

        for line in reader.lines() {
            let line = line?;
            let Some(&current) = stack.last() else {
                break;
            };

            if line.contains('{') {
                let name = cleanse(&line);
                let name = name.trim_end_matches('{').trim_end_matches(' ');
                let child = tree.add_child(current, name.to_owned());
                stack.push(child);
            } else if let Some(eq) = line.find('=') {
                let name = cleanse(line[..eq].strip_suffix(' ').unwrap_or(&line[..eq]));
                let rest = &line[eq + 1..];
                let value = cleanse(rest.strip_prefix(' ').unwrap_or(rest));
                tree.node_mut(current).variables.push(Variable::with_payload(
                    name,
                    value.into_bytes(),
                    Format::Readable,
                ));
            } else if line.contains('}') {
                stack.pop();
                if stack.is_empty() {
                    log::debug!("Closing brace at root level, ignoring the rest of the input.");
                }
            }
        }

        Ok(tree)
    }

    /// Writes the tree in the readable format.
    ///
    /// # Panics
    /// Panics if the tree is not [`Format::Readable`].
    pub fn write_readable<W: Write>(&self, mut out: W) -> io::Result<()> {
        assert_eq!(
            self.format,
            Format::Readable,
            "write_readable called on a binary tree"
        );
        self.write_scope(&mut out, self.root, 0, true)?;
        out.flush()
    }

    fn write_scope<W: Write>(
        &self,
        out: &mut W,
        id: super::ScopeId,
        depth: usize,
        is_root: bool,
    ) -> io::Result<()> {
        let node = self.node(id);
        let indent = "\t".repeat(depth);
        let child_depth = if is_root {
            depth
        } else {
            writeln!(out, "{indent}{} {{", node.name)?;
            depth + 1
        };

        for &child in &node.children {
            self.write_scope(out, child, child_depth, false)?;
        }

        for variable in &node.variables {
            write!(out, "{indent}\t{} = ", variable.name())?;
            out.write_all(variable.payload())?;
            writeln!(out)?;
        }

        if !is_root {
            writeln!(out, "{indent}}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garrison_core::math::Vec3;

    #[test]
    fn test_writes_children_before_variables_without_root_wrapper() {
        // --- 1. ARRANGE ---
        let mut tree = ScopeTree::new(Format::Readable);
        let mut root = tree.root_mut();
        root.add_variable("seed").write(&7u32);
        let mut child = root.add_child("ChildName");
        child.add_variable("varName").write_str("value");
        child
            .add_child("NestedChild")
            .add_variable("innerVar")
            .write(&Vec3::new(1.5, 2.0, 3.0));

        // --- 2. ACT ---
        let mut out = Vec::new();
        tree.write_readable(&mut out).unwrap();

        // --- 3. ASSERT ---
        let expected = "ChildName {\n\
                        \tNestedChild {\n\
                        \t\tinnerVar = 1.5, 2, 3\n\
                        \t}\n\
                        \tvarName = value\n\
                        }\n\
                        \tseed = 7\n";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_parse_strips_tabs_and_carriage_returns() {
        let input = "Army {\r\n\tname = North\r\n\tUnits {\r\n\t\tcount = 12\r\n\t}\r\n}\r\nversion = 3\r\n";
        let tree = ScopeTree::parse_readable(input.as_bytes()).unwrap();

        assert_eq!(tree.root().name(), ScopeTree::ROOT_NAME);
        assert_eq!(tree.get_variable("Army.name").payload(), b"North");
        assert_eq!(tree.get_variable("Army.Units.count").read::<i32>().unwrap(), 12);
        assert_eq!(tree.get_variable("version").read::<u8>().unwrap(), 3);
    }

    #[test]
    fn test_readable_round_trip_preserves_structure() {
        let mut tree = ScopeTree::new(Format::Readable);
        let mut root = tree.root_mut();
        for i in 0..3 {
            let mut unit = root.add_child("Unit");
            unit.add_variable("index").write(&i);
            unit.add_child("Transform")
                .add_variable("p")
                .write(&Vec3::new(i as f32, 0.25, -8.0));
        }
        root.add_child("Empty");

        let mut out = Vec::new();
        tree.write_readable(&mut out).unwrap();
        let parsed = ScopeTree::parse_readable(out.as_slice()).unwrap();

        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_empty_input_gives_empty_root() {
        let tree = ScopeTree::parse_readable(&b""[..]).unwrap();
        assert!(tree.root().is_empty());
    }
}
