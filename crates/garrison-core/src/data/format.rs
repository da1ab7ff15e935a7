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

//! Defines the two physical encodings of a saved scope tree.
//!
//! A tree is created in one format and keeps it for its whole lifetime: every
//! variable payload inside it is encoded according to that format, so mixing
//! trees of different formats is a caller bug.

use std::path::Path;

/// The file extension of a human-readable save.
pub const READABLE_EXTENSION: &str = "txt";
/// The file extension of a Huffman-compressed binary save.
pub const BINARY_EXTENSION: &str = "dat";

/// The encoding used by a scope tree and all of its variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Indented text, one statement per line. Values are stored as text.
    Readable,
    /// A bit stream whose names are prefix-coded. Values are stored as raw bytes.
    Binary,
}

impl Format {
    /// Resolves the format from a path's extension.
    ///
    /// Only the exact extensions `txt` and `dat` are recognized; anything else
    /// yields `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            READABLE_EXTENSION => Some(Format::Readable),
            BINARY_EXTENSION => Some(Format::Binary),
            _ => None,
        }
    }

    /// Returns the file extension associated with this format.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Readable => READABLE_EXTENSION,
            Format::Binary => BINARY_EXTENSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            Format::from_path(Path::new("saves/level.txt")),
            Some(Format::Readable)
        );
        assert_eq!(
            Format::from_path(Path::new("saves/level.dat")),
            Some(Format::Binary)
        );
        assert_eq!(Format::from_path(Path::new("saves/level.ron")), None);
        assert_eq!(Format::from_path(Path::new("saves/level")), None);
        // Case matters, the extension must match exactly.
        assert_eq!(Format::from_path(Path::new("saves/level.TXT")), None);
    }

    #[test]
    fn test_extension_round_trip() {
        for format in [Format::Readable, Format::Binary] {
            let path = format!("save.{}", format.extension());
            assert_eq!(Format::from_path(Path::new(&path)), Some(format));
        }
    }
}
