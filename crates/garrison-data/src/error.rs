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

//! Defines the error type shared by the persistence and entity layers.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// An error raised while loading, saving, or interpreting persisted data.
#[derive(Debug)]
pub enum DataError {
    /// A file could not be opened, read, or written.
    Io {
        /// The file the operation targeted.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// A save path whose extension maps to no known format.
    UnsupportedExtension {
        /// The offending path.
        path: PathBuf,
    },
    /// A readable payload could not be parsed as the requested type.
    InvalidValue {
        /// The name of the variable being read.
        variable: String,
        /// The type that was requested.
        expected: &'static str,
        /// The payload that was found.
        found: String,
    },
    /// A binary payload is shorter than the requested type.
    TruncatedPayload {
        /// The name of the variable being read.
        variable: String,
        /// The number of bytes required.
        expected: usize,
        /// The number of bytes available.
        found: usize,
    },
    /// A saved entity record whose type tag has no registered factory.
    UnknownEntityType {
        /// The unrecognized type tag.
        type_name: String,
    },
    /// A saved entity record that carries no `Entity.id` variable.
    MissingEntityId {
        /// The type tag of the record.
        type_name: String,
    },
    /// A file that is structurally malformed.
    Corrupt {
        /// What was wrong with it.
        reason: String,
    },
}

impl DataError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io { path, source } => {
                write!(f, "I/O error on '{}': {source}", path.display())
            }
            DataError::UnsupportedExtension { path } => {
                write!(
                    f,
                    "Unsupported save file extension for '{}' (expected .txt or .dat)",
                    path.display()
                )
            }
            DataError::InvalidValue {
                variable,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Variable '{variable}' does not hold a valid {expected}: '{found}'"
                )
            }
            DataError::TruncatedPayload {
                variable,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Variable '{variable}' holds {found} bytes but {expected} are required"
                )
            }
            DataError::UnknownEntityType { type_name } => {
                write!(f, "No factory is registered for entity type '{type_name}'")
            }
            DataError::MissingEntityId { type_name } => {
                write!(f, "Saved '{type_name}' record has no Entity.id")
            }
            DataError::Corrupt { reason } => write!(f, "Corrupt save data: {reason}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_io_error_exposes_source() {
        let err = DataError::io(
            "saves/missing.dat",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("saves/missing.dat"));
    }

    #[test]
    fn test_display_names_the_variable() {
        let err = DataError::InvalidValue {
            variable: "hp".to_owned(),
            expected: "i32",
            found: "lots".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Variable 'hp' does not hold a valid i32: 'lots'"
        );
        assert!(err.source().is_none());
    }
}
