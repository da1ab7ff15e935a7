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

//! # Garrison Data
//!
//! Persistence and entity bookkeeping for the Garrison engine.
//!
//! Game state is saved as a tree of named [`scope`]s holding typed
//! [`variable`]s. A tree is stored either as indented text or as a compact
//! Huffman-coded bit stream, and [`saved_data`] maps save files to trees that
//! are shared while anyone holds them. The [`ecs`] module owns live entities,
//! hands out their 16-bit ids, and restores them from a save a few at a time.

#![warn(missing_docs)]

pub mod bitstream;
pub mod ecs;
pub mod error;
pub mod huffman;
pub mod saved_data;
pub mod scope;
pub mod variable;

pub use bitstream::{BitReader, BitStream};
pub use error::DataError;
pub use huffman::{FrequencyTable, PrefixCodeTree, Symbol};
pub use saved_data::{SavedData, SavedDataRegistry};
pub use scope::{ScopeId, ScopeMut, ScopeRef, ScopeTree};
pub use variable::{Variable, VariableValue};
