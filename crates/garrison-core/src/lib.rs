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

//! # Garrison Core
//!
//! Foundational crate containing the plain value types every other Garrison
//! layer agrees on: entity identifiers, the persistence [`Format`], the math
//! primitives that gameplay code hands to the save system, and the
//! frame-stepping helpers used to spread long loads across frames.

#![warn(missing_docs)]

pub mod data;
pub mod ecs;
pub mod math;
pub mod time;

pub use data::Format;
pub use ecs::entity::EntityId;
pub use time::{FrameClock, Incremental};
