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

//! The entity layer: identity, lifecycle, deferred references, and
//! incremental persistence of game objects.
//!
//! The primary entry point is the [`EntityManager`]. Game types implement
//! [`Entity`] and register themselves with the manager's
//! [`EntityFactories`] to take part in saves.

mod entity;
mod factory;
mod ids;
mod manager;
mod requests;

pub use entity::{DeserializeContext, Entity, FrameContext};
pub use factory::{EntityConstructor, EntityFactories};
pub use ids::{IdTable, OwnerToken};
pub use manager::{EntityManager, DEFAULT_FIXED_STEP, ENTITY_SCOPE_NAME, SCOPE_NAME};
pub use requests::Resolution;

#[cfg(test)]
mod tests;
