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

//! The behaviour every managed object implements.

use super::requests::{IdRequest, Resolution};
use crate::error::DataError;
use crate::scope::{ScopeMut, ScopeRef};
use garrison_core::EntityId;
use std::any::Any;
use std::collections::VecDeque;

/// A game object owned by an [`EntityManager`](super::EntityManager).
///
/// The manager writes and reads the entity's id itself; implementors only
/// persist their own state.
pub trait Entity: Any {
    /// A stable tag naming the concrete type in save files.
    ///
    /// It must match the tag the type's factory is registered under.
    fn type_name(&self) -> &'static str;

    /// Called once per frame.
    fn tick(&mut self, _ctx: &mut FrameContext<'_>) {}

    /// Whether [`Entity::fixed_tick`] should be driven at all.
    fn has_fixed_tick(&self) -> bool {
        false
    }

    /// Called whenever this entity's own accumulator passes the fixed step.
    fn fixed_tick(&mut self, _ctx: &mut FrameContext<'_>) {}

    /// Writes the entity's state below `scope`.
    ///
    /// Returns `false` if there was nothing worth saving; the manager then
    /// drops the record from the save.
    fn serialize(&self, _scope: &mut ScopeMut<'_>) -> bool {
        true
    }

    /// Restores state written by [`Entity::serialize`].
    fn deserialize(
        &mut self,
        _scope: ScopeRef<'_>,
        _ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        Ok(())
    }

    /// Downcast to a concrete type for type-specific operations.
    fn as_any(&self) -> &dyn Any;

    /// Downcast to a concrete type (mutable) for type-specific operations.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-entity view of the current frame.
pub struct FrameContext<'a> {
    pub(crate) id: EntityId,
    pub(crate) delta_time: f32,
    pub(crate) destroyed: &'a mut Vec<EntityId>,
}

impl FrameContext<'_> {
    /// The id of the entity being ticked.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The time step of this call, in seconds. For fixed ticks this is the fixed step.
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Queues `id` for destruction at the next
    /// [`deconstruct_destroyed_entities`](super::EntityManager::deconstruct_destroyed_entities).
    pub fn destroy(&mut self, id: EntityId) {
        self.destroyed.push(id);
    }

    /// Queues the entity being ticked for destruction.
    pub fn destroy_self(&mut self) {
        let id = self.id;
        self.destroy(id);
    }
}

/// Context handed to [`Entity::deserialize`].
pub struct DeserializeContext<'a> {
    pub(crate) id: EntityId,
    pub(crate) requests: &'a mut VecDeque<IdRequest>,
}

impl DeserializeContext<'_> {
    /// The id the entity is being restored under.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Defers access to `target` until the start of the next tick, when every
    /// entity restored in this pass exists. The callback also receives the
    /// entity being deserialized.
    pub fn request_id(&mut self, target: EntityId, callback: impl FnOnce(Resolution<'_>) + 'static) {
        self.requests
            .push_back(IdRequest::new(target, Some(self.id), callback));
    }
}
