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

//! Position, orientation, and scale of a placed entity.

use garrison_core::math::{Quaternion, Vec3};
use garrison_core::EntityId;
use garrison_data::ecs::{DeserializeContext, Entity};
use garrison_data::{DataError, ScopeMut, ScopeRef};

/// The name of the child scope a transform is saved under.
pub const SCOPE_NAME: &str = "Transform";

/// An entity that carries a [`Transform`].
pub trait Placed: Entity {
    /// The entity's transform.
    fn transform(&self) -> &Transform;

    /// The entity's transform, for mutation.
    fn transform_mut(&mut self) -> &mut Transform;
}

/// Local placement relative to an optional parent entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quaternion,
    pub scale: Vec3,
    parent: Option<EntityId>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quaternion::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// The parent entity, once it is known to exist.
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn set_parent(&mut self, parent: Option<EntityId>) {
        self.parent = parent;
    }

    /// Writes `p`, `o`, then `s` (only when not unit scale) and
    /// `parentOwnerId` (only when parented) into a new child of `scope`.
    pub fn serialize(&self, scope: &mut ScopeMut<'_>) {
        let mut scope = scope.add_child(SCOPE_NAME);
        scope.add_variable("p").write(&self.position);
        scope.add_variable("o").write(&self.orientation);
        if self.scale != Vec3::ONE {
            scope.add_variable("s").write(&self.scale);
        }
        if let Some(parent) = self.parent {
            scope.add_variable("parentOwnerId").write(&parent);
        }
    }

    /// Restores the transform of `E` from its child of `scope`.
    ///
    /// The parent link is set by a deferred request, so it only appears once
    /// the parent exists. An absent section leaves the transform untouched.
    pub fn deserialize<E: Placed>(
        &mut self,
        scope: ScopeRef<'_>,
        ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        let Some(scope) = scope.try_get_scope(SCOPE_NAME) else {
            log::warn!("Entity {} has no transform in the save", ctx.id());
            return Ok(());
        };

        self.position = scope.get_variable("p").read()?;
        self.orientation = scope.get_variable("o").read()?;
        self.scale = match scope.try_get_variable("s") {
            Some(s) => s.read()?,
            None => Vec3::ONE,
        };
        self.parent = None;

        if let Some(parent) = scope.try_get_variable("parentOwnerId") {
            let parent: EntityId = parent.read()?;
            ctx.request_id(parent, |resolution| {
                if let Some(child) = resolution
                    .requester
                    .and_then(|e| e.as_any_mut().downcast_mut::<E>())
                {
                    child.transform_mut().set_parent(Some(resolution.target_id));
                }
            });
        }
        Ok(())
    }
}
