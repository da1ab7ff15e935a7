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

//! The skirmish's entity types.

use crate::transform::{Placed, Transform};
use garrison_core::math::{Quaternion, Vec3};
use garrison_core::EntityId;
use garrison_data::ecs::{DeserializeContext, Entity, EntityManager, FrameContext};
use garrison_data::{DataError, ScopeMut, ScopeRef};
use std::any::Any;

/// Degrees a turret turns per fixed tick.
const TURRET_SWEEP: f32 = 15.0;

/// Registers every type that is saved with the scene.
pub fn register(manager: &mut EntityManager) {
    manager.register::<Army>();
    manager.register::<Unit>();
    manager.register::<Turret>();
}

#[derive(Debug, Default)]
pub struct Army {
    pub name: String,
    pub units: Vec<EntityId>,
}

impl Entity for Army {
    fn type_name(&self) -> &'static str {
        "Army"
    }

    fn serialize(&self, scope: &mut ScopeMut<'_>) -> bool {
        scope.add_variable("name").write_str(&self.name);
        scope.add_variable("units").write(&self.units);
        true
    }

    fn deserialize(
        &mut self,
        scope: ScopeRef<'_>,
        _ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        self.name = scope.get_variable("name").read()?;
        self.units = scope.get_variable("units").read()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct Unit {
    pub hp: i32,
    pub army: Option<EntityId>,
    pub transform: Transform,
    pub distance_walked: f32,
    speed: f32,
}

impl Default for Unit {
    fn default() -> Self {
        Self {
            hp: 100,
            army: None,
            transform: Transform::default(),
            distance_walked: 0.0,
            speed: 1.5,
        }
    }
}

impl Unit {
    pub fn at(position: Vec3) -> Self {
        Self {
            transform: Transform::at(position),
            ..Default::default()
        }
    }
}

impl Entity for Unit {
    fn type_name(&self) -> &'static str {
        "Unit"
    }

    fn tick(&mut self, ctx: &mut FrameContext<'_>) {
        if self.hp <= 0 {
            ctx.destroy_self();
            return;
        }
        let step = self.speed * ctx.delta_time();
        let forward = self.transform.orientation.rotate_vec3(Vec3::new(0.0, 0.0, 1.0));
        self.transform.position = self.transform.position + forward * step;
        self.distance_walked += step;
    }

    fn serialize(&self, scope: &mut ScopeMut<'_>) -> bool {
        scope.add_variable("hp").write(&self.hp);
        scope.add_variable("speed").write(&self.speed);
        if let Some(army) = self.army {
            scope.add_variable("army").write(&army);
        }
        self.transform.serialize(scope);
        true
    }

    fn deserialize(
        &mut self,
        scope: ScopeRef<'_>,
        ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        self.hp = scope.get_variable("hp").read()?;
        self.speed = scope.get_variable("speed").read()?;
        self.transform.deserialize::<Unit>(scope, ctx)?;

        // Keep the army link only if that army made it into the save.
        self.army = None;
        if let Some(army) = scope.try_get_variable("army") {
            let army: EntityId = army.read()?;
            ctx.request_id(army, |resolution| {
                if resolution.target.as_any().downcast_ref::<Army>().is_none() {
                    log::warn!("Entity {} is not an army", resolution.target_id);
                    return;
                }
                if let Some(unit) = resolution
                    .requester
                    .and_then(|e| e.as_any_mut().downcast_mut::<Unit>())
                {
                    unit.army = Some(resolution.target_id);
                }
            });
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Placed for Unit {
    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }
}

/// A gun mounted on a unit. It sweeps on the fixed tick.
#[derive(Debug, Default)]
pub struct Turret {
    pub transform: Transform,
    pub sweeps: u32,
}

impl Turret {
    pub fn mounted_on(unit: EntityId) -> Self {
        let mut transform = Transform::at(Vec3::new(0.0, 1.2, 0.0));
        transform.scale = Vec3::splat(0.5);
        transform.set_parent(Some(unit));
        Self {
            transform,
            sweeps: 0,
        }
    }
}

impl Entity for Turret {
    fn type_name(&self) -> &'static str {
        "Turret"
    }

    fn has_fixed_tick(&self) -> bool {
        true
    }

    fn fixed_tick(&mut self, _ctx: &mut FrameContext<'_>) {
        let sweep = Quaternion::from_axis_angle(Vec3::Y, TURRET_SWEEP.to_radians());
        self.transform.orientation = (sweep * self.transform.orientation).normalize();
        self.sweeps += 1;
    }

    fn serialize(&self, scope: &mut ScopeMut<'_>) -> bool {
        self.transform.serialize(scope);
        true
    }

    fn deserialize(
        &mut self,
        scope: ScopeRef<'_>,
        ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        self.transform.deserialize::<Turret>(scope, ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Placed for Turret {
    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }
}
