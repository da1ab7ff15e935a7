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

// Garrison sandbox
// Builds a small skirmish, saves it in both formats, then reloads each save
// across frames and plays a few seconds of it.

mod entities;
mod scene_load;
mod transform;

use anyhow::{ensure, Context, Result};
use entities::{Army, Turret, Unit};
use garrison_core::math::{Quaternion, Vec3};
use garrison_core::FrameClock;
use garrison_data::ecs::EntityManager;
use garrison_data::{SavedData, SavedDataRegistry};
use scene_load::{drive, Scene, SceneLoad, SETTINGS_SCOPE};
use std::time::Duration;
use transform::Placed;

const SAVE_FILES: [&str; 2] = ["skirmish.txt", "skirmish.dat"];
const FRAME_BUDGET: Duration = Duration::from_micros(200);
const FRAME_TIME: f32 = 1.0 / 30.0;
const PLAY_FRAMES: u32 = 90;
const STARTING_TURN: u32 = 3;

/// Spawns two armies with four units each; every other unit carries a turret.
///
/// Units are spawned before their army and turrets before their unit, so
/// loading the save exercises forward references.
fn build_skirmish() -> EntityManager {
    let mut manager = EntityManager::new();
    entities::register(&mut manager);

    for (side, name) in ["Northern Watch", "Southern Host"].into_iter().enumerate() {
        let mut units = Vec::new();
        for i in 0..4 {
            let facing = Quaternion::from_axis_angle(Vec3::Y, side as f32 * std::f32::consts::PI);
            let mut unit = Unit::at(Vec3::new(i as f32 * 2.0, 0.0, side as f32 * 20.0));
            unit.transform.orientation = facing;
            unit.hp = 60 + 10 * i;
            units.push(unit);
        }

        let mut ids = Vec::new();
        for (i, unit) in units.into_iter().enumerate() {
            if i % 2 == 0 {
                // Reserve the unit's id first so the turret is saved before it.
                let unit_id = manager.generate_id();
                manager.spawn(Turret::mounted_on(unit_id));
                ids.push(manager.spawn_with_id(unit, unit_id));
            } else {
                ids.push(manager.spawn(unit));
            }
        }

        let army = manager.spawn(Army {
            name: name.to_owned(),
            units: ids.clone(),
        });
        for id in ids {
            if let Some(unit) = manager.get_mut::<Unit>(id) {
                unit.army = Some(army);
            }
        }
    }
    manager
}

fn save_skirmish(registry: &SavedDataRegistry, file: &str, manager: &EntityManager) -> Result<()> {
    registry.make_empty(file)?;
    let data = SavedData::open(registry, file, "")?;
    data.write(|mut root| {
        root.add_child(SETTINGS_SCOPE)
            .add_variable("turn")
            .write(&STARTING_TURN);
        manager.serialize(&mut root);
    });
    data.save()?;

    let size = std::fs::metadata(data.file_path())?.len();
    log::info!("Saved {} entities to '{file}' ({size} bytes)", manager.len());
    Ok(())
}

fn load_skirmish(registry: &SavedDataRegistry, file: &str) -> Result<Scene> {
    let mut load = SceneLoad::new(registry, file);
    let frames = drive(&mut load, FRAME_BUDGET);
    let scene = load
        .finish()
        .with_context(|| format!("loading '{file}'"))?;
    log::info!(
        "Loaded '{file}' in {frames} frame(s): turn {}, {} entities",
        scene.turn,
        scene.manager.len()
    );
    Ok(scene)
}

fn play(scene: &mut Scene) {
    let mut clock = FrameClock::new();
    for _ in 0..PLAY_FRAMES {
        clock.advance(FRAME_TIME);
        scene.manager.tick(clock.delta_time());
        scene.manager.deconstruct_destroyed_entities();
    }
    log::info!(
        "Played {} frames ({:.1}s of game time)",
        clock.frame(),
        clock.total_time()
    );
}

fn report(scene: &Scene) -> Result<()> {
    let manager = &scene.manager;
    for (id, army) in manager.entities_of::<Army>() {
        let units = manager.convert_to_type::<Unit>(&army.units);
        let walked: f32 = units.iter().map(|unit| unit.distance_walked).sum();
        log::info!(
            "{id} '{}': {} units, {walked:.1}m walked",
            army.name,
            units.len()
        );
        ensure!(
            units.iter().all(|unit| unit.army == Some(id)),
            "a unit of '{}' lost its army link",
            army.name
        );
    }

    for (id, turret) in manager.entities_of::<Turret>() {
        let parent = turret
            .transform()
            .parent()
            .with_context(|| format!("turret {id} lost its mount"))?;
        let mount = manager
            .get::<Unit>(parent)
            .with_context(|| format!("turret {id} is mounted on a non-unit"))?;
        log::info!(
            "Turret {id} on unit {parent} at {:?}, {} sweeps",
            mount.transform().position,
            turret.sweeps
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let data_root = std::env::temp_dir().join("garrison-sandbox");
    std::fs::create_dir_all(&data_root)
        .with_context(|| format!("creating '{}'", data_root.display()))?;
    let registry = SavedDataRegistry::new(&data_root);

    let skirmish = build_skirmish();
    for file in SAVE_FILES {
        save_skirmish(&registry, file, &skirmish)?;
    }

    for file in SAVE_FILES {
        let mut scene = load_skirmish(&registry, file)?;
        ensure!(
            scene.manager.len() == skirmish.len(),
            "'{file}' restored {} of {} entities",
            scene.manager.len(),
            skirmish.len()
        );
        play(&mut scene);
        report(&scene)?;
        scene.manager.clear();
    }
    Ok(())
}
