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

//! Loading a saved scene a slice at a time.

use crate::entities;
use garrison_core::Incremental;
use garrison_data::ecs::EntityManager;
use garrison_data::{DataError, SavedData, SavedDataRegistry};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// The name of the scope holding scene-wide settings.
pub const SETTINGS_SCOPE: &str = "Scene";

/// Entities restored per call to [`Incremental::step`].
pub const ENTITIES_PER_STEP: usize = 4;

/// A fully loaded scene.
#[derive(Debug)]
pub struct Scene {
    pub turn: u32,
    pub manager: EntityManager,
}

enum Stage {
    Open,
    Settings,
    Entities,
    Done,
    Failed(DataError),
}

/// A scene load that advances one stage slice per [`Incremental::step`].
pub struct SceneLoad<'a> {
    registry: &'a SavedDataRegistry,
    path: PathBuf,
    data: Option<SavedData>,
    stage: Stage,
    turn: u32,
    manager: EntityManager,
    entity_progress: f32,
}

impl<'a> SceneLoad<'a> {
    pub fn new(registry: &'a SavedDataRegistry, path: impl Into<PathBuf>) -> Self {
        let mut manager = EntityManager::new();
        entities::register(&mut manager);
        Self {
            registry,
            path: path.into(),
            data: None,
            stage: Stage::Open,
            turn: 0,
            manager,
            entity_progress: 0.0,
        }
    }

    /// Hands over the loaded scene, or the error that stopped the load.
    ///
    /// # Panics
    /// Panics if the load has not finished.
    pub fn finish(self) -> Result<Scene, DataError> {
        match self.stage {
            Stage::Done => Ok(Scene {
                turn: self.turn,
                manager: self.manager,
            }),
            Stage::Failed(error) => Err(error),
            _ => panic!("finish called on an unfinished scene load"),
        }
    }

    fn progress(&self) -> f32 {
        // Opening and settings are cheap; entities dominate.
        match self.stage {
            Stage::Open => 0.0,
            Stage::Settings => 0.05,
            Stage::Entities => 0.1 + 0.9 * self.entity_progress,
            Stage::Done | Stage::Failed(_) => 1.0,
        }
    }

    fn advance(&mut self, budget: usize) -> Result<(), DataError> {
        match self.stage {
            Stage::Open => {
                self.data = Some(SavedData::open(self.registry, &self.path, "")?);
                self.stage = Stage::Settings;
            }
            Stage::Settings => {
                if let Some(data) = &self.data {
                    match data.try_get_variable(&format!("{SETTINGS_SCOPE}.turn")) {
                        Some(turn) => self.turn = turn.read()?,
                        None => log::warn!("No scene settings in the save, starting at turn 0"),
                    }
                }
                self.stage = Stage::Entities;
            }
            Stage::Entities => {
                let Some(data) = &self.data else {
                    self.stage = Stage::Done;
                    return Ok(());
                };
                let manager = &mut self.manager;
                self.entity_progress =
                    data.read(|root| manager.deserialize(root, budget.max(1)))?;
                if self.entity_progress >= 1.0 {
                    self.data = None;
                    self.stage = Stage::Done;
                }
            }
            Stage::Done | Stage::Failed(_) => {}
        }
        Ok(())
    }
}

impl Incremental for SceneLoad<'_> {
    fn step(&mut self, budget: usize) -> f32 {
        if let Err(error) = self.advance(budget) {
            log::error!("Loading '{}' failed: {error}", self.path.display());
            self.stage = Stage::Failed(error);
        }
        self.progress()
    }

    fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done | Stage::Failed(_))
    }
}

/// Steps `work` until it is done, spending at most about `frame_budget` of
/// wall-clock time per frame. Returns the number of frames used.
pub fn drive(work: &mut impl Incremental, frame_budget: Duration) -> u32 {
    let mut frames = 0;
    while !work.is_done() {
        frames += 1;
        let start = Instant::now();
        let mut progress = 0.0;
        while !work.is_done() && start.elapsed() < frame_budget {
            progress = work.step(ENTITIES_PER_STEP);
        }
        log::debug!("Frame {frames}: {:.0}% loaded", progress * 100.0);
    }
    frames
}
