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

//! Constructors for entity types that can be restored from a save.

use super::entity::Entity;
use std::collections::HashMap;
use std::fmt;

/// Builds a blank entity that is then filled in by [`Entity::deserialize`].
pub type EntityConstructor = Box<dyn Fn() -> Box<dyn Entity>>;

/// Entity constructors keyed by the stable tag each type saves itself under.
///
/// Only entities whose tag is registered here are written to saves; the rest
/// are treated as transient.
#[derive(Default)]
pub struct EntityFactories {
    constructors: HashMap<&'static str, EntityConstructor>,
}

impl EntityFactories {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `E` under the tag returned by its [`Entity::type_name`].
    pub fn register<E: Entity + Default>(&mut self) {
        let type_name = E::default().type_name();
        self.register_with(type_name, || Box::new(E::default()));
    }

    /// Registers an explicit constructor under `type_name`, replacing any
    /// previous one.
    pub fn register_with(
        &mut self,
        type_name: &'static str,
        constructor: impl Fn() -> Box<dyn Entity> + 'static,
    ) {
        if self
            .constructors
            .insert(type_name, Box::new(constructor))
            .is_some()
        {
            log::debug!("Replaced the factory for entity type '{type_name}'");
        }
    }

    /// Returns `true` if `type_name` has a constructor.
    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Builds a blank entity of `type_name`.
    pub fn create(&self, type_name: &str) -> Option<Box<dyn Entity>> {
        self.constructors.get(type_name).map(|construct| construct())
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Returns `true` if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for EntityFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}
