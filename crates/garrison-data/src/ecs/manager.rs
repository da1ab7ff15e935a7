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

//! Ownership, lifecycle, and persistence of all live entities.

use super::entity::{DeserializeContext, Entity, FrameContext};
use super::factory::EntityFactories;
use super::ids::{IdTable, OwnerToken};
use super::requests::{pair_mut, IdRequest, Resolution};
use crate::error::DataError;
use crate::scope::{ScopeMut, ScopeRef};
use garrison_core::EntityId;
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};

/// The default interval between fixed ticks, in seconds.
pub const DEFAULT_FIXED_STEP: f32 = 0.2;

/// The name of the child scope the manager saves itself under.
pub const SCOPE_NAME: &str = "EntityManager";

/// The name of the per-record child that carries the entity's id.
pub const ENTITY_SCOPE_NAME: &str = "Entity";

/// Fraction used to stagger each entity's first fixed tick.
const FIXED_PHASE_STAGGER: f32 = 0.618_034;

struct EntityRecord {
    owner: OwnerToken,
    id: EntityId,
    entity: Box<dyn Entity>,
    since_fixed_tick: f32,
}

/// Owns every live entity and the ids they are known by.
///
/// An id moves through *unallocated*, *live*, *pending removal*, and back to
/// unallocated. Removal is deferred: [`EntityManager::remove_entity`] only
/// queues the id, and [`EntityManager::deconstruct_destroyed_entities`] does the
/// actual work between frames, so the live set never changes mid-tick.
pub struct EntityManager {
    records: Vec<EntityRecord>,
    lookup: HashMap<EntityId, usize>,
    ids: IdTable,
    next_owner: u64,
    to_remove: VecDeque<EntityId>,
    pending_removal: HashSet<EntityId>,
    requests: VecDeque<IdRequest>,
    factories: EntityFactories,
    amount_deserialized: usize,
    loading: bool,
    fixed_step: f32,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityManager {
    /// Creates an empty manager with no registered factories.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            lookup: HashMap::new(),
            ids: IdTable::new(),
            next_owner: 0,
            to_remove: VecDeque::new(),
            pending_removal: HashSet::new(),
            requests: VecDeque::new(),
            factories: EntityFactories::new(),
            amount_deserialized: 0,
            loading: false,
            fixed_step: DEFAULT_FIXED_STEP,
        }
    }

    /// Overrides the fixed-tick interval.
    pub fn with_fixed_step(mut self, seconds: f32) -> Self {
        assert!(seconds > 0.0, "fixed step must be positive");
        self.fixed_step = seconds;
        self
    }

    /// The fixed-tick interval, in seconds.
    pub fn fixed_step(&self) -> f32 {
        self.fixed_step
    }

    /// The registered entity constructors.
    pub fn factories(&self) -> &EntityFactories {
        &self.factories
    }

    /// Mutable access to the registered entity constructors.
    pub fn factories_mut(&mut self) -> &mut EntityFactories {
        &mut self.factories
    }

    /// Registers `E` so it is saved and can be restored.
    pub fn register<E: Entity + Default>(&mut self) {
        self.factories.register::<E>();
    }

    /// The id table.
    pub fn ids(&self) -> &IdTable {
        &self.ids
    }

    // --- Identity ---

    /// Returns the next id not currently taken, advancing the counter.
    pub fn generate_id(&mut self) -> EntityId {
        self.ids.generate()
    }

    /// Returns `true` if a live entity holds `id`.
    pub fn is_id_taken(&self, id: EntityId) -> bool {
        self.ids.is_taken(id)
    }

    /// Records `owner` as holding `id`, or a fresh id if `None`.
    ///
    /// # Panics
    /// Panics if `id` is already taken.
    pub fn alloc_id(&mut self, owner: OwnerToken, id: Option<EntityId>) -> EntityId {
        self.ids.alloc(owner, id)
    }

    /// Releases `id` held by `owner`. A `None` owner is a no-op.
    ///
    /// # Panics
    /// Panics if `id` is held by someone else.
    pub fn free_id(&mut self, owner: Option<OwnerToken>, id: EntityId) {
        self.ids.free(owner, id);
    }

    /// Issues a token for an owner that is not a managed entity.
    pub fn new_owner(&mut self) -> OwnerToken {
        let owner = OwnerToken(self.next_owner);
        self.next_owner += 1;
        owner
    }

    // --- Lifecycle ---

    /// Adds an entity under a fresh id.
    pub fn spawn<E: Entity>(&mut self, entity: E) -> EntityId {
        self.insert(Box::new(entity), None)
    }

    /// Adds an entity under a specific id.
    ///
    /// # Panics
    /// Panics if `id` is already taken.
    pub fn spawn_with_id<E: Entity>(&mut self, entity: E, id: EntityId) -> EntityId {
        self.insert(Box::new(entity), Some(id))
    }

    /// Adds an already boxed entity, under `id` or a fresh id.
    pub fn spawn_boxed(&mut self, entity: Box<dyn Entity>, id: Option<EntityId>) -> EntityId {
        self.insert(entity, id)
    }

    fn insert(&mut self, entity: Box<dyn Entity>, id: Option<EntityId>) -> EntityId {
        let owner = self.new_owner();
        let id = self.ids.alloc(owner, id);
        let type_name = entity.type_name();
        let since_fixed_tick =
            self.fixed_step * (id.raw() as f32 * FIXED_PHASE_STAGGER).fract();

        self.lookup.insert(id, self.records.len());
        self.records.push(EntityRecord {
            owner,
            id,
            entity,
            since_fixed_tick,
        });
        log::trace!("Spawned {type_name} as {id}");
        id
    }

    /// Queues `id` for destruction. A second request for the same id before
    /// the queue is drained is ignored with a warning.
    pub fn remove_entity(&mut self, id: EntityId) {
        if !self.pending_removal.insert(id) {
            log::warn!("Removing entity {id} twice");
            return;
        }
        self.to_remove.push_back(id);
    }

    /// Destroys every queued entity and frees its id.
    ///
    /// Removal swaps the last entity into the freed slot, so iteration order
    /// is not preserved.
    pub fn deconstruct_destroyed_entities(&mut self) {
        while let Some(id) = self.to_remove.pop_front() {
            let Some(index) = self.lookup.remove(&id) else {
                log::warn!("Entity {id} was queued for removal but is not alive");
                continue;
            };
            let record = self.records.swap_remove(index);
            if let Some(moved) = self.records.get(index) {
                self.lookup.insert(moved.id, index);
            }
            self.ids.free(Some(record.owner), id);
            log::trace!("Destroyed {} {id}", record.entity.type_name());
        }
        self.pending_removal.clear();
    }

    /// Drops every entity and pending request, and rewinds the load cursor.
    ///
    /// # Panics
    /// Panics if an id outlives the entities, which means an id was allocated
    /// through [`EntityManager::alloc_id`] and never freed.
    pub fn clear(&mut self) {
        for record in self.records.drain(..) {
            self.ids.free(Some(record.owner), record.id);
        }
        self.lookup.clear();
        self.to_remove.clear();
        self.pending_removal.clear();
        self.requests.clear();
        self.amount_deserialized = 0;
        self.loading = false;
        assert!(
            self.ids.is_empty(),
            "there are entity ids that did not get freed"
        );
    }

    // --- Frame ---

    /// Defers access to `target` until the start of the next tick.
    ///
    /// The callback also receives `requester`, if given and still alive. While
    /// an incremental load is unfinished, a request whose target has not been
    /// restored yet waits for a later tick instead of being dropped.
    pub fn delayed_id_request(
        &mut self,
        target: EntityId,
        requester: Option<EntityId>,
        callback: impl FnOnce(Resolution<'_>) + 'static,
    ) {
        self.requests
            .push_back(IdRequest::new(target, requester, callback));
    }

    /// Returns the number of deferred requests waiting for the next tick.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    fn resolve_requests(&mut self) {
        let mut waiting = VecDeque::new();
        while let Some(request) = self.requests.pop_front() {
            let Some(&target) = self.lookup.get(&request.target) else {
                if self.loading {
                    waiting.push_back(request);
                } else {
                    log::warn!(
                        "Deferred request for entity {} skipped, no such entity exists",
                        request.target
                    );
                }
                continue;
            };
            let requester = request
                .requester
                .and_then(|id| self.lookup.get(&id).copied())
                .filter(|&index| index != target);

            let (target_record, requester_record) = pair_mut(&mut self.records, target, requester);
            (request.callback)(Resolution {
                target: target_record.entity.as_mut(),
                target_id: request.target,
                requester: requester_record.map(|record| record.entity.as_mut()),
                requester_id: request.requester,
            });
        }
        if !waiting.is_empty() {
            log::trace!("{} deferred requests wait for the load to finish", waiting.len());
        }
        self.requests = waiting;
    }

    /// Advances one frame.
    ///
    /// Every deferred request is resolved first. Then each entity gets its
    /// fixed tick, if its accumulator passed the fixed step, followed by its
    /// regular tick. Destruction requested from inside a tick is queued.
    pub fn tick(&mut self, delta_time: f32) {
        self.resolve_requests();

        let fixed_step = self.fixed_step;
        let mut destroyed = Vec::new();
        for record in &mut self.records {
            if record.entity.has_fixed_tick() {
                record.since_fixed_tick += delta_time;
                if record.since_fixed_tick >= fixed_step {
                    let mut ctx = FrameContext {
                        id: record.id,
                        delta_time: fixed_step,
                        destroyed: &mut destroyed,
                    };
                    record.entity.fixed_tick(&mut ctx);
                    record.since_fixed_tick %= fixed_step;
                }
            }

            let mut ctx = FrameContext {
                id: record.id,
                delta_time,
                destroyed: &mut destroyed,
            };
            record.entity.tick(&mut ctx);
        }

        for id in destroyed {
            self.remove_entity(id);
        }
    }

    // --- Lookup ---

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no live entities.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over live entities in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &dyn Entity)> {
        self.records
            .iter()
            .map(|record| (record.id, record.entity.as_ref()))
    }

    /// Returns the entity holding `id`.
    pub fn try_get_entity(&self, id: EntityId) -> Option<&dyn Entity> {
        self.lookup
            .get(&id)
            .map(|&index| self.records[index].entity.as_ref())
    }

    /// Returns the entity holding `id` for mutation.
    pub fn try_get_entity_mut(&mut self, id: EntityId) -> Option<&mut dyn Entity> {
        let index = *self.lookup.get(&id)?;
        Some(self.records[index].entity.as_mut())
    }

    /// Returns the entity holding `id`.
    ///
    /// # Panics
    /// Panics if no live entity holds `id`.
    pub fn get_entity(&self, id: EntityId) -> &dyn Entity {
        self.try_get_entity(id)
            .unwrap_or_else(|| panic!("no live entity holds id {id}"))
    }

    /// Returns the entity holding `id` if it is a `T`.
    pub fn get<T: Entity>(&self, id: EntityId) -> Option<&T> {
        self.try_get_entity(id)?.as_any().downcast_ref::<T>()
    }

    /// Returns the entity holding `id` for mutation if it is a `T`.
    pub fn get_mut<T: Entity>(&mut self, id: EntityId) -> Option<&mut T> {
        self.try_get_entity_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Returns every live entity of type `T` with its id.
    pub fn entities_of<T: Entity>(&self) -> Vec<(EntityId, &T)> {
        self.records
            .iter()
            .filter_map(|record| {
                record
                    .entity
                    .as_any()
                    .downcast_ref::<T>()
                    .map(|entity| (record.id, entity))
            })
            .collect()
    }

    /// Resolves each id to its `T`.
    ///
    /// # Panics
    /// Panics if an id is not live or its entity is not a `T`.
    pub fn convert_to_type<T: Entity>(&self, ids: &[EntityId]) -> Vec<&T> {
        ids.iter()
            .map(|&id| {
                self.get_entity(id)
                    .as_any()
                    .downcast_ref::<T>()
                    .unwrap_or_else(|| {
                        panic!("entity {id} is not a {}", std::any::type_name::<T>())
                    })
            })
            .collect()
    }

    /// Returns the ids of the given live entities, matched by address.
    ///
    /// Entities that are not owned by this manager are skipped.
    pub fn to_entity_ids<T: Entity>(&self, entities: &[&T]) -> Vec<EntityId> {
        let by_address: HashMap<*const (), EntityId> = self
            .records
            .iter()
            .map(|record| {
                let address = record.entity.as_any() as *const dyn Any as *const ();
                (address, record.id)
            })
            .collect();
        entities
            .iter()
            .filter_map(|entity| by_address.get(&(*entity as *const T as *const ())).copied())
            .collect()
    }

    /// Drops ids that no longer name a live entity. Order is not preserved.
    pub fn remove_invalid_ids(&self, ids: &mut Vec<EntityId>) {
        let mut i = 0;
        while i < ids.len() {
            if self.lookup.contains_key(&ids[i]) {
                i += 1;
            } else {
                ids.swap_remove(i);
            }
        }
    }

    // --- Persistence ---

    /// Writes every live entity with a registered factory into a new
    /// [`SCOPE_NAME`] child of `parent`.
    ///
    /// Each record is a child named by the entity's tag holding an
    /// [`ENTITY_SCOPE_NAME`] child with its `id`, followed by whatever the
    /// entity writes itself.
    pub fn serialize(&self, parent: &mut ScopeMut<'_>) {
        let mut scope = parent.add_child(SCOPE_NAME);

        for record in &self.records {
            let type_name = record.entity.type_name();
            if !self.factories.contains(type_name) {
                continue;
            }

            let mut entity_scope = scope.add_child(type_name);
            entity_scope
                .add_child(ENTITY_SCOPE_NAME)
                .add_variable("id")
                .write(&record.id);

            let needed = record.entity.serialize(&mut entity_scope);
            let record_scope = entity_scope.id();
            if !needed {
                log::warn!("Entity type '{type_name}' saved nothing, does it need a factory?");
                scope.remove_child(record_scope);
            }
        }
    }

    /// Restores up to `max_count` more entities from the [`SCOPE_NAME`] child
    /// of `parent` and returns overall progress in `[0.0, 1.0]`.
    ///
    /// The manager remembers how many records it has restored, so repeated
    /// calls continue where the last one stopped. A save without the section
    /// reports `1.0` immediately. Until progress reaches `1.0`, deferred
    /// requests for records not restored yet stay queued across ticks.
    pub fn deserialize(&mut self, parent: ScopeRef<'_>, max_count: usize) -> Result<f32, DataError> {
        let Some(scope) = parent.try_get_scope(SCOPE_NAME) else {
            log::warn!("Could not load the entity manager, its data is missing from the save");
            self.loading = false;
            return Ok(1.0);
        };

        let total = scope.child_count();
        if total == 0 {
            self.loading = false;
            return Ok(1.0);
        }
        self.loading = true;

        for entity_scope in scope
            .children()
            .skip(self.amount_deserialized)
            .take(max_count)
        {
            let type_name = entity_scope.name();
            let mut entity =
                self.factories
                    .create(type_name)
                    .ok_or_else(|| DataError::UnknownEntityType {
                        type_name: type_name.to_owned(),
                    })?;

            let id: EntityId = entity_scope
                .try_get_variable(&format!("{ENTITY_SCOPE_NAME}.id"))
                .ok_or_else(|| DataError::MissingEntityId {
                    type_name: type_name.to_owned(),
                })?
                .read()?;

            let mut ctx = DeserializeContext {
                id,
                requests: &mut self.requests,
            };
            entity.deserialize(entity_scope, &mut ctx)?;

            self.ids.raise_high_water(id);
            self.insert(entity, Some(id));
            self.amount_deserialized += 1;
        }

        self.loading = self.amount_deserialized < total;
        Ok((self.amount_deserialized as f32 / total as f32).min(1.0))
    }

    /// The number of records restored by [`EntityManager::deserialize`] so far.
    pub fn amount_deserialized(&self) -> usize {
        self.amount_deserialized
    }

    /// Returns `true` while an incremental load has records left to restore.
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("entities", &self.records.len())
            .field("pending_removal", &self.to_remove.len())
            .field("pending_requests", &self.requests.len())
            .field("factories", &self.factories)
            .finish()
    }
}
