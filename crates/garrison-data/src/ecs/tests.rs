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

use super::*;
use crate::error::DataError;
use crate::scope::{ScopeMut, ScopeRef, ScopeTree};
use garrison_core::{EntityId, Format};
use std::any::Any;

// --- DUMMY ENTITIES FOR TESTING ---

#[derive(Debug, Default)]
struct Army {
    name: String,
    units: Vec<EntityId>,
}

impl Entity for Army {
    fn type_name(&self) -> &'static str {
        "Army"
    }

    fn serialize(&self, scope: &mut ScopeMut<'_>) -> bool {
        scope.add_variable("name").write_str(&self.name);
        true
    }

    fn deserialize(
        &mut self,
        scope: ScopeRef<'_>,
        _ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        self.name = scope.get_variable("name").read()?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default)]
struct Unit {
    hp: i32,
    army: Option<EntityId>,
    army_linked: bool,
    army_linked_at_first_tick: Option<bool>,
    skip_save: bool,
    ticks: u32,
    fixed_ticks: u32,
    die_on_tick: bool,
}

impl Entity for Unit {
    fn type_name(&self) -> &'static str {
        "Unit"
    }

    fn tick(&mut self, ctx: &mut FrameContext<'_>) {
        self.army_linked_at_first_tick.get_or_insert(self.army_linked);
        self.ticks += 1;
        if self.die_on_tick {
            ctx.destroy_self();
        }
    }

    fn has_fixed_tick(&self) -> bool {
        true
    }

    fn fixed_tick(&mut self, _ctx: &mut FrameContext<'_>) {
        self.fixed_ticks += 1;
    }

    fn serialize(&self, scope: &mut ScopeMut<'_>) -> bool {
        if self.skip_save {
            return false;
        }
        scope.add_variable("hp").write(&self.hp);
        if let Some(army) = self.army {
            scope.add_variable("army").write(&army);
        }
        true
    }

    fn deserialize(
        &mut self,
        scope: ScopeRef<'_>,
        ctx: &mut DeserializeContext<'_>,
    ) -> Result<(), DataError> {
        self.hp = scope.get_variable("hp").read()?;
        if let Some(army) = scope.try_get_variable("army") {
            let army: EntityId = army.read()?;
            self.army = Some(army);
            ctx.request_id(army, |resolution| {
                let unit_id = resolution.requester_id;
                if let Some(unit) = resolution
                    .requester
                    .and_then(|e| e.as_any_mut().downcast_mut::<Unit>())
                {
                    unit.army_linked = true;
                }
                if let (Some(army), Some(unit_id)) = (
                    resolution.target.as_any_mut().downcast_mut::<Army>(),
                    unit_id,
                ) {
                    army.units.push(unit_id);
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

/// Never registered, so never saved.
#[derive(Debug, Default)]
struct Projectile;

impl Entity for Projectile {
    fn type_name(&self) -> &'static str {
        "Projectile"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn manager() -> EntityManager {
    let mut manager = EntityManager::new();
    manager.register::<Army>();
    manager.register::<Unit>();
    manager
}

fn unit(hp: i32) -> Unit {
    Unit {
        hp,
        ..Default::default()
    }
}

fn save(manager: &EntityManager, format: Format) -> ScopeTree {
    let mut tree = ScopeTree::new(format);
    manager.serialize(&mut tree.root_mut());
    tree
}

// --- TESTS ---

#[test]
fn test_ids_are_unique_across_free_and_realloc() {
    // --- 1. SETUP ---
    let mut manager = manager();
    let a = manager.spawn(unit(1));
    let b = manager.spawn(unit(2));
    let c = manager.spawn(unit(3));
    assert_eq!([a, b, c].map(EntityId::raw), [1, 2, 3]);

    // --- 2. ACTION ---
    manager.remove_entity(b);
    manager.deconstruct_destroyed_entities();
    let d = manager.spawn(unit(4));

    // --- 3. ASSERTIONS ---
    assert!(!manager.is_id_taken(b) || d == b);
    assert_ne!(d, a);
    assert_ne!(d, c);
    assert_eq!(manager.len(), 3);
    assert_eq!(manager.get::<Unit>(c).map(|u| u.hp), Some(3));
}

#[test]
fn test_swap_remove_keeps_lookup_consistent() {
    let mut manager = manager();
    let ids: Vec<_> = (0..5).map(|hp| manager.spawn(unit(hp))).collect();

    manager.remove_entity(ids[0]);
    manager.remove_entity(ids[2]);
    manager.deconstruct_destroyed_entities();

    assert_eq!(manager.len(), 3);
    for (hp, &id) in ids.iter().enumerate() {
        let alive = manager.get::<Unit>(id).map(|u| u.hp);
        match hp {
            0 | 2 => assert_eq!(alive, None),
            _ => assert_eq!(alive, Some(hp as i32)),
        }
    }
}

#[test]
fn test_double_removal_is_ignored() {
    let mut manager = manager();
    let id = manager.spawn(unit(1));
    manager.spawn(unit(2));

    manager.remove_entity(id);
    manager.remove_entity(id);
    manager.deconstruct_destroyed_entities();

    assert_eq!(manager.len(), 1);
    assert!(!manager.is_id_taken(id));
}

#[test]
#[should_panic(expected = "already taken")]
fn test_spawn_with_taken_id_panics() {
    let mut manager = manager();
    let id = manager.spawn(unit(1));
    manager.spawn_with_id(unit(2), id);
}

#[test]
fn test_destroy_from_tick_is_deferred() {
    let mut manager = manager();
    let doomed = manager.spawn(Unit {
        die_on_tick: true,
        ..Default::default()
    });

    manager.tick(0.016);
    assert!(manager.try_get_entity(doomed).is_some());

    manager.deconstruct_destroyed_entities();
    assert!(manager.try_get_entity(doomed).is_none());
}

#[test]
fn test_fixed_tick_follows_per_entity_accumulator() {
    let mut manager = EntityManager::new().with_fixed_step(0.5);
    let id = manager.spawn(unit(1));
    assert_eq!(id, EntityId::new(1));

    // Id 1 starts about 0.309s into its first step.
    for _ in 0..4 {
        manager.tick(0.25);
    }

    let unit = manager.get::<Unit>(id).unwrap();
    assert_eq!(unit.ticks, 4);
    assert_eq!(unit.fixed_ticks, 2);
}

#[test]
fn test_serialize_skips_unregistered_and_prunes_empty_records() {
    // --- 1. SETUP ---
    let mut manager = manager();
    manager.spawn(unit(10));
    manager.spawn(Projectile);
    manager.spawn(Unit {
        skip_save: true,
        ..Default::default()
    });
    manager.spawn(unit(30));

    // --- 2. ACTION ---
    let tree = save(&manager, Format::Readable);

    // --- 3. ASSERTIONS ---
    let records: Vec<_> = tree.get_scope(SCOPE_NAME).children().collect();
    assert_eq!(records.len(), 2, "only the two saved units remain");
    assert!(records.iter().all(|r| r.name() == "Unit"));
    assert_eq!(records[0].get_variable("hp").read::<i32>().unwrap(), 10);
    assert_eq!(records[1].get_variable("hp").read::<i32>().unwrap(), 30);
    assert_eq!(
        records[1].get_variable("Entity.id").read::<EntityId>().unwrap(),
        EntityId::new(4)
    );
}

#[test]
fn test_incremental_deserialize_in_bounded_steps() {
    // --- 1. SETUP ---
    let mut source = manager();
    for hp in 0..10 {
        source.spawn(unit(hp));
    }
    let tree = save(&source, Format::Binary);
    let mut target = manager();

    // --- 2. ACTION ---
    let mut progress = Vec::new();
    loop {
        let p = target.deserialize(tree.root(), 3).unwrap();
        progress.push(p);
        if p >= 1.0 {
            break;
        }
    }

    // --- 3. ASSERTIONS ---
    assert_eq!(progress.len(), 4);
    approx::assert_relative_eq!(progress[0], 0.3);
    approx::assert_relative_eq!(progress[2], 0.9);
    assert_eq!(progress[3], 1.0);
    assert_eq!(target.len(), 10);
    assert_eq!(target.get::<Unit>(EntityId::new(7)).map(|u| u.hp), Some(6));

    let fresh = target.spawn(unit(99));
    assert!(fresh > EntityId::new(10));
}

#[test]
fn test_forward_reference_resolves_before_first_tick() {
    // --- 1. SETUP ---
    // The unit is saved before the army it belongs to.
    let mut source = manager();
    let unit_id = source.spawn(unit(5));
    let army_id = source.spawn(Army {
        name: "North".to_owned(),
        units: Vec::new(),
    });
    if let Some(u) = source.get_mut::<Unit>(unit_id) {
        u.army = Some(army_id);
    }
    let tree = save(&source, Format::Readable);

    // --- 2. ACTION ---
    let mut target = manager();
    let first = target.deserialize(tree.root(), 1).unwrap();
    let second = target.deserialize(tree.root(), 1).unwrap();
    assert_eq!((first, second), (0.5, 1.0));
    assert_eq!(target.pending_requests(), 1);
    assert!(!target.get::<Unit>(unit_id).unwrap().army_linked);

    target.tick(0.016);

    // --- 3. ASSERTIONS ---
    assert_eq!(target.pending_requests(), 0);
    let unit = target.get::<Unit>(unit_id).unwrap();
    assert!(unit.army_linked);
    assert_eq!(unit.army_linked_at_first_tick, Some(true));
    let army = target.get::<Army>(army_id).unwrap();
    assert_eq!(army.name, "North");
    assert_eq!(army.units, vec![unit_id]);
}

#[test]
fn test_requests_resolve_in_fifo_order_and_skip_missing_targets() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut manager = manager();
    let a = manager.spawn(unit(1));
    let b = manager.spawn(unit(2));
    let order = Rc::new(RefCell::new(Vec::new()));

    for target in [b, EntityId::new(500), a] {
        let order = Rc::clone(&order);
        manager.delayed_id_request(target, None, move |resolution| {
            order.borrow_mut().push(resolution.target_id);
        });
    }
    manager.tick(0.0);

    assert_eq!(*order.borrow(), vec![b, a]);
}

#[test]
fn test_unresolved_requests_wait_until_the_load_finishes() {
    // --- 1. SETUP ---
    let mut source = manager();
    source.spawn(unit(3));
    source.spawn(unit(4));
    let tree = save(&source, Format::Readable);

    // --- 2. ACTION ---
    let mut target = manager();
    assert_eq!(target.deserialize(tree.root(), 1).unwrap(), 0.5);
    target.delayed_id_request(EntityId::new(500), None, |_| {
        panic!("no entity 500 is ever restored")
    });
    target.tick(0.0);
    let waiting_mid_load = target.pending_requests();

    assert_eq!(target.deserialize(tree.root(), 1).unwrap(), 1.0);
    target.tick(0.0);

    // --- 3. ASSERTIONS ---
    assert_eq!(waiting_mid_load, 1);
    assert_eq!(target.pending_requests(), 0);
    assert!(!target.is_loading());
}

#[test]
fn test_deserialize_edge_cases() {
    let mut manager = manager();
    let empty = ScopeTree::new(Format::Readable);
    assert_eq!(manager.deserialize(empty.root(), 5).unwrap(), 1.0);

    let mut tree = ScopeTree::new(Format::Readable);
    tree.root_mut().add_child(SCOPE_NAME);
    assert_eq!(manager.deserialize(tree.root(), 5).unwrap(), 1.0);

    tree.root_mut()
        .into_scope(SCOPE_NAME)
        .unwrap()
        .add_child("Dragon");
    assert!(matches!(
        manager.deserialize(tree.root(), 5),
        Err(DataError::UnknownEntityType { type_name }) if type_name == "Dragon"
    ));

    let mut tree = ScopeTree::new(Format::Readable);
    tree.root_mut()
        .into_child(SCOPE_NAME)
        .add_child("Unit")
        .add_variable("hp")
        .write(&1);
    assert!(matches!(
        manager.deserialize(tree.root(), 5),
        Err(DataError::MissingEntityId { .. })
    ));
}

#[test]
fn test_typed_views() {
    let mut manager = manager();
    let u1 = manager.spawn(unit(1));
    let army = manager.spawn(Army::default());
    let u2 = manager.spawn(unit(2));

    assert_eq!(manager.entities_of::<Unit>().len(), 2);
    assert_eq!(manager.entities_of::<Army>()[0].0, army);

    let hps: Vec<i32> = manager
        .convert_to_type::<Unit>(&[u2, u1])
        .iter()
        .map(|u| u.hp)
        .collect();
    assert_eq!(hps, vec![2, 1]);

    let units: Vec<&Unit> = manager.entities_of::<Unit>().into_iter().map(|(_, u)| u).collect();
    let mut ids = manager.to_entity_ids(&units);
    ids.sort();
    assert_eq!(ids, vec![u1, u2]);

    manager.remove_entity(u1);
    manager.deconstruct_destroyed_entities();
    let mut selection = vec![u1, army, EntityId::new(77), u2];
    manager.remove_invalid_ids(&mut selection);
    selection.sort();
    assert_eq!(selection, vec![army, u2]);
}

#[test]
#[should_panic(expected = "is not a")]
fn test_convert_to_wrong_type_panics() {
    let mut manager = manager();
    let army = manager.spawn(Army::default());
    manager.convert_to_type::<Unit>(&[army]);
}

#[test]
fn test_clear_frees_every_id() {
    let mut manager = manager();
    let id = manager.spawn(unit(1));
    manager.delayed_id_request(id, None, |_| {});
    manager.clear();

    assert!(manager.is_empty());
    assert!(manager.ids().is_empty());
    assert_eq!(manager.pending_requests(), 0);
}
