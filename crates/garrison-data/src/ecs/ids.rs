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

//! The identity layer: which owner holds which [`EntityId`].

use garrison_core::EntityId;
use std::collections::HashMap;

/// An opaque token naming one entity instance for the lifetime of a manager.
///
/// Tokens are never reused, so a stale token can never match a newer owner of
/// the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerToken(pub(crate) u64);

/// Maps live ids to their owners and hands out fresh ids.
///
/// Fresh ids come from a rising counter that skips ids already taken, so ids
/// restored from a save never collide with new ones. The counter wraps past
/// `u16::MAX` back to `1`; id `0` is never handed out by the counter.
#[derive(Debug, Clone)]
pub struct IdTable {
    owners: HashMap<EntityId, OwnerToken>,
    next_id: u16,
}

impl Default for IdTable {
    fn default() -> Self {
        Self {
            owners: HashMap::new(),
            next_id: 1,
        }
    }
}

impl IdTable {
    /// Creates an empty table whose counter starts at `1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a live owner holds `id`.
    pub fn is_taken(&self, id: EntityId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Returns the owner of `id`.
    pub fn owner_of(&self, id: EntityId) -> Option<OwnerToken> {
        self.owners.get(&id).copied()
    }

    /// Returns the number of ids currently held.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if no id is held.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Returns the next id not currently taken and advances the counter past it.
    ///
    /// # Panics
    /// Panics if every id is taken.
    pub fn generate(&mut self) -> EntityId {
        assert!(
            self.owners.len() < u16::MAX as usize,
            "all entity ids are in use"
        );
        loop {
            let id = EntityId::new(self.next_id);
            self.next_id = self.next_id.checked_add(1).unwrap_or(1);
            if !self.is_taken(id) {
                return id;
            }
        }
    }

    /// Records `owner` as holding `id`, or a freshly generated id if `None`.
    ///
    /// # Panics
    /// Panics if `id` is already taken.
    pub fn alloc(&mut self, owner: OwnerToken, id: Option<EntityId>) -> EntityId {
        let id = match id {
            Some(id) => {
                assert!(!self.is_taken(id), "entity id {id} is already taken");
                id
            }
            None => self.generate(),
        };
        self.owners.insert(id, owner);
        id
    }

    /// Releases `id`. A `None` owner is a no-op.
    ///
    /// # Panics
    /// Panics if `id` is not held by `owner`.
    pub fn free(&mut self, owner: Option<OwnerToken>, id: EntityId) {
        let Some(owner) = owner else {
            return;
        };
        match self.owners.get(&id) {
            Some(&current) if current == owner => {
                self.owners.remove(&id);
            }
            Some(current) => {
                panic!("entity id {id} is owned by {current:?}, not {owner:?}")
            }
            None => panic!("entity id {id} is not allocated"),
        }
    }

    /// Moves the counter past `id` so later fresh ids skip everything up to it.
    pub fn raise_high_water(&mut self, id: EntityId) {
        self.next_id = self.next_id.max(id.raw().saturating_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_never_collide_with_live_ones() {
        let mut table = IdTable::new();
        let a = table.alloc(OwnerToken(0), None);
        let b = table.alloc(OwnerToken(1), None);
        let c = table.alloc(OwnerToken(2), None);
        assert_eq!([a, b, c].map(EntityId::raw), [1, 2, 3]);

        table.free(Some(OwnerToken(1)), b);
        let d = table.alloc(OwnerToken(3), None);
        assert!(d != a && d != c);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_generate_skips_ids_seeded_by_restore() {
        let mut table = IdTable::new();
        table.alloc(OwnerToken(0), Some(EntityId::new(1)));
        table.alloc(OwnerToken(1), Some(EntityId::new(2)));
        assert_eq!(table.generate(), EntityId::new(3));
    }

    #[test]
    fn test_raise_high_water_saturates() {
        let mut table = IdTable::new();
        table.raise_high_water(EntityId::new(40));
        assert_eq!(table.generate(), EntityId::new(41));

        table.raise_high_water(EntityId::MAX);
        assert_eq!(table.generate(), EntityId::MAX);
        // Wraps, skipping zero.
        assert_eq!(table.generate(), EntityId::new(1));
    }

    #[test]
    fn test_free_without_owner_is_noop() {
        let mut table = IdTable::new();
        let id = table.alloc(OwnerToken(5), None);
        table.free(None, id);
        assert!(table.is_taken(id));
    }

    #[test]
    #[should_panic(expected = "not OwnerToken(8)")]
    fn test_free_by_wrong_owner_panics() {
        let mut table = IdTable::new();
        let id = table.alloc(OwnerToken(7), None);
        table.free(Some(OwnerToken(8)), id);
    }

    #[test]
    #[should_panic(expected = "already taken")]
    fn test_alloc_taken_id_panics() {
        let mut table = IdTable::new();
        table.alloc(OwnerToken(0), Some(EntityId::new(9)));
        table.alloc(OwnerToken(1), Some(EntityId::new(9)));
    }
}
