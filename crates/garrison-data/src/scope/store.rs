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

//! Slot storage for scope nodes.

use super::{ScopeId, ScopeNode};

/// Dense slot storage for the nodes of one [`ScopeTree`](super::ScopeTree).
///
/// Every slot remembers the id that last occupied it. Removing a node frees the
/// slot for reuse with a bumped generation, so ids of removed nodes go stale
/// instead of silently aliasing a newer node.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScopeStore {
    slots: Vec<(ScopeId, Option<ScopeNode>)>,
    freed: Vec<u32>,
}

impl ScopeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `node` in a recycled or fresh slot.
    pub(crate) fn insert(&mut self, node: ScopeNode) -> ScopeId {
        if let Some(index) = self.freed.pop() {
            let (id_slot, node_slot) = &mut self.slots[index as usize];
            id_slot.generation += 1;
            *node_slot = Some(node);
            *id_slot
        } else {
            let id = ScopeId {
                index: self.slots.len() as u32,
                generation: 0,
            };
            self.slots.push((id, Some(node)));
            id
        }
    }

    /// Returns the node for `id` if it is still alive.
    pub(crate) fn get(&self, id: ScopeId) -> Option<&ScopeNode> {
        self.slots
            .get(id.index as usize)
            .and_then(|(slot_id, node)| {
                if slot_id.generation == id.generation {
                    node.as_ref()
                } else {
                    None
                }
            })
    }

    pub(crate) fn get_mut(&mut self, id: ScopeId) -> Option<&mut ScopeNode> {
        self.slots
            .get_mut(id.index as usize)
            .and_then(|(slot_id, node)| {
                if slot_id.generation == id.generation {
                    node.as_mut()
                } else {
                    None
                }
            })
    }

    /// Takes the node out of its slot and frees the slot.
    pub(crate) fn remove(&mut self, id: ScopeId) -> Option<ScopeNode> {
        let (slot_id, node) = self.slots.get_mut(id.index as usize)?;
        if slot_id.generation != id.generation {
            return None;
        }
        let node = node.take()?;
        self.freed.push(id.index);
        Some(node)
    }

    /// Returns the number of live nodes.
    pub(crate) fn live_count(&self) -> usize {
        self.slots.len() - self.freed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> ScopeNode {
        ScopeNode::new(name.to_owned(), None)
    }

    #[test]
    fn test_removed_slot_is_recycled_with_new_generation() {
        let mut store = ScopeStore::new();
        let a = store.insert(node("a"));
        let b = store.insert(node("b"));

        assert_eq!(store.remove(a).map(|n| n.name), Some("a".to_owned()));
        assert!(store.get(a).is_none());
        assert!(store.remove(a).is_none());

        let c = store.insert(node("c"));
        assert_eq!(c.index, a.index);
        assert_eq!(c.generation, a.generation + 1);
        assert!(store.get(a).is_none());
        assert_eq!(store.get(c).map(|n| n.name.as_str()), Some("c"));
        assert_eq!(store.get(b).map(|n| n.name.as_str()), Some("b"));
        assert_eq!(store.live_count(), 2);
    }
}
