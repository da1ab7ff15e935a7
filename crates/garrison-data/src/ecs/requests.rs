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

//! Deferred id resolution.
//!
//! Entities are restored in save order, so one may refer to another that does
//! not exist yet. Such lookups are queued and resolved, first in first out, at
//! the start of the next tick.

use super::entity::Entity;
use garrison_core::EntityId;

/// What a deferred request resolves to.
pub struct Resolution<'a> {
    /// The entity that was asked for.
    pub target: &'a mut dyn Entity,
    /// The id that was asked for.
    pub target_id: EntityId,
    /// The entity that made the request, if it is still alive and is not the
    /// target itself.
    pub requester: Option<&'a mut dyn Entity>,
    /// The id of the entity that made the request, if any.
    pub requester_id: Option<EntityId>,
}

pub(crate) type IdCallback = Box<dyn FnOnce(Resolution<'_>)>;

pub(crate) struct IdRequest {
    pub(crate) target: EntityId,
    pub(crate) requester: Option<EntityId>,
    pub(crate) callback: IdCallback,
}

impl IdRequest {
    pub(crate) fn new(
        target: EntityId,
        requester: Option<EntityId>,
        callback: impl FnOnce(Resolution<'_>) + 'static,
    ) -> Self {
        Self {
            target,
            requester,
            callback: Box::new(callback),
        }
    }
}

/// Borrows `items[a]` and, if given, a distinct `items[b]` at the same time.
pub(crate) fn pair_mut<T>(items: &mut [T], a: usize, b: Option<usize>) -> (&mut T, Option<&mut T>) {
    match b {
        None => (&mut items[a], None),
        Some(b) => {
            assert_ne!(a, b, "pair_mut needs two distinct indices");
            if a < b {
                let (left, right) = items.split_at_mut(b);
                (&mut left[a], Some(&mut right[0]))
            } else {
                let (left, right) = items.split_at_mut(a);
                (&mut right[0], Some(&mut left[b]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_mut_in_both_orders() {
        let mut items = [1, 2, 3, 4];
        {
            let (a, b) = pair_mut(&mut items, 0, Some(3));
            std::mem::swap(a, b.unwrap());
        }
        {
            let (a, b) = pair_mut(&mut items, 2, Some(1));
            *a += 10;
            *b.unwrap() += 20;
        }
        let (a, b) = pair_mut(&mut items, 1, None);
        *a += 1;
        assert!(b.is_none());
        assert_eq!(items, [4, 23, 13, 1]);
    }
}
