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

//! Defines core types related to entity identity.

use std::fmt;

/// A stable identifier for a live entity.
///
/// Unlike a generational handle, an `EntityId` is a plain 16-bit number that is
/// written verbatim into save files and read back on load, so that references
/// between entities (an army's unit list, a unit's owning army) survive a
/// save/load cycle unchanged. At most one live entity owns a given id at a time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    bytemuck::Pod,
    bytemuck::Zeroable,
)]
#[repr(transparent)]
pub struct EntityId(pub u16);

impl EntityId {
    /// The largest id the allocator can hand out.
    pub const MAX: EntityId = EntityId(u16::MAX);

    /// Creates an id from its raw value.
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw 16-bit value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for EntityId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_follows_raw_value() {
        let mut ids = vec![EntityId(7), EntityId(2), EntityId(40)];
        ids.sort();
        assert_eq!(ids, vec![EntityId(2), EntityId(7), EntityId(40)]);
        assert_eq!(ids.iter().max(), Some(&EntityId(40)));
    }

    #[test]
    fn test_display_is_prefixed() {
        assert_eq!(EntityId::new(12).to_string(), "#12");
    }
}
