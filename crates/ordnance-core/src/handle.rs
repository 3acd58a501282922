//! Generation-tagged handles and slot storage.
//!
//! Everything the simulation can destroy (entities, emitters, scheduled tasks)
//! lives in a [`SlotArena`] and is addressed by a [`Handle`]. A handle is a
//! `(slot index, generation)` pair: removing a value bumps the slot's
//! generation, so a handle taken before the removal never resolves again, even
//! after the slot is reused for a new value.
//!
//! This is what gives the cleanup registry its weak-reference semantics
//! without reference counting: holding a handle keeps nothing alive, and a
//! stale handle is detected rather than aliasing whatever moved into the slot.
//!
//! # Example
//!
//! ```
//! use ordnance_core::handle::SlotArena;
//!
//! let mut arena: SlotArena<&str> = SlotArena::new();
//! let a = arena.insert("trail");
//! assert_eq!(arena.get(a), Some(&"trail"));
//!
//! arena.remove(a);
//! let b = arena.insert("flare"); // reuses the slot
//! assert_eq!(a.index(), b.index());
//! assert!(arena.get(a).is_none()); // stale
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::error;

/// Generation no slot ever reaches. Handles carrying it never resolve.
const DANGLING_GENERATION: u32 = u32::MAX;

fn next_generation(generation: u32) -> u32 {
    let next = generation.wrapping_add(1);
    if next == DANGLING_GENERATION {
        0
    } else {
        next
    }
}

/// Typed, generation-tagged reference into a [`SlotArena<T>`].
///
/// The type parameter only prevents mixing handles of different stores; it
/// carries no data. Ordering is by slot index, then generation.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    #[serde(skip)]
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Creates a handle from its raw parts.
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            marker: PhantomData,
        }
    }

    /// A handle that never resolves in any arena.
    #[must_use]
    pub const fn dangling() -> Self {
        Self::from_raw(u32::MAX, DANGLING_GENERATION)
    }

    /// Returns `true` for [`Handle::dangling`].
    #[must_use]
    pub const fn is_dangling(self) -> bool {
        self.generation == DANGLING_GENERATION
    }

    /// Slot index this handle points at.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation the slot had when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index, self.generation).cmp(&(other.index, other.generation))
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with generation-checked access.
///
/// Freed slots are reused lowest-index-first so that allocation order is a
/// pure function of the insert/remove sequence.
#[derive(Debug, Clone)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns a handle to it.
    ///
    /// Once every `u32` slot index is in use the value is dropped and a
    /// [dangling](Handle::dangling) handle is returned, so the caller sees a
    /// resource that is already gone.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        if let Some(index) = self.pop_lowest_free() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            self.len += 1;
            return Handle::from_raw(index, slot.generation);
        }
        let Ok(index) = u32::try_from(self.slots.len()) else {
            error!(slots = self.slots.len(), "slot arena exhausted; value dropped");
            return Handle::dangling();
        };
        self.len += 1;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::from_raw(index, 0)
    }

    fn pop_lowest_free(&mut self) -> Option<u32> {
        let (pos, _) = self
            .free
            .iter()
            .enumerate()
            .min_by_key(|(_, index)| **index)?;
        Some(self.free.swap_remove(pos))
    }

    /// Removes the value behind `handle`.
    ///
    /// Returns `None` when the handle is stale or was never issued; removing
    /// twice is a no-op.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = next_generation(slot.generation);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Returns `true` if `handle` still refers to a stored value.
    #[must_use]
    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Returns the value behind `handle`, if it is still live.
    #[must_use]
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable variant of [`SlotArena::get`].
    #[must_use]
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            #[allow(clippy::cast_possible_truncation)]
            let handle = Handle::from_raw(index as u32, slot.generation);
            Some((handle, value))
        })
    }

    /// Iterates live values mutably in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            let value = slot.value.as_mut()?;
            #[allow(clippy::cast_possible_truncation)]
            let handle = Handle::from_raw(index as u32, generation);
            Some((handle, value))
        })
    }

    /// Handles of all live values in slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
