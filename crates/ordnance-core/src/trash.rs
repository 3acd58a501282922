//! Deferred, idempotent cleanup registry.
//!
//! A [`TrashBag`] collects handles to transient resources owned by one
//! simulated object (trail emitters, decoys, scheduled tasks) and destroys
//! them together when the owner goes away.
//!
//! # Weak ownership
//!
//! The bag holds [`Tracked`] handles, never the resources themselves. Anything
//! else may destroy a tracked resource at any time without telling the bag;
//! the stale handle is then simply skipped at teardown because the host's
//! liveness check fails for it.
//!
//! # Teardown
//!
//! [`TrashBag::teardown`] takes the slot vector out of the bag before it
//! starts destroying, so the pass works on a snapshot. Resources added while a
//! teardown is running end up in a fresh vector and are handled by the next
//! teardown. A second teardown on an emptied bag does nothing.
//!
//! # Example
//!
//! ```
//! use ordnance_core::config::SimulationConfig;
//! use ordnance_core::trash::{TrashBag, Tracked};
//! use ordnance_core::world::{SimEntity, World};
//!
//! let mut world = World::new(&SimulationConfig::default());
//! let flare = world.spawn(SimEntity::default());
//!
//! let mut bag = TrashBag::new();
//! bag.add(Tracked::Entity(flare));
//!
//! assert_eq!(bag.teardown(&mut world), 1);
//! assert_eq!(bag.teardown(&mut world), 0);
//! assert!(!world.contains(flare));
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::scheduler::TaskId;
use crate::world::{EmitterId, EntityId};

/// A handle to something a [`TrashBag`] can destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tracked {
    /// A simulated entity (decoy flare, sub-projectile, ...).
    Entity(EntityId),
    /// A visual or audio emitter.
    Emitter(EmitterId),
    /// A pending cooperative task.
    Task(TaskId),
}

impl From<EntityId> for Tracked {
    fn from(id: EntityId) -> Self {
        Self::Entity(id)
    }
}

impl From<EmitterId> for Tracked {
    fn from(id: EmitterId) -> Self {
        Self::Emitter(id)
    }
}

impl From<TaskId> for Tracked {
    fn from(id: TaskId) -> Self {
        Self::Task(id)
    }
}

/// Liveness check and destruction for tracked resources.
///
/// `destroy` must be idempotent: destroying a resource that is already gone is
/// a silent no-op.
pub trait Destroyer {
    /// Returns `true` while the resource behind `resource` still exists.
    fn is_live(&self, resource: Tracked) -> bool;

    /// Destroys the resource. No-op if it is already gone.
    fn destroy(&mut self, resource: Tracked);
}

/// Per-owner cleanup registry with weak-ownership semantics.
///
/// Slots are kept in insertion order; duplicates are allowed and processed
/// independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrashBag {
    slots: Vec<Option<Tracked>>,
}

impl TrashBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Appends a handle without checking it.
    pub fn add(&mut self, resource: impl Into<Tracked>) {
        self.slots.push(Some(resource.into()));
    }

    /// Appends a handle if there is one and it is still live.
    ///
    /// Returns `true` when the handle was stored. Absent or already-dead
    /// resources are ignored silently.
    pub fn add_checked<D>(&mut self, resource: Option<Tracked>, host: &D) -> bool
    where
        D: Destroyer + ?Sized,
    {
        match resource {
            Some(resource) if host.is_live(resource) => {
                self.slots.push(Some(resource));
                true
            }
            _ => false,
        }
    }

    /// Destroys every still-live tracked resource and empties the bag.
    ///
    /// Returns the number of destroy calls made. Handles whose resource
    /// vanished out-of-band are skipped.
    pub fn teardown<D>(&mut self, host: &mut D) -> usize
    where
        D: Destroyer + ?Sized,
    {
        let snapshot = std::mem::take(&mut self.slots);
        let mut destroyed = 0;
        for resource in snapshot.into_iter().flatten() {
            if host.is_live(resource) {
                host.destroy(resource);
                destroyed += 1;
            } else {
                trace!(?resource, "skipping vanished resource");
            }
        }
        destroyed
    }

    /// Returns `true` if no slot refers to a live resource.
    #[must_use]
    pub fn is_empty<D>(&self, host: &D) -> bool
    where
        D: Destroyer + ?Sized,
    {
        self.live_count(host) == 0
    }

    /// Number of slots whose resource is still live.
    #[must_use]
    pub fn live_count<D>(&self, host: &D) -> usize
    where
        D: Destroyer + ?Sized,
    {
        self.slots
            .iter()
            .flatten()
            .filter(|resource| host.is_live(**resource))
            .count()
    }

    /// Number of slots, live or stale.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Iterates the stored handles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Tracked> + '_ {
        self.slots.iter().flatten().copied()
    }
}
