//! Collaborator contracts consumed by the projectile state machine.
//!
//! The projectile never reaches for ambient globals. Every engine service it
//! needs (entity access, damage, effects, buffs, categories, scheduling,
//! randomness, destruction) is a trait, and each entry point receives the
//! host as `&mut dyn SimHost`. [`World`](crate::world::World) is the in-crate
//! implementation; tests and embedders may supply their own.

use glam::Vec3;

use crate::category::{CategoryQuery, Categories};
use crate::damage::{BuffSystem, DamageResolver};
use crate::effects::{EffectDispatcher, TargetType};
use crate::scheduler::{Task, TaskId};
use crate::trash::Destroyer;
use crate::world::{ArmyId, EntityId, EntityKind, SimEntity};

/// Access to simulated entities and the terrain they live on.
pub trait EntityHost {
    /// Borrows a live entity.
    fn entity(&self, id: EntityId) -> Option<&SimEntity>;

    /// Mutably borrows a live entity.
    fn entity_mut(&mut self, id: EntityId) -> Option<&mut SimEntity>;

    /// Adds an entity to the simulation.
    fn spawn_entity(&mut self, entity: SimEntity) -> EntityId;

    /// Removes an entity. Idempotent.
    fn destroy_entity(&mut self, id: EntityId);

    /// Plays a sound cue at the entity.
    fn play_sound(&mut self, entity: EntityId, sound: &str);

    /// Height of the terrain (or water surface, whichever is higher).
    fn surface_height(&self, x: f32, z: f32) -> f32;

    /// Terrain-specific impact effects at `position` for the given surface and
    /// impact-effect category.
    fn terrain_impact_effects(
        &self,
        position: Vec3,
        target_type: TargetType,
        category: &str,
    ) -> Vec<String>;

    /// Destroys the entity after `seconds`, replacing any earlier lifetime.
    fn set_lifetime(&mut self, entity: EntityId, seconds: f32);

    /// Returns `true` while the entity exists.
    fn entity_exists(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    /// Army of a live entity.
    fn army_of(&self, id: EntityId) -> Option<ArmyId> {
        self.entity(id).map(|e| e.army)
    }

    /// Position of a live entity.
    fn position_of(&self, id: EntityId) -> Option<Vec3> {
        self.entity(id).map(|e| e.position)
    }

    /// Current health of a live entity.
    fn health_of(&self, id: EntityId) -> Option<f32> {
        self.entity(id).map(|e| e.health)
    }

    /// Overwrites current health.
    fn set_health(&mut self, id: EntityId, health: f32) {
        if let Some(e) = self.entity_mut(id) {
            e.health = health;
        }
    }

    /// Overwrites maximum health.
    fn set_max_health(&mut self, id: EntityId, max_health: f32) {
        if let Some(e) = self.entity_mut(id) {
            e.max_health = max_health;
        }
    }

    /// Adds `delta` to current health and returns the result. Health may go
    /// negative.
    fn adjust_health(&mut self, id: EntityId, delta: f32) -> Option<f32> {
        let e = self.entity_mut(id)?;
        e.health += delta;
        Some(e.health)
    }

    /// Returns `true` if the entity is a live unit.
    fn is_unit(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|e| e.kind == EntityKind::Unit)
    }
}

/// Cooperative scheduling on the tick executor.
pub trait TaskScheduler {
    /// Queues `task` to first run `delay_ticks` from now (at least one).
    fn schedule_task(
        &mut self,
        task: Box<dyn Task>,
        owner: Option<EntityId>,
        delay_ticks: u64,
    ) -> TaskId;

    /// Cancels a pending task. Returns `false` if it was not pending.
    fn cancel_task(&mut self, task: TaskId) -> bool;

    /// Current simulation tick.
    fn current_tick(&self) -> u64;

    /// Simulation rate.
    fn ticks_per_second(&self) -> u32;
}

/// Every service a projectile may use during a transition.
pub trait SimHost:
    EntityHost
    + DamageResolver
    + BuffSystem
    + EffectDispatcher
    + TaskScheduler
    + CategoryQuery
    + Destroyer
{
    /// Uniform random index in `0..upper` from the deterministic simulation
    /// RNG. Returns 0 when `upper` is 0.
    fn random_index(&mut self, upper: usize) -> usize;
}

/// Categories of `id`, or empty for a dead entity. Convenience for hosts that
/// store categories on [`SimEntity`].
pub(crate) fn stored_categories<H: EntityHost + ?Sized>(host: &H, id: EntityId) -> Categories {
    host.entity(id).map_or(Categories::empty(), |e| e.categories)
}
