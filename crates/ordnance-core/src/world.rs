//! The in-crate simulation host.
//!
//! [`World`] stores every simulated entity and emitter, runs the cooperative
//! task scheduler, and implements each collaborator contract the projectile
//! state machine consumes ([`SimHost`] and its supertraits). Everything it
//! does that an observer could see is appended to an event log.
//!
//! # Architecture
//!
//! Entities and emitters live in [`SlotArena`]s, so iteration follows slot
//! order and stale handles never resolve. The world keeps no reference to
//! projectile behavior: damage that lands on a projectile body is queued as a
//! [`PendingHit`], and every destroyed entity is queued as a lifecycle
//! notification. The owning [`Simulation`](crate::simulation::Simulation)
//! drains both queues and routes them to the projectile hooks.
//!
//! Attached emitters (trails, glows) die with their anchor. Free-standing
//! one-shot emitters expire once `effect_lifetime` has passed.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use ordnance_core::config::SimulationConfig;
//! use ordnance_core::host::EntityHost;
//! use ordnance_core::world::{ArmyId, SimEntity, World};
//!
//! let mut world = World::new(&SimulationConfig::default());
//! let tank = world.spawn(SimEntity::unit(ArmyId::new(1), Vec3::ZERO, 300.0));
//!
//! assert_eq!(world.health_of(tank), Some(300.0));
//! world.destroy_entity(tank);
//! world.destroy_entity(tank); // idempotent
//! assert!(!world.contains(tank));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::category::{Categories, CategoryQuery, CategorySet};
use crate::config::{SimulationConfig, TerrainConfig};
use crate::damage::{AreaDamage, BuffSpec, BuffSystem, DamageResolver, DamageType, DirectDamage};
use crate::effects::{Bone, EffectDispatcher, TargetType};
use crate::events::{EventKind, SimEvent};
use crate::handle::{Handle, SlotArena};
use crate::host::{stored_categories, EntityHost, SimHost, TaskScheduler};
use crate::scheduler::{seconds_to_ticks, DelayedDestroy, Scheduler, Task, TaskId, TaskStep};
use crate::trash::{Destroyer, Tracked};

// =============================================================================
// Identifiers
// =============================================================================

/// Handle to a simulated entity.
pub type EntityId = Handle<SimEntity>;

/// Handle to a spawned emitter.
pub type EmitterId = Handle<Emitter>;

/// Faction/ownership identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ArmyId(u32);

impl ArmyId {
    /// Creates an army id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ArmyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "army{}", self.0)
    }
}

// =============================================================================
// Entities and emitters
// =============================================================================

/// Broad kind of a simulated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntityKind {
    /// Terrain decoration; never takes damage.
    #[default]
    Prop,
    /// A unit with health; dies at zero.
    Unit,
    /// The body of a projectile; damage is routed to its hooks.
    Projectile,
    /// A shield bubble.
    Shield,
    /// A decoy attached to a projectile.
    Flare,
}

/// Engine-side state of one simulated entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimEntity {
    /// Broad kind
    pub kind: EntityKind,
    /// Owning army
    pub army: ArmyId,
    /// World position (y is up)
    pub position: Vec3,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Category membership
    pub categories: Categories,
    /// Objects matching this set never collide with this one
    pub do_not_collide: CategorySet,
    /// Only collide with whatever this object is tracking
    pub hit_assigned_target_only: bool,
    /// Object this one is homing on
    pub tracking_target: Option<EntityId>,
    /// Ground position this one is aimed at
    pub target_position: Option<Vec3>,
    /// Entity this one belongs to (flares belong to their projectile)
    pub owner: Option<EntityId>,
    /// Entity that fired this one
    pub launcher: Option<EntityId>,
    /// Collision or effect radius
    pub radius: f32,
    /// Munitions a decoy draws toward itself
    pub attracts: CategorySet,
}

impl SimEntity {
    /// A unit with full health.
    #[must_use]
    pub fn unit(army: ArmyId, position: Vec3, health: f32) -> Self {
        Self {
            kind: EntityKind::Unit,
            army,
            position,
            health,
            max_health: health,
            categories: Categories::UNIT,
            ..Self::default()
        }
    }

    /// A projectile body. Health is set up by the projectile's create hook.
    #[must_use]
    pub fn projectile(army: ArmyId, position: Vec3) -> Self {
        Self {
            kind: EntityKind::Projectile,
            army,
            position,
            health: 1.0,
            max_health: 1.0,
            categories: Categories::PROJECTILE,
            ..Self::default()
        }
    }

    /// Replaces the category membership.
    #[must_use]
    pub fn with_categories(mut self, categories: Categories) -> Self {
        self.categories = categories;
        self
    }

    /// Records who fired this entity.
    #[must_use]
    pub fn with_launcher(mut self, launcher: EntityId) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Records what this entity is homing on.
    #[must_use]
    pub fn tracking(mut self, target: EntityId) -> Self {
        self.tracking_target = Some(target);
        self
    }

    /// Records the ground position this entity is aimed at.
    #[must_use]
    pub fn aimed_at(mut self, target: Vec3) -> Self {
        self.target_position = Some(target);
        self
    }
}

/// A spawned visual or audio effect instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    /// Effect blueprint identifier
    pub effect: String,
    /// Army the effect is shown for
    pub army: ArmyId,
    /// Entity the emitter was spawned on
    pub anchor: EntityId,
    /// Bone on the anchor
    pub bone: Bone,
    /// World position at spawn time
    pub position: Vec3,
    /// Follows the anchor and dies with it
    pub attached: bool,
    /// Ribbon trail rather than a particle emitter
    pub trail: bool,
    /// Uniform scale
    pub scale: f32,
    /// Offset from the anchor
    pub offset: Vec3,
}

/// Damage that landed on a projectile body and still has to reach the
/// projectile's damage hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingHit {
    /// Projectile body that was hit
    pub projectile: EntityId,
    /// Entity credited with the damage
    pub instigator: EntityId,
    /// Damage dealt
    pub amount: f32,
    /// Direction from the source to the projectile
    pub direction: Vec3,
    /// Category of the damage
    pub damage_type: DamageType,
}

// =============================================================================
// World
// =============================================================================

/// Engine-side host for the projectile core.
#[derive(Debug)]
pub struct World {
    entities: SlotArena<SimEntity>,
    emitters: SlotArena<Emitter>,
    scheduler: Scheduler,
    tick: u64,
    ticks_per_second: u32,
    effect_lifetime_ticks: u64,
    rng: ChaCha8Rng,
    terrain: TerrainConfig,
    lifetimes: BTreeMap<EntityId, TaskId>,
    attachments: BTreeMap<EntityId, Vec<EmitterId>>,
    expiring: BTreeMap<u64, Vec<EmitterId>>,
    events: Vec<SimEvent>,
    pending_hits: Vec<PendingHit>,
    destroyed: Vec<EntityId>,
}

impl World {
    /// Creates an empty world at tick 0.
    ///
    /// A zero tick rate is raised to one; use
    /// [`SimulationConfig::validate`] to reject it instead.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        let ticks_per_second = config.ticks_per_second.max(1);
        Self {
            entities: SlotArena::new(),
            emitters: SlotArena::new(),
            scheduler: Scheduler::new(),
            tick: 0,
            ticks_per_second,
            effect_lifetime_ticks: seconds_to_ticks(config.effect_lifetime, ticks_per_second)
                .max(1),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            terrain: config.terrain.clone(),
            lifetimes: BTreeMap::new(),
            attachments: BTreeMap::new(),
            expiring: BTreeMap::new(),
            events: Vec::new(),
            pending_hits: Vec::new(),
            destroyed: Vec::new(),
        }
    }

    /// Adds an entity and returns its handle.
    pub fn spawn(&mut self, entity: SimEntity) -> EntityId {
        let kind = entity.kind;
        let id = self.entities.insert(entity);
        trace!(entity = %id, ?kind, "spawned");
        id
    }

    /// Returns `true` while the entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterates live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &SimEntity)> + '_ {
        self.entities.iter()
    }

    /// Looks up a live emitter.
    #[must_use]
    pub fn emitter(&self, id: EmitterId) -> Option<&Emitter> {
        self.emitters.get(id)
    }

    /// Number of live emitters.
    #[must_use]
    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    /// Live emitters anchored on `entity`.
    pub fn emitters_on(
        &self,
        entity: EntityId,
    ) -> impl Iterator<Item = (EmitterId, &Emitter)> + '_ {
        self.emitters.iter().filter(move |(_, e)| e.anchor == entity)
    }

    /// The task scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The terrain description.
    #[must_use]
    pub fn terrain(&self) -> &TerrainConfig {
        &self.terrain
    }

    /// Events recorded since the last drain.
    #[must_use]
    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drains damage that landed on projectile bodies.
    pub fn take_pending_hits(&mut self) -> Vec<PendingHit> {
        std::mem::take(&mut self.pending_hits)
    }

    /// Drains destruction notifications.
    pub fn take_destroyed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.destroyed)
    }

    /// Advances one tick, releases expired one-shot emitters and runs every
    /// task due on it.
    ///
    /// Tasks scheduled while the tick runs are due on a later tick.
    pub fn step(&mut self) {
        self.tick += 1;
        self.expire_emitters();
        while let Some((id, mut task)) = self.scheduler.pop_due(self.tick) {
            trace!(task = task.name(), tick = self.tick, "resuming task");
            match task.resume(self) {
                TaskStep::Wait(ticks) => {
                    let due = self.tick + ticks.max(1);
                    self.scheduler.requeue(id, task, due);
                }
                TaskStep::Done => self.scheduler.finish(id),
            }
        }
    }

    fn expire_emitters(&mut self) {
        while let Some(entry) = self.expiring.first_entry() {
            if *entry.key() > self.tick {
                break;
            }
            for emitter in entry.remove() {
                self.remove_emitter(emitter);
            }
        }
    }

    fn record(&mut self, kind: EventKind) {
        self.events.push(SimEvent {
            tick: self.tick,
            kind,
        });
    }

    fn spawn_emitter(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
        attached: bool,
        trail: bool,
    ) -> Option<EmitterId> {
        let position = self.entities.get(entity)?.position;
        let emitter = self.emitters.insert(Emitter {
            effect: effect.to_string(),
            army,
            anchor: entity,
            bone,
            position,
            attached,
            trail,
            scale: 1.0,
            offset: Vec3::ZERO,
        });
        if attached {
            self.attachments.entry(entity).or_default().push(emitter);
        } else {
            let expiry = self.tick + self.effect_lifetime_ticks;
            self.expiring.entry(expiry).or_default().push(emitter);
        }
        self.record(EventKind::EmitterSpawned {
            emitter,
            entity,
            effect: effect.to_string(),
        });
        Some(emitter)
    }

    fn remove_emitter(&mut self, emitter: EmitterId) {
        if self.emitters.remove(emitter).is_some() {
            self.record(EventKind::EmitterDestroyed { emitter });
        }
    }

    fn damage_entity(
        &mut self,
        target: EntityId,
        instigator: EntityId,
        amount: f32,
        origin: Vec3,
        damage_type: DamageType,
    ) {
        let Some(entity) = self.entities.get_mut(target) else {
            return;
        };
        let kind = entity.kind;
        match kind {
            EntityKind::Unit => {
                entity.health -= amount;
                if entity.health <= 0.0 {
                    debug!(unit = %target, "unit killed");
                    self.destroy_entity(target);
                }
            }
            EntityKind::Projectile => {
                let direction = (entity.position - origin).normalize_or_zero();
                self.pending_hits.push(PendingHit {
                    projectile: target,
                    instigator,
                    amount,
                    direction,
                    damage_type,
                });
            }
            EntityKind::Prop | EntityKind::Shield | EntityKind::Flare => {}
        }
    }
}

// =============================================================================
// Collaborator contracts
// =============================================================================

impl EntityHost for World {
    fn entity(&self, id: EntityId) -> Option<&SimEntity> {
        self.entities.get(id)
    }

    fn entity_mut(&mut self, id: EntityId) -> Option<&mut SimEntity> {
        self.entities.get_mut(id)
    }

    fn spawn_entity(&mut self, entity: SimEntity) -> EntityId {
        self.spawn(entity)
    }

    fn destroy_entity(&mut self, id: EntityId) {
        if self.entities.remove(id).is_none() {
            return;
        }
        for emitter in self.attachments.remove(&id).unwrap_or_default() {
            self.remove_emitter(emitter);
        }
        if let Some(lifetime) = self.lifetimes.remove(&id) {
            self.scheduler.cancel(lifetime);
        }
        self.destroyed.push(id);
        self.record(EventKind::EntityDestroyed { entity: id });
        debug!(entity = %id, "destroyed");
    }

    fn play_sound(&mut self, entity: EntityId, sound: &str) {
        self.record(EventKind::SoundPlayed {
            entity,
            sound: sound.to_string(),
        });
    }

    fn surface_height(&self, _x: f32, _z: f32) -> f32 {
        self.terrain.surface_height()
    }

    fn terrain_impact_effects(
        &self,
        position: Vec3,
        target_type: TargetType,
        category: &str,
    ) -> Vec<String> {
        let terrain_type = self.terrain.terrain_type_for(target_type);
        trace!(%terrain_type, x = position.x, z = position.z, "terrain impact lookup");
        self.terrain
            .effects_for(terrain_type, target_type, category)
            .to_vec()
    }

    fn set_lifetime(&mut self, entity: EntityId, seconds: f32) {
        if !self.contains(entity) {
            return;
        }
        if let Some(previous) = self.lifetimes.remove(&entity) {
            self.cancel_task(previous);
        }
        let ticks = seconds_to_ticks(seconds, self.ticks_per_second).max(1);
        let task = self.schedule_task(Box::new(DelayedDestroy::new(entity)), Some(entity), ticks);
        self.lifetimes.insert(entity, task);
    }
}

impl DamageResolver for World {
    fn apply_area_damage(&mut self, damage: &AreaDamage) {
        self.record(EventKind::AreaDamage(damage.clone()));
        let instigator_army = self.army_of(damage.instigator);
        let center = Vec2::new(damage.position.x, damage.position.z);
        let radius_sq = damage.radius * damage.radius;
        let victims: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| matches!(e.kind, EntityKind::Unit | EntityKind::Projectile))
            .filter(|(_, e)| {
                center.distance_squared(Vec2::new(e.position.x, e.position.z)) <= radius_sq
            })
            .filter(|(id, _)| damage.source != Some(*id))
            .filter(|(id, e)| {
                if *id == damage.instigator {
                    return damage.self_damage;
                }
                damage.friendly_fire || instigator_army != Some(e.army)
            })
            .map(|(id, _)| id)
            .collect();
        trace!(victims = victims.len(), radius = damage.radius, "area damage");
        for victim in victims {
            self.damage_entity(
                victim,
                damage.instigator,
                damage.amount,
                damage.position,
                damage.damage_type,
            );
        }
    }

    fn apply_direct_damage(&mut self, damage: &DirectDamage) {
        self.record(EventKind::DirectDamage(damage.clone()));
        self.damage_entity(
            damage.target,
            damage.instigator,
            damage.amount,
            damage.position,
            damage.damage_type,
        );
    }
}

impl BuffSystem for World {
    fn apply_buff(&mut self, target: EntityId, buff: &BuffSpec, center: Option<Vec3>) {
        self.record(EventKind::BuffApplied {
            target,
            buff: buff.name.clone(),
            center,
        });
    }
}

impl EffectDispatcher for World {
    fn spawn_emitter_at_entity(
        &mut self,
        entity: EntityId,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId> {
        self.spawn_emitter(entity, Bone::Origin, army, effect, false, false)
    }

    fn spawn_emitter_at_bone(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId> {
        self.spawn_emitter(entity, bone, army, effect, false, false)
    }

    fn attach_emitter(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId> {
        self.spawn_emitter(entity, bone, army, effect, true, false)
    }

    fn create_trail(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId> {
        self.spawn_emitter(entity, bone, army, effect, true, true)
    }

    fn scale_emitter(&mut self, emitter: EmitterId, scale: f32) {
        if let Some(e) = self.emitters.get_mut(emitter) {
            e.scale = scale;
            self.record(EventKind::EmitterScaled { emitter, scale });
        }
    }

    fn offset_emitter(&mut self, emitter: EmitterId, x: f32, y: f32, z: f32) {
        if let Some(e) = self.emitters.get_mut(emitter) {
            let offset = Vec3::new(x, y, z);
            e.offset = offset;
            self.record(EventKind::EmitterOffset { emitter, offset });
        }
    }
}

impl TaskScheduler for World {
    fn schedule_task(
        &mut self,
        task: Box<dyn Task>,
        owner: Option<EntityId>,
        delay_ticks: u64,
    ) -> TaskId {
        let name = task.name();
        let due_tick = self.tick + delay_ticks.max(1);
        let id = self.scheduler.schedule(task, owner, due_tick);
        trace!(task = name, due_tick, "scheduled");
        self.record(EventKind::TaskScheduled {
            task: id,
            name: name.to_string(),
            due_tick,
        });
        id
    }

    fn cancel_task(&mut self, task: TaskId) -> bool {
        if !self.scheduler.cancel(task) {
            return false;
        }
        self.record(EventKind::TaskCancelled { task });
        true
    }

    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }
}

impl CategoryQuery for World {
    fn categories_of(&self, entity: EntityId) -> Categories {
        stored_categories(self, entity)
    }
}

impl Destroyer for World {
    fn is_live(&self, resource: Tracked) -> bool {
        match resource {
            Tracked::Entity(id) => self.entities.contains(id),
            Tracked::Emitter(id) => self.emitters.contains(id),
            Tracked::Task(id) => self.scheduler.is_pending(id),
        }
    }

    fn destroy(&mut self, resource: Tracked) {
        match resource {
            Tracked::Entity(id) => self.destroy_entity(id),
            Tracked::Emitter(id) => self.remove_emitter(id),
            Tracked::Task(id) => {
                self.cancel_task(id);
            }
        }
    }
}

impl SimHost for World {
    fn random_index(&mut self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }
        self.rng.gen_range(0..upper)
    }
}

// =============================================================================
// Tests
// =============================================================================
