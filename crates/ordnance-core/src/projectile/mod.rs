//! The projectile lifecycle state machine.
//!
//! A [`Projectile`] pairs a [`ProjectileCore`] (the shared state and the base
//! implementation of every transition) with a boxed [`ProjectileBehavior`]
//! (the overridable hook table). Variants override hooks and call back into
//! the core for the base behavior.
//!
//! # States
//!
//! ```text
//! Created -> Active -> { Impacted, Killed, Reclaimed } -> Destroyed
//! ```
//!
//! `Destroyed` is absorbing. The terminal transition tears down the
//! projectile's [`TrashBag`] and removes its body from the host, and runs at
//! most once however many paths reach it.
//!
//! # Services
//!
//! Every transition receives the host as `&mut dyn SimHost`. The core never
//! stores the host, so a projectile can be driven by the in-crate
//! [`World`](crate::world::World) or by any other implementation.

mod behavior;
mod collision;
mod impact;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::blueprint::{FlareSpec, ProjectileBlueprint};
use crate::category::{Categories, CategorySet};
use crate::damage::{DamageData, DamagePayload, DamageRing, DamageType};
use crate::effects::{spawn_effect_group, Bone, EffectGroup, TargetType};
use crate::host::SimHost;
use crate::scheduler::{Task, TaskId};
use crate::trash::{Tracked, TrashBag};
use crate::world::{ArmyId, EmitterId, EntityId, EntityKind, PendingHit, SimEntity};

pub use behavior::{DefaultBehavior, DummyBehavior, FlareBehavior, NukeBehavior, ProjectileBehavior};
pub use collision::WeaponInfo;

/// Lifecycle state of a projectile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Constructed, create hook not yet run.
    Created,
    /// In flight.
    Active,
    /// Hit something and is still alive (impact timeout or surviving impact).
    Impacted,
    /// Shot down; on-killed effects spawned.
    Killed,
    /// Removed by reclamation.
    Reclaimed,
    /// Gone. Absorbing.
    Destroyed,
}

impl LifecycleState {
    /// Returns `true` once the projectile has been killed, reclaimed or
    /// destroyed.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Killed | Self::Reclaimed | Self::Destroyed)
    }
}

/// One damage call reaching a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingDamage {
    /// Entity credited with the damage
    pub instigator: Option<EntityId>,
    /// Damage dealt
    pub amount: f32,
    /// Direction the damage came from
    pub direction: Vec3,
    /// Category of the damage
    pub damage_type: DamageType,
}

impl IncomingDamage {
    /// Normal damage with no instigator.
    #[must_use]
    pub fn new(amount: f32) -> Self {
        Self {
            instigator: None,
            amount,
            direction: Vec3::ZERO,
            damage_type: DamageType::Normal,
        }
    }

    /// Sets the damage type.
    #[must_use]
    pub fn with_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    /// Sets the instigator.
    #[must_use]
    pub fn with_instigator(mut self, instigator: EntityId) -> Self {
        self.instigator = Some(instigator);
        self
    }
}

impl From<&PendingHit> for IncomingDamage {
    fn from(hit: &PendingHit) -> Self {
        Self {
            instigator: Some(hit.instigator),
            amount: hit.amount,
            direction: hit.direction,
            damage_type: hit.damage_type,
        }
    }
}

/// State shared by every projectile variant, plus the base transitions.
#[derive(Debug)]
pub struct ProjectileCore {
    id: EntityId,
    army: ArmyId,
    launcher: Option<EntityId>,
    blueprint: Rc<ProjectileBlueprint>,
    damage: DamagePayload,
    rings: Vec<DamageRing>,
    trash: Option<TrashBag>,
    state: LifecycleState,
    in_water: bool,
    always_destroy_on_impact: CategorySet,
}

impl ProjectileCore {
    /// Creates the core for the projectile body `id`.
    #[must_use]
    pub fn new(id: EntityId, blueprint: Rc<ProjectileBlueprint>) -> Self {
        Self {
            id,
            army: ArmyId::default(),
            launcher: None,
            blueprint,
            damage: DamagePayload::default(),
            rings: Vec::new(),
            trash: None,
            state: LifecycleState::Created,
            in_water: false,
            always_destroy_on_impact: CategorySet::all_of(
                Categories::ANTIMISSILE | Categories::PROJECTILE,
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Handle of the projectile body.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Owning army, recorded on create.
    #[must_use]
    pub fn army(&self) -> ArmyId {
        self.army
    }

    /// Launching entity, recorded on create.
    #[must_use]
    pub fn launcher(&self) -> Option<EntityId> {
        self.launcher
    }

    /// Content descriptor.
    #[must_use]
    pub fn blueprint(&self) -> &ProjectileBlueprint {
        &self.blueprint
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Cleanup registry; `None` until create has run, and for variants that
    /// skip it.
    #[must_use]
    pub fn trash(&self) -> Option<&TrashBag> {
        self.trash.as_ref()
    }

    /// Returns `true` between entering and leaving water.
    #[must_use]
    pub fn in_water(&self) -> bool {
        self.in_water
    }

    /// Damage payload as currently seen by the projectile.
    #[must_use]
    pub fn damage_data(&self) -> DamageData {
        self.damage.snapshot()
    }

    /// Nested damage rings.
    #[must_use]
    pub fn rings(&self) -> &[DamageRing] {
        &self.rings
    }

    /// Returns `true` when health is tracked.
    #[must_use]
    pub fn is_health_bearing(&self) -> bool {
        self.blueprint.is_health_bearing()
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Shallow assignment: the projectile reads the caller's payload, so later
    /// caller edits are visible.
    pub fn share_damage_data(&mut self, data: Rc<RefCell<DamageData>>) {
        self.damage = DamagePayload::Shared(data);
    }

    /// Deep assignment: the projectile keeps its own copy.
    pub fn copy_damage_data(&mut self, data: &DamageData) {
        self.damage = DamagePayload::Owned(data.clone());
    }

    /// Replaces the nested damage rings.
    pub fn set_rings(&mut self, rings: Vec<DamageRing>) {
        self.rings = rings;
    }

    /// Replaces the set of targets that always destroy the projectile on
    /// impact.
    pub fn set_always_destroy_on_impact(&mut self, set: CategorySet) {
        self.always_destroy_on_impact = set;
    }

    fn track(&mut self, resource: impl Into<Tracked>) {
        if let Some(trash) = self.trash.as_mut() {
            trash.add(resource);
        }
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    /// Full create path: registry, ownership, health, ground tracking and
    /// trails.
    pub fn on_create(&mut self, host: &mut dyn SimHost) {
        self.trash = Some(TrashBag::new());
        if !self.bind(host) {
            return;
        }
        let bp = Rc::clone(&self.blueprint);

        if bp.is_health_bearing() {
            host.set_max_health(self.id, bp.defense.max_health);
            host.set_health(self.id, bp.defense.max_health);
        }

        if let Some(body) = host.entity_mut(self.id) {
            body.categories |= bp.categories;
            body.do_not_collide = bp.physics.do_not_collide_list.clone();
            body.hit_assigned_target_only = bp.physics.hit_assigned_target;
        }

        if bp.physics.track_target_ground {
            self.snap_target_to_ground(host);
        }

        self.create_trails(host, &bp);
        debug!(projectile = %self.id, blueprint = %bp.blueprint_id, "created");
    }

    /// Minimal create path: ownership only, no registry.
    pub fn on_create_minimal(&mut self, host: &mut dyn SimHost) {
        self.bind(host);
    }

    fn bind(&mut self, host: &mut dyn SimHost) -> bool {
        let Some(body) = host.entity(self.id) else {
            warn!(projectile = %self.id, "create on a missing body");
            return false;
        };
        self.army = body.army;
        self.launcher = body.launcher;
        self.state = LifecycleState::Active;
        true
    }

    fn snap_target_to_ground(&self, host: &mut dyn SimHost) {
        let Some(mut target) = host.entity(self.id).and_then(|e| e.target_position) else {
            return;
        };
        target.y = host.surface_height(target.x, target.z);
        if let Some(body) = host.entity_mut(self.id) {
            body.target_position = Some(target);
        }
    }

    #[allow(clippy::float_cmp)]
    fn create_trails(&mut self, host: &mut dyn SimHost, bp: &ProjectileBlueprint) {
        let fx = &bp.effects;
        for effect in &fx.fx_trails {
            let Some(emitter) = host.attach_emitter(self.id, Bone::Origin, self.army, effect) else {
                continue;
            };
            if fx.fx_trail_scale != 1.0 {
                host.scale_emitter(emitter, fx.fx_trail_scale);
            }
            if fx.fx_trail_offset != 0.0 {
                host.offset_emitter(emitter, 0.0, 0.0, fx.fx_trail_offset);
            }
            self.track(emitter);
        }

        if fx.poly_trails.is_empty() {
            return;
        }
        if fx.random_poly_trails > 0 {
            for _ in 0..fx.random_poly_trails {
                let index = host.random_index(fx.poly_trails.len());
                self.create_poly_trail(host, bp, index);
            }
        } else {
            for index in 0..fx.poly_trails.len() {
                self.create_poly_trail(host, bp, index);
            }
        }
    }

    #[allow(clippy::float_cmp)]
    fn create_poly_trail(
        &mut self,
        host: &mut dyn SimHost,
        bp: &ProjectileBlueprint,
        index: usize,
    ) {
        let effect = &bp.effects.poly_trails[index];
        let Some(trail) = host.create_trail(self.id, Bone::Origin, self.army, effect) else {
            return;
        };
        let offset = bp.effects.poly_trail_offset(index);
        if offset != 0.0 {
            host.offset_emitter(trail, 0.0, 0.0, offset);
        }
        self.track(trail);
    }

    // -------------------------------------------------------------------------
    // Damage and termination
    // -------------------------------------------------------------------------

    /// Health adjustment for health-bearing projectiles.
    ///
    /// Returns the overkill ratio when the hit was lethal and not a
    /// reclamation; the caller then runs the killed hook. Reclamation destroys
    /// immediately.
    pub fn take_damage(&mut self, host: &mut dyn SimHost, damage: &IncomingDamage) -> Option<f32> {
        if self.state.is_finished() {
            return None;
        }
        let health = host.adjust_health(self.id, -damage.amount)?;
        trace!(projectile = %self.id, amount = damage.amount, health, "took damage");
        if health > 0.0 {
            return None;
        }
        if damage.damage_type.is_reclaim() {
            self.reclaim(host);
            return None;
        }
        let max = self.blueprint.defense.max_health;
        Some(if health < 0.0 { -health / max } else { 0.0 })
    }

    /// Returns `true` if a damage call should reach this projectile at all.
    #[must_use]
    pub fn accepts_damage(&self, host: &dyn SimHost) -> bool {
        !self.state.is_finished() && host.entity_exists(self.id)
    }

    /// Killed path: on-killed effects, then destroy. Runs at most once.
    pub fn on_killed(&mut self, host: &mut dyn SimHost, overkill: f32) {
        if self.state.is_finished() {
            return;
        }
        self.state = LifecycleState::Killed;
        debug!(projectile = %self.id, overkill, "killed");
        let group = self.blueprint.effects.on_killed.clone();
        self.spawn_group(host, &group);
        self.destroy(host);
    }

    /// Reclamation: destroy without death effects.
    pub fn reclaim(&mut self, host: &mut dyn SimHost) {
        if self.state.is_finished() {
            return;
        }
        self.state = LifecycleState::Reclaimed;
        debug!(projectile = %self.id, "reclaimed");
        self.destroy(host);
    }

    /// Terminal transition: tear down the registry (if there is one) and
    /// remove the body. Idempotent.
    pub fn destroy(&mut self, host: &mut dyn SimHost) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        self.state = LifecycleState::Destroyed;
        if let Some(trash) = self.trash.as_mut() {
            let released = trash.teardown(host);
            trace!(projectile = %self.id, released, "registry torn down");
        }
        host.destroy_entity(self.id);
        debug!(projectile = %self.id, "destroyed");
    }

    /// Notification that the body is gone, whoever removed it. Releases the
    /// registry if the terminal transition has not already done so.
    pub fn on_destroy(&mut self, host: &mut dyn SimHost) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        self.state = LifecycleState::Destroyed;
        if let Some(trash) = self.trash.as_mut() {
            trash.teardown(host);
        }
        debug!(projectile = %self.id, "body removed out-of-band");
    }

    // -------------------------------------------------------------------------
    // Supplementary hooks
    // -------------------------------------------------------------------------

    /// Tracking projectiles that lose their target expire shortly after.
    pub fn on_lost_target(&mut self, host: &mut dyn SimHost) {
        if !self.blueprint.physics.track_target || self.state.is_finished() {
            return;
        }
        let lifetime = self.blueprint.lost_target_lifetime();
        debug!(projectile = %self.id, lifetime, "lost target");
        host.set_lifetime(self.id, lifetime);
    }

    /// Water entry: sound and splash effects.
    pub fn on_enter_water(&mut self, host: &mut dyn SimHost) {
        self.in_water = true;
        let bp = Rc::clone(&self.blueprint);
        self.water_transition(host, "EnterWater", &bp.effects.enter_water);
    }

    /// Water exit: sound and splash effects.
    pub fn on_exit_water(&mut self, host: &mut dyn SimHost) {
        self.in_water = false;
        let bp = Rc::clone(&self.blueprint);
        self.water_transition(host, "ExitWater", &bp.effects.exit_water);
    }

    fn water_transition(&self, host: &mut dyn SimHost, sound_key: &str, group: &EffectGroup) {
        if let Some(sound) = self.blueprint.sound(sound_key) {
            host.play_sound(self.id, sound);
        }
        self.spawn_group(host, group);
    }

    fn spawn_group(&self, host: &mut dyn SimHost, group: &EffectGroup) -> Vec<EmitterId> {
        spawn_effect_group(host, self.id, self.army, group, false)
    }

    /// Attaches decoy flares described by `spec`.
    ///
    /// Nothing happens without a positive radius. A stacked spec adds a flare
    /// above and one below, offset by `radius * offset_mult`. Every flare is
    /// tracked in the registry. Returns the flares created.
    pub fn add_flare(&mut self, host: &mut dyn SimHost, spec: &FlareSpec) -> Vec<EntityId> {
        let Some(radius) = spec.radius.filter(|r| *r > 0.0) else {
            return Vec::new();
        };
        let Some(position) = host.position_of(self.id) else {
            return Vec::new();
        };
        let mut offsets = vec![0.0];
        if spec.stack {
            let offset = radius * spec.offset_mult;
            offsets.extend([offset, -offset]);
        }
        let mut flares = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let flare = host.spawn_entity(SimEntity {
                kind: EntityKind::Flare,
                army: self.army,
                position: position + Vec3::Y * offset,
                owner: Some(self.id),
                radius,
                categories: Categories::FLARE,
                attracts: spec.category.clone(),
                ..SimEntity::default()
            });
            self.track(flare);
            flares.push(flare);
        }
        debug!(projectile = %self.id, count = flares.len(), "flares attached");
        flares
    }

    /// Schedules a background task on behalf of this projectile and tracks
    /// it, so destroying the projectile cancels it.
    ///
    /// The task must check the projectile's liveness itself when it resumes.
    pub fn fork_thread(
        &mut self,
        host: &mut dyn SimHost,
        task: Box<dyn Task>,
        delay_ticks: u64,
    ) -> TaskId {
        let id = host.schedule_task(task, Some(self.id), delay_ticks);
        self.track(id);
        id
    }
}

// =============================================================================
// Projectile
// =============================================================================

/// A projectile: core state plus its hook table.
pub struct Projectile {
    core: ProjectileCore,
    behavior: Box<dyn ProjectileBehavior>,
}

impl fmt::Debug for Projectile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projectile")
            .field("behavior", &self.behavior.name())
            .field("core", &self.core)
            .finish()
    }
}

impl Projectile {
    /// Pairs a core with a behavior. Call [`Projectile::on_create`] next.
    #[must_use]
    pub fn new(core: ProjectileCore, behavior: Box<dyn ProjectileBehavior>) -> Self {
        Self { core, behavior }
    }

    /// Shared state.
    #[must_use]
    pub fn core(&self) -> &ProjectileCore {
        &self.core
    }

    /// Mutable shared state.
    pub fn core_mut(&mut self) -> &mut ProjectileCore {
        &mut self.core
    }

    /// Name of the behavior variant.
    #[must_use]
    pub fn behavior_name(&self) -> &'static str {
        self.behavior.name()
    }

    /// `OnCreate`.
    pub fn on_create(&mut self, host: &mut dyn SimHost) {
        self.behavior.on_create(&mut self.core, host);
    }

    /// `OnCollisionCheck`: may this projectile interact with `other`?
    #[must_use]
    pub fn on_collision_check(&self, host: &dyn SimHost, other: EntityId) -> bool {
        self.behavior.on_collision_check(&self.core, host, other)
    }

    /// `OnCollisionCheckWeapon`: may `weapon` shoot at this projectile?
    #[must_use]
    pub fn on_collision_check_weapon(&self, host: &dyn SimHost, weapon: &WeaponInfo) -> bool {
        self.behavior.on_collision_check_weapon(&self.core, host, weapon)
    }

    /// `OnDamage`.
    pub fn on_damage(&mut self, host: &mut dyn SimHost, damage: &IncomingDamage) {
        if !self.core.accepts_damage(host) {
            return;
        }
        self.behavior.on_damage(&mut self.core, host, damage);
    }

    /// `OnImpact` with a known surface.
    pub fn on_impact(
        &mut self,
        host: &mut dyn SimHost,
        target_type: TargetType,
        target: Option<EntityId>,
    ) {
        self.behavior.on_impact(&mut self.core, host, Some(target_type), target);
    }

    /// `OnImpact` with a surface given by content name. Unknown names are
    /// logged; damage still resolves but no effects play.
    pub fn on_impact_named(
        &mut self,
        host: &mut dyn SimHost,
        target_type: &str,
        target: Option<EntityId>,
    ) {
        let parsed = impact::parse_target_type(self.core.id, target_type);
        self.behavior.on_impact(&mut self.core, host, parsed, target);
    }

    /// `OnDestroy`: the body went away, possibly out-of-band.
    pub fn on_destroy(&mut self, host: &mut dyn SimHost) {
        self.behavior.on_destroy(&mut self.core, host);
    }

    /// `OnLostTarget`.
    pub fn on_lost_target(&mut self, host: &mut dyn SimHost) {
        self.behavior.on_lost_target(&mut self.core, host);
    }

    /// `OnEnterWater`.
    pub fn on_enter_water(&mut self, host: &mut dyn SimHost) {
        self.behavior.on_enter_water(&mut self.core, host);
    }

    /// `OnExitWater`.
    pub fn on_exit_water(&mut self, host: &mut dyn SimHost) {
        self.behavior.on_exit_water(&mut self.core, host);
    }

    /// `AddFlare`.
    pub fn add_flare(&mut self, host: &mut dyn SimHost, spec: &FlareSpec) -> Vec<EntityId> {
        self.core.add_flare(host, spec)
    }

    /// `ForkThread`.
    pub fn fork_thread(
        &mut self,
        host: &mut dyn SimHost,
        task: Box<dyn Task>,
        delay_ticks: u64,
    ) -> TaskId {
        self.core.fork_thread(host, task, delay_ticks)
    }
}
