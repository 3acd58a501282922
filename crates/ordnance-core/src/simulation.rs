//! The tick driver tying projectiles to the world.
//!
//! [`Simulation`] owns the [`World`] and every live [`Projectile`], keyed by
//! the handle of its body. Each public entry point runs one transition and
//! then drains the world's notifications:
//!
//! - damage that landed on a projectile body is routed to that projectile's
//!   `OnDamage`;
//! - a projectile body removed by anything (its own destroy, an impact
//!   timeout, a lifetime, a teardown of another projectile's registry) is
//!   routed to `OnDestroy` and the projectile is dropped.
//!
//! Draining repeats until both queues are empty, so chains such as an area
//! blast killing a nearby interceptor settle within the call that caused
//! them.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use glam::Vec3;
//! use ordnance_core::blueprint::ProjectileBlueprint;
//! use ordnance_core::config::SimulationConfig;
//! use ordnance_core::effects::TargetType;
//! use ordnance_core::projectile::DefaultBehavior;
//! use ordnance_core::simulation::Simulation;
//! use ordnance_core::world::{ArmyId, SimEntity};
//!
//! let mut sim = Simulation::new(&SimulationConfig::default());
//! let shell = sim.spawn_projectile(
//!     SimEntity::projectile(ArmyId::new(1), Vec3::ZERO),
//!     Rc::new(ProjectileBlueprint::default()),
//!     Box::new(DefaultBehavior),
//! );
//! assert_eq!(sim.projectile_count(), 1);
//!
//! sim.impact(shell, TargetType::Terrain, None);
//! assert_eq!(sim.projectile_count(), 0);
//! assert!(!sim.world().contains(shell));
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::{debug, info, trace};

use crate::blueprint::{FlareSpec, ProjectileBlueprint};
use crate::config::SimulationConfig;
use crate::damage::DamageData;
use crate::effects::TargetType;
use crate::events::SimEvent;
use crate::host::TaskScheduler;
use crate::projectile::{IncomingDamage, Projectile, ProjectileBehavior, ProjectileCore, WeaponInfo};
use crate::scheduler::{Task, TaskId};
use crate::world::{EntityId, EntityKind, SimEntity, World};

/// World plus live projectiles.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    projectiles: BTreeMap<EntityId, Projectile>,
}

impl Simulation {
    /// Creates an empty simulation.
    #[must_use]
    pub fn new(config: &SimulationConfig) -> Self {
        info!(seed = config.seed, ticks_per_second = config.ticks_per_second, "simulation created");
        Self {
            world: World::new(config),
            projectiles: BTreeMap::new(),
        }
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for spawning units and scripting scenarios.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.world.current_tick()
    }

    /// Number of live projectiles.
    #[must_use]
    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Looks up a live projectile.
    #[must_use]
    pub fn projectile(&self, id: EntityId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// Mutably looks up a live projectile.
    pub fn projectile_mut(&mut self, id: EntityId) -> Option<&mut Projectile> {
        self.projectiles.get_mut(&id)
    }

    /// Spawns a projectile body, runs its create hook and starts tracking it.
    pub fn spawn_projectile(
        &mut self,
        mut body: SimEntity,
        blueprint: Rc<ProjectileBlueprint>,
        behavior: Box<dyn ProjectileBehavior>,
    ) -> EntityId {
        body.kind = EntityKind::Projectile;
        let id = self.world.spawn(body);
        let mut projectile = Projectile::new(ProjectileCore::new(id, blueprint), behavior);
        projectile.on_create(&mut self.world);
        debug!(projectile = %id, behavior = projectile.behavior_name(), "projectile launched");
        self.projectiles.insert(id, projectile);
        self.dispatch();
        id
    }

    /// Gives the projectile its own copy of `data`.
    pub fn copy_damage_data(&mut self, id: EntityId, data: &DamageData) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.core_mut().copy_damage_data(data);
        }
    }

    /// Makes the projectile read `data` by reference.
    pub fn share_damage_data(&mut self, id: EntityId, data: Rc<RefCell<DamageData>>) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.core_mut().share_damage_data(data);
        }
    }

    /// Collision predicate of projectile `id` against `other`. Unknown
    /// projectiles never collide.
    #[must_use]
    pub fn collision_check(&self, id: EntityId, other: EntityId) -> bool {
        self.projectiles
            .get(&id)
            .is_some_and(|p| p.on_collision_check(&self.world, other))
    }

    /// Weapon-versus-projectile predicate.
    #[must_use]
    pub fn collision_check_weapon(&self, id: EntityId, weapon: &WeaponInfo) -> bool {
        self.projectiles
            .get(&id)
            .is_some_and(|p| p.on_collision_check_weapon(&self.world, weapon))
    }

    /// Delivers one damage call to a projectile.
    pub fn damage(&mut self, id: EntityId, damage: &IncomingDamage) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.on_damage(&mut self.world, damage);
        }
        self.dispatch();
    }

    /// Impact with a known surface.
    pub fn impact(&mut self, id: EntityId, target_type: TargetType, target: Option<EntityId>) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.on_impact(&mut self.world, target_type, target);
        }
        self.dispatch();
    }

    /// Impact with a surface given by content name.
    pub fn impact_named(&mut self, id: EntityId, target_type: &str, target: Option<EntityId>) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.on_impact_named(&mut self.world, target_type, target);
        }
        self.dispatch();
    }

    /// The projectile's tracked target vanished.
    pub fn lost_target(&mut self, id: EntityId) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.on_lost_target(&mut self.world);
        }
        self.dispatch();
    }

    /// The projectile entered water.
    pub fn enter_water(&mut self, id: EntityId) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.on_enter_water(&mut self.world);
        }
        self.dispatch();
    }

    /// The projectile left water.
    pub fn exit_water(&mut self, id: EntityId) {
        if let Some(projectile) = self.projectiles.get_mut(&id) {
            projectile.on_exit_water(&mut self.world);
        }
        self.dispatch();
    }

    /// Attaches flares to a projectile. Returns the flares created.
    pub fn add_flare(&mut self, id: EntityId, spec: &FlareSpec) -> Vec<EntityId> {
        let flares = self
            .projectiles
            .get_mut(&id)
            .map(|p| p.add_flare(&mut self.world, spec))
            .unwrap_or_default();
        self.dispatch();
        flares
    }

    /// Runs `task` on behalf of a projectile; it is cancelled when the
    /// projectile goes away.
    pub fn fork_thread(
        &mut self,
        id: EntityId,
        task: Box<dyn Task>,
        delay_ticks: u64,
    ) -> Option<TaskId> {
        let projectile = self.projectiles.get_mut(&id)?;
        Some(projectile.fork_thread(&mut self.world, task, delay_ticks))
    }

    /// Advances one tick: due tasks run, then notifications are drained.
    pub fn step(&mut self) {
        self.world.step();
        self.dispatch();
    }

    /// Advances `ticks` ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Drains the world's event log.
    pub fn take_events(&mut self) -> Vec<SimEvent> {
        self.world.take_events()
    }

    fn dispatch(&mut self) {
        loop {
            let hits = self.world.take_pending_hits();
            let destroyed = self.world.take_destroyed();
            if hits.is_empty() && destroyed.is_empty() {
                break;
            }
            for hit in &hits {
                if let Some(projectile) = self.projectiles.get_mut(&hit.projectile) {
                    trace!(projectile = %hit.projectile, amount = hit.amount, "routing hit");
                    projectile.on_damage(&mut self.world, &IncomingDamage::from(hit));
                }
            }
            for id in destroyed {
                if let Some(mut projectile) = self.projectiles.remove(&id) {
                    projectile.on_destroy(&mut self.world);
                }
            }
        }
    }
}
