//! Fixtures for scenario tests.

use std::rc::Rc;

use glam::Vec3;

use crate::blueprint::ProjectileBlueprint;
use crate::config::SimulationConfig;
use crate::events::{EventKind, SimEvent};
use crate::projectile::{DefaultBehavior, ProjectileBehavior};
use crate::simulation::Simulation;
use crate::world::{ArmyId, EntityId, SimEntity};

/// Army the test projectiles belong to.
pub const FRIENDLY: ArmyId = ArmyId::new(1);

/// Army the test targets belong to.
pub const HOSTILE: ArmyId = ArmyId::new(2);

// =============================================================================
// Setup
// =============================================================================

/// Routes `tracing` output to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A simulation at the default tick rate.
pub fn test_simulation(seed: u64) -> Simulation {
    init_tracing();
    Simulation::new(&SimulationConfig::with_seed(seed))
}

/// Parses a blueprint fixture.
///
/// # Panics
///
/// Panics if the fixture is not a valid blueprint.
pub fn blueprint(json: &str) -> Rc<ProjectileBlueprint> {
    Rc::new(ProjectileBlueprint::from_json(json).expect("fixture blueprint"))
}

/// Blueprint with `MaxHealth` set.
pub fn armored_blueprint(max_health: f32) -> Rc<ProjectileBlueprint> {
    let mut bp = ProjectileBlueprint::default();
    bp.defense.max_health = max_health;
    Rc::new(bp)
}

// =============================================================================
// Spawning
// =============================================================================

/// Launches a friendly projectile at `position` with the default behavior.
pub fn launch(sim: &mut Simulation, position: Vec3, bp: Rc<ProjectileBlueprint>) -> EntityId {
    launch_with(sim, position, bp, Box::new(DefaultBehavior))
}

/// Launches a friendly projectile with a chosen behavior.
pub fn launch_with(
    sim: &mut Simulation,
    position: Vec3,
    bp: Rc<ProjectileBlueprint>,
    behavior: Box<dyn ProjectileBehavior>,
) -> EntityId {
    sim.spawn_projectile(SimEntity::projectile(FRIENDLY, position), bp, behavior)
}

/// Spawns a hostile unit.
pub fn spawn_target(sim: &mut Simulation, position: Vec3, health: f32) -> EntityId {
    sim.world_mut().spawn(SimEntity::unit(HOSTILE, position, health))
}

// =============================================================================
// Event queries
// =============================================================================

/// Ticks on which an entity was destroyed.
pub fn destroy_ticks(events: &[SimEvent], entity: EntityId) -> Vec<u64> {
    events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::EntityDestroyed { entity: id } if id == entity))
        .map(|e| e.tick)
        .collect()
}

/// `(tick, amount)` of every damage application.
pub fn damage_log(events: &[SimEvent]) -> Vec<(u64, f32)> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::AreaDamage(d) => Some((e.tick, d.amount)),
            EventKind::DirectDamage(d) => Some((e.tick, d.amount)),
            _ => None,
        })
        .collect()
}

/// Effects spawned, in order.
pub fn spawned_effects(events: &[SimEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::EmitterSpawned { effect, .. } => Some(effect.clone()),
            _ => None,
        })
        .collect()
}
