//! End-to-end projectile lifecycles driven through [`Simulation`].

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use crate::category::Categories;
use crate::damage::{BuffSpec, DamageData, DamageRing, DamageType};
use crate::effects::TargetType;
use crate::events::EventKind;
use crate::host::EntityHost;
use crate::projectile::{FlareBehavior, IncomingDamage, LifecycleState, NukeBehavior, WeaponInfo};
use crate::simulation::Simulation;
use crate::world::{EntityId, EntityKind, SimEntity};

use super::helpers::{
    armored_blueprint, blueprint, damage_log, destroy_ticks, launch, launch_with, spawn_target,
    spawned_effects, test_simulation, FRIENDLY, HOSTILE,
};

// =============================================================================
// Damage intake
// =============================================================================

#[test]
fn fragile_projectile_dies_on_first_hit() {
    let mut sim = test_simulation(1);
    let id = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));

    sim.damage(id, &IncomingDamage::new(0.5));

    assert!(sim.projectile(id).is_none());
    assert_eq!(destroy_ticks(sim.world().events(), id), vec![0]);
}

#[test]
fn armored_projectile_dies_once_on_third_hit() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{
            "Defense": { "MaxHealth": 100 },
            "Effects": { "OnKilled": { "Effects": ["/fx/pop.bp"] } }
        }"#,
    );
    let id = launch(&mut sim, Vec3::ZERO, bp);

    sim.damage(id, &IncomingDamage::new(40.0));
    sim.damage(id, &IncomingDamage::new(40.0));
    assert_eq!(sim.world().health_of(id), Some(20.0));
    assert_eq!(
        sim.projectile(id).map(|p| p.core().state()),
        Some(LifecycleState::Active)
    );

    sim.damage(id, &IncomingDamage::new(40.0));
    sim.damage(id, &IncomingDamage::new(40.0));

    let events = sim.world().events();
    assert_eq!(destroy_ticks(events, id).len(), 1);
    assert_eq!(spawned_effects(events), vec!["/fx/pop.bp".to_string()]);
}

#[test]
fn reclamation_skips_kill_effects() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{
            "Defense": { "MaxHealth": 50 },
            "Effects": { "OnKilled": { "Effects": ["/fx/pop.bp"] } }
        }"#,
    );
    let id = launch(&mut sim, Vec3::ZERO, bp);

    sim.damage(id, &IncomingDamage::new(80.0).with_type(DamageType::Reclaimed));

    assert!(!sim.world().contains(id));
    assert!(spawned_effects(sim.world().events()).is_empty());
}

#[test]
fn area_damage_reaches_projectile_bodies() {
    let mut sim = test_simulation(1);
    let interceptor = sim.spawn_projectile(
        SimEntity::projectile(HOSTILE, Vec3::ZERO),
        Rc::new(crate::blueprint::ProjectileBlueprint::default()),
        Box::new(crate::projectile::DefaultBehavior),
    );
    let armored = launch(&mut sim, Vec3::new(1.0, 0.0, 0.0), armored_blueprint(100.0));
    let bomb = sim.spawn_projectile(
        SimEntity::projectile(HOSTILE, Vec3::new(0.0, 0.0, 2.0)),
        Rc::new(crate::blueprint::ProjectileBlueprint::default()),
        Box::new(crate::projectile::DefaultBehavior),
    );
    sim.copy_damage_data(bomb, &DamageData::area(30.0, 5.0));

    sim.impact(bomb, TargetType::Air, None);

    assert!(sim.projectile(interceptor).is_none());
    assert_eq!(sim.world().health_of(armored), Some(70.0));
    assert_eq!(sim.projectile_count(), 1);
}

// =============================================================================
// Impact
// =============================================================================

#[test]
fn terrain_impact_timeout_of_two_seconds() {
    let mut sim = test_simulation(1);
    let bp = blueprint(r#"{ "Physics": { "ImpactTimeout": 2 } }"#);
    let id = launch(&mut sim, Vec3::ZERO, bp);

    sim.impact(id, TargetType::Terrain, None);
    sim.run(20);
    assert!(sim.world().contains(id));
    assert_eq!(
        sim.projectile(id).map(|p| p.core().state()),
        Some(LifecycleState::Impacted)
    );

    sim.step();
    assert!(sim.projectile(id).is_none());
    assert_eq!(destroy_ticks(sim.world().events(), id), vec![21]);
}

/// Launches a projectile from a live friendly launcher with an area payload.
fn launch_from_launcher(sim: &mut Simulation, json: &str) -> (EntityId, EntityId) {
    let launcher = sim
        .world_mut()
        .spawn(SimEntity::unit(FRIENDLY, Vec3::new(-20.0, 0.0, 0.0), 100.0));
    let id = sim.spawn_projectile(
        SimEntity::projectile(FRIENDLY, Vec3::ZERO).with_launcher(launcher),
        blueprint(json),
        Box::new(crate::projectile::DefaultBehavior),
    );
    sim.copy_damage_data(id, &DamageData::area(10.0, 5.0));
    (launcher, id)
}

#[test]
fn own_blast_does_not_cut_terrain_timeout_short() {
    let mut sim = test_simulation(1);
    let (launcher, id) = launch_from_launcher(&mut sim, r#"{ "Physics": { "ImpactTimeout": 2 } }"#);

    sim.impact(id, TargetType::Terrain, None);
    assert_eq!(
        sim.projectile(id).map(|p| p.core().state()),
        Some(LifecycleState::Impacted)
    );

    sim.run(21);
    assert!(sim.projectile(id).is_none());
    assert_eq!(destroy_ticks(sim.world().events(), id), vec![21]);
    assert!(sim.world().contains(launcher));
}

#[test]
fn own_blast_does_not_kill_a_survivor() {
    let mut sim = test_simulation(1);
    let target = spawn_target(&mut sim, Vec3::new(0.0, 0.0, 2.0), 100.0);
    let (_, id) = launch_from_launcher(
        &mut sim,
        r#"{
            "Physics": { "DestroyOnImpact": false },
            "Effects": { "OnKilled": { "Effects": ["/fx/wreck.bp"] } }
        }"#,
    );

    sim.impact(id, TargetType::Unit, Some(target));
    sim.step();

    assert!(sim.world().contains(id));
    assert!(sim.projectile(id).is_some());
    assert_eq!(sim.world().health_of(target), Some(90.0));
    assert!(destroy_ticks(sim.world().events(), id).is_empty());
    assert!(!spawned_effects(sim.world().events()).contains(&"/fx/wreck.bp".to_string()));
}

#[test]
fn damage_over_time_schedule() {
    let mut sim = test_simulation(1);
    let target = spawn_target(&mut sim, Vec3::new(0.0, 0.0, 1.0), 1000.0);
    let id = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));
    sim.copy_damage_data(id, &DamageData::direct(100.0).with_dot(2.0, 4, 10.0));

    sim.impact(id, TargetType::Unit, Some(target));
    sim.run(25);

    assert_eq!(
        damage_log(sim.world().events()),
        vec![(0, 10.0), (5, 25.0), (10, 25.0), (15, 25.0), (20, 25.0)]
    );
    assert_eq!(sim.world().health_of(target), Some(890.0));
}

#[test]
fn dot_stops_when_target_dies() {
    let mut sim = test_simulation(1);
    let target = spawn_target(&mut sim, Vec3::ZERO, 60.0);
    let id = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));
    sim.copy_damage_data(id, &DamageData::direct(100.0).with_dot(1.0, 4, 0.0));

    sim.impact(id, TargetType::Unit, Some(target));
    sim.run(20);

    assert!(!sim.world().contains(target));
    assert_eq!(damage_log(sim.world().events()).len(), 3);
}

#[test]
fn shared_payload_sees_late_edits() {
    let mut sim = test_simulation(1);
    let target = spawn_target(&mut sim, Vec3::ZERO, 100.0);
    let shared = Rc::new(RefCell::new(DamageData::direct(10.0)));

    let by_reference = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));
    sim.share_damage_data(by_reference, Rc::clone(&shared));
    let by_copy = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));
    sim.copy_damage_data(by_copy, &shared.borrow());

    shared.borrow_mut().damage_amount = 30.0;

    sim.impact(by_reference, TargetType::Unit, Some(target));
    assert_eq!(sim.world().health_of(target), Some(70.0));
    sim.impact(by_copy, TargetType::Unit, Some(target));
    assert_eq!(sim.world().health_of(target), Some(60.0));
}

#[test]
fn impact_buffs_follow_retargeting() {
    let mut sim = test_simulation(1);
    let launcher = sim
        .world_mut()
        .spawn(SimEntity::unit(FRIENDLY, Vec3::new(-20.0, 0.0, 0.0), 100.0));
    let target = spawn_target(&mut sim, Vec3::ZERO, 100.0);
    let id = sim.spawn_projectile(
        SimEntity::projectile(FRIENDLY, Vec3::ZERO).with_launcher(launcher),
        armored_blueprint(1.0),
        Box::new(crate::projectile::DefaultBehavior),
    );
    let mut data = DamageData::direct(5.0);
    data.buffs = vec![
        BuffSpec {
            name: "Slow".to_string(),
            apply_on_impact: true,
            applied_to_target: true,
            radius: None,
        },
        BuffSpec {
            name: "Rally".to_string(),
            apply_on_impact: true,
            applied_to_target: true,
            radius: Some(15.0),
        },
        BuffSpec {
            name: "Ignored".to_string(),
            apply_on_impact: false,
            applied_to_target: true,
            radius: None,
        },
    ];
    sim.copy_damage_data(id, &data);

    sim.impact(id, TargetType::Unit, Some(target));

    let buffs: Vec<_> = sim
        .world()
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::BuffApplied {
                target,
                buff,
                center,
            } => Some((*target, buff.clone(), *center)),
            _ => None,
        })
        .collect();
    assert_eq!(
        buffs,
        vec![
            (target, "Slow".to_string(), None),
            (launcher, "Rally".to_string(), Some(Vec3::ZERO)),
        ]
    );
}

#[test]
fn unknown_target_type_name_is_not_fatal() {
    let mut sim = test_simulation(1);
    let target = spawn_target(&mut sim, Vec3::ZERO, 100.0);
    let bp =
        blueprint(r#"{ "Effects": { "Impact": { "Unit": { "Effects": ["/fx/sparks.bp"] } } } }"#);
    let id = launch(&mut sim, Vec3::ZERO, bp);
    sim.copy_damage_data(id, &DamageData::direct(25.0));

    sim.impact_named(id, "Lava", Some(target));

    assert_eq!(sim.world().health_of(target), Some(75.0));
    assert!(spawned_effects(sim.world().events()).is_empty());
    assert!(sim.projectile(id).is_none());
}

#[test]
fn named_impact_uses_the_surface() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{ "Effects": { "Impact": { "Underwater": { "Effects": ["/fx/bubbles.bp"] } } } }"#,
    );
    let id = launch(&mut sim, Vec3::ZERO, bp);

    sim.impact_named(id, "unitunderwater", None);

    assert_eq!(spawned_effects(sim.world().events()), vec!["/fx/bubbles.bp".to_string()]);
}

#[test]
fn nuke_rings_resolve_with_the_main_payload() {
    let mut sim = test_simulation(1);
    let near = spawn_target(&mut sim, Vec3::new(4.0, 0.0, 0.0), 10_000.0);
    let far = spawn_target(&mut sim, Vec3::new(25.0, 0.0, 0.0), 10_000.0);
    let behavior = NukeBehavior::new(
        DamageRing {
            name: "inner".to_string(),
            damage: DamageData::area(5000.0, 10.0),
        },
        DamageRing {
            name: "outer".to_string(),
            damage: DamageData::area(500.0, 30.0),
        },
    );
    let id = launch_with(&mut sim, Vec3::ZERO, armored_blueprint(1.0), Box::new(behavior));
    sim.copy_damage_data(id, &DamageData::direct(1000.0));

    sim.impact(id, TargetType::Unit, Some(near));

    assert_eq!(sim.world().health_of(near), Some(3500.0));
    assert_eq!(sim.world().health_of(far), Some(9500.0));
}

// =============================================================================
// Collision
// =============================================================================

#[test]
fn collision_rules() {
    let mut sim = test_simulation(1);
    let bp = blueprint(r#"{ "Categories": ["MISSILE"] }"#);
    let missile = launch(&mut sim, Vec3::ZERO, bp);
    let friend = sim.world_mut().spawn(SimEntity::unit(FRIENDLY, Vec3::ZERO, 10.0));
    let enemy = spawn_target(&mut sim, Vec3::ZERO, 10.0);
    let torpedo = sim.world_mut().spawn(
        SimEntity::projectile(HOSTILE, Vec3::ZERO)
            .with_categories(Categories::PROJECTILE | Categories::TORPEDO),
    );

    assert!(!sim.collision_check(missile, friend));
    assert!(!sim.collision_check(missile, torpedo));
    assert!(sim.collision_check(missile, enemy));
}

#[test]
fn blueprint_do_not_collide_list() {
    let mut sim = test_simulation(1);
    let bp =
        blueprint(r#"{ "Physics": { "DoNotCollideList": ["SHIELD", "AIR * EXPERIMENTAL"] } }"#);
    let id = launch(&mut sim, Vec3::ZERO, bp);
    let shield = sim
        .world_mut()
        .spawn(SimEntity::unit(HOSTILE, Vec3::ZERO, 1.0).with_categories(Categories::SHIELD));
    let bomber = sim.world_mut().spawn(
        SimEntity::unit(HOSTILE, Vec3::ZERO, 1.0)
            .with_categories(Categories::UNIT | Categories::AIR),
    );
    let colossus = sim.world_mut().spawn(
        SimEntity::unit(HOSTILE, Vec3::ZERO, 1.0)
            .with_categories(Categories::UNIT | Categories::AIR | Categories::EXPERIMENTAL),
    );

    assert!(!sim.collision_check(id, shield));
    assert!(sim.collision_check(id, bomber));
    assert!(!sim.collision_check(id, colossus));
}

#[test]
fn weapon_check() {
    let mut sim = test_simulation(1);
    let id = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));
    let enemy_weapon = WeaponInfo {
        army: HOSTILE,
        ..WeaponInfo::default()
    };
    assert!(sim.collision_check_weapon(id, &enemy_weapon));
}

// =============================================================================
// Create, trails and sub-objects
// =============================================================================

#[test]
fn create_applies_blueprint_to_body() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{
            "Defense": { "MaxHealth": 250 },
            "Physics": { "TrackTargetGround": true, "HitAssignedTarget": true },
            "Categories": ["MISSILE", "TACTICAL"]
        }"#,
    );
    let body = SimEntity::projectile(FRIENDLY, Vec3::ZERO).aimed_at(Vec3::new(10.0, 40.0, 10.0));
    let id = sim.spawn_projectile(body, bp, Box::new(crate::projectile::DefaultBehavior));

    let entity = sim.world().entity(id).cloned().unwrap_or_default();
    assert_eq!(entity.health, 250.0);
    assert_eq!(entity.max_health, 250.0);
    assert!(entity
        .categories
        .contains(Categories::PROJECTILE | Categories::MISSILE | Categories::TACTICAL));
    assert!(entity.hit_assigned_target_only);
    assert_eq!(entity.target_position, Some(Vec3::new(10.0, 0.0, 10.0)));
}

#[test]
fn trails_are_released_on_destroy() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{
            "Effects": {
                "FxTrails": ["/fx/smoke.bp", "/fx/glow.bp"],
                "FxTrailScale": 0.5,
                "PolyTrails": ["/fx/ribbon.bp"],
                "PolyTrailOffsets": [-0.25]
            }
        }"#,
    );
    let id = launch(&mut sim, Vec3::ZERO, bp);
    assert_eq!(sim.world().emitter_count(), 3);
    assert_eq!(sim.projectile(id).and_then(|p| p.core().trash()).map(|t| t.len()), Some(3));

    sim.impact(id, TargetType::Air, None);
    assert_eq!(sim.world().emitter_count(), 0);
}

#[test]
fn impact_effects_are_released_after_their_lifetime() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{
            "Effects": {
                "FxTrails": ["/fx/smoke.bp"],
                "Impact": { "Terrain": { "Effects": ["/fx/dirt.bp", "/fx/flash.bp"] } }
            }
        }"#,
    );
    for i in 0..50u8 {
        let id = launch(&mut sim, Vec3::new(f32::from(i), 0.0, 0.0), Rc::clone(&bp));
        sim.impact(id, TargetType::Terrain, None);
    }
    assert_eq!(sim.projectile_count(), 0);
    assert_eq!(sim.world().emitter_count(), 100);

    sim.run(10);
    assert_eq!(sim.world().emitter_count(), 0);
    assert_eq!(sim.world().entity_count(), 0);
}

#[test]
fn random_poly_trails_sample_with_replacement() {
    let mut sim = test_simulation(9);
    let bp = blueprint(
        r#"{
            "Effects": {
                "PolyTrails": ["/fx/a.bp", "/fx/b.bp", "/fx/c.bp"],
                "RandomPolyTrails": 5
            }
        }"#,
    );
    launch(&mut sim, Vec3::ZERO, bp);

    let effects = spawned_effects(sim.world().events());
    assert_eq!(effects.len(), 5);
    assert!(effects.iter().all(|e| e.starts_with("/fx/")));
}

#[test]
fn stacked_flares_die_with_their_carrier() {
    let mut sim = test_simulation(1);
    let bp = blueprint(r#"{ "Flare": { "Radius": 4, "Category": "MISSILE", "Stack": true } }"#);
    let id = launch_with(&mut sim, Vec3::new(0.0, 50.0, 0.0), bp, Box::new(FlareBehavior));

    let heights: Vec<f32> = sim
        .world()
        .entities()
        .filter(|(_, e)| e.kind == EntityKind::Flare)
        .map(|(_, e)| e.position.y)
        .collect();
    assert_eq!(heights, vec![50.0, 52.0, 48.0]);

    sim.damage(id, &IncomingDamage::new(1.0));
    assert_eq!(sim.world().entity_count(), 0);
}

#[test]
fn forked_task_is_cancelled_with_its_owner() {
    use std::cell::Cell;

    use crate::scheduler::{ForkedTask, TaskStep};

    let mut sim = test_simulation(1);
    let id = launch(&mut sim, Vec3::ZERO, armored_blueprint(1.0));
    let runs = Rc::new(Cell::new(0));
    let counter = Rc::clone(&runs);
    let task = ForkedTask::new("beacon", move |_host: &mut dyn crate::host::SimHost| {
        counter.set(counter.get() + 1);
        TaskStep::Wait(2)
    });
    sim.fork_thread(id, Box::new(task), 1);

    sim.run(4);
    assert_eq!(runs.get(), 2);

    sim.damage(id, &IncomingDamage::new(1.0));
    sim.run(10);
    assert_eq!(runs.get(), 2);
}

#[test]
fn water_transitions() {
    let mut sim = test_simulation(1);
    let bp = blueprint(
        r#"{
            "Audio": { "EnterWater": "splash_in" },
            "Effects": {
                "EnterWater": { "Effects": ["/fx/splash.bp"] },
                "ExitWater": { "Effects": ["/fx/spray.bp"] }
            }
        }"#,
    );
    let id = launch(&mut sim, Vec3::ZERO, bp);

    sim.enter_water(id);
    assert_eq!(sim.projectile(id).map(|p| p.core().in_water()), Some(true));
    sim.exit_water(id);
    assert_eq!(sim.projectile(id).map(|p| p.core().in_water()), Some(false));

    let events = sim.world().events();
    assert_eq!(
        spawned_effects(events),
        vec!["/fx/splash.bp".to_string(), "/fx/spray.bp".to_string()]
    );
    let sounds = events
        .iter()
        .filter(|e| matches!(&e.kind, EventKind::SoundPlayed { sound, .. } if sound == "splash_in"))
        .count();
    assert_eq!(sounds, 1);
}

#[test]
fn simulation_runs_empty() {
    let mut sim = Simulation::new(&crate::config::SimulationConfig::default());
    sim.run(3);
    assert_eq!(sim.tick(), 3);
    assert!(sim.take_events().is_empty());
}
