//! Damage payloads and the damage-resolution algorithm.
//!
//! A projectile carries a [`DamageData`] payload. On impact,
//! [`resolve_damage`] turns it into area or direct applications on the host's
//! [`DamageResolver`], and, when damage-over-time is configured, schedules a
//! [`DamageOverTime`] task that delivers the remaining damage in pulses on
//! later ticks.
//!
//! # Damage-over-time
//!
//! `DamageAmount` is the total DoT damage, spread evenly over `DoTPulses`
//! pulses spaced `DoTTime / DoTPulses` seconds apart. Pulse `k` lands `k`
//! intervals after impact; nothing is pulsed synchronously. A pulse count of
//! zero is treated as one. An optional `InitialDamageAmount` is applied
//! immediately.
//!
//! DoT tasks belong to the damage system, not to the projectile, so they keep
//! pulsing after the projectile is gone. A direct DoT stops as soon as its
//! target no longer exists.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::host::SimHost;
use crate::scheduler::{seconds_to_ticks, Task, TaskId, TaskStep};
use crate::world::EntityId;

/// Tagged category of a damage application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DamageType {
    /// Ordinary weapon damage.
    #[default]
    Normal,
    /// Removal by reclamation; kills without death effects.
    Reclaimed,
    /// Knock-back style damage.
    Force,
    /// Burning damage.
    Fire,
    /// Strategic warhead damage.
    Deathnuke,
    /// Energy-scaled commander shot.
    Overcharge,
}

impl DamageType {
    /// Returns `true` for reclamation.
    #[must_use]
    pub const fn is_reclaim(self) -> bool {
        matches!(self, Self::Reclaimed)
    }
}

/// A buff carried by a damage payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BuffSpec {
    /// Buff blueprint name.
    pub name: String,
    /// Apply this buff when the projectile impacts.
    pub apply_on_impact: bool,
    /// Keep the buff on the struck target instead of the launcher.
    pub applied_to_target: bool,
    /// Area of effect; positive values make the buff positional.
    pub radius: Option<f32>,
}

impl BuffSpec {
    /// Returns `true` if the buff has a positive area of effect.
    #[must_use]
    pub fn has_radius(&self) -> bool {
        self.radius.is_some_and(|r| r > 0.0)
    }
}

/// Damage payload of a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DamageData {
    /// Damage per hit, or total damage over time when DoT is configured.
    pub damage_amount: f32,
    /// Area radius; zero means a direct hit on the struck target.
    pub damage_radius: f32,
    /// Category of the damage.
    pub damage_type: DamageType,
    /// Area damage also hits the instigator's army.
    pub damage_friendly: bool,
    /// Area damage also hits the instigator itself.
    pub damage_self: bool,
    /// Total DoT duration in seconds.
    #[serde(rename = "DoTTime")]
    pub dot_time: Option<f32>,
    /// Number of DoT pulses.
    #[serde(rename = "DoTPulses")]
    pub dot_pulses: Option<u32>,
    /// Damage applied immediately before the DoT pulses.
    pub initial_damage_amount: Option<f32>,
    /// Buffs carried by the payload.
    pub buffs: Vec<BuffSpec>,
}

impl Default for DamageData {
    fn default() -> Self {
        Self {
            damage_amount: 0.0,
            damage_radius: 0.0,
            damage_type: DamageType::Normal,
            damage_friendly: true,
            damage_self: false,
            dot_time: None,
            dot_pulses: None,
            initial_damage_amount: None,
            buffs: Vec::new(),
        }
    }
}

impl DamageData {
    /// Payload dealing `amount` to the struck target.
    #[must_use]
    pub fn direct(amount: f32) -> Self {
        Self {
            damage_amount: amount,
            ..Self::default()
        }
    }

    /// Payload dealing `amount` to everything within `radius`.
    #[must_use]
    pub fn area(amount: f32, radius: f32) -> Self {
        Self {
            damage_amount: amount,
            damage_radius: radius,
            ..Self::default()
        }
    }

    /// Adds damage-over-time to the payload.
    #[must_use]
    pub fn with_dot(mut self, time: f32, pulses: u32, initial: f32) -> Self {
        self.dot_time = Some(time);
        self.dot_pulses = Some(pulses);
        self.initial_damage_amount = Some(initial);
        self
    }

    /// Returns `true` when damage-over-time is configured.
    #[must_use]
    pub fn has_dot(&self) -> bool {
        self.dot_time.is_some_and(|t| t > 0.0)
    }

    /// Number of DoT pulses, never zero.
    #[must_use]
    pub fn pulse_count(&self) -> u32 {
        self.dot_pulses.unwrap_or(1).max(1)
    }

    /// Damage per DoT pulse.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pulse_amount(&self) -> f32 {
        self.damage_amount / self.pulse_count() as f32
    }

    /// Seconds between DoT pulses.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn pulse_interval(&self) -> f32 {
        self.dot_time.unwrap_or(0.0) / self.pulse_count() as f32
    }

    fn has_radius(&self) -> bool {
        self.damage_radius > 0.0
    }
}

/// How a projectile holds its payload.
///
/// `Shared` aliases the caller's payload, so later caller edits are seen by
/// the projectile. `Owned` is an independent copy.
#[derive(Debug, Clone)]
pub enum DamagePayload {
    /// Shallow assignment.
    Shared(Rc<RefCell<DamageData>>),
    /// Deep copy.
    Owned(DamageData),
}

impl Default for DamagePayload {
    fn default() -> Self {
        Self::Owned(DamageData::default())
    }
}

impl DamagePayload {
    /// Current payload values.
    #[must_use]
    pub fn snapshot(&self) -> DamageData {
        match self {
            Self::Shared(shared) => shared.borrow().clone(),
            Self::Owned(data) => data.clone(),
        }
    }

    /// Returns `true` for a shallow assignment.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

/// One area-damage application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDamage {
    /// Entity credited with the damage.
    pub instigator: EntityId,
    /// Body the damage comes from. Never hit by its own area.
    #[serde(default)]
    pub source: Option<EntityId>,
    /// Center of the area.
    pub position: Vec3,
    /// Radius of the area.
    pub radius: f32,
    /// Damage dealt to each entity in the area.
    pub amount: f32,
    /// Category of the damage.
    pub damage_type: DamageType,
    /// Also hit the instigator's army.
    pub friendly_fire: bool,
    /// Also hit the instigator.
    pub self_damage: bool,
}

/// One direct-damage application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectDamage {
    /// Entity credited with the damage.
    pub instigator: EntityId,
    /// Where the hit happened.
    pub position: Vec3,
    /// Entity receiving the damage.
    pub target: EntityId,
    /// Damage dealt.
    pub amount: f32,
    /// Category of the damage.
    pub damage_type: DamageType,
}

/// Applies damage to the simulation.
pub trait DamageResolver {
    /// Damages everything in an area.
    fn apply_area_damage(&mut self, damage: &AreaDamage);

    /// Damages one entity.
    fn apply_direct_damage(&mut self, damage: &DirectDamage);
}

/// Applies buffs to units.
pub trait BuffSystem {
    /// Applies `buff` to `target`, centered on `center` when positional.
    fn apply_buff(&mut self, target: EntityId, buff: &BuffSpec, center: Option<Vec3>);
}

/// Who gets hurt and from where.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageContext {
    /// Entity credited with the damage (launcher, or the projectile itself).
    pub instigator: EntityId,
    /// The detonating projectile, excluded from its own area damage.
    pub source: Option<EntityId>,
    /// Impact position.
    pub position: Vec3,
}

/// Summary of one [`resolve_damage`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageReport {
    /// Applications made immediately.
    pub immediate: u32,
    /// Scheduled DoT task, if any.
    pub dot_task: Option<TaskId>,
}

/// Nested damage sub-object (the inner and outer rings of a strategic
/// warhead). Each ring resolves its own payload with the projectile's
/// instigator and impact position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DamageRing {
    /// Label used in logs.
    pub name: String,
    /// The ring's own payload.
    pub damage: DamageData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PulseTarget {
    Area {
        radius: f32,
        friendly_fire: bool,
        self_damage: bool,
    },
    Direct(EntityId),
}

fn apply_once(
    host: &mut dyn SimHost,
    ctx: DamageContext,
    target: PulseTarget,
    amount: f32,
    damage_type: DamageType,
) {
    match target {
        PulseTarget::Area {
            radius,
            friendly_fire,
            self_damage,
        } => host.apply_area_damage(&AreaDamage {
            instigator: ctx.instigator,
            source: ctx.source,
            position: ctx.position,
            radius,
            amount,
            damage_type,
            friendly_fire,
            self_damage,
        }),
        PulseTarget::Direct(target) => host.apply_direct_damage(&DirectDamage {
            instigator: ctx.instigator,
            position: ctx.position,
            target,
            amount,
            damage_type,
        }),
    }
}

/// Resolves a payload against an optional struck target.
///
/// - No damage when `DamageAmount <= 0`.
/// - Without DoT: one area application when a radius is set, otherwise one
///   direct application to `target` if there is one.
/// - With DoT: an optional initial dose, then a [`DamageOverTime`] task for
///   the pulses, area or direct by the same rule.
pub fn resolve_damage(
    host: &mut dyn SimHost,
    ctx: DamageContext,
    data: &DamageData,
    target: Option<EntityId>,
) -> DamageReport {
    let mut report = DamageReport::default();
    if data.damage_amount <= 0.0 {
        return report;
    }

    let mode = if data.has_radius() {
        PulseTarget::Area {
            radius: data.damage_radius,
            friendly_fire: data.damage_friendly,
            self_damage: data.damage_self,
        }
    } else if let Some(target) = target {
        PulseTarget::Direct(target)
    } else {
        trace!("direct payload without a target; nothing to damage");
        return report;
    };

    if !data.has_dot() {
        apply_once(host, ctx, mode, data.damage_amount, data.damage_type);
        report.immediate = 1;
        return report;
    }

    let initial = data.initial_damage_amount.unwrap_or(0.0);
    if initial > 0.0 {
        apply_once(host, ctx, mode, initial, data.damage_type);
        report.immediate = 1;
    }

    let interval = seconds_to_ticks(data.pulse_interval(), host.ticks_per_second()).max(1);
    let task = DamageOverTime {
        ctx,
        target: mode,
        damage_type: data.damage_type,
        amount: data.pulse_amount(),
        pulses_remaining: data.pulse_count(),
        interval,
    };
    debug!(
        pulses = data.pulse_count(),
        amount = data.pulse_amount(),
        interval,
        "scheduling damage over time"
    );
    report.dot_task = Some(host.schedule_task(Box::new(task), None, interval));
    report
}

/// Resolves each ring's payload with the shared context.
pub fn resolve_rings(host: &mut dyn SimHost, ctx: DamageContext, rings: &[DamageRing]) {
    for ring in rings {
        trace!(ring = %ring.name, "resolving damage ring");
        resolve_damage(host, ctx, &ring.damage, None);
    }
}

/// Pulsed damage delivered on later ticks.
#[derive(Debug, Clone)]
pub struct DamageOverTime {
    ctx: DamageContext,
    target: PulseTarget,
    damage_type: DamageType,
    amount: f32,
    pulses_remaining: u32,
    interval: u64,
}

impl DamageOverTime {
    /// Pulses still to be delivered.
    #[must_use]
    pub fn pulses_remaining(&self) -> u32 {
        self.pulses_remaining
    }
}

impl Task for DamageOverTime {
    fn name(&self) -> &'static str {
        "damage_over_time"
    }

    fn resume(&mut self, host: &mut dyn SimHost) -> TaskStep {
        if let PulseTarget::Direct(target) = self.target {
            if !host.entity_exists(target) {
                trace!(%target, "dot target gone; stopping");
                return TaskStep::Done;
            }
        }
        apply_once(host, self.ctx, self.target, self.amount, self.damage_type);
        self.pulses_remaining = self.pulses_remaining.saturating_sub(1);
        if self.pulses_remaining == 0 {
            TaskStep::Done
        } else {
            TaskStep::Wait(self.interval)
        }
    }
}

/// Applies the payload's on-impact buffs.
///
/// Buffs not restricted to the struck target, and buffs with an area, go to
/// the launcher; the rest go to `target`. Anything that does not resolve to a
/// live unit is skipped. Positional buffs are centered on `position`.
/// Returns the number of buffs applied.
pub fn apply_impact_buffs(
    host: &mut dyn SimHost,
    data: &DamageData,
    launcher: Option<EntityId>,
    position: Vec3,
    target: Option<EntityId>,
) -> usize {
    let mut applied = 0;
    for buff in data.buffs.iter().filter(|b| b.apply_on_impact) {
        let recipient = if !buff.applied_to_target || buff.has_radius() {
            launcher
        } else {
            target
        };
        let Some(recipient) = recipient.filter(|id| host.is_unit(*id)) else {
            trace!(buff = %buff.name, "no unit to receive impact buff");
            continue;
        };
        let center = buff.has_radius().then_some(position);
        host.apply_buff(recipient, buff, center);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::events::EventKind;
    use crate::host::{EntityHost, TaskScheduler};
    use crate::world::{ArmyId, SimEntity, World};

    fn world() -> World {
        World::new(&SimulationConfig::default())
    }

    fn ctx(world: &mut World) -> DamageContext {
        let instigator = world.spawn(SimEntity::unit(ArmyId::new(1), Vec3::ZERO, 100.0));
        DamageContext {
            instigator,
            source: None,
            position: Vec3::new(10.0, 0.0, 0.0),
        }
    }

    fn direct_amounts(world: &World) -> Vec<f32> {
        world
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::DirectDamage(d) => Some(d.amount),
                _ => None,
            })
            .collect()
    }

    fn area_amounts(world: &World) -> Vec<f32> {
        world
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::AreaDamage(d) => Some(d.amount),
                _ => None,
            })
            .collect()
    }

    mod payload_tests {
        use super::*;

        #[test]
        fn zero_pulses_treated_as_one() {
            let data = DamageData::direct(100.0).with_dot(2.0, 0, 0.0);
            assert_eq!(data.pulse_count(), 1);
            assert_eq!(data.pulse_amount(), 100.0);
            assert_eq!(data.pulse_interval(), 2.0);
        }

        #[test]
        fn pulse_arithmetic() {
            let data = DamageData::direct(100.0).with_dot(2.0, 4, 10.0);
            assert_eq!(data.pulse_amount(), 25.0);
            assert_eq!(data.pulse_interval(), 0.5);
        }

        #[test]
        fn dot_requires_positive_time() {
            let mut data = DamageData::direct(10.0);
            assert!(!data.has_dot());
            data.dot_time = Some(0.0);
            assert!(!data.has_dot());
            data.dot_time = Some(1.0);
            assert!(data.has_dot());
        }

        #[test]
        fn deserializes_content_keys() {
            let json = r#"{
                "DamageAmount": 100, "DamageRadius": 2, "DamageType": "Fire",
                "DoTTime": 2, "DoTPulses": 4, "InitialDamageAmount": 10,
                "Buffs": [{"Name": "Stun", "ApplyOnImpact": true, "Radius": 3}]
            }"#;
            let data: DamageData = serde_json::from_str(json).unwrap();
            assert_eq!(data.damage_type, DamageType::Fire);
            assert_eq!(data.dot_pulses, Some(4));
            assert!(data.damage_friendly);
            assert!(data.buffs[0].has_radius());
        }

        #[test]
        fn shared_payload_sees_caller_edits() {
            let shared = Rc::new(RefCell::new(DamageData::direct(10.0)));
            let payload = DamagePayload::Shared(Rc::clone(&shared));
            shared.borrow_mut().damage_amount = 55.0;
            assert_eq!(payload.snapshot().damage_amount, 55.0);
            assert!(payload.is_shared());
        }

        #[test]
        fn owned_payload_is_decoupled() {
            let mut source = DamageData::direct(10.0);
            let payload = DamagePayload::Owned(source.clone());
            source.damage_amount = 55.0;
            assert_eq!(payload.snapshot().damage_amount, 10.0);
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn no_damage_when_amount_not_positive() {
            let mut world = world();
            let c = ctx(&mut world);
            let target = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 100.0));
            world.take_events();

            let report = resolve_damage(&mut world, c, &DamageData::direct(0.0), Some(target));
            assert_eq!(report, DamageReport::default());
            assert!(direct_amounts(&world).is_empty());
        }

        #[test]
        fn direct_hit_without_radius() {
            let mut world = world();
            let c = ctx(&mut world);
            let target = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 100.0));

            let report = resolve_damage(&mut world, c, &DamageData::direct(30.0), Some(target));
            assert_eq!(report.immediate, 1);
            assert_eq!(direct_amounts(&world), vec![30.0]);
            assert_eq!(world.health_of(target), Some(70.0));
        }

        #[test]
        fn direct_payload_without_target_does_nothing() {
            let mut world = world();
            let c = ctx(&mut world);
            let report = resolve_damage(&mut world, c, &DamageData::direct(30.0), None);
            assert_eq!(report.immediate, 0);
            assert!(direct_amounts(&world).is_empty());
        }

        #[test]
        fn area_hit_with_radius() {
            let mut world = world();
            let c = ctx(&mut world);
            resolve_damage(&mut world, c, &DamageData::area(50.0, 4.0), None);
            assert_eq!(area_amounts(&world), vec![50.0]);
        }

        #[test]
        fn dot_direct_schedule() {
            let mut world = world();
            let c = ctx(&mut world);
            let target = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 1000.0));
            let data = DamageData::direct(100.0).with_dot(2.0, 4, 10.0);

            let report = resolve_damage(&mut world, c, &data, Some(target));
            assert_eq!(direct_amounts(&world), vec![10.0]);
            assert!(report.dot_task.is_some());

            // Five ticks per pulse at 10 ticks/s.
            let mut pulse_ticks = Vec::new();
            for _ in 0..30 {
                world.step();
                if direct_amounts(&world).len() > 1 + pulse_ticks.len() {
                    pulse_ticks.push(world.current_tick());
                }
            }
            assert_eq!(direct_amounts(&world), vec![10.0, 25.0, 25.0, 25.0, 25.0]);
            assert_eq!(pulse_ticks, vec![5, 10, 15, 20]);
        }

        #[test]
        fn dot_without_initial_dose_applies_nothing_immediately() {
            let mut world = world();
            let c = ctx(&mut world);
            let data = DamageData::area(40.0, 3.0).with_dot(1.0, 2, 0.0);
            let report = resolve_damage(&mut world, c, &data, None);
            assert_eq!(report.immediate, 0);
            assert!(area_amounts(&world).is_empty());

            for _ in 0..10 {
                world.step();
            }
            assert_eq!(area_amounts(&world), vec![20.0, 20.0]);
        }

        #[test]
        fn direct_dot_stops_when_target_gone() {
            let mut world = world();
            let c = ctx(&mut world);
            let target = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 1000.0));
            let data = DamageData::direct(40.0).with_dot(2.0, 4, 0.0);
            resolve_damage(&mut world, c, &data, Some(target));

            for _ in 0..5 {
                world.step();
            }
            world.destroy_entity(target);
            for _ in 0..20 {
                world.step();
            }
            assert_eq!(direct_amounts(&world), vec![10.0]);
            assert_eq!(world.scheduler().pending_count(), 0);
        }

        #[test]
        fn rings_resolve_their_own_payloads() {
            let mut world = world();
            let c = ctx(&mut world);
            let rings = vec![
                DamageRing {
                    name: "inner".into(),
                    damage: DamageData::area(500.0, 5.0),
                },
                DamageRing {
                    name: "outer".into(),
                    damage: DamageData::area(100.0, 20.0),
                },
            ];
            resolve_rings(&mut world, c, &rings);
            assert_eq!(area_amounts(&world), vec![500.0, 100.0]);
        }
    }

    mod buff_tests {
        use super::*;

        fn buff(applied_to_target: bool, radius: Option<f32>) -> BuffSpec {
            BuffSpec {
                name: "Veterancy".into(),
                apply_on_impact: true,
                applied_to_target,
                radius,
            }
        }

        fn buff_targets(world: &World) -> Vec<(EntityId, Option<Vec3>)> {
            world
                .events()
                .iter()
                .filter_map(|e| match &e.kind {
                    EventKind::BuffApplied { target, center, .. } => Some((*target, *center)),
                    _ => None,
                })
                .collect()
        }

        #[test]
        fn unrestricted_buff_goes_to_launcher() {
            let mut world = world();
            let launcher = world.spawn(SimEntity::unit(ArmyId::new(1), Vec3::ZERO, 10.0));
            let victim = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 10.0));
            let data = DamageData {
                buffs: vec![buff(false, None)],
                ..DamageData::default()
            };

            let n = apply_impact_buffs(&mut world, &data, Some(launcher), Vec3::ONE, Some(victim));
            assert_eq!(n, 1);
            assert_eq!(buff_targets(&world), vec![(launcher, None)]);
        }

        #[test]
        fn restricted_buff_stays_on_target() {
            let mut world = world();
            let launcher = world.spawn(SimEntity::unit(ArmyId::new(1), Vec3::ZERO, 10.0));
            let victim = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 10.0));
            let data = DamageData {
                buffs: vec![buff(true, None)],
                ..DamageData::default()
            };

            apply_impact_buffs(&mut world, &data, Some(launcher), Vec3::ONE, Some(victim));
            assert_eq!(buff_targets(&world), vec![(victim, None)]);
        }

        #[test]
        fn area_buff_is_positional_on_launcher() {
            let mut world = world();
            let launcher = world.spawn(SimEntity::unit(ArmyId::new(1), Vec3::ZERO, 10.0));
            let victim = world.spawn(SimEntity::unit(ArmyId::new(2), Vec3::ZERO, 10.0));
            let data = DamageData {
                buffs: vec![buff(true, Some(5.0))],
                ..DamageData::default()
            };

            apply_impact_buffs(&mut world, &data, Some(launcher), Vec3::ONE, Some(victim));
            assert_eq!(buff_targets(&world), vec![(launcher, Some(Vec3::ONE))]);
        }

        #[test]
        fn non_units_and_non_impact_buffs_are_skipped() {
            let mut world = world();
            let prop = world.spawn(SimEntity::default());
            let mut passive = buff(true, None);
            passive.apply_on_impact = false;
            let data = DamageData {
                buffs: vec![buff(true, None), passive],
                ..DamageData::default()
            };

            let n = apply_impact_buffs(&mut world, &data, None, Vec3::ONE, Some(prop));
            assert_eq!(n, 0);
            assert!(buff_targets(&world).is_empty());
        }
    }
}
