//! The impact transition.

use std::rc::Rc;

use glam::Vec3;
use tracing::{debug, error, warn};

use super::{LifecycleState, ProjectileCore};
use crate::damage::{apply_impact_buffs, resolve_damage, resolve_rings, DamageContext};
use crate::effects::{spawn_effect_group, spawn_terrain_effects, TargetType};
use crate::host::SimHost;
use crate::scheduler::{seconds_to_wait_ticks, DelayedDestroy};
use crate::world::EntityId;

/// Parses a content surface name, logging unknown names.
pub(super) fn parse_target_type(projectile: EntityId, name: &str) -> Option<TargetType> {
    match name.parse() {
        Ok(target_type) => Some(target_type),
        Err(err) => {
            error!(%projectile, target_type = name, %err, "unknown impact target type");
            None
        }
    }
}

impl ProjectileCore {
    /// Impact with a surface.
    ///
    /// Damage, rings and impact buffs always resolve. A `None` surface (an
    /// unrecognised content name) plays no sound and spawns no effects. On
    /// terrain with an impact timeout the projectile lingers and a tracked
    /// delayed destroy removes it later; otherwise the destroy-on-impact
    /// policy decides now.
    pub fn on_impact(
        &mut self,
        host: &mut dyn SimHost,
        target_type: Option<TargetType>,
        target: Option<EntityId>,
    ) {
        if self.state.is_finished() {
            return;
        }
        let Some(position) = host.position_of(self.id) else {
            warn!(projectile = %self.id, "impact on a missing body");
            return;
        };
        self.state = LifecycleState::Impacted;

        let instigator = self
            .launcher
            .filter(|launcher| host.entity_exists(*launcher))
            .unwrap_or(self.id);
        let ctx = DamageContext {
            instigator,
            source: Some(self.id),
            position,
        };
        let data = self.damage.snapshot();
        let report = resolve_damage(host, ctx, &data, target);
        resolve_rings(host, ctx, &self.rings);
        let buffs = apply_impact_buffs(host, &data, self.launcher, position, target);
        debug!(
            projectile = %self.id,
            surface = target_type.map_or("unknown", TargetType::as_str),
            immediate = report.immediate,
            buffs,
            "impact"
        );

        if let Some(target_type) = target_type {
            self.play_impact_feedback(host, target_type, position);
        }

        let bp = Rc::clone(&self.blueprint);
        match (target_type, bp.physics.impact_timeout) {
            (Some(TargetType::Terrain), Some(timeout)) if timeout > 0.0 => {
                let delay = seconds_to_wait_ticks(timeout, host.ticks_per_second());
                let task = host.schedule_task(
                    Box::new(DelayedDestroy::new(self.id)),
                    Some(self.id),
                    delay,
                );
                self.track(task);
                debug!(projectile = %self.id, delay, "lingering after terrain impact");
            }
            _ => {
                let always_destroyed = target
                    .is_some_and(|t| host.category_contains(&self.always_destroy_on_impact, t));
                let survives = !bp.physics.destroy_on_impact && !always_destroyed;
                if !survives {
                    self.destroy(host);
                }
            }
        }
    }

    fn play_impact_feedback(
        &self,
        host: &mut dyn SimHost,
        target_type: TargetType,
        position: Vec3,
    ) {
        let bp = &self.blueprint;
        if let Some(sound) = bp.sound(&target_type.impact_sound_key()) {
            host.play_sound(self.id, sound);
        }

        let display = &bp.display.impact_effects;
        let terrain_effects = host.terrain_impact_effects(position, target_type, &display.kind);

        if let Some(group) = bp.impact_group(target_type) {
            spawn_effect_group(
                host,
                self.id,
                self.army,
                group,
                bp.effects.impact_trajectory_aligned,
            );
        }
        spawn_terrain_effects(host, self.id, self.army, &terrain_effects, display.scale);
    }
}
