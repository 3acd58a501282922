//! Overridable hook tables for projectile variants.
//!
//! Every hook has a default that runs the base transition on
//! [`ProjectileCore`]. A variant overrides only what it changes and calls the
//! core for the rest, the way a derived content class calls its base class.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::{IncomingDamage, ProjectileCore, WeaponInfo};
use crate::damage::DamageRing;
use crate::effects::TargetType;
use crate::host::SimHost;
use crate::world::EntityId;

/// Hook table of a projectile variant.
pub trait ProjectileBehavior: fmt::Debug {
    /// Variant name used in logs.
    fn name(&self) -> &'static str;

    /// `OnCreate`.
    fn on_create(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_create(host);
    }

    /// `OnCollisionCheck`.
    fn on_collision_check(
        &self,
        core: &ProjectileCore,
        host: &dyn SimHost,
        other: EntityId,
    ) -> bool {
        core.collides_with(host, other)
    }

    /// `OnCollisionCheckWeapon`.
    fn on_collision_check_weapon(
        &self,
        core: &ProjectileCore,
        host: &dyn SimHost,
        weapon: &WeaponInfo,
    ) -> bool {
        core.collides_with_weapon(host, weapon)
    }

    /// `OnDamage`: health-bearing projectiles adjust health, fragile ones die.
    fn on_damage(
        &mut self,
        core: &mut ProjectileCore,
        host: &mut dyn SimHost,
        damage: &IncomingDamage,
    ) {
        if core.is_health_bearing() {
            self.do_take_damage(core, host, damage);
        } else {
            self.on_killed(core, host, 0.0);
        }
    }

    /// `DoTakeDamage`.
    fn do_take_damage(
        &mut self,
        core: &mut ProjectileCore,
        host: &mut dyn SimHost,
        damage: &IncomingDamage,
    ) {
        if let Some(overkill) = core.take_damage(host, damage) {
            self.on_killed(core, host, overkill);
        }
    }

    /// `OnKilled`.
    fn on_killed(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost, overkill: f32) {
        core.on_killed(host, overkill);
    }

    /// `OnImpact`.
    fn on_impact(
        &mut self,
        core: &mut ProjectileCore,
        host: &mut dyn SimHost,
        target_type: Option<TargetType>,
        target: Option<EntityId>,
    ) {
        core.on_impact(host, target_type, target);
    }

    /// `OnDestroy`.
    fn on_destroy(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_destroy(host);
    }

    /// `OnLostTarget`.
    fn on_lost_target(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_lost_target(host);
    }

    /// `OnEnterWater`.
    fn on_enter_water(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_enter_water(host);
    }

    /// `OnExitWater`.
    fn on_exit_water(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_exit_water(host);
    }
}

/// Standard projectile: every hook is the base transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl ProjectileBehavior for DefaultBehavior {
    fn name(&self) -> &'static str {
        "default"
    }
}

/// Placeholder projectile with no cleanup registry and no trails. Used for
/// visual-only munitions that never own sub-objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyBehavior;

impl ProjectileBehavior for DummyBehavior {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn on_create(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_create_minimal(host);
    }
}

/// Decoy carrier: attaches the blueprint's flares on create.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlareBehavior;

impl ProjectileBehavior for FlareBehavior {
    fn name(&self) -> &'static str {
        "flare"
    }

    fn on_create(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_create(host);
        let bp = Rc::clone(&core.blueprint);
        if let Some(spec) = bp.flare.as_ref() {
            core.add_flare(host, spec);
        }
    }
}

/// Strategic warhead: resolves an inner and an outer damage ring on impact
/// in addition to its main payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NukeBehavior {
    inner: DamageRing,
    outer: DamageRing,
}

impl NukeBehavior {
    /// Creates a warhead with the given rings.
    #[must_use]
    pub fn new(inner: DamageRing, outer: DamageRing) -> Self {
        Self { inner, outer }
    }
}

impl ProjectileBehavior for NukeBehavior {
    fn name(&self) -> &'static str {
        "nuke"
    }

    fn on_create(&mut self, core: &mut ProjectileCore, host: &mut dyn SimHost) {
        core.on_create(host);
        core.set_rings(vec![self.inner.clone(), self.outer.clone()]);
        debug!(projectile = %core.id(), "warhead armed");
    }
}
