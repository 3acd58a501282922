//! Collision filtering.
//!
//! Both predicates are pure: they read the two objects' static category
//! membership and never change state. Category sets are compiled when the
//! blueprint loads, so a check is a handful of mask tests.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::ProjectileCore;
use crate::category::{CategorySet, COLLISION_EXCLUSIVE};
use crate::host::SimHost;
use crate::world::{ArmyId, EntityId};

/// The weapon side of a weapon-versus-projectile check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeaponInfo {
    /// Army of the unit carrying the weapon
    pub army: ArmyId,
    /// Whether the weapon may engage its own army's projectiles
    pub collide_friendly: bool,
    /// Projectiles matching this set are never engaged
    pub do_not_collide: CategorySet,
}

impl ProjectileCore {
    /// May this projectile interact with `other`?
    ///
    /// Denied when the two share an army, when both are collision-exclusive
    /// munitions (torpedo, missile, direct fire), when `other` only hits its
    /// assigned target and that is not this projectile, or when either side's
    /// do-not-collide set matches the other. A missing object never collides.
    #[must_use]
    pub fn collides_with(&self, host: &dyn SimHost, other: EntityId) -> bool {
        let (Some(this), Some(that)) = (host.entity(self.id), host.entity(other)) else {
            return false;
        };

        if this.army == that.army {
            trace!(projectile = %self.id, %other, "same army");
            return false;
        }

        if this.categories.intersects(COLLISION_EXCLUSIVE)
            && that.categories.intersects(COLLISION_EXCLUSIVE)
        {
            trace!(projectile = %self.id, %other, "mutually exclusive munitions");
            return false;
        }

        if that.hit_assigned_target_only && that.tracking_target != Some(self.id) {
            trace!(projectile = %self.id, %other, "not the assigned target");
            return false;
        }

        if this.do_not_collide.matches(that.categories)
            || that.do_not_collide.matches(this.categories)
        {
            trace!(projectile = %self.id, %other, "do-not-collide list");
            return false;
        }

        true
    }

    /// May `weapon` engage this projectile?
    #[must_use]
    pub fn collides_with_weapon(&self, host: &dyn SimHost, weapon: &WeaponInfo) -> bool {
        let Some(this) = host.entity(self.id) else {
            return false;
        };
        if weapon.army == this.army && !weapon.collide_friendly {
            return false;
        }
        !weapon.do_not_collide.matches(this.categories)
    }
}
