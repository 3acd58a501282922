//! Impact surfaces and effect dispatch helpers.
//!
//! [`TargetType`] is the closed set of surfaces a projectile can hit. Each one
//! selects a sound key and an [`EffectGroup`] from the projectile's content;
//! the helpers here turn a group into spawned, scaled emitters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContentError;
use crate::world::{ArmyId, EmitterId, EntityId};

/// What a projectile collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetType {
    /// Solid ground.
    Terrain,
    /// Water surface.
    Water,
    /// A shield bubble.
    Shield,
    /// A surface unit.
    Unit,
    /// A flying unit.
    UnitAir,
    /// Nothing (detonated in the air).
    Air,
    /// Another projectile.
    Projectile,
    /// Another projectile, below the water surface.
    ProjectileUnderwater,
    /// A terrain prop.
    Prop,
    /// Below the water surface (no unit).
    Underwater,
    /// A submerged unit.
    UnitUnderwater,
}

impl TargetType {
    /// Every target type, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Terrain,
        Self::Water,
        Self::Shield,
        Self::Unit,
        Self::UnitAir,
        Self::Air,
        Self::Projectile,
        Self::ProjectileUnderwater,
        Self::Prop,
        Self::Underwater,
        Self::UnitUnderwater,
    ];

    /// Content name of this surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Terrain => "Terrain",
            Self::Water => "Water",
            Self::Shield => "Shield",
            Self::Unit => "Unit",
            Self::UnitAir => "UnitAir",
            Self::Air => "Air",
            Self::Projectile => "Projectile",
            Self::ProjectileUnderwater => "ProjectileUnderwater",
            Self::Prop => "Prop",
            Self::Underwater => "Underwater",
            Self::UnitUnderwater => "UnitUnderwater",
        }
    }

    /// Audio key played on impact with this surface (`"Impact" + name`).
    #[must_use]
    pub fn impact_sound_key(self) -> String {
        format!("Impact{}", self.as_str())
    }

    /// Returns `true` for impacts on or below a water surface.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(
            self,
            Self::Water | Self::Underwater | Self::UnitUnderwater | Self::ProjectileUnderwater
        )
    }

    /// Surface whose effect group this target type uses.
    ///
    /// Submerged units share the underwater group.
    #[must_use]
    pub const fn effect_slot(self) -> Self {
        match self {
            Self::UnitUnderwater => Self::Underwater,
            other => other,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ContentError::UnknownTargetType(s.to_string()))
    }
}

/// Attachment point for an emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bone {
    /// The entity's origin.
    Origin,
    /// The entity's origin, oriented along its flight direction.
    TrajectoryAligned,
    /// A named bone by index.
    Index(u16),
}

/// A list of effect blueprints spawned together with one uniform scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EffectGroup {
    /// Effect blueprint identifiers.
    pub effects: Vec<String>,
    /// Uniform scale applied to every spawned emitter.
    pub scale: f32,
}

impl Default for EffectGroup {
    fn default() -> Self {
        Self {
            effects: Vec::new(),
            scale: 1.0,
        }
    }
}

impl EffectGroup {
    /// Builds a group from effect names with unit scale.
    #[must_use]
    pub fn new<S: Into<String>>(effects: impl IntoIterator<Item = S>) -> Self {
        Self {
            effects: effects.into_iter().map(Into::into).collect(),
            scale: 1.0,
        }
    }

    /// Sets the scale.
    #[must_use]
    pub fn scaled(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Returns `true` if the group spawns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Spawn/scale/offset of visual and audio emitters.
pub trait EffectDispatcher {
    /// Spawns a free-standing emitter at the entity's current position.
    fn spawn_emitter_at_entity(
        &mut self,
        entity: EntityId,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId>;

    /// Spawns a free-standing emitter at one of the entity's bones.
    fn spawn_emitter_at_bone(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId>;

    /// Spawns an emitter that follows the entity and dies with it.
    fn attach_emitter(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId>;

    /// Spawns a ribbon trail that follows the entity and dies with it.
    fn create_trail(
        &mut self,
        entity: EntityId,
        bone: Bone,
        army: ArmyId,
        effect: &str,
    ) -> Option<EmitterId>;

    /// Uniformly scales an emitter. No-op on a dead emitter.
    fn scale_emitter(&mut self, emitter: EmitterId, scale: f32);

    /// Offsets an emitter from its anchor. No-op on a dead emitter.
    fn offset_emitter(&mut self, emitter: EmitterId, x: f32, y: f32, z: f32);
}

/// Spawns every effect of `group` on `entity`, scaled when the scale is not 1.
///
/// Trajectory-aligned groups spawn at the trajectory bone; others at the
/// entity's origin. Returns the emitters that were created.
pub fn spawn_effect_group<E>(
    fx: &mut E,
    entity: EntityId,
    army: ArmyId,
    group: &EffectGroup,
    trajectory_aligned: bool,
) -> Vec<EmitterId>
where
    E: EffectDispatcher + ?Sized,
{
    spawn_scaled(fx, &group.effects, group.scale, |fx, effect| {
        if trajectory_aligned {
            fx.spawn_emitter_at_bone(entity, Bone::TrajectoryAligned, army, effect)
        } else {
            fx.spawn_emitter_at_entity(entity, army, effect)
        }
    })
}

/// Spawns terrain-specific impact effects at the trajectory bone.
pub fn spawn_terrain_effects<E>(
    fx: &mut E,
    entity: EntityId,
    army: ArmyId,
    effects: &[String],
    scale: f32,
) -> Vec<EmitterId>
where
    E: EffectDispatcher + ?Sized,
{
    spawn_scaled(fx, effects, scale, |fx, effect| {
        fx.spawn_emitter_at_bone(entity, Bone::TrajectoryAligned, army, effect)
    })
}

#[allow(clippy::float_cmp)]
fn spawn_scaled<E, F>(
    fx: &mut E,
    effects: &[String],
    scale: f32,
    mut spawn: F,
) -> Vec<EmitterId>
where
    E: EffectDispatcher + ?Sized,
    F: FnMut(&mut E, &str) -> Option<EmitterId>,
{
    let mut spawned = Vec::with_capacity(effects.len());
    for effect in effects {
        let Some(emitter) = spawn(fx, effect) else {
            continue;
        };
        if scale != 1.0 {
            fx.scale_emitter(emitter, scale);
        }
        spawned.push(emitter);
    }
    spawned
}
