//! Read-only projectile content descriptors.
//!
//! A [`ProjectileBlueprint`] is loaded once from JSON (PascalCase keys, the
//! same shape as the content files) and shared by every projectile of that
//! type. Category lists are compiled to bitmask sets during loading, so a bad
//! category name is a load error and never reaches a collision check.
//!
//! # Example
//!
//! ```
//! use ordnance_core::blueprint::ProjectileBlueprint;
//! use ordnance_core::category::Categories;
//!
//! let bp = ProjectileBlueprint::from_json(r#"{
//!     "BlueprintId": "/projectiles/tactical_missile",
//!     "Physics": { "TrackTarget": true, "DoNotCollideList": ["MISSILE"] },
//!     "Defense": { "MaxHealth": 3 },
//!     "Categories": ["PROJECTILE", "MISSILE", "TACTICAL"]
//! }"#).unwrap();
//!
//! assert!(bp.is_health_bearing());
//! assert!(bp.categories.contains(Categories::TACTICAL));
//! assert!(bp.physics.do_not_collide_list.matches(Categories::MISSILE));
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::{
    deserialize_expression_list, deserialize_name_list, serialize_expression_list,
    serialize_name_list, Categories, CategorySet,
};
use crate::effects::{EffectGroup, TargetType};
use crate::error::ContentError;

/// Default remaining lifetime after a tracking projectile loses its target.
pub const DEFAULT_LOST_TARGET_LIFETIME: f32 = 0.5;

/// Static configuration of one projectile type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProjectileBlueprint {
    /// Content identifier, used in logs
    pub blueprint_id: String,
    /// Flight and impact behavior
    pub physics: PhysicsSection,
    /// Health
    pub defense: DefenseSection,
    /// Sound cues by key (`ImpactTerrain`, `EnterWater`, ...)
    pub audio: BTreeMap<String, String>,
    /// Impact-effect category and scale
    pub display: DisplaySection,
    /// Visual effects
    pub effects: EffectsSection,
    /// The projectile's own category membership
    #[serde(
        deserialize_with = "deserialize_name_list",
        serialize_with = "serialize_name_list"
    )]
    pub categories: Categories,
    /// Decoy carried by flare-carrying projectiles
    pub flare: Option<FlareSpec>,
}

/// `Physics` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PhysicsSection {
    /// Homes on its target
    pub track_target: bool,
    /// Snap the target position to the ground on creation
    pub track_target_ground: bool,
    /// Seconds to live after losing the target
    pub on_lost_target_lifetime: Option<f32>,
    /// Seconds to linger after a terrain impact before being destroyed
    pub impact_timeout: Option<f32>,
    /// Only collide with the assigned target
    pub hit_assigned_target: bool,
    /// Destroy on impact
    pub destroy_on_impact: bool,
    /// Objects matching any of these expressions never collide with it
    #[serde(
        deserialize_with = "deserialize_expression_list",
        serialize_with = "serialize_expression_list"
    )]
    pub do_not_collide_list: CategorySet,
}

impl Default for PhysicsSection {
    fn default() -> Self {
        Self {
            track_target: false,
            track_target_ground: false,
            on_lost_target_lifetime: None,
            impact_timeout: None,
            hit_assigned_target: false,
            destroy_on_impact: true,
            do_not_collide_list: CategorySet::empty(),
        }
    }
}

/// `Defense` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DefenseSection {
    /// Maximum health; 1 means any damage is lethal
    pub max_health: f32,
}

impl Default for DefenseSection {
    fn default() -> Self {
        Self { max_health: 1.0 }
    }
}

/// `Display` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DisplaySection {
    /// Terrain-effect selection
    pub impact_effects: ImpactEffectsSection,
}

/// `Display.ImpactEffects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImpactEffectsSection {
    /// Impact-effect category looked up in the terrain table
    #[serde(rename = "Type")]
    pub kind: String,
    /// Scale applied to terrain effects
    pub scale: f32,
}

impl Default for ImpactEffectsSection {
    fn default() -> Self {
        Self {
            kind: "Default".to_string(),
            scale: 1.0,
        }
    }
}

/// `Effects` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EffectsSection {
    /// Impact effects by surface
    pub impact: BTreeMap<TargetType, EffectGroup>,
    /// Spawned when the projectile is shot down
    pub on_killed: EffectGroup,
    /// Spawned when entering water
    pub enter_water: EffectGroup,
    /// Spawned when leaving water
    pub exit_water: EffectGroup,
    /// Attached particle trails
    pub fx_trails: Vec<String>,
    /// Scale of the particle trails
    pub fx_trail_scale: f32,
    /// Forward offset of the particle trails
    pub fx_trail_offset: f32,
    /// Ribbon trails
    pub poly_trails: Vec<String>,
    /// Forward offset per ribbon trail (missing entries mean 0)
    pub poly_trail_offsets: Vec<f32>,
    /// When nonzero, pick this many ribbon trails at random (with
    /// replacement) instead of spawning all of them
    pub random_poly_trails: u32,
    /// Spawn impact effects along the flight direction instead of at the
    /// origin
    pub impact_trajectory_aligned: bool,
}

impl Default for EffectsSection {
    fn default() -> Self {
        Self {
            impact: BTreeMap::new(),
            on_killed: EffectGroup::default(),
            enter_water: EffectGroup::default(),
            exit_water: EffectGroup::default(),
            fx_trails: Vec::new(),
            fx_trail_scale: 1.0,
            fx_trail_offset: 0.0,
            poly_trails: Vec::new(),
            poly_trail_offsets: Vec::new(),
            random_poly_trails: 0,
            impact_trajectory_aligned: true,
        }
    }
}

impl EffectsSection {
    /// Offset of the `index`-th ribbon trail.
    #[must_use]
    pub fn poly_trail_offset(&self, index: usize) -> f32 {
        self.poly_trail_offsets.get(index).copied().unwrap_or(0.0)
    }
}

/// Decoy flare attached to a projectile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FlareSpec {
    /// Decoy radius; no flare is created without one
    pub radius: Option<f32>,
    /// Munitions attracted by the decoy
    pub category: CategorySet,
    /// Also create flares above and below
    pub stack: bool,
    /// Vertical offset of stacked flares, as a fraction of the radius
    pub offset_mult: f32,
}

impl Default for FlareSpec {
    fn default() -> Self {
        Self {
            radius: None,
            category: CategorySet::empty(),
            stack: false,
            offset_mult: 0.5,
        }
    }
}

impl ProjectileBlueprint {
    /// Parses and validates a blueprint.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError`] on malformed JSON, unknown category or
    /// target-type names, or out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let blueprint: Self = serde_json::from_str(json)?;
        blueprint.validate()?;
        Ok(blueprint)
    }

    /// Checks ranges serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<(), ContentError> {
        let max_health = self.defense.max_health;
        if !max_health.is_finite() || max_health <= 0.0 {
            return Err(invalid("Defense.MaxHealth", "must be positive"));
        }
        if self.physics.impact_timeout.is_some_and(is_negative) {
            return Err(invalid("Physics.ImpactTimeout", "must not be negative"));
        }
        if self.physics.on_lost_target_lifetime.is_some_and(is_negative) {
            return Err(invalid("Physics.OnLostTargetLifetime", "must not be negative"));
        }
        if self.effects.fx_trail_scale.is_nan() || self.effects.fx_trail_scale <= 0.0 {
            return Err(invalid("Effects.FxTrailScale", "must be positive"));
        }
        if let Some(radius) = self.flare.as_ref().and_then(|f| f.radius) {
            if is_negative(radius) {
                return Err(invalid("Flare.Radius", "must not be negative"));
            }
        }
        Ok(())
    }

    /// Returns `true` when health is tracked (`MaxHealth > 1`).
    #[must_use]
    pub fn is_health_bearing(&self) -> bool {
        self.defense.max_health > 1.0
    }

    /// Sound cue declared for `key`.
    #[must_use]
    pub fn sound(&self, key: &str) -> Option<&str> {
        self.audio.get(key).map(String::as_str)
    }

    /// Impact effect group for a surface.
    #[must_use]
    pub fn impact_group(&self, target_type: TargetType) -> Option<&EffectGroup> {
        self.effects.impact.get(&target_type.effect_slot())
    }

    /// Seconds to live after losing the target.
    #[must_use]
    pub fn lost_target_lifetime(&self) -> f32 {
        self.physics
            .on_lost_target_lifetime
            .unwrap_or(DEFAULT_LOST_TARGET_LIFETIME)
    }
}

fn is_negative(value: f32) -> bool {
    value.is_nan() || value < 0.0
}

fn invalid(field: &'static str, reason: &str) -> ContentError {
    ContentError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}
