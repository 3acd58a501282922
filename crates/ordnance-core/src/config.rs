//! Simulation configuration.
//!
//! A [`SimulationConfig`] fixes everything a run depends on besides its
//! inputs: the RNG seed, the tick rate, and the terrain the projectiles land
//! on. Two runs with the same configuration and inputs produce the same event
//! log.
//!
//! # Example
//!
//! ```
//! use ordnance_core::config::SimulationConfig;
//!
//! let config = SimulationConfig::from_json(r#"{ "seed": 7, "ticks_per_second": 20 }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.ticks_per_second, 20);
//! assert_eq!(config.terrain.terrain_type, "Default");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::effects::TargetType;
use crate::error::{ConfigError, ContentError};

/// Default simulation rate.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 10;

/// Default time a free-standing effect stays in the world, in seconds.
pub const DEFAULT_EFFECT_LIFETIME: f32 = 1.0;

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Master seed for the deterministic RNG
    pub seed: u64,
    /// Simulation ticks per simulated second
    pub ticks_per_second: u32,
    /// Seconds a one-shot emitter (impact, kill and water effects) lives
    /// before the world releases it
    pub effect_lifetime: f32,
    /// Terrain description
    pub terrain: TerrainConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            effect_lifetime: DEFAULT_EFFECT_LIFETIME,
            terrain: TerrainConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Creates a default configuration with the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed JSON, a zero tick rate, a bad
    /// effect lifetime or invalid terrain.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTickRate`] or a wrapped [`ContentError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_second == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if !(self.effect_lifetime.is_finite() && self.effect_lifetime >= 0.0) {
            return Err(ContentError::InvalidValue {
                field: "effect_lifetime",
                reason: "must be a finite, non-negative number of seconds".to_string(),
            }
            .into());
        }
        self.terrain.validate()?;
        Ok(())
    }
}

/// Impact effects by surface, then impact-effect category (the blueprint's
/// `Display.ImpactEffects.Type`).
pub type ImpactEffectTable = BTreeMap<TargetType, BTreeMap<String, Vec<String>>>;

/// Flat terrain with an optional water plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Ground height everywhere
    pub base_height: f32,
    /// Water surface height; water exists where it is above the ground
    pub water_elevation: Option<f32>,
    /// Terrain type of the ground
    pub terrain_type: String,
    /// Terrain type reported for water impacts over a water plane
    pub water_type: String,
    /// Terrain-specific impact effects, keyed by terrain type
    pub impact_effects: BTreeMap<String, ImpactEffectTable>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            base_height: 0.0,
            water_elevation: None,
            terrain_type: "Default".to_string(),
            water_type: "Water".to_string(),
            impact_effects: BTreeMap::new(),
        }
    }
}

impl TerrainConfig {
    /// Height of whatever a projectile would land on at any point.
    #[must_use]
    pub fn surface_height(&self) -> f32 {
        match self.water_elevation {
            Some(water) if water > self.base_height => water,
            _ => self.base_height,
        }
    }

    /// Returns `true` if a water plane covers the ground.
    #[must_use]
    pub fn has_water(&self) -> bool {
        self.water_elevation.is_some_and(|w| w > self.base_height)
    }

    /// Terrain type an impact on `target_type` lands in.
    ///
    /// The terrain is uniform, so only the surface matters: water impacts
    /// report [`water_type`](Self::water_type) when a water plane exists,
    /// everything else the ground's type.
    #[must_use]
    pub fn terrain_type_for(&self, target_type: TargetType) -> &str {
        if target_type.is_water() && self.has_water() {
            &self.water_type
        } else {
            &self.terrain_type
        }
    }

    /// Effects for a terrain type, surface and impact-effect category; empty
    /// when unmapped.
    #[must_use]
    pub fn effects_for(
        &self,
        terrain_type: &str,
        target_type: TargetType,
        category: &str,
    ) -> &[String] {
        self.impact_effects
            .get(terrain_type)
            .and_then(|by_surface| by_surface.get(&target_type))
            .and_then(|by_category| by_category.get(category))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Effects for an impact on `target_type` with the given category,
    /// looked up under the terrain type the impact lands in.
    #[must_use]
    pub fn impact_effects_for(&self, target_type: TargetType, category: &str) -> &[String] {
        self.effects_for(self.terrain_type_for(target_type), target_type, category)
    }

    fn validate(&self) -> Result<(), ContentError> {
        if !self.base_height.is_finite() {
            return Err(ContentError::InvalidValue {
                field: "terrain.base_height",
                reason: "must be finite".to_string(),
            });
        }
        if self.water_elevation.is_some_and(|w| !w.is_finite()) {
            return Err(ContentError::InvalidValue {
                field: "terrain.water_elevation",
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }
}
