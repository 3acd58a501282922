//! # Ordnance Core
//!
//! Projectile lifecycle and damage-resolution core for a real-time
//! battlefield simulation.
//!
//! The crate drives the state machine by which a munition is created, checked
//! for collisions, damaged, detonated and removed, and the deferred cleanup
//! that makes sure nothing it spawned outlives it.
//!
//! ## Architecture
//!
//! - **Handles**: every entity, emitter and task is addressed by a
//!   generation-tagged [`Handle`]; a stale handle is detected, never
//!   re-destroyed.
//! - **Cleanup registry**: a [`TrashBag`] holds handles to a projectile's
//!   trails, flares and timers and tears them down together.
//! - **Projectile**: [`ProjectileCore`] implements the base transitions;
//!   a [`ProjectileBehavior`] overrides them per variant.
//! - **Services**: the projectile talks to the engine only through
//!   [`SimHost`](host::SimHost). [`World`] is the in-crate host.
//! - **Scheduling**: deferred work (damage over time, impact timeouts,
//!   forked routines) runs as explicit [`Task`](scheduler::Task) steps on a
//!   single-threaded tick executor.
//!
//! ## Usage
//!
//! ```
//! use std::rc::Rc;
//!
//! use glam::Vec3;
//! use ordnance_core::{
//!     ArmyId, DamageData, DefaultBehavior, ProjectileBlueprint, SimEntity, Simulation,
//!     SimulationConfig, TargetType,
//! };
//! use ordnance_core::host::EntityHost;
//!
//! let mut sim = Simulation::new(&SimulationConfig::default());
//! let tank = sim
//!     .world_mut()
//!     .spawn(SimEntity::unit(ArmyId::new(2), Vec3::new(2.0, 0.0, 0.0), 100.0));
//!
//! let shell = sim.spawn_projectile(
//!     SimEntity::projectile(ArmyId::new(1), Vec3::ZERO),
//!     Rc::new(ProjectileBlueprint::default()),
//!     Box::new(DefaultBehavior),
//! );
//! sim.copy_damage_data(shell, &DamageData::area(40.0, 5.0));
//! sim.impact(shell, TargetType::Unit, Some(tank));
//! assert_eq!(sim.world().health_of(tank), Some(60.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod blueprint;
pub mod category;
pub mod config;
pub mod damage;
pub mod effects;
pub mod error;
pub mod events;
pub mod handle;
pub mod host;
pub mod projectile;
pub mod scheduler;
pub mod simulation;
pub mod trash;
pub mod world;

pub use blueprint::ProjectileBlueprint;
pub use category::{Categories, CategorySet};
pub use config::SimulationConfig;
pub use damage::{DamageData, DamageType};
pub use effects::TargetType;
pub use error::{ConfigError, ContentError};
pub use handle::Handle;
pub use projectile::{
    DefaultBehavior, IncomingDamage, LifecycleState, Projectile, ProjectileBehavior, ProjectileCore,
};
pub use simulation::Simulation;
pub use trash::{Tracked, TrashBag};
pub use world::{ArmyId, EntityId, SimEntity, World};

#[cfg(test)]
mod tests;
