//! Crate-level tests.
//!
//! Module tests cover each piece in isolation; these drive whole scenarios
//! through [`Simulation`](crate::simulation::Simulation):
//!
//! - `determinism.rs`: same seed and inputs give the same event log
//! - `integration.rs`: end-to-end projectile lifecycles
//! - `properties.rs`: proptest properties of the registry, damage and
//!   collision rules
//! - `helpers.rs`: fixtures shared by the above

mod helpers;
mod integration;
