//! Observable simulation events.
//!
//! Every externally visible effect of a transition (damage, emitters, sounds,
//! buffs, destruction, scheduling) is appended to the world's event log as a
//! [`SimEvent`]. The log is drained with
//! [`World::take_events`](crate::world::World::take_events), typically once
//! per tick, and is the basis for replay and for the crate's tests.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::damage::{AreaDamage, DirectDamage};
use crate::scheduler::TaskId;
use crate::world::{EmitterId, EntityId};

/// One recorded event, stamped with the tick it happened on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Tick during which the event happened.
    pub tick: u64,
    /// What happened.
    pub kind: EventKind,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// An area-damage application.
    AreaDamage(AreaDamage),
    /// A direct-damage application.
    DirectDamage(DirectDamage),
    /// An emitter, trail or attached effect was created.
    EmitterSpawned {
        /// New emitter
        emitter: EmitterId,
        /// Entity it was spawned on
        entity: EntityId,
        /// Effect blueprint identifier
        effect: String,
    },
    /// An emitter was scaled.
    EmitterScaled {
        /// Scaled emitter
        emitter: EmitterId,
        /// Uniform scale
        scale: f32,
    },
    /// An emitter was offset from its anchor.
    EmitterOffset {
        /// Offset emitter
        emitter: EmitterId,
        /// Offset
        offset: Vec3,
    },
    /// An emitter was destroyed.
    EmitterDestroyed {
        /// Destroyed emitter
        emitter: EmitterId,
    },
    /// A sound cue was played.
    SoundPlayed {
        /// Entity the sound was played at
        entity: EntityId,
        /// Sound cue
        sound: String,
    },
    /// A buff was applied.
    BuffApplied {
        /// Unit receiving the buff
        target: EntityId,
        /// Buff blueprint name
        buff: String,
        /// Center of a positional buff
        center: Option<Vec3>,
    },
    /// An entity left the simulation.
    EntityDestroyed {
        /// Destroyed entity
        entity: EntityId,
    },
    /// A task was queued.
    TaskScheduled {
        /// New task
        task: TaskId,
        /// Task label
        name: String,
        /// Tick on which it first runs
        due_tick: u64,
    },
    /// A pending task was cancelled.
    TaskCancelled {
        /// Cancelled task
        task: TaskId,
    },
}

impl EventKind {
    /// Returns `true` for damage applications of either kind.
    #[must_use]
    pub const fn is_damage(&self) -> bool {
        matches!(self, Self::AreaDamage(_) | Self::DirectDamage(_))
    }

    /// Entity this event concerns, if it concerns one.
    #[must_use]
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Self::AreaDamage(_)
            | Self::EmitterScaled { .. }
            | Self::EmitterOffset { .. }
            | Self::EmitterDestroyed { .. }
            | Self::TaskScheduled { .. }
            | Self::TaskCancelled { .. } => None,
            Self::DirectDamage(d) => Some(d.target),
            Self::EmitterSpawned { entity, .. }
            | Self::SoundPlayed { entity, .. }
            | Self::EntityDestroyed { entity } => Some(*entity),
            Self::BuffApplied { target, .. } => Some(*target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::DamageType;
    use crate::handle::Handle;

    #[test]
    fn damage_classification() {
        let direct = EventKind::DirectDamage(DirectDamage {
            instigator: Handle::from_raw(0, 0),
            position: Vec3::ZERO,
            target: Handle::from_raw(1, 0),
            amount: 5.0,
            damage_type: DamageType::Normal,
        });
        assert!(direct.is_damage());
        assert_eq!(direct.entity(), Some(Handle::from_raw(1, 0)));

        let sound = EventKind::SoundPlayed {
            entity: Handle::from_raw(2, 0),
            sound: "ImpactTerrain".into(),
        };
        assert!(!sound.is_damage());
        assert_eq!(sound.entity(), Some(Handle::from_raw(2, 0)));
    }

    #[test]
    fn serializes_to_json() {
        let event = SimEvent {
            tick: 3,
            kind: EventKind::EntityDestroyed {
                entity: Handle::from_raw(4, 1),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
