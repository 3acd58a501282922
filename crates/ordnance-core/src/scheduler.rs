//! Tick-driven cooperative task executor.
//!
//! Deferred work (damage-over-time pulses, impact-timeout destruction,
//! lifetimes, forked content routines) is expressed as explicit [`Task`]
//! objects. A task does not suspend mid-function: each call to
//! [`Task::resume`] runs one step and returns what to do next, either wait
//! for some ticks or finish. Whatever state the next step needs lives in the
//! task struct itself.
//!
//! # Ordering
//!
//! Due tasks run in `(due tick, schedule sequence)` order. A task that asks
//! to wait again gets a fresh sequence number, so it queues behind tasks that
//! were already due on its new tick.
//!
//! # Cancellation
//!
//! Cancelling removes the task's slot; its queue entry is skipped lazily. A
//! task cancelled while it is running (for example, by tearing down the
//! registry of the projectile it just destroyed) is dropped instead of being
//! re-queued.

use std::collections::BTreeMap;
use std::fmt;

use crate::handle::{Handle, SlotArena};
use crate::host::SimHost;
use crate::world::EntityId;

/// Handle to a scheduled task.
pub type TaskId = Handle<TaskSlot>;

/// Outcome of one task step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStep {
    /// Resume again after this many ticks (at least one).
    Wait(u64),
    /// The task is finished and its slot is released.
    Done,
}

/// A unit of deferred work.
pub trait Task {
    /// Short static label used in logs and events.
    fn name(&self) -> &'static str;

    /// Runs one step against the host.
    ///
    /// Tasks must re-check the liveness of anything they act on: the entity
    /// that scheduled them may be gone by the time they resume.
    fn resume(&mut self, host: &mut dyn SimHost) -> TaskStep;
}

/// Storage slot for one scheduled task.
///
/// The boxed task is taken out while it runs and put back if it waits again.
pub struct TaskSlot {
    task: Option<Box<dyn Task>>,
    owner: Option<EntityId>,
    name: &'static str,
}

impl TaskSlot {
    /// Entity the task was scheduled on behalf of, if any.
    #[must_use]
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    /// Label of the task.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlot")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("running", &self.task.is_none())
            .finish()
    }
}

/// Queue of pending tasks keyed by due tick.
#[derive(Debug, Default)]
pub struct Scheduler {
    slots: SlotArena<TaskSlot>,
    queue: BTreeMap<(u64, u64), TaskId>,
    next_seq: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `task` to first run on `due_tick`.
    pub fn schedule(
        &mut self,
        task: Box<dyn Task>,
        owner: Option<EntityId>,
        due_tick: u64,
    ) -> TaskId {
        let name = task.name();
        let id = self.slots.insert(TaskSlot {
            task: Some(task),
            owner,
            name,
        });
        self.enqueue(id, due_tick);
        id
    }

    fn enqueue(&mut self, id: TaskId, due_tick: u64) {
        self.queue.insert((due_tick, self.next_seq), id);
        self.next_seq += 1;
    }

    /// Cancels a task. Returns `false` if it already finished or was
    /// cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.slots.remove(id).is_some()
    }

    /// Returns `true` while the task has not finished or been cancelled.
    #[must_use]
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.slots.contains(id)
    }

    /// Number of unfinished tasks, including one that is currently running.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.len()
    }

    /// Looks up a pending task's slot.
    #[must_use]
    pub fn slot(&self, id: TaskId) -> Option<&TaskSlot> {
        self.slots.get(id)
    }

    /// Earliest tick at which something is queued.
    #[must_use]
    pub fn next_due(&self) -> Option<u64> {
        self.queue
            .iter()
            .find(|(_, id)| self.slots.contains(**id))
            .map(|((due, _), _)| *due)
    }

    /// Takes the next task due at or before `now` out of its slot.
    ///
    /// The slot stays allocated while the task runs; call
    /// [`Scheduler::requeue`] or [`Scheduler::finish`] afterwards.
    pub fn pop_due(&mut self, now: u64) -> Option<(TaskId, Box<dyn Task>)> {
        loop {
            let (&key, &id) = self.queue.iter().next()?;
            if key.0 > now {
                return None;
            }
            self.queue.remove(&key);
            let Some(slot) = self.slots.get_mut(id) else {
                continue; // cancelled
            };
            if let Some(task) = slot.task.take() {
                return Some((id, task));
            }
        }
    }

    /// Puts a task that asked to wait back into the queue.
    ///
    /// The task is dropped if it was cancelled while running.
    pub fn requeue(&mut self, id: TaskId, task: Box<dyn Task>, due_tick: u64) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        slot.task = Some(task);
        self.enqueue(id, due_tick);
        true
    }

    /// Releases the slot of a finished task.
    pub fn finish(&mut self, id: TaskId) {
        self.slots.remove(id);
    }
}

/// Ticks to wait for a "wait N seconds" request.
///
/// One extra tick is added so the wait always spans the full duration: two
/// seconds at ten ticks per second resumes 21 ticks later.
#[must_use]
pub fn seconds_to_wait_ticks(seconds: f32, ticks_per_second: u32) -> u64 {
    seconds_to_ticks(seconds, ticks_per_second).saturating_add(1)
}

/// Rounds a duration to whole ticks (never negative).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seconds_to_ticks(seconds: f32, ticks_per_second: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (f64::from(seconds) * f64::from(ticks_per_second)).round() as u64
}

/// Destroys an entity once its delay elapses.
///
/// Used for impact timeouts and lifetimes. Destroying an entity that is
/// already gone is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct DelayedDestroy {
    target: EntityId,
}

impl DelayedDestroy {
    /// Creates a task that destroys `target` when it runs.
    #[must_use]
    pub fn new(target: EntityId) -> Self {
        Self { target }
    }
}

impl Task for DelayedDestroy {
    fn name(&self) -> &'static str {
        "delayed_destroy"
    }

    fn resume(&mut self, host: &mut dyn SimHost) -> TaskStep {
        if host.entity_exists(self.target) {
            host.destroy_entity(self.target);
        }
        TaskStep::Done
    }
}

/// Adapter turning a closure into a [`Task`].
pub struct ForkedTask<F> {
    name: &'static str,
    body: F,
}

impl<F> ForkedTask<F>
where
    F: FnMut(&mut dyn SimHost) -> TaskStep,
{
    /// Wraps `body`; it runs once per resume.
    pub fn new(name: &'static str, body: F) -> Self {
        Self { name, body }
    }
}

impl<F> Task for ForkedTask<F>
where
    F: FnMut(&mut dyn SimHost) -> TaskStep,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn resume(&mut self, host: &mut dyn SimHost) -> TaskStep {
        (self.body)(host)
    }
}
