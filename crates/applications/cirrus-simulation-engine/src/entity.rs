//! Entities and the scheduler API handed to them
//!
//! An entity is a unit of behavior with an id assigned by the runtime and a
//! three-phase lifecycle:
//!
//! ```text
//! Created ──start()──▶ Running ──shutdown()──▶ Shutdown
//!                         │  ▲
//!                         └──┘ react() once per event, in clock order
//! ```
//!
//! Reactions never touch the runtime directly. They go through a `Context`,
//! which can schedule and cancel events, reserve ids for new entities and ask
//! the run to stop. Spawns are buffered in the context and applied by the
//! runtime once the reaction returns.

use std::any::Any;
use std::fmt;

use cirrus_core::{EntityId, Result, SimTime};

use crate::event_queue::{Event, EventHandle, EventQueue};

/// A message type carried by events of one simulation
pub trait Message: fmt::Debug + 'static {
    /// Short name of the variant (for logs and error tallies)
    fn tag(&self) -> &'static str;
}

/// Upcast to `Any` so the registry can hand out concrete entity types
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behavior driven by the simulation runtime
pub trait Entity<M: Message>: AsAny {
    fn name(&self) -> &str;

    /// Called exactly once, right after registration
    fn start(&mut self, ctx: &mut Context<'_, M>) -> Result<()>;

    /// Called once per event targeted at this entity
    fn react(&mut self, event: &Event<M>, ctx: &mut Context<'_, M>) -> Result<()>;

    /// Called once when the run terminates
    fn shutdown(&mut self, _now: SimTime) {}
}

/// Effects a reaction asked for that the runtime applies afterwards
pub(crate) struct Effects<M: Message> {
    pub spawned: Vec<(EntityId, Box<dyn Entity<M>>)>,
    pub stop: bool,
}

/// Scheduler API available to an entity while it starts or reacts
pub struct Context<'a, M: Message> {
    queue: &'a mut EventQueue<M>,
    next_id: &'a mut u64,
    self_id: EntityId,
    spawned: Vec<(EntityId, Box<dyn Entity<M>>)>,
    stop: bool,
}

impl<'a, M: Message> Context<'a, M> {
    pub(crate) fn new(queue: &'a mut EventQueue<M>, next_id: &'a mut u64, self_id: EntityId) -> Self {
        Context {
            queue,
            next_id,
            self_id,
            spawned: Vec::new(),
            stop: false,
        }
    }

    pub(crate) fn into_effects(self) -> Effects<M> {
        Effects {
            spawned: self.spawned,
            stop: self.stop,
        }
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Id of the entity this context belongs to
    pub fn self_id(&self) -> EntityId {
        self.self_id
    }

    /// Enqueue `message` for `target` after `delay`
    pub fn schedule(&mut self, target: EntityId, delay: f64, message: M) -> Result<EventHandle> {
        self.queue.schedule(delay, self.self_id, target, message)
    }

    pub fn schedule_self(&mut self, delay: f64, message: M) -> Result<EventHandle> {
        self.queue.schedule(delay, self.self_id, self.self_id, message)
    }

    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.queue.cancel(handle)
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.queue.is_pending(handle)
    }

    /// The id the next `spawn` will hand out
    pub fn next_entity_id(&self) -> EntityId {
        EntityId(*self.next_id)
    }

    /// Reserve an id for `entity`. It is registered and started as soon as
    /// the current reaction returns, before the next event is popped.
    pub fn spawn(&mut self, entity: Box<dyn Entity<M>>) -> EntityId {
        let id = EntityId(*self.next_id);
        *self.next_id += 1;
        self.spawned.push((id, entity));
        id
    }

    /// Ask the runtime to stop after this reaction
    pub fn stop(&mut self) {
        self.stop = true;
    }
}
