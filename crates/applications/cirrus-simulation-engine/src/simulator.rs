//! Discrete-event simulation runtime
//!
//! Owns the clock, the event queue and the entity registry. Each step pops
//! the earliest live event, dispatches it to the target entity and then
//! applies whatever that reaction asked for (new entities, stop).

use std::collections::{BTreeMap, VecDeque};

use cirrus_core::{EntityId, ErrorKind, LifecycleState, Result, SimError, SimTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::entity::{AsAny, Context, Entity, Message};
use crate::event_queue::{Event, EventHandle, EventQueue};

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time horizon for `run()`. Events scheduled after it are left unpopped.
    pub until: Option<SimTime>,
    /// Upper bound on dispatched events, as a guard against runaway models
    pub max_events: Option<u64>,
}

/// Counters collected over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub events_dispatched: u64,
    pub events_cancelled: u64,
    /// All entities, including spawned ones
    pub entities_registered: u64,
    pub entities_spawned: u64,
    /// Recoverable errors by kind
    pub recoverable: BTreeMap<ErrorKind, u64>,
    pub final_time: SimTime,
}

impl SimulationStats {
    pub fn recoverable_count(&self, kind: ErrorKind) -> u64 {
        self.recoverable.get(&kind).copied().unwrap_or(0)
    }
}

/// Why a call to `run`/`run_until` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// No live events remain
    Drained,
    /// The next event lies beyond the requested time
    Horizon,
    /// Stop requested by an entity or by the caller
    Stopped,
    /// `max_events` reached
    EventLimit,
}

struct Slot<M: Message> {
    name: String,
    state: LifecycleState,
    entity: Box<dyn Entity<M>>,
}

/// Discrete-event simulation runtime
pub struct Simulation<M: Message> {
    config: SimulationConfig,
    queue: EventQueue<M>,
    /// Indexed by `EntityId`
    entities: Vec<Slot<M>>,
    next_id: u64,
    pending_spawns: VecDeque<(EntityId, Box<dyn Entity<M>>)>,
    stop_requested: bool,
    terminated: bool,
    stats: SimulationStats,
}

impl<M: Message> Simulation<M> {
    pub fn new(config: SimulationConfig) -> Self {
        Simulation {
            config,
            queue: EventQueue::new(),
            entities: Vec::new(),
            next_id: 0,
            pending_spawns: VecDeque::new(),
            stop_requested: false,
            terminated: false,
            stats: SimulationStats::default(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    /// Add an entity and start it immediately.
    ///
    /// A fatal start error is returned. A recoverable one is logged and the
    /// entity is left shut down. Registering after the run has terminated is
    /// rejected, since nothing would shut the entity down.
    pub fn register(&mut self, entity: Box<dyn Entity<M>>) -> Result<EntityId> {
        if self.terminated {
            return Err(SimError::Terminated(self.now()));
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.insert(id, entity);

        if let Err(err) = self.start_entity(id) {
            self.handle_error(id, err)?;
        }
        self.apply_spawns()?;

        Ok(id)
    }

    /// Enqueue an event from outside any entity
    pub fn schedule(&mut self, delay: f64, source: EntityId, target: EntityId, message: M) -> Result<EventHandle> {
        self.queue.schedule(delay, source, target, message)
    }

    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.queue.cancel(handle)
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Run until the queue drains, an entity stops the run, the configured
    /// horizon or event limit is reached, or a fatal error occurs. Running
    /// entities are shut down on every exit path.
    pub fn run(&mut self) -> Result<RunOutcome> {
        let outcome = self.run_loop(self.config.until)?;
        self.finish();
        Ok(outcome)
    }

    /// Run up to and including events at `time`, then pause with the queue
    /// intact. Entities are only shut down on stop or a fatal error.
    pub fn run_until(&mut self, time: SimTime) -> Result<RunOutcome> {
        self.run_loop(Some(time))
    }

    /// Dispatch a single event. Returns false when there was nothing to do.
    pub fn step(&mut self) -> Result<bool> {
        if self.terminated {
            return Ok(false);
        }
        let Some(event) = self.queue.pop_next() else {
            return Ok(false);
        };
        if let Err(err) = self.dispatch(event) {
            self.finish();
            return Err(err);
        }
        if self.stop_requested {
            self.finish();
        }
        Ok(true)
    }

    /// External stop: shuts down every running entity once
    pub fn stop(&mut self) {
        self.finish();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn stats(&self) -> SimulationStats {
        let mut stats = self.stats.clone();
        stats.events_cancelled = self.queue.cancelled_count();
        stats.final_time = self.queue.now();
        stats
    }

    /// Typed view of a registered entity
    pub fn entity<T: 'static>(&self, id: EntityId) -> Option<&T> {
        let slot = self.slot(id)?;
        (*slot.entity).as_any().downcast_ref::<T>()
    }

    pub fn entity_mut<T: 'static>(&mut self, id: EntityId) -> Option<&mut T> {
        let slot = self.entities.get_mut(id.0 as usize)?;
        (*slot.entity).as_any_mut().downcast_mut::<T>()
    }

    pub fn state(&self, id: EntityId) -> Option<LifecycleState> {
        self.slot(id).map(|slot| slot.state)
    }

    pub fn name(&self, id: EntityId) -> Option<&str> {
        self.slot(id).map(|slot| slot.name.as_str())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.entities.len() as u64).map(EntityId)
    }

    fn slot(&self, id: EntityId) -> Option<&Slot<M>> {
        self.entities.get(id.0 as usize)
    }

    fn run_loop(&mut self, horizon: Option<SimTime>) -> Result<RunOutcome> {
        loop {
            if self.terminated {
                return Ok(RunOutcome::Stopped);
            }
            if self.stop_requested {
                info!("Stop requested at t={:.2}", self.now());
                self.finish();
                return Ok(RunOutcome::Stopped);
            }
            if let Some(limit) = self.config.max_events {
                if self.stats.events_dispatched >= limit {
                    warn!("Event limit of {} reached at t={:.2}", limit, self.now());
                    return Ok(RunOutcome::EventLimit);
                }
            }

            let Some(next_time) = self.queue.peek_time() else {
                return Ok(RunOutcome::Drained);
            };
            if horizon.is_some_and(|limit| next_time > limit) {
                return Ok(RunOutcome::Horizon);
            }

            let Some(event) = self.queue.pop_next() else {
                return Ok(RunOutcome::Drained);
            };
            if let Err(err) = self.dispatch(event) {
                self.finish();
                return Err(err);
            }
        }
    }

    fn dispatch(&mut self, event: Event<M>) -> Result<()> {
        let target = event.target;
        let running = self
            .slot(target)
            .is_some_and(|slot| slot.state == LifecycleState::Running);
        if !running {
            return self.handle_error(target, SimError::UnknownTarget(target));
        }

        self.stats.events_dispatched += 1;
        trace!(
            "t={:.2} {} -> {} {}",
            event.time,
            event.source,
            target,
            event.message.tag()
        );

        let slot = &mut self.entities[target.0 as usize];
        let mut ctx = Context::new(&mut self.queue, &mut self.next_id, target);
        let result = slot.entity.react(&event, &mut ctx);
        let effects = ctx.into_effects();

        self.stop_requested |= effects.stop;
        self.pending_spawns.extend(effects.spawned);

        if let Err(err) = result {
            self.handle_error(target, err)?;
        }
        self.apply_spawns()
    }

    fn insert(&mut self, id: EntityId, entity: Box<dyn Entity<M>>) {
        debug_assert_eq!(id.0 as usize, self.entities.len());
        let name = entity.name().to_string();
        debug!("Registered {} as {}", name, id);
        self.entities.push(Slot {
            name,
            state: LifecycleState::Created,
            entity,
        });
        self.stats.entities_registered += 1;
    }

    fn start_entity(&mut self, id: EntityId) -> Result<()> {
        let slot = &mut self.entities[id.0 as usize];
        let mut ctx = Context::new(&mut self.queue, &mut self.next_id, id);
        let result = slot.entity.start(&mut ctx);
        let effects = ctx.into_effects();

        slot.state = if result.is_ok() {
            LifecycleState::Running
        } else {
            LifecycleState::Shutdown
        };
        self.stop_requested |= effects.stop;
        self.pending_spawns.extend(effects.spawned);

        result
    }

    /// Register and start spawned entities in reservation order. Entities
    /// spawned from a `start` are queued behind the ones already pending.
    fn apply_spawns(&mut self) -> Result<()> {
        while let Some((id, entity)) = self.pending_spawns.pop_front() {
            self.insert(id, entity);
            self.stats.entities_spawned += 1;
            if let Err(err) = self.start_entity(id) {
                self.handle_error(id, err)?;
            }
        }
        Ok(())
    }

    fn handle_error(&mut self, entity: EntityId, err: SimError) -> Result<()> {
        if err.is_recoverable() {
            warn!("t={:.2} {}: {}", self.now(), entity, err);
            *self.stats.recoverable.entry(err.kind()).or_insert(0) += 1;
            Ok(())
        } else {
            error!("t={:.2} {}: {} (halting)", self.now(), entity, err);
            Err(err)
        }
    }

    fn finish(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.pending_spawns.clear();

        let now = self.queue.now();
        for slot in self.entities.iter_mut() {
            if slot.state == LifecycleState::Running {
                slot.entity.shutdown(now);
                slot.state = LifecycleState::Shutdown;
            }
        }

        info!(
            "Simulation finished at t={:.2}: {} events dispatched, {} entities",
            now,
            self.stats.events_dispatched,
            self.entities.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Note(&'static str),
        Spawn(&'static str),
        Cancel,
        Halt,
        Explode,
        BadDelay,
        Unknown,
    }

    impl Message for Msg {
        fn tag(&self) -> &'static str {
            match self {
                Msg::Note(_) => "Note",
                Msg::Spawn(_) => "Spawn",
                Msg::Cancel => "Cancel",
                Msg::Halt => "Halt",
                Msg::Explode => "Explode",
                Msg::BadDelay => "BadDelay",
                Msg::Unknown => "Unknown",
            }
        }
    }

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every lifecycle call into a shared log
    struct Recorder {
        name: String,
        log: Log,
        /// Note scheduled to self at start with zero delay
        greeting: Option<&'static str>,
        pending: Option<EventHandle>,
    }

    impl Recorder {
        fn new(name: &str, log: &Log) -> Self {
            Recorder {
                name: name.to_string(),
                log: log.clone(),
                greeting: None,
                pending: None,
            }
        }

        fn greeting(mut self, note: &'static str) -> Self {
            self.greeting = Some(note);
            self
        }
    }

    impl Entity<Msg> for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn start(&mut self, ctx: &mut Context<'_, Msg>) -> Result<()> {
            self.log.borrow_mut().push(format!("start {}", self.name));
            if let Some(note) = self.greeting {
                ctx.schedule_self(0.0, Msg::Note(note))?;
            }
            Ok(())
        }

        fn react(&mut self, event: &Event<Msg>, ctx: &mut Context<'_, Msg>) -> Result<()> {
            match &event.message {
                Msg::Note(note) => {
                    self.log
                        .borrow_mut()
                        .push(format!("{} {} @{}", self.name, note, event.time));
                    if *note == "arm" {
                        self.pending = Some(ctx.schedule_self(5.0, Msg::Note("armed"))?);
                    }
                }
                Msg::Spawn(name) => {
                    let child = Recorder::new(name, &self.log).greeting("hello");
                    let id = ctx.spawn(Box::new(child));
                    self.log.borrow_mut().push(format!("spawned {}", id));
                }
                Msg::Cancel => {
                    if let Some(handle) = self.pending.take() {
                        assert!(ctx.cancel(handle));
                        assert!(!ctx.cancel(handle));
                    }
                }
                Msg::Halt => ctx.stop(),
                Msg::Explode => return Err(SimError::reaction(ctx.self_id(), "exploded")),
                Msg::BadDelay => {
                    ctx.schedule_self(-1.0, Msg::Note("never"))?;
                }
                Msg::Unknown => {
                    return Err(SimError::UnhandledEvent {
                        entity: ctx.self_id(),
                        tag: event.message.tag(),
                    });
                }
            }
            Ok(())
        }

        fn shutdown(&mut self, now: SimTime) {
            self.log.borrow_mut().push(format!("shutdown {} @{}", self.name, now));
        }
    }

    fn setup(names: &[&str]) -> (Simulation<Msg>, Log, Vec<EntityId>) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(SimulationConfig::default());
        let ids = names
            .iter()
            .map(|name| sim.register(Box::new(Recorder::new(name, &log))).unwrap())
            .collect();
        (sim, log, ids)
    }

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_register_assigns_monotonic_ids_and_starts() {
        let (sim, log, ids) = setup(&["a", "b", "c"]);

        assert_eq!(ids, vec![EntityId(0), EntityId(1), EntityId(2)]);
        assert_eq!(entries(&log), vec!["start a", "start b", "start c"]);
        assert_eq!(sim.state(EntityId(1)), Some(LifecycleState::Running));
        assert_eq!(sim.name(EntityId(2)), Some("c"));
        assert_eq!(sim.entity_count(), 3);
        assert!(sim.entity::<Recorder>(EntityId(0)).is_some());
        assert!(sim.entity::<String>(EntityId(0)).is_none());
        assert!(sim.entity::<Recorder>(EntityId(9)).is_none());
    }

    #[test]
    fn test_dispatch_in_clock_order_with_fifo_ties() {
        let (mut sim, log, ids) = setup(&["a", "b"]);
        sim.schedule(10.0, ids[0], ids[1], Msg::Note("late")).unwrap();
        sim.schedule(5.0, ids[0], ids[0], Msg::Note("first")).unwrap();
        sim.schedule(5.0, ids[1], ids[1], Msg::Note("second")).unwrap();

        let outcome = sim.run().unwrap();

        assert_eq!(outcome, RunOutcome::Drained);
        assert_eq!(
            entries(&log)[2..],
            [
                "a first @5",
                "b second @5",
                "b late @10",
                "shutdown a @10",
                "shutdown b @10",
            ]
        );
        assert_eq!(sim.stats().events_dispatched, 3);
        assert_eq!(sim.stats().final_time, 10.0);
        assert!(sim.is_terminated());
    }

    #[test]
    fn test_unknown_target_is_dropped_and_tallied() {
        let (mut sim, log, ids) = setup(&["a"]);
        sim.schedule(1.0, ids[0], EntityId(42), Msg::Note("lost")).unwrap();
        sim.schedule(2.0, ids[0], ids[0], Msg::Note("kept")).unwrap();

        sim.run().unwrap();

        let stats = sim.stats();
        assert_eq!(stats.recoverable_count(ErrorKind::UnknownTarget), 1);
        assert_eq!(stats.events_dispatched, 1);
        assert!(entries(&log).contains(&"a kept @2".to_string()));
    }

    #[test]
    fn test_spawn_applied_before_next_pop() {
        let (mut sim, log, ids) = setup(&["parent"]);
        sim.schedule(3.0, ids[0], ids[0], Msg::Spawn("child")).unwrap();
        // Queued before the child's greeting, so it pops first
        sim.schedule(3.0, ids[0], ids[0], Msg::Note("sibling")).unwrap();

        sim.run().unwrap();

        assert_eq!(
            entries(&log),
            vec![
                "start parent",
                "spawned #1",
                "start child",
                "parent sibling @3",
                "child hello @3",
                "shutdown parent @3",
                "shutdown child @3",
            ]
        );
        let stats = sim.stats();
        assert_eq!(stats.entities_registered, 2);
        assert_eq!(stats.entities_spawned, 1);
        assert_eq!(sim.state(EntityId(1)), Some(LifecycleState::Shutdown));
    }

    #[test]
    fn test_cancelled_event_never_dispatched() {
        let (mut sim, log, ids) = setup(&["a"]);
        sim.schedule(1.0, ids[0], ids[0], Msg::Note("arm")).unwrap();
        sim.schedule(2.0, ids[0], ids[0], Msg::Cancel).unwrap();

        sim.run().unwrap();

        assert!(!entries(&log).iter().any(|line| line.contains("armed")));
        assert_eq!(sim.stats().events_cancelled, 1);
        assert_eq!(sim.stats().final_time, 2.0);
    }

    #[test]
    fn test_fatal_reaction_halts_with_registry_intact() {
        let (mut sim, log, ids) = setup(&["a", "b"]);
        sim.schedule(1.0, ids[0], ids[1], Msg::Explode).unwrap();
        sim.schedule(2.0, ids[0], ids[0], Msg::Note("unreached")).unwrap();

        let err = sim.run().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Reaction);
        assert!(sim.is_terminated());
        assert_eq!(sim.pending_events(), 1);
        assert!(sim.entity::<Recorder>(ids[1]).is_some());
        assert_eq!(sim.state(ids[0]), Some(LifecycleState::Shutdown));
        assert!(!entries(&log).iter().any(|line| line.contains("unreached")));
        assert_eq!(
            entries(&log)[2..],
            ["shutdown a @1", "shutdown b @1"]
        );
    }

    #[test]
    fn test_invalid_schedule_in_reaction_is_fatal() {
        let (mut sim, _log, ids) = setup(&["a"]);
        sim.schedule(1.0, ids[0], ids[0], Msg::BadDelay).unwrap();

        let err = sim.run().unwrap_err();
        assert!(matches!(err, SimError::InvalidSchedule(_)));
    }

    #[test]
    fn test_unhandled_event_is_tallied_and_run_continues() {
        let (mut sim, log, ids) = setup(&["a"]);
        sim.schedule(1.0, ids[0], ids[0], Msg::Unknown).unwrap();
        sim.schedule(2.0, ids[0], ids[0], Msg::Note("after")).unwrap();

        assert_eq!(sim.run().unwrap(), RunOutcome::Drained);
        assert_eq!(sim.stats().recoverable_count(ErrorKind::UnhandledEvent), 1);
        assert!(entries(&log).contains(&"a after @2".to_string()));
    }

    #[test]
    fn test_stop_from_reaction() {
        let (mut sim, log, ids) = setup(&["a"]);
        sim.schedule(1.0, ids[0], ids[0], Msg::Halt).unwrap();
        sim.schedule(2.0, ids[0], ids[0], Msg::Note("unreached")).unwrap();

        assert_eq!(sim.run().unwrap(), RunOutcome::Stopped);
        assert_eq!(sim.pending_events(), 1);
        assert_eq!(entries(&log).last().unwrap(), "shutdown a @1");

        // A second stop does not shut down again
        sim.stop();
        assert_eq!(
            entries(&log).iter().filter(|line| line.starts_with("shutdown")).count(),
            1
        );
    }

    #[test]
    fn test_register_after_termination_is_rejected() {
        let (mut sim, log, _ids) = setup(&["a"]);
        sim.run().unwrap();

        let err = sim.register(Box::new(Recorder::new("late", &log))).unwrap_err();
        assert_eq!(err, SimError::Terminated(0.0));
        sim.stop();

        assert_eq!(sim.entity_count(), 1);
        assert!(!entries(&log).iter().any(|line| line.contains("late")));
    }

    #[test]
    fn test_run_until_pauses_and_resumes() {
        let (mut sim, log, ids) = setup(&["a"]);
        for (delay, note) in [(5.0, "one"), (10.0, "two"), (15.0, "three")] {
            sim.schedule(delay, ids[0], ids[0], Msg::Note(note)).unwrap();
        }

        assert_eq!(sim.run_until(10.0).unwrap(), RunOutcome::Horizon);
        assert_eq!(sim.now(), 10.0);
        assert_eq!(sim.pending_events(), 1);
        assert!(!sim.is_terminated());
        assert_eq!(sim.state(ids[0]), Some(LifecycleState::Running));

        assert_eq!(sim.run().unwrap(), RunOutcome::Drained);
        assert_eq!(entries(&log).last().unwrap(), "shutdown a @15");
        assert_eq!(sim.stats().events_dispatched, 3);
    }

    #[test]
    fn test_step_and_event_limit() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(SimulationConfig {
            until: None,
            max_events: Some(2),
        });
        let id = sim.register(Box::new(Recorder::new("a", &log))).unwrap();
        for delay in [1.0, 2.0, 3.0] {
            sim.schedule(delay, id, id, Msg::Note("tick")).unwrap();
        }

        assert!(sim.step().unwrap());
        assert_eq!(sim.now(), 1.0);
        assert_eq!(sim.run().unwrap(), RunOutcome::EventLimit);
        assert_eq!(sim.stats().events_dispatched, 2);
        assert!(sim.is_terminated());
        assert!(!sim.step().unwrap());
    }

    #[test]
    fn test_horizon_from_config() {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulation::new(SimulationConfig {
            until: Some(4.0),
            max_events: None,
        });
        let id = sim.register(Box::new(Recorder::new("a", &log))).unwrap();
        sim.schedule(3.0, id, id, Msg::Note("in")).unwrap();
        sim.schedule(5.0, id, id, Msg::Note("out")).unwrap();

        assert_eq!(sim.run().unwrap(), RunOutcome::Horizon);
        assert!(entries(&log).contains(&"a in @3".to_string()));
        assert!(!entries(&log).contains(&"a out @5".to_string()));
    }
}
