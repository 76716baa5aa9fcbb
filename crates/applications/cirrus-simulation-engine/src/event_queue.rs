//! Event queue with deterministic ordering.
//!
//! Holds the simulation clock and every pending event. Events are ordered by:
//! 1. Scheduled time (earlier first)
//! 2. Insertion sequence (FIFO for equal times)
//!
//! Cancellation is logical: the event stays in the heap but is skipped when it
//! reaches the head, so `cancel` never has to search the heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use cirrus_core::{EntityId, Result, SimError, SimTime};

/// Handle returned by `schedule`, used to cancel or query a pending event.
///
/// Wraps the insertion sequence number, so handles also order events that
/// share a scheduled time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventHandle(u64);

impl EventHandle {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// A scheduled unit of work for one entity
#[derive(Debug, Clone)]
pub struct Event<M> {
    pub time: SimTime,
    pub source: EntityId,
    pub target: EntityId,
    pub handle: EventHandle,
    pub message: M,
}

/// Heap entry for priority queue ordering
#[derive(Debug)]
struct TimedEvent<M> {
    event: Event<M>,
}

// Priority queue orders by (time, sequence), earliest first
impl<M> Ord for TimedEvent<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for min-heap (BinaryHeap is max-heap by default)
        other
            .event
            .time
            .total_cmp(&self.event.time)
            .then_with(|| other.event.handle.cmp(&self.event.handle))
    }
}

impl<M> PartialOrd for TimedEvent<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Eq for TimedEvent<M> {}

impl<M> PartialEq for TimedEvent<M> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

/// Clock plus time-ordered queue of pending events
#[derive(Debug)]
pub struct EventQueue<M> {
    now: SimTime,
    heap: BinaryHeap<TimedEvent<M>>,
    /// Handles still waiting to be popped. Anything in the heap but not
    /// in here has been cancelled.
    pending: HashSet<EventHandle>,
    next_sequence: u64,
    cancelled: u64,
}

impl<M> EventQueue<M> {
    pub fn new() -> Self {
        EventQueue {
            now: 0.0,
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            next_sequence: 0,
            cancelled: 0,
        }
    }

    /// Current simulation time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Enqueue `message` for `target` at `now + delay`.
    ///
    /// Fails with `InvalidSchedule` for negative, NaN or infinite delays.
    pub fn schedule(
        &mut self,
        delay: f64,
        source: EntityId,
        target: EntityId,
        message: M,
    ) -> Result<EventHandle> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(SimError::invalid_schedule(format!(
                "delay {} from {} to {} at t={:.2}",
                delay, source, target, self.now
            )));
        }

        let handle = EventHandle(self.next_sequence);
        self.next_sequence += 1;
        self.pending.insert(handle);
        self.heap.push(TimedEvent {
            event: Event {
                time: self.now + delay,
                source,
                target,
                handle,
                message,
            },
        });

        Ok(handle)
    }

    /// Remove the earliest live event and advance the clock to its time
    pub fn pop_next(&mut self) -> Option<Event<M>> {
        while let Some(timed) = self.heap.pop() {
            if self.pending.remove(&timed.event.handle) {
                self.now = timed.event.time;
                self.discard_cancelled_head();
                return Some(timed.event);
            }
        }
        None
    }

    /// Time of the next live event, `None` when nothing is pending
    pub fn peek_time(&self) -> Option<SimTime> {
        // The head is always live: cancel and pop both discard inert heads.
        self.heap.peek().map(|timed| timed.event.time)
    }

    /// Mark a pending event inert.
    ///
    /// Returns false if the event was already popped or cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        if !self.pending.remove(&handle) {
            return false;
        }
        self.cancelled += 1;
        self.discard_cancelled_head();
        true
    }

    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle)
    }

    /// Number of live (not cancelled, not popped) events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total number of successful cancellations
    pub fn cancelled_count(&self) -> u64 {
        self.cancelled
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if self.pending.contains(&head.event.handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<M> Default for EventQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SRC: EntityId = EntityId(0);
    const DST: EntityId = EntityId(1);

    #[test]
    fn test_pop_advances_clock() {
        let mut queue = EventQueue::new();
        queue.schedule(40.0, SRC, DST, "late").unwrap();
        queue.schedule(5.0, SRC, DST, "early").unwrap();
        queue.schedule(20.0, SRC, DST, "middle").unwrap();

        assert_eq!(queue.peek_time(), Some(5.0));

        let first = queue.pop_next().unwrap();
        assert_eq!(first.message, "early");
        assert_eq!(queue.now(), 5.0);

        // Delays are relative to the advanced clock
        queue.schedule(1.0, SRC, DST, "relative").unwrap();
        assert_eq!(queue.pop_next().unwrap().time, 6.0);
        assert_eq!(queue.pop_next().unwrap().message, "middle");
        assert_eq!(queue.pop_next().unwrap().message, "late");
        assert_eq!(queue.now(), 40.0);
        assert!(queue.pop_next().is_none());
        assert_eq!(queue.peek_time(), None);
    }

    #[test]
    fn test_fifo_on_equal_times() {
        let mut queue = EventQueue::new();
        for i in 0..10 {
            queue.schedule(3.0, SRC, DST, i).unwrap();
        }

        let order: Vec<i32> = std::iter::from_fn(|| queue.pop_next().map(|e| e.message)).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_delays_rejected() {
        let mut queue = EventQueue::new();

        for delay in [-0.5, f64::NAN, f64::INFINITY] {
            let err = queue.schedule(delay, SRC, DST, ()).unwrap_err();
            assert!(matches!(err, SimError::InvalidSchedule(_)));
        }
        assert!(queue.is_empty());

        // Zero delay is "now", which is allowed
        assert!(queue.schedule(0.0, SRC, DST, ()).is_ok());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut queue = EventQueue::new();
        let keep = queue.schedule(2.0, SRC, DST, "keep").unwrap();
        let drop = queue.schedule(1.0, SRC, DST, "drop").unwrap();

        assert!(queue.cancel(drop));
        assert!(!queue.cancel(drop));
        assert!(!queue.is_pending(drop));
        assert!(queue.is_pending(keep));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.cancelled_count(), 1);

        // Cancelled head no longer shows up in peek
        assert_eq!(queue.peek_time(), Some(2.0));

        let popped = queue.pop_next().unwrap();
        assert_eq!(popped.message, "keep");
        assert!(queue.pop_next().is_none());

        // Popped events cannot be cancelled
        assert!(!queue.cancel(keep));
    }

    #[test]
    fn test_cancel_buried_event() {
        let mut queue = EventQueue::new();
        let _a = queue.schedule(1.0, SRC, DST, 'a').unwrap();
        let b = queue.schedule(2.0, SRC, DST, 'b').unwrap();
        let _c = queue.schedule(3.0, SRC, DST, 'c').unwrap();

        assert!(queue.cancel(b));
        let order: String = std::iter::from_fn(|| queue.pop_next().map(|e| e.message)).collect();
        assert_eq!(order, "ac");
    }

    #[test]
    fn test_random_sequences_pop_in_order() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _round in 0..50 {
            let mut queue = EventQueue::new();
            let mut popped: Vec<(SimTime, u64)> = Vec::new();

            for _ in 0..200 {
                // Few distinct delays so ties are common
                let delay = rng.gen_range(0..8) as f64 * 0.5;
                queue.schedule(delay, SRC, DST, ()).unwrap();

                if rng.gen_bool(0.3) {
                    if let Some(event) = queue.pop_next() {
                        popped.push((event.time, event.handle.sequence()));
                    }
                }
            }
            while let Some(event) = queue.pop_next() {
                popped.push((event.time, event.handle.sequence()));
            }

            for pair in popped.windows(2) {
                let (t0, s0) = pair[0];
                let (t1, s1) = pair[1];
                assert!(t0 <= t1, "time went backwards: {} then {}", t0, t1);
                if t0 == t1 {
                    assert!(s0 < s1, "FIFO violated at t={}", t0);
                }
            }
        }
    }
}
