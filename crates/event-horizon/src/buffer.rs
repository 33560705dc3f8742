//! Bounded drop-oldest buffer for events that arrive while disconnected.

use crate::record::EventRecord;
use std::collections::VecDeque;

/// Default number of events held while disconnected.
pub const DEFAULT_BUFFER_CAPACITY: usize = 2_000;

/// Fixed-capacity FIFO of pending events.
///
/// Owned by the supervisor actor, so it needs no locking of its own.
#[derive(Debug)]
pub struct EventBuffer {
    capacity: usize,
    events: VecDeque<EventRecord>,
}

impl EventBuffer {
    /// Create a buffer holding at most `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.min(256)),
        }
    }

    /// Append an event, evicting the oldest one first when full.
    ///
    /// Returns the evicted event, if any.
    pub fn enqueue(&mut self, event: EventRecord) -> Option<EventRecord> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Remove and return every buffered event in insertion order.
    pub fn drain_all(&mut self) -> Vec<EventRecord> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
