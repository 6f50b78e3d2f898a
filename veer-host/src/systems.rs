//! Host-side systems that feed a [`Session`].
//!
//! Engine triggers fire in bursts (one card use can settle several damage
//! and discard events). [`EventQueue`] collects the builder output during a
//! burst and dispatches it in emission order once the engine yields.

use tracing::{debug, trace};

use veer_core::Session;
use veer_core::events::GameEvent;

/// Pending core events, in emission order.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Vec<GameEvent>,
    dropped: u64,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a builder result. `None` (unresolvable ids) is counted and dropped.
    pub fn push(&mut self, event: Option<GameEvent>) {
        match event {
            Some(e) => {
                trace!(event = e.name(), id = e.id.0, "Queued event");
                self.pending.push(e);
            }
            None => self.dropped += 1,
        }
    }

    /// Number of events waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Builder results dropped so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Dispatch every pending event into `session`. Returns how many ran.
    pub fn flush(&mut self, session: &mut Session) -> usize {
        let n = dispatch_all(session, self.pending.drain(..));
        if n > 0 {
            debug!(events = n, dropped = self.dropped, "Flushed event queue");
        }
        n
    }
}

/// Dispatch a batch of events in order.
pub fn dispatch_all(session: &mut Session, events: impl IntoIterator<Item = GameEvent>) -> usize {
    let mut n = 0;
    for event in events {
        session.dispatch(&event);
        n += 1;
    }
    n
}
