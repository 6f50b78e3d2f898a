//! Turn Event Log: a per-agent, turn-scoped record of causal events.
//!
//! A global [`TurnClock`] advances on each turn anchor. Every tracked
//! agent's [`TurnMemory`] is replaced with an empty log on rollover, and
//! qualifying events are fanned out as independent copies to the logs of
//! the agents they name as source or target.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::events::{EventKind, GameEvent, card_names};
use crate::types::{AgentId, EventId, TurnId, finite_or_zero};

/// Hard upper bound on events kept per agent per turn.
pub const MAX_TURN_EVENTS: usize = 80;

/// Recent anchor ids remembered for broadcast dedup.
const ANCHOR_WINDOW: usize = 8;

/// Kind of a recorded turn event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEventKind {
    /// Damage settled.
    Damage,
    /// HP lost.
    LoseHp,
    /// HP recovered.
    Recover,
    /// Cards discarded.
    Discard,
    /// Cards drawn.
    Draw,
}

/// How a discard event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardVia {
    /// Ordinary discard.
    Discard,
    /// Moved straight to the discard pile.
    LoseToDiscardPile,
}

/// One recorded event. `num` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Event kind.
    pub kind: TurnEventKind,
    /// Resolved causer, if any.
    pub source_id: Option<AgentId>,
    /// Affected agent.
    pub target_id: AgentId,
    /// Amount (> 0).
    pub num: f64,
    /// Discard route, for discard events.
    pub via: Option<DiscardVia>,
    /// Card involved, for damage and recover events.
    pub card_name: Option<String>,
    /// Cards involved, for discard events.
    #[serde(default)]
    pub card_names: Vec<String>,
}

impl TurnEvent {
    /// Whether `agent` is this event's source or target.
    #[must_use]
    pub fn involves(&self, agent: &AgentId) -> bool {
        self.target_id == *agent || self.source_id.as_ref() == Some(agent)
    }
}

/// One agent's log for the current turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMemory {
    /// Turn this log belongs to.
    pub turn_id: TurnId,
    /// Owner of that turn.
    pub active_agent: Option<AgentId>,
    /// Events, oldest first.
    pub events: VecDeque<TurnEvent>,
}

impl TurnMemory {
    /// An empty log for `turn_id`.
    #[must_use]
    pub fn new(turn_id: TurnId, active_agent: Option<AgentId>) -> Self {
        Self {
            turn_id,
            active_agent,
            events: VecDeque::new(),
        }
    }

    /// Append an event, dropping the oldest beyond `max` (itself capped at
    /// [`MAX_TURN_EVENTS`]). Returns how many events were evicted.
    pub fn push(&mut self, event: TurnEvent, max: usize) -> usize {
        let max = max.clamp(1, MAX_TURN_EVENTS);
        self.events.push_back(event);
        let mut evicted = 0;
        while self.events.len() > max {
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TurnEvent> {
        self.events.iter()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of `num` over events of `kind` targeting `agent`.
    #[must_use]
    pub fn total(&self, kind: TurnEventKind, agent: &AgentId) -> f64 {
        self.events
            .iter()
            .filter(|e| e.kind == kind && e.target_id == *agent)
            .map(|e| e.num)
            .sum()
    }
}

/// The global turn counter.
#[derive(Debug, Clone, Default)]
pub struct TurnClock {
    current: TurnId,
    active: Option<AgentId>,
    recent_anchors: VecDeque<EventId>,
}

impl TurnClock {
    /// A clock before the first turn.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current turn.
    #[must_use]
    pub fn current(&self) -> TurnId {
        self.current
    }

    /// Owner of the current turn.
    #[must_use]
    pub fn active(&self) -> Option<&AgentId> {
        self.active.as_ref()
    }

    /// Whether `agent` owns the current turn.
    #[must_use]
    pub fn is_active(&self, agent: &AgentId) -> bool {
        self.active.as_ref() == Some(agent)
    }

    /// Observe a turn anchor. Returns the new turn id, or `None` when this
    /// anchor instance was already counted. Only the last few anchor ids are
    /// remembered; a broadcast anchor reaches its listeners back to back.
    pub fn observe_anchor(&mut self, anchor: EventId, player: &AgentId) -> Option<TurnId> {
        if self.recent_anchors.contains(&anchor) {
            trace!(anchor = anchor.0, "Turn anchor already counted");
            return None;
        }
        if self.recent_anchors.len() == ANCHOR_WINDOW {
            self.recent_anchors.pop_front();
        }
        self.recent_anchors.push_back(anchor);
        self.current = self.current.next();
        self.active = Some(player.clone());
        debug!(turn = %self.current, agent = %player, "Turn rollover");
        Some(self.current)
    }

    /// A fresh, empty log for the current turn.
    #[must_use]
    pub fn fresh_memory(&self) -> TurnMemory {
        TurnMemory::new(self.current, self.active.clone())
    }
}

/// Resolve the causing agent: the explicit source if present, else the
/// nearest entry of `caused_by` (within `max_depth`) that is not `victim`.
#[must_use]
pub fn resolve_causer(
    explicit: Option<&AgentId>,
    caused_by: &[AgentId],
    victim: &AgentId,
    max_depth: usize,
) -> Option<AgentId> {
    if let Some(source) = explicit {
        return Some(source.clone());
    }
    caused_by
        .iter()
        .take(max_depth)
        .find(|id| *id != victim)
        .cloned()
}

/// Build the turn event for a qualifying engine event. Non-qualifying
/// events and events with a non-positive amount yield `None`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn turn_event_for(event: &GameEvent, max_depth: usize) -> Option<TurnEvent> {
    let chain = &event.caused_by;
    let (kind, source, target, num, via, card_name, names) = match &event.kind {
        EventKind::Damage {
            source,
            target,
            num,
            card,
        } => (TurnEventKind::Damage, source, target, *num, None, card.clone(), Vec::new()),
        EventKind::LoseHp { source, target, num } => {
            (TurnEventKind::LoseHp, source, target, *num, None, None, Vec::new())
        }
        EventKind::Recover {
            source,
            target,
            num,
            card,
        } => (TurnEventKind::Recover, source, target, *num, None, card.clone(), Vec::new()),
        EventKind::Draw {
            source,
            target,
            num,
            cards,
        } => {
            let explicit = finite_or_zero(*num);
            let n = if explicit > 0.0 { explicit } else { *cards as f64 };
            (TurnEventKind::Draw, source, target, n, None, None, Vec::new())
        }
        EventKind::Discard {
            source,
            target,
            cards,
        } => (
            TurnEventKind::Discard,
            source,
            target,
            cards.len() as f64,
            Some(DiscardVia::Discard),
            None,
            card_names(cards),
        ),
        EventKind::LoseToDiscardPile {
            source,
            target,
            cards,
        } => (
            TurnEventKind::Discard,
            source,
            target,
            cards.len() as f64,
            Some(DiscardVia::LoseToDiscardPile),
            None,
            card_names(cards),
        ),
        _ => return None,
    };

    let num = finite_or_zero(num);
    if num <= 0.0 {
        return None;
    }
    Some(TurnEvent {
        kind,
        source_id: resolve_causer(source.as_ref(), chain, target, max_depth),
        target_id: target.clone(),
        num,
        via,
        card_name: card_name.filter(|n| !n.trim().is_empty()),
        card_names: names,
    })
}

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Observers that received a copy.
    pub recorded: u64,
    /// Events evicted by the bound across those observers.
    pub evicted: u64,
}

/// Deliver an independent copy of `event` to every observer it involves.
pub fn fan_out<'a>(
    event: &TurnEvent,
    observers: impl IntoIterator<Item = (&'a AgentId, &'a mut TurnMemory)>,
    max_events: usize,
) -> FanOut {
    let mut out = FanOut::default();
    for (observer, memory) in observers {
        if !event.involves(observer) {
            continue;
        }
        let evicted = memory.push(event.clone(), max_events);
        out.recorded += 1;
        out.evicted += evicted as u64;
    }
    out
}
