//! The engine's parent-linked events, held in an arena.
//!
//! Engine events point at their parent ("the use of *sha* that caused this
//! damage"). Instead of walking live objects, the host records each event in
//! an [`EventArena`] as it is emitted and asks for the flattened causal chain
//! once, when converting to a core [`GameEvent`](veer_core::GameEvent).

use veer_core::types::{AgentId, EventId};

/// Default bound on how many ancestor levels are inspected.
pub const MAX_CHAIN_DEPTH: usize = 12;

/// Index of a node in an [`EventArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(usize);

/// One engine event as the host sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineEvent {
    /// Engine event-instance id.
    pub id: u64,
    /// Engine event name (`damage`, `useCard`, `phaseUse`, ...).
    pub name: String,
    /// Explicit source.
    pub source: Option<String>,
    /// Who discarded, for discard events.
    pub discarder: Option<String>,
    /// The acting player.
    pub player: Option<String>,
    /// Parent event.
    pub parent: Option<NodeRef>,
}

impl EngineEvent {
    /// An event with the given id and name and no actors.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the explicit source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the discarder.
    #[must_use]
    pub fn discarder(mut self, discarder: impl Into<String>) -> Self {
        self.discarder = Some(discarder.into());
        self
    }

    /// Set the acting player.
    #[must_use]
    pub fn player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    /// Attach a parent.
    #[must_use]
    pub fn child_of(mut self, parent: NodeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Core event id for this instance.
    #[must_use]
    pub fn event_id(&self) -> EventId {
        EventId(self.id)
    }

    /// The first of source, discarder and player that resolves to an agent
    /// other than `victim`.
    fn causer_excluding(&self, victim: Option<&AgentId>) -> Option<AgentId> {
        [&self.source, &self.discarder, &self.player]
            .into_iter()
            .flatten()
            .filter_map(|raw| AgentId::parse(raw))
            .find(|id| victim != Some(id))
    }
}

/// Append-only store of the current game's engine events.
#[derive(Debug, Clone, Default)]
pub struct EventArena {
    nodes: Vec<EngineEvent>,
}

impl EventArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. Parents must already be in the arena.
    pub fn push(&mut self, event: EngineEvent) -> NodeRef {
        self.nodes.push(event);
        NodeRef(self.nodes.len() - 1)
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, node: NodeRef) -> Option<&EngineEvent> {
        self.nodes.get(node.0)
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every recorded event (at game end).
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Walk from `node` up through its parents, at most `max_depth` levels.
    pub fn ancestry(&self, node: NodeRef, max_depth: usize) -> impl Iterator<Item = &EngineEvent> {
        let mut next = self.get(node);
        std::iter::from_fn(move || {
            let current = next?;
            next = current.parent.and_then(|p| self.get(p));
            Some(current)
        })
        .take(max_depth)
    }

    /// Candidate causers of `node`, one per ancestor level that has one,
    /// nearest first. Entries equal to `victim` are skipped.
    #[must_use]
    pub fn causal_chain(&self, node: NodeRef, victim: Option<&AgentId>, max_depth: usize) -> Vec<AgentId> {
        self.ancestry(node, max_depth)
            .filter_map(|e| e.causer_excluding(victim))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> AgentId {
        AgentId::parse(raw).expect("valid id")
    }

    #[test]
    fn chain_prefers_source_then_discarder_then_player() {
        let mut arena = EventArena::new();
        let use_card = arena.push(EngineEvent::new(1, "useCard").player("p2"));
        let discard = arena.push(EngineEvent::new(2, "discard").discarder("p3").player("p1").child_of(use_card));
        let chain = arena.causal_chain(discard, Some(&id("p1")), MAX_CHAIN_DEPTH);
        assert_eq!(chain, vec![id("p3"), id("p2")]);
    }

    #[test]
    fn victim_and_blank_ids_are_skipped() {
        let mut arena = EventArena::new();
        let root = arena.push(EngineEvent::new(1, "phaseUse").player("p2"));
        let mid = arena.push(EngineEvent::new(2, "useCard").player("  ").child_of(root));
        let leaf = arena.push(EngineEvent::new(3, "damage").source("p1").child_of(mid));
        assert_eq!(arena.causal_chain(leaf, Some(&id("p1")), MAX_CHAIN_DEPTH), vec![id("p2")]);
    }

    #[test]
    fn depth_bound_limits_the_walk() {
        let mut arena = EventArena::new();
        let mut parent = arena.push(EngineEvent::new(0, "root").player("far"));
        for i in 1..20 {
            parent = arena.push(EngineEvent::new(i, "step").child_of(parent));
        }
        assert!(arena.causal_chain(parent, None, MAX_CHAIN_DEPTH).is_empty());
        assert_eq!(arena.causal_chain(parent, None, 20), vec![id("far")]);
        assert_eq!(arena.ancestry(parent, 5).count(), 5);
    }
}
