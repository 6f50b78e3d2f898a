//! Integration hooks for the host engine's event triggers.
//!
//! One builder per engine trigger. Each takes the raw engine strings, plus the
//! [`EventArena`] node when the event can carry a causal chain, and produces a
//! core [`GameEvent`]. Builders return `None` when a required id does not
//! resolve to an agent.

use veer_core::events::{EventKind, GameEvent, TakeMode};
use veer_core::types::{AgentId, CardInfo, EventId};

use crate::events::{EventArena, MAX_CHAIN_DEPTH, NodeRef};

/// Amount used when the engine leaves `num` unset.
const DEFAULT_AMOUNT: f64 = 1.0;

fn amount(num: Option<f64>) -> f64 {
    num.filter(|n| n.is_finite()).unwrap_or(DEFAULT_AMOUNT)
}

fn agent(raw: Option<&str>) -> Option<AgentId> {
    raw.and_then(AgentId::parse)
}

/// Id, explicit source and flattened chain of an arena node.
struct Origin {
    id: EventId,
    source: Option<AgentId>,
    chain: Vec<AgentId>,
}

fn origin(arena: &EventArena, node: NodeRef, victim: &AgentId) -> Option<Origin> {
    let event = arena.get(node)?;
    Some(Origin {
        id: event.event_id(),
        source: agent(event.source.as_deref()),
        chain: arena.causal_chain(node, Some(victim), MAX_CHAIN_DEPTH),
    })
}

/// Turn start (`phaseBegin`). The node's player owns the turn.
#[must_use]
pub fn on_phase_begin(arena: &EventArena, node: NodeRef) -> Option<GameEvent> {
    let event = arena.get(node)?;
    let player = agent(event.player.as_deref())?;
    Some(GameEvent::new(event.event_id(), EventKind::PhaseBegin { player }))
}

/// Damage settled on `target`.
#[must_use]
pub fn on_damage(
    arena: &EventArena,
    node: NodeRef,
    target: &str,
    num: Option<f64>,
    card: Option<&str>,
) -> Option<GameEvent> {
    let target = AgentId::parse(target)?;
    let o = origin(arena, node, &target)?;
    let kind = EventKind::Damage {
        source: o.source,
        target,
        num: amount(num),
        card: card.map(str::to_string),
    };
    Some(GameEvent::new(o.id, kind).with_chain(o.chain))
}

/// HP lost by `target`.
#[must_use]
pub fn on_lose_hp(arena: &EventArena, node: NodeRef, target: &str, num: Option<f64>) -> Option<GameEvent> {
    let target = AgentId::parse(target)?;
    let o = origin(arena, node, &target)?;
    let kind = EventKind::LoseHp {
        source: o.source,
        target,
        num: amount(num),
    };
    Some(GameEvent::new(o.id, kind).with_chain(o.chain))
}

/// HP recovered by `target`.
#[must_use]
pub fn on_recover(
    arena: &EventArena,
    node: NodeRef,
    target: &str,
    num: Option<f64>,
    card: Option<&str>,
) -> Option<GameEvent> {
    let target = AgentId::parse(target)?;
    let o = origin(arena, node, &target)?;
    let kind = EventKind::Recover {
        source: o.source,
        target,
        num: amount(num),
        card: card.map(str::to_string),
    };
    Some(GameEvent::new(o.id, kind).with_chain(o.chain))
}

/// Cards drawn by `target`. `num` stays 0 when the engine did not say, so the
/// core falls back to `cards`.
#[must_use]
pub fn on_draw(
    arena: &EventArena,
    node: NodeRef,
    target: &str,
    num: Option<f64>,
    cards: usize,
) -> Option<GameEvent> {
    let target = AgentId::parse(target)?;
    let o = origin(arena, node, &target)?;
    let kind = EventKind::Draw {
        source: o.source,
        target,
        num: num.filter(|n| n.is_finite()).unwrap_or(0.0),
        cards,
    };
    Some(GameEvent::new(o.id, kind).with_chain(o.chain))
}

/// Cards discarded by `target`. The discarder wins over the explicit source.
#[must_use]
pub fn on_discard(arena: &EventArena, node: NodeRef, target: &str, cards: Vec<CardInfo>) -> Option<GameEvent> {
    let target = AgentId::parse(target)?;
    let discarder = arena.get(node).and_then(|e| agent(e.discarder.as_deref()));
    let o = origin(arena, node, &target)?;
    let kind = EventKind::Discard {
        source: discarder.or(o.source),
        target,
        cards,
    };
    Some(GameEvent::new(o.id, kind).with_chain(o.chain))
}

/// Cards moved from `target` straight to the discard pile.
#[must_use]
pub fn on_lose_to_discard_pile(
    arena: &EventArena,
    node: NodeRef,
    target: &str,
    cards: Vec<CardInfo>,
) -> Option<GameEvent> {
    let target = AgentId::parse(target)?;
    let o = origin(arena, node, &target)?;
    let kind = EventKind::LoseToDiscardPile {
        source: o.source,
        target,
        cards,
    };
    Some(GameEvent::new(o.id, kind).with_chain(o.chain))
}

/// Cards dismantled or stolen from `target` by `actor`.
#[must_use]
pub fn on_cards_taken(
    id: u64,
    actor: &str,
    target: &str,
    cards: Vec<CardInfo>,
    mode: TakeMode,
) -> Option<GameEvent> {
    let kind = EventKind::CardsTaken {
        actor: AgentId::parse(actor)?,
        target: AgentId::parse(target)?,
        cards,
        mode,
    };
    Some(GameEvent::new(EventId(id), kind))
}

/// A used card locked onto one of its targets (`useCardToTargeted`).
#[must_use]
pub fn on_card_targeted(
    id: u64,
    actor: &str,
    target: &str,
    card_name: &str,
    target_count: usize,
    group_target: bool,
    damage_tag: bool,
) -> Option<GameEvent> {
    let kind = EventKind::CardTargeted {
        actor: AgentId::parse(actor)?,
        target: AgentId::parse(target)?,
        card_name: card_name.to_string(),
        target_count,
        group_target,
        damage_tag,
    };
    Some(GameEvent::new(EventId(id), kind))
}

/// A card use finished resolving (`useCardAfter`).
#[must_use]
pub fn on_card_use_finished(id: u64, actor: &str) -> Option<GameEvent> {
    let actor = AgentId::parse(actor)?;
    Some(GameEvent::new(EventId(id), EventKind::CardUseFinished { actor }))
}

/// A card was used. `phase_history` lists this action phase's card names,
/// oldest first, and must already include this use.
#[must_use]
pub fn on_card_used(
    id: u64,
    actor: &str,
    card_name: &str,
    in_action_phase: bool,
    phase_history: Vec<String>,
) -> Option<GameEvent> {
    let kind = EventKind::CardUsed {
        actor: AgentId::parse(actor)?,
        card_name: card_name.to_string(),
        in_action_phase,
        phase_history,
    };
    Some(GameEvent::new(EventId(id), kind))
}

/// A player died.
#[must_use]
pub fn on_agent_died(id: u64, agent: &str) -> Option<GameEvent> {
    let agent = AgentId::parse(agent)?;
    Some(GameEvent::new(EventId(id), EventKind::AgentDied { agent }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEvent;
    use veer_core::types::Zone;

    fn id(raw: &str) -> AgentId {
        AgentId::parse(raw).expect("valid id")
    }

    #[test]
    fn damage_defaults_amount_and_carries_chain() {
        let mut arena = EventArena::new();
        let used = arena.push(EngineEvent::new(10, "useCard").player("p2"));
        let dmg = arena.push(EngineEvent::new(11, "damage").player("p1").child_of(used));

        let event = on_damage(&arena, dmg, "p1", None, Some("sha")).expect("resolvable");
        assert_eq!(event.id, EventId(11));
        assert_eq!(event.caused_by, vec![id("p2")]);
        match event.kind {
            EventKind::Damage { source, num, card, .. } => {
                assert!(source.is_none());
                assert!((num - 1.0).abs() < f64::EPSILON);
                assert_eq!(card.as_deref(), Some("sha"));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn non_finite_amount_falls_back() {
        let mut arena = EventArena::new();
        let node = arena.push(EngineEvent::new(1, "recover").source("p2"));
        let event = on_recover(&arena, node, "p1", Some(f64::NAN), None).expect("resolvable");
        let EventKind::Recover { num, source, .. } = event.kind else {
            panic!("expected recover");
        };
        assert!((num - 1.0).abs() < f64::EPSILON);
        assert_eq!(source, Some(id("p2")));
    }

    #[test]
    fn draw_leaves_unset_num_at_zero() {
        let mut arena = EventArena::new();
        let node = arena.push(EngineEvent::new(3, "draw").player("p1"));
        let event = on_draw(&arena, node, "p1", None, 2).expect("resolvable");
        let EventKind::Draw { num, cards, .. } = event.kind else {
            panic!("expected draw");
        };
        assert!(num.abs() < f64::EPSILON);
        assert_eq!(cards, 2);
    }

    #[test]
    fn discarder_is_preferred_over_source() {
        let mut arena = EventArena::new();
        let node = arena.push(EngineEvent::new(4, "discard").source("p3").discarder("p2"));
        let cards = vec![CardInfo::new("c1", "shan", Zone::Hand)];
        let event = on_discard(&arena, node, "p1", cards).expect("resolvable");
        let EventKind::Discard { source, .. } = event.kind else {
            panic!("expected discard");
        };
        assert_eq!(source, Some(id("p2")));
    }

    #[test]
    fn unresolvable_ids_build_nothing() {
        let mut arena = EventArena::new();
        let node = arena.push(EngineEvent::new(5, "damage"));
        assert!(on_damage(&arena, node, " ", Some(1.0), None).is_none());
        assert!(on_phase_begin(&arena, node).is_none());
        assert!(on_card_use_finished(6, "").is_none());
        assert!(on_cards_taken(7, "p1", "", Vec::new(), TakeMode::Steal).is_none());
        assert!(on_damage(&EventArena::new(), node, "p1", None, None).is_none());
    }

    #[test]
    fn phase_begin_uses_node_player() {
        let mut arena = EventArena::new();
        let node = arena.push(EngineEvent::new(9, "phaseBegin").player("p4"));
        let event = on_phase_begin(&arena, node).expect("resolvable");
        assert_eq!(event.kind, EventKind::PhaseBegin { player: id("p4") });
        assert_eq!(event.name(), "phase_begin");
    }
}
