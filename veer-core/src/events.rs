//! Engine events as seen by the core.
//!
//! The host converts its own parent-linked event objects into [`GameEvent`]
//! values before dispatch. The causal chain is flattened at conversion time
//! into [`GameEvent::caused_by`]: one candidate causer per ancestor level,
//! nearest first, so nothing downstream walks a live object graph.

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, CardInfo, EventId, Zone};

/// One engine event, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Host event-instance id. Broadcast anchors carry the same id to every listener.
    pub id: EventId,
    /// Candidate causers captured at emission time, nearest ancestor first.
    #[serde(default)]
    pub caused_by: Vec<AgentId>,
    /// What happened.
    pub kind: EventKind,
}

impl GameEvent {
    /// Create an event with an empty causal chain.
    #[must_use]
    pub fn new(id: EventId, kind: EventKind) -> Self {
        Self {
            id,
            caused_by: Vec::new(),
            kind,
        }
    }

    /// Attach a precomputed causal chain.
    #[must_use]
    pub fn with_chain(mut self, caused_by: Vec<AgentId>) -> Self {
        self.caused_by = caused_by;
        self
    }

    /// Short, stable name of the event kind (used in logs).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// How cards left a player's area when taken by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeMode {
    /// Dismantled into the discard pile.
    Dismantle,
    /// Stolen into the actor's hand.
    Steal,
}

/// Payload of a [`GameEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A player's turn begins (the turn-counter anchor).
    PhaseBegin {
        /// Owner of the new turn.
        player: AgentId,
    },
    /// Damage settled.
    Damage {
        /// Explicit damage source, if the engine named one.
        source: Option<AgentId>,
        /// Damaged player.
        target: AgentId,
        /// Amount.
        num: f64,
        /// Card that caused it.
        card: Option<String>,
    },
    /// HP lost (not damage).
    LoseHp {
        /// Explicit source.
        source: Option<AgentId>,
        /// Player who lost HP.
        target: AgentId,
        /// Amount.
        num: f64,
    },
    /// HP recovered.
    Recover {
        /// Explicit healer.
        source: Option<AgentId>,
        /// Healed player.
        target: AgentId,
        /// Amount.
        num: f64,
        /// Card that caused it.
        card: Option<String>,
    },
    /// Cards drawn.
    Draw {
        /// Explicit source of the draw effect.
        source: Option<AgentId>,
        /// Drawing player.
        target: AgentId,
        /// Explicit number drawn; 0 when the engine did not say.
        num: f64,
        /// Number of cards actually moved.
        cards: usize,
    },
    /// Cards discarded.
    Discard {
        /// Who made the player discard (discarder or source).
        source: Option<AgentId>,
        /// Player who lost the cards.
        target: AgentId,
        /// Discarded cards.
        cards: Vec<CardInfo>,
    },
    /// Cards moved straight to the discard pile, possibly by another's effect.
    LoseToDiscardPile {
        /// Explicit source.
        source: Option<AgentId>,
        /// Player who lost the cards.
        target: AgentId,
        /// Moved cards.
        cards: Vec<CardInfo>,
    },
    /// Cards dismantled or stolen from `target` by `actor`.
    CardsTaken {
        /// Who took them.
        actor: AgentId,
        /// Who lost them.
        target: AgentId,
        /// Taken cards, with the zone they came from.
        cards: Vec<CardInfo>,
        /// Dismantle or steal.
        mode: TakeMode,
    },
    /// A used card has locked onto a target.
    CardTargeted {
        /// User of the card.
        actor: AgentId,
        /// This target.
        target: AgentId,
        /// Card name.
        card_name: String,
        /// Total targets of this use.
        target_count: usize,
        /// Card targets everyone or a group.
        group_target: bool,
        /// Host tags the card as dealing damage.
        damage_tag: bool,
    },
    /// A card use finished resolving.
    CardUseFinished {
        /// User of the card.
        actor: AgentId,
    },
    /// A card was used.
    CardUsed {
        /// User of the card.
        actor: AgentId,
        /// Card name.
        card_name: String,
        /// Used during the actor's action phase.
        in_action_phase: bool,
        /// Names of cards used this action phase, oldest first, including this one.
        phase_history: Vec<String>,
    },
    /// A player died.
    AgentDied {
        /// The dead player.
        agent: AgentId,
    },
}

impl EventKind {
    /// Short, stable name of the kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PhaseBegin { .. } => "phase_begin",
            Self::Damage { .. } => "damage",
            Self::LoseHp { .. } => "lose_hp",
            Self::Recover { .. } => "recover",
            Self::Draw { .. } => "draw",
            Self::Discard { .. } => "discard",
            Self::LoseToDiscardPile { .. } => "lose_to_discard_pile",
            Self::CardsTaken { .. } => "cards_taken",
            Self::CardTargeted { .. } => "card_targeted",
            Self::CardUseFinished { .. } => "card_use_finished",
            Self::CardUsed { .. } => "card_used",
            Self::AgentDied { .. } => "agent_died",
        }
    }
}

/// Names of cards, with blank names dropped.
#[must_use]
pub fn card_names(cards: &[CardInfo]) -> Vec<String> {
    cards
        .iter()
        .filter(|c| !c.name.trim().is_empty())
        .map(|c| c.name.clone())
        .collect()
}

/// Whether any card came from the equipment or judgement zone.
#[must_use]
pub fn touches_open_zones(cards: &[CardInfo]) -> bool {
    cards
        .iter()
        .any(|c| matches!(c.zone, Zone::Equipment | Zone::Judgement))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> AgentId {
        AgentId::parse(raw).expect("valid id")
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = GameEvent::new(
            EventId(3),
            EventKind::Damage {
                source: Some(id("b")),
                target: id("a"),
                num: 2.0,
                card: Some("sha".into()),
            },
        )
        .with_chain(vec![id("b")]);
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["kind"]["type"], "damage");
        let back: GameEvent = serde_json::from_value(json).expect("round trip");
        assert_eq!(back, event);
        assert_eq!(back.name(), "damage");
    }

    #[test]
    fn card_helpers() {
        let cards = vec![
            CardInfo::new("1", "sha", Zone::Hand),
            CardInfo::new("2", "", Zone::Hand),
            CardInfo::new("3", "bagua", Zone::Equipment),
        ];
        assert_eq!(card_names(&cards), vec!["sha".to_string(), "bagua".to_string()]);
        assert!(touches_open_zones(&cards));
        assert!(!touches_open_zones(&cards[..2]));
    }
}
