//! "Don't rescue who I just attacked."

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, TurnId};

/// Card names treated as offensive even when the host did not tag them.
const DIRECT_DAMAGE_CARDS: [&str; 3] = ["sha", "juedou", "huogong"];

/// The target an actor just attacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentAttack {
    /// Who was attacked.
    pub target: AgentId,
    /// Card used.
    pub card_name: String,
    /// Turn the attack happened on.
    pub turn_id: TurnId,
}

/// Per-actor marker: armed during an attack's resolution chain, otherwise cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttackMarker {
    /// No attack in flight.
    #[default]
    Cleared,
    /// An attack is resolving.
    Armed(RecentAttack),
}

impl AttackMarker {
    /// Arm the marker, replacing any earlier attack.
    pub fn arm(&mut self, attack: RecentAttack) {
        *self = Self::Armed(attack);
    }

    /// Clear the marker. Returns `true` if it was armed.
    pub fn clear(&mut self) -> bool {
        matches!(std::mem::take(self), Self::Armed(_))
    }

    /// The armed attack, if any.
    #[must_use]
    pub fn armed(&self) -> Option<&RecentAttack> {
        match self {
            Self::Armed(attack) => Some(attack),
            Self::Cleared => None,
        }
    }
}

/// Whether a targeting event is a single-target, non-group offensive action.
#[must_use]
pub fn is_single_target_offense(
    card_name: &str,
    target_count: usize,
    group_target: bool,
    damage_tag: bool,
) -> bool {
    let name = card_name.trim();
    if target_count != 1 || group_target || name.is_empty() {
        return false;
    }
    damage_tag || DIRECT_DAMAGE_CARDS.contains(&name)
}

/// `true` exactly when `marker` is armed and its target is among `candidates`.
#[must_use]
pub fn should_forbid_rescue(marker: &AttackMarker, candidates: &[AgentId]) -> bool {
    marker
        .armed()
        .is_some_and(|attack| candidates.contains(&attack.target))
}
