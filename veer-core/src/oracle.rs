//! Contracts for knowledge the host engine owns.
//!
//! The core never inspects game rules. Hostility sign, hand visibility and
//! identity guesses are asked of the host through these traits.

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, CardInfo};

/// Visibility and attitude queries answered by the host engine.
pub trait HostOracle {
    /// Hostility sign from `from` toward `to`: negative is hostile, positive friendly.
    fn attitude(&self, from: &AgentId, to: &AgentId) -> f64;

    /// Whether `viewer` may see `owner`'s concealed hand (skills, effects).
    fn can_view_hand(&self, _viewer: &AgentId, _owner: &AgentId) -> bool {
        false
    }

    /// Whether `owner` is currently controlled by `viewer`.
    fn controls(&self, _viewer: &AgentId, _owner: &AgentId) -> bool {
        false
    }

    /// Whether `card` has been publicly shown.
    fn is_shown_card(&self, card: &CardInfo) -> bool {
        card.shown
    }
}

/// Oracle that knows nothing: every attitude is neutral and no hand is visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralOracle;

impl HostOracle for NeutralOracle {
    fn attitude(&self, _from: &AgentId, _to: &AgentId) -> f64 {
        0.0
    }
}

/// One identity guess produced by the external inference module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityGuess {
    /// Guessed identity label (`zhu`, `zhong`, `fan`, `nei`, ...).
    pub identity: String,
    /// Short machine-readable reason code.
    pub reason: String,
    /// Free-form detail for inspection tooling.
    #[serde(default)]
    pub detail: String,
    /// Opaque extra data.
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// The identity-inference consensus, consumed as an opaque oracle.
pub trait IdentityOracle {
    /// What `observer` believes `target`'s identity to be, if anything.
    fn guess(&self, observer: &AgentId, target: &AgentId) -> Option<IdentityGuess>;
}

/// Identity oracle that never guesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGuesses;

impl IdentityOracle for NoGuesses {
    fn guess(&self, _observer: &AgentId, _target: &AgentId) -> Option<IdentityGuess> {
        None
    }
}

impl<F> IdentityOracle for F
where
    F: Fn(&AgentId, &AgentId) -> Option<IdentityGuess>,
{
    fn guess(&self, observer: &AgentId, target: &AgentId) -> Option<IdentityGuess> {
        self(observer, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Zone;

    #[test]
    fn neutral_oracle_defaults() {
        let a = AgentId::parse("a").expect("valid id");
        let b = AgentId::parse("b").expect("valid id");
        assert_eq!(NeutralOracle.attitude(&a, &b), 0.0);
        assert!(!NeutralOracle.can_view_hand(&a, &b));
        assert!(NeutralOracle.is_shown_card(&CardInfo::new("1", "sha", Zone::Hand).shown()));
    }

    #[test]
    fn closures_are_identity_oracles() {
        let oracle = |_: &AgentId, t: &AgentId| {
            (t.as_str() == "b").then(|| IdentityGuess {
                identity: "fan".into(),
                reason: "attacked_lord".into(),
                detail: String::new(),
                meta: serde_json::Value::Null,
            })
        };
        let a = AgentId::parse("a").expect("valid id");
        let b = AgentId::parse("b").expect("valid id");
        assert_eq!(oracle.guess(&a, &b).map(|g| g.identity), Some("fan".into()));
        assert!(oracle.guess(&b, &a).is_none());
        assert!(NoGuesses.guess(&a, &b).is_none());
    }
}
