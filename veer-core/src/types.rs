//! Core type definitions shared across the Veer pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Stable identifier of an agent, derived once by the host and never reused
/// within a session.
///
/// Memory maps are always keyed by this id, never by object identity.
///
/// Deserializing goes through [`AgentId::parse`], so a blank id in a stored
/// snapshot or config is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Parse a stable id. Blank ids are unresolvable and yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A blank string offered as an [`AgentId`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("agent id is blank")]
pub struct BlankAgentId;

impl TryFrom<String> for AgentId {
    type Error = BlankAgentId;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or(BlankAgentId)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of one game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host-assigned identifier of a single engine event instance.
///
/// Broadcast-style anchors carry the same id to every listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// Monotonically increasing global turn counter value. `TurnId(0)` means
/// "before the first turn".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TurnId(pub u64);

impl TurnId {
    /// The following turn.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Factions
// ---------------------------------------------------------------------------

/// Coarse faction an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// The lord and the lord's loyalists.
    Lord,
    /// Rebels.
    Rebel,
    /// Renegades, unknown or anything else.
    Other,
}

impl Faction {
    /// Map an identity label to its faction.
    #[must_use]
    pub fn from_identity(identity: &str) -> Self {
        match identity {
            "zhu" | "zhong" | "mingzhong" => Self::Lord,
            "fan" => Self::Rebel,
            _ => Self::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Zone a card currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// Concealed hand.
    Hand,
    /// Equipment area.
    Equipment,
    /// Pending judgement area.
    Judgement,
    /// Anywhere else (pile, processing, special areas).
    Other,
}

/// Minimal, host-agnostic view of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInfo {
    /// Host card id.
    pub id: String,
    /// Card name; may be empty when the host did not expose it.
    pub name: String,
    /// Zone the card was in when observed.
    pub zone: Zone,
    /// Whether the card has been publicly shown.
    pub shown: bool,
}

impl CardInfo {
    /// Create a card in the given zone.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, zone: Zone) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            zone,
            shown: false,
        }
    }

    /// Mark the card as publicly shown.
    #[must_use]
    pub fn shown(mut self) -> Self {
        self.shown = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Numeric helpers
// ---------------------------------------------------------------------------

/// Coerce a non-finite number to `0.0`.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Clamp to `[lo, hi]` after coercing non-finite input to `0.0`.
#[must_use]
pub fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    finite_or_zero(value).clamp(lo, hi)
}
