//! Per-own-turn decay policies.
//!
//! The pass runs once at the start of each of an agent's own turns. A policy
//! maps the agent's persona to one retention rate per signal family;
//! [`AgentMemory::decay_turn`](super::AgentMemory::decay_turn) multiplies every
//! value by its rate and snaps tiny magnitudes to zero.
//!
//! Two policies ship:
//!
//! - [`PersonaDecay`]: rates derived from persona traits (the default).
//! - [`HalfLifeDecay`]: one rate for everything, `0.5^(1/half_life)`.

use std::fmt;

use crate::persona::{Persona, PersonaId};
use crate::types::clamp_finite;

/// Retention factors applied by one decay pass, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRates {
    /// Faction evidence.
    pub evidence: f64,
    /// Lord-side signal and its help/harm tallies.
    pub faction: f64,
    /// Grudge.
    pub grudge: f64,
    /// Scalar global rage.
    pub rage: f64,
    /// Directed rage.
    pub rage_towards: f64,
}

/// Chooses the retention rates for one agent's decay pass.
pub trait DecayPolicy: fmt::Debug {
    /// Rates for an agent with `persona`.
    fn rates(&self, persona: &Persona) -> DecayRates;
}

/// Trait-driven rates.
///
/// ```text
/// evidence     = clamp(0.90 + insight × 0.06,       0.90, 0.98)
/// faction      = clamp(0.90 + insight × 0.05,       0.90, 0.98)
/// grudge       = clamp(0.88 + revenge_weight × 0.03, 0.88, 0.97)
/// rage / towards: fixed per persona
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersonaDecay;

impl DecayPolicy for PersonaDecay {
    fn rates(&self, persona: &Persona) -> DecayRates {
        let traits = &persona.traits;
        let (rage, rage_towards) = match persona.id {
            PersonaId::Balanced => (0.88, 0.92),
            PersonaId::Impulsive => (0.9, 0.93),
            PersonaId::Petty => (0.89, 0.95),
            PersonaId::Camouflage => (0.86, 0.9),
        };
        DecayRates {
            evidence: clamp_finite(0.9 + traits.insight * 0.06, 0.9, 0.98),
            faction: clamp_finite(0.9 + traits.insight * 0.05, 0.9, 0.98),
            grudge: clamp_finite(0.88 + traits.revenge_weight * 0.03, 0.88, 0.97),
            rage,
            rage_towards,
        }
    }
}

/// Single-half-life exponential smoothing: every signal loses half its
/// magnitude after `half_life_turns` of the agent's own turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfLifeDecay {
    /// Own turns until a signal has halved. Non-positive means "forget at once".
    pub half_life_turns: f64,
}

impl HalfLifeDecay {
    /// Create a policy with the given half-life.
    #[must_use]
    pub fn new(half_life_turns: f64) -> Self {
        Self { half_life_turns }
    }

    /// The per-turn retention factor.
    #[must_use]
    pub fn rate(&self) -> f64 {
        if !self.half_life_turns.is_finite() || self.half_life_turns <= 0.0 {
            return 0.0;
        }
        0.5_f64.powf(1.0 / self.half_life_turns)
    }
}

impl Default for HalfLifeDecay {
    fn default() -> Self {
        Self::new(6.0)
    }
}

impl DecayPolicy for HalfLifeDecay {
    fn rates(&self, _persona: &Persona) -> DecayRates {
        let r = self.rate();
        DecayRates {
            evidence: r,
            faction: r,
            grudge: r,
            rage: r,
            rage_towards: r,
        }
    }
}
