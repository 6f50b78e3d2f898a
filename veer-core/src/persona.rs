//! Personas: named behavioral profiles rolled once per agent per session.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::PersonaConfig;

/// The four persona kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    /// Default profile.
    Balanced,
    /// Aggressive, noisy, quick to anger.
    Impulsive,
    /// Holds grudges.
    Petty,
    /// Hides its alignment for the first few rounds.
    Camouflage,
}

impl PersonaId {
    /// Every persona in draw order.
    pub const ALL: [Self; 4] = [Self::Balanced, Self::Impulsive, Self::Petty, Self::Camouflage];

    /// Lowercase name, as used in config keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Impulsive => "impulsive",
            Self::Petty => "petty",
            Self::Camouflage => "camouflage",
        }
    }

    /// Parse a lowercase name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == raw.trim())
    }

    /// Multiplier on rage gained from hostile actions.
    #[must_use]
    pub fn rage_gain(self) -> f64 {
        match self {
            Self::Balanced => 1.0,
            Self::Impulsive => 1.15,
            Self::Petty => 1.05,
            Self::Camouflage => 0.9,
        }
    }

    /// Multiplier on rage shed when healed.
    #[must_use]
    pub fn rage_calm(self) -> f64 {
        match self {
            Self::Balanced => 1.0,
            Self::Impulsive => 0.9,
            Self::Petty => 0.95,
            Self::Camouflage => 1.05,
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric persona traits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    /// Willingness to commit to offense.
    pub aggressiveness: f64,
    /// Amplitude of score noise (only the impulsive persona uses it).
    pub randomness: f64,
    /// Grudge gained per point of damage received.
    pub revenge_weight: f64,
    /// How slowly faction evidence fades.
    pub insight: f64,
    /// Own turns left before the camouflage wears off.
    pub camouflage_rounds: u32,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            aggressiveness: 0.5,
            randomness: 0.0,
            revenge_weight: 1.0,
            insight: 0.5,
            camouflage_rounds: 0,
        }
    }
}

/// A persona: id plus traits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona kind.
    pub id: PersonaId,
    /// Traits; only `camouflage_rounds` changes during a session.
    pub traits: Traits,
}

impl Persona {
    /// The persona `id` with its standard traits.
    #[must_use]
    pub fn new(id: PersonaId) -> Self {
        let mut traits = Traits::default();
        match id {
            PersonaId::Balanced => {}
            PersonaId::Impulsive => {
                traits.aggressiveness = 0.8;
                traits.randomness = 0.12;
                traits.insight = 0.35;
            }
            PersonaId::Petty => {
                traits.aggressiveness = 0.6;
                traits.revenge_weight = 2.2;
                traits.insight = 0.5;
            }
            PersonaId::Camouflage => {
                traits.aggressiveness = 0.55;
                traits.insight = 0.6;
                traits.camouflage_rounds = 3;
            }
        }
        Self { id, traits }
    }

    /// Weighted draw over the enabled personas. Falls back to `balanced`
    /// when nothing is enabled or every weight is zero.
    pub fn roll(config: &PersonaConfig, rng: &mut impl Rng) -> Self {
        let pool: Vec<(PersonaId, f64)> = PersonaId::ALL
            .into_iter()
            .filter(|id| config.enabled(*id))
            .map(|id| (id, config.weights.get(id)))
            .filter(|(_, w)| w.is_finite() && *w > 0.0)
            .collect();

        let total: f64 = pool.iter().map(|(_, w)| w).sum();
        let Some(&(last, _)) = pool.last() else {
            return Self::new(PersonaId::Balanced);
        };

        let mut r = rng.gen_range(0.0..1.0) * total;
        for (id, w) in &pool {
            r -= w;
            if r <= 0.0 {
                return Self::new(*id);
            }
        }
        Self::new(last)
    }

    /// Count the camouflage down by one own turn. Returns the rounds left.
    pub fn tick_camouflage(&mut self) -> u32 {
        self.traits.camouflage_rounds = self.traits.camouflage_rounds.saturating_sub(1);
        self.traits.camouflage_rounds
    }

    /// Whether the agent is still hiding its alignment.
    ///
    /// The built-in corrections ignore this; score hooks read it to shape
    /// camouflage play.
    #[must_use]
    pub fn is_camouflaged(&self) -> bool {
        self.traits.camouflage_rounds > 0
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(PersonaId::Balanced)
    }
}
