//! Memory Store: per-agent decaying signal maps.
//!
//! Every agent's [`AgentMemory`] holds maps keyed by opponent [`AgentId`]
//! (first impression, evidence, grudge, directed rage, faction signals, action
//! tempo) plus a scalar global rage. All writes go through [`update`]:
//!
//! ```text
//! new = clamp(old × decay + delta, lo, hi)
//! ```
//!
//! so attenuation is applied implicitly on every touch. A separate
//! once-per-own-turn pass ([`decay`]) attenuates long-lived signals.

pub mod decay;

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::persona::{Persona, PersonaId};
use crate::types::{AgentId, TurnId, clamp_finite, finite_or_zero};

pub use decay::{DecayPolicy, DecayRates, HalfLifeDecay, PersonaDecay};

// ---------------------------------------------------------------------------
// Signal bounds
// ---------------------------------------------------------------------------

/// Closed range a signal is clamped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalBounds {
    /// Lower bound.
    pub lo: f64,
    /// Upper bound.
    pub hi: f64,
}

impl SignalBounds {
    /// Grudge toward an opponent.
    pub const GRUDGE: Self = Self { lo: 0.0, hi: 20.0 };
    /// Global and directed rage.
    pub const RAGE: Self = Self { lo: 0.0, hi: 20.0 };
    /// Faction evidence about an opponent.
    pub const EVIDENCE: Self = Self { lo: -10.0, hi: 10.0 };
    /// Net lord-side signal about an opponent.
    pub const FACTION: Self = Self { lo: -20.0, hi: 20.0 };
    /// Help / harm accumulators toward the lord.
    pub const FACTION_TALLY: Self = Self { lo: 0.0, hi: 20.0 };
    /// Action-tempo bias.
    pub const TEMPO: Self = Self { lo: -2.0, hi: 2.0 };
    /// First impression.
    pub const IMPRESSION: Self = Self { lo: -0.3, hi: 0.3 };
}

/// Magnitudes below this snap to zero during the per-turn decay pass.
pub const SNAP_TO_ZERO: f64 = 0.05;

// ---------------------------------------------------------------------------
// Update primitive
// ---------------------------------------------------------------------------

/// The single write primitive: `clamp(old × decay + delta, lo, hi)`.
///
/// `decay` is clamped to `[0, 1]`, so `delta = 0` moves a value
/// monotonically toward zero without crossing it. Non-finite inputs count
/// as zero.
#[must_use]
pub fn update(old: f64, delta: f64, decay: f64, bounds: SignalBounds) -> f64 {
    let decay = clamp_finite(decay, 0.0, 1.0);
    let next = finite_or_zero(old) * decay + finite_or_zero(delta);
    next.clamp(bounds.lo, bounds.hi)
}

/// A map of opponent id → signal value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalMap(BTreeMap<AgentId, f64>);

impl SignalMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value for `key` (0 when absent).
    #[must_use]
    pub fn get(&self, key: &AgentId) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    /// Apply [`update`] to `key` and return the new value.
    pub fn update(&mut self, key: &AgentId, delta: f64, decay: f64, bounds: SignalBounds) -> f64 {
        let slot = self.0.entry(key.clone()).or_insert(0.0);
        *slot = update(*slot, delta, decay, bounds);
        *slot
    }

    /// Accumulate without decay: `clamp(old + delta, lo, hi)`.
    pub fn add(&mut self, key: &AgentId, delta: f64, bounds: SignalBounds) -> f64 {
        self.update(key, delta, 1.0, bounds)
    }

    /// Insert a key with value zero unless already present.
    pub fn touch(&mut self, key: &AgentId) {
        self.0.entry(key.clone()).or_insert(0.0);
    }

    /// Multiply every value by `rate`, snapping small magnitudes to zero.
    pub fn attenuate(&mut self, rate: f64, bounds: SignalBounds) {
        for value in self.0.values_mut() {
            let next = update(*value, 0.0, rate, bounds);
            *value = if next.abs() < SNAP_TO_ZERO { 0.0 } else { next };
        }
    }

    /// Drop every key for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&AgentId) -> bool) {
        self.0.retain(|key, _| keep(key));
    }

    /// Iterate over `(opponent, value)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Number of tracked opponents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tempo record
// ---------------------------------------------------------------------------

/// Persistent action-tempo inference about one opponent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TempoRecord {
    /// Bias signal in `[-2, 2]`; positive means "likely holds many more".
    pub signal: f64,
    /// Number of observations folded in.
    pub samples: u32,
    /// Turn of the last observation.
    pub last_turn: TurnId,
}

// ---------------------------------------------------------------------------
// Habits
// ---------------------------------------------------------------------------

/// Per-session play habit, fixed once rolled so the agent does not flip-flop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchHabit {
    /// Commit resources first, then search for the follow-up.
    Heuristic,
    /// Only commit once the follow-up is in hand.
    Conservative,
}

impl SearchHabit {
    /// Roll a habit with persona-specific odds.
    pub fn roll(persona: PersonaId, rng: &mut impl Rng) -> Self {
        let heuristic_odds = match persona {
            PersonaId::Impulsive => 0.7,
            PersonaId::Camouflage => 0.25,
            PersonaId::Petty => 0.55,
            PersonaId::Balanced => 0.5,
        };
        if rng.gen_range(0.0..1.0) < heuristic_odds {
            Self::Heuristic
        } else {
            Self::Conservative
        }
    }
}

// ---------------------------------------------------------------------------
// Agent memory
// ---------------------------------------------------------------------------

/// The per-agent memory record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMemory {
    /// Opening bias toward each opponent, rolled once in `[-0.3, 0.3]`.
    pub first_impression: SignalMap,
    /// Faction evidence about each opponent.
    pub evidence: SignalMap,
    /// Accumulated grudge per opponent.
    pub grudge: SignalMap,
    /// Scalar global rage.
    pub rage: f64,
    /// Rage directed at each opponent.
    pub rage_towards: SignalMap,
    /// Net lord-side signal (+ helps the lord, − harms the lord).
    pub faction_signal: SignalMap,
    /// Positive part of the lord-side signal.
    pub faction_help: SignalMap,
    /// Negative part of the lord-side signal, as a magnitude.
    pub faction_harm: SignalMap,
    /// Action-tempo inference per opponent.
    pub tempo: BTreeMap<AgentId, TempoRecord>,
    /// Search habit for this session.
    pub search_habit: Option<SearchHabit>,
}

impl AgentMemory {
    /// Create an empty memory record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roll first impressions and zero the other maps for every opponent not
    /// seen before. Existing impressions are kept.
    pub fn seed_opponents<'a>(
        &mut self,
        opponents: impl IntoIterator<Item = &'a AgentId>,
        rng: &mut impl Rng,
    ) {
        for opponent in opponents {
            if self.first_impression.0.get(opponent).is_none() {
                let roll = (rng.gen_range(0.0..1.0) - 0.5) * 0.6;
                self.first_impression
                    .update(opponent, roll, 0.0, SignalBounds::IMPRESSION);
            }
            self.evidence.touch(opponent);
            self.grudge.touch(opponent);
            self.rage_towards.touch(opponent);
            self.faction_signal.touch(opponent);
            self.faction_help.touch(opponent);
            self.faction_harm.touch(opponent);
        }
    }

    /// Drop keys for opponents that left the roster.
    pub fn prune(&mut self, mut alive: impl FnMut(&AgentId) -> bool) {
        for map in [
            &mut self.first_impression,
            &mut self.evidence,
            &mut self.grudge,
            &mut self.rage_towards,
            &mut self.faction_signal,
            &mut self.faction_help,
            &mut self.faction_harm,
        ] {
            map.retain(&mut alive);
        }
        self.tempo.retain(|key, _| alive(key));
    }

    /// Record grudge against `source`.
    pub fn add_grudge(&mut self, source: &AgentId, amount: f64) -> f64 {
        self.grudge.add(source, amount, SignalBounds::GRUDGE)
    }

    /// Raise (or, with a negative amount, lower) global rage.
    pub fn add_rage(&mut self, amount: f64) -> f64 {
        self.rage = update(self.rage, amount, 1.0, SignalBounds::RAGE);
        self.rage
    }

    /// Raise (or lower) rage directed at `target`.
    pub fn add_rage_towards(&mut self, target: &AgentId, amount: f64) -> f64 {
        self.rage_towards.add(target, amount, SignalBounds::RAGE)
    }

    /// Add faction evidence about `actor`.
    pub fn add_evidence(&mut self, actor: &AgentId, amount: f64) -> f64 {
        self.evidence.add(actor, amount, SignalBounds::EVIDENCE)
    }

    /// Add lord-side signal about `actor`, splitting it into help and harm tallies.
    pub fn add_faction_signal(&mut self, actor: &AgentId, amount: f64) -> f64 {
        let amount = finite_or_zero(amount);
        if amount > 0.0 {
            self.faction_help
                .add(actor, amount, SignalBounds::FACTION_TALLY);
        } else if amount < 0.0 {
            self.faction_harm
                .add(actor, -amount, SignalBounds::FACTION_TALLY);
        }
        self.faction_signal.add(actor, amount, SignalBounds::FACTION)
    }

    /// Fold a tempo observation about `actor` through the decay primitive.
    pub fn observe_tempo(&mut self, actor: &AgentId, delta: f64, decay: f64, turn: TurnId) -> TempoRecord {
        let record = self.tempo.entry(actor.clone()).or_default();
        record.signal = update(record.signal, delta, decay, SignalBounds::TEMPO);
        record.samples = record.samples.saturating_add(1);
        record.last_turn = turn;
        *record
    }

    /// Run the once-per-own-turn attenuation pass.
    pub fn decay_turn(&mut self, persona: &Persona, policy: &dyn DecayPolicy) {
        let rates = policy.rates(persona);
        self.evidence.attenuate(rates.evidence, SignalBounds::EVIDENCE);
        self.grudge.attenuate(rates.grudge, SignalBounds::GRUDGE);
        self.rage_towards
            .attenuate(rates.rage_towards, SignalBounds::RAGE);
        self.faction_signal
            .attenuate(rates.faction, SignalBounds::FACTION);
        self.faction_help
            .attenuate(rates.faction, SignalBounds::FACTION_TALLY);
        self.faction_harm
            .attenuate(rates.faction, SignalBounds::FACTION_TALLY);

        let rage = update(self.rage, 0.0, rates.rage, SignalBounds::RAGE);
        self.rage = if rage < SNAP_TO_ZERO { 0.0 } else { rage };
    }
}
