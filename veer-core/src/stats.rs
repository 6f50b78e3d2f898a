//! Output-Core Classifier: per-agent draw/damage stats with a two-turn
//! window and a one-way latch.
//!
//! An agent becomes an "output core" the first time its draws (or damage)
//! over its current and previous own turns reach the configured threshold.
//! The latch never resets within a session.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OutputCoreConfig;
use crate::types::{AgentId, Faction, finite_or_zero};

const CORE_SCORE_DRAW_W: f64 = 0.6;
const CORE_SCORE_DAMAGE_W: f64 = 2.2;

/// Latch thresholds after coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Draw threshold; `<= 0` means any positive draw.
    pub draw: f64,
    /// Damage threshold; `<= 0` means any positive damage.
    pub damage: f64,
}

impl Thresholds {
    /// Read thresholds from config, coercing non-finite values to the defaults.
    #[must_use]
    pub fn from_config(cfg: &OutputCoreConfig) -> Self {
        let d = OutputCoreConfig::default();
        let pick = |v: f64, default: f64| if v.is_finite() { v } else { default };
        Self {
            draw: pick(cfg.draw_threshold, d.draw_threshold),
            damage: pick(cfg.damage_threshold, d.damage_threshold),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from_config(&OutputCoreConfig::default())
    }
}

fn meets(value: f64, threshold: f64) -> bool {
    if threshold <= 0.0 {
        value > 0.0
    } else {
        value >= threshold
    }
}

/// Per-agent stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Cards drawn this session.
    pub draw: f64,
    /// Damage dealt this session.
    pub damage_dealt: f64,
    /// Cards drawn during the current own turn.
    pub turn_draw: f64,
    /// Damage dealt during the current own turn.
    pub turn_damage_dealt: f64,
    /// Cards drawn during the previous own turn.
    pub prev_turn_draw: f64,
    /// Damage dealt during the previous own turn.
    pub prev_turn_damage_dealt: f64,
    /// One-way latch.
    pub output_core: bool,
}

impl AgentStats {
    /// Record `n` cards drawn. Only own-turn draws count toward the window.
    /// Returns `true` when this call set the latch.
    pub fn add_draw(&mut self, n: f64, own_turn: bool, thresholds: Thresholds) -> bool {
        let n = finite_or_zero(n);
        if n <= 0.0 {
            return false;
        }
        self.draw += n;
        if !own_turn {
            return false;
        }
        self.turn_draw += n;
        self.test_latch(thresholds)
    }

    /// Record `n` damage dealt. Only own-turn damage counts toward the window.
    /// Returns `true` when this call set the latch.
    pub fn add_damage(&mut self, n: f64, own_turn: bool, thresholds: Thresholds) -> bool {
        let n = finite_or_zero(n);
        if n <= 0.0 {
            return false;
        }
        self.damage_dealt += n;
        if !own_turn {
            return false;
        }
        self.turn_damage_dealt += n;
        self.test_latch(thresholds)
    }

    /// Set the latch if the two-turn window meets either threshold.
    /// Returns `true` only on the false → true transition.
    pub fn test_latch(&mut self, thresholds: Thresholds) -> bool {
        if self.output_core {
            return false;
        }
        let draw2 = self.turn_draw + self.prev_turn_draw;
        let dmg2 = self.turn_damage_dealt + self.prev_turn_damage_dealt;
        if meets(draw2, thresholds.draw) || meets(dmg2, thresholds.damage) {
            self.output_core = true;
            debug!(draw2, dmg2, "Output core latched");
            return true;
        }
        false
    }

    /// Roll the window at the start of an own turn.
    pub fn roll_window(&mut self) {
        self.prev_turn_draw = self.turn_draw;
        self.prev_turn_damage_dealt = self.turn_damage_dealt;
        self.turn_draw = 0.0;
        self.turn_damage_dealt = 0.0;
    }

    /// Ranking score: `draw × 0.6 + damage_dealt × 2.2`.
    #[must_use]
    pub fn core_score(&self) -> f64 {
        finite_or_zero(self.draw) * CORE_SCORE_DRAW_W
            + finite_or_zero(self.damage_dealt) * CORE_SCORE_DAMAGE_W
    }
}

/// One agent as seen by [`faction_output_core`].
#[derive(Debug, Clone, Copy)]
pub struct CoreCandidate<'a> {
    /// Agent id.
    pub id: &'a AgentId,
    /// Stats.
    pub stats: &'a AgentStats,
    /// Faction the agent is believed to belong to.
    pub faction: Faction,
    /// Still alive.
    pub alive: bool,
}

/// The highest-scoring latched, alive agent of `faction`. Ties keep the
/// earliest candidate.
#[must_use]
pub fn faction_output_core<'a>(
    candidates: impl IntoIterator<Item = CoreCandidate<'a>>,
    faction: Faction,
) -> Option<&'a AgentId> {
    let mut best: Option<(OrderedFloat<f64>, &'a AgentId)> = None;
    for c in candidates {
        if !c.alive || !c.stats.output_core || c.faction != faction {
            continue;
        }
        let score = OrderedFloat(c.stats.core_score());
        if best.is_none_or(|(top, _)| score > top) {
            best = Some((score, c.id));
        }
    }
    best.map(|(_, id)| id)
}
