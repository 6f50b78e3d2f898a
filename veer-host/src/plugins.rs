//! Example score plugins built only on the public hook surface.
//!
//! Each plugin is a small serde-configurable struct with an `install` method
//! that subscribes one handler to [`SCORE_EVENT`]. They act at the final
//! stage so they see the built-in corrections already applied.

use serde::{Deserialize, Serialize};

use veer_core::hooks::{Flow, HandlerId, HookOptions};
use veer_core::scoring::{SCORE_EVENT, ScoreBus, ScoreContext, ScoreKind, ScoreStage};
use veer_core::session::SessionState;

/// Push enraged agents toward whoever they are enraged at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RageFocus {
    /// Rage below this does nothing.
    pub min_rage: f64,
    /// Bonus per point of `rage_towards` the target.
    pub weight: f64,
    /// Largest bonus.
    pub cap: f64,
}

impl Default for RageFocus {
    fn default() -> Self {
        Self {
            min_rage: 2.0,
            weight: 0.15,
            cap: 1.5,
        }
    }
}

impl RageFocus {
    /// Bonus for `ctx`; 0 when the plugin does not apply.
    #[must_use]
    pub fn bonus(&self, ctx: &ScoreContext, state: &SessionState) -> f64 {
        if ctx.stage != ScoreStage::Final || ctx.kind != ScoreKind::ChooseTarget || ctx.base <= 0.0 {
            return 0.0;
        }
        let (Some(target), Some(record)) = (ctx.candidate.as_target(), state.agent(&ctx.player)) else {
            return 0.0;
        };
        if record.memory.rage < self.min_rage {
            return 0.0;
        }
        (record.memory.rage_towards.get(target) * self.weight).clamp(0.0, self.cap)
    }

    /// Subscribe to the score event.
    pub fn install(self, bus: &mut ScoreBus, priority: i32) -> HandlerId {
        bus.on(
            SCORE_EVENT,
            move |ctx: &mut ScoreContext, state: &SessionState| {
                ctx.score += self.bonus(ctx, state);
                Ok(Flow::Continue)
            },
            HookOptions::priority(priority),
        )
    }
}

/// Favour targets that have latched as output cores and hold a grudge
/// from the scoring agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreHunter {
    /// Flat bonus.
    pub bonus: f64,
}

impl Default for CoreHunter {
    fn default() -> Self {
        Self { bonus: 0.3 }
    }
}

impl CoreHunter {
    /// Subscribe to the score event.
    pub fn install(self, bus: &mut ScoreBus, priority: i32) -> HandlerId {
        bus.on(
            SCORE_EVENT,
            move |ctx: &mut ScoreContext, state: &SessionState| {
                if ctx.stage != ScoreStage::Final || ctx.base <= 0.0 {
                    return Ok(Flow::Continue);
                }
                let Some(target) = ctx.candidate.as_target() else {
                    return Ok(Flow::Continue);
                };
                let latched = state.agent(target).is_some_and(|r| r.alive && r.stats.output_core);
                let grudge = state.agent(&ctx.player).map_or(0.0, |r| r.memory.grudge.get(target));
                if latched && grudge > 0.0 {
                    ctx.score += self.bonus;
                }
                Ok(Flow::Continue)
            },
            HookOptions::priority(priority),
        )
    }
}

/// Hold back attacks while the scoring agent's camouflage persona is still
/// hiding its alignment. Reads [`Persona::is_camouflaged`], which the session
/// counts down on each of the agent's own turns.
///
/// [`Persona::is_camouflaged`]: veer_core::persona::Persona::is_camouflaged
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamouflageRestraint {
    /// Multiplier on positive target scores while hidden.
    pub factor: f64,
}

impl Default for CamouflageRestraint {
    fn default() -> Self {
        Self { factor: 0.5 }
    }
}

impl CamouflageRestraint {
    /// Whether the restraint applies to `ctx`.
    #[must_use]
    pub fn applies(&self, ctx: &ScoreContext, state: &SessionState) -> bool {
        ctx.stage == ScoreStage::Final
            && ctx.kind == ScoreKind::ChooseTarget
            && ctx.score > 0.0
            && ctx.candidate.as_target().is_some_and(|t| *t != ctx.player)
            && state.agent(&ctx.player).is_some_and(|r| r.persona.is_camouflaged())
    }

    /// Subscribe to the score event.
    pub fn install(self, bus: &mut ScoreBus, priority: i32) -> HandlerId {
        let factor = self.factor.clamp(0.0, 1.0);
        bus.on(
            SCORE_EVENT,
            move |ctx: &mut ScoreContext, state: &SessionState| {
                if self.applies(ctx, state) {
                    ctx.score *= factor;
                }
                Ok(Flow::Continue)
            },
            HookOptions::priority(priority),
        )
    }
}
