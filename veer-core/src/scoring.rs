//! Decision Scoring Pipeline.
//!
//! Wraps the host's native evaluator and threads a [`ScoreContext`] through
//! three hook-bus stages on the [`SCORE_EVENT`] name:
//!
//! ```text
//! check ─▶ hidden-hand guard ─▶ [base] ─▶ builtin extra ─▶ [builtin] ─▶ [final] ─▶ score
//! ```
//!
//! - A failing or panicking evaluator scores 0. A non-finite one does too.
//! - The hidden-hand guard turns a positive score for a concealed card into a
//!   small random positive value; non-positive scores pass through.
//! - Built-in extra is bounded noise for the impulsive persona (positive base
//!   only) plus a grudge bias for the petty persona toward hostile targets.
//! - The score is re-sanitized after every stage, so handlers can never
//!   leak NaN or infinity back to the engine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::EvalError;
use crate::hooks::HookBus;
use crate::metrics::VeerCounters;
use crate::oracle::HostOracle;
use crate::persona::PersonaId;
use crate::session::SessionState;
use crate::types::{AgentId, CardInfo, Zone, clamp_finite};

/// Well-known hook-bus event name for score composition.
pub const SCORE_EVENT: &str = "veer_score";

/// Hook bus carrying score contexts, with the session state readable by handlers.
pub type ScoreBus = HookBus<ScoreContext, SessionState>;

/// Which selection routine is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Choosing a card to use or discard.
    ChooseCard,
    /// Choosing a target player.
    ChooseTarget,
    /// Choosing a button (often a card shown in a dialog).
    ChooseButton,
}

/// Pipeline stage a context is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStage {
    /// Native score, before built-in corrections.
    Base,
    /// After built-in corrections.
    Builtin,
    /// Last chance to adjust.
    Final,
}

/// One selectable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Candidate {
    /// A card.
    Card(CardInfo),
    /// A player.
    Target {
        /// The player.
        id: AgentId,
    },
    /// A dialog button, optionally linked to a card.
    Button {
        /// Button label or link name.
        label: String,
        /// Card behind the button.
        card: Option<CardInfo>,
    },
}

impl Candidate {
    /// A target candidate.
    #[must_use]
    pub fn target(id: AgentId) -> Self {
        Self::Target { id }
    }

    /// A button linked to a card.
    #[must_use]
    pub fn card_button(card: CardInfo) -> Self {
        Self::Button {
            label: card.name.clone(),
            card: Some(card),
        }
    }

    /// The player this candidate names, if it is a target.
    #[must_use]
    pub fn as_target(&self) -> Option<&AgentId> {
        match self {
            Self::Target { id } => Some(id),
            _ => None,
        }
    }

    /// The card behind this candidate, if any.
    #[must_use]
    pub fn card(&self) -> Option<&CardInfo> {
        match self {
            Self::Card(card) => Some(card),
            Self::Button { card, .. } => card.as_ref(),
            Self::Target { .. } => None,
        }
    }
}

/// The engine event a decision belongs to, as far as the hidden-hand guard cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    /// Engine event name (`choosePlayerCard`, `discardPlayerCard`, ...).
    pub name: String,
    /// Player whose cards are being picked from.
    pub target: Option<AgentId>,
    /// Zones on offer, as the engine's position string (`"h"`, `"he"`, ...).
    pub position: String,
    /// The engine has revealed the cards to the chooser.
    pub visible: bool,
}

impl DecisionEvent {
    /// Whether this is an opponent-card pick that may include the hand.
    #[must_use]
    pub fn picks_from_hand(&self) -> bool {
        matches!(self.name.as_str(), "choosePlayerCard" | "discardPlayerCard")
            && self.target.is_some()
            && self.position.contains('h')
            && !self.visible
    }
}

/// One selection the host is about to make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Selection routine.
    pub kind: ScoreKind,
    /// Choosing agent.
    pub player: AgentId,
    /// Engine event context.
    pub event: Option<DecisionEvent>,
}

impl Decision {
    /// A decision without event context.
    #[must_use]
    pub fn new(kind: ScoreKind, player: AgentId) -> Self {
        Self {
            kind,
            player,
            event: None,
        }
    }

    /// Attach the engine event.
    #[must_use]
    pub fn with_event(mut self, event: DecisionEvent) -> Self {
        self.event = Some(event);
        self
    }
}

/// The record threaded through the three stages of one scoring call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreContext {
    /// Selection routine.
    pub kind: ScoreKind,
    /// Current stage.
    pub stage: ScoreStage,
    /// Choosing agent.
    pub player: AgentId,
    /// Candidate being scored.
    pub candidate: Candidate,
    /// Every candidate of this selection.
    pub all_candidates: Arc<[Candidate]>,
    /// Native score after the hidden-hand guard.
    pub base: f64,
    /// Running score.
    pub score: f64,
    /// Built-in extra (set before the builtin stage).
    pub extra: f64,
    /// Engine event context.
    pub event: Option<DecisionEvent>,
    /// Convention flag: later handlers should leave the score alone.
    pub stop: bool,
    /// Skip the built-in corrections (set during the base stage).
    pub skip_builtin: bool,
}

// ---------------------------------------------------------------------------
// Evaluators and strategies
// ---------------------------------------------------------------------------

/// The host's native "how good is this candidate" function.
pub trait Evaluator {
    /// Score `candidate` among `all`.
    ///
    /// # Errors
    /// Any error is treated as a score of 0 by the pipeline.
    fn check(&mut self, candidate: &Candidate, all: &[Candidate]) -> Result<f64, EvalError>;
}

impl<F> Evaluator for F
where
    F: FnMut(&Candidate, &[Candidate]) -> f64,
{
    fn check(&mut self, candidate: &Candidate, all: &[Candidate]) -> Result<f64, EvalError> {
        Ok(self(candidate, all))
    }
}

/// Adapter for evaluators that can report failure.
#[derive(Debug, Clone, Copy)]
pub struct Fallible<F>(pub F);

impl<F> Evaluator for Fallible<F>
where
    F: FnMut(&Candidate, &[Candidate]) -> Result<f64, EvalError>,
{
    fn check(&mut self, candidate: &Candidate, all: &[Candidate]) -> Result<f64, EvalError> {
        (self.0)(candidate, all)
    }
}

/// What the host's selection routines call instead of the bare evaluator.
pub trait ScoringStrategy {
    /// Score `candidate` among `all`. Always finite for tracked agents.
    fn evaluate(&mut self, candidate: &Candidate, all: &[Candidate]) -> f64;
}

/// The host evaluator used as-is.
#[derive(Debug, Clone, Copy)]
pub struct NativeStrategy<E>(pub E);

impl<E: Evaluator> ScoringStrategy for NativeStrategy<E> {
    fn evaluate(&mut self, candidate: &Candidate, all: &[Candidate]) -> f64 {
        self.0.check(candidate, all).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything one scoring call borrows.
pub struct Pipeline<'a, O: ?Sized> {
    /// Score hooks.
    pub bus: &'a mut ScoreBus,
    /// Session state, read by built-ins and handlers.
    pub state: &'a SessionState,
    /// Session RNG.
    pub rng: &'a mut StdRng,
    /// Host attitude and visibility oracle.
    pub oracle: &'a O,
}

impl<O: HostOracle + ?Sized> Pipeline<'_, O> {
    /// Run the native evaluator, isolating errors, panics and non-finite results.
    pub fn native_score<E: Evaluator + ?Sized>(
        &self,
        evaluator: &mut E,
        candidate: &Candidate,
        all: &[Candidate],
    ) -> f64 {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluator.check(candidate, all)));
        let counters = &self.state.counters;
        match outcome {
            Ok(Ok(v)) if v.is_finite() => v,
            Ok(Ok(v)) => {
                debug!(score = v, "Evaluator returned a non-finite score");
                VeerCounters::bump(&counters.evaluator_failures);
                0.0
            }
            Ok(Err(error)) => {
                debug!(%error, "Evaluator failed");
                VeerCounters::bump(&counters.evaluator_failures);
                0.0
            }
            Err(_) => {
                debug!("Evaluator panicked");
                VeerCounters::bump(&counters.evaluator_failures);
                0.0
            }
        }
    }

    /// Score one candidate for a tracked agent.
    pub fn score<E: Evaluator + ?Sized>(
        &mut self,
        decision: &Decision,
        candidate: &Candidate,
        all: &[Candidate],
        evaluator: &mut E,
    ) -> f64 {
        let mut base = self.native_score(evaluator, candidate, all);

        if decision.kind == ScoreKind::ChooseButton
            && base > 0.0
            && self.is_blind_hand_pick(decision, candidate)
        {
            base = 1e-6 + self.rng.gen_range(0.0..1.0);
            trace!(agent = %decision.player, base, "Blind hand pick randomized");
        }

        let hooked = self.bus.has(SCORE_EVENT);
        if !hooked {
            let extra = self.builtin_extra(decision, candidate, base);
            return finite_or(base + extra, base);
        }

        let failures_before = self.bus.failures();
        let mut ctx = ScoreContext {
            kind: decision.kind,
            stage: ScoreStage::Base,
            player: decision.player.clone(),
            candidate: candidate.clone(),
            all_candidates: Arc::from(all),
            base,
            score: base,
            extra: 0.0,
            event: decision.event.clone(),
            stop: false,
            skip_builtin: false,
        };
        ctx = self.emit(ctx, base);

        let extra = if ctx.skip_builtin {
            0.0
        } else {
            self.builtin_extra(decision, candidate, base)
        };
        ctx.extra = extra;
        ctx.score = finite_or(ctx.score, base) + extra;
        ctx.stage = ScoreStage::Builtin;
        ctx = self.emit(ctx, base + extra);

        ctx.stage = ScoreStage::Final;
        ctx = self.emit(ctx, base + extra);

        let failed = self.bus.failures().saturating_sub(failures_before);
        VeerCounters::add(&self.state.counters.handler_failures, failed);
        finite_or(ctx.score, base + extra)
    }

    fn emit(&mut self, ctx: ScoreContext, fallback: f64) -> ScoreContext {
        let mut ctx = self.bus.emit(SCORE_EVENT, ctx, self.state);
        if !ctx.score.is_finite() {
            debug!(stage = ?ctx.stage, "Hook left a non-finite score");
            ctx.score = fallback;
        }
        ctx
    }

    /// Whether this pick is from an opponent's concealed hand.
    #[must_use]
    pub fn is_blind_hand_pick(&self, decision: &Decision, candidate: &Candidate) -> bool {
        if !self.state.config.scoring.blind_handcard_random {
            return false;
        }
        let Some(event) = decision.event.as_ref().filter(|e| e.picks_from_hand()) else {
            return false;
        };
        let Some(owner) = event.target.as_ref() else {
            return false;
        };
        if self.oracle.controls(&decision.player, owner)
            || self.oracle.can_view_hand(&decision.player, owner)
        {
            return false;
        }
        candidate
            .card()
            .is_some_and(|card| card.zone == Zone::Hand && !self.oracle.is_shown_card(card))
    }

    /// Built-in noise and grudge bias.
    fn builtin_extra(&mut self, decision: &Decision, candidate: &Candidate, base: f64) -> f64 {
        let Some(agent) = self.state.agent(&decision.player) else {
            return 0.0;
        };
        let cfg = &self.state.config.scoring;
        let persona = agent.persona;
        let mut extra = 0.0;

        let randomness = persona.traits.randomness;
        if cfg.score_noise_enable
            && persona.id == PersonaId::Impulsive
            && base > 0.0
            && randomness != 0.0
        {
            extra += (self.rng.gen_range(0.0..1.0) - 0.5) * randomness * cfg.noise_scale;
        }

        if persona.id == PersonaId::Petty {
            if let Some(target) = candidate.as_target() {
                if self.oracle.attitude(&decision.player, target) < 0.0 {
                    let grudge = agent.memory.grudge.get(target);
                    extra += clamp_finite(grudge * cfg.grudge_bias_weight, 0.0, cfg.grudge_bias_cap);
                }
            }
        }
        finite_or(extra, 0.0)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else if fallback.is_finite() {
        fallback
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VeerConfig;
    use crate::hooks::{Flow, HookOptions};
    use crate::oracle::NeutralOracle;
    use crate::persona::Persona;
    use crate::session::{AgentOptions, Session};
    use crate::error::HookError;

    fn id(raw: &str) -> AgentId {
        AgentId::parse(raw).expect("valid id")
    }

    fn seeded() -> VeerConfig {
        let mut cfg = VeerConfig::default();
        cfg.session.seed = Some(11);
        cfg
    }

    fn session_with(persona: PersonaId) -> Session {
        let mut s = Session::new(seeded());
        s.add_agent(id("a"), AgentOptions::tracked().persona(Persona::new(persona)));
        s.add_agent(id("b"), AgentOptions::tracked());
        s.start_game();
        s
    }

    struct Hostile;
    impl HostOracle for Hostile {
        fn attitude(&self, _: &AgentId, _: &AgentId) -> f64 {
            -1.0
        }
    }

    #[test]
    fn failing_evaluator_scores_zero() {
        let mut s = session_with(PersonaId::Balanced);
        let d = Decision::new(ScoreKind::ChooseCard, id("a"));
        let c = Candidate::Card(CardInfo::new("1", "sha", Zone::Hand));
        let mut eval = Fallible(|_: &Candidate, _: &[Candidate]| Err(EvalError::new("bad")));
        assert_eq!(s.score(&d, &c, &[], &mut eval, &NeutralOracle), 0.0);

        let mut nan = |_: &Candidate, _: &[Candidate]| f64::NAN;
        assert_eq!(s.score(&d, &c, &[], &mut nan, &NeutralOracle), 0.0);
        assert_eq!(s.counters().evaluator_failures, 2);
    }

    #[test]
    fn stages_run_in_order_and_see_extra() {
        let mut s = session_with(PersonaId::Balanced);
        s.hooks_mut().on(
            SCORE_EVENT,
            |ctx: &mut ScoreContext, _: &SessionState| {
                match ctx.stage {
                    ScoreStage::Base => ctx.score += 1.0,
                    ScoreStage::Builtin => ctx.score *= 2.0,
                    ScoreStage::Final => ctx.score -= 0.5,
                }
                Ok(Flow::Continue)
            },
            HookOptions::default(),
        );
        let d = Decision::new(ScoreKind::ChooseCard, id("a"));
        let c = Candidate::Card(CardInfo::new("1", "sha", Zone::Hand));
        let mut eval = |_: &Candidate, _: &[Candidate]| 2.0;
        assert!((s.score(&d, &c, &[], &mut eval, &NeutralOracle) - 5.5).abs() < 1e-9);
    }

    #[test]
    fn skip_builtin_suppresses_grudge_bias() {
        let mut s = session_with(PersonaId::Petty);
        s.agent_mut(&id("a"))
            .expect("registered")
            .memory
            .add_grudge(&id("b"), 10.0);
        let d = Decision::new(ScoreKind::ChooseTarget, id("a"));
        let c = Candidate::target(id("b"));
        let mut eval = |_: &Candidate, _: &[Candidate]| 1.0;

        let biased = s.score(&d, &c, &[], &mut eval, &Hostile);
        assert!((biased - 2.2).abs() < 1e-9);
        assert!((s.score(&d, &c, &[], &mut eval, &NeutralOracle) - 1.0).abs() < 1e-9);

        s.hooks_mut().on(
            SCORE_EVENT,
            |ctx: &mut ScoreContext, _: &SessionState| {
                if ctx.stage == ScoreStage::Base {
                    ctx.skip_builtin = true;
                }
                Ok(Flow::Continue)
            },
            HookOptions::default(),
        );
        assert!((s.score(&d, &c, &[], &mut eval, &Hostile) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn grudge_bias_is_capped() {
        let mut s = session_with(PersonaId::Petty);
        s.agent_mut(&id("a"))
            .expect("registered")
            .memory
            .add_grudge(&id("b"), 20.0);
        let d = Decision::new(ScoreKind::ChooseTarget, id("a"));
        let mut eval = |_: &Candidate, _: &[Candidate]| 0.0;
        let score = s.score(&d, &Candidate::target(id("b")), &[], &mut eval, &Hostile);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_hook_output_falls_back() {
        let mut s = session_with(PersonaId::Balanced);
        s.hooks_mut().on(
            SCORE_EVENT,
            |ctx: &mut ScoreContext, _: &SessionState| {
                ctx.score = f64::INFINITY;
                Ok(Flow::Continue)
            },
            HookOptions::default(),
        );
        s.hooks_mut().on(
            SCORE_EVENT,
            |_: &mut ScoreContext, _: &SessionState| -> Result<Flow<ScoreContext>, HookError> {
                panic!("plugin bug")
            },
            HookOptions::priority(-1),
        );
        let d = Decision::new(ScoreKind::ChooseCard, id("a"));
        let c = Candidate::Card(CardInfo::new("1", "sha", Zone::Hand));
        let mut eval = |_: &Candidate, _: &[Candidate]| 3.0;
        assert!((s.score(&d, &c, &[], &mut eval, &NeutralOracle) - 3.0).abs() < 1e-9);
        assert_eq!(s.counters().handler_failures, 3);
    }

    fn blind_pick() -> (Decision, Candidate) {
        let d = Decision::new(ScoreKind::ChooseButton, id("a")).with_event(DecisionEvent {
            name: "choosePlayerCard".into(),
            target: Some(id("b")),
            position: "he".into(),
            visible: false,
        });
        (d, Candidate::card_button(CardInfo::new("9", "tao", Zone::Hand)))
    }

    #[test]
    fn blind_hand_pick_randomizes_only_positive_scores() {
        let mut s = session_with(PersonaId::Balanced);
        let (d, c) = blind_pick();
        let mut high = |_: &Candidate, _: &[Candidate]| 50.0;
        let v = s.score(&d, &c, &[], &mut high, &NeutralOracle);
        assert!(v > 0.0 && v <= 1.0 + 1e-6);

        let mut negative = |_: &Candidate, _: &[Candidate]| -3.0;
        assert!((s.score(&d, &c, &[], &mut negative, &NeutralOracle) + 3.0).abs() < 1e-9);
    }

    #[test]
    fn shown_or_visible_cards_are_scored_exactly() {
        let mut s = session_with(PersonaId::Balanced);
        let (d, _) = blind_pick();
        let shown = Candidate::card_button(CardInfo::new("9", "tao", Zone::Hand).shown());
        let mut eval = |_: &Candidate, _: &[Candidate]| 50.0;
        assert!((s.score(&d, &shown, &[], &mut eval, &NeutralOracle) - 50.0).abs() < 1e-9);

        let equip = Candidate::card_button(CardInfo::new("8", "bagua", Zone::Equipment));
        assert!((s.score(&d, &equip, &[], &mut eval, &NeutralOracle) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn impulsive_noise_is_bounded_and_needs_positive_base() {
        let mut s = session_with(PersonaId::Impulsive);
        let d = Decision::new(ScoreKind::ChooseCard, id("a"));
        let c = Candidate::Card(CardInfo::new("1", "sha", Zone::Hand));
        let mut pos = |_: &Candidate, _: &[Candidate]| 1.0;
        for _ in 0..50 {
            let v = s.score(&d, &c, &[], &mut pos, &NeutralOracle);
            assert!((v - 1.0).abs() <= 0.12 * 0.2 * 0.5 + 1e-12);
        }
        let mut zero = |_: &Candidate, _: &[Candidate]| 0.0;
        assert_eq!(s.score(&d, &c, &[], &mut zero, &NeutralOracle), 0.0);
    }

    #[test]
    fn untracked_agents_bypass_the_pipeline() {
        let mut s = session_with(PersonaId::Balanced);
        s.add_agent(id("human"), AgentOptions::untracked());
        s.hooks_mut().on(
            SCORE_EVENT,
            |ctx: &mut ScoreContext, _: &SessionState| {
                ctx.score = 100.0;
                Ok(Flow::Continue)
            },
            HookOptions::default(),
        );
        let d = Decision::new(ScoreKind::ChooseCard, id("human"));
        let c = Candidate::Card(CardInfo::new("1", "sha", Zone::Hand));
        let mut eval = |_: &Candidate, _: &[Candidate]| 4.0;
        assert!((s.score(&d, &c, &[], &mut eval, &NeutralOracle) - 4.0).abs() < 1e-9);
        assert_eq!(s.counters().decisions_bypassed, 1);
    }
}
