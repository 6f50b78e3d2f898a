//! Bridge between the host's selection routines and the scoring layer.
//!
//! The host keeps its own "pick the best" loop; this module supplies the
//! two places where veer plugs into it: the per-candidate score (through a
//! [`ScoringStrategy`]) and the rescue confirm decision.

use ordered_float::OrderedFloat;
use tracing::debug;

use veer_core::Session;
use veer_core::error::Result;
use veer_core::oracle::HostOracle;
use veer_core::scoring::{Candidate, Decision, Evaluator, ScoreKind, ScoringStrategy};
use veer_core::types::AgentId;

/// The winning candidate of a selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    /// Index into the candidate slice.
    pub index: usize,
    /// Its score.
    pub score: f64,
}

fn best_of(scores: impl Iterator<Item = (usize, f64)>) -> Option<Selection> {
    // Earliest candidate wins ties.
    scores
        .min_by_key(|(_, s)| std::cmp::Reverse(OrderedFloat(*s)))
        .map(|(index, score)| Selection { index, score })
}

/// Score every candidate through `strategy` and return the best one.
pub fn select_best<S>(strategy: &mut S, candidates: &[Candidate]) -> Option<Selection>
where
    S: ScoringStrategy + ?Sized,
{
    best_of(
        candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (i, strategy.evaluate(c, candidates))),
    )
}

/// Like [`select_best`] over the bare evaluator, surfacing its first failure.
///
/// For host tooling that wants evaluator bugs reported rather than scored 0.
///
/// # Errors
/// Returns `VeerError::Evaluator` with the first error the evaluator reports.
pub fn select_native_strict<E>(evaluator: &mut E, candidates: &[Candidate]) -> Result<Option<Selection>>
where
    E: Evaluator + ?Sized,
{
    let mut scores = Vec::with_capacity(candidates.len());
    for (i, c) in candidates.iter().enumerate() {
        scores.push((i, evaluator.check(c, candidates)?));
    }
    Ok(best_of(scores.into_iter().filter(|(_, s)| s.is_finite())))
}

/// Pick a target for `player` among `targets`, scored by the session.
pub fn choose_target<E, O>(
    session: &mut Session,
    player: &AgentId,
    targets: &[AgentId],
    evaluator: E,
    oracle: &O,
) -> Option<AgentId>
where
    E: Evaluator,
    O: HostOracle + ?Sized,
{
    let candidates: Vec<Candidate> = targets.iter().cloned().map(Candidate::target).collect();
    let decision = Decision::new(ScoreKind::ChooseTarget, player.clone());
    let mut strategy = session.strategy(decision, evaluator, oracle);
    let pick = select_best(&mut strategy, &candidates)?;
    targets.get(pick.index).cloned()
}

/// Final answer to "should `agent` rescue one of `candidates`".
///
/// An agent that just attacked one of the candidates declines, whatever the
/// host's own answer was.
#[must_use]
pub fn resolve_rescue(session: &Session, agent: &AgentId, candidates: &[AgentId], native: bool) -> bool {
    if native && session.should_forbid_rescue(agent, candidates) {
        debug!(agent = %agent, "Rescue declined after own attack");
        return false;
    }
    native
}

#[cfg(test)]
mod tests {
    use super::*;
    use veer_core::VeerConfig;
    use veer_core::error::EvalError;
    use veer_core::events::{EventKind, GameEvent};
    use veer_core::oracle::NeutralOracle;
    use veer_core::scoring::{Fallible, NativeStrategy};
    use veer_core::session::AgentOptions;
    use veer_core::types::EventId;

    fn id(raw: &str) -> AgentId {
        AgentId::parse(raw).expect("valid id")
    }

    fn targets(ids: &[&str]) -> Vec<Candidate> {
        ids.iter().map(|raw| Candidate::target(id(raw))).collect()
    }

    fn by_name(c: &Candidate, _: &[Candidate]) -> f64 {
        match c.as_target().map(AgentId::as_str) {
            Some("p2") => 3.0,
            Some("p3") => 3.0,
            Some("p4") => f64::NAN,
            _ => 1.0,
        }
    }

    #[test]
    fn ties_go_to_the_earliest_candidate() {
        let all = targets(&["p1", "p2", "p3"]);
        let pick = select_best(&mut NativeStrategy(by_name), &all).expect("non-empty");
        assert_eq!(pick.index, 1);
        assert!((pick.score - 3.0).abs() < f64::EPSILON);
        assert!(select_best(&mut NativeStrategy(by_name), &[]).is_none());
    }

    #[test]
    fn strict_native_pick_reports_evaluator_errors() {
        let all = targets(&["p1", "p4", "p2"]);
        let pick = select_native_strict(&mut by_name, &all)
            .expect("infallible evaluator")
            .expect("non-empty");
        assert_eq!(pick.index, 2);

        let mut broken = Fallible(|_: &Candidate, _: &[Candidate]| -> std::result::Result<f64, EvalError> {
            Err(EvalError::new("no card data"))
        });
        let err = select_native_strict(&mut broken, &all).expect_err("evaluator fails");
        assert!(matches!(err, veer_core::VeerError::Evaluator(_)));
    }

    #[test]
    fn untracked_player_keeps_native_choice() {
        let mut session = Session::new(VeerConfig::default());
        session.add_agent(id("bot"), AgentOptions::untracked());
        let pick = choose_target(&mut session, &id("bot"), &[id("p1"), id("p2")], by_name, &NeutralOracle);
        assert_eq!(pick, Some(id("p2")));
        assert_eq!(session.counters().decisions_bypassed, 2);
    }

    #[test]
    fn rescue_is_declined_only_after_own_attack() {
        let mut session = Session::new(VeerConfig::default());
        for raw in ["p1", "p2"] {
            session.add_agent(id(raw), AgentOptions::tracked());
        }
        session.start_game();
        assert!(resolve_rescue(&session, &id("p1"), &[id("p2")], true));

        session.dispatch(&GameEvent::new(
            EventId(1),
            EventKind::CardTargeted {
                actor: id("p1"),
                target: id("p2"),
                card_name: "sha".into(),
                target_count: 1,
                group_target: false,
                damage_tag: true,
            },
        ));
        assert!(!resolve_rescue(&session, &id("p1"), &[id("p2")], true));
        assert!(!resolve_rescue(&session, &id("p1"), &[id("p2")], false));
        assert!(resolve_rescue(&session, &id("p1"), &[id("p3")], true));

        session.dispatch(&GameEvent::new(EventId(2), EventKind::CardUseFinished { actor: id("p1") }));
        assert!(resolve_rescue(&session, &id("p1"), &[id("p2")], true));
    }
}
