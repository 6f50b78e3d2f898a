//! Property-based tests for the Veer core invariants.
//!
//! Uses `proptest` to check totality of the scoring pipeline, sign
//! preservation of the built-in corrections, latch monotonicity, the bounded
//! turn log, hook ordering and decay convergence under random inputs.

use proptest::prelude::*;

use veer_core::config::VeerConfig;
use veer_core::error::HookError;
use veer_core::events::{EventKind, GameEvent};
use veer_core::hooks::{Flow, HookBus, HookOptions};
use veer_core::memory::{SignalBounds, update};
use veer_core::oracle::NeutralOracle;
use veer_core::persona::{Persona, PersonaId};
use veer_core::scoring::{Candidate, Decision, DecisionEvent, SCORE_EVENT, ScoreContext, ScoreKind};
use veer_core::session::{AgentOptions, Session, SessionState};
use veer_core::stats::{AgentStats, Thresholds};
use veer_core::turn_log::{MAX_TURN_EVENTS, TurnMemory, turn_event_for};
use veer_core::types::{AgentId, CardInfo, EventId, Zone};

fn id(raw: &str) -> AgentId {
    AgentId::parse(raw).expect("valid id")
}

fn session(persona: PersonaId, seed: u64) -> Session {
    let mut cfg = VeerConfig::default();
    cfg.session.seed = Some(seed);
    let mut s = Session::new(cfg);
    s.add_agent(id("a"), AgentOptions::tracked().persona(Persona::new(persona)));
    s.add_agent(id("b"), AgentOptions::tracked());
    s.start_game();
    s
}

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum HandlerOp {
    Add(f64),
    Scale(f64),
    SetNan,
    SetInfinite,
    Fail,
    Panic,
    Replace(f64),
    SkipBuiltin,
}

fn arb_handler() -> impl Strategy<Value = (HandlerOp, i32)> {
    let op = prop_oneof![
        (-1e6..1e6f64).prop_map(HandlerOp::Add),
        (-1e3..1e3f64).prop_map(HandlerOp::Scale),
        Just(HandlerOp::SetNan),
        Just(HandlerOp::SetInfinite),
        Just(HandlerOp::Fail),
        Just(HandlerOp::Panic),
        (-1e6..1e6f64).prop_map(HandlerOp::Replace),
        Just(HandlerOp::SkipBuiltin),
    ];
    (op, -5..5i32)
}

fn install(s: &mut Session, op: HandlerOp, priority: i32) {
    s.hooks_mut().on(
        SCORE_EVENT,
        move |ctx: &mut ScoreContext, _: &SessionState| match op {
            HandlerOp::Add(v) => {
                ctx.score += v;
                Ok(Flow::Continue)
            }
            HandlerOp::Scale(v) => {
                ctx.score *= v;
                Ok(Flow::Continue)
            }
            HandlerOp::SetNan => {
                ctx.score = f64::NAN;
                Ok(Flow::Continue)
            }
            HandlerOp::SetInfinite => {
                ctx.score = f64::NEG_INFINITY;
                Ok(Flow::Continue)
            }
            HandlerOp::Fail => Err(HookError::new("refused")),
            HandlerOp::Panic => panic!("handler bug"),
            HandlerOp::Replace(v) => {
                let mut next = ctx.clone();
                next.score = v;
                Ok(Flow::Replace(next))
            }
            HandlerOp::SkipBuiltin => {
                ctx.skip_builtin = true;
                Ok(Flow::Continue)
            }
        },
        HookOptions::priority(priority),
    );
}

fn arb_native() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1e9..1e9f64,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

// ---------------------------------------------------------------------------
// Property: the pipeline always returns a finite number
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn scoring_is_total(
        handlers in prop::collection::vec(arb_handler(), 0..8),
        native in arb_native(),
        petty in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let persona = if petty { PersonaId::Petty } else { PersonaId::Impulsive };
        let mut s = session(persona, seed);
        for (op, priority) in handlers {
            install(&mut s, op, priority);
        }
        let d = Decision::new(ScoreKind::ChooseTarget, id("a"));
        let mut eval = |_: &Candidate, _: &[Candidate]| native;
        let all = [Candidate::target(id("b"))];
        let score = s.score(&d, &all[0], &all, &mut eval, &NeutralOracle);
        prop_assert!(score.is_finite());
    }
}

// ---------------------------------------------------------------------------
// Property: guard and noise never fabricate positive incentive
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn corrections_preserve_sign(base in -100.0..100.0f64, blind in any::<bool>(), seed in any::<u64>()) {
        let mut s = session(PersonaId::Impulsive, seed);
        let mut d = Decision::new(ScoreKind::ChooseButton, id("a"));
        if blind {
            d = d.with_event(DecisionEvent {
                name: "discardPlayerCard".into(),
                target: Some(id("b")),
                position: "h".into(),
                visible: false,
            });
        }
        let c = Candidate::card_button(CardInfo::new("1", "shan", Zone::Hand));
        let mut eval = |_: &Candidate, _: &[Candidate]| base;
        let score = s.score(&d, &c, &[], &mut eval, &NeutralOracle);

        let randomness = Persona::new(PersonaId::Impulsive).traits.randomness;
        let bound = 0.5 * randomness * s.config().scoring.noise_scale;
        if base <= 0.0 {
            prop_assert!((score - base).abs() < 1e-12);
        } else {
            prop_assert!(score >= -bound);
            if !blind {
                prop_assert!((score - base).abs() <= bound + 1e-12);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: the output-core latch never resets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum StatOp {
    Draw(f64, bool),
    Damage(f64, bool),
    Roll,
}

fn arb_stat_op() -> impl Strategy<Value = StatOp> {
    prop_oneof![
        (-2.0..6.0f64, any::<bool>()).prop_map(|(n, own)| StatOp::Draw(n, own)),
        (-2.0..4.0f64, any::<bool>()).prop_map(|(n, own)| StatOp::Damage(n, own)),
        Just(StatOp::Roll),
    ]
}

proptest! {
    #[test]
    fn latch_is_monotonic(ops in prop::collection::vec(arb_stat_op(), 1..60)) {
        let t = Thresholds::default();
        let mut stats = AgentStats::default();
        let mut latched = false;
        for op in ops {
            match op {
                StatOp::Draw(n, own) => { stats.add_draw(n, own, t); }
                StatOp::Damage(n, own) => { stats.add_damage(n, own, t); }
                StatOp::Roll => stats.roll_window(),
            }
            if latched {
                prop_assert!(stats.output_core);
            }
            latched = stats.output_core;
        }
    }
}

// ---------------------------------------------------------------------------
// Property: the turn log is bounded and keeps the newest events
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn turn_log_is_bounded(
        amounts in prop::collection::vec(0.5..50.0f64, 0..300),
        max_events in 0..500usize,
    ) {
        let mut cfg = VeerConfig::default();
        cfg.turn_log.max_events = max_events;
        let bound = cfg.sanitized().turn_log.max_events;
        prop_assert!((1..=MAX_TURN_EVENTS).contains(&bound));

        let mut log = TurnMemory::default();
        let mut raw = TurnMemory::default();
        for (i, num) in amounts.iter().enumerate() {
            let event = GameEvent::new(
                EventId(i as u64),
                EventKind::Damage { source: Some(id("b")), target: id("a"), num: *num, card: None },
            );
            let turn_event = turn_event_for(&event, 12).expect("positive amount qualifies");
            log.push(turn_event.clone(), bound);
            raw.push(turn_event, max_events);
        }
        prop_assert!(log.len() <= MAX_TURN_EVENTS);
        prop_assert!(raw.len() <= MAX_TURN_EVENTS);
        let keep = amounts.len().min(bound);
        prop_assert_eq!(log.len(), keep);
        let expected = &amounts[amounts.len() - keep..];
        for (kept, want) in log.iter().zip(expected) {
            prop_assert!((kept.num - want).abs() < f64::EPSILON);
        }
    }
}

// ---------------------------------------------------------------------------
// Property: handlers run in descending priority, ties in registration order
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn handlers_run_in_priority_order(
        priorities in prop::collection::vec(-10..10i32, 1..12),
        once_mask in any::<u16>(),
    ) {
        let mut bus: HookBus<Vec<usize>> = HookBus::new();
        for (i, p) in priorities.iter().enumerate() {
            let mut options = HookOptions::priority(*p);
            if once_mask & (1 << i) != 0 {
                options = options.once();
            }
            bus.on("tick", move |seen: &mut Vec<usize>, _: &()| {
                seen.push(i);
                Ok(Flow::Continue)
            }, options);
        }

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|i| std::cmp::Reverse(priorities[*i]));
        prop_assert_eq!(bus.emit("tick", Vec::new(), &()), expected.clone());

        let repeat: Vec<usize> = expected
            .into_iter()
            .filter(|i| once_mask & (1 << i) == 0)
            .collect();
        prop_assert_eq!(bus.emit("tick", Vec::new(), &()), repeat);
    }
}

// ---------------------------------------------------------------------------
// Property: decay alone converges toward zero without crossing it
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn decay_converges_without_sign_flip(start in -2.0..2.0f64, decay in 0.0..1.0f64, steps in 1..100usize) {
        let mut v = update(start, 0.0, 1.0, SignalBounds::TEMPO);
        for _ in 0..steps {
            let next = update(v, 0.0, decay, SignalBounds::TEMPO);
            prop_assert!(next.abs() <= v.abs());
            prop_assert!(next == 0.0 || next.signum() == v.signum());
            v = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Property: same seed, same scores
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn seeded_sessions_score_identically(seed in any::<u64>(), bases in prop::collection::vec(0.1..10.0f64, 1..20)) {
        let run = || {
            let mut s = session(PersonaId::Impulsive, seed);
            let d = Decision::new(ScoreKind::ChooseCard, id("a"));
            let c = Candidate::Card(CardInfo::new("1", "sha", Zone::Hand));
            bases
                .iter()
                .map(|b| {
                    let mut eval = |_: &Candidate, _: &[Candidate]| *b;
                    s.score(&d, &c, &[], &mut eval, &NeutralOracle)
                })
                .collect::<Vec<_>>()
        };
        prop_assert_eq!(run(), run());
    }
}
