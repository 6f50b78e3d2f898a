//! Session context: one value per game.
//!
//! A [`Session`] owns the score hook bus, the agent roster with every
//! agent's persona, memory, stats and turn log, the turn clock, the RNG and
//! the counters. It is built at game start, passed by reference to every
//! core operation, and consumed by [`Session::end`]. Nothing outlives it.
//!
//! Engine events enter through [`Session::dispatch`]; scoring goes through
//! [`Session::score`] or a [`SessionStrategy`].

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, trace, trace_span, warn};

use crate::config::VeerConfig;
use crate::events::{EventKind, GameEvent};
use crate::memory::{AgentMemory, DecayPolicy, SearchHabit};
use crate::metrics::{CounterSnapshot, DecisionTimer, LatencySummary, VeerCounters, spans};
use crate::oracle::{HostOracle, IdentityOracle};
use crate::persona::Persona;
use crate::scoring::{Candidate, Decision, Evaluator, Pipeline, ScoreBus, ScoringStrategy};
use crate::signals::{self, AttackMarker, RecentAttack, hostility, recent_attack};
use crate::stats::{self, AgentStats, CoreCandidate, Thresholds};
use crate::turn_log::{self, TurnClock, TurnMemory};
use crate::types::{AgentId, Faction, SessionId, TurnId, finite_or_zero};

/// Identity label of the publicly known lord.
pub const LORD_IDENTITY: &str = "zhu";

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Registration options for [`Session::add_agent`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOptions {
    /// Whether the agent's decisions go through the pipeline.
    pub tracked: bool,
    /// Identity label, when the host knows it.
    pub identity: Option<String>,
    /// Fixed persona instead of a weighted draw.
    pub persona: Option<Persona>,
}

impl AgentOptions {
    /// A tracked (engine-controlled) agent.
    #[must_use]
    pub fn tracked() -> Self {
        Self {
            tracked: true,
            ..Self::default()
        }
    }

    /// An untracked agent (a human, or anything that bypasses the pipeline).
    #[must_use]
    pub fn untracked() -> Self {
        Self::default()
    }

    /// Set the identity label.
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Use this persona instead of rolling one.
    #[must_use]
    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = Some(persona);
        self
    }
}

/// Everything the session knows about one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Decisions go through the pipeline.
    pub tracked: bool,
    /// Still alive.
    pub alive: bool,
    /// Identity label, if known.
    pub identity: Option<String>,
    /// Persona for this session.
    pub persona: Persona,
    /// Long-lived signals.
    pub memory: AgentMemory,
    /// Own turns started this session.
    pub turns_taken: u32,
    /// Recent-attack marker.
    pub recent_attack: AttackMarker,
    /// Log for the current turn.
    pub turn_memory: TurnMemory,
    /// Draw and damage stats.
    pub stats: AgentStats,
}

impl AgentRecord {
    /// The agent's faction, from its own identity label.
    #[must_use]
    pub fn faction(&self) -> Faction {
        self.identity
            .as_deref()
            .map_or(Faction::Other, Faction::from_identity)
    }

    fn is_lord(&self) -> bool {
        self.identity.as_deref() == Some(LORD_IDENTITY)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The part of a session that hook handlers may read.
#[derive(Debug)]
pub struct SessionState {
    /// Session id.
    pub id: SessionId,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// Configuration, sanitized at construction.
    pub config: VeerConfig,
    /// Every registered agent.
    pub roster: BTreeMap<AgentId, AgentRecord>,
    /// Global turn counter.
    pub clock: TurnClock,
    /// Runtime counters.
    pub counters: VeerCounters,
    /// Per-own-turn decay policy.
    pub decay: Box<dyn DecayPolicy>,
}

impl SessionState {
    /// Look up an agent.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&AgentRecord> {
        self.roster.get(id)
    }

    /// Whether `id` is registered and tracked.
    #[must_use]
    pub fn is_tracked(&self, id: &AgentId) -> bool {
        self.roster.get(id).is_some_and(|a| a.tracked)
    }

    /// Ids of all tracked agents, in id order.
    pub fn tracked_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.roster
            .iter()
            .filter(|(_, a)| a.tracked)
            .map(|(id, _)| id)
    }

    /// The publicly known lord, if registered.
    #[must_use]
    pub fn lord(&self) -> Option<&AgentId> {
        self.roster
            .iter()
            .find(|(_, a)| a.is_lord())
            .map(|(id, _)| id)
    }
}

/// Serializable view of a session for inspection tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session id.
    pub session_id: SessionId,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Current turn.
    pub turn: TurnId,
    /// Owner of the current turn.
    pub active_agent: Option<AgentId>,
    /// Every agent.
    pub agents: BTreeMap<AgentId, AgentRecord>,
    /// Counters.
    pub counters: CounterSnapshot,
    /// Scoring latency.
    pub latency: LatencySummary,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One game's worth of behavior-biasing state.
pub struct Session {
    state: SessionState,
    bus: ScoreBus,
    rng: StdRng,
    timer: DecisionTimer,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.state.id)
            .field("agents", &self.state.roster.len())
            .field("turn", &self.state.clock.current())
            .field("hooks", &self.bus)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session. The RNG is seeded from `session.seed` when set.
    #[must_use]
    pub fn new(config: VeerConfig) -> Self {
        let config = config.sanitized();
        let rng = match config.session.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let decay = config.decay.build();
        let id = SessionId::new();
        info!(session = %id, seed = ?config.session.seed, decay = ?decay, "Session created");

        Self {
            state: SessionState {
                id,
                started_at: Utc::now(),
                config,
                roster: BTreeMap::new(),
                clock: TurnClock::new(),
                counters: VeerCounters::new(),
                decay,
            },
            bus: ScoreBus::new(),
            rng,
            timer: DecisionTimer::default(),
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.state.id
    }

    /// Read-only session state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &VeerConfig {
        &self.state.config
    }

    /// Replace the configuration mid-game.
    ///
    /// The new values apply from the next decision or event. The decay
    /// policy is rebuilt; the RNG keeps its stream, so `session.seed` only
    /// matters at construction.
    pub fn reconfigure(&mut self, config: VeerConfig) {
        let config = config.sanitized();
        if config == self.state.config {
            return;
        }
        self.state.decay = config.decay.build();
        self.state.config = config;
        info!(session = %self.state.id, decay = ?self.state.decay, "Session reconfigured");
    }

    /// Look up an agent.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&AgentRecord> {
        self.state.agent(id)
    }

    /// Look up an agent, failing for unknown ids.
    ///
    /// # Errors
    /// Returns [`VeerError::AgentNotFound`](crate::VeerError::AgentNotFound).
    pub fn require_agent(&self, id: &AgentId) -> crate::error::Result<&AgentRecord> {
        self.state
            .agent(id)
            .ok_or_else(|| crate::VeerError::AgentNotFound(id.clone()))
    }

    /// Look up an agent mutably.
    pub fn agent_mut(&mut self, id: &AgentId) -> Option<&mut AgentRecord> {
        self.state.roster.get_mut(id)
    }

    /// The score hook bus.
    #[must_use]
    pub fn hooks(&self) -> &ScoreBus {
        &self.bus
    }

    /// The score hook bus, for registering plugins.
    pub fn hooks_mut(&mut self) -> &mut ScoreBus {
        &mut self.bus
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.state.counters.snapshot()
    }

    /// Scoring latency so far.
    #[must_use]
    pub fn latency(&self) -> LatencySummary {
        self.timer.summary()
    }

    // -- roster ---------------------------------------------------------------

    /// Register an agent. Returns `false` when the id was already registered;
    /// the existing record is left untouched.
    pub fn add_agent(&mut self, id: AgentId, options: AgentOptions) -> bool {
        if self.state.roster.contains_key(&id) {
            trace!(agent = %id, "Agent already registered");
            return false;
        }

        let persona = match (options.tracked, options.persona) {
            (_, Some(persona)) => persona,
            (true, None) => Persona::roll(&self.state.config.persona, &mut self.rng),
            (false, None) => Persona::default(),
        };

        let mut memory = AgentMemory::new();
        if options.tracked {
            memory.search_habit = Some(SearchHabit::roll(persona.id, &mut self.rng));
            memory.seed_opponents(self.state.roster.keys(), &mut self.rng);
        }
        for (other_id, other) in &mut self.state.roster {
            if other.tracked && *other_id != id {
                other
                    .memory
                    .seed_opponents(std::iter::once(&id), &mut self.rng);
            }
        }

        debug!(agent = %id, tracked = options.tracked, persona = %persona.id, "Agent registered");
        self.state.roster.insert(
            id,
            AgentRecord {
                tracked: options.tracked,
                alive: true,
                identity: options.identity,
                persona,
                memory,
                turns_taken: 0,
                recent_attack: AttackMarker::default(),
                turn_memory: self.state.clock.fresh_memory(),
                stats: AgentStats::default(),
            },
        );
        true
    }

    /// Seed first impressions between all registered agents and drop memory
    /// keys for agents no longer in the roster. Existing impressions are kept.
    pub fn start_game(&mut self) {
        let ids: BTreeSet<AgentId> = self.state.roster.keys().cloned().collect();
        for (id, record) in &mut self.state.roster {
            if !record.tracked {
                continue;
            }
            record.memory.prune(|key| ids.contains(key));
            record
                .memory
                .seed_opponents(ids.iter().filter(|o| *o != id), &mut self.rng);
        }
        info!(session = %self.state.id, agents = ids.len(), "Game started");
    }

    /// Flag an agent dead. Returns `false` for unknown agents.
    pub fn mark_dead(&mut self, id: &AgentId) -> bool {
        let Some(record) = self.state.roster.get_mut(id) else {
            return false;
        };
        record.alive = false;
        record.recent_attack.clear();
        debug!(agent = %id, "Agent died");
        true
    }

    // -- scoring --------------------------------------------------------------

    /// Score one candidate for `decision.player`.
    ///
    /// Untracked or unknown agents get the native score unchanged (0 when the
    /// evaluator fails). The result is always finite.
    pub fn score<E, O>(
        &mut self,
        decision: &Decision,
        candidate: &Candidate,
        all: &[Candidate],
        evaluator: &mut E,
        oracle: &O,
    ) -> f64
    where
        E: Evaluator + ?Sized,
        O: HostOracle + ?Sized,
    {
        let _span = trace_span!(spans::SCORE, agent = %decision.player, kind = ?decision.kind).entered();
        let _timing = self.timer.start();
        let tracked = self.state.is_tracked(&decision.player);
        let mut pipeline = Pipeline {
            bus: &mut self.bus,
            state: &self.state,
            rng: &mut self.rng,
            oracle,
        };
        if !tracked {
            VeerCounters::bump(&self.state.counters.decisions_bypassed);
            return pipeline.native_score(evaluator, candidate, all);
        }
        VeerCounters::bump(&self.state.counters.decisions_scored);
        pipeline.score(decision, candidate, all, evaluator)
    }

    /// A [`ScoringStrategy`] bound to one decision.
    pub fn strategy<'s, E, O>(
        &'s mut self,
        decision: Decision,
        evaluator: E,
        oracle: &'s O,
    ) -> SessionStrategy<'s, E, O>
    where
        E: Evaluator,
        O: HostOracle + ?Sized,
    {
        SessionStrategy {
            session: self,
            decision,
            evaluator,
            oracle,
        }
    }

    // -- queries --------------------------------------------------------------

    /// Whether `agent` just attacked one of the rescue `candidates`.
    #[must_use]
    pub fn should_forbid_rescue(&self, agent: &AgentId, candidates: &[AgentId]) -> bool {
        self.state
            .agent(agent)
            .filter(|a| a.tracked)
            .is_some_and(|a| signals::should_forbid_rescue(&a.recent_attack, candidates))
    }

    /// The highest-ranked latched, alive output core of `faction`, as
    /// `observer` sees it.
    ///
    /// Factions come from the identity oracle. Without a guess, only the
    /// observer's own identity and the public lord identity are used.
    #[must_use]
    pub fn faction_output_core(
        &self,
        observer: &AgentId,
        faction: Faction,
        oracle: &dyn IdentityOracle,
    ) -> Option<&AgentId> {
        let candidates = self.state.roster.iter().map(|(id, record)| {
            let faction = match oracle.guess(observer, id) {
                Some(guess) => Faction::from_identity(&guess.identity),
                None if id == observer || record.is_lord() => record.faction(),
                None => Faction::Other,
            };
            CoreCandidate {
                id,
                stats: &record.stats,
                faction,
                alive: record.alive,
            }
        });
        stats::faction_output_core(candidates, faction)
    }

    // -- inspection -------------------------------------------------------------

    /// Serializable view of the whole session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.state.id,
            started_at: self.state.started_at,
            turn: self.state.clock.current(),
            active_agent: self.state.clock.active().cloned(),
            agents: self.state.roster.clone(),
            counters: self.counters(),
            latency: self.latency(),
        }
    }

    /// The snapshot as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`VeerError::Serialization`](crate::VeerError::Serialization)
    /// if encoding fails.
    pub fn snapshot_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| crate::VeerError::Serialization(e.to_string()))
    }

    /// End the session, returning its final snapshot.
    #[must_use]
    pub fn end(self) -> SessionSnapshot {
        let snapshot = self.snapshot();
        info!(
            session = %snapshot.session_id,
            turns = snapshot.turn.0,
            scored = snapshot.counters.decisions_scored,
            "Session ended"
        );
        snapshot
    }

    // -- dispatch -------------------------------------------------------------

    /// Route one engine event to the turn clock, turn log, output-core
    /// classifier and signal extractors. A panicking extractor is logged and
    /// skipped; the others still run.
    pub fn dispatch(&mut self, event: &GameEvent) {
        let _span = debug_span!(spans::DISPATCH, event = event.name(), id = event.id.0).entered();
        self.isolated("turn_clock", event, Self::advance_turn);
        self.isolated("turn_log", event, Self::record_turn_event);
        self.isolated("output_core", event, Self::record_stats);
        self.isolated("hostility", event, Self::record_hostility);
        self.isolated("recent_attack", event, Self::track_recent_attack);
        self.isolated("tempo", event, Self::track_tempo);
        if let EventKind::AgentDied { agent } = &event.kind {
            self.mark_dead(agent);
        }
    }

    fn isolated(&mut self, extractor: &'static str, event: &GameEvent, f: fn(&mut Self, &GameEvent)) {
        if panic::catch_unwind(AssertUnwindSafe(|| f(self, event))).is_err() {
            warn!(extractor, event = event.name(), "Signal extractor panicked");
        }
    }

    fn advance_turn(&mut self, event: &GameEvent) {
        let EventKind::PhaseBegin { player } = &event.kind else {
            return;
        };
        let SessionState {
            roster,
            clock,
            counters,
            decay,
            ..
        } = &mut self.state;
        let Some(turn) = clock.observe_anchor(event.id, player) else {
            return;
        };
        let _span = debug_span!(spans::TURN_ROLLOVER, turn = turn.0, agent = %player).entered();
        VeerCounters::bump(&counters.turn_rollovers);

        for record in roster.values_mut().filter(|r| r.tracked) {
            record.turn_memory = clock.fresh_memory();
        }

        let Some(record) = roster.get_mut(player) else {
            return;
        };
        record.stats.roll_window();
        if record.tracked {
            record.turns_taken += 1;
            let _decay = trace_span!(spans::DECAY_PASS, agent = %player).entered();
            record.memory.decay_turn(&record.persona, &**decay);
            record.persona.tick_camouflage();
        }
    }

    fn record_turn_event(&mut self, event: &GameEvent) {
        let max_depth = self.state.config.turn_log.max_cause_depth;
        let Some(turn_event) = turn_log::turn_event_for(event, max_depth) else {
            return;
        };
        let _span = trace_span!(spans::TURN_LOG, kind = ?turn_event.kind).entered();
        let max_events = self.state.config.turn_log.max_events;
        let observers = self
            .state
            .roster
            .iter_mut()
            .filter(|(_, r)| r.tracked)
            .map(|(id, r)| (id, &mut r.turn_memory));
        let out = turn_log::fan_out(&turn_event, observers, max_events);

        let counters = &self.state.counters;
        VeerCounters::add(&counters.turn_events_recorded, out.recorded);
        VeerCounters::add(&counters.turn_events_evicted, out.evicted);
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_stats(&mut self, event: &GameEvent) {
        let thresholds = Thresholds::from_config(&self.state.config.output_core);
        let max_depth = self.state.config.turn_log.max_cause_depth;
        let (agent, latched) = match &event.kind {
            EventKind::Draw {
                target, num, cards, ..
            } => {
                let explicit = finite_or_zero(*num);
                let n = if explicit > 0.0 { explicit } else { *cards as f64 };
                let own_turn = self.state.clock.is_active(target);
                let Some(record) = self.state.roster.get_mut(target) else {
                    return;
                };
                (target.clone(), record.stats.add_draw(n, own_turn, thresholds))
            }
            EventKind::Damage {
                source,
                target,
                num,
                ..
            } => {
                let Some(causer) =
                    turn_log::resolve_causer(source.as_ref(), &event.caused_by, target, max_depth)
                        .filter(|c| c != target)
                else {
                    return;
                };
                let own_turn = self.state.clock.is_active(&causer);
                let Some(record) = self.state.roster.get_mut(&causer) else {
                    return;
                };
                let latched = record.stats.add_damage(*num, own_turn, thresholds);
                (causer, latched)
            }
            _ => return,
        };
        if latched {
            VeerCounters::bump(&self.state.counters.output_core_latches);
            info!(agent = %agent, turn = %self.state.clock.current(), "Output core latched");
        }
    }

    fn record_hostility(&mut self, event: &GameEvent) {
        let max_depth = self.state.config.turn_log.max_cause_depth;
        let lord = self.state.lord().cloned();
        let roster = &mut self.state.roster;

        match &event.kind {
            EventKind::Damage {
                source,
                target,
                num,
                ..
            } => {
                let causer =
                    turn_log::resolve_causer(source.as_ref(), &event.caused_by, target, max_depth);
                if let Some(victim) = roster.get_mut(target).filter(|r| r.tracked) {
                    hostility::on_damage_received(
                        &mut victim.memory,
                        &victim.persona,
                        target,
                        causer.as_ref(),
                        *num,
                    );
                }
                if let Some(causer) = causer.filter(|c| c != target && lord.as_ref() == Some(target)) {
                    for (id, observer) in roster.iter_mut() {
                        if observer.tracked && *id != causer {
                            let faction = observer.faction();
                            hostility::on_lord_damaged(&mut observer.memory, faction, &causer, *num);
                        }
                    }
                }
            }
            EventKind::Recover {
                source,
                target,
                num,
                ..
            } => {
                if let Some(healed) = roster.get_mut(target).filter(|r| r.tracked) {
                    hostility::on_recovered(&mut healed.memory, &healed.persona, *num);
                }
                let healer =
                    turn_log::resolve_causer(source.as_ref(), &event.caused_by, target, max_depth);
                if let Some(healer) = healer.filter(|h| h != target && lord.as_ref() == Some(target)) {
                    for (id, observer) in roster.iter_mut() {
                        if observer.tracked && *id != healer {
                            let faction = observer.faction();
                            hostility::on_lord_healed(&mut observer.memory, faction, &healer, *num);
                        }
                    }
                }
            }
            EventKind::CardsTaken {
                actor,
                target,
                cards,
                ..
            } => {
                if let Some(victim) = roster.get_mut(target).filter(|r| r.tracked) {
                    hostility::on_cards_taken(
                        &mut victim.memory,
                        &victim.persona,
                        target,
                        actor,
                        cards,
                    );
                }
            }
            _ => {}
        }
    }

    fn track_recent_attack(&mut self, event: &GameEvent) {
        let turn_id = self.state.clock.current();
        match &event.kind {
            EventKind::CardTargeted {
                actor,
                target,
                card_name,
                target_count,
                group_target,
                damage_tag,
            } => {
                if actor == target
                    || !recent_attack::is_single_target_offense(
                        card_name,
                        *target_count,
                        *group_target,
                        *damage_tag,
                    )
                {
                    return;
                }
                if let Some(record) = self.state.roster.get_mut(actor).filter(|r| r.tracked) {
                    trace!(agent = %actor, target = %target, card = %card_name, "Recent attack armed");
                    record.recent_attack.arm(RecentAttack {
                        target: target.clone(),
                        card_name: card_name.trim().to_string(),
                        turn_id,
                    });
                }
            }
            EventKind::CardUseFinished { actor } => {
                if let Some(record) = self.state.roster.get_mut(actor) {
                    if record.recent_attack.clear() {
                        trace!(agent = %actor, "Recent attack cleared");
                    }
                }
            }
            _ => {}
        }
    }

    fn track_tempo(&mut self, event: &GameEvent) {
        let EventKind::CardUsed {
            actor,
            in_action_phase,
            phase_history,
            ..
        } = &event.kind
        else {
            return;
        };
        if !*in_action_phase {
            return;
        }
        let tempo = &self.state.config.tempo;
        let delta = signals::tempo_delta(phase_history, &tempo.action_name);
        if delta == 0.0 {
            return;
        }
        let turn = self.state.clock.current();
        for (id, observer) in &mut self.state.roster {
            if observer.tracked && id != actor {
                observer.memory.observe_tempo(actor, delta, tempo.decay, turn);
            }
        }
        trace!(agent = %actor, delta, "Tempo observed");
    }
}

/// [`ScoringStrategy`] for one decision, borrowing the session.
pub struct SessionStrategy<'s, E, O: ?Sized> {
    session: &'s mut Session,
    decision: Decision,
    evaluator: E,
    oracle: &'s O,
}

impl<E, O> ScoringStrategy for SessionStrategy<'_, E, O>
where
    E: Evaluator,
    O: HostOracle + ?Sized,
{
    fn evaluate(&mut self, candidate: &Candidate, all: &[Candidate]) -> f64 {
        self.session
            .score(&self.decision, candidate, all, &mut self.evaluator, self.oracle)
    }
}
