//! Configuration for the Veer scoring layer.
//!
//! Loadable from `veer.toml`, or leniently from the host's shared option
//! object. Every field has a default; anything missing or malformed falls
//! back to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::{DecayPolicy, HalfLifeDecay, PersonaDecay};
use crate::persona::PersonaId;
use crate::turn_log::MAX_TURN_EVENTS;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VeerConfig {
    /// Built-in score corrections.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Output-core latch thresholds.
    #[serde(default)]
    pub output_core: OutputCoreConfig,
    /// Persona draw.
    #[serde(default)]
    pub persona: PersonaConfig,
    /// Turn event log bounds.
    #[serde(default)]
    pub turn_log: TurnLogConfig,
    /// Action-tempo tracker.
    #[serde(default)]
    pub tempo: TempoConfig,
    /// Per-own-turn decay pass.
    #[serde(default)]
    pub decay: DecayConfig,
    /// Session construction.
    #[serde(default)]
    pub session: SessionConfig,
}

impl VeerConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `VeerError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str::<Self>(toml_str)
            .map(Self::sanitized)
            .map_err(|e| crate::VeerError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Render as TOML.
    ///
    /// # Errors
    /// Returns `VeerError::Serialization` if a value cannot be represented.
    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::VeerError::Serialization(e.to_string()))
    }

    /// Read a shared host config object section by section.
    ///
    /// Missing, non-numeric and non-finite values silently keep their
    /// defaults. Numbers stored as strings (`"8"`) and booleans stored as
    /// strings or 0/1 are accepted.
    #[must_use]
    pub fn from_json_lenient(value: &Value) -> Self {
        Self::default().overlay_json_lenient(value)
    }

    /// Like [`from_json_lenient`](Self::from_json_lenient), but values absent
    /// from `value` keep what `self` already holds.
    #[must_use]
    pub fn overlay_json_lenient(self, value: &Value) -> Self {
        let mut cfg = self;
        let section = |name: &str| section_of(value, name);

        let s = section("scoring");
        lenient_bool(s, "score_noise_enable", &mut cfg.scoring.score_noise_enable);
        lenient_bool(s, "blind_handcard_random", &mut cfg.scoring.blind_handcard_random);
        lenient_f64(s, "grudge_bias_weight", &mut cfg.scoring.grudge_bias_weight);
        lenient_f64(s, "grudge_bias_cap", &mut cfg.scoring.grudge_bias_cap);
        lenient_f64(s, "noise_scale", &mut cfg.scoring.noise_scale);

        let s = section("output_core");
        lenient_f64(s, "draw_threshold", &mut cfg.output_core.draw_threshold);
        lenient_f64(s, "damage_threshold", &mut cfg.output_core.damage_threshold);

        let s = section("persona");
        for id in PersonaId::ALL {
            lenient_bool(s, id.as_str(), cfg.persona.enabled_mut(id));
        }
        let w = section_of(s, "weights");
        for id in PersonaId::ALL {
            lenient_f64(w, id.as_str(), cfg.persona.weights.get_mut(id));
        }

        let s = section("turn_log");
        lenient_usize(s, "max_events", &mut cfg.turn_log.max_events);
        lenient_usize(s, "max_cause_depth", &mut cfg.turn_log.max_cause_depth);

        let s = section("tempo");
        if let Some(name) = s.get("action_name").and_then(Value::as_str) {
            if !name.trim().is_empty() {
                cfg.tempo.action_name = name.trim().to_string();
            }
        }
        lenient_f64(s, "decay", &mut cfg.tempo.decay);

        let s = section("decay");
        if let Some(kind) = s
            .get("policy")
            .cloned()
            .and_then(|v| serde_json::from_value::<DecayPolicyKind>(v).ok())
        {
            cfg.decay.policy = kind;
        }
        lenient_f64(s, "half_life_turns", &mut cfg.decay.half_life_turns);

        if let Some(seed) = section("session").get("seed").and_then(|raw| {
            raw.as_u64()
                .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
        }) {
            cfg.session.seed = Some(seed);
        }

        cfg.sanitized()
    }

    /// Coerce invalid numbers (NaN, infinities, out-of-range) back to defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        fix(&mut self.scoring.grudge_bias_weight, d.scoring.grudge_bias_weight, |v| v >= 0.0);
        fix(&mut self.scoring.grudge_bias_cap, d.scoring.grudge_bias_cap, |v| v >= 0.0);
        fix(&mut self.scoring.noise_scale, d.scoring.noise_scale, |v| v >= 0.0);
        fix(&mut self.output_core.draw_threshold, d.output_core.draw_threshold, |_| true);
        fix(&mut self.output_core.damage_threshold, d.output_core.damage_threshold, |_| true);
        for id in PersonaId::ALL {
            fix(self.persona.weights.get_mut(id), d.persona.weights.get(id), |v| v >= 0.0);
        }
        self.turn_log.max_events = match self.turn_log.max_events {
            0 => d.turn_log.max_events,
            n => n.min(MAX_TURN_EVENTS),
        };
        if self.turn_log.max_cause_depth == 0 {
            self.turn_log.max_cause_depth = d.turn_log.max_cause_depth;
        }
        fix(&mut self.tempo.decay, d.tempo.decay, |v| (0.0..=1.0).contains(&v));
        if self.tempo.action_name.trim().is_empty() {
            self.tempo.action_name = d.tempo.action_name;
        }
        fix(&mut self.decay.half_life_turns, d.decay.half_life_turns, |v| v > 0.0);
        self
    }
}

static NULL: Value = Value::Null;

fn section_of<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).unwrap_or(&NULL)
}

fn fix(slot: &mut f64, default: f64, valid: impl Fn(f64) -> bool) {
    if !slot.is_finite() || !valid(*slot) {
        *slot = default;
    }
}

fn lenient_f64(section: &Value, key: &str, slot: &mut f64) {
    let parsed = match section.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    if let Some(v) = parsed.filter(|v| v.is_finite()) {
        *slot = v;
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_usize(section: &Value, key: &str, slot: &mut usize) {
    let mut tmp = f64::NAN;
    lenient_f64(section, key, &mut tmp);
    if tmp.is_finite() && tmp >= 1.0 {
        *slot = tmp as usize;
    }
}

fn lenient_bool(section: &Value, key: &str, slot: &mut bool) {
    let parsed = match section.get(key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
        Some(Value::String(s)) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    if let Some(b) = parsed {
        *slot = b;
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Built-in score corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Enable bounded noise for the impulsive persona.
    #[serde(default = "default_true")]
    pub score_noise_enable: bool,
    /// Randomize positive scores when picking from a concealed hand.
    #[serde(default = "default_true")]
    pub blind_handcard_random: bool,
    /// Grudge → bias multiplier.
    #[serde(default = "default_grudge_weight")]
    pub grudge_bias_weight: f64,
    /// Upper clamp of the grudge bias.
    #[serde(default = "default_grudge_cap")]
    pub grudge_bias_cap: f64,
    /// Noise amplitude multiplier on the persona's randomness trait.
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            score_noise_enable: true,
            blind_handcard_random: true,
            grudge_bias_weight: 0.12,
            grudge_bias_cap: 2.0,
            noise_scale: 0.2,
        }
    }
}

/// Output-core latch thresholds. Non-positive means "any positive amount".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCoreConfig {
    /// Draw threshold over the two-turn window.
    #[serde(default = "default_draw_threshold")]
    pub draw_threshold: f64,
    /// Damage threshold over the two-turn window.
    #[serde(default = "default_damage_threshold")]
    pub damage_threshold: f64,
}

impl Default for OutputCoreConfig {
    fn default() -> Self {
        Self {
            draw_threshold: 8.0,
            damage_threshold: 3.0,
        }
    }
}

/// Persona enable toggles and draw weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Allow `balanced`.
    #[serde(default = "default_true")]
    pub balanced: bool,
    /// Allow `impulsive`.
    #[serde(default = "default_true")]
    pub impulsive: bool,
    /// Allow `petty`.
    #[serde(default = "default_true")]
    pub petty: bool,
    /// Allow `camouflage`.
    #[serde(default)]
    pub camouflage: bool,
    /// Relative draw weights.
    #[serde(default)]
    pub weights: PersonaWeights,
}

impl PersonaConfig {
    /// Whether `id` may be drawn.
    #[must_use]
    pub fn enabled(&self, id: PersonaId) -> bool {
        match id {
            PersonaId::Balanced => self.balanced,
            PersonaId::Impulsive => self.impulsive,
            PersonaId::Petty => self.petty,
            PersonaId::Camouflage => self.camouflage,
        }
    }

    /// Mutable access to the toggle for `id`.
    pub fn enabled_mut(&mut self, id: PersonaId) -> &mut bool {
        match id {
            PersonaId::Balanced => &mut self.balanced,
            PersonaId::Impulsive => &mut self.impulsive,
            PersonaId::Petty => &mut self.petty,
            PersonaId::Camouflage => &mut self.camouflage,
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            balanced: true,
            impulsive: true,
            petty: true,
            camouflage: false,
            weights: PersonaWeights::default(),
        }
    }
}

/// Relative persona draw weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaWeights {
    /// Weight of `balanced`.
    #[serde(default = "default_w_balanced")]
    pub balanced: f64,
    /// Weight of `impulsive`.
    #[serde(default = "default_w_20")]
    pub impulsive: f64,
    /// Weight of `petty`.
    #[serde(default = "default_w_20")]
    pub petty: f64,
    /// Weight of `camouflage`.
    #[serde(default = "default_w_camouflage")]
    pub camouflage: f64,
}

impl PersonaWeights {
    /// Weight of `id`.
    #[must_use]
    pub fn get(&self, id: PersonaId) -> f64 {
        match id {
            PersonaId::Balanced => self.balanced,
            PersonaId::Impulsive => self.impulsive,
            PersonaId::Petty => self.petty,
            PersonaId::Camouflage => self.camouflage,
        }
    }

    /// Mutable access to the weight of `id`.
    pub fn get_mut(&mut self, id: PersonaId) -> &mut f64 {
        match id {
            PersonaId::Balanced => &mut self.balanced,
            PersonaId::Impulsive => &mut self.impulsive,
            PersonaId::Petty => &mut self.petty,
            PersonaId::Camouflage => &mut self.camouflage,
        }
    }
}

impl Default for PersonaWeights {
    fn default() -> Self {
        Self {
            balanced: 45.0,
            impulsive: 20.0,
            petty: 20.0,
            camouflage: 15.0,
        }
    }
}

/// Turn event log bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLogConfig {
    /// Events kept per agent per turn (oldest dropped first).
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Maximum causal-chain depth walked when resolving a causer.
    #[serde(default = "default_max_cause_depth")]
    pub max_cause_depth: usize,
}

impl Default for TurnLogConfig {
    fn default() -> Self {
        Self {
            max_events: MAX_TURN_EVENTS,
            max_cause_depth: 12,
        }
    }
}

/// Action-tempo tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Name of the designated repeatable action.
    #[serde(default = "default_action_name")]
    pub action_name: String,
    /// Decay applied to the stored signal on every observation.
    #[serde(default = "default_tempo_decay")]
    pub decay: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            action_name: "sha".to_string(),
            decay: 0.85,
        }
    }
}

/// Which per-own-turn decay policy to install.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayPolicyKind {
    /// Trait-driven rates ([`PersonaDecay`]).
    #[default]
    Persona,
    /// Single half-life for every signal ([`HalfLifeDecay`]).
    HalfLife,
}

/// Per-own-turn decay pass settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Policy to install at session construction.
    #[serde(default)]
    pub policy: DecayPolicyKind,
    /// Half-life in own turns, used by [`DecayPolicyKind::HalfLife`].
    #[serde(default = "default_half_life")]
    pub half_life_turns: f64,
}

impl DecayConfig {
    /// Build the configured policy.
    #[must_use]
    pub fn build(&self) -> Box<dyn DecayPolicy> {
        match self.policy {
            DecayPolicyKind::Persona => Box::new(PersonaDecay),
            DecayPolicyKind::HalfLife => Box::new(HalfLifeDecay::new(self.half_life_turns)),
        }
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            policy: DecayPolicyKind::Persona,
            half_life_turns: 6.0,
        }
    }
}

/// Session construction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seed for the session RNG; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_grudge_weight() -> f64 { 0.12 }
fn default_grudge_cap() -> f64 { 2.0 }
fn default_noise_scale() -> f64 { 0.2 }
fn default_draw_threshold() -> f64 { 8.0 }
fn default_damage_threshold() -> f64 { 3.0 }
fn default_w_balanced() -> f64 { 45.0 }
fn default_w_20() -> f64 { 20.0 }
fn default_w_camouflage() -> f64 { 15.0 }
fn default_max_events() -> usize { MAX_TURN_EVENTS }
fn default_max_cause_depth() -> usize { 12 }
fn default_action_name() -> String { "sha".to_string() }
fn default_tempo_decay() -> f64 { 0.85 }
fn default_half_life() -> f64 { 6.0 }
