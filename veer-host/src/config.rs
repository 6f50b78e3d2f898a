//! Host option keys, config files and tracing setup.
//!
//! The host stores its options as one flat object (`slqj_ai_*` keys, values
//! often stringified). [`from_host_options`] regroups those keys into the
//! sectioned shape [`VeerConfig::from_json_lenient`] reads, so the lenient
//! fallback rules stay in one place.

use std::path::Path;

use anyhow::{Context, bail};
use serde_json::{Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use veer_core::persona::PersonaId;
use veer_core::{Session, VeerConfig};

/// Prefix shared by every host option key.
pub const OPTION_PREFIX: &str = "slqj_ai_";

/// Flat key suffix → (section, field).
const FLAT_KEYS: [(&str, &str, &str); 4] = [
    ("score_noise_enable", "scoring", "score_noise_enable"),
    ("blind_handcard_random", "scoring", "blind_handcard_random"),
    ("output_core_draw_threshold", "output_core", "draw_threshold"),
    ("output_core_damage_threshold", "output_core", "damage_threshold"),
];

const PERSONA_ENABLE: &str = "persona_enable_";

fn insert(sections: &mut Map<String, Value>, section: &str, field: &str, value: Value) {
    if let Value::Object(fields) = sections
        .entry(section)
        .or_insert_with(|| Value::Object(Map::new()))
    {
        fields.insert(field.to_string(), value);
    }
}

/// Regroup the host's flat option keys into sectioned JSON.
///
/// Unknown keys are ignored. Non-object input yields an empty object.
#[must_use]
pub fn regroup_host_options(options: &Value) -> Value {
    let mut sections = Map::new();
    let Some(flat) = options.as_object() else {
        return Value::Object(sections);
    };
    for (key, value) in flat {
        let Some(suffix) = key.strip_prefix(OPTION_PREFIX) else {
            continue;
        };
        if let Some((_, section, field)) = FLAT_KEYS.iter().find(|(k, _, _)| *k == suffix) {
            insert(&mut sections, section, field, value.clone());
        } else if let Some(persona) = suffix.strip_prefix(PERSONA_ENABLE) {
            if let Some(id) = PersonaId::ALL.into_iter().find(|id| id.as_str() == persona) {
                insert(&mut sections, "persona", id.as_str(), value.clone());
            }
        }
    }
    Value::Object(sections)
}

/// Build a config from the host's flat option object. Never fails; bad
/// values keep their defaults.
#[must_use]
pub fn from_host_options(options: &Value) -> VeerConfig {
    VeerConfig::from_json_lenient(&regroup_host_options(options))
}

/// Re-read the host's option object into a live session. Call it before a
/// decision to pick up options changed mid-game; settings the object does
/// not carry keep the session's current values.
pub fn refresh_from_host_options(session: &mut Session, options: &Value) {
    let config = session
        .config()
        .clone()
        .overlay_json_lenient(&regroup_host_options(options));
    session.reconfigure(config);
}

/// Load a config file: `.toml` strictly, `.json` as flat host options.
///
/// # Errors
/// Fails when the file cannot be read, has an unknown extension, or (TOML
/// and JSON) does not parse.
pub fn load_config(path: &Path) -> anyhow::Result<VeerConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => VeerConfig::from_toml(&text).with_context(|| format!("parsing {}", path.display()))?,
        Some("json") => {
            let options: Value =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            from_host_options(&options)
        }
        other => bail!("unsupported config extension {other:?} for {}", path.display()),
    };
    info!(path = %path.display(), "Loaded veer config");
    Ok(config)
}

/// Load `path` if it exists, otherwise the defaults.
///
/// # Errors
/// Same as [`load_config`] for an existing file.
pub fn load_config_or_default(path: &Path) -> anyhow::Result<VeerConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(VeerConfig::default())
    }
}

/// Install a global `tracing` subscriber. `RUST_LOG` wins over `level`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok()
}
