//! # Veer Core Library
//!
//! Game-agnostic behavior-biasing layer for autonomous game-playing agents.
//!
//! The host engine keeps its own "pick the best candidate" evaluator. Veer wraps
//! it in a [`ScoringStrategy`](scoring::ScoringStrategy) and lets independent
//! plugins adjust the score through a staged pipeline:
//!
//! - **Hook Bus**: priority-ordered publish/subscribe ([`hooks`])
//! - **Memory Store**: per-agent decaying grudge / rage / impression signals ([`memory`])
//! - **Turn Event Log**: per-agent bounded log of causal events ([`turn_log`])
//! - **Signal Extractors**: recent-attack marker, action tempo, rage ([`signals`])
//! - **Output-Core Classifier**: windowed one-way latch ([`stats`])
//! - **Scoring Pipeline**: `base → builtin → final` composition ([`scoring`])
//!
//! Everything hangs off one [`Session`], constructed at game start and
//! dropped at game end. Nothing is persisted.
//!
//! ## Execution Model
//!
//! Single-threaded and synchronous. Handlers and pipeline stages run to
//! completion inside the call that triggered them; a failing handler is
//! isolated and never aborts the enclosing scoring call.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod memory;
pub mod metrics;
pub mod oracle;
pub mod persona;
pub mod scoring;
pub mod session;
pub mod signals;
pub mod stats;
pub mod turn_log;
pub mod types;

pub use config::VeerConfig;
pub use error::VeerError;
pub use events::GameEvent;
pub use hooks::HookBus;
pub use scoring::{ScoreContext, ScoringStrategy};
pub use session::Session;
pub use types::*;
