//! # veer-host: Host-Engine Integration for Veer
//!
//! This crate sits between a card-game engine and the game-agnostic
//! `veer-core` library.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               Host engine                 │
//! │  ┌────────────────────────────────────┐  │
//! │  │            veer-host               │  │
//! │  │  ┌──────────────┐ ┌─────────────┐  │  │
//! │  │  │ events/hooks │ │   bridge    │  │  │
//! │  │  └──────┬───────┘ └──────┬──────┘  │  │
//! │  │         │ GameEvent      │ scores  │  │
//! │  │         ▼                ▼         │  │
//! │  │    ┌──────────────────────────┐    │  │
//! │  │    │        veer-core         │    │  │
//! │  │    └──────────────────────────┘    │  │
//! │  └────────────────────────────────────┘  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `events`: arena of the engine's parent-linked events, causal chains
//! - `hooks`: one builder per engine event, producing `GameEvent`s
//! - `systems`: batched dispatch into a session
//! - `bridge`: candidate selection through a `ScoringStrategy`, rescue override
//! - `plugins`: example score hooks built on the public bus surface
//! - `config`: host option keys, config files, tracing setup

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod config;
pub mod events;
pub mod hooks;
pub mod plugins;
pub mod systems;
