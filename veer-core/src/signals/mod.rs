//! Behavioral Signal Extractors.
//!
//! Each extractor turns one kind of engine event into memory writes:
//!
//! - [`recent_attack`]: a two-state marker per actor, armed by a
//!   single-target offensive card and cleared when the use resolves.
//! - [`tempo`]: a persistent per-opponent bias from how early and how often
//!   the designated repeatable action is used.
//! - [`hostility`]: grudge, rage and faction evidence from damage, healing
//!   and taken cards. These are the only writers of those signals.

pub mod hostility;
pub mod recent_attack;
pub mod tempo;

pub use recent_attack::{AttackMarker, RecentAttack, should_forbid_rescue};
pub use tempo::tempo_delta;
