//! Grudge, rage and faction evidence writers.
//!
//! These functions are the designated writers for hostility signals. The
//! scoring pipeline only ever reads what they produce.

use crate::events::touches_open_zones;
use crate::memory::AgentMemory;
use crate::persona::Persona;
use crate::types::{AgentId, CardInfo, Faction, finite_or_zero};

const RAGE_PER_DAMAGE: f64 = 1.4;
const RAGE_TOWARDS_PER_DAMAGE: f64 = 1.9;
const RAGE_PER_CARD_TAKEN: f64 = 0.9;
const RAGE_TOWARDS_PER_CARD_TAKEN: f64 = 1.2;
const OPEN_ZONE_FACTOR: f64 = 1.2;
const RAGE_CALM_PER_HEAL: f64 = 1.0;

/// The victim was damaged by `num`, optionally by `source`.
pub fn on_damage_received(
    memory: &mut AgentMemory,
    persona: &Persona,
    victim: &AgentId,
    source: Option<&AgentId>,
    num: f64,
) {
    let num = finite_or_zero(num);
    if num <= 0.0 {
        return;
    }
    let gain = persona.id.rage_gain();
    memory.add_rage(num * RAGE_PER_DAMAGE * gain);

    if let Some(source) = source.filter(|s| *s != victim) {
        memory.add_grudge(source, num * persona.traits.revenge_weight);
        memory.add_rage_towards(source, num * RAGE_TOWARDS_PER_DAMAGE * gain);
    }
}

/// `actor` dismantled or stole `cards` from the victim.
#[allow(clippy::cast_precision_loss)]
pub fn on_cards_taken(
    memory: &mut AgentMemory,
    persona: &Persona,
    victim: &AgentId,
    actor: &AgentId,
    cards: &[CardInfo],
) {
    if cards.is_empty() || actor == victim {
        return;
    }
    let pos = if touches_open_zones(cards) {
        OPEN_ZONE_FACTOR
    } else {
        1.0
    };
    let n = cards.len() as f64;
    let gain = persona.id.rage_gain();
    memory.add_rage(n * RAGE_PER_CARD_TAKEN * pos * gain);
    memory.add_rage_towards(actor, n * RAGE_TOWARDS_PER_CARD_TAKEN * pos * gain);
}

/// The agent recovered `heal` HP. Only global rage calms down.
pub fn on_recovered(memory: &mut AgentMemory, persona: &Persona, heal: f64) {
    let heal = finite_or_zero(heal);
    if heal <= 0.0 {
        return;
    }
    memory.add_rage(-heal * RAGE_CALM_PER_HEAL * persona.id.rage_calm());
}

/// An observer saw `source` damage the lord by `num`.
pub fn on_lord_damaged(memory: &mut AgentMemory, observer: Faction, source: &AgentId, num: f64) {
    let num = finite_or_zero(num);
    if num <= 0.0 {
        return;
    }
    let amount = 0.8 + num * 0.3;
    let sign = match observer {
        Faction::Lord => -1.0,
        Faction::Rebel => 1.0,
        Faction::Other => -0.2,
    };
    memory.add_evidence(source, sign * amount);
    memory.add_faction_signal(source, -amount);
}

/// An observer saw `source` heal the lord by `num`.
pub fn on_lord_healed(memory: &mut AgentMemory, observer: Faction, source: &AgentId, num: f64) {
    let num = finite_or_zero(num);
    if num <= 0.0 {
        return;
    }
    let sign = match observer {
        Faction::Lord => 1.0,
        Faction::Rebel => -0.4,
        Faction::Other => 0.2,
    };
    memory.add_evidence(source, sign * 0.8);
    memory.add_faction_signal(source, 0.8 * num);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaId;
    use crate::types::Zone;

    fn id(raw: &str) -> AgentId {
        AgentId::parse(raw).expect("valid id")
    }

    #[test]
    fn damage_builds_grudge_and_rage() {
        let petty = Persona::new(PersonaId::Petty);
        let mut mem = AgentMemory::new();
        let (a, b) = (id("a"), id("b"));
        on_damage_received(&mut mem, &petty, &a, Some(&b), 2.0);
        assert!((mem.grudge.get(&b) - 4.4).abs() < 1e-9);
        assert!((mem.rage - 2.0 * 1.4 * 1.05).abs() < 1e-9);
        assert!((mem.rage_towards.get(&b) - 2.0 * 1.9 * 1.05).abs() < 1e-9);
    }

    #[test]
    fn self_damage_only_raises_global_rage() {
        let p = Persona::default();
        let mut mem = AgentMemory::new();
        let a = id("a");
        on_damage_received(&mut mem, &p, &a, Some(&a), 1.0);
        assert!(mem.grudge.is_empty());
        assert!((mem.rage - 1.4).abs() < 1e-9);
    }

    #[test]
    fn taking_equipment_angers_more() {
        let p = Persona::default();
        let (a, b) = (id("a"), id("b"));
        let mut hand = AgentMemory::new();
        on_cards_taken(&mut hand, &p, &a, &b, &[CardInfo::new("1", "shan", Zone::Hand)]);
        let mut equip = AgentMemory::new();
        on_cards_taken(&mut equip, &p, &a, &b, &[CardInfo::new("2", "bagua", Zone::Equipment)]);
        assert!((hand.rage - 0.9).abs() < 1e-9);
        assert!((equip.rage - 0.9 * 1.2).abs() < 1e-9);
        assert!((equip.rage_towards.get(&b) - 1.2 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn healing_calms_rage_but_not_below_zero() {
        let p = Persona::new(PersonaId::Impulsive);
        let mut mem = AgentMemory::new();
        mem.add_rage(1.0);
        on_recovered(&mut mem, &p, 5.0);
        assert_eq!(mem.rage, 0.0);
    }

    #[test]
    fn lord_signals_depend_on_observer_faction() {
        let b = id("b");
        let mut loyal = AgentMemory::new();
        on_lord_damaged(&mut loyal, Faction::Lord, &b, 2.0);
        assert!((loyal.evidence.get(&b) + 1.4).abs() < 1e-9);
        assert!((loyal.faction_signal.get(&b) + 1.4).abs() < 1e-9);
        assert!((loyal.faction_harm.get(&b) - 1.4).abs() < 1e-9);

        let mut rebel = AgentMemory::new();
        on_lord_healed(&mut rebel, Faction::Rebel, &b, 1.0);
        assert!((rebel.evidence.get(&b) + 0.32).abs() < 1e-9);
        assert!((rebel.faction_help.get(&b) - 0.8).abs() < 1e-9);
    }
}
