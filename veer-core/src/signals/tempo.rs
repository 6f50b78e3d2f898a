//! Action tempo: earlier and repeated uses of the designated action during
//! an action phase suggest the actor holds more of it.

/// Signal delta for one use of `action` given the phase history so far.
///
/// `phase_history` lists the names used this action phase, oldest first,
/// and includes the current use as its last entry. Returns 0 when nothing
/// should be written.
#[must_use]
pub fn tempo_delta(phase_history: &[String], action: &str) -> f64 {
    let Some(latest) = phase_history.last() else {
        return 0.0;
    };
    if latest != action {
        return 0.0;
    }

    let progress_before = phase_history.len() - 1;
    let uses = phase_history.iter().filter(|n| *n == action).count();
    let first_use = uses <= 1;
    let consecutive = phase_history
        .len()
        .checked_sub(2)
        .is_some_and(|i| phase_history[i] == action);

    let mut delta = 0.0;
    if progress_before <= 1 {
        delta += 0.45;
    } else if progress_before <= 3 {
        delta += 0.2;
    } else if progress_before >= 6 && first_use {
        delta -= 0.15;
    }

    if consecutive {
        delta += 0.12;
    } else if uses >= 2 {
        delta += 0.08;
    }
    if uses >= 3 {
        delta += 0.08;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn opening_use_is_a_strong_signal() {
        assert!((tempo_delta(&history(&["sha"]), "sha") - 0.45).abs() < 1e-9);
    }

    #[test]
    fn consecutive_repeats_add_more() {
        let d = tempo_delta(&history(&["sha", "sha"]), "sha");
        assert!((d - (0.45 + 0.12)).abs() < 1e-9);
        let d = tempo_delta(&history(&["tao", "sha", "wuzhong", "sha", "sha"]), "sha");
        // progress 4 → no positional term; consecutive +0.12; three uses +0.08
        assert!((d - 0.20).abs() < 1e-9);
    }

    #[test]
    fn late_first_use_is_negative() {
        let d = tempo_delta(&history(&["a", "b", "c", "d", "e", "f", "sha"]), "sha");
        assert!((d + 0.15).abs() < 1e-9);
    }

    #[test]
    fn other_actions_write_nothing() {
        assert_eq!(tempo_delta(&history(&["sha", "tao"]), "sha"), 0.0);
        assert_eq!(tempo_delta(&[], "sha"), 0.0);
        // progress 4 or 5, first use, no repeat
        assert_eq!(tempo_delta(&history(&["a", "b", "c", "d", "sha"]), "sha"), 0.0);
    }
}
