//! Runtime counters and decision-latency tracking.
//!
//! Every subsystem logs through `tracing`. This module adds cheap counters
//! that inspection tooling can snapshot, plus a small latency ring for
//! scoring calls.
//!
//! Counters are `AtomicU64` so a snapshot can be taken through a shared
//! reference; the latency ring sits behind a `parking_lot::Mutex`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Atomic counters for the hot paths.
#[derive(Debug)]
pub struct VeerCounters {
    /// Decisions that went through the full pipeline.
    pub decisions_scored: AtomicU64,
    /// Decisions for untracked agents, passed straight to the evaluator.
    pub decisions_bypassed: AtomicU64,
    /// Evaluator errors, panics and non-finite results.
    pub evaluator_failures: AtomicU64,
    /// Hook handler errors and panics.
    pub handler_failures: AtomicU64,
    /// Turn events delivered to an observer's log.
    pub turn_events_recorded: AtomicU64,
    /// Turn events dropped by the log bound.
    pub turn_events_evicted: AtomicU64,
    /// Output-core latches set.
    pub output_core_latches: AtomicU64,
    /// Global turn rollovers.
    pub turn_rollovers: AtomicU64,
}

impl VeerCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            decisions_scored: AtomicU64::new(0),
            decisions_bypassed: AtomicU64::new(0),
            evaluator_failures: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            turn_events_recorded: AtomicU64::new(0),
            turn_events_evicted: AtomicU64::new(0),
            output_core_latches: AtomicU64::new(0),
            turn_rollovers: AtomicU64::new(0),
        }
    }

    /// Add `n` to a counter.
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            decisions_scored: self.decisions_scored.load(Ordering::Relaxed),
            decisions_bypassed: self.decisions_bypassed.load(Ordering::Relaxed),
            evaluator_failures: self.evaluator_failures.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            turn_events_recorded: self.turn_events_recorded.load(Ordering::Relaxed),
            turn_events_evicted: self.turn_events_evicted.load(Ordering::Relaxed),
            output_core_latches: self.output_core_latches.load(Ordering::Relaxed),
            turn_rollovers: self.turn_rollovers.load(Ordering::Relaxed),
        }
    }
}

impl Default for VeerCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    /// Decisions scored through the pipeline.
    pub decisions_scored: u64,
    /// Decisions bypassed for untracked agents.
    pub decisions_bypassed: u64,
    /// Evaluator failures.
    pub evaluator_failures: u64,
    /// Hook handler failures.
    pub handler_failures: u64,
    /// Turn events recorded.
    pub turn_events_recorded: u64,
    /// Turn events evicted.
    pub turn_events_evicted: u64,
    /// Output-core latches.
    pub output_core_latches: u64,
    /// Turn rollovers.
    pub turn_rollovers: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows = [
            ("decisions_scored", "Decisions scored through the pipeline", self.decisions_scored),
            ("decisions_bypassed", "Decisions for untracked agents", self.decisions_bypassed),
            ("evaluator_failures", "Native evaluator failures", self.evaluator_failures),
            ("handler_failures", "Hook handler failures", self.handler_failures),
            ("turn_events_recorded", "Turn events recorded", self.turn_events_recorded),
            ("turn_events_evicted", "Turn events evicted by the bound", self.turn_events_evicted),
            ("output_core_latches", "Output-core latches set", self.output_core_latches),
            ("turn_rollovers", "Global turn rollovers", self.turn_rollovers),
        ];
        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP veer_{name}_total {help}\n# TYPE veer_{name}_total counter\nveer_{name}_total {value}\n"
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Decision latency
// ---------------------------------------------------------------------------

const LATENCY_SLOTS: usize = 256;

/// Ring of recent scoring-call timings with a soft budget.
#[derive(Debug)]
pub struct DecisionTimer {
    budget_us: f64,
    ring: Mutex<LatencyRing>,
}

#[derive(Debug)]
struct LatencyRing {
    timings: Vec<f64>,
    write_idx: usize,
    count: u64,
}

impl DecisionTimer {
    /// Create a timer with the given per-decision budget (microseconds).
    #[must_use]
    pub fn new(budget_us: f64) -> Self {
        Self {
            budget_us,
            ring: Mutex::new(LatencyRing {
                timings: vec![0.0; LATENCY_SLOTS],
                write_idx: 0,
                count: 0,
            }),
        }
    }

    /// Start timing one decision. The guard records on drop.
    pub fn start(&self) -> DecisionGuard<'_> {
        DecisionGuard {
            timer: self,
            start: Instant::now(),
        }
    }

    /// Record one timing (microseconds).
    pub fn record(&self, us: f64) {
        let mut ring = self.ring.lock();
        let idx = ring.write_idx;
        ring.timings[idx] = us;
        ring.write_idx = (idx + 1) % LATENCY_SLOTS;
        ring.count += 1;
    }

    /// Number of decisions timed.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.ring.lock().count
    }

    /// Median, p95 and max over the ring, plus the over-budget ratio.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn summary(&self) -> LatencySummary {
        let ring = self.ring.lock();
        let n = usize::try_from(ring.count).map_or(LATENCY_SLOTS, |c| c.min(LATENCY_SLOTS));
        if n == 0 {
            return LatencySummary::default();
        }
        let mut sorted = ring.timings[..n].to_vec();
        sorted.sort_by(f64::total_cmp);

        let over = sorted.iter().filter(|&&t| t > self.budget_us).count();
        LatencySummary {
            p50_us: sorted[n / 2],
            p95_us: sorted[((n as f64 * 0.95) as usize).min(n - 1)],
            max_us: sorted[n - 1],
            over_budget_ratio: over as f64 / n as f64,
        }
    }
}

impl Default for DecisionTimer {
    fn default() -> Self {
        Self::new(500.0)
    }
}

/// RAII guard that records elapsed time when dropped.
pub struct DecisionGuard<'a> {
    timer: &'a DecisionTimer,
    start: Instant,
}

impl Drop for DecisionGuard<'_> {
    fn drop(&mut self) {
        self.timer
            .record(self.start.elapsed().as_secs_f64() * 1_000_000.0);
    }
}

/// Latency statistics for scoring calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Median (µs).
    pub p50_us: f64,
    /// 95th percentile (µs).
    pub p95_us: f64,
    /// Slowest recorded (µs).
    pub max_us: f64,
    /// Fraction of decisions over budget.
    pub over_budget_ratio: f64,
}

/// Standard span names for `tracing` instrumentation.
pub mod spans {
    /// One scoring decision.
    pub const SCORE: &str = "veer::score";
    /// One dispatched engine event.
    pub const DISPATCH: &str = "veer::dispatch";
    /// Per-own-turn decay pass.
    pub const DECAY_PASS: &str = "veer::decay";
    /// Global turn rollover.
    pub const TURN_ROLLOVER: &str = "veer::turn::rollover";
    /// Turn event fan-out.
    pub const TURN_LOG: &str = "veer::turn::log";
    /// Output-core latch test.
    pub const OUTPUT_CORE: &str = "veer::output_core";
    /// Signal extractors.
    pub const SIGNALS: &str = "veer::signals";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_snapshot() {
        let c = VeerCounters::new();
        VeerCounters::bump(&c.decisions_scored);
        VeerCounters::add(&c.turn_events_recorded, 3);
        let snap = c.snapshot();
        assert_eq!(snap.decisions_scored, 1);
        assert_eq!(snap.turn_events_recorded, 3);
        assert_eq!(snap.turn_rollovers, 0);
    }

    #[test]
    fn prometheus_lists_every_counter() {
        let text = CounterSnapshot::default().to_prometheus();
        assert_eq!(text.matches("# TYPE").count(), 8);
        assert!(text.contains("veer_output_core_latches_total 0"));
    }

    #[test]
    fn timer_summarizes_recorded_values() {
        let timer = DecisionTimer::new(10.0);
        for us in [1.0, 2.0, 3.0, 50.0] {
            timer.record(us);
        }
        let s = timer.summary();
        assert_eq!(timer.count(), 4);
        assert!((s.max_us - 50.0).abs() < f64::EPSILON);
        assert!((s.over_budget_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn guard_records_on_drop() {
        let timer = DecisionTimer::default();
        drop(timer.start());
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn span_names_are_namespaced() {
        for name in [spans::SCORE, spans::DISPATCH, spans::DECAY_PASS, spans::TURN_LOG] {
            assert!(name.starts_with("veer::"));
        }
    }
}
