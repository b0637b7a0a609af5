// Prometheus metrics definitions for the battle backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Battles currently in progress.
    pub static ref ACTIVE_BATTLES: IntGauge =
        IntGauge::new("battle_active_battles", "Battles currently in progress").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total battles created.
    pub static ref BATTLES_CREATED_TOTAL: IntCounter =
        IntCounter::new("battle_battles_created_total", "Total battles created").unwrap();

    /// Total battles that reached the completed state.
    pub static ref BATTLES_COMPLETED_TOTAL: IntCounter = IntCounter::new(
        "battle_battles_completed_total",
        "Total battles completed",
    )
    .unwrap();

    /// Total answers submitted, by outcome (correct, incorrect, duplicate).
    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("battle_answers_submitted_total", "Total answers submitted"),
        &["outcome"],
    )
    .unwrap();

    /// Total solve races won (XP credited).
    pub static ref SOLVE_RACE_WINS_TOTAL: IntCounter = IntCounter::new(
        "battle_solve_race_wins_total",
        "Questions credited to a first correct answerer",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Self-reported per-question answer time in seconds.
    pub static ref ANSWER_TIME_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "battle_answer_time_seconds",
            "Self-reported per-question answer time in seconds",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_BATTLES.clone()),
        Box::new(BATTLES_CREATED_TOTAL.clone()),
        Box::new(BATTLES_COMPLETED_TOTAL.clone()),
        Box::new(ANSWERS_SUBMITTED_TOTAL.clone()),
        Box::new(SOLVE_RACE_WINS_TOTAL.clone()),
        Box::new(ANSWER_TIME_SECONDS.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        let output = gather_metrics();
        assert!(output.is_empty() || output.contains("battle_"));
    }

    #[test]
    fn test_metric_increments() {
        ACTIVE_BATTLES.set(2);
        assert_eq!(ACTIVE_BATTLES.get(), 2);
        ACTIVE_BATTLES.set(0);

        BATTLES_CREATED_TOTAL.inc();
        BATTLES_COMPLETED_TOTAL.inc();
        SOLVE_RACE_WINS_TOTAL.inc();
        ANSWERS_SUBMITTED_TOTAL.with_label_values(&["correct"]).inc();
        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&["incorrect"])
            .inc();
        ANSWER_TIME_SECONDS.observe(4.0);
    }
}
