//! Opt-in latency sampling for CLI commands.
//!
//! Enabled by `--timing` or `REPLYMATCH_TIMING=1`. Samples are kept per
//! thread; [`take_report`] drains them into per-operation percentiles.

use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Environment variable that switches timing on.
pub const TIMING_ENV: &str = "REPLYMATCH_TIMING";

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static SAMPLES: RefCell<Vec<(String, Duration)>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub operations: Vec<OpTiming>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpTiming {
    pub name: String,
    pub count: usize,
    #[serde(rename = "p50_us", serialize_with = "as_micros")]
    pub p50: Duration,
    #[serde(rename = "p95_us", serialize_with = "as_micros")]
    pub p95: Duration,
    #[serde(rename = "p99_us", serialize_with = "as_micros")]
    pub p99: Duration,
    #[serde(rename = "total_us", serialize_with = "as_micros")]
    pub total: Duration,
}

fn as_micros<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(value.as_micros())
}

/// True when [`TIMING_ENV`] holds `1`, `true`, `yes` or `on`.
#[must_use]
pub fn enabled_from_env() -> bool {
    std::env::var(TIMING_ENV)
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        SAMPLES.with(|samples| samples.borrow_mut().clear());
    }
}

#[must_use]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Run `f`, recording its wall time under `name` when timing is enabled.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_enabled() {
        return f();
    }

    let started = Instant::now();
    let result = f();
    record(name, started.elapsed());
    result
}

fn record(name: &str, elapsed: Duration) {
    SAMPLES.with(|samples| samples.borrow_mut().push((name.to_string(), elapsed)));
}

/// Drain this thread's samples into a report.
#[must_use]
pub fn take_report() -> TimingReport {
    let samples = SAMPLES.with(|samples| std::mem::take(&mut *samples.borrow_mut()));

    let mut grouped: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
    for (name, elapsed) in samples {
        grouped.entry(name).or_default().push(elapsed);
    }

    let operations = grouped
        .into_iter()
        .map(|(name, mut durations)| {
            durations.sort_unstable();
            OpTiming {
                count: durations.len(),
                p50: percentile(&durations, 50),
                p95: percentile(&durations, 95),
                p99: percentile(&durations, 99),
                total: durations.iter().sum(),
                name,
            }
        })
        .collect();

    TimingReport { operations }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Fixed-width table for stderr.
    #[must_use]
    pub fn table(&self) -> String {
        if self.operations.is_empty() {
            return "no timing samples recorded".to_string();
        }

        let mut out = format!(
            "{:<24} {:>6} {:>10} {:>10} {:>10}\n",
            "operation", "count", "p50", "p95", "p99"
        );
        out.push_str(&"-".repeat(64));
        out.push('\n');
        for op in &self.operations {
            out.push_str(&format!(
                "{:<24} {:>6} {:>10} {:>10} {:>10}\n",
                op.name,
                op.count,
                human(op.p50),
                human(op.p95),
                human(op.p99)
            ));
        }
        out
    }
}

/// Nearest-rank percentile over a sorted slice.
fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn human(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if micros >= 1_000 {
        format!("{:.3}ms", micros as f64 / 1_000.0)
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}
