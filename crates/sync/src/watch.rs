#![forbid(unsafe_code)]

use crate::config::WatchConfig;
use crate::engine::SyncEngine;
use crate::resolver::Strategy;
use crate::support::now_ms;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Time source for the watch loop; injected so tests never sleep.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(multiplier).min(self.max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchOptions {
    pub interval: Duration,
    pub strategy: Strategy,
    pub stop_on_error: bool,
    /// Consecutive failing cycles before backoff replaces the interval.
    pub failure_threshold: u32,
    pub backoff: BackoffPolicy,
    /// Stop after this many cycles; `None` runs until interrupted.
    pub max_cycles: Option<u64>,
}

impl WatchOptions {
    pub fn from_config(config: &WatchConfig, strategy: Strategy) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            strategy,
            stop_on_error: config.stop_on_error,
            failure_threshold: config.failure_threshold,
            backoff: BackoffPolicy {
                base: Duration::from_millis(config.backoff_base_ms),
                max: Duration::from_millis(config.backoff_max_ms),
            },
            max_cycles: None,
        }
    }

    pub fn stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    Interrupted,
    StopOnError,
    MaxCycles,
}

/// Counters reported when the loop exits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub synced: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub skipped: usize,
    pub consecutive_errors: u32,
    pub backoff_attempt: u32,
    pub started_at_ms: i64,
    pub finished_at_ms: i64,
    pub stop: StopReason,
}

/// Repeats full syncs of every mapped entity. Cycles never overlap: the wait
/// for the next cycle starts only after the previous one has finished.
pub struct WatchLoop<'a> {
    engine: &'a SyncEngine,
    clock: &'a dyn Clock,
    options: WatchOptions,
}

impl<'a> WatchLoop<'a> {
    pub fn new(engine: &'a SyncEngine, clock: &'a dyn Clock, options: WatchOptions) -> Self {
        Self {
            engine,
            clock,
            options,
        }
    }

    /// Runs until `running` is cleared, a failing cycle with `stop_on_error`, or
    /// `max_cycles`. `running` is checked between cycles only.
    pub fn run(&self, running: &AtomicBool) -> WatchSummary {
        let opts = &self.options;
        let mut summary = WatchSummary {
            started_at_ms: self.clock.now_ms(),
            ..WatchSummary::default()
        };
        info!(
            interval_secs = opts.interval.as_secs(),
            strategy = %opts.strategy,
            stop_on_error = opts.stop_on_error,
            "watch started"
        );

        loop {
            if !running.load(Ordering::SeqCst) {
                summary.stop = StopReason::Interrupted;
                break;
            }

            let (cycle_failed, rate_limited) = match self.engine.sync_mapped(opts.strategy, false) {
                Ok(report) => {
                    summary.synced += report.synced.len();
                    summary.conflicts += report.conflicts.len();
                    summary.failed += report.failed.len();
                    summary.skipped += report.skipped.len();
                    (report.has_failures(), report.rate_limited())
                }
                Err(err) => {
                    warn!(error = %err, "watch cycle could not start");
                    (true, err.is_rate_limited())
                }
            };
            summary.cycles += 1;
            if cycle_failed {
                summary.failed_cycles += 1;
                summary.consecutive_errors += 1;
            } else {
                summary.consecutive_errors = 0;
                summary.backoff_attempt = 0;
            }
            info!(
                cycle = summary.cycles,
                failed = cycle_failed,
                consecutive_errors = summary.consecutive_errors,
                "watch cycle finished"
            );

            if cycle_failed && opts.stop_on_error {
                summary.stop = StopReason::StopOnError;
                break;
            }
            if opts.max_cycles.is_some_and(|max| summary.cycles >= max) {
                summary.stop = StopReason::MaxCycles;
                break;
            }

            let delay = if rate_limited || summary.consecutive_errors >= opts.failure_threshold {
                let delay = opts.backoff.delay(summary.backoff_attempt);
                warn!(
                    attempt = summary.backoff_attempt,
                    delay_ms = delay.as_millis() as u64,
                    rate_limited,
                    "backing off"
                );
                summary.backoff_attempt = summary.backoff_attempt.saturating_add(1);
                delay
            } else {
                opts.interval
            };
            self.clock.sleep(delay);
        }

        summary.finished_at_ms = self.clock.now_ms();
        info!(cycles = summary.cycles, stop = ?summary.stop, "watch stopped");
        summary
    }
}
