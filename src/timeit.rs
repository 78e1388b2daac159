//! Timed-run evaluator: run a callable once between two clock samples.

use crate::clock::{self, ClockSample};
use std::fmt;

/// Deltas between two clock samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingResult {
    /// Elapsed wall-clock seconds.
    pub wall_seconds: f64,
    /// CPU seconds, user plus system.
    pub cpu_seconds: f64,
    /// CPU seconds spent in user mode.
    pub user_seconds: f64,
    /// CPU seconds spent in the kernel.
    pub system_seconds: f64,
    /// Cycle counter delta.
    pub cycles: u64,
    /// `cpu_seconds / wall_seconds * 100`, or 0 when no wall time elapsed.
    pub cpu_utilization_pct: f64,
}

impl TimingResult {
    /// Compute the result between `start` and `end`.
    pub fn between(start: &ClockSample, end: &ClockSample) -> Self {
        let wall_seconds = end.wall_time.saturating_sub(start.wall_time).as_secs_f64();
        let user_seconds = end.cpu.user.saturating_sub(start.cpu.user).as_secs_f64();
        let system_seconds = end.cpu.system.saturating_sub(start.cpu.system).as_secs_f64();
        let cpu_seconds = user_seconds + system_seconds;
        let cycles = end.cycle_count.saturating_sub(start.cycle_count);
        let cpu_utilization_pct = if wall_seconds > 0.0 {
            cpu_seconds / wall_seconds * 100.0
        } else {
            0.0
        };
        Self {
            wall_seconds,
            cpu_seconds,
            user_seconds,
            system_seconds,
            cycles,
            cpu_utilization_pct,
        }
    }

    /// Operations per wall-clock second.
    pub fn throughput(&self, operations: u64) -> f64 {
        if self.wall_seconds > 0.0 {
            operations as f64 / self.wall_seconds
        } else {
            0.0
        }
    }

    /// Average cycles spent per operation.
    pub fn cycles_per_op(&self, operations: u64) -> f64 {
        if operations > 0 {
            self.cycles as f64 / operations as f64
        } else {
            0.0
        }
    }

    /// Cycle counter rate observed over the run.
    pub fn cycles_per_second(&self) -> f64 {
        if self.wall_seconds > 0.0 {
            self.cycles as f64 / self.wall_seconds
        } else {
            0.0
        }
    }
}

impl fmt::Display for TimingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation took:")?;
        writeln!(f, "  {:.6} seconds of real time", self.wall_seconds)?;
        writeln!(
            f,
            "  {:.6} seconds of total run time ({:.6} user, {:.6} system)",
            self.cpu_seconds, self.user_seconds, self.system_seconds
        )?;
        writeln!(f, "  {:.2}% CPU", self.cpu_utilization_pct)?;
        write!(f, "  {} processor cycles", self.cycles)
    }
}

/// Run `f` exactly once and return its timing.
pub fn measure<F: FnOnce()>(f: F) -> TimingResult {
    let start = clock::sample();
    f();
    let end = clock::sample();
    finish(&start, &end)
}

/// Like [`measure`], for callables that can fail.
///
/// An error from `f` is returned as is; no timing is produced for it.
pub fn try_measure<E, F>(f: F) -> Result<TimingResult, E>
where
    F: FnOnce() -> Result<(), E>,
{
    let start = clock::sample();
    f()?;
    let end = clock::sample();
    Ok(finish(&start, &end))
}

/// Measure `f` and print the evaluation summary to stdout.
pub fn timeit<F: FnOnce()>(f: F) -> TimingResult {
    let result = measure(f);
    println!("{}", result);
    result
}

fn finish(start: &ClockSample, end: &ClockSample) -> TimingResult {
    let result = TimingResult::between(start, end);
    tracing::debug!(
        wall_seconds = result.wall_seconds,
        cpu_seconds = result.cpu_seconds,
        cycles = result.cycles,
        "timed run finished"
    );
    result
}
