//! In-process performance monitor and sequential self-test harness.
//!
//! Two independent pieces:
//! - [`timeit`] runs a callable between two [`clock`] samples and reports
//!   wall time, CPU time, cycles and CPU utilization.
//! - [`Harness`] structures small test programs into functions and cases,
//!   counts failed checks, and recovers from a failing check at the next
//!   case boundary.
//!
//! ```no_run
//! use pmu::{pmu_check, Harness};
//!
//! fn sum(a: u32, b: u32) -> u32 {
//!     a + b
//! }
//!
//! let mut h = Harness::new();
//! let verdict = h
//!     .test("sum_test", |h| {
//!         h.case("nonzero", |h| pmu_check!(h, sum(1, 2) == 3))?;
//!         h.case("zero", |h| pmu_check!(h, sum(0, 0) == 0))?;
//!         Ok(())
//!     })
//!     .unwrap();
//! assert!(verdict.is_pass());
//!
//! let timing = pmu::timeit::measure(|| {
//!     std::hint::black_box((0..1_000_000u64).sum::<u64>());
//! });
//! println!("{}", timing);
//! ```

pub mod assertion;
pub mod clock;
pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod report;
pub mod resource;
pub mod signal;
pub mod timeit;

pub use assertion::FailureRecord;
pub use clock::ClockSample;
pub use config::HarnessConfig;
pub use error::{HarnessError, ReportError};
pub use harness::{CaseSummary, Harness, Phase, PileRecord, TestContext, Verdict};
pub use signal::{ErrorSignal, MissingRecoveryPoint, Outcome, Raised, RecoveryPoint};
pub use timeit::TimingResult;
