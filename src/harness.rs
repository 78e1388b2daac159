//! Test harness: tracks the running test function and case, counts
//! assertion failures, and owns the recovery point failures return to.
//!
//! A function runs `begin → (do_case … done)* → end`. Checks inside a case
//! return [`Outcome`]; a failing check is recorded here and its [`Raised`]
//! value is propagated with `?` until a recovery point absorbs it.
//! [`Harness::case`] gives each case its own recovery point so the next
//! case still runs; [`Harness::test`] wraps a whole function.

use crate::assertion::FailureRecord;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::signal::{ErrorSignal, MissingRecoveryPoint, Outcome, Raised};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Stderr, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static PANIC_LOCATION: RefCell<Option<(String, u32)>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

// Chains onto the existing hook and remembers where the last panic on
// this thread happened, so a recovered panic keeps its source location.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                PANIC_LOCATION.with(|slot| {
                    *slot.borrow_mut() = Some((location.file().to_owned(), location.line()));
                });
            }
            previous(info);
        }));
    });
}

/// Lifecycle of one test function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing begun yet.
    Idle,
    /// Function begun, no case run yet.
    Begun,
    /// A case is open.
    CaseActive,
    /// The last case was closed.
    CaseDone,
    /// Function ended or abandoned.
    Ended,
}

/// Pass/fail verdict of the current function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No failures recorded.
    Pass,
    /// At least one failure, or the test was abandoned.
    Fail,
}

impl Verdict {
    /// True for [`Verdict::Pass`].
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Progress of the running function and case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestContext {
    current_function_name: Option<String>,
    current_case_name: Option<String>,
    case_failure_count: u32,
    has_active_case: bool,
}

impl TestContext {
    /// Function passed to the last `begin`.
    pub fn current_function_name(&self) -> Option<&str> {
        self.current_function_name.as_deref()
    }

    /// Case currently open.
    pub fn current_case_name(&self) -> Option<&str> {
        self.current_case_name.as_deref()
    }

    /// Failures in the open case. Only meaningful while a case is active.
    pub fn case_failure_count(&self) -> u32 {
        self.case_failure_count
    }

    /// Whether a case is open.
    pub fn has_active_case(&self) -> bool {
        self.has_active_case
    }
}

/// Outcome of one closed case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSummary {
    /// Case name.
    pub name: String,
    /// Failures counted while it was open.
    pub failures: u32,
}

/// Location where a test was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PileRecord {
    /// File of the `pile` call.
    pub source_file: String,
    /// Function of the `pile` call.
    pub function_name: String,
    /// Line of the `pile` call.
    pub line_number: u32,
}

/// Sequential test harness writing diagnostics to `W`.
pub struct Harness<W: Write = Stderr> {
    config: HarnessConfig,
    out: W,
    phase: Phase,
    context: TestContext,
    cases: Vec<CaseSummary>,
    loose_failures: u32,
    placeholders: u32,
    last_failure: Option<FailureRecord>,
    #[cfg(feature = "history")]
    history: Vec<FailureRecord>,
    piled: Option<PileRecord>,
    signal: ErrorSignal,
}

impl Harness<Stderr> {
    /// Harness writing to stderr, configured from the environment.
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::from_env(), io::stderr())
    }
}

impl Default for Harness<Stderr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Harness<W> {
    /// Harness writing to `out` with default settings.
    pub fn with_writer(out: W) -> Self {
        Self::with_config(HarnessConfig::default(), out)
    }

    /// Harness writing to `out` with `config`.
    pub fn with_config(config: HarnessConfig, out: W) -> Self {
        Self {
            config,
            out,
            phase: Phase::Idle,
            context: TestContext::default(),
            cases: Vec::new(),
            loose_failures: 0,
            placeholders: 0,
            last_failure: None,
            #[cfg(feature = "history")]
            history: Vec::new(),
            piled: None,
            signal: ErrorSignal::new(),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Function and case progress.
    pub fn context(&self) -> &TestContext {
        &self.context
    }

    /// Cases closed since the last `begin`.
    pub fn cases(&self) -> &[CaseSummary] {
        &self.cases
    }

    /// Most recent assertion failure. Earlier ones are overwritten.
    pub fn last_failure(&self) -> Option<&FailureRecord> {
        self.last_failure.as_ref()
    }

    /// Every failure recorded since the last `begin`.
    #[cfg(feature = "history")]
    pub fn failure_history(&self) -> &[FailureRecord] {
        &self.history
    }

    /// Where the test was abandoned, if it was.
    pub fn piled(&self) -> Option<&PileRecord> {
        self.piled.as_ref()
    }

    /// Placeholder markers emitted since the last `begin`.
    pub fn placeholders(&self) -> u32 {
        self.placeholders
    }

    /// Error signal holding the live recovery point.
    pub fn signal(&self) -> &ErrorSignal {
        &self.signal
    }

    /// Diagnostic writer.
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Consume the harness, returning its writer.
    pub fn into_writer(self) -> W {
        self.out
    }

    /// Start a test function and register its recovery point.
    pub fn begin(&mut self, function_name: &str) -> Result<(), HarnessError> {
        match self.phase {
            Phase::Idle | Phase::Ended => {}
            Phase::Begun | Phase::CaseActive | Phase::CaseDone => {
                let active = self.context.current_function_name.clone().unwrap_or_default();
                tracing::error!(%active, requested = function_name, "nested begin rejected");
                return Err(HarnessError::NestedBegin {
                    active,
                    requested: function_name.to_owned(),
                });
            }
        }

        self.context = TestContext {
            current_function_name: Some(function_name.to_owned()),
            ..TestContext::default()
        };
        self.cases.clear();
        self.loose_failures = 0;
        self.placeholders = 0;
        self.last_failure = None;
        #[cfg(feature = "history")]
        self.history.clear();
        self.piled = None;
        self.signal.register_recovery_point();
        self.phase = Phase::Begun;

        tracing::debug!(function = function_name, "test begun");
        self.emit(format_args!("{}\n", function_name));
        Ok(())
    }

    /// Open a case, resetting its failure count.
    pub fn do_case(&mut self, case_name: &str) {
        match self.phase {
            Phase::Begun | Phase::CaseDone => {}
            Phase::CaseActive => {
                tracing::warn!(
                    open = self.context.current_case_name().unwrap_or_default(),
                    next = case_name,
                    "case opened before the previous one was done; closing it"
                );
                self.done();
            }
            Phase::Idle | Phase::Ended => {
                tracing::warn!(case = case_name, "case opened outside begin/end; ignored");
                return;
            }
        }

        self.context.current_case_name = Some(case_name.to_owned());
        self.context.case_failure_count = 0;
        self.context.has_active_case = true;
        self.phase = Phase::CaseActive;

        tracing::debug!(case = case_name, "case opened");
        if !self.config.quiet {
            self.emit(format_args!("  case {} ...\n", case_name));
        }
    }

    /// Mark a case as intentionally left unimplemented.
    pub fn placeholder(&mut self) {
        self.placeholders += 1;
        let case = self.context.current_case_name.clone();
        match case {
            Some(case) => self.emit(format_args!("  [placeholder] {}\n", case)),
            None => self.emit(format_args!("  [placeholder]\n")),
        }
    }

    /// Close the open case and report its failure count.
    ///
    /// Returns `None`, with a warning, when no case is open.
    pub fn done(&mut self) -> Option<u32> {
        if !self.context.has_active_case {
            tracing::warn!("done called without an active case");
            return None;
        }

        let failures = self.context.case_failure_count;
        let name = self.context.current_case_name.take().unwrap_or_default();
        self.context.has_active_case = false;
        self.phase = Phase::CaseDone;

        tracing::debug!(case = %name, failures, "case done");
        let status = if failures == 0 { "ok" } else { "FAILED" };
        self.emit(format_args!(
            "  case {}: {} failure(s) [{}]\n",
            name, failures, status
        ));
        self.cases.push(CaseSummary { name, failures });
        Some(failures)
    }

    /// End the function, write its summary and drop its recovery point.
    ///
    /// An open case is closed first. Returns `None` if nothing was begun
    /// or the function already ended.
    pub fn end(&mut self) -> Option<Verdict> {
        match self.phase {
            Phase::Begun | Phase::CaseDone => {}
            Phase::CaseActive => {
                self.done();
            }
            Phase::Idle | Phase::Ended => {
                tracing::warn!(phase = ?self.phase, "end called with no running function");
                return None;
            }
        }
        Some(self.finish())
    }

    /// Pass iff no failure was recorded since the last `begin` and the test
    /// was not abandoned.
    pub fn result(&self) -> Verdict {
        let case_failed = self.cases.iter().any(|case| case.failures > 0);
        let open_case_failed =
            self.context.has_active_case && self.context.case_failure_count > 0;
        if self.piled.is_some() || self.loose_failures > 0 || case_failed || open_case_failed {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    /// Abandon the running test with a failing verdict.
    ///
    /// The open case, if any, is dropped without being counted. Return the
    /// result with `Err` to leave the test body.
    pub fn pile(&mut self, source_file: &str, function_name: &str, line_number: u32) -> Raised {
        let record = PileRecord {
            source_file: source_file.to_owned(),
            function_name: function_name.to_owned(),
            line_number,
        };
        tracing::error!(file = source_file, function = function_name, line = line_number, "test abandoned");
        self.emit(format_args!(
            "  test abandoned at {}:{} in {}\n",
            source_file, line_number, function_name
        ));
        self.piled = Some(record);
        self.context.has_active_case = false;
        self.context.current_case_name = None;
        if self.phase != Phase::Ended {
            self.finish();
        }
        Raised::abandoned()
    }

    /// Check `condition`, recording and raising when it is false.
    ///
    /// A recovery point must be live; raising without one panics.
    pub fn check(
        &mut self,
        condition: bool,
        expression_text: &str,
        source_file: &str,
        function_name: &str,
        line_number: u32,
    ) -> Outcome {
        if condition {
            return Ok(());
        }
        let record = FailureRecord::new(expression_text, source_file, function_name, line_number);
        self.record_failure(record);
        Err(self.signal.raise())
    }

    /// Run `f` under a fresh recovery point.
    ///
    /// A [`Raised`] value or a panic escaping `f` is absorbed and `None`
    /// returned; a panic is recorded as a failure first. The previous
    /// recovery point is live again afterwards.
    ///
    /// A [`MissingRecoveryPoint`] panic is not absorbed: it keeps unwinding.
    pub fn recover<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut Self) -> Outcome<T>,
    {
        install_panic_hook();
        PANIC_LOCATION.with(|slot| slot.borrow_mut().take());
        let previous = self.signal.register_recovery_point();
        let caught = panic::catch_unwind(AssertUnwindSafe(|| f(self)));
        if self.phase == Phase::Ended {
            self.signal.clear();
        } else {
            self.signal.reinstate(previous);
        }

        match caught {
            Ok(Ok(value)) => Some(value),
            Ok(Err(raised)) => {
                tracing::debug!(target_point = ?raised.target(), "raised signal recovered");
                None
            }
            Err(payload) if payload.is::<MissingRecoveryPoint>() => panic::resume_unwind(payload),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let (file, line) = PANIC_LOCATION
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| ("<unknown>".to_owned(), 0));
                let function = self.context.current_function_name.clone().unwrap_or_default();
                self.record_failure(FailureRecord::new(
                    &format!("panic: {}", message),
                    &file,
                    &function,
                    line,
                ));
                None
            }
        }
    }

    /// Run one case in its own recovery point and close it.
    ///
    /// Returns the case's failure count. If the test was abandoned inside
    /// the case, or no test is running to hold it, the error leaves the
    /// enclosing body when propagated with `?`.
    pub fn case<F>(&mut self, case_name: &str, f: F) -> Outcome<u32>
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        self.do_case(case_name);
        if !self.context.has_active_case {
            return Err(Raised::abandoned());
        }
        self.recover(f);
        if self.phase == Phase::Ended {
            return Err(Raised::abandoned());
        }
        self.done().ok_or_else(Raised::abandoned)
    }

    /// Run a whole test function: begin, body, end.
    pub fn test<F>(&mut self, function_name: &str, f: F) -> Result<Verdict, HarnessError>
    where
        F: FnOnce(&mut Self) -> Outcome,
    {
        self.begin(function_name)?;
        self.recover(f);
        if self.phase != Phase::Ended {
            self.end();
        }
        Ok(self.result())
    }

    fn record_failure(&mut self, record: FailureRecord) {
        if self.context.has_active_case {
            self.context.case_failure_count += 1;
        } else {
            self.loose_failures += 1;
        }
        tracing::debug!(
            expression = %record.expression_text,
            file = %record.source_file,
            line = record.line_number,
            "assertion failed"
        );
        self.emit(format_args!("  {}\n", record));
        #[cfg(feature = "history")]
        self.history.push(record.clone());
        self.last_failure = Some(record);
    }

    fn finish(&mut self) -> Verdict {
        let verdict = self.result();
        let failed_cases = self.cases.iter().filter(|case| case.failures > 0).count();
        let case_count = self.cases.len();
        let placeholders = self.placeholders;
        let function = self.context.current_function_name.clone().unwrap_or_default();
        self.emit(format_args!(
            "{}: {} case(s), {} failed, {} placeholder(s): {}\n",
            function, case_count, failed_cases, placeholders, verdict
        ));
        self.signal.clear();
        self.phase = Phase::Ended;
        tracing::debug!(function = %function, %verdict, "test ended");
        verdict
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Err(err) = self.out.write_fmt(args) {
            tracing::warn!(error = %err, "failed to write harness output");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness() -> Harness<Vec<u8>> {
        Harness::with_writer(Vec::new())
    }

    fn output(h: &Harness<Vec<u8>>) -> String {
        String::from_utf8_lossy(h.writer()).into_owned()
    }

    #[test]
    fn passing_case_passes() {
        let mut h = harness();
        h.begin("passes").unwrap();
        h.do_case("one");
        assert!(h.check(true, "true", file!(), "passes", line!()).is_ok());
        assert_eq!(h.done(), Some(0));
        assert_eq!(h.end(), Some(Verdict::Pass));
        assert_eq!(h.phase(), Phase::Ended);
        assert!(h.result().is_pass());
    }

    #[test]
    fn failing_check_counts_and_raises() {
        let mut h = harness();
        h.begin("fails").unwrap();
        h.do_case("one");
        let raised = h.check(1 + 1 == 3, "1 + 1 == 3", "lib.rs", "fails", 9);
        assert!(raised.is_err());
        assert_eq!(h.context().case_failure_count(), 1);
        let record = h.last_failure().unwrap();
        assert_eq!(record.expression_text, "1 + 1 == 3");
        assert_eq!(record.line_number, 9);
        assert_eq!(h.done(), Some(1));
        assert_eq!(h.end(), Some(Verdict::Fail));
        assert!(output(&h).contains("assertion `1 + 1 == 3` failed at lib.rs:9 in fails"));
    }

    #[test]
    fn do_case_resets_count() {
        let mut h = harness();
        h.begin("resets").unwrap();
        h.do_case("bad");
        let _ = h.check(false, "false", "f.rs", "resets", 1);
        assert_eq!(h.context().case_failure_count(), 1);
        h.done();
        h.do_case("good");
        assert_eq!(h.context().case_failure_count(), 0);
        assert!(h.context().has_active_case());
    }

    #[test]
    fn done_without_case_is_noop() {
        let mut h = harness();
        assert_eq!(h.done(), None);
        h.begin("noop").unwrap();
        assert_eq!(h.done(), None);
        assert_eq!(h.phase(), Phase::Begun);
    }

    #[test]
    fn do_case_outside_begin_is_ignored() {
        let mut h = harness();
        h.do_case("orphan");
        assert_eq!(h.phase(), Phase::Idle);
        assert!(!h.context().has_active_case());
    }

    #[test]
    fn do_case_closes_open_case() {
        let mut h = harness();
        h.begin("overlap").unwrap();
        h.do_case("first");
        h.do_case("second");
        assert_eq!(h.cases().len(), 1);
        assert_eq!(h.cases()[0].name, "first");
        assert_eq!(h.context().current_case_name(), Some("second"));
    }

    #[test]
    fn nested_begin_fails_fast() {
        let mut h = harness();
        h.begin("outer").unwrap();
        let err = h.begin("inner").unwrap_err();
        assert_eq!(
            err,
            HarnessError::NestedBegin {
                active: "outer".to_owned(),
                requested: "inner".to_owned(),
            }
        );
        assert_eq!(h.context().current_function_name(), Some("outer"));
    }

    #[test]
    fn end_closes_open_case() {
        let mut h = harness();
        h.begin("open").unwrap();
        h.do_case("left open");
        let _ = h.check(false, "false", "f.rs", "open", 3);
        assert_eq!(h.end(), Some(Verdict::Fail));
        assert_eq!(h.cases()[0].failures, 1);
        assert_eq!(h.end(), None);
    }

    #[test]
    fn placeholder_does_not_touch_counts() {
        let mut h = harness();
        h.begin("todo").unwrap();
        h.do_case("later");
        h.placeholder();
        assert_eq!(h.context().case_failure_count(), 0);
        assert_eq!(h.placeholders(), 1);
        assert_eq!(h.done(), Some(0));
        assert_eq!(h.end(), Some(Verdict::Pass));
        assert!(output(&h).contains("[placeholder] later"));
    }

    #[test]
    fn begin_registers_and_end_clears_recovery_point() {
        let mut h = harness();
        assert!(h.signal().live().is_none());
        h.begin("points").unwrap();
        assert!(h.signal().live().is_some());
        h.end();
        assert!(h.signal().live().is_none());
    }

    #[test]
    fn pile_forces_failing_end() {
        let mut h = harness();
        h.begin("setup").unwrap();
        h.do_case("needs setup");
        let raised = h.pile("setup.rs", "setup", 12);
        assert_eq!(raised.target(), None);
        assert_eq!(h.phase(), Phase::Ended);
        assert_eq!(h.result(), Verdict::Fail);
        assert!(h.cases().is_empty());
        assert_eq!(h.piled().unwrap().line_number, 12);
        assert!(output(&h).contains("test abandoned at setup.rs:12 in setup"));
    }

    #[test]
    fn recover_records_panics() {
        let mut h = harness();
        h.begin("panics").unwrap();
        h.do_case("boom");
        let value: Option<()> = h.recover(|_| panic!("exploded"));
        assert!(value.is_none());
        assert_eq!(h.context().case_failure_count(), 1);
        assert_eq!(h.last_failure().unwrap().expression_text, "panic: exploded");
    }

    #[test]
    fn recover_reinstates_outer_point() {
        let mut h = harness();
        h.begin("reinstate").unwrap();
        let outer = h.signal().live();
        let inner = h.recover(|h| Ok(h.signal().live())).unwrap();
        assert_ne!(inner, outer);
        assert_eq!(h.signal().live(), outer);
    }

    #[test]
    fn quiet_mode_skips_case_start_lines() {
        let config = HarnessConfig { quiet: true };
        let mut h = Harness::with_config(config, Vec::new());
        h.begin("quiet").unwrap();
        h.do_case("silent");
        h.placeholder();
        h.done();
        h.end();
        let text = output(&h);
        assert!(!text.contains("case silent ..."));
        assert!(text.contains("[placeholder] silent"));
        assert!(text.contains("case silent: 0 failure(s) [ok]"));
        assert!(text.contains("quiet: 1 case(s), 0 failed, 1 placeholder(s): PASS"));
    }

    #[test]
    fn last_failure_keeps_only_latest() {
        let mut h = harness();
        h.begin("latest").unwrap();
        h.do_case("a");
        let _ = h.check(false, "first", "f.rs", "latest", 1);
        h.do_case("b");
        let _ = h.check(false, "second", "f.rs", "latest", 2);
        let record = h.last_failure().unwrap();
        assert_eq!(record.expression_text, "second");
        assert_eq!(record.line_number, 2);
    }

    #[test]
    fn recover_records_panic_location() {
        let mut h = harness();
        h.begin("located").unwrap();
        h.do_case("boom");
        let line = line!() + 1;
        let _: Option<()> = h.recover(|_| panic!("here"));
        let record = h.last_failure().unwrap();
        assert!(record.source_file.ends_with("harness.rs"));
        assert_eq!(record.line_number, line);
    }

    #[test]
    #[should_panic]
    fn recover_lets_missing_point_unwind() {
        let mut h = harness();
        let _: Option<()> = h.recover(|h| {
            h.signal.clear();
            Err(h.signal.raise())
        });
    }

    #[cfg(feature = "history")]
    #[test]
    fn history_keeps_every_failure() {
        let mut h = harness();
        h.begin("history").unwrap();
        h.do_case("a");
        let _ = h.check(false, "first", "f.rs", "history", 1);
        h.do_case("b");
        let _ = h.check(false, "second", "f.rs", "history", 2);
        let texts: Vec<_> = h
            .failure_history()
            .iter()
            .map(|r| r.expression_text.as_str())
            .collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(h.last_failure().unwrap().expression_text, "second");
    }
}
