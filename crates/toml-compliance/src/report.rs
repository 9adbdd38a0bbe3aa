//! Test results, the shared result sink, and the final report.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::error::ErrorKind;
use crate::loader::TestCase;

/// Why a case failed (as opposed to errored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// Output decoded fine but differs from the expected document.
    ComparisonMismatch,
    /// Accepted input it should reject, or the other way round.
    UnexpectedExitCode,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureReason::ComparisonMismatch => "comparison mismatch",
            FailureReason::UnexpectedExitCode => "unexpected exit code",
        })
    }
}

/// Terminal state of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TestOutcome {
    Passed,
    Failed { reason: FailureReason, detail: String },
    Errored { kind: ErrorKind, detail: String },
}

impl TestOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestOutcome::Passed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TestOutcome::Failed { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, TestOutcome::Errored { .. })
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            TestOutcome::Passed => None,
            TestOutcome::Failed { detail, .. } | TestOutcome::Errored { detail, .. } => {
                Some(detail)
            }
        }
    }
}

/// Outcome of running one [`TestCase`].
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub case: TestCase,
    pub outcome: TestOutcome,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl TestResult {
    pub fn new(case: TestCase, outcome: TestOutcome, duration: Duration) -> Self {
        Self {
            case,
            outcome,
            duration,
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Append-only, thread-safe collector shared by all workers.
#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    results: Arc<Mutex<Vec<TestResult>>>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, result: TestResult) {
        self.results.lock().push(result);
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take everything collected so far, in discovery order.
    pub fn into_report(self) -> Report {
        let results = std::mem::take(&mut *self.results.lock());
        Report::new(results)
    }
}

/// Pass/fail/error counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

/// All results of a run, sorted by discovery order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub summary: Summary,
    pub results: Vec<TestResult>,
}

impl Report {
    pub fn new(mut results: Vec<TestResult>) -> Self {
        results.sort_by_key(|r| r.case.index);
        let mut summary = Summary {
            total: results.len(),
            ..Summary::default()
        };
        for result in &results {
            match result.outcome {
                TestOutcome::Passed => summary.passed += 1,
                TestOutcome::Failed { .. } => summary.failed += 1,
                TestOutcome::Errored { .. } => summary.errored += 1,
            }
        }
        Self { summary, results }
    }

    /// Zero failures and zero errors.
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.summary.errored == 0
    }

    /// Results that did not pass, in discovery order.
    pub fn problems(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.outcome.is_passed())
    }

    /// Plain-text report. `verbose` also lists passing cases.
    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = String::new();
        if self.results.is_empty() {
            out.push_str("No tests were selected!\n");
            return out;
        }

        for result in &self.results {
            let label = match &result.outcome {
                TestOutcome::Passed if !verbose => continue,
                TestOutcome::Passed => " PASS ",
                TestOutcome::Failed { .. } => " FAIL ",
                TestOutcome::Errored { .. } => " ERROR",
            };
            let _ = writeln!(out, "{label} {}", result.case);
            match &result.outcome {
                TestOutcome::Passed => {}
                TestOutcome::Failed { reason, detail } => {
                    let _ = writeln!(out, "  {reason}");
                    push_indented(&mut out, detail, "    ");
                }
                TestOutcome::Errored { kind, detail } => {
                    let _ = writeln!(out, "  {kind}");
                    push_indented(&mut out, detail, "    ");
                }
            }
        }

        let s = &self.summary;
        let _ = writeln!(
            out,
            "\nSummary: {} passed, {} failed, {} errored, {} total",
            s.passed, s.failed, s.errored, s.total
        );
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn push_indented(out: &mut String, text: &str, indent: &str) {
    for line in text.lines() {
        out.push_str(indent);
        out.push_str(line);
        out.push('\n');
    }
}
