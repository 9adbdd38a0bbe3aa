//! Test execution: the per-case state machine and the bounded worker pool.
//!
//! Each case goes `Pending → Running → {Passed, Failed, Errored}`:
//!
//! | case | subject exits 0 | subject exits non-zero |
//! |------|-----------------|------------------------|
//! | decoder, valid | parse stdout, compare with expected | Failed |
//! | decoder, invalid | Failed | Passed |
//! | encoder, valid | decode stdout with the reference decoder, compare | Failed |
//! | encoder, invalid | Failed | Passed |
//!
//! Unparseable output, timeouts, spawn failures and cancellation make a case
//! Errored. Nothing that happens inside one case affects another.
//!
//! Cases run as tasks in a `JoinSet`; a semaphore bounds how many subjects
//! are alive at once. Results land in a [`ResultSink`] in completion order and
//! the [`Report`] re-sorts them by discovery order.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use similar::TextDiff;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cancel::CancelToken;
use crate::compare;
use crate::error::{HarnessError, Result};
use crate::loader::{Category, Kind, TestCase};
use crate::process::{self, Invocation, ProcessOutput};
use crate::report::{FailureReason, Report, ResultSink, TestOutcome, TestResult};
use crate::value;

/// Per-subprocess time limit used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest stderr excerpt copied into a diagnostic.
const STDERR_EXCERPT: usize = 2048;

/// Worker count used when none is configured: the machine's parallelism.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// What to run and how.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The decoder or encoder under test.
    pub subject: Invocation,
    /// Decoder used to read back encoder output. Required for encoder cases.
    pub reference_decoder: Option<Invocation>,
    pub timeout: Duration,
    /// Maximum number of cases in flight.
    pub jobs: usize,
}

impl RunConfig {
    pub fn new(subject: Invocation) -> Self {
        Self {
            subject,
            reference_decoder: None,
            timeout: DEFAULT_TIMEOUT,
            jobs: default_jobs(),
        }
    }

    pub fn with_reference_decoder(mut self, decoder: Invocation) -> Self {
        self.reference_decoder = Some(decoder);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

/// Runs test cases against the configured subject.
#[derive(Debug, Clone)]
pub struct Executor {
    config: Arc<RunConfig>,
    cancel: CancelToken,
}

/// Why a case did not pass. `?` on a [`HarnessError`] lands in `Errored`.
enum Verdict {
    Failed(FailureReason, String),
    Errored(HarnessError),
}

impl From<HarnessError> for Verdict {
    fn from(err: HarnessError) -> Self {
        Verdict::Errored(err)
    }
}

impl Executor {
    pub fn new(config: RunConfig) -> Self {
        Self::with_cancel_token(config, CancelToken::new())
    }

    pub fn with_cancel_token(config: RunConfig, cancel: CancelToken) -> Self {
        Self {
            config: Arc::new(config),
            cancel,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The token that aborts this executor's runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run every case on the worker pool and collect the report.
    ///
    /// # Errors
    /// [`HarnessError::Config`] if there are encoder cases but no reference
    /// decoder. Per-case problems never fail the run; they become results.
    pub async fn run_all(&self, cases: Vec<TestCase>) -> Result<Report> {
        if self.config.reference_decoder.is_none() && cases.iter().any(|c| c.kind == Kind::Encoder)
        {
            return Err(HarnessError::Config(
                "encoder cases need a reference decoder".to_string(),
            ));
        }

        Ok(self.run_pool(cases, |executor, case| async move {
            executor.run_case(case).await
        })
        .await)
    }

    /// Run `check` for every case on the bounded pool.
    ///
    /// A task that panics still yields a result: its case is recorded as
    /// Errored so the summary never undercounts.
    async fn run_pool<F, Fut>(&self, cases: Vec<TestCase>, check: F) -> Report
    where
        F: Fn(Executor, TestCase) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        let sink = ResultSink::new();
        let permits = Arc::new(Semaphore::new(self.config.jobs.max(1)));
        let mut tasks = JoinSet::new();
        let mut in_flight = HashMap::new();

        for case in cases {
            let executor = self.clone();
            let sink = sink.clone();
            let permits = Arc::clone(&permits);
            let check = check.clone();
            let task_case = case.clone();
            let handle = tasks.spawn(async move {
                let case = task_case;
                let permit = tokio::select! {
                    permit = permits.acquire_owned() => permit.ok(),
                    () = executor.cancel.cancelled() => None,
                };
                let result = match permit {
                    Some(_permit) => check(executor, case).await,
                    None => TestResult::new(
                        case,
                        errored(&HarnessError::Cancelled),
                        Duration::ZERO,
                    ),
                };
                sink.push(result);
            });
            in_flight.insert(handle.id(), case);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, ())) => {
                    in_flight.remove(&id);
                }
                Err(err) => {
                    tracing::error!(error = %err, "test case task did not complete");
                    if let Some(case) = in_flight.remove(&err.id()) {
                        let failure =
                            HarnessError::Internal(format!("test case task failed: {err}"));
                        sink.push(TestResult::new(case, errored(&failure), Duration::ZERO));
                    }
                }
            }
        }

        let report = sink.into_report();
        tracing::info!(
            passed = report.summary.passed,
            failed = report.summary.failed,
            errored = report.summary.errored,
            "run finished"
        );
        report
    }

    /// Run one case to completion.
    pub async fn run_case(&self, case: TestCase) -> TestResult {
        let start = Instant::now();
        tracing::debug!(case = %case, "running");
        let outcome = match self.check(&case).await {
            Ok(()) => TestOutcome::Passed,
            Err(Verdict::Failed(reason, detail)) => TestOutcome::Failed { reason, detail },
            Err(Verdict::Errored(err)) => errored(&err),
        };
        let duration = start.elapsed();
        tracing::debug!(case = %case, ?outcome, ?duration, "finished");
        TestResult::new(case, outcome, duration)
    }

    async fn check(&self, case: &TestCase) -> std::result::Result<(), Verdict> {
        let input = read_fixture(&case.input_path).await?;
        let output = self.invoke(&self.config.subject, &input).await?;

        if case.category == Category::Invalid {
            if output.success() {
                return Err(Verdict::Failed(
                    FailureReason::UnexpectedExitCode,
                    "expected rejection, got acceptance (exit code 0)".to_string(),
                ));
            }
            return Ok(());
        }

        if !output.success() {
            return Err(Verdict::Failed(
                FailureReason::UnexpectedExitCode,
                with_stderr(
                    format!("expected success, got failure ({})", output.describe_exit()),
                    &output,
                ),
            ));
        }

        let expected_path = case.expected_path.as_deref().ok_or_else(|| {
            HarnessError::Config(format!("valid case {} has no expected output", case.id()))
        })?;
        let expected =
            value::parse_document(&read_fixture(expected_path).await?, "expected fixture")?;

        let (actual_bytes, origin) = match case.kind {
            Kind::Decoder => (output.stdout, "decoder output"),
            Kind::Encoder => (self.read_back(output).await?, "reference decoder output"),
        };
        let actual = value::parse_document(&actual_bytes, origin)?;

        compare::compare_tables(&expected, &actual).map_err(|mismatch| {
            Verdict::Failed(
                FailureReason::ComparisonMismatch,
                format!("{mismatch}\n{}", document_diff(&expected, &actual)),
            )
        })
    }

    /// Feed encoder output through the reference decoder.
    async fn read_back(&self, encoded: ProcessOutput) -> std::result::Result<Vec<u8>, Verdict> {
        let Some(reference) = self.config.reference_decoder.as_ref() else {
            return Err(HarnessError::Config(
                "encoder cases need a reference decoder".to_string(),
            )
            .into());
        };
        let decoded = self.invoke(reference, &encoded.stdout).await?;
        if !decoded.success() {
            return Err(Verdict::Failed(
                FailureReason::UnexpectedExitCode,
                with_stderr(
                    format!(
                        "reference decoder rejected the encoder's output ({})\nencoder output:\n{}",
                        decoded.describe_exit(),
                        String::from_utf8_lossy(&encoded.stdout)
                    ),
                    &decoded,
                ),
            ));
        }
        Ok(decoded.stdout)
    }

    async fn invoke(&self, invocation: &Invocation, input: &[u8]) -> Result<ProcessOutput> {
        process::run(invocation, input, self.config.timeout, &self.cancel).await
    }
}

fn errored(err: &HarnessError) -> TestOutcome {
    TestOutcome::Errored {
        kind: err.kind(),
        detail: err.to_string(),
    }
}

async fn read_fixture(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|cause| HarnessError::Io {
        path: path.to_path_buf(),
        cause,
    })
}

/// Unified line diff of the two documents, pretty-printed.
fn document_diff(expected: &value::Table, actual: &value::Table) -> String {
    let expected = value::to_string_pretty(expected);
    let actual = value::to_string_pretty(actual);
    TextDiff::from_lines(&expected, &actual)
        .unified_diff()
        .context_radius(3)
        .header("expected", "actual")
        .to_string()
}

/// Append a trimmed stderr excerpt, if there is one.
fn with_stderr(message: String, output: &ProcessOutput) -> String {
    let stderr = output.stderr_lossy();
    let stderr = stderr.trim();
    if stderr.is_empty() {
        return message;
    }
    let excerpt: String = stderr.chars().take(STDERR_EXCERPT).collect();
    format!("{message}\nstderr:\n{excerpt}")
}
