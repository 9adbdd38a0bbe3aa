//! Subprocess runner: one subject invocation, fed through stdin, bounded by a timeout.
//!
//! The runner never touches the filesystem. Input goes in through the
//! child's standard input (closed afterwards so the subject sees EOF), and
//! stdout/stderr are drained concurrently so a chatty subject cannot
//! deadlock on a full pipe.
//!
//! On Unix the subject runs in its own process group. On timeout or
//! cancellation the whole group is killed and the child reaped before the
//! error is returned, and any stragglers left behind by a subject that exited
//! normally are killed too. Nothing the subject started outlives its test case.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::error::{HarnessError, Result};

/// A program plus its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Check up front that a path-like program exists and is executable.
    ///
    /// Bare command names (no path separator) are resolved through `PATH`
    /// at spawn time and are not checked here.
    pub fn ensure_executable(&self) -> Result<()> {
        if self.program.components().count() <= 1 {
            return Ok(());
        }
        ensure_executable_file(&self.program)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

fn ensure_executable_file(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| HarnessError::Config(format!("could not find file: {}", path.display())))?;
    if !metadata.is_file() {
        return Err(HarnessError::Config(format!(
            "not a file: {}",
            path.display()
        )));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(HarnessError::Config(format!(
                "not an executable file: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Everything a finished subprocess produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// `exit code 3` or `killed by signal`.
    pub fn describe_exit(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_string(),
        }
    }
}

/// Run `invocation`, feed it `input`, and wait at most `limit` for it to exit
/// and close its output streams.
///
/// # Errors
/// - [`HarnessError::SpawnFailure`] if the program cannot be started.
/// - [`HarnessError::Timeout`] if it, or anything holding its output pipes,
///   runs past `limit` (the process group is killed).
/// - [`HarnessError::Cancelled`] if `cancel` fires first (the process group is killed).
/// - [`HarnessError::Io`] if waiting on the child or reading a pipe fails.
pub async fn run(
    invocation: &Invocation,
    input: &[u8],
    limit: Duration,
    cancel: &CancelToken,
) -> Result<ProcessOutput> {
    if cancel.is_cancelled() {
        return Err(HarnessError::Cancelled);
    }

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|cause| HarnessError::SpawnFailure {
        program: invocation.to_string(),
        cause,
    })?;
    let pid = child.id();
    // Declared after `child` so it drops first: the group dies even if this
    // future is abandoned mid-run.
    let group = ProcessGroup::new(pid);
    tracing::trace!(program = %invocation, ?pid, "spawned");

    let feeder = spawn_feeder(&mut child, input.to_vec());
    let stdout = spawn_drain(child.stdout.take());
    let stderr = spawn_drain(child.stderr.take());
    let deadline = Instant::now() + limit;

    let waited = tokio::select! {
        status = tokio::time::timeout_at(deadline, child.wait()) => match status {
            Ok(status) => Wait::Exited(status),
            Err(_) => Wait::TimedOut,
        },
        () = cancel.cancelled() => Wait::Cancelled,
    };

    let status = match waited {
        Wait::Exited(status) => status.map_err(|cause| HarnessError::Io {
            path: invocation.program.clone(),
            cause,
        })?,
        Wait::TimedOut => {
            tracing::warn!(program = %invocation, ?pid, ?limit, "subject timed out, killing");
            terminate(&mut child, &group, [feeder, stdout, stderr]).await;
            return Err(timeout(invocation, limit));
        }
        Wait::Cancelled => {
            tracing::debug!(program = %invocation, ?pid, "cancelled, killing");
            terminate(&mut child, &group, [feeder, stdout, stderr]).await;
            return Err(HarnessError::Cancelled);
        }
    };

    // The subject has exited, but a process it spawned may still hold the pipes.
    feeder.abort();
    let stdout = collect(stdout, deadline, invocation, limit).await;
    let stderr = collect(stderr, deadline, invocation, limit).await;
    group.kill();
    let (stdout, stderr) = (stdout?, stderr?);

    Ok(ProcessOutput {
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

enum Wait {
    Exited(io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

fn timeout(invocation: &Invocation, limit: Duration) -> HarnessError {
    HarnessError::Timeout {
        program: invocation.to_string(),
        limit,
    }
}

/// Write all of `input` to the child's stdin, then close it.
///
/// A subject may exit without reading its input; the resulting broken pipe
/// is not an error.
fn spawn_feeder(child: &mut Child, input: Vec<u8>) -> JoinHandle<io::Result<Vec<u8>>> {
    let stdin = child.stdin.take();
    tokio::spawn(async move {
        if let Some(mut pipe) = stdin {
            match pipe.write_all(&input).await {
                Err(err) if err.kind() != io::ErrorKind::BrokenPipe => return Err(err),
                _ => {}
            }
            // Dropping `pipe` closes it.
        }
        Ok(Vec::new())
    })
}

fn spawn_drain<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn collect(
    handle: JoinHandle<io::Result<Vec<u8>>>,
    deadline: Instant,
    invocation: &Invocation,
    limit: Duration,
) -> Result<Vec<u8>> {
    let abort = handle.abort_handle();
    let joined = match tokio::time::timeout_at(deadline, handle).await {
        Ok(joined) => joined,
        Err(_) => {
            abort.abort();
            tracing::warn!(program = %invocation, "output stream still open at deadline");
            return Err(timeout(invocation, limit));
        }
    };
    joined
        .map_err(io::Error::other)
        .and_then(|read| read)
        .map_err(|cause| HarnessError::Io {
            path: invocation.program.clone(),
            cause,
        })
}

/// Kill the child's group, wait for the child to be reaped, and stop its I/O tasks.
async fn terminate<const N: usize>(
    child: &mut Child,
    group: &ProcessGroup,
    tasks: [JoinHandle<io::Result<Vec<u8>>>; N],
) {
    group.kill();
    if let Err(err) = child.kill().await {
        tracing::warn!(error = %err, "failed to kill subject");
    }
    for task in tasks {
        task.abort();
    }
}

/// The process group a subject leads. Killed explicitly once the subject is
/// done, and again on drop.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// SIGKILL every process in the group. A group that is already gone is fine.
    fn kill(&self) {
        #[cfg(unix)]
        {
            let Some(pgid) = self.leader.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
                return;
            };
            // SAFETY: killpg only sends a signal; it touches no memory of ours.
            if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() != Some(libc::ESRCH) {
                    tracing::debug!(pgid, error = %err, "could not kill process group");
                }
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
