//! Resilient external process runner
//!
//! Executes analysis tools as child processes with argument-vector
//! invocation (never a shell string), a wall-clock timeout, and a
//! bounded-backoff retry policy that applies only to transient
//! OS-level failures. Timeouts are terminal and never retried here;
//! the calling adapter reports them as a failed tool status.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// How often the parent polls the child for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured result of a completed child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{tool} not found on the search path")]
    NotFound { tool: String },

    #[error("{tool} timed out after {timeout_secs}s")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("transient failure running {tool}: {source}")]
    Transient {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProcessError::Transient { .. })
    }

    fn from_io(tool: &str, source: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match source.kind() {
            ErrorKind::NotFound => ProcessError::NotFound {
                tool: tool.to_string(),
            },
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted => ProcessError::Transient {
                tool: tool.to_string(),
                source,
            },
            _ => ProcessError::Io {
                tool: tool.to_string(),
                source,
            },
        }
    }
}

/// Bounded exponential backoff for transient process failures.
///
/// The policy is a plain value so the retry behavior can be tested
/// without ever spawning a process.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// 3 retries at 2s, 4s, 8s. The default for tool invocations.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }

    /// No retries at all. Used for availability probes.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based), doubling each time.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }

    /// Only transient errors within the retry budget are retried.
    /// Timeouts and missing executables are terminal.
    pub fn should_retry(&self, error: &ProcessError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Invocation parameters for one tool run.
pub struct RunOptions<'a> {
    /// Human-readable tool name for errors and logs.
    pub tool: &'a str,
    pub timeout: Duration,
    pub cwd: Option<&'a Path>,
    pub env: HashMap<String, String>,
}

impl<'a> RunOptions<'a> {
    pub fn new(tool: &'a str, timeout: Duration) -> Self {
        Self {
            tool,
            timeout,
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn current_dir(mut self, cwd: &'a Path) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Run a tool under the given retry policy.
///
/// Each element of `cmd` is passed as a separate argument; the first is
/// the program. Transient spawn/wait errors are retried with backoff;
/// everything else propagates immediately.
pub fn run_tool(
    cmd: &[String],
    opts: &RunOptions<'_>,
    retry: &RetryPolicy,
) -> Result<ProcessOutput, ProcessError> {
    let mut attempt = 0;
    loop {
        match run_once(cmd, opts) {
            Ok(output) => return Ok(output),
            Err(err) if retry.should_retry(&err, attempt) => {
                let delay = retry.delay(attempt);
                warn!(
                    "{} failed transiently (attempt {}): {}; retrying in {:?}",
                    opts.tool,
                    attempt + 1,
                    err,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn run_once(cmd: &[String], opts: &RunOptions<'_>) -> Result<ProcessOutput, ProcessError> {
    let (program, args) = cmd.split_first().ok_or_else(|| ProcessError::Io {
        tool: opts.tool.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
    })?;

    debug!("Running {}: {} {:?}", opts.tool, program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = opts.cwd {
        command.current_dir(dir);
    }
    for (key, value) in &opts.env {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .map_err(|e| ProcessError::from_io(opts.tool, e))?;

    // Drain the pipes on their own threads so a chatty child can never
    // stall against a full pipe buffer while we poll for completion.
    let stdout_handle = child.stdout.take().map(spawn_reader);
    let stderr_handle = child.stderr.take().map(spawn_reader);

    let deadline = Instant::now() + opts.timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    join_reader(stdout_handle);
                    join_reader(stderr_handle);
                    warn!(
                        "{} timed out after {}s",
                        opts.tool,
                        opts.timeout.as_secs()
                    );
                    return Err(ProcessError::Timeout {
                        tool: opts.tool.to_string(),
                        timeout_secs: opts.timeout.as_secs(),
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                join_reader(stdout_handle);
                join_reader(stderr_handle);
                return Err(ProcessError::from_io(opts.tool, e));
            }
        }
    };

    Ok(ProcessOutput {
        stdout: join_reader(stdout_handle),
        stderr: join_reader(stderr_handle),
        exit_code: status.code().unwrap_or(-1),
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
