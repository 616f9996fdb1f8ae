//! Child-process invocation for external converters, synthesizers and encoders.
//!
//! Every call is bounded by a timeout; a child still running when the deadline
//! passes is killed and reported as [`ToolError::Timeout`]. Spawning is retried
//! once after a short delay before giving up.
//!
//! Stderr is collected by a detached reader thread. Once the child exits, the
//! reader gets a short grace period (never past the deadline) to reach EOF;
//! a grandchild that inherited the pipe cannot hold `run` open.

use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Default deadline for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(250);

/// How long stderr may stay open after the child itself has exited.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Max bytes of stderr kept for error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// Failure of an external tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} not found ({})", program.display())]
    NotFound { tool: String, program: PathBuf },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },
}

/// Output of a successful invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Tail of the child's stderr (tools often log progress there).
    pub stderr: String,
    pub elapsed: Duration,
}

/// A configured command line for one external tool.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: String,
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    timeout: Duration,
}

impl ExternalTool {
    /// `name` is the human-readable tool name used in logs and errors.
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the tool to completion, killing it if it exceeds the timeout.
    pub fn run(&self) -> Result<ToolOutput, ToolError> {
        debug!(tool = %self.name, program = %self.program.display(), args = ?self.args, "spawning");

        let start = Instant::now();
        // `None` only for timeouts too large to represent, i.e. no deadline.
        let deadline = start.checked_add(self.timeout);
        let mut child = self.spawn_with_retry()?;

        // Drain stderr on a side thread so a chatty child cannot block on a full pipe.
        let (tx, rx) = mpsc::channel();
        if let Some(mut pipe) = child.stderr.take() {
            thread::spawn(move || {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if tx.send(chunk[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        } else {
            drop(tx);
        }

        let mut stderr_bytes = Vec::new();
        let status = loop {
            drain_stderr(&rx, &mut stderr_bytes);
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                    warn!(tool = %self.name, timeout_secs = self.timeout.as_secs(), "killing tool after timeout");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Timeout {
                        tool: self.name.clone(),
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    return Err(ToolError::Spawn {
                        tool: self.name.clone(),
                        source,
                    });
                }
            }
        };

        let grace = deadline.map_or(STDERR_GRACE, |d| {
            d.saturating_duration_since(Instant::now()).min(STDERR_GRACE)
        });
        let until = Instant::now() + grace;
        loop {
            match rx.recv_timeout(until.saturating_duration_since(Instant::now())) {
                Ok(chunk) => push_stderr(&mut stderr_bytes, &chunk),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    debug!(tool = %self.name, "stderr still open after exit, not waiting for it");
                    break;
                }
            }
        }
        let stderr = stderr_tail(&stderr_bytes);
        let elapsed = start.elapsed();

        if !status.success() {
            return Err(ToolError::Failed {
                tool: self.name.clone(),
                status,
                stderr,
            });
        }

        debug!(tool = %self.name, elapsed_ms = elapsed.as_millis() as u64, "finished");
        Ok(ToolOutput { stderr, elapsed })
    }

    fn spawn_with_retry(&self) -> Result<Child, ToolError> {
        match self.spawn() {
            Ok(child) => Ok(child),
            Err(first) => {
                debug!(tool = %self.name, error = %first, "spawn failed, retrying once");
                thread::sleep(SPAWN_RETRY_DELAY);
                self.spawn().map_err(|e| self.spawn_error(e))
            }
        }
    }

    fn spawn(&self) -> io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
    }

    fn spawn_error(&self, source: io::Error) -> ToolError {
        if source.kind() == io::ErrorKind::NotFound {
            ToolError::NotFound {
                tool: self.name.clone(),
                program: self.program.clone(),
            }
        } else {
            ToolError::Spawn {
                tool: self.name.clone(),
                source,
            }
        }
    }
}

fn drain_stderr(rx: &Receiver<Vec<u8>>, buf: &mut Vec<u8>) {
    while let Ok(chunk) = rx.try_recv() {
        push_stderr(buf, &chunk);
    }
}

/// Append, keeping a bounded window so a noisy tool can't grow it forever.
fn push_stderr(buf: &mut Vec<u8>, chunk: &[u8]) {
    buf.extend_from_slice(chunk);
    let keep = STDERR_TAIL_BYTES * 4;
    if buf.len() > keep {
        buf.drain(..buf.len() - keep);
    }
}

fn stderr_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut cut = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    format!("...{}", &text[cut..])
}

/// Find the first candidate that exists, either as a path or on `PATH`.
pub fn resolve_program<S: AsRef<OsStr>>(candidates: &[S]) -> Option<PathBuf> {
    let search_path = std::env::var_os("PATH");
    candidates.iter().find_map(|candidate| {
        let candidate = Path::new(candidate.as_ref());
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }
        let dirs = search_path.as_ref()?;
        std::env::split_paths(dirs).find_map(|dir| {
            let full = dir.join(candidate);
            if full.is_file() {
                return Some(full);
            }
            if cfg!(windows) {
                let exe = full.with_extension("exe");
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    })
}
