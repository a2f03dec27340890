//! External process plumbing: bounded runs, line streaming, and the shared stop signal

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Default time a terminated encoder gets to exit before it is killed
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(1000);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {}s", .limit.as_secs())]
    Timeout { program: String, limit: Duration },

    #[error("{program} was stopped")]
    Cancelled { program: String },

    #[error("i/o error while waiting for {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Run a command to completion, capturing its output, killing it after `timeout`
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, RunError> {
    run_until(cmd, timeout, || false)
}

/// Like [`run_with_timeout`], also killing the process once `cancelled` returns true
///
/// `cancelled` is polled every 20 ms while the process runs.
pub fn run_until(
    cmd: &mut Command,
    timeout: Duration,
    cancelled: impl Fn() -> bool,
) -> Result<Output, RunError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| RunError::Launch {
        program: program.clone(),
        source,
    })?;

    let stdout = child.stdout.take().map(spawn_collector);
    let stderr = child.stderr.take().map(spawn_collector);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if cancelled() => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Cancelled { program });
            }
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Timeout {
                    program,
                    limit: timeout,
                });
            }
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Io { program, source });
            }
        }
    };

    Ok(Output {
        status,
        stdout: stdout.map(join_collector).unwrap_or_default(),
        stderr: stderr.map(join_collector).unwrap_or_default(),
    })
}

fn spawn_collector<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_collector(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Forward every line of `reader` to `tx`
///
/// Lines end at `\n` or `\r`: ffmpeg's `-stats` output rewrites a single terminal
/// line with carriage returns. Empty lines are dropped. The thread ends at EOF or
/// once the receiving side hangs up.
pub fn spawn_line_reader<R: Read + Send + 'static>(reader: R, tx: Sender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut pending: Vec<u8> = Vec::new();

        loop {
            let chunk = match reader.fill_buf() {
                Ok([]) => break,
                Ok(chunk) => chunk,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            };

            let len = chunk.len();
            for &byte in chunk {
                if byte == b'\n' || byte == b'\r' {
                    if !pending.is_empty() {
                        let line = String::from_utf8_lossy(&pending).into_owned();
                        pending.clear();
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                } else {
                    pending.push(byte);
                }
            }
            reader.consume(len);
        }

        if !pending.is_empty() {
            let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
        }
    })
}

/// Ask a child to exit, then force it after `grace`; always reaps it
///
/// On Unix the child first gets SIGTERM so ffmpeg can close its output cleanly.
pub fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if let Ok(pid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
    #[cfg(not(unix))]
    let _ = grace;

    debug!(pid = child.id(), "encoder ignored terminate request, killing");
    let _ = child.kill();
    child.wait()
}

/// Cooperative stop flag plus the handle of the encoder currently running
///
/// Cloned between the worker (which attaches and reaps children) and whoever
/// issues the stop command. Each session owns its own signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug)]
struct StopInner {
    requested: AtomicBool,
    active: Mutex<Option<Child>>,
    grace: Duration,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_KILL_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self {
            inner: Arc::new(StopInner {
                requested: AtomicBool::new(false),
                active: Mutex::new(None),
                grace,
            }),
        }
    }

    pub fn grace(&self) -> Duration {
        self.inner.grace
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Set the flag and terminate the running encoder, if any
    ///
    /// Blocks for at most the grace period. The child stays in its slot so the
    /// worker still reaps it through [`StopSignal::detach`].
    pub fn request_stop(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);

        let mut active = self.slot();
        if let Some(child) = active.as_mut() {
            if let Err(e) = terminate(child, self.inner.grace) {
                debug!(error = %e, "terminating encoder failed");
            }
        }
    }

    /// Clear the flag before a new run
    pub fn reset(&self) {
        self.inner.requested.store(false, Ordering::SeqCst);
    }

    pub fn has_active_process(&self) -> bool {
        self.slot().is_some()
    }

    pub(crate) fn attach(&self, child: Child) {
        *self.slot() = Some(child);
    }

    pub(crate) fn detach(&self) -> Option<Child> {
        self.slot().take()
    }

    /// Take the active child out of its slot and terminate it
    pub(crate) fn cancel_active(&self) {
        if let Some(mut child) = self.detach() {
            if let Err(e) = terminate(&mut child, self.inner.grace) {
                debug!(error = %e, "terminating encoder failed");
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Child>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
