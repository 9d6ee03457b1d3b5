//! Isolated Runner
//!
//! Executes a rendered script in a separate process and captures its output.
//!
//! [`ProcessRunner`] materializes the script as a temporary file, runs it with
//! the configured interpreter in its own process group and waits for it to
//! exit and close its output. With a deadline both waits are bounded; once
//! the deadline passes the group receives SIGTERM, gets a short grace
//! window, and is then killed. The temporary file and the child are
//! both released on every path out of [`IsolatedRunner::run`], including
//! unwinding.

use crate::error::LaunchError;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Interpreter used when none is configured
pub const DEFAULT_PHP_BINARY: &str = "php";

/// How often a child with a deadline is checked for exit
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Time a child gets to exit after SIGTERM before it is killed
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Captured result of one child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Command line that was run
    pub command: String,
    /// Everything written to standard output
    pub stdout: Vec<u8>,
    /// Everything written to standard error (lossy UTF-8)
    pub stderr: String,
    /// Exit code, `None` if terminated by a signal
    pub exit_code: Option<i32>,
}

impl RunOutput {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Capability to run a script in isolation from the calling process.
///
/// Implementations must not share mutable state between calls; one
/// instance may serve concurrent callers.
pub trait IsolatedRunner: Send + Sync {
    /// Run `script` to completion, or until `deadline` elapses
    fn run(&self, script: &str, deadline: Option<Duration>) -> Result<RunOutput, LaunchError>;
}

impl<R: IsolatedRunner + ?Sized> IsolatedRunner for &R {
    fn run(&self, script: &str, deadline: Option<Duration>) -> Result<RunOutput, LaunchError> {
        (**self).run(script, deadline)
    }
}

impl<R: IsolatedRunner + ?Sized> IsolatedRunner for Box<R> {
    fn run(&self, script: &str, deadline: Option<Duration>) -> Result<RunOutput, LaunchError> {
        (**self).run(script, deadline)
    }
}

/// Runs scripts as `[wrapper...] interpreter [-d key=value...] script`
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    interpreter: PathBuf,
    wrapper: Vec<String>,
    ini: BTreeMap<String, String>,
    script_suffix: String,
}

impl ProcessRunner {
    /// Runner for the given interpreter
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            wrapper: Vec::new(),
            ini: BTreeMap::new(),
            script_suffix: ".php".to_string(),
        }
    }

    /// Runner for `php` on the `PATH`
    pub fn php() -> Self {
        Self::new(DEFAULT_PHP_BINARY)
    }

    /// Prefix the command with a wrapper, e.g. `"blackfire run"`
    pub fn with_wrapper(mut self, wrapper: &str) -> Self {
        self.wrapper = wrapper.split_whitespace().map(str::to_string).collect();
        self
    }

    /// Pass an ini setting to the interpreter as `-d key=value`
    pub fn with_ini(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ini.insert(key.into(), value.into());
        self
    }

    /// File name suffix of the temporary script
    pub fn with_script_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.script_suffix = suffix.into();
        self
    }

    /// Interpreter path
    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    fn argv(&self, script: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self.wrapper.iter().map(OsString::from).collect();
        argv.push(self.interpreter.clone().into_os_string());
        for (key, value) in &self.ini {
            argv.push("-d".into());
            argv.push(format!("{}={}", key, value).into());
        }
        argv.push(script.as_os_str().to_os_string());
        argv
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::php()
    }
}

impl IsolatedRunner for ProcessRunner {
    fn run(&self, script: &str, deadline: Option<Duration>) -> Result<RunOutput, LaunchError> {
        // Removed when dropped, whichever way this function returns
        let mut script_file = tempfile::Builder::new()
            .prefix("benchprobe-")
            .suffix(&self.script_suffix)
            .tempfile()?;
        script_file.write_all(script.as_bytes())?;
        script_file.flush()?;

        let argv = self.argv(script_file.path());
        let command_line = describe(&argv);
        tracing::debug!(command = %command_line, "spawning child process");

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a deadline also reaches anything the child starts
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let started = Instant::now();
        let expires_at = deadline.map(|limit| started + limit);

        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        let mut child = ChildGuard(child);

        // Drain both pipes concurrently so a chatty child cannot fill one
        // while we block on the other.
        let stdout = drain(child.0.stdout.take());
        let stderr = drain(child.0.stderr.take());

        let status = match expires_at {
            None => Some(child.0.wait()),
            Some(at) => wait_until(&mut child.0, at),
        }
        .transpose()
        .map_err(|source| LaunchError::Wait {
            command: command_line.clone(),
            source,
        })?;

        // The pipes stay open while anything in the process group holds
        // them, even after the child itself has exited.
        let output = status.and_then(|status| {
            let stdout = collect(&stdout, expires_at)?;
            let stderr = collect(&stderr, expires_at)?;
            Some((status, stdout, stderr))
        });

        let Some((status, stdout, stderr)) = output else {
            let timeout = deadline.unwrap_or_default();
            tracing::debug!(command = %command_line, ?timeout, "deadline expired, terminating child");
            terminate(&mut child.0);
            return Err(LaunchError::Timeout {
                command: command_line,
                timeout,
            });
        };

        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        let exit_code = status.code();
        tracing::debug!(command = %command_line, ?exit_code, stdout_bytes = stdout.len(), "child exited");

        Ok(RunOutput {
            command: command_line,
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Kills and reaps the child if it is still running when dropped
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

/// Read a pipe to the end on its own thread; the buffer arrives on the channel
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        let _ = sender.send(buffer);
    });
    receiver
}

/// Drained pipe contents, or `None` if `expires_at` passes first
fn collect(pipe: &Receiver<Vec<u8>>, expires_at: Option<Instant>) -> Option<Vec<u8>> {
    let received = match expires_at {
        None => pipe.recv().map_err(|_| RecvTimeoutError::Disconnected),
        Some(at) => pipe.recv_timeout(at.saturating_duration_since(Instant::now())),
    };
    match received {
        Ok(buffer) => Some(buffer),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
    }
}

/// Wait for exit until `expires_at`; `None` means still running
fn wait_until(child: &mut Child, expires_at: Instant) -> Option<std::io::Result<ExitStatus>> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(Ok(status)),
            Ok(None) => {}
            Err(e) => return Some(Err(e)),
        }
        let remaining = expires_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        thread::sleep(remaining.min(POLL_INTERVAL));
    }
}

/// SIGTERM the process group, grace window, then SIGKILL whatever is left
fn terminate(child: &mut Child) {
    // Ignore errors: the group may already be gone
    let _ = signal_group(child.id(), Signal::Term);

    // Returns at once if the child has already been reaped
    let _ = wait_until(child, Instant::now() + TERM_GRACE);

    let _ = signal_group(child.id(), Signal::Kill);
    let _ = child.kill();
    let _ = child.wait();
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Signal every process in the child's group. Returns `Err` if the signal could not be delivered.
#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) -> Result<(), std::io::Error> {
    let signal = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // The child leads its own group, so its pid is the group id
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// No process groups; the caller falls through to a hard kill of the child.
#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: Signal) -> Result<(), std::io::Error> {
    Ok(())
}

fn describe(argv: &[OsString]) -> String {
    argv.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
