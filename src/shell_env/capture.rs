//! One-shot capture of the login shell's environment.
//!
//! [`capture`] never fails: every error path (missing shell, spawn failure,
//! timeout, empty or unusable output) degrades to the current process
//! environment and is logged at `WARN`.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Shell used when `SHELL` is unset or empty.
#[cfg(target_os = "macos")]
pub const DEFAULT_SHELL: &str = "/bin/zsh";

/// Shell used when `SHELL` is unset or empty.
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Upper bound on how long the shell may run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between exit checks while the shell runs.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything needed to run one capture.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Shell binary; `None` resolves `SHELL`, then [`DEFAULT_SHELL`].
    pub shell: Option<PathBuf>,
    /// Arguments making the shell print its environment and exit.
    pub args: Vec<String>,
    /// Hard bound on the shell's runtime.
    pub timeout: Duration,
    /// Working directory; `None` resolves `HOME`.
    pub working_dir: Option<PathBuf>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            shell: None,
            args: default_args(),
            timeout: DEFAULT_TIMEOUT,
            working_dir: None,
        }
    }
}

/// Login, non-interactive, dump with `env`.
#[must_use]
pub fn default_args() -> Vec<String> {
    vec!["-l".into(), "-c".into(), "env".into()]
}

/// The environment of this process.
#[must_use]
pub fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Resolve the shell path from an explicit override, `SHELL`, or the default.
#[must_use]
pub fn resolve_shell(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var("SHELL") {
        Ok(shell) if !shell.is_empty() => PathBuf::from(shell),
        _ => PathBuf::from(DEFAULT_SHELL),
    }
}

/// Parse `KEY=VALUE` lines, splitting on the first `=`.
///
/// Lines without `=` or with an empty key are skipped.
#[must_use]
pub fn parse_env_dump(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Run the login shell and return its environment.
///
/// Blocks the calling thread for up to `settings.timeout`.
#[must_use]
pub fn capture(settings: &CaptureSettings) -> HashMap<String, String> {
    let shell = resolve_shell(settings.shell.as_deref());
    match run_shell(&shell, settings) {
        Ok(output) => {
            let env = parse_env_dump(&output);
            if env.is_empty() {
                warn!(shell = %shell.display(), "login shell produced no environment, using process environment");
                process_env()
            } else {
                debug!(shell = %shell.display(), vars = env.len(), "captured login shell environment");
                env
            }
        }
        Err(reason) => {
            warn!(shell = %shell.display(), %reason, "login shell capture failed, using process environment");
            process_env()
        }
    }
}

fn run_shell(shell: &Path, settings: &CaptureSettings) -> std::result::Result<String, String> {
    let mut cmd = Command::new(shell);
    cmd.args(&settings.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = settings
        .working_dir
        .clone()
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
    {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so a timeout can take down anything the
        // profile scripts started.
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| format!("spawn failed: {e}"))?;

    // Close stdin right away so nothing blocks waiting for input.
    drop(child.stdin.take());

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "stdout not captured".to_owned())?;
    let stdout_rx = drain(stdout);
    if let Some(stderr) = child.stderr.take() {
        // Keep the pipe empty; the content is not used.
        let _stderr_rx = drain(stderr);
    }

    let deadline = Instant::now() + settings.timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "login shell exited");
                break;
            }
            Ok(None) if Instant::now() >= deadline => {
                terminate(&mut child);
                return Err(format!("timed out after {:?}", settings.timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                terminate(&mut child);
                return Err(format!("wait failed: {e}"));
            }
        }
    }

    // A background job started by the profile can keep stdout open after
    // the shell exits; never wait past the deadline for it.
    let remaining = deadline.saturating_duration_since(Instant::now());
    let bytes = stdout_rx
        .recv_timeout(remaining.max(POLL_INTERVAL))
        .map_err(|_| "stdout did not close before the deadline".to_owned())?;
    String::from_utf8(bytes).map_err(|e| format!("output is not UTF-8: {e}"))
}

/// Read `pipe` to the end on a helper thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            debug!(error = %e, "login shell pipe read failed");
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Kill the shell (and its process group on unix), then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
                debug!(error = %e, "killpg on login shell failed");
            }
        }
    }
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill on login shell failed");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "reaping login shell failed");
    }
}
