//! Cache behaviour of [`ShellEnvLoader`] with scripted fake shells.

#![cfg(unix)]

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use acp_host::shell_env::{CallerContext, CaptureSettings, ShellEnvLoader};

fn fake_shell(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-shell");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

fn loader(shell: PathBuf) -> ShellEnvLoader {
    ShellEnvLoader::new(CaptureSettings {
        shell: Some(shell),
        timeout: Duration::from_secs(5),
        ..CaptureSettings::default()
    })
}

fn wait_for_cache(loader: &ShellEnvLoader) -> HashMap<String, String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(env) = loader.cached() {
            return env;
        }
        assert!(Instant::now() < deadline, "cache never warmed");
        std::thread::sleep(Duration::from_millis(10));
    }
}

// ── Interactive callers ──────────────────────────────────────

/// A cold interactive load does not wait for a slow shell.
#[test]
fn interactive_cold_load_does_not_block() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "sleep 1\necho LOGIN_ONLY=1");
    let loader = loader(shell);

    let start = Instant::now();
    let env = loader.load(CallerContext::Interactive);

    assert!(start.elapsed() < Duration::from_millis(50));
    assert!(!env.is_empty());
    assert!(!env.contains_key("LOGIN_ONLY"));

    let warmed = wait_for_cache(&loader);
    assert_eq!(warmed.get("LOGIN_ONLY").map(String::as_str), Some("1"));
}

#[test]
fn interactive_load_returns_warm_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "echo LOGIN_ONLY=1");
    let loader = loader(shell);

    let _ = loader.load(CallerContext::Background);
    let env = loader.load(CallerContext::Interactive);
    assert_eq!(env.get("LOGIN_ONLY").map(String::as_str), Some("1"));
}

// ── Background callers ───────────────────────────────────────

/// The shell runs once; later calls reuse its output.
#[test]
fn background_load_is_cached() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "echo PID=$$");
    let loader = loader(shell);

    let first = loader.load(CallerContext::Background);
    let second = loader.load(CallerContext::Background);

    assert!(first.contains_key("PID"));
    assert_eq!(first, second);
    assert_eq!(loader.cached(), Some(first));
}

#[test]
fn clones_share_one_cache() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "echo PID=$$");
    let loader = loader(shell);
    let clone = loader.clone();

    let env = loader.load(CallerContext::Background);
    assert_eq!(clone.cached(), Some(env));
}

// ── Invalidation ─────────────────────────────────────────────

#[test]
fn invalidate_triggers_a_fresh_capture() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "echo PID=$$");
    let loader = loader(shell);

    let before = loader.load(CallerContext::Background);
    loader.invalidate();
    let after = wait_for_cache(&loader);

    assert!(after.contains_key("PID"));
    assert_ne!(before.get("PID"), after.get("PID"));
}

/// Edits to the shell profile show up after invalidation.
#[test]
fn invalidate_picks_up_changed_profile() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "echo VERSION=1");
    let loader = loader(shell);
    assert_eq!(
        loader.load(CallerContext::Background).get("VERSION").map(String::as_str),
        Some("1")
    );

    fake_shell(dir.path(), "echo VERSION=2");
    loader.invalidate();
    let env = wait_for_cache(&loader);
    assert_eq!(env.get("VERSION").map(String::as_str), Some("2"));
}

// ── Async ────────────────────────────────────────────────────

#[tokio::test]
async fn load_async_runs_capture_off_the_runtime() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shell = fake_shell(dir.path(), "echo ASYNC=yes");
    let loader = loader(shell);

    let env = loader.load_async().await;
    assert_eq!(env.get("ASYNC").map(String::as_str), Some("yes"));
    assert!(loader.cached().is_some());
}
