//! Login-shell environment for spawned agents.
//!
//! Agents must see the user's real toolchain (`PATH` entries added by shell
//! profiles, language version managers, …), which a GUI- or service-launched
//! host process usually lacks. [`ShellEnvLoader`] runs the login shell once,
//! caches the result, and hands out copies.
//!
//! Latency-sensitive callers pass [`CallerContext::Interactive`]: they never
//! wait on the shell. On a cold cache they get the process environment and a
//! background refresh is started so the next call is warm.
//!
//! The cache lock is held only to read, clear, or store the value, never
//! across the shell run. Two cold [`CallerContext::Background`] callers may
//! both run the shell; both results are equivalent and the later write wins.

pub mod capture;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, warn};

pub use capture::CaptureSettings;

/// Where a [`ShellEnvLoader::load`] call comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerContext {
    /// UI or async-executor thread; must not block on the shell.
    Interactive,
    /// Worker thread that may block up to the capture timeout.
    Background,
}

#[derive(Debug, Default)]
struct CacheState {
    env: Option<HashMap<String, String>>,
    /// Bumped by every invalidation; stale captures are discarded.
    generation: u64,
    /// Generation a background refresh is currently computing.
    refreshing: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    settings: CaptureSettings,
    cache: Mutex<CacheState>,
}

/// Cached, thread-safe source of the login-shell environment.
///
/// Cloning is cheap; clones share one cache.
#[derive(Debug, Clone)]
pub struct ShellEnvLoader {
    inner: Arc<Inner>,
}

impl ShellEnvLoader {
    /// Create a loader with an empty cache.
    #[must_use]
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                cache: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Return the environment a spawned agent should inherit.
    ///
    /// Never fails and never blocks longer than the capture timeout.
    #[must_use]
    pub fn load(&self, context: CallerContext) -> HashMap<String, String> {
        let generation = {
            let state = self.lock();
            if let Some(env) = &state.env {
                return env.clone();
            }
            state.generation
        };

        match context {
            CallerContext::Interactive => {
                self.refresh_in_background();
                capture::process_env()
            }
            CallerContext::Background => {
                let env = capture::capture(&self.inner.settings);
                self.store(generation, env.clone());
                env
            }
        }
    }

    /// [`CallerContext::Background`] load run on tokio's blocking pool.
    pub async fn load_async(&self) -> HashMap<String, String> {
        let loader = self.clone();
        match tokio::task::spawn_blocking(move || loader.load(CallerContext::Background)).await {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "shell environment task failed, using process environment");
                capture::process_env()
            }
        }
    }

    /// The cached environment, if one is stored.
    #[must_use]
    pub fn cached(&self) -> Option<HashMap<String, String>> {
        self.lock().env.clone()
    }

    /// Drop the cached value and start a background reload.
    pub fn invalidate(&self) {
        {
            let mut state = self.lock();
            state.env = None;
            state.generation += 1;
        }
        debug!("shell environment cache invalidated");
        self.refresh_in_background();
    }

    /// Start a capture on a helper thread unless one is already running for
    /// the current generation.
    pub fn refresh_in_background(&self) {
        let generation = {
            let mut state = self.lock();
            if state.refreshing == Some(state.generation) {
                return;
            }
            state.refreshing = Some(state.generation);
            state.generation
        };

        let loader = self.clone();
        let spawned = thread::Builder::new()
            .name("shell-env".into())
            .spawn(move || {
                let env = capture::capture(&loader.inner.settings);
                loader.store(generation, env);
            });

        if let Err(e) = spawned {
            warn!(error = %e, "could not start shell environment refresh");
            let mut state = self.lock();
            if state.refreshing == Some(generation) {
                state.refreshing = None;
            }
        }
    }

    fn store(&self, generation: u64, env: HashMap<String, String>) {
        let mut state = self.lock();
        if state.refreshing == Some(generation) {
            state.refreshing = None;
        }
        if state.generation == generation {
            state.env = Some(env);
        } else {
            debug!("discarding shell environment captured before invalidation");
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ShellEnvLoader {
    fn default() -> Self {
        Self::new(CaptureSettings::default())
    }
}
