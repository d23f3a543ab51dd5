// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Per-test isolation: directories and environment overlay.
//!
//! Every test gets a fresh configuration directory and working directory,
//! a cleared cache, and an environment overlay that disables background
//! features (auto-update, runtime installation) unless the test explicitly
//! re-enables them. No state allocated for one test is ever visible to
//! another.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::HarnessError;

/// Environment contract honored by the binary under test.
pub const ENV_CONFIG_DIR: &str = "CLI_CONFIGDIR";
pub const ENV_DISABLE_UPDATES: &str = "CLI_DISABLE_UPDATES";
pub const ENV_DISABLE_RUNTIME: &str = "CLI_DISABLE_RUNTIME";
pub const ENV_AUTO_UPDATE_TIMEOUT: &str = "CLI_AUTO_UPDATE_TIMEOUT";
pub const ENV_UPDATE_BRANCH: &str = "CLI_UPDATE_BRANCH";

/// Feature switches applied to the child environment.
///
/// Defaults are the most isolated, deterministic values: background
/// auto-update and automatic runtime installation both disabled. Tests that
/// target those features flip the named field instead of mutating globals.
#[derive(Debug, Clone)]
pub struct FeatureToggles {
    pub disable_updates: bool,
    pub disable_runtime: bool,
    /// Bound, in seconds, for the binary's own auto-update check.
    pub auto_update_timeout_secs: Option<u64>,
    /// Update channel override for update-specific tests.
    pub update_branch: Option<String>,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            disable_updates: true,
            disable_runtime: true,
            auto_update_timeout_secs: None,
            update_branch: None,
        }
    }
}

impl FeatureToggles {
    pub fn with_updates_enabled(mut self) -> Self {
        self.disable_updates = false;
        self
    }

    pub fn with_runtime_enabled(mut self) -> Self {
        self.disable_runtime = false;
        self
    }

    pub fn with_auto_update_timeout(mut self, secs: u64) -> Self {
        self.auto_update_timeout_secs = Some(secs);
        self
    }

    pub fn with_update_branch(mut self, branch: impl Into<String>) -> Self {
        self.update_branch = Some(branch.into());
        self
    }
}

/// Isolated per-test environment. Dropping it discards the directories.
pub struct TestEnvironment {
    config_dir: TempDir,
    work_dir: TempDir,
    overlay: Vec<(String, String)>,
}

impl TestEnvironment {
    /// Default isolation: fresh directories, cleared platform cache,
    /// background features disabled.
    pub fn isolate() -> Result<Self, HarnessError> {
        Self::with_options(FeatureToggles::default(), default_cache_dir())
    }

    /// Default cache handling with explicit feature toggles.
    pub fn isolate_with(toggles: FeatureToggles) -> Result<Self, HarnessError> {
        Self::with_options(toggles, default_cache_dir())
    }

    /// Isolation with explicit toggles and cache location. `cache_dir` is
    /// removed if it exists; `None` skips cache clearing.
    pub fn with_options(
        toggles: FeatureToggles,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, HarnessError> {
        let config_dir = TempDir::new()?;
        let work_dir = TempDir::new()?;

        if let Some(cache) = cache_dir {
            clear_dir(&cache)?;
        }

        let mut env = Self {
            config_dir,
            work_dir,
            overlay: Vec::new(),
        };
        env.set_var(ENV_CONFIG_DIR, env.config_dir.path().display().to_string());
        env.set_var(ENV_DISABLE_UPDATES, bool_var(toggles.disable_updates));
        env.set_var(ENV_DISABLE_RUNTIME, bool_var(toggles.disable_runtime));
        if let Some(secs) = toggles.auto_update_timeout_secs {
            env.set_var(ENV_AUTO_UPDATE_TIMEOUT, secs.to_string());
        }
        if let Some(branch) = toggles.update_branch {
            env.set_var(ENV_UPDATE_BRANCH, branch);
        }
        Ok(env)
    }

    /// The fresh configuration directory for this test.
    pub fn config_dir(&self) -> &Path {
        self.config_dir.path()
    }

    /// The fresh working directory for this test.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// The environment overlay applied to every child this test spawns.
    pub fn overlay(&self) -> &[(String, String)] {
        &self.overlay
    }

    /// Set one overlay variable. Keys are unique; setting an existing name
    /// replaces its value.
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.overlay.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.overlay.push((name, value));
        }
    }

    /// Look up an overlay variable by name.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.overlay
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn bool_var(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// The well-known cache location of the binary under test.
fn default_cache_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        let base = std::env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
        Some(base.join("cli"))
    }
    #[cfg(not(unix))]
    {
        std::env::var_os("LOCALAPPDATA").map(|base| PathBuf::from(base).join("cli").join("cache"))
    }
}

fn clear_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
