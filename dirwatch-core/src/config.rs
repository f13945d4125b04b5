use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::pathspec::WatchTarget;

pub const DEFAULT_MIN_AGE_SECS: u64 = 30;
pub const DEFAULT_MAX_ARCHIVE_SIZE_KB: u64 = 150;
pub const DEFAULT_POLL_TIME_SECS: u64 = 60;
pub const DEFAULT_MIN_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_LOCK_FILE_NAME: &str = "nzbget-dirwatch.lock";

/// What a cycle does with the candidates it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Log the intended action only; nothing on disk or remote changes.
    #[default]
    Preview,
    /// Relocate into `NzbDir`; targets with a category are pushed remotely.
    Move,
    /// Push every target to the remote queue.
    Remote,
}

impl FromStr for Mode {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preview" => Ok(Mode::Preview),
            "move" => Ok(Mode::Move),
            "remote" => Ok(Mode::Remote),
            _ => Err(WatchError::InvalidOption {
                option: "Mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Preview => "Preview",
            Mode::Move => "Move",
            Mode::Remote => "Remote",
        };
        f.write_str(name)
    }
}

/// Immutable settings for one watch run, built once and passed by reference.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Raw `directory[?opt=val&...]` entries.
    pub watch_paths: Vec<String>,
    pub nzb_dir: Option<PathBuf>,
    pub min_age: Duration,
    /// Zero disables archive handling altogether.
    pub max_archive_size_kb: u64,
    /// Zero runs a single cycle.
    pub poll_interval: Duration,
    pub min_poll_interval: Duration,
    pub auto_cleanup: bool,
    pub mode: Mode,
    pub lock_path: PathBuf,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            nzb_dir: None,
            min_age: Duration::from_secs(DEFAULT_MIN_AGE_SECS),
            max_archive_size_kb: DEFAULT_MAX_ARCHIVE_SIZE_KB,
            poll_interval: Duration::from_secs(DEFAULT_POLL_TIME_SECS),
            min_poll_interval: Duration::from_secs(DEFAULT_MIN_POLL_INTERVAL_SECS),
            auto_cleanup: false,
            mode: Mode::default(),
            lock_path: std::env::temp_dir().join(DEFAULT_LOCK_FILE_NAME),
        }
    }
}

impl WatchConfig {
    pub fn trace_loaded(&self) {
        info!(
            watch_paths = self.watch_paths.len(),
            nzb_dir = ?self.nzb_dir,
            mode = %self.mode,
            min_age_secs = self.min_age.as_secs(),
            max_archive_size_kb = self.max_archive_size_kb,
            poll_secs = self.poll_interval.as_secs(),
            auto_cleanup = self.auto_cleanup,
            "Loaded WatchConfig"
        );
        debug!(?self, "WatchConfig loaded (full debug)");
    }

    pub fn targets(&self) -> Vec<WatchTarget> {
        self.watch_paths
            .iter()
            .map(|raw| WatchTarget::parse(raw))
            .collect()
    }

    /// Category a target is pushed with. `None` means local relocation.
    pub fn effective_category(&self, target: &WatchTarget) -> Option<String> {
        match (&target.category, self.mode) {
            (Some(category), _) => Some(category.clone()),
            (None, Mode::Remote) => Some(crate::sink::AUTO_CATEGORY.to_string()),
            (None, _) => None,
        }
    }

    /// `None` for one-shot runs; clamps positive values below the minimum.
    pub fn effective_poll_interval(&self) -> Option<Duration> {
        if self.poll_interval.is_zero() {
            return None;
        }
        if self.poll_interval < self.min_poll_interval {
            warn!(
                configured_secs = self.poll_interval.as_secs(),
                minimum_secs = self.min_poll_interval.as_secs(),
                "PollTimeSec is below the minimum; clamping"
            );
            return Some(self.min_poll_interval);
        }
        Some(self.poll_interval)
    }

    /// Resolves the local relocation directory for the given targets.
    ///
    /// Returns `Ok(None)` when no target routes locally. Otherwise `NzbDir` has
    /// to be set and point at an existing directory.
    pub fn local_target_dir(&self, targets: &[WatchTarget]) -> Result<Option<PathBuf>, WatchError> {
        let needs_local = targets
            .iter()
            .any(|target| self.effective_category(target).is_none());
        if !needs_local {
            return Ok(self.nzb_dir.clone().filter(|dir| dir.is_dir()));
        }

        let nzb_dir = self
            .nzb_dir
            .as_deref()
            .ok_or(WatchError::MissingOption("NzbDir"))?;
        let nzb_dir = crate::pathspec::absolute_path(nzb_dir);
        if !Path::new(&nzb_dir).is_dir() {
            return Err(WatchError::TargetDirMissing(nzb_dir));
        }
        Ok(Some(nzb_dir))
    }
}
