//! Candidate discovery: directory scan, age filter and stale-marker sweep.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::patterns::{self, file_name_str};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateKind {
    JobFile,
    Archive,
}

/// A file found in a watch directory during the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified_at: SystemTime,
    pub size_bytes: u64,
    pub kind: CandidateKind,
}

impl Candidate {
    pub fn file_name(&self) -> &str {
        file_name_str(&self.path)
    }

    /// Left behind by a cycle that renamed the file but never finished.
    pub fn is_stale_marker(&self) -> bool {
        patterns::is_marked(self.file_name())
    }
}

/// Patterns a scan of one watch directory looks for.
pub fn scan_patterns(config: &WatchConfig) -> Vec<&'static Regex> {
    let mut res = vec![patterns::job_file_re(), patterns::marker_re()];
    if config.max_archive_size_kb > 0 {
        res.push(patterns::archive_re());
    }
    res
}

/// Lists the immediate children of `dir` whose names match one of `patterns`.
/// Directories are never returned. Results are ordered by path.
pub fn scan_directory(dir: &Path, patterns: &[&Regex]) -> Result<Vec<Candidate>, WatchError> {
    if !dir.is_dir() {
        return Err(WatchError::SourceDirMissing(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|e| WatchError::io("read_dir", dir, e))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %dir.display(), error = ?e, "Failed to read directory entry");
                continue;
            }
        };
        let path = entry.path();
        let name = file_name_str(&path);
        if !patterns.iter().any(|re| re.is_match(name)) {
            continue;
        }

        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %path.display(), error = ?e, "Skipping entry without metadata");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        let modified_at = match meta.modified() {
            Ok(modified) => modified,
            Err(e) => {
                error!(path = %path.display(), error = ?e, "Modification time unavailable");
                continue;
            }
        };

        let bare_name = name.strip_suffix(patterns::HANDLING_SUFFIX).unwrap_or(name);
        let kind = if patterns::is_archive(bare_name) {
            CandidateKind::Archive
        } else {
            CandidateKind::JobFile
        };

        found.push(Candidate {
            path,
            modified_at,
            size_bytes: meta.len(),
            kind,
        });
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(dir = %dir.display(), count = found.len(), "Scanned watch directory");
    Ok(found)
}

/// Keeps only candidates modified strictly before `now - min_age`.
pub fn filter_by_age(candidates: Vec<Candidate>, min_age: Duration, now: SystemTime) -> Vec<Candidate> {
    let reference = now.checked_sub(min_age).unwrap_or(UNIX_EPOCH);
    candidates
        .into_iter()
        .filter(|candidate| {
            let old_enough = candidate.modified_at < reference;
            if !old_enough {
                debug!(path = %candidate.path.display(), "Too new to process; skipping this cycle");
            }
            old_enough
        })
        .collect()
}

/// Removes handling markers from the active set, deleting them from disk when
/// `auto_cleanup` is on. A marker is never handled again either way.
pub fn sweep_stale_markers(candidates: Vec<Candidate>, auto_cleanup: bool) -> Vec<Candidate> {
    let (stale, active): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(Candidate::is_stale_marker);

    for marker in stale {
        if !auto_cleanup {
            debug!(path = %marker.path.display(), "Leaving handled marker in place");
            continue;
        }
        match fs::remove_file(&marker.path) {
            Ok(()) => info!(path = %marker.path.display(), "Removed stale handling marker"),
            Err(e) => warn!(
                path = %marker.path.display(),
                error = ?e,
                "Could not remove stale handling marker"
            ),
        }
    }
    active
}
