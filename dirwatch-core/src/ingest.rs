//! One watch cycle: scan → age filter → stale-marker sweep → archive
//! inspection → handle every surviving candidate.
//!
//! Handling follows a two-phase protocol. A candidate is first renamed to
//! carry [`HANDLING_SUFFIX`](crate::patterns::HANDLING_SUFFIX); only a
//! successful rename lets it reach a sink. If the sink fails, the rename is
//! reverted so the next cycle finds the file again. A crash in between
//! leaves the suffixed file behind, which the stale-marker sweep recognises.
//!
//! # Error Handling
//! Configuration problems end the cycle with a [`WatchError`]. Missing
//! directories, an unreachable remote queue and per-candidate failures are
//! logged, recorded in the [`CycleReport`] and do not stop the cycle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::archive::inspect_archives;
use crate::config::{Mode, WatchConfig};
use crate::contract::{ArchiveReader, QueueClient};
use crate::error::WatchError;
use crate::pathspec::WatchTarget;
use crate::patterns;
use crate::scan::{self, Candidate, CandidateKind};
use crate::sink::{self, RemoteDelivery, SubmissionLedger};

/// Where a candidate ended up after handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Preview mode: intended action logged, nothing touched.
    Previewed,
    /// Accepted by a sink. `destination` is set for local relocation.
    Delivered { destination: Option<PathBuf> },
    /// Sink failed and the marker was reverted; retried next cycle.
    RolledBack,
    /// Could not be marked (usually permissions); left where it was.
    MarkFailed,
    /// Sink failed and the marker could not be reverted either.
    Stranded { marked: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingDirectory,
    NoRemoteQueue,
    ConnectFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub path: PathBuf,
    pub kind: CandidateKind,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub directory: PathBuf,
    pub category: Option<String>,
    pub skipped: Option<SkipReason>,
    pub candidates: Vec<CandidateReport>,
}

impl TargetReport {
    fn new(target: &WatchTarget, category: Option<String>) -> Self {
        Self {
            directory: target.directory.clone(),
            category,
            skipped: None,
            candidates: Vec::new(),
        }
    }

    fn skipped(mut self, reason: SkipReason) -> Self {
        self.skipped = Some(reason);
        self
    }
}

/// Result of one cycle across all watch targets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub targets: Vec<TargetReport>,
}

impl CycleReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &CandidateReport> {
        self.targets.iter().flat_map(|t| t.candidates.iter())
    }

    pub fn delivered(&self) -> usize {
        self.outcomes()
            .filter(|c| matches!(c.outcome, Outcome::Delivered { .. }))
            .count()
    }

    pub fn rolled_back(&self) -> usize {
        self.outcomes()
            .filter(|c| matches!(c.outcome, Outcome::RolledBack))
            .count()
    }
}

enum Route<'r> {
    Local(&'r Path),
    Remote(&'r str),
}

/// The collaborators a cycle needs, plus state kept between cycles.
pub struct Pipeline<'a> {
    archives: &'a dyn ArchiveReader,
    queue: Option<&'a dyn QueueClient>,
    ledger: SubmissionLedger,
}

impl<'a> Pipeline<'a> {
    /// `queue` may be `None` when no remote API is configured; targets that
    /// need it are then skipped.
    pub fn new(archives: &'a dyn ArchiveReader, queue: Option<&'a dyn QueueClient>) -> Self {
        Self {
            archives,
            queue,
            ledger: SubmissionLedger::new(),
        }
    }

    /// Runs one full cycle over every configured watch target.
    pub async fn run_cycle(&mut self, config: &WatchConfig) -> Result<CycleReport, WatchError> {
        let targets = config.targets();
        let mut report = CycleReport::default();
        if targets.is_empty() {
            warn!("[WATCH] No watch paths configured");
            return Ok(report);
        }

        let nzb_dir = config.local_target_dir(&targets).map_err(|e| {
            error!(error = %e, "[WATCH] Invalid configuration; aborting cycle");
            e
        })?;
        if let Some(dir) = &nzb_dir {
            info!(target_dir = %dir.display(), "[WATCH] Target directory set");
        }

        for target in &targets {
            let target_report = self.watch_target(config, target, nzb_dir.as_deref()).await;
            report.targets.push(target_report);
        }

        info!(
            targets = report.targets.len(),
            delivered = report.delivered(),
            rolled_back = report.rolled_back(),
            "[WATCH] Cycle complete"
        );
        Ok(report)
    }

    async fn watch_target(
        &mut self,
        config: &WatchConfig,
        target: &WatchTarget,
        nzb_dir: Option<&Path>,
    ) -> TargetReport {
        let category = config.effective_category(target);
        let report = TargetReport::new(target, category.clone());
        let dir = target.directory.as_path();

        let found = match scan::scan_directory(dir, &scan::scan_patterns(config)) {
            Ok(found) => found,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "[WATCH] Source directory unavailable; skipping");
                return report.skipped(SkipReason::MissingDirectory);
            }
        };
        let aged = scan::filter_by_age(found, config.min_age, SystemTime::now());
        let remove_markers = config.auto_cleanup && config.mode != Mode::Preview;
        let unmarked = scan::sweep_stale_markers(aged, remove_markers);
        let active = inspect_archives(unmarked, config.max_archive_size_kb, self.archives);

        if active.is_empty() {
            debug!(dir = %dir.display(), "[WATCH] No NZB-Files found in directory; skipping");
            return report;
        }

        if config.mode == Mode::Preview {
            return preview(report, &active, category.as_deref(), nzb_dir);
        }

        match category.as_deref() {
            Some(category) => self.push_target(report, &active, category, config).await,
            None => {
                let Some(nzb_dir) = nzb_dir else {
                    // local_target_dir() guarantees this for local targets
                    error!(dir = %dir.display(), "[WATCH] No target directory for local relocation");
                    return report;
                };
                self.handle_all(report, &active, Route::Local(nzb_dir), config).await
            }
        }
    }

    async fn push_target(
        &mut self,
        report: TargetReport,
        active: &[Candidate],
        category: &str,
        config: &WatchConfig,
    ) -> TargetReport {
        let Some(queue) = self.queue else {
            warn!(
                dir = %report.directory.display(),
                category,
                "[WATCH] Category set but no remote queue configured; skipping directory"
            );
            return report.skipped(SkipReason::NoRemoteQueue);
        };
        if let Err(e) = queue.connect().await {
            warn!(
                dir = %report.directory.display(),
                category,
                error = %e,
                "[WATCH] Could not connect to remote queue; skipping directory"
            );
            return report.skipped(SkipReason::ConnectFailed);
        }
        self.handle_all(report, active, Route::Remote(category), config).await
    }

    async fn handle_all(
        &mut self,
        mut report: TargetReport,
        active: &[Candidate],
        route: Route<'_>,
        config: &WatchConfig,
    ) -> TargetReport {
        for candidate in active {
            let outcome = self.handle(candidate, &route, config).await;
            report.candidates.push(CandidateReport {
                path: candidate.path.clone(),
                kind: candidate.kind,
                outcome,
            });
        }
        report
    }

    /// Discovered → Marked → Delivered | RolledBack.
    async fn handle(&mut self, candidate: &Candidate, route: &Route<'_>, config: &WatchConfig) -> Outcome {
        let original = candidate.path.as_path();
        let marked = patterns::marked_path(original);

        match mark(original, &marked) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                error!(
                    path = %original.display(),
                    marked = %marked.display(),
                    "A handling marker with this name already exists; leaving both files in place"
                );
                return Outcome::MarkFailed;
            }
            Err(e) => {
                error!(
                    path = %original.display(),
                    error = ?e,
                    "Could not mark file for handling; check permissions"
                );
                return Outcome::MarkFailed;
            }
        }
        debug!(path = %original.display(), marked = %marked.display(), "Marked file for handling");

        let delivered = match route {
            Route::Local(target_dir) => {
                sink::relocate(&marked, target_dir, candidate.file_name(), config.auto_cleanup)
                    .map(Some)
            }
            Route::Remote(category) => {
                let delivery = RemoteDelivery {
                    marked: &marked,
                    original,
                    kind: candidate.kind,
                    category,
                };
                let Some(queue) = self.queue else {
                    return rollback(&marked, original);
                };
                sink::push(delivery, queue, self.archives, &mut self.ledger)
                    .await
                    .then_some(None)
            }
        };

        let Some(destination) = delivered else {
            return rollback(&marked, original);
        };

        if config.auto_cleanup && marked.exists() {
            match fs::remove_file(&marked) {
                Ok(()) => debug!(path = %marked.display(), "Removed handled file"),
                Err(e) => warn!(path = %marked.display(), error = ?e, "Could not remove handled file"),
            }
        }
        Outcome::Delivered { destination }
    }
}

/// Renames `original` to `marked`, refusing to replace an existing marker.
fn mark(original: &Path, marked: &Path) -> io::Result<()> {
    match fs::hard_link(original, marked) {
        Ok(()) => fs::remove_file(original).inspect_err(|_| {
            let _ = fs::remove_file(marked);
        }),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            // No hard links on this filesystem.
            debug!(path = %original.display(), error = ?e, "Hard link failed; renaming instead");
            if marked.exists() {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }
            fs::rename(original, marked)
        }
    }
}

/// Reverts a marker so the candidate is rediscovered next cycle.
fn rollback(marked: &Path, original: &Path) -> Outcome {
    if original.exists() {
        error!(
            marked = %marked.display(),
            original = %original.display(),
            "Cannot roll back: original name is taken again"
        );
        return Outcome::Stranded {
            marked: marked.to_path_buf(),
        };
    }
    match fs::rename(marked, original) {
        Ok(()) => {
            warn!(path = %original.display(), "Delivery failed; rolled back for the next cycle");
            Outcome::RolledBack
        }
        Err(e) => {
            error!(
                marked = %marked.display(),
                original = %original.display(),
                error = ?e,
                "Delivery failed and roll back failed"
            );
            Outcome::Stranded {
                marked: marked.to_path_buf(),
            }
        }
    }
}

fn preview(
    mut report: TargetReport,
    active: &[Candidate],
    category: Option<&str>,
    nzb_dir: Option<&Path>,
) -> TargetReport {
    for candidate in active {
        match (category, nzb_dir) {
            (Some(category), _) => info!(
                path = %candidate.path.display(),
                category,
                "PREVIEW ONLY: would push to remote queue"
            ),
            (None, Some(dir)) => info!(
                path = %candidate.path.display(),
                destination = %sink::unique_destination(dir, candidate.file_name()).display(),
                "PREVIEW ONLY: would relocate"
            ),
            (None, None) => info!(path = %candidate.path.display(), "PREVIEW ONLY: would relocate"),
        }
        report.candidates.push(CandidateReport {
            path: candidate.path.clone(),
            kind: candidate.kind,
            outcome: Outcome::Previewed,
        });
    }
    report
}
