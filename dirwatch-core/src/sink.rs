//! Delivery sinks: local relocation into `NzbDir` and remote push to a
//! [`QueueClient`]. Both report plain success/failure; nothing is raised
//! past this module.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::contract::{ArchiveReader, QueueClient, QueuedNzb};
use crate::patterns::{self, entry_base_name};
use crate::scan::CandidateKind;

/// Category value asking the remote queue to pick a category itself.
pub const AUTO_CATEGORY: &str = "*";

/// First free path for `file_name` in `target_dir`. On collision a
/// zero-padded counter goes in front of the extension: `a.nzb`,
/// `a.00001.nzb`, `a.00002.nzb`, ...
pub fn unique_destination(target_dir: &Path, file_name: &str) -> PathBuf {
    let first = target_dir.join(file_name);
    if !first.exists() {
        return first;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut index: u64 = 1;
    loop {
        let next = target_dir.join(format!("{stem}.{index:05}{ext}"));
        if !next.exists() {
            return next;
        }
        index += 1;
    }
}

const RELOCATE_ATTEMPTS: usize = 16;

/// Copies (or moves, when `move_source` is set) `source` into `target_dir`
/// under `file_name`, never overwriting. Returns the destination on success.
pub fn relocate(source: &Path, target_dir: &Path, file_name: &str, move_source: bool) -> Option<PathBuf> {
    for _ in 0..RELOCATE_ATTEMPTS {
        let destination = unique_destination(target_dir, file_name);
        match place(source, &destination, move_source) {
            Ok(()) => {
                info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    moved = move_source,
                    "Relocated NZB-File"
                );
                return Some(destination);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(destination = %destination.display(), "Destination taken meanwhile; picking the next name");
            }
            Err(e) => {
                error!(
                    source = %source.display(),
                    destination = %destination.display(),
                    error = ?e,
                    "Could not relocate NZB-File"
                );
                return None;
            }
        }
    }
    error!(
        source = %source.display(),
        target_dir = %target_dir.display(),
        "Could not find a free destination name"
    );
    None
}

/// Puts `source` at `destination`, failing with `AlreadyExists` instead of
/// replacing a file. A partial destination is removed on failure.
fn place(source: &Path, destination: &Path, move_source: bool) -> io::Result<()> {
    if !move_source {
        return copy_new(source, destination);
    }
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            // Different volume: fall back to copy + unlink.
            debug!(error = ?e, "Hard link failed; copying instead");
            copy_new(source, destination)?;
        }
    }
    fs::remove_file(source).inspect_err(|_| {
        let _ = fs::remove_file(destination);
    })
}

fn copy_new(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(destination)?;
    io::copy(&mut reader, &mut writer).map(|_| ()).inspect_err(|_| {
        let _ = fs::remove_file(destination);
    })
}

/// Archive entries already accepted by the remote queue, per archive.
///
/// Lets a retried archive skip the entries that went through on an earlier
/// attempt within the same process.
#[derive(Debug, Default)]
pub struct SubmissionLedger {
    accepted: HashMap<PathBuf, HashSet<[u8; 32]>>,
}

impl SubmissionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(nzb: &QueuedNzb) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(nzb.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(nzb.category.as_deref().unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(&nzb.content);
        hasher.finalize().into()
    }

    fn accepted_for(&self, archive: &Path) -> HashSet<[u8; 32]> {
        self.accepted.get(archive).cloned().unwrap_or_default()
    }

    pub fn record(&mut self, archive: &Path, nzb: &QueuedNzb) {
        self.accepted
            .entry(archive.to_path_buf())
            .or_default()
            .insert(Self::key(nzb));
    }

    pub fn forget(&mut self, archive: &Path) {
        self.accepted.remove(archive);
    }

    pub fn pending_archives(&self) -> usize {
        self.accepted.len()
    }
}

/// Everything the remote sink needs to push one marked candidate.
pub struct RemoteDelivery<'a> {
    /// Path the candidate currently lives at (with the handling suffix).
    pub marked: &'a Path,
    /// Path the candidate was discovered at.
    pub original: &'a Path,
    pub kind: CandidateKind,
    pub category: &'a str,
}

/// Pushes a marked candidate to the queue. Archives are pushed entry by
/// entry; any failed submission fails the whole delivery.
pub async fn push(
    delivery: RemoteDelivery<'_>,
    queue: &dyn QueueClient,
    archives: &dyn ArchiveReader,
    ledger: &mut SubmissionLedger,
) -> bool {
    let category = match delivery.category {
        AUTO_CATEGORY => None,
        other => Some(other.to_string()),
    };

    match delivery.kind {
        CandidateKind::JobFile => {
            let content = match fs::read(delivery.marked) {
                Ok(content) => content,
                Err(e) => {
                    error!(path = %delivery.marked.display(), error = ?e, "Could not read NZB-File");
                    return false;
                }
            };
            let nzb = QueuedNzb {
                name: patterns::file_name_str(delivery.original).to_string(),
                content,
                category,
            };
            submit_one(queue, nzb).await
        }
        CandidateKind::Archive => {
            let entries = match archives.list_entries(delivery.marked) {
                Ok(entries) => entries,
                Err(e) => {
                    error!(path = %delivery.marked.display(), error = %e, "Could not reopen archive");
                    return false;
                }
            };

            // Only entries accepted on an earlier attempt are skipped; identical
            // entries within one archive are each submitted.
            let earlier = ledger.accepted_for(delivery.original);
            for entry in entries.iter().filter(|name| patterns::is_job_file(name)) {
                let content = match archives.read_entry(delivery.marked, entry) {
                    Ok(content) => content,
                    Err(e) => {
                        error!(
                            path = %delivery.marked.display(),
                            entry = %entry,
                            error = %e,
                            "Could not read archive entry"
                        );
                        return false;
                    }
                };
                let nzb = QueuedNzb {
                    name: entry_base_name(entry).to_string(),
                    content,
                    category: category.clone(),
                };
                if earlier.contains(&SubmissionLedger::key(&nzb)) {
                    debug!(entry = %entry, "Entry already accepted on an earlier attempt; skipping");
                    continue;
                }
                if !submit_one(queue, nzb.clone()).await {
                    return false;
                }
                ledger.record(delivery.original, &nzb);
            }
            ledger.forget(delivery.original);
            true
        }
    }
}

async fn submit_one(queue: &dyn QueueClient, nzb: QueuedNzb) -> bool {
    let name = nzb.name.clone();
    let category = nzb.category.clone();
    match queue.submit(nzb).await {
        Ok(()) => {
            info!(file = %name, category = ?category, "Pushed NZB-File to remote queue");
            true
        }
        Err(e) => {
            error!(file = %name, category = ?category, error = %e, "Remote queue rejected NZB-File");
            false
        }
    }
}
