//! Archive inspection: only pure archives (every entry a job file) under the
//! size ceiling stay in the active candidate set.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, error, warn};
use zip::ZipArchive;

use crate::contract::{ArchiveReader, CollaboratorError};
use crate::patterns;
use crate::scan::{Candidate, CandidateKind};

/// [`ArchiveReader`] backed by the `zip` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveReader;

impl ArchiveReader for ZipArchiveReader {
    fn list_entries(&self, path: &Path) -> Result<Vec<String>, CollaboratorError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            names.push(entry.name().to_string());
        }
        Ok(names)
    }

    fn read_entry(&self, path: &Path, name: &str) -> Result<Vec<u8>, CollaboratorError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        let mut entry = archive.by_name(name)?;
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        Ok(content)
    }
}

/// Why an archive was left out of handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    TooLarge,
    Unreadable(String),
    NoEntries,
    Contaminated { foreign: Vec<String> },
}

/// Checks a single archive. Size is tested first so nothing is opened when
/// the archive is empty on disk or over the ceiling.
pub fn inspect_archive(
    candidate: &Candidate,
    max_archive_size_kb: u64,
    reader: &dyn ArchiveReader,
) -> Result<(), Rejection> {
    let size_kb = candidate.size_bytes as f64 / 1000.0;
    if size_kb <= 0.0 {
        return Err(Rejection::Empty);
    }
    if size_kb >= max_archive_size_kb as f64 {
        return Err(Rejection::TooLarge);
    }

    let entries = reader
        .list_entries(&candidate.path)
        .map_err(|e| Rejection::Unreadable(e.to_string()))?;
    if entries.is_empty() {
        return Err(Rejection::NoEntries);
    }

    let foreign: Vec<String> = entries
        .into_iter()
        .filter(|name| !patterns::is_job_file(name))
        .collect();
    if !foreign.is_empty() {
        return Err(Rejection::Contaminated { foreign });
    }
    Ok(())
}

/// Drops rejected archives from `candidates`; job files pass through.
/// With `max_archive_size_kb == 0` every archive is dropped.
pub fn inspect_archives(
    candidates: Vec<Candidate>,
    max_archive_size_kb: u64,
    reader: &dyn ArchiveReader,
) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| {
            if candidate.kind != CandidateKind::Archive {
                return true;
            }
            if max_archive_size_kb == 0 {
                return false;
            }
            match inspect_archive(candidate, max_archive_size_kb, reader) {
                Ok(()) => {
                    debug!(path = %candidate.path.display(), "Archive contains only NZB-Files");
                    true
                }
                Err(Rejection::Empty) | Err(Rejection::TooLarge) => {
                    debug!(
                        path = %candidate.path.display(),
                        size_bytes = candidate.size_bytes,
                        max_archive_size_kb,
                        "Archive size outside accepted range; skipping"
                    );
                    false
                }
                Err(Rejection::Unreadable(reason)) => {
                    error!(
                        path = %candidate.path.display(),
                        error = %reason,
                        "Could not open archive; excluding it"
                    );
                    false
                }
                Err(Rejection::NoEntries) => {
                    warn!(path = %candidate.path.display(), "Archive has no entries; excluding it");
                    false
                }
                Err(Rejection::Contaminated { foreign }) => {
                    warn!(
                        path = %candidate.path.display(),
                        ?foreign,
                        "Archive has non-job-file contamination; leaving it untouched"
                    );
                    false
                }
            }
        })
        .collect()
}
