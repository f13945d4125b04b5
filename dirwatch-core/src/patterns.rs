//! File name patterns shared by the scanner, the archive inspector and the
//! marker protocol. The handling suffix and its recognizer are defined once
//! here so marking and stale-marker cleanup can never disagree.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

/// Appended to a candidate's file name while it is being handled.
pub const HANDLING_SUFFIX: &str = ".dwhandling";

/// Strict job-file pattern; also applied to every entry inside an archive.
pub fn job_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?P<filename>.*)\.nzb$").expect("static regex"))
}

pub fn archive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?P<filename>.*)\.zip$").expect("static regex"))
}

/// Matches a job file or archive that carries the handling suffix.
pub fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^(?P<filename>.*)\.(nzb|zip){}$",
            regex::escape(HANDLING_SUFFIX)
        ))
        .expect("static regex")
    })
}

pub fn file_name_str(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

pub fn is_job_file(name: &str) -> bool {
    job_file_re().is_match(name)
}

pub fn is_archive(name: &str) -> bool {
    archive_re().is_match(name)
}

pub fn is_marked(name: &str) -> bool {
    name.ends_with(HANDLING_SUFFIX)
}

/// `/in/a.nzb` -> `/in/a.nzb.dwhandling`
pub fn marked_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(HANDLING_SUFFIX);
    PathBuf::from(raw)
}

/// Final path component of an archive entry name (`sub/dir/a.nzb` -> `a.nzb`).
pub fn entry_base_name(entry: &str) -> &str {
    entry
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(entry)
}
