//! Parses configured watch-path entries of the form `path[?opt=val&...]`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Option keys that set a target's category; the first one present wins.
pub const CATEGORY_KEYS: &[&str] = &["category", "cat", "c"];

/// One watched directory plus the options attached to its entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchTarget {
    pub directory: PathBuf,
    pub category: Option<String>,
}

impl WatchTarget {
    /// Never fails: anything that does not parse as `path?query` is taken as a
    /// bare path.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let bare = || WatchTarget {
            directory: absolute_path(&expand_path(raw)),
            category: None,
        };

        // A directory whose name contains '?' is still just a directory.
        if expand_path(raw).is_dir() {
            return bare();
        }

        let Some((path, query)) = raw.split_once('?') else {
            return bare();
        };
        let path = path.trim();
        if path.is_empty() {
            return bare();
        }

        let Some(options) = parse_query(query) else {
            debug!(entry = raw, "Malformed watch path options; treating entry as a bare path");
            return bare();
        };

        let category = options
            .iter()
            .find(|(key, _)| CATEGORY_KEYS.contains(&key.as_str()))
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty());

        WatchTarget {
            directory: absolute_path(&expand_path(path)),
            category,
        }
    }
}

/// `key=value` pairs in order of appearance, keys lower-cased.
/// Returns `None` when a fragment has no `=` or an empty key.
fn parse_query(query: &str) -> Option<Vec<(String, String)>> {
    let mut options = Vec::new();
    for fragment in query.split('&') {
        if fragment.trim().is_empty() {
            continue;
        }
        let (key, value) = fragment.split_once('=')?;
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        options.push((key, value.trim().to_string()));
    }
    Some(options)
}

/// Expands `~` and environment variables; unknown variables are left as-is.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

/// Joins relative paths onto the working directory. Does not touch the disk.
pub fn absolute_path(path: &Path) -> PathBuf {
    let path = expand_path(&path.to_string_lossy());
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

/// Splits a `WatchPaths` value on commas and newlines, dropping blanks and
/// duplicates while keeping the first occurrence.
pub fn split_path_list(raw: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for entry in raw.split([',', '\n', '\r']) {
        let entry = entry.trim();
        if entry.is_empty() || paths.iter().any(|p| p == entry) {
            continue;
        }
        paths.push(entry.to_string());
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_has_no_category() {
        let target = WatchTarget::parse("/srv/incoming");
        assert_eq!(target.directory, PathBuf::from("/srv/incoming"));
        assert_eq!(target.category, None);
    }

    #[test]
    fn category_is_read_from_any_alias() {
        for raw in [
            "/srv/in?category=movies",
            "/srv/in?cat=movies",
            "/srv/in?c=movies",
            "/srv/in?CATEGORY = movies ",
        ] {
            let target = WatchTarget::parse(raw);
            assert_eq!(target.directory, PathBuf::from("/srv/in"), "{raw}");
            assert_eq!(target.category.as_deref(), Some("movies"), "{raw}");
        }
    }

    #[test]
    fn first_category_option_wins() {
        let target = WatchTarget::parse("/srv/in?priority=1&cat=tv&category=movies");
        assert_eq!(target.category.as_deref(), Some("tv"));
    }

    #[test]
    fn blank_values_and_unknown_keys_are_allowed() {
        let target = WatchTarget::parse("/srv/in?foo=&category=");
        assert_eq!(target.directory, PathBuf::from("/srv/in"));
        assert_eq!(target.category, None);
    }

    #[test]
    fn malformed_query_falls_back_to_bare_path() {
        let target = WatchTarget::parse("/srv/in?what");
        assert_eq!(target.directory, PathBuf::from("/srv/in?what"));
        assert_eq!(target.category, None);

        let target = WatchTarget::parse("/srv/in?=movies");
        assert_eq!(target.directory, PathBuf::from("/srv/in?=movies"));
    }

    #[test]
    fn existing_directory_with_question_mark_is_taken_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let odd = tmp.path().join("odd?cat=tv");
        std::fs::create_dir(&odd).unwrap();

        let target = WatchTarget::parse(odd.to_str().unwrap());
        assert_eq!(target.directory, odd);
        assert_eq!(target.category, None);
    }

    #[test]
    fn relative_paths_become_absolute() {
        let target = WatchTarget::parse("incoming?c=tv");
        assert!(target.directory.is_absolute());
        assert!(target.directory.ends_with("incoming"));
    }

    #[test]
    fn path_list_splits_trims_and_dedupes() {
        let paths = split_path_list(" /a , /b\n/a,, /c?cat=tv ");
        assert_eq!(paths, vec!["/a", "/b", "/c?cat=tv"]);
    }
}
