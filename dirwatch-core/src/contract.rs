#![allow(unused)]

//! # contract: collaborator interfaces for the pipeline
//!
//! The pipeline talks to two things it does not own:
//! - a remote job queue ([`QueueClient`]), e.g. NZBGet's JSON-RPC API;
//! - an archive reader ([`ArchiveReader`]) that lists and reads entries.
//!
//! Both are treated as black boxes with success/failure results. Errors are
//! boxed trait objects so implementors can surface whatever their transport
//! produces; the pipeline only logs them.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; with the `test-export-mocks`
//!   feature (on by default) `MockQueueClient` and `MockArchiveReader` are
//!   available to integration tests of dependent crates.

use std::path::Path;

use async_trait::async_trait;
use mockall::{automock, predicate::*};

pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// One job file handed to the remote queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedNzb {
    /// Base file name, e.g. `movie.nzb`.
    pub name: String,
    /// Raw NZB content.
    pub content: Vec<u8>,
    /// `None` lets the queue pick a category from the content.
    pub category: Option<String>,
}

/// Remote queue that accepts NZB content.
///
/// `connect` is called once per watch directory before any submission;
/// `submit` once per job file (archives are submitted entry by entry).
/// Duplicate submissions are not guaranteed to be ignored by implementors.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Verify the queue is reachable and credentials are accepted.
    async fn connect(&self) -> Result<(), CollaboratorError>;

    /// Append one NZB to the queue.
    async fn submit(&self, nzb: QueuedNzb) -> Result<(), CollaboratorError>;
}

/// Lists and reads archive entries.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait ArchiveReader: Send + Sync {
    /// Entry names in archive order, directories included.
    fn list_entries(&self, path: &Path) -> Result<Vec<String>, CollaboratorError>;

    /// Raw (decompressed) bytes of one entry.
    fn read_entry(&self, path: &Path, name: &str) -> Result<Vec<u8>, CollaboratorError>;
}
