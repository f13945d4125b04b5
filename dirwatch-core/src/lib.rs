#![doc = "dirwatch-core: scan watch directories for NZB-Files and hand them over to NZBGet."]

//! This crate holds the whole ingestion pipeline: parsing watch paths, scanning,
//! filtering, archive inspection, the rename-based handling protocol and the
//! poll loop that drives it. Transport details for the remote queue and the
//! way configuration is gathered live in the `dirwatch` binary crate.
//!
//! # Usage
//! Build a [`config::WatchConfig`], wrap the collaborators in an
//! [`ingest::Pipeline`] and call [`poll::run_once`] or [`poll::run_forever`].

pub mod archive;
pub mod config;
pub mod contract;
pub mod error;
pub mod ingest;
pub mod lock;
pub mod pathspec;
pub mod patterns;
pub mod poll;
pub mod scan;
pub mod sink;

pub use config::{Mode, WatchConfig};
pub use error::WatchError;
pub use ingest::{CycleReport, Pipeline};
