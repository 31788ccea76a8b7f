use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A single media file.
    File,
    /// A whole directory subtree collapsed into one transfer unit.
    Album,
}

/// An atomic, sized, path-identified item of the library. Units are created
/// by the scanner and only ever moved between catalogs after that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaUnit {
    pub kind: MediaKind,
    /// Path relative to the scanned root; doubles as the catalog key.
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl MediaUnit {
    pub fn file(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            kind: MediaKind::File,
            path: path.into(),
            size_bytes,
        }
    }

    pub fn album(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            kind: MediaKind::Album,
            path: path.into(),
            size_bytes,
        }
    }
}

/// Live total/free statistics of the device backing the destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DeviceSnapshot {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl DeviceSnapshot {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Delete everything unwanted first, then copy.
    #[default]
    Sequential,
    /// Interleave deletes with copies, driven by live free-space polls.
    Mixed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpAction {
    Delete,
    Copy,
}

/// A copy or delete that failed mid-run. Failures are collected, not
/// propagated; the remaining items still execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpFailure {
    pub action: OpAction,
    pub path: String,
    pub error: String,
}

/// Summary of one full synchronization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncReport {
    pub strategy: SyncStrategy,
    pub dry_run: bool,
    pub source_items: usize,
    pub source_bytes: u64,
    pub destination_items: usize,
    pub destination_bytes: u64,
    pub orphans: Vec<String>,
    pub orphan_bytes: u64,
    pub orphans_deleted: bool,
    pub keep_count: usize,
    pub kept_items: usize,
    pub kept_bytes: u64,
    pub target_bytes: u64,
    pub selected_items: usize,
    pub selected_bytes: u64,
    pub deleted_items: usize,
    pub deleted_bytes: u64,
    pub copied_items: usize,
    pub copied_bytes: u64,
    /// Logical media bytes at the destination once the run is done: the
    /// resident selection plus the kept quota plus everything copied.
    pub destination_media_bytes: u64,
    pub device_before: DeviceSnapshot,
    pub device_after: DeviceSnapshot,
    pub failures: Vec<OpFailure>,
}
