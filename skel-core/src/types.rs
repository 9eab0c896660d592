//! Domain types shared by the client, the sync engine and the CLI.
//!
//! Addresses and sample ids are newtypes over `u64`; they serialize as bare
//! integers so they can be used directly in wire payloads.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// An address in the analysed program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// The remote server's handle for a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(pub u64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SampleId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Which piece of analyst metadata an annotation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Comment,
    Name,
    Type,
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationKind::Comment => write!(f, "comment"),
            AnnotationKind::Name => write!(f, "name"),
            AnnotationKind::Type => write!(f, "type"),
        }
    }
}

/// One name, comment or type attached to an address.
///
/// `timestamp` is assigned by the server; locally originated annotations
/// carry `None` until the server echoes them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub address: Address,
    pub kind: AnnotationKind,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Annotation {
    pub fn local(address: impl Into<Address>, kind: AnnotationKind, payload: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            kind,
            payload: payload.into(),
            timestamp: None,
        }
    }

    pub fn remote(
        address: impl Into<Address>,
        kind: AnnotationKind,
        payload: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            address: address.into(),
            kind,
            payload: payload.into(),
            timestamp: Some(timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Query-string format the server expects for time-windowed fetches.
pub const QUERY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Timestamp boundary below which every remote annotation has been applied.
///
/// Starts at the Unix epoch and never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncWatermark(DateTime<Utc>);

impl Default for SyncWatermark {
    fn default() -> Self {
        Self::epoch()
    }
}

impl SyncWatermark {
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::default())
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    pub fn get(&self) -> DateTime<Utc> {
        self.0
    }

    /// Move the watermark forward to `candidate` if it is later.
    ///
    /// Returns `true` when the watermark moved.
    pub fn advance(&mut self, candidate: DateTime<Utc>) -> bool {
        if candidate > self.0 {
            self.0 = candidate;
            true
        } else {
            false
        }
    }

    /// Maximum timestamp of a batch, ignoring annotations without one.
    ///
    /// Server order is not timestamp order, so this folds the whole batch.
    pub fn batch_max<'a>(batch: impl IntoIterator<Item = &'a Annotation>) -> Option<DateTime<Utc>> {
        batch.into_iter().filter_map(|a| a.timestamp).max()
    }

    pub fn to_query(&self) -> String {
        self.0.format(QUERY_TIMESTAMP_FORMAT).to_string()
    }
}

impl fmt::Display for SyncWatermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.to_rfc3339().fmt(f)
    }
}

/// Parse a server timestamp.
///
/// The server emits `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`; offset-less values
/// are taken as UTC.
pub fn parse_server_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ---------------------------------------------------------------------------
// Sample identity
// ---------------------------------------------------------------------------

/// The binary currently opened in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub path: PathBuf,
    /// Lowercase MD5 hex digest of the file contents.
    pub md5: String,
}

impl InputFile {
    /// Hash the file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
        let mut hasher = Md5::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buf).map_err(|e| io_err(path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(Self {
            path: path.to_path_buf(),
            md5: hex::encode(hasher.finalize()),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Local hash plus the server id it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIdentity {
    pub local_file_hash: String,
    pub remote_sample_id: Option<SampleId>,
}

impl SampleIdentity {
    pub fn unresolved(local_file_hash: impl Into<String>) -> Self {
        Self {
            local_file_hash: local_file_hash.into().to_ascii_lowercase(),
            remote_sample_id: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.remote_sample_id.is_some()
    }
}

// ---------------------------------------------------------------------------
// Proposed names
// ---------------------------------------------------------------------------

/// A name suggested by the server for a function, for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedName {
    pub address: Address,
    /// Filled from the local workspace; the server does not know it.
    pub current_name: Option<String>,
    pub content_hash: u64,
    pub proposed_name: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
