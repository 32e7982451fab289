//! Source module — raw log payloads and the catalog replay resolves against.

pub mod catalog;

pub use catalog::{RefreshReport, SourceCatalog};

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a raw source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Posted by a user (or found in the uploads directory at boot)
    Uploaded,
    /// Sample file loaded from the sample directory at boot
    AutoLoaded,
    /// Synthetic `.jsonl` file produced by an external generator
    Generated,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Uploaded => "uploaded",
            SourceKind::AutoLoaded => "auto-loaded",
            SourceKind::Generated => "generated",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(SourceKind::Uploaded),
            "auto-loaded" => Ok(SourceKind::AutoLoaded),
            "generated" => Ok(SourceKind::Generated),
            other => Err(format!(
                "unknown source kind '{}' (expected uploaded, auto-loaded or generated)",
                other
            )),
        }
    }
}

/// Origin metadata supplied alongside a payload at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrigin {
    pub kind: SourceKind,
    pub identifier: String,
    pub discovered_at: DateTime<Utc>,
}

impl SourceOrigin {
    pub fn new(kind: SourceKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            discovered_at: Utc::now(),
        }
    }

    pub fn discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }
}

/// Immutable raw payload plus its origin.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub kind: SourceKind,
    pub identifier: String,
    pub discovered_at: DateTime<Utc>,
    payload: Bytes,
}

impl RawSource {
    pub fn new(origin: SourceOrigin, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: origin.kind,
            identifier: origin.identifier,
            discovered_at: origin.discovered_at,
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload as text; invalid UTF-8 sequences become U+FFFD.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Lines a replay emits: every non-blank line, trailing `\r` dropped,
    /// other whitespace kept.
    pub fn replay_lines(&self) -> Vec<String> {
        replay_lines(&self.text())
    }

    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }
}

pub(crate) fn replay_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
