//! Sink module — terminal writers for replayed lines.
//!
//! `file.rs` appends timestamped lines to the output log.
//! `otlp.rs` posts each line to an OTLP/HTTP JSON collector.

pub mod file;
pub mod otlp;

pub use file::FileSink;
pub use otlp::OtlpSink;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("OTLP delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),
    #[error("OTLP collector returned HTTP {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    File,
    Otlp,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::File => f.write_str("file"),
            SinkKind::Otlp => f.write_str("otlp"),
        }
    }
}

/// Result of a single write. Sinks never propagate failures; the replay
/// worker decides from the sink kind whether a failure ends the session.
#[derive(Debug)]
pub enum SinkOutcome {
    Delivered,
    Failed(SinkError),
}

impl SinkOutcome {
    pub fn from_result(result: Result<(), SinkError>) -> Self {
        match result {
            Ok(()) => SinkOutcome::Delivered,
            Err(e) => SinkOutcome::Failed(e),
        }
    }
}

pub type SinkFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe async writer; one instance lives for one replay session.
pub trait Sink: Send {
    fn kind(&self) -> SinkKind;

    /// A failure of this sink makes the whole session fail.
    fn is_fatal(&self) -> bool {
        self.kind() == SinkKind::File
    }

    fn write_line<'a>(&'a mut self, source_id: &'a str, line: &'a str) -> SinkFuture<'a, SinkOutcome>;

    /// Flush and release resources. Called on every exit path.
    fn close(&mut self) -> SinkFuture<'_, Result<(), SinkError>>;
}
