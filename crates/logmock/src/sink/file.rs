use std::path::{Path, PathBuf};

use chrono::{Local, SecondsFormat};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{Sink, SinkError, SinkFuture, SinkKind, SinkOutcome};

/// Appends `<RFC 3339 timestamp with offset> <line>\n` to the output log.
///
/// The handle is opened once per session and flushed after every line so a
/// tailing collector sees each write immediately.
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Open (creating if needed) the output file in append mode.
    /// Parent directories must already exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| SinkError::Open {
                path: path.display().to_string(),
                source,
            })?;

        Ok(Self { path, file: Some(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&mut self, line: &str) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or_else(|| {
            SinkError::Write(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed"))
        })?;
        let record = format_record(line);
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Output-log record for one replayed line.
pub fn format_record(line: &str) -> String {
    format!("{} {}\n", Local::now().to_rfc3339_opts(SecondsFormat::Millis, false), line)
}

impl Sink for FileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::File
    }

    fn write_line<'a>(&'a mut self, _source_id: &'a str, line: &'a str) -> SinkFuture<'a, SinkOutcome> {
        Box::pin(async move { SinkOutcome::from_result(self.append(line).await) })
    }

    fn close(&mut self) -> SinkFuture<'_, Result<(), SinkError>> {
        Box::pin(async move {
            if let Some(mut file) = self.file.take() {
                file.flush().await?;
                file.sync_all().await?;
            }
            Ok(())
        })
    }
}
