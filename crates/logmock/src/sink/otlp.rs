use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use super::{Sink, SinkError, SinkFuture, SinkKind, SinkOutcome};

pub const DEFAULT_SERVICE_NAME: &str = "logmock";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts every line as one OTLP/HTTP JSON log record. Best effort: a
/// delivery failure is reported to the caller and never retried.
pub struct OtlpSink {
    client: reqwest::Client,
    endpoint: String,
    service_name: String,
}

impl OtlpSink {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            service_name: service_name.into(),
        }
    }

    /// Client with the per-request timeout applied.
    pub fn client(timeout: Duration) -> Result<reqwest::Client, SinkError> {
        Ok(reqwest::Client::builder().timeout(timeout).build()?)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, source_id: &str, line: &str) -> Result<(), SinkError> {
        let payload = log_record(&self.service_name, source_id, line, unix_nanos());
        let response = self.client.post(&self.endpoint).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// `resourceLogs → scopeLogs → logRecords` envelope carrying one line.
pub fn log_record(service_name: &str, source_id: &str, line: &str, time_unix_nano: u128) -> Value {
    json!({
        "resourceLogs": [{
            "resource": {
                "attributes": [
                    { "key": "service.name", "value": { "stringValue": service_name } }
                ]
            },
            "scopeLogs": [{
                "scope": { "name": service_name },
                "logRecords": [{
                    // fixed64 fields are strings in OTLP JSON
                    "timeUnixNano": time_unix_nano.to_string(),
                    "body": { "stringValue": line },
                    "attributes": [
                        { "key": "source", "value": { "stringValue": source_id } }
                    ]
                }]
            }]
        }]
    })
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

impl Sink for OtlpSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Otlp
    }

    fn write_line<'a>(&'a mut self, source_id: &'a str, line: &'a str) -> SinkFuture<'a, SinkOutcome> {
        Box::pin(async move { SinkOutcome::from_result(self.post(source_id, line).await) })
    }

    fn close(&mut self) -> SinkFuture<'_, Result<(), SinkError>> {
        Box::pin(async { Ok(()) })
    }
}
