use chrono::{DateTime, Utc};

pub use super::model::{
    Confidence, DetectionError, DetectionResult, FormatKind, ParsedEvent, event_type,
};

/// Per-format line predicate used by the detector orchestrator.
pub trait FormatDetector: Send + Sync {
    /// Does a single (ANSI-stripped, non-blank) line belong to this format?
    fn matches(&self, line: &str) -> bool;

    fn format(&self) -> FormatKind;

    fn detect(&self, sample: &[&str]) -> DetectionResult {
        let matched = sample.iter().filter(|line| self.matches(line)).count();
        DetectionResult::from_matches(self.format(), matched, sample.len())
    }

    /// Threshold the sampled prefix must reach for this format to win.
    fn accepts(&self, result: &DetectionResult) -> bool {
        result.is_majority()
    }
}

/// Values shared by every extractor for one ingestion.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext {
    /// Default timestamp for events whose source line carries none
    pub ingested_at: DateTime<Utc>,
}

impl ExtractContext {
    pub fn new(ingested_at: DateTime<Utc>) -> Self {
        Self { ingested_at }
    }
}

pub trait EventExtractor: Send + Sync {
    /// Turn the full source text into ordered canonical events.
    /// Never fails: lines that do not fit the format degrade to low-confidence events.
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent>;

    fn format(&self) -> FormatKind;
}
