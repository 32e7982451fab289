/// Log format detection and event extraction
///
/// Turns raw automation logs into canonical [`ParsedEvent`]s.
///
/// # Architecture
///
/// - `traits.rs`: Core traits for detectors and extractors
/// - `detector.rs`: Fixed-priority format classification over a sampled prefix
/// - `formats/`: One detector + extractor pair per supported input shape
/// - `metrics.rs`: Ingestion counters
///
/// # Degradation Guarantees
///
/// Extraction never fails on content:
/// - Lines that miss their format's grammar become low-confidence events
/// - Unrecognized input falls back to a single opaque event
/// - Only an empty input is rejected (at detection time)

pub mod traits;
pub mod detector;
pub mod metrics;
pub mod formats;
pub mod model;
mod ansi;
mod serde_utils;

pub use traits::{EventExtractor, ExtractContext, FormatDetector};
pub use detector::FormatDetectorOrchestrator;
pub use model::{Confidence, DetectionError, DetectionResult, FormatKind, ParsedEvent, event_type};
pub use ansi::strip_ansi_codes;

// Constants
pub const DETECTION_SAMPLE_SIZE: usize = 20; // Non-blank lines sampled for detection
pub const MAJORITY_THRESHOLD: f32 = 0.5;

/// Run the extractor registered for `format` over the whole text.
pub fn extract(format: FormatKind, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
    formats::extractor_for(format).extract(text, ctx)
}
