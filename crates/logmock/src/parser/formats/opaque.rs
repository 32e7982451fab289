use crate::parser::traits::*;

/// Whole input as a single event. No detector: this is what the
/// orchestrator returns when nothing else qualifies.
pub struct OpaqueExtractor;

impl EventExtractor for OpaqueExtractor {
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let start_line = text
            .lines()
            .position(|line| !line.trim().is_empty())
            .map_or(1, |idx| idx + 1);

        vec![ParsedEvent {
            level: Some("INFO".to_string()),
            ..ParsedEvent::low_confidence(1, start_line, ctx.ingested_at, text)
        }]
    }

    fn format(&self) -> FormatKind {
        FormatKind::OpaqueFallback
    }
}
