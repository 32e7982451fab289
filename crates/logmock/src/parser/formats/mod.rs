/// Individual input formats: one detector and one extractor each

pub mod json_events;
pub mod playbook;
pub mod system_log;
pub mod service_log;
pub mod structured;
pub mod opaque;

pub use json_events::{JsonEventsDetector, JsonEventsExtractor};
pub use playbook::{PlaybookDetector, PlaybookExtractor};
pub use system_log::{SystemLogDetector, SystemLogExtractor};
pub use service_log::{ServiceLogDetector, ServiceLogExtractor};
pub use structured::{StructuredDetector, StructuredExtractor};
pub use opaque::OpaqueExtractor;

use crate::parser::traits::{EventExtractor, FormatDetector, FormatKind};

/// A recognized format: its line predicate and the extractor it selects.
pub struct FormatEntry {
    pub detector: &'static dyn FormatDetector,
    pub extractor: &'static dyn EventExtractor,
}

/// Detection priority order. Adding a format inserts one entry here.
pub static FORMATS: &[FormatEntry] = &[
    FormatEntry { detector: &JsonEventsDetector, extractor: &JsonEventsExtractor },
    FormatEntry { detector: &PlaybookDetector, extractor: &PlaybookExtractor },
    FormatEntry { detector: &SystemLogDetector, extractor: &SystemLogExtractor },
    FormatEntry { detector: &ServiceLogDetector, extractor: &ServiceLogExtractor },
    FormatEntry { detector: &StructuredDetector, extractor: &StructuredExtractor },
];

static OPAQUE: OpaqueExtractor = OpaqueExtractor;

/// Extractor registered for a detected format; opaque when none is listed.
pub fn extractor_for(format: FormatKind) -> &'static dyn EventExtractor {
    FORMATS
        .iter()
        .find(|entry| entry.detector.format() == format)
        .map_or(&OPAQUE as &'static dyn EventExtractor, |entry| entry.extractor)
}

/// Non-blank lines with their 1-based line numbers.
///
/// A trailing `\r` is dropped; every other byte (leading indentation
/// included) is kept so messages stay byte-identical to the source.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.strip_suffix('\r').unwrap_or(line)))
        .filter(|(_, line)| !line.trim().is_empty())
}
