use super::ansi::strip_ansi_codes;
use super::traits::*;
use super::formats::{FormatEntry, FORMATS};

/// Fixed-priority format classifier
/// 1. Sample a bounded prefix of non-blank lines (ANSI stripped)
/// 2. Run detectors in priority order
/// 3. First detector whose threshold is reached wins; no backtracking
/// 4. Nothing matched → opaque fallback
pub struct FormatDetectorOrchestrator {
    entries: &'static [FormatEntry],
    sample_size: usize,
}

impl FormatDetectorOrchestrator {
    pub fn new() -> Self {
        Self::with_sample_size(super::DETECTION_SAMPLE_SIZE)
    }

    pub fn with_sample_size(sample_size: usize) -> Self {
        Self {
            entries: FORMATS,
            sample_size: sample_size.max(1),
        }
    }

    /// Classify the whole text by its sampled prefix.
    pub fn detect_text(&self, text: &str) -> Result<DetectionResult, DetectionError> {
        let lines: Vec<&str> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .take(self.sample_size)
            .collect();
        self.detect(&lines)
    }

    /// Classify from candidate lines. Blank lines are ignored and only the
    /// first `sample_size` non-blank lines are examined.
    pub fn detect(&self, lines: &[&str]) -> Result<DetectionResult, DetectionError> {
        let stripped: Vec<String> = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .take(self.sample_size)
            .map(|line| strip_ansi_codes(line.trim_end_matches('\r')).into_owned())
            .collect();

        if stripped.is_empty() {
            return Err(DetectionError::EmptyInput);
        }

        let sample: Vec<&str> = stripped.iter().map(String::as_str).collect();

        for entry in self.entries {
            let detector = entry.detector;
            let result = detector.detect(&sample);
            tracing::trace!(
                format = %result.format,
                confidence = result.confidence,
                "detector evaluated"
            );
            if detector.accepts(&result) {
                return Ok(result);
            }
        }

        Ok(DetectionResult::new(FormatKind::OpaqueFallback, 0.0))
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }
}

impl Default for FormatDetectorOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> FormatKind {
        FormatDetectorOrchestrator::new()
            .detect_text(text)
            .expect("non-empty input")
            .format
    }

    #[test]
    fn test_detect_json_events() {
        let text = "{\"event\":\"runner_on_start\",\"counter\":1}\n{\"event\":\"runner_on_ok\",\"counter\":2,\"host\":\"web1\"}\n";
        assert_eq!(detect(text), FormatKind::JsonEvents);
    }

    #[test]
    fn test_detect_raw_playbook_output() {
        let text = "\
PLAY [Deploy application] ******************************************************

TASK [Gathering Facts] *********************************************************
ok: [web1.example.com]
ok: [web2.example.com]

TASK [Install packages] ********************************************************
changed: [web1.example.com]
fatal: [web2.example.com]: FAILED! => {\"msg\": \"No package matching 'nginx'\"}

PLAY RECAP *********************************************************************
web1.example.com           : ok=2    changed=1    unreachable=0    failed=0
web2.example.com           : ok=1    changed=0    unreachable=0    failed=1
";
        assert_eq!(detect(text), FormatKind::RawPlaybookOutput);
    }

    #[test]
    fn test_detect_coloured_playbook_output() {
        let text = "\x1b[0;32mok: [web1]\x1b[0m\n\x1b[0;33mchanged: [web2]\x1b[0m\nTASK [restart] ***\n";
        assert_eq!(detect(text), FormatKind::RawPlaybookOutput);
    }

    #[test]
    fn test_detect_system_log() {
        let text = "\
2024-01-15 10:30:00 INFO Job 123 started
2024-01-15 10:30:05 INFO Job 123 running task Install packages
2024-01-15 10:31:10 ERROR Job 123 task failed on web2
2024-01-15 10:32:00 INFO Job 123 completed
";
        assert_eq!(detect(text), FormatKind::SystemLog);
    }

    #[test]
    fn test_detect_service_log() {
        let text = "\
Jan 15 10:30:00 tower-01 awx-manage[1234]: Starting dispatcher
Jan 15 10:30:01 tower-01 awx-dispatcher[1240]: Job 45 queued
Jan 15 10:30:09 tower-01 awx-dispatcher[1240]: Job 45 finished
";
        assert_eq!(detect(text), FormatKind::ServiceLog);
    }

    #[test]
    fn test_detect_structured_custom() {
        let text = "\
2024-01-15T10:30:00.000Z INFO [job_123] Job 123 started
2024-01-15T10:30:01.000Z INFO [job_123:web01.example.com] TASK [Install] started
2024-01-15T10:30:04.000Z ERROR [job_123:web02.example.com] TASK [Install] failed
";
        assert_eq!(detect(text), FormatKind::StructuredCustom);
    }

    #[test]
    fn test_detect_opaque_fallback() {
        assert_eq!(detect("just some words\nmore words here\n"), FormatKind::OpaqueFallback);
    }

    #[test]
    fn test_detect_empty_input_fails() {
        let orchestrator = FormatDetectorOrchestrator::new();
        assert_eq!(orchestrator.detect_text(""), Err(DetectionError::EmptyInput));
        assert_eq!(orchestrator.detect_text("  \n\t\n\r\n"), Err(DetectionError::EmptyInput));
    }

    #[test]
    fn test_one_non_json_line_defeats_json_rule() {
        // json-events needs every sampled line; plain text breaks the tie
        let text = "{\"event\":\"runner_on_ok\"}\nnot json\n";
        assert_eq!(detect(text), FormatKind::OpaqueFallback);
    }

    #[test]
    fn test_priority_wins_over_later_rules() {
        // Valid JSON records that also embed a system-log shaped message still classify as JSON
        let text = "{\"event\":\"verbose\",\"stdout\":\"2024-01-15 10:30:00 INFO Job 1 started\"}\n";
        assert_eq!(detect(text), FormatKind::JsonEvents);
    }

    #[test]
    fn test_later_disagreeing_lines_outside_sample_are_ignored() {
        let mut text = String::new();
        for i in 0..5 {
            text.push_str(&format!("2024-01-15 10:30:0{} INFO Job 9 step {}\n", i, i));
        }
        for _ in 0..50 {
            text.push_str("ok: [web1]\n");
        }
        let orchestrator = FormatDetectorOrchestrator::with_sample_size(5);
        assert_eq!(orchestrator.detect_text(&text).unwrap().format, FormatKind::SystemLog);
    }

    #[test]
    fn test_blank_lines_do_not_count_towards_sample() {
        let text = "\n\n\n2024-01-15 10:30:00 INFO Job 1 started\n\n2024-01-15 10:30:01 INFO Job 1 completed\n";
        let orchestrator = FormatDetectorOrchestrator::with_sample_size(2);
        assert_eq!(orchestrator.detect_text(text).unwrap().format, FormatKind::SystemLog);
    }
}
