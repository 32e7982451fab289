use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::ansi::strip_ansi_codes;
use crate::parser::formats::content_lines;
use crate::parser::traits::*;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(PLAY|TASK|RUNNING HANDLER)\s*\[(.*)\]\s*\**\s*$").unwrap()
});

static RECAP_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PLAY RECAP\b").unwrap());

static HOST_RESULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(ok|changed|failed|fatal|skipping|skipped|unreachable):\s*\[([^\]]+)\](.*)$").unwrap()
});

static RECAP_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\S+)\s*:\s*ok=\d+\s+changed=\d+\s+unreachable=\d+\s+failed=\d+").unwrap()
});

static RECAP_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([a-z]+)=(\d+)").unwrap());

static WARNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:DEPRECATION )?WARNING\]:?\s*(.*)$").unwrap()
});

/// Console output of `ansible-playbook`.
pub struct PlaybookDetector;

impl FormatDetector for PlaybookDetector {
    fn matches(&self, line: &str) -> bool {
        matches!(
            PlaybookLine::classify(line),
            PlaybookLine::Header { .. }
                | PlaybookLine::Recap
                | PlaybookLine::HostResult { .. }
                | PlaybookLine::RecapHost { .. }
        )
    }

    fn format(&self) -> FormatKind {
        FormatKind::RawPlaybookOutput
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Play,
    Task,
    Handler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultStatus {
    Ok,
    Changed,
    Failed,
    Skipped,
    Unreachable,
}

impl ResultStatus {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "changed" => Some(Self::Changed),
            "failed" | "fatal" => Some(Self::Failed),
            "skipping" | "skipped" => Some(Self::Skipped),
            "unreachable" => Some(Self::Unreachable),
            _ => None,
        }
    }

    fn event_type(self) -> &'static str {
        match self {
            Self::Ok | Self::Changed => event_type::RUNNER_ON_OK,
            Self::Failed => event_type::RUNNER_ON_FAILED,
            Self::Skipped => event_type::RUNNER_ON_SKIPPED,
            Self::Unreachable => event_type::RUNNER_ON_UNREACHABLE,
        }
    }

    fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Unreachable)
    }
}

/// One classified line of playbook output (ANSI already stripped)
#[derive(Debug, PartialEq)]
enum PlaybookLine<'a> {
    PlaybookStart,
    Header { kind: HeaderKind, name: &'a str },
    Recap,
    HostResult { status: ResultStatus, host: &'a str },
    RecapHost { host: &'a str },
    Warning,
    Include,
    Other,
}

impl<'a> PlaybookLine<'a> {
    fn classify(line: &'a str) -> Self {
        let line = line.trim();

        if line.starts_with("PLAYBOOK:") {
            return Self::PlaybookStart;
        }
        if RECAP_HEADER.is_match(line) {
            return Self::Recap;
        }
        if let Some(caps) = HEADER.captures(line) {
            let kind = match caps.get(1).map(|m| m.as_str()) {
                Some("PLAY") => HeaderKind::Play,
                Some("TASK") => HeaderKind::Task,
                _ => HeaderKind::Handler,
            };
            let name = caps.get(2).map_or("", |m| m.as_str().trim());
            return Self::Header { kind, name };
        }
        if let Some(caps) = HOST_RESULT.captures(line) {
            let status = caps.get(1).and_then(|m| ResultStatus::parse(m.as_str()));
            if let (Some(status), Some(host)) = (status, caps.get(2)) {
                // `ok: [web1 -> localhost]` is a delegated result for web1
                let host = host.as_str().split(" -> ").next().unwrap_or("").trim();
                return Self::HostResult { status, host };
            }
        }
        if let Some(host) = RECAP_HOST.captures(line).and_then(|caps| caps.get(1)) {
            return Self::RecapHost { host: host.as_str() };
        }
        if WARNING.is_match(line) {
            return Self::Warning;
        }
        if line.starts_with("included:") {
            return Self::Include;
        }
        Self::Other
    }
}

/// Play/task context carried from header lines to the host results below them.
#[derive(Debug, Default)]
struct PlaybookState {
    play: Option<String>,
    task: Option<String>,
    counter: u64,
}

impl PlaybookState {
    fn feed(&mut self, raw: &str, line_no: usize, ctx: &ExtractContext) -> ParsedEvent {
        self.counter += 1;
        let stripped = strip_ansi_codes(raw);
        let mut event = ParsedEvent::generic(self.counter, line_no, ctx.ingested_at, raw.to_string());
        event.level = Some("INFO".to_string());

        match PlaybookLine::classify(&stripped) {
            PlaybookLine::PlaybookStart => {
                event.event = event_type::PLAYBOOK_ON_START.to_string();
            }
            PlaybookLine::Header { kind: HeaderKind::Play, name } => {
                self.play = Some(name.to_string());
                self.task = None;
                event.event = event_type::PLAY_START.to_string();
                event.play = self.play.clone();
            }
            PlaybookLine::Header { kind, name } => {
                self.task = Some(name.to_string());
                event.event = if kind == HeaderKind::Handler {
                    event_type::HANDLER_TASK_START
                } else {
                    event_type::TASK_START
                }
                .to_string();
                event.play = self.play.clone();
                event.task = self.task.clone();
            }
            PlaybookLine::Recap => {
                self.task = None;
                event.event = event_type::STATS.to_string();
                event.play = self.play.clone();
            }
            PlaybookLine::HostResult { status, host } => {
                event.event = status.event_type().to_string();
                event.host = Some(host.to_string());
                event.play = self.play.clone();
                event.task = self.task.clone();
                event.failed = status.is_failure();
                event.changed = status == ResultStatus::Changed;
                if event.failed {
                    event.level = Some("ERROR".to_string());
                }
            }
            PlaybookLine::RecapHost { host } => {
                event.event = event_type::STATS.to_string();
                event.host = Some(host.to_string());
                event.play = self.play.clone();
                event.fields = RECAP_COUNT
                    .captures_iter(&stripped)
                    .filter_map(|caps| Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string())))
                    .collect();
            }
            PlaybookLine::Warning => {
                event.event = event_type::WARNING.to_string();
                event.level = Some("WARN".to_string());
            }
            PlaybookLine::Include => {
                event.play = self.play.clone();
                event.task = self.task.clone();
            }
            PlaybookLine::Other => {
                return ParsedEvent::low_confidence(self.counter, line_no, ctx.ingested_at, raw);
            }
        }

        event
    }
}

pub struct PlaybookExtractor;

impl EventExtractor for PlaybookExtractor {
    fn extract(&self, text: &str, ctx: &ExtractContext) -> Vec<ParsedEvent> {
        let mut state = PlaybookState::default();
        content_lines(text)
            .map(|(line_no, line)| state.feed(line, line_no, ctx))
            .collect()
    }

    fn format(&self) -> FormatKind {
        FormatKind::RawPlaybookOutput
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const SAMPLE: &str = "\
PLAY [Deploy application] ******************************************************

TASK [Gathering Facts] *********************************************************
ok: [web1.example.com]
ok: [web2.example.com]

TASK [Install packages] ********************************************************
changed: [web1.example.com]
fatal: [web2.example.com]: FAILED! => {\"msg\": \"No package matching 'nginx'\"}

RUNNING HANDLER [restart nginx] ************************************************
changed: [web1.example.com]

PLAY RECAP *********************************************************************
web1.example.com           : ok=3    changed=2    unreachable=0    failed=0    skipped=0
web2.example.com           : ok=1    changed=0    unreachable=0    failed=1    skipped=0
";

    fn ctx() -> ExtractContext {
        ExtractContext::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_classify_lines() {
        assert_eq!(
            PlaybookLine::classify("TASK [Install packages] ****"),
            PlaybookLine::Header { kind: HeaderKind::Task, name: "Install packages" }
        );
        assert_eq!(
            PlaybookLine::classify("TASK [common : Ensure [x] exists] ****"),
            PlaybookLine::Header { kind: HeaderKind::Task, name: "common : Ensure [x] exists" }
        );
        assert_eq!(PlaybookLine::classify("PLAY RECAP *****"), PlaybookLine::Recap);
        assert_eq!(
            PlaybookLine::classify("ok: [web1 -> localhost]"),
            PlaybookLine::HostResult { status: ResultStatus::Ok, host: "web1" }
        );
        assert_eq!(
            PlaybookLine::classify("skipping: [db01]"),
            PlaybookLine::HostResult { status: ResultStatus::Skipped, host: "db01" }
        );
        assert_eq!(
            PlaybookLine::classify("[WARNING]: Could not match supplied host pattern"),
            PlaybookLine::Warning
        );
        assert_eq!(PlaybookLine::classify("something else"), PlaybookLine::Other);
    }

    #[test]
    fn test_context_attached_to_host_results() {
        let events = PlaybookExtractor.extract(SAMPLE, &ctx());

        let fatal = events.iter().find(|e| e.event == event_type::RUNNER_ON_FAILED).unwrap();
        assert_eq!(fatal.host.as_deref(), Some("web2.example.com"));
        assert_eq!(fatal.task.as_deref(), Some("Install packages"));
        assert_eq!(fatal.play.as_deref(), Some("Deploy application"));
        assert!(fatal.failed);
        assert_eq!(fatal.start_line, 9);

        let first_ok = &events[2];
        assert_eq!(first_ok.task.as_deref(), Some("Gathering Facts"));
        assert!(!first_ok.changed);

        let handler_result = &events[8];
        assert_eq!(handler_result.task.as_deref(), Some("restart nginx"));
        assert!(handler_result.changed);
    }

    #[test]
    fn test_counters_are_sequential() {
        let events = PlaybookExtractor.extract(SAMPLE, &ctx());
        assert_eq!(events.len(), 12);
        for (idx, event) in events.iter().enumerate() {
            assert_eq!(event.counter, idx as u64 + 1);
        }
        assert_eq!(events.iter().filter(|e| e.failed).count(), 1);
    }

    #[test]
    fn test_recap_is_completion_with_counts() {
        let events = PlaybookExtractor.extract(SAMPLE, &ctx());
        let recap: Vec<_> = events
            .iter()
            .filter(|e| event_type::is_completion(&e.event))
            .collect();
        assert_eq!(recap.len(), 3);
        assert!(recap[0].task.is_none());
        assert_eq!(recap[2].host.as_deref(), Some("web2.example.com"));
        assert_eq!(recap[2].field("failed"), Some("1"));
        assert_eq!(recap[1].field("changed"), Some("2"));
        // The fatal line already carries the failure
        assert!(recap.iter().all(|e| !e.failed));
    }

    #[test]
    fn test_play_header_resets_task() {
        let text = "PLAY [one] ***\nTASK [a] ***\nok: [h1]\nPLAY [two] ***\nok: [h1]\n";
        let events = PlaybookExtractor.extract(text, &ctx());
        assert_eq!(events[4].play.as_deref(), Some("two"));
        assert!(events[4].task.is_none());
    }

    #[test]
    fn test_coloured_lines_keep_raw_message() {
        let raw = "\x1b[0;31mfatal: [web2]: UNREACHABLE!\x1b[0m";
        let events = PlaybookExtractor.extract(raw, &ctx());
        assert_eq!(events[0].event, event_type::RUNNER_ON_FAILED);
        assert_eq!(events[0].message, raw);
    }

    #[test]
    fn test_unreachable_is_failure() {
        let events = PlaybookExtractor.extract("unreachable: [db01]\n", &ctx());
        assert_eq!(events[0].event, event_type::RUNNER_ON_UNREACHABLE);
        assert!(events[0].failed);
    }

    #[test]
    fn test_unrecognized_line_is_low_confidence() {
        let text = "TASK [debug] ***\nok: [h1] => {\n    \"msg\": \"hello\"\n}\n";
        let events = PlaybookExtractor.extract(text, &ctx());
        assert_eq!(events.len(), 4);
        assert!(events[2].is_low_confidence());
        assert_eq!(events[2].message, "    \"msg\": \"hello\"");
        assert_eq!(events[2].counter, 3);
    }

    #[test]
    fn test_warning_event() {
        let events = PlaybookExtractor.extract("[WARNING]: provided hosts list is empty\n", &ctx());
        assert_eq!(events[0].event, event_type::WARNING);
        assert_eq!(events[0].level.as_deref(), Some("WARN"));
        assert!(!events[0].is_low_confidence());
    }
}
