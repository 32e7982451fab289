//! Engine — owns the single replay session and its background worker.
//!
//! `start`/`stop`/`status` only touch the session behind one mutex and never
//! wait on pacing. The worker is one tokio task per session; it writes each
//! line to the selected sinks, advances the cursor, and races the pacing
//! sleep against the session's cancellation token.

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::sink::otlp::{DEFAULT_SERVICE_NAME, DEFAULT_TIMEOUT};
use crate::sink::{FileSink, OtlpSink, Sink, SinkError, SinkKind, SinkOutcome};
use crate::source::SourceCatalog;

use super::error::ReplayError;
use super::model::{Cursor, ReplayConfig, ReplayState, ReplayStatus, SessionId, SinkCounts};
use super::pacing::Pacer;
use super::resolve::{resolve, ReplaySource};

/// Paths and sink settings shared by every session.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub output_log_path: PathBuf,
    pub generated_dir: PathBuf,
    pub otlp_timeout: Duration,
    pub service_name: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            output_log_path: PathBuf::from("/var/log/logmock/replay.log"),
            generated_dir: PathBuf::from("/var/lib/logmock/generated"),
            otlp_timeout: DEFAULT_TIMEOUT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

struct Session {
    id: SessionId,
    state: ReplayState,
    source: Option<String>,
    cursor: Cursor,
    counts: SinkCounts,
    failures: u64,
    cycle: u64,
    last_error: Option<String>,
    token: CancellationToken,
}

impl Session {
    fn running(id: SessionId, source: Option<String>, token: CancellationToken) -> Self {
        Self {
            id,
            state: ReplayState::Running,
            source,
            cursor: Cursor::default(),
            counts: SinkCounts::default(),
            failures: 0,
            cycle: 0,
            last_error: None,
            token,
        }
    }

    fn status(&self) -> ReplayStatus {
        ReplayStatus {
            session_id: Some(self.id),
            state: self.state,
            source: self.source.clone(),
            cursor: self.cursor,
            per_sink_counts: self.counts,
            failures: self.failures,
            cycle: self.cycle,
            last_error: self.last_error.clone(),
        }
    }
}

struct Shared {
    session: Mutex<Option<Session>>,
    state_tx: watch::Sender<ReplayState>,
    next_session: AtomicU64,
    settings: EngineSettings,
}

impl Shared {
    /// Mutate the session if it is still `id`.
    fn update<F>(&self, id: SessionId, f: F)
    where
        F: FnOnce(&mut Session),
    {
        if let Some(session) = self.session.lock().as_mut().filter(|s| s.id == id) {
            f(session);
        }
    }

    /// Move a Running session `id` to its terminal state and notify
    /// subscribers. A session that already finished is left untouched.
    fn finish(&self, id: SessionId, state: ReplayState, last_error: Option<String>) {
        let mut summary = None;
        self.update(id, |s| {
            if s.state != ReplayState::Running {
                return;
            }
            s.state = state;
            if last_error.is_some() {
                s.last_error = last_error;
            }
            summary = Some((s.counts, s.failures, s.cycle));
        });

        if let Some((counts, failures, cycle)) = summary {
            self.state_tx.send_replace(state);
            info!(
                "Replay {} {}: file={} otlp={} failures={} cycles={}",
                id, state, counts.file, counts.otlp, failures, cycle
            );
        }
    }
}

/// Run `worker` as its own task; if it panics or is aborted the session
/// still reaches Failed so a later `start` is accepted.
fn spawn_supervised<F>(shared: Arc<Shared>, id: SessionId, worker: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(worker);
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            error!("Replay {}: worker ended abnormally: {}", id, e);
            shared.finish(id, ReplayState::Failed, Some(format!("replay worker {}", e)));
        }
    });
}

/// Replay controller. Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct ReplayEngine {
    shared: Arc<Shared>,
    catalog: Arc<SourceCatalog>,
}

impl ReplayEngine {
    pub fn new(catalog: Arc<SourceCatalog>, settings: EngineSettings) -> Self {
        let (state_tx, _) = watch::channel(ReplayState::Idle);
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(None),
                state_tx,
                next_session: AtomicU64::new(1),
                settings,
            }),
            catalog,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    /// Start a session. Must be called inside a tokio runtime.
    ///
    /// Validation and selector resolution (which may read the generated
    /// directory) run without the session lock. Only the Running check and
    /// the transition to Running share one critical section, so two
    /// concurrent starts can never both succeed.
    pub fn start(&self, config: ReplayConfig) -> Result<SessionId, ReplayError> {
        if let Some(active) = self.active_session() {
            return Err(ReplayError::AlreadyActive(active));
        }

        config.validate()?;
        let sources = resolve(
            &self.catalog,
            &self.shared.settings.generated_dir,
            config.source,
            &config.id_or_path,
        )?;

        let id = SessionId(self.shared.next_session.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        {
            let mut guard = self.shared.session.lock();
            if let Some(active) = guard.as_ref().filter(|s| s.state == ReplayState::Running) {
                return Err(ReplayError::AlreadyActive(active.id));
            }
            *guard = Some(Session::running(id, sources.first().map(|s| s.id.clone()), token.clone()));
            self.shared.state_tx.send_replace(ReplayState::Running);
        }

        info!(
            "Replay {} started: {} '{}' ({} sources, mode {:?}, {} lines/s, loop {})",
            id,
            config.source,
            config.id_or_path,
            sources.len(),
            config.mode,
            config.rate_lines_per_sec,
            config.loop_replay
        );

        let worker = Worker {
            shared: Arc::clone(&self.shared),
            id,
            config,
            sources,
            token,
        };
        spawn_supervised(Arc::clone(&self.shared), id, worker.run());

        Ok(id)
    }

    fn active_session(&self) -> Option<SessionId> {
        self.shared
            .session
            .lock()
            .as_ref()
            .filter(|s| s.state == ReplayState::Running)
            .map(|s| s.id)
    }

    /// Request cancellation. Idempotent; returns the state at the time of
    /// the call (a running session reports Stopped once the worker exits).
    pub fn stop(&self) -> ReplayState {
        let guard = self.shared.session.lock();
        match guard.as_ref() {
            Some(session) => {
                if session.state == ReplayState::Running && !session.token.is_cancelled() {
                    info!("Stopping replay {}", session.id);
                    session.token.cancel();
                }
                session.state
            }
            None => ReplayState::Idle,
        }
    }

    pub fn status(&self) -> ReplayStatus {
        self.shared
            .session
            .lock()
            .as_ref()
            .map(Session::status)
            .unwrap_or_else(ReplayStatus::idle)
    }

    /// State changes of the current and future sessions.
    pub fn subscribe(&self) -> watch::Receiver<ReplayState> {
        self.shared.state_tx.subscribe()
    }
}

struct Worker {
    shared: Arc<Shared>,
    id: SessionId,
    config: ReplayConfig,
    sources: Vec<ReplaySource>,
    token: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let (state, last_error) = match self.open_sinks().await {
            Ok(mut sinks) => {
                let outcome = self.drive(&mut sinks).await;
                for sink in sinks.iter_mut() {
                    if let Err(e) = sink.close().await {
                        warn!("Replay {}: closing {} sink failed: {}", self.id, sink.kind(), e);
                    }
                }
                outcome
            }
            Err(e) => {
                error!("Replay {}: cannot open sinks: {}", self.id, e);
                (ReplayState::Failed, Some(e.to_string()))
            }
        };

        self.shared.finish(self.id, state, last_error);
    }

    async fn open_sinks(&self) -> Result<Vec<Box<dyn Sink>>, SinkError> {
        let settings = &self.shared.settings;
        let mut sinks: Vec<Box<dyn Sink>> = Vec::with_capacity(2);

        if self.config.mode.uses_file() {
            sinks.push(Box::new(FileSink::open(&settings.output_log_path).await?));
        }
        if self.config.mode.uses_otlp() {
            if let Some(endpoint) = self.config.endpoint() {
                let client = OtlpSink::client(settings.otlp_timeout)?;
                sinks.push(Box::new(OtlpSink::new(client, endpoint, settings.service_name.as_str())));
            }
        }
        Ok(sinks)
    }

    /// Runs until completion, cancellation or a fatal sink failure.
    async fn drive(&self, sinks: &mut [Box<dyn Sink>]) -> (ReplayState, Option<String>) {
        let pacer = Pacer::new(self.config.rate_lines_per_sec, self.config.jitter_ms);
        let mut rng = StdRng::from_entropy();
        let mut cursor = Cursor::default();

        loop {
            if self.token.is_cancelled() {
                return (ReplayState::Stopped, None);
            }

            let source = &self.sources[cursor.source_index];
            let line = &source.lines[cursor.line_offset];
            trace!("Replay {}: {}[{}]", self.id, source.id, cursor.line_offset);

            for sink in sinks.iter_mut() {
                match sink.write_line(&source.id, line).await {
                    SinkOutcome::Delivered => self.shared.update(self.id, |s| match sink.kind() {
                        SinkKind::File => s.counts.file += 1,
                        SinkKind::Otlp => s.counts.otlp += 1,
                    }),
                    SinkOutcome::Failed(e) if sink.is_fatal() => {
                        error!("Replay {}: {} sink failed: {}", self.id, sink.kind(), e);
                        return (ReplayState::Failed, Some(e.to_string()));
                    }
                    SinkOutcome::Failed(e) => {
                        warn!("Replay {}: {} delivery failed: {}", self.id, sink.kind(), e);
                        let message = e.to_string();
                        self.shared.update(self.id, |s| {
                            s.failures += 1;
                            s.last_error = Some(message);
                        });
                    }
                }
            }

            match self.advance(cursor) {
                Some(next) => {
                    let wrapped = next.source_index < cursor.source_index;
                    cursor = next;
                    let source_id = self.sources[cursor.source_index].id.clone();
                    self.shared.update(self.id, |s| {
                        s.cursor = cursor;
                        s.source = Some(source_id);
                        if wrapped {
                            s.cycle += 1;
                        }
                    });
                    if wrapped {
                        debug!("Replay {}: starting cycle over {} sources", self.id, self.sources.len());
                    }
                }
                None => {
                    let end = Cursor {
                        source_index: cursor.source_index,
                        line_offset: cursor.line_offset + 1,
                    };
                    self.shared.update(self.id, |s| s.cursor = end);
                    return (ReplayState::Completed, None);
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => return (ReplayState::Stopped, None),
                _ = tokio::time::sleep(pacer.next_delay(&mut rng)) => {}
            }
        }
    }

    /// Position after `cursor`, wrapping to (0,0) when looping.
    /// `None` once the last line of a non-looping run has been written.
    fn advance(&self, cursor: Cursor) -> Option<Cursor> {
        let current = &self.sources[cursor.source_index];
        if cursor.line_offset + 1 < current.lines.len() {
            return Some(Cursor {
                source_index: cursor.source_index,
                line_offset: cursor.line_offset + 1,
            });
        }
        if cursor.source_index + 1 < self.sources.len() {
            return Some(Cursor {
                source_index: cursor.source_index + 1,
                line_offset: 0,
            });
        }
        self.config.loop_replay.then(Cursor::default)
    }
}
