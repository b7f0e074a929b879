//! Scheduled retention sampling for accepted AI and chat edits.
//!
//! One task per document watches the category-level change stream. A change
//! made entirely by AI or chat opens a session; the session samples its
//! [`ArcTracker`] at each configured delay after acceptance and is dropped
//! after the last one.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::arc_tracker::ArcTracker;
use crate::document::{AnnotatedDocument, ChangeReceiver, DocumentChange};
use crate::source::{EditSource, EditSourceData};
use crate::telemetry::{ArcEvent, TelemetryEvent, TelemetrySink, generate_prefixed_uuid};

const LOG_TARGET: &str = "edit_provenance::arc";

struct ArcSession {
    id: String,
    source: Arc<EditSource>,
    tracker: ArcTracker,
    accepted_at: Instant,
    /// Index into the delay schedule of the next sample
    next_sample: usize,
}

impl ArcSession {
    fn next_deadline(&self, delays: &[Duration]) -> Option<Instant> {
        delays.get(self.next_sample).map(|d| self.accepted_at + *d)
    }
}

/// Handle to a document's retention sampling task.
///
/// Dropping the handle cancels all pending samples.
pub struct ArcReporter {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ArcReporter {
    /// Must be called inside a tokio runtime.
    pub fn spawn(
        doc: &impl AnnotatedDocument<EditSourceData>,
        delays: Vec<Duration>,
        language_id: Option<String>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let worker = ReporterWorker {
            delays,
            language_id,
            sink,
            sessions: Vec::new(),
        };
        let task = tokio::spawn(worker.run(doc.subscribe(), cancel.clone()));
        Self { cancel, task }
    }

    /// Stop sampling. Samples already reported stay reported.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ArcReporter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ReporterWorker {
    delays: Vec<Duration>,
    language_id: Option<String>,
    sink: Arc<dyn TelemetrySink>,
    sessions: Vec<ArcSession>,
}

impl ReporterWorker {
    async fn run(
        mut self,
        mut receiver: ChangeReceiver<EditSourceData>,
        cancel: CancellationToken,
    ) {
        loop {
            let next_deadline = self
                .sessions
                .iter()
                .filter_map(|s| s.next_deadline(&self.delays))
                .min();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if !self.sessions.is_empty() {
                        log::debug!(
                            target: LOG_TARGET,
                            "Cancelled with {} unfinished sessions",
                            self.sessions.len()
                        );
                    }
                    break;
                }
                _ = sleep_until(next_deadline) => self.on_deadline(&mut receiver, Instant::now()),
                change = receiver.recv() => match change {
                    Some(change) => self.handle_change(change),
                    None => break,
                },
            }
        }
    }

    /// Take the samples due at `now`.
    ///
    /// Changes already published are applied first so a sample never misses
    /// an edit that happened before its deadline.
    fn on_deadline(&mut self, receiver: &mut ChangeReceiver<EditSourceData>, now: Instant) {
        for change in receiver.drain() {
            self.handle_change(change);
        }
        self.report_due(now);
    }

    /// Sessions start when the change is received, which trails the edit by
    /// at most one scheduler turn.
    fn handle_change(&mut self, change: DocumentChange<EditSourceData>) {
        for session in &mut self.sessions {
            session.tracker.handle_edits(&change.edit);
        }

        let Some(source) = accepted_source(&change) else {
            return;
        };
        let mut session = ArcSession {
            id: generate_prefixed_uuid("arc"),
            source,
            tracker: ArcTracker::new(Arc::clone(&change.prev_value), &change.edit),
            accepted_at: Instant::now(),
            next_sample: 0,
        };
        log::debug!(
            target: LOG_TARGET,
            "Session {} started for {}",
            session.id,
            session.source
        );
        // Zero-delay samples are taken before any later edit is applied.
        let accepted_at = session.accepted_at;
        self.sample_due(&mut session, accepted_at);
        if session.next_deadline(&self.delays).is_some() {
            self.sessions.push(session);
        }
    }

    fn report_due(&mut self, now: Instant) {
        let mut sessions = std::mem::take(&mut self.sessions);
        for session in &mut sessions {
            self.sample_due(session, now);
        }
        sessions.retain(|s| s.next_deadline(&self.delays).is_some());
        self.sessions = sessions;
    }

    fn sample_due(&self, session: &mut ArcSession, now: Instant) {
        while let Some(deadline) = session.next_deadline(&self.delays) {
            if deadline > now {
                break;
            }
            let delay = self.delays[session.next_sample];
            report(&*self.sink, session, delay, self.language_id.clone());
            session.next_sample += 1;
        }
    }
}

/// The source of a change made entirely by AI or chat.
fn accepted_source(change: &DocumentChange<EditSourceData>) -> Option<Arc<EditSource>> {
    let replacements = change.edit.replacements();
    let first = replacements.first()?;
    replacements
        .iter()
        .all(|r| r.data.source.is_ai_or_chat())
        .then(|| Arc::clone(&first.data.source))
}

fn report(sink: &dyn TelemetrySink, session: &ArcSession, delay: Duration, language_id: Option<String>) {
    let values = session.tracker.get_values();
    log::trace!(
        target: LOG_TARGET,
        "Session {} at {:?}: arc {} of {}",
        session.id,
        delay,
        values.arc,
        values.original_character_count
    );
    sink.publish(TelemetryEvent::Arc(ArcEvent {
        session_id: session.id.clone(),
        source: session.source.to_string(),
        language_id,
        delay_ms: delay.as_millis() as u64,
        arc: values.arc,
        original_character_count: values.original_character_count,
        inserted_line_count: values.inserted_line_count,
        deleted_line_count: values.deleted_line_count,
    }));
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ObservableDocument, create_doc_with_just_reason};
    use crate::edit::{OffsetRange, StringEdit};
    use crate::source::{EditKeySourceData, EditReason, SourceCache};
    use crate::telemetry::RecordingTelemetrySink;

    fn delays() -> Vec<Duration> {
        vec![
            Duration::ZERO,
            Duration::from_secs(30),
            Duration::from_secs(120),
        ]
    }

    struct Fixture {
        cache: SourceCache,
        doc: ObservableDocument<EditKeySourceData>,
        sink: Arc<RecordingTelemetrySink>,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            Self {
                cache: SourceCache::new(),
                doc: ObservableDocument::new(text),
                sink: Arc::new(RecordingTelemetrySink::new()),
            }
        }

        fn reporter(&self) -> ArcReporter {
            ArcReporter::spawn(
                &create_doc_with_just_reason(&self.doc),
                delays(),
                Some("rust".to_string()),
                self.sink.clone(),
            )
        }

        fn push(&self, edit: StringEdit, reason: &EditReason) {
            let data = self.cache.annotate(reason);
            self.doc.apply(edit.map_data(|_| data.clone())).unwrap();
        }

        fn arc_events(&self) -> Vec<ArcEvent> {
            self.sink
                .events()
                .into_iter()
                .filter_map(|e| match e {
                    TelemetryEvent::Arc(e) => Some(e),
                    _ => None,
                })
                .collect()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_follow_the_schedule() {
        let f = Fixture::new("");
        let reporter = f.reporter();

        f.push(StringEdit::insert(0, "hello", ()), &EditReason::chat_apply());
        settle().await;
        assert_eq!(f.arc_events().len(), 1);
        assert_eq!(f.arc_events()[0].delay_ms, 0);
        assert_eq!(f.arc_events()[0].arc, 5);

        f.push(
            StringEdit::replace(OffsetRange::new(3, 5), "p", ()),
            &EditReason::cursor(),
        );
        tokio::time::sleep(Duration::from_secs(31)).await;
        let events = f.arc_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].delay_ms, 30_000);
        assert_eq!(events[1].arc, 3);
        assert_eq!(events[1].original_character_count, 5);
        assert_eq!(events[1].session_id, events[0].session_id);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.arc_events().len(), 3);
        assert!(!reporter.is_finished());
    }

    /// Given an accepted chat edit and a user edit published before the 30s
    /// deadline but not yet received
    /// When the deadline fires
    /// Then the sample already reflects the user edit
    #[test]
    fn test_deadline_applies_pending_changes_before_sampling() {
        let f = Fixture::new("");
        let mut receiver = create_doc_with_just_reason(&f.doc).subscribe();
        let mut worker = ReporterWorker {
            delays: delays(),
            language_id: None,
            sink: f.sink.clone(),
            sessions: Vec::new(),
        };

        f.push(StringEdit::insert(0, "hello", ()), &EditReason::chat_apply());
        for change in receiver.drain() {
            worker.handle_change(change);
        }
        let accepted_at = worker.sessions[0].accepted_at;
        f.push(
            StringEdit::replace(OffsetRange::new(3, 5), "p", ()),
            &EditReason::cursor(),
        );

        worker.on_deadline(&mut receiver, accepted_at + Duration::from_secs(30));

        let events = f.arc_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].delay_ms, 30_000);
        assert_eq!(events[1].arc, 3, "the overwrite happened before the deadline");
        assert!(receiver.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_edits_do_not_open_sessions() {
        let f = Fixture::new("");
        let _reporter = f.reporter();

        f.push(StringEdit::insert(0, "typed", ()), &EditReason::cursor());
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert!(f.arc_events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_samples() {
        let f = Fixture::new("");
        let reporter = f.reporter();

        f.push(
            StringEdit::insert(0, "x", ()),
            &EditReason::inline_completion_accept("github.copilot", false),
        );
        settle().await;
        reporter.cancel();
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert_eq!(f.arc_events().len(), 1);
        assert!(reporter.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_independent() {
        let f = Fixture::new("");
        let _reporter = f.reporter();

        f.push(StringEdit::insert(0, "aaa", ()), &EditReason::chat_apply());
        settle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        f.push(StringEdit::insert(3, "bb", ()), &EditReason::inline_chat_apply());
        tokio::time::sleep(Duration::from_secs(25)).await;

        let events = f.arc_events();
        // Two zero-delay samples and the first session's 30s sample.
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].source, "chat/sidebar");
        assert_eq!(events[2].arc, 3);
        assert_eq!(events[1].source, "chat/inline");
        assert_eq!(events[1].original_character_count, 2);
    }
}
