//! Per-document tracking lifecycle.
//!
//! Every open document gets an [`EditPipeline`], a long-term and a windowed
//! [`DocumentEditSourceTracker`], an [`ArcReporter`] and a timer task. Trackers
//! are flushed to telemetry and replaced when their interval elapses, when the
//! repository moves under them, and when the document closes.

use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::arc_reporter::ArcReporter;
use super::range_tracker::{DocumentEditSourceTracker, TrackedRange};
use super::stats::{ReportContext, report_events};
use crate::config::EngineConfig;
use crate::document::{EditPipeline, EditQueue};
use crate::edit::StringEdit;
use crate::error::{LockResultExt, ProvenanceError, ProvenanceResult};
use crate::source::{EditReason, SourceCache};
use crate::telemetry::{ResetTrigger, TelemetryEvent, TelemetrySink, TrackerMode, generate_uuid};

const LOG_TARGET: &str = "edit_provenance::controller";

/// Version control position of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryState {
    pub branch: Option<String>,
    pub commit: Option<String>,
}

impl RepositoryState {
    pub fn new(branch: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            commit: Some(commit.into()),
        }
    }

    /// Moving from an unknown state never triggers a reset.
    fn reset_trigger(&self, next: &RepositoryState) -> Option<ResetTrigger> {
        if let (Some(old), Some(new)) = (&self.branch, &next.branch) {
            if old != new {
                return Some(ResetTrigger::BranchChange);
            }
        }
        match (&self.commit, &next.commit) {
            (Some(old), Some(new)) if old != new => Some(ResetTrigger::HashChange),
            _ => None,
        }
    }
}

struct TrackerSlot {
    mode: TrackerMode,
    tracker: DocumentEditSourceTracker,
    started: Instant,
}

impl TrackerSlot {
    fn new(mode: TrackerMode, tracker: DocumentEditSourceTracker) -> Self {
        Self {
            mode,
            tracker,
            started: Instant::now(),
        }
    }
}

struct ControllerShared {
    config: EngineConfig,
    sink: Arc<dyn TelemetrySink>,
}

impl ControllerShared {
    fn top_keys(&self, mode: TrackerMode) -> usize {
        match mode {
            TrackerMode::LongTerm => self.config.windows.long_term_top_keys,
            TrackerMode::Windowed => self.config.windows.window_top_keys,
        }
    }
}

struct TrackedDocument {
    pipeline: EditPipeline,
    language_id: Option<String>,
    /// `None` once the document was closed
    long_term: tokio::sync::Mutex<Option<TrackerSlot>>,
    windowed: tokio::sync::Mutex<Option<TrackerSlot>>,
    repository: Mutex<RepositoryState>,
    arc_reporter: ArcReporter,
    timers: CancellationToken,
}

impl TrackedDocument {
    fn slot(&self, mode: TrackerMode) -> &tokio::sync::Mutex<Option<TrackerSlot>> {
        match mode {
            TrackerMode::LongTerm => &self.long_term,
            TrackerMode::Windowed => &self.windowed,
        }
    }

    /// Flush the `mode` tracker and, unless the document is closing, replace
    /// it with a fresh one.
    async fn reset(&self, mode: TrackerMode, trigger: ResetTrigger, shared: &ControllerShared) {
        let mut guard = self.slot(mode).lock().await;
        let finished = if trigger == ResetTrigger::Closed {
            let Some(mut slot) = guard.take() else {
                return;
            };
            drop(guard);
            slot.tracker.wait_for_queue(&self.pipeline).await;
            slot
        } else {
            self.pipeline.wait_for_queue().await;
            let Some(current) = guard.as_mut() else {
                return;
            };
            let fresh = TrackerSlot::new(
                mode,
                current.tracker.take_window(self.pipeline.document()),
            );
            std::mem::replace(current, fresh)
        };

        log::debug!(
            target: LOG_TARGET,
            "Resetting {:?} tracker of {} ({:?})",
            mode,
            self.pipeline.uri(),
            trigger
        );
        self.flush(&finished, trigger, shared);
    }

    fn flush(&self, slot: &TrackerSlot, trigger: ResetTrigger, shared: &ControllerShared) {
        // Text inserted and then deleted again still counts as inserted.
        if slot.tracker.get_all_keys().is_empty() {
            return;
        }
        let ctx = ReportContext {
            mode: slot.mode,
            trigger,
            language_id: self.language_id.clone(),
            elapsed: slot.started.elapsed(),
            top_keys: shared.top_keys(slot.mode),
            stats_uuid: generate_uuid(),
        };
        let (details, stats) = report_events(&slot.tracker, &ctx);
        for event in details {
            shared.sink.publish(TelemetryEvent::EditSourceDetails(event));
        }
        shared.sink.publish(TelemetryEvent::EditSourceStats(stats));
    }
}

fn spawn_timers(doc: Weak<TrackedDocument>, shared: Arc<ControllerShared>, cancel: CancellationToken) {
    let windows = shared.config.windows;
    tokio::spawn(async move {
        let start = Instant::now();
        let mut long_term = tokio::time::interval_at(start + windows.long_term, windows.long_term);
        let mut window = tokio::time::interval_at(start + windows.window, windows.window);
        long_term.set_missed_tick_behavior(MissedTickBehavior::Delay);
        window.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let (mode, trigger) = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = long_term.tick() => (TrackerMode::LongTerm, ResetTrigger::LongTermInterval),
                _ = window.tick() => (TrackerMode::Windowed, ResetTrigger::Time),
            };
            let Some(doc) = doc.upgrade() else {
                break;
            };
            doc.reset(mode, trigger, &shared).await;
        }
    });
}

/// Tracks provenance for every open document and reports it to telemetry.
pub struct EditSourceTrackingController {
    shared: Arc<ControllerShared>,
    cache: Arc<SourceCache>,
    documents: DashMap<Url, Arc<TrackedDocument>>,
}

impl EditSourceTrackingController {
    pub fn new(config: EngineConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        Self::with_cache(config, sink, Arc::new(SourceCache::new()))
    }

    pub fn with_cache(
        config: EngineConfig,
        sink: Arc<dyn TelemetrySink>,
        cache: Arc<SourceCache>,
    ) -> Self {
        Self {
            shared: Arc::new(ControllerShared { config, sink }),
            cache,
            documents: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.config.enabled
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn source_cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_tracked(&self, uri: &Url) -> bool {
        self.documents.contains_key(uri)
    }

    /// Start tracking `uri`. Returns `false` when tracking is disabled.
    ///
    /// A document that is already open is closed and reported first.
    pub async fn open_document(&self, uri: Url, text: &str, language_id: Option<String>) -> bool {
        if !self.is_enabled() {
            log::debug!(target: LOG_TARGET, "Tracking disabled, not opening {}", uri);
            return false;
        }
        if self.is_tracked(&uri) {
            log::warn!(target: LOG_TARGET, "{} opened twice; restarting its trackers", uri);
            let _ = self.close_document(&uri).await;
        }

        let pipeline = EditPipeline::new(
            uri.clone(),
            text,
            Arc::clone(&self.cache),
            self.shared.config.combiner,
        );
        let long_term = DocumentEditSourceTracker::new(pipeline.document());
        let windowed = DocumentEditSourceTracker::new(pipeline.document());
        let arc_reporter = ArcReporter::spawn(
            &pipeline.just_reason(),
            self.shared.config.arc.delays.clone(),
            language_id.clone(),
            Arc::clone(&self.shared.sink),
        );
        let timers = CancellationToken::new();
        let doc = Arc::new(TrackedDocument {
            pipeline,
            language_id,
            long_term: tokio::sync::Mutex::new(Some(TrackerSlot::new(TrackerMode::LongTerm, long_term))),
            windowed: tokio::sync::Mutex::new(Some(TrackerSlot::new(TrackerMode::Windowed, windowed))),
            repository: Mutex::new(RepositoryState::default()),
            arc_reporter,
            timers: timers.clone(),
        });
        spawn_timers(Arc::downgrade(&doc), Arc::clone(&self.shared), timers);

        log::info!(target: LOG_TARGET, "Tracking {}", uri);
        self.documents.insert(uri, doc);
        true
    }

    fn document(&self, uri: &Url) -> ProvenanceResult<Arc<TrackedDocument>> {
        self.documents
            .get(uri)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ProvenanceError::document_not_found(uri.as_str()))
    }

    /// Feed one edit of `uri`, attributed to `reason`. Returns the raw document version.
    pub fn push_edit(&self, uri: &Url, edit: StringEdit, reason: &EditReason) -> ProvenanceResult<u64> {
        self.document(uri)?.pipeline.push_edit(edit, reason)
    }

    /// Replace the whole text of `uri`, attributed to a reload from disk.
    pub fn reload_document(&self, uri: &Url, text: &str) -> ProvenanceResult<u64> {
        self.document(uri)?.pipeline.reset_document(text)
    }

    /// The current text of `uri` as the trackers see it.
    pub fn document_text(&self, uri: &Url) -> ProvenanceResult<Arc<str>> {
        Ok(self.document(uri)?.pipeline.document().value())
    }

    /// Record where `uri` sits in version control. A branch switch or a new
    /// head commit flushes and restarts the long-term tracker.
    pub async fn update_repository_state(
        &self,
        uri: &Url,
        state: RepositoryState,
    ) -> ProvenanceResult<()> {
        let doc = self.document(uri)?;
        let trigger = {
            let mut current = doc
                .repository
                .lock()
                .recover_poison("EditSourceTrackingController::update_repository_state");
            let trigger = current.reset_trigger(&state);
            *current = state;
            trigger
        };
        if let Some(trigger) = trigger {
            log::info!(target: LOG_TARGET, "{:?} for {}", trigger, uri);
            doc.reset(TrackerMode::LongTerm, trigger, &self.shared).await;
        }
        Ok(())
    }

    /// Tracked ranges of one tracker after everything pushed so far was applied.
    pub async fn tracked_ranges(
        &self,
        uri: &Url,
        mode: TrackerMode,
    ) -> ProvenanceResult<Vec<TrackedRange>> {
        let doc = self.document(uri)?;
        let mut guard = doc.slot(mode).lock().await;
        let Some(slot) = guard.as_mut() else {
            return Ok(Vec::new());
        };
        slot.tracker.wait_for_queue(&doc.pipeline).await;
        Ok(slot.tracker.get_tracked_ranges())
    }

    /// Stop tracking `uri`, reporting both trackers with trigger `closed`.
    ///
    /// Pending retention samples are dropped.
    pub async fn close_document(&self, uri: &Url) -> ProvenanceResult<()> {
        let (_, doc) = self
            .documents
            .remove(uri)
            .ok_or_else(|| ProvenanceError::document_not_found(uri.as_str()))?;
        doc.timers.cancel();
        doc.reset(TrackerMode::LongTerm, ResetTrigger::Closed, &self.shared)
            .await;
        doc.reset(TrackerMode::Windowed, ResetTrigger::Closed, &self.shared)
            .await;
        doc.arc_reporter.cancel();
        doc.pipeline.dispose();
        log::info!(target: LOG_TARGET, "Stopped tracking {}", uri);
        Ok(())
    }

    /// Close every document.
    pub async fn shutdown(&self) {
        let uris: Vec<Url> = self.documents.iter().map(|e| e.key().clone()).collect();
        for uri in uris {
            let _ = self.close_document(&uri).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::OffsetRange;
    use crate::telemetry::{EditSourceStatsEvent, RecordingTelemetrySink};
    use std::time::Duration;

    fn uri() -> Url {
        Url::parse("file:///project/src/lib.rs").unwrap()
    }

    fn controller() -> (EditSourceTrackingController, Arc<RecordingTelemetrySink>) {
        let sink = Arc::new(RecordingTelemetrySink::new());
        let controller = EditSourceTrackingController::new(EngineConfig::default(), sink.clone());
        (controller, sink)
    }

    fn stats(sink: &RecordingTelemetrySink) -> Vec<EditSourceStatsEvent> {
        sink.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::EditSourceStats(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_reports_both_trackers() {
        let (controller, sink) = controller();
        assert!(controller.open_document(uri(), "", Some("rust".to_string())).await);

        controller
            .push_edit(&uri(), StringEdit::insert(0, "hello", ()), &EditReason::cursor())
            .unwrap();
        controller.close_document(&uri()).await.unwrap();

        let stats = stats(&sink);
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.trigger == ResetTrigger::Closed));
        assert!(stats.iter().all(|s| s.counts.user == 5));
        assert_eq!(stats[0].mode, TrackerMode::LongTerm);
        assert_eq!(stats[1].mode, TrackerMode::Windowed);
        assert_eq!(stats[0].language_id.as_deref(), Some("rust"));
        assert!(!controller.is_tracked(&uri()));
    }

    /// Given a chat insertion that the user deletes again
    /// When the document is closed
    /// Then the chat key is still reported with nothing surviving
    #[tokio::test(start_paused = true)]
    async fn test_fully_deleted_insertions_are_still_reported() {
        let (controller, sink) = controller();
        controller.open_document(uri(), "", None).await;
        controller
            .push_edit(&uri(), StringEdit::insert(0, "hello", ()), &EditReason::chat_apply())
            .unwrap();
        controller
            .push_edit(
                &uri(),
                StringEdit::replace(OffsetRange::new(0, 5), "", ()),
                &EditReason::cursor(),
            )
            .unwrap();
        controller.close_document(&uri()).await.unwrap();

        let stats = stats(&sink);
        assert_eq!(stats.len(), 2, "both trackers saw the insertion");
        assert!(stats.iter().all(|s| s.total_modified_count == 0));
        let chat_deltas: Vec<usize> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::EditSourceDetails(d) if d.source_key == "source:Chat.applyEdits" => {
                    Some(d.delta_modified_count)
                }
                _ => None,
            })
            .collect();
        assert_eq!(chat_deltas, vec![5, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_on_its_interval() {
        let (controller, sink) = controller();
        controller.open_document(uri(), "", None).await;

        controller
            .push_edit(&uri(), StringEdit::insert(0, "abc", ()), &EditReason::cursor())
            .unwrap();
        tokio::time::sleep(Duration::from_secs(301)).await;

        let window_stats = stats(&sink);
        assert_eq!(window_stats.len(), 1);
        assert_eq!(window_stats[0].mode, TrackerMode::Windowed);
        assert_eq!(window_stats[0].trigger, ResetTrigger::Time);
        assert!(window_stats[0].elapsed_ms >= 300_000);

        // The fresh window is empty; only the long-term tracker has data.
        controller.close_document(&uri()).await.unwrap();
        let all = stats(&sink);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].mode, TrackerMode::LongTerm);
        assert_eq!(all[1].trigger, ResetTrigger::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_branch_change_resets_long_term_tracker() {
        let (controller, sink) = controller();
        controller.open_document(uri(), "", None).await;
        controller
            .update_repository_state(&uri(), RepositoryState::new("main", "aaa"))
            .await
            .unwrap();
        assert!(stats(&sink).is_empty());

        controller
            .push_edit(&uri(), StringEdit::insert(0, "x", ()), &EditReason::chat_apply())
            .unwrap();
        controller
            .update_repository_state(&uri(), RepositoryState::new("feature", "bbb"))
            .await
            .unwrap();

        let stats = stats(&sink);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].trigger, ResetTrigger::BranchChange);
        assert_eq!(stats[0].counts.chat, 1);

        let ranges = controller
            .tracked_ranges(&uri(), TrackerMode::LongTerm)
            .await
            .unwrap();
        assert!(ranges.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_commit_on_same_branch_is_hash_change() {
        let (controller, sink) = controller();
        controller.open_document(uri(), "", None).await;
        controller
            .update_repository_state(&uri(), RepositoryState::new("main", "aaa"))
            .await
            .unwrap();
        controller
            .push_edit(&uri(), StringEdit::insert(0, "x", ()), &EditReason::cursor())
            .unwrap();
        controller
            .update_repository_state(&uri(), RepositoryState::new("main", "bbb"))
            .await
            .unwrap();

        assert_eq!(stats(&sink)[0].trigger, ResetTrigger::HashChange);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_before_any_edit_is_not_attributed() {
        let (controller, _sink) = controller();
        controller.open_document(uri(), "old", None).await;

        controller.reload_document(&uri(), "new text").unwrap();
        controller
            .push_edit(
                &uri(),
                StringEdit::replace(OffsetRange::empty_at(8), "!", ()),
                &EditReason::cursor(),
            )
            .unwrap();

        let ranges = controller
            .tracked_ranges(&uri(), TrackerMode::LongTerm)
            .await
            .unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(&*ranges[0].source_key, "source:cursor");
        assert_eq!(&*controller.document_text(&uri()).unwrap(), "new text!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_chat_edit_is_sampled() {
        let (controller, sink) = controller();
        controller.open_document(uri(), "", None).await;

        controller
            .push_edit(&uri(), StringEdit::insert(0, "fn a() {}", ()), &EditReason::chat_apply())
            .unwrap();
        // Let the chat burst settle.
        tokio::time::sleep(Duration::from_secs(2)).await;

        let arc: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, TelemetryEvent::Arc(_)))
            .collect();
        assert_eq!(arc.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_document_is_an_error() {
        let (controller, _sink) = controller();
        let result = controller.push_edit(&uri(), StringEdit::insert(0, "x", ()), &EditReason::cursor());
        assert!(matches!(result, Err(ProvenanceError::DocumentNotFound { .. })));
        assert!(controller.close_document(&uri()).await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_controller_tracks_nothing() {
        let sink = Arc::new(RecordingTelemetrySink::new());
        let config = EngineConfig {
            enabled: false,
            ..EngineConfig::default()
        };
        let controller = EditSourceTrackingController::new(config, sink);

        assert!(!controller.open_document(uri(), "", None).await);
        assert_eq!(controller.document_count(), 0);
    }
}
