//! Telemetry boundary.
//!
//! Trackers describe what they measured as [`TelemetryEvent`]s and hand them
//! to a [`TelemetrySink`]. Transport and storage belong to the sink.

use std::sync::Mutex;

use serde::Serialize;
use ulid::Ulid;

use crate::error::LockResultExt;

const LOG_TARGET: &str = "edit_provenance::telemetry";

/// Which tracker instance a report comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrackerMode {
    #[serde(rename = "longterm")]
    LongTerm,
    #[serde(rename = "window")]
    Windowed,
}

/// Why a tracker was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResetTrigger {
    /// The windowed tracker's interval elapsed
    #[serde(rename = "time")]
    Time,
    /// The long-term tracker's interval elapsed
    #[serde(rename = "10hours")]
    LongTermInterval,
    #[serde(rename = "branchChange")]
    BranchChange,
    #[serde(rename = "hashChange")]
    HashChange,
    #[serde(rename = "closed")]
    Closed,
}

/// Characters attributed to one source key when a tracker was flushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSourceDetailsEvent {
    pub mode: TrackerMode,
    pub trigger: ResetTrigger,
    pub stats_uuid: String,
    pub source_key: String,
    pub source: String,
    pub extension_id: Option<String>,
    pub provider_id: Option<String>,
    pub language_id: Option<String>,
    /// Characters of the key still present in the document
    pub modified_count: usize,
    /// Characters the key inserted over the tracker's lifetime
    pub delta_modified_count: usize,
    /// Tracked characters of all keys
    pub total_modified_count: usize,
}

/// Per-category character counts when a tracker was flushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub nes: usize,
    pub inline_completions_copilot: usize,
    pub inline_completions_nes: usize,
    pub inline_completions_other: usize,
    pub other_ai: usize,
    pub chat: usize,
    pub user: usize,
    pub ide: usize,
    pub external: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSourceStatsEvent {
    pub mode: TrackerMode,
    pub trigger: ResetTrigger,
    pub stats_uuid: String,
    pub language_id: Option<String>,
    /// Wall time the tracker was alive
    pub elapsed_ms: u64,
    pub total_modified_count: usize,
    #[serde(flatten)]
    pub counts: CategoryCounts,
}

/// One retention sample of an accepted suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcEvent {
    pub session_id: String,
    pub source: String,
    pub language_id: Option<String>,
    pub delay_ms: u64,
    pub arc: usize,
    pub original_character_count: usize,
    pub inserted_line_count: usize,
    pub deleted_line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum TelemetryEvent {
    #[serde(rename = "editSources.details")]
    EditSourceDetails(EditSourceDetailsEvent),
    #[serde(rename = "editSources.stats")]
    EditSourceStats(EditSourceStatsEvent),
    #[serde(rename = "arc")]
    Arc(ArcEvent),
}

/// Receives telemetry events. Implementations must not block.
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, event: TelemetryEvent);
}

/// Writes every event as one JSON line through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetrySink;

impl TelemetrySink for LogTelemetrySink {
    fn publish(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => log::info!(target: LOG_TARGET, "{}", json),
            Err(e) => log::warn!(target: LOG_TARGET, "Failed to serialize event: {}", e),
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .recover_poison("RecordingTelemetrySink::events")
            .clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<TelemetryEvent> {
        std::mem::take(&mut *self.events.lock().recover_poison("RecordingTelemetrySink::take"))
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn publish(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .recover_poison("RecordingTelemetrySink::publish")
            .push(event);
    }
}

/// A fresh opaque identifier.
pub fn generate_uuid() -> String {
    Ulid::new().to_string()
}

/// A fresh identifier prefixed with `namespace`, e.g. `arc-01J...`.
pub fn generate_prefixed_uuid(namespace: &str) -> String {
    format!("{}-{}", namespace, Ulid::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arc_event() -> TelemetryEvent {
        TelemetryEvent::Arc(ArcEvent {
            session_id: "arc-1".to_string(),
            source: "chat/sidebar".to_string(),
            language_id: None,
            delay_ms: 30_000,
            arc: 3,
            original_character_count: 5,
            inserted_line_count: 1,
            deleted_line_count: 1,
        })
    }

    #[test]
    fn test_events_serialize_with_tag() {
        let json = serde_json::to_value(arc_event()).unwrap();
        assert_eq!(json["event"], "arc");
        assert_eq!(json["originalCharacterCount"], 5);
    }

    #[test]
    fn test_stats_counts_are_flattened() {
        let event = TelemetryEvent::EditSourceStats(EditSourceStatsEvent {
            mode: TrackerMode::Windowed,
            trigger: ResetTrigger::LongTermInterval,
            stats_uuid: "s".to_string(),
            language_id: Some("rust".to_string()),
            elapsed_ms: 1,
            total_modified_count: 2,
            counts: CategoryCounts {
                user: 2,
                ..Default::default()
            },
        });
        let json = serde_json::to_value(event).unwrap();
        assert_eq!(json["event"], "editSources.stats");
        assert_eq!(json["trigger"], "10hours");
        assert_eq!(json["mode"], "window");
        assert_eq!(json["user"], 2);
    }

    #[test]
    fn test_recording_sink_take_empties_it() {
        let sink = RecordingTelemetrySink::new();
        sink.publish(arc_event());
        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_prefixed_uuid_is_unique() {
        let a = generate_prefixed_uuid("arc");
        let b = generate_prefixed_uuid("arc");
        assert!(a.starts_with("arc-"));
        assert_ne!(a, b);
        assert_eq!(generate_uuid().len(), 26);
    }
}
