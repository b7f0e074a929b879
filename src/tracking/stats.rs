//! Aggregation of a finished tracker into telemetry events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::range_tracker::DocumentEditSourceTracker;
use crate::source::{AiKind, EditSource, SourceKind, classify_reason};
use crate::telemetry::{
    CategoryCounts, EditSourceDetailsEvent, EditSourceStatsEvent, ResetTrigger, TrackerMode,
};

const COPILOT_EXTENSION: &str = "github.copilot";
const COPILOT_CHAT_EXTENSION: &str = "github.copilot-chat";

/// Reporting bucket of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsCategory {
    Nes,
    InlineCompletionsCopilot,
    InlineCompletionsNes,
    InlineCompletionsOther,
    OtherAi,
    Chat,
    User,
    Ide,
    External,
    Unknown,
}

impl StatsCategory {
    pub fn of(kind: &SourceKind) -> Self {
        match kind {
            SourceKind::Ai {
                kind: AiKind::Nes, ..
            } => StatsCategory::Nes,
            SourceKind::Ai {
                kind: AiKind::Completion,
                extension_id,
                provider_id,
                ..
            } => match (extension_id.as_deref(), provider_id.as_deref()) {
                (Some(COPILOT_EXTENSION), _) => StatsCategory::InlineCompletionsCopilot,
                (Some(COPILOT_CHAT_EXTENSION), Some("completions")) => {
                    StatsCategory::InlineCompletionsCopilot
                }
                (Some(COPILOT_CHAT_EXTENSION), Some("nes")) => StatsCategory::InlineCompletionsNes,
                (Some(_), _) => StatsCategory::InlineCompletionsOther,
                (None, _) => StatsCategory::OtherAi,
            },
            SourceKind::Chat(_) => StatsCategory::Chat,
            SourceKind::User => StatsCategory::User,
            SourceKind::Ide(_) => StatsCategory::Ide,
            SourceKind::External => StatsCategory::External,
            SourceKind::Unknown => StatsCategory::Unknown,
        }
    }
}

impl CategoryCounts {
    fn add(&mut self, category: StatsCategory, count: usize) {
        let slot = match category {
            StatsCategory::Nes => &mut self.nes,
            StatsCategory::InlineCompletionsCopilot => &mut self.inline_completions_copilot,
            StatsCategory::InlineCompletionsNes => &mut self.inline_completions_nes,
            StatsCategory::InlineCompletionsOther => &mut self.inline_completions_other,
            StatsCategory::OtherAi => &mut self.other_ai,
            StatsCategory::Chat => &mut self.chat,
            StatsCategory::User => &mut self.user,
            StatsCategory::Ide => &mut self.ide,
            StatsCategory::External => &mut self.external,
            StatsCategory::Unknown => &mut self.unknown,
        };
        *slot += count;
    }
}

/// What a flushed tracker is reported as.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub mode: TrackerMode,
    pub trigger: ResetTrigger,
    pub language_id: Option<String>,
    pub elapsed: Duration,
    pub top_keys: usize,
    pub stats_uuid: String,
}

struct KeyStats {
    key: Arc<str>,
    source: Arc<EditSource>,
    modified_count: usize,
}

impl KeyStats {
    /// Sources sharing a label may differ in provider, so the key's own
    /// representative decides.
    fn category(&self, tracker: &DocumentEditSourceTracker) -> StatsCategory {
        match tracker.get_representative(&self.key) {
            Some(reason) => StatsCategory::of(&classify_reason(&reason)),
            None => StatsCategory::of(self.source.kind()),
        }
    }
}

/// Characters currently attributed to every key that ever inserted text.
///
/// Keys whose text was entirely overwritten are kept with a count of zero so
/// their lifetime insertions still get reported.
fn stats_by_key(tracker: &DocumentEditSourceTracker) -> Vec<KeyStats> {
    let mut counts: HashMap<Arc<str>, usize> = HashMap::new();
    for range in tracker.get_tracked_ranges() {
        *counts.entry(range.source_key).or_default() += range.character_count;
    }

    tracker
        .get_all_keys()
        .into_iter()
        .filter(|key| tracker.get_total_inserted_characters_count(key) > 0)
        .filter_map(|key| {
            let source = tracker.get_source(&key)?;
            let modified_count = counts.get(&key).copied().unwrap_or(0);
            Some(KeyStats {
                key,
                source,
                modified_count,
            })
        })
        .collect()
}

/// One details event per top key plus the per-category stats event.
///
/// The tracker should be brought up to date before calling this.
pub fn report_events(
    tracker: &DocumentEditSourceTracker,
    ctx: &ReportContext,
) -> (Vec<EditSourceDetailsEvent>, EditSourceStatsEvent) {
    let mut stats = stats_by_key(tracker);
    let total_modified_count: usize = stats.iter().map(|s| s.modified_count).sum();

    let mut counts = CategoryCounts::default();
    for s in &stats {
        counts.add(s.category(tracker), s.modified_count);
    }

    stats.sort_by(|a, b| {
        b.modified_count
            .cmp(&a.modified_count)
            .then_with(|| a.key.cmp(&b.key))
    });
    let details = stats
        .iter()
        .take(ctx.top_keys)
        .map(|s| {
            let representative = tracker.get_representative(&s.key);
            EditSourceDetailsEvent {
                mode: ctx.mode,
                trigger: ctx.trigger,
                stats_uuid: ctx.stats_uuid.clone(),
                source_key: s.key.to_string(),
                source: s.source.to_string(),
                extension_id: representative.as_ref().and_then(|r| r.extension_id.clone()),
                provider_id: representative.as_ref().and_then(|r| r.provider_id.clone()),
                language_id: ctx.language_id.clone(),
                modified_count: s.modified_count,
                delta_modified_count: tracker.get_total_inserted_characters_count(&s.key),
                total_modified_count,
            }
        })
        .collect();

    let stats_event = EditSourceStatsEvent {
        mode: ctx.mode,
        trigger: ctx.trigger,
        stats_uuid: ctx.stats_uuid.clone(),
        language_id: ctx.language_id.clone(),
        elapsed_ms: ctx.elapsed.as_millis() as u64,
        total_modified_count,
        counts,
    };
    (details, stats_event)
}
