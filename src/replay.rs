//! Replaying recorded edit traces.
//!
//! A trace is a JSON document listing the edits one document received, each
//! with the reason the editor reported. Replaying it through an
//! [`EditSourceTrackingController`] yields the final attribution of the text
//! and every telemetry event the trackers emitted.
//!
//! ```json
//! {
//!   "uri": "file:///src/main.rs",
//!   "languageId": "rust",
//!   "initialText": "",
//!   "steps": [
//!     { "kind": "edit", "replacements": [{ "start": 0, "end": 0, "text": "fn" }],
//!       "reason": { "source": "cursor" } },
//!     { "kind": "wait", "ms": 1500 },
//!     { "kind": "reload", "text": "fn main() {}" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::EngineConfig;
use crate::edit::{OffsetRange, Replacement, StringEdit};
use crate::error::{ProvenanceError, ProvenanceResult};
use crate::source::EditReason;
use crate::telemetry::{RecordingTelemetrySink, TelemetryEvent, TrackerMode};
use crate::tracking::{EditSourceTrackingController, RepositoryState};

const LOG_TARGET: &str = "edit_provenance::replay";

fn default_uri() -> String {
    "untitled:trace".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default)]
    pub language_id: Option<String>,
    #[serde(default)]
    pub initial_text: String,
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TraceStep {
    Edit {
        replacements: Vec<TraceReplacement>,
        reason: EditReason,
    },
    /// The file changed on disk and was reloaded
    Reload { text: String },
    /// Let time pass, e.g. to close a chat burst
    Wait { ms: u64 },
    Repository {
        branch: Option<String>,
        commit: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraceReplacement {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeReport {
    pub start: usize,
    pub end: usize,
    pub source_key: String,
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub text: String,
    pub tracked_ranges: Vec<RangeReport>,
    pub events: Vec<TelemetryEvent>,
}

impl Trace {
    pub fn from_json(content: &str) -> ProvenanceResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> ProvenanceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

fn to_edit(replacements: &[TraceReplacement]) -> ProvenanceResult<StringEdit> {
    let replacements = replacements
        .iter()
        .map(|r| {
            if r.start > r.end {
                return Err(ProvenanceError::invalid_edit(format!(
                    "replacement starts at {} after its end {}",
                    r.start, r.end
                )));
            }
            Ok(Replacement::new(
                OffsetRange::new(r.start, r.end),
                r.text.clone(),
                (),
            ))
        })
        .collect::<ProvenanceResult<Vec<_>>>()?;
    StringEdit::try_new(replacements)
}

/// Run `trace` through a fresh controller and close the document.
///
/// `wait` steps sleep on the tokio clock.
pub async fn replay(trace: &Trace, config: EngineConfig) -> ProvenanceResult<ReplayReport> {
    let uri = Url::parse(&trace.uri)?;
    let sink = Arc::new(RecordingTelemetrySink::new());
    let controller = EditSourceTrackingController::new(
        EngineConfig {
            enabled: true,
            ..config
        },
        sink.clone(),
    );
    controller
        .open_document(uri.clone(), &trace.initial_text, trace.language_id.clone())
        .await;

    for (idx, step) in trace.steps.iter().enumerate() {
        log::trace!(target: LOG_TARGET, "Step {}: {:?}", idx, step);
        match step {
            TraceStep::Edit {
                replacements,
                reason,
            } => {
                controller.push_edit(&uri, to_edit(replacements)?, reason)?;
            }
            TraceStep::Reload { text } => {
                controller.reload_document(&uri, text)?;
            }
            TraceStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            TraceStep::Repository { branch, commit } => {
                controller
                    .update_repository_state(
                        &uri,
                        RepositoryState {
                            branch: branch.clone(),
                            commit: commit.clone(),
                        },
                    )
                    .await?;
            }
        }
    }

    let ranges = controller
        .tracked_ranges(&uri, TrackerMode::LongTerm)
        .await?;
    let text = controller.document_text(&uri)?;
    let tracked_ranges = ranges
        .iter()
        .map(|r| RangeReport {
            start: r.range.start,
            end: r.range.end,
            source_key: r.source_key.to_string(),
            source: r.source.to_string(),
            text: r.range.substring(&text).to_string(),
        })
        .collect();
    controller.close_document(&uri).await?;

    Ok(ReplayReport {
        text: text.to_string(),
        tracked_ranges,
        events: sink.take(),
    })
}
