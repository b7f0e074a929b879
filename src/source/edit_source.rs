use std::fmt;

use serde::{Deserialize, Serialize};

use super::reason::EditReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AiKind {
    Completion,
    /// Next edit suggestion
    Nes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdeKind {
    Format,
    Suggest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatKind {
    Sidebar,
    Inline,
}

/// Top-level provenance category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceCategory {
    User,
    Ai,
    Ide,
    Chat,
    External,
    Unknown,
}

/// Closed set of provenance variants an edit can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    User,
    Ai {
        kind: AiKind,
        extension_id: Option<String>,
        provider_id: Option<String>,
        suggestion_type: Option<String>,
    },
    Ide(IdeKind),
    Chat(ChatKind),
    External,
    Unknown,
}

impl SourceKind {
    pub fn category(&self) -> SourceCategory {
        match self {
            SourceKind::User => SourceCategory::User,
            SourceKind::Ai { .. } => SourceCategory::Ai,
            SourceKind::Ide(_) => SourceCategory::Ide,
            SourceKind::Chat(_) => SourceCategory::Chat,
            SourceKind::External => SourceCategory::External,
            SourceKind::Unknown => SourceCategory::Unknown,
        }
    }

    /// Canonical label, e.g. `ai/inlineSuggest/nes/<extension>/<type>`.
    pub fn label(&self) -> String {
        match self {
            SourceKind::User => "user".to_string(),
            SourceKind::Ai {
                kind,
                extension_id,
                suggestion_type,
                ..
            } => {
                let kind = match kind {
                    AiKind::Completion => "completion",
                    AiKind::Nes => "nes",
                };
                let mut label = format!("ai/inlineSuggest/{}", kind);
                for part in [extension_id, suggestion_type].into_iter().flatten() {
                    label.push('/');
                    label.push_str(part);
                }
                label
            }
            SourceKind::Ide(IdeKind::Format) => "ide/format".to_string(),
            SourceKind::Ide(IdeKind::Suggest) => "ide/suggest".to_string(),
            SourceKind::Chat(ChatKind::Sidebar) => "chat/sidebar".to_string(),
            SourceKind::Chat(ChatKind::Inline) => "chat/inline".to_string(),
            SourceKind::External => "external".to_string(),
            SourceKind::Unknown => "unknown".to_string(),
        }
    }

    /// Background color used when rendering tracked ranges (`#rrggbbaa`).
    pub fn color(&self) -> &'static str {
        match self {
            SourceKind::User => "#d3d3d333",
            SourceKind::Ai { .. } => "#00ff0033",
            SourceKind::Chat(_) => "#00ff0066",
            SourceKind::Ide(IdeKind::Format) => "#0000ff33",
            SourceKind::Ide(IdeKind::Suggest) => "#80008033",
            SourceKind::External => "#009ab254",
            SourceKind::Unknown => "#ff000033",
        }
    }
}

/// Map a raw reason to its provenance variant.
///
/// Total and pure: any unrecognized reason is [`SourceKind::Unknown`].
pub fn classify_reason(reason: &EditReason) -> SourceKind {
    match reason.source.as_str() {
        "cursor" => SourceKind::User,
        "inlineCompletionAccept" | "inlineCompletionPartialAccept" => SourceKind::Ai {
            kind: if reason.nes == Some(true) {
                AiKind::Nes
            } else {
                AiKind::Completion
            },
            extension_id: reason.extension_id.clone(),
            provider_id: reason.provider_id.clone(),
            suggestion_type: reason.suggestion_type.clone(),
        },
        "snippet" | "suggest" => SourceKind::Ide(IdeKind::Suggest),
        "unknown" => match reason.name.as_deref() {
            Some("formatEditsCommand") => SourceKind::Ide(IdeKind::Format),
            _ => SourceKind::Unknown,
        },
        "Chat.applyEdits" => SourceKind::Chat(ChatKind::Sidebar),
        "inlineChat.applyEdits" => SourceKind::Chat(ChatKind::Inline),
        "reloadFromDisk" => SourceKind::External,
        _ => SourceKind::Unknown,
    }
}

/// A classified provenance, labelled once at construction.
///
/// Instances handed out by [`super::SourceCache`] are shared, so two sources
/// with the same label are the same allocation.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct EditSource {
    kind: SourceKind,
    label: String,
}

impl EditSource {
    pub fn new(kind: SourceKind) -> Self {
        let label = kind.label();
        Self { kind, label }
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    pub fn category(&self) -> SourceCategory {
        self.kind.category()
    }

    /// Stable grouping key; equal to the canonical label.
    pub fn key(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> &'static str {
        self.kind.color()
    }

    pub fn is_external(&self) -> bool {
        self.kind == SourceKind::External
    }

    pub fn is_chat(&self) -> bool {
        matches!(self.kind, SourceKind::Chat(_))
    }

    /// Edits whose survival is measured by the ARC reporter.
    pub fn is_ai_or_chat(&self) -> bool {
        matches!(self.kind, SourceKind::Ai { .. } | SourceKind::Chat(_))
    }
}

impl fmt::Display for EditSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}
