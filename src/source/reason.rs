use serde::{Deserialize, Serialize};

/// Detail level of the reason key used to group tracked ranges.
///
/// Level 1 keeps the extension and provider apart but ignores per-request data.
pub const SOURCE_KEY_DETAIL_LEVEL: u8 = 1;

/// The raw record describing why an edit happened, as reported by the editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditReason {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_id: Option<String>,
}

impl EditReason {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Typing in the editor.
    pub fn cursor() -> Self {
        Self::new("cursor")
    }

    /// The buffer was replaced with the file contents on disk.
    pub fn reload_from_disk() -> Self {
        Self::new("reloadFromDisk")
    }

    pub fn inline_completion_accept(extension_id: impl Into<String>, nes: bool) -> Self {
        Self::new("inlineCompletionAccept")
            .with_extension_id(extension_id)
            .with_nes(nes)
    }

    pub fn chat_apply() -> Self {
        Self::new("Chat.applyEdits")
    }

    pub fn inline_chat_apply() -> Self {
        Self::new("inlineChat.applyEdits")
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_extension_id(mut self, extension_id: impl Into<String>) -> Self {
        self.extension_id = Some(extension_id.into());
        self
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_nes(mut self, nes: bool) -> Self {
        self.nes = Some(nes);
        self
    }

    pub fn with_suggestion_type(mut self, suggestion_type: impl Into<String>) -> Self {
        self.suggestion_type = Some(suggestion_type.into());
        self
    }

    pub fn with_request_uuid(mut self, request_uuid: impl Into<String>) -> Self {
        self.request_uuid = Some(request_uuid.into());
        self
    }

    pub fn with_language_id(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = Some(language_id.into());
        self
    }

    /// `field:value` pairs of every present field whose detail level is at
    /// most `level`, joined with `-`.
    ///
    /// Level 0 covers `source` and `name`, level 1 adds extension, provider,
    /// `nes` and suggestion type, level 2 adds request id and language.
    pub fn to_key(&self, level: u8) -> String {
        let nes = self.nes.map(|nes| nes.to_string());
        let fields: [(&str, u8, Option<&str>); 8] = [
            ("source", 0, Some(self.source.as_str())),
            ("name", 0, self.name.as_deref()),
            ("extensionId", 1, self.extension_id.as_deref()),
            ("providerId", 1, self.provider_id.as_deref()),
            ("nes", 1, nes.as_deref()),
            ("suggestionType", 1, self.suggestion_type.as_deref()),
            ("requestUuid", 2, self.request_uuid.as_deref()),
            ("languageId", 2, self.language_id.as_deref()),
        ];

        fields
            .iter()
            .filter(|(_, field_level, _)| *field_level <= level)
            .filter_map(|(field, _, value)| value.map(|value| format!("{}:{}", field, value)))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// The key tracked ranges are grouped by.
    pub fn source_key(&self) -> String {
        self.to_key(SOURCE_KEY_DETAIL_LEVEL)
    }
}
