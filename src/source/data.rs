//! Payloads carried by the replacements of annotated edits.

use std::sync::Arc;

use super::edit_source::EditSource;
use super::reason::EditReason;
use crate::edit::EditData;

/// Payloads that know the classified source of their replacement.
pub trait HasEditSource {
    fn edit_source(&self) -> &Arc<EditSource>;
}

/// Full provenance of a replacement: grouping key, classified source and
/// the reason that produced it.
#[derive(Debug, Clone)]
pub struct EditKeySourceData {
    pub key: Arc<str>,
    pub source: Arc<EditSource>,
    pub representative: Arc<EditReason>,
}

impl EditKeySourceData {
    pub fn to_edit_source_data(&self) -> EditSourceData {
        EditSourceData {
            source: Arc::clone(&self.source),
        }
    }
}

/// Replacements merge when they share a key and a source. The left payload,
/// and with it its representative, wins.
impl EditData for EditKeySourceData {
    fn join(&self, other: &Self) -> Option<Self> {
        (self.key == other.key && Arc::ptr_eq(&self.source, &other.source)).then(|| self.clone())
    }
}

impl HasEditSource for EditKeySourceData {
    fn edit_source(&self) -> &Arc<EditSource> {
        &self.source
    }
}

impl PartialEq for EditKeySourceData {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && Arc::ptr_eq(&self.source, &other.source)
            && self.representative == other.representative
    }
}

impl Eq for EditKeySourceData {}

/// Category-level provenance only.
#[derive(Debug, Clone)]
pub struct EditSourceData {
    pub source: Arc<EditSource>,
}

impl EditData for EditSourceData {
    fn join(&self, other: &Self) -> Option<Self> {
        Arc::ptr_eq(&self.source, &other.source).then(|| self.clone())
    }
}

impl HasEditSource for EditSourceData {
    fn edit_source(&self) -> &Arc<EditSource> {
        &self.source
    }
}

impl PartialEq for EditSourceData {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }
}

impl Eq for EditSourceData {}

/// Marks whether a replacement belongs to the edit whose retention is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsTrackedEditData {
    pub is_tracked_edit: bool,
}

impl IsTrackedEditData {
    pub const TRACKED: Self = Self {
        is_tracked_edit: true,
    };
    pub const UNTRACKED: Self = Self {
        is_tracked_edit: false,
    };
}

impl EditData for IsTrackedEditData {
    fn join(&self, other: &Self) -> Option<Self> {
        (self.is_tracked_edit == other.is_tracked_edit).then_some(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceCache;

    #[test]
    fn test_key_source_data_joins_same_key_and_keeps_left_representative() {
        let cache = SourceCache::new();
        let first = cache.annotate(&EditReason::cursor().with_request_uuid("a"));
        let second = cache.annotate(&EditReason::cursor().with_request_uuid("b"));

        let joined = first.join(&second).unwrap();
        assert_eq!(joined.representative.request_uuid.as_deref(), Some("a"));
    }

    #[test]
    fn test_key_source_data_keeps_different_keys_apart() {
        let cache = SourceCache::new();
        let copilot = cache.annotate(&EditReason::inline_completion_accept("github.copilot", false));
        let other = cache.annotate(&EditReason::inline_completion_accept("other.ext", false));
        assert!(copilot.join(&other).is_none());
    }

    #[test]
    fn test_source_data_joins_by_identity() {
        let cache = SourceCache::new();
        let a = cache.annotate(&EditReason::chat_apply()).to_edit_source_data();
        let b = cache.annotate(&EditReason::chat_apply()).to_edit_source_data();
        let c = cache.annotate(&EditReason::inline_chat_apply()).to_edit_source_data();
        assert!(a.join(&b).is_some());
        assert!(a.join(&c).is_none());
    }

    #[test]
    fn test_is_tracked_joins_equal_flags() {
        assert!(IsTrackedEditData::TRACKED.join(&IsTrackedEditData::TRACKED).is_some());
        assert!(IsTrackedEditData::TRACKED.join(&IsTrackedEditData::UNTRACKED).is_none());
    }
}
