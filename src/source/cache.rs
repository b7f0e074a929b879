use std::sync::Arc;

use dashmap::DashMap;

use super::data::EditKeySourceData;
use super::edit_source::{EditSource, SourceKind, classify_reason};
use super::reason::EditReason;

/// Memoization table for classified sources and reason keys.
///
/// Created once and shared by reference. Every lookup with the same canonical
/// label returns the same `Arc`, so `Arc::ptr_eq` is a valid identity check for
/// sources and interned keys.
///
/// # Thread Safety
///
/// Uses `DashMap` so pipelines of different documents can classify concurrently.
#[derive(Debug, Default)]
pub struct SourceCache {
    sources: DashMap<String, Arc<EditSource>>,
    keys: DashMap<String, Arc<str>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared instance for `kind`.
    pub fn source_for(&self, kind: SourceKind) -> Arc<EditSource> {
        let label = kind.label();
        if let Some(existing) = self.sources.get(&label) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .sources
            .entry(label)
            .or_insert_with(|| Arc::new(EditSource::new(kind)));
        Arc::clone(entry.value())
    }

    /// Classify `reason` and return the shared instance.
    pub fn classify(&self, reason: &EditReason) -> Arc<EditSource> {
        self.source_for(classify_reason(reason))
    }

    pub fn intern_key(&self, key: String) -> Arc<str> {
        if let Some(existing) = self.keys.get(&key) {
            return Arc::clone(existing.value());
        }
        let interned: Arc<str> = Arc::from(key.as_str());
        let entry = self.keys.entry(key).or_insert(interned);
        Arc::clone(entry.value())
    }

    /// Build the full payload attached to replacements caused by `reason`.
    pub fn annotate(&self, reason: &EditReason) -> EditKeySourceData {
        EditKeySourceData {
            key: self.intern_key(reason.source_key()),
            source: self.classify(reason),
            representative: Arc::new(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structurally_equal_reasons_share_one_source() {
        let cache = SourceCache::new();
        let a = cache.classify(&EditReason::inline_completion_accept("ext", true).with_request_uuid("1"));
        let b = cache.classify(&EditReason::inline_completion_accept("ext", true).with_request_uuid("2"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_labels_get_distinct_sources() {
        let cache = SourceCache::new();
        let user = cache.classify(&EditReason::cursor());
        let external = cache.classify(&EditReason::reload_from_disk());
        assert!(!Arc::ptr_eq(&user, &external));
        assert!(Arc::ptr_eq(&user, &cache.source_for(SourceKind::User)));
    }

    #[test]
    fn test_keys_are_interned() {
        let cache = SourceCache::new();
        let a = cache.annotate(&EditReason::cursor());
        let b = cache.annotate(&EditReason::cursor());
        assert!(Arc::ptr_eq(&a.key, &b.key));
        assert_eq!(&*a.key, "source:cursor");
    }
}
