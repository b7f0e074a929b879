use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::document::{AnnotatedDocument, ChangeReceiver, EditQueue};
use crate::edit::{AnnotatedEdit, OffsetRange};
use crate::source::{EditKeySourceData, EditReason, EditSource};

const LOG_TARGET: &str = "edit_provenance::range_tracker";

/// A run of current document text attributed to one source key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRange {
    /// Range in the text the tracker started from
    pub original_range: OffsetRange,
    /// Range in the current text
    pub range: OffsetRange,
    /// Chars covered by `range`
    pub character_count: usize,
    pub source_key: Arc<str>,
    pub source: Arc<EditSource>,
    pub source_representative: Arc<EditReason>,
}

/// Attributes every character inserted since the tracker started to the
/// source key of the edit that inserted it.
///
/// The tracker folds all observed edits into one running edit from the
/// starting text to the current text. Text that was never touched is not
/// part of any replacement and therefore not attributed.
///
/// Changes are buffered by the subscription until [`update`] is called;
/// queries answer for the state as of the last update.
///
/// [`update`]: DocumentEditSourceTracker::update
pub struct DocumentEditSourceTracker {
    receiver: ChangeReceiver<EditKeySourceData>,
    initial_value: Arc<str>,
    current_value: Arc<str>,
    edits: AnnotatedEdit<EditKeySourceData>,
    pending_external_edits: AnnotatedEdit<EditKeySourceData>,
    sum_added_characters_per_key: HashMap<Arc<str>, usize>,
    /// Payload of the first replacement seen for each key
    first_data_per_key: HashMap<Arc<str>, EditKeySourceData>,
}

impl DocumentEditSourceTracker {
    pub fn new(doc: &impl AnnotatedDocument<EditKeySourceData>) -> Self {
        Self::from_receiver(doc.subscribe())
    }

    pub fn from_receiver(receiver: ChangeReceiver<EditKeySourceData>) -> Self {
        let initial_value = Arc::clone(receiver.initial_value());
        Self {
            receiver,
            current_value: Arc::clone(&initial_value),
            initial_value,
            edits: AnnotatedEdit::empty(),
            pending_external_edits: AnnotatedEdit::empty(),
            sum_added_characters_per_key: HashMap::new(),
            first_data_per_key: HashMap::new(),
        }
    }

    /// Apply every change received since the last update, in order.
    pub fn update(&mut self) {
        for change in self.receiver.drain() {
            self.current_value = change.value;
            self.handle_edit(change.edit);
        }
    }

    fn handle_edit(&mut self, edit: AnnotatedEdit<EditKeySourceData>) {
        if edit.is_empty() {
            return;
        }
        let all_external = edit
            .replacements()
            .iter()
            .all(|r| r.data.source.is_external());
        if all_external {
            if self.edits.is_empty() {
                // A document that was only ever rewritten externally has nothing to attribute.
                log::debug!(
                    target: LOG_TARGET,
                    "Ignoring external edit on untouched document"
                );
                return;
            }
            self.pending_external_edits = self.pending_external_edits.compose(&edit);
            return;
        }
        self.flush_pending_external_edits();
        self.apply_edit(&edit);
    }

    fn apply_edit(&mut self, edit: &AnnotatedEdit<EditKeySourceData>) {
        for r in edit.replacements() {
            *self
                .sum_added_characters_per_key
                .entry(Arc::clone(&r.data.key))
                .or_default() += r.new_char_count();
            self.first_data_per_key
                .entry(Arc::clone(&r.data.key))
                .or_insert_with(|| r.data.clone());
        }
        self.edits = self.edits.compose(edit);
    }

    /// Apply buffered external edits now instead of with the next real edit.
    pub fn flush_pending_external_edits(&mut self) {
        if self.pending_external_edits.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending_external_edits);
        log::trace!(
            target: LOG_TARGET,
            "Flushing {} pending external replacements",
            pending.replacements().len()
        );
        self.apply_edit(&pending);
    }

    /// Wait until `queue` has delivered everything, then apply it all,
    /// pending external edits included.
    pub async fn wait_for_queue(&mut self, queue: &impl EditQueue) {
        queue.wait_for_queue().await;
        self.update();
        self.flush_pending_external_edits();
    }

    /// Close this tracker's window: changes published from now on go to the
    /// returned fresh tracker, everything before stays with `self`, which is
    /// brought fully up to date.
    pub fn take_window(
        &mut self,
        doc: &impl AnnotatedDocument<EditKeySourceData>,
    ) -> DocumentEditSourceTracker {
        let fresh = Self::from_receiver(doc.resubscribe(self.receiver.id()));
        self.update();
        self.flush_pending_external_edits();
        fresh
    }

    pub fn get_tracked_ranges(&self) -> Vec<TrackedRange> {
        let new_ranges = self.edits.get_new_ranges();
        self.edits
            .replacements()
            .iter()
            .zip(new_ranges)
            .map(|(r, range)| TrackedRange {
                original_range: r.range,
                range,
                character_count: r.new_char_count(),
                source_key: Arc::clone(&r.data.key),
                source: Arc::clone(&r.data.source),
                source_representative: self
                    .first_data_per_key
                    .get(&r.data.key)
                    .map(|first| Arc::clone(&first.representative))
                    .unwrap_or_else(|| Arc::clone(&r.data.representative)),
            })
            .collect()
    }

    /// Every key that ever inserted characters, sorted.
    pub fn get_all_keys(&self) -> Vec<Arc<str>> {
        let mut keys: Vec<_> = self.sum_added_characters_per_key.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The first reason observed for `key`.
    pub fn get_representative(&self, key: &str) -> Option<Arc<EditReason>> {
        self.first_data_per_key
            .get(key)
            .map(|first| Arc::clone(&first.representative))
    }

    /// The source of the first edit observed for `key`.
    pub fn get_source(&self, key: &str) -> Option<Arc<EditSource>> {
        self.first_data_per_key
            .get(key)
            .map(|first| Arc::clone(&first.source))
    }

    /// Characters `key` inserted over the tracker's lifetime, including
    /// characters that were later overwritten.
    pub fn get_total_inserted_characters_count(&self, key: &str) -> usize {
        self.sum_added_characters_per_key
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn has_pending_external_edits(&self) -> bool {
        !self.pending_external_edits.is_empty()
    }

    pub fn initial_value(&self) -> &Arc<str> {
        &self.initial_value
    }

    /// The document text as of the last update.
    pub fn current_value(&self) -> &Arc<str> {
        &self.current_value
    }

    /// Render `text` with every tracked range wrapped as `[key|...]`.
    pub fn debug_visualization(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        for tracked in self.get_tracked_ranges() {
            let range = tracked.range;
            if range.end > text.len() || range.start < pos {
                let _ = write!(out, "<range {} outside text>", range);
                continue;
            }
            out.push_str(&text[pos..range.start]);
            let _ = write!(out, "[{}|{}]", tracked.source_key, range.substring(text));
            pos = range.end;
        }
        out.push_str(&text[pos.min(text.len())..]);
        out
    }
}
