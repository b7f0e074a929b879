use std::fmt;

use super::range::OffsetRange;
use crate::text::{common_prefix_len, common_suffix_len};

/// Payload carried by every replacement of an [`super::AnnotatedEdit`].
pub trait EditData: Clone + fmt::Debug {
    /// Merge the payloads of two replacements that became textually adjacent.
    ///
    /// Returns `None` when the replacements must stay distinct.
    fn join(&self, other: &Self) -> Option<Self>;
}

/// Plain string edits: touching replacements always merge.
impl EditData for () {
    fn join(&self, _other: &Self) -> Option<Self> {
        Some(())
    }
}

/// A single contiguous substitution of `range` (in the pre-edit text) with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement<D> {
    pub range: OffsetRange,
    pub new_text: String,
    pub data: D,
}

impl<D: EditData> Replacement<D> {
    pub fn new(range: OffsetRange, new_text: impl Into<String>, data: D) -> Self {
        Self {
            range,
            new_text: new_text.into(),
            data,
        }
    }

    pub fn insert(offset: usize, new_text: impl Into<String>, data: D) -> Self {
        Self::new(OffsetRange::empty_at(offset), new_text, data)
    }

    pub fn delete(range: OffsetRange, data: D) -> Self {
        Self::new(range, String::new(), data)
    }

    /// Byte length of the inserted text.
    pub fn new_length(&self) -> usize {
        self.new_text.len()
    }

    /// Number of chars inserted; what metrics count.
    pub fn new_char_count(&self) -> usize {
        self.new_text.chars().count()
    }

    /// Growth (positive) or shrinkage (negative) of the text caused by this replacement.
    pub fn length_delta(&self) -> isize {
        self.new_text.len() as isize - self.range.len() as isize
    }

    /// Replaces nothing with nothing.
    pub fn is_noop(&self) -> bool {
        self.range.is_empty() && self.new_text.is_empty()
    }

    /// Same replacement with its range shifted by `offset`.
    pub fn delta(&self, offset: isize) -> Self {
        Self::new(self.range.delta(offset), self.new_text.clone(), self.data.clone())
    }

    /// A replacement over `range` that inserts the part of this one's new text
    /// covered by `range_in_new_text`, keeping the payload.
    pub fn slice(&self, range: OffsetRange, range_in_new_text: OffsetRange) -> Self {
        Self::new(
            range,
            range_in_new_text.substring(&self.new_text),
            self.data.clone(),
        )
    }

    /// Merge with a replacement whose range starts where this one ends,
    /// if the payloads allow it.
    pub fn try_join_touching(&self, other: &Self) -> Option<Self> {
        let data = self.data.join(&other.data)?;
        let mut new_text = String::with_capacity(self.new_text.len() + other.new_text.len());
        new_text.push_str(&self.new_text);
        new_text.push_str(&other.new_text);
        Some(Self::new(
            self.range.join_right_touching(&other.range),
            new_text,
            data,
        ))
    }

    pub fn with_data<E>(&self, data: E) -> Replacement<E> {
        Replacement {
            range: self.range,
            new_text: self.new_text.clone(),
            data,
        }
    }

    pub fn remove_common_prefix(&self, source: &str) -> Self {
        let old_text = self.range.substring(source);
        let prefix_len = common_prefix_len(old_text, &self.new_text);
        if prefix_len == 0 {
            return self.clone();
        }
        self.slice(
            self.range.delta_start(prefix_len),
            OffsetRange::new(prefix_len, self.new_text.len()),
        )
    }

    pub fn remove_common_suffix(&self, source: &str) -> Self {
        let old_text = self.range.substring(source);
        let suffix_len = common_suffix_len(old_text, &self.new_text);
        if suffix_len == 0 {
            return self.clone();
        }
        self.slice(
            self.range.delta_end(-(suffix_len as isize)),
            OffsetRange::new(0, self.new_text.len() - suffix_len),
        )
    }

    /// Narrow the replacement to the part that actually changes `source`.
    pub fn remove_common_prefix_and_suffix(&self, source: &str) -> Self {
        self.remove_common_suffix(source).remove_common_prefix(source)
    }
}
