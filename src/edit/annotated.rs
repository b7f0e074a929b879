use std::collections::VecDeque;

use super::range::{OffsetRange, shift};
use super::replacement::{EditData, Replacement};
use crate::error::{ProvenanceError, ProvenanceResult};

/// An ordered, non-overlapping sequence of replacements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedEdit<D> {
    replacements: Vec<Replacement<D>>,
}

/// An edit whose replacements carry no payload.
pub type StringEdit = AnnotatedEdit<()>;

impl<D> Default for AnnotatedEdit<D> {
    fn default() -> Self {
        Self {
            replacements: Vec::new(),
        }
    }
}

impl<D: EditData> AnnotatedEdit<D> {
    /// Build an edit from sorted, non-overlapping replacements.
    ///
    /// Panics when the replacements violate the ordering invariant.
    pub fn new(replacements: Vec<Replacement<D>>) -> Self {
        if let Err(err) = validate(&replacements) {
            panic!("malformed edit: {}", err);
        }
        Self { replacements }
    }

    /// Like [`AnnotatedEdit::new`], for replacements coming from untrusted input.
    pub fn try_new(replacements: Vec<Replacement<D>>) -> ProvenanceResult<Self> {
        validate(&replacements)?;
        Ok(Self { replacements })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Check that every replacement range lies within `text` on char boundaries.
    ///
    /// Construction only checks ordering, since an edit does not know the
    /// text it will be applied to. [`AnnotatedEdit::apply`],
    /// [`AnnotatedEdit::compose`] and [`AnnotatedEdit::remove_common_prefix_and_suffix`]
    /// assume this holds for the text they operate on.
    pub fn check_fits(&self, text: &str) -> ProvenanceResult<()> {
        for r in &self.replacements {
            if r.range.end > text.len()
                || !text.is_char_boundary(r.range.start)
                || !text.is_char_boundary(r.range.end)
            {
                return Err(ProvenanceError::invalid_edit(format!(
                    "replacement {} does not fit a text of length {}",
                    r.range,
                    text.len()
                )));
            }
        }
        Ok(())
    }

    pub fn single(replacement: Replacement<D>) -> Self {
        Self {
            replacements: vec![replacement],
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>, data: D) -> Self {
        Self::single(Replacement::insert(offset, text, data))
    }

    pub fn replace(range: OffsetRange, text: impl Into<String>, data: D) -> Self {
        Self::single(Replacement::new(range, text, data))
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn replacements(&self) -> &[Replacement<D>] {
        &self.replacements
    }

    pub fn into_replacements(self) -> Vec<Replacement<D>> {
        self.replacements
    }

    /// Net change of the text length.
    pub fn new_length_delta(&self) -> isize {
        self.replacements.iter().map(Replacement::length_delta).sum()
    }

    /// Apply the edit to `text`.
    ///
    /// Panics when a replacement range does not fit the text.
    pub fn apply(&self, text: &str) -> String {
        let capacity = shift(text.len(), self.new_length_delta());
        let mut result = String::with_capacity(capacity);
        let mut last_end = 0;
        for r in &self.replacements {
            result.push_str(OffsetRange::new(last_end, r.range.start).substring(text));
            result.push_str(&r.new_text);
            last_end = r.range.end;
        }
        result.push_str(OffsetRange::new(last_end, text.len()).substring(text));
        result
    }

    /// Range of every replacement in the post-edit text.
    pub fn get_new_ranges(&self) -> Vec<OffsetRange> {
        let mut offset = 0isize;
        self.replacements
            .iter()
            .map(|r| {
                let start = shift(r.range.start, offset);
                offset += r.length_delta();
                OffsetRange::of_start_and_length(start, r.new_length())
            })
            .collect()
    }

    /// Replace every payload by `f(replacement)`; ranges are kept.
    pub fn map_data<E: EditData>(&self, mut f: impl FnMut(&Replacement<D>) -> E) -> AnnotatedEdit<E> {
        AnnotatedEdit {
            replacements: self
                .replacements
                .iter()
                .map(|r| r.with_data(f(r)))
                .collect(),
        }
    }

    /// Strip payloads.
    pub fn to_string_edit(&self) -> StringEdit {
        self.map_data(|_| ())
    }

    /// Keep only the replacements matching `predicate`.
    pub fn filter(&self, mut predicate: impl FnMut(&Replacement<D>) -> bool) -> Self {
        Self {
            replacements: self
                .replacements
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
        }
    }

    /// Drop no-op replacements and merge touching replacements whose payloads join.
    pub fn normalize(&self) -> Self {
        let mut result: Vec<Replacement<D>> = Vec::with_capacity(self.replacements.len());
        for r in &self.replacements {
            if r.is_noop() {
                continue;
            }
            if let Some(last) = result.last_mut() {
                if last.range.end == r.range.start {
                    if let Some(joined) = last.try_join_touching(r) {
                        *last = joined;
                        continue;
                    }
                }
            }
            result.push(r.clone());
        }
        Self {
            replacements: result,
        }
    }

    /// Narrow every replacement to the text it actually changes in `source`.
    ///
    /// Touching replacements are merged before trimming, not after, so the
    /// result is already trimmed as a whole and trimming it again is a no-op.
    pub fn remove_common_prefix_and_suffix(&self, source: &str) -> Self {
        let replacements = self
            .normalize()
            .replacements
            .iter()
            .map(|r| r.remove_common_prefix_and_suffix(source))
            .filter(|r| !r.is_noop())
            .collect();
        Self { replacements }
    }

    /// Compose all edits in order. The empty list composes to the empty edit.
    pub fn compose_all(edits: impl IntoIterator<Item = AnnotatedEdit<D>>) -> Self {
        edits
            .into_iter()
            .fold(Self::empty(), |acc, edit| acc.compose(&edit))
    }

    /// An edit with the effect of applying `self` and then `other`.
    ///
    /// `other` is expressed over the text produced by `self` and must fit it
    /// (see [`AnnotatedEdit::check_fits`]). A replacement of
    /// `other` that overlaps text inserted by `self` is merged with it: the parts
    /// of the inserted text that survive keep their payload, the text inserted by
    /// `other` keeps its own.
    pub fn compose(&self, other: &Self) -> Self {
        let edits1 = self.normalize();
        let edits2 = other.normalize();
        if edits1.is_empty() {
            return edits2;
        }
        if edits2.is_empty() {
            return edits1;
        }

        let mut queue: VecDeque<Replacement<D>> = edits1.replacements.into();
        let mut result: Vec<Replacement<D>> = Vec::new();
        // Maps an offset of the original text to the intermediate text.
        let mut offset = 0isize;

        for r2 in &edits2.replacements {
            // Copy over replacements of `self` that end before `r2` starts.
            while queue
                .front()
                .is_some_and(|r1| shift(r1.range.start, offset) + r1.new_length() < r2.range.start)
            {
                if let Some(r1) = queue.pop_front() {
                    offset += r1.length_delta();
                    result.push(r1);
                }
            }

            let first_offset = offset;
            let mut first: Option<Replacement<D>> = None;
            let mut last: Option<Replacement<D>> = None;
            // Everything that intersects or touches `r2` in the intermediate text.
            while queue
                .front()
                .is_some_and(|r1| shift(r1.range.start, offset) <= r2.range.end)
            {
                if let Some(r1) = queue.pop_front() {
                    offset += r1.length_delta();
                    if first.is_none() {
                        first = Some(r1.clone());
                    }
                    last = Some(r1);
                }
            }

            let (Some(first), Some(last)) = (first, last) else {
                result.push(r2.delta(-first_offset));
                continue;
            };

            let new_start = first
                .range
                .start
                .min(shift(r2.range.start, -first_offset));

            let prefix_len =
                r2.range.start as isize - shift(first.range.start, first_offset) as isize;
            if prefix_len > 0 {
                result.push(first.slice(
                    OffsetRange::empty_at(new_start),
                    OffsetRange::new(0, prefix_len as usize),
                ));
            }

            let suffix_len = shift(last.range.end, offset) as isize - r2.range.end as isize;
            if suffix_len > 0 {
                let suffix_len = suffix_len as usize;
                let tail = last.slice(
                    OffsetRange::empty_at(last.range.end),
                    OffsetRange::new(last.new_length() - suffix_len, last.new_length()),
                );
                offset -= tail.length_delta();
                queue.push_front(tail);
            }

            let new_range = OffsetRange::new(new_start, shift(r2.range.end, -offset));
            result.push(r2.slice(new_range, OffsetRange::new(0, r2.new_length())));
        }

        result.extend(queue);
        Self::new(result).normalize()
    }
}

/// Ordering check only; bounds depend on the text, see [`AnnotatedEdit::check_fits`].
fn validate<D>(replacements: &[Replacement<D>]) -> ProvenanceResult<()> {
    for pair in replacements.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.range.end > b.range.start {
            return Err(ProvenanceError::invalid_edit(format!(
                "replacement {} overlaps or precedes {}",
                b.range, a.range
            )));
        }
    }
    Ok(())
}
