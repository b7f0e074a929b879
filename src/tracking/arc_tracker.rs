use std::sync::Arc;

use serde::Serialize;

use crate::edit::{AnnotatedEdit, EditData, LineEdit};
use crate::source::IsTrackedEditData;

/// Lines touched by what is left of the tracked edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCountInfo {
    pub deleted_line_count: usize,
    pub inserted_line_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcValues {
    /// Accepted-and-retained characters
    pub arc: usize,
    pub original_character_count: usize,
    pub inserted_line_count: usize,
    pub deleted_line_count: usize,
}

/// Measures how much of one accepted edit survives later editing.
///
/// The tracked edit is kept as an edit from the pre-acceptance text to the
/// current text. Its replacements are tagged tracked; every later edit is
/// composed on top tagged untracked, so any overwritten part of the accepted
/// text loses its tag while the untouched remainder keeps it.
#[derive(Debug, Clone)]
pub struct ArcTracker {
    original_text: Arc<str>,
    original_character_count: usize,
    updated_tracked_edit: AnnotatedEdit<IsTrackedEditData>,
}

impl ArcTracker {
    /// `tracked_edit` applies to `original_text`.
    pub fn new<D: EditData>(original_text: Arc<str>, tracked_edit: &AnnotatedEdit<D>) -> Self {
        let trimmed = tracked_edit
            .remove_common_prefix_and_suffix(&original_text)
            .map_data(|_| IsTrackedEditData::TRACKED);
        let original_character_count = tracked_character_count(&trimmed);
        Self {
            original_text,
            original_character_count,
            updated_tracked_edit: trimmed,
        }
    }

    pub fn handle_edits<D: EditData>(&mut self, edit: &AnnotatedEdit<D>) {
        let untracked = edit.map_data(|_| IsTrackedEditData::UNTRACKED);
        self.updated_tracked_edit = self.updated_tracked_edit.compose(&untracked);
    }

    /// Characters of the accepted edit still present unmodified.
    pub fn get_accepted_restrained_characters_count(&self) -> usize {
        tracked_character_count(&self.updated_tracked_edit)
    }

    pub fn get_original_character_count(&self) -> usize {
        self.original_character_count
    }

    pub fn get_line_count_info(&self) -> LineCountInfo {
        let tracked_only = self
            .updated_tracked_edit
            .filter(|r| r.data.is_tracked_edit);
        let line_edit = LineEdit::from_edit(&tracked_only, &self.original_text);
        LineCountInfo {
            deleted_line_count: line_edit.deleted_line_count(),
            inserted_line_count: line_edit.inserted_line_count(),
        }
    }

    pub fn get_values(&self) -> ArcValues {
        let lines = self.get_line_count_info();
        ArcValues {
            arc: self.get_accepted_restrained_characters_count(),
            original_character_count: self.original_character_count,
            inserted_line_count: lines.inserted_line_count,
            deleted_line_count: lines.deleted_line_count,
        }
    }
}

fn tracked_character_count(edit: &AnnotatedEdit<IsTrackedEditData>) -> usize {
    edit.replacements()
        .iter()
        .filter(|r| r.data.is_tracked_edit)
        .map(|r| r.new_char_count())
        .sum()
}
