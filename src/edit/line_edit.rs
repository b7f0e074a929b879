//! Line-granular view of a string edit.
//!
//! Used to report how many lines a tracked edit deletes and inserts relative
//! to the text it was applied to.

use super::annotated::AnnotatedEdit;
use super::range::OffsetRange;
use super::replacement::{EditData, Replacement};
use crate::text::LineStarts;

/// Half-open range of 0-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Replaces the lines in `line_range` with `new_lines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineReplacement {
    pub line_range: LineRange,
    pub new_lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEdit {
    pub replacements: Vec<LineReplacement>,
}

impl LineEdit {
    /// Convert an edit over `original` into whole-line replacements.
    ///
    /// Replacements that end and start on the same line are joined first, so
    /// no line is replaced twice.
    pub fn from_edit<D: EditData>(edit: &AnnotatedEdit<D>, original: &str) -> Self {
        let lines = LineStarts::new(original);
        let replacements = edit.replacements();
        let mut result = Vec::new();
        let mut group: Vec<&Replacement<D>> = Vec::new();

        for (idx, r) in replacements.iter().enumerate() {
            group.push(r);
            if let Some(next) = replacements.get(idx + 1) {
                if lines.line_of(next.range.start) == lines.line_of(r.range.end) {
                    continue;
                }
            }
            let (range, text) = join_group(&group, original);
            group.clear();
            result.push(line_replacement(range, &text, original, &lines));
        }

        Self {
            replacements: result,
        }
    }

    pub fn deleted_line_count(&self) -> usize {
        self.replacements.iter().map(|r| r.line_range.len()).sum()
    }

    pub fn inserted_line_count(&self) -> usize {
        self.replacements.iter().map(|r| r.new_lines.len()).sum()
    }
}

/// One replacement covering the whole group, gaps filled from `original`.
fn join_group<D>(group: &[&Replacement<D>], original: &str) -> (OffsetRange, String) {
    let start = group[0].range.start;
    let end = group[group.len() - 1].range.end;
    let mut text = String::new();
    for (idx, r) in group.iter().enumerate() {
        text.push_str(&r.new_text);
        if let Some(next) = group.get(idx + 1) {
            text.push_str(OffsetRange::new(r.range.end, next.range.start).substring(original));
        }
    }
    (OffsetRange::new(start, end), text)
}

fn line_replacement(
    range: OffsetRange,
    text: &str,
    original: &str,
    lines: &LineStarts,
) -> LineReplacement {
    let start_line = lines.line_of(range.start);
    let end_line = lines.line_of(range.end);

    let surviving_first = OffsetRange::new(lines.line_start(start_line), range.start).substring(original);
    let surviving_last = OffsetRange::new(range.end, lines.line_end(end_line)).substring(original);

    let mut new_lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    new_lines[0].insert_str(0, surviving_first);
    if let Some(last) = new_lines.last_mut() {
        last.push_str(surviving_last);
    }

    let mut start = start_line;
    let mut end = end_line + 1;

    // Inserting right before a line break leaves the first line untouched.
    let starts_at_line_end = range.start == lines.line_end(start_line);
    if starts_at_line_end && new_lines[0].len() == surviving_first.len() {
        start += 1;
        new_lines.remove(0);
    }

    // Ending at a line start with an empty new last line leaves the last line untouched.
    let ends_at_line_start = range.end == lines.line_start(end_line);
    if start < end
        && ends_at_line_start
        && surviving_last.is_empty()
        && new_lines.last().is_some_and(|l| l.is_empty())
    {
        end -= 1;
        new_lines.pop();
    }

    LineReplacement {
        line_range: LineRange { start, end },
        new_lines,
    }
}
