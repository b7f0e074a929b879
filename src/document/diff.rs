//! Diff computation used to reconcile coalesced bursts.

use std::future::Future;
use std::time::Duration;

use similar::{Algorithm, ChangeTag, TextDiff};

use crate::edit::{OffsetRange, Replacement, StringEdit};
use crate::error::ProvenanceResult;

/// Computes an edit turning one text into another.
pub trait DiffService: Send + Sync + 'static {
    /// `budget` bounds the work; implementations may return a coarser but
    /// still correct edit when it runs out.
    fn compute_diff(
        &self,
        old_text: &str,
        new_text: &str,
        budget: Duration,
    ) -> impl Future<Output = ProvenanceResult<StringEdit>> + Send;
}

/// Char-level Myers diff from the `similar` crate.
///
/// The budget is handed to `similar` as a deadline, past which it falls back
/// to a coarser diff instead of failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarDiffService;

impl DiffService for SimilarDiffService {
    async fn compute_diff(
        &self,
        old_text: &str,
        new_text: &str,
        budget: Duration,
    ) -> ProvenanceResult<StringEdit> {
        Ok(char_diff(old_text, new_text, budget))
    }
}

/// Group every run of deletions and insertions between equal spans into one
/// replacement. Offsets are bytes, tracked via `.len()` of each char.
pub fn char_diff(old_text: &str, new_text: &str, budget: Duration) -> StringEdit {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(budget)
        .diff_chars(old_text, new_text);

    let mut replacements = Vec::new();
    let mut old_byte = 0;
    let mut pending: Option<(usize, usize, String)> = None;

    for change in diff.iter_all_changes() {
        let value = change.value();
        match change.tag() {
            ChangeTag::Equal => {
                if let Some((start, end, text)) = pending.take() {
                    replacements.push(Replacement::new(OffsetRange::new(start, end), text, ()));
                }
                old_byte += value.len();
            }
            ChangeTag::Delete => {
                let (_, end, _) = pending.get_or_insert_with(|| (old_byte, old_byte, String::new()));
                old_byte += value.len();
                *end = old_byte;
            }
            ChangeTag::Insert => {
                let (_, _, text) =
                    pending.get_or_insert_with(|| (old_byte, old_byte, String::new()));
                text.push_str(value);
            }
        }
    }
    if let Some((start, end, text)) = pending {
        replacements.push(Replacement::new(OffsetRange::new(start, end), text, ()));
    }

    StringEdit::new(replacements)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET: Duration = Duration::from_millis(500);

    #[test]
    fn test_char_diff_single_insertion() {
        let edit = char_diff("ab", "axyzb", BUDGET);
        assert_eq!(edit.replacements().len(), 1);
        let r = &edit.replacements()[0];
        assert_eq!(r.range, OffsetRange::empty_at(1));
        assert_eq!(r.new_text, "xyz");
    }

    #[test]
    fn test_char_diff_reproduces_new_text() {
        let old = "fn main() {\n    println!(\"héllo\");\n}\n";
        let new = "fn main() {\n    let x = 1;\n    println!(\"hello {x}\");\n}\n";
        let edit = char_diff(old, new, BUDGET);
        assert_eq!(edit.apply(old), new);
    }

    #[test]
    fn test_char_diff_identical_texts_is_empty() {
        assert!(char_diff("same", "same", BUDGET).is_empty());
    }

    #[tokio::test]
    async fn test_similar_service_returns_diff() {
        let edit = SimilarDiffService
            .compute_diff("abc", "abd", BUDGET)
            .await
            .unwrap();
        assert_eq!(edit.apply("abc"), "abd");
    }
}
