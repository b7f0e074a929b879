//! Property tests for the edit algebra and the trackers built on it.

use std::sync::Arc;

use edit_provenance::document::ObservableDocument;
use edit_provenance::edit::{AnnotatedEdit, EditData, OffsetRange, Replacement};
use edit_provenance::source::{EditKeySourceData, EditReason, SourceCache};
use edit_provenance::tracking::{ArcTracker, DocumentEditSourceTracker};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tag(u8);

impl EditData for Tag {
    fn join(&self, other: &Self) -> Option<Self> {
        (self == other).then_some(*self)
    }
}

/// Length-independent description of an edit: every seed becomes one
/// replacement once positions are reduced modulo the text length.
type Seed = Vec<(usize, usize, String, u8)>;

fn seed() -> impl Strategy<Value = Seed> {
    prop::collection::vec((any::<usize>(), any::<usize>(), "[xy\n]{0,3}", 0u8..3), 0..4)
}

fn edit_from_seed(seed: &Seed, len: usize) -> AnnotatedEdit<Tag> {
    let mut bounds: Vec<usize> = seed
        .iter()
        .flat_map(|(a, b, _, _)| [a % (len + 1), b % (len + 1)])
        .collect();
    bounds.sort_unstable();
    let replacements = bounds
        .chunks(2)
        .zip(seed)
        .map(|(pair, (_, _, text, tag))| {
            Replacement::new(OffsetRange::new(pair[0], pair[1]), text.clone(), Tag(*tag))
        })
        .collect();
    AnnotatedEdit::new(replacements)
}

/// The tag of every byte of the edited text, `None` for untouched text.
fn attribution(edit: &AnnotatedEdit<Tag>, text: &str) -> Vec<Option<u8>> {
    let mut result = vec![None; edit.apply(text).len()];
    for (r, range) in edit.replacements().iter().zip(edit.get_new_ranges()) {
        for slot in &mut result[range.start..range.end] {
            *slot = Some(r.data.0);
        }
    }
    result
}

proptest! {
    #[test]
    fn compose_applies_like_sequential_application(
        text in "[ab\n]{0,10}",
        s1 in seed(),
        s2 in seed(),
    ) {
        let e1 = edit_from_seed(&s1, text.len());
        let t1 = e1.apply(&text);
        let e2 = edit_from_seed(&s2, t1.len());

        prop_assert_eq!(e1.compose(&e2).apply(&text), e2.apply(&t1));
    }

    #[test]
    fn compose_is_associative(
        text in "[ab\n]{0,10}",
        s1 in seed(),
        s2 in seed(),
        s3 in seed(),
    ) {
        let e1 = edit_from_seed(&s1, text.len());
        let t1 = e1.apply(&text);
        let e2 = edit_from_seed(&s2, t1.len());
        let t2 = e2.apply(&t1);
        let e3 = edit_from_seed(&s3, t2.len());

        let left = e1.compose(&e2).compose(&e3);
        let right = e1.compose(&e2.compose(&e3));

        prop_assert_eq!(left.apply(&text), e3.apply(&t2));
        prop_assert_eq!(right.apply(&text), e3.apply(&t2));
        prop_assert_eq!(attribution(&left, &text), attribution(&right, &text));
    }

    #[test]
    fn trimming_is_idempotent_and_keeps_the_result(
        text in "[ab]{0,10}",
        s in seed(),
    ) {
        let edit = edit_from_seed(&s, text.len());
        let once = edit.remove_common_prefix_and_suffix(&text);
        let twice = once.remove_common_prefix_and_suffix(&text);

        prop_assert_eq!(once.apply(&text), edit.apply(&text));
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn arc_never_increases_under_later_edits(
        inserted in "[a-z]{1,8}",
        seeds in prop::collection::vec(seed(), 0..6),
    ) {
        let mut tracker = ArcTracker::new(
            Arc::from(""),
            &AnnotatedEdit::insert(0, inserted.clone(), ()),
        );
        let mut text = inserted.clone();
        let mut previous = tracker.get_accepted_restrained_characters_count();
        prop_assert_eq!(previous, inserted.len());

        for s in &seeds {
            let edit = edit_from_seed(s, text.len());
            text = edit.apply(&text);
            tracker.handle_edits(&edit);
            let current = tracker.get_accepted_restrained_characters_count();
            prop_assert!(current <= previous);
            previous = current;
        }
        prop_assert_eq!(tracker.get_original_character_count(), inserted.len());
    }

    #[test]
    fn tracked_ranges_cover_the_whole_document(
        seeds in prop::collection::vec((seed(), 0usize..3), 1..8),
    ) {
        // External edits are left out: they are not attributed while the
        // tracker has nothing to attach them to.
        let reasons = [
            EditReason::cursor(),
            EditReason::chat_apply(),
            EditReason::inline_completion_accept("github.copilot", false),
        ];
        let cache = SourceCache::new();
        let doc: ObservableDocument<EditKeySourceData> = ObservableDocument::new("");
        let mut tracker = DocumentEditSourceTracker::new(&doc);

        for (s, reason) in &seeds {
            let data = cache.annotate(&reasons[*reason]);
            let edit = edit_from_seed(s, doc.value().len()).map_data(|_| data.clone());
            doc.apply(edit).unwrap();
        }
        tracker.update();

        let covered: usize = tracker
            .get_tracked_ranges()
            .iter()
            .map(|r| r.range.len())
            .sum();
        prop_assert_eq!(covered, doc.value().len());
        prop_assert_eq!(tracker.current_value(), &doc.value());
    }
}
