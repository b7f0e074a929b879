//! Immutable, composable text edits carrying a payload per replacement.
//!
//! An [`AnnotatedEdit`] describes a transition from one text value to another
//! as a sorted list of non-overlapping [`Replacement`]s over byte ranges of the
//! *pre-edit* text. Payloads implement [`EditData`]; two replacements that end
//! up touching are merged exactly when their payloads `join`, which is how
//! provenance survives composition without per-character tags.

mod annotated;
pub mod line_edit;
mod range;
mod replacement;

pub use annotated::{AnnotatedEdit, StringEdit};
pub use line_edit::{LineEdit, LineRange, LineReplacement};
pub use range::OffsetRange;
pub use replacement::{EditData, Replacement};
