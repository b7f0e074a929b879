//! Document layer: observable text cells and the stages between raw edits
//! and the trackers.
//!
//! Raw edits are annotated with their classified source, chat bursts are
//! coalesced by [`StreamingEditCombiner`], and every edit is narrowed by
//! [`EditMinimizer`] before it reaches the output document trackers observe.

mod combiner;
mod diff;
mod minimizer;
mod observable;
mod pipeline;

pub use combiner::{ChangeReader, PeekOutcome, StreamingEditCombiner};
pub use diff::{DiffService, SimilarDiffService, char_diff};
pub use minimizer::EditMinimizer;
pub use observable::{
    AnnotatedDocument, ChangeReceiver, ChangeSink, DocumentChange, EditQueue, MappedDocument,
    ObservableDocument, SubscriptionId, create_doc_with_just_reason,
};
pub use pipeline::EditPipeline;
