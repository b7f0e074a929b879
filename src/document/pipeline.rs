use std::sync::Arc;

use url::Url;

use super::combiner::StreamingEditCombiner;
use super::diff::{DiffService, SimilarDiffService};
use super::minimizer::EditMinimizer;
use super::observable::{EditQueue, MappedDocument, ObservableDocument, create_doc_with_just_reason};
use crate::config::CombinerConfig;
use crate::edit::{OffsetRange, StringEdit};
use crate::error::ProvenanceResult;
use crate::source::{EditKeySourceData, EditReason, EditSourceData, SourceCache};

type Combiner<S> = StreamingEditCombiner<
    EditKeySourceData,
    EditMinimizer<ObservableDocument<EditKeySourceData>>,
    S,
>;

/// Per-document chain from raw edits to the annotated document trackers observe.
///
/// ```text
/// push_edit(edit, reason)
///       │  classify + annotate
///       ▼
/// raw document ─► StreamingEditCombiner ─► EditMinimizer ─► output document
/// ```
pub struct EditPipeline<S = SimilarDiffService> {
    uri: Url,
    cache: Arc<SourceCache>,
    raw: ObservableDocument<EditKeySourceData>,
    output: ObservableDocument<EditKeySourceData>,
    combiner: Combiner<S>,
}

impl EditPipeline {
    /// Must be called inside a tokio runtime.
    pub fn new(uri: Url, text: &str, cache: Arc<SourceCache>, config: CombinerConfig) -> Self {
        Self::with_diff_service(uri, text, cache, config, SimilarDiffService)
    }
}

impl<S: DiffService> EditPipeline<S> {
    pub fn with_diff_service(
        uri: Url,
        text: &str,
        cache: Arc<SourceCache>,
        config: CombinerConfig,
        diff: S,
    ) -> Self {
        let raw = ObservableDocument::new(text);
        let output = ObservableDocument::new(text);
        let minimizer = EditMinimizer::new(text, output.clone());
        let combiner = StreamingEditCombiner::new(raw.clone(), minimizer, diff, config);
        Self {
            uri,
            cache,
            raw,
            output,
            combiner,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Annotate `edit` with the classified `reason` and feed it in.
    pub fn push_edit(&self, edit: StringEdit, reason: &EditReason) -> ProvenanceResult<u64> {
        let data = self.cache.annotate(reason);
        self.raw.apply(edit.map_data(|_| data.clone()))
    }

    /// Replace the whole text, as a reload from disk does.
    pub fn reset_document(&self, text: &str) -> ProvenanceResult<u64> {
        let len = self.raw.value().len();
        self.push_edit(
            StringEdit::replace(OffsetRange::new(0, len), text, ()),
            &EditReason::reload_from_disk(),
        )
    }

    /// The combined and minimized document.
    pub fn document(&self) -> &ObservableDocument<EditKeySourceData> {
        &self.output
    }

    /// The document as edits were pushed, before combining.
    pub fn raw_document(&self) -> &ObservableDocument<EditKeySourceData> {
        &self.raw
    }

    /// The output document reduced to category-level provenance.
    pub fn just_reason(&self) -> MappedDocument<EditKeySourceData, EditSourceData> {
        create_doc_with_just_reason(&self.output)
    }

    pub fn dispose(&self) {
        self.combiner.dispose();
    }
}

impl<S: DiffService> EditQueue for EditPipeline<S> {
    async fn wait_for_queue(&self) {
        self.combiner.restart().await;
    }
}
