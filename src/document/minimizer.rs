use std::sync::Arc;

use super::observable::ChangeSink;
use crate::edit::{AnnotatedEdit, EditData};
use crate::error::ProvenanceResult;

/// Trims every edit to the text it actually changes before forwarding it.
///
/// Keeps its own copy of the text the next edit applies to. Edits that change
/// nothing after trimming are dropped.
pub struct EditMinimizer<K> {
    prev_value: Arc<str>,
    sink: K,
}

impl<K> EditMinimizer<K> {
    pub fn new(initial: impl Into<Arc<str>>, sink: K) -> Self {
        Self {
            prev_value: initial.into(),
            sink,
        }
    }

    /// The text the next edit will be applied to.
    pub fn value(&self) -> &Arc<str> {
        &self.prev_value
    }
}

impl<D: EditData, K: ChangeSink<D>> ChangeSink<D> for EditMinimizer<K> {
    fn emit(&mut self, edit: AnnotatedEdit<D>) -> ProvenanceResult<()> {
        let trimmed = edit.remove_common_prefix_and_suffix(&self.prev_value);
        let value: Arc<str> = Arc::from(edit.apply(&self.prev_value));
        if trimmed.is_empty() {
            self.prev_value = value;
            return Ok(());
        }
        self.sink.emit(trimmed)?;
        self.prev_value = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::observable::ObservableDocument;
    use crate::edit::{OffsetRange, StringEdit};

    #[test]
    fn test_whole_line_replacement_is_trimmed() {
        let output: ObservableDocument<()> = ObservableDocument::new("let x = 1;\n");
        let mut rx = output.subscribe();
        let mut minimizer = EditMinimizer::new("let x = 1;\n", output.clone());

        minimizer
            .emit(StringEdit::replace(OffsetRange::new(0, 10), "let x = 42;", ()))
            .unwrap();

        let changes = rx.drain();
        let r = &changes[0].edit.replacements()[0];
        assert_eq!(r.range, OffsetRange::new(8, 9));
        assert_eq!(r.new_text, "42");
        assert_eq!(&*output.value(), "let x = 42;\n");
        assert_eq!(&**minimizer.value(), "let x = 42;\n");
    }

    #[test]
    fn test_noop_edit_is_dropped() {
        let output: ObservableDocument<()> = ObservableDocument::new("abc");
        let mut minimizer = EditMinimizer::new("abc", output.clone());

        minimizer
            .emit(StringEdit::replace(OffsetRange::new(0, 3), "abc", ()))
            .unwrap();

        assert_eq!(output.version(), 0);
    }
}
