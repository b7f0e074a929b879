//! Observable document cells.
//!
//! A cell holds the current text and a version counter. Every change is
//! pushed to all subscribers through unbounded channels, so a consumer that
//! reads late still sees every intermediate edit, in order.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::edit::{AnnotatedEdit, EditData, Replacement};
use crate::error::{LockResultExt, ProvenanceError, ProvenanceResult};
use crate::source::{EditKeySourceData, EditSourceData};

pub type SubscriptionId = u64;

/// One published transition of a document.
#[derive(Debug, Clone)]
pub struct DocumentChange<D> {
    pub value: Arc<str>,
    pub prev_value: Arc<str>,
    pub edit: AnnotatedEdit<D>,
    pub version: u64,
}

/// Returns `false` once its receiver is gone, which drops the listener.
type Listener<D> = Box<dyn Fn(&DocumentChange<D>) -> bool + Send>;

struct DocumentState<D> {
    value: Arc<str>,
    version: u64,
    next_subscription: SubscriptionId,
    listeners: Vec<(SubscriptionId, Listener<D>)>,
}

/// A settable text cell publishing annotated edits.
///
/// Cloning yields another handle to the same cell.
pub struct ObservableDocument<D> {
    state: Arc<Mutex<DocumentState<D>>>,
}

impl<D> Clone for ObservableDocument<D> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<D> ObservableDocument<D> {
    fn lock(&self, context: &str) -> MutexGuard<'_, DocumentState<D>> {
        self.state.lock().recover_poison(context)
    }

    pub fn value(&self) -> Arc<str> {
        Arc::clone(&self.lock("ObservableDocument::value").value)
    }

    pub fn version(&self) -> u64 {
        self.lock("ObservableDocument::version").version
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock("ObservableDocument::unsubscribe")
            .listeners
            .retain(|(listener_id, _)| *listener_id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock("ObservableDocument::subscriber_count")
            .listeners
            .len()
    }
}

impl<D: EditData + Send + 'static> ObservableDocument<D> {
    pub fn new(initial: impl Into<Arc<str>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DocumentState {
                value: initial.into(),
                version: 0,
                next_subscription: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Apply `edit` to the current value and publish it. Returns the new version.
    pub fn apply(&self, edit: AnnotatedEdit<D>) -> ProvenanceResult<u64> {
        let mut state = self.lock("ObservableDocument::apply");
        edit.check_fits(&state.value)?;
        let value: Arc<str> = Arc::from(edit.apply(&state.value));
        Ok(publish(&mut state, value, edit))
    }

    /// Replace the value with `value`, publishing `edit` as the transition.
    ///
    /// `edit` must turn the current value into `value`.
    pub fn set(&self, value: impl Into<Arc<str>>, edit: AnnotatedEdit<D>) -> ProvenanceResult<u64> {
        let value = value.into();
        let mut state = self.lock("ObservableDocument::set");
        edit.check_fits(&state.value)?;
        if edit.apply(&state.value) != *value {
            return Err(ProvenanceError::invalid_edit(
                "edit does not produce the new document value",
            ));
        }
        Ok(publish(&mut state, value, edit))
    }

    /// Receive every change published from now on.
    pub fn subscribe(&self) -> ChangeReceiver<D> {
        self.subscribe_with(|change| change.clone())
    }

    /// Receive every change from now on, converted by `map`.
    pub fn subscribe_with<E: Send + 'static>(
        &self,
        map: impl Fn(&DocumentChange<D>) -> DocumentChange<E> + Send + 'static,
    ) -> ChangeReceiver<E> {
        self.register(None, map)
    }

    /// Swap the subscription `previous` for a new one in a single step.
    ///
    /// Every change published before the swap goes to the old receiver, every
    /// later change to the new one.
    pub fn resubscribe(&self, previous: SubscriptionId) -> ChangeReceiver<D> {
        self.register(Some(previous), |change| change.clone())
    }

    fn register<E: Send + 'static>(
        &self,
        replace: Option<SubscriptionId>,
        map: impl Fn(&DocumentChange<D>) -> DocumentChange<E> + Send + 'static,
    ) -> ChangeReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock("ObservableDocument::register");
        if let Some(previous) = replace {
            state.listeners.retain(|(id, _)| *id != previous);
        }
        let id = state.next_subscription;
        state.next_subscription += 1;
        state
            .listeners
            .push((id, Box::new(move |change| tx.send(map(change)).is_ok())));
        ChangeReceiver {
            id,
            initial_value: Arc::clone(&state.value),
            rx,
        }
    }
}

fn publish<D>(state: &mut DocumentState<D>, value: Arc<str>, edit: AnnotatedEdit<D>) -> u64 {
    state.version += 1;
    let change = DocumentChange {
        prev_value: std::mem::replace(&mut state.value, Arc::clone(&value)),
        value,
        edit,
        version: state.version,
    };
    state.listeners.retain(|(_, listener)| listener(&change));
    state.version
}

/// Receiving end of a document subscription.
#[derive(Debug)]
pub struct ChangeReceiver<D> {
    id: SubscriptionId,
    initial_value: Arc<str>,
    rx: mpsc::UnboundedReceiver<DocumentChange<D>>,
}

impl<D> ChangeReceiver<D> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The document text the first received change applies to.
    pub fn initial_value(&self) -> &Arc<str> {
        &self.initial_value
    }

    /// Next change; `None` once the subscription was removed and drained.
    pub async fn recv(&mut self) -> Option<DocumentChange<D>> {
        self.rx.recv().await
    }

    /// All changes received since the last read, oldest first.
    pub fn drain(&mut self) -> Vec<DocumentChange<D>> {
        let mut changes = Vec::new();
        while let Ok(change) = self.rx.try_recv() {
            changes.push(change);
        }
        changes
    }
}

/// Read side of a document publishing edits annotated with `D`.
pub trait AnnotatedDocument<D> {
    fn value(&self) -> Arc<str>;
    fn subscribe(&self) -> ChangeReceiver<D>;
    /// Replace subscription `previous` without losing or duplicating a change.
    fn resubscribe(&self, previous: SubscriptionId) -> ChangeReceiver<D>;
}

impl<D: EditData + Send + 'static> AnnotatedDocument<D> for ObservableDocument<D> {
    fn value(&self) -> Arc<str> {
        ObservableDocument::value(self)
    }

    fn subscribe(&self) -> ChangeReceiver<D> {
        ObservableDocument::subscribe(self)
    }

    fn resubscribe(&self, previous: SubscriptionId) -> ChangeReceiver<D> {
        ObservableDocument::resubscribe(self, previous)
    }
}

type DataMap<D, E> = Arc<dyn Fn(&Replacement<D>) -> E + Send + Sync>;

/// A view of a document whose payloads are converted on the way out.
pub struct MappedDocument<D, E> {
    source: ObservableDocument<D>,
    map: DataMap<D, E>,
}

impl<D, E> MappedDocument<D, E>
where
    D: EditData + Send + 'static,
    E: EditData + Send + 'static,
{
    pub fn new(
        source: ObservableDocument<D>,
        map: impl Fn(&Replacement<D>) -> E + Send + Sync + 'static,
    ) -> Self {
        Self {
            source,
            map: Arc::new(map),
        }
    }
}

impl<D, E> AnnotatedDocument<E> for MappedDocument<D, E>
where
    D: EditData + Send + 'static,
    E: EditData + Send + 'static,
{
    fn value(&self) -> Arc<str> {
        self.source.value()
    }

    fn subscribe(&self) -> ChangeReceiver<E> {
        self.source.register(None, self.converter())
    }

    fn resubscribe(&self, previous: SubscriptionId) -> ChangeReceiver<E> {
        self.source.register(Some(previous), self.converter())
    }
}

impl<D, E> MappedDocument<D, E>
where
    D: EditData + Send + 'static,
    E: EditData + Send + 'static,
{
    fn converter(&self) -> impl Fn(&DocumentChange<D>) -> DocumentChange<E> + Send + 'static {
        let map = Arc::clone(&self.map);
        move |change| DocumentChange {
            value: Arc::clone(&change.value),
            prev_value: Arc::clone(&change.prev_value),
            edit: change.edit.map_data(|r| map(r)),
            version: change.version,
        }
    }
}

/// A view of `doc` that carries only the classified source of each edit.
pub fn create_doc_with_just_reason(
    doc: &ObservableDocument<EditKeySourceData>,
) -> MappedDocument<EditKeySourceData, EditSourceData> {
    MappedDocument::new(doc.clone(), |r| r.data.to_edit_source_data())
}

/// Push side of a pipeline stage.
pub trait ChangeSink<D>: Send {
    fn emit(&mut self, edit: AnnotatedEdit<D>) -> ProvenanceResult<()>;
}

impl<D: EditData + Send + 'static> ChangeSink<D> for ObservableDocument<D> {
    fn emit(&mut self, edit: AnnotatedEdit<D>) -> ProvenanceResult<()> {
        self.apply(edit).map(|_| ())
    }
}

/// Something that buffers edits before they reach its consumers.
pub trait EditQueue {
    /// Resolves once every edit published before the call has been processed.
    fn wait_for_queue(&self) -> impl Future<Output = ()> + Send;
}
