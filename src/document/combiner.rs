//! Streaming edit combiner.
//!
//! Forwards the edits of an upstream document to a sink, coalescing bursts of
//! chat-sourced edits into one logical edit.
//!
//! # Architecture
//!
//! ```text
//! upstream change
//!       │
//!       ▼
//! CombinerState::Idle ──(not chat)──► emit as is
//!       │
//!     (chat)
//!       │
//!       ▼
//! CombinerState::Buffering ──(chat within burst_timeout)──► compose, keep buffering
//!       │
//!   (timeout, non-chat change or closed subscription)
//!       │
//!       ├─► one change: emit its edit
//!       └─► several: diff(text before burst, text after burst) ─► emit
//!                      └─ diff failed or exceeded its budget ─► emit the composition
//! ```
//!
//! Each run of the loop owns one subscription. `restart` swaps the
//! subscription atomically and chains the new run behind the old one, so runs
//! never overlap and the total order of edits is preserved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::diff::DiffService;
use super::observable::{
    ChangeReceiver, ChangeSink, DocumentChange, ObservableDocument, SubscriptionId,
};
use crate::config::CombinerConfig;
use crate::edit::{AnnotatedEdit, EditData};
use crate::error::{LockResultExt, ProvenanceError};
use crate::source::HasEditSource;

/// Logging target for the combiner.
const LOG_TARGET: &str = "edit_provenance::combiner";

/// Result of waiting for the next upstream change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekOutcome {
    /// A change is available through [`ChangeReader::peeked`]
    Ready,
    TimedOut,
    /// The subscription was removed and every change was read
    Closed,
}

/// A change receiver with one change of lookahead.
pub struct ChangeReader<D> {
    receiver: ChangeReceiver<D>,
    peeked: Option<DocumentChange<D>>,
}

impl<D> ChangeReader<D> {
    pub fn new(receiver: ChangeReceiver<D>) -> Self {
        Self {
            receiver,
            peeked: None,
        }
    }

    /// Wait for the next change without consuming it.
    pub async fn peek(&mut self) -> Option<&DocumentChange<D>> {
        if self.peeked.is_none() {
            self.peeked = self.receiver.recv().await;
        }
        self.peeked.as_ref()
    }

    /// Like [`ChangeReader::peek`], giving up after `timeout`.
    pub async fn peek_timeout(&mut self, timeout: Duration) -> PeekOutcome {
        if self.peeked.is_none() {
            match tokio::time::timeout(timeout, self.receiver.recv()).await {
                Ok(Some(change)) => self.peeked = Some(change),
                Ok(None) => return PeekOutcome::Closed,
                Err(_) => return PeekOutcome::TimedOut,
            }
        }
        PeekOutcome::Ready
    }

    pub fn peeked(&self) -> Option<&DocumentChange<D>> {
        self.peeked.as_ref()
    }

    fn take_peeked_if(&mut self, condition: bool) -> Option<DocumentChange<D>> {
        if condition { self.peeked.take() } else { None }
    }

    /// The peeked change if there is one, the next received change otherwise.
    pub async fn take(&mut self) -> Option<DocumentChange<D>> {
        match self.peeked.take() {
            Some(change) => Some(change),
            None => self.receiver.recv().await,
        }
    }
}

/// Chat edits composed since the burst started.
struct Burst<D> {
    prev_value: Arc<str>,
    value: Arc<str>,
    composed: AnnotatedEdit<D>,
    /// Payload of the first buffered change
    payload: D,
    count: usize,
}

impl<D: EditData> Burst<D> {
    fn start(change: DocumentChange<D>, payload: D) -> Self {
        Self {
            prev_value: change.prev_value,
            value: change.value,
            composed: change.edit,
            payload,
            count: 1,
        }
    }

    fn push(&mut self, change: DocumentChange<D>) {
        self.composed = self.composed.compose(&change.edit);
        self.value = change.value;
        self.count += 1;
    }
}

enum CombinerState<D> {
    Idle,
    Buffering(Burst<D>),
}

/// The payload of a change made only of chat replacements.
fn chat_payload<D: EditData + HasEditSource>(change: &DocumentChange<D>) -> Option<D> {
    let replacements = change.edit.replacements();
    let first = replacements.first()?;
    replacements
        .iter()
        .all(|r| r.data.edit_source().is_chat())
        .then(|| first.data.clone())
}

struct CombinerShared<K, S> {
    sink: Mutex<K>,
    diff: S,
    config: CombinerConfig,
    disposed: AtomicBool,
}

impl<K, S: DiffService> CombinerShared<K, S> {
    fn emit<D: EditData>(&self, edit: AnnotatedEdit<D>)
    where
        K: ChangeSink<D>,
    {
        if self.disposed.load(Ordering::Acquire) {
            log::trace!(target: LOG_TARGET, "Combiner disposed, dropping edit");
            return;
        }
        if edit.is_empty() {
            return;
        }
        let mut sink = self.sink.lock().recover_poison("CombinerShared::emit");
        if let Err(e) = sink.emit(edit) {
            log::error!(target: LOG_TARGET, "Failed to forward edit: {}", e);
        }
    }

    /// The single edit reported for a finished burst.
    async fn finish_burst<D: EditData + HasEditSource>(&self, burst: Burst<D>) -> AnnotatedEdit<D> {
        if burst.count == 1 {
            return burst.composed;
        }

        let expected = burst.payload.edit_source();
        let consistent = burst
            .composed
            .replacements()
            .iter()
            .all(|r| Arc::ptr_eq(r.data.edit_source(), expected));
        if !consistent {
            log::error!(
                target: LOG_TARGET,
                "{}",
                ProvenanceError::unexpected_reason_shape(format!(
                    "burst of {} chat edits mixes sources; forwarding them uncombined",
                    burst.count
                ))
            );
            return burst.composed;
        }

        let budget = self.config.diff_budget;
        let diff = self
            .diff
            .compute_diff(&burst.prev_value, &burst.value, budget);
        match tokio::time::timeout(budget, diff).await {
            Ok(Ok(diff)) => {
                log::debug!(
                    target: LOG_TARGET,
                    "Combined {} chat edits into {} replacements",
                    burst.count,
                    diff.replacements().len()
                );
                diff.map_data(|_| burst.payload.clone())
            }
            Ok(Err(e)) => {
                log::warn!(target: LOG_TARGET, "{}; forwarding the composed edit", e);
                burst.composed
            }
            Err(_) => {
                let e = ProvenanceError::DiffTimeout {
                    budget_ms: budget.as_millis() as u64,
                };
                log::warn!(target: LOG_TARGET, "{}; forwarding the composed edit", e);
                burst.composed
            }
        }
    }
}

struct RunHandle {
    subscription: SubscriptionId,
    /// Cancelled once the run has forwarded everything it received
    done: CancellationToken,
}

/// Coalesces chat bursts of `upstream` and forwards everything to a sink.
///
/// Must be created inside a tokio runtime; each run is a spawned task.
pub struct StreamingEditCombiner<D, K, S> {
    upstream: ObservableDocument<D>,
    shared: Arc<CombinerShared<K, S>>,
    current: Mutex<RunHandle>,
}

impl<D, K, S> StreamingEditCombiner<D, K, S>
where
    D: EditData + HasEditSource + Send + Sync + 'static,
    K: ChangeSink<D> + 'static,
    S: DiffService,
{
    pub fn new(upstream: ObservableDocument<D>, sink: K, diff: S, config: CombinerConfig) -> Self {
        let shared = Arc::new(CombinerShared {
            sink: Mutex::new(sink),
            diff,
            config,
            disposed: AtomicBool::new(false),
        });
        let receiver = upstream.subscribe();
        let handle = spawn_run(Arc::clone(&shared), receiver, None);
        Self {
            upstream,
            shared,
            current: Mutex::new(handle),
        }
    }

    /// Start a new run and wait until the previous one has drained.
    ///
    /// Once this resolves, every upstream change published before the call
    /// has reached the sink. A pending burst is closed early.
    pub async fn restart(&self) {
        let previous_done = {
            let mut current = self.current.lock().recover_poison("StreamingEditCombiner::restart");
            let receiver = self.upstream.resubscribe(current.subscription);
            let previous_done = current.done.clone();
            *current = spawn_run(
                Arc::clone(&self.shared),
                receiver,
                Some(previous_done.clone()),
            );
            previous_done
        };
        previous_done.cancelled().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
}

impl<D, K, S> StreamingEditCombiner<D, K, S> {
    /// Stop forwarding. Edits still in flight are dropped.
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::Release);
        let current = self.current.lock().recover_poison("StreamingEditCombiner::dispose");
        self.upstream.unsubscribe(current.subscription);
    }
}

impl<D, K, S> Drop for StreamingEditCombiner<D, K, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn spawn_run<D, K, S>(
    shared: Arc<CombinerShared<K, S>>,
    receiver: ChangeReceiver<D>,
    previous: Option<CancellationToken>,
) -> RunHandle
where
    D: EditData + HasEditSource + Send + Sync + 'static,
    K: ChangeSink<D> + 'static,
    S: DiffService,
{
    let done = CancellationToken::new();
    let subscription = receiver.id();
    tokio::spawn(run(shared, receiver, previous, done.clone()));
    RunHandle { subscription, done }
}

async fn run<D, K, S>(
    shared: Arc<CombinerShared<K, S>>,
    receiver: ChangeReceiver<D>,
    previous: Option<CancellationToken>,
    done: CancellationToken,
) where
    D: EditData + HasEditSource + Send + Sync + 'static,
    K: ChangeSink<D> + 'static,
    S: DiffService,
{
    if let Some(previous) = previous {
        previous.cancelled().await;
    }

    let mut reader = ChangeReader::new(receiver);
    let mut state = CombinerState::Idle;
    loop {
        state = match state {
            CombinerState::Idle => match reader.take().await {
                None => break,
                Some(change) => match chat_payload(&change) {
                    Some(payload) => {
                        log::trace!(
                            target: LOG_TARGET,
                            "Chat burst started at version {}",
                            change.version
                        );
                        CombinerState::Buffering(Burst::start(change, payload))
                    }
                    None => {
                        shared.emit(change.edit);
                        CombinerState::Idle
                    }
                },
            },
            CombinerState::Buffering(mut burst) => {
                let outcome = reader.peek_timeout(shared.config.burst_timeout).await;
                let continues = outcome == PeekOutcome::Ready
                    && reader.peeked().is_some_and(|c| chat_payload(c).is_some());
                match reader.take_peeked_if(continues) {
                    Some(change) => {
                        burst.push(change);
                        CombinerState::Buffering(burst)
                    }
                    None => {
                        let edit = shared.finish_burst(burst).await;
                        shared.emit(edit);
                        CombinerState::Idle
                    }
                }
            }
        };
    }

    log::trace!(target: LOG_TARGET, "Combiner run drained");
    done.cancel();
}
