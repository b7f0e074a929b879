//! Annotated edit composition and provenance retention.
//!
//! Edits to a document are annotated with the source that produced them
//! (typing, AI completion, chat, formatting, reloads), combined and minimized,
//! and folded into trackers that attribute every live character to a source
//! and measure how much accepted AI text survives over time.

pub mod config;
pub mod document;
pub mod edit;
pub mod error;
pub mod replay;
pub mod source;
pub mod telemetry;
pub mod text;
pub mod tracking;

pub use config::EngineConfig;
pub use document::{EditPipeline, ObservableDocument};
pub use edit::{AnnotatedEdit, EditData, OffsetRange, Replacement, StringEdit};
pub use error::{ProvenanceError, ProvenanceResult};
pub use source::{EditReason, EditSource, SourceCache};
pub use telemetry::{TelemetryEvent, TelemetrySink};
pub use tracking::{ArcTracker, DocumentEditSourceTracker, EditSourceTrackingController};
