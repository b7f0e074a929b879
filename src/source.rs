//! Source classification: attributing edits to the human, tool or service
//! that produced them.
//!
//! A raw [`EditReason`] is classified into a [`SourceKind`] by a pure match.
//! [`SourceCache`] memoizes the resulting [`EditSource`] so equal sources are
//! one shared allocation, which keeps payload joins down to pointer checks.

mod cache;
mod data;
mod edit_source;
mod reason;

pub use cache::SourceCache;
pub use data::{EditKeySourceData, EditSourceData, HasEditSource, IsTrackedEditData};
pub use edit_source::{
    AiKind, ChatKind, EditSource, IdeKind, SourceCategory, SourceKind, classify_reason,
};
pub use reason::{EditReason, SOURCE_KEY_DETAIL_LEVEL};
