//! Provenance and retention tracking on top of the document pipeline.
//!
//! - [`DocumentEditSourceTracker`] attributes current text to source keys.
//! - [`ArcTracker`] measures how much of one accepted edit survives.
//! - [`EditSourceTrackingController`] owns both per open document, resets
//!   them on their schedules and reports to telemetry.

mod arc_reporter;
mod arc_tracker;
mod controller;
mod range_tracker;
mod stats;

pub use arc_reporter::ArcReporter;
pub use arc_tracker::{ArcTracker, ArcValues, LineCountInfo};
pub use controller::{EditSourceTrackingController, RepositoryState};
pub use range_tracker::{DocumentEditSourceTracker, TrackedRange};
pub use stats::{ReportContext, StatsCategory, report_events};
